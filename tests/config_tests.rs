//! Configuration loading tests using temporary files.

use delve::research::state::ResearchDepth;
use delve::utils::toml_config::ProviderConfig;
use delve::{ConfigError, DelveConfig, InMemoryStateStore, Orchestrator, ResearchConfig, ToolRegistry};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_file() {
    let file = write_config(
        r#"
[research]
max_concurrent_researchers = 2
max_researcher_iterations = 4
default_depth = "deep"
compress_findings = false
worker_timeout_secs = 60

[llm]
type = "ollama"
model = "qwen2.5"
temperature = 0.0

[tools]
file_root = "./corpus"
search_results = 8

[storage]
state_dir = "/tmp/delve-threads"

[logging]
level = "debug"
json = true
"#,
    );

    let config = DelveConfig::load(file.path()).unwrap();

    assert_eq!(config.research.max_concurrent_researchers, 2);
    assert_eq!(config.research.max_researcher_iterations, 4);
    assert_eq!(config.research.default_depth, ResearchDepth::Deep);
    assert!(!config.research.compress_findings);
    assert!(config.research.allow_clarification);
    assert_eq!(config.research.worker_timeout(), Duration::from_secs(60));
    assert_eq!(config.research.round_timeout(), Duration::from_secs(900));

    match &config.llm.provider {
        ProviderConfig::Ollama { base_url, model } => {
            assert_eq!(base_url, "http://localhost:11434");
            assert_eq!(model, "qwen2.5");
        }
        other => panic!("unexpected provider {:?}", other),
    }
    assert_eq!(config.llm.temperature, 0.0);
    assert_eq!(config.tools.search_results, 8);
    assert_eq!(config.storage.state_dir, std::path::PathBuf::from("/tmp/delve-threads"));
    assert!(config.logging.json);
}

#[test]
fn test_missing_file() {
    let result = DelveConfig::load("/definitely/not/here/delve.toml");
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

#[test]
fn test_malformed_toml() {
    let file = write_config("[research\nmax_concurrent_researchers = ");
    assert!(matches!(
        DelveConfig::load(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_out_of_range_values_rejected_on_load() {
    let file = write_config("[research]\nmax_concurrent_researchers = 9\n");
    match DelveConfig::load(file.path()) {
        Err(ConfigError::ValidationError(message)) => {
            assert!(message.contains("max_concurrent_researchers"), "{}", message);
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_openai_requires_key_variable() {
    let file = write_config(
        r#"
[llm]
type = "openai"
api_key_env = "DELVE_TEST_KEY_THAT_IS_NEVER_SET"
model = "gpt-4o-mini"
"#,
    );

    match DelveConfig::load(file.path()) {
        Err(ConfigError::MissingEnvVar(name)) => {
            assert_eq!(name, "DELVE_TEST_KEY_THAT_IS_NEVER_SET");
        }
        other => panic!("expected missing env var, got {:?}", other),
    }
}

#[test]
fn test_rendered_config_loads_back() {
    let original = DelveConfig {
        research: ResearchConfig {
            max_researcher_iterations: 3,
            default_depth: ResearchDepth::Shallow,
            ..Default::default()
        },
        ..Default::default()
    };

    let file = write_config(&original.to_toml().unwrap());
    assert_eq!(DelveConfig::load(file.path()).unwrap(), original);
}

#[test]
fn test_orchestrator_rejects_invalid_limits() {
    struct NoModel;

    #[async_trait::async_trait]
    impl delve::LLMClient for NoModel {
        async fn generate(&self, _request: &delve::LLMRequest) -> delve::Result<delve::LLMResponse> {
            unreachable!("construction must fail first")
        }
        fn model_name(&self) -> &str {
            "none"
        }
    }

    let config = ResearchConfig {
        max_concurrent_researchers: 0,
        ..Default::default()
    };
    let result = Orchestrator::new(
        config,
        Arc::new(NoModel),
        Arc::new(ToolRegistry::new()),
        Arc::new(InMemoryStateStore::new()),
    );

    assert!(matches!(result, Err(delve::AppError::Configuration(_))));
}
