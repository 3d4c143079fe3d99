//! Delve command-line front-end

use anyhow::Context;
use delve::cli::output::Output;
use delve::cli::{Cli, Commands};
use delve::{
    DelveConfig, FileStateStore, Orchestrator, Provider, ResearchEvent, RunOutcome, ToolRegistry,
};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Commands::Config { full, validate } => show_config(&cli.config, full, validate, &output),
        Commands::Run {
            message,
            thread,
            stream,
        } => {
            let config = load_config(&cli.config)?;
            init_tracing(&config, cli.verbose);
            run(config, message, thread, stream, &output).await
        }
    }
}

/// Load the config file, falling back to defaults when it does not exist.
fn load_config(path: &Path) -> anyhow::Result<DelveConfig> {
    if !path.exists() {
        let config = DelveConfig::default();
        config
            .validate()
            .context("Default configuration is not usable")?;
        return Ok(config);
    }
    DelveConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn init_tracing(config: &DelveConfig, verbose: bool) {
    let fallback = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

async fn run(
    config: DelveConfig,
    message: String,
    thread: Option<String>,
    stream: bool,
    output: &Output,
) -> anyhow::Result<()> {
    let provider = Provider::try_from(&config.llm)?;
    let llm = provider.create_client(config.llm.temperature, config.llm.request_timeout())?;
    let tools = ToolRegistry::with_default_tools(
        config.tools.file_root.clone(),
        config.tools.search_results,
    )
    .with_timeout(config.research.tool_timeout());
    let store = FileStateStore::new(config.storage.state_dir.clone());

    tracing::info!(provider = provider.name(), model = provider.model(), "Starting run");

    let orchestrator = Arc::new(Orchestrator::new(
        config.research.clone(),
        Arc::from(llm),
        Arc::new(tools),
        Arc::new(store),
    )?);

    let thread_id = thread.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        });
    }

    output.banner();
    output.kv("Thread", &thread_id);
    output.kv("Model", &format!("{} ({})", provider.model(), provider.name()));

    if stream {
        let events = orchestrator.run_stream(thread_id.clone(), message, cancel);
        futures::pin_mut!(events);
        let mut failed = false;
        while let Some(event) = events.next().await {
            failed |= matches!(event, ResearchEvent::Failed { .. });
            output.event(&event);
            if matches!(event, ResearchEvent::Clarification { .. }) {
                clarification_hint(output, &thread_id);
            }
        }
        if failed {
            anyhow::bail!("Research run failed");
        }
        return Ok(());
    }

    output.info("Researching... (Ctrl-C to cancel)");
    match orchestrator
        .run_with(&thread_id, &message, cancel, Default::default())
        .await?
    {
        RunOutcome::NeedsClarification { question, .. } => {
            output.question(&question);
            clarification_hint(output, &thread_id);
        }
        RunOutcome::Completed { report, state } => {
            output.report(&report);
            output.success(&format!(
                "Completed after {} research round(s) with {} note(s)",
                state.iteration_count,
                state.notes.len()
            ));
        }
        RunOutcome::Failed { reason, .. } => {
            output.error(&reason);
            anyhow::bail!("Research run failed");
        }
        RunOutcome::Cancelled { .. } => output.warning("Run cancelled"),
    }

    Ok(())
}

fn clarification_hint(output: &Output, thread_id: &str) {
    output.hint(&format!(
        "Answer with: delve run --thread {} \"<your answer>\"",
        thread_id
    ));
}

fn show_config(path: &Path, full: bool, validate: bool, output: &Output) -> anyhow::Result<()> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        DelveConfig::from_toml(&content)?
    } else {
        output.warning(&format!("{} not found, using defaults", path.display()));
        DelveConfig::default()
    };

    if validate {
        match config.validate() {
            Ok(()) => output.success("Configuration is valid"),
            Err(e) => {
                output.error(&e.to_string());
                anyhow::bail!("Invalid configuration");
            }
        }
        return Ok(());
    }

    if full {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    output.header("Configuration");
    output.kv("File", &path.display().to_string());
    output.kv(
        "Max concurrent researchers",
        &config.research.max_concurrent_researchers.to_string(),
    );
    output.kv(
        "Max research rounds",
        &config.research.max_researcher_iterations.to_string(),
    );
    output.kv("Default depth", config.research.default_depth.as_str());
    output.kv("File root", &config.tools.file_root.display().to_string());
    output.kv("State dir", &config.storage.state_dir.display().to_string());
    output.hint("Use --full to print the complete configuration");
    Ok(())
}
