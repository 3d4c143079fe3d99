//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the Delve CLI.

use crate::research::events::ResearchEvent;
use crate::research::report::Report;
use crate::research::state::SubtaskStatus;
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the Delve banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n   {} {}\n",
                "DELVE".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n   DELVE v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a clarifying question from the scoping phase
    pub fn question(&self, question: &str) {
        if self.colored {
            println!("\n  {} {}\n", "?".bright_yellow().bold(), question.bright_white());
        } else {
            println!("\n  [?] {}\n", question);
        }
    }

    /// Print the rendered report
    pub fn report(&self, report: &Report) {
        println!("\n{}", report.to_markdown());
    }

    /// One-line rendering of a progress event, or `None` for events printed elsewhere
    pub fn event_line(event: &ResearchEvent) -> Option<String> {
        match event {
            ResearchEvent::PhaseChanged { from, to } => Some(format!("phase {} -> {}", from, to)),
            ResearchEvent::Status { message } => Some(message.clone()),
            ResearchEvent::RoundStarted { round, subtasks } => Some(format!(
                "round {}: dispatching {} researcher(s)",
                round,
                subtasks.len()
            )),
            ResearchEvent::WorkerFinished { subtask_id, status } => Some(format!(
                "{} {}",
                subtask_id,
                match status {
                    SubtaskStatus::Done => "done",
                    SubtaskStatus::Failed => "failed",
                    SubtaskStatus::Running => "running",
                    SubtaskStatus::Pending => "pending",
                }
            )),
            ResearchEvent::Clarification { .. }
            | ResearchEvent::ReportReady { .. }
            | ResearchEvent::Failed { .. }
            | ResearchEvent::Cancelled => None,
        }
    }

    /// Print a progress event
    pub fn event(&self, event: &ResearchEvent) {
        match event {
            ResearchEvent::Clarification { question } => self.question(question),
            ResearchEvent::ReportReady { report } => self.report(report),
            ResearchEvent::Failed { reason } => self.error(reason),
            ResearchEvent::Cancelled => self.warning("Run cancelled"),
            ResearchEvent::WorkerFinished {
                status: SubtaskStatus::Failed,
                ..
            } => {
                if let Some(line) = Self::event_line(event) {
                    self.warning(&line);
                }
            }
            other => {
                if let Some(line) = Self::event_line(other) {
                    self.info(&line);
                }
            }
        }
    }
}
