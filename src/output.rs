// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::provision::{CleanupReport, ProvisionError, ProvisionSummary, Stage};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

impl OutputMode {
    pub fn from_flags(quiet: bool, json: bool) -> Self {
        if json {
            OutputMode::Json
        } else if quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Announce a stage as it starts.
    pub fn stage(&self, stage: Stage) {
        match self.mode {
            OutputMode::Normal => println!(
                "  → [{}/{}] {}",
                stage.number(),
                Stage::ORDER.len(),
                stage.description()
            ),
            OutputMode::Quiet => {}
            OutputMode::Json => emit(&StageEvent {
                event: "stage",
                stage,
                number: stage.number(),
            }),
        }
    }

    /// Print a non-fatal warning (stderr in every mode but JSON).
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => emit(&JsonEvent {
                event: "warning",
                message,
                duration_secs: None,
            }),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => emit(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print the ids created by a successful run.
    pub fn summary(&self, summary: &ProvisionSummary) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                for (key, value) in summary.lines() {
                    println!("  {key:<16} {value}");
                }
            }
            OutputMode::Json => emit(&ResultEvent {
                event: "summary",
                data: summary,
            }),
        }
    }

    /// Print where a run failed and what rollback did.
    pub fn failure(&self, error: &ProvisionError, report: &CleanupReport) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!(
                    "Failed at stage {} ({}): {}",
                    error.stage().number(),
                    error.stage(),
                    error.kind()
                );
                self.cleanup_report(report);
            }
            OutputMode::Json => emit(&FailureEvent {
                event: "failure",
                stage: error.stage(),
                kind: error.kind().as_str(),
                message: error.to_string(),
                cleanup: report,
            }),
        }
    }

    /// Print a cleanup report.
    pub fn cleanup_report(&self, report: &CleanupReport) {
        if self.mode == OutputMode::Json {
            emit(&ResultEvent {
                event: "cleanup",
                data: report,
            });
            return;
        }

        if report.skipped {
            eprintln!("Cleanup: nothing to roll back");
        }
        if let Some(snapshot) = &report.preserved_snapshot {
            eprintln!("  preserved snapshot {snapshot}");
        }
        if !report.detached.is_empty() {
            eprintln!("  detached {} volume(s)", report.detached.len());
        }
        for id in &report.confirmed_deleted {
            eprintln!("  deleted volume {id}");
        }
        if report.instance_deleted
            && let Some(instance) = &report.instance
        {
            eprintln!("  deleted instance {instance}");
        }
        for warning in report.warnings.warnings() {
            self.warning(&warning.message);
        }
        for item in &report.manual_review {
            eprintln!("  needs manual review: {item}");
        }
    }
}

fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct StageEvent {
    event: &'static str,
    stage: Stage,
    number: usize,
}

#[derive(Serialize)]
struct ResultEvent<'a, T: Serialize> {
    event: &'static str,
    data: &'a T,
}

#[derive(Serialize)]
struct FailureEvent<'a> {
    event: &'static str,
    stage: Stage,
    kind: &'static str,
    message: String,
    cleanup: &'a CleanupReport,
}
