use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Structured log events for one critique invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    ReflectionStarted {
        invocation: String,
        gateway: String,
        model: String,
        prior_action: i64,
        scenario_preview: String,
    },
    GatewayCallCompleted {
        invocation: String,
        call: u32,
        duration_secs: f64,
        prompt_tokens: u64,
        completion_tokens: u64,
        cost_usd: f64,
    },
    CritiqueReceived {
        invocation: String,
        lines: usize,
    },
    ActionExtracted {
        invocation: String,
        action: i64,
    },
    ExtractionFailed {
        invocation: String,
        reason: String,
    },
    RepairSucceeded {
        invocation: String,
        action: i64,
        attempts: usize,
    },
    RepairExhausted {
        invocation: String,
        attempts: usize,
        error: String,
    },
    RecordPersisted {
        invocation: String,
        path: PathBuf,
        records: usize,
    },
    ReflectionFinished {
        invocation: String,
        outcome: String,
        action: Option<i64>,
        llm_use: u32,
        cost_usd: f64,
        duration_secs: f64,
    },
    ErrorEncountered {
        invocation: String,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for autocritic events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    quiet: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            quiet: false,
            file_writer: None,
        }
    }

    /// Logger that only writes to its file (if any)
    pub fn silent() -> Self {
        Self {
            format: LogFormat::Compact,
            quiet: true,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            quiet: false,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // Log to file if configured (always JSON format for file)
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if self.quiet {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::ReflectionStarted {
                gateway,
                model,
                prior_action,
                scenario_preview,
                ..
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "autocritic".bold().bright_white(),
                    " ".repeat(57) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Scenario:".dimmed(),
                    Self::truncate_with_padding(scenario_preview, 56, 66).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Model:".dimmed(),
                    Self::truncate_with_padding(
                        &format!("{} ({}), prior action {}", model, gateway, prior_action),
                        59,
                        69
                    )
                    .dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "CRITIQUE".bright_magenta().bold()
                );
            }
            LogEvent::GatewayCallCompleted {
                call,
                duration_secs,
                prompt_tokens,
                completion_tokens,
                cost_usd,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} {}",
                    "·".dimmed(),
                    format!(
                        "call {} {:.1}s, {}+{} tokens, ${:.4}",
                        call, duration_secs, prompt_tokens, completion_tokens, cost_usd
                    )
                    .dimmed()
                );
            }
            LogEvent::CritiqueReceived { lines, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} Critique received ({} lines)",
                    "✓".bright_green(),
                    lines
                );
            }
            LogEvent::ActionExtracted { action, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} Final action: {}",
                    "→".bright_cyan(),
                    action.to_string().bold()
                );
            }
            LogEvent::ExtractionFailed { reason, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} Output is not usable: {}",
                    "✗".bright_red(),
                    reason.bright_red()
                );
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_yellow(),
                    "OUTPUT CHECK".bright_yellow().bold()
                );
            }
            LogEvent::RepairSucceeded {
                action, attempts, ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} Output checking result: {} ({} {})",
                    "✓".bright_green(),
                    action.to_string().bold(),
                    attempts,
                    if *attempts == 1 { "attempt" } else { "attempts" }
                );
            }
            LogEvent::RepairExhausted {
                attempts, error, ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} No valid action after {} attempts: {}",
                    "✗".bright_red(),
                    attempts,
                    error.bright_red()
                );
            }
            LogEvent::RecordPersisted { path, records, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} {} {} ({} records)",
                    "📁".dimmed(),
                    "Ledger:".dimmed(),
                    path.display().to_string().dimmed(),
                    records
                );
            }
            LogEvent::ReflectionFinished { .. } => {
                // The final outcome is printed by the CLI
                let _ = writeln!(
                    stderr,
                    "{}",
                    "└─────────────────────────────────────────────────────────────────────┘"
                        .bright_blue()
                );
            }
            LogEvent::ErrorEncountered { error, .. } => {
                let _ = writeln!(stderr);
                let _ = writeln!(stderr, "{} Error: {}", "✗".bright_red(), error.bright_red());
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::ReflectionStarted {
                invocation,
                prior_action,
                ..
            } => format!("[{}] reflect:start:{} prior={}", timestamp, invocation, prior_action),
            LogEvent::GatewayCallCompleted {
                call,
                duration_secs,
                prompt_tokens,
                completion_tokens,
                ..
            } => format!(
                "[{}] llm:{} {:.1}s {}+{}",
                timestamp, call, duration_secs, prompt_tokens, completion_tokens
            ),
            LogEvent::CritiqueReceived { lines, .. } => {
                format!("[{}] critique:done {} lines", timestamp, lines)
            }
            LogEvent::ActionExtracted { action, .. } => {
                format!("[{}] extract:ok {}", timestamp, action)
            }
            LogEvent::ExtractionFailed { reason, .. } => {
                format!("[{}] extract:fail {}", timestamp, reason)
            }
            LogEvent::RepairSucceeded {
                action, attempts, ..
            } => format!("[{}] repair:ok {} after {}", timestamp, action, attempts),
            LogEvent::RepairExhausted { attempts, .. } => {
                format!("[{}] repair:exhausted {}", timestamp, attempts)
            }
            LogEvent::RecordPersisted { records, .. } => {
                format!("[{}] ledger:append {}", timestamp, records)
            }
            LogEvent::ReflectionFinished {
                outcome,
                llm_use,
                duration_secs,
                ..
            } => format!(
                "[{}] reflect:done {} calls={} {:.1}s",
                timestamp, outcome, llm_use, duration_secs
            ),
            LogEvent::ErrorEncountered { error, .. } => {
                format!("[{}] error:{}", timestamp, error)
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let flat = s.replace('\n', " ");
        let truncated = if flat.chars().count() > max_len {
            let head: String = flat.chars().take(max_len - 3).collect();
            format!("{}...", head)
        } else {
            flat
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1); // +1 for trailing │
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_tag() {
        let event = LogEvent::RepairSucceeded {
            invocation: "abc".into(),
            action: 4,
            attempts: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "repair_succeeded");
        assert_eq!(json["action"], 4);
        assert!(event.with_timestamp()["timestamp"].is_string());
    }

    #[test]
    fn test_file_logger_appends_json_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("add_memory.log");
        let mut logger = Logger::with_file(LogFormat::Compact, &path).unwrap();
        logger.quiet = true;

        logger.log(&LogEvent::ExtractionFailed {
            invocation: "abc".into(),
            reason: "not an integer".into(),
        });
        logger.log(&LogEvent::ActionExtracted {
            invocation: "abc".into(),
            action: 8,
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"event\":\"extraction_failed\""));
        assert!(lines[1].contains("\"action\":8"));
    }

    #[test]
    fn test_truncate_with_padding_handles_multibyte() {
        let padded = Logger::truncate_with_padding("véhicule à gauche", 8, 12);
        assert!(padded.ends_with('│'));
        assert!(padded.starts_with("véhic..."));
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
