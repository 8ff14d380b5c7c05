//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chrono::Local;
use serde::Serialize;

use tagstore_core::{Event, Tag};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single tag
    pub fn print_tag(&self, tag: &Tag) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:           {}", tag.id);
                if let Some(ref name) = tag.name {
                    println!("Name:         {}", name);
                }
                if let Some(ref desc) = tag.description {
                    println!("Description:  {}", desc);
                }
                println!("Last scanned: {}", format_last_scanned(tag));
                if let Some(ref device) = tag.device_id {
                    println!("Device:       {}", device);
                }
            }
            OutputFormat::Json => println!("{}", to_json(tag)),
            OutputFormat::Quiet => println!("{}", tag.id),
        }
    }

    /// Print a list of tags
    pub fn print_tags(&self, tags: &[Tag]) {
        match self.format {
            OutputFormat::Human => {
                if tags.is_empty() {
                    println!("No tags found.");
                    return;
                }
                for tag in tags {
                    println!(
                        "{} | {} | {} | {}",
                        truncate(&tag.id, 36),
                        truncate(tag.name.as_deref().unwrap_or("-"), 25),
                        format_last_scanned(tag),
                        tag.device_id.as_deref().unwrap_or("-")
                    );
                }
                println!("\n{} tag(s)", tags.len());
            }
            OutputFormat::Json => println!("{}", to_json(&tags)),
            OutputFormat::Quiet => {
                for tag in tags {
                    println!("{}", tag.id);
                }
            }
        }
    }

    /// Print domain events fired during a command
    pub fn print_events(&self, events: &[Event]) {
        match self.format {
            OutputFormat::Human => {
                for event in events {
                    println!("→ {} {}", event.event_type, event.data);
                }
            }
            OutputFormat::Json => println!("{}", to_json(&events)),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        if self.format == OutputFormat::Human {
            println!("{}", msg);
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn format_last_scanned(tag: &Tag) -> String {
    tag.last_scanned
        .map(|ts| ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}

/// Truncate a string to max length, adding ellipsis if needed
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
