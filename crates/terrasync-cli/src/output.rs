//! Output formatting for human and JSON modes
//!
//! Commands print through a formatter so `--json` swaps the entire output
//! surface instead of sprinkling conditionals through command code.

use terrasync_core::domain::conflict::{Conflict, ConflictResolution};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);

    /// Render the unresolved-conflict report shown after a sync
    fn print_conflicts(&self, conflicts: &[Conflict]);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Human formatter doesn't print JSON
    }

    fn print_conflicts(&self, conflicts: &[Conflict]) {
        if conflicts.is_empty() {
            return;
        }
        println!();
        println!(
            "\u{26a0} {} conflict(s) resolved automatically:",
            conflicts.len()
        );
        for conflict in conflicts {
            let location = match (&conflict.record, &conflict.field) {
                (Some(record), Some(field)) => {
                    format!("{} (record {record}, field '{field}')", conflict.path)
                }
                (Some(record), None) => format!("{} (record {record})", conflict.path),
                _ => conflict.path.to_string(),
            };
            let outcome = match &conflict.resolution {
                ConflictResolution::RemoteFieldKept => {
                    "remote value kept, yours recorded in the conflict log".to_string()
                }
                ConflictResolution::ConflictCopyCreated { copy_name } => {
                    format!("your copy saved as '{copy_name}'")
                }
                ConflictResolution::LocalEditReinserted => {
                    "record was deleted remotely, your edit re-added it".to_string()
                }
                ConflictResolution::InsertCollision => {
                    "both sides inserted this record, remote fields kept".to_string()
                }
            };
            println!("    {location}: {outcome}");
        }
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }

    fn print_conflicts(&self, conflicts: &[Conflict]) {
        if conflicts.is_empty() {
            return;
        }
        let value = serde_json::to_value(conflicts).unwrap_or_default();
        self.print_json(&serde_json::json!({ "conflicts": value }));
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}
