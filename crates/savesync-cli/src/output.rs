use std::io::Write;

use savesync_core::domain::{format_bytes, format_duration};
use savesync_core::usecases::{ProgressSnapshot, SyncPhase};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
    /// Redraws the single live progress line
    fn progress(&self, line: &str);
    /// Ends the live progress line, if one was drawn
    fn end_progress(&self);
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
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {}
    fn progress(&self, line: &str) {
        let mut err = std::io::stderr().lock();
        // \x1b[2K clears what a longer previous line left behind
        let _ = write!(err, "\r\x1b[2K  {}", line);
        let _ = err.flush();
    }
    fn end_progress(&self) {
        eprintln!();
    }
}

/// JSON output formatter
///
/// Progress is not drawn; the final result is printed as one document.
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", serde_json::json!({"success": true, "message": message}));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", serde_json::json!({"success": false, "error": message}));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", serde_json::json!({"level": "warning", "message": message}));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
    fn progress(&self, _line: &str) {}
    fn end_progress(&self) {}
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

/// Renders `sent / total • speed/s • ETA` for an active transfer
///
/// Returns `None` outside the transfer phase. Unknown totals drop the
/// `/ total` and ETA parts.
pub fn progress_line(snapshot: &ProgressSnapshot) -> Option<String> {
    match snapshot.phase {
        SyncPhase::Packing => return Some("Packing world...".to_string()),
        SyncPhase::Unpacking => return Some("Unpacking...".to_string()),
        SyncPhase::Transferring => {}
        _ => return None,
    }

    let sent = format_bytes(snapshot.transferred_bytes);
    let speed = format!("{}/s", format_bytes(snapshot.rate_bps.max(0.0) as u64));
    let line = match snapshot.total_bytes {
        Some(total) => {
            let eta = snapshot
                .eta_secs
                .map(format_duration)
                .unwrap_or_else(|| "--".to_string());
            format!(
                "{} / {} \u{2022} {} \u{2022} ETA {}",
                sent,
                format_bytes(total),
                speed,
                eta
            )
        }
        None => format!("{} \u{2022} {}", sent, speed),
    };
    Some(line)
}
