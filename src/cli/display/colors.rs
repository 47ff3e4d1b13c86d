//! Status colour mapping for CLI output.
//!
//! `console` disables styling when the terminal does not support it or
//! `NO_COLOR` is set.

use console::{style, StyledObject};

/// Returns a coloured string for a job status or drive outcome.
///
/// Color scheme:
/// - Green:  concluded
/// - Yellow: submitted, running, awaiting completion
/// - Blue:   unsubmitted, tosubmit, finished
/// - Red:    failed
/// - Dim:    cancelled, already concluded
pub fn colorize_status(status: &str) -> StyledObject<&str> {
    match status.to_lowercase().as_str() {
        "concluded" => style(status).green().bold(),
        "submitted" | "running" | "awaiting completion" => style(status).yellow(),
        "unsubmitted" | "tosubmit" | "finished" => style(status).blue(),
        "failed" => style(status).red().bold(),
        "cancelled" | "already concluded" => style(status).dim(),
        _ => style(status).white(),
    }
}
