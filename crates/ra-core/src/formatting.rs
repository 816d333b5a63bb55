//! Formatting utilities (alert → human-readable text, HTML escaping).

use crate::domain::{Alert, Occurrence};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render an alert as plain text: a header line, a blank line, then one line per occurrence.
///
/// Occurrences keep their upstream order. The result always ends with a newline.
pub fn format_alert(alert: &Alert) -> String {
    let kind = alert.kind();
    let mut out = format!(
        "{} {} {}:\n\n",
        kind.emoji(),
        kind.header(),
        alert.timestamp()
    );
    for occurrence in &alert.occurrences {
        out.push_str(&format_occurrence(occurrence));
        out.push('\n');
    }
    out
}

/// `"{name}"` or `"{name} ({area})"`.
pub fn format_occurrence(occurrence: &Occurrence) -> String {
    let name = occurrence.display_name();
    match occurrence.display_area() {
        Some(area) => format!("{name} ({area})"),
        None => name.to_string(),
    }
}
