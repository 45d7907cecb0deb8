use crate::chart::value_counts;
use crate::response::{ResponseTable, TIMESTAMP_LABEL};
use std::fmt::Write;

const TOP_VALUES: usize = 5;

/// Plain-text rundown of the table: totals, time span, and the top answers
/// per question. Meant for terminal output next to the chart files.
pub fn survey_summary(table: &ResponseTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Survey summary");
    let _ = writeln!(out, "Total responses: {}", table.len());

    if let Some((first, last)) = table.time_span() {
        let _ = writeln!(out, "First response: {}", first.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Latest response: {}", last.format("%Y-%m-%d %H:%M:%S"));
    }

    let total = table.len();
    for label in table.headers() {
        if label == TIMESTAMP_LABEL {
            continue;
        }
        let _ = writeln!(out, "\n{}:", label);
        let counts = value_counts(table, label);
        if counts.is_empty() {
            let _ = writeln!(out, "  (no answers)");
            continue;
        }
        for (value, count) in counts.into_iter().take(TOP_VALUES) {
            let pct = count as f64 * 100.0 / total.max(1) as f64;
            let _ = writeln!(out, "  {}: {} ({:.1}%)", value, count, pct);
        }
    }

    out
}
