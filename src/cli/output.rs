//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::error::Error;
use crate::filter::FilterOutput;
use crate::marker::RawPayload;
use crate::session::{TurnEvent, TurnSummary};
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats a filter result: the clean text plus extracted payloads.
#[must_use]
pub fn format_filter_output(out: &FilterOutput, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str(&out.clean);
            if !out.clean.ends_with('\n') {
                output.push('\n');
            }
            if !out.payloads.is_empty() {
                output.push_str("---\n");
                output.push_str(&format_payloads_text(&out.payloads));
            }
            output
        }
        OutputFormat::Json => format_json(out),
    }
}

/// Formats a payload list from a whole-text scan.
#[must_use]
pub fn format_payloads(payloads: &[RawPayload], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if payloads.is_empty() {
                return "No markers found.\n".to_string();
            }
            format_payloads_text(payloads)
        }
        OutputFormat::Json => format_json(&payloads),
    }
}

fn format_payloads_text(payloads: &[RawPayload]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{} payload(s):", payloads.len());
    for (i, payload) in payloads.iter().enumerate() {
        let _ = writeln!(
            output,
            "  [{i}] {}: {}",
            payload.kind,
            payload.raw.replace('\n', "\\n")
        );
    }
    output
}

/// Formats a replayed turn: its event sequence and summary.
#[must_use]
pub fn format_replay(events: &[TurnEvent], summary: &TurnSummary, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            for event in events {
                let _ = writeln!(output, "{}", format_json_compact(event));
            }
            output.push_str("---\n");
            let _ = writeln!(output, "  Fragments: {}", summary.fragments_emitted);
            let _ = writeln!(output, "  Dispatched: {}", summary.payloads_dispatched);
            let _ = writeln!(output, "  Applied: {}", summary.payloads_applied);
            output
        }
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Replay<'a> {
                events: &'a [TurnEvent],
                clean_text: &'a str,
                fragments_emitted: u64,
                payloads_dispatched: usize,
                payloads_applied: usize,
            }
            format_json(&Replay {
                events,
                clean_text: &summary.clean_text,
                fragments_emitted: summary.fragments_emitted,
                payloads_dispatched: summary.payloads_dispatched,
                payloads_applied: summary.payloads_applied,
            })
        }
    }
}

/// Formats an error for display.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }
            format_json(&ErrorOutput {
                error: error.to_string(),
            })
        }
    }
}

/// Formats a value as pretty JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a value as single-line JSON.
fn format_json_compact<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
