//! JSON report output.

use anyhow::{Context, Result};
use procscope_core::Report;

pub fn format_json(report: &Report, compact: bool) -> Result<String> {
    if compact {
        serde_json::to_string(report).context("Failed to serialize report")
    } else {
        serde_json::to_string_pretty(report).context("Failed to serialize report")
    }
}
