//! Human-readable table output formatting.

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use procscope_core::Report;
use std::fmt::Write;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct DisplayRow {
    #[tabled(rename = "Dynamic")]
    dynamic: &'static str,
    #[tabled(rename = "Database")]
    database: String,
    #[tabled(rename = "Procedure")]
    procedure: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Entity")]
    entity: String,
}

/// Format the report as a human-readable table with optional colors on the
/// title and summary lines.
pub fn format_table(report: &Report, use_colors: bool) -> String {
    let colored = use_colors && std::io::stdout().is_terminal();
    let mut out = String::new();

    let title = "Procscope Dependency Report";
    let line = "═".repeat(50);
    if colored {
        writeln!(out, "{}", title.bold()).unwrap();
        writeln!(out, "{}", line.dimmed()).unwrap();
    } else {
        writeln!(out, "{title}").unwrap();
        writeln!(out, "{line}").unwrap();
    }

    let rows: Vec<DisplayRow> = report
        .rows
        .iter()
        .map(|row| DisplayRow {
            dynamic: if row.has_dynamic_sql { "yes" } else { "" },
            database: row.database_name.clone(),
            procedure: row.procedure_name.clone(),
            action: row.action.clone(),
            entity: row.entity_name.clone(),
        })
        .collect();

    writeln!(out, "{}", Table::new(rows).with(Style::sharp())).unwrap();

    let failures = report
        .rows
        .iter()
        .filter(|r| r.entity_name.is_empty() && !r.action.is_empty())
        .count();
    let stats = format!(
        "Summary: {} procedures | {} rows | {} failures",
        report.procedures().len(),
        report.rows.len(),
        failures
    );
    if colored {
        writeln!(out, "{}", stats.cyan()).unwrap();
    } else {
        writeln!(out, "{stats}").unwrap();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use procscope_core::{NOT_FOUND_REASON, Report};

    #[test]
    fn test_table_contains_headers_and_rows() {
        let mut report = Report::default();
        report.push_error("dbo.Ghost", "", NOT_FOUND_REASON);
        let out = format_table(&report, false);
        assert!(out.contains("Procedure"));
        assert!(out.contains("dbo.Ghost"));
        assert!(out.contains("Not found"));
        assert!(out.contains("1 failures"));
    }
}
