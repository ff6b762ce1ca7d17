//! CSV report output.

use procscope_core::Report;

const HEADER: &str = "HasDynamicSql,DatabaseName,ProcedureName,Action,EntityName";

pub fn format_csv(report: &Report) -> String {
    let mut out = String::with_capacity(report.rows.len() * 48 + HEADER.len());
    out.push_str(HEADER);
    out.push('\n');
    for row in &report.rows {
        out.push_str(if row.has_dynamic_sql { "true" } else { "false" });
        for field in [
            &row.database_name,
            &row.procedure_name,
            &row.action,
            &row.entity_name,
        ] {
            out.push(',');
            out.push_str(&escape(field));
        }
        out.push('\n');
    }
    out
}

fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
