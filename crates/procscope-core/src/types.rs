//! Shared data model: SQL actions, entity names, per-batch analysis records,
//! and the flattened report consumed by the output layer.

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde::Serialize;
use sqlparser::ast::ObjectName;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// The SQL action under which an entity reference is recorded.
///
/// Call edges are not an action: they are carried separately on
/// [`ProcedureAnalysis`] and surface in the report with the `EXECUTE` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SqlAction {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Truncate,
    BulkInsert,
    UpdateStatistics,
    UpdateText,
    UpdateTextBulk,
}

impl SqlAction {
    /// Canonical ordering used when flattening an analysis into report rows.
    pub const ALL: [SqlAction; 10] = [
        SqlAction::Select,
        SqlAction::Insert,
        SqlAction::Update,
        SqlAction::Delete,
        SqlAction::Merge,
        SqlAction::Truncate,
        SqlAction::BulkInsert,
        SqlAction::UpdateStatistics,
        SqlAction::UpdateText,
        SqlAction::UpdateTextBulk,
    ];

    /// Report label for this action.
    pub fn label(&self) -> &'static str {
        match self {
            SqlAction::Select => "SELECT",
            SqlAction::Insert => "INSERT",
            SqlAction::Update => "UPDATE",
            SqlAction::Delete => "DELETE",
            SqlAction::Merge => "MERGE",
            SqlAction::Truncate => "TRUNCATE",
            SqlAction::BulkInsert => "BULK INSERT",
            SqlAction::UpdateStatistics => "UPDATE STATISTICS",
            SqlAction::UpdateText => "UPDATETEXT",
            SqlAction::UpdateTextBulk => "UPDATETEXT BULK",
        }
    }
}

impl fmt::Display for SqlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A possibly-qualified entity name.
///
/// Comparisons fold to lowercase (T-SQL default collation); the display
/// string keeps the casing of first appearance. Bracket decoration is
/// stripped on construction and never stored.
#[derive(Debug, Clone)]
pub struct EntityName {
    display: String,
    folded: String,
    part_count: usize,
}

impl EntityName {
    /// Build from already-split, unquoted name parts.
    pub fn from_parts(parts: &[String]) -> Self {
        let display = parts.join(".");
        let folded = display.to_lowercase();
        Self {
            display,
            folded,
            part_count: parts.len(),
        }
    }

    /// Build from a raw textual reference such as `[dbo].[Orders]` or
    /// `dbo.Orders`.
    pub fn parse(raw: &str) -> Self {
        Self::from_parts(&split_qualified_name(raw))
    }

    /// Build directly from a parsed [`ObjectName`], avoiding a string
    /// round-trip.
    pub fn from_object_name(name: &ObjectName) -> Self {
        let parts: Vec<String> = name
            .0
            .iter()
            .map(|part| {
                part.as_ident()
                    .map(|ident| ident.value.clone())
                    .unwrap_or_else(|| part.to_string())
            })
            .collect();
        Self::from_parts(&parts)
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn folded(&self) -> &str {
        &self.folded
    }

    /// Last dotted segment, folded. Used for allow-list and system-procedure
    /// matching.
    pub fn base_folded(&self) -> &str {
        self.folded.rsplit('.').next().unwrap_or(&self.folded)
    }

    pub fn part_count(&self) -> usize {
        self.part_count
    }

    /// True for names that must never enter any entity set: temp tables
    /// (`#` sigil), table variables (`@`), system-catalog references
    /// (`sys.` / `INFORMATION_SCHEMA.` schemas and the legacy `sysobjects`
    /// family).
    pub fn is_suppressed(&self) -> bool {
        if self.display.is_empty() || self.display.contains('#') || self.display.starts_with('@') {
            return true;
        }

        static SYSTEM_CATALOG: OnceLock<Regex> = OnceLock::new();
        let re = SYSTEM_CATALOG.get_or_init(|| {
            Regex::new(r"(?i)^(?:[^.]+\.)?(?:sys|information_schema)\.")
                .expect("Invalid regex pattern")
        });
        if re.is_match(&self.display) {
            return true;
        }

        matches!(
            self.base_folded(),
            "sysobjects"
                | "syscolumns"
                | "sysindexes"
                | "sysdepends"
                | "syscomments"
                | "sysusers"
                | "sysconstraints"
        )
    }
}

impl PartialEq for EntityName {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for EntityName {}

impl Hash for EntityName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Split a qualified SQL name on dots, honoring `[...]` and `"..."`
/// delimiters so embedded dots survive. Decoration is stripped from each
/// part.
pub fn split_qualified_name(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = raw.trim().chars().peekable();
    let mut active_quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        match active_quote {
            Some(']') if ch == ']' => {
                // ]] escapes a bracket inside a bracketed identifier
                if chars.peek() == Some(&']') {
                    current.push(chars.next().unwrap());
                } else {
                    active_quote = None;
                }
            }
            Some('"') if ch == '"' => {
                if chars.peek() == Some(&'"') {
                    current.push(chars.next().unwrap());
                } else {
                    active_quote = None;
                }
            }
            Some(_) => current.push(ch),
            None => match ch {
                '[' => active_quote = Some(']'),
                '"' => active_quote = Some('"'),
                '.' => {
                    parts.push(std::mem::take(&mut current));
                    // keep empty segments out (e.g. db..table)
                    if parts.last().is_some_and(|p| p.is_empty()) {
                        parts.pop();
                    }
                }
                _ if ch.is_whitespace() => {}
                _ => current.push(ch),
            },
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Normalized key for VisitedSet membership and locator lookups:
/// bracket-stripped, schema-stripped, lowercased base name.
pub fn normalize_procedure_name(raw: &str) -> String {
    split_qualified_name(raw)
        .last()
        .map(|p| p.to_lowercase())
        .unwrap_or_default()
}

/// Display form of a procedure name: decoration stripped, qualification
/// kept as written.
pub fn display_procedure_name(raw: &str) -> String {
    split_qualified_name(raw).join(".")
}

/// Classification result for one parsed batch: insertion-ordered entity sets
/// per action, the dynamic-SQL flag, and discovered call edges.
#[derive(Debug, Default, Clone)]
pub struct ProcedureAnalysis {
    entities: IndexMap<SqlAction, IndexSet<EntityName>>,
    calls: IndexSet<EntityName>,
    pub has_dynamic_sql: bool,
}

impl ProcedureAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entity under an action. Suppressed names (temp tables,
    /// system catalog) never enter any set; duplicates collapse.
    pub fn add(&mut self, action: SqlAction, name: EntityName) {
        if name.is_suppressed() {
            return;
        }
        self.entities.entry(action).or_default().insert(name);
    }

    /// Record a call edge discovered from an EXECUTE statement.
    pub fn add_call(&mut self, name: EntityName) {
        self.calls.insert(name);
    }

    pub fn entities(&self, action: SqlAction) -> impl Iterator<Item = &EntityName> {
        self.entities.get(&action).into_iter().flatten()
    }

    pub fn contains(&self, action: SqlAction, name: &str) -> bool {
        let probe = EntityName::parse(name);
        self.entities
            .get(&action)
            .is_some_and(|set| set.contains(&probe))
    }

    pub fn calls(&self) -> impl Iterator<Item = &EntityName> {
        self.calls.iter()
    }

    /// Remove CTE names from the Select set once the outer query has been
    /// fully processed: a CTE reference is a local alias, not a persisted
    /// entity.
    pub fn suppress_cte_names<'a, I: IntoIterator<Item = &'a str>>(&mut self, cte_names: I) {
        if let Some(select) = self.entities.get_mut(&SqlAction::Select) {
            for cte in cte_names {
                let probe = EntityName::parse(cte);
                select.shift_remove(&probe);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.values().all(|set| set.is_empty())
            && self.calls.is_empty()
            && !self.has_dynamic_sql
    }
}

/// One source match returned by a [`crate::resolver::SourceLocator`]: the
/// batch text from the CREATE/ALTER statement through (exclusive) the next
/// batch separator, plus the declared database name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMatch {
    pub batch: String,
    pub database: String,
    /// Where the match came from, for diagnostics (e.g. a file path).
    pub origin: Option<String>,
}

/// Report action label for call-edge rows.
pub const EXECUTE_ACTION: &str = "EXECUTE";
/// Report reason for a name the locator could not find.
pub const NOT_FOUND_REASON: &str = "Not found";
/// Report reason for a batch the front-end rejected.
pub const PARSE_FAILURE_REASON: &str = "Parse failure";

/// One flattened report row. Error rows carry the reason in `action` and an
/// empty `entity_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub has_dynamic_sql: bool,
    pub database_name: String,
    pub procedure_name: String,
    pub action: String,
    pub entity_name: String,
}

/// The aggregated run report. Rows accumulate monotonically in discovery
/// order; there is no rollback on partial failures.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// Flatten one (procedure, source-match) classification into rows,
    /// applying the database-qualification rule: an entity lacking a
    /// database qualifier is prefixed with the owning procedure's resolved
    /// database name.
    pub fn push_analysis(&mut self, procedure: &str, database: &str, analysis: &ProcedureAnalysis) {
        let procedure = display_procedure_name(procedure);
        let rows_before = self.rows.len();
        for action in SqlAction::ALL {
            for entity in analysis.entities(action) {
                self.rows.push(ReportRow {
                    has_dynamic_sql: analysis.has_dynamic_sql,
                    database_name: database.to_string(),
                    procedure_name: procedure.clone(),
                    action: action.label().to_string(),
                    entity_name: qualify(entity, database),
                });
            }
        }
        for callee in analysis.calls() {
            self.rows.push(ReportRow {
                has_dynamic_sql: analysis.has_dynamic_sql,
                database_name: database.to_string(),
                procedure_name: procedure.clone(),
                action: EXECUTE_ACTION.to_string(),
                entity_name: qualify(callee, database),
            });
        }
        if self.rows.len() == rows_before {
            // Keep a trace of procedures that touch nothing so the report
            // still accounts for every visited (procedure, match) pair and
            // a dynamic-only procedure keeps its flag visible.
            self.rows.push(ReportRow {
                has_dynamic_sql: analysis.has_dynamic_sql,
                database_name: database.to_string(),
                procedure_name: procedure,
                action: String::new(),
                entity_name: String::new(),
            });
        }
    }

    /// Record a non-fatal failure for a requested name.
    pub fn push_error(&mut self, procedure: &str, database: &str, reason: &str) {
        self.rows.push(ReportRow {
            has_dynamic_sql: false,
            database_name: database.to_string(),
            procedure_name: display_procedure_name(procedure),
            action: reason.to_string(),
            entity_name: String::new(),
        });
    }

    /// Names of every procedure with at least one row.
    pub fn procedures(&self) -> IndexSet<&str> {
        self.rows.iter().map(|r| r.procedure_name.as_str()).collect()
    }

    /// True when the run recorded at least one NotFound/ParseFailure row.
    pub fn has_failures(&self) -> bool {
        self.rows
            .iter()
            .any(|r| r.action == NOT_FOUND_REASON || r.action == PARSE_FAILURE_REASON)
    }
}

fn qualify(entity: &EntityName, database: &str) -> String {
    if database.is_empty() || entity.part_count() >= 3 {
        entity.display().to_string()
    } else {
        format!("{database}.{entity}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handles_brackets_and_quotes() {
        assert_eq!(split_qualified_name("[dbo].[Orders]"), vec!["dbo", "Orders"]);
        assert_eq!(split_qualified_name("dbo.Orders"), vec!["dbo", "Orders"]);
        assert_eq!(split_qualified_name("\"my.table\""), vec!["my.table"]);
        assert_eq!(split_qualified_name("Orders"), vec!["Orders"]);
    }

    #[test]
    fn split_skips_empty_segments() {
        assert_eq!(split_qualified_name("db..Orders"), vec!["db", "Orders"]);
    }

    #[test]
    fn normalize_strips_schema_and_case() {
        assert_eq!(normalize_procedure_name("[dbo].[GetOrders]"), "getorders");
        assert_eq!(normalize_procedure_name("GetOrders"), "getorders");
        assert_eq!(normalize_procedure_name("dbo.GetOrders"), "getorders");
    }

    #[test]
    fn entity_equality_is_case_insensitive() {
        assert_eq!(EntityName::parse("dbo.Orders"), EntityName::parse("DBO.ORDERS"));
    }

    #[test]
    fn temp_tables_are_suppressed() {
        assert!(EntityName::parse("#work").is_suppressed());
        assert!(EntityName::parse("tempdb.dbo.#work").is_suppressed());
        assert!(EntityName::parse("@rows").is_suppressed());
    }

    #[test]
    fn system_catalog_is_suppressed() {
        assert!(EntityName::parse("sys.objects").is_suppressed());
        assert!(EntityName::parse("master.sys.objects").is_suppressed());
        assert!(EntityName::parse("INFORMATION_SCHEMA.TABLES").is_suppressed());
        assert!(EntityName::parse("sysobjects").is_suppressed());
        assert!(!EntityName::parse("dbo.system_settings").is_suppressed());
        assert!(!EntityName::parse("SysAudit").is_suppressed());
    }

    #[test]
    fn add_collapses_duplicates_and_suppresses() {
        let mut analysis = ProcedureAnalysis::new();
        analysis.add(SqlAction::Select, EntityName::parse("dbo.Orders"));
        analysis.add(SqlAction::Select, EntityName::parse("DBO.ORDERS"));
        analysis.add(SqlAction::Select, EntityName::parse("#tmp"));
        let entities: Vec<_> = analysis.entities(SqlAction::Select).collect();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].display(), "dbo.Orders");
    }

    #[test]
    fn cte_suppression_removes_from_select_only() {
        let mut analysis = ProcedureAnalysis::new();
        analysis.add(SqlAction::Select, EntityName::parse("cte1"));
        analysis.add(SqlAction::Insert, EntityName::parse("cte1"));
        analysis.suppress_cte_names(["cte1"]);
        assert!(!analysis.contains(SqlAction::Select, "cte1"));
        assert!(analysis.contains(SqlAction::Insert, "cte1"));
    }

    #[test]
    fn qualification_prefixes_unqualified_names() {
        let mut analysis = ProcedureAnalysis::new();
        analysis.add(SqlAction::Select, EntityName::parse("dbo.Orders"));
        analysis.add(SqlAction::Select, EntityName::parse("Sales.dbo.Customers"));
        let mut report = Report::default();
        report.push_analysis("dbo.GetOrders", "Sales", &analysis);
        let entities: Vec<_> = report.rows.iter().map(|r| r.entity_name.as_str()).collect();
        assert_eq!(entities, vec!["Sales.dbo.Orders", "Sales.dbo.Customers"]);
    }

    #[test]
    fn error_rows_count_as_failures() {
        let mut report = Report::default();
        report.push_error("dbo.Missing", "", NOT_FOUND_REASON);
        assert!(report.has_failures());
        assert_eq!(report.rows[0].action, "Not found");
        assert_eq!(report.rows[0].entity_name, "");
    }

    #[test]
    fn report_serializes_camel_case() {
        let mut report = Report::default();
        report.push_error("p", "", NOT_FOUND_REASON);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("hasDynamicSql"));
        assert!(json.contains("procedureName"));
        assert!(json.contains("entityName"));
    }
}
