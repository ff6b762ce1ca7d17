//! AST-driven entity classification.
//!
//! One parsed batch goes in; one [`ProcedureAnalysis`] comes out: per-action
//! entity sets, call edges, and the dynamic-SQL flag. Traversal is
//! synchronous recursive descent over the `sqlparser` AST with exhaustive
//! pattern matching per node kind; constructs outside the model fall into
//! wildcard arms and are skipped, never errors.

mod expression;

use crate::parser::{AuxiliaryStatement, ParsedBatch};
use crate::types::{EntityName, ProcedureAnalysis, SqlAction};
use indexmap::IndexSet;
use sqlparser::ast::{
    Assignment, Delete, Expr, FromTable, Insert, JoinConstraint, JoinOperator, MergeAction,
    MergeClause, MergeInsertKind, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins,
    UpdateTableFromKind,
};
use std::collections::{HashMap, HashSet};

/// Per-statement resolution scope. Alias bindings never persist across
/// statements; CTE names are collected for Select-set suppression once the
/// outer query has been processed.
#[derive(Debug, Default)]
struct StatementScope {
    /// alias (folded) -> underlying entity display name. First binding wins,
    /// matching left-to-right FROM processing.
    aliases: HashMap<String, String>,
    /// Derived-table/subquery aliases (folded); these never resolve to an
    /// entity name.
    derived_aliases: HashSet<String>,
    /// Names introduced by WITH clauses, in order of appearance.
    cte_names: IndexSet<String>,
}

impl StatementScope {
    fn bind_alias(&mut self, alias: &str, entity: &EntityName) {
        self.aliases
            .entry(alias.to_lowercase())
            .or_insert_with(|| entity.display().to_string());
    }

    fn bind_derived_alias(&mut self, alias: &str) {
        self.derived_aliases.insert(alias.to_lowercase());
    }

    fn add_cte(&mut self, name: &str) {
        self.cte_names.insert(name.to_string());
    }

    /// Resolve a DML target through the captured alias bindings, falling
    /// back to the literal name. Only bare single-part identifiers can be
    /// aliases.
    fn resolve_target(&self, raw: &str) -> EntityName {
        let literal = EntityName::parse(raw);
        if literal.part_count() == 1 && !self.derived_aliases.contains(literal.folded()) {
            if let Some(underlying) = self.aliases.get(literal.folded()) {
                return EntityName::parse(underlying);
            }
        }
        literal
    }
}

/// Classify one parsed batch into a [`ProcedureAnalysis`].
pub fn classify_batch(batch: &ParsedBatch) -> ProcedureAnalysis {
    let mut analysis = ProcedureAnalysis::new();
    for statement in &batch.statements {
        let mut scope = StatementScope::default();
        classify_statement(&mut analysis, &mut scope, statement);
        // A CTE reference is a local alias, not a persisted entity.
        analysis.suppress_cte_names(scope.cte_names.iter().map(|s| s.as_str()));
    }
    for auxiliary in &batch.auxiliaries {
        apply_auxiliary(&mut analysis, auxiliary);
    }
    analysis
}

fn classify_statement(
    analysis: &mut ProcedureAnalysis,
    scope: &mut StatementScope,
    statement: &Statement,
) {
    match statement {
        Statement::Query(query) => {
            classify_query(analysis, scope, query, SqlAction::Select);
        }
        Statement::Insert(insert) => classify_insert(analysis, scope, insert),
        Statement::Update {
            table,
            assignments,
            from,
            selection,
            ..
        } => classify_update(analysis, scope, table, assignments, from, selection),
        Statement::Delete(delete) => classify_delete(analysis, scope, delete),
        Statement::Merge {
            table,
            source,
            on,
            clauses,
            ..
        } => classify_merge(analysis, scope, table, source, on, clauses),
        _ => {}
    }
}

fn classify_query(
    analysis: &mut ProcedureAnalysis,
    scope: &mut StatementScope,
    query: &sqlparser::ast::Query,
    action: SqlAction,
) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            scope.add_cte(&cte.alias.name.value);
            classify_query(analysis, scope, &cte.query, SqlAction::Select);
        }
    }
    classify_set_expr(analysis, scope, &query.body, action);
}

fn classify_set_expr(
    analysis: &mut ProcedureAnalysis,
    scope: &mut StatementScope,
    body: &SetExpr,
    action: SqlAction,
) {
    match body {
        SetExpr::Select(select) => {
            for table_with_joins in &select.from {
                classify_table_with_joins(analysis, scope, table_with_joins, action);
            }
            for item in &select.projection {
                if let SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } =
                    item
                {
                    expression::walk(analysis, scope, expr);
                }
            }
            if let Some(selection) = &select.selection {
                expression::walk(analysis, scope, selection);
            }
            if let Some(having) = &select.having {
                expression::walk(analysis, scope, having);
            }
        }
        SetExpr::Query(query) => classify_query(analysis, scope, query, action),
        SetExpr::SetOperation { left, right, .. } => {
            classify_set_expr(analysis, scope, left, action);
            classify_set_expr(analysis, scope, right, action);
        }
        SetExpr::Values(values) => {
            for row in &values.rows {
                for expr in row {
                    expression::walk(analysis, scope, expr);
                }
            }
        }
        SetExpr::Table(table) => {
            if let Some(name) = &table.table_name {
                analysis.add(action, EntityName::parse(name));
            }
        }
        SetExpr::Insert(statement)
        | SetExpr::Update(statement)
        | SetExpr::Delete(statement)
        | SetExpr::Merge(statement) => classify_statement(analysis, scope, statement),
    }
}

fn classify_table_with_joins(
    analysis: &mut ProcedureAnalysis,
    scope: &mut StatementScope,
    table_with_joins: &TableWithJoins,
    action: SqlAction,
) {
    classify_table_factor(analysis, scope, &table_with_joins.relation, action);
    for join in &table_with_joins.joins {
        // In a qualified join the second side is always a read; unqualified
        // joins keep the outer statement's action for both sides.
        let side_action = if is_qualified_join(&join.join_operator) {
            SqlAction::Select
        } else {
            action
        };
        classify_table_factor(analysis, scope, &join.relation, side_action);
        if let Some(JoinConstraint::On(on_expr)) = join_constraint(&join.join_operator) {
            expression::walk(analysis, scope, on_expr);
        }
    }
}

fn join_constraint(operator: &JoinOperator) -> Option<&JoinConstraint> {
    match operator {
        JoinOperator::Join(c)
        | JoinOperator::Inner(c)
        | JoinOperator::Left(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::Right(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c)
        | JoinOperator::CrossJoin(c)
        | JoinOperator::Semi(c)
        | JoinOperator::LeftSemi(c)
        | JoinOperator::RightSemi(c)
        | JoinOperator::Anti(c)
        | JoinOperator::LeftAnti(c)
        | JoinOperator::RightAnti(c)
        | JoinOperator::StraightJoin(c) => Some(c),
        JoinOperator::AsOf { constraint, .. } => Some(constraint),
        JoinOperator::CrossApply | JoinOperator::OuterApply => None,
    }
}

fn is_qualified_join(operator: &JoinOperator) -> bool {
    matches!(
        join_constraint(operator),
        Some(JoinConstraint::On(_)) | Some(JoinConstraint::Using(_))
    )
}

fn classify_table_factor(
    analysis: &mut ProcedureAnalysis,
    scope: &mut StatementScope,
    factor: &TableFactor,
    action: SqlAction,
) {
    match factor {
        TableFactor::Table {
            name, alias, args, ..
        } => {
            let entity = EntityName::from_object_name(name);
            if args.is_some() {
                // A table reference carrying arguments is an inline
                // table-valued function call.
                analysis.add(SqlAction::Select, entity.clone());
            } else {
                analysis.add(action, entity.clone());
            }
            if let Some(alias) = alias {
                scope.bind_alias(&alias.name.value, &entity);
            }
        }
        TableFactor::Derived {
            subquery, alias, ..
        } => {
            classify_query(analysis, scope, subquery, SqlAction::Select);
            if let Some(alias) = alias {
                scope.bind_derived_alias(&alias.name.value);
            }
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            classify_table_with_joins(analysis, scope, table_with_joins, action);
        }
        TableFactor::Pivot { table, .. } | TableFactor::Unpivot { table, .. } => {
            classify_table_factor(analysis, scope, table, action);
        }
        TableFactor::Function { name, .. } => {
            analysis.add(SqlAction::Select, EntityName::from_object_name(name));
        }
        _ => {}
    }
}

fn classify_insert(analysis: &mut ProcedureAnalysis, scope: &mut StatementScope, insert: &Insert) {
    // The source select is classified first so its alias bindings are
    // available for target resolution.
    if let Some(source) = &insert.source {
        classify_query(analysis, scope, source, SqlAction::Select);
    }
    for assignment in &insert.assignments {
        expression::walk(analysis, scope, &assignment.value);
    }
    let target = scope.resolve_target(&insert.table.to_string());
    analysis.add(SqlAction::Insert, target);
}

fn classify_update(
    analysis: &mut ProcedureAnalysis,
    scope: &mut StatementScope,
    table: &TableWithJoins,
    assignments: &[Assignment],
    from: &Option<UpdateTableFromKind>,
    selection: &Option<Expr>,
) {
    // FROM first: it introduces the alias bindings the target resolves
    // through.
    if let Some(from_kind) = from {
        let tables = match from_kind {
            UpdateTableFromKind::BeforeSet(tables) | UpdateTableFromKind::AfterSet(tables) => {
                tables
            }
        };
        for table_with_joins in tables {
            classify_table_with_joins(analysis, scope, table_with_joins, SqlAction::Update);
        }
    }

    match &table.relation {
        TableFactor::Table { name, alias, .. } => {
            let target = scope.resolve_target(&name.to_string());
            analysis.add(SqlAction::Update, target.clone());
            if let Some(alias) = alias {
                scope.bind_alias(&alias.name.value, &target);
            }
        }
        other => classify_table_factor(analysis, scope, other, SqlAction::Update),
    }
    for join in &table.joins {
        let side_action = if is_qualified_join(&join.join_operator) {
            SqlAction::Select
        } else {
            SqlAction::Update
        };
        classify_table_factor(analysis, scope, &join.relation, side_action);
        if let Some(JoinConstraint::On(on_expr)) = join_constraint(&join.join_operator) {
            expression::walk(analysis, scope, on_expr);
        }
    }

    for assignment in assignments {
        expression::walk(analysis, scope, &assignment.value);
    }
    if let Some(selection) = selection {
        expression::walk(analysis, scope, selection);
    }
}

fn classify_delete(analysis: &mut ProcedureAnalysis, scope: &mut StatementScope, delete: &Delete) {
    let from_tables = match &delete.from {
        FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
    };
    for table_with_joins in from_tables {
        classify_table_with_joins(analysis, scope, table_with_joins, SqlAction::Delete);
    }
    if let Some(using) = &delete.using {
        for table_with_joins in using {
            classify_table_with_joins(analysis, scope, table_with_joins, SqlAction::Select);
        }
    }
    // Multi-table form: DELETE a FROM ... resolves the alias targets.
    for target in &delete.tables {
        analysis.add(SqlAction::Delete, scope.resolve_target(&target.to_string()));
    }
    if let Some(selection) = &delete.selection {
        expression::walk(analysis, scope, selection);
    }
}

fn classify_merge(
    analysis: &mut ProcedureAnalysis,
    scope: &mut StatementScope,
    table: &TableFactor,
    source: &TableFactor,
    on: &Expr,
    clauses: &[MergeClause],
) {
    let target = match table {
        TableFactor::Table { name, alias, .. } => {
            let entity = EntityName::from_object_name(name);
            analysis.add(SqlAction::Merge, entity.clone());
            if let Some(alias) = alias {
                scope.bind_alias(&alias.name.value, &entity);
            }
            Some(entity)
        }
        other => {
            classify_table_factor(analysis, scope, other, SqlAction::Merge);
            None
        }
    };

    match source {
        TableFactor::Table {
            name, alias, args, ..
        } => {
            let entity = EntityName::from_object_name(name);
            if args.is_some() {
                analysis.add(SqlAction::Select, entity.clone());
            } else {
                analysis.add(SqlAction::Merge, entity.clone());
            }
            if let Some(alias) = alias {
                scope.bind_alias(&alias.name.value, &entity);
            }
        }
        other => classify_table_factor(analysis, scope, other, SqlAction::Select),
    }

    expression::walk(analysis, scope, on);

    for clause in clauses {
        if let Some(predicate) = &clause.predicate {
            expression::walk(analysis, scope, predicate);
        }
        match &clause.action {
            MergeAction::Insert(insert_expr) => {
                if let Some(target) = &target {
                    analysis.add(SqlAction::Insert, target.clone());
                }
                if let MergeInsertKind::Values(values) = &insert_expr.kind {
                    for row in &values.rows {
                        for expr in row {
                            expression::walk(analysis, scope, expr);
                        }
                    }
                }
            }
            MergeAction::Update { assignments } => {
                if let Some(target) = &target {
                    analysis.add(SqlAction::Update, target.clone());
                }
                for assignment in assignments {
                    expression::walk(analysis, scope, &assignment.value);
                }
            }
            MergeAction::Delete => {
                if let Some(target) = &target {
                    analysis.add(SqlAction::Delete, target.clone());
                }
            }
        }
    }
}

fn apply_auxiliary(analysis: &mut ProcedureAnalysis, auxiliary: &AuxiliaryStatement) {
    match auxiliary {
        AuxiliaryStatement::Execute { name } => {
            let entity = EntityName::parse(name);
            match entity.base_folded() {
                // The dynamic-SQL execution primitive: flag, no call edge.
                "sp_executesql" => analysis.has_dynamic_sql = true,
                // Rename utility: ignored entirely.
                "sp_rename" => {}
                _ => analysis.add_call(entity),
            }
        }
        AuxiliaryStatement::DynamicExecute => analysis.has_dynamic_sql = true,
        AuxiliaryStatement::Insert { target } => {
            analysis.add(SqlAction::Insert, EntityName::parse(target));
        }
        AuxiliaryStatement::BulkInsert { target } => {
            analysis.add(SqlAction::BulkInsert, EntityName::parse(target));
        }
        AuxiliaryStatement::UpdateStatistics { target } => {
            analysis.add(SqlAction::UpdateStatistics, EntityName::parse(target));
        }
        AuxiliaryStatement::UpdateText { column, bulk } => {
            // The first segment of the target column's multi-part identifier
            // names the entity.
            if let Some(first) = column.first() {
                let action = if *bulk {
                    SqlAction::UpdateTextBulk
                } else {
                    SqlAction::UpdateText
                };
                analysis.add(action, EntityName::parse(first));
            }
        }
        AuxiliaryStatement::Truncate { target } => {
            analysis.add(SqlAction::Truncate, EntityName::parse(target));
        }
    }
}
