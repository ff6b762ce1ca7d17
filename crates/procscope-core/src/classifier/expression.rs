//! Boolean-expression and select-list traversal.
//!
//! Surfaces nested subqueries (scalar, IN-predicate, EXISTS) and function
//! calls anywhere in an expression tree. Subquery FROM tables are always
//! attributed to Select, regardless of the enclosing statement's action.
//! Function calls not on the built-in/aggregate allow-list are recorded as
//! Select entities, modeling inline user-defined table functions.

use super::{classify_query, StatementScope};
use crate::types::{EntityName, ProcedureAnalysis, SqlAction};
use sqlparser::ast::{Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments};
use std::collections::HashSet;
use std::sync::OnceLock;

pub(super) fn walk(analysis: &mut ProcedureAnalysis, scope: &mut StatementScope, expr: &Expr) {
    match expr {
        Expr::BinaryOp { left, right, .. } => {
            walk(analysis, scope, left);
            walk(analysis, scope, right);
        }
        Expr::UnaryOp { expr: inner, .. }
        | Expr::Nested(inner)
        | Expr::IsNull(inner)
        | Expr::IsNotNull(inner)
        | Expr::Cast { expr: inner, .. } => walk(analysis, scope, inner),
        Expr::Between {
            expr: inner,
            low,
            high,
            ..
        } => {
            walk(analysis, scope, inner);
            walk(analysis, scope, low);
            walk(analysis, scope, high);
        }
        Expr::Like {
            expr: inner,
            pattern,
            ..
        }
        | Expr::ILike {
            expr: inner,
            pattern,
            ..
        } => {
            walk(analysis, scope, inner);
            walk(analysis, scope, pattern);
        }
        Expr::InList {
            expr: inner, list, ..
        } => {
            walk(analysis, scope, inner);
            for item in list {
                walk(analysis, scope, item);
            }
        }
        Expr::InSubquery {
            expr: inner,
            subquery,
            ..
        } => {
            walk(analysis, scope, inner);
            classify_query(analysis, scope, subquery, SqlAction::Select);
        }
        Expr::Subquery(subquery) | Expr::Exists { subquery, .. } => {
            classify_query(analysis, scope, subquery, SqlAction::Select);
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(operand) = operand {
                walk(analysis, scope, operand);
            }
            for case_when in conditions {
                walk(analysis, scope, &case_when.condition);
                walk(analysis, scope, &case_when.result);
            }
            if let Some(else_result) = else_result {
                walk(analysis, scope, else_result);
            }
        }
        Expr::Function(func) => function_call(analysis, scope, func),
        _ => {}
    }
}

fn function_call(analysis: &mut ProcedureAnalysis, scope: &mut StatementScope, func: &Function) {
    let entity = EntityName::from_object_name(&func.name);
    if !is_builtin_function(entity.base_folded()) {
        analysis.add(SqlAction::Select, entity);
    }

    match &func.args {
        FunctionArguments::List(arg_list) => {
            for arg in &arg_list.args {
                match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
                    | FunctionArg::Named {
                        arg: FunctionArgExpr::Expr(expr),
                        ..
                    } => walk(analysis, scope, expr),
                    FunctionArg::ExprNamed { name, arg, .. } => {
                        walk(analysis, scope, name);
                        if let FunctionArgExpr::Expr(expr) = arg {
                            walk(analysis, scope, expr);
                        }
                    }
                    _ => {}
                }
            }
        }
        FunctionArguments::Subquery(query) => {
            classify_query(analysis, scope, query, SqlAction::Select);
        }
        FunctionArguments::None => {}
    }
}

/// Built-in and aggregate functions that never name a user entity.
fn is_builtin_function(base: &str) -> bool {
    static BUILTINS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    BUILTINS
        .get_or_init(|| {
            [
                // aggregates
                "avg",
                "checksum_agg",
                "count",
                "count_big",
                "grouping",
                "max",
                "min",
                "stdev",
                "stdevp",
                "string_agg",
                "sum",
                "var",
                "varp",
                // ranking / window
                "dense_rank",
                "first_value",
                "lag",
                "last_value",
                "lead",
                "ntile",
                "rank",
                "row_number",
                // date and time
                "datename",
                "dateadd",
                "datediff",
                "datepart",
                "day",
                "eomonth",
                "getdate",
                "getutcdate",
                "month",
                "sysdatetime",
                "sysutcdatetime",
                "year",
                // strings
                "ascii",
                "char",
                "charindex",
                "concat",
                "datalength",
                "format",
                "left",
                "len",
                "lower",
                "ltrim",
                "nchar",
                "patindex",
                "quotename",
                "replace",
                "replicate",
                "reverse",
                "right",
                "rtrim",
                "space",
                "stuff",
                "substring",
                "trim",
                "unicode",
                "upper",
                // conversion and null handling
                "cast",
                "choose",
                "coalesce",
                "convert",
                "iif",
                "isnull",
                "nullif",
                "try_cast",
                "try_convert",
                // math
                "abs",
                "ceiling",
                "exp",
                "floor",
                "log",
                "log10",
                "pi",
                "power",
                "rand",
                "round",
                "sign",
                "sqrt",
                "square",
                // metadata and system
                "checksum",
                "db_name",
                "error_message",
                "error_number",
                "error_severity",
                "error_state",
                "hashbytes",
                "ident_current",
                "isdate",
                "isnumeric",
                "newid",
                "newsequentialid",
                "object_id",
                "scope_identity",
                "suser_sname",
                "user_name",
            ]
            .into_iter()
            .collect()
        })
        .contains(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_is_case_insensitive_via_folded_base() {
        assert!(is_builtin_function("count"));
        assert!(is_builtin_function("getdate"));
        assert!(!is_builtin_function("fn_split"));
    }
}
