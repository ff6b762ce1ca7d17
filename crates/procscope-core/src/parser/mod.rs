//! SQL front-end: batch text → parsed statements plus auxiliary records.
//!
//! Parsing runs in two stages. The preprocessing pass (see [`preprocess`])
//! extracts the T-SQL statements `sqlparser`'s grammar does not cover and
//! reduces a CREATE/ALTER PROCEDURE batch to its body; what remains is
//! handed to `sqlparser` with the MsSql dialect. Any parse error means the
//! batch is unanalyzable and is surfaced per source match, never as a fatal
//! run error.

mod preprocess;

pub use preprocess::{preprocess, AuxiliaryStatement, Preprocessed};

use crate::error::ParseError;
use sqlparser::ast::Statement;
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

/// One fully parsed statement batch.
#[derive(Debug)]
pub struct ParsedBatch {
    pub statements: Vec<Statement>,
    pub auxiliaries: Vec<AuxiliaryStatement>,
}

/// Parse one statement batch (a bare statement sequence or a full
/// CREATE/ALTER PROCEDURE definition).
pub fn parse_batch(batch: &str) -> Result<ParsedBatch, ParseError> {
    let pre = preprocess(batch);
    let statements = Parser::parse_sql(&MsSqlDialect {}, &pre.sql)?;
    Ok(ParsedBatch {
        statements,
        auxiliaries: pre.auxiliaries,
    })
}

/// Scan a batch for the name declared by its CREATE/ALTER [OR ALTER]
/// PROC[EDURE] statement. Returns the decoration-stripped multi-part name.
pub fn procedure_batch_name(batch: &str) -> Option<String> {
    let words = significant_words(batch)?;
    let mut iter = words.iter();

    let first = iter.next()?;
    if !first.text.eq_ignore_ascii_case("CREATE") && !first.text.eq_ignore_ascii_case("ALTER") {
        return None;
    }
    let mut word = iter.next()?;
    if word.text.eq_ignore_ascii_case("OR") {
        word = iter.next()?;
        if !word.text.eq_ignore_ascii_case("ALTER") {
            return None;
        }
        word = iter.next()?;
    }
    if !word.text.eq_ignore_ascii_case("PROC") && !word.text.eq_ignore_ascii_case("PROCEDURE") {
        return None;
    }

    let mut parts = Vec::new();
    let mut expect_part = true;
    for word in iter {
        match (&word.kind, expect_part) {
            (WordKind::Identifier, true) => {
                if word.text.starts_with('@') {
                    break;
                }
                parts.push(word.text.clone());
                expect_part = false;
            }
            (WordKind::Period, false) => expect_part = true,
            _ => break,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

/// If the batch is a `USE <database>` statement, return the database name.
pub fn use_database_name(batch: &str) -> Option<String> {
    let words = significant_words(batch)?;
    let mut iter = words.iter();
    let first = iter.next()?;
    if !first.text.eq_ignore_ascii_case("USE") {
        return None;
    }
    let name = iter.next()?;
    match name.kind {
        WordKind::Identifier => Some(name.text.clone()),
        _ => None,
    }
}

#[derive(Debug, PartialEq)]
enum WordKind {
    Identifier,
    Period,
    Other,
}

struct ScannedWord {
    text: String,
    kind: WordKind,
}

fn significant_words(batch: &str) -> Option<Vec<ScannedWord>> {
    let dialect = MsSqlDialect {};
    let tokens = Tokenizer::new(&dialect, batch).tokenize().ok()?;
    Some(
        tokens
            .into_iter()
            .filter(|t| !matches!(t, Token::Whitespace(_)))
            .map(|t| match t {
                Token::Word(w) => ScannedWord {
                    text: w.value,
                    kind: WordKind::Identifier,
                },
                Token::Period => ScannedWord {
                    text: ".".to_string(),
                    kind: WordKind::Period,
                },
                other => ScannedWord {
                    text: other.to_string(),
                    kind: WordKind::Other,
                },
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_select() {
        let batch = parse_batch("SELECT * FROM dbo.Users").unwrap();
        assert_eq!(batch.statements.len(), 1);
        assert!(batch.auxiliaries.is_empty());
    }

    #[test]
    fn test_parse_invalid_sql() {
        assert!(parse_batch("SELECT * FROM").is_err());
    }

    #[test]
    fn test_parse_multiple_statements() {
        let batch = parse_batch("SELECT * FROM dbo.Users; SELECT * FROM dbo.Orders;").unwrap();
        assert_eq!(batch.statements.len(), 2);
    }

    #[test]
    fn test_parse_empty_batch() {
        let batch = parse_batch("").unwrap();
        assert!(batch.statements.is_empty());
    }

    #[test]
    fn test_parse_procedure_body() {
        let batch = parse_batch(
            "CREATE PROCEDURE dbo.GetOrders @CustomerId INT AS BEGIN SELECT * FROM dbo.Orders WHERE CustomerId = @CustomerId; END",
        )
        .unwrap();
        assert_eq!(batch.statements.len(), 1);
    }

    #[test]
    fn test_parse_exec_only_batch() {
        let batch = parse_batch("CREATE PROCEDURE dbo.ProcA AS EXEC dbo.ProcB;").unwrap();
        assert!(batch.statements.is_empty());
        assert_eq!(batch.auxiliaries.len(), 1);
    }

    #[test]
    fn test_parse_error_carries_position() {
        let err = parse_batch("SELECT * FROM dbo.Users WHERE").unwrap_err();
        assert!(!err.message.is_empty());
    }

    #[test]
    fn procedure_name_from_create() {
        assert_eq!(
            procedure_batch_name("CREATE PROCEDURE dbo.GetOrders AS SELECT 1;"),
            Some("dbo.GetOrders".to_string())
        );
    }

    #[test]
    fn procedure_name_from_bracketed_alter() {
        assert_eq!(
            procedure_batch_name("ALTER PROC [dbo].[Get Orders] AS SELECT 1;"),
            Some("dbo.Get Orders".to_string())
        );
    }

    #[test]
    fn procedure_name_from_create_or_alter() {
        assert_eq!(
            procedure_batch_name("CREATE OR ALTER PROCEDURE Audit AS SELECT 1;"),
            Some("Audit".to_string())
        );
    }

    #[test]
    fn procedure_name_requires_procedure_keyword() {
        assert_eq!(procedure_batch_name("CREATE TABLE dbo.T (Id INT)"), None);
        assert_eq!(procedure_batch_name("SELECT * FROM dbo.T"), None);
    }

    #[test]
    fn procedure_name_stops_at_parameters() {
        assert_eq!(
            procedure_batch_name("CREATE PROCEDURE dbo.P @a INT AS SELECT 1;"),
            Some("dbo.P".to_string())
        );
    }

    #[test]
    fn use_statement_yields_database() {
        assert_eq!(use_database_name("USE [SalesDb]"), Some("SalesDb".to_string()));
        assert_eq!(use_database_name("use master;"), Some("master".to_string()));
        assert_eq!(use_database_name("SELECT 1"), None);
    }
}
