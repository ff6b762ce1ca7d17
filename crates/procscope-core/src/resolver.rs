//! Transitive call-graph resolution.
//!
//! Given requested procedure names, the resolver drives repeated
//! Locator→Front-End→Classifier cycles, expanding discovered call edges
//! depth-first. A run-scoped VisitedSet of normalized names guards both
//! reprocessing and cycles; there is no recursion-depth limit. All state is
//! held in an explicit per-run context, never a global.

use crate::classifier::classify_batch;
use crate::error::ParseError;
use crate::parser::parse_batch;
use crate::types::{
    normalize_procedure_name, Report, SourceMatch, NOT_FOUND_REASON, PARSE_FAILURE_REASON,
};
use std::collections::HashSet;
#[cfg(feature = "tracing")]
use tracing::debug;

/// Maps a procedure name to its source matches. A single lookup may return
/// multiple matches (the same base name defined in several files); every
/// match is classified independently.
pub trait SourceLocator {
    fn locate(&self, procedure: &str) -> Vec<SourceMatch>;
}

/// A batch the front-end rejected, kept alongside the report row for
/// diagnostics.
#[derive(Debug)]
pub struct ResolveFailure {
    pub procedure: String,
    pub origin: Option<String>,
    pub error: ParseError,
}

/// Result of one resolver run.
#[derive(Debug, Default)]
pub struct ResolveOutcome {
    pub report: Report,
    pub failures: Vec<ResolveFailure>,
}

struct RunContext {
    visited: HashSet<String>,
    outcome: ResolveOutcome,
}

/// Resolve the requested names and every procedure transitively reachable
/// through their call edges. Each resolvable name is visited exactly once;
/// duplicates in the input collapse.
pub fn resolve(locator: &dyn SourceLocator, requested: &[String]) -> ResolveOutcome {
    let mut run = RunContext {
        visited: HashSet::new(),
        outcome: ResolveOutcome::default(),
    };
    for name in requested {
        resolve_name(locator, &mut run, name);
    }
    run.outcome
}

fn resolve_name(locator: &dyn SourceLocator, run: &mut RunContext, requested: &str) {
    let key = normalize_procedure_name(requested);
    if key.is_empty() || !run.visited.insert(key) {
        return;
    }
    #[cfg(feature = "tracing")]
    debug!(procedure = requested, "resolving");

    let matches = locator.locate(requested);
    if matches.is_empty() {
        run.outcome.report.push_error(requested, "", NOT_FOUND_REASON);
        return;
    }

    for source_match in matches {
        match parse_batch(&source_match.batch) {
            Ok(parsed) => {
                let analysis = classify_batch(&parsed);
                run.outcome
                    .report
                    .push_analysis(requested, &source_match.database, &analysis);
                // Depth-first: each discovered edge is expanded before the
                // next requested name advances.
                let callees: Vec<String> =
                    analysis.calls().map(|c| c.display().to_string()).collect();
                for callee in callees {
                    resolve_name(locator, run, &callee);
                }
            }
            Err(error) => {
                run.outcome
                    .report
                    .push_error(requested, &source_match.database, PARSE_FAILURE_REASON);
                run.outcome.failures.push(ResolveFailure {
                    procedure: requested.to_string(),
                    origin: source_match.origin.clone(),
                    error,
                });
            }
        }
    }
}
