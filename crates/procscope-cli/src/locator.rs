//! File-system source locator.
//!
//! Walks a root directory of `.sql` files once, splits each file on GO
//! batch separators, and indexes every CREATE/ALTER PROCEDURE batch by its
//! normalized base name. Lookups after construction never touch the disk,
//! so resolution cannot fail on I/O mid-run.

use procscope_core::{
    normalize_procedure_name, procedure_batch_name, use_database_name, SourceLocator, SourceMatch,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("source root is not a directory: {0}")]
    RootMissing(PathBuf),
}

#[derive(Debug)]
pub struct FileSourceLocator {
    index: HashMap<String, Vec<SourceMatch>>,
    file_count: usize,
}

impl FileSourceLocator {
    /// Build the index. Unreadable files are reported on stderr and
    /// skipped; only a missing root is fatal.
    pub fn new(root: &Path) -> Result<Self, LocatorError> {
        if !root.is_dir() {
            return Err(LocatorError::RootMissing(root.to_path_buf()));
        }

        let mut index: HashMap<String, Vec<SourceMatch>> = HashMap::new();
        let mut file_count = 0;

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    eprintln!("procscope: warning: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
            {
                continue;
            }
            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(err) => {
                    eprintln!(
                        "procscope: warning: failed to read {}: {err}",
                        path.display()
                    );
                    continue;
                }
            };
            file_count += 1;
            index_file(&mut index, root, path, &content);
        }

        Ok(Self { index, file_count })
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn procedure_count(&self) -> usize {
        self.index.values().map(Vec::len).sum()
    }
}

impl SourceLocator for FileSourceLocator {
    fn locate(&self, procedure: &str) -> Vec<SourceMatch> {
        self.index
            .get(&normalize_procedure_name(procedure))
            .cloned()
            .unwrap_or_default()
    }
}

fn index_file(
    index: &mut HashMap<String, Vec<SourceMatch>>,
    root: &Path,
    path: &Path,
    content: &str,
) {
    // Strip UTF-8 BOM if present
    let content = content.strip_prefix('\u{FEFF}').unwrap_or(content);

    // Database resolution: the nearest preceding USE batch wins; before any
    // USE, the first path component under the root stands in for corpus
    // layouts with one directory per database.
    let mut database = default_database_for(root, path);

    for batch in split_batches(content) {
        if let Some(db) = use_database_name(batch) {
            database = db;
            continue;
        }
        if let Some(name) = procedure_batch_name(batch) {
            index
                .entry(normalize_procedure_name(&name))
                .or_default()
                .push(SourceMatch {
                    batch: batch.to_string(),
                    database: database.clone(),
                    origin: Some(path.display().to_string()),
                });
        }
    }
}

fn default_database_for(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .ok()
        .and_then(Path::parent)
        .and_then(|parent| parent.components().next())
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Split file content on GO batch separators. GO must be on its own line
/// (optionally with whitespace or a trailing semicolon).
fn split_batches(content: &str) -> Vec<&str> {
    let mut batches = Vec::new();
    let mut current_pos = 0;
    let mut batch_start = 0;

    for line in content.lines() {
        let trimmed = line.trim();
        let line_end = current_pos + line.len();
        let next_pos = if content[line_end..].starts_with("\r\n") {
            line_end + 2
        } else if content[line_end..].starts_with('\n') {
            line_end + 1
        } else {
            line_end
        };

        if trimmed.eq_ignore_ascii_case("go") || trimmed.eq_ignore_ascii_case("go;") {
            if current_pos > batch_start {
                batches.push(&content[batch_start..current_pos]);
            }
            batch_start = next_pos;
        }

        current_pos = next_pos;
    }

    if batch_start < content.len() {
        batches.push(&content[batch_start..]);
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_batches_on_go() {
        let content = "SELECT 1\nGO\nSELECT 2\ngo;\nSELECT 3";
        let batches = split_batches(content);
        assert_eq!(batches.len(), 3);
        assert!(batches[0].contains("SELECT 1"));
        assert!(batches[1].contains("SELECT 2"));
        assert!(batches[2].contains("SELECT 3"));
    }

    #[test]
    fn test_split_batches_no_go() {
        let batches = split_batches("SELECT 1\nSELECT 2");
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn test_go_requires_its_own_line() {
        let batches = split_batches("SELECT category FROM t\nGO\n");
        assert_eq!(batches.len(), 1);
        assert!(batches[0].contains("category"));
    }

    #[test]
    fn test_default_database_from_path() {
        let root = Path::new("/corpus");
        assert_eq!(
            default_database_for(root, Path::new("/corpus/SalesDb/procs/a.sql")),
            "SalesDb"
        );
        assert_eq!(default_database_for(root, Path::new("/corpus/a.sql")), "");
    }
}
