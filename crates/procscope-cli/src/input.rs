//! Input-list handling.

use anyhow::{Context, Result};
use std::path::Path;

/// Read the procedure input list: one name per line, blank lines and
/// `#`-prefixed comment lines ignored. A missing file is a fatal
/// precondition, checked before any processing starts.
pub fn read_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read procedure list: {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_list_skips_blanks_and_comments() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# audit set").unwrap();
        writeln!(file, "dbo.GetOrders").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  [dbo].[SyncAccounts]  ").unwrap();

        let names = read_list(file.path()).unwrap();
        assert_eq!(names, vec!["dbo.GetOrders", "[dbo].[SyncAccounts]"]);
    }

    #[test]
    fn test_read_missing_list_is_an_error() {
        let result = read_list(Path::new("/nonexistent/procs.txt"));
        assert!(result.is_err());
    }
}
