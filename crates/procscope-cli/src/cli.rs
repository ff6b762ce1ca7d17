//! CLI argument parsing using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Procscope - stored-procedure dependency auditor
#[derive(Parser, Debug)]
#[command(name = "procscope")]
#[command(about = "Report the entities each stored procedure reads or writes", long_about = None)]
#[command(version)]
pub struct Args {
    /// Procedure names to analyze (optionally schema/bracket-decorated)
    #[arg(value_name = "PROCEDURES")]
    pub procedures: Vec<String>,

    /// Root directory of the stored-procedure source tree
    #[arg(short, long, value_name = "DIR")]
    pub root: PathBuf,

    /// File with one procedure name per line ('#' starts a comment)
    #[arg(short, long, value_name = "FILE")]
    pub list: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Suppress warnings on stderr
    #[arg(short, long)]
    pub quiet: bool,

    /// Compact JSON output (no pretty-printing)
    #[arg(short, long)]
    pub compact: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON output
    Json,
    /// CSV output
    Csv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_args() {
        let args = Args::parse_from(["procscope", "--root", "sql", "dbo.GetOrders"]);
        assert_eq!(args.procedures, vec!["dbo.GetOrders"]);
        assert_eq!(args.root.to_str().unwrap(), "sql");
        assert_eq!(args.format, OutputFormat::Table);
        assert!(args.list.is_none());
        assert!(!args.quiet);
    }

    #[test]
    fn test_parse_full_args() {
        let args = Args::parse_from([
            "procscope",
            "-r",
            "sql",
            "-l",
            "procs.txt",
            "-f",
            "json",
            "-o",
            "report.json",
            "--quiet",
            "--compact",
            "ProcA",
            "ProcB",
        ]);
        assert_eq!(args.root.to_str().unwrap(), "sql");
        assert_eq!(args.list.unwrap().to_str().unwrap(), "procs.txt");
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.output.unwrap().to_str().unwrap(), "report.json");
        assert!(args.quiet);
        assert!(args.compact);
        assert_eq!(args.procedures.len(), 2);
    }

    #[test]
    fn test_root_is_required() {
        let result = Args::try_parse_from(["procscope", "dbo.GetOrders"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_csv_format() {
        let args = Args::parse_from(["procscope", "-r", "sql", "-f", "csv", "P"]);
        assert_eq!(args.format, OutputFormat::Csv);
    }
}
