//! CLI argument parsing using clap.

use bistool::openapi::Dialect;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// bistool - API docs and regression tests from real requests
#[derive(Parser, Debug)]
#[command(name = "bistool")]
#[command(about = "Generate API specs and run regression tests from saved sessions", long_about = None)]
#[command(version)]
pub struct Args {
    /// JSON configuration file
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the project store (overrides config)
    #[arg(long, value_name = "DIR", global = true)]
    pub store_root: Option<PathBuf>,

    /// Project id (overrides config)
    #[arg(short, long, global = true)]
    pub project: Option<String>,

    /// Environment suffix used when resolving variables (overrides project settings)
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// Log filter, e.g. `info` or `bistool=debug` (RUST_LOG wins when set)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List saved sessions
    Sessions,

    /// Save a new session for METHOD URL
    Add {
        /// Session name
        name: String,
        /// HTTP method
        method: String,
        /// Request URL; `{name}` or `:name` path pieces become dynamic segments
        url: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Set a global variable, or a session-shared one with --session
    SetVar {
        key: String,
        value: String,
        #[arg(long, value_name = "SESSION")]
        session: Option<String>,
    },

    /// Generate the spec for a session
    Generate {
        /// Session id or name
        session: String,
        /// JSON file used as the response sample
        #[arg(long, value_name = "FILE", conflicts_with = "live")]
        sample: Option<PathBuf>,
        /// Output dialect (defaults to the project's spec version)
        #[arg(short, long, value_enum)]
        dialect: Option<DialectArg>,
        /// Send the request and use the live response as the sample
        #[arg(long)]
        live: bool,
        /// Output file (defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Run every test of a session
    Test {
        /// Session id or name
        session: String,
    },

    /// Write saved sessions to a transfer file, with variable values blanked
    Export {
        file: PathBuf,
    },

    /// Read sessions from a transfer file
    Import {
        file: PathBuf,
        #[arg(long, default_value = "merge", value_enum)]
        strategy: StrategyArg,
        /// Only import these session ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DialectArg {
    /// 0.9.7.1
    Legacy,
    /// Swagger 2.0
    Swagger2,
    /// OpenAPI 3.0
    Openapi3,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Legacy => Dialect::Legacy,
            DialectArg::Swagger2 => Dialect::Swagger2,
            DialectArg::Openapi3 => Dialect::OpenApi3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Skip sessions whose id or name already exists
    Merge,
    /// Replace all saved sessions
    Override,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_args() {
        let args = Args::parse_from(["bistool", "-p", "shop", "generate", "Get user", "-d", "swagger2"]);
        assert_eq!(args.project.as_deref(), Some("shop"));
        match args.command {
            Command::Generate { session, dialect, live, .. } => {
                assert_eq!(session, "Get user");
                assert!(matches!(dialect, Some(DialectArg::Swagger2)));
                assert!(!live);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_import_select_list() {
        let args = Args::parse_from(["bistool", "import", "in.json", "--select", "a,b"]);
        match args.command {
            Command::Import { strategy, select, .. } => {
                assert_eq!(strategy, StrategyArg::Merge);
                assert_eq!(select, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_sample_conflicts_with_live() {
        let result = Args::try_parse_from(["bistool", "generate", "s", "--sample", "x.json", "--live"]);
        assert!(result.is_err());
    }
}
