//! CLI argument definitions.

use std::path::PathBuf;

use chbridge_model::Endpoint;
use chbridge_pipeline::InsertMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "chbridge",
    version,
    about = "Move typed data between ClickHouse tables and CSV files",
    long_about = "Move typed data between ClickHouse tables and CSV files.\n\n\
                  Column types are read from the table catalog once per run and every\n\
                  value is converted to its declared type on the way in or out."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: <config dir>/chbridge/config.toml).
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print results and errors as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub transfer: TransferArgs,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

/// Overrides for the `[clickhouse]` config table.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    #[arg(long, value_name = "HOST", global = true)]
    pub host: Option<String>,

    /// HTTP interface port.
    #[arg(long, value_name = "PORT", global = true)]
    pub port: Option<u16>,

    #[arg(long, value_name = "NAME", global = true)]
    pub database: Option<String>,

    #[arg(long, value_name = "USER", global = true)]
    pub user: Option<String>,

    #[arg(
        long,
        value_name = "PASSWORD",
        env = "CHBRIDGE_PASSWORD",
        hide_env_values = true,
        global = true
    )]
    pub password: Option<String>,

    /// Connect over HTTPS.
    #[arg(long, global = true)]
    pub secure: bool,
}

/// Overrides for the `[transfer]` config table.
#[derive(Args, Debug, Default)]
pub struct TransferArgs {
    /// Rows per batch.
    #[arg(long = "batch-size", value_name = "ROWS", global = true)]
    pub batch_size: Option<usize>,

    /// Reject numeric fields with trailing characters instead of truncating them.
    #[arg(long, global = true)]
    pub strict: bool,

    #[arg(long = "insert-mode", value_enum, global = true)]
    pub insert_mode: Option<InsertModeArg>,

    /// Flat-file field delimiter.
    #[arg(long, value_name = "CHAR", global = true)]
    pub delimiter: Option<char>,

    /// Resolve flat-file paths by file name inside this directory.
    #[arg(long = "uploads-dir", value_name = "DIR", global = true)]
    pub uploads_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check that the server answers.
    Ping,

    /// List tables in the configured database.
    Tables,

    /// Show the columns of a table or the header of a flat file.
    Columns(ColumnsArgs),

    /// Show the first rows of a table or flat file.
    Preview(PreviewArgs),

    /// Copy rows from a table to a file or from a file to a table.
    Ingest(IngestArgs),
}

#[derive(Args)]
pub struct ColumnsArgs {
    #[arg(value_name = "TABLE", required_unless_present = "file", conflicts_with = "file")]
    pub table: Option<String>,

    /// Read the header of this flat file instead.
    #[arg(long, value_name = "PATH")]
    pub file: Option<String>,
}

#[derive(Args)]
pub struct PreviewArgs {
    #[arg(long, value_enum)]
    pub source: EndpointArg,

    /// Table name or flat-file path.
    #[arg(long, value_name = "NAME")]
    pub table: String,

    /// Comma-separated column names.
    #[arg(long, value_name = "COLUMNS", value_delimiter = ',', required = true)]
    pub columns: Vec<String>,
}

#[derive(Args)]
pub struct IngestArgs {
    /// Read the whole request from a JSON file.
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with_all = ["source", "target", "table", "columns", "output"]
    )]
    pub request: Option<PathBuf>,

    #[arg(long, value_enum, required_unless_present = "request")]
    pub source: Option<EndpointArg>,

    #[arg(long, value_enum, required_unless_present = "request")]
    pub target: Option<EndpointArg>,

    /// Source table name or flat-file path.
    #[arg(long, value_name = "NAME", required_unless_present = "request")]
    pub table: Option<String>,

    /// Comma-separated column names, in output order.
    #[arg(
        long,
        value_name = "COLUMNS",
        value_delimiter = ',',
        required_unless_present = "request"
    )]
    pub columns: Vec<String>,

    /// Destination file path or table name.
    #[arg(long, value_name = "NAME", required_unless_present = "request")]
    pub output: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EndpointArg {
    Clickhouse,
    Flatfile,
}

impl From<EndpointArg> for Endpoint {
    fn from(arg: EndpointArg) -> Self {
        match arg {
            EndpointArg::Clickhouse => Self::ClickHouse,
            EndpointArg::Flatfile => Self::FlatFile,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum InsertModeArg {
    /// One INSERT per row.
    RowByRow,
    /// One multi-row INSERT per batch.
    Batched,
}

impl From<InsertModeArg> for InsertMode {
    fn from(arg: InsertModeArg) -> Self {
        match arg {
            InsertModeArg::RowByRow => Self::RowByRow,
            InsertModeArg::Batched => Self::Batched,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments parse")
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ingest_flags_build_a_request() {
        let cli = parse(&[
            "chbridge",
            "ingest",
            "--source",
            "flatfile",
            "--target",
            "clickhouse",
            "--table",
            "people.csv",
            "--columns",
            "id,name",
            "--output",
            "people",
            "--batch-size",
            "500",
        ]);
        let Command::Ingest(args) = cli.command else {
            panic!("expected ingest");
        };
        assert_eq!(args.source, Some(EndpointArg::Flatfile));
        assert_eq!(args.columns, vec!["id", "name"]);
        assert_eq!(cli.transfer.batch_size, Some(500));
    }

    #[test]
    fn request_file_conflicts_with_inline_fields() {
        assert!(
            Cli::try_parse_from([
                "chbridge",
                "ingest",
                "--request",
                "req.json",
                "--table",
                "people"
            ])
            .is_err()
        );
        let cli = parse(&["chbridge", "ingest", "--request", "req.json"]);
        let Command::Ingest(args) = cli.command else {
            panic!("expected ingest");
        };
        assert_eq!(args.request, Some(PathBuf::from("req.json")));
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = parse(&[
            "chbridge",
            "tables",
            "--host",
            "ch.internal",
            "--port",
            "9000",
            "--json",
            "--insert-mode",
            "batched",
        ]);
        assert_eq!(cli.connection.host.as_deref(), Some("ch.internal"));
        assert_eq!(cli.connection.port, Some(9000));
        assert!(cli.json);
        assert_eq!(cli.transfer.insert_mode, Some(InsertModeArg::Batched));
    }

    #[test]
    fn columns_needs_a_table_or_a_file() {
        assert!(Cli::try_parse_from(["chbridge", "columns"]).is_err());
        let cli = parse(&["chbridge", "columns", "--file", "people.csv"]);
        let Command::Columns(args) = cli.command else {
            panic!("expected columns");
        };
        assert_eq!(args.file.as_deref(), Some("people.csv"));
        assert!(args.table.is_none());
    }
}
