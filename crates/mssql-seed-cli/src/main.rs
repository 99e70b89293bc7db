//! mssql-seed CLI - SQL Server seed script generator.

mod prompt;

use clap::{Parser, ValueEnum};
use mssql_seed::{
    Config, MssqlConnection, SeedError, SourceKind, SqlLiteralEncoder, StatementGenerator,
};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "mssql-seed")]
#[command(about = "Generate SQL Server seed scripts from live tables or CSV snapshots")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database server host
    #[arg(short = 's', long, visible_alias = "host")]
    server: Option<String>,

    /// Database name
    #[arg(short, long)]
    database: Option<String>,

    /// Database port [default: 1433]
    #[arg(long)]
    port: Option<u16>,

    /// SQL login
    #[arg(short, long, visible_alias = "user-id")]
    user: Option<String>,

    /// Password (prompted for when missing)
    #[arg(short, long, env = "MSSQL_SEED_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Tables to script, parent tables first (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    tables: Vec<String>,

    /// Emit delete statements in reverse table order before the inserts
    #[arg(long, visible_alias = "incdel")]
    include_deletes: bool,

    /// Directory holding <table>.csv snapshots
    #[arg(long, visible_alias = "csvdir")]
    csv_dir: Option<PathBuf>,

    /// Where row data comes from
    #[arg(long, visible_alias = "src", value_enum)]
    source_mode: Option<SourceModeArg>,

    /// Sensitive column written as 'OBFUSCATED' (Table.Column, repeatable)
    #[arg(long = "sensitive", value_name = "TABLE.COLUMN")]
    sensitive: Vec<String>,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceModeArg {
    /// Query the live tables
    Db,
    /// Read CSV snapshots
    Csv,
}

impl From<SourceModeArg> for SourceKind {
    fn from(arg: SourceModeArg) -> Self {
        match arg {
            SourceModeArg::Db => SourceKind::Db,
            SourceModeArg::Csv => SourceKind::Csv,
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> Result<(), SeedError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };
    apply_overrides(&mut config, cli);
    config.validate()?;

    if config.source.password.is_none() {
        config.source.password = Some(prompt::password(&config.source)?);
    }

    let options = config.generate_options()?;
    let sensitive = config.sensitive_columns()?;
    let generator = StatementGenerator::new(&options, SqlLiteralEncoder::new(&sensitive));

    let mut connection = MssqlConnection::connect(&config.source)?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let summary = generator.generate(&mut connection, &mut out)?;
    out.flush()?;

    info!(
        "Scripted {} rows from {} tables ({} deletes) in {:.2}s",
        summary.total_rows(),
        summary.tables.len(),
        summary.deletes,
        summary.duration_seconds
    );

    connection.close()
}

/// Flags take precedence over configuration file values.
fn apply_overrides(config: &mut Config, cli: Cli) {
    let source = &mut config.source;
    if let Some(host) = cli.server {
        source.host = host;
    }
    if let Some(database) = cli.database {
        source.database = database;
    }
    if let Some(port) = cli.port {
        source.port = port;
    }
    if let Some(user) = cli.user {
        source.user = user;
    }
    if cli.password.is_some() {
        source.password = cli.password;
    }

    let generation = &mut config.generation;
    if !cli.tables.is_empty() {
        generation.tables = cli
            .tables
            .into_iter()
            .map(|t| t.trim().to_string())
            .collect();
    }
    if cli.include_deletes {
        generation.include_deletes = true;
    }
    if let Some(dir) = cli.csv_dir {
        generation.csv_directory = Some(dir);
    }
    if let Some(mode) = cli.source_mode {
        generation.source_mode = mode.into();
    }
    generation.sensitive_columns.extend(cli.sensitive);
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries the script
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mssql-seed").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_schema_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_file_values() {
        let mut config = Config::from_yaml(
            r#"
source:
  host: file-host
  database: FileDb
  user: file-user
generation:
  tables: [FromFile]
  sensitive_columns: [A.B]
"#,
        )
        .unwrap();

        let cli = parse(&[
            "--host",
            "cli-host",
            "-t",
            "Parent, Child",
            "--incdel",
            "--src",
            "csv",
            "--csvdir",
            "snap",
            "--sensitive",
            "Child.Note",
        ]);
        apply_overrides(&mut config, cli);

        assert_eq!(config.source.host, "cli-host");
        assert_eq!(config.source.database, "FileDb");
        assert_eq!(config.generation.tables, vec!["Parent", "Child"]);
        assert!(config.generation.include_deletes);
        assert_eq!(config.generation.source_mode, SourceKind::Csv);
        assert_eq!(config.generation.csv_directory, Some(PathBuf::from("snap")));
        assert_eq!(config.generation.sensitive_columns, vec!["A.B", "Child.Note"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_alone_make_a_config() {
        let mut config = Config::default();
        let cli = parse(&[
            "-s", "db01", "-d", "Sales", "-u", "sa", "-p", "secret", "--port", "14330", "-t",
            "Customer",
        ]);
        apply_overrides(&mut config, cli);

        assert_eq!(config.source.port, 14330);
        assert_eq!(config.source.password.as_deref(), Some("secret"));
        assert_eq!(config.generation.source_mode, SourceKind::Db);
        assert!(config.validate().is_ok());
    }
}
