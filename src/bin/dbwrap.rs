use clap::Parser;
use dbwrap::config;
use dbwrap::core::db::is_numeric;
use dbwrap::core::CONNECT_FAILURE_MESSAGE;
use dbwrap::{ConnectOptions, DataAccess, DbError, FetchStyle, Params, Value};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run one statement against the configured database and print the result as JSON
#[derive(Parser, Debug)]
#[command(name = "dbwrap")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Row shape: assoc, num or both
    #[arg(long, default_value = "assoc")]
    style: FetchStyle,

    /// Key rows by their first column
    #[arg(long)]
    rekey: bool,

    /// SQL statement with `?` placeholders
    sql: String,

    /// Positional parameters (NULL, integer, real or text)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    params: Vec<String>,
}

/// Reads a parameter word as integer, real, NULL or text
fn parse_param(word: &str) -> Value {
    if word == "NULL" {
        Value::Null
    } else if let Ok(i) = word.parse::<i64>() {
        Value::Integer(i)
    } else if is_numeric(word) {
        match word.trim().parse::<f64>() {
            Ok(f) => Value::Real(f),
            Err(_) => Value::Text(word.to_string()),
        }
    } else {
        Value::Text(word.to_string())
    }
}

fn run(args: Args) -> dbwrap::Result<()> {
    let path = args
        .config
        .or_else(config::default_config_path)
        .ok_or_else(|| DbError::Config("no configuration directory found".to_string()))?;
    let cfg = config::load_config(&path)?;
    info!(config = %path.display(), "configuration loaded");

    let mut db = DataAccess::connect(&ConnectOptions::from(&cfg.database))?;
    let params: Params = args.params.iter().map(|word| parse_param(word)).collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.rekey {
        let rows = db.get_assoc_array(&args.sql, params, args.style)?;
        serde_json::to_writer(&mut out, &rows)?;
        writeln!(out)?;
    } else {
        let mut handle = db.query(&args.sql, params)?;
        if handle.column_count() == 0 {
            let summary = serde_json::json!({ "row_count": handle.row_count() });
            writeln!(out, "{}", summary)?;
        } else {
            for row in handle.fetch_all(args.style) {
                serde_json::to_writer(&mut out, &row)?;
                writeln!(out)?;
            }
        }
    }

    db.close()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    // Usage errors exit with status 2
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_connection() => {
            eprintln!("{}", CONNECT_FAILURE_MESSAGE);
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(1)
        }
    }
}
