/// Command line entry point for the habit store
///
/// Parses arguments, sets up logging, runs one command as the given owner
/// and prints the result as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use habit_store::{AppError, Command, Config, HabitTracker, OwnerId};

/// Command line arguments for the habit store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Owner the command acts for, as established by the identity provider
    #[arg(long, env = "HABIT_STORE_OWNER")]
    owner: String,

    /// Path to the SQLite database file
    /// If not provided, uses a default location in the user's home directory
    #[arg(long, env = "HABIT_STORE_DATABASE")]
    database: Option<PathBuf>,

    /// Logical table holding all items
    #[arg(long, env = "HABIT_STORE_TABLE", default_value = habit_store::config::DEFAULT_TABLE_NAME)]
    table: String,

    /// Seconds to wait for each store operation
    #[arg(long, env = "HABIT_STORE_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output (implies debug)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            database: self.database.clone(),
            table_name: self.table.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
            ..Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.verbose {
        "debug"
    } else if args.debug {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("habit_store={log_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let owner = OwnerId::new(args.owner.as_str())?;
    let tracker = HabitTracker::open(args.config())?;
    info!(owner = %owner, "running {:?}", args.command);

    let output = tracker.execute(&owner, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
