use anyhow::Result;
use clap::{Parser, Subcommand};

use pharmacy_sync::handlers::{self, InitOptions};
use pharmacy_sync::queue::OperationKind;
use pharmacy_sync::{logger, settings, VerbosityLevel};

#[derive(Parser)]
#[command(name = "pharmacy-sync")]
#[command(about = "Offline write queue for the pharmacy point-of-sale database", long_about = None)]
#[command(version)]
struct Cli {
    /// Show debug output and row details
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the hosted database connection
    Init {
        /// Base URL of the hosted database project
        #[arg(long)]
        url: Option<String>,

        /// API key sent with every request
        #[arg(long)]
        api_key: Option<String>,

        /// Column used to match rows for update and delete
        #[arg(long)]
        key_column: Option<String>,
    },

    /// Show the effective configuration
    Config,

    /// Insert a record (queued if offline)
    Insert {
        /// Target table, e.g. medicines
        table: String,
        /// Record as JSON
        payload: String,
        /// Queue without contacting the remote
        #[arg(long)]
        offline: bool,
    },

    /// Update a record matched by its key column (queued if offline)
    Update {
        table: String,
        /// Patch as JSON, including the key column
        payload: String,
        #[arg(long)]
        offline: bool,
    },

    /// Delete a record matched by its key column (queued if offline)
    Delete {
        table: String,
        /// JSON object carrying the key column
        payload: String,
        #[arg(long)]
        offline: bool,
    },

    /// Replay queued operations if the remote is reachable
    Sync,

    /// Show connectivity, queue size, and last sync
    Status,

    /// List queued operations
    Pending {
        /// Print the raw queue as JSON
        #[arg(long)]
        json: bool,
    },

    /// Poll the remote and sync automatically when it comes back
    Watch {
        /// Seconds between probes (default from config)
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many probes
        #[arg(long)]
        polls: Option<u64>,
    },

    /// View or clear the sync history
    History {
        /// Maximum number of records to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Delete all history records
        #[arg(long)]
        clear: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = VerbosityLevel::from_flags(cli.verbose, cli.quiet);

    logger::init_logger(verbosity)?;

    match cli.command {
        Commands::Init {
            url,
            api_key,
            key_column,
        } => handlers::handle_init(InitOptions {
            url,
            api_key,
            key_column,
        })?,
        Commands::Config => settings::show_settings()?,
        Commands::Insert {
            table,
            payload,
            offline,
        } => handlers::handle_write(OperationKind::Insert, &table, &payload, offline, verbosity)?,
        Commands::Update {
            table,
            payload,
            offline,
        } => handlers::handle_write(OperationKind::Update, &table, &payload, offline, verbosity)?,
        Commands::Delete {
            table,
            payload,
            offline,
        } => handlers::handle_write(OperationKind::Delete, &table, &payload, offline, verbosity)?,
        Commands::Sync => handlers::handle_sync(verbosity)?,
        Commands::Status => handlers::handle_status(verbosity)?,
        Commands::Pending { json } => handlers::handle_pending(json, verbosity)?,
        Commands::Watch { interval, polls } => {
            handlers::handle_watch(interval, polls, verbosity)?
        }
        Commands::History { limit, clear } => {
            if clear {
                handlers::handle_history_clear()?
            } else {
                handlers::handle_history_list(limit)?
            }
        }
    }

    Ok(())
}
