//! VitalSync CLI
//!
//! Command-line front end for the VitalSync engine. Local records live in
//! a file store; the "cloud" is a second directory acting as a shared
//! remote, so several local directories can sync through it.
//!
//! # Commands
//!
//! - `add` - Save a measurement (uploaded immediately when online)
//! - `list` - Show cached records
//! - `status` - Show sync status
//! - `push` / `pull` - Upload pending records / merge remote records
//! - `policy` - Show or set the conflict policy
//! - `export` / `import` - JSON or CSV export, JSON import
//! - `backup` / `restore` / `backup-info` - Remote backups
//! - `summary` - BMI, goal progress and logging streak

mod commands;
mod remote;

use clap::{Parser, Subcommand};
use commands::records::AddArgs;
use commands::Session;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vitalsync_protocol::ConflictPolicy;

/// VitalSync command-line tools.
#[derive(Parser)]
#[command(name = "vitalsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the local data directory
    #[arg(global = true, short, long, default_value = ".vitalsync")]
    path: PathBuf,

    /// Path to the remote emulator directory
    #[arg(global = true, short, long, default_value = ".vitalsync-remote")]
    remote: PathBuf,

    /// Run as if there were no connectivity
    #[arg(global = true, long)]
    offline: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a measurement
    Add(AddArgs),

    /// Show cached records, newest first
    List {
        /// Maximum number of records to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only show records waiting for upload
        #[arg(long)]
        pending: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show sync status
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Upload pending records
    Push {
        /// Retries after a transient failure
        #[arg(long, default_value = "2")]
        retries: u32,
    },

    /// Download remote records and merge them
    Pull,

    /// Show or set the conflict policy
    Policy {
        /// New policy (server-wins, client-wins, latest-wins)
        policy: Option<ConflictPolicy>,
    },

    /// Export cached records
    Export {
        /// Output format (json, csv)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import records from a JSON export
    Import {
        /// Input file
        input: PathBuf,
    },

    /// Store the local cache as a remote backup
    Backup,

    /// Replace the local cache with a remote backup
    Restore {
        /// Backup ID
        id: String,

        /// Discard records that were never uploaded
        #[arg(long)]
        force: bool,
    },

    /// Show a remote backup's metadata
    BackupInfo {
        /// Backup ID
        id: String,
    },

    /// Show BMI, goal progress and logging streak
    Summary {
        /// Height in cm
        #[arg(long)]
        height: Option<f64>,

        /// Target weight in kg
        #[arg(long)]
        target: Option<f64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let session = Session {
        path: cli.path,
        remote: cli.remote,
        offline: cli.offline,
    };

    match cli.command {
        Commands::Add(args) => commands::records::add(&session, &args)?,
        Commands::List {
            limit,
            pending,
            format,
        } => commands::records::list(&session, limit, pending, &format)?,
        Commands::Status { format } => commands::sync::status(&session, &format)?,
        Commands::Push { retries } => commands::sync::push(&session, retries)?,
        Commands::Pull => commands::sync::pull(&session)?,
        Commands::Policy { policy } => commands::sync::policy(&session, policy)?,
        Commands::Export { format, output } => {
            commands::transfer::export(&session, &format, output.as_deref())?;
        }
        Commands::Import { input } => commands::transfer::import(&session, &input)?,
        Commands::Backup => commands::backup::create(&session)?,
        Commands::Restore { id, force } => commands::backup::restore(&session, &id, force)?,
        Commands::BackupInfo { id } => commands::backup::show(&session, &id)?,
        Commands::Summary {
            height,
            target,
            format,
        } => commands::summary::run(&session, height, target, &format)?,
        Commands::Version => {
            println!("VitalSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Backup format v{}", vitalsync_protocol::BACKUP_FORMAT_VERSION);
        }
    }

    Ok(())
}
