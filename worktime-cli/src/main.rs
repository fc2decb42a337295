//! Worktime: punch clock with a synchronized registration list.
//!
//! # Usage
//!
//! ```text
//! worktime punch-in --project <name> --task <name>
//! worktime punch-out [--comment <text>]
//! worktime list [--pages <n>] [--json]
//! worktime sync [--quiet] [--remote <path>]
//! worktime config show
//! ```
//!
//! Logging goes to stderr; set `RUST_LOG` (default `warn`) for more.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigCommand,
    list::ListArgs,
    punch::{PunchInArgs, PunchOutArgs},
    sync::SyncArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "worktime",
    version,
    about = "Track time registrations and keep them in sync",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a time registration on a project task.
    PunchIn(PunchInArgs),

    /// Finish the ongoing time registration.
    PunchOut(PunchOutArgs),

    /// Show registrations, newest first, one page at a time.
    List(ListArgs),

    /// Synchronize local registrations with the remote store.
    Sync(SyncArgs),

    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::PunchIn(args) => args.run(),
        Commands::PunchOut(args) => args.run(),
        Commands::List(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
