use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// Environment variable holding the log filter (e.g. `debug`, `shiftguard_core=info`).
const LOG_ENV: &str = "SHIFTGUARD_LOG";

#[derive(Parser)]
#[command(name = "shiftguard", version, about = "Shiftguard work-session CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clock in, clock out, current status
    Clock {
        #[command(subcommand)]
        action: commands::clock::ClockAction,
    },
    /// Start and end breaks
    Break {
        #[command(subcommand)]
        action: commands::breaks::BreakAction,
    },
    /// Streaks, weekly totals and focus score
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// App usage samples and work-app classification
    Usage {
        #[command(subcommand)]
        action: commands::usage::UsageAction,
    },
    /// App restriction
    Shield {
        #[command(subcommand)]
        action: commands::shield::ShieldAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Sign in, sign out, organization codes
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Clock { action } => commands::clock::run(action).await,
        Commands::Break { action } => commands::breaks::run(action).await,
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Usage { action } => commands::usage::run(action),
        Commands::Shield { action } => commands::shield::run(action).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Auth { action } => commands::auth::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
