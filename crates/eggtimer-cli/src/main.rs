use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "eggtimer-cli", version, about = "Boiled egg countdown timer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cooking time for an egg
    Resolve(commands::resolve::ResolveArgs),
    /// Confirm, count down and ring
    Cook(commands::cook::CookArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Recently finished cooks
    History {
        /// Maximum number of cooks to list
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

/// Logs go to stderr so stdout stays machine readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("EGGTIMER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Resolve(args) => commands::resolve::run(args),
        Commands::Cook(args) => commands::cook::run(args),
        Commands::Config { action } => commands::config::run(action),
        Commands::History { limit } => commands::history::run(limit),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
