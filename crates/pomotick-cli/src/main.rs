use clap::{Parser, Subcommand};
use pomotick_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pomotick", version, about = "Pomodoro countdown timer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the timer, speaking JSON lines on stdin/stdout
    Run(commands::timer::RunArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Focus history summaries
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
}

fn init_tracing() {
    // stdout carries protocol output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let configured = Config::load_or_default().log_filter;
        EnvFilter::try_new(configured).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Run(args) => commands::timer::run(args),
        Commands::Config { action } => commands::config::run(action),
        Commands::Stats { action } => commands::stats::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
