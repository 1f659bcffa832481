use clap::{Parser, Subcommand};
use focusgate_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "focusgate", version, about = "Focus timer and site blocker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Block and allow lists
    Policy {
        #[command(subcommand)]
        action: commands::policy::PolicyAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the daemon, speaking JSON lines on stdin/stdout
    Run(commands::run::RunArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // FOCUSGATE_LOG wins over the configured level.
    let filter = EnvFilter::try_from_env("FOCUSGATE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(Config::load_or_default().log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action).await,
        Commands::Policy { action } => commands::policy::run(action).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Run(args) => commands::run::run(args).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
