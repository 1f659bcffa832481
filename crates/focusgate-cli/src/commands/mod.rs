pub mod config;
pub mod policy;
pub mod run;
pub mod timer;

use focusgate_core::session::{
    run_once, Command, CoordinatorSettings, LoggingInterceptor, NavigationInterceptor, Response,
    RulesFileInterceptor, SessionCoordinator,
};
use focusgate_core::storage::SqliteStore;
use focusgate_core::{Config, SystemClock};

/// Apply a single command against the persisted state and print the
/// response as JSON.
///
/// The state is loaded, the command handled, and any resulting snapshot and
/// rules written back before printing. A response with `success: false` is
/// printed and then reported as an error.
pub async fn one_shot(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    match config.rules_file() {
        Some(path) => apply(&config, &RulesFileInterceptor::new(path), command).await,
        None => apply(&config, &LoggingInterceptor, command).await,
    }
}

async fn apply<I: NavigationInterceptor>(
    config: &Config,
    interceptor: &I,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::open()?;
    let mut coordinator =
        SessionCoordinator::new(SystemClock, CoordinatorSettings::from_config(config));

    let action = command.name();
    let response = run_once(&mut coordinator, &store, interceptor, command).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    check(action, &response)
}

fn check(action: &str, response: &Response) -> Result<(), Box<dyn std::error::Error>> {
    if response.success {
        return Ok(());
    }
    let reason = response.error.as_deref().unwrap_or("command rejected");
    Err(format!("{action}: {reason}").into())
}
