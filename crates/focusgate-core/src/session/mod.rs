//! Session coordination: commands in, state changes and side effects out.

mod command;
mod context;
mod coordinator;
mod interceptor;
mod once;

pub use command::{Command, Response, TimerView};
pub use context::DecisionContext;
pub use coordinator::{CoordinatorSettings, Outbox, SessionCoordinator};
pub use interceptor::{
    LoggingInterceptor, NavigationInterceptor, RecordingInterceptor, RulesFileInterceptor,
};
pub use once::run_once;
