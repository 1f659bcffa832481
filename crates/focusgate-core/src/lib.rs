//! # Focusgate Core Library
//!
//! This library provides the core logic for focusgate: a focus timer whose
//! study sessions gate web navigation. It follows a CLI-first philosophy:
//! everything is reachable through the `focusgate` binary, either as one-shot
//! commands or through the long-running daemon.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine. It never reads the
//!   clock itself; the caller passes `now_ms` and drives `tick()`.
//! - **Policy**: Block/allow lists, the allow/block decision and its
//!   compilation into declarative redirect rules.
//! - **Session**: The coordinator that applies client commands to both
//!   engines and collects the resulting side effects.
//! - **Storage**: Key-value persistence (in memory or SQLite) and TOML
//!   configuration.
//! - **Daemon**: The single event loop that owns the coordinator.
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`PolicyEngine`]: Site-access policy
//! - [`SessionCoordinator`]: Command dispatch and side-effect bookkeeping
//! - [`Daemon`]: Background loop and its [`DaemonHandle`]
//! - [`Config`]: Application configuration management

pub mod daemon;
pub mod error;
pub mod events;
pub mod policy;
pub mod session;
pub mod storage;
pub mod timer;

pub use daemon::{Daemon, DaemonHandle, Request};
pub use error::{
    ConfigError, CoreError, DaemonError, InterceptorError, InvalidTransition, StoreError,
    ValidationError,
};
pub use events::Event;
pub use policy::{BlockingMode, Decision, ListEdit, PolicyEngine, PolicyState, RuleSet};
pub use session::{
    Command, CoordinatorSettings, DecisionContext, NavigationInterceptor, Response,
    SessionCoordinator, TimerView, run_once,
};
pub use storage::{Config, MemoryStore, PersistentStore, Snapshot, SqliteStore};
pub use timer::{Clock, DurationConfig, ManualClock, SystemClock, TimerEngine, TimerMode};
