//! One command against persisted state, without a daemon.

use crate::error::Result;
use crate::storage::{PersistentStore, Snapshot};

use super::{Command, NavigationInterceptor, Response, SessionCoordinator};

/// Restore from `store`, handle `command`, then write back the snapshot and
/// hand the compiled rules to `interceptor`.
///
/// A rejected command is still `Ok`; check `Response::success`. Errors mean
/// the store or interceptor failed, in which case nothing is retried.
pub async fn run_once<S, I>(
    coordinator: &mut SessionCoordinator,
    store: &S,
    interceptor: &I,
    command: Command,
) -> Result<Response>
where
    S: PersistentStore,
    I: NavigationInterceptor,
{
    coordinator.restore(Snapshot::load(store).await?);
    let response = coordinator.handle(command);

    let outbox = coordinator.take_outbox();
    if outbox.persist {
        coordinator
            .snapshot()
            .save(store, coordinator.now_ms())
            .await?;
    }
    if let Some(rules) = outbox.rules {
        interceptor.install_rules(&rules).await?;
    }
    Ok(response)
}
