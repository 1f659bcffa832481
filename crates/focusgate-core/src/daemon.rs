//! The background event loop.
//!
//! One task owns the [`SessionCoordinator`] and serializes everything that
//! touches it: client commands, the periodic tick, the initial state load
//! and shutdown. After each pass the coordinator's outbox is flushed, the
//! reply having already been sent.
//!
//! Until the persisted state has loaded, read-only commands are answered
//! from defaults and mutating ones are queued, then replayed in order.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::DaemonError;
use crate::events::Event;
use crate::policy::Decision;
use crate::session::{Command, DecisionContext, NavigationInterceptor, Response, SessionCoordinator};
use crate::storage::{PersistentStore, Snapshot};

const COMMAND_CHANNEL_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A command paired with the channel its response goes back on.
#[derive(Debug)]
pub struct Request {
    pub command: Command,
    pub reply: oneshot::Sender<Response>,
}

/// Client side of a running daemon. Cheap to clone.
///
/// The daemon stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    commands: mpsc::Sender<Request>,
    context: watch::Receiver<DecisionContext>,
    events: broadcast::Sender<Event>,
}

impl DaemonHandle {
    /// Send a command and wait for its response.
    pub async fn send(&self, command: Command) -> Result<Response, DaemonError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Request { command, reply })
            .await
            .map_err(|_| DaemonError::Stopped)?;
        rx.await.map_err(|_| DaemonError::NoReply)
    }

    /// Answer a navigation check from the last published context, without
    /// a round trip through the loop.
    pub fn decide(&self, url: &str) -> Decision {
        self.context.borrow().decide(url)
    }

    /// Watch the decision context as it changes.
    pub fn context(&self) -> watch::Receiver<DecisionContext> {
        self.context.clone()
    }

    /// Receive every event from now on. Slow receivers lose the oldest ones.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }
}

pub struct Daemon<S, I> {
    coordinator: SessionCoordinator,
    store: S,
    interceptor: I,
    tick_interval: Duration,
    commands: mpsc::Receiver<Request>,
    context_tx: watch::Sender<DecisionContext>,
    events_tx: broadcast::Sender<Event>,
}

impl<S, I> Daemon<S, I>
where
    S: PersistentStore,
    I: NavigationInterceptor,
{
    pub fn new(
        coordinator: SessionCoordinator,
        store: S,
        interceptor: I,
        tick_interval: Duration,
    ) -> (Self, DaemonHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (context_tx, context_rx) = watch::channel(coordinator.decision_context().clone());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let handle = DaemonHandle {
            commands: commands_tx,
            context: context_rx,
            events: events_tx.clone(),
        };
        let daemon = Self {
            coordinator,
            store,
            interceptor,
            tick_interval: tick_interval.max(Duration::from_millis(1)),
            commands,
            context_tx,
            events_tx,
        };
        (daemon, handle)
    }

    /// Run until `shutdown` resolves or every handle is dropped.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let Daemon {
            mut coordinator,
            store,
            interceptor,
            tick_interval,
            mut commands,
            context_tx,
            events_tx,
        } = self;
        let outlets = Outlets {
            store: &store,
            interceptor: &interceptor,
            context_tx: &context_tx,
            events_tx: &events_tx,
        };

        let load = Snapshot::load(&store);
        tokio::pin!(load);
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut loaded = false;
        let mut pending: VecDeque<Request> = VecDeque::new();

        info!(tick_ms = tick_interval.as_millis() as u64, "Daemon started");

        loop {
            tokio::select! {
                result = &mut load, if !loaded => {
                    loaded = true;
                    match result {
                        Ok(snapshot) => coordinator.restore(snapshot),
                        Err(e) => {
                            warn!(error = %e, "Failed to load state, continuing with defaults");
                            coordinator.restore(Snapshot::default());
                        }
                    }
                    if !pending.is_empty() {
                        debug!(count = pending.len(), "Replaying queued commands");
                    }
                    while let Some(request) = pending.pop_front() {
                        serve(&mut coordinator, request);
                    }
                }
                _ = ticker.tick(), if loaded => {
                    coordinator.tick();
                }
                request = commands.recv() => match request {
                    Some(request) if !loaded && !request.command.is_query() => {
                        debug!(action = request.command.name(), "State not loaded yet, queueing");
                        pending.push_back(request);
                    }
                    Some(request) => serve(&mut coordinator, request),
                    None => {
                        info!("All handles dropped, stopping");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
            outlets.flush(&mut coordinator).await;
        }

        outlets.flush(&mut coordinator).await;
        info!("Daemon stopped");
    }
}

fn serve(coordinator: &mut SessionCoordinator, request: Request) {
    let action = request.command.name();
    let response = coordinator.handle(request.command);
    if request.reply.send(response).is_err() {
        debug!(action, "Client went away before the reply");
    }
}

/// Everything the outbox drains into.
struct Outlets<'a, S, I> {
    store: &'a S,
    interceptor: &'a I,
    context_tx: &'a watch::Sender<DecisionContext>,
    events_tx: &'a broadcast::Sender<Event>,
}

impl<S, I> Outlets<'_, S, I>
where
    S: PersistentStore,
    I: NavigationInterceptor,
{
    async fn flush(&self, coordinator: &mut SessionCoordinator) {
        let outbox = coordinator.take_outbox();
        if outbox.is_empty() {
            return;
        }

        let context = coordinator.decision_context().clone();
        self.context_tx.send_if_modified(|current| {
            if *current == context {
                false
            } else {
                *current = context;
                true
            }
        });

        if outbox.persist {
            let now = coordinator.now_ms();
            let snapshot = coordinator.snapshot();
            if let Err(e) = snapshot.save(self.store, now).await {
                warn!(error = %e, "Failed to persist state");
                coordinator.persist_failed();
            }
        }

        if let Some(rules) = outbox.rules {
            if let Err(e) = self.interceptor.install_rules(&rules).await {
                warn!(error = %e, "Failed to install rules");
                coordinator.rules_failed();
            }
        }

        for event in outbox.events {
            debug!(kind = event.kind(), "Event");
            // No subscribers is fine.
            let _ = self.events_tx.send(event);
        }
    }
}
