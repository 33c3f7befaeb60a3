use discovery::SpatialFilterSet;
use foundation::BoundingBox;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::SyncConfig;
use crate::events::{FetchOutcome, FetchSink, MapWidget, SyncEvent};
use crate::state::{SyncPhase, SyncStats, ViewportState};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    #[error("viewport sync task has stopped")]
    Closed,
    #[error("viewport sync inbox is full")]
    Full,
}

/// Point-in-time view of the controller, published after every step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSnapshot {
    pub phase: SyncPhase,
    pub listeners_attached: bool,
    pub has_pending: bool,
    pub last_dispatched: Option<BoundingBox>,
    pub stats: SyncStats,
}

impl SyncSnapshot {
    fn of(state: &ViewportState) -> Self {
        Self {
            phase: state.phase(),
            listeners_attached: state.listeners_attached(),
            has_pending: state.pending().is_some(),
            last_dispatched: state.last_dispatched(),
            stats: state.stats(),
        }
    }
}

/// Host-side handle. Cloning is cheap; the task stops once every clone is dropped.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<SyncEvent>,
    snapshot: watch::Receiver<SyncSnapshot>,
}

impl SyncHandle {
    pub async fn send(&self, event: SyncEvent) -> Result<(), SyncError> {
        self.tx.send(event).await.map_err(|_| SyncError::Closed)
    }

    /// Non-blocking variant for synchronous UI callbacks.
    pub fn try_send(&self, event: SyncEvent) -> Result<(), SyncError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SyncError::Full,
            mpsc::error::TrySendError::Closed(_) => SyncError::Closed,
        })
    }

    pub async fn map_ready(&self) -> Result<(), SyncError> {
        self.send(SyncEvent::MapReady).await
    }

    pub async fn list_mounted(&self) -> Result<(), SyncError> {
        self.send(SyncEvent::ListMounted).await
    }

    pub async fn viewport_changed(&self) -> Result<(), SyncError> {
        self.send(SyncEvent::ViewportChanged).await
    }

    pub async fn filters_changed(&self, filters: SpatialFilterSet) -> Result<(), SyncError> {
        self.send(SyncEvent::FiltersChanged(filters)).await
    }

    pub async fn list_fetch_complete(&self, outcome: FetchOutcome) -> Result<(), SyncError> {
        self.send(SyncEvent::ListFetchComplete(outcome)).await
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that wakes on every published change.
    pub fn watch(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot.clone()
    }
}

/// Keeps an interactive map and a result list in step.
///
/// Startup is strictly ordered: map ready, then list mounted (bounded by
/// `list_ready_timeout`), then one unconditional fetch, then viewport
/// listeners. After that viewport events go through a two-stage debounce and
/// a noise check; at most one list fetch is in flight and newer requests
/// replace the queued one.
pub struct ViewportSyncController<M, S> {
    config: SyncConfig,
    map: M,
    sink: S,
    state: ViewportState,
    inbox: mpsc::Receiver<SyncEvent>,
    snapshot: watch::Sender<SyncSnapshot>,
}

impl<M, S> ViewportSyncController<M, S>
where
    M: MapWidget + 'static,
    S: FetchSink + 'static,
{
    /// Start the controller on the current tokio runtime.
    ///
    /// The join handle resolves to the final counters once every
    /// [`SyncHandle`] is dropped.
    pub fn spawn(config: SyncConfig, map: M, sink: S) -> (SyncHandle, JoinHandle<SyncStats>) {
        let (tx, inbox) = mpsc::channel(config.channel_capacity.max(1));
        let state = ViewportState::new(config);
        let (snapshot, snapshot_rx) = watch::channel(SyncSnapshot::of(&state));
        let controller = Self {
            config,
            map,
            sink,
            state,
            inbox,
            snapshot,
        };
        let task = tokio::spawn(controller.run().instrument(info_span!("viewport_sync")));
        (
            SyncHandle {
                tx,
                snapshot: snapshot_rx,
            },
            task,
        )
    }

    async fn run(mut self) -> SyncStats {
        if self.startup().await {
            self.state
                .begin(Instant::now(), &self.map, &mut self.sink);
            self.publish();
            self.event_loop().await;
        }
        let stats = self.state.stats();
        info!(?stats, "viewport sync stopped");
        stats
    }

    /// Waits for map and list readiness. Returns false if the host went away.
    async fn startup(&mut self) -> bool {
        let mut list_mounted = false;
        loop {
            match self.inbox.recv().await {
                None => return false,
                Some(SyncEvent::MapReady) => break,
                Some(SyncEvent::ListMounted) => list_mounted = true,
                Some(other) => self.apply(other),
            }
        }
        debug!("map ready");

        let deadline = Instant::now() + self.config.list_ready_timeout();
        while !list_mounted {
            tokio::select! {
                event = self.inbox.recv() => match event {
                    None => return false,
                    Some(SyncEvent::ListMounted) => list_mounted = true,
                    Some(SyncEvent::MapReady) => {}
                    Some(other) => self.apply(other),
                },
                _ = sleep_until(deadline) => {
                    warn!(
                        timeout_ms = self.config.list_ready_timeout_ms,
                        "list did not mount in time, proceeding"
                    );
                    break;
                }
            }
        }
        true
    }

    async fn event_loop(&mut self) {
        loop {
            let deadline = self.state.next_deadline();
            tokio::select! {
                event = self.inbox.recv() => match event {
                    None => break,
                    Some(event) => self.apply(event),
                },
                _ = maybe_sleep_until(deadline) => {
                    self.state.on_timer(Instant::now(), &self.map, &mut self.sink);
                    self.publish();
                }
            }
        }
    }

    fn apply(&mut self, event: SyncEvent) {
        let now = Instant::now();
        match event {
            SyncEvent::MapReady | SyncEvent::ListMounted => {
                debug!(?event, "readiness signal after startup");
            }
            SyncEvent::ViewportChanged => self.state.on_viewport_changed(now),
            SyncEvent::FiltersChanged(filters) => {
                self.state
                    .on_filters_changed(now, filters, &mut self.map, &mut self.sink)
            }
            SyncEvent::ListFetchComplete(outcome) => {
                self.state.on_fetch_complete(outcome, &mut self.sink)
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let next = SyncSnapshot::of(&self.state);
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

async fn maybe_sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
