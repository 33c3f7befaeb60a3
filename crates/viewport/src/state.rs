use discovery::SpatialFilterSet;
use foundation::BoundingBox;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::events::{FetchOutcome, FetchRequest, FetchSink, MapAction, MapWidget};

/// Externally visible phase. Never returns to `Initializing` once left.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Initializing,
    Ready,
    FetchInFlight,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub dispatched: u64,
    /// Pending requests overwritten by a newer one.
    pub coalesced: u64,
    /// Candidates within epsilon of the latest request.
    pub discarded_noise: u64,
    /// Viewport events before listeners attached or during the init grace.
    pub discarded_initializing: u64,
    /// Viewport events during a filter-change settle.
    pub discarded_guard: u64,
    pub failed_fetches: u64,
}

/// Ordering rules of the viewport/list synchronization, without any I/O.
///
/// Every input carries `now`; timers are plain deadlines the driver sleeps
/// on (see [`ViewportState::next_deadline`]). Each debounce stage holds at
/// most one deadline, so restarting a stage cancels the previous one.
#[derive(Debug)]
pub struct ViewportState {
    config: SyncConfig,
    listeners_attached: bool,
    initializing: bool,
    in_flight: bool,
    /// Single slot, last write wins.
    pending: Option<FetchRequest>,
    last_dispatched: Option<BoundingBox>,
    active_filters: Option<SpatialFilterSet>,
    jitter_deadline: Option<Instant>,
    settle_deadline: Option<Instant>,
    grace_deadline: Option<Instant>,
    guard_deadline: Option<Instant>,
    stats: SyncStats,
}

fn expired(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|d| d <= now)
}

impl ViewportState {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            listeners_attached: false,
            initializing: true,
            in_flight: false,
            pending: None,
            last_dispatched: None,
            active_filters: None,
            jitter_deadline: None,
            settle_deadline: None,
            grace_deadline: None,
            guard_deadline: None,
            stats: SyncStats::default(),
        }
    }

    pub fn phase(&self) -> SyncPhase {
        if self.initializing {
            SyncPhase::Initializing
        } else if self.in_flight {
            SyncPhase::FetchInFlight
        } else {
            SyncPhase::Ready
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn pending(&self) -> Option<&FetchRequest> {
        self.pending.as_ref()
    }

    pub fn last_dispatched(&self) -> Option<BoundingBox> {
        self.last_dispatched
    }

    pub fn active_filters(&self) -> Option<&SpatialFilterSet> {
        self.active_filters.as_ref()
    }

    pub fn listeners_attached(&self) -> bool {
        self.listeners_attached
    }

    /// Earliest timer the driver must wake up for.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.jitter_deadline,
            self.settle_deadline,
            self.grace_deadline,
            self.guard_deadline,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Startup steps 3-5: first fetch from the rendered viewport, then attach
    /// listeners and arm the grace timer.
    ///
    /// The first fetch bypasses debounce and the noise check. Filters changed
    /// before this point ride along with it.
    pub fn begin(&mut self, now: Instant, map: &dyn MapWidget, sink: &mut dyn FetchSink) {
        if self.listeners_attached {
            debug!("viewport sync already started");
            return;
        }
        let request = FetchRequest {
            bbox: map.visible_bounds(),
            filters: self.active_filters.clone(),
        };
        self.dispatch(request, sink);
        self.listeners_attached = true;
        self.grace_deadline = Some(now + self.config.init_grace());
        info!("viewport listeners attached");
    }

    pub fn on_viewport_changed(&mut self, now: Instant) {
        if !self.listeners_attached || self.initializing {
            self.stats.discarded_initializing += 1;
            return;
        }
        if self.guard_deadline.is_some_and(|d| now < d) {
            self.stats.discarded_guard += 1;
            return;
        }
        // A raw event always returns the debounce to its first stage.
        self.jitter_deadline = Some(now + self.config.jitter());
        self.settle_deadline = None;
    }

    /// Fire every timer whose deadline is at or before `now`.
    pub fn on_timer(&mut self, now: Instant, map: &dyn MapWidget, sink: &mut dyn FetchSink) {
        if expired(self.grace_deadline, now) {
            self.grace_deadline = None;
            self.initializing = false;
            debug!("init grace elapsed");
        }
        if expired(self.guard_deadline, now) {
            self.guard_deadline = None;
            debug!("filter guard released");
        }
        if expired(self.jitter_deadline, now) {
            self.jitter_deadline = None;
            self.settle_deadline = Some(now + self.config.settle());
        }
        if expired(self.settle_deadline, now) {
            self.settle_deadline = None;
            self.on_settled(map.visible_bounds(), sink);
        }
    }

    /// Filter changes outrank viewport noise: debounce is cancelled, viewport
    /// events are ignored until the map has settled, and the resulting fetch
    /// carries the new filters.
    pub fn on_filters_changed(
        &mut self,
        now: Instant,
        filters: SpatialFilterSet,
        map: &mut dyn MapWidget,
        sink: &mut dyn FetchSink,
    ) {
        debug!(mode = %filters.mode(), "filters changed");
        self.active_filters = Some(filters.clone());
        if !self.listeners_attached {
            // The first fetch will carry them.
            return;
        }

        self.jitter_deadline = None;
        self.settle_deadline = None;
        self.guard_deadline = Some(now + self.config.filter_settle());

        if let Some(action) = MapAction::for_filters(&filters) {
            map.apply(action);
        }
        let request = FetchRequest {
            bbox: map.visible_bounds(),
            filters: Some(filters),
        };
        self.request(request, sink);
    }

    /// Success and failure both end the in-flight fetch.
    pub fn on_fetch_complete(&mut self, outcome: FetchOutcome, sink: &mut dyn FetchSink) {
        if !self.in_flight {
            debug!(?outcome, "completion without a fetch in flight");
            return;
        }
        self.in_flight = false;
        if let FetchOutcome::Failed(reason) = &outcome {
            self.stats.failed_fetches += 1;
            warn!(%reason, "list fetch failed");
        }
        if let Some(next) = self.pending.take() {
            self.dispatch(next, sink);
        }
    }

    fn on_settled(&mut self, bbox: BoundingBox, sink: &mut dyn FetchSink) {
        // Compare against the newest intent, queued or sent.
        let latest = self
            .pending
            .as_ref()
            .map(|p| p.bbox)
            .or(self.last_dispatched);
        if latest.is_some_and(|l| bbox.approx_eq(&l, self.config.epsilon_deg)) {
            self.stats.discarded_noise += 1;
            return;
        }
        self.request(
            FetchRequest {
                bbox,
                filters: None,
            },
            sink,
        );
    }

    fn request(&mut self, mut request: FetchRequest, sink: &mut dyn FetchSink) {
        if !self.in_flight {
            self.dispatch(request, sink);
            return;
        }
        if let Some(previous) = self.pending.take() {
            self.stats.coalesced += 1;
            // Newest box wins, but a queued filter change is never lost.
            if request.filters.is_none() {
                request.filters = previous.filters;
            }
        }
        debug!("fetch in flight, request parked");
        self.pending = Some(request);
    }

    fn dispatch(&mut self, request: FetchRequest, sink: &mut dyn FetchSink) {
        self.in_flight = true;
        self.last_dispatched = Some(request.bbox);
        self.stats.dispatched += 1;
        debug!(bbox = ?request.bbox, with_filters = request.filters.is_some(), "dispatching fetch");
        sink.fetch_list(&request);
        sink.fetch_map(&request);
    }
}
