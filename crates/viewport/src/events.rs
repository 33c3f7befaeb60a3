//! Event contract between the controller and the host UI.
//!
//! Inbound: [`SyncEvent`]. Outbound: calls on an injected [`FetchSink`] and
//! [`MapWidget`]. Nothing here reaches for ambient globals.

use discovery::{SearchMode, SpatialFilterSet};
use foundation::BoundingBox;
use tokio::sync::mpsc;

/// How a list fetch ended. Both variants count as completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded,
    Failed(String),
}

/// Events the host feeds into the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The map widget finished its initial layout.
    MapReady,
    /// The list widget mounted and can receive data.
    ListMounted,
    /// The map viewport moved (pan, zoom, resize).
    ViewportChanged,
    /// The user edited the search filters.
    FiltersChanged(SpatialFilterSet),
    /// The list widget finished handling the last fetch.
    ListFetchComplete(FetchOutcome),
}

/// Payload of an outbound fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub bbox: BoundingBox,
    /// Present when the fetch was triggered by a filter change.
    pub filters: Option<SpatialFilterSet>,
}

/// Programmatic map moves issued on filter changes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MapAction {
    FitBounds(BoundingBox),
    ShowWorld,
}

impl MapAction {
    /// The move matching a new filter set, if any.
    pub fn for_filters(filters: &SpatialFilterSet) -> Option<Self> {
        match filters.mode() {
            SearchMode::Worldwide => Some(MapAction::ShowWorld),
            SearchMode::Proximity => filters.center().map(|center| {
                MapAction::FitBounds(BoundingBox::around(center, filters.radius_m() as f64))
            }),
        }
    }
}

/// The interactive map, as the controller drives it.
pub trait MapWidget: Send {
    fn visible_bounds(&self) -> BoundingBox;
    fn apply(&mut self, action: MapAction);
}

/// Receiver of outbound fetches (`fetch-list`, `fetch-map`).
pub trait FetchSink: Send {
    fn fetch_list(&mut self, request: &FetchRequest);
    fn fetch_map(&mut self, request: &FetchRequest);
}

/// Outbound fetches as messages.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    FetchList(FetchRequest),
    FetchMap(FetchRequest),
}

/// [`FetchSink`] that forwards every fetch over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<HostCommand>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FetchSink for ChannelSink {
    fn fetch_list(&mut self, request: &FetchRequest) {
        // A closed receiver means the host is gone; nothing left to notify.
        let _ = self.tx.send(HostCommand::FetchList(request.clone()));
    }

    fn fetch_map(&mut self, request: &FetchRequest) {
        let _ = self.tx.send(HostCommand::FetchMap(request.clone()));
    }
}
