//! Client-side synchronization between an interactive map and a result list.
//!
//! Two event streams (viewport changes, filter changes) drive one downstream
//! fetch. [`ViewportState`] holds the ordering rules as a pure state machine
//! with explicit time; [`ViewportSyncController`] runs it on a tokio task and
//! owns the timers.
//!
//! Guarantees:
//! - at most one list fetch in flight
//! - the most recent request always eventually fires (single pending slot)
//! - programmatic map moves never feed back into fetches
//! - filter changes win over viewport noise

pub mod config;
pub mod controller;
pub mod events;
pub mod state;

pub use config::*;
pub use controller::*;
pub use events::*;
pub use state::*;
