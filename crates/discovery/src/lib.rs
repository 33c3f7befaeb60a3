//! Geospatial place discovery.
//!
//! A validated [`SpatialFilterSet`] drives the [`PlaceQueryEngine`], which runs
//! one of two query shapes against a [`PlaceStore`]:
//! - proximity: ranked by great-circle distance within a radius
//! - worldwide: filtered by tag membership, newest first
//!
//! [`DiscoveryService`] wraps the engine with cursor pagination for result
//! lists and a capped, coordinates-only shape for map markers.

pub mod cursor;
pub mod engine;
pub mod error;
pub mod filters;
pub mod place;
pub mod service;
pub mod store;

pub use cursor::*;
pub use engine::*;
pub use error::*;
pub use filters::*;
pub use place::*;
pub use service::*;
pub use store::*;
