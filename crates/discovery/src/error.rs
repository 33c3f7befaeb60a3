//! Error types for filter validation and query execution.

use thiserror::Error;

/// A filter set violated a hard constraint.
///
/// Raised by validation under [`ValidationPolicy::Throw`](crate::ValidationPolicy)
/// and by the service when handed a filter set that fails its limits. Always
/// surfaced to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidFilterError {
    #[error("radius {radius_m} m outside [{min_m}, {max_m}]")]
    RadiusOutOfRange { radius_m: i64, min_m: u32, max_m: u32 },

    #[error("unknown search mode: {0:?}")]
    UnknownMode(String),

    #[error("invalid coordinates: latitude={latitude:?} longitude={longitude:?}")]
    InvalidCoordinates {
        latitude: Option<f64>,
        longitude: Option<f64>,
    },

    #[error("malformed cursor: {0}")]
    MalformedCursor(String),

    #[error("{count} tags given, at most {max} allowed")]
    TooManyTags { count: usize, max: usize },

    /// A boundary value that is not a number at all.
    #[error("{field} is not a number: {value:?}")]
    Unparseable { field: &'static str, value: String },
}

/// The place store could not answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("place store unavailable: {0}")]
    Unavailable(String),

    #[error("place store query failed: {0}")]
    Query(String),
}

/// Errors surfaced by [`PlaceQueryEngine`](crate::PlaceQueryEngine) and
/// [`DiscoveryService`](crate::DiscoveryService).
///
/// Empty results are not errors: a proximity search without coordinates or a
/// worldwide search without tags returns `Ok` with nothing in it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscoveryError {
    #[error(transparent)]
    InvalidFilter(#[from] InvalidFilterError),

    #[error(transparent)]
    Upstream(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
