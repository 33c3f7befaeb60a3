//! Opaque pagination cursors.
//!
//! A cursor names the last row a client has seen, keyed by the ordering the
//! engine used to produce it. The token is URL-safe base64 over a compact
//! JSON key. Callers must treat it as opaque.

use std::cmp::Ordering;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use foundation::StableF64;
use serde::{Deserialize, Serialize};

use crate::error::InvalidFilterError;
use crate::filters::SearchMode;
use crate::place::PlaceId;

/// Resume position under the engine's ordering for one search mode.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "m")]
pub enum CursorKey {
    /// Ascending distance, then ascending id.
    #[serde(rename = "p")]
    Proximity {
        #[serde(rename = "d")]
        distance_m: f64,
        id: PlaceId,
    },
    /// Descending creation time, then ascending id.
    #[serde(rename = "w")]
    Worldwide {
        #[serde(rename = "t")]
        created_at_ms: i64,
        id: PlaceId,
    },
}

impl CursorKey {
    pub fn mode(&self) -> SearchMode {
        match self {
            CursorKey::Proximity { .. } => SearchMode::Proximity,
            CursorKey::Worldwide { .. } => SearchMode::Worldwide,
        }
    }

    /// Position of `self` relative to `other` in result order.
    ///
    /// Keys of different modes are incomparable and yield `None`.
    pub fn cmp_in_order(&self, other: &CursorKey) -> Option<Ordering> {
        match (self, other) {
            (
                CursorKey::Proximity { distance_m: da, id: ia },
                CursorKey::Proximity { distance_m: db, id: ib },
            ) => Some(StableF64(*da).cmp(&StableF64(*db)).then_with(|| ia.cmp(ib))),
            (
                CursorKey::Worldwide { created_at_ms: ta, id: ia },
                CursorKey::Worldwide { created_at_ms: tb, id: ib },
            ) => Some(tb.cmp(ta).then_with(|| ia.cmp(ib))),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Cursor(CursorKey);

impl Cursor {
    pub fn new(key: CursorKey) -> Self {
        Self(key)
    }

    pub fn key(&self) -> &CursorKey {
        &self.0
    }

    pub fn encode(&self) -> String {
        // Serializing a plain enum of numbers cannot fail.
        let json = serde_json::to_vec(&self.0).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, InvalidFilterError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| InvalidFilterError::MalformedCursor(e.to_string()))?;
        let key: CursorKey = serde_json::from_slice(&bytes)
            .map_err(|e| InvalidFilterError::MalformedCursor(e.to_string()))?;
        if let CursorKey::Proximity { distance_m, .. } = key
            && !(distance_m.is_finite() && distance_m >= 0.0)
        {
            return Err(InvalidFilterError::MalformedCursor(format!(
                "distance {distance_m} out of range"
            )));
        }
        Ok(Self(key))
    }
}
