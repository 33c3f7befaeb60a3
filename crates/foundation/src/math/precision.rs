//! Deterministic float ordering.
//!
//! Result ranking and cursor comparison both sort by distance; the order has
//! to be total and identical across pages, so raw `f64` comparisons are not
//! used directly.

use core::cmp::Ordering;

/// Fold `-0.0` into `0.0` and every NaN payload into one NaN.
pub fn canonical_f64(v: f64) -> f64 {
    match v {
        v if v == 0.0 => 0.0,
        v if v.is_nan() => f64::NAN,
        v => v,
    }
}

/// `total_cmp` over canonical values.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// `f64` usable as a sort or map key.
#[derive(Debug, Copy, Clone, Default)]
pub struct StableF64(pub f64);

impl Ord for StableF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        stable_total_cmp_f64(self.0, other.0)
    }
}

impl PartialOrd for StableF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for StableF64 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for StableF64 {}
