pub mod bounds;
pub mod coord;
pub mod math;

// Foundation crate: small, well-tested geographic primitives only.
pub use bounds::*;
pub use coord::*;
pub use math::{StableF64, haversine_m, stable_total_cmp_f64};
