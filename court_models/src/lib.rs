//! `court_models` — Court geometry, collision zones, pixel→world mappings.

pub mod court;
pub mod projection;
pub mod zone;

pub use court::{CourtDimensions, CourtGeometry};
pub use projection::{AffineMapping, PlanarHomography, WorldMapping};
pub use zone::{ShapeSpec, Zone, ZoneError, ZoneKind, ZoneRegistry, ZoneSpec};
