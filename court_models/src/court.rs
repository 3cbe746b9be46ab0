//! Court dimensions and the squash-court zone registry.
//!
//! # Coordinate frame
//! - x: across the court, centred on the half-court line
//! - y: up from the floor
//! - z: along the court, front wall at `z = +length / 2`
//!
//! All values are in metres.

use crate::zone::{Zone, ZoneError, ZoneKind, ZoneRegistry, ZoneSpec};
use serde::{Deserialize, Serialize};

/// Physical dimensions of a court.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CourtDimensions {
    /// Floor length, front wall to back wall
    pub length: f64,
    /// Floor width, side wall to side wall
    pub width: f64,
    /// Physical wall height
    pub wall_height: f64,
    /// Top of the tin on the front wall
    pub tin_height: f64,
    /// Height of the out line on the front wall
    pub front_out_line: f64,
    /// Height of the out line on the back wall
    pub back_out_line: f64,
    /// Height of the service line on the front wall
    pub service_line: f64,
    /// Thickness of every collision zone behind its wall surface
    pub zone_depth: f64,
    /// Height above the front out line at which out-zones stop
    pub out_zone_headroom: f64,
}

impl Default for CourtDimensions {
    fn default() -> Self {
        Self {
            length: 9.75,
            width: 6.4,
            wall_height: 5.64,
            tin_height: 0.43,
            front_out_line: 4.57,
            back_out_line: 2.13,
            service_line: 1.78,
            zone_depth: 0.5,
            out_zone_headroom: 2.0,
        }
    }
}

impl CourtDimensions {
    pub fn half_length(&self) -> f64 {
        self.length / 2.0
    }

    pub fn half_width(&self) -> f64 {
        self.width / 2.0
    }

    /// Upper bound of every out-zone.
    pub fn out_zone_ceiling(&self) -> f64 {
        self.front_out_line + self.out_zone_headroom
    }
}

/// Immutable court description handed to the trajectory interpreter.
#[derive(Clone, Debug)]
pub struct CourtGeometry {
    pub dimensions: CourtDimensions,
    pub zones: ZoneRegistry,
}

impl CourtGeometry {
    /// Standard squash court with the default zone layout.
    pub fn squash() -> Self {
        Self::from_dimensions(CourtDimensions::default())
            .expect("default squash court layout is valid")
    }

    /// Build the zone layout for arbitrary dimensions.
    pub fn from_dimensions(dimensions: CourtDimensions) -> Result<Self, ZoneError> {
        let zones = ZoneRegistry::new(squash_zone_specs(&dimensions))?;
        Ok(Self { dimensions, zones })
    }

    /// Use a caller-supplied registry instead of the default layout.
    pub fn with_zones(dimensions: CourtDimensions, specs: Vec<ZoneSpec>) -> Result<Self, ZoneError> {
        let zones = ZoneRegistry::new(specs)?;
        Ok(Self { dimensions, zones })
    }

    pub fn zone(&self, name: &str) -> Option<&Zone> {
        self.zones.get(name)
    }
}

/// Zone specifications for a squash court: every wall band is split into
/// an "in" part and an "out" part.
pub fn squash_zone_specs(d: &CourtDimensions) -> Vec<ZoneSpec> {
    let hw = d.half_width();
    let hl = d.half_length();
    let depth = d.zone_depth;
    let ceiling = d.out_zone_ceiling();

    let front = |name: &str, kind, y0: f64, y1: f64| {
        ZoneSpec::cuboid(name, kind, [-hw, y0, hl], [hw, y1, hl + depth])
    };
    let back = |name: &str, kind, y0: f64, y1: f64| {
        ZoneSpec::cuboid(name, kind, [-hw, y0, -hl - depth], [hw, y1, -hl])
    };

    vec![
        front("front_wall", ZoneKind::In, d.tin_height, d.front_out_line),
        back("back_wall", ZoneKind::In, 0.0, d.back_out_line),
        side_wall_in("left_wall_in", -1.0, d),
        side_wall_in("right_wall_in", 1.0, d),
        front("front_wall_out", ZoneKind::Out, d.front_out_line, ceiling),
        front("tin", ZoneKind::Out, 0.0, d.tin_height),
        back("back_wall_out", ZoneKind::Out, d.back_out_line, ceiling),
        side_wall_out("left_wall_out", -1.0, d),
        side_wall_out("right_wall_out", 1.0, d),
    ]
}

/// Side-wall band below the sloped out line. `side` is -1 for left, +1 for right.
fn side_wall_in(name: &str, side: f64, d: &CourtDimensions) -> ZoneSpec {
    let wall = side * d.half_width();
    let outer = side * (d.half_width() + d.zone_depth);
    let hl = d.half_length();
    ZoneSpec::hexahedron(
        name,
        ZoneKind::In,
        [
            [wall, 0.0, -hl],
            [wall, d.back_out_line, -hl],
            [wall, d.front_out_line, hl],
            [wall, 0.0, hl],
            [outer, 0.0, -hl],
            [outer, d.back_out_line, -hl],
            [outer, d.front_out_line, hl],
            [outer, 0.0, hl],
        ],
    )
}

/// Side-wall band from the sloped out line up to the out-zone ceiling.
fn side_wall_out(name: &str, side: f64, d: &CourtDimensions) -> ZoneSpec {
    let wall = side * d.half_width();
    let outer = side * (d.half_width() + d.zone_depth);
    let hl = d.half_length();
    let top = d.out_zone_ceiling();
    ZoneSpec::hexahedron(
        name,
        ZoneKind::Out,
        [
            [wall, d.back_out_line, -hl],
            [wall, top, -hl],
            [wall, top, hl],
            [wall, d.front_out_line, hl],
            [outer, d.back_out_line, -hl],
            [outer, top, -hl],
            [outer, top, hl],
            [outer, d.front_out_line, hl],
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn squash_layout_has_every_zone() {
        let court = CourtGeometry::squash();
        for name in [
            "front_wall",
            "front_wall_out",
            "tin",
            "back_wall",
            "back_wall_out",
            "left_wall_in",
            "left_wall_out",
            "right_wall_in",
            "right_wall_out",
        ] {
            assert!(court.zone(name).is_some(), "missing zone {name}");
        }
        assert_eq!(court.zones.out_zones().count(), 5);
    }

    #[test]
    fn front_wall_split_at_out_line() {
        let court = CourtGeometry::squash();
        let d = &court.dimensions;
        let above = Vector3::new(0.0, d.front_out_line + 0.5, d.half_length() + 0.1);
        let below = Vector3::new(0.0, d.front_out_line - 0.5, d.half_length() + 0.1);
        assert_eq!(court.zones.locate(&above).map(|z| z.name()), Some("front_wall_out"));
        assert_eq!(court.zones.locate(&below).map(|z| z.name()), Some("front_wall"));
    }

    #[test]
    fn side_wall_out_line_slopes_toward_back() {
        let court = CourtGeometry::squash();
        let d = &court.dimensions;
        let x = -d.half_width() - 0.1;
        // 3 m is above the back-wall out line but below the front-wall one.
        let near_back = Vector3::new(x, 3.0, -d.half_length() + 0.2);
        let near_front = Vector3::new(x, 3.0, d.half_length() - 0.2);
        let left_out = court.zone("left_wall_out").unwrap();
        let left_in = court.zone("left_wall_in").unwrap();
        assert!(left_out.contains(&near_back));
        assert!(!left_in.contains(&near_back));
        assert!(left_in.contains(&near_front));
        assert!(!left_out.contains(&near_front));
    }

    #[test]
    fn centre_of_court_is_in_no_zone() {
        let court = CourtGeometry::squash();
        assert!(court.zones.locate(&Vector3::new(0.0, 1.0, 0.0)).is_none());
    }
}
