//! Collision zones: named 3D volumes tagged "in" or "out".
//!
//! # Shapes
//! - **Cuboid**: axis-aligned box, containment by coordinate ranges.
//! - **Hexahedron**: convex volume given by 8 vertices in any order. At
//!   construction the convex hull is reduced to a set of bounding planes so
//!   that membership is an O(faces) half-space test.
//!
//! # Boundary convention
//! Every face is inclusive: a point lying exactly on a face is inside.
//! Plane tests allow an absolute slack of [`PLANE_TOLERANCE`] metres.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute slack (metres) used for plane-side tests.
pub const PLANE_TOLERANCE: f64 = 1e-9;

/// Whether contact with a zone keeps the ball in play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    In,
    Out,
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneKind::In => write!(f, "in"),
            ZoneKind::Out => write!(f, "out"),
        }
    }
}

/// Geometry errors raised while building a zone registry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ZoneError {
    #[error("zone '{0}': min must not exceed max on any axis")]
    InvertedCuboid(String),
    #[error("zone '{0}': vertices do not span a volume")]
    DegenerateHexahedron(String),
    #[error("zone '{0}' is defined more than once")]
    DuplicateName(String),
    #[error("zone '{0}': coordinates must be finite")]
    NonFinite(String),
}

/// Serializable description of a zone's shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeSpec {
    Cuboid { min: [f64; 3], max: [f64; 3] },
    Hexahedron { vertices: [[f64; 3]; 8] },
}

/// Serializable zone description, as found in configuration files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub name: String,
    pub kind: ZoneKind,
    pub shape: ShapeSpec,
}

impl ZoneSpec {
    pub fn cuboid(name: &str, kind: ZoneKind, min: [f64; 3], max: [f64; 3]) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            shape: ShapeSpec::Cuboid { min, max },
        }
    }

    pub fn hexahedron(name: &str, kind: ZoneKind, vertices: [[f64; 3]; 8]) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            shape: ShapeSpec::Hexahedron { vertices },
        }
    }
}

/// Oriented plane; the inside is `normal · p <= offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f64>,
    pub offset: f64,
}

impl Plane {
    #[inline]
    pub fn signed_distance(&self, p: &Vector3<f64>) -> f64 {
        self.normal.dot(p) - self.offset
    }
}

/// Validated, query-ready zone geometry.
#[derive(Clone, Debug)]
pub enum ZoneShape {
    Cuboid {
        min: Vector3<f64>,
        max: Vector3<f64>,
    },
    Hexahedron {
        vertices: [Vector3<f64>; 8],
        planes: Vec<Plane>,
    },
}

impl ZoneShape {
    fn contains(&self, p: &Vector3<f64>) -> bool {
        match self {
            ZoneShape::Cuboid { min, max } => (0..3).all(|i| min[i] <= p[i] && p[i] <= max[i]),
            ZoneShape::Hexahedron { planes, .. } => planes
                .iter()
                .all(|plane| plane.signed_distance(p) <= PLANE_TOLERANCE),
        }
    }
}

/// A named collision zone.
#[derive(Clone, Debug)]
pub struct Zone {
    name: String,
    kind: ZoneKind,
    shape: ZoneShape,
}

impl Zone {
    pub fn from_spec(spec: &ZoneSpec) -> Result<Self, ZoneError> {
        let shape = match &spec.shape {
            ShapeSpec::Cuboid { min, max } => {
                if min.iter().chain(max.iter()).any(|v| !v.is_finite()) {
                    return Err(ZoneError::NonFinite(spec.name.clone()));
                }
                if (0..3).any(|i| min[i] > max[i]) {
                    return Err(ZoneError::InvertedCuboid(spec.name.clone()));
                }
                ZoneShape::Cuboid {
                    min: Vector3::from(*min),
                    max: Vector3::from(*max),
                }
            }
            ShapeSpec::Hexahedron { vertices } => {
                if vertices.iter().flatten().any(|v| !v.is_finite()) {
                    return Err(ZoneError::NonFinite(spec.name.clone()));
                }
                let vertices = (*vertices).map(Vector3::from);
                let planes = hull_planes(&vertices)
                    .ok_or_else(|| ZoneError::DegenerateHexahedron(spec.name.clone()))?;
                ZoneShape::Hexahedron { vertices, planes }
            }
        };
        Ok(Self {
            name: spec.name.clone(),
            kind: spec.kind,
            shape,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ZoneKind {
        self.kind
    }

    pub fn shape(&self) -> &ZoneShape {
        &self.shape
    }

    pub fn is_out(&self) -> bool {
        self.kind == ZoneKind::Out
    }

    /// Deterministic membership test (inclusive faces).
    pub fn contains(&self, p: &Vector3<f64>) -> bool {
        self.shape.contains(p)
    }
}

/// Bounding planes of the convex hull of `vertices`.
///
/// Every vertex triple spanning a plane with all other vertices on one side
/// is a supporting plane; duplicates (coplanar faces seen from several
/// triples) are merged. Returns `None` when the points do not span a volume.
fn hull_planes(vertices: &[Vector3<f64>; 8]) -> Option<Vec<Plane>> {
    let n = vertices.len();
    let mut planes: Vec<Plane> = Vec::new();
    let mut spans_volume = false;

    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let cross = (vertices[j] - vertices[i]).cross(&(vertices[k] - vertices[i]));
                let norm = cross.norm();
                if norm < PLANE_TOLERANCE {
                    continue; // collinear triple
                }
                let normal = cross / norm;
                let offset = normal.dot(&vertices[i]);
                let (mut above, mut below) = (false, false);
                for v in vertices {
                    let d = normal.dot(v) - offset;
                    above |= d > PLANE_TOLERANCE;
                    below |= d < -PLANE_TOLERANCE;
                }
                let plane = match (above, below) {
                    (false, false) => continue, // all coplanar with this triple
                    (true, true) => {
                        spans_volume = true;
                        continue; // interior cut
                    }
                    (false, true) => Plane { normal, offset },
                    (true, false) => Plane {
                        normal: -normal,
                        offset: -offset,
                    },
                };
                spans_volume = true;
                let duplicate = planes.iter().any(|q| {
                    (q.normal - plane.normal).norm() < 1e-9 && (q.offset - plane.offset).abs() < 1e-9
                });
                if !duplicate {
                    planes.push(plane);
                }
            }
        }
    }

    (spans_volume && planes.len() >= 4).then_some(planes)
}

/// Immutable, ordered collection of zones.
#[derive(Clone, Debug, Default)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
}

impl ZoneRegistry {
    pub fn new(specs: Vec<ZoneSpec>) -> Result<Self, ZoneError> {
        let mut zones: Vec<Zone> = Vec::with_capacity(specs.len());
        for spec in &specs {
            if zones.iter().any(|z| z.name == spec.name) {
                return Err(ZoneError::DuplicateName(spec.name.clone()));
            }
            zones.push(Zone::from_spec(spec)?);
        }
        Ok(Self { zones })
    }

    pub fn get(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    pub fn out_zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(|z| z.is_out())
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// First zone (in registry order) containing `p`.
    pub fn locate(&self, p: &Vector3<f64>) -> Option<&Zone> {
        self.zones.iter().find(|z| z.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube_vertices() -> [[f64; 3]; 8] {
        // Deliberately unordered.
        [
            [1., 1., 1.],
            [0., 0., 0.],
            [1., 0., 0.],
            [0., 1., 1.],
            [0., 1., 0.],
            [1., 0., 1.],
            [0., 0., 1.],
            [1., 1., 0.],
        ]
    }

    #[test]
    fn cube_hull_has_six_faces() {
        let verts = unit_cube_vertices().map(Vector3::from);
        let planes = hull_planes(&verts).unwrap();
        assert_eq!(planes.len(), 6);
    }

    #[test]
    fn hexahedron_matches_cuboid_membership() {
        let hex = Zone::from_spec(&ZoneSpec::hexahedron("h", ZoneKind::Out, unit_cube_vertices()))
            .unwrap();
        let cub = Zone::from_spec(&ZoneSpec::cuboid("c", ZoneKind::Out, [0.; 3], [1.; 3])).unwrap();
        for p in [
            Vector3::new(0.5, 0.5, 0.5),
            Vector3::new(1.5, 0.5, 0.5),
            Vector3::new(0.5, -0.1, 0.5),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.3, 0.7),
        ] {
            assert_eq!(hex.contains(&p), cub.contains(&p), "disagree at {p:?}");
        }
    }

    #[test]
    fn face_points_are_inside_every_time() {
        let hex = Zone::from_spec(&ZoneSpec::hexahedron("h", ZoneKind::In, unit_cube_vertices()))
            .unwrap();
        let cub = Zone::from_spec(&ZoneSpec::cuboid("c", ZoneKind::In, [0.; 3], [1.; 3])).unwrap();
        let on_face = Vector3::new(1.0, 0.25, 0.75);
        for _ in 0..10 {
            assert!(hex.contains(&on_face));
            assert!(cub.contains(&on_face));
        }
    }

    #[test]
    fn flat_hexahedron_is_rejected() {
        let mut verts = unit_cube_vertices();
        for v in &mut verts {
            v[2] = 0.0;
        }
        let err = Zone::from_spec(&ZoneSpec::hexahedron("flat", ZoneKind::In, verts)).unwrap_err();
        assert_eq!(err, ZoneError::DegenerateHexahedron("flat".into()));
    }

    #[test]
    fn inverted_cuboid_is_rejected() {
        let err = Zone::from_spec(&ZoneSpec::cuboid("bad", ZoneKind::In, [1., 0., 0.], [0., 1., 1.]))
            .unwrap_err();
        assert_eq!(err, ZoneError::InvertedCuboid("bad".into()));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let spec = ZoneSpec::cuboid("z", ZoneKind::In, [0.; 3], [1.; 3]);
        let err = ZoneRegistry::new(vec![spec.clone(), spec]).unwrap_err();
        assert_eq!(err, ZoneError::DuplicateName("z".into()));
    }
}
