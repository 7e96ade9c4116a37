//! The native collaborator boundary.
//!
//! This module defines the interface surface the bridge layer consumes:
//! status codes, the progress callback shape, and the field/geometry
//! primitives that cross the boundary. The [`mem`] submodule provides the
//! in-memory collaborator (the analog of the MEM and Memory drivers) and
//! [`alg`] the long-running algorithm entry points.
//!
//! Everything above this module treats these types as opaque: the bridge
//! never reaches into collaborator internals, it only invokes entry points
//! and maps status codes into the crate error taxonomy.

pub mod alg;
pub mod mem;

use serde_json::Value;
use std::fmt;

// =============================================================================
// Status codes
// =============================================================================

/// No error.
pub const CODE_NONE: i32 = 0;
/// Application-defined error.
pub const CODE_APP_DEFINED: i32 = 1;
/// An argument was out of range or otherwise illegal.
pub const CODE_ILLEGAL_ARG: i32 = 2;
/// The operation was interrupted by the progress callback returning `false`.
pub const CODE_INTERRUPTED: i32 = 3;
/// Generic failure.
pub const CODE_FAILURE: i32 = 4;

// =============================================================================
// Native error
// =============================================================================

/// A failure reported by the native collaborator.
///
/// Carries the raw status code and message exactly as the native side
/// produced them; mapping into the crate taxonomy happens once, at the
/// façade boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub code: i32,
    pub message: String,
}

impl NativeError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn illegal_arg(message: impl Into<String>) -> Self {
        Self::new(CODE_ILLEGAL_ARG, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(CODE_FAILURE, message)
    }

    /// The status a native algorithm returns after observing an abort
    /// request at a progress callback.
    pub fn interrupted() -> Self {
        Self::new(CODE_INTERRUPTED, "operation interrupted by caller")
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for NativeError {}

/// Result alias for calls below the collaborator boundary.
pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// Progress callback passed into long-running native entry points.
///
/// Invoked with `(fraction in [0, 1], message)`; returning `false` asks the
/// algorithm to abort cooperatively, which it acknowledges by returning
/// [`NativeError::interrupted`].
pub type ProgressFn<'a> = &'a mut dyn FnMut(f64, &str) -> bool;

// =============================================================================
// Connectedness
// =============================================================================

/// Pixel connectedness for region-based raster algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectedness {
    Four,
    Eight,
}

// =============================================================================
// Fields
// =============================================================================

/// Field data types supported by vector layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Real,
    Text,
}

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
}

impl FieldValue {
    /// Converts to the JSON-equivalent representation used by field maps.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Integer(v) => Value::from(*v),
            FieldValue::Real(v) => Value::from(*v),
            FieldValue::Text(v) => Value::from(v.clone()),
            FieldValue::Null => Value::Null,
        }
    }

    /// Numeric view of the value, when it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Real(v) => Some(*v),
            _ => None,
        }
    }
}

/// Field definition: name plus type, in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefn {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldDefn {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

// =============================================================================
// Geometry
// =============================================================================

/// Geometry types supported by the in-memory collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    LineString,
    Polygon,
}

/// Native geometry representation in pixel/ground coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeGeometry {
    LineString(Vec<(f64, f64)>),
    /// Rings; the first is the exterior.
    Polygon(Vec<Vec<(f64, f64)>>),
}

impl NativeGeometry {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            NativeGeometry::LineString(_) => GeometryType::LineString,
            NativeGeometry::Polygon(_) => GeometryType::Polygon,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            NativeGeometry::LineString(pts) => pts.len() < 2,
            NativeGeometry::Polygon(rings) => {
                rings.is_empty() || rings.iter().all(|r| r.len() < 4)
            }
        }
    }

    /// Serializes to the GeoJSON-equivalent object graph.
    pub fn to_geojson(&self) -> Value {
        fn coords(pts: &[(f64, f64)]) -> Value {
            Value::Array(pts.iter().map(|(x, y)| Value::from(vec![*x, *y])).collect())
        }
        match self {
            NativeGeometry::LineString(pts) => serde_json::json!({
                "type": "LineString",
                "coordinates": coords(pts),
            }),
            NativeGeometry::Polygon(rings) => serde_json::json!({
                "type": "Polygon",
                "coordinates": rings.iter().map(|r| coords(r)).collect::<Vec<_>>(),
            }),
        }
    }
}
