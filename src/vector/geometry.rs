//! Geometry wrapper.
//!
//! Serialization to the GeoJSON-equivalent object graph is produced by the
//! native collaborator; this wrapper only exposes it.

use crate::native::{GeometryType, NativeGeometry};
use serde_json::Value;

/// A snapshot of one feature's geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    inner: NativeGeometry,
}

impl Geometry {
    pub(crate) fn new(inner: NativeGeometry) -> Self {
        Self { inner }
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.inner.geometry_type()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The GeoJSON-equivalent object representation.
    pub fn to_object(&self) -> Value {
        self.inner.to_geojson()
    }
}
