//! Vector wrappers: layers, features (cursor-advance shape), field maps
//! (materialized-map shape), and geometry.

mod features;
mod fields;
mod geometry;

pub use features::{Feature, LayerFeatures};
pub use fields::FeatureFields;
pub use geometry::Geometry;

use crate::dataset::SharedVector;
use crate::error::Result;
use crate::facade;
use crate::handle::Handle;
use crate::native::{FieldDefn, FieldType, GeometryType};

/// One vector layer of an open dataset.
#[derive(Clone)]
pub struct Layer {
    vector: SharedVector,
    index: usize,
    handle: Handle,
}

impl Layer {
    pub(crate) fn new(vector: SharedVector, index: usize, handle: Handle) -> Self {
        Self {
            vector,
            index,
            handle,
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub(crate) fn vector_arc(&self) -> SharedVector {
        self.vector.clone()
    }

    pub(crate) fn layer_index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> Result<String> {
        facade::call(&self.handle, || {
            Ok(self.vector.lock().layer(self.index)?.name().to_string())
        })
    }

    pub fn geometry_type(&self) -> Result<GeometryType> {
        facade::call(&self.handle, || {
            Ok(self.vector.lock().layer(self.index)?.geometry_type())
        })
    }

    /// Appends a field to the layer schema.
    pub fn create_field(&self, name: &str, field_type: FieldType) -> Result<()> {
        facade::call(&self.handle, || {
            self.vector
                .lock()
                .layer_mut(self.index)?
                .add_field(FieldDefn::new(name, field_type))
                .map_err(Into::into)
        })
    }

    /// Index of a named field in the schema, for algorithm options.
    pub fn field_index(&self, name: &str) -> Result<Option<usize>> {
        facade::call(&self.handle, || {
            Ok(self.vector.lock().layer(self.index)?.field_index(name))
        })
    }

    /// The layer's feature collection (cursor-advance shape).
    pub fn features(&self) -> LayerFeatures {
        LayerFeatures::new(self.vector.clone(), self.index, self.handle.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    #[test]
    fn test_layer_schema() {
        let dataset = Dataset::open_memory_vector().unwrap();
        let layer = dataset.create_layer("roads", GeometryType::LineString).unwrap();
        layer.create_field("id", FieldType::Integer).unwrap();
        layer.create_field("name", FieldType::Text).unwrap();
        assert_eq!(layer.field_index("name").unwrap(), Some(1));
        assert_eq!(layer.field_index("missing").unwrap(), None);
        assert!(layer.create_field("id", FieldType::Integer).is_err());
    }
}
