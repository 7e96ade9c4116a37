//! Feature field map (materialized-map shape).

use crate::dataset::SharedVector;
use crate::error::{BridgeError, Result};
use crate::facade;
use crate::handle::Handle;
use serde_json::{Map, Value};
use std::ops::ControlFlow;

/// The field map of one feature.
///
/// Materialized-map shape: there is no persistent cursor. Each traversal
/// fetches the whole map once ([`to_object`](Self::to_object)) and then
/// walks it locally, in schema insertion order rather than sorted.
#[derive(Clone)]
pub struct FeatureFields {
    vector: SharedVector,
    layer_index: usize,
    fid: usize,
    handle: Handle,
}

impl FeatureFields {
    pub(crate) fn new(
        vector: SharedVector,
        layer_index: usize,
        fid: usize,
        handle: Handle,
    ) -> Self {
        Self {
            vector,
            layer_index,
            fid,
            handle,
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Snapshots the entire field map in one fetch. Entry order is the
    /// layer's schema order.
    pub fn to_object(&self) -> Result<Map<String, Value>> {
        facade::call(&self.handle, || {
            let vector = self.vector.lock();
            let layer = vector.layer(self.layer_index)?;
            let feature = layer.feature(self.fid)?;
            let mut object = Map::new();
            for (defn, value) in layer.fields().iter().zip(&feature.values) {
                object.insert(defn.name.clone(), value.to_json());
            }
            Ok(object)
        })
    }

    /// Serializes the field map as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.to_object()?)
            .map_err(|err| BridgeError::Marshaling(err.to_string()))
    }

    /// Value of a named field; `None` when the schema has no such field.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        facade::call(&self.handle, || {
            let vector = self.vector.lock();
            let layer = vector.layer(self.layer_index)?;
            let Some(index) = layer.field_index(name) else {
                return Ok(None);
            };
            let feature = layer.feature(self.fid)?;
            Ok(Some(feature.values[index].to_json()))
        })
    }

    /// Callback walk over the snapshot, `(name, value)` per entry, early-
    /// stoppable with `ControlFlow::Break`.
    pub fn for_each<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(&str, &Value) -> ControlFlow<()>,
    {
        let object = self.to_object()?;
        for (name, value) in &object {
            if visitor(name, value).is_break() {
                break;
            }
        }
        Ok(())
    }
}
