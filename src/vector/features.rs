//! Feature collection (cursor-advance shape) and the feature wrapper.

use super::{FeatureFields, Geometry};
use crate::bridge::{Bridge, WorkHandle};
use crate::dataset::SharedVector;
use crate::error::Result;
use crate::facade;
use crate::handle::{registry, Handle};
use crate::iter::{for_each_cursor, AsyncCursorIter, CursorCollection, CursorIter};
use crate::native::{FieldValue, NativeGeometry};
use std::ops::ControlFlow;

/// The feature collection of a layer.
///
/// Cursor-advance shape: the read position lives in the native layer and
/// is shared by every collection clone and iteration session. Starting a
/// new walk with [`first`](Self::first) rewinds that shared position, so
/// two concurrently live sessions interleave rather than iterate
/// independently. That mirrors the native cursor contract and is
/// documented behavior, not a defect.
#[derive(Clone)]
pub struct LayerFeatures {
    vector: SharedVector,
    layer_index: usize,
    handle: Handle,
}

impl LayerFeatures {
    pub(crate) fn new(vector: SharedVector, layer_index: usize, handle: Handle) -> Self {
        Self {
            vector,
            layer_index,
            handle,
        }
    }

    /// Number of features in the layer.
    pub fn count(&self) -> Result<usize> {
        facade::call(&self.handle, || {
            Ok(self.vector.lock().layer(self.layer_index)?.feature_count())
        })
    }

    /// Async form of [`count`](Self::count).
    pub async fn count_async(&self, bridge: &Bridge) -> Result<usize> {
        let vector = self.vector.clone();
        let layer_index = self.layer_index;
        bridge
            .submit(&self.handle, move |_| {
                Ok(vector.lock().layer(layer_index)?.feature_count())
            })
            .wait()
            .await
    }

    /// Rewinds the shared cursor and returns the first feature, or `None`
    /// for an empty layer. Calling this after exhaustion resets the walk.
    pub fn first(&self) -> Result<Option<Feature>> {
        facade::call(&self.handle, || {
            let mut vector = self.vector.lock();
            let layer = vector.layer_mut(self.layer_index)?;
            layer.reset_reading();
            let fid = layer.next_feature();
            drop(vector);
            Ok(fid.map(|fid| self.wrapper(fid)))
        })
    }

    /// Advances the shared cursor, returning `None` once exhausted.
    pub fn next(&self) -> Result<Option<Feature>> {
        facade::call(&self.handle, || {
            let fid = self.vector.lock().layer_mut(self.layer_index)?.next_feature();
            Ok(fid.map(|fid| self.wrapper(fid)))
        })
    }

    /// Async form of [`first`](Self::first).
    pub async fn first_async(&self, bridge: &Bridge) -> Result<Option<Feature>> {
        self.rewind_async(bridge).wait().await
    }

    /// Async form of [`next`](Self::next).
    pub async fn next_async(&self, bridge: &Bridge) -> Result<Option<Feature>> {
        self.advance_async(bridge).wait().await
    }

    /// Appends a feature; `values` must match the layer schema in order.
    pub fn add(&self, geometry: NativeGeometry, values: Vec<FieldValue>) -> Result<Feature> {
        let fid = facade::call(&self.handle, || {
            self.vector
                .lock()
                .layer_mut(self.layer_index)?
                .create_feature(geometry, values)
                .map_err(Into::into)
        })?;
        Ok(self.wrapper(fid))
    }

    /// Callback walk; visits features in cursor order with a 0-based
    /// ordinal, stopping early on `ControlFlow::Break`. Rewinds the shared
    /// cursor first.
    pub fn for_each<F>(&self, visitor: F) -> Result<()>
    where
        F: FnMut(Feature, usize) -> ControlFlow<()>,
    {
        for_each_cursor(self, visitor)
    }

    /// Blocking iteration session. Its first fetch rewinds the shared
    /// cursor.
    pub fn iter(&self) -> CursorIter<LayerFeatures> {
        CursorIter::new(self.clone())
    }

    /// Async iteration session; each fetch suspends through the bridge.
    pub fn iter_async(&self, bridge: &Bridge) -> AsyncCursorIter<LayerFeatures> {
        AsyncCursorIter::new(self.clone(), bridge.clone())
    }

    fn wrapper(&self, fid: usize) -> Feature {
        Feature {
            vector: self.vector.clone(),
            layer_index: self.layer_index,
            fid,
            handle: registry().register_child(&self.handle),
        }
    }
}

impl CursorCollection for LayerFeatures {
    type Item = Feature;

    fn rewind(&self) -> Result<Option<Feature>> {
        self.first()
    }

    fn advance(&self) -> Result<Option<Feature>> {
        self.next()
    }

    fn rewind_async(&self, bridge: &Bridge) -> WorkHandle<Option<Feature>> {
        let collection = self.clone();
        bridge.submit(&self.handle, move |_| {
            let mut vector = collection.vector.lock();
            let layer = vector.layer_mut(collection.layer_index)?;
            layer.reset_reading();
            let fid = layer.next_feature();
            drop(vector);
            Ok(fid.map(|fid| collection.wrapper(fid)))
        })
    }

    fn advance_async(&self, bridge: &Bridge) -> WorkHandle<Option<Feature>> {
        let collection = self.clone();
        bridge.submit(&self.handle, move |_| {
            let fid = collection
                .vector
                .lock()
                .layer_mut(collection.layer_index)?
                .next_feature();
            Ok(fid.map(|fid| collection.wrapper(fid)))
        })
    }
}

/// One feature of a layer.
#[derive(Clone)]
pub struct Feature {
    vector: SharedVector,
    layer_index: usize,
    fid: usize,
    handle: Handle,
}

impl Feature {
    pub fn fid(&self) -> usize {
        self.fid
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The feature's field map (materialized-map shape).
    pub fn fields(&self) -> FeatureFields {
        FeatureFields::new(
            self.vector.clone(),
            self.layer_index,
            self.fid,
            registry().register_child(&self.handle),
        )
    }

    /// Snapshot of the feature's geometry.
    pub fn geometry(&self) -> Result<Geometry> {
        facade::call(&self.handle, || {
            let vector = self.vector.lock();
            let feature = vector.layer(self.layer_index)?.feature(self.fid)?;
            Ok(Geometry::new(feature.geometry.clone()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::native::GeometryType;

    fn layer_with(n: usize) -> (Dataset, crate::vector::Layer) {
        let dataset = Dataset::open_memory_vector().unwrap();
        let layer = dataset.create_layer("l", GeometryType::LineString).unwrap();
        for i in 0..n {
            layer
                .features()
                .add(
                    NativeGeometry::LineString(vec![(0.0, i as f64), (1.0, i as f64)]),
                    vec![],
                )
                .unwrap();
        }
        (dataset, layer)
    }

    #[test]
    fn test_first_next_walk_and_rewind() {
        let (_dataset, layer) = layer_with(3);
        let features = layer.features();
        let mut fids = Vec::new();
        let mut current = features.first().unwrap();
        while let Some(feature) = current {
            fids.push(feature.fid());
            current = features.next().unwrap();
        }
        assert_eq!(fids, vec![0, 1, 2]);
        // first() after exhaustion rewinds.
        assert_eq!(features.first().unwrap().unwrap().fid(), 0);
    }

    #[test]
    fn test_for_each_ordinals_are_zero_based() {
        let (_dataset, layer) = layer_with(2);
        let mut seen = Vec::new();
        layer
            .features()
            .for_each(|feature, ordinal| {
                seen.push((feature.fid(), ordinal));
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(seen, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_closed_dataset_terminates_iteration_with_error() {
        let (dataset, layer) = layer_with(3);
        let mut session = layer.features().iter();
        assert!(session.next().unwrap().is_ok());
        dataset.close();
        assert!(session.next().unwrap().is_err());
        assert!(session.next().is_none(), "sequence fuses after the error");
    }
}
