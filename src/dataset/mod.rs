//! Dataset wrappers over the in-memory collaborator.
//!
//! A [`Dataset`] owns its handle: dropping the wrapper closes it, and
//! closing releases the native resource exactly once. Child wrappers
//! (bands, layers, features) hold handles subordinate to the dataset's,
//! so any operation through them fails fast once the dataset closes.

mod bands;

pub use bands::{DatasetBands, RasterBand};

use crate::error::Result;
use crate::facade;
use crate::handle::{registry, Handle};
use crate::native::mem::{MemRaster, MemVector};
use crate::native::{GeometryType, NativeError};
use crate::vector::Layer;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub(crate) type SharedRaster = Arc<Mutex<MemRaster>>;
pub(crate) type SharedVector = Arc<Mutex<MemVector>>;

enum DatasetKind {
    Raster(SharedRaster),
    Vector(SharedVector),
}

/// An open dataset, raster- or vector-flavored.
pub struct Dataset {
    kind: DatasetKind,
    handle: Handle,
}

impl Dataset {
    /// Opens a new in-memory raster dataset of `band_count` zero-filled
    /// bands.
    pub fn open_memory_raster(width: usize, height: usize, band_count: usize) -> Result<Self> {
        let raster = MemRaster::new(width, height, band_count)?;
        let shared = Arc::new(Mutex::new(raster));
        let native = Arc::clone(&shared);
        let handle = registry().register_with_release(move || drop(native));
        debug!(handle = %handle.id(), width, height, band_count, "opened in-memory raster");
        Ok(Self {
            kind: DatasetKind::Raster(shared),
            handle,
        })
    }

    /// Opens a new, empty in-memory vector dataset.
    pub fn open_memory_vector() -> Result<Self> {
        let shared = Arc::new(Mutex::new(MemVector::new()));
        let native = Arc::clone(&shared);
        let handle = registry().register_with_release(move || drop(native));
        debug!(handle = %handle.id(), "opened in-memory vector dataset");
        Ok(Self {
            kind: DatasetKind::Vector(shared),
            handle,
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Closes the dataset. Idempotent; all child wrappers become unusable.
    pub fn close(&self) {
        self.handle.close();
    }

    fn raster(&self) -> Result<&SharedRaster> {
        match &self.kind {
            DatasetKind::Raster(raster) => Ok(raster),
            DatasetKind::Vector(_) => {
                Err(NativeError::illegal_arg("dataset has no raster bands").into())
            }
        }
    }

    fn vector(&self) -> Result<&SharedVector> {
        match &self.kind {
            DatasetKind::Vector(vector) => Ok(vector),
            DatasetKind::Raster(_) => {
                Err(NativeError::illegal_arg("dataset has no vector layers").into())
            }
        }
    }

    /// The dataset's band collection (indexed shape).
    pub fn bands(&self) -> Result<DatasetBands> {
        Ok(DatasetBands::new(
            Arc::clone(self.raster()?),
            self.handle.clone(),
        ))
    }

    /// Creates a new vector layer, returning its wrapper.
    pub fn create_layer(&self, name: &str, geometry_type: GeometryType) -> Result<Layer> {
        let vector = self.vector()?;
        let index = facade::call(&self.handle, || {
            Ok(vector.lock().create_layer(name, geometry_type))
        })?;
        debug!(handle = %self.handle.id(), layer = name, "created layer");
        Ok(Layer::new(
            Arc::clone(vector),
            index,
            registry().register_child(&self.handle),
        ))
    }

    /// Layer access, 0-based.
    pub fn layer(&self, index: usize) -> Result<Layer> {
        let vector = self.vector()?;
        facade::call(&self.handle, || {
            vector.lock().layer(index).map(|_| ()).map_err(Into::into)
        })?;
        Ok(Layer::new(
            Arc::clone(vector),
            index,
            registry().register_child(&self.handle),
        ))
    }

    pub fn layer_count(&self) -> Result<usize> {
        let vector = self.vector()?;
        facade::call(&self.handle, || Ok(vector.lock().layer_count()))
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        registry().finalize(self.handle.id());
    }
}
