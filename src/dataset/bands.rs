//! Raster band collection (indexed shape) and the band wrapper.

use super::SharedRaster;
use crate::bridge::{Bridge, WorkHandle};
use crate::error::Result;
use crate::facade;
use crate::handle::{registry, Handle};
use crate::iter::{for_each_indexed, AsyncIndexedIter, IndexedCollection, IndexedIter};
use std::ops::ControlFlow;
use std::sync::Arc;

/// The band collection of a raster dataset.
///
/// Indexed shape: 1-based positions against a live count. Iteration
/// sessions re-read the count on demand, so bands created while a session
/// is live are visited.
#[derive(Clone)]
pub struct DatasetBands {
    raster: SharedRaster,
    handle: Handle,
}

impl DatasetBands {
    pub(crate) fn new(raster: SharedRaster, handle: Handle) -> Self {
        Self { raster, handle }
    }

    /// Number of bands.
    pub fn count(&self) -> Result<usize> {
        facade::call(&self.handle, || Ok(self.raster.lock().band_count()))
    }

    /// Async form of [`count`](Self::count).
    pub async fn count_async(&self, bridge: &Bridge) -> Result<usize> {
        self.live_count_async(bridge).wait().await
    }

    /// Band at a 1-based index.
    pub fn get(&self, index: usize) -> Result<RasterBand> {
        facade::call(&self.handle, || {
            self.raster.lock().band(index).map(|_| ()).map_err(Into::into)
        })?;
        Ok(self.wrapper(index))
    }

    /// Async form of [`get`](Self::get).
    pub async fn get_async(&self, bridge: &Bridge, index: usize) -> Result<RasterBand> {
        self.fetch_async(bridge, index).wait().await
    }

    /// Appends a new zero-filled band and returns its wrapper.
    pub fn create(&self) -> Result<RasterBand> {
        let index = facade::call(&self.handle, || Ok(self.raster.lock().add_band()))?;
        Ok(self.wrapper(index))
    }

    /// Callback walk; the visitor receives each band with its 1-based
    /// index and may stop early with `ControlFlow::Break`.
    pub fn for_each<F>(&self, visitor: F) -> Result<()>
    where
        F: FnMut(RasterBand, usize) -> ControlFlow<()>,
    {
        for_each_indexed(self, visitor)
    }

    /// Blocking iteration session starting at band 1.
    pub fn iter(&self) -> IndexedIter<DatasetBands> {
        IndexedIter::new(self.clone())
    }

    /// Async iteration session; each fetch suspends through the bridge.
    pub fn iter_async(&self, bridge: &Bridge) -> AsyncIndexedIter<DatasetBands> {
        AsyncIndexedIter::new(self.clone(), bridge.clone())
    }

    fn wrapper(&self, index: usize) -> RasterBand {
        RasterBand {
            raster: Arc::clone(&self.raster),
            index,
            handle: registry().register_child(&self.handle),
        }
    }
}

impl IndexedCollection for DatasetBands {
    type Item = RasterBand;

    fn live_count(&self) -> Result<usize> {
        self.count()
    }

    fn fetch(&self, index: usize) -> Result<RasterBand> {
        self.get(index)
    }

    fn live_count_async(&self, bridge: &Bridge) -> WorkHandle<usize> {
        let raster = Arc::clone(&self.raster);
        bridge.submit(&self.handle, move |_| Ok(raster.lock().band_count()))
    }

    fn fetch_async(&self, bridge: &Bridge, index: usize) -> WorkHandle<RasterBand> {
        let raster = Arc::clone(&self.raster);
        let parent = self.handle.clone();
        bridge.submit(&self.handle, move |_| {
            raster.lock().band(index)?;
            Ok(RasterBand {
                raster: Arc::clone(&raster),
                index,
                handle: registry().register_child(&parent),
            })
        })
    }
}

/// One raster band of an open dataset.
///
/// Cheap to clone; all clones address the same native band. Pixel windows
/// are row-major `f64` samples.
#[derive(Clone)]
pub struct RasterBand {
    raster: SharedRaster,
    index: usize,
    handle: Handle,
}

impl RasterBand {
    /// The band's 1-based index.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub(crate) fn raster_arc(&self) -> SharedRaster {
        Arc::clone(&self.raster)
    }

    /// `(width, height)` of the band.
    pub fn size(&self) -> Result<(usize, usize)> {
        facade::call(&self.handle, || {
            let raster = self.raster.lock();
            let band = raster.band(self.index)?;
            Ok((band.width(), band.height()))
        })
    }

    /// Reads a pixel window, row-major.
    pub fn read(&self, x: usize, y: usize, w: usize, h: usize) -> Result<Vec<f64>> {
        facade::call(&self.handle, || {
            self.raster
                .lock()
                .band(self.index)?
                .read(x, y, w, h)
                .map_err(Into::into)
        })
    }

    /// Async form of [`read`](Self::read).
    pub async fn read_async(
        &self,
        bridge: &Bridge,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
    ) -> Result<Vec<f64>> {
        let raster = Arc::clone(&self.raster);
        let index = self.index;
        bridge
            .submit(&self.handle, move |_| {
                raster.lock().band(index)?.read(x, y, w, h).map_err(Into::into)
            })
            .wait()
            .await
    }

    /// Writes a pixel window, row-major. `values` must hold `w * h`
    /// samples.
    pub fn write(&self, x: usize, y: usize, w: usize, h: usize, values: &[f64]) -> Result<()> {
        facade::call(&self.handle, || {
            self.raster
                .lock()
                .band_mut(self.index)?
                .write(x, y, w, h, values)
                .map_err(Into::into)
        })
    }

    /// Async form of [`write`](Self::write).
    pub async fn write_async(
        &self,
        bridge: &Bridge,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        values: Vec<f64>,
    ) -> Result<()> {
        let raster = Arc::clone(&self.raster);
        let index = self.index;
        bridge
            .submit(&self.handle, move |_| {
                raster
                    .lock()
                    .band_mut(index)?
                    .write(x, y, w, h, &values)
                    .map_err(Into::into)
            })
            .wait()
            .await
    }

    /// Fills the whole band with one value.
    pub fn fill(&self, value: f64) -> Result<()> {
        facade::call(&self.handle, || {
            self.raster.lock().band_mut(self.index)?.fill(value);
            Ok(())
        })
    }

    /// Single-pixel convenience read.
    pub fn pixel(&self, x: usize, y: usize) -> Result<f64> {
        Ok(self.read(x, y, 1, 1)?[0])
    }

    pub fn nodata(&self) -> Result<Option<f64>> {
        facade::call(&self.handle, || Ok(self.raster.lock().band(self.index)?.nodata()))
    }

    pub fn set_nodata(&self, nodata: Option<f64>) -> Result<()> {
        facade::call(&self.handle, || {
            self.raster.lock().band_mut(self.index)?.set_nodata(nodata);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    #[test]
    fn test_bands_are_one_based() {
        let dataset = Dataset::open_memory_raster(4, 4, 2).unwrap();
        let bands = dataset.bands().unwrap();
        assert!(bands.get(0).is_err());
        assert_eq!(bands.get(1).unwrap().index(), 1);
        assert_eq!(bands.get(2).unwrap().index(), 2);
        assert!(bands.get(3).is_err());
    }

    #[test]
    fn test_band_window_roundtrip() {
        let dataset = Dataset::open_memory_raster(8, 8, 1).unwrap();
        let band = dataset.bands().unwrap().get(1).unwrap();
        band.write(2, 2, 2, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(band.read(2, 2, 2, 2).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(band.pixel(3, 3).unwrap(), 4.0);
    }

    #[test]
    fn test_create_grows_live_count() {
        let dataset = Dataset::open_memory_raster(4, 4, 1).unwrap();
        let bands = dataset.bands().unwrap();
        assert_eq!(bands.count().unwrap(), 1);
        let band = bands.create().unwrap();
        assert_eq!(band.index(), 2);
        assert_eq!(bands.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_async_write_visible_to_sync_read() {
        let bridge = Bridge::new(crate::config::BridgeConfig::with_workers(2));
        let dataset = Dataset::open_memory_raster(8, 8, 1).unwrap();
        let band = dataset.bands().unwrap().get(1).unwrap();
        band.write_async(&bridge, 2, 2, 2, 2, vec![1.0, 2.0, 3.0, 4.0])
            .await
            .unwrap();
        assert_eq!(band.read(2, 2, 2, 2).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        // An out-of-range window surfaces the native error, not a panic.
        assert!(band
            .write_async(&bridge, 7, 7, 4, 4, vec![0.0; 16])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_async_read_matches_sync() {
        let bridge = Bridge::new(crate::config::BridgeConfig::with_workers(2));
        let dataset = Dataset::open_memory_raster(8, 8, 1).unwrap();
        let band = dataset.bands().unwrap().get(1).unwrap();
        band.write(0, 0, 8, 1, &[7.0; 8]).unwrap();
        let sync = band.read(0, 0, 8, 1).unwrap();
        let async_ = band.read_async(&bridge, 0, 0, 8, 1).await.unwrap();
        assert_eq!(sync, async_);
    }
}
