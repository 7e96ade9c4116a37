//! Long-running raster/vector algorithms, in blocking and bridged form.
//!
//! Every operation comes in two flavors with identical semantics:
//! the blocking form runs the native call on the current thread through
//! the synchronous façade, optionally driving a caller-supplied progress
//! callback; the `_async` form submits the same call to a [`Bridge`] and
//! returns a [`WorkHandle`] whose progress channel carries the native
//! callback's ticks. Cancelling the handle trips the native callback,
//! which stops the algorithm at its next tick.
//!
//! Operations that touch both a raster and a vector dataset lock the
//! raster side first; every multi-dataset path in this module keeps that
//! order.
//!
//! # Example
//!
//! ```ignore
//! let work = alg::contour_generate_async(&bridge, &band, &layer, &opts);
//! let mut progress = work.progress();
//! while let Some(tick) = progress.recv().await {
//!     println!("{:.0}% {}", tick.fraction * 100.0, tick.message);
//! }
//! ```

use crate::bridge::{Bridge, WorkHandle};
use crate::dataset::RasterBand;
use crate::error::Result;
use crate::facade;
use crate::native::alg::{self as native_alg, ContourParams};
use crate::native::{Connectedness, ProgressFn};
use crate::vector::Layer;
use tracing::debug;

// =============================================================================
// Options
// =============================================================================

/// Options for [`contour_generate`].
#[derive(Debug, Clone, Default)]
pub struct ContourOptions {
    /// Base offset for interval contouring.
    pub base: f64,
    /// Elevation interval; ignored when `fixed_levels` is non-empty.
    pub interval: f64,
    /// Explicit contour levels, overriding base/interval when non-empty.
    pub fixed_levels: Vec<f64>,
    /// Destination field (schema index) receiving a sequential contour id.
    pub id_field: Option<usize>,
    /// Destination field (schema index) receiving the contour elevation.
    pub elev_field: Option<usize>,
}

impl ContourOptions {
    fn params(&self) -> ContourParams {
        ContourParams {
            base: self.base,
            interval: self.interval,
            fixed_levels: self.fixed_levels.clone(),
            id_field: self.id_field,
            elev_field: self.elev_field,
        }
    }
}

/// Options for [`sieve_filter`].
#[derive(Debug, Clone)]
pub struct SieveOptions {
    /// Raster polygons smaller than this many pixels are merged away.
    pub threshold: usize,
    pub connectedness: Connectedness,
}

/// Options for [`polygonize`].
#[derive(Debug, Clone)]
pub struct PolygonizeOptions {
    /// Destination field (schema index) receiving each region's pixel value.
    pub pix_val_field: usize,
    pub connectedness: Connectedness,
}

/// Options for [`fill_nodata`].
#[derive(Debug, Clone)]
pub struct FillNodataOptions {
    /// Search radius (in pixels) for valid samples around each hole.
    pub max_distance: usize,
    /// Passes of 3x3 averaging applied to the filled pixels afterwards.
    pub smoothing_iterations: usize,
}

// =============================================================================
// Contour generation
// =============================================================================

/// Generates elevation contours from `src` into `dst` as line features.
pub fn contour_generate(
    src: &RasterBand,
    dst: &Layer,
    options: &ContourOptions,
    progress: Option<ProgressFn<'_>>,
) -> Result<()> {
    facade::call(src.handle(), || {
        dst.handle().ensure_open()?;
        let raster = src.raster_arc();
        let vector = dst.vector_arc();
        let raster = raster.lock();
        let mut vector = vector.lock();
        let band = raster.band(src.index())?;
        let layer = vector.layer_mut(dst.layer_index())?;
        native_alg::contour_generate(band, layer, &options.params(), progress)?;
        Ok(())
    })
}

/// Bridged form of [`contour_generate`].
pub fn contour_generate_async(
    bridge: &Bridge,
    src: &RasterBand,
    dst: &Layer,
    options: &ContourOptions,
) -> WorkHandle<()> {
    let raster = src.raster_arc();
    let vector = dst.vector_arc();
    let band_index = src.index();
    let layer_index = dst.layer_index();
    let dst_handle = dst.handle().clone();
    let params = options.params();
    debug!(src = %src.handle().id(), dst = %dst_handle.id(), "contour generate submitted");
    bridge.submit(src.handle(), move |sink| {
        dst_handle.ensure_open()?;
        let raster = raster.lock();
        let mut vector = vector.lock();
        let band = raster.band(band_index)?;
        let layer = vector.layer_mut(layer_index)?;
        let mut report = |fraction: f64, message: &str| sink.report(fraction, message);
        native_alg::contour_generate(band, layer, &params, Some(&mut report))?;
        Ok(())
    })
}

// =============================================================================
// Sieve filter
// =============================================================================

/// Removes raster polygons smaller than the threshold by merging them into
/// their largest neighbor. Mutates `band` in place.
pub fn sieve_filter(
    band: &RasterBand,
    options: &SieveOptions,
    progress: Option<ProgressFn<'_>>,
) -> Result<()> {
    facade::call(band.handle(), || {
        let raster = band.raster_arc();
        let mut raster = raster.lock();
        let target = raster.band_mut(band.index())?;
        native_alg::sieve_filter(target, options.threshold, options.connectedness, progress)?;
        Ok(())
    })
}

/// Bridged form of [`sieve_filter`].
pub fn sieve_filter_async(
    bridge: &Bridge,
    band: &RasterBand,
    options: &SieveOptions,
) -> WorkHandle<()> {
    let raster = band.raster_arc();
    let index = band.index();
    let options = options.clone();
    bridge.submit(band.handle(), move |sink| {
        let mut raster = raster.lock();
        let target = raster.band_mut(index)?;
        let mut report = |fraction: f64, message: &str| sink.report(fraction, message);
        native_alg::sieve_filter(
            target,
            options.threshold,
            options.connectedness,
            Some(&mut report),
        )?;
        Ok(())
    })
}

// =============================================================================
// Polygonize
// =============================================================================

/// Emits one polygon feature into `dst` per connected region of equal
/// pixel value in `src`. Nodata pixels are masked out.
pub fn polygonize(
    src: &RasterBand,
    dst: &Layer,
    options: &PolygonizeOptions,
    progress: Option<ProgressFn<'_>>,
) -> Result<()> {
    facade::call(src.handle(), || {
        dst.handle().ensure_open()?;
        let raster = src.raster_arc();
        let vector = dst.vector_arc();
        let raster = raster.lock();
        let mut vector = vector.lock();
        let band = raster.band(src.index())?;
        let layer = vector.layer_mut(dst.layer_index())?;
        native_alg::polygonize(band, layer, options.pix_val_field, options.connectedness, progress)?;
        Ok(())
    })
}

/// Bridged form of [`polygonize`].
pub fn polygonize_async(
    bridge: &Bridge,
    src: &RasterBand,
    dst: &Layer,
    options: &PolygonizeOptions,
) -> WorkHandle<()> {
    let raster = src.raster_arc();
    let vector = dst.vector_arc();
    let band_index = src.index();
    let layer_index = dst.layer_index();
    let dst_handle = dst.handle().clone();
    let options = options.clone();
    bridge.submit(src.handle(), move |sink| {
        dst_handle.ensure_open()?;
        let raster = raster.lock();
        let mut vector = vector.lock();
        let band = raster.band(band_index)?;
        let layer = vector.layer_mut(layer_index)?;
        let mut report = |fraction: f64, message: &str| sink.report(fraction, message);
        native_alg::polygonize(
            band,
            layer,
            options.pix_val_field,
            options.connectedness,
            Some(&mut report),
        )?;
        Ok(())
    })
}

// =============================================================================
// Nodata fill
// =============================================================================

/// Interpolates nodata pixels from valid neighbors. Mutates `band` in
/// place; a band without a nodata value is left untouched.
pub fn fill_nodata(
    band: &RasterBand,
    options: &FillNodataOptions,
    progress: Option<ProgressFn<'_>>,
) -> Result<()> {
    facade::call(band.handle(), || {
        let raster = band.raster_arc();
        let mut raster = raster.lock();
        let target = raster.band_mut(band.index())?;
        native_alg::fill_nodata(
            target,
            options.max_distance,
            options.smoothing_iterations,
            progress,
        )?;
        Ok(())
    })
}

/// Bridged form of [`fill_nodata`].
pub fn fill_nodata_async(
    bridge: &Bridge,
    band: &RasterBand,
    options: &FillNodataOptions,
) -> WorkHandle<()> {
    let raster = band.raster_arc();
    let index = band.index();
    let options = options.clone();
    bridge.submit(band.handle(), move |sink| {
        let mut raster = raster.lock();
        let target = raster.band_mut(index)?;
        let mut report = |fraction: f64, message: &str| sink.report(fraction, message);
        native_alg::fill_nodata(
            target,
            options.max_distance,
            options.smoothing_iterations,
            Some(&mut report),
        )?;
        Ok(())
    })
}

// =============================================================================
// Checksum
// =============================================================================

/// Position-weighted checksum of a band window; `None` covers the whole
/// band. Sensitive to both sample values and their position.
pub fn checksum_image(
    band: &RasterBand,
    region: Option<(usize, usize, usize, usize)>,
    progress: Option<ProgressFn<'_>>,
) -> Result<u32> {
    facade::call(band.handle(), || {
        let raster = band.raster_arc();
        let raster = raster.lock();
        let target = raster.band(band.index())?;
        let (x, y, w, h) = region.unwrap_or((0, 0, target.width(), target.height()));
        let sum = native_alg::checksum_image(target, x, y, w, h, progress)?;
        Ok(sum)
    })
}

/// Bridged form of [`checksum_image`].
pub fn checksum_image_async(
    bridge: &Bridge,
    band: &RasterBand,
    region: Option<(usize, usize, usize, usize)>,
) -> WorkHandle<u32> {
    let raster = band.raster_arc();
    let index = band.index();
    bridge.submit(band.handle(), move |sink| {
        let raster = raster.lock();
        let target = raster.band(index)?;
        let (x, y, w, h) = region.unwrap_or((0, 0, target.width(), target.height()));
        let mut report = |fraction: f64, message: &str| sink.report(fraction, message);
        let sum = native_alg::checksum_image(target, x, y, w, h, Some(&mut report))?;
        Ok(sum)
    })
}
