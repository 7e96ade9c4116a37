//! In-memory collaborator: rasters and vector layers.
//!
//! This is the analog of the native library's MEM and Memory drivers. Data
//! lives in plain buffers; the invariants the bridge layer wraps are real,
//! though: band numbering is 1-based, and every layer carries exactly one
//! read cursor shared by all readers.

use super::{FieldDefn, FieldValue, GeometryType, NativeError, NativeGeometry, NativeResult};

// =============================================================================
// Raster
// =============================================================================

/// A single raster band: `f64` samples, row-major.
#[derive(Debug, Clone)]
pub struct MemBand {
    width: usize,
    height: usize,
    data: Vec<f64>,
    nodata: Option<f64>,
}

impl MemBand {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
            nodata: None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<f64>) {
        self.nodata = nodata;
    }

    /// Sample at `(x, y)`. Callers must pass in-bounds coordinates.
    pub fn value(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    pub fn set_value(&mut self, x: usize, y: usize, v: f64) {
        self.data[y * self.width + x] = v;
    }

    fn check_window(&self, x: usize, y: usize, w: usize, h: usize) -> NativeResult<()> {
        if w == 0 || h == 0 {
            return Err(NativeError::illegal_arg("window must be non-empty"));
        }
        if x + w > self.width || y + h > self.height {
            return Err(NativeError::illegal_arg(format!(
                "window {}x{}+{}+{} exceeds band size {}x{}",
                w, h, x, y, self.width, self.height
            )));
        }
        Ok(())
    }

    /// Reads a window, row-major.
    pub fn read(&self, x: usize, y: usize, w: usize, h: usize) -> NativeResult<Vec<f64>> {
        self.check_window(x, y, w, h)?;
        let mut out = Vec::with_capacity(w * h);
        for yy in y..y + h {
            let start = yy * self.width + x;
            out.extend_from_slice(&self.data[start..start + w]);
        }
        Ok(out)
    }

    /// Writes a window, row-major. `values` must hold exactly `w * h` samples.
    pub fn write(&mut self, x: usize, y: usize, w: usize, h: usize, values: &[f64]) -> NativeResult<()> {
        self.check_window(x, y, w, h)?;
        if values.len() != w * h {
            return Err(NativeError::illegal_arg(format!(
                "expected {} samples, got {}",
                w * h,
                values.len()
            )));
        }
        for (row, chunk) in values.chunks_exact(w).enumerate() {
            let start = (y + row) * self.width + x;
            self.data[start..start + w].copy_from_slice(chunk);
        }
        Ok(())
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Min/max over valid samples, `None` when every sample is nodata.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for &v in &self.data {
            if Some(v) == self.nodata {
                continue;
            }
            range = Some(match range {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            });
        }
        range
    }
}

/// An in-memory raster dataset: one or more equally sized bands.
#[derive(Debug)]
pub struct MemRaster {
    width: usize,
    height: usize,
    bands: Vec<MemBand>,
}

impl MemRaster {
    pub fn new(width: usize, height: usize, band_count: usize) -> NativeResult<Self> {
        if width == 0 || height == 0 {
            return Err(NativeError::illegal_arg("raster dimensions must be non-zero"));
        }
        if band_count == 0 {
            return Err(NativeError::illegal_arg("raster needs at least one band"));
        }
        Ok(Self {
            width,
            height,
            bands: (0..band_count).map(|_| MemBand::new(width, height)).collect(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Band access. Numbering starts at 1, matching the native convention.
    pub fn band(&self, index: usize) -> NativeResult<&MemBand> {
        if index == 0 || index > self.bands.len() {
            return Err(NativeError::illegal_arg(format!(
                "band index {} out of range 1..={}",
                index,
                self.bands.len()
            )));
        }
        Ok(&self.bands[index - 1])
    }

    pub fn band_mut(&mut self, index: usize) -> NativeResult<&mut MemBand> {
        let count = self.bands.len();
        if index == 0 || index > count {
            return Err(NativeError::illegal_arg(format!(
                "band index {} out of range 1..={}",
                index, count
            )));
        }
        Ok(&mut self.bands[index - 1])
    }

    /// Appends a new zero-filled band, returning its 1-based index.
    pub fn add_band(&mut self) -> usize {
        self.bands.push(MemBand::new(self.width, self.height));
        self.bands.len()
    }
}

// =============================================================================
// Vector
// =============================================================================

/// A vector feature: fid, geometry, and field values in schema order.
#[derive(Debug, Clone)]
pub struct MemFeature {
    pub fid: usize,
    pub geometry: NativeGeometry,
    pub values: Vec<FieldValue>,
}

/// A vector layer with a single shared read cursor.
///
/// `reset_reading` / `next_feature` are the only read-position operations;
/// there is no random access through the cursor. Two readers advancing the
/// same layer observe one shared position.
#[derive(Debug)]
pub struct MemLayer {
    name: String,
    geometry_type: GeometryType,
    fields: Vec<FieldDefn>,
    features: Vec<MemFeature>,
    cursor: usize,
}

impl MemLayer {
    pub fn new(name: impl Into<String>, geometry_type: GeometryType) -> Self {
        Self {
            name: name.into(),
            geometry_type,
            fields: Vec::new(),
            features: Vec::new(),
            cursor: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub fn fields(&self) -> &[FieldDefn] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn add_field(&mut self, defn: FieldDefn) -> NativeResult<()> {
        if self.field_index(&defn.name).is_some() {
            return Err(NativeError::illegal_arg(format!(
                "duplicate field name '{}'",
                defn.name
            )));
        }
        self.fields.push(defn);
        Ok(())
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn feature(&self, fid: usize) -> NativeResult<&MemFeature> {
        self.features
            .iter()
            .find(|f| f.fid == fid)
            .ok_or_else(|| NativeError::illegal_arg(format!("no feature with fid {}", fid)))
    }

    /// Appends a feature, returning its fid. `values` must match the schema.
    pub fn create_feature(
        &mut self,
        geometry: NativeGeometry,
        values: Vec<FieldValue>,
    ) -> NativeResult<usize> {
        if geometry.geometry_type() != self.geometry_type {
            return Err(NativeError::illegal_arg("geometry type does not match layer"));
        }
        if values.len() != self.fields.len() {
            return Err(NativeError::illegal_arg(format!(
                "expected {} field values, got {}",
                self.fields.len(),
                values.len()
            )));
        }
        let fid = self.features.len();
        self.features.push(MemFeature {
            fid,
            geometry,
            values,
        });
        Ok(fid)
    }

    /// Rewinds the shared read cursor to before the first feature.
    pub fn reset_reading(&mut self) {
        self.cursor = 0;
    }

    /// Advances the shared cursor, returning the next fid or `None` when
    /// exhausted.
    pub fn next_feature(&mut self) -> Option<usize> {
        let fid = self.features.get(self.cursor).map(|f| f.fid);
        if fid.is_some() {
            self.cursor += 1;
        }
        fid
    }
}

/// An in-memory vector dataset: an indexed list of layers.
#[derive(Debug, Default)]
pub struct MemVector {
    layers: Vec<MemLayer>,
}

impl MemVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layer access, 0-based.
    pub fn layer(&self, index: usize) -> NativeResult<&MemLayer> {
        self.layers
            .get(index)
            .ok_or_else(|| NativeError::illegal_arg(format!("layer index {} out of range", index)))
    }

    pub fn layer_mut(&mut self, index: usize) -> NativeResult<&mut MemLayer> {
        self.layers
            .get_mut(index)
            .ok_or_else(|| NativeError::illegal_arg(format!("layer index {} out of range", index)))
    }

    /// Appends a new empty layer, returning its index.
    pub fn create_layer(&mut self, name: impl Into<String>, geometry_type: GeometryType) -> usize {
        self.layers.push(MemLayer::new(name, geometry_type));
        self.layers.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::FieldType;

    #[test]
    fn test_band_numbering_is_one_based() {
        let raster = MemRaster::new(4, 4, 2).unwrap();
        assert!(raster.band(0).is_err());
        assert!(raster.band(1).is_ok());
        assert!(raster.band(2).is_ok());
        assert!(raster.band(3).is_err());
    }

    #[test]
    fn test_band_window_io() {
        let mut raster = MemRaster::new(4, 3, 1).unwrap();
        let band = raster.band_mut(1).unwrap();
        band.write(1, 1, 2, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(band.read(1, 1, 2, 2).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(band.value(2, 2), 4.0);
        assert!(band.read(3, 0, 2, 1).is_err());
        assert!(band.write(0, 0, 2, 1, &[1.0]).is_err());
    }

    #[test]
    fn test_layer_cursor_is_shared_and_rewindable() {
        let mut layer = MemLayer::new("l", GeometryType::LineString);
        for i in 0..3 {
            layer
                .create_feature(
                    NativeGeometry::LineString(vec![(0.0, i as f64), (1.0, i as f64)]),
                    vec![],
                )
                .unwrap();
        }
        assert_eq!(layer.next_feature(), Some(0));
        assert_eq!(layer.next_feature(), Some(1));
        layer.reset_reading();
        assert_eq!(layer.next_feature(), Some(0));
        assert_eq!(layer.next_feature(), Some(1));
        assert_eq!(layer.next_feature(), Some(2));
        assert_eq!(layer.next_feature(), None);
    }

    #[test]
    fn test_create_feature_validates_schema() {
        let mut layer = MemLayer::new("l", GeometryType::LineString);
        layer.add_field(FieldDefn::new("elev", FieldType::Real)).unwrap();
        let geom = NativeGeometry::LineString(vec![(0.0, 0.0), (1.0, 0.0)]);
        assert!(layer.create_feature(geom.clone(), vec![]).is_err());
        assert!(layer
            .create_feature(geom, vec![FieldValue::Real(1.0)])
            .is_ok());
    }
}
