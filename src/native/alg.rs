//! Long-running algorithm entry points of the native collaborator.
//!
//! Each entry point accepts an optional progress callback and acknowledges
//! an abort request (callback returning `false`) with
//! [`NativeError::interrupted`]. Outputs are deterministic for a given
//! input, which is what makes the sync and async public paths observably
//! equivalent.

use super::mem::{MemBand, MemLayer};
use super::{
    Connectedness, FieldValue, NativeError, NativeGeometry, NativeResult, ProgressFn,
};

/// Modulus for the position-weighted checksum.
const CHECKSUM_MODULUS: i64 = 65_521;

fn tick(progress: &mut Option<ProgressFn<'_>>, fraction: f64, message: &str) -> NativeResult<()> {
    if let Some(report) = progress.as_mut() {
        if !report(fraction.clamp(0.0, 1.0), message) {
            return Err(NativeError::interrupted());
        }
    }
    Ok(())
}

// =============================================================================
// Contour generation
// =============================================================================

/// Parameters for [`contour_generate`].
#[derive(Debug, Clone, Default)]
pub struct ContourParams {
    /// Base offset for interval contouring.
    pub base: f64,
    /// Elevation interval; ignored when `fixed_levels` is non-empty.
    pub interval: f64,
    /// Explicit contour levels. When non-empty these replace base/interval.
    pub fixed_levels: Vec<f64>,
    /// Destination field index receiving a sequential contour id.
    pub id_field: Option<usize>,
    /// Destination field index receiving the contour elevation.
    pub elev_field: Option<usize>,
}

fn contour_levels(band: &MemBand, params: &ContourParams) -> NativeResult<Vec<f64>> {
    if !params.fixed_levels.is_empty() {
        let mut levels = params.fixed_levels.clone();
        levels.sort_by(|a, b| a.total_cmp(b));
        levels.dedup();
        return Ok(levels);
    }
    if params.interval <= 0.0 {
        return Err(NativeError::illegal_arg("contour interval must be positive"));
    }
    let Some((min, max)) = band.value_range() else {
        return Ok(Vec::new());
    };
    let mut levels = Vec::new();
    let mut k = ((min - params.base) / params.interval).ceil() as i64;
    loop {
        let level = params.base + k as f64 * params.interval;
        if level > max {
            break;
        }
        levels.push(level);
        k += 1;
    }
    Ok(levels)
}

/// Generates elevation contours from `band` into `dst` as line features.
///
/// Crossings are detected between vertically adjacent samples and joined
/// into horizontal polylines per level. Nodata samples never produce
/// crossings.
pub fn contour_generate(
    band: &MemBand,
    dst: &mut MemLayer,
    params: &ContourParams,
    mut progress: Option<ProgressFn<'_>>,
) -> NativeResult<()> {
    let field_count = dst.fields().len();
    for field in [params.id_field, params.elev_field].into_iter().flatten() {
        if field >= field_count {
            return Err(NativeError::illegal_arg(format!(
                "destination field index {} out of range",
                field
            )));
        }
    }

    let levels = contour_levels(band, params)?;
    let (w, h) = (band.width(), band.height());
    let nodata = band.nodata();
    let mut next_id: i64 = 0;

    for (li, &level) in levels.iter().enumerate() {
        for y in 0..h.saturating_sub(1) {
            let mut run: Vec<(f64, f64)> = Vec::new();
            for x in 0..w {
                let v0 = band.value(x, y);
                let v1 = band.value(x, y + 1);
                let masked = Some(v0) == nodata || Some(v1) == nodata;
                let crosses = !masked && v0.min(v1) <= level && level < v0.max(v1);
                if crosses {
                    let t = (level - v0) / (v1 - v0);
                    run.push((x as f64 + 0.5, y as f64 + 0.5 + t));
                } else if !run.is_empty() {
                    emit_contour(dst, params, &mut next_id, level, std::mem::take(&mut run))?;
                }
            }
            if !run.is_empty() {
                emit_contour(dst, params, &mut next_id, level, run)?;
            }
        }
        tick(
            &mut progress,
            (li + 1) as f64 / levels.len() as f64,
            "contour",
        )?;
    }
    Ok(())
}

fn emit_contour(
    dst: &mut MemLayer,
    params: &ContourParams,
    next_id: &mut i64,
    level: f64,
    mut points: Vec<(f64, f64)>,
) -> NativeResult<()> {
    // A lone crossing still yields a drawable (non-empty) segment.
    if points.len() == 1 {
        let (x, y) = points[0];
        points.push((x + 1.0, y));
    }
    let mut values = vec![FieldValue::Null; dst.fields().len()];
    if let Some(idx) = params.id_field {
        values[idx] = FieldValue::Integer(*next_id);
    }
    if let Some(idx) = params.elev_field {
        values[idx] = FieldValue::Real(level);
    }
    *next_id += 1;
    dst.create_feature(NativeGeometry::LineString(points), values)?;
    Ok(())
}

// =============================================================================
// Connected components (shared by sieve and polygonize)
// =============================================================================

struct Component {
    value: f64,
    size: usize,
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

const NO_LABEL: usize = usize::MAX;

fn neighbors(x: usize, y: usize, w: usize, h: usize, conn: Connectedness) -> Vec<(usize, usize)> {
    let offsets: &[(i64, i64)] = match conn {
        Connectedness::Four => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
        Connectedness::Eight => &[
            (-1, 0),
            (1, 0),
            (0, -1),
            (0, 1),
            (-1, -1),
            (1, -1),
            (-1, 1),
            (1, 1),
        ],
    };
    offsets
        .iter()
        .filter_map(|&(dx, dy)| {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            (nx >= 0 && ny >= 0 && (nx as usize) < w && (ny as usize) < h)
                .then(|| (nx as usize, ny as usize))
        })
        .collect()
}

fn label_components(
    band: &MemBand,
    conn: Connectedness,
    skip_nodata: bool,
) -> (Vec<usize>, Vec<Component>) {
    let (w, h) = (band.width(), band.height());
    let nodata = band.nodata();
    let mut labels = vec![NO_LABEL; w * h];
    let mut components = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if labels[y * w + x] != NO_LABEL {
                continue;
            }
            let value = band.value(x, y);
            if skip_nodata && Some(value) == nodata {
                continue;
            }
            let label = components.len();
            let mut comp = Component {
                value,
                size: 0,
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            };
            let mut stack = vec![(x, y)];
            labels[y * w + x] = label;
            while let Some((cx, cy)) = stack.pop() {
                comp.size += 1;
                comp.min_x = comp.min_x.min(cx);
                comp.max_x = comp.max_x.max(cx);
                comp.min_y = comp.min_y.min(cy);
                comp.max_y = comp.max_y.max(cy);
                for (nx, ny) in neighbors(cx, cy, w, h, conn) {
                    let idx = ny * w + nx;
                    if labels[idx] == NO_LABEL && band.value(nx, ny) == value {
                        labels[idx] = label;
                        stack.push((nx, ny));
                    }
                }
            }
            components.push(comp);
        }
    }
    (labels, components)
}

// =============================================================================
// Sieve filter
// =============================================================================

/// Removes raster polygons smaller than `threshold` pixels by merging them
/// into their largest neighboring polygon. Operates in place.
pub fn sieve_filter(
    band: &mut MemBand,
    threshold: usize,
    conn: Connectedness,
    mut progress: Option<ProgressFn<'_>>,
) -> NativeResult<()> {
    let (w, h) = (band.width(), band.height());
    let (labels, components) = label_components(band, conn, false);
    tick(&mut progress, 0.5, "sieve: polygons labeled")?;

    // Best (largest) neighboring component per small component.
    let mut merge_target: Vec<Option<usize>> = vec![None; components.len()];
    for y in 0..h {
        for x in 0..w {
            let a = labels[y * w + x];
            for (nx, ny) in neighbors(x, y, w, h, conn) {
                let b = labels[ny * w + nx];
                if a == b {
                    continue;
                }
                if components[a].size < threshold {
                    let better = merge_target[a]
                        .map(|t| components[b].size > components[t].size)
                        .unwrap_or(true);
                    if better {
                        merge_target[a] = Some(b);
                    }
                }
            }
        }
        tick(
            &mut progress,
            0.5 + 0.4 * (y + 1) as f64 / h as f64,
            "sieve: matching neighbors",
        )?;
    }

    for y in 0..h {
        for x in 0..w {
            let label = labels[y * w + x];
            if components[label].size < threshold {
                if let Some(target) = merge_target[label] {
                    band.set_value(x, y, components[target].value);
                }
            }
        }
    }
    tick(&mut progress, 1.0, "sieve: done")?;
    Ok(())
}

// =============================================================================
// Polygonize
// =============================================================================

/// Emits one polygon feature per connected region of equal pixel value,
/// writing the region value into `pix_val_field`. Nodata pixels are masked
/// out.
pub fn polygonize(
    band: &MemBand,
    dst: &mut MemLayer,
    pix_val_field: usize,
    conn: Connectedness,
    mut progress: Option<ProgressFn<'_>>,
) -> NativeResult<()> {
    if pix_val_field >= dst.fields().len() {
        return Err(NativeError::illegal_arg(format!(
            "pixel value field index {} out of range",
            pix_val_field
        )));
    }
    let (_, components) = label_components(band, conn, true);
    let total = components.len();
    for (i, comp) in components.into_iter().enumerate() {
        let (x0, y0) = (comp.min_x as f64, comp.min_y as f64);
        let (x1, y1) = ((comp.max_x + 1) as f64, (comp.max_y + 1) as f64);
        let ring = vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)];
        let mut values = vec![FieldValue::Null; dst.fields().len()];
        values[pix_val_field] = FieldValue::Real(comp.value);
        dst.create_feature(NativeGeometry::Polygon(vec![ring]), values)?;
        tick(
            &mut progress,
            (i + 1) as f64 / total as f64,
            "polygonize",
        )?;
    }
    Ok(())
}

// =============================================================================
// Nodata fill
// =============================================================================

/// Interpolates nodata pixels from valid samples within `max_distance`
/// (chebyshev), inverse-distance weighted, then runs `smoothing_iterations`
/// of 3x3 averaging over the filled pixels. Operates in place.
pub fn fill_nodata(
    band: &mut MemBand,
    max_distance: usize,
    smoothing_iterations: usize,
    mut progress: Option<ProgressFn<'_>>,
) -> NativeResult<()> {
    let Some(nodata) = band.nodata() else {
        return Ok(());
    };
    let (w, h) = (band.width(), band.height());
    let snapshot: Vec<Vec<f64>> = (0..h)
        .map(|y| (0..w).map(|x| band.value(x, y)).collect())
        .collect();
    let mut filled = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if snapshot[y][x] != nodata {
                continue;
            }
            let mut weight_sum = 0.0;
            let mut value_sum = 0.0;
            let r = max_distance as i64;
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx as usize >= w || ny as usize >= h {
                        continue;
                    }
                    let v = snapshot[ny as usize][nx as usize];
                    if v == nodata {
                        continue;
                    }
                    let weight = 1.0 / ((dx * dx + dy * dy) as f64).sqrt();
                    weight_sum += weight;
                    value_sum += weight * v;
                }
            }
            if weight_sum > 0.0 {
                band.set_value(x, y, value_sum / weight_sum);
                filled.push((x, y));
            }
        }
        tick(
            &mut progress,
            0.8 * (y + 1) as f64 / h as f64,
            "fill nodata: interpolating",
        )?;
    }

    for i in 0..smoothing_iterations {
        let current: Vec<Vec<f64>> = (0..h)
            .map(|y| (0..w).map(|x| band.value(x, y)).collect())
            .collect();
        for &(x, y) in &filled {
            let mut sum = 0.0;
            let mut count = 0usize;
            for (nx, ny) in neighbors(x, y, w, h, Connectedness::Eight) {
                let v = current[ny][nx];
                if v != nodata {
                    sum += v;
                    count += 1;
                }
            }
            if count > 0 {
                band.set_value(x, y, sum / count as f64);
            }
        }
        tick(
            &mut progress,
            0.8 + 0.2 * (i + 1) as f64 / smoothing_iterations as f64,
            "fill nodata: smoothing",
        )?;
    }
    tick(&mut progress, 1.0, "fill nodata: done")?;
    Ok(())
}

// =============================================================================
// Checksum
// =============================================================================

/// Position-weighted checksum over a band window. Sensitive both to sample
/// values and to their position within the window, so disjoint windows of
/// differing content yield differing sums.
pub fn checksum_image(
    band: &MemBand,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    mut progress: Option<ProgressFn<'_>>,
) -> NativeResult<u32> {
    let window = band.read(x, y, w, h)?;
    let mut acc: i64 = 0;
    for (i, &v) in window.iter().enumerate() {
        let sample = v.round() as i64;
        acc = (acc + sample * ((i as i64 % 11) + 1)).rem_euclid(CHECKSUM_MODULUS);
        if (i + 1) % w == 0 {
            tick(
                &mut progress,
                (i + 1) as f64 / window.len() as f64,
                "checksum",
            )?;
        }
    }
    Ok(acc as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::mem::MemRaster;
    use crate::native::{FieldDefn, FieldType, GeometryType};

    fn ramp_band(w: usize, h: usize) -> MemRaster {
        let mut raster = MemRaster::new(w, h, 1).unwrap();
        let band = raster.band_mut(1).unwrap();
        for y in 0..h {
            band.write(0, y, w, 1, &vec![4.0 * y as f64; w]).unwrap();
        }
        raster
    }

    #[test]
    fn test_contour_levels_from_interval() {
        let raster = ramp_band(8, 64);
        let levels = contour_levels(
            raster.band(1).unwrap(),
            &ContourParams {
                base: 7.0,
                interval: 32.0,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            levels,
            vec![7.0, 39.0, 71.0, 103.0, 135.0, 167.0, 199.0, 231.0]
        );
    }

    #[test]
    fn test_contour_ramp_elevations_on_grid() {
        let raster = ramp_band(16, 16);
        let mut layer = MemLayer::new("contours", GeometryType::LineString);
        layer.add_field(FieldDefn::new("id", FieldType::Integer)).unwrap();
        layer.add_field(FieldDefn::new("elev", FieldType::Real)).unwrap();
        contour_generate(
            raster.band(1).unwrap(),
            &mut layer,
            &ContourParams {
                base: 1.0,
                interval: 8.0,
                id_field: Some(0),
                elev_field: Some(1),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert!(layer.feature_count() > 0);
        for fid in 0..layer.feature_count() {
            let elev = layer.feature(fid).unwrap().values[1].as_f64().unwrap();
            assert_eq!((elev - 1.0) % 8.0, 0.0);
        }
    }

    #[test]
    fn test_contour_abort_is_interrupted() {
        let raster = ramp_band(16, 16);
        let mut layer = MemLayer::new("contours", GeometryType::LineString);
        let mut abort = |_: f64, _: &str| false;
        let err = contour_generate(
            raster.band(1).unwrap(),
            &mut layer,
            &ContourParams {
                base: 0.0,
                interval: 8.0,
                ..Default::default()
            },
            Some(&mut abort),
        )
        .unwrap_err();
        assert_eq!(err.code, crate::native::CODE_INTERRUPTED);
    }

    #[test]
    fn test_sieve_merges_small_polygon() {
        let mut raster = MemRaster::new(16, 16, 1).unwrap();
        let band = raster.band_mut(1).unwrap();
        band.write(0, 0, 8, 8, &vec![20.0; 64]).unwrap();
        band.write(2, 2, 2, 2, &vec![10.0; 4]).unwrap();
        sieve_filter(band, 5, Connectedness::Eight, None).unwrap();
        assert_eq!(band.value(2, 2), 20.0);
        assert_eq!(band.value(0, 0), 20.0);
        assert_eq!(band.value(15, 15), 0.0);
    }

    #[test]
    fn test_polygonize_counts_regions() {
        let mut raster = MemRaster::new(8, 8, 1).unwrap();
        let band = raster.band_mut(1).unwrap();
        band.write(0, 0, 4, 8, &vec![5.0; 32]).unwrap();
        let mut layer = MemLayer::new("polys", GeometryType::Polygon);
        layer.add_field(FieldDefn::new("DN", FieldType::Real)).unwrap();
        polygonize(
            raster.band(1).unwrap(),
            &mut layer,
            0,
            Connectedness::Four,
            None,
        )
        .unwrap();
        assert_eq!(layer.feature_count(), 2);
    }

    #[test]
    fn test_fill_nodata_interpolates_hole() {
        let mut raster = MemRaster::new(8, 8, 1).unwrap();
        let band = raster.band_mut(1).unwrap();
        band.fill(50.0);
        band.set_nodata(Some(-1.0));
        band.write(3, 3, 1, 1, &[-1.0]).unwrap();
        fill_nodata(band, 2, 0, None).unwrap();
        assert!((band.value(3, 3) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_checksum_sensitive_to_mutation() {
        let raster = ramp_band(16, 16);
        let band = raster.band(1).unwrap();
        let before = checksum_image(band, 0, 0, 16, 16, None).unwrap();
        let mut mutated = ramp_band(16, 16);
        mutated.band_mut(1).unwrap().write(5, 5, 1, 1, &[999.0]).unwrap();
        let after = checksum_image(mutated.band(1).unwrap(), 0, 0, 16, 16, None).unwrap();
        assert_ne!(before, after);
    }
}
