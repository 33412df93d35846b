//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoKeys, GeoTransform, RasterElement, RasterProfile, SampleFormat};
use ndarray::{Array2, ArrayView2};

/// A georeferenced single-band grid.
///
/// Multi-band files are handled as one `Raster` per band sharing the same
/// metadata; see [`crate::io::RasterDataset`].
///
/// ```ignore
/// use vegidx_core::Raster;
///
/// let mut raster: Raster<f32> = Raster::new(100, 100);
/// raster.set(10, 20, 0.42)?;
/// let value = raster.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Cell values in row-major order (row, col)
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    geokeys: Option<GeoKeys>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            geokeys: None,
            nodata: None,
        }
    }

    /// A raster holding `data` with this raster's georeferencing.
    ///
    /// The nodata value is not carried over since the element type may differ.
    pub fn with_same_meta<U: RasterElement>(&self, data: Array2<U>) -> Result<Raster<U>> {
        if data.dim() != self.shape() {
            let (ar, ac) = data.dim();
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar,
                ac,
            });
        }
        Ok(Raster {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            geokeys: self.geokeys.clone(),
            nodata: None,
        })
    }

    /// Adopt the georeferencing and nodata value of a file profile
    pub fn apply_profile(&mut self, profile: &RasterProfile) {
        self.transform = profile.transform;
        self.crs = profile.crs.clone();
        self.geokeys = profile.geokeys.clone();
        self.nodata = profile.nodata.and_then(num_traits::cast);
    }

    /// Single-band profile describing this raster as stored with `format`
    pub fn profile(&self, format: SampleFormat) -> RasterProfile {
        RasterProfile {
            rows: self.rows(),
            cols: self.cols(),
            band_count: 1,
            sample_format: format,
            transform: self.transform,
            crs: self.crs.clone(),
            geokeys: self.geokeys.clone(),
            nodata: self.nodata.and_then(|v| v.to_f64()),
        }
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::InvalidParameter {
                name: "cell",
                value: format!("({}, {})", row, col),
                reason: format!("outside {}x{} raster", self.rows(), self.cols()),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::InvalidParameter {
                name: "cell",
                value: format!("({}, {})", row, col),
                reason: format!("outside {}x{} raster", rows, cols),
            }),
        }
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn geokeys(&self) -> Option<&GeoKeys> {
        self.geokeys.as_ref()
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    // Statistics

    /// Min, max and mean over cells that are not nodata
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if value.is_nodata(self.nodata) {
                continue;
            }

            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }

            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        RasterStatistics {
            min,
            max,
            mean: (count > 0).then(|| sum / count as f64),
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.shape(), (100, 200));
        assert_eq!(raster.len(), 20_000);
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        assert!(Raster::<f32>::from_vec(vec![1.0; 5], 2, 3).is_err());
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f32> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.get(10, 0).is_err());
        assert!(raster.set(0, 10, 1.0).is_err());
    }

    #[test]
    fn test_statistics_skip_nan() {
        let raster = Raster::from_array(array![[1.0f32, f32::NAN], [3.0, 8.0]]);
        let stats = raster.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(8.0));
        assert_eq!(stats.mean, Some(4.0));
        assert_eq!(stats.valid_count, 3);
        assert_eq!(stats.nodata_count, 1);
    }

    #[test]
    fn test_with_same_meta_keeps_georeferencing() {
        let mut source: Raster<f64> = Raster::new(2, 2);
        source.set_transform(GeoTransform::new(100.0, 200.0, 30.0, -30.0));
        source.set_crs(Some(CRS::from_epsg(32618)));
        source.set_nodata(Some(0.0));

        let derived = source.with_same_meta(Array2::<f32>::zeros((2, 2))).unwrap();
        assert_eq!(derived.transform(), source.transform());
        assert_eq!(derived.crs(), source.crs());
        assert_eq!(derived.nodata(), None);

        assert!(source.with_same_meta(Array2::<f32>::zeros((3, 2))).is_err());
    }

    #[test]
    fn test_apply_profile() {
        let mut profile = RasterProfile::new(2, 2);
        profile.transform = GeoTransform::new(1.0, 2.0, 0.5, -0.5);
        profile.nodata = Some(-9999.0);

        let mut raster: Raster<f32> = Raster::new(2, 2);
        raster.apply_profile(&profile);
        assert_eq!(raster.nodata(), Some(-9999.0));
        assert_eq!(raster.profile(SampleFormat::F32).transform, profile.transform);
    }
}
