//! Representative pixel sampling
//!
//! Draws a fixed number of pixels uniformly without replacement, then makes
//! sure the raster's min, mean and max appear in the sample by overwriting a
//! random slot for each one that is missing. Later overwrites may land on an
//! earlier injected value; that is accepted rather than corrected.

use rand::seq::index;
use rand::Rng;
use vegidx_core::raster::Raster;
use vegidx_core::{Error, Result};

/// Number of pixels drawn per raster
pub const DEFAULT_SAMPLE_SIZE: usize = 500;

/// Parameters for [`sample_pixels`]
#[derive(Debug, Clone, Copy)]
pub struct SampleParams {
    pub sample_size: usize,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

/// Min, mean and max of a raster's non-NaN pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSummary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

/// Summarize every non-NaN pixel; infinities take part.
///
/// NaN pixels are skipped on purpose, so a scene with a few masked pixels
/// still reports its real range. A raster with no non-NaN pixel at all
/// summarizes to NaN for min, mean and max.
pub fn summarize(raster: &Raster<f32>) -> PixelSummary {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0f64;
    let mut count = 0usize;

    for &v in raster.data().iter().filter(|v| !v.is_nan()) {
        let v = v as f64;
        min = min.min(v);
        max = max.max(v);
        sum += v;
        count += 1;
    }

    if count == 0 {
        return PixelSummary {
            min: f64::NAN,
            mean: f64::NAN,
            max: f64::NAN,
        };
    }

    PixelSummary {
        min,
        mean: sum / count as f64,
        max,
    }
}

/// Draw `params.sample_size` pixel values guaranteed to include min, mean and max.
///
/// Fails with [`Error::InsufficientPixels`] when the raster has fewer pixels
/// than requested. Order of the returned values carries no meaning. An
/// all-NaN raster still yields a full sample, with NaN in the injected slots.
pub fn sample_pixels<R: Rng + ?Sized>(
    raster: &Raster<f32>,
    params: &SampleParams,
    rng: &mut R,
) -> Result<Vec<f64>> {
    let size = params.sample_size;
    if size == 0 {
        return Err(Error::InvalidParameter {
            name: "sample_size",
            value: size.to_string(),
            reason: "must be positive".to_string(),
        });
    }

    let (rows, cols) = raster.shape();
    let available = rows * cols;
    if available < size {
        return Err(Error::InsufficientPixels {
            required: size,
            available,
        });
    }

    let summary = summarize(raster);
    let data = raster.data();

    let mut samples: Vec<f64> = index::sample(rng, available, size)
        .into_iter()
        .map(|flat| data[[flat / cols, flat % cols]] as f64)
        .collect();

    // NaN never compares equal, so NaN extrema are always injected
    for value in [summary.min, summary.mean, summary.max] {
        if !samples.contains(&value) {
            let slot = rng.gen_range(0..size);
            samples[slot] = value;
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gradient(rows: usize, cols: usize) -> Raster<f32> {
        let mut r = Raster::new(rows, cols);
        for row in 0..rows {
            for col in 0..cols {
                r.set(row, col, (row * cols + col) as f32 * 0.01 - 2.0).unwrap();
            }
        }
        r
    }

    #[test]
    fn test_summarize_skips_nan() {
        let mut raster = gradient(2, 2);
        raster.set(0, 0, f32::NAN).unwrap();
        let summary = summarize(&raster);
        assert_relative_eq!(summary.min, -1.99, epsilon = 1e-6);
        assert_relative_eq!(summary.max, -1.97, epsilon = 1e-6);
        assert_relative_eq!(summary.mean, -1.98, epsilon = 1e-6);
    }

    #[test]
    fn test_summarize_all_nan() {
        let raster = Raster::filled(3, 3, f32::NAN);
        let summary = summarize(&raster);
        assert!(summary.min.is_nan());
        assert!(summary.mean.is_nan());
        assert!(summary.max.is_nan());
    }

    #[test]
    fn test_all_nan_raster_still_samples() {
        let raster = Raster::filled(25, 25, f32::NAN);
        let mut rng = StdRng::seed_from_u64(5);
        let samples = sample_pixels(&raster, &SampleParams::default(), &mut rng).unwrap();
        assert_eq!(samples.len(), DEFAULT_SAMPLE_SIZE);
        assert!(samples.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_sample_length_is_exact() {
        let raster = gradient(40, 30);
        let mut rng = StdRng::seed_from_u64(7);
        let samples = sample_pixels(&raster, &SampleParams::default(), &mut rng).unwrap();
        assert_eq!(samples.len(), DEFAULT_SAMPLE_SIZE);
    }

    #[test]
    fn test_sample_contains_extrema() {
        let raster = gradient(50, 50);
        let summary = summarize(&raster);

        let mut complete = 0;
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let samples = sample_pixels(&raster, &SampleParams::default(), &mut rng).unwrap();
            assert_eq!(samples.len(), 500);
            // max is injected last and can never be overwritten
            assert!(samples.contains(&summary.max));
            if samples.contains(&summary.min) && samples.contains(&summary.mean) {
                complete += 1;
            }
        }
        // an earlier injection is lost only when a later one hits the same slot
        assert!(complete >= 45, "only {} of 50 samples carried all extrema", complete);
    }

    #[test]
    fn test_sample_exact_pixel_count_uses_every_pixel() {
        let raster = gradient(20, 25);
        let summary = summarize(&raster);
        let mut rng = StdRng::seed_from_u64(1);
        let samples = sample_pixels(&raster, &SampleParams::default(), &mut rng).unwrap();

        // every pixel is drawn once; only the injected mean may displace one or two of them
        let pixels: Vec<f64> = raster.data().iter().map(|&v| v as f64).collect();
        let drawn = samples.iter().filter(|v| pixels.contains(v)).count();
        assert!(drawn >= 498, "only {} drawn pixels survived", drawn);
        assert!(samples.contains(&summary.max));
    }

    #[test]
    fn test_sample_values_come_from_raster() {
        let raster = Raster::filled(25, 25, 0.25f32);
        let mut rng = StdRng::seed_from_u64(3);
        let samples = sample_pixels(&raster, &SampleParams::default(), &mut rng).unwrap();
        assert!(samples.iter().all(|&v| v == 0.25));
    }

    #[test]
    fn test_same_seed_same_sample() {
        let raster = gradient(30, 30);
        let params = SampleParams::default();
        let a = sample_pixels(&raster, &params, &mut StdRng::seed_from_u64(11)).unwrap();
        let b = sample_pixels(&raster, &params, &mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_too_few_pixels() {
        let raster = gradient(10, 10);
        let mut rng = StdRng::seed_from_u64(0);
        let result = sample_pixels(&raster, &SampleParams::default(), &mut rng);
        assert!(matches!(
            result,
            Err(Error::InsufficientPixels { required: 500, available: 100 })
        ));
    }

    #[test]
    fn test_zero_sample_size_rejected() {
        let raster = gradient(10, 10);
        let params = SampleParams { sample_size: 0 };
        assert!(sample_pixels(&raster, &params, &mut StdRng::seed_from_u64(0)).is_err());
    }
}
