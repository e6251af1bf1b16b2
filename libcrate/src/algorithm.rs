use anyhow::{bail, Result};
use image::RgbImage;

use crate::histogram::compute_histogram;
use crate::kmeans::quantize_kmeans;
use crate::median_cut::{quantize_median_cut, MedianCutTree};
use crate::octree::quantize_octree;
use crate::palette::Palette;
use crate::progress::ProgressReporter;

/// Selects one of the three quantization engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    KMeans,
    MedianCut { use_fast_lookup: bool },
    Octree,
}

/// Result of running a quantizer and the output mapper: the final palette
/// and the per-pixel index buffer.
pub struct QuantizationOutput {
    pub palette: Palette,
    pub indices: Vec<u8>,
    /// The (possibly error-diffused) input, see `mapper::produce_palettized_output`.
    pub diffused_input: RgbImage,
}

/// Validates `palette_size` against the constraints each algorithm
/// imposes (`2..=256`, and a power of two for median-cut), before any
/// work begins.
pub fn validate_options(algorithm: Algorithm, palette_size: usize) -> Result<()> {
    if !(2..=256).contains(&palette_size) {
        bail!("Invalid palette size {palette_size}; valid range is 2-256");
    }

    if let Algorithm::MedianCut { .. } = algorithm {
        if !palette_size.is_power_of_two() {
            bail!("Invalid palette size {palette_size}; must be a power-of-two for median-cut");
        }
    }

    Ok(())
}

/// Runs histogram → quantizer → output mapper end to end: the C9 driver.
pub fn quantize_and_map(
    input: &RgbImage,
    algorithm: Algorithm,
    palette_size: usize,
    dithering: bool,
    mut progress: Option<&mut ProgressReporter>,
) -> Result<QuantizationOutput> {
    validate_options(algorithm, palette_size)?;

    let histogram = compute_histogram(input, progress.as_deref_mut());

    let mut median_cut_lookup: Option<MedianCutTree> = None;
    let palette = match algorithm {
        Algorithm::KMeans => quantize_kmeans(&histogram, palette_size, progress.as_deref_mut()),
        Algorithm::Octree => quantize_octree(&histogram, palette_size, progress.as_deref_mut()),
        Algorithm::MedianCut { use_fast_lookup } => {
            let (palette, lookup) = quantize_median_cut(&histogram, palette_size, use_fast_lookup);
            median_cut_lookup = lookup;
            palette
        }
    };

    let (diffused_input, indices) = if let Some(lookup) = &median_cut_lookup {
        let nearest_color_fn = |color: &crate::color::Color| lookup.find_nearest_color_fast(color);
        crate::mapper::produce_palettized_output(input, &palette, dithering, Some(&nearest_color_fn), progress)
    } else {
        crate::mapper::produce_palettized_output(input, &palette, dithering, None, progress)
    };

    Ok(QuantizationOutput {
        palette,
        indices,
        diffused_input,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_palette_size_below_two() {
        assert!(validate_options(Algorithm::KMeans, 1).is_err());
    }

    #[test]
    fn rejects_palette_size_above_256() {
        assert!(validate_options(Algorithm::Octree, 257).is_err());
    }

    #[test]
    fn rejects_non_power_of_two_for_median_cut() {
        assert!(validate_options(Algorithm::MedianCut { use_fast_lookup: false }, 17).is_err());
    }

    #[test]
    fn accepts_non_power_of_two_for_kmeans_and_octree() {
        assert!(validate_options(Algorithm::KMeans, 17).is_ok());
        assert!(validate_options(Algorithm::Octree, 17).is_ok());
    }

    #[test]
    fn end_to_end_kmeans_produces_valid_output() {
        let mut img = RgbImage::new(4, 4);
        for x in 0..4 {
            for y in 0..4 {
                let v = ((x + y) * 30) as u8;
                img.put_pixel(x, y, image::Rgb([v, v, v]));
            }
        }

        let result = quantize_and_map(&img, Algorithm::KMeans, 4, false, None).unwrap();
        assert_eq!(result.palette.len(), 4);
        assert_eq!(result.indices.len(), 16);
        for &idx in &result.indices {
            assert!((idx as usize) < result.palette.len());
        }
    }

    #[test]
    fn end_to_end_median_cut_with_fast_lookup_produces_valid_output() {
        let mut img = RgbImage::new(4, 4);
        for x in 0..4 {
            for y in 0..4 {
                let v = ((x + y) * 30) as u8;
                img.put_pixel(x, y, image::Rgb([v, v, v]));
            }
        }

        let result = quantize_and_map(
            &img,
            Algorithm::MedianCut { use_fast_lookup: true },
            4,
            false,
            None,
        )
        .unwrap();
        assert_eq!(result.palette.len(), 4);
        for &idx in &result.indices {
            assert!((idx as usize) < result.palette.len());
        }
    }

    #[test]
    fn end_to_end_octree_produces_valid_output() {
        let mut img = RgbImage::new(4, 4);
        for x in 0..4 {
            for y in 0..4 {
                let v = ((x + y) * 30) as u8;
                img.put_pixel(x, y, image::Rgb([v, v, v]));
            }
        }

        let result = quantize_and_map(&img, Algorithm::Octree, 4, true, None).unwrap();
        assert_eq!(result.palette.len(), 4);
        for &idx in &result.indices {
            assert!((idx as usize) < result.palette.len());
        }
    }

    #[test]
    fn invalid_options_fail_before_any_work() {
        let img = RgbImage::new(2, 2);
        let result = quantize_and_map(&img, Algorithm::MedianCut { use_fast_lookup: false }, 3, false, None);
        assert!(result.is_err());
    }
}
