mod algorithm;
mod color;
mod histogram;
mod kdtree;
mod kmeans;
mod mapper;
mod median_cut;
mod octree;
mod palette;
mod pixmap;
mod progress;

use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageReader, RgbImage};

pub use algorithm::{quantize_and_map, validate_options, Algorithm, QuantizationOutput};
pub use color::{calculate_color_distance, Color};
pub use histogram::{compute_histogram, compute_histogram_from_pixmap, Histogram};
pub use kmeans::quantize_kmeans;
pub use mapper::{produce_palettized_output, NearestColorFn};
pub use median_cut::{quantize_median_cut, MedianCutTree};
pub use octree::quantize_octree;
pub use palette::{find_nearest_color, palette_from_tuples, Palette};
pub use pixmap::{PixmapView, PixmapViewMut};
pub use progress::{stderr_progress, ProgressReporter};

/// A decoded 24-bit RGB source image, the entry point consumers of this
/// crate are expected to use (rather than reaching for the lower-level
/// `compute_histogram`/`quantize_*`/`produce_palettized_output` functions
/// directly).
pub struct Image {
    width: u32,
    height: u32,
    data: RgbImage,
}

impl Image {
    pub fn new<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let data = ImageReader::open(path.as_ref())
            .with_context(|| format!("Failed to open: {:?}", path.as_ref()))?
            .decode()
            .with_context(|| "Failed to decode the file")?
            .to_rgb8();
        Ok(Image {
            width: data.width(),
            height: data.height(),
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn compute_histogram(&self, progress: Option<&mut ProgressReporter>) -> Histogram {
        histogram::compute_histogram(&self.data, progress)
    }

    /// Runs the full quantize → map pipeline: histogram, the selected
    /// quantizer, then the output mapper (with optional dithering).
    pub fn quantize(
        &self,
        algorithm: Algorithm,
        palette_size: usize,
        dithering: bool,
        progress: Option<&mut ProgressReporter>,
    ) -> Result<QuantizationOutput> {
        algorithm::quantize_and_map(&self.data, algorithm, palette_size, dithering, progress)
    }

    /// Skips quantization entirely and maps straight onto a caller-supplied
    /// palette (e.g. a custom palette loaded from config).
    pub fn quantize_with_palette(
        &self,
        palette: Palette,
        dithering: bool,
        progress: Option<&mut ProgressReporter>,
    ) -> Result<QuantizationOutput> {
        let (diffused_input, indices) =
            mapper::produce_palettized_output(&self.data, &palette, dithering, None, progress);
        Ok(QuantizationOutput {
            palette,
            indices,
            diffused_input,
        })
    }

    /// Reconstructs a full-color preview of the indexed output by
    /// mapping each index back through the palette — what the caller's
    /// GIF/PNG encoder would ultimately render from the index buffer and
    /// embedded palette.
    pub fn render_indexed(&self, output: &QuantizationOutput) -> RgbImage {
        let mut image = RgbImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let index = output.indices[(y * self.width + x) as usize] as usize;
                image.put_pixel(x, y, output.palette[index].into());
            }
        }
        image
    }

    pub fn save<P>(path: P, data: &RgbImage) -> Result<()>
    where
        P: AsRef<Path>,
    {
        data.save(path.as_ref())
            .with_context(|| format!("Failed to save image to {:?}", path.as_ref()))
    }
}
