use std::collections::BTreeMap;

use image::RgbImage;

use crate::color::Color;
use crate::pixmap::PixmapView;
use crate::progress::ProgressReporter;

/// Maps distinct input colors to pixel counts. Backed by a `BTreeMap`
/// rather than a `HashMap` so that iteration order is a pure function of
/// contents (lexicographic by color) instead of a per-process random seed
/// — k-means seeding and octree insertion order both depend on this
/// order, and both need to be reproducible across runs.
pub type Histogram = BTreeMap<Color, u64>;

/// Scans every pixel of a decoded `RgbImage`, incrementing the count for
/// that pixel's color.
pub fn compute_histogram(image: &RgbImage, mut progress: Option<&mut ProgressReporter>) -> Histogram {
    let mut histogram = Histogram::new();
    let total = (image.width() as u64) * (image.height() as u64);
    let mut processed = 0u64;

    for pixel in image.pixels() {
        *histogram.entry(Color::from(*pixel)).or_insert(0) += 1;
        processed += 1;
        if let Some(reporter) = progress.as_deref_mut() {
            reporter.report(processed, total);
        }
    }

    histogram
}

/// Scans a raw BGR pixmap view (the historical contract: lowest-address
/// byte is blue), building the same `(R, G, B)`-keyed histogram.
pub fn compute_histogram_from_pixmap(
    pixmap: &PixmapView,
    mut progress: Option<&mut ProgressReporter>,
) -> Histogram {
    let mut histogram = Histogram::new();
    let total = (pixmap.width() as u64) * (pixmap.height() as u64);
    let mut processed = 0u64;

    for y in 0..pixmap.height() {
        for x in 0..pixmap.width() {
            let pixel = pixmap.at(x, y);
            let color = Color::new(pixel[2] as i64, pixel[1] as i64, pixel[0] as i64);
            *histogram.entry(color).or_insert(0) += 1;

            processed += 1;
            if let Some(reporter) = progress.as_deref_mut() {
                reporter.report(processed, total);
            }
        }
    }

    histogram
}
