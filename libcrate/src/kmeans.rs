//! Celebi-accelerated Lloyd iteration: "Improving the performance of
//! k-means for color quantization", M. Emre Celebi,
//! <https://doi.org/10.1016/j.imavis.2010.10.002>.

use crate::color::{calculate_color_distance, Color};
use crate::histogram::Histogram;
use crate::palette::{find_nearest_color, Palette};
use crate::progress::ProgressReporter;

const MAX_ITERATIONS: u32 = 100;
const CONVERGENCE_START_ITERATION: u32 = 30;
const CONVERGENCE_MIN_IMPROVEMENT: i64 = 5;

struct WeightedColor {
    color: Color,
    weight: f64,
}

/// Runs Lloyd's algorithm over the weighted set of unique input colors,
/// returning a palette of exactly `palette_size` entries.
pub fn quantize_kmeans(
    histogram: &Histogram,
    palette_size: usize,
    mut progress: Option<&mut ProgressReporter>,
) -> Palette {
    let total_pixels: u64 = histogram.values().sum();
    let unique_colors: Vec<WeightedColor> = histogram
        .iter()
        .map(|(&color, &count)| WeightedColor {
            color,
            weight: count as f64 / total_pixels as f64,
        })
        .collect();

    let mut palette = seed_initial_palette(&unique_colors, palette_size);
    let mut assignments = initial_assignments(&unique_colors, &palette);

    if let Some(reporter) = progress.as_deref_mut() {
        reporter.report(0, MAX_ITERATIONS as u64);
    }

    let mut min_max_distance: Option<i64> = None;
    let mut distance_matrix = vec![0i64; palette_size * palette_size];
    let mut permutation = vec![0usize; palette_size * palette_size];

    for iteration in 0..MAX_ITERATIONS {
        build_distance_matrix(&palette, &mut distance_matrix);
        build_sorted_permutation(&distance_matrix, palette_size, &mut permutation);

        let max_distance = reassign_colors(
            &unique_colors,
            &palette,
            &distance_matrix,
            &permutation,
            palette_size,
            &mut assignments,
        );

        let new_palette = update_centroids(&unique_colors, &assignments, &palette, palette_size);

        if let Some(prev_min_max) = min_max_distance {
            if iteration > CONVERGENCE_START_ITERATION
                && (max_distance > prev_min_max || prev_min_max - max_distance < CONVERGENCE_MIN_IMPROVEMENT)
            {
                // `max_distance` was measured against `palette`, not
                // `new_palette` — return the palette the break test
                // actually evaluated, one Lloyd update earlier.
                break;
            }
        }
        min_max_distance = Some(max_distance);
        palette = new_palette;

        if let Some(reporter) = progress.as_deref_mut() {
            reporter.report((iteration + 1) as u64, MAX_ITERATIONS as u64);
        }
    }

    palette
}

/// Samples `palette_size` entries from the unique-color list at stride
/// `N/P`, in histogram iteration order.
fn seed_initial_palette(unique_colors: &[WeightedColor], palette_size: usize) -> Palette {
    let n = unique_colors.len();
    let mut palette = Palette::filled(palette_size, Color::BLACK);
    for i in 0..palette_size {
        let index = i * n / palette_size;
        palette[i] = unique_colors[index].color;
    }
    palette
}

fn initial_assignments(unique_colors: &[WeightedColor], palette: &Palette) -> Vec<usize> {
    unique_colors
        .iter()
        .map(|wc| find_nearest_color(palette, &wc.color))
        .collect()
}

fn build_distance_matrix(palette: &Palette, distance_matrix: &mut [i64]) {
    let size = palette.len();
    for i in 0..size {
        distance_matrix[i + i * size] = 0;
        for j in (i + 1)..size {
            let d = calculate_color_distance(&palette[i], &palette[j]);
            distance_matrix[i + j * size] = d;
            distance_matrix[j + i * size] = d;
        }
    }
}

/// For each palette index `i`, `permutation[i, 0..P]` is `0..P-1` sorted
/// ascending by distance to `i`. `permutation[i, 0]` is always `i` itself.
fn build_sorted_permutation(distance_matrix: &[i64], size: usize, permutation: &mut [usize]) {
    for i in 0..size {
        let row = &mut permutation[i * size..(i + 1) * size];
        for (j, slot) in row.iter_mut().enumerate() {
            *slot = j;
        }
        row.sort_by_key(|&j| distance_matrix[j + i * size]);
    }
}

/// Reassigns each unique color to its nearest palette entry, pruning the
/// scan with the triangle inequality once `D[t, p] >= 4 * prev_d` (where
/// `prev_d` is the color's *initial* assignment distance this iteration,
/// never updated inside the inner scan — the published conservative
/// bound). Returns the maximum assignment distance seen this iteration.
fn reassign_colors(
    unique_colors: &[WeightedColor],
    palette: &Palette,
    distance_matrix: &[i64],
    permutation: &[usize],
    palette_size: usize,
    assignments: &mut [usize],
) -> i64 {
    let mut max_distance: Option<i64> = None;

    for (i, wc) in unique_colors.iter().enumerate() {
        let palette_index = assignments[i];
        let prev_distance = calculate_color_distance(&wc.color, &palette[palette_index]);
        let mut min_distance = prev_distance;

        for k in 1..palette_size {
            let t = permutation[k + palette_index * palette_size];
            if distance_matrix[t + palette_index * palette_size] >= 4 * prev_distance {
                break;
            }

            let distance = calculate_color_distance(&wc.color, &palette[t]);
            if distance <= min_distance {
                min_distance = distance;
                assignments[i] = t;
            }
        }

        max_distance = Some(max_distance.map_or(min_distance, |m| m.max(min_distance)));
    }

    max_distance.unwrap_or(0)
}

/// Centroid update: `new_palette[k] = floor(sum(w_i * c_i) / sum(w_i))`
/// over colors assigned to bin `k`. A bin with no members keeps its
/// previous centroid rather than dividing by zero.
fn update_centroids(
    unique_colors: &[WeightedColor],
    assignments: &[usize],
    previous_palette: &Palette,
    palette_size: usize,
) -> Palette {
    let mut sum_color = vec![[0.0f64; 3]; palette_size];
    let mut sum_weight = vec![0.0f64; palette_size];

    for (wc, &bin) in unique_colors.iter().zip(assignments.iter()) {
        for c in 0..3 {
            sum_color[bin][c] += wc.color[c] as f64 * wc.weight;
        }
        sum_weight[bin] += wc.weight;
    }

    let mut new_palette = Palette::filled(palette_size, Color::BLACK);
    for k in 0..palette_size {
        if sum_weight[k] > 0.0 {
            new_palette[k] = Color::new(
                (sum_color[k][0] / sum_weight[k]) as i64,
                (sum_color[k][1] / sum_weight[k]) as i64,
                (sum_color[k][2] / sum_weight[k]) as i64,
            );
        } else {
            new_palette[k] = previous_palette[k];
        }
    }

    new_palette
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::compute_histogram;
    use image::RgbImage;

    fn clustered_image() -> RgbImage {
        // 8 well-separated clusters, several samples each, with small jitter.
        let centers = [
            (10, 10, 10),
            (245, 10, 10),
            (10, 245, 10),
            (10, 10, 245),
            (245, 245, 10),
            (245, 10, 245),
            (10, 245, 245),
            (245, 245, 245),
        ];
        let mut img = RgbImage::new(8, 8);
        for (i, &(r, g, b)) in centers.iter().enumerate() {
            for jitter in 0..8 {
                let x = (i * 8 / centers.len()) as u32 + (jitter % 2);
                let y = jitter as u32;
                let r = (r as i32 + (jitter as i32 % 3) - 1).clamp(0, 255) as u8;
                img.put_pixel(x.min(7), y.min(7), image::Rgb([r, g, b]));
            }
        }
        img
    }

    #[test]
    fn produces_exactly_palette_size_entries_with_valid_channels() {
        let img = clustered_image();
        let histogram = compute_histogram(&img, None);
        let palette = quantize_kmeans(&histogram, 8, None);

        assert_eq!(palette.len(), 8);
        for color in palette.iter() {
            for c in 0..3 {
                assert!((0..=255).contains(&color[c]));
            }
        }
    }

    #[test]
    fn converges_close_to_cluster_means() {
        let mut img = RgbImage::new(16, 16);
        let centers = [
            (0, 0, 0),
            (255, 0, 0),
            (0, 255, 0),
            (0, 0, 255),
            (255, 255, 0),
            (255, 0, 255),
            (0, 255, 255),
            (255, 255, 255),
        ];
        let mut idx = 0u32;
        for &(r, g, b) in &centers {
            for _ in 0..32 {
                let x = idx % 16;
                let y = idx / 16;
                img.put_pixel(x, y, image::Rgb([r, g, b]));
                idx += 1;
            }
        }

        let histogram = compute_histogram(&img, None);
        let palette = quantize_kmeans(&histogram, 8, None);

        // Every input cluster mean must be represented (setwise) within
        // rounding distance in the resulting palette.
        for &(r, g, b) in &centers {
            let target = Color::new(r as i64, g as i64, b as i64);
            let closest = palette
                .iter()
                .map(|p| calculate_color_distance(p, &target))
                .min()
                .unwrap();
            assert_eq!(closest, 0, "expected an exact palette match for {target:?}");
        }
    }

    #[test]
    fn single_unique_color_converges_to_that_color() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([128, 64, 32]));
        let histogram = compute_histogram(&img, None);
        let palette = quantize_kmeans(&histogram, 2, None);

        assert_eq!(palette.len(), 2);
        assert!(palette.iter().any(|c| *c == Color::new(128, 64, 32)));
    }
}
