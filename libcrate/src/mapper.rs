use image::RgbImage;

use crate::color::{calculate_color_distance, Color};
use crate::kdtree::{self, KdTree};
use crate::palette::Palette;
use crate::progress::ProgressReporter;

const CHROMA_WEIGHTS: [i64; 3] = [299, 587, 114];
const FLOYD_STEINBERG_OFFSETS: [(i32, i32, i64); 4] = [(1, 0, 7), (-1, 1, 3), (0, 1, 5), (1, 1, 1)];
const FLOYD_STEINBERG_TOTAL_WEIGHT: i64 = 16;

/// A caller-provided override for nearest-color lookup (e.g. median-cut's
/// fast partition descent), used instead of the default palette k-d tree.
pub type NearestColorFn<'a> = dyn Fn(&Color) -> usize + 'a;

/// Builds a k-d tree over palette *indices*, splitting on
/// `palette[idx][level % 3]`, with a signed plane-distance function whose
/// sign encodes which side of the split a query color falls on (needed
/// for the branch-and-bound pruning test in `kdtree::find_nearest`).
fn build_palette_kd_tree(palette: &Palette) -> KdTree<usize> {
    let mut indices: Vec<usize> = (0..palette.len()).collect();

    kdtree::build(
        &mut indices,
        |&a, &b, level| {
            let dim = (level % 3) as usize;
            palette[a][dim] < palette[b][dim]
        },
        |&i| i,
    )
}

fn palette_dist_fn(palette: &Palette) -> impl Fn(&usize, &Color) -> i64 + '_ {
    move |&idx, color| calculate_color_distance(&palette[idx], color)
}

fn palette_plane_dist_fn(palette: &Palette) -> impl Fn(&usize, &Color, u32) -> i64 + '_ {
    move |&idx, color, level| {
        let dim = (level % 3) as usize;
        let node_color = palette[idx];
        let a = node_color.isolate_channel(dim);
        let b = color.isolate_channel(dim);
        let sign = if color[dim] >= node_color[dim] { 1 } else { -1 };
        calculate_color_distance(&a, &b) * sign
    }
}

/// For each output pixel, finds the nearest palette color and writes its
/// index into `output`. If `dithering` is enabled, quantization error is
/// diffused forward (Floyd–Steinberg, weights 7/3/5/1 over 16) into an
/// owned working copy of `input` rather than into the caller's buffer —
/// see SPEC_FULL.md's design notes for why this deviates from the
/// original in-place mutation.
///
/// Returns the (possibly diffused) working copy of the input alongside
/// the palette-index output buffer, since callers who asked for
/// dithering may want to inspect what the diffusion produced.
pub fn produce_palettized_output(
    input: &RgbImage,
    palette: &Palette,
    dithering: bool,
    nearest_color_fn: Option<&NearestColorFn>,
    mut progress: Option<&mut ProgressReporter>,
) -> (RgbImage, Vec<u8>) {
    let width = input.width();
    let height = input.height();

    let kd_tree = build_palette_kd_tree(palette);
    let dist_fn = palette_dist_fn(palette);
    let plane_dist_fn = palette_plane_dist_fn(palette);

    let default_lookup = |color: &Color| -> usize {
        kdtree::find_nearest(&kd_tree, color, &dist_fn, &plane_dist_fn)
            .map(|idx| *kd_tree.value(idx))
            .expect("palette must be non-empty")
    };

    let mut working_input = input.clone();
    let mut output = vec![0u8; (width * height) as usize];

    let total = (width as u64) * (height as u64);
    let mut processed = 0u64;

    for y in 0..height {
        for x in 0..width {
            let pixel_color = Color::from(*working_input.get_pixel(x, y));

            let nearest_index = match nearest_color_fn {
                Some(f) => f(&pixel_color),
                None => default_lookup(&pixel_color),
            };

            output[(y * width + x) as usize] = nearest_index as u8;

            if dithering {
                let nearest_color = palette[nearest_index];
                let quantization_error = pixel_color - nearest_color;
                diffuse_error(&mut working_input, x, y, width, height, quantization_error);
            }

            processed += 1;
            if let Some(reporter) = progress.as_deref_mut() {
                reporter.report(processed, total);
            }
        }
    }

    (working_input, output)
}

fn diffuse_error(image: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, error: Color) {
    for &(dx, dy, weight) in &FLOYD_STEINBERG_OFFSETS {
        if dx < 0 && x == 0 {
            continue;
        }
        if dx > 0 && x == width - 1 {
            continue;
        }
        if dy > 0 && y == height - 1 {
            continue;
        }
        // dy is never negative in the Floyd-Steinberg kernel used here.

        let nx = (x as i64 + dx as i64) as u32;
        let ny = (y as i64 + dy as i64) as u32;

        let mut neighbor = *image.get_pixel(nx, ny);
        for c in 0..3 {
            let delta = error[c] * weight * CHROMA_WEIGHTS[c] / FLOYD_STEINBERG_TOTAL_WEIGHT / 1000;
            let updated = (neighbor.0[c] as i64 + delta).clamp(0, 255);
            neighbor.0[c] = updated as u8;
        }
        image.put_pixel(nx, ny, neighbor);
    }
}
