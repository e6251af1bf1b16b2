use std::collections::BTreeSet;

use crate::color::Color;
use crate::histogram::Histogram;
use crate::palette::Palette;
use crate::progress::ProgressReporter;

const MAX_LEVEL: u32 = 8;

#[derive(Default, Clone, Copy)]
struct Node {
    num_references: u64,
    color_sum: Color,
    occupied: bool,
    is_leaf: bool,
    level: u32,
}

/// An 8-ary, array-heap-indexed tree: node `i`'s children live at
/// `8i + 1 .. 8i + 8`. Child selection at level `L` uses bit `7 - L` of
/// each channel.
struct Octree {
    nodes: Vec<Node>,
    leaves: BTreeSet<usize>,
    nonleaves: BTreeSet<usize>,
}

impl Octree {
    fn new() -> Self {
        Octree {
            nodes: Vec::new(),
            leaves: BTreeSet::new(),
            nonleaves: BTreeSet::new(),
        }
    }

    fn ensure_allocated(&mut self, index: usize) {
        if index >= self.nodes.len() {
            self.nodes.resize(index + 1, Node::default());
        }
    }

    fn insert(&mut self, index: usize, color: &Color, weight: u64, level: u32) {
        self.ensure_allocated(index);

        let node = &mut self.nodes[index];
        node.occupied = true;
        node.level = level;

        if level == MAX_LEVEL {
            node.is_leaf = true;
            node.num_references = weight;
            node.color_sum = *color * weight as i64;
            self.leaves.insert(index);
            return;
        }

        node.num_references += weight;
        node.color_sum += *color * weight as i64;
        self.nonleaves.insert(index);

        let inv_level = 7 - level;
        let child_index = (((color.r >> inv_level) & 1) << 2)
            | (((color.g >> inv_level) & 1) << 1)
            | ((color.b >> inv_level) & 1);
        let child_array_index = 8 * index + 1 + child_index as usize;

        self.insert(child_array_index, color, weight, level + 1);
    }

    /// Collapses `index` into a leaf: any directly-occupied leaf children
    /// are absorbed (their pre-accumulated sum is already present in this
    /// node's running total from insertion), non-leaf children are left
    /// untouched.
    fn reduce_node(&mut self, index: usize) {
        debug_assert!(self.nodes[index].occupied);
        debug_assert!(!self.nodes[index].is_leaf);

        for child_slot in 0..8 {
            let child_index = 8 * index + 1 + child_slot;
            if child_index >= self.nodes.len() {
                continue;
            }
            let child = self.nodes[child_index];
            if !child.occupied || !child.is_leaf {
                continue;
            }
            self.nodes[child_index].occupied = false;
            self.leaves.remove(&child_index);
        }

        self.nodes[index].is_leaf = true;
        self.leaves.insert(index);
    }

    /// Shrinks the leaf set to exactly `palette_size` (or as close as
    /// the tree's shape allows).
    fn reduce(&mut self, palette_size: usize, mut progress: Option<&mut ProgressReporter>) {
        let mut working_list: Vec<usize> = self.nonleaves.iter().copied().collect();
        working_list.sort_by(|&a, &b| {
            let node_a = &self.nodes[a];
            let node_b = &self.nodes[b];
            // Deeper nodes first; ties broken by smaller weight first.
            node_b
                .level
                .cmp(&node_a.level)
                .then(node_a.num_references.cmp(&node_b.num_references))
        });

        let total = working_list.len().max(1) as u64;
        let mut processed = 0u64;

        // Trivial-node pass: collapse every non-root non-leaf with exactly
        // one reference, compacting straight chains before the main merge.
        let mut i = 0;
        while i < working_list.len() {
            let index = working_list[i];
            let node = self.nodes[index];
            if !node.occupied || node.is_leaf || node.num_references != 1 || index == 0 {
                i += 1;
                continue;
            }
            self.reduce_node(index);
            working_list.remove(i);
            processed += 1;
            if let Some(reporter) = progress.as_deref_mut() {
                reporter.report(processed, total);
            }
        }

        while self.leaves.len() > palette_size && !working_list.is_empty() {
            let index = working_list.remove(0);
            self.reduce_node(index);
            processed += 1;
            if let Some(reporter) = progress.as_deref_mut() {
                reporter.report(processed, total);
            }
        }
    }
}

/// Inserts every unique input color into the tree, then repeatedly merges
/// the deepest, lightest non-leaf nodes until exactly `palette_size`
/// leaves remain.
pub fn quantize_octree(
    histogram: &Histogram,
    palette_size: usize,
    progress: Option<&mut ProgressReporter>,
) -> Palette {
    let mut tree = Octree::new();

    for (color, &count) in histogram.iter() {
        tree.insert(0, color, count, 0);
    }

    tree.reduce(palette_size, progress);

    let mut palette = Palette::filled(palette_size, Color::BLACK);
    let mut i = 0;
    for &leaf_index in &tree.leaves {
        let leaf = &tree.nodes[leaf_index];
        if leaf.num_references > 0 {
            palette[i] = leaf.color_sum / leaf.num_references as i64;
            i += 1;
            if i == palette_size {
                break;
            }
        }
    }

    palette
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::compute_histogram;
    use image::RgbImage;

    fn image_with_n_distinct_colors(n: u32) -> RgbImage {
        let side = (n as f64).sqrt().ceil() as u32 + 1;
        let mut img = RgbImage::new(side, side);
        let mut count = 0u32;
        'outer: for x in 0..side {
            for y in 0..side {
                if count >= n {
                    break 'outer;
                }
                // Spread values across the RGB cube so colors are distinct.
                let r = ((count * 37) % 256) as u8;
                let g = ((count * 91) % 256) as u8;
                let b = ((count * 193) % 256) as u8;
                img.put_pixel(x, y, image::Rgb([r, g, b]));
                count += 1;
            }
        }
        img
    }

    #[test]
    fn reduces_to_exactly_palette_size_when_enough_distinct_colors() {
        let img = image_with_n_distinct_colors(300);
        let histogram = compute_histogram(&img, None);
        assert!(histogram.len() >= 16);

        let palette = quantize_octree(&histogram, 16, None);
        assert_eq!(palette.len(), 16);
    }

    #[test]
    fn palette_channels_are_in_range() {
        let img = image_with_n_distinct_colors(300);
        let histogram = compute_histogram(&img, None);
        let palette = quantize_octree(&histogram, 16, None);
        for color in palette.iter() {
            for c in 0..3 {
                assert!((0..=255).contains(&color[c]));
            }
        }
    }

    #[test]
    fn uniform_image_quantizes_to_its_single_color() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([128, 128, 128]));
        let histogram = compute_histogram(&img, None);
        let palette = quantize_octree(&histogram, 2, None);
        assert_eq!(palette.len(), 2);
        assert!(palette.iter().any(|c| *c == Color::new(128, 128, 128)));
    }

    #[test]
    fn four_distinct_colors_at_palette_size_four() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgb([0, 0, 0]));
        img.put_pixel(1, 0, image::Rgb([255, 0, 0]));
        img.put_pixel(0, 1, image::Rgb([0, 255, 0]));
        img.put_pixel(1, 1, image::Rgb([0, 0, 255]));

        let histogram = compute_histogram(&img, None);
        let palette = quantize_octree(&histogram, 4, None);

        let expected = [
            Color::new(0, 0, 0),
            Color::new(255, 0, 0),
            Color::new(0, 255, 0),
            Color::new(0, 0, 255),
        ];
        for e in expected {
            assert!(palette.iter().any(|c| *c == e));
        }
    }
}
