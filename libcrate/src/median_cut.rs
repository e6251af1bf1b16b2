use crate::color::Color;
use crate::histogram::Histogram;
use crate::palette::Palette;

struct Entry {
    color: Color,
    split_dim: usize,
    split_value: i64,
    palette_index: usize,
}

/// A recursive median-cut partition over the unique input colors. Besides
/// building the palette, the tree doubles as a fast (but approximate)
/// nearest-color search structure.
pub struct MedianCutTree {
    entries: Vec<Entry>,
    num_levels: u32,
}

impl MedianCutTree {
    /// Descends the partition tree: at each level, go left if
    /// `color[split_dim] < split_value`, else right; returns the terminal
    /// range's palette index. This is an approximation — it may not
    /// return the globally nearest palette entry.
    pub fn find_nearest_color_fast(&self, color: &Color) -> usize {
        let mut begin = 0usize;
        let mut end = self.entries.len();
        let mut level = 0u32;

        while level < self.num_levels {
            let median = begin + (end - begin) / 2;
            let pivot = &self.entries[median];
            if color[pivot.split_dim] < pivot.split_value {
                end = median;
            } else {
                begin = median;
            }
            level += 1;
        }

        self.entries[begin].palette_index
    }
}

/// Preconditions: `palette_size` is a power of two. `num_levels =
/// log2(palette_size)`.
pub fn quantize_median_cut(
    histogram: &Histogram,
    palette_size: usize,
    use_fast_lookup: bool,
) -> (Palette, Option<MedianCutTree>) {
    debug_assert!(palette_size.is_power_of_two());
    let num_levels = palette_size.trailing_zeros();

    let mut entries: Vec<Entry> = histogram
        .keys()
        .map(|&color| Entry {
            color,
            split_dim: 0,
            split_value: 0,
            palette_index: 0,
        })
        .collect();

    let mut palette = Palette::filled(palette_size, Color::BLACK);
    let mut next_palette_index = 0usize;
    perform_median_cut(&mut entries, 0, entries.len(), 0, num_levels, &mut palette, &mut next_palette_index);

    let lookup = if use_fast_lookup {
        Some(MedianCutTree { entries, num_levels })
    } else {
        None
    };

    (palette, lookup)
}

fn perform_median_cut(
    entries: &mut [Entry],
    begin: usize,
    end: usize,
    level: u32,
    num_levels: u32,
    palette: &mut Palette,
    next_palette_index: &mut usize,
) {
    if begin == end {
        // Fewer unique colors than the palette size: this subtree has no
        // entries left to split. Leave its palette slots at their default
        // (black) value rather than dividing by zero.
        let num_leaves = 1usize << (num_levels - level);
        *next_palette_index += num_leaves;
        return;
    }

    if level == num_levels {
        let mut accumulated = Color::BLACK;
        for entry in &mut entries[begin..end] {
            accumulated += entry.color;
            entry.palette_index = *next_palette_index;
        }
        let count = (end - begin) as i64;
        palette[*next_palette_index] = accumulated / count;
        *next_palette_index += 1;
        return;
    }

    let largest_dim = find_largest_range_dimension(&entries[begin..end]);

    entries[begin..end].sort_by_key(|e| e.color[largest_dim]);

    let median = begin + (end - begin) / 2;
    let split_value = entries[median].color[largest_dim];

    perform_median_cut(entries, begin, median, level + 1, num_levels, palette, next_palette_index);
    perform_median_cut(entries, median, end, level + 1, num_levels, palette, next_palette_index);

    entries[median].split_dim = largest_dim;
    entries[median].split_value = split_value;
}

fn find_largest_range_dimension(entries: &[Entry]) -> usize {
    let mut min_rgb = entries[0].color;
    let mut max_rgb = entries[0].color;

    for entry in &entries[1..] {
        for c in 0..3 {
            min_rgb[c] = min_rgb[c].min(entry.color[c]);
            max_rgb[c] = max_rgb[c].max(entry.color[c]);
        }
    }

    let mut largest_range = -1i64;
    let mut largest_dim = 0usize;
    for c in 0..3 {
        let range = max_rgb[c] - min_rgb[c];
        if range > largest_range {
            largest_range = range;
            largest_dim = c;
        }
    }

    largest_dim
}
