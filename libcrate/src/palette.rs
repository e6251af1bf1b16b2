use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;

use crate::color::{calculate_color_distance, Color};

/// An ordered sequence of at most 256 colors. Index positions are the
/// palette's public identity: the output image stores these indices
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    /// A palette of `size` copies of `template` (the driver instantiates
    /// this as all-black before a quantizer fills it in).
    pub fn filled(size: usize, template: Color) -> Self {
        Palette {
            colors: vec![template; size],
        }
    }

    pub fn from_colors(colors: Vec<Color>) -> Self {
        Palette { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn as_slice(&self) -> &[Color] {
        &self.colors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Color> {
        self.colors.iter()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut image = RgbImage::new(self.len() as u32, 1);
        for (i, color) in self.colors.iter().enumerate() {
            image.put_pixel(i as u32, 0, (*color).into());
        }
        image
            .save(path.as_ref())
            .with_context(|| format!("Failed to save palette to {:?}", path.as_ref()))
    }
}

impl std::ops::Index<usize> for Palette {
    type Output = Color;
    fn index(&self, index: usize) -> &Color {
        &self.colors[index]
    }
}

impl std::ops::IndexMut<usize> for Palette {
    fn index_mut(&mut self, index: usize) -> &mut Color {
        &mut self.colors[index]
    }
}

impl<'a> IntoIterator for &'a Palette {
    type Item = &'a Color;
    type IntoIter = std::slice::Iter<'a, Color>;
    fn into_iter(self) -> Self::IntoIter {
        self.colors.iter()
    }
}

/// Builds a palette from plain RGB tuples (a caller-supplied custom
/// palette, bypassing quantization).
pub fn palette_from_tuples(colors: &[(u8, u8, u8)]) -> Palette {
    Palette::from_colors(
        colors
            .iter()
            .map(|&(r, g, b)| Color::new(r as i64, g as i64, b as i64))
            .collect(),
    )
}

/// Scans every entry, keeping the minimum-distance index (ties broken by
/// earliest index). Used by k-means during initial assignment; too slow
/// for the per-pixel output pass, which uses the k-d tree instead.
pub fn find_nearest_color(palette: &Palette, color: &Color) -> usize {
    let mut best_index = 0;
    let mut best_distance = calculate_color_distance(&palette[0], color);

    for (index, entry) in palette.iter().enumerate().skip(1) {
        let distance = calculate_color_distance(entry, color);
        if distance < best_distance {
            best_distance = distance;
            best_index = index;
        }
    }

    best_index
}
