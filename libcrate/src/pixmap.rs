//! Raw pixmap views matching the language-neutral core API contract: a
//! flat byte buffer plus shape, with no assumption about who owns the
//! underlying storage. This exists alongside the `image`-crate-backed
//! entry points so callers who only have a raw BGR buffer (the historical
//! contract the original program was built against) still have one.

/// `(data, width, height, hstride, num_channels)`. Byte order per pixel is
/// B, G, R at channel offsets 0, 1, 2.
pub struct PixmapView<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    hstride: usize,
    num_channels: usize,
}

impl<'a> PixmapView<'a> {
    pub fn new(data: &'a [u8], width: usize, height: usize, hstride: usize, num_channels: usize) -> Self {
        assert!(
            data.len() >= hstride * height,
            "pixmap buffer too small for the given stride/height"
        );
        PixmapView {
            data,
            width,
            height,
            hstride,
            num_channels,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn at(&self, x: usize, y: usize) -> &[u8] {
        let offset = x * self.num_channels + y * self.hstride;
        &self.data[offset..offset + self.num_channels]
    }
}

/// Same shape as `PixmapView`, but over a mutable buffer; used for the
/// one-byte-per-pixel palette-index output and for the dithering working
/// buffer.
pub struct PixmapViewMut<'a> {
    data: &'a mut [u8],
    width: usize,
    height: usize,
    hstride: usize,
    num_channels: usize,
}

impl<'a> PixmapViewMut<'a> {
    pub fn new(data: &'a mut [u8], width: usize, height: usize, hstride: usize, num_channels: usize) -> Self {
        assert!(
            data.len() >= hstride * height,
            "pixmap buffer too small for the given stride/height"
        );
        PixmapViewMut {
            data,
            width,
            height,
            hstride,
            num_channels,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn at(&self, x: usize, y: usize) -> &[u8] {
        let offset = x * self.num_channels + y * self.hstride;
        &self.data[offset..offset + self.num_channels]
    }

    pub fn at_mut(&mut self, x: usize, y: usize) -> &mut [u8] {
        let offset = x * self.num_channels + y * self.hstride;
        &mut self.data[offset..offset + self.num_channels]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_reads_bgr_pixel() {
        // 2x1 image, 3 channels, no padding.
        let data = [10u8, 20, 30, 40, 50, 60];
        let view = PixmapView::new(&data, 2, 1, 6, 3);
        assert_eq!(view.at(0, 0), [10, 20, 30]);
        assert_eq!(view.at(1, 0), [40, 50, 60]);
    }

    #[test]
    fn mut_view_roundtrips_writes() {
        let mut data = [0u8; 4];
        {
            let mut view = PixmapViewMut::new(&mut data, 4, 1, 4, 1);
            view.at_mut(2, 0)[0] = 7;
        }
        assert_eq!(data, [0, 0, 7, 0]);
    }
}
