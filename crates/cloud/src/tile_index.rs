//! Map a bounding box to the TIFF chunks (tiles or strips) covering it.

use urbanlens_core::raster::GeoTransform;

use crate::geometry::BBox;

/// Chunk grid of one TIFF image. Strips are chunks as wide as the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    pub image_width: usize,
    pub image_height: usize,
    pub chunk_width: usize,
    pub chunk_height: usize,
}

impl ChunkLayout {
    pub fn new(image_width: u32, image_height: u32, chunk_width: u32, chunk_height: u32) -> Self {
        Self {
            image_width: image_width as usize,
            image_height: image_height as usize,
            chunk_width: (chunk_width as usize).max(1),
            chunk_height: (chunk_height as usize).max(1),
        }
    }

    pub fn chunks_across(&self) -> usize {
        (self.image_width + self.chunk_width - 1) / self.chunk_width
    }

    pub fn chunks_down(&self) -> usize {
        (self.image_height + self.chunk_height - 1) / self.chunk_height
    }
}

/// A chunk that needs to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRequest {
    /// Linear index in the TIFF chunk array.
    pub index: u32,
    pub chunk_col: usize,
    pub chunk_row: usize,
}

/// Result of mapping a bbox to the chunk grid.
#[derive(Debug, Clone)]
pub struct ChunkMapping {
    pub chunks: Vec<ChunkRequest>,
    /// Pixel range in the full image: (min_col, min_row, max_col_exclusive, max_row_exclusive).
    pub pixel_window: (usize, usize, usize, usize),
    /// Output raster dimensions (rows, cols).
    pub output_shape: (usize, usize),
}

/// Chunks needed to cover `bbox`, or `None` when it misses the image.
pub fn chunks_for_bbox(
    bbox: &BBox,
    geo_transform: &GeoTransform,
    layout: &ChunkLayout,
) -> Option<ChunkMapping> {
    let iw = layout.image_width;
    let ih = layout.image_height;
    let cw = layout.chunk_width;
    let ch = layout.chunk_height;

    // For north-up images, min_y maps to max_row and max_y to min_row.
    let (col_a, row_a) = geo_transform.geo_to_pixel(bbox.min_x, bbox.max_y);
    let (col_b, row_b) = geo_transform.geo_to_pixel(bbox.max_x, bbox.min_y);
    if !(col_a.is_finite() && col_b.is_finite() && row_a.is_finite() && row_b.is_finite()) {
        return None;
    }

    let min_col = col_a.min(col_b).floor() as isize;
    let max_col = col_a.max(col_b).ceil() as isize;
    let min_row = row_a.min(row_b).floor() as isize;
    let max_row = row_a.max(row_b).ceil() as isize;

    let min_col = (min_col.max(0) as usize).min(iw);
    let max_col = (max_col.max(0) as usize).min(iw);
    let min_row = (min_row.max(0) as usize).min(ih);
    let max_row = (max_row.max(0) as usize).min(ih);

    if min_col >= max_col || min_row >= max_row {
        return None;
    }

    let across = layout.chunks_across();
    let col_range = (min_col / cw)..((max_col + cw - 1) / cw).min(across);
    let row_range = (min_row / ch)..((max_row + ch - 1) / ch).min(layout.chunks_down());

    let mut chunks = Vec::new();
    for cr in row_range {
        for cc in col_range.clone() {
            chunks.push(ChunkRequest {
                index: (cr * across + cc) as u32,
                chunk_col: cc,
                chunk_row: cr,
            });
        }
    }

    Some(ChunkMapping {
        chunks,
        pixel_window: (min_col, min_row, max_col, max_row),
        output_shape: (max_row - min_row, max_col - min_col),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiles_for_bbox_simple() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let bbox = BBox::new(10.0, 10.0, 30.0, 30.0);
        let layout = ChunkLayout::new(100, 100, 32, 32);

        let mapping = chunks_for_bbox(&bbox, &gt, &layout).unwrap();

        // Pixels: col 10..30, row 70..90
        assert_eq!(mapping.pixel_window, (10, 70, 30, 90));
        assert_eq!(mapping.output_shape, (20, 20));
        // tile cols 0, tile rows 2 (64..96)
        let idx: Vec<u32> = mapping.chunks.iter().map(|c| c.index).collect();
        assert_eq!(idx, vec![8]);
    }

    #[test]
    fn strips_cover_rows() {
        let gt = GeoTransform::new(500_000.0, 3_000_000.0, 10.0, -10.0);
        let layout = ChunkLayout::new(50, 40, 50, 8);
        let bbox = BBox::new(500_100.0, 3_000_000.0 - 250.0, 500_200.0, 3_000_000.0 - 100.0);

        let mapping = chunks_for_bbox(&bbox, &gt, &layout).unwrap();
        assert_eq!(mapping.pixel_window, (10, 10, 20, 25));
        let idx: Vec<u32> = mapping.chunks.iter().map(|c| c.index).collect();
        assert_eq!(idx, vec![1, 2, 3]);
    }

    #[test]
    fn bbox_is_clamped_to_image() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let layout = ChunkLayout::new(100, 100, 64, 64);
        let mapping = chunks_for_bbox(&BBox::new(-50.0, 50.0, 10.0, 150.0), &gt, &layout).unwrap();
        assert_eq!(mapping.pixel_window, (0, 0, 10, 50));
        assert_eq!(mapping.chunks.len(), 1);
    }

    #[test]
    fn bbox_outside() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let layout = ChunkLayout::new(100, 100, 32, 32);
        assert!(chunks_for_bbox(&BBox::new(200.0, 200.0, 300.0, 300.0), &gt, &layout).is_none());
    }
}
