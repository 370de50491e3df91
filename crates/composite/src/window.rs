//! Pixel windows and boundless windowed reads.

use std::ops::Range;

use ndarray::{s, Array2};

use ntl_common::BoundingBox;

use crate::error::{CompositeError, Result};
use crate::raster::{GeoRaster, GeoTransform};

/// Largest window, in pixels, a single read may allocate.
pub const MAX_WINDOW_PIXELS: usize = 1 << 28;

/// Half-open pixel ranges `[row_start, row_end) x [col_start, col_end)`.
///
/// Indices may be negative or past the raster extent; pixels outside the
/// raster read as the fill value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub row_start: isize,
    pub row_end: isize,
    pub col_start: isize,
    pub col_end: isize,
}

impl PixelWindow {
    /// Window covering `bounds` on the grid of `transform`.
    ///
    /// The lower-left corner gives the last row and first column, the
    /// upper-right corner the first row and last column; both corners are
    /// inclusive. Non-finite bounds and windows larger than
    /// [`MAX_WINDOW_PIXELS`] are rejected.
    pub fn from_bounds(bounds: &BoundingBox, transform: &GeoTransform) -> Result<Self> {
        if !bounds.is_valid() {
            return Err(CompositeError::invalid_bounds(format!(
                "{} is not a finite min/max box",
                bounds
            )));
        }

        let (row_ll, col_ll) = transform.index(bounds.min_x, bounds.min_y);
        let (row_ur, col_ur) = transform.index(bounds.max_x, bounds.max_y);

        let too_large =
            || CompositeError::invalid_bounds(format!("{} spans too many pixels", bounds));

        let window = Self {
            row_start: row_ur.min(row_ll),
            row_end: row_ll.max(row_ur).checked_add(1).ok_or_else(too_large)?,
            col_start: col_ll.min(col_ur),
            col_end: col_ur.max(col_ll).checked_add(1).ok_or_else(too_large)?,
        };

        let rows = window.row_end.checked_sub(window.row_start);
        let cols = window.col_end.checked_sub(window.col_start);
        let pixels = match (rows, cols) {
            (Some(rows), Some(cols)) => (rows as usize).checked_mul(cols as usize),
            _ => None,
        };
        match pixels {
            Some(n) if n <= MAX_WINDOW_PIXELS => Ok(window),
            _ => Err(too_large()),
        }
    }

    /// Mask of window pixels that fall inside a `rows x cols` raster.
    pub fn coverage(&self, rows: usize, cols: usize) -> Array2<bool> {
        let mut covered = Array2::from_elem(self.shape(), false);
        if let Some(o) = self.overlap(rows, cols) {
            covered.slice_mut(s![o.dst_rows, o.dst_cols]).fill(true);
        }
        covered
    }

    /// Where the window overlaps a `rows x cols` raster, if anywhere.
    fn overlap(&self, rows: usize, cols: usize) -> Option<Overlap> {
        let r0 = self.row_start.max(0);
        let r1 = self.row_end.min(rows as isize);
        let c0 = self.col_start.max(0);
        let c1 = self.col_end.min(cols as isize);
        if r0 >= r1 || c0 >= c1 {
            return None;
        }

        let dst_r0 = (r0 - self.row_start) as usize;
        let dst_c0 = (c0 - self.col_start) as usize;
        let height = (r1 - r0) as usize;
        let width = (c1 - c0) as usize;
        Some(Overlap {
            dst_rows: dst_r0..dst_r0 + height,
            dst_cols: dst_c0..dst_c0 + width,
            src_rows: r0 as usize..r1 as usize,
            src_cols: c0 as usize..c1 as usize,
        })
    }

    pub fn rows(&self) -> usize {
        (self.row_end - self.row_start) as usize
    }

    pub fn cols(&self) -> usize {
        (self.col_end - self.col_start) as usize
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }
}

/// Matching index ranges in the window (`dst`) and the raster (`src`).
struct Overlap {
    dst_rows: Range<usize>,
    dst_cols: Range<usize>,
    src_rows: Range<usize>,
    src_cols: Range<usize>,
}

/// Read `bounds` from `raster`, filling pixels outside its extent with
/// `T::default()` (0 for numeric samples).
///
/// The output shape depends only on the window.
pub fn read_window<T: Copy + Default>(
    raster: &GeoRaster<T>,
    bounds: &BoundingBox,
) -> Result<Array2<T>> {
    let window = PixelWindow::from_bounds(bounds, &raster.transform)?;
    Ok(read_pixel_window(&raster.data, &window))
}

/// Boundless read of `window` from `data`.
pub fn read_pixel_window<T: Copy + Default>(data: &Array2<T>, window: &PixelWindow) -> Array2<T> {
    let mut out = Array2::from_elem(window.shape(), T::default());
    if let Some(o) = window.overlap(data.nrows(), data.ncols()) {
        out.slice_mut(s![o.dst_rows, o.dst_cols])
            .assign(&data.slice(s![o.src_rows, o.src_cols]));
    }
    out
}
