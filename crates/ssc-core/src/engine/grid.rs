use std::ops::Range;

use geo::{Coord, Rect};

use crate::coords::{cell_area_m2, step_for_scale};
use crate::raster::Raster;

/// Tolerance, in cells, when snapping coordinates to grid lines.
const SNAP: f64 = 1e-9;

/// A lon/lat pixel grid at a nominal scale.
///
/// Cells are `step × step` degrees with `step = scale / METRES_PER_DEGREE` and
/// edges on integer multiples of `step`, so every grid at one scale shares the
/// same cell edges. Row 0 is the southernmost row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingGrid {
    /// Global column index of column 0.
    pub col0: i64,
    /// Global row index of row 0.
    pub row0: i64,
    pub cols: usize,
    pub rows: usize,
    /// Cell size in degrees.
    pub step: f64,
}

impl SamplingGrid {
    /// Smallest aligned grid covering `rect`.
    pub fn covering(rect: Rect<f64>, scale_m: f64) -> Self {
        let step = step_for_scale(scale_m);
        let col0 = (rect.min().x / step + SNAP).floor() as i64;
        let row0 = (rect.min().y / step + SNAP).floor() as i64;
        let col1 = ((rect.max().x / step - SNAP).ceil() as i64).max(col0 + 1);
        let row1 = ((rect.max().y / step - SNAP).ceil() as i64).max(row0 + 1);
        Self {
            col0,
            row0,
            cols: (col1 - col0) as usize,
            rows: (row1 - row0) as usize,
            step,
        }
    }

    /// Pixel count; compared against pixel budgets before anything is allocated.
    pub fn pixel_count(&self) -> u64 {
        self.cols as u64 * self.rows as u64
    }

    pub fn min_lon(&self) -> f64 {
        self.col0 as f64 * self.step
    }

    pub fn min_lat(&self) -> f64 {
        self.row0 as f64 * self.step
    }

    pub fn max_lon(&self) -> f64 {
        (self.col0 + self.cols as i64) as f64 * self.step
    }

    pub fn max_lat(&self) -> f64 {
        (self.row0 + self.rows as i64) as f64 * self.step
    }

    pub fn cell_center(&self, row: usize, col: usize) -> Coord<f64> {
        geo::coord! {
            x: (self.col0 as f64 + col as f64 + 0.5) * self.step,
            y: (self.row0 as f64 + row as f64 + 0.5) * self.step,
        }
    }

    pub fn cell_rect(&self, row: usize, col: usize) -> Rect<f64> {
        Rect::new(self.vertex(col as i64, row as i64), self.vertex(col as i64 + 1, row as i64 + 1))
    }

    /// Corner `(x, y)` of the grid in cell units; `(0, 0)` is the SW corner.
    pub fn vertex(&self, x: i64, y: i64) -> Coord<f64> {
        geo::coord! {
            x: (self.col0 + x) as f64 * self.step,
            y: (self.row0 + y) as f64 * self.step,
        }
    }

    /// True area of any cell in `row` (m²).
    pub fn cell_area_m2(&self, row: usize) -> f64 {
        let lat0 = (self.row0 + row as i64) as f64 * self.step;
        cell_area_m2(lat0, lat0 + self.step, self.step)
    }

    /// Row and column ranges of the cells overlapping `rect`.
    pub fn index_range(&self, rect: Rect<f64>) -> Option<(Range<usize>, Range<usize>)> {
        let clamp = |v: i64, n: usize| v.clamp(0, n as i64) as usize;
        let c_lo = clamp((rect.min().x / self.step + SNAP).floor() as i64 - self.col0, self.cols);
        let c_hi = clamp((rect.max().x / self.step - SNAP).ceil() as i64 - self.col0, self.cols);
        let r_lo = clamp((rect.min().y / self.step + SNAP).floor() as i64 - self.row0, self.rows);
        let r_hi = clamp((rect.max().y / self.step - SNAP).ceil() as i64 - self.row0, self.rows);
        (c_lo < c_hi && r_lo < r_hi).then_some((r_lo..r_hi, c_lo..c_hi))
    }

    /// Wrap row-major cell values into a [`Raster`] over this grid.
    pub fn to_raster(&self, data: Vec<f32>) -> Raster {
        debug_assert_eq!(data.len(), self.cols * self.rows);
        Raster {
            data,
            width: self.cols,
            height: self.rows,
            min_lon: self.min_lon(),
            max_lon: self.max_lon(),
            min_lat: self.min_lat(),
            max_lat: self.max_lat(),
        }
    }
}
