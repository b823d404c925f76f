use geo::Rect;
use serde::{Deserialize, Serialize};

use crate::coords::LatLon;

/// A single-band lon/lat raster storing f32 values, row-major.
/// Row 0 is the southernmost row (S→N). `NaN` marks masked pixels.
/// Coordinate math uses f64; pixel values use f32.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raster {
    /// Row-major pixel values; `NaN` (serialized as `null`) = masked.
    #[serde(deserialize_with = "null_as_nan_vec")]
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

fn null_as_nan_vec<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<f32>, D::Error> {
    let v: Vec<Option<f32>> = Vec::deserialize(d)?;
    Ok(v.into_iter().map(|x| x.unwrap_or(f32::NAN)).collect())
}

impl Raster {
    /// Create a new Raster filled with the given value.
    pub fn new(width: usize, height: usize, min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64, fill: f32) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    /// Create a fully masked Raster over the given bounds.
    pub fn masked(width: usize, height: usize, min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self::new(width, height, min_lon, max_lon, min_lat, max_lat, f32::NAN)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    /// Pixel width in degrees of longitude.
    pub fn pixel_width(&self) -> f64 {
        (self.max_lon - self.min_lon) / self.width as f64
    }

    /// Pixel height in degrees of latitude.
    pub fn pixel_height(&self) -> f64 {
        (self.max_lat - self.min_lat) / self.height as f64
    }

    pub fn bounds(&self) -> Rect<f64> {
        Rect::new(
            geo::coord! { x: self.min_lon, y: self.min_lat },
            geo::coord! { x: self.max_lon, y: self.max_lat },
        )
    }

    /// Geographic centre of pixel `(row, col)`.
    pub fn pixel_center(&self, row: usize, col: usize) -> LatLon {
        LatLon::new(
            self.min_lat + (row as f64 + 0.5) * self.pixel_height(),
            self.min_lon + (col as f64 + 0.5) * self.pixel_width(),
        )
    }

    /// `(row, col)` of the pixel containing (lon, lat), or None when outside.
    /// Pixels are half-open: `[min, min + size)`.
    pub fn index_of(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let fx = (lon - self.min_lon) / self.pixel_width();
        let fy = (lat - self.min_lat) / self.pixel_height();
        if fx < 0.0 || fy < 0.0 {
            return None;
        }
        let (col, row) = (fx.floor() as usize, fy.floor() as usize);
        (col < self.width && row < self.height).then_some((row, col))
    }

    /// Nearest-neighbour value at (lon, lat). Returns None outside the raster;
    /// masked pixels come back as `Some(NaN)`.
    pub fn sample_nearest(&self, lon: f64, lat: f64) -> Option<f32> {
        self.index_of(lon, lat).map(|(r, c)| self.get(r, c))
    }

    /// Number of unmasked pixels.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Binary urban mask: 1.0 where `value >= threshold`, NaN elsewhere.
    pub fn urban_mask(&self, threshold: f32) -> Self {
        let data = self
            .data
            .iter()
            .map(|&v| if v >= threshold { 1.0 } else { f32::NAN })
            .collect();
        Self { data, ..self.clone() }
    }

    /// Window of whole pixels overlapping `rect`, values unchanged.
    /// Returns None when `rect` does not overlap the raster.
    pub fn crop(&self, rect: Rect<f64>) -> Option<Self> {
        let pw = self.pixel_width();
        let ph = self.pixel_height();
        let c0 = ((rect.min().x - self.min_lon) / pw).floor().max(0.0) as usize;
        let r0 = ((rect.min().y - self.min_lat) / ph).floor().max(0.0) as usize;
        let c1 = (((rect.max().x - self.min_lon) / pw).ceil().max(0.0) as usize).min(self.width);
        let r1 = (((rect.max().y - self.min_lat) / ph).ceil().max(0.0) as usize).min(self.height);
        if c0 >= c1 || r0 >= r1 {
            return None;
        }

        let width = c1 - c0;
        let height = r1 - r0;
        let mut data = Vec::with_capacity(width * height);
        for r in r0..r1 {
            let start = r * self.width + c0;
            data.extend_from_slice(&self.data[start..start + width]);
        }
        Some(Self {
            data,
            width,
            height,
            min_lon: self.min_lon + c0 as f64 * pw,
            max_lon: self.min_lon + c1 as f64 * pw,
            min_lat: self.min_lat + r0 as f64 * ph,
            max_lat: self.min_lat + r1 as f64 * ph,
        })
    }
}
