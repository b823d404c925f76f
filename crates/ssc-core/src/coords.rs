//! Geographic coordinate types and lon/lat cell geometry.
//! All coordinate math uses f64 for precision.

/// Metres per degree along the equator (WGS84 semi-major axis × π / 180).
/// A scale of `s` metres maps to a pixel step of `s / METRES_PER_DEGREE` degrees.
pub const METRES_PER_DEGREE: f64 = 111_319.490_793_273_57;

/// Authalic (equal-area) Earth radius in metres.
pub const AUTHALIC_RADIUS_M: f64 = 6_371_007.181;

/// A point on the sphere in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    /// Latitude in degrees, -90 to +90.
    pub lat: f64,
    /// Longitude in degrees, -180 to +180.
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Pixel step in degrees for a nominal scale in metres.
pub fn step_for_scale(scale_m: f64) -> f64 {
    scale_m / METRES_PER_DEGREE
}

/// True area (m²) of the lon/lat cell spanning `[min_lat, max_lat]` and
/// `dlon_deg` degrees of longitude:
///
///   A = R² · Δλ · (sin φ₂ − sin φ₁)
///
/// Exact on the authalic sphere; shrinks with cos(φ) towards the poles.
pub fn cell_area_m2(min_lat: f64, max_lat: f64, dlon_deg: f64) -> f64 {
    let lo = min_lat.clamp(-90.0, 90.0).to_radians();
    let hi = max_lat.clamp(-90.0, 90.0).to_radians();
    (AUTHALIC_RADIUS_M * AUTHALIC_RADIUS_M * dlon_deg.to_radians() * (hi.sin() - lo.sin())).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equatorial_cell_is_close_to_nominal_scale_squared() {
        let step = step_for_scale(100.0);
        let a = cell_area_m2(0.0, step, step);
        // Authalic radius is ~0.1% smaller than the equatorial radius.
        assert!((a - 10_000.0).abs() / 10_000.0 < 3e-3, "area = {a}");
    }

    #[test]
    fn cell_area_shrinks_with_latitude() {
        let step = step_for_scale(30.0);
        let eq = cell_area_m2(0.0, step, step);
        let sixty = cell_area_m2(60.0, 60.0 + step, step);
        let ratio = sixty / eq;
        assert!((ratio - 0.5).abs() < 1e-3, "cos(60°) ratio expected, got {ratio}");
    }

    #[test]
    fn whole_sphere_area() {
        let a = cell_area_m2(-90.0, 90.0, 360.0);
        let expected = 4.0 * std::f64::consts::PI * AUTHALIC_RADIUS_M * AUTHALIC_RADIUS_M;
        assert!((a - expected).abs() / expected < 1e-12);
    }
}
