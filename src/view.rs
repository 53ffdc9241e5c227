// ============================================================================
// VIEW STATE: axis limits and camera of the 3D surface plot
// ============================================================================

use crate::surface::HeightGrid;

/// Each limit endpoint is multiplied by this on "Zoom In".
pub const ZOOM_IN_FACTOR: f64 = 0.9;
/// Each limit endpoint is multiplied by this on "Zoom Out".
pub const ZOOM_OUT_FACTOR: f64 = 1.1;

/// Default camera, matching the usual 3D-axes defaults.
pub const DEFAULT_ELEVATION_DEG: f64 = 30.0;
pub const DEFAULT_AZIMUTH_DEG: f64 = -60.0;

/// A closed axis interval `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub lo: f64,
    pub hi: f64,
}

impl AxisRange {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Widen a zero-width range so it can still be projected.
    fn nonsingular(lo: f64, hi: f64) -> Self {
        if hi - lo > 0.0 {
            Self { lo, hi }
        } else {
            Self {
                lo: lo - 0.5,
                hi: hi + 0.5,
            }
        }
    }

    pub fn span(&self) -> f64 {
        self.hi - self.lo
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            lo: self.lo * factor,
            hi: self.hi * factor,
        }
    }

    /// Map `v` to `[-0.5, 0.5]` across the range.
    pub fn unit(&self, v: f64) -> f64 {
        let span = self.span();
        if span == 0.0 {
            0.0
        } else {
            (v - self.lo) / span - 0.5
        }
    }
}

/// What the 3D display is currently looking at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub x: AxisRange,
    pub y: AxisRange,
    pub z: AxisRange,
    pub elevation_deg: f64,
    pub azimuth_deg: f64,
}

impl ViewState {
    /// Limits that exactly enclose every surface in `surfaces`.
    ///
    /// All surfaces are expected to share the dimensions of the first one.
    pub fn fit_to_data(surfaces: &[&HeightGrid]) -> Self {
        let (w, h) = surfaces.first().map(|s| s.dimensions()).unwrap_or((1, 1));
        let (zlo, zhi) = surfaces
            .iter()
            .filter_map(|s| s.min_max())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
                (lo.min(a), hi.max(b))
            });
        let (zlo, zhi) = if zlo.is_finite() && zhi.is_finite() {
            (zlo, zhi)
        } else {
            (0.0, 0.0)
        };
        Self {
            x: AxisRange::nonsingular(0.0, w.saturating_sub(1) as f64),
            y: AxisRange::nonsingular(0.0, h.saturating_sub(1) as f64),
            z: AxisRange::nonsingular(zlo, zhi),
            elevation_deg: DEFAULT_ELEVATION_DEG,
            azimuth_deg: DEFAULT_AZIMUTH_DEG,
        }
    }

    /// Multiply every limit endpoint by `factor`.
    ///
    /// The endpoints themselves are scaled (not the span around the centre),
    /// and the in/out factors are not exact inverses, so repeated zooming drifts.
    pub fn zoom(&mut self, factor: f64) {
        self.x = self.x.scaled(factor);
        self.y = self.y.scaled(factor);
        self.z = self.z.scaled(factor);
    }

    pub fn zoom_in(&mut self) {
        self.zoom(ZOOM_IN_FACTOR);
    }

    pub fn zoom_out(&mut self) {
        self.zoom(ZOOM_OUT_FACTOR);
    }

    /// Rotate the camera. Azimuth wraps to (-180, 180], elevation clamps to [-90, 90].
    pub fn orbit(&mut self, d_azimuth_deg: f64, d_elevation_deg: f64) {
        let mut az = (self.azimuth_deg + d_azimuth_deg) % 360.0;
        if az > 180.0 {
            az -= 360.0;
        } else if az <= -180.0 {
            az += 360.0;
        }
        self.azimuth_deg = az;
        self.elevation_deg = (self.elevation_deg + d_elevation_deg).clamp(-90.0, 90.0);
    }

    /// Project a data-space point to 2D view coordinates in roughly [-1, 1].
    ///
    /// Orthographic: the axis box is normalised to a unit cube, rotated by
    /// azimuth about z, then tilted by elevation. Returned `(u, v, depth)`
    /// has `v` pointing up and larger `depth` nearer the camera.
    pub fn project(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let px = self.x.unit(x);
        let py = self.y.unit(y);
        let pz = self.z.unit(z);

        let az = self.azimuth_deg.to_radians();
        let el = self.elevation_deg.to_radians();
        let (sa, ca) = az.sin_cos();
        let (se, ce) = el.sin_cos();

        // Camera looks from direction (cos el * cos az, cos el * sin az, sin el).
        let u = -px * sa + py * ca;
        let v = -(px * ca + py * sa) * se + pz * ce;
        let depth = (px * ca + py * sa) * ce + pz * se;
        (u, v, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * (1.0 + b.abs())
    }

    #[test]
    fn fit_to_data_covers_all_surfaces() {
        let a = HeightGrid::from_fn(5, 3, |x, _| -(x as f64));
        let b = HeightGrid::from_fn(5, 3, |_, y| 10.0 + y as f64);
        let v = ViewState::fit_to_data(&[&a, &b]);
        assert_eq!(v.x, AxisRange::new(0.0, 4.0));
        assert_eq!(v.y, AxisRange::new(0.0, 2.0));
        assert_eq!(v.z, AxisRange::new(-4.0, 12.0));
    }

    #[test]
    fn singular_ranges_are_widened() {
        let flat = HeightGrid::from_fn(1, 1, |_, _| -100.0);
        let v = ViewState::fit_to_data(&[&flat]);
        assert_eq!(v.x, AxisRange::new(-0.5, 0.5));
        assert_eq!(v.z, AxisRange::new(-100.5, -99.5));
    }

    #[test]
    fn zoom_scales_every_endpoint() {
        let g = HeightGrid::from_fn(11, 21, |_, _| 0.0);
        let mut v = ViewState::fit_to_data(&[&g]);
        v.zoom_in();
        assert!(close(v.x.hi, 9.0));
        assert!(close(v.y.hi, 18.0));
        assert!(close(v.z.lo, -0.45));
    }

    #[test]
    fn zoom_in_then_out_drifts_by_product_of_factors() {
        let g = HeightGrid::from_fn(101, 51, |x, y| (x * y) as f64);
        let original = ViewState::fit_to_data(&[&g]);
        let mut v = original;
        v.zoom_in();
        v.zoom_out();
        let k = ZOOM_IN_FACTOR * ZOOM_OUT_FACTOR;
        assert!(close(v.x.hi, original.x.hi * k));
        assert!(close(v.z.hi, original.z.hi * k));
        assert!((v.x.hi - original.x.hi).abs() / original.x.hi < 0.011);
    }

    #[test]
    fn orbit_wraps_and_clamps() {
        let g = HeightGrid::from_fn(2, 2, |_, _| 0.0);
        let mut v = ViewState::fit_to_data(&[&g]);
        v.orbit(-150.0, 100.0);
        assert!(close(v.azimuth_deg, 150.0));
        assert_eq!(v.elevation_deg, 90.0);
        v.orbit(60.0, -500.0);
        assert!(close(v.azimuth_deg, -150.0));
        assert_eq!(v.elevation_deg, -90.0);
    }

    #[test]
    fn top_down_projection_keeps_z_out_of_screen() {
        let g = HeightGrid::from_fn(3, 3, |_, _| 0.0);
        let mut v = ViewState::fit_to_data(&[&g]);
        v.elevation_deg = 90.0;
        v.azimuth_deg = -90.0;
        let (u0, v0, _) = v.project(1.0, 1.0, -0.5);
        let (u1, v1, d1) = v.project(1.0, 1.0, 0.5);
        assert!(close(u0, u1) && close(v0, v1));
        assert!(d1 > 0.0);
    }
}
