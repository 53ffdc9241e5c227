// ============================================================================
// HEIGHT GRIDS: row-major f64 elevation samples indexed by pixel coordinate
// ============================================================================

use image::GrayImage;
use rayon::prelude::*;

/// A dense `width × height` grid of real-valued elevations.
///
/// Sample `(x, y)` lives at `values[y * width + x]`, matching the row-major
/// layout of `image::GrayImage` so conversions are a straight map.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightGrid {
    width: u32,
    height: u32,
    values: Vec<f64>,
}

impl HeightGrid {
    /// Returns `None` when `values.len() != width * height`.
    pub fn from_vec(width: u32, height: u32, values: Vec<f64>) -> Option<Self> {
        if values.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            values,
        })
    }

    /// Build a grid by evaluating `f(x, y)` at every pixel coordinate.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f64) -> Self {
        let mut values = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            values,
        }
    }

    /// Same as [`HeightGrid::from_fn`], but rows are filled in parallel.
    pub fn from_fn_par(width: u32, height: u32, f: impl Fn(u32, u32) -> f64 + Sync) -> Self {
        let w = width as usize;
        let mut values = vec![0.0; w * height as usize];
        if w > 0 {
            values.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
                for (x, v) in row.iter_mut().enumerate() {
                    *v = f(x as u32, y as u32);
                }
            });
        }
        Self {
            width,
            height,
            values,
        }
    }

    /// The display surface for an 8-bit image: every intensity negated, so
    /// bright pixels sit low. Negation happens in f64, never in u8.
    pub fn surface_from_image(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            values: image.as_raw().iter().map(|&v| -(v as f64)).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, x: u32, y: u32) -> f64 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    /// One row of samples (`y` fixed, `x` ascending).
    pub fn row(&self, y: u32) -> &[f64] {
        let w = self.width as usize;
        let start = y as usize * w;
        &self.values[start..start + w]
    }

    /// `(min, max)` over all samples, or `None` for an empty grid.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        let mut iter = self.values.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_negates_intensity_without_wrapping() {
        let img = GrayImage::from_raw(3, 1, vec![0, 128, 255]).unwrap();
        let s = HeightGrid::surface_from_image(&img);
        assert_eq!(s.dimensions(), (3, 1));
        assert_eq!(s.values(), &[0.0, -128.0, -255.0]);
    }

    #[test]
    fn row_major_layout_matches_image() {
        let g = HeightGrid::from_fn(3, 2, |x, y| (x + 10 * y) as f64);
        assert_eq!(g.get(2, 1), 12.0);
        assert_eq!(g.row(1), &[10.0, 11.0, 12.0]);
        assert_eq!(g.min_max(), Some((0.0, 12.0)));
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(HeightGrid::from_vec(2, 2, vec![0.0; 3]).is_none());
        assert!(HeightGrid::from_vec(0, 5, Vec::new()).unwrap().min_max().is_none());
    }
}
