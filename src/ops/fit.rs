// ============================================================================
// QUADRATIC SURFACE FIT: ordinary least squares on a fixed 6-term basis
// ============================================================================
//
//   f(x, y) = a·x² + b·y² + c·x·y + d·x + e·y + f
//
// The model is linear in its parameters, so the fit is a single linear solve:
// the 6×6 normal equations are accumulated row-by-row (in parallel) and solved
// with an SVD, which also yields the minimum-norm answer for rank-deficient
// layouts such as a single image row.

use nalgebra::{Matrix6, Vector6};
use rayon::prelude::*;

use crate::error::{ReliefError, Result};
use crate::surface::HeightGrid;

/// Number of unknowns in the quadratic model.
pub const MIN_SAMPLES: usize = 6;

/// Singular values below `max_singular_value * RANK_TOLERANCE` are treated as zero.
const RANK_TOLERANCE: f64 = 1e-12;

/// The six coefficients of `a·x² + b·y² + c·x·y + d·x + e·y + f`, in raw
/// pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QuadraticCoeffs {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl QuadraticCoeffs {
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        self.a * x * x + self.b * y * y + self.c * x * y + self.d * x + self.e * y + self.f
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    /// Evaluate the model at every pixel coordinate of a `width × height` grid.
    pub fn evaluate_grid(&self, width: u32, height: u32) -> HeightGrid {
        HeightGrid::from_fn_par(width, height, |x, y| self.evaluate(x as f64, y as f64))
    }
}

impl std::fmt::Display for QuadraticCoeffs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "a={:.6e} b={:.6e} c={:.6e} d={:.6e} e={:.6e} f={:.6e}",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

/// Result of [`fit_quadratic`].
#[derive(Debug, Clone)]
pub struct QuadraticFit {
    pub coeffs: QuadraticCoeffs,
    /// The model evaluated at every sample coordinate.
    pub fitted: HeightGrid,
    /// Root-mean-square of `observed - fitted`.
    pub rms_residual: f64,
    pub samples: usize,
}

/// Affine map from a pixel index to roughly [-1, 1]: `t = scale * (i - center)`.
#[derive(Debug, Clone, Copy)]
struct AxisNorm {
    center: f64,
    scale: f64,
}

impl AxisNorm {
    fn for_len(len: u32) -> Self {
        let center = (len.saturating_sub(1)) as f64 / 2.0;
        let scale = if len > 1 { 1.0 / center } else { 1.0 };
        Self { center, scale }
    }

    fn apply(&self, i: usize) -> f64 {
        (i as f64 - self.center) * self.scale
    }

    /// Offset `p` such that `t = scale * i + p`.
    fn offset(&self) -> f64 {
        -self.scale * self.center
    }
}

/// Fit the quadratic model to every sample of `grid` by least squares.
///
/// Fails with [`ReliefError::InsufficientData`] when the grid holds fewer
/// than six samples.
pub fn fit_quadratic(grid: &HeightGrid) -> Result<QuadraticFit> {
    let samples = grid.len();
    if samples < MIN_SAMPLES {
        return Err(ReliefError::InsufficientData { samples });
    }

    let (width, height) = grid.dimensions();
    let nx = AxisNorm::for_len(width);
    let ny = AxisNorm::for_len(height);

    let zero = || (Matrix6::<f64>::zeros(), Vector6::<f64>::zeros());
    let (ata, atb) = (0..height)
        .into_par_iter()
        .map(|yi| {
            let y = ny.apply(yi as usize);
            let (mut ata, mut atb) = zero();
            for (xi, &z) in grid.row(yi).iter().enumerate() {
                let x = nx.apply(xi);
                let phi = Vector6::new(x * x, y * y, x * y, x, y, 1.0);
                ata += phi * phi.transpose();
                atb += phi * z;
            }
            (ata, atb)
        })
        .reduce(zero, |(a1, b1), (a2, b2)| (a1 + a2, b1 + b2));

    let svd = ata.svd(true, true);
    let eps = svd.singular_values.max() * RANK_TOLERANCE;
    let p = svd
        .solve(&atb, eps)
        .map_err(|e| ReliefError::Solver(e.to_string()))?;

    let coeffs = denormalize(&p, nx, ny);
    let fitted = coeffs.evaluate_grid(width, height);

    let sum_sq: f64 = grid
        .values()
        .par_iter()
        .zip(fitted.values().par_iter())
        .map(|(z, f)| (z - f) * (z - f))
        .sum();
    let rms_residual = (sum_sq / samples as f64).sqrt();

    Ok(QuadraticFit {
        coeffs,
        fitted,
        rms_residual,
        samples,
    })
}

/// Map coefficients solved in normalized coordinates (`x' = u·x + p`,
/// `y' = v·y + q`) back to raw pixel coordinates.
fn denormalize(n: &Vector6<f64>, nx: AxisNorm, ny: AxisNorm) -> QuadraticCoeffs {
    let (a, b, c, d, e, f) = (n[0], n[1], n[2], n[3], n[4], n[5]);
    let (u, p) = (nx.scale, nx.offset());
    let (v, q) = (ny.scale, ny.offset());
    QuadraticCoeffs {
        a: a * u * u,
        b: b * v * v,
        c: c * u * v,
        d: 2.0 * a * u * p + c * u * q + d * u,
        e: 2.0 * b * v * q + c * p * v + e * v,
        f: a * p * p + b * q * q + c * p * q + d * p + e * q + f,
    }
}
