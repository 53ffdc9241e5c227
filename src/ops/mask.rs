// ============================================================================
// MASK BUILDER: surface + fitted surface, rescaled to 8-bit on export
// ============================================================================

use image::GrayImage;

use crate::error::{ReliefError, Result};
use crate::surface::HeightGrid;

/// A mask whose extremes differ by less than this fraction of their
/// magnitude is treated as flat. Solver round-off on a constant input lands
/// around 1e-13 relative; anything that small must not be stretched to 0..255.
pub const FLAT_MASK_TOLERANCE: f64 = 1e-9;

/// Combine the original surface with its fitted surface, elementwise.
///
/// The combination is a sum (not a difference); both grids must have the
/// same dimensions.
pub fn build_mask(surface: &HeightGrid, fitted: &HeightGrid) -> Result<HeightGrid> {
    if surface.dimensions() != fitted.dimensions() {
        return Err(ReliefError::DimensionMismatch {
            expected: surface.dimensions(),
            found: fitted.dimensions(),
        });
    }
    let values = surface
        .values()
        .iter()
        .zip(fitted.values())
        .map(|(s, f)| s + f)
        .collect();
    HeightGrid::from_vec(surface.width(), surface.height(), values).ok_or(
        ReliefError::DimensionMismatch {
            expected: surface.dimensions(),
            found: fitted.dimensions(),
        },
    )
}

/// How the mask values were mapped into 0..=255.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaskLevels {
    /// Linear stretch of `[min, max]` onto `[0, 255]`.
    Scaled { min: f64, max: f64 },
    /// The mask had no usable range; every pixel was set to `level`.
    Flat { level: u8 },
}

impl MaskLevels {
    pub fn is_flat(&self) -> bool {
        matches!(self, MaskLevels::Flat { .. })
    }
}

/// An export-ready mask.
#[derive(Debug, Clone)]
pub struct NormalizedMask {
    pub image: GrayImage,
    pub levels: MaskLevels,
}

/// Rescale `mask` linearly so its minimum maps to 0 and its maximum to 255,
/// rounding to the nearest integer.
///
/// A flat (or non-finite) mask cannot be stretched; it becomes a uniform
/// image at `flat_level` instead.
pub fn normalize_mask(mask: &HeightGrid, flat_level: u8) -> NormalizedMask {
    let (w, h) = mask.dimensions();
    let flat = |level: u8| NormalizedMask {
        image: GrayImage::from_pixel(w, h, image::Luma([level])),
        levels: MaskLevels::Flat { level },
    };

    let Some((min, max)) = mask.min_max() else {
        return flat(flat_level);
    };
    let range = max - min;
    let magnitude = min.abs().max(max.abs()).max(1.0);
    if !range.is_finite() || range <= FLAT_MASK_TOLERANCE * magnitude {
        return flat(flat_level);
    }

    let scale = 255.0 / range;
    let pixels: Vec<u8> = mask
        .values()
        .iter()
        .map(|&v| ((v - min) * scale).round().clamp(0.0, 255.0) as u8)
        .collect();

    match GrayImage::from_raw(w, h, pixels) {
        Some(image) => NormalizedMask {
            image,
            levels: MaskLevels::Scaled { min, max },
        },
        None => flat(flat_level),
    }
}
