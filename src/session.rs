use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::GrayImage;
use uuid::Uuid;

use crate::error::Result;
use crate::ops::fit::{QuadraticFit, fit_quadratic};
use crate::ops::mask::{MaskLevels, NormalizedMask, build_mask, normalize_mask};
use crate::surface::HeightGrid;
use crate::view::ViewState;
use crate::{log_info, log_warn};

/// Where the session is in the load → fit → save cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Loaded,
    Fitted,
}

/// Which controls may be pressed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub zoom_in: bool,
    pub zoom_out: bool,
    pub fit: bool,
    pub save_mask: bool,
}

/// The image currently on display and everything derived from it.
struct Loaded {
    id: Uuid,
    path: Option<PathBuf>,
    image: GrayImage,
    surface: Arc<HeightGrid>,
}

/// A successful fit together with the mask it produced.
struct Fitted {
    fit: QuadraticFit,
    mask: HeightGrid,
}

/// Snapshot of the surface handed to a (possibly background) fit.
#[derive(Clone)]
pub struct FitJob {
    load_id: Uuid,
    surface: Arc<HeightGrid>,
}

/// What a [`FitJob`] produced, tagged with the load it belongs to.
pub struct FitOutcome {
    load_id: Uuid,
    result: Result<(QuadraticFit, HeightGrid)>,
}

impl FitJob {
    /// Run the regression and build the mask. Safe to call off the UI thread.
    pub fn run(self) -> FitOutcome {
        let result = fit_quadratic(&self.surface).and_then(|fit| {
            let mask = build_mask(&self.surface, &fit.fitted)?;
            Ok((fit, mask))
        });
        FitOutcome {
            load_id: self.load_id,
            result,
        }
    }
}

/// Result of handing a [`FitOutcome`] back to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitApplied {
    /// Fit and mask installed; the session is now `Fitted`.
    Installed,
    /// The image changed while the job was running; the outcome was dropped.
    Stale,
}

/// All mutable state of one viewer window.
///
/// Each user action maps to one method here. Methods that have nothing to
/// act on return `Ok(false)` (or `false`) instead of failing.
pub struct Session {
    loaded: Option<Loaded>,
    fitted: Option<Fitted>,
    view: Option<ViewState>,
    fit_pending: bool,
    flat_mask_level: u8,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            loaded: None,
            fitted: None,
            view: None,
            fit_pending: false,
            flat_mask_level: 0,
        }
    }

    /// Level written for every pixel when the mask is flat.
    pub fn with_flat_mask_level(mut self, level: u8) -> Self {
        self.flat_mask_level = level;
        self
    }

    pub fn state(&self) -> SessionState {
        match (&self.loaded, &self.fitted) {
            (None, _) => SessionState::Empty,
            (Some(_), None) => SessionState::Loaded,
            (Some(_), Some(_)) => SessionState::Fitted,
        }
    }

    pub fn controls(&self) -> Controls {
        let has_image = self.loaded.is_some();
        let has_view = self.view.is_some();
        Controls {
            zoom_in: has_view,
            zoom_out: has_view,
            fit: has_image && !self.fit_pending,
            save_mask: self.fitted.is_some(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn image(&self) -> Option<&GrayImage> {
        self.loaded.as_ref().map(|l| &l.image)
    }

    pub fn path(&self) -> Option<&Path> {
        self.loaded.as_ref().and_then(|l| l.path.as_deref())
    }

    pub fn load_id(&self) -> Option<Uuid> {
        self.loaded.as_ref().map(|l| l.id)
    }

    pub fn surface(&self) -> Option<&HeightGrid> {
        self.loaded.as_ref().map(|l| l.surface.as_ref())
    }

    pub fn fit_result(&self) -> Option<&QuadraticFit> {
        self.fitted.as_ref().map(|f| &f.fit)
    }

    pub fn fitted_surface(&self) -> Option<&HeightGrid> {
        self.fitted.as_ref().map(|f| &f.fit.fitted)
    }

    pub fn mask(&self) -> Option<&HeightGrid> {
        self.fitted.as_ref().map(|f| &f.mask)
    }

    pub fn view(&self) -> Option<&ViewState> {
        self.view.as_ref()
    }

    pub fn is_fit_pending(&self) -> bool {
        self.fit_pending
    }

    // ------------------------------------------------------------------
    // Open
    // ------------------------------------------------------------------

    /// Decode `path` and make it the current image.
    ///
    /// On a decode error the session is left exactly as it was.
    pub fn open(&mut self, path: &Path) -> Result<()> {
        let image = crate::io::load_grayscale(path)?;
        self.replace_image(image, Some(path.to_path_buf()));
        Ok(())
    }

    /// Make an already-decoded image the current one, discarding any fit.
    pub fn load_image(&mut self, image: GrayImage) {
        self.replace_image(image, None);
    }

    fn replace_image(&mut self, image: GrayImage, path: Option<PathBuf>) {
        let surface = Arc::new(HeightGrid::surface_from_image(&image));
        let id = Uuid::new_v4();
        log_info!(
            "Loaded {}x{} image {} ({})",
            image.width(),
            image.height(),
            path.as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<memory>".to_string()),
            id
        );
        self.view = Some(ViewState::fit_to_data(&[surface.as_ref()]));
        self.fitted = None;
        self.fit_pending = false;
        self.loaded = Some(Loaded {
            id,
            path,
            image,
            surface,
        });
    }

    // ------------------------------------------------------------------
    // Zoom / orbit
    // ------------------------------------------------------------------

    /// Returns `false` when nothing is displayed.
    pub fn zoom_in(&mut self) -> bool {
        match &mut self.view {
            Some(view) => {
                view.zoom_in();
                true
            }
            None => false,
        }
    }

    /// Returns `false` when nothing is displayed.
    pub fn zoom_out(&mut self) -> bool {
        match &mut self.view {
            Some(view) => {
                view.zoom_out();
                true
            }
            None => false,
        }
    }

    pub fn orbit(&mut self, d_azimuth_deg: f64, d_elevation_deg: f64) {
        if let Some(view) = &mut self.view {
            view.orbit(d_azimuth_deg, d_elevation_deg);
        }
    }

    // ------------------------------------------------------------------
    // Curve fit
    // ------------------------------------------------------------------

    /// Snapshot the surface for a fit and mark the fit as pending.
    /// `None` when no image is loaded or a fit is already running.
    pub fn begin_fit(&mut self) -> Option<FitJob> {
        if self.fit_pending {
            return None;
        }
        let loaded = self.loaded.as_ref()?;
        self.fit_pending = true;
        Some(FitJob {
            load_id: loaded.id,
            surface: Arc::clone(&loaded.surface),
        })
    }

    /// Install a finished fit, unless the image changed in the meantime.
    ///
    /// A failed fit leaves the session in `Loaded` and returns the error.
    pub fn apply_fit(&mut self, outcome: FitOutcome) -> Result<FitApplied> {
        let Some(loaded) = self.loaded.as_ref() else {
            log_warn!("Dropping fit result: no image loaded");
            return Ok(FitApplied::Stale);
        };
        if loaded.id != outcome.load_id {
            log_warn!(
                "Dropping stale fit result for {} (current image is {})",
                outcome.load_id,
                loaded.id
            );
            return Ok(FitApplied::Stale);
        }
        self.fit_pending = false;

        let (fit, mask) = outcome.result?;
        log_info!(
            "Fit {} samples, rms residual {:.4}: {}",
            fit.samples,
            fit.rms_residual,
            fit.coeffs
        );
        self.view = Some(ViewState::fit_to_data(&[
            loaded.surface.as_ref(),
            &fit.fitted,
        ]));
        self.fitted = Some(Fitted { fit, mask });
        Ok(FitApplied::Installed)
    }

    /// Fit on the calling thread.
    ///
    /// `Ok(false)` when no image is loaded or a background fit for this
    /// image is still running; that job's outcome will be applied instead.
    pub fn fit(&mut self) -> Result<bool> {
        let Some(job) = self.begin_fit() else {
            return Ok(false);
        };
        self.apply_fit(job.run())?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Save mask
    // ------------------------------------------------------------------

    /// The mask as it would be written, or `None` before a fit.
    pub fn normalized_mask(&self) -> Option<NormalizedMask> {
        let mask = self.mask()?;
        let normalized = normalize_mask(mask, self.flat_mask_level);
        if normalized.levels.is_flat() {
            log_warn!(
                "Mask is flat; writing a uniform image at level {}",
                self.flat_mask_level
            );
        }
        Some(normalized)
    }

    /// Write the normalized mask to `path` and report how it was scaled.
    /// `Ok(None)` when no mask exists.
    ///
    /// On failure the mask is kept so the save can be retried.
    pub fn save_mask(&self, path: &Path) -> Result<Option<MaskLevels>> {
        let Some(normalized) = self.normalized_mask() else {
            return Ok(None);
        };
        crate::io::write_mask_png(&normalized.image, path).map_err(|e| {
            crate::log_err!("Saving mask to {} failed: {}", path.display(), e);
            e
        })?;
        log_info!("Mask saved to {}", path.display());
        Ok(Some(normalized.levels))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("load_id", &self.load_id())
            .field("fit_pending", &self.fit_pending)
            .finish()
    }
}
