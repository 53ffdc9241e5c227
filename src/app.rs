use crate::components::surface_view::{self, ScrollZoom, ZoomStep};
use crate::io::FileHandler;
use crate::session::{FitApplied, FitOutcome, Session};
use crate::settings::AppSettings;
use crate::log_err;
use eframe::egui;
use std::path::PathBuf;
use std::sync::mpsc;

/// One-line message shown in the status bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Info(String),
    Error(String),
}

pub struct ReliefApp {
    session: Session,
    file_handler: FileHandler,
    settings: AppSettings,

    // Background fit pipeline
    fit_sender: mpsc::Sender<FitOutcome>,
    fit_receiver: mpsc::Receiver<FitOutcome>,
    /// Time when the running fit started (for elapsed time display)
    fit_start_time: Option<f64>,

    status: Option<Status>,
    scroll_zoom: ScrollZoom,
    /// Image to open on the first frame (positional command-line argument).
    pending_startup_file: Option<PathBuf>,
}

impl ReliefApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings: AppSettings,
        startup_file: Option<PathBuf>,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::light());

        let (fit_sender, fit_receiver) = mpsc::channel();
        let file_handler = FileHandler {
            last_open_dir: settings.last_open_dir.clone(),
            last_save_dir: settings.last_save_dir.clone(),
            ..FileHandler::new()
        };

        Self {
            session: Session::new().with_flat_mask_level(settings.flat_mask_level),
            file_handler,
            settings,
            fit_sender,
            fit_receiver,
            fit_start_time: None,
            status: None,
            scroll_zoom: ScrollZoom::default(),
            pending_startup_file: startup_file,
        }
    }

    // ------------------------------------------------------------------
    // Commands (one per button)
    // ------------------------------------------------------------------

    fn open_dialog(&mut self) {
        if let Some(path) = self.file_handler.pick_image_path() {
            self.remember_dirs();
            self.open_path(path);
        }
    }

    /// Persist the dialog directories so the next launch starts there.
    fn remember_dirs(&mut self) {
        let open = self.file_handler.last_open_dir.clone();
        let save = self.file_handler.last_save_dir.clone();
        if open != self.settings.last_open_dir || save != self.settings.last_save_dir {
            self.settings.last_open_dir = open;
            self.settings.last_save_dir = save;
            self.settings.save();
        }
    }

    fn open_path(&mut self, path: PathBuf) {
        match self.session.open(&path) {
            Ok(()) => {
                self.file_handler.current_path = Some(path.clone());
                self.fit_start_time = None;
                let (w, h) = self.session.image().map(|i| i.dimensions()).unwrap_or((0, 0));
                self.status = Some(Status::Info(format!(
                    "Loaded {} ({}x{})",
                    path.display(),
                    w,
                    h
                )));
            }
            Err(e) => {
                log_err!("Open failed: {}", e);
                self.status = Some(Status::Error(e.to_string()));
            }
        }
    }

    fn start_fit(&mut self, now: f64) {
        let Some(job) = self.session.begin_fit() else { return };
        self.fit_start_time = Some(now);
        self.status = Some(Status::Info("Fitting quadratic surface...".to_string()));
        let sender = self.fit_sender.clone();
        rayon::spawn(move || {
            let _ = sender.send(job.run());
        });
    }

    fn poll_fit_results(&mut self) {
        while let Ok(outcome) = self.fit_receiver.try_recv() {
            match self.session.apply_fit(outcome) {
                Ok(FitApplied::Installed) => {
                    self.fit_start_time = None;
                    if let Some(fit) = self.session.fit_result() {
                        self.status = Some(Status::Info(format!(
                            "Fit: {}  (rms {:.3})",
                            fit.coeffs, fit.rms_residual
                        )));
                    }
                }
                Ok(FitApplied::Stale) => {}
                Err(e) => {
                    self.fit_start_time = None;
                    log_err!("Fit failed: {}", e);
                    self.status = Some(Status::Error(e.to_string()));
                }
            }
        }
    }

    fn save_mask_dialog(&mut self) {
        if !self.session.controls().save_mask {
            return;
        }
        let Some(path) = self.file_handler.pick_mask_save_path() else { return };
        self.remember_dirs();
        match self.session.save_mask(&path) {
            Ok(Some(levels)) => {
                let note = if levels.is_flat() { " (flat mask)" } else { "" };
                self.status = Some(Status::Info(format!(
                    "Mask saved to {}{}",
                    path.display(),
                    note
                )));
            }
            Ok(None) => {}
            Err(e) => {
                self.status = Some(Status::Error(format!(
                    "Could not save mask to {}: {}",
                    path.display(),
                    e
                )));
            }
        }
    }

    // ------------------------------------------------------------------
    // Panels
    // ------------------------------------------------------------------

    fn toolbar(&mut self, ctx: &egui::Context) {
        let controls = self.session.controls();
        let now = ctx.input(|i| i.time);
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open Image").clicked() {
                    self.open_dialog();
                }
                if ui
                    .add_enabled(controls.zoom_in, egui::Button::new("Zoom In"))
                    .clicked()
                {
                    self.session.zoom_in();
                }
                if ui
                    .add_enabled(controls.zoom_out, egui::Button::new("Zoom Out"))
                    .clicked()
                {
                    self.session.zoom_out();
                }
                if ui
                    .add_enabled(controls.fit, egui::Button::new("Curve Fit"))
                    .clicked()
                {
                    self.start_fit(now);
                }
                if ui
                    .add_enabled(controls.save_mask, egui::Button::new("Save Mask"))
                    .clicked()
                {
                    self.save_mask_dialog();
                }
                if let Some(start) = self.fit_start_time {
                    ui.spinner();
                    ui.label(format!("{:.1}s", now - start));
                }
            });
        });
    }

    fn status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            match &self.status {
                Some(Status::Info(msg)) => {
                    ui.label(msg);
                }
                Some(Status::Error(msg)) => {
                    ui.colored_label(egui::Color32::from_rgb(190, 40, 40), msg);
                }
                None => {
                    ui.label("Ready");
                }
            }
        });
    }
}

impl eframe::App for ReliefApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let title = match self.session.path().and_then(|p| p.file_name()) {
            Some(name) => format!("3D Image Viewer - {}", name.to_string_lossy()),
            None => "3D Image Viewer".to_string(),
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));

        if let Some(path) = self.pending_startup_file.take() {
            self.open_path(path);
        }

        self.poll_fit_results();
        if self.session.is_fit_pending() {
            // Keep polling while the worker runs
            ctx.request_repaint();
        }

        self.toolbar(ctx);
        self.status_bar(ctx);

        let mesh_resolution = self.settings.mesh_resolution;
        let session = &self.session;
        let scroll_zoom = &mut self.scroll_zoom;
        let input = egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| surface_view::show(ui, session, mesh_resolution, scroll_zoom))
            .inner;

        if let Some((d_az, d_el)) = input.orbit {
            self.session.orbit(d_az, d_el);
        }
        match input.zoom {
            Some(ZoomStep::In) => {
                self.session.zoom_in();
            }
            Some(ZoomStep::Out) => {
                self.session.zoom_out();
            }
            None => {}
        }
    }
}
