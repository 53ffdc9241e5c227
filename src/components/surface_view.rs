// ============================================================================
// SURFACE VIEW: orthographic wireframe of one or two height grids
// ============================================================================

use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, Vec2};

use crate::session::Session;
use crate::surface::HeightGrid;
use crate::view::ViewState;

/// Degrees of orbit per pixel of mouse drag.
const ORBIT_DEG_PER_PX: f64 = 0.5;
/// Scroll distance, in points, that makes one zoom step.
const SCROLL_POINTS_PER_STEP: f32 = 50.0;
/// Fraction of the shorter panel side covered by the unit cube.
const CUBE_SCALE: f32 = 0.62;

const BACKGROUND: Color32 = Color32::from_gray(238);
const BOX_COLOR: Color32 = Color32::from_gray(150);

/// A zoom request coming from the mouse wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomStep {
    In,
    Out,
}

/// User input collected by the view this frame, applied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewInput {
    /// `(d_azimuth, d_elevation)` in degrees.
    pub orbit: Option<(f64, f64)>,
    pub zoom: Option<ZoomStep>,
}

/// Turns scroll deltas into discrete zoom steps.
///
/// Trackpads report many small deltas per gesture; they are summed and one
/// step is emitted each time the total crosses [`SCROLL_POINTS_PER_STEP`].
/// Reversing direction drops whatever was left over.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollZoom {
    pending: f32,
}

impl ScrollZoom {
    pub fn feed(&mut self, delta_y: f32) -> Option<ZoomStep> {
        if delta_y == 0.0 {
            return None;
        }
        if self.pending != 0.0 && self.pending.signum() != delta_y.signum() {
            self.pending = 0.0;
        }
        self.pending += delta_y;
        if self.pending >= SCROLL_POINTS_PER_STEP {
            self.pending -= SCROLL_POINTS_PER_STEP;
            Some(ZoomStep::In)
        } else if self.pending <= -SCROLL_POINTS_PER_STEP {
            self.pending += SCROLL_POINTS_PER_STEP;
            Some(ZoomStep::Out)
        } else {
            None
        }
    }
}

/// Paint the session's surfaces into all remaining space of `ui`.
pub fn show(
    ui: &mut egui::Ui,
    session: &Session,
    mesh_resolution: u32,
    scroll: &mut ScrollZoom,
) -> ViewInput {
    let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::drag());
    let rect = response.rect;
    painter.rect_filled(rect, 0.0, BACKGROUND);

    let (Some(view), Some(surface)) = (session.view(), session.surface()) else {
        painter.text(
            rect.center(),
            Align2::CENTER_CENTER,
            "Open an image to view it as a height surface",
            FontId::proportional(16.0),
            Color32::from_gray(110),
        );
        return ViewInput::default();
    };

    let projector = Projector::new(view, rect);
    draw_axis_box(&painter, &projector);
    draw_wireframe(&painter, &projector, surface, mesh_resolution, gray, 140);
    if let Some(fitted) = session.fitted_surface() {
        draw_wireframe(&painter, &projector, fitted, mesh_resolution, viridis, 140);
    }

    let mut input = ViewInput::default();
    if response.dragged() {
        let d = response.drag_delta();
        if d != Vec2::ZERO {
            input.orbit = Some((
                -d.x as f64 * ORBIT_DEG_PER_PX,
                d.y as f64 * ORBIT_DEG_PER_PX,
            ));
        }
    }
    if response.hovered() {
        input.zoom = scroll.feed(ui.input(|i| i.scroll_delta.y));
    }
    input
}

/// Data space → screen space for one frame.
struct Projector<'a> {
    view: &'a ViewState,
    center: Pos2,
    scale: f32,
}

impl<'a> Projector<'a> {
    fn new(view: &'a ViewState, rect: Rect) -> Self {
        Self {
            view,
            center: rect.center(),
            scale: rect.width().min(rect.height()) * CUBE_SCALE,
        }
    }

    fn to_screen(&self, x: f64, y: f64, z: f64) -> Pos2 {
        let (u, v, _) = self.view.project(x, y, z);
        self.center + Vec2::new(u as f32 * self.scale, -(v as f32) * self.scale)
    }
}

fn draw_axis_box(painter: &egui::Painter, p: &Projector<'_>) {
    let v = p.view;
    let xs = [v.x.lo, v.x.hi];
    let ys = [v.y.lo, v.y.hi];
    let zs = [v.z.lo, v.z.hi];
    let stroke = Stroke::new(1.0, BOX_COLOR);

    for &y in &ys {
        for &z in &zs {
            painter.line_segment([p.to_screen(xs[0], y, z), p.to_screen(xs[1], y, z)], stroke);
        }
    }
    for &x in &xs {
        for &z in &zs {
            painter.line_segment([p.to_screen(x, ys[0], z), p.to_screen(x, ys[1], z)], stroke);
        }
    }
    for &x in &xs {
        for &y in &ys {
            painter.line_segment([p.to_screen(x, y, zs[0]), p.to_screen(x, y, zs[1])], stroke);
        }
    }

    let font = FontId::monospace(11.0);
    let label = Color32::from_gray(90);
    painter.text(
        p.to_screen(v.x.hi, v.y.lo, v.z.lo),
        Align2::LEFT_TOP,
        format!("x {:.0}", v.x.hi),
        font.clone(),
        label,
    );
    painter.text(
        p.to_screen(v.x.lo, v.y.hi, v.z.lo),
        Align2::RIGHT_TOP,
        format!("y {:.0}", v.y.hi),
        font.clone(),
        label,
    );
    painter.text(
        p.to_screen(v.x.lo, v.y.lo, v.z.hi),
        Align2::RIGHT_BOTTOM,
        format!("z {:.1}", v.z.hi),
        font,
        label,
    );
}

fn draw_wireframe(
    painter: &egui::Painter,
    p: &Projector<'_>,
    grid: &HeightGrid,
    mesh_resolution: u32,
    colormap: fn(f32) -> [u8; 3],
    alpha: u8,
) {
    let xs = sample_indices(grid.width(), mesh_resolution);
    let ys = sample_indices(grid.height(), mesh_resolution);
    let color = |z0: f64, z1: f64| {
        let t = (p.view.z.unit((z0 + z1) * 0.5) + 0.5).clamp(0.0, 1.0) as f32;
        let [r, g, b] = colormap(t);
        Color32::from_rgba_unmultiplied(r, g, b, alpha)
    };
    let segment = |(x0, y0): (u32, u32), (x1, y1): (u32, u32)| {
        let z0 = grid.get(x0, y0);
        let z1 = grid.get(x1, y1);
        painter.line_segment(
            [
                p.to_screen(x0 as f64, y0 as f64, z0),
                p.to_screen(x1 as f64, y1 as f64, z1),
            ],
            Stroke::new(1.0, color(z0, z1)),
        );
    };

    for &y in &ys {
        for pair in xs.windows(2) {
            segment((pair[0], y), (pair[1], y));
        }
    }
    for &x in &xs {
        for pair in ys.windows(2) {
            segment((x, pair[0]), (x, pair[1]));
        }
    }
}

/// Evenly spaced indices in `0..len`, at most about `max_lines` of them,
/// always including the first and last index.
pub fn sample_indices(len: u32, max_lines: u32) -> Vec<u32> {
    if len == 0 {
        return Vec::new();
    }
    let max_lines = max_lines.max(2);
    let step = len.div_ceil(max_lines).max(1);
    let mut out: Vec<u32> = (0..len).step_by(step as usize).collect();
    if out.last() != Some(&(len - 1)) {
        out.push(len - 1);
    }
    out
}

// ============================================================================
// COLORMAPS
// ============================================================================

fn gray(t: f32) -> [u8; 3] {
    // Stop short of white so high ground stays visible on the light background
    let v = (t.clamp(0.0, 1.0) * 200.0).round() as u8;
    [v, v, v]
}

const VIRIDIS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [71, 44, 122],
    [59, 81, 139],
    [44, 113, 142],
    [33, 144, 141],
    [39, 173, 129],
    [92, 200, 99],
    [170, 220, 50],
    [253, 231, 37],
];

fn viridis(t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0) * (VIRIDIS.len() - 1) as f32;
    let i = (t.floor() as usize).min(VIRIDIS.len() - 2);
    let f = t - i as f32;
    let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * f).round() as u8;
    let (a, b) = (VIRIDIS[i], VIRIDIS[i + 1]);
    [lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2])]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_axes_keep_every_index() {
        assert_eq!(sample_indices(5, 48), vec![0, 1, 2, 3, 4]);
        assert_eq!(sample_indices(1, 48), vec![0]);
        assert!(sample_indices(0, 48).is_empty());
    }

    #[test]
    fn large_axes_are_decimated_but_keep_the_edge() {
        let idx = sample_indices(1000, 48);
        assert!(idx.len() <= 50);
        assert_eq!(idx.first(), Some(&0));
        assert_eq!(idx.last(), Some(&999));
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn small_scroll_deltas_accumulate_into_one_step() {
        let mut scroll = ScrollZoom::default();
        let steps: Vec<_> = (0..10).filter_map(|_| scroll.feed(6.0)).collect();
        assert_eq!(steps, vec![ZoomStep::In]);

        assert_eq!(scroll.feed(0.0), None);
        assert_eq!(scroll.feed(-60.0), Some(ZoomStep::Out));
    }

    #[test]
    fn wheel_notch_is_one_step_each() {
        let mut scroll = ScrollZoom::default();
        assert_eq!(scroll.feed(50.0), Some(ZoomStep::In));
        assert_eq!(scroll.feed(50.0), Some(ZoomStep::In));
        assert_eq!(scroll.feed(-50.0), Some(ZoomStep::Out));
    }

    #[test]
    fn reversing_direction_discards_leftover() {
        let mut scroll = ScrollZoom::default();
        assert_eq!(scroll.feed(45.0), None);
        assert_eq!(scroll.feed(-10.0), None);
        assert_eq!(scroll.feed(-39.0), None);
        assert_eq!(scroll.feed(-1.0), Some(ZoomStep::Out));
    }

    #[test]
    fn colormaps_hit_their_endpoints() {
        assert_eq!(viridis(0.0), VIRIDIS[0]);
        assert_eq!(viridis(1.0), VIRIDIS[8]);
        assert_eq!(gray(0.0), [0, 0, 0]);
        assert_eq!(gray(2.0), [200, 200, 200]);
    }
}
