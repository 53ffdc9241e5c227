use std::path::PathBuf;

use image::{GrayImage, Luma};
use relief::cli::run_one;
use relief::ops::fit::fit_quadratic;
use relief::ops::mask::{MaskLevels, build_mask, normalize_mask};
use relief::surface::HeightGrid;
use relief::{ReliefError, Session, SessionState};

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("relief_wf_{}_{}", std::process::id(), name))
}

fn write_png(name: &str, img: &GrayImage) -> PathBuf {
    let path = temp_file(name);
    img.save(&path).unwrap();
    path
}

#[test]
fn uniform_4x4_image_produces_all_zero_mask() {
    let img = GrayImage::from_pixel(4, 4, Luma([100]));
    let surface = HeightGrid::surface_from_image(&img);
    assert!(surface.values().iter().all(|&v| v == -100.0));

    let fit = fit_quadratic(&surface).unwrap();
    let c = fit.coeffs;
    assert!((c.f + 100.0).abs() < 1e-9);
    for v in [c.a, c.b, c.c, c.d, c.e] {
        assert!(v.abs() < 1e-9);
    }

    let mask = build_mask(&surface, &fit.fitted).unwrap();
    assert!(mask.values().iter().all(|&v| (v + 200.0).abs() < 1e-9));

    let out = normalize_mask(&mask, 0);
    assert_eq!(out.levels, MaskLevels::Flat { level: 0 });
    assert_eq!(out.image.dimensions(), (4, 4));
    assert!(out.image.as_raw().iter().all(|&v| v == 0));
}

#[test]
fn open_fit_save_through_the_session() {
    let input = write_png(
        "gradient.png",
        &GrayImage::from_fn(16, 12, |x, y| Luma([((x * x + 3 * y) % 256) as u8])),
    );
    let output = temp_file("gradient_mask.png");

    let mut session = Session::new();
    session.open(&input).unwrap();
    assert_eq!(session.state(), SessionState::Loaded);
    assert!(session.fit().unwrap());
    assert_eq!(session.state(), SessionState::Fitted);

    let levels = session.save_mask(&output).unwrap();
    assert!(matches!(levels, Some(MaskLevels::Scaled { .. })));

    let written = image::open(&output).unwrap().to_luma8();
    assert_eq!(written.dimensions(), (16, 12));
    assert_eq!(written.as_raw().iter().min(), Some(&0));
    assert_eq!(written.as_raw().iter().max(), Some(&255));

    let _ = std::fs::remove_file(&input);
    let _ = std::fs::remove_file(&output);
}

#[test]
fn reopening_clears_the_previous_mask() {
    let a = write_png("a.png", &GrayImage::from_fn(8, 8, |x, y| Luma([(x * y) as u8])));
    let b = write_png("b.png", &GrayImage::from_pixel(3, 5, Luma([7])));

    let mut session = Session::new();
    session.open(&a).unwrap();
    session.fit().unwrap();
    assert!(session.mask().is_some());

    session.open(&b).unwrap();
    assert!(session.mask().is_none());
    assert_eq!(session.surface().unwrap().dimensions(), (3, 5));
    assert!(!session.controls().save_mask);

    let _ = std::fs::remove_file(&a);
    let _ = std::fs::remove_file(&b);
}

#[test]
fn decode_error_keeps_prior_state() {
    let bogus = temp_file("bogus.png");
    std::fs::write(&bogus, b"\x89PNG but not really").unwrap();

    let mut session = Session::new();
    assert!(matches!(session.open(&bogus), Err(ReliefError::Decode { .. })));
    assert_eq!(session.state(), SessionState::Empty);

    let _ = std::fs::remove_file(&bogus);
}

#[test]
fn cli_pipeline_reports_coefficients_and_writes_mask() {
    // Intensity is a plane, so the surface is its negation: d = -2, e = -1
    let input = write_png(
        "plane.png",
        &GrayImage::from_fn(10, 10, |x, y| Luma([(2 * x + y + 10) as u8])),
    );
    let output = temp_file("plane_mask.png");

    let report = run_one(&input, &output, 0).unwrap();
    assert_eq!(report.samples, 100);
    assert!((report.coeffs.d + 2.0).abs() < 1e-9);
    assert!((report.coeffs.e + 1.0).abs() < 1e-9);
    assert!((report.coeffs.f + 10.0).abs() < 1e-8);
    assert!(report.rms_residual < 1e-9);
    assert!(!report.flat);
    assert!(output.exists());

    let _ = std::fs::remove_file(&input);
    let _ = std::fs::remove_file(&output);
}

#[test]
fn cli_pipeline_rejects_tiny_images() {
    let input = write_png("tiny.png", &GrayImage::from_pixel(2, 2, Luma([50])));
    let output = temp_file("tiny_mask.png");

    assert!(matches!(
        run_one(&input, &output, 0),
        Err(ReliefError::InsufficientData { samples: 4 })
    ));
    assert!(!output.exists());

    let _ = std::fs::remove_file(&input);
}

#[test]
fn zoom_in_then_out_drifts_to_099_of_original_bounds() {
    let mut session = Session::new();
    session.load_image(GrayImage::from_fn(20, 10, |x, y| Luma([(x + y) as u8])));
    let before = *session.view().unwrap();

    assert!(session.zoom_in());
    assert!(session.zoom_out());
    let after = session.view().unwrap();

    for (a, b) in [
        (after.x.lo, before.x.lo),
        (after.x.hi, before.x.hi),
        (after.y.hi, before.y.hi),
        (after.z.lo, before.z.lo),
        (after.z.hi, before.z.hi),
    ] {
        assert!((a - 0.99 * b).abs() < 1e-9, "{a} vs {}", 0.99 * b);
    }
}
