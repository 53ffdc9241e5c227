// ============================================================================
// Relief CLI: headless surface fit + mask export
// ============================================================================
//
// Usage examples:
//   relief --input scan.png                         (writes scan_mask.png next to it)
//   relief -i scan.png -o residual.png
//   relief -i "shots/*.jpg" --output-dir masks/ --flat-level 128
//
// No window is opened in CLI mode. Each file runs load → fit → save on the
// current thread; the fit's row accumulation still uses rayon's pool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::error::ReliefError;
use crate::ops::fit::QuadraticCoeffs;
use crate::session::Session;

/// Relief headless surface fitter.
///
/// Fit a quadratic surface to each grayscale image and export the mask.
#[derive(Parser, Debug)]
#[command(
    name = "relief",
    about = "Fit a quadratic surface to grayscale images and export the mask",
    long_about = "Treat each input image as a height surface (negated intensity),\n\
                  fit a*x^2 + b*y^2 + c*x*y + d*x + e*y + f by least squares,\n\
                  print the six coefficients and write the normalized\n\
                  surface+fit mask as an 8-bit PNG.\n\n\
                  Example:\n  \
                  relief --input scan.png --output scan_mask.png\n  \
                  relief -i \"*.png\" --output-dir masks/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "scans/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output mask path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing. Masks are named `<stem>_mask.png`.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Pixel value written when the mask is flat (0-255).
    #[arg(long, value_name = "0-255")]
    pub flat_level: Option<u8>,

    /// Print per-file timing and fit diagnostics.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i" || a.starts_with("--input="))
    }
}

/// Run all CLI processing and return an OS exit code.
/// Success only when every file succeeded.
pub fn run(args: CliArgs, default_flat_level: u8) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no images to fit; nothing was written.");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let flat_level = args.flat_level.unwrap_or(default_flat_level);
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, flat_level) {
            Ok(report) => {
                println!("  coefficients: {}", report.coeffs);
                if args.verbose {
                    println!(
                        "  samples: {}  rms residual: {:.4}{}",
                        report.samples,
                        report.rms_residual,
                        if report.flat { "  (flat mask)" } else { "" }
                    );
                }
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

/// What one file produced.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub coeffs: QuadraticCoeffs,
    pub samples: usize,
    pub rms_residual: f64,
    pub flat: bool,
}

/// Load → fit → save for a single file, through the same [`Session`] the GUI uses.
pub fn run_one(input: &Path, output: &Path, flat_level: u8) -> Result<FileReport, ReliefError> {
    let mut session = Session::new().with_flat_mask_level(flat_level);
    session.open(input)?;
    session.fit()?;

    let (coeffs, samples, rms_residual) = match session.fit_result() {
        Some(fit) => (fit.coeffs, fit.samples, fit.rms_residual),
        None => return Err(ReliefError::InsufficientData { samples: 0 }),
    };
    let flat = session
        .save_mask(output)?
        .is_some_and(|levels| levels.is_flat());

    Ok(FileReport {
        coeffs,
        samples,
        rms_residual,
        flat,
    })
}

/// Turn the `--input` arguments into the list of images to fit.
///
/// A literal path is taken as given (the decoder sniffs its format). Glob
/// matches are narrowed to files with a raster extension, and masks written
/// by an earlier run (`*_mask.*`) are skipped so re-running over a folder
/// does not fit its own output.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = Vec::new();
    let mut push = |p: PathBuf| {
        if !images.contains(&p) {
            images.push(p);
        }
    };

    for pattern in patterns {
        let literal = Path::new(pattern);
        if literal.is_file() {
            push(literal.to_path_buf());
            continue;
        }

        let entries = match glob::glob(pattern) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("warning: '{}' is not a valid glob ({}); skipped.", pattern, e);
                continue;
            }
        };
        let mut skipped_masks = 0usize;
        let mut matched = 0usize;
        for entry in entries.flatten().filter(|p| p.is_file() && is_raster_name(p)) {
            if is_mask_output(&entry) {
                skipped_masks += 1;
                continue;
            }
            matched += 1;
            push(entry);
        }
        if skipped_masks > 0 {
            eprintln!(
                "note: '{}': skipped {} existing mask file(s).",
                pattern, skipped_masks
            );
        }
        if matched == 0 {
            eprintln!("warning: '{}' matched no images; no mask written for it.", pattern);
        }
    }

    images
}

fn is_raster_name(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| crate::io::RASTER_EXTENSIONS.contains(&e.as_str()))
}

fn is_mask_output(path: &Path) -> bool {
    path.file_stem()
        .is_some_and(|s| s.to_string_lossy().ends_with("_mask"))
}

/// Compute the mask path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, single-file input)
/// 2. `--output-dir` (`<dir>/<stem>_mask.png`)
/// 3. Next to the input: `<stem>_mask.png`
pub fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(crate::io::with_png_extension(out.to_path_buf()));
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let name = format!("{}_mask.png", stem);

    if let Some(dir) = output_dir {
        return Some(dir.join(name));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_output_wins() {
        let p = build_output_path(
            Path::new("in/scan.jpg"),
            Some(Path::new("out/residual")),
            Some(Path::new("ignored")),
        );
        assert_eq!(p, Some(PathBuf::from("out/residual.png")));
    }

    #[test]
    fn output_dir_uses_stem() {
        let p = build_output_path(Path::new("in/scan.jpg"), None, Some(Path::new("masks")));
        assert_eq!(p, Some(PathBuf::from("masks/scan_mask.png")));
    }

    #[test]
    fn default_sits_next_to_input() {
        let p = build_output_path(Path::new("in/scan.png"), None, None);
        assert_eq!(p, Some(PathBuf::from("in/scan_mask.png")));
    }

    #[test]
    fn glob_skips_masks_and_non_images() {
        let dir = std::env::temp_dir().join(format!("relief_cli_glob_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["scan.png", "scan_mask.png", "notes.txt", "other.JPG"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        let pattern = dir.join("*").to_string_lossy().into_owned();
        let mut found = resolve_inputs(&[pattern.clone(), pattern]);
        found.sort();
        assert_eq!(found, vec![dir.join("other.JPG"), dir.join("scan.png")]);

        // Named explicitly, even a mask or an odd extension is fitted
        let literal = dir.join("scan_mask.png").to_string_lossy().into_owned();
        assert_eq!(resolve_inputs(&[literal]), vec![dir.join("scan_mask.png")]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn parses_batch_arguments() {
        let args = CliArgs::try_parse_from([
            "relief",
            "-i",
            "a.png",
            "b.png",
            "--output-dir",
            "masks",
            "--flat-level",
            "128",
        ])
        .unwrap();
        assert_eq!(args.input, vec!["a.png", "b.png"]);
        assert_eq!(args.output_dir, Some(PathBuf::from("masks")));
        assert_eq!(args.flat_level, Some(128));
        assert!(!args.verbose);
    }

    #[test]
    fn rejects_out_of_range_flat_level() {
        assert!(CliArgs::try_parse_from(["relief", "-i", "a.png", "--flat-level", "256"]).is_err());
    }
}
