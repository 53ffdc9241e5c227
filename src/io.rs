use image::codecs::png::PngEncoder;
use image::{GrayImage, ImageEncoder};
use rfd::FileDialog;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ReliefError, Result};

/// Raster extensions offered by the open dialog.
pub const RASTER_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp", "tga", "ico", "pnm", "pgm",
];

/// Decode any raster the `image` crate understands and collapse it to 8-bit
/// luminance.
///
/// The format is sniffed from the file's leading bytes, so an image with a
/// missing or wrong extension still loads.
pub fn load_grayscale(path: &Path) -> Result<GrayImage> {
    let decode_err = |message: String| ReliefError::Decode {
        path: path.to_path_buf(),
        message,
    };
    let img = image::io::Reader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_err(e.to_string()))?
        .decode()
        .map_err(|e| decode_err(e.to_string()))?;
    Ok(img.to_luma8())
}

/// Write an 8-bit mask as a single-channel PNG.
///
/// The bytes go to a `.partial` sibling first and are renamed into place, so
/// a failed encode never leaves a truncated file at `path`.
pub fn write_mask_png(mask: &GrayImage, path: &Path) -> Result<()> {
    let staging = staging_path(path);
    let written = encode_png(mask, &staging).and_then(|()| {
        std::fs::rename(&staging, path)?;
        Ok(())
    });
    if written.is_err() {
        let _ = std::fs::remove_file(&staging);
    }
    written
}

fn encode_png(mask: &GrayImage, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    PngEncoder::new(&mut writer).write_image(
        mask.as_raw(),
        mask.width(),
        mask.height(),
        image::ColorType::L8,
    )?;
    writer.flush()?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Append `.png` when the user typed a bare file name into the save dialog.
pub fn with_png_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension("png")
    }
}

// ============================================================================
// FILE HANDLER: native open/save dialogs, remembers the last directories
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct FileHandler {
    /// Path of the currently loaded image.
    pub current_path: Option<PathBuf>,
    pub last_open_dir: Option<PathBuf>,
    pub last_save_dir: Option<PathBuf>,
}

impl FileHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the native open dialog. `None` when the user cancels.
    pub fn pick_image_path(&mut self) -> Option<PathBuf> {
        let mut dialog = FileDialog::new()
            .set_title("Open Image")
            .add_filter("Images", RASTER_EXTENSIONS)
            .add_filter("JPEG Files", &["jpg", "jpeg"])
            .add_filter("PNG Files", &["png"])
            .add_filter("All Files", &["*"]);
        if let Some(dir) = &self.last_open_dir {
            dialog = dialog.set_directory(dir);
        }
        let path = dialog.pick_file()?;
        self.last_open_dir = path.parent().map(Path::to_path_buf);
        Some(path)
    }

    /// Show the native save dialog for a PNG mask. `None` when the user cancels.
    pub fn pick_mask_save_path(&mut self) -> Option<PathBuf> {
        let default_name = self
            .current_path
            .as_deref()
            .and_then(|p| p.file_stem())
            .map(|s| format!("{}_mask.png", s.to_string_lossy()))
            .unwrap_or_else(|| "mask.png".to_string());

        let mut dialog = FileDialog::new()
            .set_title("Save Mask")
            .add_filter("PNG Files", &["png"])
            .add_filter("All Files", &["*"])
            .set_file_name(default_name.as_str());
        if let Some(dir) = self.last_save_dir.as_ref().or(self.last_open_dir.as_ref()) {
            dialog = dialog.set_directory(dir);
        }
        let path = with_png_extension(dialog.save_file()?);
        self.last_save_dir = path.parent().map(Path::to_path_buf);
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("relief_io_{}_{}", std::process::id(), name))
    }

    #[test]
    fn mask_png_round_trips_as_grayscale() {
        let path = temp_path("mask.png");
        let mask = GrayImage::from_raw(3, 2, vec![0, 50, 100, 150, 200, 255]).unwrap();
        write_mask_png(&mask, &path).unwrap();
        let back = load_grayscale(&path).unwrap();
        assert_eq!(back.as_raw(), mask.as_raw());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn color_input_collapses_to_luma() {
        let path = temp_path("rgb.png");
        let rgb = image::RgbImage::from_pixel(2, 2, image::Rgb([255, 255, 255]));
        rgb.save(&path).unwrap();
        let gray = load_grayscale(&path).unwrap();
        assert_eq!(gray.dimensions(), (2, 2));
        assert!(gray.as_raw().iter().all(|&v| v == 255));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn non_raster_is_a_decode_error() {
        let path = temp_path("not_an_image.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(matches!(
            load_grayscale(&path),
            Err(ReliefError::Decode { .. })
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn write_into_missing_directory_is_io_error() {
        let path = temp_path("no_such_dir").join("mask.png");
        let mask = GrayImage::new(1, 1);
        assert!(matches!(
            write_mask_png(&mask, &path),
            Err(ReliefError::Io(_))
        ));
    }

    #[test]
    fn format_is_detected_from_content_not_extension() {
        let mask = GrayImage::from_fn(8, 8, |x, y| image::Luma([(x * 30 + y) as u8]));
        for name in ["png_without_extension", "png_named_as.jpg"] {
            let path = temp_path(name);
            let mut bytes = Vec::new();
            PngEncoder::new(&mut bytes)
                .write_image(mask.as_raw(), 8, 8, image::ColorType::L8)
                .unwrap();
            std::fs::write(&path, &bytes).unwrap();

            let loaded = load_grayscale(&path).unwrap();
            assert_eq!(loaded.as_raw(), mask.as_raw(), "{name}");
            let _ = std::fs::remove_file(&path);
        }
    }

    #[test]
    fn failed_write_leaves_no_partial_file() {
        // A directory at the target path makes the final rename fail
        let path = temp_path("occupied_by_dir.png");
        std::fs::create_dir_all(&path).unwrap();
        let mask = GrayImage::new(2, 2);

        assert!(write_mask_png(&mask, &path).is_err());
        assert!(!staging_path(&path).exists());
        assert!(path.is_dir());
        let _ = std::fs::remove_dir(&path);
    }

    #[test]
    fn successful_write_cleans_up_staging() {
        let path = temp_path("staged.png");
        write_mask_png(&GrayImage::new(3, 1), &path).unwrap();
        assert!(path.is_file());
        assert!(!staging_path(&path).exists());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn bare_save_name_gets_png_extension() {
        assert_eq!(
            with_png_extension(PathBuf::from("out/mask")),
            PathBuf::from("out/mask.png")
        );
        assert_eq!(
            with_png_extension(PathBuf::from("mask.PNG")),
            PathBuf::from("mask.PNG")
        );
    }
}
