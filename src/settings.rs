// ============================================================================
// APP SETTINGS: plain key=value file in the platform config directory
// ============================================================================

use std::path::PathBuf;

/// User-tunable settings, persisted between launches.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    /// Initial window size
    pub window_width: f32,
    pub window_height: f32,
    /// Maximum wireframe lines drawn per axis (large images are decimated)
    pub mesh_resolution: u32,
    /// Pixel value written when the mask has no range to stretch
    pub flat_mask_level: u8,
    /// Directory the open dialog starts in
    pub last_open_dir: Option<PathBuf>,
    /// Directory the save dialog starts in
    pub last_save_dir: Option<PathBuf>,
}

pub const MESH_RESOLUTION_MIN: u32 = 4;
pub const MESH_RESOLUTION_MAX: u32 = 256;

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            window_width: 960.0,
            window_height: 480.0,
            mesh_resolution: 48,
            flat_mask_level: 0,
            last_open_dir: None,
            last_save_dir: None,
        }
    }
}

impl AppSettings {
    pub(crate) fn settings_path() -> Option<PathBuf> {
        let config_dir = config_dir()?;
        let _ = std::fs::create_dir_all(&config_dir);
        Some(config_dir.join("relief_settings.cfg"))
    }

    /// Write settings to disk. I/O errors are ignored.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            crate::log_warn!("Could not save settings to {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk, or defaults if the file is missing.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::parse(&content)
    }

    pub fn to_config_string(&self) -> String {
        let dir = |d: &Option<PathBuf>| {
            d.as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        format!(
            "window_width={}\n\
             window_height={}\n\
             mesh_resolution={}\n\
             flat_mask_level={}\n\
             last_open_dir={}\n\
             last_save_dir={}\n",
            self.window_width,
            self.window_height,
            self.mesh_resolution,
            self.flat_mask_level,
            dir(&self.last_open_dir),
            dir(&self.last_save_dir),
        )
    }

    /// Parse a settings file. Unknown keys and malformed values are skipped,
    /// leaving the default in place.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "window_width" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v >= 200.0
                    {
                        s.window_width = v;
                    }
                }
                "window_height" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v >= 150.0
                    {
                        s.window_height = v;
                    }
                }
                "mesh_resolution" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.mesh_resolution = v.clamp(MESH_RESOLUTION_MIN, MESH_RESOLUTION_MAX);
                    }
                }
                "flat_mask_level" => {
                    if let Ok(v) = val.parse::<u8>() {
                        s.flat_mask_level = v;
                    }
                }
                "last_open_dir" => {
                    s.last_open_dir = (!val.is_empty()).then(|| PathBuf::from(val));
                }
                "last_save_dir" => {
                    s.last_save_dir = (!val.is_empty()).then(|| PathBuf::from(val));
                }
                _ => {}
            }
        }
        s
    }
}

#[cfg(target_os = "linux")]
fn config_dir() -> Option<PathBuf> {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
        .ok()?;
    Some(base.join("relief"))
}

#[cfg(target_os = "windows")]
fn config_dir() -> Option<PathBuf> {
    // %APPDATA% keeps settings per-user
    let appdata = std::env::var("APPDATA")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()?;
    Some(PathBuf::from(appdata).join("Relief"))
}

#[cfg(target_os = "macos")]
fn config_dir() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(
        PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join("Relief"),
    )
}

#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
fn config_dir() -> Option<PathBuf> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_config_string() {
        let s = AppSettings {
            window_width: 1280.0,
            window_height: 720.0,
            mesh_resolution: 96,
            flat_mask_level: 128,
            last_open_dir: Some(PathBuf::from("/tmp/images")),
            last_save_dir: None,
        };
        assert_eq!(AppSettings::parse(&s.to_config_string()), s);
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let s = AppSettings::parse(
            "window_width=wide\n\
             flat_mask_level=300\n\
             mesh_resolution=100000\n\
             no_equals_sign\n\
             # comment\n\
             unknown_key=1\n",
        );
        let d = AppSettings::default();
        assert_eq!(s.window_width, d.window_width);
        assert_eq!(s.flat_mask_level, d.flat_mask_level);
        assert_eq!(s.mesh_resolution, MESH_RESOLUTION_MAX);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(AppSettings::parse(""), AppSettings::default());
    }
}
