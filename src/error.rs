use std::fmt;
use std::path::PathBuf;

/// Everything that can go wrong between opening an image and writing a mask.
///
/// None of these are fatal: the session stays in its last well-defined state
/// and the caller decides how to report the message.
#[derive(Debug)]
pub enum ReliefError {
    /// The file is missing or is not a raster the `image` crate can decode.
    Decode { path: PathBuf, message: String },
    /// Fewer samples than the six unknowns of the quadratic model.
    InsufficientData { samples: usize },
    /// Two grids that must line up pixel-for-pixel do not.
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
    /// The linear solver could not produce a solution.
    Solver(String),
    Io(std::io::Error),
    Encode(String),
}

impl fmt::Display for ReliefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReliefError::Decode { path, message } => {
                write!(f, "could not decode '{}': {}", path.display(), message)
            }
            ReliefError::InsufficientData { samples } => write!(
                f,
                "need at least 6 samples to fit a quadratic surface, got {}",
                samples
            ),
            ReliefError::DimensionMismatch { expected, found } => write!(
                f,
                "grid size mismatch: expected {}x{}, found {}x{}",
                expected.0, expected.1, found.0, found.1
            ),
            ReliefError::Solver(e) => write!(f, "least-squares solve failed: {}", e),
            ReliefError::Io(e) => write!(f, "I/O error: {}", e),
            ReliefError::Encode(e) => write!(f, "encode error: {}", e),
        }
    }
}

impl std::error::Error for ReliefError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReliefError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReliefError {
    fn from(e: std::io::Error) -> Self {
        ReliefError::Io(e)
    }
}

impl From<image::ImageError> for ReliefError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => ReliefError::Io(io),
            other => ReliefError::Encode(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReliefError>;
