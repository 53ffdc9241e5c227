//! Relief: view a grayscale image as a 3D height surface, fit a quadratic
//! surface to it by least squares and export the surface+fit mask.

pub mod logger;

pub mod app;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod ops;
pub mod session;
pub mod settings;
pub mod surface;
pub mod view;

pub use error::{ReliefError, Result};
pub use session::{Controls, Session, SessionState};
