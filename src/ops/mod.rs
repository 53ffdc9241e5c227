pub mod fit;
pub mod mask;
