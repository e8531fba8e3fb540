pub mod brightness;
pub mod matrix;
pub mod output_process;
pub mod pixel_data;
pub mod virtual_matrix;

pub use brightness::BrightnessLut;
pub use matrix::{Matrix, MatrixOrientation, StartLocation};
pub use output_process::{OutputProcess, ProcessKind};
pub use pixel_data::{BlendMode, PixelData};
pub use virtual_matrix::{Rotation, VirtualImage, VirtualMatrix};
