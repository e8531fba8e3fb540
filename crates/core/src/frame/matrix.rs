use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatrixOrientation {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartLocation {
    #[default]
    TopLeft,
    BottomLeft,
}

/// A grid of RGB pixels laid out over a run of channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matrix {
    pub name: String,
    /// 1-based
    pub start_channel: usize,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub orientation: MatrixOrientation,
    #[serde(default)]
    pub start_location: StartLocation,
    /// Alternate strings run in opposite directions
    #[serde(default)]
    pub zig_zag: bool,
}

impl Matrix {
    pub fn new(name: &str, start_channel: usize, width: usize, height: usize) -> Self {
        Self {
            name: name.to_string(),
            start_channel,
            width,
            height,
            orientation: MatrixOrientation::Horizontal,
            start_location: StartLocation::TopLeft,
            zig_zag: false,
        }
    }

    pub fn channels(&self) -> usize {
        self.width * self.height * 3
    }

    /// Last channel used, 1-based
    pub fn end_channel(&self) -> usize {
        self.start_channel + self.channels().saturating_sub(1)
    }

    /// 0-based buffer offset of the red channel for pixel (x, y), where
    /// (0, 0) is the top left corner
    pub fn pixel_offset(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width || y >= self.height || self.start_channel == 0 {
            return None;
        }

        let y = match self.start_location {
            StartLocation::TopLeft => y,
            StartLocation::BottomLeft => self.height - 1 - y,
        };

        let node = match self.orientation {
            MatrixOrientation::Horizontal => {
                let x = if self.zig_zag && y % 2 == 1 {
                    self.width - 1 - x
                } else {
                    x
                };
                y * self.width + x
            }
            MatrixOrientation::Vertical => {
                let y = if self.zig_zag && x % 2 == 1 {
                    self.height - 1 - y
                } else {
                    y
                };
                x * self.height + y
            }
        };

        Some(self.start_channel - 1 + node * 3)
    }

    /// Blend an RGB value into a pixel if it lies inside the buffer
    pub fn set_pixel(&self, buffer: &mut [u8], x: usize, y: usize, rgb: [u8; 3], blend: super::BlendMode) {
        let Some(offset) = self.pixel_offset(x, y) else {
            return;
        };
        if offset + 3 > buffer.len() {
            return;
        }
        for (i, value) in rgb.into_iter().enumerate() {
            buffer[offset + i] = blend.blend(buffer[offset + i], value);
        }
    }
}
