use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    #[serde(rename = "90 CW")]
    Cw90,
    #[serde(rename = "90 CCW")]
    Ccw90,
    #[serde(rename = "180")]
    Half,
}

/// Row-major RGB image produced by a virtual matrix
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VirtualImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

/// Mirrors a region of the channel buffer into an image each frame so it can
/// be shown on screen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMatrix {
    pub name: String,
    /// 1-based
    pub start_channel: usize,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(skip)]
    started: bool,
    #[serde(skip)]
    image: Arc<Mutex<VirtualImage>>,
}

impl VirtualMatrix {
    pub fn new(name: &str, start_channel: usize, width: usize, height: usize) -> Self {
        Self {
            name: name.to_string(),
            start_channel,
            width,
            height,
            rotation: Rotation::None,
            started: false,
            image: Arc::new(Mutex::new(VirtualImage::default())),
        }
    }

    pub fn channels(&self) -> usize {
        self.width * self.height * 3
    }

    pub fn end_channel(&self) -> usize {
        self.start_channel + self.channels().saturating_sub(1)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn start(&mut self) {
        if !self.started {
            log::debug!("Virtual matrix '{}' started", self.name);
            self.started = true;
        }
    }

    pub fn stop(&mut self) {
        if self.started {
            log::debug!("Virtual matrix '{}' stopped", self.name);
            self.started = false;
            *self.image.lock() = VirtualImage::default();
        }
    }

    /// Shared handle to the latest snapshot
    pub fn image(&self) -> Arc<Mutex<VirtualImage>> {
        Arc::clone(&self.image)
    }

    /// Snapshot the matrix region of `buffer`
    pub fn frame(&self, buffer: &[u8]) {
        if !self.started || self.start_channel == 0 {
            return;
        }

        let (w, h) = (self.width, self.height);
        let (out_w, out_h) = match self.rotation {
            Rotation::None | Rotation::Half => (w, h),
            Rotation::Cw90 | Rotation::Ccw90 => (h, w),
        };

        let mut pixels = vec![0u8; out_w * out_h * 3];
        let base = self.start_channel - 1;
        for y in 0..h {
            for x in 0..w {
                let src = base + (y * w + x) * 3;
                if src + 3 > buffer.len() {
                    continue;
                }
                let (dx, dy) = match self.rotation {
                    Rotation::None => (x, y),
                    Rotation::Half => (w - 1 - x, h - 1 - y),
                    Rotation::Cw90 => (h - 1 - y, x),
                    Rotation::Ccw90 => (y, w - 1 - x),
                };
                let dst = (dy * out_w + dx) * 3;
                pixels[dst..dst + 3].copy_from_slice(&buffer[src..src + 3]);
            }
        }

        *self.image.lock() = VirtualImage {
            width: out_w,
            height: out_h,
            pixels,
        };
    }
}
