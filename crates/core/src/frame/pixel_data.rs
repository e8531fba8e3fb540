use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How payload bytes combine with what is already in the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Overwrite,
    Average,
    Mask,
    Unmask,
    Max,
    OverwriteIfBlack,
}

impl BlendMode {
    /// Combine buffer byte `p` with payload byte `d`
    pub fn blend(self, p: u8, d: u8) -> u8 {
        match self {
            BlendMode::Overwrite => d,
            BlendMode::Average => ((p as u16 + d as u16) / 2) as u8,
            BlendMode::Mask => {
                if d > 0 {
                    0
                } else {
                    p
                }
            }
            BlendMode::Unmask => {
                if d == 0 {
                    0
                } else {
                    p
                }
            }
            BlendMode::Max => p.max(d),
            BlendMode::OverwriteIfBlack => {
                if p == 0 {
                    d
                } else {
                    p
                }
            }
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlendMode::Overwrite => "Overwrite",
            BlendMode::Average => "Average",
            BlendMode::Mask => "Mask",
            BlendMode::Unmask => "Unmask",
            BlendMode::Max => "Max",
            BlendMode::OverwriteIfBlack => "Overwrite if black",
        };
        f.write_str(name)
    }
}

impl FromStr for BlendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "overwrite" => Ok(BlendMode::Overwrite),
            "average" => Ok(BlendMode::Average),
            "mask" => Ok(BlendMode::Mask),
            "unmask" => Ok(BlendMode::Unmask),
            "max" => Ok(BlendMode::Max),
            "overwriteifblack" | "overwriteblack" => Ok(BlendMode::OverwriteIfBlack),
            _ => Err(format!("unknown blend mode '{}'", s)),
        }
    }
}

/// An overlay patch applied on top of the composed frame
#[derive(Debug, Clone, PartialEq)]
pub struct PixelData {
    start_channel: usize,
    data: Vec<u8>,
    blend_mode: BlendMode,
}

impl PixelData {
    /// `start_channel` is 1-based
    pub fn new(start_channel: usize, data: Vec<u8>, blend_mode: BlendMode) -> Self {
        Self {
            start_channel: start_channel.max(1),
            data,
            blend_mode,
        }
    }

    pub fn start_channel(&self) -> usize {
        self.start_channel
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn set_data(&mut self, data: Vec<u8>, blend_mode: BlendMode) {
        self.data = data;
        self.blend_mode = blend_mode;
    }

    /// Blend the payload into `buffer`, never writing past its end
    pub fn apply(&self, buffer: &mut [u8]) {
        let offset = self.start_channel - 1;
        if offset >= buffer.len() {
            return;
        }

        let count = self.data.len().min(buffer.len() - offset);
        for (p, &d) in buffer[offset..offset + count].iter_mut().zip(&self.data) {
            *p = self.blend_mode.blend(*p, d);
        }
    }
}
