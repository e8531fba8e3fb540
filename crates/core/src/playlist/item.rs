use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::font;
use crate::frame::{BlendMode, Matrix};

pub const DEFAULT_FRAME_MS: u64 = 50;
const DEFAULT_TEXT_SPEED: u32 = 10;

/// What a playlist item can see while it renders
pub struct RenderContext<'a> {
    pub matrices: &'a [Matrix],
    /// False when the frame is only being advanced, not sent
    pub output: bool,
}

/// An RGB colour, written as "#RRGGBB" or a basic colour name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Colour(pub [u8; 3]);

impl Default for Colour {
    fn default() -> Self {
        Colour([255, 255, 255])
    }
}

impl FromStr for Colour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 {
                return Err(format!("bad colour '{}'", s));
            }
            let byte = |i: usize| {
                u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("bad colour '{}'", s))
            };
            return Ok(Colour([byte(0)?, byte(2)?, byte(4)?]));
        }

        match s.to_lowercase().as_str() {
            "white" => Ok(Colour([255, 255, 255])),
            "black" => Ok(Colour([0, 0, 0])),
            "red" => Ok(Colour([255, 0, 0])),
            "green" => Ok(Colour([0, 255, 0])),
            "blue" => Ok(Colour([0, 0, 255])),
            "yellow" => Ok(Colour([255, 255, 0])),
            "cyan" => Ok(Colour([0, 255, 255])),
            "magenta" => Ok(Colour([255, 0, 255])),
            "orange" => Ok(Colour([255, 165, 0])),
            _ => Err(format!("bad colour '{}'", s)),
        }
    }
}

impl TryFrom<String> for Colour {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Colour> for String {
    fn from(c: Colour) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02X}{:02X}{:02X}", r, g, b)
    }
}

/// How text moves across its matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextMovement {
    #[default]
    None,
    Left,
    Right,
    Up,
    Down,
}

impl FromStr for TextMovement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "static" => Ok(TextMovement::None),
            "left" | "right to left" => Ok(TextMovement::Left),
            "right" | "left to right" => Ok(TextMovement::Right),
            "up" | "bottom to top" => Ok(TextMovement::Up),
            "down" | "top to bottom" => Ok(TextMovement::Down),
            _ => Err(format!("unknown movement '{}'", s)),
        }
    }
}

/// Text drawn onto a named matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    pub name: String,
    pub matrix: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub colour: Colour,
    #[serde(default)]
    pub blend_mode: BlendMode,
    /// Pixels per second when moving
    #[serde(default = "default_speed")]
    pub speed: u32,
    #[serde(default)]
    pub orientation: TextMovement,
    #[serde(default)]
    pub font: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    pub duration_ms: u64,
}

fn default_speed() -> u32 {
    DEFAULT_TEXT_SPEED
}

impl TextItem {
    pub fn new(name: &str, matrix: &str, text: &str, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            matrix: matrix.to_string(),
            text: text.to_string(),
            colour: Colour::default(),
            blend_mode: BlendMode::Overwrite,
            speed: DEFAULT_TEXT_SPEED,
            orientation: TextMovement::None,
            font: String::new(),
            x: 0,
            y: 0,
            duration_ms,
        }
    }

    /// Apply a `key=value|key=value` property list. Every property that
    /// parses is applied; returns false if any was not understood.
    pub fn apply_properties(&mut self, properties: &str) -> bool {
        let mut valid = true;

        for property in properties.split('|').filter(|p| !p.trim().is_empty()) {
            let Some((key, value)) = property.split_once('=') else {
                valid = false;
                continue;
            };

            let ok = match key.trim().to_lowercase().as_str() {
                "color" | "colour" => value.parse().map(|c| self.colour = c).is_ok(),
                "blendmode" => value.parse().map(|b| self.blend_mode = b).is_ok(),
                "speed" => value.trim().parse().map(|s| self.speed = s).is_ok(),
                "orientation" | "movement" => {
                    value.parse().map(|m| self.orientation = m).is_ok()
                }
                "font" => {
                    self.font = value.trim().to_string();
                    true
                }
                "x" => value.trim().parse().map(|x| self.x = x).is_ok(),
                "y" => value.trim().parse().map(|y| self.y = y).is_ok(),
                _ => false,
            };

            if !ok {
                log::debug!("Ignoring text property '{}'", property);
                valid = false;
            }
        }

        valid
    }

    /// Origin of the text at `position_ms` into the item
    fn origin(&self, matrix: &Matrix, position_ms: u64) -> (i64, i64) {
        let width = font::text_width(&self.text) as i64;
        let height = font::GLYPH_HEIGHT as i64;
        let travelled = (position_ms * self.speed as u64 / 1000) as i64;
        let (x, y) = (self.x as i64, self.y as i64);

        match self.orientation {
            TextMovement::None => (x, y),
            TextMovement::Left => {
                let span = matrix.width as i64 + width;
                (x + matrix.width as i64 - travelled % span.max(1), y)
            }
            TextMovement::Right => {
                let span = matrix.width as i64 + width;
                (x - width + travelled % span.max(1), y)
            }
            TextMovement::Up => {
                let span = matrix.height as i64 + height;
                (x, y + matrix.height as i64 - travelled % span.max(1))
            }
            TextMovement::Down => {
                let span = matrix.height as i64 + height;
                (x, y - height + travelled % span.max(1))
            }
        }
    }

    fn render(&self, buffer: &mut [u8], position_ms: u64, ctx: &RenderContext<'_>) {
        let Some(matrix) = ctx.matrices.iter().find(|m| m.name == self.matrix) else {
            log::debug!("Text '{}' refers to unknown matrix '{}'", self.name, self.matrix);
            return;
        };

        let (ox, oy) = self.origin(matrix, position_ms);
        font::for_each_pixel(&self.text, |px, py| {
            let x = ox + px as i64;
            let y = oy + py as i64;
            if x >= 0 && y >= 0 {
                matrix.set_pixel(buffer, x as usize, y as usize, self.colour.0, self.blend_mode);
            }
        });
    }
}

/// One piece of content inside a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayListItem {
    /// Repeat a value pattern across a channel range
    #[serde(rename_all = "camelCase")]
    Fill {
        #[serde(default)]
        name: String,
        start_channel: usize,
        channels: usize,
        values: Vec<u8>,
        #[serde(default)]
        blend_mode: BlendMode,
        duration_ms: u64,
        #[serde(default = "default_frame_ms")]
        frame_ms: u64,
    },
    /// Output nothing for a while
    #[serde(rename_all = "camelCase")]
    Delay {
        #[serde(default)]
        name: String,
        duration_ms: u64,
    },
    Text(TextItem),
}

fn default_frame_ms() -> u64 {
    DEFAULT_FRAME_MS
}

impl PlayListItem {
    pub fn fill(start_channel: usize, channels: usize, values: Vec<u8>, duration_ms: u64) -> Self {
        PlayListItem::Fill {
            name: String::new(),
            start_channel,
            channels,
            values,
            blend_mode: BlendMode::Overwrite,
            duration_ms,
            frame_ms: DEFAULT_FRAME_MS,
        }
    }

    pub fn delay(duration_ms: u64) -> Self {
        PlayListItem::Delay {
            name: String::new(),
            duration_ms,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PlayListItem::Fill { name, .. } | PlayListItem::Delay { name, .. } => name,
            PlayListItem::Text(t) => &t.name,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            PlayListItem::Fill { duration_ms, .. } | PlayListItem::Delay { duration_ms, .. } => {
                *duration_ms
            }
            PlayListItem::Text(t) => t.duration_ms,
        }
    }

    /// Frame interval this item wants, if it cares
    pub fn frame_ms(&self) -> Option<u64> {
        match self {
            PlayListItem::Fill { frame_ms, .. } => Some((*frame_ms).max(1)),
            PlayListItem::Delay { .. } => None,
            PlayListItem::Text(_) => Some(DEFAULT_FRAME_MS),
        }
    }

    pub fn matrix(&self) -> Option<&str> {
        match self {
            PlayListItem::Text(t) => Some(&t.matrix),
            _ => None,
        }
    }

    pub fn frame(&self, buffer: &mut [u8], position_ms: u64, ctx: &RenderContext<'_>) {
        if position_ms >= self.duration_ms() {
            return;
        }

        match self {
            PlayListItem::Fill {
                start_channel,
                channels,
                values,
                blend_mode,
                ..
            } => {
                if values.is_empty() || *start_channel == 0 {
                    return;
                }
                let begin = start_channel - 1;
                if begin >= buffer.len() {
                    return;
                }
                let end = (begin + channels).min(buffer.len());
                for (i, b) in buffer[begin..end].iter_mut().enumerate() {
                    *b = blend_mode.blend(*b, values[i % values.len()]);
                }
            }
            PlayListItem::Delay { .. } => {}
            PlayListItem::Text(text) => text.render(buffer, position_ms, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(matrices: &[Matrix]) -> RenderContext<'_> {
        RenderContext {
            matrices,
            output: true,
        }
    }

    #[test]
    fn test_fill_repeats_pattern() {
        let item = PlayListItem::fill(2, 5, vec![1, 2], 1000);
        let mut buffer = vec![0u8; 8];
        item.frame(&mut buffer, 0, &ctx(&[]));
        assert_eq!(buffer, vec![0, 1, 2, 1, 2, 1, 0, 0]);
    }

    #[test]
    fn test_item_silent_after_duration() {
        let item = PlayListItem::fill(1, 2, vec![9], 100);
        let mut buffer = vec![0u8; 2];
        item.frame(&mut buffer, 100, &ctx(&[]));
        assert_eq!(buffer, vec![0, 0]);
    }

    #[test]
    fn test_colour_parsing() {
        assert_eq!("#FF8000".parse::<Colour>().unwrap(), Colour([255, 128, 0]));
        assert_eq!("Red".parse::<Colour>().unwrap(), Colour([255, 0, 0]));
        assert!("#12".parse::<Colour>().is_err());
        assert_eq!(Colour([1, 2, 3]).to_string(), "#010203");
    }

    #[test]
    fn test_text_properties() {
        let mut text = TextItem::new("Banner", "Matrix", "", 1000);
        let valid = text.apply_properties("color=#00FF00|blendmode=max|speed=20|x=3|y=1|movement=left");

        assert!(valid);
        assert_eq!(text.colour, Colour([0, 255, 0]));
        assert_eq!(text.blend_mode, BlendMode::Max);
        assert_eq!(text.speed, 20);
        assert_eq!((text.x, text.y), (3, 1));
        assert_eq!(text.orientation, TextMovement::Left);
    }

    #[test]
    fn test_bad_text_property_flags_invalid() {
        let mut text = TextItem::new("Banner", "Matrix", "", 1000);
        assert!(!text.apply_properties("colour=red|wobble=3"));
        // The good property still applied
        assert_eq!(text.colour, Colour([255, 0, 0]));
        assert!(!text.apply_properties("noequals"));
    }

    #[test]
    fn test_static_text_renders_on_matrix() {
        let matrices = vec![Matrix::new("Matrix", 1, 6, 7)];
        let mut text = TextItem::new("Banner", "Matrix", "I", 1000);
        text.colour = Colour([10, 20, 30]);
        let item = PlayListItem::Text(text);

        let mut buffer = vec![0u8; 6 * 7 * 3];
        item.frame(&mut buffer, 0, &ctx(&matrices));

        // Column 2 of every row is lit
        for y in 0..7 {
            let offset = matrices[0].pixel_offset(2, y).unwrap();
            assert_eq!(&buffer[offset..offset + 3], &[10, 20, 30]);
        }
        let first = matrices[0].pixel_offset(0, 0).unwrap();
        assert_eq!(&buffer[first..first + 3], &[0, 0, 0]);
    }

    #[test]
    fn test_text_on_missing_matrix_is_ignored() {
        let item = PlayListItem::Text(TextItem::new("Banner", "Nope", "HI", 1000));
        let mut buffer = vec![0u8; 30];
        item.frame(&mut buffer, 0, &ctx(&[]));
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_item_serde_tagging() {
        let json = r#"{"type":"Delay","durationMs":500}"#;
        let item: PlayListItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.duration_ms(), 500);
        assert_eq!(item.frame_ms(), None);
    }
}
