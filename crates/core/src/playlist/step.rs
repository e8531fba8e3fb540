use serde::{Deserialize, Serialize};

use super::item::{PlayListItem, RenderContext, TextItem, DEFAULT_FRAME_MS};
use super::next_id;

/// A group of items that play together. The step lasts as long as its
/// longest item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayListStep {
    #[serde(skip, default = "next_id")]
    id: u32,
    pub name: String,
    #[serde(default)]
    pub items: Vec<PlayListItem>,
    /// Extra plays remaining after the current one
    #[serde(skip)]
    loops_left: u32,
    #[serde(skip)]
    position_ms: u64,
}

impl PlayListStep {
    pub fn new(name: &str) -> Self {
        Self {
            id: next_id(),
            name: name.to_string(),
            items: Vec::new(),
            loops_left: 0,
            position_ms: 0,
        }
    }

    pub fn with_item(mut self, item: PlayListItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn length_ms(&self) -> u64 {
        self.items.iter().map(|i| i.duration_ms()).max().unwrap_or(0)
    }

    pub fn frame_ms(&self) -> u64 {
        self.items
            .iter()
            .filter_map(|i| i.frame_ms())
            .min()
            .unwrap_or(DEFAULT_FRAME_MS)
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub fn loops_left(&self) -> u32 {
        self.loops_left
    }

    /// Play the step `times` times in total
    pub fn set_loops(&mut self, times: u32) {
        self.loops_left = times.saturating_sub(1);
    }

    pub fn reset(&mut self) {
        self.position_ms = 0;
    }

    /// Rewind for another play if any loops remain
    pub(crate) fn take_loop(&mut self) -> bool {
        if self.loops_left == 0 {
            return false;
        }
        self.loops_left -= 1;
        self.position_ms = 0;
        true
    }

    /// Draw every item at the current position without advancing
    pub fn render(&self, buffer: &mut [u8], ctx: &RenderContext<'_>) {
        for item in &self.items {
            item.frame(buffer, self.position_ms, ctx);
        }
    }

    /// Draw the current frame and advance. Returns true once the step has
    /// played out.
    pub fn frame(&mut self, buffer: &mut [u8], ctx: &RenderContext<'_>) -> bool {
        self.render(buffer, ctx);
        self.position_ms += self.frame_ms();
        self.position_ms >= self.length_ms()
    }

    pub fn text_mut(&mut self, name: &str) -> Option<&mut TextItem> {
        self.items.iter_mut().find_map(|item| match item {
            PlayListItem::Text(text) if text.name == name => Some(text),
            _ => None,
        })
    }
}
