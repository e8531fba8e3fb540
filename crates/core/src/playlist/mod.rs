//! Playlists: ordered steps of timed items, with the playback state the
//! schedule manager drives.

use std::sync::atomic::{AtomicU32, Ordering};

pub mod font;
mod item;
#[allow(clippy::module_inception)]
mod playlist;
mod step;

pub use item::{Colour, PlayListItem, RenderContext, TextItem, TextMovement, DEFAULT_FRAME_MS};
pub use playlist::{PlayList, PlayListState};
pub use step::PlayListStep;

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Session unique id for playlists, steps and schedules. Copies keep the id
/// of what they were copied from.
pub fn next_id() -> u32 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Format milliseconds as `m:ss.mmm`
pub fn format_duration(ms: u64) -> String {
    format!("{}:{:02}.{:03}", ms / 60_000, (ms % 60_000) / 1000, ms % 1000)
}
