use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::frame::OutputProcess;
use crate::playlist::PlayList;
use crate::schedule::ScheduleOptions;

/// Contents of the schedule file. Missing fields take their defaults so
/// hand written files load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Show {
    pub version: String,
    pub created_at: SystemTime,
    pub modified_at: SystemTime,
    pub options: ScheduleOptions,
    pub playlists: Vec<PlayList>,
    pub output_processes: Vec<OutputProcess>,
    /// Name of the playlist looped underneath everything else
    pub background_playlist: Option<String>,
}

impl Default for Show {
    fn default() -> Self {
        let now = SystemTime::now();
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: now,
            modified_at: now,
            options: ScheduleOptions::default(),
            playlists: Vec::new(),
            output_processes: Vec::new(),
            background_playlist: None,
        }
    }
}

impl Show {
    pub fn with_playlist(mut self, playlist: PlayList) -> Self {
        self.playlists.push(playlist);
        self
    }

    pub fn playlist(&self, name: &str) -> Option<&PlayList> {
        self.playlists
            .iter()
            .find(|p| p.name_no_time().eq_ignore_ascii_case(name))
    }
}
