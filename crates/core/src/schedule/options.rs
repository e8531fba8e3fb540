use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::frame::{Matrix, VirtualMatrix};

pub const DEFAULT_WEB_PORT: u16 = 80;

/// A labelled button bound to a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserButton {
    pub label: String,
    pub command: String,
    #[serde(default)]
    pub parameters: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebOptions {
    pub port: u16,
    pub password: String,
    pub web_root: Option<PathBuf>,
    pub api_only: bool,
}

impl Default for WebOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_WEB_PORT,
            password: String::new(),
            web_root: None,
            api_only: false,
        }
    }
}

/// Show wide options stored alongside the playlists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleOptions {
    /// Keep sending all-off frames while nothing is playing
    pub send_off_when_idle: bool,
    pub sync: bool,
    pub sync_universe: u16,
    pub buttons: Vec<UserButton>,
    pub matrices: Vec<Matrix>,
    pub virtual_matrices: Vec<VirtualMatrix>,
    pub web: WebOptions,
}

impl ScheduleOptions {
    pub fn button(&self, label: &str) -> Option<&UserButton> {
        self.buttons
            .iter()
            .find(|b| b.label.eq_ignore_ascii_case(label))
    }

    pub fn matrix(&self, name: &str) -> Option<&Matrix> {
        self.matrices.iter().find(|m| m.name == name)
    }
}
