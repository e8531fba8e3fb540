use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::show::Show;
use super::{read_json, write_json, PersistError};
use crate::output::OutputManager;

pub const NETWORKS_FILE: &str = "networks.json";
pub const SCHEDULE_FILE: &str = "schedule.json";

/// Locates and loads the files of one show directory
pub struct ShowManager {
    show_dir: PathBuf,
}

impl ShowManager {
    pub fn new(show_dir: &Path) -> Self {
        Self {
            show_dir: show_dir.to_path_buf(),
        }
    }

    pub fn show_dir(&self) -> &Path {
        &self.show_dir
    }

    pub fn networks_path(&self) -> PathBuf {
        self.show_dir.join(NETWORKS_FILE)
    }

    pub fn schedule_path(&self) -> PathBuf {
        self.show_dir.join(SCHEDULE_FILE)
    }

    pub fn load_outputs(&self) -> OutputManager {
        OutputManager::load(&self.networks_path())
    }

    /// Load the schedule file, falling back to an empty show
    pub fn load_show(&self) -> Show {
        let path = self.schedule_path();
        match read_json::<Show>(&path) {
            Ok(show) => {
                log::info!(
                    "Loaded {} playlists from {}",
                    show.playlists.len(),
                    path.display()
                );
                show
            }
            Err(PersistError::NotFound(_)) => {
                log::info!("No schedule at {}, starting with an empty show", path.display());
                Show::default()
            }
            Err(e) => {
                log::error!("Failed to load schedule, starting with an empty show: {}", e);
                Show::default()
            }
        }
    }

    pub fn save_show(&self, show: &mut Show) -> Result<PathBuf, PersistError> {
        let path = self.schedule_path();
        show.modified_at = SystemTime::now();
        write_json(&path, show)?;
        log::info!("Saved schedule to {}", path.display());
        Ok(path)
    }
}
