//! Show directory persistence: the output list and the schedule file.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{from_reader, to_writer_pretty};
use thiserror::Error;

#[allow(clippy::module_inception)]
mod show;
mod show_manager;

pub use show::Show;
pub use show_manager::{ShowManager, NETWORKS_FILE, SCHEDULE_FILE};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("{0} not found")]
    NotFound(PathBuf),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => PersistError::NotFound(path.to_path_buf()),
        _ => PersistError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    from_reader(BufReader::new(file)).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let io_error = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let file = File::create(path).map_err(io_error)?;
    to_writer_pretty(BufWriter::new(file), value).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })
}
