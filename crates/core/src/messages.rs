use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::schedule::{CommandResult, IntegrityReport, QueryResult};

/// Requests sent to the schedule runner
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerCommand {
    /// Run a named command such as "Play specified playlist"
    Action {
        command: String,
        parameters: String,
        data: String,
    },
    Query {
        query: String,
        parameters: String,
        ip: String,
    },
    CheckIntegrity,
    Shutdown,
}

impl SchedulerCommand {
    pub fn action(command: &str, parameters: &str) -> Self {
        SchedulerCommand::Action {
            command: command.to_string(),
            parameters: parameters.to_string(),
            data: String::new(),
        }
    }
}

/// Everything the runner reports back
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    Started {
        outputs: usize,
        channels: usize,
        outputting: bool,
    },
    ActionCompleted {
        command: String,
        result: CommandResult,
    },
    QueryAnswered {
        query: String,
        result: QueryResult,
    },
    Integrity {
        report: IntegrityReport,
    },
    /// Output open failures as (destination, reason)
    OutputsFailed {
        failed: Vec<(String, String)>,
    },
    Error {
        message: String,
    },
    ShutdownComplete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding networks.json and schedule.json
    pub show_dir: PathBuf,

    // Timing
    pub check_interval_ms: u64,
    pub default_frame_ms: u64,

    // Output
    pub output_on_start: bool,
    pub force_local_ip: Option<String>,
    pub discovery_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_dir: PathBuf::from("."),
            check_interval_ms: 50,
            default_frame_ms: 50,
            output_on_start: true,
            force_local_ip: None,
            discovery_timeout_ms: 2000,
        }
    }
}
