#![allow(dead_code)]

use std::sync::Arc;

use marquee_core::output::testing::{DriverLog, RecordingDriver};
use marquee_core::output::{Output, OutputConfig, OutputManager, Position};
use marquee_core::schedule::ScheduleManager;
use marquee_core::show::{Show, ShowManager};

/// Null output of `channels` whose driver calls are recorded
pub fn recorded_output(channels: usize) -> (Output, DriverLog) {
    let (driver, log) = RecordingDriver::new();
    (
        Output::with_driver(OutputConfig::null(channels), Box::new(driver)),
        log,
    )
}

/// Output manager with one recorded output per entry of `sizes`
pub fn recorded_outputs(sizes: &[usize]) -> (Arc<OutputManager>, Vec<DriverLog>) {
    let manager = Arc::new(OutputManager::new());
    let logs = sizes
        .iter()
        .map(|&channels| {
            let (output, log) = recorded_output(channels);
            manager.add_output(output, Position::End).unwrap();
            log
        })
        .collect();
    (manager, logs)
}

pub fn schedule_manager(outputs: Arc<OutputManager>, show: Show) -> ScheduleManager {
    ScheduleManager::new(outputs, show, ShowManager::new(&std::env::temp_dir()))
}
