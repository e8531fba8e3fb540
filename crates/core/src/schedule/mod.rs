mod actions;
pub mod command;
mod integrity;
mod options;
mod query;
mod running_schedule;
#[allow(clippy::module_inception)]
mod schedule;
mod schedule_manager;

pub use command::{Command, CommandError, CommandManager, CommandResult};
pub use integrity::IntegrityReport;
pub use options::{ScheduleOptions, UserButton, WebOptions, DEFAULT_WEB_PORT};
pub use query::QueryResult;
pub use running_schedule::RunningSchedule;
pub use schedule::{Schedule, MAX_PRIORITY};
pub use schedule_manager::{
    Foreground, PlayRequest, ScheduleManager, FAST_START_FRAME_MS, QUEUE_PLAYLIST_NAME,
};
