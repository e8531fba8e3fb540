pub use config::{ConfigError, ConfigManager, ConfigSchema};
pub use messages::{SchedulerCommand, SchedulerEvent, Settings};
pub use output::{OutputManager, StartReport};
pub use playlist::{PlayList, PlayListItem, PlayListStep};
pub use runner::{discover_outputs, ScheduleRunner};
pub use schedule::{CommandResult, QueryResult, Schedule, ScheduleManager};
pub use show::{Show, ShowManager};

mod config;
pub mod frame;
pub mod messages;
pub mod output;
pub mod playlist;
mod runner;
pub mod schedule;
pub mod show;
