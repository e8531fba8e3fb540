use serde::Serialize;
use thiserror::Error;

use crate::show::PersistError;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command.")]
    UnknownCommand,
    #[error("Unknown query.")]
    UnknownQuery,
    #[error("Unknown button.")]
    UnknownButton,
    #[error("Incorrect parameters. '{command}' expects {expected} parameters.")]
    WrongParameterCount { command: String, expected: usize },
    #[error("Invalid parameter '{0}'.")]
    InvalidParameter(String),
    #[error("Playlist '{0}' not found.")]
    PlayListNotFound(String),
    #[error("Step '{step}' not found in playlist '{playlist}'.")]
    StepNotFound { playlist: String, step: String },
    #[error("Schedule '{0}' not found.")]
    ScheduleNotFound(String),
    #[error("Playlist '{0}' has no steps.")]
    EmptyPlayList(String),
    #[error("No playlist currently playing.")]
    NothingPlaying,
    #[error("No schedule is currently playing.")]
    NoRunningSchedule,
    #[error("Only scheduled and immediately played playlists can be restarted.")]
    CannotRefresh,
    #[error("Text '{0}' not found to set ... it may not be running.")]
    TextNotFound(String),
    #[error("Invalid text properties '{0}'.")]
    InvalidTextProperties(String),
    #[error("Pixel data is not valid base64: {0}")]
    BadPixelData(#[from] base64::DecodeError),
    #[error("Buttons cannot press other buttons.")]
    NestedButton,
    #[error("Failed to save schedule: {0}")]
    Save(#[from] PersistError),
}

/// Outcome of a command as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    /// New frame interval when the command changed what is playing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_ms: Option<u64>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
            frame_ms: None,
        }
    }

    pub fn with_rate(frame_ms: u64) -> Self {
        Self {
            frame_ms: Some(frame_ms),
            ..Self::ok()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            frame_ms: None,
        }
    }
}

impl From<Result<Option<u64>, CommandError>> for CommandResult {
    fn from(result: Result<Option<u64>, CommandError>) -> Self {
        match result {
            Ok(Some(frame_ms)) => CommandResult::with_rate(frame_ms),
            Ok(None) => CommandResult::ok(),
            Err(e) => CommandResult::failed(e.to_string()),
        }
    }
}

/// A command name with the number of comma separated parameters it takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Command {
    pub name: &'static str,
    pub parameters: usize,
    /// Only meaningful while something is playing
    pub requires_playlist: bool,
    /// Trailing parameters that may be left off, passed on as empty
    pub optional: usize,
}

impl Command {
    const fn new(name: &'static str, parameters: usize) -> Self {
        Self {
            name,
            parameters,
            requires_playlist: false,
            optional: 0,
        }
    }

    const fn playing(name: &'static str, parameters: usize) -> Self {
        Self {
            name,
            parameters,
            requires_playlist: true,
            optional: 0,
        }
    }

    const fn with_optional(self, optional: usize) -> Self {
        Self { optional, ..self }
    }

    /// Split `parameters` into exactly the expected number of values. The
    /// last value keeps any further commas; omitted optional values are empty.
    pub fn split<'a>(&self, parameters: &'a str) -> Result<Vec<&'a str>, CommandError> {
        if self.parameters == 0 {
            return Ok(Vec::new());
        }

        let mut values: Vec<&str> = parameters.splitn(self.parameters, ',').collect();
        let required = (self.parameters - self.optional).max(1);
        if values.len() < required || values[0].trim().is_empty() {
            return Err(CommandError::WrongParameterCount {
                command: self.name.to_string(),
                expected: self.parameters,
            });
        }
        values.resize(self.parameters, "");
        Ok(values)
    }
}

pub const STOP_ALL_NOW: &str = "Stop all now";
pub const STOP: &str = "Stop";
pub const PLAY_PLAYLIST: &str = "Play specified playlist";
pub const PLAY_PLAYLIST_LOOPED: &str = "Play specified playlist looped";
pub const PLAY_PLAYLIST_N_TIMES: &str = "Play specified playlist n times";
pub const STOP_PLAYLIST: &str = "Stop specified playlist";
pub const STOP_PLAYLIST_END_OF_STEP: &str = "Stop specified playlist at end of current step";
pub const STOP_PLAYLIST_END_OF_LOOP: &str = "Stop specified playlist at end of current loop";
pub const STOP_END_OF_STEP: &str = "Stop playlist at end of current step";
pub const STOP_END_OF_LOOP: &str = "Stop playlist at end of current loop";
pub const JUMP_TO_END: &str = "Jump to play once at end at end of current step and then stop";
pub const PAUSE: &str = "Pause";
pub const NEXT_STEP: &str = "Next step in current playlist";
pub const PRIOR_STEP: &str = "Prior step in current playlist";
pub const RESTART_STEP: &str = "Restart step in current playlist";
pub const TOGGLE_STEP_LOOP: &str = "Toggle loop current step";
pub const PLAY_STEP_LOOPED: &str = "Play specified step in specified playlist looped";
pub const PLAY_STEP_ONCE: &str = "Play specified playlist step once only";
pub const PLAY_STEP: &str = "Play playlist step";
pub const PLAY_FROM_STEP: &str = "Play playlist starting at step";
pub const PLAY_FROM_STEP_LOOPED: &str = "Play playlist starting at step looped";
pub const PLAY_STEP_N_TIMES: &str = "Play specified playlist step n times";
pub const JUMP_TO_STEP: &str = "Jump to specified step in current playlist";
pub const JUMP_TO_STEP_AT_END: &str =
    "Jump to specified step in current playlist at the end of current step";
pub const JUMP_TO_RANDOM: &str = "Jump to random step in current playlist";
pub const JUMP_TO_RANDOM_IN: &str = "Jump to random step in specified playlist";
pub const ENQUEUE_STEP: &str = "Enqueue playlist step";
pub const CLEAR_QUEUE: &str = "Clear playlist queue";
pub const ADD_MINUTES: &str = "Add to the current schedule n minutes";
pub const RESTART_SCHEDULE: &str = "Restart named schedule";
pub const SET_VOLUME: &str = "Set volume to";
pub const ADJUST_VOLUME: &str = "Adjust volume by";
pub const TOGGLE_MUTE: &str = "Toggle mute";
pub const SET_BRIGHTNESS: &str = "Set brightness to n%";
pub const INCREASE_BRIGHTNESS: &str = "Increase brightness by n%";
pub const TOGGLE_OUTPUT: &str = "Toggle output to lights";
pub const TOGGLE_RANDOM: &str = "Toggle current playlist random";
pub const TOGGLE_LOOP: &str = "Toggle current playlist loop";
pub const SAVE_SCHEDULE: &str = "Save schedule";
pub const PRESS_BUTTON: &str = "PressButton";
pub const SET_PIXELS: &str = "Set pixels";
pub const SET_TEXT: &str = "Set current text";
pub const REFRESH_PLAYLIST: &str = "Refresh current playlist";

const COMMANDS: &[Command] = &[
    Command::new(STOP_ALL_NOW, 0),
    Command::new(STOP, 0),
    Command::new(PLAY_PLAYLIST, 1),
    Command::new(PLAY_PLAYLIST_LOOPED, 1),
    Command::new(PLAY_PLAYLIST_N_TIMES, 2),
    Command::new(STOP_PLAYLIST, 1),
    Command::new(STOP_PLAYLIST_END_OF_STEP, 1),
    Command::new(STOP_PLAYLIST_END_OF_LOOP, 1),
    Command::playing(STOP_END_OF_STEP, 0),
    Command::playing(STOP_END_OF_LOOP, 0),
    Command::playing(JUMP_TO_END, 0),
    Command::playing(PAUSE, 0),
    Command::playing(NEXT_STEP, 0),
    Command::playing(PRIOR_STEP, 0),
    Command::playing(RESTART_STEP, 0),
    Command::playing(TOGGLE_STEP_LOOP, 0),
    Command::new(PLAY_STEP_LOOPED, 2),
    Command::new(PLAY_STEP_ONCE, 2),
    Command::new(PLAY_STEP, 2),
    Command::new(PLAY_FROM_STEP, 2),
    Command::new(PLAY_FROM_STEP_LOOPED, 2),
    Command::new(PLAY_STEP_N_TIMES, 3),
    Command::playing(JUMP_TO_STEP, 1),
    Command::playing(JUMP_TO_STEP_AT_END, 1),
    Command::playing(JUMP_TO_RANDOM, 0),
    Command::new(JUMP_TO_RANDOM_IN, 1),
    Command::new(ENQUEUE_STEP, 2),
    Command::new(CLEAR_QUEUE, 0),
    Command::playing(ADD_MINUTES, 1),
    Command::new(RESTART_SCHEDULE, 1),
    Command::new(SET_VOLUME, 1),
    Command::new(ADJUST_VOLUME, 1),
    Command::new(TOGGLE_MUTE, 0),
    Command::new(SET_BRIGHTNESS, 1),
    Command::new(INCREASE_BRIGHTNESS, 1),
    Command::new(TOGGLE_OUTPUT, 0),
    Command::playing(TOGGLE_RANDOM, 0),
    Command::playing(TOGGLE_LOOP, 0),
    Command::new(SAVE_SCHEDULE, 0),
    Command::new(PRESS_BUTTON, 1),
    Command::new(SET_PIXELS, 2).with_optional(1),
    Command::new(SET_TEXT, 3),
    Command::playing(REFRESH_PLAYLIST, 0),
];

/// Registry of the commands the schedule manager understands
pub struct CommandManager {
    commands: &'static [Command],
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandManager {
    pub fn new() -> Self {
        Self { commands: COMMANDS }
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        let name = name.trim();
        self.commands
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn commands(&self) -> &[Command] {
        self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let commands = CommandManager::new();
        assert_eq!(commands.get("stop ALL now").unwrap().name, STOP_ALL_NOW);
        assert!(commands.get("Dance").is_none());
    }

    #[test]
    fn test_names_are_unique() {
        let commands = CommandManager::new();
        for command in commands.commands() {
            assert_eq!(commands.get(command.name).unwrap(), command);
        }
    }

    #[test]
    fn test_split_keeps_trailing_commas() {
        let command = CommandManager::new().get(PLAY_STEP_N_TIMES).copied().unwrap();
        assert_eq!(command.split("Christmas,Intro,3").unwrap(), vec!["Christmas", "Intro", "3"]);

        let command = CommandManager::new().get(ENQUEUE_STEP).copied().unwrap();
        assert_eq!(
            command.split("Christmas,Carols, part 2").unwrap(),
            vec!["Christmas", "Carols, part 2"]
        );
    }

    #[test]
    fn test_split_rejects_missing_parameters() {
        let command = CommandManager::new().get(ENQUEUE_STEP).copied().unwrap();
        assert!(matches!(
            command.split("Christmas"),
            Err(CommandError::WrongParameterCount { expected: 2, .. })
        ));
        assert!(command.split("").is_err());
    }

    #[test]
    fn test_split_fills_optional_parameters() {
        let command = CommandManager::new().get(SET_PIXELS).copied().unwrap();
        assert_eq!(command.split("12").unwrap(), vec!["12", ""]);
        assert_eq!(command.split("12,max").unwrap(), vec!["12", "max"]);
        assert!(command.split(" ").is_err());
    }

    #[test]
    fn test_result_from_error() {
        let result: CommandResult = Err(CommandError::UnknownCommand).into();
        assert!(!result.success);
        assert_eq!(result.message, "Unknown command.");
    }
}
