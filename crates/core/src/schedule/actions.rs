use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::command::{self as cmd, Command, CommandError, CommandResult};
use super::schedule_manager::{Foreground, PlayRequest, ScheduleManager, FAST_START_FRAME_MS};
use crate::frame::{BlendMode, PixelData};

type ActionResult = Result<Option<u64>, CommandError>;

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T, CommandError> {
    value
        .trim()
        .parse()
        .map_err(|_| CommandError::InvalidParameter(value.to_string()))
}

impl ScheduleManager {
    /// Run a named command. Failures come back as an unsuccessful result
    /// with a message; changes take effect on the next arbitration pass.
    pub fn action(&mut self, command: &str, parameters: &str, data: &str) -> CommandResult {
        let result: CommandResult = self.dispatch(command, parameters, data, true).into();
        if !result.success {
            log::warn!("Command '{}' ({}) failed: {}", command, parameters, result.message);
        }

        if self.immediate.as_ref().is_some_and(|p| !p.is_running()) {
            self.immediate = None;
        }
        result
    }

    fn dispatch(&mut self, name: &str, parameters: &str, data: &str, allow_buttons: bool) -> ActionResult {
        let command: Command = *self.commands.get(name).ok_or(CommandError::UnknownCommand)?;
        let values = command.split(parameters)?;
        log::debug!("Running command '{}' with {:?}", command.name, values);

        if command.requires_playlist && self.running_playlist().is_none() {
            return Err(CommandError::NothingPlaying);
        }

        match command.name {
            cmd::STOP_ALL_NOW => {
                self.stop_all();
                Ok(None)
            }
            cmd::STOP => {
                self.stop_foreground();
                Ok(None)
            }
            cmd::PLAY_PLAYLIST => self.play(values[0], PlayRequest::default()),
            cmd::PLAY_PLAYLIST_LOOPED => self.play(
                values[0],
                PlayRequest {
                    looping: true,
                    ..PlayRequest::default()
                },
            ),
            cmd::PLAY_PLAYLIST_N_TIMES => {
                let times = parse_number(values[1])?;
                self.play(
                    values[0],
                    PlayRequest {
                        looping: true,
                        loops: Some(times),
                        ..PlayRequest::default()
                    },
                )
            }
            cmd::STOP_PLAYLIST | cmd::STOP_PLAYLIST_END_OF_STEP => {
                let id = self.playlist_id(values[0])?;
                self.stop_playlist(id, command.name == cmd::STOP_PLAYLIST_END_OF_STEP);
                Ok(None)
            }
            cmd::STOP_PLAYLIST_END_OF_LOOP => {
                let id = self.playlist_id(values[0])?;
                for playlist in self.playing_copies_mut(id) {
                    playlist.stop_at_end_of_this_loop();
                }
                Ok(None)
            }
            cmd::STOP_END_OF_STEP => self.with_running(|p| p.stop_at_end_of_current_step()),
            cmd::STOP_END_OF_LOOP => self.with_running(|p| p.stop_at_end_of_this_loop()),
            cmd::JUMP_TO_END => {
                self.with_running(|p| p.jump_to_end_steps_at_end_of_current_step())
            }
            cmd::PAUSE => self.with_running(|p| p.pause(!p.is_paused())),
            cmd::NEXT_STEP => self.next_step(),
            cmd::PRIOR_STEP => self.with_running(|p| {
                p.jump_to_prior_step();
            }),
            cmd::RESTART_STEP => self.with_running(|p| p.restart_current_step()),
            cmd::TOGGLE_STEP_LOOP => {
                self.with_running(|p| p.set_step_looping(!p.is_step_looping()))
            }
            cmd::PLAY_STEP_LOOPED => {
                let rate = self.play(values[0], step_request(values[1]))?;
                if let Some(playlist) = self.immediate.as_mut() {
                    playlist.loop_step(values[1]);
                }
                Ok(rate)
            }
            cmd::PLAY_STEP_ONCE | cmd::PLAY_STEP => self.play(
                values[0],
                PlayRequest {
                    force_last: true,
                    ..step_request(values[1])
                },
            ),
            cmd::PLAY_FROM_STEP => self.play(values[0], step_request(values[1])),
            cmd::PLAY_FROM_STEP_LOOPED => self.play(
                values[0],
                PlayRequest {
                    looping: true,
                    ..step_request(values[1])
                },
            ),
            cmd::PLAY_STEP_N_TIMES => {
                let times = parse_number(values[2])?;
                self.play(
                    values[0],
                    PlayRequest {
                        step_loops: Some(times),
                        force_last: true,
                        ..step_request(values[1])
                    },
                )
            }
            cmd::JUMP_TO_STEP => {
                let step = values[0].trim();
                let playlist = self.running_playlist_mut().ok_or(CommandError::NothingPlaying)?;
                let name = playlist.name_no_time().to_string();
                playlist
                    .jump_to_step(step)
                    .map(Some)
                    .ok_or_else(|| CommandError::StepNotFound {
                        playlist: name,
                        step: step.to_string(),
                    })
            }
            cmd::JUMP_TO_STEP_AT_END => {
                let step = values[0].trim();
                let playlist = self.running_playlist_mut().ok_or(CommandError::NothingPlaying)?;
                if playlist.jump_to_step_at_end_of_current_step(step) {
                    Ok(None)
                } else {
                    Err(CommandError::StepNotFound {
                        playlist: playlist.name_no_time().to_string(),
                        step: step.to_string(),
                    })
                }
            }
            cmd::JUMP_TO_RANDOM => {
                let playlist = self.running_playlist_mut().ok_or(CommandError::NothingPlaying)?;
                Ok(playlist.jump_to_random_step())
            }
            cmd::JUMP_TO_RANDOM_IN => {
                let step = self
                    .playlist(values[0])
                    .ok_or_else(|| CommandError::PlayListNotFound(values[0].to_string()))?
                    .random_step()
                    .map(|s| s.name.clone())
                    .ok_or_else(|| CommandError::EmptyPlayList(values[0].to_string()))?;
                self.play(values[0], step_request(&step))
            }
            cmd::ENQUEUE_STEP => {
                self.enqueue_step(values[0].trim(), values[1].trim())?;
                Ok(None)
            }
            cmd::CLEAR_QUEUE => {
                self.clear_queue();
                Ok(None)
            }
            cmd::ADD_MINUTES => {
                let minutes = parse_number(values[0])?;
                let rs = self.running_schedule_mut().ok_or(CommandError::NoRunningSchedule)?;
                rs.schedule_mut().add_mins_to_end_time(minutes);
                Ok(None)
            }
            cmd::RESTART_SCHEDULE => {
                let name = values[0].trim();
                let rs = self
                    .running
                    .iter_mut()
                    .find(|rs| rs.schedule().name.eq_ignore_ascii_case(name))
                    .ok_or_else(|| CommandError::ScheduleNotFound(name.to_string()))?;
                log::info!("Restarting schedule {}", name);
                rs.reset();
                Ok(None)
            }
            cmd::SET_VOLUME => {
                self.set_volume(parse_number(values[0])?);
                Ok(None)
            }
            cmd::ADJUST_VOLUME => {
                self.adjust_volume_by(parse_number(values[0])?);
                Ok(None)
            }
            cmd::TOGGLE_MUTE => {
                self.toggle_mute();
                Ok(None)
            }
            cmd::SET_BRIGHTNESS => {
                self.set_brightness(parse_number(values[0])?);
                Ok(None)
            }
            cmd::INCREASE_BRIGHTNESS => {
                let delta: i32 = parse_number(values[0])?;
                self.set_brightness(self.brightness as i32 + delta);
                Ok(None)
            }
            cmd::TOGGLE_OUTPUT => {
                let report = self.set_output_to_lights(!self.output_to_lights);
                for (description, reason) in &report.failed {
                    log::warn!("Output {} did not open: {}", description, reason);
                }
                Ok(None)
            }
            cmd::TOGGLE_RANDOM => self.with_running(|p| {
                p.set_random(!p.is_random());
            }),
            cmd::TOGGLE_LOOP => self.with_running(|p| {
                p.set_looping(!p.is_looping());
            }),
            cmd::SAVE_SCHEDULE => {
                self.show_manager.save_show(&mut self.show)?;
                Ok(None)
            }
            cmd::PRESS_BUTTON => {
                if !allow_buttons {
                    return Err(CommandError::NestedButton);
                }
                let button = self
                    .show
                    .options
                    .button(values[0].trim())
                    .cloned()
                    .ok_or(CommandError::UnknownButton)?;
                log::info!("Button '{}' pressed: {}", button.label, button.command);
                self.dispatch(&button.command, &button.parameters, data, false)
            }
            cmd::SET_PIXELS => self.set_pixels(values[0], values[1], data),
            cmd::SET_TEXT => self.set_text(parameters),
            cmd::REFRESH_PLAYLIST => self.refresh_playlist(),
            _ => Err(CommandError::UnknownCommand),
        }
    }

    fn play(&mut self, playlist: &str, request: PlayRequest) -> ActionResult {
        self.play_playlist(playlist.trim(), request).map(Some)
    }

    fn playlist_id(&self, name: &str) -> Result<u32, CommandError> {
        self.playlist(name.trim())
            .map(|p| p.id())
            .ok_or_else(|| CommandError::PlayListNotFound(name.to_string()))
    }

    fn playing_copies_mut(&mut self, id: u32) -> impl Iterator<Item = &mut crate::playlist::PlayList> {
        self.immediate
            .iter_mut()
            .chain(self.running.iter_mut().map(|rs| rs.playlist_mut()))
            .filter(move |p| p.id() == id && p.is_running())
    }

    fn with_running(&mut self, f: impl FnOnce(&mut crate::playlist::PlayList)) -> ActionResult {
        let playlist = self.running_playlist_mut().ok_or(CommandError::NothingPlaying)?;
        f(playlist);
        Ok(Some(playlist.frame_ms()))
    }

    fn next_step(&mut self) -> ActionResult {
        if self.foreground() == Some(Foreground::Queue) {
            // Drop the step that was playing and start over on what is left
            if let Some(id) = self.queue.running_step().map(|s| s.id()) {
                self.queue.stop();
                self.queue.remove_step(id);
                self.queue.start(false, false, None);
            }
            return Ok(Some(self.queue.frame_ms()));
        }
        self.with_running(|p| {
            p.jump_to_next_step();
        })
    }

    fn set_pixels(&mut self, start: &str, blend: &str, data: &str) -> ActionResult {
        let start: usize = parse_number(start)?;
        if start == 0 {
            return Err(CommandError::InvalidParameter("0".to_string()));
        }
        let blend = blend.trim();
        let blend_mode = if blend.is_empty() {
            BlendMode::Overwrite
        } else {
            blend.parse().unwrap_or_else(|_| {
                log::debug!("Unknown blend mode '{}', overwriting", blend);
                BlendMode::Overwrite
            })
        };
        let payload = STANDARD.decode(data.trim())?;
        self.set_overlay(PixelData::new(start, payload, blend_mode));
        Ok(None)
    }

    /// `name,text,properties`: the text may itself contain commas
    fn set_text(&mut self, parameters: &str) -> ActionResult {
        let (name, rest) = parameters
            .split_once(',')
            .ok_or_else(|| CommandError::InvalidParameter(parameters.to_string()))?;
        let (text, properties) = rest
            .rsplit_once(',')
            .ok_or_else(|| CommandError::InvalidParameter(parameters.to_string()))?;
        let name = name.trim();

        let foreground = self
            .running_playlist_mut()
            .and_then(|p| p.running_step_mut())
            .and_then(|s| s.text_mut(name))
            .is_some();

        let item = if foreground {
            self.running_playlist_mut()
                .and_then(|p| p.running_step_mut())
                .and_then(|s| s.text_mut(name))
        } else {
            self.background
                .as_mut()
                .and_then(|p| p.running_step_mut())
                .and_then(|s| s.text_mut(name))
        };
        let item = item.ok_or_else(|| CommandError::TextNotFound(name.to_string()))?;

        item.text = text.to_string();
        if !item.apply_properties(properties) {
            return Err(CommandError::InvalidTextProperties(properties.to_string()));
        }
        Ok(None)
    }

    fn refresh_playlist(&mut self) -> ActionResult {
        match self.foreground() {
            Some(Foreground::Scheduled(index)) => {
                let name = self.running[index].playlist().name_no_time().to_string();
                let fresh = self
                    .playlist(&name)
                    .cloned()
                    .ok_or(CommandError::PlayListNotFound(name))?;
                self.running[index].refresh(&fresh);
                Ok(Some(self.running[index].playlist().frame_ms()))
            }
            Some(Foreground::Immediate) => {
                let Some(current) = self.immediate.as_ref() else {
                    return Err(CommandError::NothingPlaying);
                };
                let request = PlayRequest {
                    looping: current.is_looping(),
                    random: current.is_random(),
                    loops: current.loops_left().map(|l| l + 1),
                    step: current.running_step().map(|s| s.name.clone()),
                    ..PlayRequest::default()
                };
                let name = current.name_no_time().to_string();
                self.play_playlist(&name, request)?;
                Ok(Some(FAST_START_FRAME_MS))
            }
            _ => Err(CommandError::CannotRefresh),
        }
    }
}

fn step_request(step: &str) -> PlayRequest {
    PlayRequest {
        step: Some(step.trim().to_string()),
        ..PlayRequest::default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::output::testing::RecordingDriver;
    use crate::output::{Output, OutputConfig, OutputManager, Position};
    use crate::playlist::{PlayList, PlayListItem, PlayListStep, TextItem};
    use crate::schedule::UserButton;
    use crate::show::{Show, ShowManager};

    fn show() -> Show {
        let songs = PlayList::new("Songs")
            .with_step(PlayListStep::new("One").with_item(PlayListItem::fill(1, 1, vec![1], 1000)))
            .with_step(PlayListStep::new("Two").with_item(PlayListItem::fill(1, 1, vec![2], 1000)))
            .with_step(
                PlayListStep::new("Words")
                    .with_item(PlayListItem::Text(TextItem::new("Banner", "Matrix", "", 1000))),
            );
        let mut show = Show::default().with_playlist(songs);
        show.options.buttons.push(UserButton {
            label: "Go".to_string(),
            command: cmd::PLAY_FROM_STEP.to_string(),
            parameters: "Songs,Two".to_string(),
        });
        show
    }

    fn manager() -> ScheduleManager {
        let outputs = Arc::new(OutputManager::new());
        let (driver, _log) = RecordingDriver::new();
        outputs
            .add_output(Output::with_driver(OutputConfig::null(16), Box::new(driver)), Position::End)
            .unwrap();
        ScheduleManager::new(outputs, show(), ShowManager::new(&std::env::temp_dir()))
    }

    fn step_name(manager: &ScheduleManager) -> String {
        manager.running_playlist().unwrap().running_step().unwrap().name.clone()
    }

    #[test]
    fn test_unknown_command() {
        let result = manager().action("Dance", "", "");
        assert!(!result.success);
        assert_eq!(result.message, "Unknown command.");
    }

    #[test]
    fn test_play_reports_fast_rate() {
        let mut manager = manager();
        let result = manager.action(cmd::PLAY_PLAYLIST, "Songs", "");
        assert!(result.success);
        assert_eq!(result.frame_ms, Some(FAST_START_FRAME_MS));
        assert_eq!(step_name(&manager), "One");
    }

    #[test]
    fn test_missing_playlist_is_reported() {
        let result = manager().action(cmd::PLAY_PLAYLIST, "Nope", "");
        assert!(!result.success);
        assert_eq!(result.message, "Playlist 'Nope' not found.");
    }

    #[test]
    fn test_transport_needs_a_playlist() {
        let result = manager().action(cmd::NEXT_STEP, "", "");
        assert_eq!(result.message, "No playlist currently playing.");
    }

    #[test]
    fn test_step_navigation() {
        let mut manager = manager();
        manager.action(cmd::PLAY_FROM_STEP, "Songs,Two", "");
        assert_eq!(step_name(&manager), "Two");

        assert!(manager.action(cmd::PRIOR_STEP, "", "").success);
        assert_eq!(step_name(&manager), "One");
        assert!(manager.action(cmd::JUMP_TO_STEP, "Words", "").success);
        assert_eq!(step_name(&manager), "Words");
        assert!(!manager.action(cmd::JUMP_TO_STEP, "Missing", "").success);
    }

    #[test]
    fn test_stop_drops_immediate() {
        let mut manager = manager();
        manager.action(cmd::PLAY_PLAYLIST, "Songs", "");
        assert!(manager.action(cmd::STOP, "", "").success);
        assert!(manager.immediate().is_none());
    }

    #[test]
    fn test_pause_toggles() {
        let mut manager = manager();
        manager.action(cmd::PLAY_PLAYLIST, "Songs", "");
        manager.action(cmd::PAUSE, "", "");
        assert!(manager.running_playlist().unwrap().is_paused());
        manager.action(cmd::PAUSE, "", "");
        assert!(!manager.running_playlist().unwrap().is_paused());
    }

    #[test]
    fn test_button_runs_bound_command() {
        let mut manager = manager();
        assert!(manager.action(cmd::PRESS_BUTTON, "go", "").success);
        assert_eq!(step_name(&manager), "Two");

        let result = manager.action(cmd::PRESS_BUTTON, "Missing", "");
        assert_eq!(result.message, "Unknown button.");
    }

    #[test]
    fn test_set_pixels_adds_overlay() {
        let mut manager = manager();
        // "AQID" is [1, 2, 3]
        assert!(manager.action(cmd::SET_PIXELS, "5,max", "AQID").success);
        let overlay = &manager.overlays()[0];
        assert_eq!(overlay.start_channel(), 5);
        assert_eq!(overlay.data(), &[1, 2, 3]);
        assert_eq!(overlay.blend_mode(), BlendMode::Max);

        assert!(manager.action(cmd::SET_PIXELS, "5,bogus", "").success);
        assert!(manager.overlays().is_empty());
        assert!(!manager.action(cmd::SET_PIXELS, "5,max", "!!!").success);

        // Blend mode may be left off
        assert!(manager.action(cmd::SET_PIXELS, "9", "AQID").success);
        let overlay = &manager.overlays()[0];
        assert_eq!(overlay.start_channel(), 9);
        assert_eq!(overlay.blend_mode(), BlendMode::Overwrite);
        assert!(!manager.action(cmd::SET_PIXELS, "", "AQID").success);
    }

    #[test]
    fn test_set_text_on_running_step() {
        let mut manager = manager();
        manager.action(cmd::PLAY_FROM_STEP, "Songs,Words", "");

        let result = manager.action(cmd::SET_TEXT, "Banner,Hello, world,colour=#FF0000|x=2", "");
        assert!(result.success, "{}", result.message);

        let step = manager.running_playlist().unwrap().running_step().unwrap();
        let PlayListItem::Text(text) = &step.items[0] else {
            panic!("expected text item");
        };
        assert_eq!(text.text, "Hello, world");
        assert_eq!(text.x, 2);

        let missing = manager.action(cmd::SET_TEXT, "Other,Hi,x=1", "");
        assert!(!missing.success);
    }

    #[test]
    fn test_volume_and_brightness_clamp() {
        let mut manager = manager();
        manager.action(cmd::SET_VOLUME, "150", "");
        assert_eq!(manager.volume(), 100);
        manager.action(cmd::ADJUST_VOLUME, "-30", "");
        assert_eq!(manager.volume(), 70);

        manager.action(cmd::SET_BRIGHTNESS, "40", "");
        manager.action(cmd::INCREASE_BRIGHTNESS, "10", "");
        assert_eq!(manager.brightness(), 50);
        assert!(!manager.action(cmd::SET_BRIGHTNESS, "bright", "").success);
    }

    #[test]
    fn test_refresh_requires_schedule_or_immediate() {
        let mut manager = manager();
        manager.enqueue_step("Songs", "One").unwrap();
        manager.check_schedule_at(
            chrono::NaiveDate::from_ymd_opt(2024, 12, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        );
        let result = manager.action(cmd::REFRESH_PLAYLIST, "", "");
        assert_eq!(
            result.message,
            "Only scheduled and immediately played playlists can be restarted."
        );
    }

    #[test]
    fn test_enqueue_and_clear() {
        let mut manager = manager();
        assert!(manager.action(cmd::ENQUEUE_STEP, "Songs,One", "").success);
        assert!(manager.action(cmd::ENQUEUE_STEP, "Songs,Two", "").success);
        assert_eq!(manager.queue().steps().len(), 2);
        assert!(manager.action(cmd::CLEAR_QUEUE, "", "").success);
        assert!(manager.queue().steps().is_empty());
    }
}
