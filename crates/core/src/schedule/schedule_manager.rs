use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};

use super::command::{CommandError, CommandManager};
use super::running_schedule::RunningSchedule;
use super::ScheduleOptions;
use crate::frame::{BrightnessLut, PixelData};
use crate::output::{OutputManager, StartReport};
use crate::playlist::{PlayList, PlayListStep, RenderContext, DEFAULT_FRAME_MS};
use crate::show::{Show, ShowManager};

/// Frame interval used straight after an operator starts something
pub const FAST_START_FRAME_MS: u64 = 25;
pub const QUEUE_PLAYLIST_NAME: &str = "Queued Songs";

/// Which layer owns the foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Foreground {
    /// Played on operator request
    Immediate,
    Queue,
    /// Index into the running schedules
    Scheduled(usize),
}

/// How an operator wants a playlist played
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayRequest {
    pub looping: bool,
    pub random: bool,
    /// Total passes when looping
    pub loops: Option<u32>,
    pub step: Option<String>,
    /// Times to play the starting step
    pub step_loops: Option<u32>,
    /// Stop once the starting step has played
    pub force_last: bool,
}

/// Owns the playlists, decides what plays and composes each frame into the
/// channel buffer.
pub struct ScheduleManager {
    pub(super) output_manager: Arc<OutputManager>,
    pub(super) show_manager: ShowManager,
    pub(super) show: Show,
    pub(super) commands: CommandManager,
    pub(super) running: Vec<RunningSchedule>,
    pub(super) immediate: Option<PlayList>,
    pub(super) queue: PlayList,
    pub(super) background: Option<PlayList>,
    pub(super) overlays: Vec<PixelData>,
    buffer: Vec<u8>,
    pub(super) brightness: u8,
    lut: BrightnessLut,
    pub(super) volume: u8,
    pub(super) saved_volume: Option<u8>,
    pub(super) output_to_lights: bool,
    started: Instant,
}

impl ScheduleManager {
    /// Load the outputs and schedule of a show directory
    pub fn open(show_manager: ShowManager) -> Self {
        let output_manager = Arc::new(show_manager.load_outputs());
        let show = show_manager.load_show();
        Self::new(output_manager, show, show_manager)
    }

    pub fn new(output_manager: Arc<OutputManager>, show: Show, show_manager: ShowManager) -> Self {
        let options = &show.options;
        output_manager.set_sync_enabled(options.sync);
        if options.sync_universe != 0 {
            output_manager.set_sync_universe(options.sync_universe);
        }

        let buffer = vec![0; output_manager.total_channels()];
        log::info!(
            "Schedule manager ready with {} playlists over {} channels",
            show.playlists.len(),
            buffer.len()
        );

        let mut manager = Self {
            output_manager,
            show_manager,
            show,
            commands: CommandManager::new(),
            running: Vec::new(),
            immediate: None,
            queue: PlayList::new(QUEUE_PLAYLIST_NAME),
            background: None,
            overlays: Vec::new(),
            buffer,
            brightness: 100,
            lut: BrightnessLut::new(),
            volume: 100,
            saved_volume: None,
            output_to_lights: false,
            started: Instant::now(),
        };
        manager.manage_background();
        manager
    }

    pub fn output_manager(&self) -> &Arc<OutputManager> {
        &self.output_manager
    }

    pub fn show(&self) -> &Show {
        &self.show
    }

    pub fn options(&self) -> &ScheduleOptions {
        &self.show.options
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn playlists(&self) -> &[PlayList] {
        &self.show.playlists
    }

    pub fn playlist(&self, name: &str) -> Option<&PlayList> {
        self.show.playlist(name)
    }

    pub fn running_schedules(&self) -> &[RunningSchedule] {
        &self.running
    }

    pub fn queue(&self) -> &PlayList {
        &self.queue
    }

    pub fn immediate(&self) -> Option<&PlayList> {
        self.immediate.as_ref()
    }

    pub fn background(&self) -> Option<&PlayList> {
        self.background.as_ref()
    }

    pub fn overlays(&self) -> &[PixelData] {
        &self.overlays
    }

    /// Patch applied over every frame, replacing any patch at the same
    /// start channel. An empty payload removes the patch.
    pub fn set_overlay(&mut self, patch: PixelData) {
        let start = patch.start_channel();
        let existing = self.overlays.iter().position(|o| o.start_channel() == start);

        match (existing, patch.data().is_empty()) {
            (Some(index), true) => {
                self.overlays.remove(index);
            }
            (Some(index), false) => self.overlays[index] = patch,
            (None, true) => {}
            (None, false) => self.overlays.push(patch),
        }
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn set_brightness(&mut self, brightness: i32) {
        self.brightness = brightness.clamp(0, 100) as u8;
    }

    pub fn brightness_lut(&self) -> &BrightnessLut {
        &self.lut
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: i32) {
        self.volume = volume.clamp(0, 100) as u8;
        self.saved_volume = None;
    }

    pub fn adjust_volume_by(&mut self, delta: i32) {
        self.set_volume(self.volume as i32 + delta);
    }

    pub fn toggle_mute(&mut self) {
        match self.saved_volume.take() {
            Some(volume) => self.volume = volume,
            None => {
                self.saved_volume = Some(self.volume);
                self.volume = 0;
            }
        }
    }

    pub fn is_output_to_lights(&self) -> bool {
        self.output_to_lights
    }

    /// Open or close every output along with the virtual matrices
    pub fn set_output_to_lights(&mut self, on: bool) -> StartReport {
        let mut report = StartReport::default();
        if on {
            report = self.output_manager.start_output();
            self.output_to_lights = self.output_manager.is_outputting();
            for matrix in &mut self.show.options.virtual_matrices {
                matrix.start();
            }
        } else {
            self.output_manager.stop_output();
            self.output_to_lights = self.output_manager.is_outputting();
            for matrix in &mut self.show.options.virtual_matrices {
                matrix.stop();
            }
        }
        log::info!("Output to lights {}", if self.output_to_lights { "on" } else { "off" });
        self.manage_background();
        report
    }

    /// Restart the background from a fresh copy of its playlist
    fn manage_background(&mut self) {
        if let Some(background) = self.background.as_mut() {
            background.stop();
        }
        self.background = self
            .show
            .background_playlist
            .as_deref()
            .and_then(|name| self.show.playlist(name))
            .cloned();
    }

    /// Milliseconds since the manager was created
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    // Foreground resolution

    pub fn foreground(&self) -> Option<Foreground> {
        if self.immediate.as_ref().is_some_and(|p| p.is_running()) {
            return Some(Foreground::Immediate);
        }
        if !self.queue.steps().is_empty() && self.queue.is_running() {
            return Some(Foreground::Queue);
        }
        self.running_schedule_index().map(Foreground::Scheduled)
    }

    fn running_schedule_index(&self) -> Option<usize> {
        if self.immediate.as_ref().is_some_and(|p| p.is_running()) || self.queue.is_running() {
            return None;
        }
        self.running.iter().position(|rs| rs.playlist().is_running())
    }

    /// The schedule owning the foreground, if a schedule does
    pub fn running_schedule(&self) -> Option<&RunningSchedule> {
        self.running_schedule_index().map(|i| &self.running[i])
    }

    pub(super) fn running_schedule_mut(&mut self) -> Option<&mut RunningSchedule> {
        self.running_schedule_index().map(|i| &mut self.running[i])
    }

    pub fn running_playlist(&self) -> Option<&PlayList> {
        match self.foreground()? {
            Foreground::Immediate => self.immediate.as_ref(),
            Foreground::Queue => Some(&self.queue),
            Foreground::Scheduled(i) => Some(self.running[i].playlist()),
        }
    }

    pub(super) fn running_playlist_mut(&mut self) -> Option<&mut PlayList> {
        match self.foreground()? {
            Foreground::Immediate => self.immediate.as_mut(),
            Foreground::Queue => Some(&mut self.queue),
            Foreground::Scheduled(i) => Some(self.running[i].playlist_mut()),
        }
    }

    pub fn is_something_playing(&self) -> bool {
        self.running_playlist()
            .is_some_and(|p| p.running_step().is_some())
    }

    // Arbitration

    pub fn check_schedule(&mut self) -> u64 {
        self.check_schedule_at(Local::now().naive_local())
    }

    /// Bring the running schedules in line with `now` and settle which
    /// layer owns the foreground. Returns the frame interval it wants.
    pub fn check_schedule_at(&mut self, now: NaiveDateTime) -> u64 {
        log::debug!("Checking the schedule at {}", now);

        for playlist in &self.show.playlists {
            for schedule in playlist.schedules() {
                if !schedule.check_active(now)
                    || self.running.iter().any(|rs| rs.schedule().id() == schedule.id())
                {
                    continue;
                }
                log::info!(
                    "Scheduler starting suspended playlist {} due to schedule {}",
                    playlist.name_no_time(),
                    schedule.name
                );
                self.running.push(RunningSchedule::new(playlist, schedule));
            }
        }

        self.running.retain_mut(|rs| {
            if rs.schedule().check_active(now) {
                return true;
            }
            if !rs.playlist().is_running() {
                log::info!(
                    "Scheduler removing playlist {} due to schedule {}",
                    rs.playlist().name_no_time(),
                    rs.schedule().name
                );
                return false;
            }
            if !rs.playlist().is_finishing_up() {
                log::info!(
                    "Scheduler telling playlist {} due to schedule {} it is time to finish up",
                    rs.playlist().name_no_time(),
                    rs.schedule().name
                );
                rs.playlist_mut().jump_to_end_steps_at_end_of_current_step();
            }
            true
        });

        // Stable, so equal priorities keep their discovery order
        self.running.sort_by(|a, b| b.priority().cmp(&a.priority()));

        if self.immediate.as_ref().is_some_and(|p| !p.is_running()) {
            self.immediate = None;
        }

        if self.immediate.is_some() {
            self.suspend_schedules("so immediate can play");
            if !self.queue.steps().is_empty() && self.queue.is_running() && !self.queue.is_suspended() {
                log::info!("Suspending queued playlist so immediate can play");
                self.queue.suspend(true);
            }
            return self
                .immediate
                .as_ref()
                .map_or(DEFAULT_FRAME_MS, |p| p.frame_ms());
        }

        if !self.queue.steps().is_empty() {
            self.suspend_schedules("so queued songs can play");
            if !self.queue.is_running() {
                self.queue.start(false, false, None);
            } else if self.queue.is_suspended() {
                self.queue.suspend(false);
            }
            return self.queue.frame_ms();
        }

        let mut frame_ms = DEFAULT_FRAME_MS;
        let mut owner_found = false;
        for rs in &mut self.running {
            if !rs.playlist().is_running() {
                continue;
            }
            if !owner_found {
                owner_found = true;
                if rs.playlist().is_suspended() {
                    log::info!(
                        "Unsuspending playlist {} due to schedule {}",
                        rs.playlist().name_no_time(),
                        rs.schedule().name
                    );
                }
                frame_ms = rs.playlist_mut().suspend(false);
            } else if !rs.playlist().is_suspended() {
                log::info!(
                    "Suspending playlist {} due to schedule {}",
                    rs.playlist().name_no_time(),
                    rs.schedule().name
                );
                rs.playlist_mut().suspend(true);
            }
        }

        log::debug!("Active scheduled playlists: {}", self.running.len());
        frame_ms
    }

    fn suspend_schedules(&mut self, reason: &str) {
        for rs in &mut self.running {
            if rs.playlist().is_running() && !rs.playlist().is_suspended() {
                log::info!(
                    "Suspending playlist {} due to schedule {} {}",
                    rs.playlist().name_no_time(),
                    rs.schedule().name,
                    reason
                );
                rs.playlist_mut().suspend(true);
            }
        }
    }

    // Operator playback

    pub fn play_playlist(&mut self, name: &str, request: PlayRequest) -> Result<u64, CommandError> {
        let mut playlist = self
            .show
            .playlist(name)
            .cloned()
            .ok_or_else(|| CommandError::PlayListNotFound(name.to_string()))?;
        log::info!("Playing playlist {}", playlist.name_no_time());

        if let Some(step) = request.step.as_deref() {
            if playlist.get_step(step).is_none() {
                return Err(CommandError::StepNotFound {
                    playlist: playlist.name_no_time().to_string(),
                    step: step.to_string(),
                });
            }
        }

        if let Some(mut previous) = self.immediate.take() {
            previous.stop();
        }
        if self.queue.is_running() && !self.queue.is_suspended() {
            log::info!("Suspending queued playlist so immediate can play");
            self.queue.suspend(true);
        }
        self.suspend_schedules("so immediate can play");

        if !playlist.start(request.looping, request.random, request.loops) {
            return Err(CommandError::EmptyPlayList(playlist.name_no_time().to_string()));
        }
        if let Some(step) = request.step.as_deref() {
            playlist.jump_to_step(step);
            if let Some(running) = playlist.running_step_mut() {
                running.set_loops(request.step_loops.unwrap_or(1));
            }
        }
        if request.force_last {
            playlist.stop_at_end_of_current_step();
        }

        self.immediate = Some(playlist);
        Ok(FAST_START_FRAME_MS)
    }

    pub fn stop_all(&mut self) {
        log::info!("Stopping all playlists");
        if let Some(mut immediate) = self.immediate.take() {
            immediate.stop();
        }
        self.queue.remove_all_steps();
        for rs in &mut self.running {
            rs.playlist_mut().stop();
        }
    }

    /// Stop every running copy of the playlist with this id
    pub fn stop_playlist(&mut self, id: u32, at_end_of_step: bool) {
        let stop = |playlist: &mut PlayList| {
            if at_end_of_step {
                playlist.stop_at_end_of_current_step();
            } else {
                playlist.stop();
            }
        };

        if let Some(immediate) = self.immediate.as_mut().filter(|p| p.id() == id) {
            stop(immediate);
            if !at_end_of_step {
                self.immediate = None;
            }
        }

        if self.queue.id() == id && self.queue.is_running() {
            stop(&mut self.queue);
            if !at_end_of_step {
                self.queue.remove_all_steps();
            }
        }

        for rs in &mut self.running {
            if rs.playlist().id() == id && rs.playlist().is_running() {
                stop(rs.playlist_mut());
            }
        }
    }

    /// Stop whatever owns the foreground
    pub fn stop_foreground(&mut self) {
        match self.foreground() {
            Some(Foreground::Immediate) => {
                if let Some(mut immediate) = self.immediate.take() {
                    immediate.stop();
                }
            }
            Some(Foreground::Queue) => self.queue.remove_all_steps(),
            Some(Foreground::Scheduled(i)) => self.running[i].playlist_mut().stop(),
            None => {}
        }
    }

    /// Queue a copy of a step unless it is already last in the queue
    pub fn enqueue_step(&mut self, playlist: &str, step: &str) -> Result<(), CommandError> {
        let source = self
            .show
            .playlist(playlist)
            .ok_or_else(|| CommandError::PlayListNotFound(playlist.to_string()))?;
        let step: PlayListStep = source
            .get_step(step)
            .cloned()
            .ok_or_else(|| CommandError::StepNotFound {
                playlist: playlist.to_string(),
                step: step.to_string(),
            })?;

        if self.queue.steps().last().is_some_and(|last| last.id() == step.id()) {
            log::debug!("Step {} is already at the end of the queue", step.name);
            return Ok(());
        }

        log::info!("Enqueued step {} from playlist {}", step.name, playlist);
        self.queue.add_step(step);
        if !self.queue.is_running() {
            self.queue.start_suspended(false, false, None);
        }
        Ok(())
    }

    pub fn clear_queue(&mut self) {
        log::info!("Clearing the playlist queue");
        self.queue.remove_all_steps();
    }

    // Frame composition

    /// Compose and send one frame. With `output_frame` false the playlists
    /// advance but nothing is cleared or sent.
    pub fn frame(&mut self, output_frame: bool) {
        let foreground = self.foreground();
        let msec = self.elapsed_ms();

        let Self {
            output_manager,
            show,
            running,
            immediate,
            queue,
            background,
            overlays,
            buffer,
            brightness,
            lut,
            ..
        } = self;
        let ctx = RenderContext {
            matrices: &show.options.matrices,
            output: output_frame,
        };

        let Some(foreground) = foreground else {
            if show.options.send_off_when_idle && output_frame {
                buffer.fill(0);
                frame_background(background, buffer, &ctx);
                for process in &show.output_processes {
                    process.apply(buffer);
                }
                lut.apply(*brightness, buffer);
                output_manager.commit_frame(msec, buffer, true);
            }
            return;
        };

        if output_frame {
            buffer.fill(0);
        }

        let done = match foreground {
            Foreground::Immediate => immediate
                .as_mut()
                .is_none_or(|p| p.frame(buffer, &ctx)),
            Foreground::Queue => frame_queue(queue, buffer, &ctx),
            Foreground::Scheduled(i) => running[i].playlist_mut().frame(buffer, &ctx),
        };

        // Drawn after the foreground so it wins on shared channels
        frame_background(background, buffer, &ctx);

        if output_frame {
            for overlay in overlays.iter() {
                overlay.apply(buffer);
            }
            for process in &show.output_processes {
                process.apply(buffer);
            }
            for matrix in &show.options.virtual_matrices {
                matrix.frame(buffer);
            }
            // Brightness is baked into the committed bytes
            lut.apply(*brightness, buffer);
            output_manager.commit_frame(msec, buffer, false);
        }

        if done {
            log::info!("Foreground playlist finished");
            match foreground {
                Foreground::Immediate => {
                    if let Some(mut immediate) = immediate.take() {
                        immediate.stop();
                    }
                }
                Foreground::Queue => queue.remove_all_steps(),
                Foreground::Scheduled(i) => running[i].playlist_mut().stop(),
            }
        }
    }
}

fn frame_background(background: &mut Option<PlayList>, buffer: &mut [u8], ctx: &RenderContext<'_>) {
    let Some(background) = background.as_mut() else {
        return;
    };
    if !background.is_running() {
        background.start(true, false, None);
    }
    background.frame(buffer, ctx);
}

/// Frame the queue, dropping each step once it has played
fn frame_queue(queue: &mut PlayList, buffer: &mut [u8], ctx: &RenderContext<'_>) -> bool {
    let before = queue.running_step().map(|s| s.id());
    let done = queue.frame(buffer, ctx);
    if let Some(id) = before {
        if done || queue.running_step().map(|s| s.id()) != Some(id) {
            queue.remove_step(id);
        }
    }
    done
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::testing::{DriverCall, DriverLog, RecordingDriver};
    use crate::output::{Output, OutputConfig, Position};
    use crate::playlist::PlayListItem;
    use crate::schedule::{command, Schedule};
    use chrono::NaiveTime;

    fn at(time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("2024-12-02 {}", time), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn hm(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    /// One step playlist that fills channel 1 with `value` for a long time
    fn solid(name: &str, value: u8) -> PlayList {
        PlayList::new(name).with_step(
            PlayListStep::new(&format!("{} step", name)).with_item(PlayListItem::fill(1, 4, vec![value], 60_000)),
        )
    }

    fn recorded(show: Show) -> (ScheduleManager, DriverLog) {
        let outputs = Arc::new(OutputManager::new());
        let (driver, log) = RecordingDriver::new();
        outputs
            .add_output(Output::with_driver(OutputConfig::null(8), Box::new(driver)), Position::End)
            .unwrap();
        let manager = ScheduleManager::new(outputs, show, ShowManager::new(&std::env::temp_dir()));
        (manager, log)
    }

    fn manager(show: Show) -> ScheduleManager {
        recorded(show).0
    }

    fn ambient_show(send_off_when_idle: bool) -> Show {
        let mut show = Show::default().with_playlist(
            PlayList::new("Ambient")
                .with_step(PlayListStep::new("Glow").with_item(PlayListItem::fill(4, 1, vec![7], 60_000))),
        );
        show.background_playlist = Some("Ambient".to_string());
        show.options.send_off_when_idle = send_off_when_idle;
        show
    }

    #[test]
    fn test_buffer_sized_to_channels() {
        let manager = manager(Show::default());
        assert_eq!(manager.buffer().len(), 8);
        assert!(manager.foreground().is_none());
    }

    #[test]
    fn test_schedule_starts_and_owns_foreground() {
        let show = Show::default()
            .with_playlist(solid("Evening", 9).with_schedule(Schedule::new("Nightly", hm(17), hm(22))));
        let mut manager = manager(show);

        assert_eq!(manager.check_schedule_at(at("16:00:00")), DEFAULT_FRAME_MS);
        assert!(manager.running_schedules().is_empty());

        manager.check_schedule_at(at("18:00:00"));
        assert_eq!(manager.foreground(), Some(Foreground::Scheduled(0)));
        assert!(!manager.running_playlist().unwrap().is_suspended());

        manager.frame(true);
        assert_eq!(&manager.buffer()[..4], &[9, 9, 9, 9]);
    }

    #[test]
    fn test_expired_schedule_finishes_up_then_goes() {
        let show = Show::default()
            .with_playlist(solid("Evening", 9).with_schedule(Schedule::new("Nightly", hm(17), hm(22))));
        let mut manager = manager(show);

        manager.check_schedule_at(at("21:00:00"));
        manager.check_schedule_at(at("22:30:00"));
        assert!(manager.running_schedules()[0].playlist().is_finishing_up());

        manager.running[0].playlist_mut().stop();
        manager.check_schedule_at(at("22:31:00"));
        assert!(manager.running_schedules().is_empty());
    }

    #[test]
    fn test_higher_priority_schedule_wins() {
        let show = Show::default()
            .with_playlist(solid("Low", 1).with_schedule(Schedule::new("Low", hm(17), hm(22)).with_priority(1)))
            .with_playlist(solid("High", 2).with_schedule(Schedule::new("High", hm(17), hm(22)).with_priority(5)));
        let mut manager = manager(show);

        manager.check_schedule_at(at("18:00:00"));
        assert_eq!(manager.running_playlist().unwrap().name_no_time(), "High");
        assert!(manager.running_schedules()[1].playlist().is_suspended());
    }

    #[test]
    fn test_immediate_play_replaces_previous() {
        let show = Show::default().with_playlist(solid("A", 1)).with_playlist(solid("B", 2));
        let mut manager = manager(show);

        assert_eq!(
            manager.play_playlist("a", PlayRequest::default()).unwrap(),
            FAST_START_FRAME_MS
        );
        manager.play_playlist("B", PlayRequest::default()).unwrap();
        assert_eq!(manager.running_playlist().unwrap().name_no_time(), "B");
        assert!(matches!(
            manager.play_playlist("C", PlayRequest::default()),
            Err(CommandError::PlayListNotFound(_))
        ));
    }

    #[test]
    fn test_queue_plays_and_consumes_steps() {
        let show = Show::default().with_playlist(
            PlayList::new("Songs")
                .with_step(PlayListStep::new("One").with_item(PlayListItem::fill(1, 1, vec![1], 50)))
                .with_step(PlayListStep::new("Two").with_item(PlayListItem::fill(1, 1, vec![2], 50))),
        );
        let mut manager = manager(show);

        manager.enqueue_step("Songs", "One").unwrap();
        manager.enqueue_step("Songs", "One").unwrap();
        manager.enqueue_step("Songs", "Two").unwrap();
        assert_eq!(manager.queue().steps().len(), 2);

        manager.check_schedule_at(at("12:00:00"));
        assert_eq!(manager.foreground(), Some(Foreground::Queue));

        manager.frame(true);
        assert_eq!(manager.buffer()[0], 1);
        assert_eq!(manager.queue().steps().len(), 1);

        manager.frame(true);
        assert_eq!(manager.buffer()[0], 2);
        assert!(manager.queue().steps().is_empty());
        assert!(manager.foreground().is_none());
    }

    #[test]
    fn test_background_drawn_over_foreground() {
        let mut show = Show::default().with_playlist(solid("Main", 5)).with_playlist(
            PlayList::new("Ambient")
                .with_step(PlayListStep::new("Glow").with_item(PlayListItem::fill(4, 1, vec![7], 60_000))),
        );
        show.background_playlist = Some("Ambient".to_string());
        let mut manager = manager(show);

        manager.play_playlist("Main", PlayRequest::default()).unwrap();
        manager.frame(true);
        assert_eq!(&manager.buffer()[..5], &[5, 5, 5, 7, 0]);
    }

    #[test]
    fn test_overlay_replace_and_remove() {
        let mut manager = manager(Show::default());
        manager.set_overlay(PixelData::new(3, vec![1], Default::default()));
        manager.set_overlay(PixelData::new(3, vec![2, 2], Default::default()));
        assert_eq!(manager.overlays().len(), 1);
        assert_eq!(manager.overlays()[0].data(), &[2, 2]);

        manager.set_overlay(PixelData::new(3, Vec::new(), Default::default()));
        assert!(manager.overlays().is_empty());
    }

    #[test]
    fn test_mute_restores_volume() {
        let mut manager = manager(Show::default());
        manager.set_volume(70);
        manager.toggle_mute();
        assert_eq!(manager.volume(), 0);
        manager.toggle_mute();
        assert_eq!(manager.volume(), 70);
        manager.adjust_volume_by(50);
        assert_eq!(manager.volume(), 100);
    }

    #[test]
    fn test_stop_all() {
        let show = Show::default()
            .with_playlist(solid("Evening", 9).with_schedule(Schedule::new("Nightly", hm(17), hm(22))));
        let mut manager = manager(show);
        manager.check_schedule_at(at("18:00:00"));
        manager.play_playlist("Evening", PlayRequest::default()).unwrap();

        manager.stop_all();
        assert!(manager.immediate().is_none());
        assert!(manager.foreground().is_none());
    }

    #[test]
    fn test_outputs_stay_closed_until_asked() {
        let (mut manager, log) = recorded(ambient_show(true));
        assert!(!manager.output_manager().is_outputting());
        assert!(log.calls().is_empty());

        manager.set_output_to_lights(true);
        assert!(manager.is_output_to_lights());
        assert!(manager.output_manager().is_outputting());

        // A second open finds nothing left to open but the flag still follows the outputs
        assert!(manager.set_output_to_lights(true).failed.is_empty());
        assert!(manager.is_output_to_lights());

        assert!(manager.action(command::TOGGLE_OUTPUT, "", "").success);
        assert!(!manager.is_output_to_lights());
        assert!(!manager.output_manager().is_outputting());

        assert!(manager.action(command::TOGGLE_OUTPUT, "", "").success);
        assert!(manager.is_output_to_lights());
        assert!(manager.output_manager().is_outputting());
    }

    #[test]
    fn test_idle_send_off_blanks_and_runs_background() {
        let (mut manager, log) = recorded(ambient_show(true));
        manager.set_output_to_lights(true);
        let opened = log.calls().len();

        manager.frame(true);
        let calls = log.calls();
        let frame = &calls[opened..];
        assert!(matches!(frame[0], DriverCall::StartFrame(_)));
        assert_eq!(
            &frame[1..],
            &[
                DriverCall::AllOff,
                DriverCall::Write(0, vec![0, 0, 0, 7, 0, 0, 0, 0]),
                DriverCall::EndFrame,
            ]
        );
        assert_eq!(manager.buffer(), &[0, 0, 0, 7, 0, 0, 0, 0]);

        manager.frame(false);
        assert_eq!(log.calls().len(), calls.len());
    }

    #[test]
    fn test_idle_leaves_outputs_alone() {
        let (mut manager, log) = recorded(ambient_show(false));
        manager.set_output_to_lights(true);
        let opened = log.calls().len();

        manager.frame(true);
        manager.frame(false);
        assert_eq!(log.calls().len(), opened);
        assert_eq!(log.end_frames(), 0);
    }

    #[test]
    fn test_dimmed_bytes_reach_outputs() {
        let (mut manager, log) = recorded(Show::default().with_playlist(solid("Main", 200)));
        manager.set_output_to_lights(true);
        manager.play_playlist("Main", PlayRequest::default()).unwrap();
        manager.set_brightness(50);

        manager.frame(true);
        assert_eq!(log.writes().last(), Some(&(0, vec![100, 100, 100, 100, 0, 0, 0, 0])));
        assert_eq!(log.end_frames(), 1);
    }
}
