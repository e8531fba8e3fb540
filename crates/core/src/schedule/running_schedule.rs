use crate::playlist::PlayList;

use super::schedule::Schedule;

/// A schedule whose window is open, with its own copy of the playlist
#[derive(Debug, Clone)]
pub struct RunningSchedule {
    playlist: PlayList,
    schedule: Schedule,
}

impl RunningSchedule {
    /// Copy the playlist and start it suspended with the schedule's
    /// playback settings
    pub fn new(playlist: &PlayList, schedule: &Schedule) -> Self {
        let mut running = Self {
            playlist: playlist.clone(),
            schedule: schedule.clone(),
        };
        running.start_suspended();
        running
    }

    fn start_suspended(&mut self) {
        self.playlist.start_suspended(
            self.schedule.looping,
            self.schedule.random,
            self.schedule.loops,
        );
    }

    pub fn playlist(&self) -> &PlayList {
        &self.playlist
    }

    pub fn playlist_mut(&mut self) -> &mut PlayList {
        &mut self.playlist
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    pub fn priority(&self) -> u8 {
        self.schedule.priority
    }

    /// Restart the playlist from the top. It comes back suspended and the
    /// next arbitration pass decides whether it plays.
    pub fn reset(&mut self) {
        self.playlist.stop();
        self.start_suspended();
    }

    /// Swap in a fresh copy of the playlist, keeping the current step and
    /// playback settings
    pub fn refresh(&mut self, playlist: &PlayList) {
        let step = self.playlist.running_step().map(|s| s.name.clone());
        let looping = self.playlist.is_looping();
        let random = self.playlist.is_random();
        let suspended = self.playlist.is_suspended();
        let loops = self.playlist.loops_left().map(|l| l + 1);

        self.playlist.stop();
        self.playlist = playlist.clone();
        self.playlist.start(looping, random, loops);
        if let Some(step) = step {
            self.playlist.jump_to_step(&step);
        }
        if suspended {
            self.playlist.suspend(true);
        }
    }
}
