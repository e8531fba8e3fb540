use std::ops::Range;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::item::{RenderContext, DEFAULT_FRAME_MS};
use super::step::PlayListStep;
use super::{format_duration, next_id};
use crate::schedule::Schedule;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PlayListState {
    #[default]
    Stopped,
    Running,
    /// Loaded with its position held, not advancing
    Suspended,
    /// Playing out its last step before stopping
    FinishingUp,
}

/// What to do when the current step ends
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Pending {
    Stop,
    JumpToEndSteps,
    JumpToStep(usize),
}

#[derive(Clone, Debug, Default)]
struct Playback {
    state: PlayListState,
    paused: bool,
    looping: bool,
    random: bool,
    /// Passes remaining after the current one; `None` loops forever
    loops_left: Option<u32>,
    current: usize,
    step_looping: bool,
    pending: Option<Pending>,
    stop_at_end_of_loop: bool,
    /// Steps completed in this pass, used to end random passes
    played_in_pass: usize,
    /// Told to finish up; survives suspension
    finishing: bool,
}

/// An ordered list of steps plus the schedules that trigger it.
///
/// `first_once` plays the first step only on the first pass of a loop and
/// `last_once` holds the last step back until the playlist is finishing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayList {
    #[serde(skip, default = "next_id")]
    id: u32,
    name: String,
    #[serde(default)]
    steps: Vec<PlayListStep>,
    #[serde(default)]
    schedules: Vec<Schedule>,
    #[serde(default)]
    pub first_once: bool,
    #[serde(default)]
    pub last_once: bool,
    #[serde(skip)]
    playback: Playback,
}

impl PlayList {
    pub fn new(name: &str) -> Self {
        Self {
            id: next_id(),
            name: name.to_string(),
            steps: Vec::new(),
            schedules: Vec::new(),
            first_once: false,
            last_once: false,
            playback: Playback::default(),
        }
    }

    pub fn with_step(mut self, step: PlayListStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedules.push(schedule);
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name_no_time(&self) -> &str {
        &self.name
    }

    /// Name with the total running time appended
    pub fn name_with_time(&self) -> String {
        format!("{} [{}]", self.name, format_duration(self.length_ms()))
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn steps(&self) -> &[PlayListStep] {
        &self.steps
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn schedules_mut(&mut self) -> &mut Vec<Schedule> {
        &mut self.schedules
    }

    pub fn get_schedule(&self, name: &str) -> Option<&Schedule> {
        self.schedules
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn get_step(&self, name: &str) -> Option<&PlayListStep> {
        self.step_index(name).map(|i| &self.steps[i])
    }

    fn step_index(&self, name: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn length_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.length_ms()).sum()
    }

    pub fn add_step(&mut self, step: PlayListStep) {
        self.steps.push(step);
    }

    pub fn remove_step(&mut self, id: u32) -> Option<PlayListStep> {
        let index = self.steps.iter().position(|s| s.id() == id)?;
        let removed = self.steps.remove(index);

        if self.playback.state != PlayListState::Stopped {
            if index < self.playback.current {
                self.playback.current -= 1;
            } else if index == self.playback.current {
                self.enter_step_or_stop(self.playback.current);
            }
        }
        Some(removed)
    }

    pub fn remove_all_steps(&mut self) {
        self.stop();
        self.steps.clear();
    }

    // Lifecycle

    pub fn start(&mut self, looping: bool, random: bool, loops: Option<u32>) -> bool {
        if self.steps.is_empty() {
            log::debug!("Playlist {} has no steps to start", self.name);
            self.playback = Playback::default();
            return false;
        }

        self.playback = Playback {
            state: PlayListState::Running,
            looping,
            random,
            loops_left: loops.map(|l| l.saturating_sub(1)),
            ..Playback::default()
        };

        let first = if random && !self.first_once {
            self.pick_random(self.loop_range(), None).unwrap_or(0)
        } else {
            0
        };
        self.enter_step(first);
        log::debug!("Playlist {} started at step {}", self.name, self.steps[first].name);
        true
    }

    pub fn start_suspended(&mut self, looping: bool, random: bool, loops: Option<u32>) -> bool {
        let started = self.start(looping, random, loops);
        if started {
            self.playback.state = PlayListState::Suspended;
        }
        started
    }

    pub fn stop(&mut self) {
        if self.playback.state != PlayListState::Stopped {
            log::debug!("Playlist {} stopped", self.name);
        }
        self.playback = Playback::default();
        for step in &mut self.steps {
            step.reset();
            step.set_loops(1);
        }
    }

    /// Suspend or resume, returning the frame interval now wanted.
    /// A playlist suspended while finishing up resumes finishing up.
    pub fn suspend(&mut self, suspend: bool) -> u64 {
        match (self.playback.state, suspend) {
            (PlayListState::Running | PlayListState::FinishingUp, true) => {
                self.playback.state = PlayListState::Suspended;
            }
            (PlayListState::Suspended, false) => {
                self.playback.state = if self.playback.finishing {
                    PlayListState::FinishingUp
                } else {
                    PlayListState::Running
                };
            }
            _ => {}
        }
        self.frame_ms()
    }

    pub fn pause(&mut self, pause: bool) {
        if self.is_running() {
            self.playback.paused = pause;
        }
    }

    pub fn state(&self) -> PlayListState {
        self.playback.state
    }

    pub fn is_running(&self) -> bool {
        self.playback.state != PlayListState::Stopped
    }

    pub fn is_suspended(&self) -> bool {
        self.playback.state == PlayListState::Suspended
    }

    pub fn is_finishing_up(&self) -> bool {
        self.playback.finishing && self.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.playback.paused
    }

    pub fn is_looping(&self) -> bool {
        self.playback.looping
    }

    pub fn set_looping(&mut self, looping: bool) -> bool {
        self.playback.looping = looping;
        looping
    }

    pub fn is_random(&self) -> bool {
        self.playback.random
    }

    pub fn set_random(&mut self, random: bool) -> bool {
        self.playback.random = random;
        random
    }

    pub fn loops_left(&self) -> Option<u32> {
        self.playback.loops_left
    }

    /// Frame interval of the running step
    pub fn frame_ms(&self) -> u64 {
        self.running_step()
            .map(|s| s.frame_ms())
            .unwrap_or(DEFAULT_FRAME_MS)
    }

    // Navigation

    pub fn running_step(&self) -> Option<&PlayListStep> {
        if !self.is_running() {
            return None;
        }
        self.steps.get(self.playback.current)
    }

    pub fn running_step_mut(&mut self) -> Option<&mut PlayListStep> {
        if !self.is_running() {
            return None;
        }
        self.steps.get_mut(self.playback.current)
    }

    /// The step that will follow the running one. Unknown when random.
    pub fn next_step(&self) -> Option<&PlayListStep> {
        if !self.is_running() || self.playback.random {
            return None;
        }
        let next = self.playback.current + 1;
        let range = self.loop_range();
        if next < range.end {
            return self.steps.get(next);
        }
        if self.playback.looping && self.playback.loops_left != Some(0) && !range.is_empty() {
            return self.steps.get(range.start);
        }
        if self.last_once && self.playback.current + 1 < self.steps.len() {
            return self.steps.last();
        }
        None
    }

    /// A random step other than the running one
    pub fn random_step(&self) -> Option<&PlayListStep> {
        self.pick_random(0..self.steps.len(), self.current())
            .map(|i| &self.steps[i])
    }

    /// Jump straight to the named step, returning its frame interval
    pub fn jump_to_step(&mut self, name: &str) -> Option<u64> {
        let index = self.step_index(name)?;
        if !self.is_running() {
            return None;
        }
        self.enter_step(index);
        Some(self.steps[index].frame_ms())
    }

    pub fn jump_to_random_step(&mut self) -> Option<u64> {
        let index = self.pick_random(0..self.steps.len(), self.current())?;
        if !self.is_running() {
            return None;
        }
        self.enter_step(index);
        Some(self.steps[index].frame_ms())
    }

    /// Returns false if there was no next step and the playlist stopped
    pub fn jump_to_next_step(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.enter_step_or_stop(self.playback.current + 1)
    }

    pub fn jump_to_prior_step(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        let prior = self.playback.current.saturating_sub(1);
        self.enter_step(prior);
        true
    }

    pub fn restart_current_step(&mut self) {
        if let Some(step) = self.running_step_mut() {
            step.reset();
        }
    }

    pub fn stop_at_end_of_current_step(&mut self) {
        self.playback.pending = Some(Pending::Stop);
    }

    pub fn stop_at_end_of_this_loop(&mut self) {
        self.playback.stop_at_end_of_loop = true;
    }

    pub fn jump_to_end_steps_at_end_of_current_step(&mut self) {
        if !self.is_running() {
            return;
        }
        self.playback.pending = Some(Pending::JumpToEndSteps);
        self.playback.finishing = true;
        if self.playback.state == PlayListState::Running {
            self.playback.state = PlayListState::FinishingUp;
        }
    }

    pub fn jump_to_step_at_end_of_current_step(&mut self, name: &str) -> bool {
        match self.step_index(name) {
            Some(index) => {
                self.playback.pending = Some(Pending::JumpToStep(index));
                true
            }
            None => false,
        }
    }

    /// Jump to the named step and repeat it until told otherwise
    pub fn loop_step(&mut self, name: &str) -> bool {
        if self.jump_to_step(name).is_none() {
            return false;
        }
        self.playback.step_looping = true;
        true
    }

    pub fn set_step_looping(&mut self, looping: bool) {
        self.playback.step_looping = looping;
    }

    pub fn clear_step_looping(&mut self) {
        self.playback.step_looping = false;
    }

    pub fn is_step_looping(&self) -> bool {
        self.playback.step_looping
    }

    /// Render one frame of the running step and advance. Returns true when
    /// the playlist has finished.
    pub fn frame(&mut self, buffer: &mut [u8], ctx: &RenderContext<'_>) -> bool {
        match self.playback.state {
            PlayListState::Stopped => return true,
            PlayListState::Suspended => return false,
            PlayListState::Running | PlayListState::FinishingUp => {}
        }

        let current = self.playback.current;
        let Some(step) = self.steps.get_mut(current) else {
            self.stop();
            return true;
        };

        if self.playback.paused {
            step.render(buffer, ctx);
            return false;
        }

        if step.frame(buffer, ctx) {
            return !self.step_finished();
        }
        false
    }

    /// Move on from a finished step. Returns false once nothing is left.
    fn step_finished(&mut self) -> bool {
        if let Some(pending) = self.playback.pending.take() {
            return match pending {
                Pending::Stop => {
                    self.stop();
                    false
                }
                Pending::JumpToEndSteps => self.enter_end_steps(),
                Pending::JumpToStep(index) => self.enter_step_or_stop(index),
            };
        }

        if self.playback.state == PlayListState::FinishingUp {
            self.stop();
            return false;
        }

        if self.playback.step_looping {
            self.restart_current_step();
            return true;
        }

        let current = self.playback.current;
        if self.steps[current].take_loop() {
            return true;
        }

        self.playback.played_in_pass += 1;
        match self.next_in_pass() {
            Some(next) => {
                self.enter_step(next);
                true
            }
            None => self.pass_finished(),
        }
    }

    fn next_in_pass(&self) -> Option<usize> {
        let range = self.loop_range();
        if self.playback.random {
            // The first step of the first pass sits outside a first-once range
            let in_range = range.contains(&self.playback.current);
            if in_range && self.playback.played_in_pass >= range.len() {
                return None;
            }
            if !in_range && self.playback.played_in_pass > range.len() {
                return None;
            }
            return self.pick_random(range, Some(self.playback.current));
        }

        let next = self.playback.current + 1;
        (next < range.end).then_some(next)
    }

    fn pass_finished(&mut self) -> bool {
        let range = self.loop_range();
        let more_loops = self.playback.looping && self.playback.loops_left != Some(0);

        if more_loops && !self.playback.stop_at_end_of_loop && !range.is_empty() {
            if let Some(left) = self.playback.loops_left.as_mut() {
                *left -= 1;
            }
            self.playback.played_in_pass = 0;
            let first = if self.playback.random {
                self.pick_random(range.clone(), Some(self.playback.current))
                    .unwrap_or(range.start)
            } else {
                range.start
            };
            self.enter_step(first);
            return true;
        }

        self.enter_end_steps()
    }

    /// Play the held-back last step if there is one, then stop
    fn enter_end_steps(&mut self) -> bool {
        let last = self.steps.len().saturating_sub(1);
        if self.last_once && self.steps.len() > 1 && self.playback.current != last {
            self.playback.state = PlayListState::FinishingUp;
            self.playback.finishing = true;
            self.enter_step(last);
            return true;
        }
        self.stop();
        false
    }

    /// Steps played on every pass
    fn loop_range(&self) -> Range<usize> {
        let len = self.steps.len();
        let start = if self.first_once && len > 1 { 1 } else { 0 };
        let end = if self.last_once && len > 1 { len - 1 } else { len };
        start..end.max(start)
    }

    fn current(&self) -> Option<usize> {
        self.is_running().then_some(self.playback.current)
    }

    fn pick_random(&self, range: Range<usize>, exclude: Option<usize>) -> Option<usize> {
        if range.is_empty() {
            return None;
        }
        if range.len() == 1 {
            return Some(range.start);
        }
        let mut rng = rand::rng();
        loop {
            let index = rng.random_range(range.clone());
            if Some(index) != exclude {
                return Some(index);
            }
        }
    }

    fn enter_step(&mut self, index: usize) {
        self.playback.current = index;
        if let Some(step) = self.steps.get_mut(index) {
            step.reset();
        }
    }

    fn enter_step_or_stop(&mut self, index: usize) -> bool {
        if index < self.steps.len() {
            self.enter_step(index);
            true
        } else {
            self.stop();
            false
        }
    }
}
