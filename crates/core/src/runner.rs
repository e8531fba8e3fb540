use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::messages::{SchedulerCommand, SchedulerEvent, Settings};
use crate::output::{ArtNetDiscoverer, Discoverer, E131Discoverer, OutputManager, StartReport};
use crate::schedule::ScheduleManager;
use crate::show::ShowManager;

fn ticker(ms: u64) -> Interval {
    let mut ticker = interval(Duration::from_millis(ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Poll every discoverer and add the outputs they find. Returns how many
/// outputs were added.
pub fn discover_outputs(outputs: &OutputManager, settings: &Settings) -> usize {
    let timeout = Duration::from_millis(settings.discovery_timeout_ms);
    let local_ip = settings.force_local_ip.as_deref();
    let mut discoverers: Vec<Box<dyn Discoverer>> = vec![
        Box::new(ArtNetDiscoverer::new(local_ip)),
        Box::new(E131Discoverer::new(local_ip)),
    ];

    let mut added = 0;
    for discoverer in &mut discoverers {
        match discoverer.discover(timeout) {
            Ok(found) => {
                log::info!("{} discovery found {} outputs", discoverer.name(), found.len());
                match outputs.merge_discovered(found) {
                    Ok(count) => added += count,
                    Err(e) => log::warn!("Could not add {} outputs: {}", discoverer.name(), e),
                }
            }
            Err(e) => log::warn!("{} discovery failed: {}", discoverer.name(), e),
        }
    }
    added
}

/// Owns the schedule manager and drives it from one task: schedule checks
/// on a fixed interval, frames at whatever rate the playing content asks
/// for, and commands in between.
pub struct ScheduleRunner {
    manager: ScheduleManager,
    settings: Settings,
}

impl ScheduleRunner {
    pub fn new(manager: ScheduleManager, settings: Settings) -> Self {
        Self { manager, settings }
    }

    /// Load the show named by the settings
    pub fn open(settings: Settings) -> anyhow::Result<Self> {
        if !settings.show_dir.is_dir() {
            bail!("Show directory {} does not exist", settings.show_dir.display());
        }
        let show_dir = settings
            .show_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", settings.show_dir.display()))?;
        log::info!("Opening show in {}", show_dir.display());

        let manager = ScheduleManager::open(ShowManager::new(&show_dir));
        Ok(Self::new(manager, settings))
    }

    pub fn manager(&self) -> &ScheduleManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ScheduleManager {
        &mut self.manager
    }

    pub fn start_output(&mut self) -> StartReport {
        self.manager.set_output_to_lights(true)
    }

    /// Frame interval to run at given what arbitration asked for
    fn frame_rate(&self, requested: u64) -> u64 {
        if self.manager.is_something_playing() {
            requested
        } else {
            self.settings.default_frame_ms
        }
    }

    /// Apply one command. Returns a new frame interval if the command asked
    /// for one.
    fn process_command(
        &mut self,
        command: SchedulerCommand,
        event_tx: &mpsc::UnboundedSender<SchedulerEvent>,
    ) -> Option<u64> {
        match command {
            SchedulerCommand::Action {
                command,
                parameters,
                data,
            } => {
                let result = self.manager.action(&command, &parameters, &data);
                let rate = result.frame_ms;
                let _ = event_tx.send(SchedulerEvent::ActionCompleted { command, result });
                rate
            }
            SchedulerCommand::Query {
                query,
                parameters,
                ip,
            } => {
                let result = self.manager.query(&query, &parameters, &ip);
                let _ = event_tx.send(SchedulerEvent::QueryAnswered { query, result });
                None
            }
            SchedulerCommand::CheckIntegrity => {
                let report = self.manager.check_schedule_integrity();
                let _ = event_tx.send(SchedulerEvent::Integrity { report });
                None
            }
            SchedulerCommand::Shutdown => None,
        }
    }

    pub async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<SchedulerCommand>,
        event_tx: mpsc::UnboundedSender<SchedulerEvent>,
    ) -> anyhow::Result<()> {
        let outputs = self.manager.output_manager();
        let _ = event_tx.send(SchedulerEvent::Started {
            outputs: outputs.len(),
            channels: outputs.total_channels(),
            outputting: outputs.is_outputting(),
        });

        let mut check_interval = ticker(self.settings.check_interval_ms);
        let mut frame_ms = self.settings.default_frame_ms;
        let mut frame_interval = ticker(frame_ms);
        log::info!("Scheduler loop starting");

        loop {
            let mut rate = None;

            tokio::select! {
                command = command_rx.recv() => {
                    let Some(command) = command else {
                        log::info!("Command channel closed");
                        break;
                    };
                    log::debug!("Received command: {:?}", command);

                    if command == SchedulerCommand::Shutdown {
                        log::info!("Received shutdown command");
                        break;
                    }
                    rate = self.process_command(command, &event_tx);
                }

                _ = check_interval.tick() => {
                    let requested = self.manager.check_schedule();
                    rate = Some(self.frame_rate(requested));
                }

                _ = frame_interval.tick() => {
                    self.manager.frame(true);
                }
            }

            if let Some(rate) = rate.filter(|r| *r != frame_ms) {
                log::debug!("Frame interval now {}ms", rate);
                frame_ms = rate;
                frame_interval = ticker(rate);
            }
        }

        self.shutdown();
        let _ = event_tx.send(SchedulerEvent::ShutdownComplete);
        Ok(())
    }

    fn shutdown(&mut self) {
        log::info!("Shutting down the scheduler");
        self.manager.stop_all();
        self.manager.frame(true);
        self.manager.set_output_to_lights(false);
    }
}
