use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::error::{OutputError, Result};
use super::output::{Output, OutputConfig, ProtocolKind};
use super::sync::{SyncSender, UdpSyncSender};
use crate::show::{read_json, write_json, PersistError};

/// Where `add_output` places a new output in the list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    End,
    At(usize),
    After(usize),
}

/// Outcome of opening every output at session start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartReport {
    pub opened: usize,
    /// (destination, reason) for each output that failed to open
    pub failed: Vec<(String, String)>,
}

impl StartReport {
    pub fn is_outputting(&self) -> bool {
        self.opened > 0
    }
}

/// Snapshot of one output for queries and reports
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSummary {
    pub number: usize,
    #[serde(rename = "type")]
    pub kind: ProtocolKind,
    pub description: String,
    pub destination: String,
    pub ip: String,
    pub universe: u16,
    pub comm_port: String,
    pub start_channel: usize,
    pub end_channel: usize,
    pub channels: usize,
    pub enabled: bool,
    pub ok: bool,
}

impl OutputSummary {
    fn from_output(output: &Output) -> Self {
        Self {
            number: output.output_number(),
            kind: output.kind(),
            description: output.description().to_string(),
            destination: output.config().destination(),
            ip: output.ip().to_string(),
            universe: output.universe(),
            comm_port: output.comm_port().to_string(),
            start_channel: output.start_channel(),
            end_channel: output.end_channel(),
            channels: output.channels(),
            enabled: output.is_enabled(),
            ok: output.is_ok(),
        }
    }
}

/// On disk form of the output list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkFile {
    #[serde(default)]
    pub sync_universe: u16,
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
}

struct Inner {
    outputs: Vec<Output>,
    sync: Box<dyn SyncSender>,
    sync_universe: u16,
    sync_enabled: bool,
    dirty: bool,
}

/// Owns the ordered output list and maps the global channel space onto it.
///
/// Frame lifecycle calls and list mutations only ever `try_lock` the list.
/// When it is held they skip the work and report it (`false` or
/// [`OutputError::Busy`]) instead of waiting.
pub struct OutputManager {
    inner: Mutex<Inner>,
    outputting: AtomicBool,
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the output owning a 1-based absolute channel
fn find_output(outputs: &[Output], channel: usize) -> Option<(usize, usize)> {
    if channel == 0 {
        return None;
    }

    outputs
        .iter()
        .position(|o| channel >= o.start_channel() && channel <= o.end_channel())
        .map(|i| (i, channel - outputs[i].start_channel() + 1))
}

fn write_channels(outputs: &mut [Output], offset: usize, data: &[u8]) {
    let mut channel = offset + 1;
    let mut remaining = data;
    while !remaining.is_empty() {
        let Some((index, local)) = find_output(outputs, channel) else {
            break;
        };
        let output = &mut outputs[index];
        let available = output.channels() - (local - 1);
        let count = remaining.len().min(available);
        output.set_many_channels(local - 1, &remaining[..count]);

        channel += count;
        remaining = &remaining[count..];
    }
}

fn transmit(inner: &mut Inner) {
    for output in inner.outputs.iter_mut() {
        if let Err(e) = output.end_frame() {
            log::debug!("Output {} send failed: {}", output.config().destination(), e);
        }
    }

    if !inner.sync_enabled {
        return;
    }
    let has_e131 = inner.outputs.iter().any(|o| o.kind() == ProtocolKind::E131);
    let has_artnet = inner
        .outputs
        .iter()
        .any(|o| o.kind() == ProtocolKind::ArtNet);

    if has_e131 && inner.sync_universe != 0 {
        if let Err(e) = inner.sync.send_e131_sync(inner.sync_universe) {
            log::debug!("sACN sync failed: {}", e);
        }
    }
    if has_artnet {
        if let Err(e) = inner.sync.send_artnet_sync() {
            log::debug!("Art-Net sync failed: {}", e);
        }
    }
}

/// Recompute every output's number, start channel and null index
fn readdress(outputs: &mut [Output]) {
    let mut next_channel = 1;
    let mut nulls = 0;

    for (i, output) in outputs.iter_mut().enumerate() {
        let null_number = if output.kind() == ProtocolKind::Null {
            nulls += 1;
            Some(nulls)
        } else {
            None
        };
        output.set_transient_data(i + 1, next_channel, null_number);
        next_channel += output.channels();
    }
}

impl OutputManager {
    pub fn new() -> Self {
        Self::with_sync_sender(Box::new(UdpSyncSender::new()))
    }

    pub fn with_sync_sender(sync: Box<dyn SyncSender>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                outputs: Vec::new(),
                sync,
                sync_universe: 0,
                sync_enabled: false,
                dirty: false,
            }),
            outputting: AtomicBool::new(false),
        }
    }

    /// Build a manager from a networks.json file. A missing or unreadable
    /// file leaves the manager empty.
    pub fn load(path: &Path) -> Self {
        let manager = Self::new();
        match read_json::<NetworkFile>(path) {
            Ok(file) => {
                if let Err(e) = manager.apply_network_file(file) {
                    log::error!("Failed to apply output list from {}: {}", path.display(), e);
                }
            }
            Err(PersistError::NotFound(_)) => {
                log::info!("No output list at {}, starting empty", path.display());
            }
            Err(e) => {
                log::error!("Failed to load output list, starting empty: {}", e);
            }
        }
        manager
    }

    pub fn save(&self, path: &Path) -> std::result::Result<(), PersistError> {
        let file = self.network_file();
        write_json(path, &file)?;

        let mut inner = self.inner.lock();
        inner.dirty = false;
        inner.outputs.iter_mut().for_each(|o| o.clear_dirty());
        log::info!("Saved {} outputs to {}", file.outputs.len(), path.display());
        Ok(())
    }

    pub fn network_file(&self) -> NetworkFile {
        let inner = self.inner.lock();
        NetworkFile {
            sync_universe: inner.sync_universe,
            outputs: inner.outputs.iter().map(|o| o.config().clone()).collect(),
        }
    }

    /// Replace the output list with the contents of a network file
    pub fn apply_network_file(&self, file: NetworkFile) -> Result<()> {
        let mut inner = self.inner.try_lock().ok_or(OutputError::Busy)?;
        inner.outputs = file
            .outputs
            .into_iter()
            .map(|config| {
                let mut output = Output::new(config);
                output.clear_dirty();
                output
            })
            .collect();
        inner.sync_universe = file.sync_universe;
        inner.dirty = false;
        readdress(&mut inner.outputs);
        Ok(())
    }

    /// Insert an output, returning its index
    pub fn add_output(&self, output: Output, position: Position) -> Result<usize> {
        let mut inner = self.inner.try_lock().ok_or(OutputError::Busy)?;
        let len = inner.outputs.len();
        let index = match position {
            Position::End => len,
            Position::At(i) => i.min(len),
            Position::After(i) => (i + 1).min(len),
        };
        inner.outputs.insert(index, output);
        inner.dirty = true;
        readdress(&mut inner.outputs);
        Ok(index)
    }

    pub fn delete_output(&self, index: usize) -> Result<Output> {
        let mut inner = self.inner.try_lock().ok_or(OutputError::Busy)?;
        if index >= inner.outputs.len() {
            return Err(OutputError::NoSuchOutput(index));
        }
        let mut removed = inner.outputs.remove(index);
        removed.close();
        inner.dirty = true;
        readdress(&mut inner.outputs);
        Ok(removed)
    }

    pub fn delete_all_outputs(&self) -> Result<()> {
        let mut inner = self.inner.try_lock().ok_or(OutputError::Busy)?;
        inner.outputs.iter_mut().for_each(|o| o.close());
        inner.outputs.clear();
        inner.dirty = true;
        Ok(())
    }

    pub fn move_output(&self, from: usize, to: usize) -> Result<()> {
        let mut inner = self.inner.try_lock().ok_or(OutputError::Busy)?;
        let len = inner.outputs.len();
        if from >= len {
            return Err(OutputError::NoSuchOutput(from));
        }
        if to >= len {
            return Err(OutputError::NoSuchOutput(to));
        }
        let output = inner.outputs.remove(from);
        inner.outputs.insert(to, output);
        inner.dirty = true;
        readdress(&mut inner.outputs);
        Ok(())
    }

    /// Enable or disable an output; its channel range is unchanged
    pub fn set_output_enabled(&self, index: usize, enabled: bool) -> Result<()> {
        let mut inner = self.inner.try_lock().ok_or(OutputError::Busy)?;
        let output = inner
            .outputs
            .get_mut(index)
            .ok_or(OutputError::NoSuchOutput(index))?;
        output.set_enabled(enabled);
        if !enabled {
            output.close();
        }
        Ok(())
    }

    /// Re-run addressing after outputs were changed in place
    pub fn something_changed(&self) -> Result<()> {
        let mut inner = self.inner.try_lock().ok_or(OutputError::Busy)?;
        readdress(&mut inner.outputs);
        Ok(())
    }

    /// Union in discovered outputs, skipping any already present.
    /// Returns how many were added.
    pub fn merge_discovered(&self, discovered: Vec<OutputConfig>) -> Result<usize> {
        let mut inner = self.inner.try_lock().ok_or(OutputError::Busy)?;
        let mut added = 0;
        for config in discovered {
            if inner
                .outputs
                .iter()
                .any(|o| o.config().same_destination(&config))
            {
                continue;
            }
            log::info!("Discovered new output {}", config.destination());
            inner.outputs.push(Output::new(config));
            added += 1;
        }
        if added > 0 {
            inner.dirty = true;
            readdress(&mut inner.outputs);
        }
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Output index and 1-based local channel for an absolute channel
    pub fn get_output_for_channel(&self, channel: usize) -> Option<(usize, usize)> {
        find_output(&self.inner.lock().outputs, channel)
    }

    pub fn get_output(&self, index: usize) -> Option<OutputSummary> {
        self.inner
            .lock()
            .outputs
            .get(index)
            .map(OutputSummary::from_output)
    }

    pub fn get_output_by_universe(&self, universe: u16, ip: &str) -> Option<usize> {
        self.inner.lock().outputs.iter().position(|o| {
            o.is_ip_output() && o.universe() == universe && (ip.is_empty() || o.ip() == ip)
        })
    }

    /// Absolute channel for a 1-based channel within an output
    pub fn absolute_channel(&self, index: usize, local: usize) -> Option<usize> {
        let inner = self.inner.lock();
        let output = inner.outputs.get(index)?;
        if local == 0 || local > output.channels() {
            return None;
        }
        Some(output.start_channel() + local - 1)
    }

    pub fn total_channels(&self) -> usize {
        self.inner
            .lock()
            .outputs
            .last()
            .map(|o| o.end_channel())
            .unwrap_or(0)
    }

    pub fn ips(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut ips: Vec<String> = inner
            .outputs
            .iter()
            .filter(|o| o.is_ip_output() && !o.ip().is_empty())
            .map(|o| o.ip().to_string())
            .collect();
        ips.sort();
        ips.dedup();
        ips
    }

    pub fn ip_universes(&self, ip: &str) -> Vec<u16> {
        self.inner
            .lock()
            .outputs
            .iter()
            .filter(|o| o.is_ip_output() && o.ip() == ip)
            .map(|o| o.universe())
            .collect()
    }

    /// Human readable description of where an absolute channel goes
    pub fn channel_name(&self, channel: usize) -> String {
        let inner = self.inner.lock();
        match find_output(&inner.outputs, channel) {
            Some((index, local)) => {
                let output = &inner.outputs[index];
                format!(
                    "Channel {} : {} #{} channel {}",
                    channel,
                    output.config().destination(),
                    output.output_number(),
                    local
                )
            }
            None => format!("Channel {} : not assigned", channel),
        }
    }

    pub fn is_dirty(&self) -> bool {
        let inner = self.inner.lock();
        inner.dirty || inner.outputs.iter().any(|o| o.is_dirty())
    }

    pub fn use_e131(&self) -> bool {
        self.inner
            .lock()
            .outputs
            .iter()
            .any(|o| o.kind() == ProtocolKind::E131)
    }

    pub fn use_artnet(&self) -> bool {
        self.inner
            .lock()
            .outputs
            .iter()
            .any(|o| o.kind() == ProtocolKind::ArtNet)
    }

    pub fn describe(&self) -> Vec<OutputSummary> {
        self.inner
            .lock()
            .outputs
            .iter()
            .map(OutputSummary::from_output)
            .collect()
    }

    pub fn set_sync_universe(&self, universe: u16) {
        let mut inner = self.inner.lock();
        inner.sync_universe = universe;
        inner.dirty = true;
        let effective = if inner.sync_enabled { universe } else { 0 };
        inner
            .outputs
            .iter_mut()
            .for_each(|o| o.set_sync_universe(effective));
    }

    pub fn sync_universe(&self) -> u16 {
        self.inner.lock().sync_universe
    }

    pub fn set_sync_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock();
        inner.sync_enabled = enabled;
        let effective = if enabled { inner.sync_universe } else { 0 };
        inner
            .outputs
            .iter_mut()
            .for_each(|o| o.set_sync_universe(effective));
    }

    pub fn is_sync_enabled(&self) -> bool {
        self.inner.lock().sync_enabled
    }

    pub fn is_outputting(&self) -> bool {
        self.outputting.load(Ordering::SeqCst)
    }

    /// Open every output. Failures are logged and reported, the session is
    /// outputting when at least one output opened.
    pub fn start_output(&self) -> StartReport {
        let mut report = StartReport::default();
        if self.is_outputting() {
            return report;
        }

        let mut inner = self.inner.lock();
        let sync_universe = if inner.sync_enabled {
            inner.sync_universe
        } else {
            0
        };

        for output in inner.outputs.iter_mut() {
            output.set_sync_universe(sync_universe);
            match output.open() {
                Ok(()) if output.is_open() => report.opened += 1,
                Ok(()) => {}
                Err(e) => {
                    log::warn!("Output {} failed to open: {}", output.config().destination(), e);
                    report
                        .failed
                        .push((output.config().destination(), e.to_string()));
                }
            }
        }

        self.outputting.store(report.opened > 0, Ordering::SeqCst);
        log::info!(
            "Started output: {} opened, {} failed",
            report.opened,
            report.failed.len()
        );
        report
    }

    pub fn stop_output(&self) {
        if !self.is_outputting() {
            return;
        }

        let mut inner = self.inner.lock();
        for output in inner.outputs.iter_mut() {
            output.all_off();
            if let Err(e) = output.end_frame() {
                log::debug!("Final frame failed on {}: {}", output.config().destination(), e);
            }
            output.close();
        }
        self.outputting.store(false, Ordering::SeqCst);
        log::info!("Stopped output");
    }

    pub fn start_frame(&self, msec: u64) -> bool {
        let Some(mut inner) = self.inner.try_lock() else {
            log::debug!("Output list busy, skipping start frame");
            return false;
        };
        inner.outputs.iter_mut().for_each(|o| o.start_frame(msec));
        true
    }

    pub fn reset_frame(&self) -> bool {
        let Some(mut inner) = self.inner.try_lock() else {
            return false;
        };
        inner.outputs.iter_mut().for_each(|o| o.reset_frame());
        true
    }

    /// Transmit the frame on every output, then send sync packets
    pub fn end_frame(&self) -> bool {
        let Some(mut inner) = self.inner.try_lock() else {
            log::debug!("Output list busy, skipping end frame");
            return false;
        };
        transmit(&mut inner);
        true
    }

    /// Write a contiguous run of channel data starting at the 0-based global
    /// offset. The run is split so no write crosses an output boundary.
    pub fn set_many_channels(&self, offset: usize, data: &[u8]) -> bool {
        let Some(mut inner) = self.inner.try_lock() else {
            log::debug!("Output list busy, skipping channel data");
            return false;
        };
        write_channels(&mut inner.outputs, offset, data);
        true
    }

    /// Start, fill and transmit one whole frame while holding the list once.
    /// `blank` zeroes every output before `data` is written from channel 1.
    /// When the list is busy no output is touched and the frame is dropped.
    pub fn commit_frame(&self, msec: u64, data: &[u8], blank: bool) -> bool {
        let Some(mut inner) = self.inner.try_lock() else {
            log::debug!("Output list busy, dropping frame");
            return false;
        };

        for output in inner.outputs.iter_mut() {
            output.start_frame(msec);
            if blank {
                output.all_off();
            }
        }
        write_channels(&mut inner.outputs, 0, data);
        transmit(&mut inner);
        true
    }

    /// Zero every output and push the zeroed frame immediately
    pub fn all_off(&self) -> bool {
        let Some(mut inner) = self.inner.try_lock() else {
            return false;
        };
        for output in inner.outputs.iter_mut() {
            output.all_off();
            if let Err(e) = output.end_frame() {
                log::debug!("Output {} all off failed: {}", output.config().destination(), e);
            }
        }
        true
    }

    #[cfg(test)]
    fn hold_lock_for_test(&self) -> parking_lot::MutexGuard<'_, Inner> {
        self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::testing::{DriverCall, RecordingDriver, RecordingSync};

    fn null(channels: usize) -> Output {
        Output::new(OutputConfig::null(channels))
    }

    fn manager_with(channels: &[usize]) -> OutputManager {
        let manager = OutputManager::new();
        for &c in channels {
            manager.add_output(null(c), Position::End).unwrap();
        }
        manager
    }

    #[test]
    fn test_addressing_is_contiguous() {
        let manager = manager_with(&[100, 50, 200]);
        let outputs = manager.describe();

        assert_eq!(outputs[0].start_channel, 1);
        assert_eq!(outputs[0].end_channel, 100);
        assert_eq!(outputs[1].start_channel, 101);
        assert_eq!(outputs[1].end_channel, 150);
        assert_eq!(outputs[2].start_channel, 151);
        assert_eq!(outputs[2].end_channel, 350);
        assert_eq!(manager.total_channels(), 350);
        assert_eq!(outputs.iter().map(|o| o.number).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_null_numbers_count_only_nulls() {
        let manager = manager_with(&[10]);
        manager
            .add_output(Output::new(OutputConfig::e131("10.0.0.5", 1, 512)), Position::End)
            .unwrap();
        manager.add_output(null(10), Position::End).unwrap();

        let inner = manager.inner.lock();
        assert_eq!(inner.outputs[0].null_number(), Some(1));
        assert_eq!(inner.outputs[1].null_number(), None);
        assert_eq!(inner.outputs[2].null_number(), Some(2));
    }

    #[test]
    fn test_insert_positions_readdress() {
        let manager = manager_with(&[10, 20]);
        manager.add_output(null(5), Position::At(0)).unwrap();
        manager.add_output(null(7), Position::After(0)).unwrap();

        let channels: Vec<usize> = manager.describe().iter().map(|o| o.channels).collect();
        assert_eq!(channels, vec![5, 7, 10, 20]);
        assert_eq!(manager.get_output(2).unwrap().start_channel, 13);
    }

    #[test]
    fn test_delete_and_move_readdress() {
        let manager = manager_with(&[10, 20, 30]);
        manager.delete_output(0).unwrap();
        assert_eq!(manager.get_output(0).unwrap().start_channel, 1);
        assert_eq!(manager.total_channels(), 50);

        manager.move_output(1, 0).unwrap();
        let outputs = manager.describe();
        assert_eq!(outputs[0].channels, 30);
        assert_eq!(outputs[1].start_channel, 31);

        assert!(matches!(manager.delete_output(5), Err(OutputError::NoSuchOutput(5))));
        manager.delete_all_outputs().unwrap();
        assert_eq!(manager.total_channels(), 0);
    }

    #[test]
    fn test_get_output_for_channel_bounds() {
        let manager = manager_with(&[100, 50]);

        assert_eq!(manager.get_output_for_channel(0), None);
        assert_eq!(manager.get_output_for_channel(1), Some((0, 1)));
        assert_eq!(manager.get_output_for_channel(100), Some((0, 100)));
        assert_eq!(manager.get_output_for_channel(101), Some((1, 1)));
        assert_eq!(manager.get_output_for_channel(150), Some((1, 50)));
        assert_eq!(manager.get_output_for_channel(151), None);
        assert!(manager.get_output(2).is_none());
    }

    #[test]
    fn test_set_many_channels_splits_at_boundaries() {
        let manager = OutputManager::new();
        let mut recorders = Vec::new();
        for channels in [100, 50, 200] {
            let (driver, calls) = RecordingDriver::new();
            recorders.push(calls);
            manager
                .add_output(
                    Output::with_driver(OutputConfig::null(channels), Box::new(driver)),
                    Position::End,
                )
                .unwrap();
        }
        manager.start_output();

        let data: Vec<u8> = (0..300).map(|i| (i % 256) as u8).collect();
        assert!(manager.set_many_channels(0, &data));

        let writes: Vec<_> = recorders.iter().map(|r| r.writes()).collect();
        assert_eq!(writes.iter().map(|w| w.len()).sum::<usize>(), 3);
        assert_eq!(writes[0][0], (0, data[0..100].to_vec()));
        assert_eq!(writes[1][0], (0, data[100..150].to_vec()));
        assert_eq!(writes[2][0], (0, data[150..300].to_vec()));
    }

    #[test]
    fn test_set_many_channels_past_end_is_dropped() {
        let manager = OutputManager::new();
        let (driver, calls) = RecordingDriver::new();
        manager
            .add_output(
                Output::with_driver(OutputConfig::null(10), Box::new(driver)),
                Position::End,
            )
            .unwrap();

        manager.set_many_channels(5, &[1; 20]);
        assert_eq!(calls.writes(), vec![(5, vec![1; 5])]);
    }

    #[test]
    fn test_disabled_output_keeps_range_but_is_skipped() {
        let manager = OutputManager::new();
        let (driver, calls) = RecordingDriver::new();
        let mut config = OutputConfig::null(10);
        config.enabled = false;
        manager
            .add_output(Output::with_driver(config, Box::new(driver)), Position::End)
            .unwrap();
        manager.add_output(null(10), Position::End).unwrap();

        assert_eq!(manager.get_output(1).unwrap().start_channel, 11);
        manager.set_many_channels(0, &[255; 20]);
        manager.end_frame();
        assert!(calls.writes().is_empty());
        assert_eq!(calls.end_frames(), 0);
    }

    #[test]
    fn test_busy_list_skips_frame_and_rejects_mutation() {
        let manager = manager_with(&[10]);
        let _guard = manager.hold_lock_for_test();

        assert!(!manager.start_frame(0));
        assert!(!manager.set_many_channels(0, &[1]));
        assert!(!manager.end_frame());
        assert!(matches!(
            manager.add_output(null(1), Position::End),
            Err(OutputError::Busy)
        ));
    }

    #[test]
    fn test_busy_list_drops_whole_frame() {
        let manager = OutputManager::new();
        let (driver, log) = RecordingDriver::new();
        manager
            .add_output(
                Output::with_driver(OutputConfig::null(4), Box::new(driver)),
                Position::End,
            )
            .unwrap();
        manager.start_output();

        assert!(manager.commit_frame(0, &[1; 4], false));
        {
            let _guard = manager.hold_lock_for_test();
            assert!(!manager.commit_frame(50, &[2; 4], false));
        }

        // Nothing from the dropped frame reached the driver, stale data was not resent
        assert_eq!(log.end_frames(), 1);
        assert_eq!(log.writes(), vec![(0, vec![1; 4])]);

        assert!(manager.commit_frame(100, &[3; 4], true));
        assert_eq!(log.end_frames(), 2);
        let calls = log.calls();
        let tail = &calls[calls.len() - 4..];
        assert_eq!(
            tail,
            &[
                DriverCall::StartFrame(100),
                DriverCall::AllOff,
                DriverCall::Write(0, vec![3; 4]),
                DriverCall::EndFrame,
            ]
        );
    }

    #[test]
    fn test_merge_discovered_is_a_union() {
        let manager = OutputManager::new();
        manager
            .add_output(Output::new(OutputConfig::e131("10.0.0.5", 1, 512)), Position::End)
            .unwrap();

        let added = manager
            .merge_discovered(vec![
                OutputConfig::e131("10.0.0.5", 1, 170),
                OutputConfig::e131("10.0.0.5", 2, 512),
                OutputConfig::artnet("10.0.0.5", 1, 512),
            ])
            .unwrap();

        assert_eq!(added, 2);
        assert_eq!(manager.len(), 3);
        assert_eq!(manager.ip_universes("10.0.0.5"), vec![1, 2, 1]);
        assert_eq!(manager.ips(), vec!["10.0.0.5".to_string()]);
        assert_eq!(manager.get_output_by_universe(2, "10.0.0.5"), Some(1));
    }

    #[test]
    fn test_sync_sent_only_when_configured() {
        let (sync, record) = RecordingSync::new();
        let manager = OutputManager::with_sync_sender(Box::new(sync));
        let (driver, _) = RecordingDriver::new();
        manager
            .add_output(
                Output::with_driver(OutputConfig::e131("10.0.0.5", 1, 512), Box::new(driver)),
                Position::End,
            )
            .unwrap();
        manager.start_output();

        manager.end_frame();
        assert_eq!(record.e131(), Vec::<u16>::new());

        manager.set_sync_enabled(true);
        manager.end_frame();
        // No sync universe configured yet
        assert!(record.e131().is_empty());

        manager.set_sync_universe(64001);
        manager.end_frame();
        assert_eq!(record.e131(), vec![64001]);
        assert_eq!(record.artnet(), 0);
    }

    #[test]
    fn test_start_output_reports_failures() {
        let manager = OutputManager::new();
        let (good, _) = RecordingDriver::new();
        manager
            .add_output(
                Output::with_driver(OutputConfig::null(10), Box::new(good)),
                Position::End,
            )
            .unwrap();
        manager
            .add_output(
                Output::new(OutputConfig::serial(ProtocolKind::Dmx, "", 0, 512)),
                Position::End,
            )
            .unwrap();

        let report = manager.start_output();
        assert_eq!(report.opened, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.is_outputting());
        assert!(manager.is_outputting());

        manager.stop_output();
        assert!(!manager.is_outputting());
    }

    #[test]
    fn test_channel_name() {
        let manager = manager_with(&[10]);
        assert_eq!(manager.channel_name(3), "Channel 3 : NULL #1 channel 3");
        assert_eq!(manager.channel_name(11), "Channel 11 : not assigned");
        assert_eq!(manager.absolute_channel(0, 10), Some(10));
        assert_eq!(manager.absolute_channel(0, 11), None);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("networks.json");

        let manager = manager_with(&[10]);
        manager
            .add_output(Output::new(OutputConfig::artnet("10.0.0.9", 3, 512)), Position::End)
            .unwrap();
        manager.set_sync_universe(7);
        assert!(manager.is_dirty());
        manager.save(&path).unwrap();
        assert!(!manager.is_dirty());

        let loaded = OutputManager::load(&path);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.sync_universe(), 7);
        assert_eq!(loaded.get_output(1).unwrap().start_channel, 11);
    }

    #[test]
    fn test_load_missing_or_malformed_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = OutputManager::load(&dir.path().join("nope.json"));
        assert!(missing.is_empty());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(OutputManager::load(&bad).is_empty());
    }
}
