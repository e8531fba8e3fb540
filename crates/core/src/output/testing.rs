use std::sync::Arc;

use parking_lot::Mutex;

use super::error::Result;
use super::output::OutputDriver;
use super::sync::SyncSender;

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Open,
    Close,
    StartFrame(u64),
    Write(usize, Vec<u8>),
    AllOff,
    EndFrame,
}

#[derive(Clone, Default)]
pub struct DriverLog(Arc<Mutex<Vec<DriverCall>>>);

impl DriverLog {
    pub fn calls(&self) -> Vec<DriverCall> {
        self.0.lock().clone()
    }

    pub fn writes(&self) -> Vec<(usize, Vec<u8>)> {
        self.0
            .lock()
            .iter()
            .filter_map(|c| match c {
                DriverCall::Write(offset, data) => Some((*offset, data.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    pub fn end_frames(&self) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|c| **c == DriverCall::EndFrame)
            .count()
    }
}

/// Driver that records every call it receives
pub struct RecordingDriver {
    log: DriverLog,
}

impl RecordingDriver {
    pub fn new() -> (Self, DriverLog) {
        let log = DriverLog::default();
        (Self { log: log.clone() }, log)
    }

    fn push(&self, call: DriverCall) {
        self.log.0.lock().push(call);
    }
}

impl OutputDriver for RecordingDriver {
    fn open(&mut self) -> Result<()> {
        self.push(DriverCall::Open);
        Ok(())
    }

    fn close(&mut self) {
        self.push(DriverCall::Close);
    }

    fn start_frame(&mut self, msec: u64) {
        self.push(DriverCall::StartFrame(msec));
    }

    fn set_channels(&mut self, offset: usize, data: &[u8]) {
        self.push(DriverCall::Write(offset, data.to_vec()));
    }

    fn all_off(&mut self) {
        self.push(DriverCall::AllOff);
    }

    fn end_frame(&mut self) -> Result<()> {
        self.push(DriverCall::EndFrame);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct SyncLog {
    e131: Arc<Mutex<Vec<u16>>>,
    artnet: Arc<Mutex<usize>>,
}

impl SyncLog {
    pub fn e131(&self) -> Vec<u16> {
        self.e131.lock().clone()
    }

    pub fn artnet(&self) -> usize {
        *self.artnet.lock()
    }
}

pub struct RecordingSync {
    log: SyncLog,
}

impl RecordingSync {
    pub fn new() -> (Self, SyncLog) {
        let log = SyncLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl SyncSender for RecordingSync {
    fn send_e131_sync(&mut self, sync_universe: u16) -> Result<()> {
        self.log.e131.lock().push(sync_universe);
        Ok(())
    }

    fn send_artnet_sync(&mut self) -> Result<()> {
        *self.log.artnet.lock() += 1;
        Ok(())
    }
}
