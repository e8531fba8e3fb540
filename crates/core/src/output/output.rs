use std::fmt;

use serde::{Deserialize, Serialize};

use super::artnet::ArtNetDriver;
use super::e131::E131Driver;
use super::error::Result;
use super::null::NullDriver;
use super::serial::{DmxSerialDriver, RenardDriver};

/// Channels carried by one DMX universe
pub const CHANNELS_PER_UNIVERSE: usize = 512;

const DEFAULT_BAUD_RATE: u32 = 115_200;

/// The closed set of protocols an output can speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolKind {
    #[serde(rename = "NULL")]
    Null,
    #[serde(rename = "E131")]
    E131,
    #[serde(rename = "ArtNet")]
    ArtNet,
    #[serde(rename = "DMX")]
    Dmx,
    #[serde(rename = "Renard")]
    Renard,
}

impl ProtocolKind {
    pub fn is_ip(&self) -> bool {
        matches!(self, ProtocolKind::E131 | ProtocolKind::ArtNet)
    }

    pub fn is_serial(&self) -> bool {
        matches!(self, ProtocolKind::Dmx | ProtocolKind::Renard)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProtocolKind::Null => "NULL",
            ProtocolKind::E131 => "E131",
            ProtocolKind::ArtNet => "ArtNet",
            ProtocolKind::Dmx => "DMX",
            ProtocolKind::Renard => "Renard",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Persisted description of one output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub kind: ProtocolKind,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub universe: u16,
    #[serde(default)]
    pub comm_port: String,
    #[serde(default)]
    pub baud_rate: u32,
    pub channels: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    /// Id of the physical controller this output belongs to, if any
    #[serde(default)]
    pub controller: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl OutputConfig {
    pub fn null(channels: usize) -> Self {
        Self {
            kind: ProtocolKind::Null,
            ip: String::new(),
            universe: 0,
            comm_port: String::new(),
            baud_rate: 0,
            channels,
            enabled: true,
            description: String::new(),
            controller: None,
        }
    }

    pub fn e131(ip: &str, universe: u16, channels: usize) -> Self {
        Self {
            kind: ProtocolKind::E131,
            ip: ip.to_string(),
            universe,
            ..Self::null(channels)
        }
    }

    pub fn artnet(ip: &str, universe: u16, channels: usize) -> Self {
        Self {
            kind: ProtocolKind::ArtNet,
            ip: ip.to_string(),
            universe,
            ..Self::null(channels)
        }
    }

    pub fn serial(kind: ProtocolKind, comm_port: &str, baud_rate: u32, channels: usize) -> Self {
        Self {
            kind,
            comm_port: comm_port.to_string(),
            baud_rate,
            ..Self::null(channels)
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Effective baud rate, 0 means the protocol default
    pub fn baud_rate(&self) -> u32 {
        if self.baud_rate == 0 {
            DEFAULT_BAUD_RATE
        } else {
            self.baud_rate
        }
    }

    /// Number of consecutive universes an IP output spans
    pub fn universes(&self) -> usize {
        if self.kind.is_ip() {
            self.channels.div_ceil(CHANNELS_PER_UNIVERSE).max(1)
        } else {
            1
        }
    }

    /// Two configs address the same physical destination
    pub fn same_destination(&self, other: &OutputConfig) -> bool {
        if self.kind != other.kind {
            return false;
        }

        if self.kind.is_ip() {
            self.universe == other.universe && self.ip == other.ip
        } else {
            self.comm_port == other.comm_port
        }
    }

    /// Human readable destination, e.g. "E131 10.0.0.5 u1"
    pub fn destination(&self) -> String {
        if self.kind.is_ip() {
            format!("{} {} u{}", self.kind, self.ip, self.universe)
        } else if self.kind.is_serial() {
            format!("{} {}@{}", self.kind, self.comm_port, self.baud_rate())
        } else {
            self.kind.to_string()
        }
    }
}

/// Protocol specific transport behind an [`Output`].
///
/// Offsets passed to `set_channels` are 0-based within the output. Drivers
/// buffer channel data and only put it on the wire in `end_frame`.
pub trait OutputDriver: Send {
    fn open(&mut self) -> Result<()>;

    fn close(&mut self);

    fn start_frame(&mut self, _msec: u64) {}

    fn reset_frame(&mut self) {}

    fn set_channels(&mut self, offset: usize, data: &[u8]);

    fn all_off(&mut self);

    fn end_frame(&mut self) -> Result<()>;

    /// Universe that sync packets are sent to, 0 when sync is off
    fn set_sync_universe(&mut self, _universe: u16) {}
}

/// Build the driver for a config's protocol
pub fn create_driver(config: &OutputConfig) -> Box<dyn OutputDriver> {
    match config.kind {
        ProtocolKind::Null => Box::new(NullDriver::new(config.channels)),
        ProtocolKind::E131 => Box::new(E131Driver::new(
            &config.ip,
            config.universe,
            config.channels,
            &config.description,
        )),
        ProtocolKind::ArtNet => {
            Box::new(ArtNetDriver::new(&config.ip, config.universe, config.channels))
        }
        ProtocolKind::Dmx => Box::new(DmxSerialDriver::new(&config.comm_port, config.channels)),
        ProtocolKind::Renard => Box::new(RenardDriver::new(&config.comm_port, config.channels)),
    }
}

/// One protocol destination carrying a contiguous channel range
pub struct Output {
    config: OutputConfig,
    output_number: usize,
    start_channel: usize,
    null_number: Option<usize>,
    dirty: bool,
    ok: bool,
    open: bool,
    driver: Box<dyn OutputDriver>,
}

impl Output {
    pub fn new(config: OutputConfig) -> Self {
        let driver = create_driver(&config);
        Self::with_driver(config, driver)
    }

    /// Build an output around an explicit driver
    pub fn with_driver(config: OutputConfig, driver: Box<dyn OutputDriver>) -> Self {
        Self {
            config,
            output_number: 0,
            start_channel: 0,
            null_number: None,
            dirty: true,
            ok: true,
            open: false,
            driver,
        }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn kind(&self) -> ProtocolKind {
        self.config.kind
    }

    pub fn channels(&self) -> usize {
        self.config.channels
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn ip(&self) -> &str {
        &self.config.ip
    }

    pub fn universe(&self) -> u16 {
        self.config.universe
    }

    pub fn comm_port(&self) -> &str {
        &self.config.comm_port
    }

    pub fn is_ip_output(&self) -> bool {
        self.config.kind.is_ip()
    }

    pub fn is_serial_output(&self) -> bool {
        self.config.kind.is_serial()
    }

    /// 1-based position in the output list
    pub fn output_number(&self) -> usize {
        self.output_number
    }

    /// 1-based first channel in the global channel space
    pub fn start_channel(&self) -> usize {
        self.start_channel
    }

    /// 1-based last channel in the global channel space
    pub fn end_channel(&self) -> usize {
        self.start_channel + self.config.channels - 1
    }

    pub fn null_number(&self) -> Option<usize> {
        self.null_number
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
        self.dirty = true;
    }

    pub fn set_description(&mut self, description: &str) {
        self.config.description = description.to_string();
        self.dirty = true;
    }

    pub fn set_controller(&mut self, controller: Option<String>) {
        self.config.controller = controller;
        self.dirty = true;
    }

    pub(crate) fn set_transient_data(
        &mut self,
        output_number: usize,
        start_channel: usize,
        null_number: Option<usize>,
    ) {
        self.output_number = output_number;
        self.start_channel = start_channel;
        self.null_number = null_number;
    }

    pub(crate) fn set_sync_universe(&mut self, universe: u16) {
        self.driver.set_sync_universe(universe);
    }

    pub fn open(&mut self) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        match self.driver.open() {
            Ok(()) => {
                self.ok = true;
                self.open = true;
                Ok(())
            }
            Err(e) => {
                self.ok = false;
                self.open = false;
                Err(e)
            }
        }
    }

    pub fn close(&mut self) {
        if self.open {
            self.driver.close();
            self.open = false;
        }
    }

    pub fn start_frame(&mut self, msec: u64) {
        if self.open {
            self.driver.start_frame(msec);
        }
    }

    pub fn reset_frame(&mut self) {
        if self.open {
            self.driver.reset_frame();
        }
    }

    /// Write `data` starting at the 0-based `offset` within this output,
    /// truncated to the output's channel count
    pub fn set_many_channels(&mut self, offset: usize, data: &[u8]) {
        if !self.config.enabled || offset >= self.config.channels {
            return;
        }

        let count = data.len().min(self.config.channels - offset);
        self.driver.set_channels(offset, &data[..count]);
    }

    pub fn all_off(&mut self) {
        self.driver.all_off();
    }

    pub fn end_frame(&mut self) -> Result<()> {
        if !self.open || !self.config.enabled {
            return Ok(());
        }

        let result = self.driver.end_frame();
        self.ok = result.is_ok();
        result
    }
}

impl PartialEq for Output {
    fn eq(&self, other: &Self) -> bool {
        self.config.same_destination(&other.config)
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("config", &self.config)
            .field("output_number", &self.output_number)
            .field("start_channel", &self.start_channel)
            .field("open", &self.open)
            .finish()
    }
}
