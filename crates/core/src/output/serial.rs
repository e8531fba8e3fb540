//! Serial outputs. Frames are encoded here and written to the comm port
//! device node; line settings are left to the operating system.

use std::fs::{File, OpenOptions};
use std::io::Write;

use super::error::{OutputError, Result};
use super::output::OutputDriver;

const ENTTEC_START: u8 = 0x7E;
const ENTTEC_END: u8 = 0xE7;
const ENTTEC_SEND_DMX_LABEL: u8 = 6;
const DMX_MAX_CHANNELS: usize = 512;

const RENARD_SYNC: u8 = 0x7E;
const RENARD_ADDRESS: u8 = 0x80;

/// Encode an Enttec DMX USB Pro "send DMX" message
pub fn encode_enttec(data: &[u8]) -> Vec<u8> {
    let count = data.len().min(DMX_MAX_CHANNELS);
    // Payload is the start code plus the channel data
    let length = (count + 1) as u16;
    let [lsb, msb] = length.to_le_bytes();

    let mut frame = Vec::with_capacity(count + 6);
    frame.push(ENTTEC_START);
    frame.push(ENTTEC_SEND_DMX_LABEL);
    frame.push(lsb);
    frame.push(msb);
    frame.push(0x00);
    frame.extend_from_slice(&data[..count]);
    frame.push(ENTTEC_END);
    frame
}

/// Encode a Renard frame. Values colliding with the control bytes are
/// escaped with 0x7F followed by an offset code.
pub fn encode_renard(data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(data.len() + 2);
    frame.push(RENARD_SYNC);
    frame.push(RENARD_ADDRESS);
    for &value in data {
        match value {
            0x7D => frame.extend_from_slice(&[0x7F, 0x2F]),
            0x7E => frame.extend_from_slice(&[0x7F, 0x30]),
            0x7F => frame.extend_from_slice(&[0x7F, 0x31]),
            v => frame.push(v),
        }
    }
    frame
}

fn open_port(port: &str, kind: &str) -> Result<File> {
    if port.is_empty() {
        return Err(OutputError::InvalidAddress(format!("{kind} with no comm port")));
    }

    OpenOptions::new()
        .write(true)
        .open(port)
        .map_err(|e| OutputError::OpenFailed {
            description: format!("{kind} {port}"),
            reason: e.to_string(),
        })
}

fn write_frame(port: &mut Option<File>, name: &str, frame: &[u8]) -> Result<()> {
    let Some(file) = port.as_mut() else {
        return Err(OutputError::NotOpen(name.to_string()));
    };
    file.write_all(frame)?;
    file.flush()?;
    Ok(())
}

/// Enttec Pro compatible DMX interface
pub struct DmxSerialDriver {
    comm_port: String,
    data: Vec<u8>,
    changed: bool,
    port: Option<File>,
}

impl DmxSerialDriver {
    pub fn new(comm_port: &str, channels: usize) -> Self {
        Self {
            comm_port: comm_port.to_string(),
            data: vec![0; channels.min(DMX_MAX_CHANNELS)],
            changed: true,
            port: None,
        }
    }
}

impl OutputDriver for DmxSerialDriver {
    fn open(&mut self) -> Result<()> {
        self.port = Some(open_port(&self.comm_port, "DMX")?);
        log::info!("DMX output opened on {}", self.comm_port);
        Ok(())
    }

    fn close(&mut self) {
        self.port = None;
    }

    fn set_channels(&mut self, offset: usize, data: &[u8]) {
        let end = (offset + data.len()).min(self.data.len());
        if offset < end && self.data[offset..end] != data[..end - offset] {
            self.data[offset..end].copy_from_slice(&data[..end - offset]);
            self.changed = true;
        }
    }

    fn all_off(&mut self) {
        self.data.fill(0);
        self.changed = true;
    }

    fn end_frame(&mut self) -> Result<()> {
        // The interface keeps refreshing the last frame it was given
        if !self.changed {
            return Ok(());
        }
        write_frame(&mut self.port, &self.comm_port, &encode_enttec(&self.data))?;
        self.changed = false;
        Ok(())
    }
}

/// Renard controller chain on a serial port
pub struct RenardDriver {
    comm_port: String,
    data: Vec<u8>,
    port: Option<File>,
}

impl RenardDriver {
    pub fn new(comm_port: &str, channels: usize) -> Self {
        Self {
            comm_port: comm_port.to_string(),
            data: vec![0; channels],
            port: None,
        }
    }
}

impl OutputDriver for RenardDriver {
    fn open(&mut self) -> Result<()> {
        self.port = Some(open_port(&self.comm_port, "Renard")?);
        log::info!("Renard output opened on {}", self.comm_port);
        Ok(())
    }

    fn close(&mut self) {
        self.port = None;
    }

    fn set_channels(&mut self, offset: usize, data: &[u8]) {
        let end = (offset + data.len()).min(self.data.len());
        if offset < end {
            self.data[offset..end].copy_from_slice(&data[..end - offset]);
        }
    }

    fn all_off(&mut self) {
        self.data.fill(0);
    }

    fn end_frame(&mut self) -> Result<()> {
        write_frame(&mut self.port, &self.comm_port, &encode_renard(&self.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enttec_frame() {
        let frame = encode_enttec(&[1, 2, 3]);
        assert_eq!(frame, vec![0x7E, 6, 4, 0, 0, 1, 2, 3, 0xE7]);
    }

    #[test]
    fn test_enttec_caps_at_512() {
        let frame = encode_enttec(&[0u8; 600]);
        assert_eq!(frame.len(), 512 + 6);
        assert_eq!(&frame[2..4], &513u16.to_le_bytes());
    }

    #[test]
    fn test_renard_escapes() {
        let frame = encode_renard(&[0x10, 0x7D, 0x7E, 0x7F, 0xFF]);
        assert_eq!(
            frame,
            vec![0x7E, 0x80, 0x10, 0x7F, 0x2F, 0x7F, 0x30, 0x7F, 0x31, 0xFF]
        );
    }

    #[test]
    fn test_dmx_writes_to_device() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let mut driver = DmxSerialDriver::new(&path, 4);
        driver.open().unwrap();
        driver.set_channels(1, &[9, 8]);
        driver.end_frame().unwrap();
        // Unchanged data is not rewritten
        driver.end_frame().unwrap();
        driver.close();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, vec![0x7E, 6, 5, 0, 0, 0, 9, 8, 0, 0xE7]);
    }

    #[test]
    fn test_open_missing_port_fails() {
        let mut driver = RenardDriver::new("", 8);
        assert!(driver.open().is_err());
    }
}
