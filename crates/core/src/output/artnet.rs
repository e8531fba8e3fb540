use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use artnet_protocol::{ArtCommand, Output as ArtOutput, PortAddress};

use super::error::{OutputError, Result};
use super::output::{OutputDriver, CHANNELS_PER_UNIVERSE};

pub const ARTNET_PORT: u16 = 6454;
pub const ARTNET_BROADCAST: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);
pub const ARTSYNC_PACKET_SIZE: usize = 14;

const ARTNET_ID: &[u8; 8] = b"Art-Net\0";
const OP_SYNC: u16 = 0x5200;
const PROTOCOL_VERSION: u16 = 14;

/// Build an OpDmx packet for one universe
pub fn build_dmx_packet(universe: u16, sequence: u8, data: &[u8]) -> Result<Vec<u8>> {
    let port_address = PortAddress::try_from(universe)
        .map_err(|e| OutputError::Protocol(format!("bad Art-Net universe {universe}: {e:?}")))?;

    // Art-Net requires an even data length
    let mut dmx = data.to_vec();
    if dmx.len() % 2 == 1 {
        dmx.push(0);
    }

    let command = ArtCommand::Output(ArtOutput {
        data: dmx.into(),
        port_address,
        sequence,
        ..ArtOutput::default()
    });

    command
        .write_to_buffer()
        .map_err(|e| OutputError::Protocol(format!("failed to encode Art-Net packet: {e:?}")))
}

/// Build an ArtSync packet
pub fn build_sync_packet() -> Vec<u8> {
    let mut packet = Vec::with_capacity(ARTSYNC_PACKET_SIZE);
    packet.extend_from_slice(ARTNET_ID);
    packet.extend_from_slice(&OP_SYNC.to_le_bytes());
    packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    packet.extend_from_slice(&[0, 0]);
    packet
}

pub fn destination(ip: &str) -> Result<SocketAddr> {
    let addr = if ip.is_empty() {
        ARTNET_BROADCAST
    } else {
        ip.parse()
            .map_err(|_| OutputError::InvalidAddress(ip.to_string()))?
    };
    Ok(SocketAddr::V4(SocketAddrV4::new(addr, ARTNET_PORT)))
}

pub struct ArtNetDriver {
    ip: String,
    universe: u16,
    data: Vec<u8>,
    sequence: u8,
    destination: Option<SocketAddr>,
    socket: Option<UdpSocket>,
}

impl ArtNetDriver {
    pub fn new(ip: &str, universe: u16, channels: usize) -> Self {
        Self {
            ip: ip.to_string(),
            universe,
            data: vec![0; channels],
            sequence: 0,
            destination: None,
            socket: None,
        }
    }
}

impl OutputDriver for ArtNetDriver {
    fn open(&mut self) -> Result<()> {
        let destination = destination(&self.ip)?;

        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| OutputError::OpenFailed {
            description: format!("ArtNet {} u{}", self.ip, self.universe),
            reason: e.to_string(),
        })?;
        socket.set_broadcast(true)?;

        self.destination = Some(destination);
        self.socket = Some(socket);
        log::info!(
            "Art-Net output opened: {} universe {} ({} channels)",
            destination,
            self.universe,
            self.data.len()
        );
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
        self.destination = None;
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
        let (Some(socket), Some(destination)) = (self.socket.as_ref(), self.destination) else {
            return Err(OutputError::NotOpen(format!("ArtNet u{}", self.universe)));
        };

        // Sequence 0 disables reordering on receivers, so skip it
        self.sequence = self.sequence.wrapping_add(1).max(1);

        for (i, chunk) in self.data.chunks(CHANNELS_PER_UNIVERSE).enumerate() {
            let universe = self.universe.wrapping_add(i as u16);
            let packet = build_dmx_packet(universe, self.sequence, chunk)?;
            socket.send_to(&packet, destination)?;
        }
        Ok(())
    }
}
