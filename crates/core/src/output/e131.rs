//! sACN (E1.31) output.
//!
//! Each universe an output spans is sent as its own 638 byte data packet,
//! either multicast to 239.255.hi.lo or unicast to the configured address.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use uuid::Uuid;

use super::error::{OutputError, Result};
use super::output::{OutputDriver, CHANNELS_PER_UNIVERSE};

pub const E131_PORT: u16 = 5568;
pub const E131_PACKET_SIZE: usize = 638;
pub const E131_SYNC_PACKET_SIZE: usize = 49;
pub const DEFAULT_PRIORITY: u8 = 100;

const ACN_PACKET_IDENTIFIER: [u8; 12] = [
    0x41, 0x53, 0x43, 0x2d, 0x45, 0x31, 0x2e, 0x31, 0x37, 0x00, 0x00, 0x00,
];
const VECTOR_ROOT_E131_DATA: u32 = 0x0000_0004;
const VECTOR_ROOT_E131_EXTENDED: u32 = 0x0000_0008;
const VECTOR_E131_DATA_PACKET: u32 = 0x0000_0002;
const VECTOR_E131_EXTENDED_SYNCHRONIZATION: u32 = 0x0000_0001;

/// Multicast group for a universe
pub fn multicast_addr(universe: u16) -> SocketAddr {
    let [hi, lo] = universe.to_be_bytes();
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(239, 255, hi, lo), E131_PORT))
}

/// Destination for a universe: multicast when no ip is given
pub fn destination(ip: &str, universe: u16) -> Result<SocketAddr> {
    if ip.is_empty() || ip.eq_ignore_ascii_case("multicast") {
        return Ok(multicast_addr(universe));
    }

    let addr: Ipv4Addr = ip
        .parse()
        .map_err(|_| OutputError::InvalidAddress(ip.to_string()))?;
    Ok(SocketAddr::V4(SocketAddrV4::new(addr, E131_PORT)))
}

fn write_root_layer(packet: &mut [u8], vector: u32, cid: &[u8; 16]) {
    packet[0..2].copy_from_slice(&0x0010u16.to_be_bytes());
    packet[2..4].copy_from_slice(&0x0000u16.to_be_bytes());
    packet[4..16].copy_from_slice(&ACN_PACKET_IDENTIFIER);
    let root_length = (packet.len() - 16) as u16;
    packet[16..18].copy_from_slice(&(0x7000 | root_length).to_be_bytes());
    packet[18..22].copy_from_slice(&vector.to_be_bytes());
    packet[22..38].copy_from_slice(cid);
}

/// Fields of a data packet that vary between sends
pub struct DataPacketHeader<'a> {
    pub cid: &'a [u8; 16],
    pub source_name: &'a str,
    pub priority: u8,
    pub sync_universe: u16,
    pub sequence: u8,
    pub universe: u16,
}

/// Build a full E1.31 data packet, `data` is padded or truncated to 512 slots
pub fn build_data_packet(header: &DataPacketHeader<'_>, data: &[u8]) -> Vec<u8> {
    let mut packet = vec![0u8; E131_PACKET_SIZE];
    write_root_layer(&mut packet, VECTOR_ROOT_E131_DATA, header.cid);

    // Framing layer
    let framing_length = (E131_PACKET_SIZE - 38) as u16;
    packet[38..40].copy_from_slice(&(0x7000 | framing_length).to_be_bytes());
    packet[40..44].copy_from_slice(&VECTOR_E131_DATA_PACKET.to_be_bytes());
    let name = header.source_name.as_bytes();
    let name_len = name.len().min(63);
    packet[44..44 + name_len].copy_from_slice(&name[..name_len]);
    packet[108] = header.priority;
    packet[109..111].copy_from_slice(&header.sync_universe.to_be_bytes());
    packet[111] = header.sequence;
    packet[112] = 0;
    packet[113..115].copy_from_slice(&header.universe.to_be_bytes());

    // DMP layer
    let dmp_length = (E131_PACKET_SIZE - 115) as u16;
    packet[115..117].copy_from_slice(&(0x7000 | dmp_length).to_be_bytes());
    packet[117] = 0x02;
    packet[118] = 0xa1;
    packet[119..121].copy_from_slice(&0x0000u16.to_be_bytes());
    packet[121..123].copy_from_slice(&0x0001u16.to_be_bytes());
    packet[123..125].copy_from_slice(&513u16.to_be_bytes());
    packet[125] = 0x00;

    let count = data.len().min(CHANNELS_PER_UNIVERSE);
    packet[126..126 + count].copy_from_slice(&data[..count]);
    packet
}

/// Build an E1.31 synchronization packet
pub fn build_sync_packet(cid: &[u8; 16], sequence: u8, sync_universe: u16) -> Vec<u8> {
    let mut packet = vec![0u8; E131_SYNC_PACKET_SIZE];
    write_root_layer(&mut packet, VECTOR_ROOT_E131_EXTENDED, cid);

    let framing_length = (E131_SYNC_PACKET_SIZE - 38) as u16;
    packet[38..40].copy_from_slice(&(0x7000 | framing_length).to_be_bytes());
    packet[40..44].copy_from_slice(&VECTOR_E131_EXTENDED_SYNCHRONIZATION.to_be_bytes());
    packet[44] = sequence;
    packet[45..47].copy_from_slice(&sync_universe.to_be_bytes());
    packet
}

pub struct E131Driver {
    ip: String,
    universe: u16,
    source_name: String,
    cid: [u8; 16],
    priority: u8,
    sync_universe: u16,
    data: Vec<u8>,
    sequences: Vec<u8>,
    socket: Option<UdpSocket>,
}

impl E131Driver {
    pub fn new(ip: &str, universe: u16, channels: usize, description: &str) -> Self {
        let universes = channels.div_ceil(CHANNELS_PER_UNIVERSE).max(1);
        let source_name = if description.is_empty() {
            "Marquee".to_string()
        } else {
            description.to_string()
        };

        Self {
            ip: ip.to_string(),
            universe,
            source_name,
            cid: *Uuid::new_v4().as_bytes(),
            priority: DEFAULT_PRIORITY,
            sync_universe: 0,
            data: vec![0; channels],
            sequences: vec![0; universes],
            socket: None,
        }
    }

    fn send_universes(&mut self) -> Result<()> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(OutputError::NotOpen(format!("E131 u{}", self.universe)));
        };

        for (i, chunk) in self.data.chunks(CHANNELS_PER_UNIVERSE).enumerate() {
            let universe = self.universe.wrapping_add(i as u16);
            let header = DataPacketHeader {
                cid: &self.cid,
                source_name: &self.source_name,
                priority: self.priority,
                sync_universe: self.sync_universe,
                sequence: self.sequences[i],
                universe,
            };
            let packet = build_data_packet(&header, chunk);
            socket.send_to(&packet, destination(&self.ip, universe)?)?;
            self.sequences[i] = self.sequences[i].wrapping_add(1);
        }

        log::trace!("Sent sACN frame for {} u{}", self.ip, self.universe);
        Ok(())
    }
}

impl OutputDriver for E131Driver {
    fn open(&mut self) -> Result<()> {
        destination(&self.ip, self.universe)?;

        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| OutputError::OpenFailed {
            description: format!("E131 {} u{}", self.ip, self.universe),
            reason: e.to_string(),
        })?;
        socket.set_multicast_loop_v4(false)?;
        self.socket = Some(socket);

        log::info!(
            "sACN output opened: {} universe {} ({} channels)",
            if self.ip.is_empty() { "multicast" } else { &self.ip },
            self.universe,
            self.data.len()
        );
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
    }

    fn set_channels(&mut self, offset: usize, data: &[u8]) {
        let end = (offset + data.len()).min(self.data.len());
        if offset >= end {
            return;
        }
        self.data[offset..end].copy_from_slice(&data[..end - offset]);
    }

    fn all_off(&mut self) {
        self.data.fill(0);
    }

    fn end_frame(&mut self) -> Result<()> {
        self.send_universes()
    }

    fn set_sync_universe(&mut self, universe: u16) {
        self.sync_universe = universe;
    }
}
