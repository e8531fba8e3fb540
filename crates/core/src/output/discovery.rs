//! Finding controllers on the network.
//!
//! Art-Net nodes answer an ArtPoll broadcast with ArtPollReply; sACN sources
//! announce their universes on the universe discovery multicast group.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use super::artnet::{ARTNET_BROADCAST, ARTNET_PORT};
use super::e131::E131_PORT;
use super::error::Result;
use super::output::{OutputConfig, CHANNELS_PER_UNIVERSE};

const OP_POLL: u16 = 0x2000;
const OP_POLL_REPLY: u16 = 0x2100;
const ARTPOLL_REPLY_MIN_SIZE: usize = 207;

const E131_DISCOVERY_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 250, 214);
const VECTOR_ROOT_E131_EXTENDED: u32 = 0x0000_0008;
const VECTOR_E131_EXTENDED_DISCOVERY: u32 = 0x0000_0002;
const VECTOR_UNIVERSE_DISCOVERY_UNIVERSE_LIST: u32 = 0x0000_0001;

pub trait Discoverer {
    /// Protocol name for logging
    fn name(&self) -> &'static str;

    /// Collect outputs for every controller heard within `timeout`
    fn discover(&mut self, timeout: Duration) -> Result<Vec<OutputConfig>>;
}

/// Build an ArtPoll packet asking nodes to reply
pub fn build_artpoll() -> Vec<u8> {
    let mut packet = Vec::with_capacity(14);
    packet.extend_from_slice(b"Art-Net\0");
    packet.extend_from_slice(&OP_POLL.to_le_bytes());
    packet.extend_from_slice(&14u16.to_be_bytes());
    // TalkToMe, priority
    packet.extend_from_slice(&[0x00, 0x00]);
    packet
}

/// Outputs advertised by an ArtPollReply, one per active output port
pub fn parse_artpoll_reply(packet: &[u8]) -> Option<Vec<OutputConfig>> {
    if packet.len() < ARTPOLL_REPLY_MIN_SIZE || &packet[0..8] != b"Art-Net\0" {
        return None;
    }
    if u16::from_le_bytes([packet[8], packet[9]]) != OP_POLL_REPLY {
        return None;
    }

    let ip = Ipv4Addr::new(packet[10], packet[11], packet[12], packet[13]);
    let net = packet[18] as u16;
    let sub_net = packet[19] as u16;
    let short_name = String::from_utf8_lossy(&packet[26..44])
        .trim_end_matches('\0')
        .to_string();
    let ports = (u16::from_be_bytes([packet[172], packet[173]]) as usize).min(4);

    let outputs = (0..ports)
        .map(|port| {
            let universe = (net << 8) | (sub_net << 4) | (packet[190 + port] as u16 & 0x0F);
            OutputConfig::artnet(&ip.to_string(), universe, CHANNELS_PER_UNIVERSE)
                .with_description(&short_name)
        })
        .collect();
    Some(outputs)
}

/// Universes announced by an E1.31 universe discovery packet
pub fn parse_universe_discovery(packet: &[u8]) -> Option<(String, Vec<u16>)> {
    if packet.len() < 120 {
        return None;
    }
    let vector = |at: usize| u32::from_be_bytes([packet[at], packet[at + 1], packet[at + 2], packet[at + 3]]);
    if vector(18) != VECTOR_ROOT_E131_EXTENDED
        || vector(40) != VECTOR_E131_EXTENDED_DISCOVERY
        || vector(114) != VECTOR_UNIVERSE_DISCOVERY_UNIVERSE_LIST
    {
        return None;
    }

    let source_name = String::from_utf8_lossy(&packet[44..108])
        .trim_end_matches('\0')
        .to_string();
    let universes = packet[120..]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Some((source_name, universes))
}

fn merge_unique(found: &mut Vec<OutputConfig>, configs: Vec<OutputConfig>) {
    for config in configs {
        if !found.iter().any(|f| f.same_destination(&config)) {
            found.push(config);
        }
    }
}

pub struct ArtNetDiscoverer {
    bind_ip: Ipv4Addr,
}

impl ArtNetDiscoverer {
    pub fn new(force_local_ip: Option<&str>) -> Self {
        let bind_ip = force_local_ip
            .and_then(|ip| ip.parse().ok())
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        Self { bind_ip }
    }
}

impl Discoverer for ArtNetDiscoverer {
    fn name(&self) -> &'static str {
        "ArtNet"
    }

    fn discover(&mut self, timeout: Duration) -> Result<Vec<OutputConfig>> {
        let socket = UdpSocket::bind((self.bind_ip, ARTNET_PORT))?;
        socket.set_broadcast(true)?;
        socket.send_to(
            &build_artpoll(),
            SocketAddr::new(IpAddr::V4(ARTNET_BROADCAST), ARTNET_PORT),
        )?;

        let mut found = Vec::new();
        let mut buffer = [0u8; 1024];
        let deadline = Instant::now() + timeout;

        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            if remaining.is_zero() {
                break;
            }
            socket.set_read_timeout(Some(remaining))?;
            match socket.recv_from(&mut buffer) {
                Ok((len, from)) => {
                    if let Some(configs) = parse_artpoll_reply(&buffer[..len]) {
                        log::debug!("ArtPollReply from {} with {} ports", from, configs.len());
                        merge_unique(&mut found, configs);
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    break
                }
                Err(e) => return Err(e.into()),
            }
        }

        log::info!("Art-Net discovery found {} outputs", found.len());
        Ok(found)
    }
}

pub struct E131Discoverer {
    bind_ip: Ipv4Addr,
}

impl E131Discoverer {
    pub fn new(force_local_ip: Option<&str>) -> Self {
        let bind_ip = force_local_ip
            .and_then(|ip| ip.parse().ok())
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        Self { bind_ip }
    }
}

impl Discoverer for E131Discoverer {
    fn name(&self) -> &'static str {
        "E131"
    }

    fn discover(&mut self, timeout: Duration) -> Result<Vec<OutputConfig>> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, E131_PORT))?;
        socket.join_multicast_v4(&E131_DISCOVERY_GROUP, &self.bind_ip)?;

        let mut found = Vec::new();
        let mut buffer = [0u8; 1144];
        let deadline = Instant::now() + timeout;

        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            if remaining.is_zero() {
                break;
            }
            socket.set_read_timeout(Some(remaining))?;
            match socket.recv_from(&mut buffer) {
                Ok((len, from)) => {
                    if let Some((name, universes)) = parse_universe_discovery(&buffer[..len]) {
                        let configs = universes
                            .into_iter()
                            .map(|u| {
                                OutputConfig::e131(&from.ip().to_string(), u, CHANNELS_PER_UNIVERSE)
                                    .with_description(&name)
                            })
                            .collect();
                        merge_unique(&mut found, configs);
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    break
                }
                Err(e) => return Err(e.into()),
            }
        }

        log::info!("sACN discovery found {} outputs", found.len());
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ProtocolKind;

    fn poll_reply() -> Vec<u8> {
        let mut packet = vec![0u8; 239];
        packet[0..8].copy_from_slice(b"Art-Net\0");
        packet[8..10].copy_from_slice(&OP_POLL_REPLY.to_le_bytes());
        packet[10..14].copy_from_slice(&[192, 168, 1, 60]);
        packet[18] = 0;
        packet[19] = 1;
        packet[26..33].copy_from_slice(b"Pixlite");
        packet[172..174].copy_from_slice(&2u16.to_be_bytes());
        packet[190] = 0;
        packet[191] = 1;
        packet
    }

    #[test]
    fn test_artpoll_packet() {
        let packet = build_artpoll();
        assert_eq!(packet.len(), 14);
        assert_eq!(&packet[8..10], &[0x00, 0x20]);
    }

    #[test]
    fn test_parse_artpoll_reply() {
        let outputs = parse_artpoll_reply(&poll_reply()).unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].kind, ProtocolKind::ArtNet);
        assert_eq!(outputs[0].ip, "192.168.1.60");
        assert_eq!(outputs[0].universe, 16);
        assert_eq!(outputs[1].universe, 17);
        assert_eq!(outputs[0].description, "Pixlite");
    }

    #[test]
    fn test_rejects_other_opcodes() {
        let mut packet = poll_reply();
        packet[8..10].copy_from_slice(&OP_POLL.to_le_bytes());
        assert!(parse_artpoll_reply(&packet).is_none());
        assert!(parse_artpoll_reply(&packet[..20]).is_none());
    }

    #[test]
    fn test_parse_universe_discovery() {
        let mut packet = vec![0u8; 124];
        packet[18..22].copy_from_slice(&VECTOR_ROOT_E131_EXTENDED.to_be_bytes());
        packet[40..44].copy_from_slice(&VECTOR_E131_EXTENDED_DISCOVERY.to_be_bytes());
        packet[44..48].copy_from_slice(b"Show");
        packet[114..118].copy_from_slice(&VECTOR_UNIVERSE_DISCOVERY_UNIVERSE_LIST.to_be_bytes());
        packet[120..122].copy_from_slice(&1u16.to_be_bytes());
        packet[122..124].copy_from_slice(&2u16.to_be_bytes());

        let (name, universes) = parse_universe_discovery(&packet).unwrap();
        assert_eq!(name, "Show");
        assert_eq!(universes, vec![1, 2]);
    }
}
