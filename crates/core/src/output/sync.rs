use std::net::{SocketAddr, SocketAddrV4, UdpSocket};

use uuid::Uuid;

use super::artnet::{self, ARTNET_BROADCAST, ARTNET_PORT};
use super::e131;
use super::error::Result;

/// Sends the end of frame synchronization packets
pub trait SyncSender: Send {
    fn send_e131_sync(&mut self, sync_universe: u16) -> Result<()>;

    fn send_artnet_sync(&mut self) -> Result<()>;
}

/// Sync sender on a lazily bound UDP socket
pub struct UdpSyncSender {
    cid: [u8; 16],
    sequence: u8,
    socket: Option<UdpSocket>,
}

impl UdpSyncSender {
    pub fn new() -> Self {
        Self {
            cid: *Uuid::new_v4().as_bytes(),
            sequence: 0,
            socket: None,
        }
    }

    fn socket(&mut self) -> Result<&UdpSocket> {
        let socket = match self.socket.take() {
            Some(socket) => socket,
            None => {
                let socket = UdpSocket::bind("0.0.0.0:0")?;
                socket.set_broadcast(true)?;
                socket.set_multicast_loop_v4(false)?;
                socket
            }
        };
        Ok(&*self.socket.insert(socket))
    }
}

impl Default for UdpSyncSender {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncSender for UdpSyncSender {
    fn send_e131_sync(&mut self, sync_universe: u16) -> Result<()> {
        let packet = e131::build_sync_packet(&self.cid, self.sequence, sync_universe);
        self.sequence = self.sequence.wrapping_add(1);
        self.socket()?
            .send_to(&packet, e131::multicast_addr(sync_universe))?;
        Ok(())
    }

    fn send_artnet_sync(&mut self) -> Result<()> {
        let packet = artnet::build_sync_packet();
        let destination = SocketAddr::V4(SocketAddrV4::new(ARTNET_BROADCAST, ARTNET_PORT));
        self.socket()?.send_to(&packet, destination)?;
        Ok(())
    }
}
