//! # Transport Module
//!
//! Datagram I/O abstractions for the AT command and NavData channels.
//!
//! This module handles:
//! - Binding UDP sockets on the host side
//! - Sending AT frames to the drone's command port
//! - Receiving NavData datagrams from the drone
//! - Trait seams so the scheduler and listener can be tested without sockets

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

/// Trait for sending datagrams to the drone
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatagramSink: Send + Sync {
    /// Send one datagram, returning the number of bytes sent
    async fn send(&self, payload: &[u8]) -> io::Result<usize>;
}

/// Trait for receiving datagrams from the drone
#[async_trait]
pub trait DatagramSource: Send + Sync {
    /// Receive one datagram into `buf`, returning its length
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// UDP socket paired with the drone's address on that channel.
#[derive(Debug)]
pub struct UdpLink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpLink {
    /// Bind a local UDP port and remember the peer to talk to.
    ///
    /// # Arguments
    ///
    /// * `local_port` - Host port to bind (0 picks any free port)
    /// * `peer` - Drone address for this channel (e.g. `192.168.1.1:5556`)
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be bound
    pub async fn bind(local_port: u16, peer: SocketAddr) -> io::Result<Self> {
        let local = SocketAddr::from(([0, 0, 0, 0], local_port));
        let socket = UdpSocket::bind(local).await?;
        debug!("Bound UDP {} for peer {}", socket.local_addr()?, peer);
        Ok(Self { socket, peer })
    }

    /// Address of the drone on this channel
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Local address of the bound socket
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl DatagramSink for UdpLink {
    async fn send(&self, payload: &[u8]) -> io::Result<usize> {
        self.socket.send_to(payload, self.peer).await
    }
}

#[async_trait]
impl DatagramSource for UdpLink {
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let (len, from) = self.socket.recv_from(buf).await?;
        if from.ip() != self.peer.ip() {
            debug!("Datagram of {} bytes from unexpected peer {}", len, from);
        }
        Ok(len)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udp_link_roundtrip_over_loopback() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = receiver.local_addr().unwrap();

        let link = UdpLink::bind(0, peer).await.unwrap();
        assert_eq!(link.peer(), peer);

        let sent = DatagramSink::send(&link, b"AT*COMWDG=1\r").await.unwrap();
        assert_eq!(sent, 12);

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"AT*COMWDG=1\r");
    }

    #[tokio::test]
    async fn test_recording_sink_error() {
        let sink = mocks::RecordingSink::new();
        sink.set_send_error(Some(io::ErrorKind::ConnectionRefused));
        assert!(sink.send(b"x").await.is_err());
        sink.set_send_error(None);
        assert_eq!(sink.send(b"xy").await.unwrap(), 2);
        assert_eq!(sink.frames(), vec!["xy".to_string()]);
    }
}
