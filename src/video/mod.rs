//! # Video Module
//!
//! Receives the drone's encoded video stream and hands complete frames to
//! an external decoder.
//!
//! This module handles:
//! - Connecting to the video TCP port
//! - Stripping the PaVE encapsulation from each frame
//! - Forwarding frames on a bounded channel

pub mod pave;

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use pave::{PaveDemuxer, PaveHeader, VideoFrame};

/// Running video relay task
pub struct VideoRelay {
    closed: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl VideoRelay {
    /// Connect to the drone's video port and start relaying frames.
    ///
    /// # Arguments
    ///
    /// * `addr` - Drone video endpoint (port 5555 by default)
    /// * `capacity` - Frames buffered before the relay waits for the consumer
    ///
    /// # Returns
    ///
    /// The relay and the receiving end of the frame channel
    ///
    /// # Errors
    ///
    /// Returns error if the TCP connection fails
    pub async fn connect(
        addr: SocketAddr,
        capacity: usize,
    ) -> std::io::Result<(Self, mpsc::Receiver<VideoFrame>)> {
        let stream = TcpStream::connect(addr).await?;
        info!("Connected to video stream at {}", addr);
        Ok(Self::spawn(stream, capacity))
    }

    /// Start relaying frames read from any byte stream
    pub fn spawn<R>(reader: R, capacity: usize) -> (Self, mpsc::Receiver<VideoFrame>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (frames_tx, frames_rx) = mpsc::channel(capacity);
        let (closed_tx, closed_rx) = watch::channel(false);
        let task = tokio::spawn(relay(reader, frames_tx, closed_rx));
        (
            Self {
                closed: closed_tx,
                task,
            },
            frames_rx,
        )
    }

    /// Stop relaying and wait for the task to exit
    pub async fn stop(self) {
        self.closed.send_replace(true);
        if let Err(e) = self.task.await {
            warn!("Video relay task failed: {}", e);
        }
        info!("Video relay stopped");
    }
}

async fn relay<R>(
    mut reader: R,
    frames: mpsc::Sender<VideoFrame>,
    mut closed: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let mut demuxer = PaveDemuxer::new();
    let mut chunk = vec![0u8; 16 * 1024];

    loop {
        let read = tokio::select! {
            _ = closed.changed() => break,
            read = reader.read(&mut chunk) => read,
        };

        match read {
            Ok(0) => {
                info!("Video stream closed by drone");
                break;
            }
            Ok(n) => demuxer.extend(&chunk[..n]),
            Err(e) => {
                warn!("Video stream read failed: {}", e);
                break;
            }
        }

        loop {
            match demuxer.next_frame() {
                Ok(Some(frame)) => {
                    tokio::select! {
                        _ = closed.changed() => return,
                        sent = frames.send(frame) => {
                            if sent.is_err() {
                                info!("Video consumer dropped, stopping relay");
                                return;
                            }
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => warn!("Dropping malformed video frame: {}", e),
            }
        }
    }
}
