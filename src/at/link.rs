//! # AT Link
//!
//! Numbers and transmits AT frames over a datagram sink.
//!
//! The drone ignores any frame whose sequence number is not larger than the
//! last one it accepted, so every frame sent by this process goes through
//! one counter. The first frame carries sequence number 1.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::command::Command;
use crate::error::Result;
use crate::transport::DatagramSink;

/// Sequence-numbered AT frame transmitter
pub struct AtLink {
    sink: Arc<dyn DatagramSink>,
    sequence: Mutex<u32>,
}

impl AtLink {
    /// Create a link whose next frame will carry sequence number 1
    pub fn new(sink: Arc<dyn DatagramSink>) -> Self {
        Self {
            sink,
            sequence: Mutex::new(0),
        }
    }

    /// Last sequence number handed out
    pub async fn sequence(&self) -> u32 {
        *self.sequence.lock().await
    }

    /// Number, pack and send one command.
    ///
    /// The counter stays locked from increment to send, so frames leave in
    /// sequence order even with concurrent callers.
    ///
    /// # Arguments
    ///
    /// * `command` - Command to transmit
    ///
    /// # Returns
    ///
    /// The sequence number the frame was sent with
    ///
    /// # Errors
    ///
    /// Returns `DroneError::Command` if the command cannot be packed (no
    /// sequence number is consumed) or `DroneError::Io` if the send fails
    /// (the number stays consumed).
    pub async fn transmit(&self, command: &Command) -> Result<u32> {
        let mut sequence = self.sequence.lock().await;
        let seq = sequence.wrapping_add(1);
        let frame = command.pack(seq)?;
        *sequence = seq;

        self.sink.send(&frame).await?;
        debug!("TX {}", String::from_utf8_lossy(&frame).trim_end());
        Ok(seq)
    }
}

impl std::fmt::Debug for AtLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtLink").finish_non_exhaustive()
    }
}
