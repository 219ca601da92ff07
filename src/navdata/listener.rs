//! # NavData Listener
//!
//! Background task that receives NavData datagrams, decodes them and
//! publishes the newest valid snapshot.
//!
//! Readers never observe a partially built snapshot: each successful decode
//! replaces the published `Arc<NavData>` wholesale. Datagrams that fail to
//! decode are logged and dropped, and the previous snapshot stays current.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::NavData;
use crate::transport::{DatagramSink, DatagramSource};

/// Datagram the drone expects before it starts streaming NavData
pub const WAKE_UP: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Listener tuning
#[derive(Debug, Clone, Copy)]
pub struct ListenerSettings {
    /// How long to wait for a datagram before poking the drone again
    pub recv_timeout: Duration,

    /// Receive buffer size in bytes
    pub buffer_size: usize,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_millis(1000),
            buffer_size: 4096,
        }
    }
}

/// Read side of the published snapshot
#[derive(Debug, Clone)]
pub struct NavDataHandle {
    snapshot: watch::Receiver<Option<Arc<NavData>>>,
}

impl NavDataHandle {
    /// Newest valid snapshot, if any frame has decoded yet
    pub fn latest(&self) -> Option<Arc<NavData>> {
        self.snapshot.borrow().clone()
    }

    /// Whether at least one frame has decoded
    pub fn is_ready(&self) -> bool {
        self.snapshot.borrow().is_some()
    }

    /// Wait until the first snapshot is published.
    ///
    /// Returns `None` if the listener stopped before any frame decoded.
    pub async fn wait_ready(&self) -> Option<Arc<NavData>> {
        let mut snapshot = self.snapshot.clone();
        let ready = snapshot.wait_for(|nav| nav.is_some()).await.ok()?;
        ready.clone()
    }

    /// Wait for the next snapshot published after this call.
    ///
    /// Returns `None` if the listener stopped first.
    pub async fn next(&self) -> Option<Arc<NavData>> {
        let mut snapshot = self.snapshot.clone();
        snapshot.borrow_and_update();
        snapshot.changed().await.ok()?;
        let next = snapshot.borrow().clone();
        next
    }
}

/// Running NavData listener task
pub struct NavDataListener {
    handle: NavDataHandle,
    closed: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl NavDataListener {
    /// Spawn the listener task.
    ///
    /// # Arguments
    ///
    /// * `source` - Socket the drone streams NavData to
    /// * `wake` - Where to send the wake-up datagram; sent once at start and
    ///   again after every receive timeout. `None` disables it.
    /// * `settings` - Timeout and buffer size
    pub fn spawn(
        source: Arc<dyn DatagramSource>,
        wake: Option<Arc<dyn DatagramSink>>,
        settings: ListenerSettings,
    ) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (closed_tx, closed_rx) = watch::channel(false);

        let task = tokio::spawn(run(source, wake, settings, snapshot_tx, closed_rx));
        info!("NavData listener started");

        Self {
            handle: NavDataHandle {
                snapshot: snapshot_rx,
            },
            closed: closed_tx,
            task,
        }
    }

    /// Reader for the published snapshot
    pub fn handle(&self) -> NavDataHandle {
        self.handle.clone()
    }

    /// Signal the task to exit and wait for it
    pub async fn stop(self) {
        self.closed.send_replace(true);
        if let Err(e) = self.task.await {
            warn!("NavData listener task failed: {}", e);
        }
        info!("NavData listener stopped");
    }
}

async fn wake_up(wake: &Option<Arc<dyn DatagramSink>>) {
    if let Some(sink) = wake {
        if let Err(e) = sink.send(&WAKE_UP).await {
            warn!("Failed to send NavData wake-up: {}", e);
        }
    }
}

async fn run(
    source: Arc<dyn DatagramSource>,
    wake: Option<Arc<dyn DatagramSink>>,
    settings: ListenerSettings,
    snapshot: watch::Sender<Option<Arc<NavData>>>,
    mut closed: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; settings.buffer_size];
    wake_up(&wake).await;

    loop {
        if *closed.borrow() {
            break;
        }

        let received = tokio::select! {
            changed = closed.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            received = timeout(settings.recv_timeout, source.recv(&mut buf)) => received,
        };

        match received {
            Err(_) => {
                debug!("No NavData for {:?}", settings.recv_timeout);
                wake_up(&wake).await;
            }
            Ok(Err(e)) => {
                warn!("NavData receive failed: {}", e);
            }
            Ok(Ok(len)) => match NavData::decode(&buf[..len]) {
                Ok(nav) => {
                    debug!(
                        "NavData #{} decoded ({} options)",
                        nav.metadata().sequence_number,
                        nav.options().count()
                    );
                    snapshot.send_replace(Some(Arc::new(nav)));
                }
                Err(e) => {
                    warn!("Dropping NavData datagram of {} bytes: {}", len, e);
                }
            },
        }
    }
}
