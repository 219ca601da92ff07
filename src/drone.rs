//! # Drone Connection
//!
//! High-level handle bundling the command scheduler, the NavData listener,
//! the device configuration client and the optional video relay.
//!
//! A [`Drone`] exists only while connected: [`Drone::connect`] is the only
//! constructor and [`Drone::close`] consumes it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::at::{commands, AtLink, Command};
use crate::config::Config;
use crate::device_config::{ControlPort, DeviceConfig};
use crate::error::Result;
use crate::navdata::listener::{ListenerSettings, NavDataListener};
use crate::navdata::{DroneState, NavData, NavDataHandle};
use crate::scheduler::Scheduler;
use crate::transport::{DatagramSink, UdpLink};
use crate::video::{VideoFrame, VideoRelay};

/// Connected AR.Drone
pub struct Drone {
    config: Config,
    scheduler: Arc<Scheduler>,
    listener: NavDataListener,
    device_config: DeviceConfig,
    video: Option<VideoRelay>,
}

impl Drone {
    /// Open the command and NavData channels and start the background tasks.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated application configuration
    ///
    /// # Errors
    ///
    /// Returns error if the drone address is invalid or a socket cannot be
    /// bound
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ardrone_link::config::Config;
    /// use ardrone_link::drone::Drone;
    ///
    /// # async fn fly() -> ardrone_link::error::Result<()> {
    /// let drone = Drone::connect(&Config::default()).await?;
    /// drone.wait_navdata().await;
    /// drone.takeoff().await?;
    /// drone.land().await?;
    /// drone.close().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(config: &Config) -> Result<Self> {
        let drone = &config.drone;

        let at = UdpLink::bind(0, drone.endpoint(drone.at_port)?).await?;
        let scheduler = Arc::new(Scheduler::new(
            AtLink::new(Arc::new(at)),
            config.scheduler.interval(),
        ));
        scheduler.start()?;

        // The drone streams NavData back to whichever port sent the wake-up
        let navdata = Arc::new(UdpLink::bind(0, drone.endpoint(drone.navdata_port)?).await?);
        let listener = NavDataListener::spawn(
            navdata.clone(),
            Some(navdata as Arc<dyn DatagramSink>),
            ListenerSettings {
                recv_timeout: config.navdata.recv_timeout(),
                buffer_size: config.navdata.buffer_size,
            },
        );

        let control = ControlPort::new(
            drone.endpoint(drone.control_port)?,
            Duration::from_millis(config.device_config.timeout_ms),
        );
        let device_config = DeviceConfig::new(Arc::clone(&scheduler), Box::new(control));

        info!("Connected to drone at {}", drone.address);
        Ok(Self {
            config: config.clone(),
            scheduler,
            listener,
            device_config,
            video: None,
        })
    }

    /// Queue a command and wait until it has been transmitted
    pub async fn send(&self, command: Command) -> Result<()> {
        self.scheduler.send(command).await?;
        Ok(())
    }

    /// Take off
    pub async fn takeoff(&self) -> Result<()> {
        self.send(commands::takeoff()).await
    }

    /// Land
    pub async fn land(&self) -> Result<()> {
        self.send(commands::land()).await
    }

    /// Toggle the emergency state (cuts the motors when flying)
    pub async fn emergency(&self) -> Result<()> {
        self.send(commands::emergency()).await
    }

    /// Hold position
    pub async fn hover(&self) -> Result<()> {
        self.send(commands::hover()).await
    }

    /// Calibrate the horizontal plane; only valid while landed
    pub async fn flat_trim(&self) -> Result<()> {
        self.send(commands::flat_trim()).await
    }

    /// Move with progressive commands.
    ///
    /// Each input is a fraction of the configured maximum and is clamped to
    /// `[-1, 1]`.
    ///
    /// # Arguments
    ///
    /// * `roll` - Negative banks left, positive banks right
    /// * `pitch` - Negative lowers the nose, positive raises it
    /// * `gaz` - Vertical speed
    /// * `yaw` - Angular speed
    pub async fn move_by(&self, roll: f32, pitch: f32, gaz: f32, yaw: f32) -> Result<()> {
        let clamp = |v: f32| v.clamp(-1.0, 1.0);
        self.send(commands::progressive(clamp(roll), clamp(pitch), clamp(gaz), clamp(yaw)))
            .await
    }

    /// Newest decoded NavData, if any
    pub fn navdata(&self) -> Option<Arc<NavData>> {
        self.listener.handle().latest()
    }

    /// State flags of the newest NavData, if any
    pub fn state(&self) -> Option<DroneState> {
        self.navdata().map(|nav| nav.state())
    }

    /// Wait until the first NavData frame has decoded
    pub async fn wait_navdata(&self) -> Option<Arc<NavData>> {
        self.listener.handle().wait_ready().await
    }

    /// Reader for the NavData snapshot
    pub fn navdata_handle(&self) -> NavDataHandle {
        self.listener.handle()
    }

    /// Command scheduler
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Device configuration client
    pub fn device_config(&self) -> &DeviceConfig {
        &self.device_config
    }

    /// Connect to the video port and start relaying frames.
    ///
    /// # Errors
    ///
    /// Returns error if the video connection fails
    pub async fn start_video(&mut self) -> Result<mpsc::Receiver<VideoFrame>> {
        if let Some(relay) = self.video.take() {
            relay.stop().await;
        }
        let addr = self.config.drone.endpoint(self.config.drone.video_port)?;
        let (relay, frames) = VideoRelay::connect(addr, self.config.video.channel_capacity).await?;
        self.video = Some(relay);
        Ok(frames)
    }

    /// Stop every background task.
    ///
    /// Commands still queued are not transmitted.
    pub async fn close(self) -> Result<()> {
        if let Some(relay) = self.video {
            relay.stop().await;
        }
        self.scheduler.stop(false).await?;
        self.listener.stop().await;
        info!("Disconnected from drone at {}", self.config.drone.address);
        Ok(())
    }
}
