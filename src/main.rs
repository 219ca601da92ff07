//! # ARDrone Link
//!
//! Connects to an AR.Drone, keeps the command link alive and reports its
//! telemetry until interrupted.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse command line and load configuration
//!    - Set up logging (stdout, plus a daily rolling file when configured)
//!    - Bind the command and NavData sockets and start the scheduler
//!
//! 2. **Main Loop**
//!    - Log a status line (battery, altitude, active flags) at a fixed period
//!    - Optionally record every snapshot to JSONL
//!    - Optionally relay PaVE video frames
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Graceful Shutdown**
//!    - Send a land command
//!    - Stop the recorder, scheduler and listener

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use ardrone_link::config::{Config, LoggingConfig};
use ardrone_link::drone::Drone;
use ardrone_link::telemetry::{TelemetryLogger, TelemetryRecorder};

/// How long to wait for the first NavData frame before carrying on
const NAVDATA_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "ardrone-link", version, about = "AR.Drone host control link")]
struct Args {
    /// Configuration file (TOML); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Record telemetry even if disabled in the configuration
    #[arg(long)]
    record: bool,

    /// Seconds between status lines
    #[arg(long, default_value_t = 5)]
    status_interval: u64,

    /// Skip the land command on exit
    #[arg(long)]
    no_land: bool,
}

/// Install the tracing subscriber.
///
/// Returns the file writer guard, which must live until exit so buffered
/// lines are flushed.
fn init_logging(logging: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = match &logging.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ardrone-link.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn status_line(drone: &Drone) -> String {
    let Some(nav) = drone.navdata() else {
        return "no NavData yet".to_string();
    };
    let state = nav.state();
    match nav.demo() {
        Some(demo) => format!(
            "#{} battery {}% altitude {}cm flags {:?}",
            nav.metadata().sequence_number,
            demo.vbat_flying_percentage,
            demo.altitude,
            state.active()
        ),
        None => format!(
            "#{} flags {:?}",
            nav.metadata().sequence_number,
            state.active()
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if args.record {
        config.telemetry.enabled = true;
    }

    let _log_guard = init_logging(&config.logging);
    info!("ARDrone Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut drone = Drone::connect(&config)
        .await
        .context("connecting to drone")?;

    match timeout(NAVDATA_READY_TIMEOUT, drone.wait_navdata()).await {
        Ok(Some(nav)) => info!("NavData ready, state {:?}", nav.state()),
        _ => warn!("No NavData after {:?}, continuing", NAVDATA_READY_TIMEOUT),
    }

    let recorder = if config.telemetry.enabled {
        let logger = TelemetryLogger::new(&config.telemetry).context("opening telemetry log")?;
        info!("Recording telemetry to {}", config.telemetry.log_dir);
        Some(TelemetryRecorder::spawn(
            drone.navdata_handle(),
            logger,
            Duration::from_millis(config.telemetry.log_interval_ms),
        ))
    } else {
        None
    };

    let video = if config.video.enabled {
        let mut frames = drone.start_video().await.context("connecting to video port")?;
        Some(tokio::spawn(async move {
            let mut count: u64 = 0;
            while let Some(frame) = frames.recv().await {
                count += 1;
                debug!(
                    "Video frame #{} {:?} {}x{} ({} bytes)",
                    frame.header.frame_number,
                    frame.header.frame_type,
                    frame.header.display_width,
                    frame.header.display_height,
                    frame.payload.len()
                );
            }
            info!("Video stream ended after {} frames", count);
        }))
    } else {
        None
    };

    let mut status = interval(Duration::from_secs(args.status_interval.max(1)));
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = status.tick() => {
                info!("{}", status_line(&drone));
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if !args.no_land {
        if let Err(e) = drone.land().await {
            warn!("Failed to send land command: {}", e);
        }
    }
    if let Some(recorder) = recorder {
        recorder.stop().await;
    }
    drone.close().await?;
    if let Some(video) = video {
        let _ = video.await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::try_parse_from(["ardrone-link"]).unwrap();
        assert!(args.config.is_none());
        assert!(!args.record);
        assert_eq!(args.status_interval, 5);
        assert!(!args.no_land);
    }

    #[test]
    fn test_config_flag() {
        let args =
            Args::try_parse_from(["ardrone-link", "-c", "flight.toml", "--record", "--no-land"])
                .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("flight.toml")));
        assert!(args.record);
        assert!(args.no_land);
    }

    #[test]
    fn test_navdata_timeout_constant() {
        assert_eq!(NAVDATA_READY_TIMEOUT, Duration::from_secs(5));
    }
}
