//! # Telemetry Logger
//!
//! Appends [`TelemetryRecord`]s to JSONL files in a directory, starting a new
//! file every `max_records_per_file` records and deleting the oldest files
//! beyond `max_files_to_keep`.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::TelemetryRecord;
use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::navdata::{NavData, NavDataHandle};

/// Rotating JSONL writer
pub struct TelemetryLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    files: VecDeque<PathBuf>,
    file_index: u64,
}

impl TelemetryLogger {
    /// Create the log directory and an idle logger.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        Self::with_limits(
            &config.log_dir,
            config.max_records_per_file,
            config.max_files_to_keep,
        )
    }

    /// Create a logger with explicit limits
    pub fn with_limits<P: AsRef<Path>>(
        dir: P,
        max_records_per_file: usize,
        max_files_to_keep: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            records_in_file: 0,
            files: VecDeque::new(),
            file_index: 0,
        })
    }

    /// Files written by this logger that still exist, oldest first
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    /// Append one record as a JSON line.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn write(&mut self, record: &TelemetryRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, record).map_err(std::io::Error::from)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        self.records_in_file += 1;
        Ok(())
    }

    /// Summarise and append a NavData snapshot
    pub fn log(&mut self, nav: &NavData) -> Result<()> {
        self.write(&TelemetryRecord::from_navdata(nav, Utc::now()))
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        self.file_index += 1;
        let name = format!(
            "telemetry_{}_{:04}.jsonl",
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.file_index
        );
        let path = self.dir.join(name);
        let file = File::create(&path)?;
        debug!("Telemetry file {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.records_in_file = 0;
        self.files.push_back(path);

        while self.files.len() > self.max_files_to_keep {
            if let Some(oldest) = self.files.pop_front() {
                if let Err(e) = fs::remove_file(&oldest) {
                    warn!("Failed to remove {}: {}", oldest.display(), e);
                }
            }
        }
        Ok(())
    }
}

/// Background task sampling the newest snapshot at a fixed interval
pub struct TelemetryRecorder {
    closed: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TelemetryRecorder {
    /// Start recording.
    ///
    /// A snapshot is written at most once; ticks that see the same snapshot
    /// as the previous one are skipped. File I/O runs on the blocking pool.
    pub fn spawn(navdata: NavDataHandle, mut logger: TelemetryLogger, interval: Duration) -> Self {
        let (closed_tx, mut closed) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last: Option<Arc<NavData>> = None;
            let mut written: u64 = 0;

            loop {
                tokio::select! {
                    _ = closed.changed() => break,
                    _ = ticker.tick() => {}
                }

                let Some(nav) = navdata.latest() else { continue };
                if last.as_ref().is_some_and(|prev| Arc::ptr_eq(prev, &nav)) {
                    continue;
                }

                let snapshot = Arc::clone(&nav);
                let outcome = tokio::task::spawn_blocking(move || {
                    let result = logger.log(&snapshot);
                    (logger, result)
                })
                .await;

                match outcome {
                    Ok((returned, result)) => {
                        logger = returned;
                        match result {
                            Ok(()) => written += 1,
                            Err(e) => warn!("Failed to record telemetry: {}", e),
                        }
                    }
                    Err(e) => {
                        warn!("Telemetry writer failed: {}", e);
                        break;
                    }
                }
                last = Some(nav);
            }
            info!("Telemetry recorder wrote {} records", written);
        });

        Self {
            closed: closed_tx,
            task,
        }
    }

    /// Stop recording and wait for the task to exit
    pub async fn stop(self) {
        self.closed.send_replace(true);
        if let Err(e) = self.task.await {
            warn!("Telemetry recorder task failed: {}", e);
        }
    }
}
