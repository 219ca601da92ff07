//! # Telemetry Module
//!
//! Records NavData snapshots to JSONL files with rotation.
//!
//! This module handles:
//! - Summarising snapshots into flat records
//! - Formatting as JSONL (JSON Lines)
//! - Writing to rotating log files
//! - Managing file rotation (max N records per file)
//! - Retaining only last M files

pub mod logger;
pub mod types;

pub use logger::{TelemetryLogger, TelemetryRecorder};
pub use types::TelemetryRecord;
