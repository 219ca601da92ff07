//! # ARDrone Link Library
//!
//! Host-side control link for Parrot AR.Drone quadrotors.
//!
//! This library provides:
//! - Typed AT command construction and wire encoding ([`at`])
//! - A fixed-delay dispatch scheduler that keeps the link alive ([`scheduler`])
//! - NavData telemetry decoding with checksum validation ([`navdata`])
//! - A connection facade tying the channels together ([`drone`])
//! - Device configuration, video de-encapsulation and telemetry recording

pub mod at;
pub mod config;
pub mod device_config;
pub mod drone;
pub mod error;
pub mod navdata;
pub mod scheduler;
pub mod telemetry;
pub mod transport;
pub mod video;
