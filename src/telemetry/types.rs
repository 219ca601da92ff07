//! Flat telemetry record written once per line.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::navdata::NavData;

/// Summary of one NavData snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// RFC 3339 host time the snapshot was recorded
    pub timestamp: String,
    /// Device-side frame counter
    pub sequence: u32,
    /// Raw state word
    pub state: u32,
    /// Names of the state flags that are set
    pub flags: Vec<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctrl_state: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude_cm: Option<i32>,
    /// Pitch, roll and yaw in milli-degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attitude: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi_link_quality: Option<u32>,
}

impl TelemetryRecord {
    /// Summarise `nav` as seen at `now`
    pub fn from_navdata(nav: &NavData, now: DateTime<Utc>) -> Self {
        let state = nav.state();
        let demo = nav.demo();

        Self {
            timestamp: now.to_rfc3339(),
            sequence: nav.metadata().sequence_number,
            state: state.bits(),
            flags: state.active(),
            ctrl_state: demo.map(|d| d.ctrl_state),
            battery_percent: demo.map(|d| d.vbat_flying_percentage),
            altitude_cm: demo.map(|d| d.altitude),
            attitude: demo.map(|d| [d.theta, d.phi, d.psi]),
            velocity: demo.map(|d| [d.vx, d.vy, d.vz]),
            wifi_link_quality: nav.wifi().map(|w| w.link_quality),
        }
    }
}
