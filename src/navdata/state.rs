//! # Drone State Flags
//!
//! Named view over the 32-bit state word carried in every NavData frame.
//! Bit `n` of the word is flag `n`; there is no validation and no setter.

use bitflags::bitflags;

bitflags! {
    /// Read-only view over the raw drone state word
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DroneState: u32 {
        /// Landed (clear) or flying (set)
        const FLYING = 1 << 0;
        const VIDEO_ENABLED = 1 << 1;
        const VISION_ENABLED = 1 << 2;
        /// Angular-speed control instead of euler-angle control
        const ANGULAR_SPEED_CONTROL = 1 << 3;
        const ALTITUDE_CONTROL_ACTIVE = 1 << 4;
        /// Start button state
        const USER_START_BUTTON = 1 << 5;
        /// A control command has been acknowledged
        const COMMAND_ACK = 1 << 6;
        const CAMERA_READY = 1 << 7;
        const TRAVELLING_ENABLED = 1 << 8;
        const USB_READY = 1 << 9;
        /// Only the demo option is being sent
        const NAVDATA_DEMO_ONLY = 1 << 10;
        /// No NavData options requested yet
        const NAVDATA_BOOTSTRAP = 1 << 11;
        const MOTORS_PROBLEM = 1 << 12;
        const COMMUNICATION_LOST = 1 << 13;
        const SOFTWARE_FAULT = 1 << 14;
        const BATTERY_LOW = 1 << 15;
        const USER_EMERGENCY_LANDING = 1 << 16;
        const TIMER_ELAPSED = 1 << 17;
        const MAGNETOMETER_NEEDS_CALIBRATION = 1 << 18;
        const ANGLES_OUT_OF_RANGE = 1 << 19;
        const TOO_MUCH_WIND = 1 << 20;
        const ULTRASOUND_DEAF = 1 << 21;
        const CUTOUT_DETECTED = 1 << 22;
        const PIC_VERSION_OK = 1 << 23;
        const ATCODEC_THREAD_ON = 1 << 24;
        const NAVDATA_THREAD_ON = 1 << 25;
        const VIDEO_THREAD_ON = 1 << 26;
        const ACQUISITION_THREAD_ON = 1 << 27;
        /// Control loop is running late
        const CONTROL_WATCHDOG_DELAY = 1 << 28;
        const ADC_WATCHDOG_DELAY = 1 << 29;
        /// Host stopped sending commands; the drone expects a COMWDG
        const COMMUNICATION_WATCHDOG_PROBLEM = 1 << 30;
        const EMERGENCY = 1 << 31;
    }
}

macro_rules! flag_accessors {
    ($( $name:ident => $flag:ident ),* $(,)?) => {
        impl DroneState {
            $(
                pub fn $name(&self) -> bool {
                    self.contains(Self::$flag)
                }
            )*
        }
    };
}

flag_accessors! {
    flying => FLYING,
    video_enabled => VIDEO_ENABLED,
    vision_enabled => VISION_ENABLED,
    angular_speed_control => ANGULAR_SPEED_CONTROL,
    altitude_control_active => ALTITUDE_CONTROL_ACTIVE,
    user_start_button => USER_START_BUTTON,
    command_ack => COMMAND_ACK,
    camera_ready => CAMERA_READY,
    travelling_enabled => TRAVELLING_ENABLED,
    usb_ready => USB_READY,
    navdata_demo_only => NAVDATA_DEMO_ONLY,
    navdata_bootstrap => NAVDATA_BOOTSTRAP,
    motors_problem => MOTORS_PROBLEM,
    communication_lost => COMMUNICATION_LOST,
    software_fault => SOFTWARE_FAULT,
    battery_low => BATTERY_LOW,
    user_emergency_landing => USER_EMERGENCY_LANDING,
    timer_elapsed => TIMER_ELAPSED,
    magnetometer_needs_calibration => MAGNETOMETER_NEEDS_CALIBRATION,
    angles_out_of_range => ANGLES_OUT_OF_RANGE,
    too_much_wind => TOO_MUCH_WIND,
    ultrasound_deaf => ULTRASOUND_DEAF,
    cutout_detected => CUTOUT_DETECTED,
    pic_version_ok => PIC_VERSION_OK,
    atcodec_thread_on => ATCODEC_THREAD_ON,
    navdata_thread_on => NAVDATA_THREAD_ON,
    video_thread_on => VIDEO_THREAD_ON,
    acquisition_thread_on => ACQUISITION_THREAD_ON,
    control_watchdog_delay => CONTROL_WATCHDOG_DELAY,
    adc_watchdog_delay => ADC_WATCHDOG_DELAY,
    communication_watchdog_problem => COMMUNICATION_WATCHDOG_PROBLEM,
    emergency => EMERGENCY,
}

impl DroneState {
    /// Every named flag as `(name, is_set)`, lowest bit first
    pub fn flags(&self) -> impl Iterator<Item = (&'static str, bool)> {
        let word = *self;
        Self::all()
            .iter_names()
            .map(move |(name, flag)| (name, word.contains(flag)))
    }

    /// Names of the flags that are set
    pub fn active(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

impl Default for DroneState {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<u32> for DroneState {
    fn from(word: u32) -> Self {
        Self::from_bits_retain(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flying_and_camera_ready_only() {
        let state = DroneState::from(0b1000_0001);
        assert!(state.flying());
        assert!(state.camera_ready());
        assert!(!state.video_enabled());
        assert_eq!(state.active(), vec!["FLYING", "CAMERA_READY"]);
        assert_eq!(state.flags().filter(|(_, set)| *set).count(), 2);
    }

    #[test]
    fn test_flags_cover_all_bits() {
        let state = DroneState::from(u32::MAX);
        let flags: Vec<_> = state.flags().collect();
        assert_eq!(flags.len(), 32);
        assert!(flags.iter().all(|(_, set)| *set));
        assert_eq!(flags[0].0, "FLYING");
        assert_eq!(flags[31].0, "EMERGENCY");
        assert!(state.emergency());
        assert_eq!(state.bits(), u32::MAX);
    }

    #[test]
    fn test_each_accessor_matches_its_bit() {
        for bit in 0..32 {
            let state = DroneState::from(1u32 << bit);
            let set: Vec<_> = state.flags().filter(|(_, set)| *set).collect();
            assert_eq!(set.len(), 1, "bit {}", bit);
        }
        assert!(DroneState::from(1 << 30).communication_watchdog_problem());
        assert!(DroneState::from(1 << 15).battery_low());
    }

    #[test]
    fn test_empty_word() {
        let state = DroneState::default();
        assert!(!state.flying());
        assert!(state.active().is_empty());
        assert_eq!(state.flags().count(), 32);
    }

    #[test]
    fn test_composes_with_bit_operators() {
        let state = DroneState::FLYING | DroneState::BATTERY_LOW;
        assert_eq!(state.bits(), 0x8001);
        assert!(state.contains(DroneState::FLYING));
        assert!(!state.contains(DroneState::EMERGENCY));
    }
}
