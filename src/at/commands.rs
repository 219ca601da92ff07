//! # AT Command Catalogue
//!
//! Definitions of the AT commands understood by the drone, plus typed
//! constructors for the common ones.
//!
//! ## Commands
//!
//! | Command | Parameters | Purpose |
//! |---------|------------|---------|
//! | `REF` | input | take-off, landing, emergency |
//! | `PCMD` | flag, roll, pitch, gaz, yaw | progressive movement |
//! | `PCMD_MAG` | flag, roll, pitch, gaz, yaw, psi, psi_accuracy | movement with magnetometer |
//! | `FTRIM` | | flat trim |
//! | `CONFIG` | key, value | set a configuration option |
//! | `CONFIG_IDS` | session, user, application_ids | identifiers for the next `CONFIG` |
//! | `COMWDG` | | reset the communication watchdog |
//! | `CALIB` | device_number | magnetometer calibration |
//! | `CTRL` | mode, zero | control/configuration transfer mode |

use bitflags::bitflags;

use super::command::{Command, CommandSpec};
use super::params::{flag_value, ParamDescriptor, ParamKind, Value};
use crate::error::CommandError;

bitflags! {
    /// Bit flags of `REF.input`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RefFlags: u32 {
        /// Bits that must always be set
        const DEFAULT = (1 << 18) | (1 << 20) | (1 << 22) | (1 << 24) | (1 << 28);
        /// Take-off (set) / land (clear)
        const START = 1 << 9;
        /// Toggle emergency mode
        const SELECT = 1 << 8;
    }
}

bitflags! {
    /// Bit flags of `PCMD.flag`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PcmdFlags: u32 {
        /// Enable progressive commands (clear to hover)
        const PROGRESSIVE = 1 << 0;
        const COMBINED_YAW = 1 << 1;
        const ABSOLUTE_CONTROL = 1 << 2;
    }
}

impl From<RefFlags> for Value {
    fn from(flags: RefFlags) -> Self {
        Value::from(flags.bits())
    }
}

impl From<PcmdFlags> for Value {
    fn from(flags: PcmdFlags) -> Self {
        Value::from(flags.bits())
    }
}

/// Modes of `CTRL.mode`
pub mod ctrl_modes {
    pub const NO_CONTROL_MODE: u32 = 0;
    pub const ARDRONE_UPDATE_CONTROL_MODE: u32 = 1;
    pub const PIC_UPDATE_CONTROL_MODE: u32 = 2;
    pub const LOGS_GET_CONTROL_MODE: u32 = 3;
    pub const CFG_GET_CONTROL_MODE: u32 = 4;
    pub const ACK_CONTROL_MODE: u32 = 5;
    pub const CUSTOM_CFG_GET_CONTROL_MODE: u32 = 6;

    /// Mode value by constant name
    pub fn by_name(name: &str) -> Option<u32> {
        let mode = match name {
            "NO_CONTROL_MODE" => NO_CONTROL_MODE,
            "ARDRONE_UPDATE_CONTROL_MODE" => ARDRONE_UPDATE_CONTROL_MODE,
            "PIC_UPDATE_CONTROL_MODE" => PIC_UPDATE_CONTROL_MODE,
            "LOGS_GET_CONTROL_MODE" => LOGS_GET_CONTROL_MODE,
            "CFG_GET_CONTROL_MODE" => CFG_GET_CONTROL_MODE,
            "ACK_CONTROL_MODE" => ACK_CONTROL_MODE,
            "CUSTOM_CFG_GET_CONTROL_MODE" => CUSTOM_CFG_GET_CONTROL_MODE,
            _ => return None,
        };
        Some(mode)
    }
}

const FLAG_DESCRIPTION: &str =
    "flag enabling the use of progressive commands and/or the Combined Yaw mode (bitfield)";

/// Controls the basic behaviour of the drone (take-off/landing, emergency stop/reset)
pub static REF: CommandSpec = CommandSpec {
    name: "REF",
    description:
        "Controls the basic behaviour of the drone (take-off/landing, emergency stop/reset)",
    params: &[ParamDescriptor::int32_with_flags(
        "input",
        "an integer value, representing a 32 bit-wide bit-field controlling the drone",
        flag_value::<RefFlags>,
    )],
};

/// Send progressive commands - makes the drone move (translate/rotate)
pub static PCMD: CommandSpec = CommandSpec {
    name: "PCMD",
    description: "Send progressive commands - makes the drone move (translate/rotate)",
    params: &[
        ParamDescriptor::int32_with_flags("flag", FLAG_DESCRIPTION, flag_value::<PcmdFlags>),
        ParamDescriptor::float32("roll", "drone left-right tilt, [-1...1]"),
        ParamDescriptor::float32("pitch", "drone front-back tilt, [-1...1]"),
        ParamDescriptor::float32("gaz", "drone vertical speed, [-1...1]"),
        ParamDescriptor::float32("yaw", "drone angular speed, [-1...1]"),
    ],
};

/// Progressive commands with magnetometer heading
pub static PCMD_MAG: CommandSpec = CommandSpec {
    name: "PCMD_MAG",
    description: "Send progressive commands with magnetometer heading",
    params: &[
        ParamDescriptor::int32_with_flags("flag", FLAG_DESCRIPTION, flag_value::<PcmdFlags>),
        ParamDescriptor::float32("roll", "drone left-right tilt, [-1...1]"),
        ParamDescriptor::float32("pitch", "drone front-back tilt, [-1...1]"),
        ParamDescriptor::float32("gaz", "drone vertical speed, [-1...1]"),
        ParamDescriptor::float32("yaw", "drone angular speed, [-1...1]"),
        ParamDescriptor::float32("psi", "magneto psi, [-1...1]"),
        ParamDescriptor::float32("psi_accuracy", "magneto psi accuracy, [-1...1]"),
    ],
};

/// Flat trims - tells the drone it is lying horizontally
pub static FTRIM: CommandSpec = CommandSpec {
    name: "FTRIM",
    description: "Flat trims - tells the drone it is lying horizontally",
    params: &[],
};

/// Sets a configurable option on the drone
pub static CONFIG: CommandSpec = CommandSpec {
    name: "CONFIG",
    description: "Sets a configurable option on the drone",
    params: &[
        ParamDescriptor::string("key", "the name of the option to set"),
        ParamDescriptor::string("value", "the option value"),
    ],
};

/// Identifiers for the next `AT*CONFIG` command
pub static CONFIG_IDS: CommandSpec = CommandSpec {
    name: "CONFIG_IDS",
    description: "Identifiers for the next AT*CONFIG command",
    params: &[
        ParamDescriptor::string("session", "session identifier"),
        ParamDescriptor::string("user", "user profile identifier"),
        ParamDescriptor::string("application_ids", "application identifier"),
    ],
};

/// Reset the communication watchdog
pub static COMWDG: CommandSpec = CommandSpec {
    name: "COMWDG",
    description: "Reset communication watchdog",
    params: &[],
};

/// Magnetometer calibration
pub static CALIB: CommandSpec = CommandSpec {
    name: "CALIB",
    description: "Magnetometer calibration - tells the drone to calibrate its magnetometer",
    params: &[ParamDescriptor::int32(
        "device_number",
        "identifier of the device to calibrate, from ardrone_calibration_device_t",
    )],
};

/// Control transfer mode (configuration download, acknowledgements)
pub static CTRL: CommandSpec = CommandSpec {
    name: "CTRL",
    description: "Selects the control transfer mode",
    params: &[
        ParamDescriptor::int32_with_flags("mode", "control mode", ctrl_modes::by_name),
        ParamDescriptor {
            name: "zero",
            kind: ParamKind::Int32,
            description: "reserved, always 0",
            default: Some(Value::Int(0)),
            flags: None,
        },
    ],
};

/// Every command type known to the crate
pub static ALL: &[&CommandSpec] = &[
    &REF, &PCMD, &PCMD_MAG, &FTRIM, &CONFIG, &CONFIG_IDS, &COMWDG, &CALIB, &CTRL,
];

/// Look up a command type by wire name
pub fn by_name(name: &str) -> Option<&'static CommandSpec> {
    ALL.iter().copied().find(|spec| spec.name == name)
}

/// `REF` with the given input bit-field
pub fn reference(input: RefFlags) -> Command {
    build_infallible(&REF, vec![Value::from(input)])
}

/// Take off
pub fn takeoff() -> Command {
    reference(RefFlags::DEFAULT | RefFlags::START)
}

/// Land
pub fn land() -> Command {
    reference(RefFlags::DEFAULT)
}

/// Toggle the emergency state
pub fn emergency() -> Command {
    reference(RefFlags::DEFAULT | RefFlags::SELECT)
}

/// `PCMD` with progressive movement enabled.
///
/// All inputs are fractions of the configured maximums, in `[-1, 1]`.
pub fn progressive(roll: f32, pitch: f32, gaz: f32, yaw: f32) -> Command {
    build_infallible(
        &PCMD,
        vec![
            Value::from(PcmdFlags::PROGRESSIVE),
            Value::from(roll),
            Value::from(pitch),
            Value::from(gaz),
            Value::from(yaw),
        ],
    )
}

/// `PCMD` with progressive movement disabled (hover in place)
pub fn hover() -> Command {
    build_infallible(
        &PCMD,
        vec![
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
            Value::Int(0),
        ],
    )
}

/// Flat trim
pub fn flat_trim() -> Command {
    build_infallible(&FTRIM, Vec::new())
}

/// Watchdog reset, sent by the scheduler when idle
pub fn watchdog() -> Command {
    build_infallible(&COMWDG, Vec::new())
}

/// Magnetometer calibration of the given device
pub fn calibrate(device_number: u32) -> Command {
    build_infallible(&CALIB, vec![Value::from(device_number)])
}

/// `CTRL` with the given mode
pub fn control(mode: u32) -> Command {
    build_infallible(&CTRL, vec![Value::from(mode)])
}

/// Set a configuration option.
///
/// # Errors
///
/// Returns `UnsupportedValue` if `value` is bytes that are not valid UTF-8.
pub fn config(key: impl Into<Value>, value: impl Into<Value>) -> Result<Command, CommandError> {
    Command::new(&CONFIG, [key.into(), value.into()])
}

/// Identify the session, user and application for the next `CONFIG`.
///
/// # Errors
///
/// Returns `UnsupportedValue` if a value is bytes that are not valid UTF-8.
pub fn config_ids(
    session: impl Into<Value>,
    user: impl Into<Value>,
    application_ids: impl Into<Value>,
) -> Result<Command, CommandError> {
    Command::new(
        &CONFIG_IDS,
        [session.into(), user.into(), application_ids.into()],
    )
}

/// Build a command whose values are valid by construction of the caller.
///
/// Trailing parameters without a value take their declared default.
fn build_infallible(spec: &'static CommandSpec, values: Vec<Value>) -> Command {
    let mut values = values.into_iter();
    let resolved = spec
        .params
        .iter()
        .map(|param| values.next().or_else(|| param.default.clone()))
        .collect();
    Command::from_checked(spec, resolved)
}
