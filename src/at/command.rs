//! # AT Command Encoder
//!
//! Immutable command values and their wire encoding.
//!
//! A frame looks like:
//!
//! ```text
//! AT*<NAME>=<seq>,<arg1>,<arg2>,...\r
//! ```
//!
//! The sequence number is not part of the [`Command`]; it is supplied when
//! the command is packed, so the scheduler can number frames at transmit
//! time.

use std::fmt;

use super::params::{ParamDescriptor, Value};
use crate::error::CommandError;

/// Static definition of a command type: wire name plus ordered parameters.
#[derive(Debug)]
pub struct CommandSpec {
    /// Name after `AT*` on the wire
    pub name: &'static str,

    /// What the command does
    pub description: &'static str,

    /// Ordered parameter descriptors
    pub params: &'static [ParamDescriptor],
}

impl CommandSpec {
    /// Index of a parameter by name
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|param| param.name == name)
    }
}

/// An immutable AT command value.
///
/// Two commands are equal when they share a command type and parameter
/// values. There are no setters; use [`Command::replace`] to derive a
/// modified copy.
///
/// # Examples
///
/// ```
/// use ardrone_link::at::command::Command;
/// use ardrone_link::at::commands::REF;
/// use ardrone_link::at::params::Value;
///
/// let cmd = Command::new(&REF, [Value::Int(290718208)]).unwrap();
/// assert_eq!(cmd.pack(26).unwrap(), b"AT*REF=26,290718208\r");
/// ```
#[derive(Clone)]
pub struct Command {
    spec: &'static CommandSpec,
    values: Vec<Option<Value>>,
}

impl Command {
    /// Build a command from positional values.
    ///
    /// # Errors
    ///
    /// - `TooManyArguments` if more values than parameters are given
    /// - `IntegerOutOfRange` / `UnsupportedValue` if a value is rejected
    pub fn new<I>(spec: &'static CommandSpec, args: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut builder = Self::builder(spec);
        for arg in args {
            builder = builder.arg(arg);
        }
        builder.build()
    }

    /// Assemble a command from values already known to satisfy `spec`.
    pub(crate) fn from_checked(spec: &'static CommandSpec, values: Vec<Option<Value>>) -> Self {
        debug_assert_eq!(values.len(), spec.params.len());
        Self { spec, values }
    }

    /// Start building a command with positional and named values
    pub fn builder(spec: &'static CommandSpec) -> CommandBuilder {
        CommandBuilder {
            spec,
            positional: Vec::new(),
            named: Vec::new(),
        }
    }

    /// Command type definition
    pub fn spec(&self) -> &'static CommandSpec {
        self.spec
    }

    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Value of a parameter, falling back to its default
    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self.spec.param_index(name)?;
        self.values[index].as_ref()
    }

    /// Resolved parameter values in declaration order
    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// Derive a copy with one parameter replaced.
    ///
    /// # Errors
    ///
    /// - `UnknownArgument` if the command has no such parameter
    /// - `IntegerOutOfRange` / `UnsupportedValue` if the value is rejected
    pub fn replace(&self, name: &str, value: impl Into<Value>) -> Result<Self, CommandError> {
        let index = self
            .spec
            .param_index(name)
            .ok_or_else(|| CommandError::UnknownArgument {
                command: self.spec.name,
                name: name.to_string(),
            })?;
        let value = value.into();
        self.spec.params[index].check(&value)?;

        let mut values = self.values.clone();
        values[index] = Some(value);
        Ok(Self {
            spec: self.spec,
            values,
        })
    }

    /// Pack the command into a wire frame with the given sequence number.
    ///
    /// # Errors
    ///
    /// Returns `MissingArgument` if a parameter is unset and has no default.
    pub fn pack(&self, seq: u32) -> Result<Vec<u8>, CommandError> {
        let mut frame = format!("AT*{}={}", self.spec.name, seq);

        for (param, value) in self.spec.params.iter().zip(&self.values) {
            let value = value.as_ref().ok_or(CommandError::MissingArgument {
                command: self.spec.name,
                name: param.name,
            })?;
            frame.push(',');
            frame.push_str(&param.pack(value)?);
        }

        frame.push('\r');
        Ok(frame.into_bytes())
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.spec.name == other.spec.name && self.values == other.values
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.spec.name)?;
        for (i, (param, value)) in self.spec.params.iter().zip(&self.values).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match value {
                Some(value) => write!(f, "{}={:?}", param.name, value)?,
                None => write!(f, "{}=None", param.name)?,
            }
        }
        write!(f, ")")
    }
}

/// Builder collecting positional and named values for a [`Command`].
///
/// # Examples
///
/// ```
/// use ardrone_link::at::command::Command;
/// use ardrone_link::at::commands::PCMD;
/// use ardrone_link::at::params::Value;
///
/// let cmd = Command::builder(&PCMD)
///     .arg(1)
///     .named("yaw", 0.5)
///     .named("roll", 0)
///     .named("pitch", 0)
///     .named("gaz", 0)
///     .build()
///     .unwrap();
/// assert_eq!(cmd.get("yaw"), Some(&Value::Float(0.5)));
/// ```
#[derive(Debug)]
pub struct CommandBuilder {
    spec: &'static CommandSpec,
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl CommandBuilder {
    /// Append a positional value
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a value by parameter name
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }

    /// Validate every value and build the command.
    ///
    /// # Errors
    ///
    /// - `TooManyArguments` if more positional values than parameters
    /// - `DuplicateArgument` if a parameter is set twice
    /// - `UnknownArgument` if a name does not match a parameter
    /// - `IntegerOutOfRange` / `UnsupportedValue` if a value is rejected
    pub fn build(self) -> Result<Command, CommandError> {
        let spec = self.spec;
        if self.positional.len() > spec.params.len() {
            return Err(CommandError::TooManyArguments {
                command: spec.name,
                expected: spec.params.len(),
                given: self.positional.len(),
            });
        }

        let mut values: Vec<Option<Value>> = vec![None; spec.params.len()];

        for (index, value) in self.positional.into_iter().enumerate() {
            spec.params[index].check(&value)?;
            values[index] = Some(value);
        }

        for (name, value) in self.named {
            let index = spec
                .param_index(&name)
                .ok_or_else(|| CommandError::UnknownArgument {
                    command: spec.name,
                    name: name.clone(),
                })?;
            if values[index].is_some() {
                return Err(CommandError::DuplicateArgument {
                    command: spec.name,
                    name,
                });
            }
            spec.params[index].check(&value)?;
            values[index] = Some(value);
        }

        for (slot, param) in values.iter_mut().zip(spec.params) {
            if slot.is_none() {
                *slot = param.default.clone();
            }
        }

        Ok(Command { spec, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::at::commands::{CALIB, COMWDG, CONFIG, CTRL, PCMD, REF};

    #[test]
    fn test_init_by_arg() {
        let cmd = Command::new(&REF, [Value::Int(3)]).unwrap();
        assert_eq!(cmd.get("input"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_init_by_name() {
        let cmd = Command::builder(&REF).named("input", 3).build().unwrap();
        assert_eq!(cmd.get("input"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_unset_defaults_to_none() {
        let cmd = Command::new(&REF, []).unwrap();
        assert_eq!(cmd.get("input"), None);
    }

    #[test]
    fn test_unset_uses_declared_default() {
        let cmd = Command::new(&CTRL, [Value::Int(4)]).unwrap();
        assert_eq!(cmd.get("zero"), Some(&Value::Int(0)));
        assert_eq!(cmd.pack(1).unwrap(), b"AT*CTRL=1,4,0\r");
    }

    #[test]
    fn test_too_many_arguments() {
        let err = Command::new(&REF, [Value::Int(3), Value::Int(7)]).unwrap_err();
        assert_eq!(
            err,
            CommandError::TooManyArguments {
                command: "REF",
                expected: 1,
                given: 2
            }
        );
    }

    #[test]
    fn test_duplicate_value() {
        let err = Command::builder(&REF)
            .arg(3)
            .named("input", 7)
            .build()
            .unwrap_err();
        assert!(matches!(err, CommandError::DuplicateArgument { .. }));
    }

    #[test]
    fn test_unknown_name() {
        let err = Command::builder(&REF).named("output", 7).build().unwrap_err();
        assert!(matches!(err, CommandError::UnknownArgument { .. }));
    }

    #[test]
    fn test_wrong_type() {
        let err = Command::new(&REF, [Value::Float(0.5)]).unwrap_err();
        assert!(matches!(err, CommandError::UnsupportedValue { .. }));
    }

    #[test]
    fn test_ref_scenario() {
        let cmd = Command::new(&REF, [Value::Int(290_718_208)]).unwrap();
        assert_eq!(cmd.pack(26).unwrap(), b"AT*REF=26,290718208\r".to_vec());
    }

    #[test]
    fn test_no_trailing_comma_without_params() {
        let cmd = Command::new(&COMWDG, []).unwrap();
        assert_eq!(cmd.pack(1).unwrap(), b"AT*COMWDG=1\r".to_vec());
    }

    #[test]
    fn test_same_command_packs_under_different_sequences() {
        let cmd = Command::new(&CALIB, [Value::Int(0)]).unwrap();
        assert_eq!(cmd.pack(1).unwrap(), b"AT*CALIB=1,0\r".to_vec());
        assert_eq!(cmd.pack(2).unwrap(), b"AT*CALIB=2,0\r".to_vec());
    }

    #[test]
    fn test_pack_mixed_params() {
        let cmd = Command::new(
            &PCMD,
            [
                Value::Int(1),
                Value::Float(-0.8),
                Value::Int(0),
                Value::Float(0.5),
                Value::Int(0),
            ],
        )
        .unwrap();
        assert_eq!(
            cmd.pack(7).unwrap(),
            b"AT*PCMD=7,1,-1085485875,0,1056964608,0\r".to_vec()
        );
    }

    #[test]
    fn test_pack_string_params() {
        let cmd = Command::new(
            &CONFIG,
            [Value::from("general:navdata_demo"), Value::Bool(true)],
        )
        .unwrap();
        assert_eq!(
            cmd.pack(3).unwrap(),
            b"AT*CONFIG=3,\"general:navdata_demo\",\"TRUE\"\r".to_vec()
        );
    }

    #[test]
    fn test_pack_missing_argument() {
        let cmd = Command::new(&REF, []).unwrap();
        let err = cmd.pack(1).unwrap_err();
        assert_eq!(
            err,
            CommandError::MissingArgument {
                command: "REF",
                name: "input"
            }
        );
    }

    #[test]
    fn test_equality() {
        let a = Command::new(&REF, [Value::Int(1)]).unwrap();
        let b = Command::new(&REF, [Value::Int(1)]).unwrap();
        let c = Command::new(&REF, [Value::Int(2)]).unwrap();
        let d = Command::new(&CALIB, [Value::Int(1)]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_replace_returns_new_value() {
        let a = Command::new(&REF, [Value::Int(1)]).unwrap();
        let b = a.replace("input", 20).unwrap();
        assert_eq!(a.get("input"), Some(&Value::Int(1)));
        assert_eq!(b.get("input"), Some(&Value::Int(20)));
        assert!(a.replace("input", 1i64 << 40).is_err());
        assert!(a.replace("nope", 1).is_err());
    }

    #[test]
    fn test_debug_format() {
        let cmd = Command::new(&REF, [Value::Int(3)]).unwrap();
        assert_eq!(format!("{:?}", cmd), "REF(input=Int(3))");
    }
}
