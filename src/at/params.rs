//! # AT Command Parameters
//!
//! Typed parameter descriptors and their wire-packing rules.
//!
//! ## Parameter Kinds
//!
//! | Kind | Accepts | Packs into |
//! |------|---------|------------|
//! | `Int32` | integers with `|v| < 2^32` | decimal text (`100` → `100`) |
//! | `Float32` | integers, floats within `f32` range | decimal text of the IEEE-754 bits as `i32` |
//! | `String` | bools, integers, floats, text, UTF-8 bytes | quoted JSON string |
//!
//! String-like packing dispatches on the runtime value, not on the declared
//! kind: `true` packs as `"TRUE"`, `6543` as `"6543"`, `0.5` as `"0.5"`.
//!
//! ## Usage
//!
//! ```
//! use ardrone_link::at::params::{pack_float32, ParamDescriptor, Value};
//!
//! assert_eq!(pack_float32(-0.8), "-1085485875");
//!
//! let key = ParamDescriptor::string("key", "the name of the option to set");
//! assert_eq!(key.pack(&Value::Bool(true)).unwrap(), "\"TRUE\"");
//! ```

use std::borrow::Cow;

use bitflags::Flags;

use crate::error::CommandError;

/// A runtime parameter value.
///
/// The set of accepted kinds is closed; each parameter kind decides which of
/// these it accepts (see [`ParamDescriptor::check`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Cow<'static, str>),
    Bytes(Cow<'static, [u8]>),
}

impl Value {
    /// Short name of the value kind, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Text(Cow::Borrowed(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(Cow::Owned(value))
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(Cow::Owned(value))
    }
}

impl From<&'static [u8]> for Value {
    fn from(value: &'static [u8]) -> Self {
        Value::Bytes(Cow::Borrowed(value))
    }
}

/// Declared kind of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// 32-bit integer
    Int32,
    /// 32-bit float, sent as its bit pattern
    Float32,
    /// Quoted string
    String,
}

/// Resolves a named constant of an integer parameter to its value
pub type FlagLookup = fn(&str) -> Option<u32>;

/// [`FlagLookup`] over the constants of a `bitflags` type.
///
/// ```
/// use ardrone_link::at::commands::RefFlags;
/// use ardrone_link::at::params::flag_value;
///
/// assert_eq!(flag_value::<RefFlags>("START"), Some(512));
/// assert_eq!(flag_value::<RefFlags>("start"), None);
/// ```
pub fn flag_value<F: Flags<Bits = u32>>(name: &str) -> Option<u32> {
    F::from_name(name).map(|flag| flag.bits())
}

/// Static description of one command parameter.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    /// Parameter name, used for named arguments
    pub name: &'static str,

    /// Declared kind
    pub kind: ParamKind,

    /// Human readable description
    pub description: &'static str,

    /// Value used when the parameter is never set
    pub default: Option<Value>,

    /// Named constants (documentation only, no effect on packing)
    pub flags: Option<FlagLookup>,
}

impl ParamDescriptor {
    /// Integer parameter without default or flags
    pub const fn int32(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Int32,
            description,
            default: None,
            flags: None,
        }
    }

    /// Integer parameter carrying named constants
    pub const fn int32_with_flags(
        name: &'static str,
        description: &'static str,
        flags: FlagLookup,
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Int32,
            description,
            default: None,
            flags: Some(flags),
        }
    }

    /// Float parameter without default
    pub const fn float32(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Float32,
            description,
            default: None,
            flags: None,
        }
    }

    /// String-like parameter without default
    pub const fn string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::String,
            description,
            default: None,
            flags: None,
        }
    }

    /// Look up a named constant
    pub fn flag(&self, name: &str) -> Option<u32> {
        self.flags.and_then(|lookup| lookup(name))
    }

    /// Validate a value against this parameter's kind.
    ///
    /// # Errors
    ///
    /// - `IntegerOutOfRange` if an `Int32` value needs more than 32 bits
    /// - `FloatOutOfRange` if a finite `Float32` value rounds to infinity
    /// - `UnsupportedValue` if the value kind is not accepted, or if bytes
    ///   given to a `String` parameter are not valid UTF-8
    pub fn check(&self, value: &Value) -> Result<(), CommandError> {
        match (self.kind, value) {
            (ParamKind::Int32, Value::Int(v)) => {
                if v.unsigned_abs() >> 32 != 0 {
                    return Err(CommandError::IntegerOutOfRange {
                        name: self.name,
                        value: *v,
                    });
                }
                Ok(())
            }
            (ParamKind::Float32, Value::Float(v)) => {
                if v.is_finite() && !(*v as f32).is_finite() {
                    return Err(CommandError::FloatOutOfRange {
                        name: self.name,
                        value: *v,
                    });
                }
                Ok(())
            }
            (ParamKind::Float32, Value::Int(_)) => Ok(()),
            (ParamKind::String, Value::Bytes(bytes)) => {
                if std::str::from_utf8(bytes).is_err() {
                    return Err(CommandError::UnsupportedValue {
                        name: self.name,
                        found: "non-UTF-8 bytes",
                    });
                }
                Ok(())
            }
            (ParamKind::String, _) => Ok(()),
            (_, other) => Err(CommandError::UnsupportedValue {
                name: self.name,
                found: other.kind_name(),
            }),
        }
    }

    /// Pack a value into its wire token.
    ///
    /// # Errors
    ///
    /// Same as [`ParamDescriptor::check`].
    pub fn pack(&self, value: &Value) -> Result<String, CommandError> {
        self.check(value)?;

        let token = match (self.kind, value) {
            (ParamKind::Int32, Value::Int(v)) => pack_int32(*v),
            (ParamKind::Float32, Value::Int(v)) => pack_float32(*v as f64),
            (ParamKind::Float32, Value::Float(v)) => pack_float32(*v),
            (ParamKind::String, v) => pack_string(v),
            (_, other) => {
                return Err(CommandError::UnsupportedValue {
                    name: self.name,
                    found: other.kind_name(),
                })
            }
        };

        Ok(token)
    }
}

/// Pack an integer as decimal text
pub fn pack_int32(value: i64) -> String {
    value.to_string()
}

/// Pack a float as the decimal text of its single-precision bit pattern.
///
/// Same as `*(int *)&value` in C: `10.0` packs as `1092616192`.
pub fn pack_float32(value: f64) -> String {
    ((value as f32).to_bits() as i32).to_string()
}

/// Pack any value as a quoted string, dispatching on the runtime kind.
pub fn pack_string(value: &Value) -> String {
    match value {
        Value::Bool(true) => "\"TRUE\"".to_string(),
        Value::Bool(false) => "\"FALSE\"".to_string(),
        Value::Int(v) => quote(&v.to_string()),
        Value::Float(v) => quote(&float_text(*v)),
        Value::Text(text) => quote(text),
        Value::Bytes(bytes) => quote(&String::from_utf8_lossy(bytes)),
    }
}

/// Shortest round-trip text of a float: fixed notation with a trailing `.0`
/// for decimal exponents in `-4..16`, otherwise a signed exponent of at
/// least two digits (`1e+20`, `1.5e-05`).
fn float_text(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (-4..16).contains(&exponent) {
        let fixed = value.to_string();
        if fixed.contains('.') {
            fixed
        } else {
            format!("{}.0", fixed)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.unsigned_abs())
    }
}

fn quote(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_pack() {
        let param = ParamDescriptor::int32("input", "");
        assert_eq!(param.pack(&Value::Int(100)).unwrap(), "100");
        assert_eq!(param.pack(&Value::Int(-7)).unwrap(), "-7");
        assert_eq!(param.pack(&Value::Int(u32::MAX as i64)).unwrap(), "4294967295");
    }

    #[test]
    fn test_int_out_of_range() {
        let param = ParamDescriptor::int32("input", "");
        let err = param.check(&Value::Int(1 << 32)).unwrap_err();
        assert_eq!(
            err,
            CommandError::IntegerOutOfRange {
                name: "input",
                value: 1 << 32
            }
        );
        assert!(param.check(&Value::Int(-(1 << 32))).is_err());
        assert!(param.check(&Value::Int(-((1 << 32) - 1))).is_ok());
    }

    #[test]
    fn test_int_rejects_float() {
        let param = ParamDescriptor::int32("input", "");
        let err = param.check(&Value::Float(0.5)).unwrap_err();
        assert_eq!(
            err,
            CommandError::UnsupportedValue {
                name: "input",
                found: "float"
            }
        );
    }

    #[test]
    fn test_float_pack_known_vectors() {
        // Developer guide example: -0.8 is sent as -1085485875
        assert_eq!(pack_float32(-0.8), "-1085485875");
        assert_eq!(pack_float32(0.5), "1056964608");
        assert_eq!(pack_float32(0.0), "0");
    }

    #[test]
    fn test_float_pack_int_and_float_identical() {
        let param = ParamDescriptor::float32("roll", "");
        let from_float = param.pack(&Value::Float(10.0)).unwrap();
        let from_int = param.pack(&Value::Int(10)).unwrap();
        assert_eq!(from_float, from_int);
        assert_eq!(from_float, (10.0f32.to_bits() as i32).to_string());
        assert_eq!(from_float, "1092616192");
    }

    #[test]
    fn test_float_overflow_rejected() {
        let param = ParamDescriptor::float32("roll", "");
        let err = param.pack(&Value::Float(1e40)).unwrap_err();
        assert_eq!(
            err,
            CommandError::FloatOutOfRange {
                name: "roll",
                value: 1e40
            }
        );
        assert!(param.check(&Value::Float(-1e40)).is_err());
        assert!(param.check(&Value::Float(f32::MAX as f64)).is_ok());
        // Explicit infinities are passed through as-is
        assert_eq!(
            param.pack(&Value::Float(f64::INFINITY)).unwrap(),
            "2139095040"
        );
    }

    #[test]
    fn test_float_rejects_text() {
        let param = ParamDescriptor::float32("roll", "");
        assert!(param.check(&Value::from("fast")).is_err());
        assert!(param.check(&Value::Bool(true)).is_err());
    }

    #[test]
    fn test_str_pack_rules() {
        let param = ParamDescriptor::string("value", "");
        assert_eq!(param.pack(&Value::Int(6543)).unwrap(), "\"6543\"");
        assert_eq!(param.pack(&Value::Float(0.5)).unwrap(), "\"0.5\"");
        assert_eq!(param.pack(&Value::Float(1.0)).unwrap(), "\"1.0\"");
        assert_eq!(param.pack(&Value::from("ertb3")).unwrap(), "\"ertb3\"");
        assert_eq!(param.pack(&Value::Bool(true)).unwrap(), "\"TRUE\"");
        assert_eq!(param.pack(&Value::Bool(false)).unwrap(), "\"FALSE\"");
        assert_eq!(param.pack(&Value::from(b"jgoi".to_vec())).unwrap(), "\"jgoi\"");
    }

    #[test]
    fn test_str_pack_float_notation() {
        let param = ParamDescriptor::string("value", "");
        assert_eq!(param.pack(&Value::Float(1e20)).unwrap(), "\"1e+20\"");
        assert_eq!(param.pack(&Value::Float(1e-5)).unwrap(), "\"1e-05\"");
        assert_eq!(param.pack(&Value::Float(-1.5e-7)).unwrap(), "\"-1.5e-07\"");
        assert_eq!(param.pack(&Value::Float(1e16)).unwrap(), "\"1e+16\"");
        assert_eq!(
            param.pack(&Value::Float(1e15)).unwrap(),
            "\"1000000000000000.0\""
        );
        assert_eq!(param.pack(&Value::Float(0.0001)).unwrap(), "\"0.0001\"");
        assert_eq!(param.pack(&Value::Float(-2.0)).unwrap(), "\"-2.0\"");
        assert_eq!(param.pack(&Value::Float(3000.25)).unwrap(), "\"3000.25\"");
    }

    #[test]
    fn test_str_pack_escapes_quotes() {
        let param = ParamDescriptor::string("value", "");
        assert_eq!(
            param.pack(&Value::from("say \"hi\"")).unwrap(),
            "\"say \\\"hi\\\"\""
        );
    }

    #[test]
    fn test_str_rejects_invalid_utf8() {
        let param = ParamDescriptor::string("value", "");
        let err = param.check(&Value::from(vec![0xFF, 0xFE])).unwrap_err();
        assert!(matches!(err, CommandError::UnsupportedValue { .. }));
    }

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        struct Lights: u32 {
            const LEFT = 1;
            const RIGHT = 4;
        }
    }

    #[test]
    fn test_flag_lookup() {
        let param = ParamDescriptor::int32_with_flags("flag", "", flag_value::<Lights>);
        assert_eq!(param.flag("RIGHT"), Some(4));
        assert_eq!(param.flag("UP"), None);
        assert_eq!(ParamDescriptor::int32("input", "").flag("LEFT"), None);
        // Flags never change packing
        assert_eq!(param.pack(&Value::Int(5)).unwrap(), "5");
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(3u32), Value::Int(3));
        assert_eq!(Value::from(0.25f32), Value::Float(0.25));
        assert_eq!(Value::from(String::from("x")), Value::from("x"));
        assert_eq!(Value::from(true).kind_name(), "bool");
    }
}
