//! # AT Command Module
//!
//! Everything needed to turn a control intent into AT frames on the wire.
//!
//! This module handles:
//! - Typed parameter descriptors and their packing rules
//! - Immutable command values and the frame encoder
//! - The catalogue of supported command types
//! - The sequence-numbered link that transmits frames

pub mod command;
pub mod commands;
pub mod link;
pub mod params;

pub use command::{Command, CommandBuilder, CommandSpec};
pub use link::AtLink;
pub use params::{ParamDescriptor, ParamKind, Value};
