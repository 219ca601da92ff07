//! # NavData Module
//!
//! Decodes telemetry datagrams sent by the drone on the NavData port.
//!
//! ## Frame Layout
//!
//! ```text
//! +----------------------+----------------------+-----+------------------+
//! | Metadata (16 bytes)  | option (tag,size,..) | ... | checksum (0xFFFF)|
//! +----------------------+----------------------+-----+------------------+
//! ```
//!
//! All integers are little-endian. The checksum record carries the sum of
//! every byte before it, modulo 2^32.
//!
//! A frame either decodes completely into a [`NavData`] snapshot or is
//! rejected with a [`NavDataError`]; partial snapshots are never produced.

pub mod field;
pub mod listener;
pub mod options;
pub mod state;

use std::collections::BTreeMap;

use bytes::Buf;

use crate::error::NavDataError;
use options::{decode_option, layout_size, NavOption, CHECKSUM_TAG, OPTION_HEADER_SIZE};
pub use listener::{NavDataHandle, NavDataListener};
pub use state::DroneState;

/// Expected value of [`Metadata::header`]
pub const MAGIC: u32 = 0x5566_7788;

/// Width of the metadata block at the start of every frame
pub const METADATA_SIZE: usize = 16;

/// Width of the trailing checksum record, excluded from the sum
const CHECKSUM_RECORD_SIZE: usize = 8;

/// Leading block of every NavData frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// Should be [`MAGIC`]
    pub header: u32,
    /// Raw drone state word
    pub state: u32,
    /// Device-side frame counter
    pub sequence_number: u32,
    pub vision_flag: u32,
}

impl Metadata {
    fn read<B: Buf>(buf: &mut B) -> Self {
        Self {
            header: buf.get_u32_le(),
            state: buf.get_u32_le(),
            sequence_number: buf.get_u32_le(),
            vision_flag: buf.get_u32_le(),
        }
    }

    /// Whether the header word carries the expected magic
    pub fn has_valid_magic(&self) -> bool {
        self.header == MAGIC
    }

    /// Flag view over the state word
    pub fn drone_state(&self) -> DroneState {
        DroneState::from_bits_retain(self.state)
    }
}

/// Immutable snapshot of one decoded NavData frame
#[derive(Debug, Clone, PartialEq)]
pub struct NavData {
    metadata: Metadata,
    options: BTreeMap<u16, NavOption>,
}

impl NavData {
    /// Decode one datagram.
    ///
    /// # Arguments
    ///
    /// * `buffer` - Complete datagram as received
    ///
    /// # Returns
    ///
    /// * `Result<NavData, NavDataError>` - Snapshot, or the reason the
    ///   datagram was rejected
    ///
    /// # Errors
    ///
    /// - `Truncated` if the buffer ends inside the metadata, an option
    ///   header or a record
    /// - `UnknownTag` for an option tag without a registered layout
    /// - `SizeMismatch` if an option declares a size other than its layout
    /// - `ChecksumAbsent` if no checksum record was found
    /// - `ChecksumMismatch` if the checksum record disagrees with the sum
    ///
    /// # Examples
    ///
    /// ```
    /// use ardrone_link::error::NavDataError;
    /// use ardrone_link::navdata::NavData;
    ///
    /// let err = NavData::decode(&[0x88, 0x77]).unwrap_err();
    /// assert!(matches!(err, NavDataError::Truncated { .. }));
    /// ```
    pub fn decode(buffer: &[u8]) -> Result<Self, NavDataError> {
        if buffer.len() < METADATA_SIZE {
            return Err(NavDataError::Truncated {
                offset: 0,
                needed: METADATA_SIZE,
                available: buffer.len(),
            });
        }

        let calculated = compute_checksum(&buffer[..buffer.len() - CHECKSUM_RECORD_SIZE]);
        let metadata = Metadata::read(&mut &buffer[..METADATA_SIZE]);

        let mut options = BTreeMap::new();
        let mut offset = METADATA_SIZE;
        while offset < buffer.len() {
            let available = buffer.len() - offset;
            if available < OPTION_HEADER_SIZE {
                return Err(NavDataError::Truncated {
                    offset,
                    needed: OPTION_HEADER_SIZE,
                    available,
                });
            }

            let mut header = &buffer[offset..offset + OPTION_HEADER_SIZE];
            let tag = header.get_u16_le();
            let size = header.get_u16_le() as usize;

            // A zero-sized option ends the frame
            if size == 0 {
                break;
            }

            let expected = layout_size(tag).ok_or(NavDataError::UnknownTag { tag, offset })?;
            if size != expected {
                return Err(NavDataError::SizeMismatch {
                    tag,
                    expected,
                    actual: size,
                });
            }

            let truncated = NavDataError::Truncated {
                offset,
                needed: size,
                available,
            };
            if available < size {
                return Err(truncated);
            }
            let option = decode_option(tag, &buffer[offset..offset + size]).ok_or(truncated)?;
            options.insert(tag, option);
            offset += size;
        }

        let reported = match options.get(&CHECKSUM_TAG) {
            Some(NavOption::Checksum(cks)) => cks.value,
            _ => return Err(NavDataError::ChecksumAbsent),
        };
        if reported != calculated {
            return Err(NavDataError::ChecksumMismatch {
                calculated,
                reported,
            });
        }

        Ok(Self { metadata, options })
    }

    /// Leading metadata block
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Flag view over the frame's state word
    pub fn state(&self) -> DroneState {
        self.metadata.drone_state()
    }

    /// Record stored under `tag`
    pub fn get(&self, tag: u16) -> Option<&NavOption> {
        self.options.get(&tag)
    }

    /// Every decoded record, ordered by tag
    pub fn options(&self) -> impl Iterator<Item = &NavOption> {
        self.options.values()
    }

    /// Whether a record with `tag` was present
    pub fn contains(&self, tag: u16) -> bool {
        self.options.contains_key(&tag)
    }
}

/// Sum of all bytes modulo 2^32
pub fn compute_checksum(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |sum, &byte| sum.wrapping_add(u32::from(byte)))
}

#[cfg(test)]
pub(crate) mod test_frames {
    use super::*;
    use crate::navdata::options::{Demo, OptionRecord};

    pub fn metadata(state: u32, sequence: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&state.to_le_bytes());
        out.extend_from_slice(&sequence.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }

    pub fn option_header(tag: u16, size: u16) -> Vec<u8> {
        let mut out = tag.to_le_bytes().to_vec();
        out.extend_from_slice(&size.to_le_bytes());
        out
    }

    /// Demo record with battery and altitude filled in
    pub fn demo(battery: u32, altitude: i32) -> Vec<u8> {
        let mut out = option_header(0, Demo::SIZE as u16);
        out.resize(Demo::SIZE, 0);
        out[8..12].copy_from_slice(&battery.to_le_bytes());
        out[24..28].copy_from_slice(&altitude.to_le_bytes());
        out
    }

    /// Append a valid checksum record to `body`
    pub fn seal(mut body: Vec<u8>) -> Vec<u8> {
        let sum = compute_checksum(&body);
        body.extend_from_slice(&option_header(CHECKSUM_TAG, 8));
        body.extend_from_slice(&sum.to_le_bytes());
        body
    }

    /// Complete valid frame: metadata, demo, checksum
    pub fn frame(state: u32, sequence: u32, battery: u32, altitude: i32) -> Vec<u8> {
        let mut body = metadata(state, sequence);
        body.extend_from_slice(&demo(battery, altitude));
        seal(body)
    }
}

#[cfg(test)]
mod tests {
    use super::test_frames::*;
    use super::*;

    #[test]
    fn test_decode_valid_frame() {
        let nav = NavData::decode(&frame(0x81, 42, 77, 150)).unwrap();

        assert!(nav.metadata().has_valid_magic());
        assert_eq!(nav.metadata().sequence_number, 42);
        assert!(nav.state().flying());
        assert!(nav.state().camera_ready());

        let demo = nav.demo().unwrap();
        assert_eq!(demo.vbat_flying_percentage, 77);
        assert_eq!(demo.altitude, 150);
        assert!(nav.checksum().is_some());
        assert!(nav.time().is_none());
    }

    #[test]
    fn test_flipped_byte_is_checksum_mismatch() {
        let mut buf = frame(0, 1, 50, 0);
        buf[METADATA_SIZE + 30] ^= 0x01;

        let err = NavData::decode(&buf).unwrap_err();
        assert!(matches!(err, NavDataError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_missing_checksum_record() {
        let buf = frame(0, 1, 50, 0);
        let err = NavData::decode(&buf[..buf.len() - 8]).unwrap_err();
        assert_eq!(err, NavDataError::ChecksumAbsent);
    }

    #[test]
    fn test_demo_size_mismatch() {
        let mut body = metadata(0, 1);
        body.extend_from_slice(&option_header(0, 100));
        body.resize(METADATA_SIZE + 100, 0);
        let buf = seal(body);

        let err = NavData::decode(&buf).unwrap_err();
        assert_eq!(
            err,
            NavDataError::SizeMismatch {
                tag: 0,
                expected: 148,
                actual: 100
            }
        );
    }

    #[test]
    fn test_unknown_tag() {
        let mut body = metadata(0, 1);
        body.extend_from_slice(&option_header(0x0100, 8));
        body.extend_from_slice(&[0; 4]);
        let buf = seal(body);

        let err = NavData::decode(&buf).unwrap_err();
        assert_eq!(
            err,
            NavDataError::UnknownTag {
                tag: 0x0100,
                offset: METADATA_SIZE
            }
        );
    }

    #[test]
    fn test_zero_size_option_stops_scanning() {
        let mut buf = metadata(0, 1);
        buf.extend_from_slice(&option_header(5, 0));
        buf.extend_from_slice(&[0xAA; 8]);

        let err = NavData::decode(&buf).unwrap_err();
        assert_eq!(err, NavDataError::ChecksumAbsent);
    }

    #[test]
    fn test_short_buffer() {
        let err = NavData::decode(&[0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            NavDataError::Truncated {
                offset: 0,
                needed: 16,
                available: 10
            }
        );
    }

    #[test]
    fn test_record_past_end_of_buffer() {
        let mut buf = metadata(0, 1);
        buf.extend_from_slice(&demo(10, 10)[..60]);

        let err = NavData::decode(&buf).unwrap_err();
        assert!(matches!(
            err,
            NavDataError::Truncated {
                offset: METADATA_SIZE,
                needed: 148,
                ..
            }
        ));
    }

    #[test]
    fn test_repeated_tag_keeps_last() {
        let mut body = metadata(0, 1);
        body.extend_from_slice(&demo(10, 1));
        body.extend_from_slice(&demo(20, 2));
        let nav = NavData::decode(&seal(body)).unwrap();

        assert_eq!(nav.demo().unwrap().vbat_flying_percentage, 20);
        assert_eq!(nav.options().count(), 2);
    }

    #[test]
    fn test_checksum_wraps() {
        let bytes = vec![0xFFu8; 16_843_010];
        assert_eq!(compute_checksum(&bytes), 0xFFu32.wrapping_mul(16_843_010));
    }
}
