//! # PaVE De-encapsulation
//!
//! The drone wraps every encoded video frame in a 64-byte little-endian
//! "Parrot Video Encapsulation" header. [`PaveDemuxer`] turns the raw TCP
//! byte stream back into frames.

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::error::VideoError;

/// Frame start marker
pub const SIGNATURE: [u8; 4] = *b"PaVE";

/// Size of the fixed header
pub const HEADER_SIZE: usize = 64;

/// Codec of the encapsulated payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    Unknown,
    Vlib,
    P264,
    Mpeg4Visual,
    Mpeg4Avc,
    Other(u8),
}

impl From<u8> for VideoCodec {
    fn from(code: u8) -> Self {
        match code {
            0 => VideoCodec::Unknown,
            1 => VideoCodec::Vlib,
            2 => VideoCodec::P264,
            3 => VideoCodec::Mpeg4Visual,
            4 => VideoCodec::Mpeg4Avc,
            other => VideoCodec::Other(other),
        }
    }
}

/// Frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Unknown,
    Idr,
    I,
    P,
    Headers,
    Other(u8),
}

impl From<u8> for FrameType {
    fn from(code: u8) -> Self {
        match code {
            0 => FrameType::Unknown,
            1 => FrameType::Idr,
            2 => FrameType::I,
            3 => FrameType::P,
            4 => FrameType::Headers,
            other => FrameType::Other(other),
        }
    }
}

/// Parsed PaVE header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaveHeader {
    pub version: u8,
    pub codec: VideoCodec,
    /// Header size as declared, at least [`HEADER_SIZE`]
    pub header_size: u16,
    /// Bytes of encoded data following the header
    pub payload_size: u32,
    pub encoded_width: u16,
    pub encoded_height: u16,
    pub display_width: u16,
    pub display_height: u16,
    pub frame_number: u32,
    /// Milliseconds
    pub timestamp: u32,
    pub total_chunks: u8,
    pub chunk_index: u8,
    pub frame_type: FrameType,
    pub control: u8,
    pub stream_byte_position: u64,
    pub stream_id: u16,
    pub total_slices: u8,
    pub slice_index: u8,
    /// Size of the SPS inside the payload, 0 if absent
    pub sps_size: u8,
    /// Size of the PPS inside the payload, 0 if absent
    pub pps_size: u8,
    pub advertised_size: u32,
}

impl PaveHeader {
    /// Parse a header from at least [`HEADER_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` if the bytes do not start with `PaVE`
    /// - `InvalidHeaderSize` if fewer than 64 bytes are given or the declared
    ///   header is smaller than 64 bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, VideoError> {
        let mut buf = &bytes[..HEADER_SIZE.min(bytes.len())];
        let mut signature = [0u8; 4];
        if buf.remaining() >= 4 {
            buf.copy_to_slice(&mut signature);
        }
        if signature != SIGNATURE {
            return Err(VideoError::InvalidSignature(signature));
        }
        if buf.remaining() < HEADER_SIZE - SIGNATURE.len() {
            return Err(VideoError::InvalidHeaderSize(bytes.len() as u16));
        }

        let version = buf.get_u8();
        let codec = VideoCodec::from(buf.get_u8());
        let header_size = buf.get_u16_le();
        if (header_size as usize) < HEADER_SIZE {
            return Err(VideoError::InvalidHeaderSize(header_size));
        }

        let payload_size = buf.get_u32_le();
        let encoded_width = buf.get_u16_le();
        let encoded_height = buf.get_u16_le();
        let display_width = buf.get_u16_le();
        let display_height = buf.get_u16_le();
        let frame_number = buf.get_u32_le();
        let timestamp = buf.get_u32_le();
        let total_chunks = buf.get_u8();
        let chunk_index = buf.get_u8();
        let frame_type = FrameType::from(buf.get_u8());
        let control = buf.get_u8();
        let position_lw = buf.get_u32_le();
        let position_uw = buf.get_u32_le();
        let stream_id = buf.get_u16_le();
        let total_slices = buf.get_u8();
        let slice_index = buf.get_u8();
        let sps_size = buf.get_u8();
        let pps_size = buf.get_u8();
        buf.advance(2);
        let advertised_size = buf.get_u32_le();

        Ok(Self {
            version,
            codec,
            header_size,
            payload_size,
            encoded_width,
            encoded_height,
            display_width,
            display_height,
            frame_number,
            timestamp,
            total_chunks,
            chunk_index,
            frame_type,
            control,
            stream_byte_position: (u64::from(position_uw) << 32) | u64::from(position_lw),
            stream_id,
            total_slices,
            slice_index,
            sps_size,
            pps_size,
            advertised_size,
        })
    }
}

/// One de-encapsulated frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub header: PaveHeader,
    /// Encoded frame data, ready for a decoder
    pub payload: Bytes,
}

/// Reassembles frames from a PaVE byte stream
#[derive(Debug, Default)]
pub struct PaveDemuxer {
    buffer: BytesMut,
}

impl PaveDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the stream
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes waiting for a complete frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Extract the next complete frame, if one is buffered.
    ///
    /// Bytes before the next `PaVE` signature are dropped. A header with an
    /// invalid size is reported once and skipped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeaderSize` for a header declaring fewer than 64 bytes
    pub fn next_frame(&mut self) -> Result<Option<VideoFrame>, VideoError> {
        self.resync();
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = match PaveHeader::parse(&self.buffer) {
            Ok(header) => header,
            Err(e) => {
                // Skip this signature so the next call searches past it
                self.buffer.advance(SIGNATURE.len());
                return Err(e);
            }
        };

        let header_size = header.header_size as usize;
        let total = header_size + header.payload_size as usize;
        if self.buffer.len() < total {
            return Ok(None);
        }

        self.buffer.advance(header_size);
        let payload = self.buffer.split_to(header.payload_size as usize).freeze();
        debug!(
            "Video frame #{} ({:?}, {} bytes)",
            header.frame_number,
            header.frame_type,
            payload.len()
        );
        Ok(Some(VideoFrame { header, payload }))
    }

    fn resync(&mut self) {
        let found = self
            .buffer
            .windows(SIGNATURE.len())
            .position(|window| window == SIGNATURE);

        let skip = match found {
            Some(0) => return,
            Some(position) => position,
            // Keep a tail that could be the start of a split signature
            None => self.buffer.len().saturating_sub(SIGNATURE.len() - 1),
        };
        if skip > 0 {
            warn!("Skipped {} bytes of video stream looking for PaVE", skip);
            self.buffer.advance(skip);
        }
    }
}
