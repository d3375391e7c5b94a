//! # Real-time Transport Protocol (RTP)
//!
//! RTP packets and the H.264 payload format of RFC 6184:
//!
//! - RTP header writing and parsing
//! - Single-NAL and FU-A packetization with a shared sequence counter
//! - Depacketization back to Annex B access units
//!
//! ## Example
//!
//! ```rust
//! use tsgate::format::rtp::{H264Depacketizer, H264Packetizer, RTPPacket};
//! use bytes::Bytes;
//!
//! let mut packetizer = H264Packetizer::default();
//! let mut packets: Vec<Bytes> = Vec::new();
//! let idr = vec![0x65; 3000];
//! packetizer.send_access_unit(&[&idr], Some(90_000), &mut packets);
//! assert_eq!(packets.len(), 3); // FU-A
//!
//! let mut depacketizer = H264Depacketizer::new();
//! let mut frame = None;
//! for raw in &packets {
//!     frame = depacketizer.push(&RTPPacket::parse(raw).unwrap()).unwrap();
//! }
//! assert_eq!(frame.unwrap().nalus[0].len(), 3000);
//! ```

use thiserror::Error;

pub mod depacketizer;
pub mod packet;
pub mod packetizer;

pub use depacketizer::{AccessUnit, H264Depacketizer};
pub use packet::{RTPPacket, RTP_HEADER_SIZE};
pub use packetizer::{H264Packetizer, RtpSink};

/// Errors that can occur during RTP operations
#[derive(Debug, Error)]
pub enum RTPError {
    /// The packet data is malformed or incomplete
    #[error("Invalid RTP packet")]
    InvalidPacket,

    /// The payload carries a NAL unit type this depacketizer does not handle
    #[error("Unsupported H.264 payload type {0}")]
    UnsupportedNalType(u8),
}

/// Specialized Result type for RTP operations
pub type Result<T> = std::result::Result<T, RTPError>;
