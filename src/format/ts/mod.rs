//! # MPEG Transport Stream (TS)
//!
//! Receiving side of the gateway plus a small writer used to produce test streams:
//!
//! - TS unit parsing and header writing
//! - Program Specific Information: PAT and PMT
//! - PES reassembly with PTS extraction
//! - A single-program muxer for H.264 access units
//!
//! ## Example Usage
//!
//! ```rust
//! use tsgate::format::ts::{PESAssembler, TSDemuxer, TSMuxer};
//!
//! let mut muxer = TSMuxer::new();
//! let mut stream = muxer.write_tables();
//! stream.extend(muxer.write_access_unit(&[0, 0, 0, 1, 0x65, 0x88], Some(3600)));
//! stream.extend(muxer.write_access_unit(&[0, 0, 0, 1, 0x41, 0x9A], Some(7200)));
//!
//! let mut demuxer = TSDemuxer::new();
//! let mut assembler = PESAssembler::new(muxer.video_pid());
//! let mut completed = Vec::new();
//! demuxer.feed(&stream, |unit| completed.extend(assembler.push(&unit)));
//!
//! // The second access unit stays open until a third one starts.
//! assert_eq!(completed.len(), 1);
//! assert_eq!(completed[0].pts, Some(3600));
//! ```

/// TS demuxer following PAT and PMT to the video PID
pub mod demuxer;

/// TS muxer producing a single-program H.264 stream
pub mod muxer;

/// PAT and PMT section parsing
pub mod parser;

/// PES reassembly and header writing
pub mod pes;

/// Core TS types and constants
pub mod types;

pub use demuxer::TSDemuxer;
pub use muxer::TSMuxer;
pub use parser::{parse_pat, parse_pmt};
pub use pes::{decode_timestamp, PESAssembler, PESHeader, PESPacket, PESPayload};
pub use types::{
    TSHeader, TSPacket, PID_PAT, PID_PMT, PID_VIDEO, STREAM_TYPE_H264, TS_PACKET_SIZE,
};
