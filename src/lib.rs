#![doc(html_root_url = "https://docs.rs/tsgate/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsgate - MPEG-TS to RTP gateway
//!
//! `tsgate` receives an MPEG transport stream over UDP multicast, extracts the H.264
//! video and re-sends it as RTP (RFC 6184) to a unicast receiver that registered itself
//! with an SDP offer over HTTP.
//!
//! ## Pipeline
//!
//! ```text
//! multicast UDP -> TSDemuxer -> PESAssembler -> AnnexBScanner -> H264Packetizer -> RtpDistributor
//!                  (PAT/PMT)    (PTS)           (NAL units)      (single / FU-A)   (UDP unicast)
//! ```
//!
//! Each stage hands its output to the next directly; the whole chain runs on the ingest
//! task. Only the receiver set is shared with the HTTP task.
//!
//! ## Quick Start
//!
//! ```rust
//! use tsgate::format::ts::TSMuxer;
//! use tsgate::format::rtp::H264Packetizer;
//! use tsgate::gateway::Pipeline;
//! use bytes::Bytes;
//!
//! let mut muxer = TSMuxer::new();
//! let mut stream = muxer.write_tables();
//! stream.extend(muxer.write_access_unit(&[0, 0, 0, 1, 0x67, 0x42, 0, 0, 0, 1, 0x65, 0x88], Some(0)));
//! stream.extend(muxer.write_access_unit(&[0, 0, 0, 1, 0x41, 0x9A], Some(3600)));
//!
//! let mut pipeline = Pipeline::new(H264Packetizer::default(), Vec::<Bytes>::new());
//! pipeline.feed(&stream);
//! assert_eq!(pipeline.stats().rtp_packets, 2);
//! ```
//!
//! ## Module Overview
//!
//! - `codec`: H.264 Annex B scanning and NAL unit types
//! - `format`: transport stream, RTP and SDP
//! - `gateway`: ingest, distribution, sessions and the offer endpoint
//! - `config`: settings from files, environment and command line
//! - `error`: error type and result alias
//! - `utils`: CRC32 for PSI sections

/// H.264 bitstream handling
pub mod codec;

/// Configuration module
pub mod config;

/// Error types and utilities
pub mod error;

/// Container and protocol formats (TS, RTP, SDP)
pub mod format;

/// Network-facing gateway tasks
pub mod gateway;

/// Common utilities and helper functions
pub mod utils;

pub use error::{GatewayError, Result};
