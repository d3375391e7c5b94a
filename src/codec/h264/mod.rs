//! # H.264/AVC Bitstream Handling
//!
//! Annex B start-code scanning and NAL unit header inspection. The gateway never
//! decodes video; it only needs unit boundaries and the one-byte NAL header to
//! drive RTP packetization (RFC 6184).
//!
//! ## Example: Splitting an Access Unit
//!
//! ```rust
//! use tsgate::codec::h264::{AnnexBScanner, NALLabel};
//!
//! let pes_payload = [0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1F, 0, 0, 1, 0x65, 0x88];
//! let labels: Vec<String> = AnnexBScanner::new(&pes_payload)
//!     .map(|nal| NALLabel(nal).to_string())
//!     .collect();
//! assert_eq!(labels, vec!["SPS", "IDR"]);
//! ```

/// Annex B start-code scanner
pub mod parser;
/// NAL unit header types
pub mod types;


#[doc(inline)]
pub use parser::*;
#[doc(inline)]
pub use types::*;
