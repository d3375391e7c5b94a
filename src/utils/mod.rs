//! # Utility Functions and Types
//!
//! ## CRC Calculation
//!
//! MPEG-2 CRC32 as used by PSI sections:
//!
//! ```rust
//! use tsgate::utils::Crc32Mpeg2;
//!
//! let crc = Crc32Mpeg2::new();
//! assert_eq!(crc.calculate(&[0x01, 0x01]), 0xD66FB816);
//! ```

/// CRC calculation implementations
pub mod crc;

pub use crc::Crc32Mpeg2;
