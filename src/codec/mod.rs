pub mod h264;

// Re-export common types and functions
pub use h264::parser::{split_nal_units, AnnexBScanner};
pub use h264::types::{NALHeader, NALLabel};
