use std::fmt;

/// Fragmentation Unit type A, RFC 6184 §5.8
pub const NAL_TYPE_FU_A: u8 = 28;

/// Decoded one-byte NAL unit header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NALHeader {
    pub forbidden_zero_bit: bool,
    pub nal_ref_idc: u8,
    pub nal_type: u8,
}

impl NALHeader {
    pub fn parse(byte: u8) -> Self {
        Self {
            forbidden_zero_bit: byte & 0x80 != 0,
            nal_ref_idc: (byte >> 5) & 0x03,
            nal_type: byte & 0x1F,
        }
    }

    /// Header with the same F and NRI bits but another type, as FU-A indicators need.
    pub fn with_type(self, nal_type: u8) -> Self {
        Self { nal_type, ..self }
    }

    pub fn to_byte(self) -> u8 {
        let f = if self.forbidden_zero_bit { 0x80 } else { 0x00 };
        f | (self.nal_ref_idc & 0x03) << 5 | (self.nal_type & 0x1F)
    }
}

/// Short label for a NAL unit's header byte, as used in access-unit log lines.
///
/// Empty units are labelled `Empty`; types without a dedicated label render as `Type<n>`.
pub struct NALLabel<'a>(pub &'a [u8]);

impl fmt::Display for NALLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(&header) = self.0.first() else {
            return f.write_str("Empty");
        };
        match NALHeader::parse(header).nal_type {
            1 => f.write_str("Non-IDR"),
            5 => f.write_str("IDR"),
            6 => f.write_str("SEI"),
            7 => f.write_str("SPS"),
            8 => f.write_str("PPS"),
            9 => f.write_str("AUD"),
            t => write!(f, "Type{}", t),
        }
    }
}
