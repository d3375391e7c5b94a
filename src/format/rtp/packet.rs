use super::{RTPError, Result};
use bytes::{BufMut, Bytes, BytesMut};

pub const RTP_VERSION: u8 = 2;
pub const RTP_HEADER_SIZE: usize = 12;

/// An RTP packet (RFC 3550) with a fixed 12-byte header on the sending side.
///
/// Parsing accepts CSRC lists, header extensions and padding so that packets from other
/// senders can be read; writing never produces them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RTPPacket {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: Bytes,
}

impl RTPPacket {
    pub fn new(
        payload_type: u8,
        sequence_number: u16,
        timestamp: u32,
        ssrc: u32,
        marker: bool,
        payload: Bytes,
    ) -> Self {
        Self {
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            payload,
        }
    }

    /// Writes the header: version 2, no padding, no extension, no CSRC.
    pub fn write_header(&self, buf: &mut BytesMut) {
        buf.put_u8(RTP_VERSION << 6);
        buf.put_u8(((self.marker as u8) << 7) | (self.payload_type & 0x7F));
        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RTP_HEADER_SIZE + self.payload.len());
        self.write_header(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Parses a packet from one datagram.
    ///
    /// # Errors
    ///
    /// Returns `RTPError::InvalidPacket` when the datagram is shorter than its header,
    /// the version is not 2, or the CSRC list, extension or padding overrun the data.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < RTP_HEADER_SIZE {
            return Err(RTPError::InvalidPacket);
        }

        if data[0] >> 6 != RTP_VERSION {
            return Err(RTPError::InvalidPacket);
        }

        let padding = data[0] & 0x20 != 0;
        let extension = data[0] & 0x10 != 0;
        let csrc_count = (data[0] & 0x0F) as usize;

        let mut offset = RTP_HEADER_SIZE + csrc_count * 4;
        if offset > data.len() {
            return Err(RTPError::InvalidPacket);
        }

        if extension {
            if offset + 4 > data.len() {
                return Err(RTPError::InvalidPacket);
            }
            let words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 4 + words * 4;
            if offset > data.len() {
                return Err(RTPError::InvalidPacket);
            }
        }

        let mut end = data.len();
        if padding {
            let padding_len = data[end - 1] as usize;
            if padding_len == 0 || offset + padding_len > end {
                return Err(RTPError::InvalidPacket);
            }
            end -= padding_len;
        }

        Ok(Self {
            marker: data[1] & 0x80 != 0,
            payload_type: data[1] & 0x7F,
            sequence_number: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            payload: Bytes::copy_from_slice(&data[offset..end]),
        })
    }
}
