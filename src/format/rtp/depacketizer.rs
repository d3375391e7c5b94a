use super::packet::RTPPacket;
use super::{RTPError, Result};
use crate::codec::h264::{NALHeader, NAL_TYPE_FU_A};
use bytes::{BufMut, Bytes, BytesMut};

const NAL_TYPE_STAP_A: u8 = 24;

/// Sequence distances at or beyond this are packets from the past, not losses.
const MAX_FORWARD_GAP: u16 = 0x8000;

/// NAL units sharing one RTP timestamp, closed by the marker bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    pub timestamp: u32,
    pub nalus: Vec<Bytes>,
}

impl AccessUnit {
    /// Annex B form with a 4-byte start code before every NAL unit.
    pub fn to_annex_b(&self) -> Bytes {
        let size = self.nalus.iter().map(|n| n.len() + 4).sum();
        let mut buf = BytesMut::with_capacity(size);
        for nalu in &self.nalus {
            buf.put_slice(&[0, 0, 0, 1]);
            buf.put_slice(nalu);
        }
        buf.freeze()
    }
}

/// Rebuilds H.264 access units from RTP packets (RFC 6184 single NAL, STAP-A, FU-A).
///
/// A sequence gap discards the fragment in progress; fragments arriving without their
/// start are dropped, and so are packets arriving after a later one. A timestamp change before the marker discards the partial unit.
#[derive(Debug, Default)]
pub struct H264Depacketizer {
    timestamp: Option<u32>,
    expected_seq: Option<u16>,
    nalus: Vec<Bytes>,
    fragment: Option<BytesMut>,
    lost: u64,
}

impl H264Depacketizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packets found missing from sequence gaps so far.
    pub fn lost_packets(&self) -> u64 {
        self.lost
    }

    /// Feeds one packet; returns an access unit when its marker packet arrives.
    pub fn push(&mut self, packet: &RTPPacket) -> Result<Option<AccessUnit>> {
        if let Some(expected) = self.expected_seq {
            let gap = packet.sequence_number.wrapping_sub(expected);
            if gap >= MAX_FORWARD_GAP {
                log::debug!(
                    "dropping late RTP packet {} (expected {})",
                    packet.sequence_number,
                    expected
                );
                return Ok(None);
            }
            if gap != 0 {
                log::debug!("RTP sequence gap: expected {}, got {}", expected, packet.sequence_number);
                self.lost += gap as u64;
                self.fragment = None;
            }
        }
        self.expected_seq = Some(packet.sequence_number.wrapping_add(1));

        if self.timestamp != Some(packet.timestamp) {
            if !self.nalus.is_empty() || self.fragment.is_some() {
                log::debug!("discarding access unit without marker at {:?}", self.timestamp);
            }
            self.nalus.clear();
            self.fragment = None;
            self.timestamp = Some(packet.timestamp);
        }

        self.depacketize(&packet.payload)?;

        if !packet.marker {
            return Ok(None);
        }

        self.fragment = None;
        if self.nalus.is_empty() {
            return Ok(None);
        }

        Ok(Some(AccessUnit {
            timestamp: packet.timestamp,
            nalus: std::mem::take(&mut self.nalus),
        }))
    }

    fn depacketize(&mut self, payload: &Bytes) -> Result<()> {
        let Some(&header) = payload.first() else {
            return Ok(());
        };

        match header & 0x1F {
            1..=23 => self.nalus.push(payload.clone()),
            NAL_TYPE_STAP_A => {
                let mut offset = 1;
                while offset + 2 <= payload.len() {
                    let size = u16::from_be_bytes([payload[offset], payload[offset + 1]]) as usize;
                    offset += 2;
                    if offset + size > payload.len() {
                        return Err(RTPError::InvalidPacket);
                    }
                    self.nalus.push(payload.slice(offset..offset + size));
                    offset += size;
                }
            }
            NAL_TYPE_FU_A => {
                if payload.len() < 2 {
                    return Err(RTPError::InvalidPacket);
                }
                let fu_header = payload[1];
                let start = fu_header & 0x80 != 0;
                let end = fu_header & 0x40 != 0;

                if start {
                    let mut nalu = BytesMut::with_capacity(payload.len() * 4);
                    nalu.put_u8(NALHeader::parse(header).with_type(fu_header & 0x1F).to_byte());
                    self.fragment = Some(nalu);
                }

                match self.fragment.as_mut() {
                    Some(nalu) => nalu.put_slice(&payload[2..]),
                    None => {
                        log::trace!("dropping FU-A fragment without start");
                        return Ok(());
                    }
                }

                if end {
                    if let Some(nalu) = self.fragment.take() {
                        self.nalus.push(nalu.freeze());
                    }
                }
            }
            other => return Err(RTPError::UnsupportedNalType(other)),
        }

        Ok(())
    }
}
