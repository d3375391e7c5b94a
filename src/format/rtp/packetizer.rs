use super::packet::{RTPPacket, RTP_HEADER_SIZE};
use crate::codec::h264::{NALHeader, NAL_TYPE_FU_A};
use bytes::{BufMut, Bytes, BytesMut};

pub const DEFAULT_PAYLOAD_TYPE: u8 = 96;
pub const DEFAULT_SSRC: u32 = 0x12345678;
pub const DEFAULT_MAX_PAYLOAD: usize = 1200;

/// Timestamp step applied when an access unit carries no PTS.
pub const DEFAULT_TIMESTAMP_STEP: u32 = 3600;

const FU_HEADER_SIZE: usize = 2;
const FU_START: u8 = 0x80;
const FU_END: u8 = 0x40;

/// Consumer of serialized RTP packets, one call per packet in transmission order.
pub trait RtpSink {
    fn send_packet(&mut self, packet: Bytes);
}

impl RtpSink for Vec<Bytes> {
    fn send_packet(&mut self, packet: Bytes) {
        self.push(packet);
    }
}

/// H.264 RTP packetizer (RFC 6184, non-interleaved mode).
///
/// NAL units up to `max_payload` bytes go out as single-NAL packets; larger ones are split
/// into FU-A fragments of at most `max_payload - 2` bytes each. The marker bit is set on
/// the last packet of each access unit.
///
/// The sequence number and last timestamp belong to this instance alone; it is driven by
/// the single ingestion task.
#[derive(Debug)]
pub struct H264Packetizer {
    payload_type: u8,
    ssrc: u32,
    max_payload: usize,
    sequence_number: u16,
    last_timestamp: u32,
}

impl Default for H264Packetizer {
    fn default() -> Self {
        Self::new(DEFAULT_PAYLOAD_TYPE, DEFAULT_SSRC)
    }
}

impl H264Packetizer {
    pub fn new(payload_type: u8, ssrc: u32) -> Self {
        Self {
            payload_type,
            ssrc,
            max_payload: DEFAULT_MAX_PAYLOAD,
            sequence_number: 1,
            last_timestamp: 0,
        }
    }

    /// Sets the payload ceiling. Values below 3 leave no room for FU-A data and are raised.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload.max(FU_HEADER_SIZE + 1);
        self
    }

    /// Sequence number the next packet will carry.
    pub fn next_sequence_number(&self) -> u16 {
        self.sequence_number
    }

    pub fn last_timestamp(&self) -> u32 {
        self.last_timestamp
    }

    /// Packetizes one access unit into `sink`.
    ///
    /// With a PTS the RTP timestamp is its low 32 bits, otherwise the previous timestamp
    /// plus 3600. An empty access unit emits nothing and leaves the state untouched.
    pub fn send_access_unit<N: AsRef<[u8]>>(
        &mut self,
        nalus: &[N],
        pts: Option<u64>,
        sink: &mut dyn RtpSink,
    ) {
        if nalus.is_empty() {
            return;
        }

        let timestamp = match pts {
            Some(pts) => pts as u32,
            None => self.last_timestamp.wrapping_add(DEFAULT_TIMESTAMP_STEP),
        };
        self.last_timestamp = timestamp;

        let last = nalus.len() - 1;
        for (i, nalu) in nalus.iter().enumerate() {
            let nalu = nalu.as_ref();
            if nalu.len() <= self.max_payload {
                self.send_single(nalu, timestamp, i == last, sink);
            } else {
                self.send_fragmented(nalu, timestamp, i == last, sink);
            }
        }
    }

    fn send_single(&mut self, nalu: &[u8], timestamp: u32, marker: bool, sink: &mut dyn RtpSink) {
        let mut buf = BytesMut::with_capacity(RTP_HEADER_SIZE + nalu.len());
        self.write_header(&mut buf, timestamp, marker);
        buf.extend_from_slice(nalu);
        sink.send_packet(buf.freeze());
    }

    fn send_fragmented(
        &mut self,
        nalu: &[u8],
        timestamp: u32,
        last_nalu: bool,
        sink: &mut dyn RtpSink,
    ) {
        let nal_header = NALHeader::parse(nalu[0]);
        let indicator = nal_header.with_type(NAL_TYPE_FU_A).to_byte();
        let nal_type = nal_header.nal_type;

        let mut chunks = nalu[1..].chunks(self.max_payload - FU_HEADER_SIZE).peekable();
        let mut first = true;
        while let Some(chunk) = chunks.next() {
            let end = chunks.peek().is_none();

            let mut fu_header = nal_type;
            if first {
                fu_header |= FU_START;
            }
            if end {
                fu_header |= FU_END;
            }

            let mut buf = BytesMut::with_capacity(RTP_HEADER_SIZE + FU_HEADER_SIZE + chunk.len());
            self.write_header(&mut buf, timestamp, end && last_nalu);
            buf.put_u8(indicator);
            buf.put_u8(fu_header);
            buf.extend_from_slice(chunk);
            sink.send_packet(buf.freeze());

            first = false;
        }
    }

    fn write_header(&mut self, buf: &mut BytesMut, timestamp: u32, marker: bool) {
        let header = RTPPacket::new(
            self.payload_type,
            self.sequence_number,
            timestamp,
            self.ssrc,
            marker,
            Bytes::new(),
        );
        header.write_header(buf);
        self.sequence_number = self.sequence_number.wrapping_add(1);
    }
}
