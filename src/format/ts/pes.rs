use super::types::{TSPacket, PTS_MASK};
use bytes::{BufMut, Bytes, BytesMut};

const PES_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];
const PTS_FLAG: u8 = 0x80;

/// Decodes a 33-bit PTS/DTS from its 5-byte on-wire form.
///
/// Layout: `xxxx PPP1 | PPPPPPPP | PPPPPPP1 | PPPPPPPP | PPPPPPP1`, marker bits dropped.
pub fn decode_timestamp(bytes: &[u8; 5]) -> u64 {
    let mut ts = ((bytes[0] as u64 >> 1) & 0x07) << 30;
    ts |= (bytes[1] as u64) << 22;
    ts |= ((bytes[2] as u64 >> 1) & 0x7F) << 15;
    ts |= (bytes[3] as u64) << 7;
    ts |= (bytes[4] as u64 >> 1) & 0x7F;
    ts
}

/// Writes a PTS with its `0010` prefix.
fn write_pts(buf: &mut BytesMut, ts: u64) {
    let ts = ts & PTS_MASK;

    // First byte: prefix, 3 MSB of timestamp, marker
    buf.put_u8(0x20 | ((ts >> 29) & 0x0E) as u8 | 0x01);

    // Middle 15 bits and marker
    buf.put_u16((((ts >> 14) & 0xFFFE) | 0x01) as u16);

    // Final 15 bits and marker
    buf.put_u16((((ts << 1) & 0xFFFE) | 0x01) as u16);
}

/// A reassembled elementary-stream payload with its optional 90 kHz PTS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PESPayload {
    pub data: Bytes,
    pub pts: Option<u64>,
}

/// Rebuilds PES packets from the transport units of one PID.
///
/// A payload-start unit closes the packet in progress (if it holds any bytes) and opens a
/// new one; continuation units extend it. Units seen before the first payload start are
/// dropped. The PES length field is informational only: a packet is complete when the
/// next one starts.
#[derive(Debug)]
pub struct PESAssembler {
    pid: u16,
    buffer: BytesMut,
    pts: Option<u64>,
    started: bool,
}

impl PESAssembler {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            buffer: BytesMut::new(),
            pts: None,
            started: false,
        }
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    /// Feeds one transport unit; returns the previous packet when this unit completes it.
    pub fn push(&mut self, packet: &TSPacket) -> Option<PESPayload> {
        if packet.pid != self.pid {
            return None;
        }

        let payload = packet.payload();
        if payload.is_empty() {
            return None;
        }

        if !packet.payload_unit_start {
            if self.started {
                self.buffer.extend_from_slice(payload);
            }
            return None;
        }

        let completed = if self.started && !self.buffer.is_empty() {
            Some(PESPayload {
                data: self.buffer.split().freeze(),
                pts: self.pts,
            })
        } else {
            None
        };

        self.buffer.clear();
        self.pts = None;
        self.started = true;

        let offset = self.parse_header(payload);
        if offset < payload.len() {
            self.buffer.extend_from_slice(&payload[offset..]);
        }

        completed
    }

    /// Reads the PES header at the start of `payload`, recording the PTS if present.
    /// Returns where the elementary stream data begins.
    fn parse_header(&mut self, payload: &[u8]) -> usize {
        if payload.len() < 6 || payload[..3] != PES_START_CODE {
            return 0;
        }

        let stream_id = payload[3];
        let packet_length = u16::from_be_bytes([payload[4], payload[5]]);
        log::trace!(
            "PES start on PID {:#x}: stream_id={:#04x}, length={}",
            self.pid,
            stream_id,
            packet_length
        );

        let mut offset = 6;
        if offset + 3 > payload.len() {
            return offset;
        }

        let flags = payload[offset + 1];
        let header_data_length = payload[offset + 2] as usize;
        offset += 3;

        if flags & PTS_FLAG != 0 {
            if let Some(pts) = payload.get(offset..offset + 5) {
                let mut raw = [0u8; 5];
                raw.copy_from_slice(pts);
                self.pts = Some(decode_timestamp(&raw));
            }
        }

        offset + header_data_length
    }
}

/// Packetized Elementary Stream (PES) header for writing.
#[derive(Debug, Clone, Default)]
pub struct PESHeader {
    /// Stream identifier indicating content type (video/audio/etc.)
    pub stream_id: u8,
    /// Length of the PES packet after this field; 0 means unbounded (video only)
    pub packet_length: u16,
    /// Data alignment indicator
    pub data_alignment: bool,
    /// Presentation Time Stamp (33 bits)
    pub pts: Option<u64>,
}

impl PESHeader {
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            ..Default::default()
        }
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = Some(pts & PTS_MASK);
        self
    }

    /// Bytes of optional fields following the header_data_length byte.
    pub fn header_data_length(&self) -> u8 {
        if self.pts.is_some() {
            5
        } else {
            0
        }
    }

    /// Encodes the header according to ISO/IEC 13818-1 PES syntax.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_slice(&PES_START_CODE);
        buf.put_u8(self.stream_id);
        buf.put_u16(self.packet_length);

        // '10' marker bits, no scrambling, priority, copyright or original flags
        let mut flags1 = 0x80u8;
        if self.data_alignment {
            flags1 |= 0x04;
        }
        buf.put_u8(flags1);

        let mut flags2 = 0u8;
        if self.pts.is_some() {
            flags2 |= PTS_FLAG;
        }
        buf.put_u8(flags2);
        buf.put_u8(self.header_data_length());

        if let Some(pts) = self.pts {
            write_pts(buf, pts);
        }
    }
}

/// A complete PES packet ready to be split into transport units.
#[derive(Debug)]
pub struct PESPacket {
    pub header: PESHeader,
    pub payload: Bytes,
}

impl PESPacket {
    pub fn new(stream_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            header: PESHeader::new(stream_id),
            payload: payload.into(),
        }
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.header = self.header.with_pts(pts);
        self
    }

    /// Serializes header and payload, filling in the packet length when it fits in 16 bits.
    pub fn to_bytes(&self) -> Bytes {
        let mut header = self.header.clone();
        let after_length = 3 + header.header_data_length() as usize + self.payload.len();
        header.packet_length = u16::try_from(after_length).unwrap_or(0);

        let mut buf = BytesMut::with_capacity(6 + after_length);
        header.write_to(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::types::{TS_PACKET_SIZE, STREAM_ID_H264};

    fn ts_unit(pid: u16, start: bool, payload: &[u8]) -> TSPacket {
        let mut raw = vec![0xFFu8; TS_PACKET_SIZE];
        raw[0] = 0x47;
        raw[1] = (if start { 0x40 } else { 0x00 }) | (pid >> 8) as u8;
        raw[2] = pid as u8;
        if payload.len() >= 184 {
            raw[3] = 0x10;
            raw[4..].copy_from_slice(&payload[..184]);
        } else {
            // Pad with adaptation field stuffing so the payload ends the unit exactly
            let stuffing = 184 - payload.len() - 1;
            raw[3] = 0x30;
            raw[4] = stuffing as u8;
            if stuffing > 0 {
                raw[5] = 0x00;
            }
            raw[5 + stuffing..].copy_from_slice(payload);
        }
        TSPacket::parse(Bytes::from(raw)).unwrap()
    }

    #[test]
    fn test_decode_timestamp_markers_only() {
        assert_eq!(decode_timestamp(&[0x21, 0x00, 0x01, 0x00, 0x01]), 0);
    }

    #[test]
    fn test_decode_timestamp_known_value() {
        // 0x1_2345_6789 encoded by hand
        let pts = 0x1_2345_6789u64;
        let raw = [
            0x20 | ((pts >> 29) & 0x0E) as u8 | 1,
            (pts >> 22) as u8,
            ((pts >> 14) as u8 & 0xFE) | 1,
            (pts >> 7) as u8,
            ((pts << 1) as u8 & 0xFE) | 1,
        ];
        assert_eq!(decode_timestamp(&raw), pts);
    }

    #[test]
    fn test_write_then_decode_timestamp() {
        for pts in [0u64, 1, 90_000, 0x1_FFFF_FFFF, 0xFFFF_FFFF] {
            let mut buf = BytesMut::new();
            write_pts(&mut buf, pts);
            assert_eq!(buf[0] & 0xF0, 0x20);
            let mut raw = [0u8; 5];
            raw.copy_from_slice(&buf);
            assert_eq!(decode_timestamp(&raw), pts);
        }
    }

    #[test]
    fn test_assembles_across_units() {
        let pes = PESPacket::new(STREAM_ID_H264, vec![0xAB; 300])
            .with_pts(180_000)
            .to_bytes();

        let mut assembler = PESAssembler::new(0x101);
        assert!(assembler.push(&ts_unit(0x101, true, &pes[..184])).is_none());
        assert!(assembler.push(&ts_unit(0x101, false, &pes[184..])).is_none());

        let next = PESPacket::new(STREAM_ID_H264, vec![0xCD; 10]).to_bytes();
        let done = assembler.push(&ts_unit(0x101, true, &next)).unwrap();
        assert_eq!(done.pts, Some(180_000));
        assert_eq!(done.data.len(), 300);
        assert!(done.data.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_drops_units_before_first_start() {
        let mut assembler = PESAssembler::new(0x101);
        assert!(assembler.push(&ts_unit(0x101, false, &[1, 2, 3])).is_none());

        let pes = PESPacket::new(STREAM_ID_H264, vec![7, 8, 9]).to_bytes();
        assert!(assembler.push(&ts_unit(0x101, true, &pes)).is_none());
        let done = assembler.push(&ts_unit(0x101, true, &pes)).unwrap();
        assert_eq!(&done.data[..], &[7, 8, 9]);
        assert_eq!(done.pts, None);
    }

    #[test]
    fn test_ignores_other_pids() {
        let mut assembler = PESAssembler::new(0x101);
        let pes = PESPacket::new(STREAM_ID_H264, vec![1]).to_bytes();
        assert!(assembler.push(&ts_unit(0x101, true, &pes)).is_none());
        assert!(assembler.push(&ts_unit(0x102, false, &[9, 9])).is_none());
        let done = assembler.push(&ts_unit(0x101, true, &pes)).unwrap();
        assert_eq!(&done.data[..], &[1]);
    }

    #[test]
    fn test_payload_without_start_code_is_kept_whole() {
        let mut assembler = PESAssembler::new(0x101);
        assembler.push(&ts_unit(0x101, true, &[0x11, 0x22, 0x33]));
        let done = assembler.push(&ts_unit(0x101, true, &[0x44])).unwrap();
        assert_eq!(&done.data[..], &[0x11, 0x22, 0x33]);
    }

    #[test]
    fn test_truncated_pts_is_ignored() {
        let mut assembler = PESAssembler::new(0x101);
        // PTS flag set but only 2 of 5 PTS bytes present
        assembler.push(&ts_unit(0x101, true, &[0, 0, 1, 0xE0, 0, 0, 0x80, 0x80, 0x05, 0x21, 0x00]));
        let next = PESPacket::new(STREAM_ID_H264, vec![1]).to_bytes();
        // Header length runs past the payload, so nothing was buffered and no packet completes.
        assert!(assembler.push(&ts_unit(0x101, true, &next)).is_none());
    }

    #[test]
    fn test_pes_header_layout() {
        let pes = PESPacket::new(STREAM_ID_H264, vec![0x09, 0xF0]).with_pts(0).to_bytes();
        assert_eq!(
            &pes[..],
            &[
                0x00, 0x00, 0x01, 0xE0, // start code, stream id
                0x00, 0x0A, // length: 3 + 5 + 2
                0x80, 0x80, 0x05, // flags, header data length
                0x21, 0x00, 0x01, 0x00, 0x01, // PTS 0
                0x09, 0xF0,
            ]
        );
    }
}
