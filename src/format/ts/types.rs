use bytes::{BufMut, Bytes, BytesMut};

// Stream IDs
pub const STREAM_ID_H264: u8 = 0xe0;

// PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_PMT: u16 = 0x1000;
pub const PID_VIDEO: u16 = 0x0100;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

// Elementary Stream Types
pub const STREAM_TYPE_H264: u8 = 0x1b;

// Constants
pub const SYNC_BYTE: u8 = 0x47;
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;

/// Largest PTS value (33 bits).
pub const PTS_MASK: u64 = 0x1_FFFF_FFFF;

#[derive(Debug, Clone)]
pub struct PATEntry {
    pub program_number: u16,
    pub program_map_pid: u16,
}

#[derive(Debug, Clone, Default)]
pub struct PAT {
    pub entries: Vec<PATEntry>,
}

impl PAT {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len() * 4
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn write_to(&self, buf: &mut BytesMut) {
        for entry in &self.entries {
            buf.put_u16(entry.program_number);
            buf.put_u16(entry.program_map_pid & 0x1fff | 7 << 13);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElementaryStreamInfo {
    pub stream_type: u8,
    pub elementary_pid: u16,
    pub descriptors: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct PMT {
    pub pcr_pid: u16,
    pub program_descriptors: Vec<u8>,
    pub elementary_stream_infos: Vec<ElementaryStreamInfo>,
}

impl PMT {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let mut n = 4; // PCRPID + program info length
        n += self.program_descriptors.len();
        for info in &self.elementary_stream_infos {
            n += 5 + info.descriptors.len(); // stream_type + elementary_pid + ES info length
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.elementary_stream_infos.is_empty()
    }

    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u16(self.pcr_pid & 0x1fff | 7 << 13);

        buf.put_u16((self.program_descriptors.len() as u16) & 0x3ff | 0xf << 12);
        buf.put_slice(&self.program_descriptors);

        for info in &self.elementary_stream_infos {
            buf.put_u8(info.stream_type);
            buf.put_u16(info.elementary_pid & 0x1fff | 7 << 13);
            buf.put_u16((info.descriptors.len() as u16) & 0x3ff | 0xf << 12);
            buf.put_slice(&info.descriptors);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TSHeader {
    pub sync_byte: u8, // Always 0x47
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_exists: bool,
    pub contains_payload: bool,
    pub continuity_counter: u8,
}

impl Default for TSHeader {
    fn default() -> Self {
        Self {
            sync_byte: SYNC_BYTE,
            transport_error: false,
            payload_unit_start: false,
            transport_priority: false,
            pid: 0,
            scrambling_control: 0,
            adaptation_field_exists: false,
            contains_payload: true,
            continuity_counter: 0,
        }
    }
}

impl TSHeader {
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.sync_byte);

        let mut b1 = 0u8;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        if self.transport_priority {
            b1 |= 0x20;
        }
        b1 |= ((self.pid >> 8) & 0x1f) as u8;
        buf.put_u8(b1);

        buf.put_u8((self.pid & 0xff) as u8);

        let mut b3 = self.scrambling_control << 6;
        if self.adaptation_field_exists {
            b3 |= 0x20;
        }
        if self.contains_payload {
            b3 |= 0x10;
        }
        b3 |= self.continuity_counter & 0x0f;
        buf.put_u8(b3);
    }

    /// The two-bit adaptation_field_control value.
    pub fn adaptation_field_control(&self) -> u8 {
        (self.adaptation_field_exists as u8) << 1 | self.contains_payload as u8
    }
}

/// One 188-byte transport unit.
///
/// The payload region starts after the 4-byte header and, when the adaptation field
/// control is 2 or 3, after the adaptation field whose length is its first byte. An
/// offset running past the unit yields an empty payload.
#[derive(Debug, Clone)]
pub struct TSPacket {
    raw: Bytes,
    pub payload_unit_start: bool,
    pub pid: u16,
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
    payload_offset: usize,
}

impl TSPacket {
    /// Parses one unit. Returns `None` unless `raw` is exactly 188 bytes starting with 0x47.
    pub fn parse(raw: Bytes) -> Option<Self> {
        if raw.len() != TS_PACKET_SIZE || raw[0] != SYNC_BYTE {
            return None;
        }

        let adaptation_field_control = (raw[3] & 0x30) >> 4;
        let mut payload_offset = TS_HEADER_SIZE;
        if adaptation_field_control == 2 || adaptation_field_control == 3 {
            payload_offset += 1 + raw[TS_HEADER_SIZE] as usize;
        }

        Some(Self {
            payload_unit_start: (raw[1] & 0x40) != 0,
            pid: (((raw[1] & 0x1F) as u16) << 8) | raw[2] as u16,
            adaptation_field_control,
            continuity_counter: raw[3] & 0x0F,
            payload_offset,
            raw,
        })
    }

    pub fn payload(&self) -> &[u8] {
        self.raw.get(self.payload_offset..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(header: [u8; 4]) -> Vec<u8> {
        let mut raw = vec![0xFFu8; TS_PACKET_SIZE];
        raw[..4].copy_from_slice(&header);
        raw
    }

    #[test]
    fn test_parse_header_fields() {
        let packet = TSPacket::parse(Bytes::from(unit([0x47, 0x41, 0x01, 0x1A]))).unwrap();
        assert!(packet.payload_unit_start);
        assert_eq!(packet.pid, 0x101);
        assert_eq!(packet.adaptation_field_control, 1);
        assert_eq!(packet.continuity_counter, 0x0A);
        assert_eq!(packet.payload().len(), TS_PACKET_SIZE - TS_HEADER_SIZE);
    }

    #[test]
    fn test_rejects_bad_sync_and_length() {
        assert!(TSPacket::parse(Bytes::from(unit([0x48, 0x40, 0x00, 0x10]))).is_none());
        assert!(TSPacket::parse(Bytes::from(vec![0x47; 187])).is_none());
        assert!(TSPacket::parse(Bytes::from(vec![0x47; 189])).is_none());
    }

    #[test]
    fn test_adaptation_field_skipped() {
        let mut raw = unit([0x47, 0x01, 0x01, 0x30]);
        raw[4] = 10; // adaptation field length
        raw[15] = 0xAB; // first payload byte
        let packet = TSPacket::parse(Bytes::from(raw)).unwrap();
        assert_eq!(packet.adaptation_field_control, 3);
        assert_eq!(packet.payload().len(), TS_PACKET_SIZE - 15);
        assert_eq!(packet.payload()[0], 0xAB);
    }

    #[test]
    fn test_oversized_adaptation_field_yields_empty_payload() {
        let mut raw = unit([0x47, 0x01, 0x01, 0x20]);
        raw[4] = 0xFF;
        let packet = TSPacket::parse(Bytes::from(raw)).unwrap();
        assert!(packet.payload().is_empty());

        let mut raw = unit([0x47, 0x01, 0x01, 0x20]);
        raw[4] = 183; // exactly fills the unit
        let packet = TSPacket::parse(Bytes::from(raw)).unwrap();
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn test_header_write_round_trip() {
        let header = TSHeader {
            payload_unit_start: true,
            pid: 0x1FFF,
            continuity_counter: 7,
            adaptation_field_exists: true,
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        header.write_to(&mut buf);
        assert_eq!(&buf[..], &[0x47, 0x5F, 0xFF, 0x37]);
        assert_eq!(header.adaptation_field_control(), 3);
    }
}
