use super::pes::PESPacket;
use super::types::*;
use crate::utils::crc::Crc32Mpeg2;
use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

const PAT_TRANSPORT_STREAM_ID: u16 = 0x0001;
const PROGRAM_NUMBER: u16 = 0x0001;
const PCR_SIZE: usize = 6;
const TS_PAYLOAD_SIZE: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;

/// Writes a single-program transport stream carrying one H.264 elementary stream.
///
/// Used to produce test input for the gateway: program tables on demand, then one PES per
/// access unit split across as many 188-byte units as needed. The first unit of each access
/// unit with a PTS carries a PCR equal to that PTS.
pub struct TSMuxer {
    pmt_pid: u16,
    video_pid: u16,
    pat: PAT,
    pmt: PMT,
    crc: Crc32Mpeg2,
    continuity_counters: HashMap<u16, u8>,
}

impl Default for TSMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl TSMuxer {
    pub fn new() -> Self {
        Self::with_pids(PID_PMT, PID_VIDEO)
    }

    pub fn with_pids(pmt_pid: u16, video_pid: u16) -> Self {
        let mut pat = PAT::new();
        pat.entries.push(PATEntry {
            program_number: PROGRAM_NUMBER,
            program_map_pid: pmt_pid,
        });

        let mut pmt = PMT::new();
        pmt.pcr_pid = video_pid;
        pmt.elementary_stream_infos.push(ElementaryStreamInfo {
            stream_type: STREAM_TYPE_H264,
            elementary_pid: video_pid,
            descriptors: Vec::new(),
        });

        Self {
            pmt_pid,
            video_pid,
            pat,
            pmt,
            crc: Crc32Mpeg2::new(),
            continuity_counters: HashMap::new(),
        }
    }

    pub fn video_pid(&self) -> u16 {
        self.video_pid
    }

    /// One PAT unit followed by one PMT unit.
    pub fn write_tables(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TS_PACKET_SIZE * 2);

        let mut body = BytesMut::with_capacity(self.pat.len());
        self.pat.write_to(&mut body);
        self.write_section(&mut out, PID_PAT, TABLE_ID_PAT, PAT_TRANSPORT_STREAM_ID, &body);

        let mut body = BytesMut::with_capacity(self.pmt.len());
        self.pmt.write_to(&mut body);
        self.write_section(&mut out, self.pmt_pid, TABLE_ID_PMT, PROGRAM_NUMBER, &body);

        out
    }

    /// Wraps one Annex B access unit in a PES and splits it into transport units.
    pub fn write_access_unit(&mut self, access_unit: &[u8], pts: Option<u64>) -> Vec<u8> {
        let mut pes = PESPacket::new(STREAM_ID_H264, access_unit.to_vec());
        pes.header.data_alignment = true;
        if let Some(pts) = pts {
            pes = pes.with_pts(pts);
        }
        let pes = pes.to_bytes();

        let mut out = Vec::with_capacity((pes.len() / TS_PAYLOAD_SIZE + 1) * TS_PACKET_SIZE);
        let mut offset = 0;
        while offset < pes.len() {
            let pcr = if offset == 0 { pts } else { None };

            // Adaptation field length, not counting its own length byte
            let mut adaptation_length = pcr.map(|_| 1 + PCR_SIZE);
            let space = TS_PAYLOAD_SIZE - adaptation_length.map_or(0, |len| len + 1);
            let chunk = (pes.len() - offset).min(space);
            let stuffing = space - chunk;
            if stuffing > 0 {
                adaptation_length = Some(match adaptation_length {
                    Some(len) => len + stuffing,
                    None => stuffing - 1,
                });
            }

            let header = TSHeader {
                payload_unit_start: offset == 0,
                pid: self.video_pid,
                adaptation_field_exists: adaptation_length.is_some(),
                continuity_counter: self.next_continuity_counter(self.video_pid),
                ..Default::default()
            };

            let mut buf = BytesMut::with_capacity(TS_PACKET_SIZE);
            header.write_to(&mut buf);
            if let Some(len) = adaptation_length {
                write_adaptation_field(&mut buf, len, pcr);
            }
            buf.extend_from_slice(&pes[offset..offset + chunk]);
            debug_assert_eq!(buf.len(), TS_PACKET_SIZE);

            out.extend_from_slice(&buf);
            offset += chunk;
        }

        out
    }

    fn write_section(&mut self, out: &mut Vec<u8>, pid: u16, table_id: u8, id: u16, body: &[u8]) {
        let header = TSHeader {
            payload_unit_start: true,
            pid,
            continuity_counter: self.next_continuity_counter(pid),
            ..Default::default()
        };

        let mut buf = BytesMut::with_capacity(TS_PACKET_SIZE);
        header.write_to(&mut buf);
        buf.put_u8(0x00); // pointer field

        let section_start = buf.len();
        // id(2) + version(1) + section numbers(2) + body + CRC(4)
        let section_length = 5 + body.len() + 4;
        buf.put_u8(table_id);
        buf.put_u16(0xB000 | section_length as u16);
        buf.put_u16(id);
        buf.put_u8(0xC1); // version 0, current
        buf.put_u8(0x00);
        buf.put_u8(0x00);
        buf.put_slice(body);

        let crc = self.crc.calculate(&buf[section_start..]);
        buf.put_u32(crc);

        buf.resize(TS_PACKET_SIZE, 0xFF);
        out.extend_from_slice(&buf);
    }

    fn next_continuity_counter(&mut self, pid: u16) -> u8 {
        let counter = self.continuity_counters.entry(pid).or_insert(0x0F);
        *counter = (*counter + 1) & 0x0F;
        *counter
    }
}

/// Writes an adaptation field of `length` bytes after the length byte: flags, an optional
/// PCR, then 0xFF stuffing.
fn write_adaptation_field(buf: &mut BytesMut, length: usize, pcr: Option<u64>) {
    buf.put_u8(length as u8);
    if length == 0 {
        return;
    }

    let end = buf.len() + length;
    match pcr {
        Some(base) => {
            buf.put_u8(0x10); // PCR flag
            let base = base & PTS_MASK;
            // 33-bit base, 6 reserved bits, 9-bit extension (zero)
            buf.put_u32((base >> 1) as u32);
            buf.put_u8((((base & 1) as u8) << 7) | 0x7E);
            buf.put_u8(0x00);
        }
        None => buf.put_u8(0x00),
    }
    buf.resize(end, 0xFF);
}
