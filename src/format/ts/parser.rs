use super::types::*;

/// Table header bytes skipped after table_id: table_id(1), section_length(2),
/// table id extension(2), version/current(1), section_number(1), last_section_number(1).
const SECTION_HEADER_SIZE: usize = 8;
const CRC_SIZE: usize = 4;
const ES_INFO_HEADER_SIZE: usize = 5;

fn read_u16(data: &[u8], pos: usize) -> u16 {
    ((data[pos] as u16) << 8) | data[pos + 1] as u16
}

/// Offset of the table section, past the pointer field.
fn section_start(payload: &[u8]) -> Option<usize> {
    let pointer_field = *payload.first()? as usize;
    Some(1 + pointer_field)
}

/// Reads the first program of a program association table.
///
/// Only the first program entry is considered; a truncated table yields `None`.
pub fn parse_pat(payload: &[u8]) -> Option<PATEntry> {
    let mut pos = section_start(payload)?;
    if pos + SECTION_HEADER_SIZE > payload.len() {
        return None;
    }
    pos += SECTION_HEADER_SIZE;

    if pos + 4 > payload.len() {
        return None;
    }

    Some(PATEntry {
        program_number: read_u16(payload, pos),
        program_map_pid: read_u16(payload, pos + 2) & 0x1FFF,
    })
}

/// Scans a program map table for the first H.264 elementary stream and returns its PID.
///
/// Returns `None` when the table id is not 0x02, the section is truncated, or no stream of
/// type 0x1B is listed before the CRC.
pub fn parse_pmt(payload: &[u8]) -> Option<u16> {
    let mut pos = section_start(payload)?;
    if pos + 12 > payload.len() {
        return None;
    }

    if payload[pos] != TABLE_ID_PMT {
        return None;
    }

    let section_length = (read_u16(payload, pos + 1) & 0x0FFF) as usize;
    let section_end = pos + 3 + section_length;

    pos += SECTION_HEADER_SIZE;
    pos += 2; // PCR PID

    let program_info_length = (read_u16(payload, pos) & 0x0FFF) as usize;
    pos += 2 + program_info_length;

    while pos + ES_INFO_HEADER_SIZE + CRC_SIZE <= section_end
        && pos + ES_INFO_HEADER_SIZE <= payload.len()
    {
        let stream_type = payload[pos];
        let elementary_pid = read_u16(payload, pos + 1) & 0x1FFF;
        let es_info_length = (read_u16(payload, pos + 3) & 0x0FFF) as usize;

        if stream_type == STREAM_TYPE_H264 {
            return Some(elementary_pid);
        }

        pos += ES_INFO_HEADER_SIZE + es_info_length;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pmt_payload(streams: &[(u8, u16, Vec<u8>)]) -> Vec<u8> {
        let mut es = Vec::new();
        for (stream_type, pid, descriptors) in streams {
            es.push(*stream_type);
            es.extend_from_slice(&(0xE000 | pid).to_be_bytes());
            es.extend_from_slice(&(0xF000 | descriptors.len() as u16).to_be_bytes());
            es.extend_from_slice(descriptors);
        }

        let section_length = 5 + 4 + es.len() + 4;
        let mut payload = vec![
            0x00, // pointer field
            TABLE_ID_PMT,
            0xB0 | (section_length >> 8) as u8,
            section_length as u8,
            0x00, 0x01, // program number
            0xC1, 0x00, 0x00, // version, section numbers
            0xE1, 0x00, // PCR PID
            0xF0, 0x00, // program info length
        ];
        payload.extend_from_slice(&es);
        payload.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]); // CRC, not checked
        payload.resize(184, 0xFF);
        payload
    }

    #[test]
    fn test_parse_pat() {
        let mut payload = vec![
            0x00, // pointer field
            0x00, 0xB0, 0x0D, // table id, section length
            0x00, 0x01, 0xC1, 0x00, 0x00, // ts id, version, section numbers
            0x00, 0x01, // program number
            0xE1, 0x00, // PMT PID 0x100
        ];
        payload.resize(184, 0xFF);

        let entry = parse_pat(&payload).unwrap();
        assert_eq!(entry.program_number, 1);
        assert_eq!(entry.program_map_pid, 0x100);
    }

    #[test]
    fn test_parse_pat_honours_pointer_field() {
        let mut payload = vec![0x02, 0xAA, 0xBB];
        payload.extend_from_slice(&[0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00]);
        payload.extend_from_slice(&[0x00, 0x01, 0xF0, 0x20]);
        assert_eq!(parse_pat(&payload).unwrap().program_map_pid, 0x1020);
    }

    #[test]
    fn test_parse_pat_truncated() {
        assert!(parse_pat(&[]).is_none());
        assert!(parse_pat(&[0x00, 0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00]).is_none());
        // Pointer field runs past the payload
        assert!(parse_pat(&[0xF0, 0x00, 0x00]).is_none());
    }

    #[test]
    fn test_parse_pmt_finds_first_h264() {
        let payload = pmt_payload(&[
            (0x0F, 0x102, vec![]),
            (STREAM_TYPE_H264, 0x101, vec![0x28, 0x04, 0x4D, 0x40, 0x1F, 0x3F]),
            (STREAM_TYPE_H264, 0x103, vec![]),
        ]);
        assert_eq!(parse_pmt(&payload), Some(0x101));
    }

    #[test]
    fn test_parse_pmt_skips_descriptors() {
        let payload = pmt_payload(&[
            (0x0F, 0x102, vec![0x0A, 0x04, b'e', b'n', b'g', 0x00]),
            (STREAM_TYPE_H264, 0x1FF, vec![]),
        ]);
        assert_eq!(parse_pmt(&payload), Some(0x1FF));
    }

    #[test]
    fn test_parse_pmt_without_video() {
        let payload = pmt_payload(&[(0x0F, 0x102, vec![])]);
        assert_eq!(parse_pmt(&payload), None);
    }

    #[test]
    fn test_parse_pmt_wrong_table_id() {
        let mut payload = pmt_payload(&[(STREAM_TYPE_H264, 0x101, vec![])]);
        payload[1] = TABLE_ID_PAT;
        assert_eq!(parse_pmt(&payload), None);
    }

    #[test]
    fn test_parse_pmt_entry_overlapping_crc_is_ignored() {
        let mut payload = pmt_payload(&[(STREAM_TYPE_H264, 0x101, vec![])]);
        // Shrink the section so the only entry falls inside the CRC region.
        payload[3] -= 5;
        assert_eq!(parse_pmt(&payload), None);
    }

    #[test]
    fn test_parse_pmt_truncated() {
        assert_eq!(parse_pmt(&[]), None);
        let payload = pmt_payload(&[(STREAM_TYPE_H264, 0x101, vec![])]);
        assert_eq!(parse_pmt(&payload[..12]), None);
    }
}
