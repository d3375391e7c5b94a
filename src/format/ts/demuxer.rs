use super::parser::{parse_pat, parse_pmt};
use super::types::*;
use bytes::BytesMut;

/// MPEG Transport Stream demuxer.
///
/// Accepts arbitrarily split input, cuts it into 188-byte units and follows the program
/// tables: the PAT names the PMT PID, the PMT names the H.264 video PID. Units on the video
/// PID are handed to the caller; everything else is consumed here.
///
/// There is no resynchronization: a unit that does not begin with the sync byte is
/// discarded whole and the next 188 bytes are tried.
#[derive(Debug, Default)]
pub struct TSDemuxer {
    buffer: BytesMut,
    pmt_pid: Option<u16>,
    video_pid: Option<u16>,
}

impl TSDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pmt_pid(&self) -> Option<u16> {
        self.pmt_pid
    }

    pub fn video_pid(&self) -> Option<u16> {
        self.video_pid
    }

    /// Bytes waiting for the rest of their unit.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Appends `data` and processes every complete unit, calling `on_video` for each unit
    /// on the video PID in arrival order. A trailing partial unit is kept for the next call.
    pub fn feed<F>(&mut self, data: &[u8], mut on_video: F)
    where
        F: FnMut(TSPacket),
    {
        self.buffer.extend_from_slice(data);

        while self.buffer.len() >= TS_PACKET_SIZE {
            let raw = self.buffer.split_to(TS_PACKET_SIZE).freeze();
            let Some(packet) = TSPacket::parse(raw) else {
                log::trace!("discarding transport unit without sync byte");
                continue;
            };

            if let Some(packet) = self.route(packet) {
                on_video(packet);
            }
        }
    }

    /// Consumes table units; returns the unit back if it carries video.
    fn route(&mut self, packet: TSPacket) -> Option<TSPacket> {
        if packet.pid == PID_PAT {
            if let Some(entry) = parse_pat(packet.payload()) {
                if self.pmt_pid != Some(entry.program_map_pid) {
                    log::info!(
                        "PAT: program {} -> PMT PID {:#x}",
                        entry.program_number,
                        entry.program_map_pid
                    );
                    self.pmt_pid = Some(entry.program_map_pid);
                }
            }
            return None;
        }

        if Some(packet.pid) == self.pmt_pid {
            if let Some(video_pid) = parse_pmt(packet.payload()) {
                if self.video_pid != Some(video_pid) {
                    log::info!("PMT: H.264 video on PID {:#x}", video_pid);
                    self.video_pid = Some(video_pid);
                }
            }
            return None;
        }

        if Some(packet.pid) == self.video_pid {
            return Some(packet);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::muxer::TSMuxer;
    use pretty_assertions::assert_eq;

    fn table_stream() -> Vec<u8> {
        let mut muxer = TSMuxer::new();
        muxer.write_tables()
    }

    #[test]
    fn test_garbage_yields_nothing() {
        let mut demuxer = TSDemuxer::new();
        let mut count = 0;
        demuxer.feed(&[0xAB; TS_PACKET_SIZE * 4], |_| count += 1);
        assert_eq!(count, 0);
        assert_eq!(demuxer.pending(), 0);
        assert_eq!(demuxer.pmt_pid(), None);
    }

    #[test]
    fn test_learns_pids_from_tables() {
        let mut demuxer = TSDemuxer::new();
        demuxer.feed(&table_stream(), |_| panic!("no video yet"));
        assert_eq!(demuxer.pmt_pid(), Some(PID_PMT));
        assert_eq!(demuxer.video_pid(), Some(PID_VIDEO));
    }

    #[test]
    fn test_video_before_tables_is_dropped() {
        let mut muxer = TSMuxer::new();
        let video = muxer.write_access_unit(&[0, 0, 0, 1, 0x65, 0x88], Some(0));

        let mut demuxer = TSDemuxer::new();
        let mut count = 0;
        demuxer.feed(&video, |_| count += 1);
        assert_eq!(count, 0);

        demuxer.feed(&table_stream(), |_| count += 1);
        demuxer.feed(&video, |_| count += 1);
        assert_eq!(count, video.len() / TS_PACKET_SIZE);
    }

    #[test]
    fn test_split_input_is_reassembled() {
        let mut muxer = TSMuxer::new();
        let mut stream = muxer.write_tables();
        stream.extend(muxer.write_access_unit(&vec![0x42; 1000], Some(3600)));

        let mut demuxer = TSDemuxer::new();
        let mut pids = Vec::new();
        for chunk in stream.chunks(100) {
            demuxer.feed(chunk, |packet| pids.push(packet.pid));
        }
        assert!(!pids.is_empty());
        assert!(pids.iter().all(|&pid| pid == PID_VIDEO));
        assert_eq!(demuxer.pending(), 0);
    }

    #[test]
    fn test_bad_unit_is_skipped_without_resync() {
        let mut stream = table_stream();
        // Corrupt the sync byte of the PAT unit: the PMT that follows is then never matched.
        stream[0] = 0x00;

        let mut demuxer = TSDemuxer::new();
        demuxer.feed(&stream, |_| {});
        assert_eq!(demuxer.pmt_pid(), None);
        assert_eq!(demuxer.video_pid(), None);
    }
}
