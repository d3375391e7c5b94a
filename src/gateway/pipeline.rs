use crate::codec::h264::{AnnexBScanner, NALLabel};
use crate::config::GatewayConfig;
use crate::format::rtp::{H264Packetizer, RtpSink};
use crate::format::ts::{PESAssembler, PESPayload, TSDemuxer};
use bytes::Bytes;
use log::{debug, info, log_enabled, Level};

/// Running totals for one pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub bytes_in: u64,
    pub video_units: u64,
    pub access_units: u64,
    pub nal_units: u64,
    pub rtp_packets: u64,
    pub rtp_bytes: u64,
}

/// Counts packets on their way to the real sink.
struct CountingSink<'a> {
    inner: &'a mut dyn RtpSink,
    stats: &'a mut PipelineStats,
}

impl RtpSink for CountingSink<'_> {
    fn send_packet(&mut self, packet: Bytes) {
        self.stats.rtp_packets += 1;
        self.stats.rtp_bytes += packet.len() as u64;
        self.inner.send_packet(packet);
    }
}

/// TS bytes in, RTP packets out.
///
/// Demuxing, PES reassembly, NAL scanning and packetization run synchronously inside
/// [`feed`](Self::feed), one access unit at a time. The PES assembler is created on the
/// first video unit and stays bound to that unit's PID.
pub struct Pipeline<S: RtpSink> {
    demuxer: TSDemuxer,
    assembler: Option<PESAssembler>,
    packetizer: H264Packetizer,
    sink: S,
    stats: PipelineStats,
}

impl<S: RtpSink> Pipeline<S> {
    pub fn new(packetizer: H264Packetizer, sink: S) -> Self {
        Self {
            demuxer: TSDemuxer::new(),
            assembler: None,
            packetizer,
            sink,
            stats: PipelineStats::default(),
        }
    }

    pub fn from_config(config: &GatewayConfig, sink: S) -> Self {
        let packetizer = H264Packetizer::new(config.payload_type, config.ssrc)
            .with_max_payload(config.max_rtp_payload);
        Self::new(packetizer, sink)
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Feeds raw transport stream bytes in any chunking.
    pub fn feed(&mut self, data: &[u8]) {
        let Self {
            demuxer,
            assembler,
            packetizer,
            sink,
            stats,
        } = self;

        stats.bytes_in += data.len() as u64;

        demuxer.feed(data, |unit| {
            stats.video_units += 1;

            let assembler = assembler.get_or_insert_with(|| {
                info!("Reassembling PES on PID {:#x}", unit.pid);
                PESAssembler::new(unit.pid)
            });

            if let Some(pes) = assembler.push(&unit) {
                let mut sink = CountingSink {
                    inner: &mut *sink,
                    stats: &mut *stats,
                };
                send_access_unit(packetizer, &pes, &mut sink);
            }
        });
    }
}

fn send_access_unit(packetizer: &mut H264Packetizer, pes: &PESPayload, sink: &mut CountingSink<'_>) {
    let nalus: Vec<&[u8]> = AnnexBScanner::new(&pes.data).collect();
    if nalus.is_empty() {
        debug!("PES of {} bytes holds no NAL units", pes.data.len());
        return;
    }

    if log_enabled!(Level::Debug) {
        let labels: Vec<String> = nalus.iter().map(|n| NALLabel(n).to_string()).collect();
        debug!("Access unit pts={:?}: {}", pes.pts, labels.join(" "));
    }

    sink.stats.access_units += 1;
    sink.stats.nal_units += nalus.len() as u64;
    packetizer.send_access_unit(&nalus, pes.pts, sink);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::rtp::RTPPacket;
    use crate::format::ts::TSMuxer;
    use pretty_assertions::assert_eq;

    fn pipeline() -> Pipeline<Vec<Bytes>> {
        Pipeline::new(H264Packetizer::default(), Vec::new())
    }

    #[test]
    fn test_access_units_flow_to_sink() {
        let mut muxer = TSMuxer::new();
        let mut stream = muxer.write_tables();
        stream.extend(muxer.write_access_unit(&[0, 0, 0, 1, 0x67, 0x42, 0, 0, 1, 0x65, 0x88], Some(3600)));
        // The next PES start closes the first one.
        stream.extend(muxer.write_access_unit(&[0, 0, 0, 1, 0x41, 0x9A], Some(7200)));

        let mut pipeline = pipeline();
        pipeline.feed(&stream);

        let packets: Vec<RTPPacket> = pipeline
            .sink()
            .iter()
            .map(|p| RTPPacket::parse(p).unwrap())
            .collect();
        assert_eq!(packets.len(), 2);
        assert_eq!(&packets[0].payload[..], &[0x67, 0x42]);
        assert_eq!(&packets[1].payload[..], &[0x65, 0x88]);
        assert!(!packets[0].marker && packets[1].marker);
        assert!(packets.iter().all(|p| p.timestamp == 3600));

        let stats = pipeline.stats();
        assert_eq!(stats.bytes_in, stream.len() as u64);
        assert_eq!(stats.access_units, 1);
        assert_eq!(stats.nal_units, 2);
        assert_eq!(stats.rtp_packets, 2);
        assert_eq!(stats.rtp_bytes, 2 * 12 + 4);
    }

    #[test]
    fn test_pes_without_nal_units_is_skipped() {
        let mut muxer = TSMuxer::new();
        let mut stream = muxer.write_tables();
        stream.extend(muxer.write_access_unit(&[0xFF, 0xFF, 0xFF], None));
        stream.extend(muxer.write_access_unit(&[0, 0, 1, 0x41, 0x01], None));
        stream.extend(muxer.write_access_unit(&[0, 0, 1, 0x41, 0x02], None));

        let mut pipeline = pipeline();
        pipeline.feed(&stream);

        let stats = pipeline.stats();
        assert_eq!(stats.access_units, 1);
        let packet = RTPPacket::parse(&pipeline.sink()[0]).unwrap();
        // The skipped PES did not advance the fallback timestamp.
        assert_eq!(packet.timestamp, 3600);
    }

    #[test]
    fn test_no_tables_no_output() {
        let mut muxer = TSMuxer::new();
        let mut stream = muxer.write_access_unit(&[0, 0, 1, 0x65, 0x88], Some(0));
        stream.extend(muxer.write_access_unit(&[0, 0, 1, 0x65, 0x88], Some(3600)));

        let mut pipeline = pipeline();
        pipeline.feed(&stream);
        assert!(pipeline.into_sink().is_empty());
    }
}
