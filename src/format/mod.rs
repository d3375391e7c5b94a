pub mod rtp;
pub mod sdp;
pub mod ts;

pub use self::rtp::{H264Depacketizer, H264Packetizer, RTPPacket, RtpSink};
pub use self::sdp::{MediaDescription, SessionDescription};
pub use self::ts::{PESAssembler, TSDemuxer, TSMuxer};
