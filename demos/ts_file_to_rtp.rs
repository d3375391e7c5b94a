//! Replays a transport stream file through the gateway pipeline.
//!
//! ```text
//! cargo run --example ts_file_to_rtp -- input.ts [127.0.0.1:7000]
//! ```
//!
//! Without a target the RTP packets are only counted.

use bytes::Bytes;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tsgate::format::rtp::{H264Packetizer, RTPPacket};
use tsgate::gateway::{Pipeline, RtpDistributor, SessionRegistry};
use tsgate::format::ts::TS_PACKET_SIZE;

/// Seven units per datagram, the usual multicast framing.
const CHUNK_SIZE: usize = 7 * TS_PACKET_SIZE;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let input = args.next().ok_or("usage: ts_file_to_rtp <input.ts> [receiver addr]")?;
    let target: Option<SocketAddr> = args.next().map(|a| a.parse()).transpose()?;

    let data = tokio::fs::read(&input).await?;
    println!("Read {} bytes from {}", data.len(), input);
    let started = Instant::now();

    match target {
        Some(target) => {
            let registry = SessionRegistry::new();
            registry.register(target);
            let distributor = RtpDistributor::bind(0, registry).await?;
            let mut pipeline = Pipeline::new(H264Packetizer::default(), distributor);

            for chunk in data.chunks(CHUNK_SIZE) {
                pipeline.feed(chunk);
                tokio::task::yield_now().await;
            }
            // Let the send queue drain
            tokio::time::sleep(Duration::from_millis(200)).await;
            println!("Sent to {}: {:?}", target, pipeline.stats());
        }
        None => {
            let mut pipeline = Pipeline::new(H264Packetizer::default(), Vec::<Bytes>::new());
            for chunk in data.chunks(CHUNK_SIZE) {
                pipeline.feed(chunk);
            }

            let stats = pipeline.stats();
            let packets = pipeline.into_sink();
            let fragments = packets
                .iter()
                .filter_map(|p| RTPPacket::parse(p).ok())
                .filter(|p| p.payload.first().map(|b| b & 0x1F) == Some(28))
                .count();
            println!("{:?}", stats);
            println!("{} of {} RTP packets are FU-A fragments", fragments, packets.len());
        }
    }

    println!("Done in {:.2?}", started.elapsed());
    Ok(())
}
