//! Sends a synthetic H.264 transport stream to a multicast group, 25 frames per second.
//!
//! ```text
//! cargo run --example multicast_sender -- [239.0.0.1:5004] [seconds]
//! ```
//!
//! The NAL units are placeholders, so a decoder will not show a picture, but the
//! gateway and `tsgate-recv` handle them like any other stream.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time;
use tsgate::format::ts::{TSMuxer, TS_PACKET_SIZE};

const FRAME_RATE: u64 = 25;
const GOP_LENGTH: u64 = 25;
const PTS_STEP: u64 = 90_000 / FRAME_RATE;
const DATAGRAM_SIZE: usize = 7 * TS_PACKET_SIZE;

fn access_unit(frame: u64) -> Vec<u8> {
    let mut au = Vec::new();
    if frame % GOP_LENGTH == 0 {
        au.extend_from_slice(&[0, 0, 0, 1, 0x67, 0x42, 0xC0, 0x1E, 0xD9, 0x00, 0xA0, 0x47, 0xFE, 0xC8]);
        au.extend_from_slice(&[0, 0, 0, 1, 0x68, 0xCE, 0x38, 0x80]);
        au.extend_from_slice(&[0, 0, 0, 1, 0x65, 0x88]);
        au.extend((0..6000).map(|i| (i % 251) as u8 | 0x01));
    } else {
        au.extend_from_slice(&[0, 0, 0, 1, 0x41, 0x9A]);
        au.extend((0..800).map(|i| ((i + frame as usize) % 251) as u8 | 0x01));
    }
    au
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let target: SocketAddr = match args.next() {
        Some(addr) => addr.parse()?,
        None => SocketAddr::from((Ipv4Addr::new(239, 0, 0, 1), 5004)),
    };
    let seconds: Option<u64> = args.next().map(|s| s.parse()).transpose()?;

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_multicast_ttl_v4(1)?;
    println!("Sending to {}", target);

    let mut muxer = TSMuxer::new();
    let mut ticker = time::interval(Duration::from_millis(1000 / FRAME_RATE));
    let mut frame: u64 = 0;
    let mut bytes_sent: u64 = 0;

    while seconds.map_or(true, |s| frame < s * FRAME_RATE) {
        ticker.tick().await;

        let mut stream = Vec::new();
        if frame % GOP_LENGTH == 0 {
            stream.extend(muxer.write_tables());
        }
        stream.extend(muxer.write_access_unit(&access_unit(frame), Some(frame * PTS_STEP)));

        for datagram in stream.chunks(DATAGRAM_SIZE) {
            bytes_sent += socket.send_to(datagram, target).await? as u64;
        }

        frame += 1;
        if frame % (FRAME_RATE * 5) == 0 {
            println!("{} frames, {} bytes sent", frame, bytes_sent);
        }
    }

    println!("Finished: {} frames, {} bytes", frame, bytes_sent);
    Ok(())
}
