use bytes::Bytes;
use clap::Parser;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tsgate::format::rtp::{H264Depacketizer, RTPPacket};
use tsgate::format::sdp::{MediaDescription, SessionDescription};
use tsgate::{GatewayError, Result};
use url::Url;

/// Registers with a tsgate instance and records the H.264 stream it sends
#[derive(Parser, Debug)]
#[command(name = "tsgate-recv", version, about)]
struct Args {
    /// Offer endpoint of the gateway
    #[arg(long, default_value = "http://127.0.0.1:8080/offer")]
    gateway: Url,

    /// Local UDP port to receive RTP on
    #[arg(long, short, default_value_t = 7000)]
    port: u16,

    /// Address the gateway should send to; defaults to the address the request comes from
    #[arg(long)]
    address: Option<IpAddr>,

    /// Annex B output file
    #[arg(long, short, default_value = "output.h264")]
    output: PathBuf,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,
}

fn build_offer(port: u16, address: Option<IpAddr>) -> String {
    let mut video = MediaDescription::new("video", port, "RTP/AVP", &["96"]);
    video
        .attributes
        .insert("rtpmap".to_string(), "96 H264/90000".to_string());
    video.attributes.insert("recvonly".to_string(), String::new());

    let origin_addr = address.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    SessionDescription {
        version: 0,
        origin: Some(format!("- {} 0 IN IP4 {}", rand::random::<u32>(), origin_addr)),
        session_name: Some("tsgate-recv".to_string()),
        connection: address.map(|a| format!("IN IP4 {}", a)),
        time: Some("0 0".to_string()),
        attributes: HashMap::new(),
        media: vec![video],
    }
    .to_sdp_string()
}

/// Posts the offer and returns the answer body.
async fn post_offer(gateway: &Url, offer: &str) -> Result<String> {
    let host = gateway
        .host_str()
        .ok_or_else(|| GatewayError::Config(format!("No host in {}", gateway)))?;
    let port = gateway.port_or_known_default().unwrap_or(80);

    let mut stream = TcpStream::connect((host, port)).await?;
    let request = format!(
        "POST {} HTTP/1.1\r\nHost: {}:{}\r\nContent-Type: application/sdp\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        gateway.path(),
        host,
        port,
        offer.len(),
        offer
    );
    stream.write_all(request.as_bytes()).await?;

    let mut response = String::new();
    stream.read_to_string(&mut response).await?;

    let (head, body) = response
        .split_once("\r\n\r\n")
        .ok_or_else(|| GatewayError::Protocol("Malformed HTTP response".into()))?;
    let status = head.lines().next().unwrap_or_default();
    if status.split_whitespace().nth(1) != Some("200") {
        return Err(GatewayError::Protocol(format!("Gateway answered: {}", status)));
    }

    Ok(body.to_string())
}

async fn run(args: Args) -> Result<()> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, args.port)).await?;
    info!("Receiving RTP on {}", socket.local_addr()?);

    let answer = post_offer(&args.gateway, &build_offer(args.port, args.address)).await?;
    let answer = SessionDescription::parse(&answer)?;
    if let Some(video) = answer.get_media("video") {
        info!("Gateway sends from port {} ({:?})", video.port, video.attributes.get("rtpmap"));
    }

    let mut output = File::create(&args.output).await?;
    let mut depacketizer = H264Depacketizer::new();
    let mut buf = vec![0u8; 65536];
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let limit = args.duration.map(Duration::from_secs);
    let deadline = async move {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let (mut packets, mut bytes, mut frames) = (0u64, 0u64, 0u64);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            _ = ticker.tick() => {
                info!(
                    "{} packets, {} bytes, {} access units, {} lost",
                    packets,
                    bytes,
                    frames,
                    depacketizer.lost_packets()
                );
            }
            received = socket.recv_from(&mut buf) => {
                let (len, from) = received?;
                packets += 1;
                bytes += len as u64;

                let packet = match RTPPacket::parse(&buf[..len]) {
                    Ok(packet) => packet,
                    Err(e) => {
                        debug!("Ignoring datagram from {}: {}", from, e);
                        continue;
                    }
                };

                match depacketizer.push(&packet) {
                    Ok(Some(unit)) => {
                        frames += 1;
                        let annex_b: Bytes = unit.to_annex_b();
                        output.write_all(&annex_b).await?;
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Dropping packet {}: {}", packet.sequence_number, e),
                }
            }
        }
    }

    output.flush().await?;
    info!(
        "Wrote {} access units to {}",
        frames,
        args.output.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
