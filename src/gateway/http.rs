use super::session::SessionRegistry;
use crate::format::sdp::SessionDescription;
use crate::{GatewayError, Result};
use log::{debug, error, info, warn};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

const MAX_REQUEST_SIZE: usize = 64 * 1024;
const OFFER_PATH: &str = "/offer";

/// A parsed HTTP request: method, path without query, body.
#[derive(Debug)]
struct Request {
    method: String,
    path: String,
    body: String,
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> Result<usize> {
    for line in head.lines().skip(1) {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                return Ok(value.trim().parse()?);
            }
        }
    }
    Ok(0)
}

async fn read_request(stream: &mut TcpStream) -> Result<Request> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
        if buf.len() > MAX_REQUEST_SIZE {
            return Err(GatewayError::Protocol("Request header too large".into()));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(GatewayError::Protocol("Connection closed by peer".into()));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = std::str::from_utf8(&buf[..header_end])
        .map_err(|_| GatewayError::Protocol("Request header is not UTF-8".into()))?
        .to_string();

    let body_start = header_end + 4;
    let length = content_length(&head)?;
    if length > MAX_REQUEST_SIZE {
        return Err(GatewayError::Protocol(format!("Body of {} bytes too large", length)));
    }

    while buf.len() < body_start + length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(GatewayError::Protocol("Connection closed mid-body".into()));
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default();
    let path = target.split('?').next().unwrap_or_default().to_string();

    let body = String::from_utf8_lossy(&buf[body_start..body_start + length]).into_owned();
    Ok(Request { method, path, body })
}

async fn write_response(
    stream: &mut TcpStream,
    status: u16,
    reason: &str,
    content_type: &str,
    body: &str,
) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        content_type,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Handles the `POST /offer` endpoint: registers the offerer and returns the SDP answer.
#[derive(Debug, Clone)]
pub struct OfferHandler {
    registry: SessionRegistry,
    send_port: u16,
    payload_type: u8,
}

impl OfferHandler {
    pub fn new(registry: SessionRegistry, send_port: u16, payload_type: u8) -> Self {
        Self {
            registry,
            send_port,
            payload_type,
        }
    }

    /// Processes one offer. An offer without video still gets an answer but registers
    /// nothing.
    pub fn handle_offer(&self, offer: &str, peer: IpAddr) -> Result<String> {
        let sdp = SessionDescription::parse(offer)?;
        match sdp.receiver_endpoint(peer)? {
            Some(endpoint) => {
                self.registry.register(endpoint);
            }
            None => warn!("Offer from {} has no video media, not registering", peer),
        }

        Ok(SessionDescription::answer(self.send_port, self.payload_type).to_sdp_string())
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let request = read_request(&mut stream).await?;
        debug!("{} {} from {}", request.method, request.path, peer);

        if request.method != "POST" || request.path != OFFER_PATH {
            return write_response(&mut stream, 404, "Not Found", "text/plain", "not found\n").await;
        }

        match self.handle_offer(&request.body, peer.ip()) {
            Ok(answer) => write_response(&mut stream, 200, "OK", "application/sdp", &answer).await,
            Err(e) => {
                warn!("Offer from {} rejected: {}", peer, e);
                let body = format!("{}\n", e);
                write_response(&mut stream, 500, "Internal Server Error", "text/plain", &body).await
            }
        }
    }
}

/// HTTP listener for offers, one task per connection.
pub struct OfferServer {
    listener: TcpListener,
    handler: OfferHandler,
}

impl OfferServer {
    pub async fn bind(port: u16, handler: OfferHandler) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        info!("Offer endpoint listening on {}", listener.local_addr()?);
        Ok(Self { listener, handler })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown` flips to `true` or its sender goes away.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let handler = self.handler.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handler.handle_connection(stream, peer).await {
                                    debug!("Connection from {} failed: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => error!("Accept failed: {}", e),
                    }
                }
            }
        }

        info!("Offer endpoint stopped");
        Ok(())
    }
}
