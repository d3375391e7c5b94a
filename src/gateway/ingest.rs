use super::pipeline::{Pipeline, PipelineStats};
use crate::format::rtp::RtpSink;
use crate::Result;
use log::{debug, error, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::sync::watch;

const RECV_BUFFER_SIZE: usize = 65536;
const STATS_INTERVAL: u64 = 1000;

/// A UDP socket on `0.0.0.0:port` that other listeners on the same port can share.
fn reusable_socket(port: u16) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())?;
    Ok(UdpSocket::from_std(socket.into())?)
}

/// Receives the multicast transport stream and drives a [`Pipeline`].
pub struct MulticastIngest {
    socket: UdpSocket,
    group: Ipv4Addr,
}

impl MulticastIngest {
    /// Binds `0.0.0.0:port` with address reuse and joins `group` on the default interface.
    pub async fn bind(group: Ipv4Addr, port: u16) -> Result<Self> {
        let socket = reusable_socket(port)?;
        socket.join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)?;
        info!("Joined multicast group {} on port {}", group, port);
        Ok(Self { socket, group })
    }

    /// Receives on an already bound socket without joining a group. Used for unicast input.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket,
            group: Ipv4Addr::UNSPECIFIED,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Runs until `shutdown` flips to `true` or its sender goes away.
    ///
    /// Every datagram is fed through the pipeline before the next receive. Receive errors
    /// are logged and the loop continues.
    pub async fn run<S: RtpSink>(
        self,
        pipeline: &mut Pipeline<S>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<PipelineStats> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let mut datagrams: u64 = 0;

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped");
                        break;
                    }
                }
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, _addr)) => {
                            pipeline.feed(&buf[..len]);
                            datagrams += 1;
                            if datagrams % STATS_INTERVAL == 0 {
                                debug!("Ingest: {} datagrams, {:?}", datagrams, pipeline.stats());
                            }
                        }
                        Err(e) if *shutdown.borrow() => {
                            debug!("Receive interrupted by shutdown: {}", e);
                            break;
                        }
                        Err(e) => {
                            error!("Multicast receive error: {}", e);
                            tokio::task::yield_now().await;
                        }
                    }
                }
            }
        }

        if !self.group.is_unspecified() {
            if let Err(e) = self
                .socket
                .leave_multicast_v4(self.group, Ipv4Addr::UNSPECIFIED)
            {
                warn!("Leaving multicast group {} failed: {}", self.group, e);
            }
        }

        let stats = pipeline.stats();
        info!("Ingest stopped after {} datagrams: {:?}", datagrams, stats);
        Ok(stats)
    }
}
