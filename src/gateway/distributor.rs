use super::session::SessionRegistry;
use crate::format::rtp::RtpSink;
use crate::Result;
use bytes::Bytes;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Packets queued per receiver before new ones are dropped.
const SEND_QUEUE_SIZE: usize = 4096;

/// Sends every RTP packet to each registered receiver.
///
/// Each receiver gets one send task fed through a bounded queue, so packets leave in the
/// order they were produced and packetization never waits on the network. A full queue
/// drops the packet. A failed send is logged and the receiver stays registered.
#[derive(Debug)]
pub struct RtpDistributor {
    socket: Arc<UdpSocket>,
    registry: SessionRegistry,
    workers: HashMap<SocketAddr, mpsc::Sender<Bytes>>,
}

impl RtpDistributor {
    /// Binds the sending socket on `port` (0 picks an ephemeral port).
    pub async fn bind(port: u16, registry: SessionRegistry) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        info!("RTP sender bound to {}", socket.local_addr()?);
        Ok(Self::new(Arc::new(socket), registry))
    }

    pub fn new(socket: Arc<UdpSocket>, registry: SessionRegistry) -> Self {
        Self {
            socket,
            registry,
            workers: HashMap::new(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Receivers that currently have a send task.
    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Matches the send tasks to `endpoints`: tasks of replaced receivers end once their
    /// queue is drained, new receivers get a fresh task.
    fn sync_workers(&mut self, endpoints: &[SocketAddr]) {
        self.workers.retain(|endpoint, _| endpoints.contains(endpoint));

        for &endpoint in endpoints {
            if self.workers.contains_key(&endpoint) {
                continue;
            }
            let (tx, rx) = mpsc::channel(SEND_QUEUE_SIZE);
            tokio::spawn(send_loop(Arc::clone(&self.socket), endpoint, rx));
            self.workers.insert(endpoint, tx);
        }
    }
}

async fn send_loop(socket: Arc<UdpSocket>, endpoint: SocketAddr, mut rx: mpsc::Receiver<Bytes>) {
    debug!("RTP send task for {} started", endpoint);
    while let Some(packet) = rx.recv().await {
        if let Err(e) = socket.send_to(&packet, endpoint).await {
            warn!("RTP send to {} failed: {}", endpoint, e);
        }
    }
    debug!("RTP send task for {} stopped", endpoint);
}

impl RtpSink for RtpDistributor {
    fn send_packet(&mut self, packet: Bytes) {
        let endpoints = self.registry.endpoints();
        self.sync_workers(&endpoints);

        for endpoint in endpoints {
            let Some(tx) = self.workers.get(&endpoint) else {
                continue;
            };
            match tx.try_send(packet.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => debug!("send queue for {} full, dropping packet", endpoint),
                Err(TrySendError::Closed(_)) => {
                    warn!("send task for {} is gone", endpoint);
                    self.workers.remove(&endpoint);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_sends_to_current_receiver_only() {
        let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let second = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let registry = SessionRegistry::new();
        let mut distributor = RtpDistributor::bind(0, registry.clone()).await.unwrap();

        registry.register(first.local_addr().unwrap());
        registry.register(second.local_addr().unwrap());
        distributor.send_packet(Bytes::from_static(b"\x80\x60rtp"));

        let mut buf = [0u8; 64];
        let (len, _) = timeout(Duration::from_secs(2), second.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"\x80\x60rtp");

        let nothing = timeout(Duration::from_millis(100), first.recv_from(&mut buf)).await;
        assert!(nothing.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_packets_arrive_in_order() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let registry = SessionRegistry::new();
        registry.register(receiver.local_addr().unwrap());
        let mut distributor = RtpDistributor::bind(0, registry).await.unwrap();

        let reader = tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut buf = [0u8; 64];
            while let Ok(Ok(len)) = timeout(Duration::from_millis(300), receiver.recv(&mut buf)).await {
                seen.push(u16::from_be_bytes([buf[0], buf[1]]));
                assert_eq!(len, 2);
            }
            seen
        });

        for seq in 0..2000u16 {
            distributor.send_packet(Bytes::copy_from_slice(&seq.to_be_bytes()));
            if seq % 64 == 0 {
                tokio::task::yield_now().await;
            }
        }

        let seen = reader.await.unwrap();
        assert!(!seen.is_empty());
        // Loopback may drop under load, but never reorders what one task sends.
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "out of order: {:?}", seen);
        assert_eq!(distributor.active_workers(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_keeps_receiver() {
        let registry = SessionRegistry::new();
        let mut distributor = RtpDistributor::bind(0, registry.clone()).await.unwrap();

        // An IPv4 socket cannot reach an IPv6 endpoint, so every send fails.
        let unreachable: SocketAddr = "[::1]:7000".parse().unwrap();
        registry.register(unreachable);
        distributor.send_packet(Bytes::from_static(b"first"));
        distributor.send_packet(Bytes::from_static(b"second"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(registry.endpoints(), vec![unreachable]);
        assert_eq!(distributor.active_workers(), 1);

        let good = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        registry.register(good.local_addr().unwrap());
        distributor.send_packet(Bytes::from_static(b"third"));

        let mut buf = [0u8; 64];
        let len = timeout(Duration::from_secs(2), good.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"third");
        assert_eq!(distributor.active_workers(), 1);
    }

    #[tokio::test]
    async fn test_no_receivers_is_fine() {
        let mut distributor = RtpDistributor::bind(0, SessionRegistry::new()).await.unwrap();
        distributor.send_packet(Bytes::from_static(&[0x80]));
        assert!(distributor.registry().is_empty());
        assert_eq!(distributor.active_workers(), 0);
    }
}
