//! # Gateway
//!
//! Wires the pipeline to the network:
//!
//! - [`ingest`]: joins the multicast group and feeds datagrams to the [`Pipeline`]
//! - [`distributor`]: sends RTP packets to the registered receiver
//! - [`http`]: `POST /offer` registers a receiver and returns the SDP answer
//! - [`session`]: the receiver set shared by the two tasks
//!
//! ```rust,no_run
//! use tsgate::config::GatewayConfig;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> tsgate::Result<()> {
//!     let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         let _ = shutdown_tx.send(true);
//!     });
//!     let stats = tsgate::gateway::run(GatewayConfig::default(), shutdown_rx).await?;
//!     println!("{:?}", stats);
//!     Ok(())
//! }
//! ```

pub mod distributor;
pub mod http;
pub mod ingest;
pub mod pipeline;
pub mod session;

pub use distributor::RtpDistributor;
pub use http::{OfferHandler, OfferServer};
pub use ingest::MulticastIngest;
pub use pipeline::{Pipeline, PipelineStats};
pub use session::{ClientSession, SessionRegistry};

use crate::config::GatewayConfig;
use crate::Result;
use log::{error, info};
use tokio::sync::watch;

/// Runs the gateway until `shutdown` flips to `true`.
///
/// All sockets are bound before anything starts, so a bind failure is returned
/// immediately. After that, errors are logged and do not stop the gateway.
pub async fn run(config: GatewayConfig, shutdown: watch::Receiver<bool>) -> Result<PipelineStats> {
    let registry = SessionRegistry::new();

    let distributor = RtpDistributor::bind(config.rtp_send_port, registry.clone()).await?;
    let handler = OfferHandler::new(registry, config.rtp_send_port, config.payload_type);
    let server = OfferServer::bind(config.http_port, handler).await?;
    let ingest = MulticastIngest::bind(config.multicast_group, config.multicast_port).await?;

    let http_task = tokio::spawn(server.run(shutdown.clone()));

    let mut pipeline = Pipeline::from_config(&config, distributor);
    let stats = ingest.run(&mut pipeline, shutdown).await?;

    match http_task.await {
        Ok(Err(e)) => error!("Offer endpoint failed: {}", e),
        Err(e) => error!("Offer endpoint task failed: {}", e),
        Ok(Ok(())) => {}
    }

    info!("Gateway stopped");
    Ok(stats)
}
