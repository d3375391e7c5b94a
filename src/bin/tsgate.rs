use clap::Parser;
use log::{error, info};
use std::fs;
use std::future::Future;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tokio::sync::watch;
use tsgate::config::{self, GatewayConfig};

/// MPEG-TS multicast to H.264 RTP gateway
#[derive(Parser, Debug)]
#[command(name = "tsgate", version, about)]
struct Args {
    /// Extra config file applied after ./config.toml and ./tsgate.toml
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Multicast group carrying the transport stream
    #[arg(long)]
    group: Option<Ipv4Addr>,

    /// UDP port of the transport stream
    #[arg(long)]
    port: Option<u16>,

    /// Port of the HTTP offer endpoint
    #[arg(long)]
    http_port: Option<u16>,

    /// Local port RTP is sent from
    #[arg(long)]
    rtp_port: Option<u16>,

    /// Write a config template to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut GatewayConfig) -> tsgate::Result<()> {
        if let Some(path) = &self.config {
            config.apply_file(&fs::read_to_string(path)?)?;
        }
        if let Some(group) = self.group {
            config.set("multicast_group", &group.to_string())?;
        }
        if let Some(port) = self.port {
            config.multicast_port = port;
        }
        if let Some(port) = self.http_port {
            config.http_port = port;
        }
        if let Some(port) = self.rtp_port {
            config.rtp_send_port = port;
        }
        Ok(())
    }
}

/// Flips `shutdown_tx` once `signal` fires.
///
/// If the signal handler cannot be installed the sender is held forever: dropping it
/// would stop the gateway as surely as sending `true`.
async fn forward_shutdown<F>(signal: F, shutdown_tx: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for ctrl-c, running until killed: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    let _ = shutdown_tx.send(true);
}

async fn run(args: Args) -> tsgate::Result<()> {
    let mut config = GatewayConfig::load()?;
    args.apply(&mut config)?;
    info!("Starting with {:?}", config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_shutdown(tokio::signal::ctrl_c(), shutdown_tx));

    let stats = tsgate::gateway::run(config, shutdown_rx).await?;
    info!("Final stats: {:?}", stats);
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Some(path) = &args.write_config {
        match config::create_default_config_template(path) {
            Ok(()) => println!("Config template at {}", path.display()),
            Err(e) => {
                eprintln!("Failed to write {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_signal_flips_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(forward_shutdown(async { Ok(()) }, tx));
        timeout(Duration::from_secs(1), rx.changed()).await.unwrap().unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_failed_handler_keeps_running() {
        let (tx, mut rx) = watch::channel(false);
        let failing = async { Err(io::Error::new(io::ErrorKind::Other, "no signals")) };
        tokio::spawn(forward_shutdown(failing, tx));

        // Neither a `true` nor a dropped sender may reach the gateway.
        assert!(timeout(Duration::from_millis(200), rx.changed()).await.is_err());
        assert!(!*rx.borrow());
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from(["tsgate", "--group", "239.1.1.1", "--port", "6000", "--rtp-port", "6002"]);
        let mut config = GatewayConfig::default();
        args.apply(&mut config).unwrap();
        assert_eq!(config.multicast_group, Ipv4Addr::new(239, 1, 1, 1));
        assert_eq!(config.multicast_port, 6000);
        assert_eq!(config.rtp_send_port, 6002);
        assert_eq!(config.http_port, 8080);
    }
}
