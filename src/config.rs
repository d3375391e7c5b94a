use crate::error::{GatewayError, Result};
use std::env;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

/// Config files probed in order; later files override earlier ones.
const CONFIG_PATHS: [&str; 2] = ["./config.toml", "./tsgate.toml"];

/// Gateway runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Multicast group carrying the transport stream
    pub multicast_group: Ipv4Addr,
    /// UDP port of the transport stream
    pub multicast_port: u16,
    /// Port of the offer/answer HTTP endpoint
    pub http_port: u16,
    /// Local port RTP is sent from, advertised in the answer
    pub rtp_send_port: u16,
    /// RTP payload type for H.264
    pub payload_type: u8,
    /// RTP synchronization source
    pub ssrc: u32,
    /// Largest RTP payload before FU-A fragmentation kicks in
    pub max_rtp_payload: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            multicast_group: Ipv4Addr::new(239, 0, 0, 1),
            multicast_port: 5004,
            http_port: 8080,
            rtp_send_port: 5006,
            payload_type: 96,
            ssrc: 0x1234_5678,
            max_rtp_payload: 1200,
        }
    }
}

impl GatewayConfig {
    /// Builds a config from defaults, config files and `TSGATE_*` environment variables.
    pub fn load() -> Result<Self> {
        let mut config = GatewayConfig::default();

        for path in &CONFIG_PATHS {
            if let Ok(content) = fs::read_to_string(path) {
                config.apply_file(&content)?;
            }
        }

        for (key, var) in [
            ("multicast_group", "TSGATE_MULTICAST_GROUP"),
            ("multicast_port", "TSGATE_MULTICAST_PORT"),
            ("http_port", "TSGATE_HTTP_PORT"),
            ("rtp_send_port", "TSGATE_RTP_SEND_PORT"),
            ("payload_type", "TSGATE_PAYLOAD_TYPE"),
            ("ssrc", "TSGATE_SSRC"),
            ("max_rtp_payload", "TSGATE_MAX_RTP_PAYLOAD"),
        ] {
            if let Ok(value) = env::var(var) {
                config.set(key, &value)?;
            }
        }

        Ok(config)
    }

    /// Applies `key = value` lines; blank lines and `#` comments are skipped.
    pub fn apply_file(&mut self, content: &str) -> Result<()> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(GatewayError::Config(format!("malformed line: {}", line)));
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            self.set(key.trim(), value)?;
        }
        Ok(())
    }

    /// Sets a single field by name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |e: &dyn std::fmt::Display| {
            GatewayError::Config(format!("invalid value for {}: {} ({})", key, value, e))
        };

        match key {
            "multicast_group" => {
                let group: Ipv4Addr = value.parse().map_err(|e| invalid(&e))?;
                if !group.is_multicast() {
                    return Err(GatewayError::Config(format!(
                        "{} is not a multicast address",
                        group
                    )));
                }
                self.multicast_group = group;
            }
            "multicast_port" => self.multicast_port = value.parse().map_err(|e| invalid(&e))?,
            "http_port" => self.http_port = value.parse().map_err(|e| invalid(&e))?,
            "rtp_send_port" => self.rtp_send_port = value.parse().map_err(|e| invalid(&e))?,
            "payload_type" => {
                let pt: u8 = value.parse().map_err(|e| invalid(&e))?;
                if pt > 127 {
                    return Err(GatewayError::Config(format!(
                        "payload type {} does not fit in 7 bits",
                        pt
                    )));
                }
                self.payload_type = pt;
            }
            "ssrc" => {
                self.ssrc = match value.strip_prefix("0x") {
                    Some(hex) => u32::from_str_radix(hex, 16).map_err(|e| invalid(&e))?,
                    None => value.parse().map_err(|e| invalid(&e))?,
                }
            }
            "max_rtp_payload" => {
                let size: usize = value.parse().map_err(|e| invalid(&e))?;
                // FU-A needs room for its two header bytes plus at least one payload byte
                if size < 3 {
                    return Err(GatewayError::Config(format!(
                        "max_rtp_payload {} is too small",
                        size
                    )));
                }
                self.max_rtp_payload = size;
            }
            _ => return Err(GatewayError::Config(format!("unknown key: {}", key))),
        }
        Ok(())
    }
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        fs::write(path, TEMPLATE)?;
    }
    Ok(())
}

pub(crate) const TEMPLATE: &str = r#"# tsgate configuration
# Every key is optional; TSGATE_<KEY> environment variables take precedence.

multicast_group = "239.0.0.1"
multicast_port = 5004
http_port = 8080
rtp_send_port = 5006
payload_type = 96
ssrc = 0x12345678
max_rtp_payload = 1200
"#;
