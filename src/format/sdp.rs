//! Session descriptions (RFC 4566) for the offer/answer exchange.

use crate::{GatewayError, Result};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct MediaDescription {
    pub media_type: String,
    pub port: u16,
    pub protocol: String,
    pub formats: Vec<String>,
    pub connection: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl MediaDescription {
    pub fn new(media_type: &str, port: u16, protocol: &str, formats: &[&str]) -> Self {
        Self {
            media_type: media_type.to_string(),
            port,
            protocol: protocol.to_string(),
            formats: formats.iter().map(|f| f.to_string()).collect(),
            connection: None,
            attributes: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionDescription {
    pub version: i32,
    pub origin: Option<String>,
    pub session_name: Option<String>,
    pub connection: Option<String>,
    pub time: Option<String>,
    pub attributes: HashMap<String, String>,
    pub media: Vec<MediaDescription>,
}

/// Address part of a `c=` value: `IN IP4 <addr>[/ttl]`.
fn connection_address(value: &str) -> Result<IpAddr> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() < 3 || parts[0] != "IN" {
        return Err(GatewayError::Sdp(format!("Invalid connection line: {}", value)));
    }

    let addr = parts[2].split('/').next().unwrap_or_default();
    Ok(IpAddr::from_str(addr)?)
}

fn insert_attribute(attributes: &mut HashMap<String, String>, value: &str) {
    // Attribute can be either a=<flag> or a=<name>:<value>
    match value.split_once(':') {
        Some((name, val)) => attributes.insert(name.to_string(), val.to_string()),
        None => attributes.insert(value.to_string(), String::new()),
    };
}

impl SessionDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut sdp = SessionDescription::new();
        let mut current_media: Option<MediaDescription> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // Each line must be of the form <type>=<value>
            let (typ, value) = match line.split_once('=') {
                Some((t, v)) if t.len() == 1 => (t, v.trim()),
                _ => return Err(GatewayError::Sdp(format!("Invalid SDP line: {}", line))),
            };

            match (typ, current_media.as_mut()) {
                ("v", _) => sdp.version = i32::from_str(value)?,
                ("o", _) => sdp.origin = Some(value.to_string()),
                ("s", _) => sdp.session_name = Some(value.to_string()),
                ("c", Some(media)) => media.connection = Some(value.to_string()),
                ("c", None) => sdp.connection = Some(value.to_string()),
                ("t", _) => sdp.time = Some(value.to_string()),
                ("m", _) => {
                    if let Some(media) = current_media.take() {
                        sdp.media.push(media);
                    }

                    // <media> <port>[/<count>] <proto> <fmt> ...
                    let parts: Vec<&str> = value.split_whitespace().collect();
                    if parts.len() < 4 {
                        return Err(GatewayError::Sdp(format!("Invalid media line: {}", value)));
                    }

                    let port = parts[1].split('/').next().unwrap_or_default();
                    current_media = Some(MediaDescription::new(
                        parts[0],
                        u16::from_str(port)?,
                        parts[2],
                        &parts[3..],
                    ));
                }
                ("a", Some(media)) => insert_attribute(&mut media.attributes, value),
                ("a", None) => insert_attribute(&mut sdp.attributes, value),
                _ => {} // Ignore unknown types
            }
        }

        if let Some(media) = current_media {
            sdp.media.push(media);
        }

        Ok(sdp)
    }

    pub fn get_media(&self, media_type: &str) -> Option<&MediaDescription> {
        self.media.iter().find(|m| m.media_type == media_type)
    }

    pub fn get_attribute(&self, name: &str) -> Option<&String> {
        self.attributes.get(name)
    }

    /// Where the offerer wants video delivered.
    ///
    /// The port comes from the first `m=video` line. The address comes from that media's
    /// `c=` line, else the session `c=` line, else `peer`. Returns `Ok(None)` when the offer
    /// has no video media.
    pub fn receiver_endpoint(&self, peer: IpAddr) -> Result<Option<SocketAddr>> {
        let Some(video) = self.get_media("video") else {
            return Ok(None);
        };

        let ip = match video.connection.as_deref().or(self.connection.as_deref()) {
            Some(connection) => connection_address(connection)?,
            None => peer,
        };

        Ok(Some(SocketAddr::new(ip, video.port)))
    }

    /// Answer for a send-only H.264 stream from `send_port`.
    pub fn answer(send_port: u16, payload_type: u8) -> Self {
        let mut video = MediaDescription::new("video", send_port, "RTP/AVP", &[]);
        video.formats.push(payload_type.to_string());
        video
            .attributes
            .insert("rtpmap".to_string(), format!("{} H264/90000", payload_type));
        video.attributes.insert("sendonly".to_string(), String::new());

        Self {
            version: 0,
            origin: Some(format!("- {} 0 IN IP4 0.0.0.0", rand::random::<u32>())),
            session_name: Some("tsgate".to_string()),
            connection: Some("IN IP4 0.0.0.0".to_string()),
            time: Some("0 0".to_string()),
            attributes: HashMap::new(),
            media: vec![video],
        }
    }

    /// Serializes with CRLF line endings. Attributes are written in a fixed order:
    /// `rtpmap`, `fmtp`, then the rest sorted by name.
    pub fn to_sdp_string(&self) -> String {
        let mut out = String::new();
        let mut line = |typ: &str, value: &str| {
            out.push_str(typ);
            out.push('=');
            out.push_str(value);
            out.push_str("\r\n");
        };

        line("v", &self.version.to_string());
        if let Some(origin) = &self.origin {
            line("o", origin);
        }
        line("s", self.session_name.as_deref().unwrap_or("-"));
        if let Some(connection) = &self.connection {
            line("c", connection);
        }
        line("t", self.time.as_deref().unwrap_or("0 0"));
        for attribute in ordered_attributes(&self.attributes) {
            line("a", &attribute);
        }

        for media in &self.media {
            line(
                "m",
                &format!(
                    "{} {} {} {}",
                    media.media_type,
                    media.port,
                    media.protocol,
                    media.formats.join(" ")
                ),
            );
            if let Some(connection) = &media.connection {
                line("c", connection);
            }
            for attribute in ordered_attributes(&media.attributes) {
                line("a", &attribute);
            }
        }

        out
    }
}

fn ordered_attributes(attributes: &HashMap<String, String>) -> Vec<String> {
    fn rank(name: &str) -> u8 {
        match name {
            "rtpmap" => 0,
            "fmtp" => 1,
            _ => 2,
        }
    }

    let mut names: Vec<&String> = attributes.keys().collect();
    names.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.cmp(b)));

    names
        .into_iter()
        .map(|name| match attributes[name].as_str() {
            "" => name.clone(),
            value => format!("{}:{}", name, value),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    const OFFER: &str = "\
v=0\r
o=- 123 456 IN IP4 192.168.1.20\r
s=viewer\r
c=IN IP4 192.168.1.20\r
t=0 0\r
m=audio 5002 RTP/AVP 97\r
a=rtpmap:97 opus/48000/2\r
m=video 5000 RTP/AVP 96 97\r
a=rtpmap:96 H264/90000\r
a=recvonly\r
";

    const PEER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9));

    #[test]
    fn test_parse_offer() {
        let sdp = SessionDescription::parse(OFFER).unwrap();

        assert_eq!(sdp.version, 0);
        assert_eq!(sdp.session_name.as_deref(), Some("viewer"));
        assert_eq!(sdp.media.len(), 2);

        let video = sdp.get_media("video").unwrap();
        assert_eq!(video.port, 5000);
        assert_eq!(video.formats, vec!["96", "97"]);
        assert_eq!(video.attributes.get("rtpmap").map(String::as_str), Some("96 H264/90000"));
        assert!(video.attributes.contains_key("recvonly"));
    }

    #[test]
    fn test_receiver_endpoint_from_connection_line() {
        let sdp = SessionDescription::parse(OFFER).unwrap();
        assert_eq!(
            sdp.receiver_endpoint(PEER).unwrap(),
            Some("192.168.1.20:5000".parse::<SocketAddr>().unwrap())
        );
    }

    #[test]
    fn test_receiver_endpoint_falls_back_to_peer() {
        let sdp = SessionDescription::parse("v=0\nm=video 6000 RTP/AVP 96\n").unwrap();
        assert_eq!(
            sdp.receiver_endpoint(PEER).unwrap(),
            Some(SocketAddr::new(PEER, 6000))
        );
    }

    #[test]
    fn test_media_connection_wins() {
        let sdp = SessionDescription::parse(
            "v=0\nc=IN IP4 1.1.1.1\nm=video 6000 RTP/AVP 96\nc=IN IP4 239.1.1.1/16\n",
        )
        .unwrap();
        assert_eq!(
            sdp.receiver_endpoint(PEER).unwrap(),
            Some("239.1.1.1:6000".parse::<SocketAddr>().unwrap())
        );
    }

    #[test]
    fn test_no_video_media() {
        let sdp = SessionDescription::parse("v=0\nm=audio 5002 RTP/AVP 0\n").unwrap();
        assert_eq!(sdp.receiver_endpoint(PEER).unwrap(), None);
    }

    #[test]
    fn test_invalid_offers() {
        assert!(SessionDescription::parse("v=0\nbogus\n").is_err());
        assert!(SessionDescription::parse("v=0\nm=video notaport RTP/AVP 96\n").is_err());
        assert!(SessionDescription::parse("v=0\nm=video 5000\n").is_err());

        let sdp = SessionDescription::parse("v=0\nc=IN IP4 not-an-ip\nm=video 1 RTP/AVP 96\n")
            .unwrap();
        assert!(sdp.receiver_endpoint(PEER).is_err());
    }

    #[test]
    fn test_answer() {
        let answer = SessionDescription::answer(5006, 96).to_sdp_string();
        let lines: Vec<&str> = answer.split("\r\n").collect();

        assert!(lines[1].starts_with("o=- "));
        assert!(lines[1].ends_with(" 0 IN IP4 0.0.0.0"));
        assert_eq!(
            [&lines[..1], &lines[2..]].concat(),
            vec![
                "v=0",
                "s=tsgate",
                "c=IN IP4 0.0.0.0",
                "t=0 0",
                "m=video 5006 RTP/AVP 96",
                "a=rtpmap:96 H264/90000",
                "a=sendonly",
                "",
            ]
        );

        let parsed = SessionDescription::parse(&answer).unwrap();
        assert_eq!(parsed.get_media("video").unwrap().port, 5006);
    }
}
