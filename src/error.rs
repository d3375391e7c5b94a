use std::net::AddrParseError;
use std::num::ParseIntError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("sdp error: {0}")]
    Sdp(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),

    #[error("address parse error: {0}")]
    AddrParse(#[from] AddrParseError),
}

impl From<crate::format::rtp::RTPError> for GatewayError {
    fn from(err: crate::format::rtp::RTPError) -> Self {
        GatewayError::InvalidData(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
