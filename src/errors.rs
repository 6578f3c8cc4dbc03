//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Line framing failure on the wire (oversized or undecodable frame).
    Codec(String),
    /// Wire message violates the protocol (malformed JSON, missing field).
    Protocol(String),
    /// Request dispatch failure (duplicate id, registry misuse).
    Rpc(String),
    /// Simulation toolkit failure (initialization or operation).
    Toolkit(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Codec(msg) => write!(f, "codec: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Rpc(msg) => write!(f, "rpc: {msg}"),
            Self::Toolkit(msg) => write!(f, "toolkit: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
