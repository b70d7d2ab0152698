//! Relay configuration
//!
//! Command line arguments are parsed with clap and converted into a
//! [`RelayConfig`], which the rest of the crate consumes.

use std::path::PathBuf;

use clap::Parser;

use crate::allocator::{UsernameAllocator, DEFAULT_BASE_NAMES, DEFAULT_MAX_SUFFIX};
use crate::error::{AppError, Result};

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default WebSocket endpoint path
pub const DEFAULT_PATH: &str = "/ws";

/// Default per-session mailbox capacity
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Channel buffer size for registry commands
pub const REGISTRY_BUFFER_SIZE: usize = 256;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "broadcast_relay")]
#[command(about = "WebSocket broadcast relay with auto-assigned display names")]
#[command(version)]
pub struct Args {
    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port number
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// WebSocket endpoint path
    #[arg(long, default_value = DEFAULT_PATH)]
    pub path: String,

    /// Serve over TLS (requires --cert and --key)
    #[arg(long)]
    pub ssl: bool,

    /// TLS certificate chain (PEM)
    #[arg(long, value_name = "PATH")]
    pub cert: Option<PathBuf>,

    /// TLS private key (PEM)
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Outbound messages buffered per peer before it is dropped
    #[arg(long, default_value_t = DEFAULT_MAILBOX_CAPACITY)]
    pub mailbox_capacity: usize,

    /// Base display names, comma separated
    #[arg(long, value_delimiter = ',')]
    pub names: Vec<String>,

    /// Highest numeric suffix tried once base names run out
    #[arg(long, default_value_t = DEFAULT_MAX_SUFFIX)]
    pub max_suffix: u32,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// TLS certificate and key locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Interface to bind
    pub host: String,

    /// Port to bind (0 picks a free port)
    pub port: u16,

    /// Request path accepted for the WebSocket upgrade
    pub path: String,

    /// TLS material, when serving over TLS
    pub tls: Option<TlsFiles>,

    /// Per-session mailbox capacity
    pub mailbox_capacity: usize,

    /// Base display names, in allocation order
    pub base_names: Vec<String>,

    /// Highest numeric suffix for display names
    pub max_suffix: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            tls: None,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            base_names: DEFAULT_BASE_NAMES.iter().map(|s| s.to_string()).collect(),
            max_suffix: DEFAULT_MAX_SUFFIX,
        }
    }
}

impl RelayConfig {
    /// Set the bind interface and port
    pub fn bind(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Set the endpoint path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Serve over TLS with the given PEM files
    pub fn tls(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.tls = Some(TlsFiles {
            cert: cert.into(),
            key: key.into(),
        });
        self
    }

    /// Set the mailbox capacity
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Replace the base name list
    pub fn base_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check values the listener cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.mailbox_capacity == 0 {
            return Err(AppError::InvalidConfig(
                "mailbox capacity must be at least 1".into(),
            ));
        }
        if !self.path.starts_with('/') {
            return Err(AppError::InvalidConfig(format!(
                "endpoint path '{}' must start with '/'",
                self.path
            )));
        }
        Ok(())
    }

    /// Build the name allocator described by this configuration
    pub fn allocator(&self) -> Result<UsernameAllocator> {
        UsernameAllocator::new(self.base_names.iter().cloned(), self.max_suffix)
    }
}

impl TryFrom<Args> for RelayConfig {
    type Error = AppError;

    fn try_from(args: Args) -> Result<Self> {
        let tls = if args.ssl {
            match (args.cert, args.key) {
                (Some(cert), Some(key)) => Some(TlsFiles { cert, key }),
                _ => {
                    return Err(AppError::InvalidConfig(
                        "certificate file and private key file must be specified when using SSL"
                            .into(),
                    ))
                }
            }
        } else {
            None
        };

        let mut config = Self {
            host: args.host,
            port: args.port,
            path: args.path,
            tls,
            mailbox_capacity: args.mailbox_capacity,
            max_suffix: args.max_suffix,
            ..Default::default()
        };
        if !args.names.is_empty() {
            config.base_names = args.names;
        }

        config.validate()?;
        Ok(config)
    }
}
