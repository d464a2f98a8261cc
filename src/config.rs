//! Command line configuration
//!
//! Both binaries parse their settings with clap; log filtering is left to
//! `RUST_LOG`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Default chat port
pub const DEFAULT_PORT: u16 = 25000;

/// Server settings
#[derive(Debug, Clone, Parser)]
#[command(name = "relay_chat", version, about = "Multi-user TCP chat server")]
pub struct ServerConfig {
    /// Interface to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }
}

/// Client settings
#[derive(Debug, Clone, Parser)]
#[command(name = "relay_chat_client", version, about = "Terminal client for relay_chat")]
pub struct ClientConfig {
    /// Server host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Seconds to wait for each connection attempt
    #[arg(long, default_value_t = 10)]
    pub connect_timeout: u64,

    /// Connection attempts before giving up on timeouts
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Seconds to wait between attempts
    #[arg(long, default_value_t = 2)]
    pub retry_delay: u64,

    /// Preferences file
    #[arg(long, default_value = "preferences.json")]
    pub preferences: PathBuf,
}

impl ClientConfig {
    pub fn server_addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }
}

/// `host:port`, bracketing IPv6 literals
fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
