//! Configuration data model.
//!
//! All structs derive `Serialize`/`Deserialize` for TOML persistence.
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::nickname::generate_nickname;
use crate::irc::{Identity, Options, Proxy};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// The IRC server to connect to and who to be there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "generate_nickname")]
    pub nickname: String,
    /// Defaults to the nickname.
    #[serde(default)]
    pub username: Option<String>,
    /// Defaults to the nickname.
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            nickname: generate_nickname(),
            username: None,
            realname: None,
            channels: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn identity(&self) -> Identity {
        let username = self.username.as_deref().unwrap_or(&self.nickname);
        let realname = self.realname.as_deref().unwrap_or(&self.nickname);
        Identity::new(&self.nickname, username, realname)
    }
}

/// Optional SOCKS5 relay. Leave both fields empty to connect directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

impl ProxyConfig {
    pub fn to_proxy(&self) -> Option<Proxy> {
        Proxy::from_parts(&self.host, self.port)
    }
}

/// Timing and buffering knobs for the connection core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

impl ConnectionConfig {
    pub fn options(&self) -> Options {
        Options {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            read_buffer_size: self.read_buffer_size.max(1),
        }
    }
}

fn default_host() -> String {
    "irc.libera.chat".into()
}
fn default_port() -> u16 {
    6667
}
fn default_settle_delay_ms() -> u64 {
    1000
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_read_buffer_size() -> usize {
    1024
}
