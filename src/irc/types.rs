use std::time::Duration;

/// The names we register with: `NICK <nickname>` and `USER <username> 0 0 :<realname>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub nickname: String,
    pub username: String,
    pub realname: String,
}

impl Identity {
    pub fn new(
        nickname: impl Into<String>,
        username: impl Into<String>,
        realname: impl Into<String>,
    ) -> Self {
        Self {
            nickname: nickname.into(),
            username: username.into(),
            realname: realname.into(),
        }
    }

    /// The registration command pair, without line terminators.
    pub fn registration(&self) -> [String; 2] {
        [
            format!("NICK {}", self.nickname),
            format!("USER {} 0 0 :{}", self.username, self.realname),
        ]
    }
}

/// An unauthenticated SOCKS5 relay to dial through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
}

impl Proxy {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Maps the "both fields at zero value" form to `None`.
    pub fn from_parts(host: &str, port: u16) -> Option<Self> {
        if host.is_empty() && port == 0 {
            return None;
        }
        Some(Self::new(host, port))
    }
}

/// Tunables for the handshake and the pump.
///
/// None of these affect correctness; they trade latency for CPU use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Grace period after registration before the pump starts reading.
    pub settle_delay: Duration,
    /// Pause between pump reads. Zero disables the throttle.
    pub poll_interval: Duration,
    /// Upper bound on bytes taken from the socket per read.
    pub read_buffer_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            read_buffer_size: 1024,
        }
    }
}

impl Options {
    /// No settle delay and no polling throttle.
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}
