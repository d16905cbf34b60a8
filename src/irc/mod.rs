//! IRC connection core: dialing (optionally through SOCKS5), registration,
//! and the background pump that hands received lines to a single consumer.

pub mod connection;
pub mod error;
pub mod line;
pub mod pump;
pub mod socks;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{connect, Connection, Connector, Sender};
pub use error::{Error, Result};
pub use pump::DISCONNECT_SENTINEL;
pub use types::{Identity, Options, Proxy};
