//! # magni
//!
//! A minimal IRC client core and a thin command bot on top of it.
//!
//! The [`irc`] module dials a server (directly or through an unauthenticated
//! SOCKS5 proxy), registers, and then runs a background pump that answers
//! `PING`s and hands every received line, in order, to a single reader. The
//! [`bot`] module dispatches `PRIVMSG` commands to registered handlers.
//!
//! ```no_run
//! use magni::irc::{Connector, Identity};
//!
//! # async fn demo() -> magni::irc::Result<()> {
//! let mut conn = Connector::new(Identity::new("magni", "magni", "Magni"))
//!     .connect("irc.libera.chat", 6667)
//!     .await?;
//! conn.send("JOIN #magni").await?;
//! while let Some(line) = conn.read().await {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod bot;
pub mod config;
pub mod irc;
