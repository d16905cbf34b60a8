//! The background reader that owns the socket's read half once registration
//! has completed.

use std::io;

use tokio::{io::AsyncReadExt, net::tcp::OwnedReadHalf, sync::mpsc};
use tracing::{debug, trace, warn};

use super::{
    line::{self, Kind},
    Options, Sender,
};

/// Delivered as the last line when the socket can no longer be read.
pub const DISCONNECT_SENTINEL: &str = "QUIT: Failed to read from server";

pub(super) struct Pump {
    reader: OwnedReadHalf,
    sender: Sender,
    lines: mpsc::Sender<String>,
    options: Options,
    backlog: Vec<String>,
}

/// What to do after handling one read's worth of lines.
enum Flow {
    Continue,
    ServerError,
    Dropped,
}

impl Pump {
    pub(super) fn new(
        reader: OwnedReadHalf,
        sender: Sender,
        lines: mpsc::Sender<String>,
        options: Options,
    ) -> Self {
        Self {
            reader,
            sender,
            lines,
            options,
            backlog: Vec::new(),
        }
    }

    /// Lines already read off the socket, handled before the first read.
    pub(super) fn with_backlog(mut self, backlog: Vec<String>) -> Self {
        self.backlog = backlog;
        self
    }

    /// Reads, answers pings and forwards every line until the socket fails or
    /// the server sends `ERROR`.
    pub(super) async fn run(mut self) {
        debug!("pump started");

        let backlog = std::mem::take(&mut self.backlog);
        let mut flow = self.handle(backlog.iter().map(String::as_str)).await;
        let mut buf = vec![0u8; self.options.read_buffer_size.max(1)];

        loop {
            match flow {
                Flow::Continue => {}
                Flow::ServerError => break,
                Flow::Dropped => {
                    debug!("connection dropped, stopping pump");
                    self.sender.close().await;
                    return;
                }
            }

            let n = match self.read(&mut buf).await {
                Ok(n) => n,
                Err(err) => {
                    debug!("read failed: {err}");
                    self.sender.close().await;
                    let _ = self.lines.send(DISCONNECT_SENTINEL.to_string()).await;
                    break;
                }
            };

            let text = String::from_utf8_lossy(&buf[..n]);
            flow = self.handle(line::split_lines(&text)).await;

            if matches!(flow, Flow::Continue) && !self.options.poll_interval.is_zero() {
                tokio::time::sleep(self.options.poll_interval).await;
            }
        }

        debug!("pump stopped");
    }

    /// Answers and forwards one batch. An `ERROR` line ends the pump, but only
    /// after the rest of its batch has been delivered.
    async fn handle<'a>(&mut self, batch: impl Iterator<Item = &'a str>) -> Flow {
        let mut flow = Flow::Continue;

        for line in batch.filter(|line| !line.is_empty()) {
            trace!("<- {}", line.escape_debug());
            match Kind::of(line) {
                Kind::Error => {
                    warn!("server sent error: {line}");
                    self.sender.set_registered(false);
                    flow = Flow::ServerError;
                }
                Kind::Ping => match line::pong_for(line) {
                    Some(pong) => {
                        if let Err(err) = self.sender.send(&pong).await {
                            warn!("could not answer PING: {err}");
                        }
                    }
                    None => warn!("not answering PING without a token: {line}"),
                },
                Kind::Other => {}
            }

            if self.lines.send(line.to_string()).await.is_err() {
                return Flow::Dropped;
            }
        }

        flow
    }

    /// One read from the socket. End of stream, a local close, and the
    /// consumer going away all count as failures.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        tokio::select! {
            res = self.reader.read(buf) => match res {
                Ok(0) => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "server closed the connection",
                )),
                res => res,
            },
            _ = self.sender.closed() => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection was closed",
            )),
            _ = self.lines.closed() => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "connection was dropped",
            )),
        }
    }
}
