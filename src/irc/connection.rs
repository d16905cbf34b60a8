use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::{mpsc, Mutex, Notify},
};
use tracing::{debug, trace, warn};

use super::{
    line::{self, Kind},
    pump::Pump,
    socks, Error, Identity, Options, Proxy, Result,
};

struct Shared {
    writer: Mutex<Option<OwnedWriteHalf>>,
    registered: AtomicBool,
    closed: Notify,
}

impl Shared {
    // Idempotent: only the first call finds a writer to shut down.
    async fn teardown(&self, writer: &mut Option<OwnedWriteHalf>) {
        self.registered.store(false, Ordering::SeqCst);
        if let Some(mut w) = writer.take() {
            debug!("closing connection");
            let _ = w.shutdown().await;
            self.closed.notify_one();
        }
    }
}

/// Write access to a connection. Cheap to clone; every clone writes to the
/// same socket and sees the same registered flag.
#[derive(Clone)]
pub struct Sender {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl Sender {
    pub(super) fn new(writer: OwnedWriteHalf) -> Self {
        Self {
            shared: Arc::new(Shared {
                writer: Mutex::new(Some(writer)),
                registered: AtomicBool::new(false),
                closed: Notify::new(),
            }),
        }
    }

    /// Writes `line` followed by CRLF.
    ///
    /// A failed write tears the connection down: it is marked unregistered,
    /// the socket is closed and the pump stops with the disconnect sentinel.
    pub async fn send(&self, line: &str) -> Result<()> {
        let mut writer = self.shared.writer.lock().await;
        let Some(w) = writer.as_mut() else {
            return Err(Error::Connection(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection is closed",
            )));
        };

        trace!("-> {}", line.escape_debug());
        let data = format!("{line}\r\n");
        if let Err(err) = w.write_all(data.as_bytes()).await {
            debug!("write failed: {err}");
            self.shared.teardown(&mut writer).await;
            return Err(err.into());
        }
        Ok(())
    }

    /// `PRIVMSG <target> :<text>`
    pub async fn privmsg(&self, target: &str, text: &str) -> Result<()> {
        self.send(&format!("PRIVMSG {target} :{text}")).await
    }

    pub async fn join(&self, channel: &str) -> Result<()> {
        self.send(&format!("JOIN {channel}")).await
    }

    pub fn is_registered(&self) -> bool {
        self.shared.registered.load(Ordering::SeqCst)
    }

    /// Closes the socket. Safe to call any number of times, from any clone,
    /// concurrently with reads and writes.
    ///
    /// Closing shares the writer lock with [`send`](Self::send), so a write
    /// blocked on a full socket buffer holds off `close` until that write
    /// returns or fails.
    pub async fn close(&self) {
        let mut writer = self.shared.writer.lock().await;
        self.shared.teardown(&mut writer).await;
    }

    pub(super) fn set_registered(&self, registered: bool) {
        self.shared.registered.store(registered, Ordering::SeqCst);
    }

    /// Resolves once the socket has been closed by any clone.
    pub(super) async fn closed(&self) {
        self.shared.closed.notified().await
    }
}

/// A registered connection: a [`Sender`] plus the ordered stream of lines the
/// pump reads off the socket.
#[derive(Debug)]
pub struct Connection {
    identity: Identity,
    sender: Sender,
    lines: mpsc::Receiver<String>,
}

impl Connection {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    pub fn is_registered(&self) -> bool {
        self.sender.is_registered()
    }

    pub async fn send(&self, line: &str) -> Result<()> {
        self.sender.send(line).await
    }

    /// Waits for the next line from the server, in arrival order.
    ///
    /// The connection dying shows up in-band: the last line is either the
    /// server's `ERROR ...` or [`DISCONNECT_SENTINEL`](super::DISCONNECT_SENTINEL).
    /// After that, once everything has been drained, this returns `None`.
    pub async fn read(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    pub async fn close(&self) {
        self.sender.close().await
    }
}

/// Dials, registers and starts the pump.
#[derive(Debug, Clone)]
pub struct Connector {
    identity: Identity,
    proxy: Option<Proxy>,
    options: Options,
}

impl Connector {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            proxy: None,
            options: Options::default(),
        }
    }

    pub fn with_proxy(mut self, proxy: impl Into<Option<Proxy>>) -> Self {
        self.proxy = proxy.into();
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Connects to `host:port` and blocks until the server ends the MOTD
    /// (`376`) or reports it missing (`422`).
    ///
    /// There is no timeout: a server that never sends either, nor `ERROR`,
    /// keeps this pending forever.
    pub async fn connect(&self, host: &str, port: u16) -> Result<Connection> {
        let stream = self.dial(host, port).await?;
        let (mut reader, writer) = stream.into_split();
        let sender = Sender::new(writer);

        for reg in self.identity.registration() {
            sender.send(&reg).await?;
        }

        let backlog = wait_for_ready(&mut reader, &sender, self.options.read_buffer_size).await?;
        debug!("registered with {host}:{port} as {}", self.identity.nickname);

        if !self.options.settle_delay.is_zero() {
            tokio::time::sleep(self.options.settle_delay).await;
        }

        let (tx, lines) = mpsc::channel(1);
        let pump = Pump::new(reader, sender.clone(), tx, self.options).with_backlog(backlog);
        tokio::spawn(pump.run());

        Ok(Connection {
            identity: self.identity.clone(),
            sender,
            lines,
        })
    }

    async fn dial(&self, host: &str, port: u16) -> Result<TcpStream> {
        let stream = match &self.proxy {
            None => {
                debug!("connecting to {host}:{port}");
                TcpStream::connect((host, port)).await?
            }
            Some(proxy) => socks::connect(proxy, host, port).await?,
        };
        Ok(stream)
    }
}

/// Connects with default [`Options`].
pub async fn connect(
    host: &str,
    port: u16,
    proxy: Option<Proxy>,
    identity: Identity,
) -> Result<Connection> {
    Connector::new(identity)
        .with_proxy(proxy)
        .connect(host, port)
        .await
}

/// Answers pings until the server ends the MOTD. Lines that arrived in the
/// same read as the end of the MOTD are returned for the pump to handle.
async fn wait_for_ready(
    reader: &mut OwnedReadHalf,
    sender: &Sender,
    buf_size: usize,
) -> Result<Vec<String>> {
    let mut buf = vec![0u8; buf_size.max(1)];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                sender.close().await;
                return Err(Error::Connection(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "server closed the connection during registration",
                )));
            }
            Ok(n) => n,
            Err(err) => {
                sender.close().await;
                return Err(err.into());
            }
        };

        let text = String::from_utf8_lossy(&buf[..n]);
        let mut lines = line::handshake_lines(&text);
        while let Some(line) = lines.next() {
            trace!("<- {}", line.escape_debug());
            match Kind::of(line) {
                Kind::Error => {
                    sender.close().await;
                    return Err(Error::Protocol {
                        line: line.to_string(),
                    });
                }
                Kind::Ping => match line::pong_for(line) {
                    Some(pong) => sender.send(&pong).await?,
                    None => warn!("not answering PING without a token: {line}"),
                },
                Kind::Other if line::is_end_of_motd(line) => {
                    sender.set_registered(true);
                    return Ok(lines.map(str::to_string).collect());
                }
                Kind::Other => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irc::testing::{self, Peer};

    async fn connect_to(port: u16) -> Result<Connection> {
        Connector::new(testing::identity())
            .with_options(testing::options())
            .connect("127.0.0.1", port)
            .await
    }

    #[tokio::test]
    async fn test_registers_on_end_of_motd() {
        let (listener, port) = testing::listen().await;
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            peer.expect_registration().await;
            peer.send(":irc 001 welcome\r\n:irc 376 End of MOTD\r\n").await;
            peer.expect("JOIN #test").await;
        });

        let conn = connect_to(port).await.unwrap();
        assert!(conn.is_registered());
        assert_eq!(conn.identity().nickname, "magni");
        conn.sender().join("#test").await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_registers_when_motd_is_missing() {
        let (listener, port) = testing::listen().await;
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            peer.expect_registration().await;
            peer.send(":irc 422 magni :MOTD File is missing\n").await;
            peer
        });

        let conn = connect_to(port).await.unwrap();
        assert!(conn.is_registered());
        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_fails_registration() {
        let (listener, port) = testing::listen().await;
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            peer.expect_registration().await;
            peer.send("ERROR :Closing Link\r\n").await;
            // we close our side after the error
            assert_eq!(peer.line().await, None);
        });

        let err = connect_to(port).await.unwrap_err();
        assert!(err.is_protocol());
        assert!(err.to_string().contains("ERROR :Closing Link"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_before_motd_end_wins() {
        let (listener, port) = testing::listen().await;
        tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            peer.expect_registration().await;
            peer.send("error :banned\r\n:irc 376 magni :End\r\n").await;
            peer
        });

        let err = connect_to(port).await.unwrap_err();
        assert!(matches!(err, Error::Protocol { ref line } if line == "error :banned"));
    }

    #[tokio::test]
    async fn test_ping_answered_during_registration() {
        let (listener, port) = testing::listen().await;
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            peer.expect_registration().await;
            peer.send("PING :hs-token\r\n").await;
            peer.expect("PONG hs-token").await;
            peer.send(testing::WELCOME).await;
            peer
        });

        let conn = connect_to(port).await.unwrap();
        assert!(conn.is_registered());
        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_tokenless_ping_ignored_during_registration() {
        let (listener, port) = testing::listen().await;
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            peer.expect_registration().await;
            peer.send("PING\r\n").await;
            peer.send(testing::WELCOME).await;
            // the first thing written after registration is ours, not a PONG
            peer.expect("NEXT").await;
            peer
        });

        let conn = connect_to(port).await.unwrap();
        assert!(conn.is_registered());
        conn.send("NEXT").await.unwrap();
        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_ping_after_motd_end_in_same_read() {
        let (listener, port) = testing::listen().await;
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            peer.expect_registration().await;
            peer.send(":irc 376 magni :End\r\nPING :late\r\n").await;
            peer.expect("PONG late").await;
            peer
        });

        let mut conn = connect_to(port).await.unwrap();
        assert!(conn.is_registered());
        assert_eq!(conn.read().await.as_deref(), Some("PING :late"));
        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_after_motd_end_in_same_read() {
        let (listener, port) = testing::listen().await;
        let server = tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            peer.expect_registration().await;
            peer.send(":irc 422 magni :No MOTD\r\nERROR :Closing Link\r\n")
                .await;
            peer
        });

        let mut conn = connect_to(port).await.unwrap();
        assert_eq!(conn.read().await.as_deref(), Some("ERROR :Closing Link"));
        assert_eq!(conn.read().await, None);
        assert!(!conn.is_registered());
        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_during_registration() {
        let (listener, port) = testing::listen().await;
        tokio::spawn(async move {
            let mut peer = Peer::accept(&listener).await;
            peer.expect_registration().await;
            drop(peer);
        });

        let err = connect_to(port).await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_dial_failure() {
        let (listener, port) = testing::listen().await;
        drop(listener);

        let err = connect_to(port).await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_connect_through_socks5() {
        let (listener, port) = testing::listen().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            let mut greeting = [0u8; 3];
            stream.read_exact(&mut greeting).await.unwrap();
            assert_eq!(greeting, [5, 1, 0]);
            stream.write_all(&[5, 0]).await.unwrap();

            let mut head = [0u8; 5];
            stream.read_exact(&mut head).await.unwrap();
            assert_eq!(head, [5, 1, 0, 3, 8]);
            let mut target = [0u8; 10];
            stream.read_exact(&mut target).await.unwrap();
            assert_eq!(&target[..8], b"irc.test");
            assert_eq!(&target[8..], &6667u16.to_be_bytes());
            stream
                .write_all(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();

            // from here on the proxy is the irc server
            let mut peer = Peer::new(stream);
            peer.expect_registration().await;
            peer.send(testing::WELCOME).await;
            peer
        });

        let conn = Connector::new(testing::identity())
            .with_proxy(Proxy::new("127.0.0.1", port))
            .with_options(testing::options())
            .connect("irc.test", 6667)
            .await
            .unwrap();
        assert!(conn.is_registered());
        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (listener, port) = testing::listen().await;
        let server = tokio::spawn(async move { Peer::registered(&listener).await });

        let conn = connect_to(port).await.unwrap();
        let sender = conn.sender();
        let _peer = server.await.unwrap();

        conn.close().await;
        conn.close().await;
        sender.close().await;
        assert!(!conn.is_registered());

        let err = sender.privmsg("#test", "hello").await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_concurrent_close_and_send() {
        let (listener, port) = testing::listen().await;
        let server = tokio::spawn(async move { Peer::registered(&listener).await });

        let conn = connect_to(port).await.unwrap();
        let _peer = server.await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let sender = conn.sender();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        sender.close().await;
                        None
                    } else {
                        Some(sender.send("PRIVMSG #test :racing").await)
                    }
                })
            })
            .collect();

        for task in tasks {
            if let Some(Err(err)) = task.await.unwrap() {
                assert!(err.is_connection());
            }
        }
        assert!(!conn.is_registered());
    }
}
