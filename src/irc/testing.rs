//! A scripted IRC server on loopback for socket-level tests.

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
};

use super::{Identity, Options};

pub const WELCOME: &str = ":irc.test 001 magni :Welcome\r\n:irc.test 376 magni :End of /MOTD command.\r\n";

pub fn identity() -> Identity {
    Identity::new("magni", "mag", "Magni Test")
}

pub fn options() -> Options {
    Options::immediate()
}

pub async fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// The server side of one client connection.
pub struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Peer {
    pub async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().await.unwrap();
        Self::new(stream)
    }

    pub fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Accepts a client, checks its registration and ends the MOTD.
    pub async fn registered(listener: &TcpListener) -> Self {
        let mut peer = Self::accept(listener).await;
        peer.expect_registration().await;
        peer.send(WELCOME).await;
        peer
    }

    pub async fn expect_registration(&mut self) {
        assert_eq!(self.line().await.as_deref(), Some("NICK magni"));
        assert_eq!(self.line().await.as_deref(), Some("USER mag 0 0 :Magni Test"));
    }

    /// Next CRLF-terminated line from the client, `None` on EOF.
    pub async fn line(&mut self) -> Option<String> {
        let mut buf = String::new();
        let n = self.reader.read_line(&mut buf).await.unwrap();
        if n == 0 {
            return None;
        }
        assert!(buf.ends_with("\r\n"), "line not CRLF terminated: {buf:?}");
        buf.truncate(buf.len() - 2);
        Some(buf)
    }

    pub async fn expect(&mut self, line: &str) {
        assert_eq!(self.line().await.as_deref(), Some(line));
    }

    pub async fn send(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }
}
