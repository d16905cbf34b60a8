//! SOCKS5 client side of the CONNECT handshake (RFC 1928), without
//! authentication.
//!
//! Once [`connect`] returns, the stream is a plain tunnel to the target and is
//! used exactly like a direct connection.

use std::{
    io,
    net::{IpAddr, SocketAddr},
};

use bytes::{BufMut, BytesMut};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use tracing::{debug, trace};

use super::Proxy;

#[rustfmt::skip]
mod consts {
    pub const SOCKS5_VERSION:                    u8 = 0x05;

    pub const SOCKS5_AUTH_METHOD_NONE:           u8 = 0x00;
    pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xff;

    pub const SOCKS5_CMD_TCP_CONNECT:            u8 = 0x01;

    pub const SOCKS5_ADDR_TYPE_IPV4:             u8 = 0x01;
    pub const SOCKS5_ADDR_TYPE_DOMAIN_NAME:      u8 = 0x03;
    pub const SOCKS5_ADDR_TYPE_IPV6:             u8 = 0x04;

    pub const SOCKS5_REPLY_SUCCEEDED:            u8 = 0x00;
}

use consts::*;

/// Target of a CONNECT request. Hostnames are handed to the proxy unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Address {
    Socket(SocketAddr),
    Domain(String, u16),
}

impl Address {
    fn new(host: &str, port: u16) -> io::Result<Self> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(Self::Socket(SocketAddr::new(ip, port)));
        }
        if host.is_empty() || host.len() > u8::MAX as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid socks5 target host: {host:?}"),
            ));
        }
        Ok(Self::Domain(host.to_string(), port))
    }

    fn serialized_len(&self) -> usize {
        match self {
            Self::Socket(SocketAddr::V4(..)) => 1 + 4 + 2,
            Self::Socket(SocketAddr::V6(..)) => 1 + 16 + 2,
            Self::Domain(host, ..) => 1 + 1 + host.len() + 2,
        }
    }

    fn write_to_buf<B: BufMut>(&self, buf: &mut B) {
        match self {
            Self::Socket(SocketAddr::V4(addr)) => {
                buf.put_u8(SOCKS5_ADDR_TYPE_IPV4);
                buf.put_slice(&addr.ip().octets());
                buf.put_u16(addr.port());
            }
            Self::Socket(SocketAddr::V6(addr)) => {
                buf.put_u8(SOCKS5_ADDR_TYPE_IPV6);
                buf.put_slice(&addr.ip().octets());
                buf.put_u16(addr.port());
            }
            Self::Domain(host, port) => {
                buf.put_u8(SOCKS5_ADDR_TYPE_DOMAIN_NAME);
                buf.put_u8(host.len() as u8);
                buf.put_slice(host.as_bytes());
                buf.put_u16(*port);
            }
        }
    }
}

fn reply_message(code: u8) -> &'static str {
    match code {
        0x01 => "general failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "ttl expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown reply",
    }
}

fn check_version(ver: u8) -> io::Result<()> {
    if ver != SOCKS5_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported socks version {ver:#x}"),
        ));
    }
    Ok(())
}

/// Dials `proxy` and asks it to connect to `host:port`.
pub async fn connect(proxy: &Proxy, host: &str, port: u16) -> io::Result<TcpStream> {
    debug!("dialing socks5 proxy {}:{}", proxy.host, proxy.port);
    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;
    handshake(&mut stream, host, port).await?;
    debug!("socks5 tunnel to {host}:{port} established");
    Ok(stream)
}

pub(crate) async fn handshake<S>(stream: &mut S, host: &str, port: u16) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let target = Address::new(host, port)?;

    // 1. method selection
    stream
        .write_all(&[SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE])
        .await?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    trace!("socks5 method choice: {choice:?}");
    check_version(choice[0])?;
    match choice[1] {
        SOCKS5_AUTH_METHOD_NONE => {}
        SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE => {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "socks5 proxy requires authentication",
            ))
        }
        method => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("socks5 proxy chose unoffered method {method:#x}"),
            ))
        }
    }

    // 2. CONNECT request
    let mut buf = BytesMut::with_capacity(3 + target.serialized_len());
    buf.put_slice(&[SOCKS5_VERSION, SOCKS5_CMD_TCP_CONNECT, 0x00]);
    target.write_to_buf(&mut buf);
    trace!("socks5 connect request: {target:?}");
    stream.write_all(&buf).await?;
    stream.flush().await?;

    // 3. reply, VER REP RSV ATYP BND.ADDR BND.PORT
    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await?;
    check_version(head[0])?;
    if head[1] != SOCKS5_REPLY_SUCCEEDED {
        return Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("socks5 connect failed: {}", reply_message(head[1])),
        ));
    }

    let remaining = match head[3] {
        SOCKS5_ADDR_TYPE_IPV4 => 4 + 2,
        SOCKS5_ADDR_TYPE_IPV6 => 16 + 2,
        SOCKS5_ADDR_TYPE_DOMAIN_NAME => stream.read_u8().await? as usize + 2,
        atyp => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("socks5 reply has unknown address type {atyp:#x}"),
            ))
        }
    };
    let mut bound = vec![0u8; remaining];
    stream.read_exact(&mut bound).await?;

    Ok(())
}
