use rustls::client::ServerName;
use rustls::{ClientConnection, StreamOwned};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use super::params::ConnectParams;
use crate::error::MdbResult;

/// A blocking TCP connection, with or without TLS.
pub(crate) enum TcpClient {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl std::fmt::Debug for TcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TcpClient({})", self.kind())
    }
}

impl TcpClient {
    pub(crate) fn try_new(params: &ConnectParams) -> MdbResult<Self> {
        trace!("TcpClient: connecting to {}", params.addr());
        let client = if params.is_tls() {
            Self::Tls(Box::new(try_new_tls_stream(params)?))
        } else {
            Self::Plain(TcpStream::connect(params.addr())?)
        };
        if let Some(timeout) = params.read_timeout() {
            client.set_read_timeout(Some(timeout))?;
        }
        if let Some(timeout) = params.write_timeout() {
            client.set_write_timeout(Some(timeout))?;
        }
        trace!("TcpClient: connection of type {} established", client.kind());
        Ok(client)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Plain(_) => "plain TCP",
            Self::Tls(_) => "TLS",
        }
    }

    fn set_read_timeout(&self, d: Option<std::time::Duration>) -> std::io::Result<()> {
        match self {
            Self::Plain(s) => s.set_read_timeout(d),
            Self::Tls(s) => s.sock.set_read_timeout(d),
        }
    }

    fn set_write_timeout(&self, d: Option<std::time::Duration>) -> std::io::Result<()> {
        match self {
            Self::Plain(s) => s.set_write_timeout(d),
            Self::Tls(s) => s.sock.set_write_timeout(d),
        }
    }
}

impl Read for TcpClient {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(s) => s.read(buf),
            Self::Tls(s) => s.read(buf),
        }
    }
}

impl Write for TcpClient {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(s) => s.write(buf),
            Self::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(s) => s.flush(),
            Self::Tls(s) => s.flush(),
        }
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        trace!("TcpClient: drop ({})", self.kind());
    }
}

fn try_new_tls_stream(params: &ConnectParams) -> MdbResult<StreamOwned<ClientConnection, TcpStream>> {
    let client_config = Arc::new(params.rustls_clientconfig()?);
    let server_name = ServerName::try_from(params.host())?;
    let client_connection = ClientConnection::new(client_config, server_name)?;
    let tcp_stream = TcpStream::connect(params.addr())?;
    Ok(StreamOwned::new(client_connection, tcp_stream))
}
