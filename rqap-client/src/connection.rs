//! Connection management.
//!
//! One connection carries one request at a time: the caller sends a
//! command, then blocks on the single reply. `&mut self` on every
//! operation enforces that discipline at the type level; callers that
//! want concurrency hold several connections.

use crate::error::ClientError;
use rqap_protocol::frame::{ACK_SIZE, REPLY_HEADER_SIZE};
use rqap_protocol::{
    decode_reply_body, encode_message, parse_ack, parse_handshake, Ack, Command, ReplyHeader,
    ServerErrorKind, Sexp, HANDSHAKE_SIZE,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-read timeout while waiting for a reply.
    pub request_timeout: Duration,
    /// How long each read may block while draining the error tail.
    pub drain_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_millis(200),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

/// A connection to an Rserve-compatible server.
pub struct Connection {
    config: ConnectionConfig,
    stream: Option<TcpStream>,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }

    /// Connects to the server and consumes the 32-byte handshake.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let mut stream = timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(ClientError::Io)?;

        stream.set_nodelay(true).ok();
        tracing::debug!("TCP connected, awaiting handshake");

        let mut block = [0u8; HANDSHAKE_SIZE];
        timeout(self.config.request_timeout, stream.read_exact(&mut block))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(ClientError::Io)?;
        parse_handshake(&block)?;
        tracing::debug!(
            "Handshake complete (server id {:?})",
            String::from_utf8_lossy(&block[4..12])
        );

        self.stream = Some(stream);
        Ok(())
    }

    /// Sends one command and waits for its reply.
    ///
    /// On any error the stream position is unspecified: there is no
    /// resynchronisation path mid-message, so the caller should close
    /// the connection and reconnect before issuing further requests.
    pub async fn request(&mut self, command: &Command) -> Result<Sexp, ClientError> {
        let encoded = encode_message(command)?;
        let request_timeout = self.config.request_timeout;
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;

        tracing::debug!(
            "Sending command {:#05x} ({} bytes)",
            command.code(),
            encoded.len()
        );
        stream.write_all(&encoded).await?;

        let mut ack = [0u8; ACK_SIZE];
        timeout(request_timeout, stream.read_exact(&mut ack))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(ClientError::Io)?;

        match parse_ack(ack) {
            Ack::Ok => {
                let mut header = [0u8; REPLY_HEADER_SIZE];
                timeout(request_timeout, stream.read_exact(&mut header))
                    .await
                    .map_err(|_| ClientError::Timeout)?
                    .map_err(ClientError::Io)?;

                let body_len = ReplyHeader::parse(header).body_len() as usize;
                tracing::debug!("Reply acknowledged, body {} bytes", body_len);

                let mut body = vec![0u8; body_len];
                timeout(request_timeout, stream.read_exact(&mut body))
                    .await
                    .map_err(|_| ClientError::Timeout)?
                    .map_err(ClientError::Io)?;

                Ok(decode_reply_body(&body)?)
            }
            Ack::Err(code) => {
                let kind = ServerErrorKind::from_code(code);
                let tail = self.drain_available().await;
                tracing::debug!("Server error: {} ({} tail bytes)", kind, tail.len());
                Err(ClientError::Server { kind, tail })
            }
        }
    }

    /// Collects whatever bytes the server sends after an error
    /// acknowledgement. Stops at EOF, at the first read error, or when
    /// a read exceeds the drain timeout; never blocks indefinitely.
    async fn drain_available(&mut self) -> Vec<u8> {
        let mut tail = Vec::new();
        let Some(stream) = self.stream.as_mut() else {
            return tail;
        };
        let mut buf = [0u8; 512];
        loop {
            match timeout(self.config.drain_timeout, stream.read(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => tail.extend_from_slice(&buf[..n]),
                Ok(Err(_)) | Err(_) => break,
            }
        }
        tail
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Closes the connection.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!("Closing connection");
            let _ = stream.shutdown().await;
        }
        Ok(())
    }
}
