//! SMTP connection management.
//!
//! A [`Connection`] owns one duplex stream and provides the line-based
//! primitives the session is built on. Reply framing is deliberately
//! simple: [`Connection::read_block`] collects bytes until the server has
//! been quiet for the configured read timeout. A slow link can split one
//! reply across two blocks; this is an accepted heuristic, kept behind
//! `read_block` so callers never depend on how replies are delimited.

mod stream;

pub use stream::{SmtpStream, connect, connect_tls};

use crate::command::Command;
use crate::config::{Security, SmtpConfig};
use crate::error::{Error, Result};
use crate::types::ReplyBlock;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

/// Size of a single read from the stream.
const READ_CHUNK_SIZE: usize = 512;

/// Maximum size of one reply block to prevent memory exhaustion.
const MAX_BLOCK_SIZE: usize = 1024 * 1024; // 1 MB

/// How a reply block ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockEnd {
    /// No bytes arrived for a full read timeout.
    Quiet,
    /// The stream reported end of file.
    Closed,
}

/// A single connection to an SMTP server.
#[derive(Debug)]
pub struct Connection<S = SmtpStream> {
    stream: S,
    read_timeout: Duration,
    greeting: ReplyBlock,
}

impl Connection<SmtpStream> {
    /// Connects over plain TCP and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or no greeting arrives.
    pub async fn connect_plain(config: &SmtpConfig) -> Result<Self> {
        info!(host = %config.host, port = config.plain_port, "Connecting");
        let stream = connect(&config.host, config.plain_port, config.connect_timeout()).await?;
        Self::establish(stream, config.read_timeout()).await
    }

    /// Connects with implicit TLS and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails or no greeting
    /// arrives.
    pub async fn connect_secure(config: &SmtpConfig) -> Result<Self> {
        info!(host = %config.host, port = config.tls_port, "Connecting with TLS");
        let stream = connect_tls(&config.host, config.tls_port, config.connect_timeout()).await?;
        Self::establish(stream, config.read_timeout()).await
    }

    /// Opens a connection according to the configured security mode.
    ///
    /// With [`Security::Tls`], a secure connect that times out is retried
    /// once over plain TCP; any other failure is returned as is.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection could be established.
    pub async fn open(config: &SmtpConfig) -> Result<Self> {
        match config.security {
            Security::None => Self::connect_plain(config).await,
            Security::Tls => match Self::connect_secure(config).await {
                Err(Error::Timeout(limit)) => {
                    warn!(
                        host = %config.host,
                        ?limit,
                        "TLS connect timed out, falling back to plain TCP"
                    );
                    Self::connect_plain(config).await
                }
                other => other,
            },
        }
    }

    /// Returns true if the connection is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the server stays silent for
    /// `read_timeout`, or [`Error::ConnectionAborted`] if it closes the
    /// stream without a greeting.
    pub async fn establish(stream: S, read_timeout: Duration) -> Result<Self> {
        let mut connection = Self {
            stream,
            read_timeout,
            greeting: ReplyBlock::default(),
        };

        let (greeting, end) = connection.read_raw().await?;
        if greeting.is_empty() {
            return Err(match end {
                BlockEnd::Quiet => Error::Timeout(read_timeout),
                BlockEnd::Closed => {
                    Error::ConnectionAborted("server closed the connection before greeting".into())
                }
            });
        }

        info!(greeting = %greeting.text(), "Connected");
        connection.greeting = greeting;
        Ok(connection)
    }

    /// Returns the greeting the server sent on connect.
    #[must_use]
    pub const fn greeting(&self) -> &ReplyBlock {
        &self.greeting
    }

    /// Returns the quiet period that ends a reply block.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Writes `text` followed by CRLF.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        trace!(line = %text, "C:");
        let mut data = Vec::with_capacity(text.len() + 2);
        data.extend_from_slice(text.as_bytes());
        data.extend_from_slice(b"\r\n");

        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Writes a command line without waiting for its reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn send_command(&mut self, cmd: &Command) -> Result<()> {
        if cmd.is_sensitive() {
            debug!("C: <credentials>");
        } else {
            debug!("C: {cmd}");
        }
        self.send_line(&cmd.to_string()).await
    }

    /// Reads everything the server sends until it goes quiet.
    ///
    /// Returns an empty block if nothing arrived within the read timeout or
    /// the stream was closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the block grows too large.
    pub async fn read_block(&mut self) -> Result<ReplyBlock> {
        let (block, end) = self.read_raw().await?;
        if end == BlockEnd::Closed {
            debug!("Stream closed by server");
        }
        debug!(reply = %block.text(), "S:");
        Ok(block)
    }

    /// Sends a command and reads the reply block that follows it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or read fails.
    pub async fn request(&mut self, cmd: &Command) -> Result<ReplyBlock> {
        self.send_command(cmd).await?;
        self.read_block().await
    }

    async fn read_raw(&mut self) -> Result<(ReplyBlock, BlockEnd)> {
        let mut raw = Vec::new();
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        let end = loop {
            match tokio::time::timeout(self.read_timeout, self.stream.read(&mut chunk)).await {
                Err(_) => break BlockEnd::Quiet,
                Ok(Ok(0)) => break BlockEnd::Closed,
                Ok(Ok(n)) => {
                    raw.extend_from_slice(&chunk[..n]);
                    if raw.len() > MAX_BLOCK_SIZE {
                        return Err(Error::Protocol(format!(
                            "reply too large: more than {MAX_BLOCK_SIZE} bytes"
                        )));
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        };

        Ok((ReplyBlock::from_bytes(&raw), end))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn test_establish_reads_greeting() {
        let mock = Builder::new().read(b"220 mx.example.com ESMTP\r\n").build();
        let connection = Connection::establish(mock, TIMEOUT).await.unwrap();
        assert_eq!(connection.greeting().text(), "220 mx.example.com ESMTP");
    }

    #[tokio::test(start_paused = true)]
    async fn test_establish_closed_without_greeting() {
        let mock = Builder::new().build();
        let err = Connection::establish(mock, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionAborted(_)));
        assert!(err.is_connection_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_establish_silent_server_times_out() {
        let mock = Builder::new().wait(Duration::from_secs(5)).build();
        let err = Connection::establish(mock, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(limit) if limit == TIMEOUT));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_block_accumulates_chunks() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .read(b"250-mx.example.com\r\n")
            .read(b"250-PIPELINING\r\n")
            .read(b"250 DSN\r\n")
            .build();
        let mut connection = Connection::establish(mock, TIMEOUT).await.unwrap();

        // The greeting read already drained every chunk that was available.
        assert_eq!(
            connection.greeting().text(),
            "220 ready\r\n250-mx.example.com\r\n250-PIPELINING\r\n250 DSN"
        );
        assert!(connection.read_block().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_block_stops_at_quiet_period() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .wait(Duration::from_millis(1500))
            .read(b"250 OK\r\n")
            .build();
        let mut connection = Connection::establish(mock, TIMEOUT).await.unwrap();
        assert_eq!(connection.greeting().text(), "220 ready");

        let block = connection.read_block().await.unwrap();
        assert_eq!(block.text(), "250 OK");
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_line_appends_crlf() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"MIME-Version: 1.0\r\n")
            .build();
        let mut connection = Connection::establish(mock, TIMEOUT).await.unwrap();
        connection.send_line("MIME-Version: 1.0").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_round_trip() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-mx.example.com\r\n250 8BITMIME\r\n")
            .build();
        let mut connection = Connection::establish(mock, TIMEOUT).await.unwrap();

        let cmd = Command::Ehlo {
            hostname: "localhost".to_string(),
        };
        let block = connection.request(&cmd).await.unwrap();
        assert!(block.contains("8BITMIME"));
        assert_eq!(block.last_reply().unwrap().message.len(), 2);
    }
}
