// ── One-shot TCP transport ──
//
// Every command gets its own connection: connect, drain any banner,
// write the command line, read until the device goes quiet, close.
// Nothing is pooled; the device protocol is half-duplex per session.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout};
use tracing::{debug, trace};

use crate::error::{Error, IoStep};
use crate::protocol;

/// Telnet port the ACM200 listens on out of the box.
pub const DEFAULT_PORT: u16 = 23;

const READ_CHUNK: usize = 1024;
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// TCP endpoint of one matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    host: String,
    port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, Error> {
        let host = host.into().trim().to_owned();
        if host.is_empty() {
            return Err(Error::InvalidArgument {
                message: "host must not be empty".into(),
            });
        }
        if port == 0 {
            return Err(Error::InvalidArgument {
                message: "port must be between 1 and 65535".into(),
            });
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Per-step time bounds and buffer limits for one command exchange.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Total time spent draining an unsolicited banner before writing.
    /// `Duration::ZERO` skips the drain.
    pub banner_timeout: Duration,
    /// Bound on writing and flushing the command line.
    pub write_timeout: Duration,
    /// Idle gap that ends a response.
    pub read_timeout: Duration,
    /// Hard ceiling on the whole read phase.
    pub response_deadline: Duration,
    /// Bytes kept from one response before reading stops.
    pub max_response_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            banner_timeout: Duration::from_millis(300),
            write_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_millis(1500),
            response_deadline: Duration::from_secs(5),
            max_response_bytes: 64 * 1024,
        }
    }
}

/// Executes one command line against the device and returns the raw reply.
///
/// Implementations open and close their own connection per call. Dropping
/// the returned future must abandon the exchange and release the socket.
pub trait Transport: Send + Sync {
    fn execute(&self, command: &str) -> impl Future<Output = Result<String, Error>> + Send;
}

/// The real transport: a fresh `TcpStream` per command.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: DeviceAddress,
    config: TransportConfig,
}

impl TcpTransport {
    pub fn new(address: DeviceAddress, config: TransportConfig) -> Self {
        Self { address, config }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn connect(&self) -> Result<TcpStream, Error> {
        let target = (self.address.host(), self.address.port());
        match timeout(self.config.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => {
                // Small command lines; don't let Nagle hold them back.
                let _ = stream.set_nodelay(true);
                Ok(stream)
            }
            Ok(Err(e)) => Err(Error::Connection {
                address: self.address.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::Connection {
                address: self.address.to_string(),
                reason: format!("timed out after {:?}", self.config.connect_timeout),
            }),
        }
    }

    /// Discard whatever the device prints on connect. Best-effort: a quiet
    /// device or a read error here just ends the drain, and the whole drain
    /// never outlasts `banner_timeout`.
    async fn drain_banner(&self, stream: &mut TcpStream) {
        if self.config.banner_timeout.is_zero() {
            return;
        }
        let deadline = Instant::now() + self.config.banner_timeout;
        let mut banner = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(bytes = banner.len(), "banner drain deadline reached");
                break;
            }
            match timeout(remaining, stream.read(&mut chunk)).await {
                Ok(Ok(n)) if n > 0 => {
                    banner.extend_from_slice(&chunk[..n]);
                    if banner.len() >= self.config.max_response_bytes
                        || protocol::ends_with_prompt(&String::from_utf8_lossy(&banner))
                    {
                        break;
                    }
                }
                Ok(Ok(_)) | Err(_) => break,
                Ok(Err(e)) => {
                    debug!(error = %e, "banner read failed");
                    break;
                }
            }
        }
        if !banner.is_empty() {
            trace!(banner = %String::from_utf8_lossy(&banner), "drained banner");
        }
    }

    async fn write_command(&self, stream: &mut TcpStream, command: &str) -> Result<(), Error> {
        let payload = format!("{}\r\n", command.trim());
        let write = async {
            stream.write_all(payload.as_bytes()).await?;
            stream.flush().await
        };
        timeout(self.config.write_timeout, write)
            .await
            .map_err(|_| Error::Timeout {
                step: IoStep::Write,
                after: self.config.write_timeout,
            })??;
        Ok(())
    }

    /// Read until a prompt, an idle gap, EOF, the byte budget or the
    /// response deadline, whichever comes first.
    async fn read_response(&self, stream: &mut TcpStream) -> Result<String, Error> {
        let deadline = Instant::now() + self.config.response_deadline;
        let budget = self.config.max_response_bytes;
        let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if buf.len() >= budget {
                debug!(bytes = buf.len(), "response byte budget reached");
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(bytes = buf.len(), "response deadline reached");
                break;
            }
            let wait = self.config.read_timeout.min(remaining);

            match timeout(wait, stream.read(&mut chunk)).await {
                Err(_) => {
                    trace!(bytes = buf.len(), "device went quiet");
                    break;
                }
                Ok(Ok(0)) => {
                    trace!(bytes = buf.len(), "peer closed connection");
                    break;
                }
                Ok(Ok(n)) => {
                    buf.extend_from_slice(&chunk[..n]);
                    if protocol::ends_with_prompt(&String::from_utf8_lossy(&buf)) {
                        trace!(bytes = buf.len(), "prompt received");
                        break;
                    }
                }
                Ok(Err(e)) if !buf.is_empty() => {
                    debug!(error = %e, "read failed after partial response");
                    break;
                }
                Ok(Err(e)) => return Err(Error::Io(e)),
            }
        }

        buf.truncate(budget);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    async fn exchange(&self, stream: &mut TcpStream, command: &str) -> Result<String, Error> {
        self.drain_banner(stream).await;
        self.write_command(stream, command).await?;
        trace!(command, "command written");
        self.read_response(stream).await
    }
}

impl Transport for TcpTransport {
    async fn execute(&self, command: &str) -> Result<String, Error> {
        let mut stream = self.connect().await?;
        debug!(address = %self.address, command, "connected");

        let result = self.exchange(&mut stream, command).await;

        // Close on every path; close-time errors are irrelevant to the caller.
        let _ = timeout(CLOSE_TIMEOUT, stream.shutdown()).await;
        drop(stream);
        debug!(address = %self.address, "connection closed");

        if let Ok(ref reply) = result {
            trace!(command, reply = %reply.trim_end(), "reply");
        }
        result
    }
}
