// src/connection/stream.rs

//! Defines `Connection`, the single duplex TCP stream a session talks over.

use crate::core::ClientError;
use crate::core::encoding::TextEncoding;
use crate::core::protocol::{LineCodec, READ_CHUNK_SIZE};
use bytes::BytesMut;
use futures::StreamExt;
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, oneshot};
use tokio_util::codec::{Encoder, FramedRead};
use tracing::{debug, error, info};

/// One-shot channel through which the reader hands a reply to `transact`.
type ReplySender = oneshot::Sender<Result<String, ClientError>>;

/// The write half plus the scratch buffer lines are encoded into.
#[derive(Debug)]
struct LineWriter {
    half: OwnedWriteHalf,
    codec: LineCodec,
    buf: BytesMut,
}

impl LineWriter {
    /// Encodes the whole line first and writes it with a single `write_all`,
    /// so a line is never split around another sender's bytes.
    async fn write_line(&mut self, text: &str) -> Result<(), ClientError> {
        self.buf.clear();
        self.codec.encode(text, &mut self.buf)?;
        self.half
            .write_all(&self.buf)
            .await
            .map_err(ClientError::send)
    }
}

/// A newline-delimited text connection to the control API server.
///
/// Sends are serialised by an async mutex around the write half. Only the
/// response reader reads the socket; `transact` obtains its reply through a
/// one-shot slot that the reader fills with the next line it receives.
///
/// Both halves sit in `Option`s so that closing can drop them and release the
/// socket even while other owners still hold the `Arc<Connection>`.
#[derive(Debug)]
pub struct Connection {
    addr: String,
    peer_addr: SocketAddr,
    writer: Mutex<Option<LineWriter>>,
    reader: Mutex<Option<FramedRead<OwnedReadHalf, LineCodec>>>,
    reply_slot: parking_lot::Mutex<Option<ReplySender>>,
    // A duplicate handle used to shut the socket down without awaiting either half.
    control: parking_lot::Mutex<Option<std::net::TcpStream>>,
    closed: AtomicBool,
}

impl Connection {
    /// Opens a TCP stream to `host:port`, failing if it cannot be established
    /// within `connect_timeout`.
    pub async fn connect(
        host: &str,
        port: u16,
        encoding: TextEncoding,
        connect_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let addr = format!("{host}:{port}");
        info!("Connecting to {}...", addr);

        let stream =
            match tokio::time::timeout(connect_timeout, TcpStream::connect(addr.as_str())).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    error!("Failed to connect to {}: {}", addr, e);
                    return Err(ClientError::Connect {
                        addr,
                        source: Arc::new(e),
                    });
                }
                Err(_) => {
                    error!(
                        "Failed to connect to {}: timed out after {:?}",
                        addr, connect_timeout
                    );
                    return Err(ClientError::ConnectTimeout {
                        addr,
                        timeout: connect_timeout,
                    });
                }
            };

        let conn = Self::from_stream(stream, addr.clone(), encoding).map_err(|e| {
            error!("Failed to set up connection to {}: {}", addr, e);
            ClientError::Connect {
                addr: addr.clone(),
                source: Arc::new(e),
            }
        })?;
        info!("Connected to server at {}", conn.peer_addr);
        Ok(conn)
    }

    fn from_stream(
        stream: TcpStream,
        addr: String,
        encoding: TextEncoding,
    ) -> std::io::Result<Self> {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle's algorithm for {}: {}", addr, e);
        }
        let peer_addr = stream.peer_addr()?;

        let std_stream = stream.into_std()?;
        let control = std_stream.try_clone()?;
        let stream = TcpStream::from_std(std_stream)?;
        let (read_half, write_half) = stream.into_split();

        let codec = LineCodec::new(encoding);
        Ok(Self {
            addr,
            peer_addr,
            writer: Mutex::new(Some(LineWriter {
                half: write_half,
                codec: codec.clone(),
                buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            })),
            reader: Mutex::new(Some(FramedRead::with_capacity(
                read_half,
                codec,
                READ_CHUNK_SIZE,
            ))),
            reply_slot: parking_lot::Mutex::new(None),
            control: parking_lot::Mutex::new(Some(control)),
            closed: AtomicBool::new(false),
        })
    }

    /// The `host:port` string this connection was opened with.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Writes `text` followed by a newline, mutually exclusive with every other sender.
    pub async fn send_line(&self, text: &str) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(writer) => writer.write_line(text).await,
            None => Err(ClientError::Closed),
        }
    }

    /// Performs one request/response turn: while holding the send lock, registers
    /// a reply slot, writes `line` and waits for the next line the reader receives.
    pub async fn transact(&self, line: &str, reply_timeout: Duration) -> Result<String, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(ClientError::Closed);
        };

        let (tx, rx) = oneshot::channel();
        *self.reply_slot.lock() = Some(tx);
        // `close` drops the slot after setting the flag, so a slot registered
        // after that point would never be filled.
        if self.is_closed() {
            self.reply_slot.lock().take();
            return Err(ClientError::Closed);
        }

        if let Err(e) = writer.write_line(line).await {
            self.reply_slot.lock().take();
            return Err(e);
        }

        let reply = match tokio::time::timeout(reply_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            // The reader or `close` dropped the slot.
            Ok(Err(_)) => Err(ClientError::PeerClosed),
            Err(_) => {
                self.reply_slot.lock().take();
                Err(ClientError::ReplyTimeout(reply_timeout))
            }
        };
        drop(guard);
        reply
    }

    /// Reads the next line from the socket. Intended for the response reader only.
    pub async fn receive_line(&self) -> Result<String, ClientError> {
        let mut reader = self.reader.lock().await;
        let Some(framed) = reader.as_mut() else {
            return Err(ClientError::Closed);
        };
        match framed.next().await {
            Some(result) => result,
            None => Err(ClientError::PeerClosed),
        }
    }

    /// Removes a pending reply slot, if `transact` registered one.
    pub(crate) fn take_reply_slot(&self) -> Option<ReplySender> {
        self.reply_slot.lock().take()
    }

    /// Shuts the socket down in both directions, wakes a pending `transact`,
    /// and drops whichever halves are not in use. Idempotent and infallible;
    /// returns `true` only for the call that did the work.
    ///
    /// A half that is locked by an in-flight read or write is left for
    /// [`Connection::release`] to drop.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(control) = self.control.lock().take() {
            if let Err(e) = control.shutdown(Shutdown::Both) {
                debug!("Shutdown of {} reported: {}", self.addr, e);
            }
            drop(control);
        }
        // Dropping the sender fails the waiting `transact` with `PeerClosed`.
        drop(self.reply_slot.lock().take());
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
        info!("Socket to {} closed.", self.addr);
        true
    }

    /// Closes the connection and waits for both halves to be dropped, so the
    /// file descriptor is gone when this returns.
    pub async fn release(&self) {
        self.close();
        self.writer.lock().await.take();
        self.reader.lock().await.take();
    }

    /// Whether the underlying socket has been fully released.
    pub async fn is_released(&self) -> bool {
        self.writer.lock().await.is_none() && self.reader.lock().await.is_none()
    }
}
