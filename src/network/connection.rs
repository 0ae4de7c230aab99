//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use zeroize::Zeroize;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{KeywardError, Result};
use crate::protocol::{read_frame, write_frame};

use super::ShutdownSignal;

/// Result of probing the socket before a receive
enum PeerState {
    /// Bytes are waiting
    Ready,

    /// Nothing arrived within the poll interval
    Idle,

    /// Peer closed or reset the connection
    Closed,
}

/// Handles a single client connection
pub struct Connection {
    /// TCP stream used for reads and liveness checks
    stream: TcpStream,

    /// Unbuffered write half; responses may carry plaintext and must not
    /// linger in a writer buffer
    writer: TcpStream,

    /// Shared request dispatcher
    dispatcher: Arc<Dispatcher>,

    /// Process-wide shutdown flag
    shutdown: ShutdownSignal,

    /// Peer address for logging
    peer_addr: String,

    read_timeout: Option<Duration>,
    poll_interval: Duration,
    max_frame_size: usize,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Splits off the write half and configures the write timeout
    pub fn new(
        stream: TcpStream,
        dispatcher: Arc<Dispatcher>,
        shutdown: ShutdownSignal,
        config: &Config,
    ) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Accepted from a non-blocking listener on some platforms
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(config.write_timeout())?;

        let write_stream = stream.try_clone()?;

        Ok(Self {
            stream,
            writer: write_stream,
            dispatcher,
            shutdown,
            peer_addr,
            read_timeout: config.read_timeout(),
            poll_interval: config.poll_interval(),
            max_frame_size: config.max_frame_size,
        })
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads requests in a loop and sends responses.
    /// Returns when the client disconnects, shutdown is signalled, or an
    /// I/O error occurs. The connection is closed in every case.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        while !self.shutdown.is_triggered() {
            match self.peer_state()? {
                PeerState::Idle => continue,
                PeerState::Closed => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                PeerState::Ready => {}
            }

            // Read next request
            let request = match read_frame(&mut self.stream, self.max_frame_size) {
                Ok(body) => body,
                Err(KeywardError::Io(ref e)) if is_disconnect(e) => {
                    tracing::debug!("Client {} disconnected mid-request", self.peer_addr);
                    self.close();
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error receiving from {}: {}", self.peer_addr, e);
                    self.drain_and_close();
                    return Err(e);
                }
            };

            tracing::trace!("Received {} byte request from {}", request.len(), self.peer_addr);

            let response = self.dispatcher.process_frame(&request);
            drop(request);

            // Send response
            if let Err(e) = write_frame(&mut self.writer, &response) {
                if let KeywardError::Io(ref io_err) = e {
                    if is_disconnect(io_err) {
                        tracing::debug!(
                            "Client {} disconnected before response could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        self.close();
                        return Ok(());
                    }
                }
                tracing::warn!("Error sending to {}: {}", self.peer_addr, e);
                self.drain_and_close();
                return Err(e);
            }
        }

        tracing::debug!("Closing connection to {} for shutdown", self.peer_addr);
        self.close();
        Ok(())
    }

    /// Wait up to one poll interval for the peer to send or hang up
    fn peer_state(&self) -> Result<PeerState> {
        self.stream.set_read_timeout(Some(self.poll_interval))?;

        let mut peeked = [0u8; 1];
        let state = match self.stream.peek(&mut peeked) {
            Ok(0) => PeerState::Closed,
            Ok(_) => PeerState::Ready,
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                PeerState::Idle
            }
            Err(ref e) if is_disconnect(e) => PeerState::Closed,
            Err(e) => return Err(e.into()),
        };

        if let PeerState::Ready = state {
            self.stream.set_read_timeout(self.read_timeout)?;
        }
        Ok(state)
    }

    /// Stop sending, discard input until the peer hangs up, then close
    fn drain_and_close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Write);
        let _ = self
            .stream
            .set_read_timeout(Some(self.read_timeout.unwrap_or(self.poll_interval)));

        let mut sink = [0u8; 512];
        let mut drained = 0usize;
        while drained <= self.max_frame_size {
            match self.stream.read(&mut sink) {
                Ok(0) | Err(_) => break,
                Ok(n) => drained += n,
            }
        }
        sink.zeroize();

        self.close();
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}
