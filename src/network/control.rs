//! Control Channel
//!
//! Long-lived worker serving administrative commands on a Unix socket.
//! Unlike client connections, a failed accept or read never stops it.

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::dispatcher::Dispatcher;
use crate::error::{KeywardError, Result};
use crate::protocol::ControlCommand;

use super::ShutdownSignal;

/// Longest command line accepted (bytes)
pub const MAX_COMMAND_SIZE: u64 = 4096;

/// How long a control client may take to send its command
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Control endpoint worker
pub struct ControlChannel {
    listener: UnixListener,
    path: PathBuf,
    dispatcher: Arc<Dispatcher>,
    shutdown: ShutdownSignal,
    poll_interval: Duration,
}

impl ControlChannel {
    /// Create the control socket at `path`, replacing a stale one
    pub fn bind(
        path: impl Into<PathBuf>,
        dispatcher: Arc<Dispatcher>,
        shutdown: ShutdownSignal,
        poll_interval: Duration,
    ) -> Result<Self> {
        let path = path.into();

        if let Ok(metadata) = fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(KeywardError::Config(format!(
                    "control path {} exists and is not a socket",
                    path.display()
                )));
            }
            tracing::debug!("Removing stale control socket {}", path.display());
            fs::remove_file(&path)?;
        }

        let listener = UnixListener::bind(&path)?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener,
            path,
            dispatcher,
            shutdown,
            poll_interval,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serve commands until `exit` arrives or shutdown is signalled
    pub fn run(self) {
        tracing::info!("Control channel listening on {}", self.path.display());

        while !self.shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, _)) => {
                    if self.serve(stream) {
                        tracing::info!("Exit command received, shutting down");
                        self.shutdown.trigger();
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(self.poll_interval);
                }
                Err(e) => {
                    tracing::error!("Control channel accept failed: {}", e);
                    thread::sleep(self.poll_interval);
                }
            }
        }

        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!("Could not remove control socket {}: {}", self.path.display(), e);
        }
        tracing::info!("Control channel stopped");
    }

    /// Handle one control connection; returns true on `exit`
    fn serve(&self, mut stream: UnixStream) -> bool {
        let line = match read_command(&mut stream) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Control channel read failed: {}", e);
                return false;
            }
        };

        let command = match ControlCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("Rejected control command: {}", e);
                reply(&mut stream, &format!("error {}", e));
                return false;
            }
        };

        tracing::info!("Control command: {}", command);

        match self.dispatcher.execute_control(&command) {
            Ok(_) if command == ControlCommand::Exit => {
                reply(&mut stream, "ok");
                true
            }
            Ok(count) => {
                reply(&mut stream, &format!("ok {}", count));
                false
            }
            Err(e) => {
                tracing::warn!("Control command '{}' failed: {}", command, e);
                reply(&mut stream, &format!("error {}", e));
                false
            }
        }
    }
}

/// Read one command line; a newline or end of input completes it, so the
/// client does not have to half-close before the command runs
fn read_command(stream: &mut UnixStream) -> io::Result<String> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(COMMAND_TIMEOUT))?;

    let mut line = String::new();
    BufReader::new((&mut *stream).take(MAX_COMMAND_SIZE)).read_line(&mut line)?;
    Ok(line)
}

fn reply(stream: &mut UnixStream, message: &str) {
    if let Err(e) = writeln!(stream, "{}", message) {
        tracing::debug!("Control reply not delivered: {}", e);
    }
}
