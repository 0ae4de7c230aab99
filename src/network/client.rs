//! Blocking client
//!
//! Used by `keyward-cli` and the integration tests.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::os::unix::net::UnixStream;
use std::path::Path;

use crate::error::Result;
use crate::protocol::{self, ControlCommand, Request, Response};

/// Largest response body the client accepts (16 MB)
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// A connection to a Keyward server
pub struct Client {
    reader: TcpStream,

    /// Unbuffered; request bodies carry plaintext
    writer: TcpStream,
}

impl Client {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;

        Ok(Self {
            reader: stream,
            writer,
        })
    }

    /// Send a request and wait for its response
    pub fn request(&mut self, request: &Request) -> Result<Response> {
        let body = protocol::encode_request(request)?;
        self.send_raw(&body)
    }

    /// Send an arbitrary frame body and wait for the response
    pub fn send_raw(&mut self, body: &[u8]) -> Result<Response> {
        protocol::write_frame(&mut self.writer, body)?;
        let response = protocol::read_frame(&mut self.reader, MAX_RESPONSE_SIZE)?;
        protocol::decode_response(&response)
    }

    /// Close both directions; the server sees end of input
    pub fn close(self) -> Result<()> {
        self.reader.shutdown(Shutdown::Both)?;
        Ok(())
    }
}

/// Send one command to the control socket and return the reply line
pub fn send_control(path: impl AsRef<Path>, command: &ControlCommand) -> Result<String> {
    let mut stream = UnixStream::connect(path)?;
    writeln!(stream, "{}", command)?;
    stream.shutdown(Shutdown::Write)?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply)?;
    Ok(reply.trim_end().to_string())
}
