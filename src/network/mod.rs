//! Network Module
//!
//! TCP server, control channel, and client handling.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking accept, polls for shutdown)
//! - One worker thread per client connection
//! - One control channel thread on a Unix socket
//! - Requests routed through the shared Dispatcher

mod server;
mod connection;
mod control;
mod shutdown;
mod client;

pub use server::Server;
pub use connection::Connection;
pub use control::{ControlChannel, MAX_COMMAND_SIZE};
pub use shutdown::ShutdownSignal;
pub use client::{send_control, Client, MAX_RESPONSE_SIZE};
