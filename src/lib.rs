//! # Keyward
//!
//! A local key-management daemon. Clients name keys by identifier (a file
//! path or URI) and ask for data to be wrapped or unwrapped; key material
//! never leaves the daemon.
//! - Bounded key cache with load-on-miss and secure erasure
//! - Single execution lock around the trusted module
//! - Thread-per-connection TCP protocol plus a Unix control socket
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │           TCP Server               Control Channel           │
//! │      (thread per client)         (Unix socket, 1 thread)     │
//! └─────────────────────┬───────────────────────┬───────────────┘
//!                       │                       │
//! ┌─────────────────────▼───────────────────────▼───────────────┐
//! │                      Dispatcher                              │
//! │              (process-wide execution lock)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌───────────────┐
//!   │  Key Cache  │          │ Trusted Module│
//!   │   (Mutex)   │          │  (transform)  │
//!   └──────┬──────┘          └───────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │  KeyLoader  │
//!   │  (backend)  │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod buffer;
pub mod cache;
pub mod trusted;
pub mod protocol;
pub mod dispatcher;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KeywardError, Result, ServiceError};
pub use config::Config;
pub use buffer::{KeyId, SecretBuffer};
pub use cache::{FileKeyLoader, KeyCache, KeyLoader};
pub use dispatcher::Dispatcher;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Keyward
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
