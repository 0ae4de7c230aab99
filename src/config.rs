//! Configuration for Keyward
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{KeywardError, Result};

/// Default bound on simultaneously cached keys
pub const DEFAULT_CACHE_CAPACITY: usize = 100_000;

/// Main configuration for a Keyward daemon
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Max number of cached keys; adds beyond this fail rather than evict
    pub cache_capacity: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    /// How often idle workers and the accept loop check for shutdown
    pub poll_interval_ms: u64,

    /// Largest accepted frame body (bytes)
    pub max_frame_size: usize,

    // -------------------------------------------------------------------------
    // Control Channel Configuration
    // -------------------------------------------------------------------------
    /// Unix socket path for administrative commands
    pub control_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            listen_addr: "127.0.0.1:10600".to_string(),
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
            poll_interval_ms: 100,
            max_frame_size: 1024 * 1024, // 1 MB
            control_path: PathBuf::from("/tmp/keyward.sock"),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(KeywardError::Config("cache_capacity must be > 0".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(KeywardError::Config("poll_interval_ms must be > 0".into()));
        }
        if self.max_frame_size == 0 {
            return Err(KeywardError::Config("max_frame_size must be > 0".into()));
        }
        if self.control_path.as_os_str().is_empty() {
            return Err(KeywardError::Config("control_path must not be empty".into()));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the key cache capacity
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the shutdown poll interval (in milliseconds)
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the maximum frame body size (in bytes)
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Set the control socket path
    pub fn control_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.control_path = path.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
