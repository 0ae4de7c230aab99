//! Dispatcher Module
//!
//! Routes decoded requests through the key cache and the trusted module.
//!
//! ## Request Lifecycle
//! ```text
//! RECEIVED → DECODED → CACHE_RESOLVED → TRANSFORMED → RESPONDED
//!               │             │               │
//!               └─────────────┴───────────────┴──→ error envelope
//! ```
//! Every failure short-circuits to an error envelope; nothing is retried.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::SecretBuffer;
use crate::cache::KeyCache;
use crate::error::{Result, ServiceError};
use crate::protocol::{self, ControlCommand, Frame, Request, Response};
use crate::trusted::{Operation, TrustedModule};

/// Request dispatcher shared by every worker
///
/// ## Concurrency Model: One Execution Lock
///
/// The trusted module is not assumed reentrant, so it lives inside
/// `module`, the process-wide execution lock. The lock is taken for the
/// cache lookup (which may load a key) and the transform, and released
/// before the response is encoded or any network I/O happens.
pub struct Dispatcher {
    /// Key cache (internal Mutex)
    cache: Arc<KeyCache>,

    /// Trusted module behind the execution lock
    module: Mutex<Box<dyn TrustedModule>>,
}

impl Dispatcher {
    pub fn new(cache: Arc<KeyCache>, module: impl TrustedModule + 'static) -> Self {
        Self {
            cache,
            module: Mutex::new(Box::new(module)),
        }
    }

    /// Decode, dispatch, and encode one request body.
    ///
    /// Always yields a response body; a body that does not decode gets
    /// "Missing Data".
    pub fn process_frame(&self, body: &[u8]) -> Frame {
        let request = match protocol::decode_request(body) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!("Rejecting request: {}", e);
                return protocol::encode_error(ServiceError::MissingData);
            }
        };

        tracing::trace!(
            "Decoded {:?} request for {}",
            request.request_type,
            request.key_id
        );

        protocol::encode(&self.handle(request))
    }

    /// Dispatch a decoded request into a response
    pub fn handle(&self, request: Request) -> Response {
        match self.dispatch(&request) {
            Ok(output) => Response::success(request.request_type, request.key_id, output),
            Err(e) => Response::error(e),
        }
    }

    /// Resolve the key and run the transform
    pub fn dispatch(&self, request: &Request) -> std::result::Result<SecretBuffer, ServiceError> {
        let op = request.request_type.operation().ok_or_else(|| {
            tracing::warn!(
                "Unsupported request type {:?} for {}",
                request.request_type,
                request.key_id
            );
            ServiceError::RequestType
        })?;

        if request.key_id.is_empty() || request.data.is_empty() {
            tracing::warn!("Request with empty key identifier or payload");
            return Err(ServiceError::KeyOrData);
        }

        let mut module = self.module.lock();

        let key = self.cache.lookup(&request.key_id).map_err(|e| {
            tracing::warn!("Key {} not loaded: {}", request.key_id, e);
            ServiceError::KeyLoad
        })?;

        module
            .transform(op, &key, request.data.as_bytes())
            .map_err(|e| {
                tracing::warn!("{:?} with key {} failed: {}", op, request.key_id, e);
                match op {
                    Operation::Encrypt => ServiceError::Encrypt,
                    Operation::Decrypt => ServiceError::Decrypt,
                }
            })
    }

    /// Run an administrative command under the execution lock.
    ///
    /// Returns the number of cache entries the command touched.
    pub fn execute_control(&self, command: &ControlCommand) -> Result<usize> {
        let _module = self.module.lock();

        match command {
            ControlCommand::Exit => Ok(0),
            ControlCommand::Load(id) => self.cache.add(id).map(|_| 1),
            ControlCommand::Remove(id) => self.cache.delete(id).map(|_| 1),
            ControlCommand::RemoveAll => Ok(self.cache.clear()),
        }
    }

    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }
}
