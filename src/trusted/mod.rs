//! Trusted Execution Module
//!
//! Interface to the isolated component that performs the actual key-wrap
//! and unwrap. The daemon treats it as opaque and not reentrant: a single
//! instance is owned by the dispatcher behind the process-wide execution
//! lock, hence `&mut self` on [`TrustedModule::transform`].

mod aead;

pub use aead::AeadModule;

use crate::buffer::SecretBuffer;
use crate::error::Result;

/// Direction of a transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
}

/// A cryptographic transform backend
pub trait TrustedModule: Send {
    /// Apply `op` to `payload` under the wrapping `key`
    fn transform(
        &mut self,
        op: Operation,
        key: &SecretBuffer,
        payload: &[u8],
    ) -> Result<SecretBuffer>;
}
