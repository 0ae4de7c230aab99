//! Request definitions
//!
//! Represents decoded client requests.

use serde_json::Number;

use crate::buffer::{KeyId, SecretBuffer};
use crate::trusted::Operation;

/// Request types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Encrypt,
    Decrypt,

    /// Any other wire tag; carries the tag so it can be logged or resent
    Unknown(i64),

    /// A number with no integer tag, such as `1.5` or a value beyond `i64`
    NonInteger,
}

impl RequestType {
    pub const ENCRYPT_TAG: i64 = 1;
    pub const DECRYPT_TAG: i64 = 2;

    pub fn from_tag(tag: i64) -> Self {
        match tag {
            Self::ENCRYPT_TAG => RequestType::Encrypt,
            Self::DECRYPT_TAG => RequestType::Decrypt,
            other => RequestType::Unknown(other),
        }
    }

    /// Classify the JSON number carried in an envelope
    pub fn from_number(number: &Number) -> Self {
        match number.as_i64() {
            Some(tag) => Self::from_tag(tag),
            None => RequestType::NonInteger,
        }
    }

    pub fn tag(&self) -> Option<i64> {
        match self {
            RequestType::Encrypt => Some(Self::ENCRYPT_TAG),
            RequestType::Decrypt => Some(Self::DECRYPT_TAG),
            RequestType::Unknown(tag) => Some(*tag),
            RequestType::NonInteger => None,
        }
    }

    /// The transform this request asks for, if the type is supported
    pub fn operation(&self) -> Option<Operation> {
        match self {
            RequestType::Encrypt => Some(Operation::Encrypt),
            RequestType::Decrypt => Some(Operation::Decrypt),
            RequestType::Unknown(_) | RequestType::NonInteger => None,
        }
    }
}

/// A decoded request with its payload already transport-decoded
#[derive(Debug, Clone)]
pub struct Request {
    pub request_type: RequestType,
    pub key_id: KeyId,
    pub data: SecretBuffer,
}

impl Request {
    pub fn new(request_type: RequestType, key_id: impl Into<KeyId>, data: SecretBuffer) -> Self {
        Self {
            request_type,
            key_id: key_id.into(),
            data,
        }
    }

    pub fn encrypt(key_id: impl Into<KeyId>, plaintext: &[u8]) -> Self {
        Self::new(RequestType::Encrypt, key_id, SecretBuffer::from_slice(plaintext))
    }

    pub fn decrypt(key_id: impl Into<KeyId>, ciphertext: &[u8]) -> Self {
        Self::new(RequestType::Decrypt, key_id, SecretBuffer::from_slice(ciphertext))
    }
}
