//! Response definitions
//!
//! Represents responses to clients.

use crate::buffer::{KeyId, SecretBuffer};
use crate::error::ServiceError;

use super::RequestType;

/// A response to send to a client
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Transform output, echoed with the request type and key identifier
    Success {
        request_type: RequestType,
        key_id: KeyId,
        data: SecretBuffer,
    },

    /// One of the fixed error messages
    Error(ServiceError),
}

impl Response {
    pub fn success(request_type: RequestType, key_id: KeyId, data: SecretBuffer) -> Self {
        Response::Success {
            request_type,
            key_id,
            data,
        }
    }

    pub fn error(error: ServiceError) -> Self {
        Response::Error(error)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}
