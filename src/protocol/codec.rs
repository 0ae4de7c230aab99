//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Frame
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │        JSON body            │
//! └──────────┴─────────────────────────────┘
//! ```
//!
//! ### Bodies
//! - Request: `{"request_type": 1, "key_id": "file:/k", "data": "<base64>"}`
//! - Success: `{"request_type": 1, "key_id": "file:/k", "data": "<base64>"}`
//! - Error:   `{"error": "Missing Data"}`
//!
//! Payload bytes are always base64 on the wire, so arbitrary binary data
//! (zero bytes included) survives the JSON text layer.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::buffer::{KeyId, SecretBuffer};
use crate::error::{KeywardError, Result, ServiceError};

use super::{Request, RequestType, Response};

/// Length prefix size: 4 bytes, big-endian
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// An encoded body; erased on drop since it may carry plaintext
pub type Frame = Zeroizing<Vec<u8>>;

// =============================================================================
// Envelopes
// =============================================================================

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(deny_unknown_fields)]
struct DataEnvelope {
    #[zeroize(skip)]
    request_type: Number,
    key_id: String,
    data: String,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ErrorEnvelope {
    error: String,
}

/// Requests tolerate extra fields; only the three named ones are read
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
struct RequestEnvelope {
    /// Any JSON number; non-integer or out-of-range values are unknown types
    #[zeroize(skip)]
    request_type: Number,
    key_id: String,
    data: String,
}

// =============================================================================
// Transport Encoding
// =============================================================================

/// Encode raw bytes for transmission
pub fn transport_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Reverse [`transport_encode`]
pub fn transport_decode(text: &str) -> Result<SecretBuffer> {
    STANDARD
        .decode(text)
        .map(SecretBuffer::new)
        .map_err(|e| KeywardError::Protocol(format!("invalid base64 payload: {}", e)))
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Decode a request body
///
/// Any absent, ill-typed, or undecodable field is a protocol error; the
/// dispatcher reports all of them to the client as "Missing Data".
pub fn decode_request(body: &[u8]) -> Result<Request> {
    let mut envelope: RequestEnvelope = serde_json::from_slice(body)
        .map_err(|e| KeywardError::Protocol(format!("malformed request: {}", e)))?;

    let data = transport_decode(&envelope.data)?;
    let key_id = KeyId::from(std::mem::take(&mut envelope.key_id));

    Ok(Request {
        request_type: RequestType::from_number(&envelope.request_type),
        key_id,
        data,
    })
}

/// Encode a request body (client side)
///
/// Fails for identifiers that are not UTF-8 and for request types with
/// no integer tag, since neither can be sent without changing its meaning.
pub fn encode_request(request: &Request) -> Result<Frame> {
    let envelope = data_envelope(request.request_type, &request.key_id, &request.data)?;
    to_frame(&envelope)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a success body, transport-encoding `output`
pub fn encode_response(
    request_type: RequestType,
    key_id: &KeyId,
    output: &SecretBuffer,
) -> Result<Frame> {
    let envelope = data_envelope(request_type, key_id, output)?;
    to_frame(&envelope)
}

fn data_envelope(
    request_type: RequestType,
    key_id: &KeyId,
    data: &SecretBuffer,
) -> Result<DataEnvelope> {
    let tag = request_type
        .tag()
        .ok_or_else(|| KeywardError::Protocol(format!("{:?} has no wire tag", request_type)))?;
    let key_id = key_id
        .as_str()
        .ok_or_else(|| KeywardError::Protocol(format!("key identifier {:?} is not UTF-8", key_id)))?;

    Ok(DataEnvelope {
        request_type: Number::from(tag),
        key_id: key_id.to_string(),
        data: transport_encode(data.as_bytes()),
    })
}

/// Encode an error body
pub fn encode_error(error: ServiceError) -> Frame {
    let envelope = serde_json::json!({ "error": error.to_string() });
    Zeroizing::new(envelope.to_string().into_bytes())
}

/// Encode any response
///
/// A success that cannot be serialized degrades to an error body for the
/// same request direction, so a response is always produced.
pub fn encode(response: &Response) -> Frame {
    match response {
        Response::Success {
            request_type,
            key_id,
            data,
        } => encode_response(*request_type, key_id, data).unwrap_or_else(|e| {
            tracing::error!("Failed to encode response for {}: {}", key_id, e);
            encode_error(match request_type {
                RequestType::Decrypt => ServiceError::Decrypt,
                _ => ServiceError::Encrypt,
            })
        }),
        Response::Error(error) => encode_error(*error),
    }
}

/// Decode a response body (client side)
///
/// The two shapes are tried in turn, each straight from `body`, so the
/// payload is never staged in an intermediate buffer.
pub fn decode_response(body: &[u8]) -> Result<Response> {
    if let Ok(ErrorEnvelope { error }) = serde_json::from_slice::<ErrorEnvelope>(body) {
        return Ok(Response::Error(ServiceError::from_message(&error)));
    }

    let mut envelope: DataEnvelope = serde_json::from_slice(body)
        .map_err(|e| KeywardError::Protocol(format!("malformed response: {}", e)))?;

    let data = transport_decode(&envelope.data)?;
    Ok(Response::Success {
        request_type: RequestType::from_number(&envelope.request_type),
        key_id: KeyId::from(std::mem::take(&mut envelope.key_id)),
        data,
    })
}

fn to_frame(envelope: &DataEnvelope) -> Result<Frame> {
    // Sized up front so serialization does not leave reallocated copies
    let mut body = Zeroizing::new(Vec::with_capacity(
        64 + envelope.key_id.len() + envelope.data.len(),
    ));
    serde_json::to_writer(&mut *body, envelope)?;
    Ok(body)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one length-prefixed frame body
///
/// Blocks until a complete frame is received or an error occurs.
pub fn read_frame<R: Read>(reader: &mut R, max_size: usize) -> Result<Frame> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    reader.read_exact(&mut prefix)?;

    let len = u32::from_be_bytes(prefix) as usize;
    if len > max_size {
        return Err(KeywardError::FrameTooLarge { len, max: max_size });
    }

    let mut body = Zeroizing::new(vec![0u8; len]);
    if len > 0 {
        reader.read_exact(&mut body)?;
    }

    Ok(body)
}

/// Write one length-prefixed frame body
///
/// Prefix and body go out in a single write from a buffer that is erased
/// afterwards; pass an unbuffered writer so no other copy is kept.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> Result<()> {
    let len = u32::try_from(body.len()).map_err(|_| KeywardError::FrameTooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = Zeroizing::new(Vec::with_capacity(LENGTH_PREFIX_SIZE + body.len()));
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(body);

    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}
