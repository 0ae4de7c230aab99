//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (V1 - Framed JSON)
//!
//! ### Frame Format
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │         JSON body           │
//! └──────────┴─────────────────────────────┘
//! ```
//!
//! ### Request Types
//! - 1: ENCRYPT - wrap `data` under the key named by `key_id`
//! - 2: DECRYPT - unwrap `data` under the key named by `key_id`
//!
//! ### Error Messages
//! - "Key not added", "Key or Data Error", "Encrypt Error",
//!   "Decrypt Error", "Request Type Error", "Unrecognized response",
//!   "Missing Data"
//!
//! ### Control Channel
//! Line-oriented text commands, see [`ControlCommand`].

mod request;
mod response;
mod control;
mod codec;

pub use request::{Request, RequestType};
pub use response::Response;
pub use control::ControlCommand;
pub use codec::{
    decode_request, decode_response, encode, encode_error, encode_request, encode_response,
    read_frame, transport_decode, transport_encode, write_frame, Frame, LENGTH_PREFIX_SIZE,
};
