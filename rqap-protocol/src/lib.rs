//! # rqap-protocol
//!
//! Wire codec for QAP1, the binary protocol spoken by Rserve-compatible
//! R compute servers.
//!
//! This crate provides:
//! - The typed [`Sexp`] tree and a [`DataFrame`] builder
//! - Message and item framing, including the attribute and
//!   large-length header modifiers
//! - A decoder for the connection handshake and reply bodies
//! - An encoder for eval / void-eval / set-variable commands, with
//!   integer-range promotion
//! - Mapping of server error codes to named kinds
//!
//! The codec is pure: it operates on byte buffers and holds no I/O or
//! connection state. Transport lives in `rqap-client`.

pub mod decode;
pub mod encode;
pub mod error;
pub mod frame;
pub mod message;
pub mod sexp;

pub use decode::{decode_reply_body, parse_handshake};
pub use encode::{encode_message, encode_sexp_item};
pub use error::{ProtocolError, ServerErrorKind};
pub use frame::{parse_ack, Ack, ItemHeader, MessageHeader, ReplyHeader};
pub use message::Command;
pub use sexp::{DataFrame, Sexp};

/// ASCII banner beginning the 32-byte connection handshake.
pub const PROTOCOL_BANNER: &[u8; 4] = b"Rsrv";

/// Size of the connection handshake block in bytes.
pub const HANDSHAKE_SIZE: usize = 32;

/// Default port for Rserve-compatible servers.
pub const DEFAULT_PORT: u16 = 6311;
