//! Protocol error types and server error codes.

use std::fmt;
use thiserror::Error;

/// Codec-level errors: handshake, desync, and encoder-side limits.
///
/// None of these are recoverable for the connection; after any decode
/// failure the stream position is unspecified and the socket should be
/// closed by the caller.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("bad handshake: expected banner \"Rsrv\", got {0:?}")]
    BadHandshake([u8; 4]),

    #[error("truncated reply: need {needed} more bytes")]
    Truncated { needed: usize },

    #[error("length mismatch in {context}: declared {declared} bytes, consumed {consumed}")]
    LengthMismatch {
        context: &'static str,
        declared: u64,
        consumed: u64,
    },

    #[error("attribute item ({attr_size} bytes) overruns its enclosing item ({declared} bytes)")]
    AttrOverrun { attr_size: u64, declared: u64 },

    #[error("item payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("invalid UTF-8 in string payload")]
    InvalidUtf8,

    #[error("data frame column {name:?} has length {len}, expected {expected}")]
    ColumnLength {
        name: String,
        len: usize,
        expected: usize,
    },

    #[error("data frame column {name:?} is not an array value")]
    ColumnNotArray { name: String },
}

/// `ERR_auth_failed`: authentication rejected.
pub const ERR_AUTH_FAILED: u8 = 0x41;
/// `ERR_conn_broken`: connection closed or broken during an operation.
pub const ERR_CONN_BROKEN: u8 = 0x42;
/// `ERR_inv_cmd`: invalid command.
pub const ERR_INV_CMD: u8 = 0x43;
/// `ERR_inv_par`: invalid parameters.
pub const ERR_INV_PAR: u8 = 0x44;
/// `ERR_Rerror`: the R interpreter raised an error.
pub const ERR_R_ERROR: u8 = 0x45;
/// `ERR_IOerror`: server-side I/O error.
pub const ERR_IO_ERROR: u8 = 0x46;
/// `ERR_notOpen`: file operation attempted with no open file.
pub const ERR_NOT_OPEN: u8 = 0x47;
/// `ERR_accessDenied`: server denied access to the resource.
pub const ERR_ACCESS_DENIED: u8 = 0x48;
/// `ERR_unsupportedCmd`: command not supported by this server.
pub const ERR_UNSUPPORTED_CMD: u8 = 0x49;
/// `ERR_unknownCmd`: command unknown to this server.
pub const ERR_UNKNOWN_CMD: u8 = 0x4a;
/// `ERR_data_overflow`: incoming parameters exceeded server limits.
pub const ERR_DATA_OVERFLOW: u8 = 0x4b;
/// `ERR_object_too_big`: requested object exceeds transport limits.
pub const ERR_OBJECT_TOO_BIG: u8 = 0x4c;
/// `ERR_out_of_mem`: server ran out of memory.
pub const ERR_OUT_OF_MEM: u8 = 0x4d;
/// `ERR_ctrl_closed`: control pipe to the master process is closed.
pub const ERR_CTRL_CLOSED: u8 = 0x4e;
/// `ERR_session_busy`: session still busy with a previous command.
pub const ERR_SESSION_BUSY: u8 = 0x50;
/// `ERR_detach_failed`: unable to detach the session.
pub const ERR_DETACH_FAILED: u8 = 0x51;

/// Server-reported error kinds, mapped from the single-byte code in the
/// acknowledgement word.
///
/// The mapping is total: codes outside the known set map to
/// [`ServerErrorKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerErrorKind {
    AuthFailed,
    ConnectionBroken,
    InvalidCommand,
    InvalidParameters,
    RErrorOccurred,
    IoError,
    FileNotOpen,
    AccessDenied,
    UnsupportedCommand,
    UnknownCommand,
    DataOverflow,
    ObjectTooBig,
    OutOfMemory,
    ControlPipeClosed,
    SessionBusy,
    UnableToDetachSession,
    Unknown(u8),
}

impl ServerErrorKind {
    /// Maps a wire error code to its kind.
    pub fn from_code(code: u8) -> Self {
        match code {
            ERR_AUTH_FAILED => ServerErrorKind::AuthFailed,
            ERR_CONN_BROKEN => ServerErrorKind::ConnectionBroken,
            ERR_INV_CMD => ServerErrorKind::InvalidCommand,
            ERR_INV_PAR => ServerErrorKind::InvalidParameters,
            ERR_R_ERROR => ServerErrorKind::RErrorOccurred,
            ERR_IO_ERROR => ServerErrorKind::IoError,
            ERR_NOT_OPEN => ServerErrorKind::FileNotOpen,
            ERR_ACCESS_DENIED => ServerErrorKind::AccessDenied,
            ERR_UNSUPPORTED_CMD => ServerErrorKind::UnsupportedCommand,
            ERR_UNKNOWN_CMD => ServerErrorKind::UnknownCommand,
            ERR_DATA_OVERFLOW => ServerErrorKind::DataOverflow,
            ERR_OBJECT_TOO_BIG => ServerErrorKind::ObjectTooBig,
            ERR_OUT_OF_MEM => ServerErrorKind::OutOfMemory,
            ERR_CTRL_CLOSED => ServerErrorKind::ControlPipeClosed,
            ERR_SESSION_BUSY => ServerErrorKind::SessionBusy,
            ERR_DETACH_FAILED => ServerErrorKind::UnableToDetachSession,
            other => ServerErrorKind::Unknown(other),
        }
    }

    /// The wire code this kind maps back to.
    pub fn code(&self) -> u8 {
        match self {
            ServerErrorKind::AuthFailed => ERR_AUTH_FAILED,
            ServerErrorKind::ConnectionBroken => ERR_CONN_BROKEN,
            ServerErrorKind::InvalidCommand => ERR_INV_CMD,
            ServerErrorKind::InvalidParameters => ERR_INV_PAR,
            ServerErrorKind::RErrorOccurred => ERR_R_ERROR,
            ServerErrorKind::IoError => ERR_IO_ERROR,
            ServerErrorKind::FileNotOpen => ERR_NOT_OPEN,
            ServerErrorKind::AccessDenied => ERR_ACCESS_DENIED,
            ServerErrorKind::UnsupportedCommand => ERR_UNSUPPORTED_CMD,
            ServerErrorKind::UnknownCommand => ERR_UNKNOWN_CMD,
            ServerErrorKind::DataOverflow => ERR_DATA_OVERFLOW,
            ServerErrorKind::ObjectTooBig => ERR_OBJECT_TOO_BIG,
            ServerErrorKind::OutOfMemory => ERR_OUT_OF_MEM,
            ServerErrorKind::ControlPipeClosed => ERR_CTRL_CLOSED,
            ServerErrorKind::SessionBusy => ERR_SESSION_BUSY,
            ServerErrorKind::UnableToDetachSession => ERR_DETACH_FAILED,
            ServerErrorKind::Unknown(code) => *code,
        }
    }

    /// Returns whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServerErrorKind::SessionBusy)
    }
}

impl fmt::Display for ServerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerErrorKind::AuthFailed => write!(f, "authentication failed"),
            ServerErrorKind::ConnectionBroken => write!(f, "connection broken"),
            ServerErrorKind::InvalidCommand => write!(f, "invalid command"),
            ServerErrorKind::InvalidParameters => write!(f, "invalid parameters"),
            ServerErrorKind::RErrorOccurred => write!(f, "R evaluation error"),
            ServerErrorKind::IoError => write!(f, "server I/O error"),
            ServerErrorKind::FileNotOpen => write!(f, "file not open"),
            ServerErrorKind::AccessDenied => write!(f, "access denied"),
            ServerErrorKind::UnsupportedCommand => write!(f, "unsupported command"),
            ServerErrorKind::UnknownCommand => write!(f, "unknown command"),
            ServerErrorKind::DataOverflow => write!(f, "data overflow"),
            ServerErrorKind::ObjectTooBig => write!(f, "object too big"),
            ServerErrorKind::OutOfMemory => write!(f, "server out of memory"),
            ServerErrorKind::ControlPipeClosed => write!(f, "control pipe closed"),
            ServerErrorKind::SessionBusy => write!(f, "session busy"),
            ServerErrorKind::UnableToDetachSession => write!(f, "unable to detach session"),
            ServerErrorKind::Unknown(code) => write!(f, "unknown error code {code:#04x}"),
        }
    }
}
