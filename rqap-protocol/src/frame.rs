//! QAP1 message envelope and item headers.
//!
//! Outbound message layout (16-byte header + body):
//!
//! ```text
//! +--------+--------+--------+-----------+--------+
//! | cmd    | length | offset | length_hi | body   |
//! | u32le  | u32le  | u32le  | u32le     | ...    |
//! +--------+--------+--------+-----------+--------+
//! ```
//!
//! `offset` and `length_hi` are always zero on send; only the 32-bit
//! length form is emitted.
//!
//! A reply starts with a 4-byte acknowledgement word. On success
//! ([`RESP_OK`]) a 12-byte secondary header follows carrying the body
//! length; otherwise the fourth ack byte is the server error code and
//! the rest of the stream is an opaque message tail.
//!
//! Within a body, every item is a one-byte type followed by a 24-bit
//! little-endian payload length. The type byte carries the `DT_LARGE` /
//! `XT_LARGE` and `XT_HAS_ATTR` modifier bits.

use crate::error::ProtocolError;
use bytes::{BufMut, BytesMut};

/// Command code for `CMD_voidEval`: evaluate, discard the result.
pub const CMD_VOID_EVAL: u32 = 0x002;

/// Command code for `CMD_eval`: evaluate and return the result SEXP.
pub const CMD_EVAL: u32 = 0x003;

/// Command code for `CMD_setSEXP`: bind a value to a variable name.
pub const CMD_SET_SEXP: u32 = 0x020;

/// Response bit set on every acknowledgement word.
pub const CMD_RESP: u32 = 0x1_0000;

/// Acknowledgement word for a successful reply.
pub const RESP_OK: u32 = CMD_RESP | 0x0001;

/// Acknowledgement word base for a failed reply. The server error code
/// occupies the top byte of the word.
pub const RESP_ERR: u32 = CMD_RESP | 0x0002;

/// Body item carrying a NUL-terminated string.
pub const DT_STRING: u8 = 4;

/// Body item carrying an encoded SEXP.
pub const DT_SEXP: u8 = 10;

/// Large-length modifier bit on a body item type byte.
pub const DT_LARGE: u8 = 64;

/// Size of the fixed outbound message header in bytes.
pub const MESSAGE_HEADER_SIZE: usize = 16;

/// Size of the acknowledgement word.
pub const ACK_SIZE: usize = 4;

/// Size of the secondary header following an OK acknowledgement.
pub const REPLY_HEADER_SIZE: usize = 12;

/// Size of an item header (type byte + 24-bit length).
pub const ITEM_HEADER_SIZE: usize = 4;

/// Largest payload expressible in the 24-bit short length form. The
/// encoder never emits the large form, so this bounds every sent item.
pub const MAX_ITEM_PAYLOAD: usize = (1 << 24) - 1;

/// Fixed header of an outbound command message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Command code (`CMD_*`).
    pub cmd: u32,
    /// Body length in bytes.
    pub len: u32,
}

impl MessageHeader {
    pub fn new(cmd: u32, len: u32) -> Self {
        Self { cmd, len }
    }

    /// Encodes the 16-byte header. `offset` and `length_hi` are zero.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.cmd);
        buf.put_u32_le(self.len);
        buf.put_u32_le(0);
        buf.put_u32_le(0);
    }
}

/// Outcome of the acknowledgement word that starts every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The request succeeded; a secondary header and body follow.
    Ok,
    /// The request failed with the given server error code.
    Err(u8),
}

/// Dispatches on the 4-byte acknowledgement word.
///
/// Anything other than [`RESP_OK`] is an error acknowledgement shaped
/// `0x02 0x00 0x01 code` on the wire; the code is the fourth byte.
pub fn parse_ack(word: [u8; 4]) -> Ack {
    if u32::from_le_bytes(word) == RESP_OK {
        Ack::Ok
    } else {
        Ack::Err(word[3])
    }
}

/// The 12-byte secondary header following an OK acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub len_lo: u32,
    pub offset: u32,
    pub len_hi: u32,
}

impl ReplyHeader {
    pub fn parse(bytes: [u8; REPLY_HEADER_SIZE]) -> Self {
        Self {
            len_lo: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            offset: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            len_hi: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }

    /// Total body length. The high word is shifted by 31 bits, matching
    /// the wire format as deployed (not the 32 an even split would use).
    pub fn body_len(&self) -> u64 {
        u64::from(self.len_lo) + (u64::from(self.len_hi) << 31)
    }
}

/// One-byte type plus 24-bit little-endian payload length.
///
/// `len` holds only the short 24-bit portion; when the type byte carries
/// a large-length modifier, the caller reads the 32-bit extension word
/// and combines it via [`extend_len`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemHeader {
    pub ty: u8,
    pub len: u32,
}

impl ItemHeader {
    /// Reads an item header from the cursor.
    pub fn read(cur: &mut Cursor<'_>) -> Result<Self, ProtocolError> {
        let bytes = cur.take(ITEM_HEADER_SIZE)?;
        Ok(Self {
            ty: bytes[0],
            len: u32::from_le_bytes([bytes[1], bytes[2], bytes[3], 0]),
        })
    }

    /// Writes an item header in the 24-bit short form.
    ///
    /// Fails with `PayloadTooLarge` when `len` does not fit; the large
    /// form is never emitted.
    pub fn write(ty: u8, len: usize, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        if len > MAX_ITEM_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                size: len,
                max: MAX_ITEM_PAYLOAD,
            });
        }
        buf.put_u8(ty);
        buf.put_u8(len as u8);
        buf.put_u8((len >> 8) as u8);
        buf.put_u8((len >> 16) as u8);
        Ok(())
    }
}

/// Combines a 24-bit short length with its 32-bit extension word.
///
/// The extension is shifted by 23 bits, matching the wire format as
/// deployed; the top bit of the short form overlaps the extension.
pub fn extend_len(short: u64, extra: u32) -> u64 {
    short | (u64::from(extra) << 23)
}

/// Checked reader over a reply body. All reads are bounds-checked; a
/// short read surfaces as `Truncated` rather than a panic.
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left to consume.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consumes exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if n > self.remaining() {
            return Err(ProtocolError::Truncated {
                needed: n - self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u32_le(&mut self) -> Result<u32, ProtocolError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn get_i32_le(&mut self) -> Result<i32, ProtocolError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Recovers the IEEE-754 bit pattern of a double from its wire bytes.
///
/// Doubles arrive in the reverse of the order a native little-endian
/// read expects: the eight bytes are flipped before being interpreted
/// as a big-endian word. Sending takes the plain little-endian path in
/// the encoder; only receive reverses.
pub fn double_bits_from_wire(raw: [u8; 8]) -> u64 {
    let mut rev = raw;
    rev.reverse();
    u64::from_be_bytes(rev)
}
