//! Handshake and reply-body parsing.
//!
//! A reply body is a sequence of top-level items, each with a `DT_*`
//! header; `DT_SEXP` items carry the typed tree. Parsing is strict
//! about length accounting: every payload must be consumed exactly,
//! and any disagreement surfaces as a desync error rather than a
//! silently resynchronised stream.

use crate::error::ProtocolError;
use crate::frame::{self, Cursor, ItemHeader};
use crate::sexp::{self, Sexp};
use crate::{HANDSHAKE_SIZE, PROTOCOL_BANNER};

/// Validates the 32-byte connection handshake.
///
/// Only the 4-byte ASCII banner is checked; the remaining bytes carry
/// the server version, protocol name and capability flags, none of
/// which this codec interprets.
pub fn parse_handshake(block: &[u8; HANDSHAKE_SIZE]) -> Result<(), ProtocolError> {
    let banner: [u8; 4] = block[..4].try_into().expect("slice length is fixed");
    if &banner != PROTOCOL_BANNER {
        return Err(ProtocolError::BadHandshake(banner));
    }
    Ok(())
}

/// Parses a complete reply body into a SEXP tree.
///
/// A body holding exactly one top-level item yields that item
/// unwrapped; zero or several items yield a [`Sexp::Vector`].
pub fn decode_reply_body(body: &[u8]) -> Result<Sexp, ProtocolError> {
    let mut cur = Cursor::new(body);
    let mut items = Vec::new();
    while cur.remaining() > 0 {
        items.push(parse_body_item(&mut cur)?);
    }
    if items.len() == 1 {
        return Ok(items.swap_remove(0));
    }
    Ok(Sexp::Vector(items))
}

/// Parses one top-level body item (outer `DT_*` header).
fn parse_body_item(cur: &mut Cursor<'_>) -> Result<Sexp, ProtocolError> {
    let header = ItemHeader::read(cur)?;
    let mut ty = header.ty;
    let mut len = u64::from(header.len);
    if ty & frame::DT_LARGE != 0 {
        let extra = cur.get_u32_le()?;
        len = frame::extend_len(len, extra);
        ty &= !frame::DT_LARGE;
    }

    let payload = take_len(cur, len)?;
    if ty == frame::DT_SEXP {
        let mut inner = Cursor::new(payload);
        let value = parse_sexp(&mut inner)?;
        if inner.remaining() > 0 {
            return Err(ProtocolError::LengthMismatch {
                context: "DT_SEXP item",
                declared: len,
                consumed: len - inner.remaining() as u64,
            });
        }
        Ok(value)
    } else {
        Ok(Sexp::Unimplemented(ty, payload.to_vec()))
    }
}

/// Parses one SEXP item (header plus payload).
fn parse_sexp(cur: &mut Cursor<'_>) -> Result<Sexp, ProtocolError> {
    let header = ItemHeader::read(cur)?;
    parse_sexp_body(cur, header.ty, u64::from(header.len))
}

/// Parses a SEXP payload given its (possibly still flagged) type byte
/// and length. The attribute flag is handled before the large flag;
/// each pass clears one flag and re-enters.
fn parse_sexp_body(cur: &mut Cursor<'_>, ty: u8, len: u64) -> Result<Sexp, ProtocolError> {
    if ty & sexp::XT_HAS_ATTR != 0 {
        let before = cur.remaining();
        let attr = parse_sexp(cur)?;
        let attr_size = (before - cur.remaining()) as u64;
        let rest = len
            .checked_sub(attr_size)
            .ok_or(ProtocolError::AttrOverrun {
                attr_size,
                declared: len,
            })?;
        let value = parse_sexp_body(cur, ty & !sexp::XT_HAS_ATTR, rest)?;
        return Ok(Sexp::HasAttr {
            attr: Box::new(attr),
            value: Box::new(value),
        });
    }

    if ty & sexp::XT_LARGE != 0 {
        let extra = cur.get_u32_le()?;
        return parse_sexp_body(cur, ty & !sexp::XT_LARGE, frame::extend_len(len, extra));
    }

    let payload = take_len(cur, len)?;
    parse_payload(ty, payload)
}

/// Parses an unflagged SEXP payload. The slice is exactly the declared
/// payload; every parser must account for all of it.
fn parse_payload(ty: u8, payload: &[u8]) -> Result<Sexp, ProtocolError> {
    match ty {
        sexp::XT_NULL => {
            if !payload.is_empty() {
                return Err(ProtocolError::LengthMismatch {
                    context: "XT_NULL",
                    declared: payload.len() as u64,
                    consumed: 0,
                });
            }
            Ok(Sexp::Null)
        }
        sexp::XT_STR => Ok(Sexp::Str(parse_single_string(payload)?)),
        sexp::XT_SYMNAME => Ok(Sexp::Str(parse_single_string(payload)?)),
        sexp::XT_ARRAY_STR => Ok(Sexp::ArrayStr(parse_str_array(payload)?)),
        sexp::XT_ARRAY_INT => parse_int_array(payload),
        sexp::XT_ARRAY_DOUBLE => parse_double_array(payload),
        sexp::XT_ARRAY_BOOL => parse_bool_array(payload),
        sexp::XT_VECTOR | sexp::XT_VECTOR_EXP | sexp::XT_LIST_NOTAG | sexp::XT_LANG_NOTAG => {
            let mut cur = Cursor::new(payload);
            let mut items = Vec::new();
            while cur.remaining() > 0 {
                items.push(parse_sexp(&mut cur)?);
            }
            Ok(Sexp::Vector(items))
        }
        sexp::XT_LIST_TAG | sexp::XT_LANG_TAG => {
            let mut cur = Cursor::new(payload);
            let mut pairs = Vec::new();
            while cur.remaining() > 0 {
                // wire order: value first, then the tag naming it
                let value = parse_sexp(&mut cur)?;
                let key = parse_sexp(&mut cur)?;
                pairs.push((key, value));
            }
            Ok(Sexp::ListTag(pairs))
        }
        sexp::XT_CLOS => Ok(Sexp::Closure(payload.to_vec())),
        other => Ok(Sexp::Unimplemented(other, payload.to_vec())),
    }
}

/// `XT_STR` / `XT_SYMNAME`: a single-element string array. NA or a
/// missing element collapses to the empty string.
fn parse_single_string(payload: &[u8]) -> Result<String, ProtocolError> {
    let mut items = parse_str_array(payload)?;
    let result = items.drain(..).next().flatten().unwrap_or_default();
    Ok(result)
}

/// Splits a string-array payload into elements.
///
/// The payload is NUL-terminated strings padded to a 4-byte multiple
/// with trailing `0x01` bytes. Tokens keep their order; a single-byte
/// `0xFF` token is NA, and leading `0x01` escape bytes are stripped.
fn parse_str_array(payload: &[u8]) -> Result<Vec<Option<String>>, ProtocolError> {
    let mut end = payload.len();
    while end > 0 && payload[end - 1] == 0x01 {
        end -= 1;
    }

    let mut tokens: Vec<&[u8]> = payload[..end].split(|b| *b == 0).collect();
    if tokens.last().is_some_and(|t| t.is_empty()) {
        tokens.pop();
    }

    tokens
        .into_iter()
        .map(|token| {
            let mut start = 0;
            while start < token.len() && token[start] == 0x01 {
                start += 1;
            }
            let token = &token[start..];
            if token == [sexp::NA_STRING_BYTE] {
                Ok(None)
            } else {
                String::from_utf8(token.to_vec())
                    .map(Some)
                    .map_err(|_| ProtocolError::InvalidUtf8)
            }
        })
        .collect()
}

fn parse_int_array(payload: &[u8]) -> Result<Sexp, ProtocolError> {
    if payload.len() % 4 != 0 {
        return Err(ProtocolError::LengthMismatch {
            context: "XT_ARRAY_INT",
            declared: payload.len() as u64,
            consumed: (payload.len() - payload.len() % 4) as u64,
        });
    }
    let items = payload
        .chunks_exact(4)
        .map(|chunk| {
            let value = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if value == sexp::NA_INT {
                None
            } else {
                Some(i64::from(value))
            }
        })
        .collect();
    Ok(Sexp::ArrayInt(items))
}

fn parse_double_array(payload: &[u8]) -> Result<Sexp, ProtocolError> {
    if payload.len() % 8 != 0 {
        return Err(ProtocolError::LengthMismatch {
            context: "XT_ARRAY_DOUBLE",
            declared: payload.len() as u64,
            consumed: (payload.len() - payload.len() % 8) as u64,
        });
    }
    let items = payload
        .chunks_exact(8)
        .map(|chunk| {
            let raw: [u8; 8] = chunk.try_into().expect("chunk length is fixed");
            decode_double(frame::double_bits_from_wire(raw))
        })
        .collect();
    Ok(Sexp::ArrayDouble(items))
}

/// Classifies a double bit pattern: NA sentinel, infinity, NaN, or an
/// ordinary finite value.
fn decode_double(bits: u64) -> Option<f64> {
    let exponent = (bits >> 52) & 0x7FF;
    if exponent != 0x7FF {
        return Some(f64::from_bits(bits));
    }
    let mantissa = bits & 0x000F_FFFF_FFFF_FFFF;
    let negative = bits >> 63 != 0;
    match mantissa {
        0 if negative => Some(f64::NEG_INFINITY),
        0 => Some(f64::INFINITY),
        0x7A2 => None,
        _ => Some(f64::NAN),
    }
}

fn parse_bool_array(payload: &[u8]) -> Result<Sexp, ProtocolError> {
    let mut cur = Cursor::new(payload);
    let count = cur.get_u32_le()? as usize;
    let flags = cur.take(count)?;
    let items = flags
        .iter()
        .map(|flag| match flag {
            0 => Some(false),
            1 => Some(true),
            // 2 is the NA sentinel; 3 is an alternate NA seen on the
            // wire. Anything else is treated as NA as well.
            _ => None,
        })
        .collect();
    // trailing bytes are alignment padding
    Ok(Sexp::ArrayBool(items))
}

/// Converts a wire length to a cursor take, surfacing truncation.
fn take_len<'a>(cur: &mut Cursor<'a>, len: u64) -> Result<&'a [u8], ProtocolError> {
    match usize::try_from(len) {
        Ok(n) => cur.take(n),
        Err(_) => Err(ProtocolError::Truncated {
            needed: usize::MAX,
        }),
    }
}
