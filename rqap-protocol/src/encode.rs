//! Outbound command framing and SEXP serialisation.
//!
//! Headers are emitted in the 24-bit short length form only; a payload
//! that cannot be expressed that way fails with `PayloadTooLarge`
//! rather than falling back to the large form.

use crate::error::ProtocolError;
use crate::frame::{self, ItemHeader, MessageHeader};
use crate::message::Command;
use crate::sexp::{self, Sexp};
use bytes::{BufMut, BytesMut};

/// Encodes a complete outbound message (16-byte header plus body).
pub fn encode_message(command: &Command) -> Result<BytesMut, ProtocolError> {
    let mut body = BytesMut::new();
    match command {
        Command::Eval(expr) | Command::EvalVoid(expr) => {
            put_string_item(expr, &mut body)?;
        }
        Command::SetVariable { name, value } => {
            put_string_item(name, &mut body)?;
            body.extend_from_slice(&encode_sexp_item(value)?);
        }
    }

    let mut message = BytesMut::with_capacity(frame::MESSAGE_HEADER_SIZE + body.len());
    MessageHeader::new(command.code(), body.len() as u32).encode(&mut message);
    message.extend_from_slice(&body);
    Ok(message)
}

/// Encodes a SEXP as a complete `DT_SEXP` body item.
pub fn encode_sexp_item(value: &Sexp) -> Result<BytesMut, ProtocolError> {
    let mut inner = BytesMut::new();
    encode_sexp(value, &mut inner)?;
    let mut item = BytesMut::with_capacity(frame::ITEM_HEADER_SIZE + inner.len());
    ItemHeader::write(frame::DT_SEXP, inner.len(), &mut item)?;
    item.extend_from_slice(&inner);
    Ok(item)
}

/// Encodes a SEXP (header plus payload) into `buf`.
pub fn encode_sexp(value: &Sexp, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let (ty, payload) = lower_sexp(value)?;
    ItemHeader::write(ty, payload.len(), buf)?;
    buf.extend_from_slice(&payload);
    Ok(())
}

/// A `DT_STRING` item: the text, a terminating NUL, no padding.
fn put_string_item(text: &str, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    ItemHeader::write(frame::DT_STRING, text.len() + 1, buf)?;
    buf.put_slice(text.as_bytes());
    buf.put_u8(0);
    Ok(())
}

/// Lowers a SEXP to its wire type byte and bare payload.
///
/// Returning the pair (rather than writing a header directly) lets the
/// attribute path splice an attribute item in front of the payload
/// under a single combined header.
fn lower_sexp(value: &Sexp) -> Result<(u8, BytesMut), ProtocolError> {
    let mut payload = BytesMut::new();
    let ty = match value {
        Sexp::Null => sexp::XT_NULL,
        // a single string and a symbol share the symname wire type
        Sexp::Str(s) | Sexp::SymName(s) => {
            payload.put_slice(s.as_bytes());
            payload.put_u8(0);
            sexp::XT_SYMNAME
        }
        Sexp::ArrayStr(items) => {
            put_str_array(items, &mut payload);
            sexp::XT_ARRAY_STR
        }
        Sexp::ArrayInt(items) => return lower_int_array(items),
        Sexp::ArrayDouble(items) => {
            for item in items {
                payload.put_u64_le(double_bits(*item));
            }
            sexp::XT_ARRAY_DOUBLE
        }
        Sexp::ArrayBool(items) => {
            put_bool_array(items, &mut payload);
            sexp::XT_ARRAY_BOOL
        }
        Sexp::Vector(children) => {
            for child in children {
                encode_sexp(child, &mut payload)?;
            }
            sexp::XT_VECTOR
        }
        Sexp::ListTag(pairs) => {
            for (key, value) in pairs {
                // wire order: value first, then the tag naming it
                encode_sexp(value, &mut payload)?;
                encode_sexp(key, &mut payload)?;
            }
            sexp::XT_LIST_TAG
        }
        Sexp::Closure(bytes) => {
            payload.put_slice(bytes);
            sexp::XT_CLOS
        }
        Sexp::Unimplemented(ty, bytes) => {
            payload.put_slice(bytes);
            *ty
        }
        Sexp::HasAttr { attr, value } => {
            let mut attr_item = BytesMut::new();
            encode_sexp(attr, &mut attr_item)?;
            let (inner_ty, inner_payload) = lower_sexp(value)?;
            attr_item.extend_from_slice(&inner_payload);
            return Ok((inner_ty | sexp::XT_HAS_ATTR, attr_item));
        }
    };
    Ok((ty, payload))
}

/// IEEE bits for one outbound double. Doubles are sent in plain
/// little-endian order; only receive reverses.
fn double_bits(value: Option<f64>) -> u64 {
    match value {
        Some(v) => v.to_bits(),
        None => sexp::NA_REAL_BITS,
    }
}

fn put_str_array(items: &[Option<String>], payload: &mut BytesMut) {
    for item in items {
        match item {
            Some(s) => payload.put_slice(s.as_bytes()),
            None => payload.put_u8(sexp::NA_STRING_BYTE),
        }
        payload.put_u8(0);
    }
    while payload.len() % 4 != 0 {
        payload.put_u8(0x01);
    }
}

fn put_bool_array(items: &[Option<bool>], payload: &mut BytesMut) {
    payload.put_u32_le(items.len() as u32);
    for item in items {
        payload.put_u8(match item {
            Some(true) => 1,
            Some(false) => 0,
            None => sexp::BOOL_NA,
        });
    }
    // The pad width counts a terminator byte that is never written.
    let pad = (4 - ((items.len() + 1) % 4)) % 4;
    for _ in 0..pad {
        payload.put_u8(0x01);
    }
}

/// The narrowest representation that can carry every element of an
/// integer array, ordered `Int < Double < Str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum IntWidth {
    Int,
    Double,
    Str,
}

/// Classifies one element. `i32::MIN` itself is excluded from the int
/// range because it is the NA sentinel on the wire.
fn classify_int(value: Option<i64>) -> IntWidth {
    match value {
        None => IntWidth::Int,
        Some(x) if x > i64::from(i32::MIN) && x <= i64::from(i32::MAX) => IntWidth::Int,
        Some(x) if x.unsigned_abs() <= 1 << 53 => IntWidth::Double,
        _ => IntWidth::Str,
    }
}

fn promoted_width(items: &[Option<i64>]) -> IntWidth {
    items
        .iter()
        .fold(IntWidth::Int, |acc, item| acc.max(classify_int(*item)))
}

/// Integer arrays are promoted to the least-capable wire type that
/// accommodates every element: 32-bit ints, then doubles (exact up to
/// 2^53), then decimal strings.
fn lower_int_array(items: &[Option<i64>]) -> Result<(u8, BytesMut), ProtocolError> {
    let mut payload = BytesMut::new();
    let ty = match promoted_width(items) {
        IntWidth::Int => {
            for item in items {
                payload.put_i32_le(match item {
                    Some(x) => *x as i32,
                    None => sexp::NA_INT,
                });
            }
            sexp::XT_ARRAY_INT
        }
        IntWidth::Double => {
            for item in items {
                payload.put_u64_le(double_bits(item.map(|x| x as f64)));
            }
            sexp::XT_ARRAY_DOUBLE
        }
        IntWidth::Str => {
            let strings: Vec<Option<String>> = items
                .iter()
                .map(|item| match item {
                    Some(x) => Some(x.to_string()),
                    None => Some("NA".to_string()),
                })
                .collect();
            put_str_array(&strings, &mut payload);
            sexp::XT_ARRAY_STR
        }
    };
    Ok((ty, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_reply_body;
    use crate::frame::{CMD_EVAL, CMD_SET_SEXP, CMD_VOID_EVAL, DT_SEXP, DT_STRING};

    /// Wraps an encoded SEXP item in a reply body and decodes it.
    fn roundtrip(value: &Sexp) -> Sexp {
        let item = encode_sexp_item(value).unwrap();
        decode_reply_body(&item).unwrap()
    }

    #[test]
    fn test_eval_message_layout() {
        let encoded = encode_message(&Command::Eval("c(1,2,3)".into())).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&CMD_EVAL.to_le_bytes());
        expected.extend_from_slice(&13u32.to_le_bytes());
        expected.extend_from_slice(&[0u8; 8]);
        expected.extend_from_slice(&[DT_STRING, 9, 0, 0]);
        expected.extend_from_slice(b"c(1,2,3)\0");
        assert_eq!(&encoded[..], &expected[..]);
    }

    #[test]
    fn test_void_eval_uses_its_own_command() {
        let encoded = encode_message(&Command::EvalVoid("x <- 1".into())).unwrap();
        assert_eq!(&encoded[..4], &CMD_VOID_EVAL.to_le_bytes());
    }

    #[test]
    fn test_set_variable_body_shape() {
        let encoded = encode_message(&Command::SetVariable {
            name: "x".into(),
            value: Sexp::ints([1]),
        })
        .unwrap();
        assert_eq!(&encoded[..4], &CMD_SET_SEXP.to_le_bytes());
        // name item: DT_STRING "x\0"
        assert_eq!(&encoded[16..22], &[DT_STRING, 2, 0, 0, b'x', 0]);
        // value item: DT_SEXP wrapping an int array
        assert_eq!(encoded[22], DT_SEXP);
        assert_eq!(encoded[26], sexp::XT_ARRAY_INT);
    }

    #[test]
    fn test_roundtrip_sendable_sexps() {
        let cases = [
            Sexp::Null,
            Sexp::strings(["a", "bc"]),
            Sexp::ArrayStr(vec![Some("x".into()), None]),
            Sexp::ints([1, -7, 300]),
            Sexp::ArrayInt(vec![Some(5), None]),
            Sexp::doubles([1.0, -2.5]),
            Sexp::ArrayDouble(vec![Some(f64::INFINITY), None, Some(0.0)]),
            Sexp::bools([true, false]),
            Sexp::ArrayBool(vec![None, Some(true)]),
            Sexp::Vector(vec![Sexp::ints([1]), Sexp::strings(["z"])]),
            Sexp::ListTag(vec![(Sexp::Str("k".into()), Sexp::doubles([9.0]))]),
        ];
        for case in cases {
            assert_eq!(roundtrip(&case), case);
        }
    }

    #[test]
    fn test_str_and_symname_normalise_to_str() {
        assert_eq!(roundtrip(&Sexp::Str("abc".into())), Sexp::Str("abc".into()));
        assert_eq!(
            roundtrip(&Sexp::SymName("abc".into())),
            Sexp::Str("abc".into())
        );
    }

    #[test]
    fn test_double_na_survives_roundtrip_as_na() {
        let decoded = roundtrip(&Sexp::ArrayDouble(vec![None, Some(f64::NAN)]));
        let Sexp::ArrayDouble(items) = decoded else {
            panic!("expected double array");
        };
        assert_eq!(items[0], None);
        assert!(items[1].is_some_and(f64::is_nan));
    }

    #[test]
    fn test_str_array_payload_is_aligned() {
        for items in [
            vec![Some("a".into())],
            vec![Some("abc".into())],
            vec![Some("abcd".into()), None],
            vec![],
        ] {
            let (ty, payload) = lower_sexp(&Sexp::ArrayStr(items)).unwrap();
            assert_eq!(ty, sexp::XT_ARRAY_STR);
            assert_eq!(payload.len() % 4, 0);
        }
    }

    #[test]
    fn test_empty_string_element_padding() {
        let (_, payload) = lower_sexp(&Sexp::ArrayStr(vec![Some(String::new())])).unwrap();
        assert_eq!(&payload[..], &[0x00, 0x01, 0x01, 0x01]);
    }

    #[test]
    fn test_na_string_encoding() {
        let (_, payload) = lower_sexp(&Sexp::ArrayStr(vec![None])).unwrap();
        assert_eq!(&payload[..], &[0xFF, 0x00, 0x01, 0x01]);
    }

    #[test]
    fn test_empty_bool_array_padding() {
        let (_, payload) = lower_sexp(&Sexp::ArrayBool(vec![])).unwrap();
        assert_eq!(&payload[..], &[0, 0, 0, 0, 0x01, 0x01, 0x01]);
    }

    #[test]
    fn test_bool_encoding() {
        let (_, payload) =
            lower_sexp(&Sexp::ArrayBool(vec![Some(true), Some(false), None])).unwrap();
        assert_eq!(&payload[..4], &3u32.to_le_bytes());
        assert_eq!(&payload[4..7], &[1, 0, sexp::BOOL_NA]);
    }

    #[test]
    fn test_promotion_all_na_stays_int() {
        let (ty, _) = lower_sexp(&Sexp::ArrayInt(vec![None, None])).unwrap();
        assert_eq!(ty, sexp::XT_ARRAY_INT);
    }

    #[test]
    fn test_promotion_int_min_is_not_an_int() {
        // the sentinel value itself must not be emitted as a plain int
        let (ty, _) = lower_sexp(&Sexp::ArrayInt(vec![Some(i64::from(i32::MIN))])).unwrap();
        assert_eq!(ty, sexp::XT_ARRAY_DOUBLE);
    }

    #[test]
    fn test_promotion_to_double() {
        let value = Sexp::ArrayInt(vec![Some(1), None, Some(1 << 40)]);
        let (ty, payload) = lower_sexp(&value).unwrap();
        assert_eq!(ty, sexp::XT_ARRAY_DOUBLE);
        assert_eq!(payload.len(), 24);
        assert_eq!(
            roundtrip(&value),
            Sexp::ArrayDouble(vec![Some(1.0), None, Some((1u64 << 40) as f64)])
        );
    }

    #[test]
    fn test_promotion_to_strings() {
        let value = Sexp::ArrayInt(vec![Some(1 << 60), None]);
        let (ty, _) = lower_sexp(&value).unwrap();
        assert_eq!(ty, sexp::XT_ARRAY_STR);
        assert_eq!(
            roundtrip(&value),
            Sexp::strings([(1i64 << 60).to_string(), "NA".to_string()])
        );
    }

    #[test]
    fn test_promotion_is_monotone() {
        let small = vec![Some(1), Some(2)];
        let mut wider = small.clone();
        wider.push(Some(1 << 40));
        let mut widest = wider.clone();
        widest.push(Some(1 << 60));

        assert!(promoted_width(&small) <= promoted_width(&wider));
        assert!(promoted_width(&wider) <= promoted_width(&widest));
        assert_eq!(promoted_width(&small), IntWidth::Int);
        assert_eq!(promoted_width(&wider), IntWidth::Double);
        assert_eq!(promoted_width(&widest), IntWidth::Str);
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let value = Sexp::Closure(vec![0u8; frame::MAX_ITEM_PAYLOAD + 1]);
        assert!(matches!(
            encode_sexp_item(&value),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_data_frame_wire_shape() {
        let df = crate::sexp::DataFrame::new()
            .with_column("Letters", Sexp::strings(["a", "b"]))
            .with_column("Numbers", Sexp::ints([1, 3]));
        let value = df.into_sexp().unwrap();
        let (ty, payload) = lower_sexp(&value).unwrap();

        assert_eq!(ty, sexp::XT_VECTOR | sexp::XT_HAS_ATTR);
        // attribute list item (86 bytes) followed by the column payload
        // without a header of its own (20 bytes)
        assert_eq!(payload.len(), 106);
        assert_eq!(payload[0], sexp::XT_LIST_TAG);

        let decoded = roundtrip(&value);
        let Sexp::HasAttr { attr, value } = decoded else {
            panic!("expected attribute wrapper");
        };
        assert_eq!(
            *attr,
            Sexp::ListTag(vec![
                (
                    Sexp::Str("names".into()),
                    Sexp::strings(["Letters", "Numbers"])
                ),
                (Sexp::Str("row.names".into()), Sexp::ints([1, 2])),
                (Sexp::Str("class".into()), Sexp::strings(["data.frame"])),
            ])
        );
        assert_eq!(
            *value,
            Sexp::Vector(vec![Sexp::strings(["a", "b"]), Sexp::ints([1, 3])])
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let df = crate::sexp::DataFrame::new()
            .with_column("x", Sexp::doubles([1.0, 2.0]))
            .into_sexp()
            .unwrap();
        assert_eq!(encode_sexp_item(&df).unwrap(), encode_sexp_item(&df).unwrap());
    }
}
