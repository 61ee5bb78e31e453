//! Typed in-memory representation of R values (SEXPs).
//!
//! Every NA-bearing array stores elements as `Option<T>` with `None`
//! standing for NA. Doubles keep NA distinct from NaN: `None` is NA,
//! `Some(f64::NAN)` is an ordinary NaN.

use crate::error::ProtocolError;

/// `XT_NULL`: the R NULL value.
pub const XT_NULL: u8 = 0;
/// `XT_STR`: single string.
pub const XT_STR: u8 = 3;
/// `XT_VECTOR`: generic vector of SEXPs.
pub const XT_VECTOR: u8 = 16;
/// `XT_CLOS`: closure, carried as an opaque blob.
pub const XT_CLOS: u8 = 18;
/// `XT_SYMNAME`: symbol name.
pub const XT_SYMNAME: u8 = 19;
/// `XT_LIST_NOTAG`: untagged pairlist.
pub const XT_LIST_NOTAG: u8 = 20;
/// `XT_LIST_TAG`: tagged pairlist; on the wire each pair is value, then tag.
pub const XT_LIST_TAG: u8 = 21;
/// `XT_LANG_NOTAG`: untagged language object.
pub const XT_LANG_NOTAG: u8 = 22;
/// `XT_LANG_TAG`: tagged language object.
pub const XT_LANG_TAG: u8 = 23;
/// `XT_VECTOR_EXP`: expression vector.
pub const XT_VECTOR_EXP: u8 = 26;
/// `XT_ARRAY_INT`: array of 32-bit integers.
pub const XT_ARRAY_INT: u8 = 32;
/// `XT_ARRAY_DOUBLE`: array of doubles.
pub const XT_ARRAY_DOUBLE: u8 = 33;
/// `XT_ARRAY_STR`: array of NUL-terminated strings, padded to 4 bytes.
pub const XT_ARRAY_STR: u8 = 34;
/// `XT_ARRAY_BOOL`: array of booleans prefixed with a 32-bit count.
pub const XT_ARRAY_BOOL: u8 = 36;
/// Large-length modifier bit on a SEXP type byte.
pub const XT_LARGE: u8 = 64;
/// Attribute modifier bit: an attribute SEXP precedes the payload.
pub const XT_HAS_ATTR: u8 = 128;

/// NA sentinel for 32-bit integers on the wire.
pub const NA_INT: i32 = i32::MIN;

/// IEEE-754 bit pattern of the R NA double: sign 0, exponent 0x7FF,
/// mantissa 0x7A2. Any other NaN mantissa is an ordinary NaN.
pub const NA_REAL_BITS: u64 = 0x7FF0_0000_0000_07A2;

/// A string-array token of this single byte is NA.
pub const NA_STRING_BYTE: u8 = 0xFF;

/// Boolean NA sentinel emitted on send.
pub const BOOL_NA: u8 = 2;

/// Alternate boolean NA sentinel accepted on receive only.
pub const BOOL_NA_ALT: u8 = 3;

/// An R value as carried by the wire protocol.
///
/// Inbound trees are owned by the caller after decode; outbound trees
/// are borrowed by the encoder. `Unimplemented` keeps the variant set
/// total: unrecognised wire types round-trip as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexp {
    /// The R NULL value.
    Null,
    /// A single string.
    Str(String),
    /// A symbol name. Sent identically to `Str`; see the encoder.
    SymName(String),
    /// Strings with NA holes.
    ArrayStr(Vec<Option<String>>),
    /// Integers with NA holes. Elements are `i64` so that values beyond
    /// the server's 32-bit range can be carried into the encoder's
    /// promotion pass; the decoder only ever produces 32-bit values.
    ArrayInt(Vec<Option<i64>>),
    /// Doubles with NA holes. Infinities and NaN are ordinary `Some`
    /// values; `None` is NA.
    ArrayDouble(Vec<Option<f64>>),
    /// Booleans with NA holes.
    ArrayBool(Vec<Option<bool>>),
    /// An ordered sequence of values.
    Vector(Vec<Sexp>),
    /// A tagged list of `(key, value)` pairs. On the wire each pair is
    /// encoded value first, then key.
    ListTag(Vec<(Sexp, Sexp)>),
    /// An R closure, passed through as opaque bytes.
    Closure(Vec<u8>),
    /// Any wire type this codec does not interpret.
    Unimplemented(u8, Vec<u8>),
    /// A value wrapped with an attribute SEXP (names, class, ...).
    HasAttr { attr: Box<Sexp>, value: Box<Sexp> },
}

impl Sexp {
    /// Builds an `ArrayStr` with no NA holes.
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Sexp::ArrayStr(items.into_iter().map(|s| Some(s.into())).collect())
    }

    /// Builds an `ArrayInt` with no NA holes.
    pub fn ints<I: IntoIterator<Item = i64>>(items: I) -> Self {
        Sexp::ArrayInt(items.into_iter().map(Some).collect())
    }

    /// Builds an `ArrayDouble` with no NA holes.
    pub fn doubles<I: IntoIterator<Item = f64>>(items: I) -> Self {
        Sexp::ArrayDouble(items.into_iter().map(Some).collect())
    }

    /// Builds an `ArrayBool` with no NA holes.
    pub fn bools<I: IntoIterator<Item = bool>>(items: I) -> Self {
        Sexp::ArrayBool(items.into_iter().map(Some).collect())
    }

    /// Element count for array variants, `None` for everything else.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Sexp::ArrayStr(v) => Some(v.len()),
            Sexp::ArrayInt(v) => Some(v.len()),
            Sexp::ArrayDouble(v) => Some(v.len()),
            Sexp::ArrayBool(v) => Some(v.len()),
            _ => None,
        }
    }
}

/// An ordered set of named columns, lowered to the attribute-bearing
/// SEXP shape the server expects for `data.frame` uploads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    columns: Vec<(String, Sexp)>,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column. `values` must be one of the array variants.
    pub fn with_column(mut self, name: impl Into<String>, values: Sexp) -> Self {
        self.columns.push((name.into(), values));
        self
    }

    pub fn push_column(&mut self, name: impl Into<String>, values: Sexp) {
        self.columns.push((name.into(), values));
    }

    /// Lowers the frame to its wire shape:
    /// `HasAttr(ListTag([names, row.names, class]), Vector(columns))`.
    ///
    /// Row count is the length of the first column; every column must
    /// match it exactly.
    pub fn into_sexp(self) -> Result<Sexp, ProtocolError> {
        let rows = match self.columns.first() {
            Some((name, values)) => values
                .array_len()
                .ok_or_else(|| ProtocolError::ColumnNotArray { name: name.clone() })?,
            None => 0,
        };

        let mut names = Vec::with_capacity(self.columns.len());
        let mut values = Vec::with_capacity(self.columns.len());
        for (name, column) in self.columns {
            let len = column
                .array_len()
                .ok_or_else(|| ProtocolError::ColumnNotArray { name: name.clone() })?;
            if len != rows {
                return Err(ProtocolError::ColumnLength {
                    name,
                    len,
                    expected: rows,
                });
            }
            names.push(Some(name));
            values.push(column);
        }

        let attr = Sexp::ListTag(vec![
            (Sexp::SymName("names".into()), Sexp::ArrayStr(names)),
            (
                Sexp::SymName("row.names".into()),
                Sexp::ints(1..=rows as i64),
            ),
            (
                Sexp::SymName("class".into()),
                Sexp::strings(["data.frame"]),
            ),
        ]);

        Ok(Sexp::HasAttr {
            attr: Box::new(attr),
            value: Box::new(Sexp::Vector(values)),
        })
    }
}
