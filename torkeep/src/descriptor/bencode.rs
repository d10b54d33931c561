//! Bencode encoding and decoding.
//!
//! Covers what `.torrent` metainfo files and resume blobs need: integers,
//! byte strings, lists and dictionaries. The decoder also reports the raw
//! byte span of a top-level dictionary entry so the info-hash can be computed
//! over the exact bytes found on disk.

use std::collections::BTreeMap;
use std::ops::Range;

use thiserror::Error;

/// Maximum nesting depth accepted by the decoder.
pub const MAX_DEPTH: usize = 64;

/// Errors produced while decoding bencoded data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BencodeError {
    /// Input ended in the middle of a value.
    #[error("unexpected end of input at byte {pos}")]
    UnexpectedEof { pos: usize },

    /// A byte that cannot start or continue a value.
    #[error("invalid byte 0x{byte:02x} at byte {pos}")]
    InvalidByte { pos: usize, byte: u8 },

    /// Malformed integer or length prefix.
    #[error("invalid integer at byte {pos}")]
    InvalidInteger { pos: usize },

    /// Bytes left over after the top-level value.
    #[error("trailing data at byte {pos}")]
    TrailingData { pos: usize },

    /// Nesting deeper than [`MAX_DEPTH`].
    #[error("nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,

    /// The top-level value is not a dictionary.
    #[error("expected a dictionary")]
    NotADict,
}

/// A bencoded value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BencodeValue {
    Integer(i64),
    Bytes(Vec<u8>),
    List(Vec<BencodeValue>),
    Dict(BTreeMap<Vec<u8>, BencodeValue>),
}

impl BencodeValue {
    /// Create a string value from a &str
    #[inline]
    pub fn string(s: &str) -> Self {
        Self::Bytes(s.as_bytes().to_vec())
    }

    /// Create an integer value
    #[inline]
    pub fn integer(i: i64) -> Self {
        Self::Integer(i)
    }

    /// Create an empty list
    #[inline]
    pub fn list() -> Self {
        Self::List(Vec::new())
    }

    /// Create an empty dict
    #[inline]
    pub fn dict() -> Self {
        Self::Dict(BTreeMap::new())
    }

    /// Add an item to a list (builder pattern)
    #[inline]
    pub fn push(mut self, value: BencodeValue) -> Self {
        if let Self::List(ref mut list) = self {
            list.push(value);
        }
        self
    }

    /// Insert a key-value pair into a dict (builder pattern)
    #[inline]
    pub fn insert(mut self, key: &str, value: BencodeValue) -> Self {
        if let Self::Dict(ref mut dict) = self {
            dict.insert(key.as_bytes().to_vec(), value);
        }
        self
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Byte string interpreted as UTF-8 (lossy).
    pub fn as_string(&self) -> Option<String> {
        self.as_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn as_list(&self) -> Option<&[BencodeValue]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, BencodeValue>> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Look up a key when this value is a dictionary.
    pub fn get(&self, key: &str) -> Option<&BencodeValue> {
        self.as_dict().and_then(|d| d.get(key.as_bytes()))
    }

    /// Encode to bencoded bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Encode into an existing buffer
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Integer(i) => {
                buf.push(b'i');
                buf.extend_from_slice(i.to_string().as_bytes());
                buf.push(b'e');
            }
            Self::Bytes(bytes) => {
                buf.extend_from_slice(bytes.len().to_string().as_bytes());
                buf.push(b':');
                buf.extend_from_slice(bytes);
            }
            Self::List(list) => {
                buf.push(b'l');
                for item in list {
                    item.encode_into(buf);
                }
                buf.push(b'e');
            }
            Self::Dict(dict) => {
                buf.push(b'd');
                // BTreeMap keeps keys sorted
                for (key, value) in dict {
                    buf.extend_from_slice(key.len().to_string().as_bytes());
                    buf.push(b':');
                    buf.extend_from_slice(key);
                    value.encode_into(buf);
                }
                buf.push(b'e');
            }
        }
    }

    /// Decode a complete bencoded buffer.
    ///
    /// Trailing bytes after the first value are rejected.
    pub fn decode(data: &[u8]) -> Result<Self, BencodeError> {
        let mut decoder = Decoder::new(data);
        let value = decoder.value(0)?;
        if decoder.pos != data.len() {
            return Err(BencodeError::TrailingData { pos: decoder.pos });
        }
        Ok(value)
    }
}

/// Find the raw byte span of `key`'s value in a top-level dictionary.
///
/// Returns `Ok(None)` when the key is absent.
pub fn dict_entry_span(data: &[u8], key: &[u8]) -> Result<Option<Range<usize>>, BencodeError> {
    let mut decoder = Decoder::new(data);
    match decoder.peek()? {
        b'd' => decoder.pos += 1,
        _ => return Err(BencodeError::NotADict),
    }
    loop {
        if decoder.peek()? == b'e' {
            return Ok(None);
        }
        let entry_key = decoder.byte_string()?;
        let start = decoder.pos;
        decoder.value(1)?;
        if entry_key == key {
            return Ok(Some(start..decoder.pos));
        }
    }
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof { pos: self.pos })
    }

    fn value(&mut self, depth: usize) -> Result<BencodeValue, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::TooDeep);
        }
        match self.peek()? {
            b'i' => {
                self.pos += 1;
                let value = self.integer_until(b'e')?;
                Ok(BencodeValue::Integer(value))
            }
            b'0'..=b'9' => Ok(BencodeValue::Bytes(self.byte_string()?.to_vec())),
            b'l' => {
                self.pos += 1;
                let mut list = Vec::new();
                while self.peek()? != b'e' {
                    list.push(self.value(depth + 1)?);
                }
                self.pos += 1;
                Ok(BencodeValue::List(list))
            }
            b'd' => {
                self.pos += 1;
                let mut dict = BTreeMap::new();
                while self.peek()? != b'e' {
                    let key = self.byte_string()?.to_vec();
                    let value = self.value(depth + 1)?;
                    dict.insert(key, value);
                }
                self.pos += 1;
                Ok(BencodeValue::Dict(dict))
            }
            byte => Err(BencodeError::InvalidByte {
                pos: self.pos,
                byte,
            }),
        }
    }

    fn byte_string(&mut self) -> Result<&'a [u8], BencodeError> {
        let start = self.pos;
        let len = self.integer_until(b':')?;
        let len = usize::try_from(len).map_err(|_| BencodeError::InvalidInteger { pos: start })?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(BencodeError::UnexpectedEof {
                pos: self.data.len(),
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Parse a decimal integer terminated by `terminator`, consuming both.
    fn integer_until(&mut self, terminator: u8) -> Result<i64, BencodeError> {
        let start = self.pos;
        let rest = &self.data[start..];
        let len = rest
            .iter()
            .position(|b| *b == terminator)
            .ok_or(BencodeError::UnexpectedEof {
                pos: self.data.len(),
            })?;
        let digits = &rest[..len];
        let valid = match digits {
            [] | [b'-'] => false,
            [b'-', b'0', ..] => false,
            [b'0', _, ..] => false,
            [b'-', tail @ ..] => tail.iter().all(u8::is_ascii_digit),
            _ => digits.iter().all(u8::is_ascii_digit),
        };
        if !valid {
            return Err(BencodeError::InvalidInteger { pos: start });
        }
        let value = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(BencodeError::InvalidInteger { pos: start })?;
        self.pos = start + len + 1;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_integer() {
        assert_eq!(BencodeValue::integer(42).encode(), b"i42e");
        assert_eq!(BencodeValue::integer(-1).encode(), b"i-1e");
        assert_eq!(BencodeValue::integer(0).encode(), b"i0e");
    }

    #[test]
    fn test_encode_dict() {
        let dict = BencodeValue::dict()
            .insert("bar", BencodeValue::string("spam"))
            .insert("foo", BencodeValue::integer(42));
        assert_eq!(dict.encode(), b"d3:bar4:spam3:fooi42ee");
    }

    #[test]
    fn test_decode_nested() {
        let value = BencodeValue::decode(b"d4:listl4:spami-3ee3:numi7ee").unwrap();
        assert_eq!(value.get("num").and_then(BencodeValue::as_int), Some(7));
        let list = value.get("list").and_then(BencodeValue::as_list).unwrap();
        assert_eq!(list[0].as_string().as_deref(), Some("spam"));
        assert_eq!(list[1].as_int(), Some(-3));
    }

    #[test]
    fn test_decode_rejects_leading_zero_and_negative_zero() {
        assert!(matches!(
            BencodeValue::decode(b"i03e"),
            Err(BencodeError::InvalidInteger { .. })
        ));
        assert!(matches!(
            BencodeValue::decode(b"i-0e"),
            Err(BencodeError::InvalidInteger { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_trailing_data() {
        assert_eq!(
            BencodeValue::decode(b"i1ei2e"),
            Err(BencodeError::TrailingData { pos: 3 })
        );
    }

    #[test]
    fn test_decode_truncated_string() {
        assert!(matches!(
            BencodeValue::decode(b"10:short"),
            Err(BencodeError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_decode_depth_limit() {
        let mut data = vec![b'l'; MAX_DEPTH + 2];
        data.extend(std::iter::repeat(b'e').take(MAX_DEPTH + 2));
        assert_eq!(BencodeValue::decode(&data), Err(BencodeError::TooDeep));
    }

    #[test]
    fn test_dict_entry_span_returns_raw_bytes() {
        let data = b"d8:announce3:url4:infod4:name1:xee";
        let span = dict_entry_span(data, b"info").unwrap().unwrap();
        assert_eq!(&data[span], b"d4:name1:xe");
        assert_eq!(dict_entry_span(data, b"missing").unwrap(), None);
    }

    #[test]
    fn test_dict_entry_span_requires_dict() {
        assert_eq!(dict_entry_span(b"li1ee", b"info"), Err(BencodeError::NotADict));
    }

    proptest! {
        #[test]
        fn test_decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = BencodeValue::decode(&data);
            let _ = dict_entry_span(&data, b"info");
        }
    }
}
