use std::collections::BTreeMap;
use std::io::Read;

use bytes::Bytes;

use super::error::BencodeError;
use super::value::Value;

const MAX_DEPTH: usize = 64;

/// Decodes a bencode value from a byte slice.
///
/// The input must contain exactly one complete bencode value with no
/// trailing data.
///
/// # Errors
///
/// Returns an error if:
/// - The input is empty or truncated ([`BencodeError::UnexpectedEof`])
/// - The input contains invalid bencode syntax
/// - The nesting depth exceeds 64 levels ([`BencodeError::NestingTooDeep`])
/// - There is data after the value ([`BencodeError::TrailingData`])
///
/// # Examples
///
/// ```
/// use torport::bencode::decode;
///
/// let int = decode(b"i42e").unwrap();
/// assert_eq!(int.as_integer(), Some(42));
///
/// let string = decode(b"5:hello").unwrap();
/// assert_eq!(string.as_str(), Some("hello"));
///
/// let dict = decode(b"d4:name5:Alice3:agei30ee").unwrap();
/// assert_eq!(dict.get(b"name").and_then(|v| v.as_str()), Some("Alice"));
/// ```
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut reader = ByteReader::new(data);
    let value = decode_value(&mut reader, 0)?;

    if reader.peek()?.is_some() {
        return Err(BencodeError::TrailingData);
    }

    Ok(value)
}

/// Decodes one bencode value from a byte stream.
///
/// Reads exactly one value and stops; bytes past the end of the value are
/// left unread. The decoder is single-pass with one byte of lookahead and
/// never buffers the whole input.
pub fn decode_from<R: Read>(reader: R) -> Result<Value, BencodeError> {
    let mut reader = ByteReader::new(reader);
    decode_value(&mut reader, 0)
}

struct ByteReader<R> {
    inner: R,
    peeked: Option<u8>,
}

impl<R: Read> ByteReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            peeked: None,
        }
    }

    fn peek(&mut self) -> Result<Option<u8>, BencodeError> {
        if self.peeked.is_none() {
            let mut byte = [0u8; 1];
            self.peeked = match self.inner.read(&mut byte)? {
                0 => None,
                _ => Some(byte[0]),
            };
        }
        Ok(self.peeked)
    }

    fn next(&mut self) -> Result<u8, BencodeError> {
        match self.peek()? {
            Some(b) => {
                self.peeked = None;
                Ok(b)
            }
            None => Err(BencodeError::UnexpectedEof),
        }
    }

    fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>, BencodeError> {
        let mut buf = Vec::new();
        if len == 0 {
            return Ok(buf);
        }
        if let Some(b) = self.peeked.take() {
            buf.push(b);
        }
        let remaining = len - buf.len();
        (&mut self.inner)
            .take(remaining as u64)
            .read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(BencodeError::UnexpectedEof);
        }
        Ok(buf)
    }
}

fn decode_value<R: Read>(reader: &mut ByteReader<R>, depth: usize) -> Result<Value, BencodeError> {
    if depth > MAX_DEPTH {
        return Err(BencodeError::NestingTooDeep);
    }

    match reader.next()? {
        b'i' => decode_integer(reader),
        b'l' => decode_list(reader, depth),
        b'd' => decode_dict(reader, depth),
        first @ b'0'..=b'9' => decode_bytes(reader, first),
        c => Err(BencodeError::UnexpectedChar(c as char)),
    }
}

fn decode_integer<R: Read>(reader: &mut ByteReader<R>) -> Result<Value, BencodeError> {
    let mut digits = String::new();
    loop {
        match reader.next()? {
            b'e' => break,
            b => digits.push(b as char),
        }
    }

    if digits.is_empty() {
        return Err(BencodeError::InvalidInteger("empty".into()));
    }

    if digits.starts_with("-0") || (digits.starts_with('0') && digits.len() > 1) {
        return Err(BencodeError::InvalidInteger("leading zeros".into()));
    }

    if let Ok(value) = digits.parse::<i64>() {
        return Ok(Value::Integer(value));
    }

    // Torrent sizes can exceed i64 in hostile inputs; give u64 a chance
    // before rejecting.
    if !digits.starts_with('-') {
        if let Ok(value) = digits.parse::<u64>() {
            return Ok(Value::Uint(value));
        }
    }

    Err(BencodeError::InvalidInteger(digits))
}

fn decode_bytes<R: Read>(reader: &mut ByteReader<R>, first: u8) -> Result<Value, BencodeError> {
    let mut digits = String::new();
    digits.push(first as char);
    loop {
        match reader.next()? {
            b':' => break,
            b @ b'0'..=b'9' => digits.push(b as char),
            _ => return Err(BencodeError::InvalidStringLength),
        }
    }

    let len: usize = digits
        .parse()
        .map_err(|_| BencodeError::InvalidStringLength)?;

    let bytes = reader.read_exact_vec(len)?;
    Ok(Value::Bytes(Bytes::from(bytes)))
}

fn decode_list<R: Read>(reader: &mut ByteReader<R>, depth: usize) -> Result<Value, BencodeError> {
    let mut list = Vec::new();

    loop {
        match reader.peek()? {
            Some(b'e') => {
                reader.next()?;
                return Ok(Value::List(list));
            }
            Some(_) => list.push(decode_value(reader, depth + 1)?),
            None => return Err(BencodeError::UnexpectedEof),
        }
    }
}

fn decode_dict<R: Read>(reader: &mut ByteReader<R>, depth: usize) -> Result<Value, BencodeError> {
    let mut dict = BTreeMap::new();

    loop {
        match reader.peek()? {
            Some(b'e') => {
                reader.next()?;
                return Ok(Value::Dict(dict));
            }
            Some(_) => {
                let key = match decode_value(reader, depth + 1)? {
                    Value::Bytes(b) => b,
                    _ => return Err(BencodeError::NonStringKey),
                };
                let value = decode_value(reader, depth + 1)?;
                dict.insert(key, value);
            }
            None => return Err(BencodeError::UnexpectedEof),
        }
    }
}
