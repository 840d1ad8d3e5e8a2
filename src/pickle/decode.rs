use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use bytes::Bytes;

use crate::bencode::Value;

use super::error::PickleError;

// Opcode bytes, named as in the CPython sources.
const MARK: u8 = b'(';
const STOP: u8 = b'.';
const POP: u8 = b'0';
const POP_MARK: u8 = b'1';
const DUP: u8 = b'2';
const FLOAT: u8 = b'F';
const BINFLOAT: u8 = b'G';
const INT: u8 = b'I';
const BININT: u8 = b'J';
const BININT1: u8 = b'K';
const LONG: u8 = b'L';
const NONE: u8 = b'N';
const STRING: u8 = b'S';
const UNICODE: u8 = b'V';
const BINUNICODE: u8 = b'X';
const APPEND: u8 = b'a';
const BUILD: u8 = b'b';
const GLOBAL: u8 = b'c';
const DICT: u8 = b'd';
const APPENDS: u8 = b'e';
const GET: u8 = b'g';
const BINGET: u8 = b'h';
const INST: u8 = b'i';
const LONG_BINGET: u8 = b'j';
const LIST: u8 = b'l';
const PUT: u8 = b'p';
const BINPUT: u8 = b'q';
const LONG_BINPUT: u8 = b'r';
const SETITEM: u8 = b's';
const TUPLE: u8 = b't';
const SETITEMS: u8 = b'u';
const EMPTY_DICT: u8 = b'}';
const EMPTY_LIST: u8 = b']';
const EMPTY_TUPLE: u8 = b')';
const PROTO: u8 = 0x80;
const NEWOBJ: u8 = 0x81;
const TUPLE1: u8 = 0x85;
const TUPLE2: u8 = 0x86;
const TUPLE3: u8 = 0x87;
const NEWTRUE: u8 = 0x88;
const NEWFALSE: u8 = 0x89;

/// Decodes a pickle stream from a byte slice.
pub fn decode(data: &[u8]) -> Result<Value, PickleError> {
    decode_from(data)
}

/// Decodes one pickled object from a byte stream.
///
/// Reading stops exactly at the STOP opcode; any bytes after it are left
/// unread. The stack and memo live only for the duration of the call.
pub fn decode_from<R: Read>(reader: R) -> Result<Value, PickleError> {
    Decoder::new(reader).run()
}

enum Slot {
    Mark,
    Val(Value),
}

struct Decoder<R> {
    reader: R,
    stack: Vec<Slot>,
    memo: HashMap<i64, Value>,
}

impl<R: Read> Decoder<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            stack: Vec::new(),
            memo: HashMap::new(),
        }
    }

    fn run(mut self) -> Result<Value, PickleError> {
        loop {
            let mut byte = [0u8; 1];
            if self.reader.read(&mut byte)? == 0 {
                return Err(PickleError::MissingStop);
            }

            match byte[0] {
                MARK => self.stack.push(Slot::Mark),

                STOP => {
                    let root = self.pop_value()?;
                    if !self.stack.is_empty() {
                        return Err(PickleError::DanglingStack);
                    }
                    return Ok(root);
                }

                POP => {
                    self.pop()?;
                }

                POP_MARK => {
                    self.pop_to_mark()?;
                }

                DUP => {
                    let top = self.top_value()?.clone();
                    self.push(top);
                }

                INT => {
                    let line = self.read_line_str()?;
                    let value = match line.as_str() {
                        "00" => Value::Bool(false),
                        "01" => Value::Bool(true),
                        _ => Value::Integer(parse_int(&line)?),
                    };
                    self.push(value);
                }

                FLOAT => {
                    let line = self.read_line_str()?;
                    let value: f64 = line
                        .parse()
                        .map_err(|_| PickleError::InvalidNumber(line))?;
                    self.push(Value::Float(value));
                }

                LONG => {
                    let mut line = self.read_line_str()?;
                    if line.ends_with('L') {
                        line.pop();
                    }
                    self.push(Value::Integer(parse_int(&line)?));
                }

                STRING => {
                    let line = self.read_line()?;
                    if line.len() < 2 {
                        return Err(PickleError::InvalidEscape);
                    }
                    let inner = &line[1..line.len() - 1];
                    self.push(Value::Bytes(Bytes::from(unescape(inner)?)));
                }

                UNICODE => {
                    let line = self.read_line()?;
                    self.push(Value::Bytes(Bytes::from(unescape(&line)?)));
                }

                INST => {
                    // Module and class names carry no information we keep.
                    self.read_line()?;
                    self.read_line()?;
                    let items = self.pop_to_mark()?;
                    self.push(Value::Dict(build_dict(items)?));
                }

                DICT => {
                    let items = self.pop_to_mark()?;
                    self.push(Value::Dict(build_dict(items)?));
                }

                SETITEM => {
                    let value = self.pop_value()?;
                    let key = dict_key(self.pop_value()?)?;
                    match self.top_value_mut()? {
                        Value::Dict(d) => {
                            d.insert(key, value);
                        }
                        _ => return Err(PickleError::TypeMismatch),
                    }
                }

                SETITEMS => {
                    let items = self.pop_to_mark()?;
                    match self.top_value_mut()? {
                        Value::Dict(d) => {
                            for pair in insert_pairs(items)? {
                                d.insert(pair.0, pair.1);
                            }
                        }
                        _ => return Err(PickleError::TypeMismatch),
                    }
                }

                LIST | TUPLE => {
                    let items = self.pop_to_mark()?;
                    self.push(Value::List(items));
                }

                APPENDS => {
                    let items = self.pop_to_mark()?;
                    match self.top_value_mut()? {
                        Value::List(l) => l.extend(items),
                        _ => return Err(PickleError::TypeMismatch),
                    }
                }

                APPEND => {
                    let value = self.pop_value()?;
                    match self.top_value_mut()? {
                        Value::List(l) => l.push(value),
                        _ => return Err(PickleError::TypeMismatch),
                    }
                }

                EMPTY_DICT => self.push(Value::Dict(BTreeMap::new())),
                EMPTY_LIST | EMPTY_TUPLE => self.push(Value::List(Vec::new())),
                NONE => self.push(Value::Null),

                BUILD => {
                    // The object's state replaces the instance; attribute
                    // merging is not performed.
                    let state = self.pop_value()?;
                    self.pop_value()?;
                    self.push(state);
                }

                GET => {
                    let line = self.read_line_str()?;
                    let key = parse_int(&line)?;
                    self.fetch_memo(key)?;
                }

                PUT => {
                    let line = self.read_line_str()?;
                    let key = parse_int(&line)?;
                    self.store_memo(key)?;
                }

                BINGET => {
                    let key = i64::from(self.read_u8()?);
                    self.fetch_memo(key)?;
                }

                LONG_BINGET => {
                    let key = i64::from(self.read_u32_le()?);
                    self.fetch_memo(key)?;
                }

                BINPUT => {
                    let key = i64::from(self.read_u8()?);
                    self.store_memo(key)?;
                }

                LONG_BINPUT => {
                    let key = i64::from(self.read_u32_le()?);
                    self.store_memo(key)?;
                }

                PROTO => {
                    self.read_u8()?;
                }

                GLOBAL => {
                    let module = self.read_line()?;
                    let class = self.read_line()?;
                    let mut marker = module;
                    marker.push(b':');
                    marker.extend_from_slice(&class);
                    self.push(Value::Bytes(Bytes::from(marker)));
                }

                NEWOBJ => {
                    self.pop_value()?; // constructor arguments
                    self.pop_value()?; // class marker
                    self.push(Value::Dict(BTreeMap::new()));
                }

                BINUNICODE => {
                    let len = self.read_u32_le()? as usize;
                    let bytes = self.read_exact_vec(len)?;
                    self.push(Value::Bytes(Bytes::from(bytes)));
                }

                NEWTRUE => self.push(Value::Bool(true)),
                NEWFALSE => self.push(Value::Bool(false)),

                BINFLOAT => {
                    let mut buf = [0u8; 8];
                    self.read_exact(&mut buf)?;
                    self.push(Value::Float(f64::from_be_bytes(buf)));
                }

                BININT => {
                    let mut buf = [0u8; 4];
                    self.read_exact(&mut buf)?;
                    self.push(Value::Integer(i64::from(i32::from_le_bytes(buf))));
                }

                BININT1 => {
                    let value = self.read_u8()? as i8;
                    self.push(Value::Integer(i64::from(value)));
                }

                TUPLE1 => {
                    let v1 = self.pop_value()?;
                    self.push(Value::List(vec![v1]));
                }

                TUPLE2 => {
                    let v2 = self.pop_value()?;
                    let v1 = self.pop_value()?;
                    self.push(Value::List(vec![v1, v2]));
                }

                TUPLE3 => {
                    let v3 = self.pop_value()?;
                    let v2 = self.pop_value()?;
                    let v1 = self.pop_value()?;
                    self.push(Value::List(vec![v1, v2, v3]));
                }

                op => return Err(PickleError::UnsupportedOpcode(op)),
            }
        }
    }

    fn push(&mut self, value: Value) {
        self.stack.push(Slot::Val(value));
    }

    fn pop(&mut self) -> Result<Slot, PickleError> {
        self.stack.pop().ok_or(PickleError::StackUnderflow)
    }

    fn pop_value(&mut self) -> Result<Value, PickleError> {
        match self.pop()? {
            Slot::Val(v) => Ok(v),
            Slot::Mark => Err(PickleError::StackUnderflow),
        }
    }

    fn top_value(&self) -> Result<&Value, PickleError> {
        match self.stack.last() {
            Some(Slot::Val(v)) => Ok(v),
            _ => Err(PickleError::StackUnderflow),
        }
    }

    fn top_value_mut(&mut self) -> Result<&mut Value, PickleError> {
        match self.stack.last_mut() {
            Some(Slot::Val(v)) => Ok(v),
            _ => Err(PickleError::StackUnderflow),
        }
    }

    /// Pops values down to (and including) the nearest mark, returning
    /// them in push order.
    fn pop_to_mark(&mut self) -> Result<Vec<Value>, PickleError> {
        let mut items = Vec::new();
        loop {
            match self.pop()? {
                Slot::Mark => break,
                Slot::Val(v) => items.push(v),
            }
        }
        items.reverse();
        Ok(items)
    }

    fn fetch_memo(&mut self, key: i64) -> Result<(), PickleError> {
        let value = self
            .memo
            .get(&key)
            .cloned()
            .ok_or(PickleError::UnknownMemo(key))?;
        self.push(value);
        Ok(())
    }

    fn store_memo(&mut self, key: i64) -> Result<(), PickleError> {
        let top = self.top_value()?.clone();
        self.memo.insert(key, top);
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, PickleError> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn read_u32_le(&mut self) -> Result<u32, PickleError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), PickleError> {
        self.reader.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                PickleError::UnexpectedEof
            } else {
                PickleError::Io(e)
            }
        })
    }

    fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>, PickleError> {
        let mut buf = Vec::new();
        (&mut self.reader).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(PickleError::UnexpectedEof);
        }
        Ok(buf)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, PickleError> {
        let mut line = Vec::new();
        loop {
            match self.read_u8()? {
                b'\n' => return Ok(line),
                b => line.push(b),
            }
        }
    }

    fn read_line_str(&mut self) -> Result<String, PickleError> {
        let line = self.read_line()?;
        String::from_utf8(line).map_err(|e| {
            PickleError::InvalidNumber(String::from_utf8_lossy(e.as_bytes()).into_owned())
        })
    }
}

fn parse_int(text: &str) -> Result<i64, PickleError> {
    text.parse()
        .map_err(|_| PickleError::InvalidNumber(text.to_owned()))
}

fn build_dict(items: Vec<Value>) -> Result<BTreeMap<Bytes, Value>, PickleError> {
    let mut dict = BTreeMap::new();
    for (key, value) in insert_pairs(items)? {
        dict.insert(key, value);
    }
    Ok(dict)
}

fn insert_pairs(items: Vec<Value>) -> Result<Vec<(Bytes, Value)>, PickleError> {
    if items.len() % 2 != 0 {
        return Err(PickleError::StackUnderflow);
    }

    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut it = items.into_iter();
    while let (Some(key), Some(value)) = (it.next(), it.next()) {
        pairs.push((dict_key(key)?, value));
    }
    Ok(pairs)
}

fn dict_key(value: Value) -> Result<Bytes, PickleError> {
    match value {
        Value::Bytes(b) => Ok(b),
        Value::Integer(i) => Ok(Bytes::from(i.to_string().into_bytes())),
        Value::Uint(u) => Ok(Bytes::from(u.to_string().into_bytes())),
        Value::Bool(true) => Ok(Bytes::from_static(b"true")),
        Value::Bool(false) => Ok(Bytes::from_static(b"false")),
        _ => Err(PickleError::InvalidKey),
    }
}

/// Decodes Python string escapes, including `\uXXXX` surrogate pairs, to
/// UTF-8 bytes.
fn unescape(raw: &[u8]) -> Result<Vec<u8>, PickleError> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' {
            out.push(raw[i]);
            i += 1;
            continue;
        }

        i += 1;
        let escape = *raw.get(i).ok_or(PickleError::InvalidEscape)?;
        match escape {
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'u' => {
                i += 1;
                let code = read_hex4(raw, &mut i)?;
                let scalar = if (0xD800..=0xDBFF).contains(&code) {
                    if raw.get(i) != Some(&b'\\') || raw.get(i + 1) != Some(&b'u') {
                        return Err(PickleError::InvalidEscape);
                    }
                    i += 2;
                    let low = read_hex4(raw, &mut i)?;
                    if !(0xDC00..=0xDFFF).contains(&low) {
                        return Err(PickleError::InvalidEscape);
                    }
                    0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    code
                };
                let ch = char::from_u32(scalar).ok_or(PickleError::InvalidEscape)?;
                out.extend_from_slice(ch.encode_utf8(&mut [0u8; 4]).as_bytes());
                continue;
            }
            // Covers \' \" \\ and any escape Python never emits.
            other => out.push(other),
        }
        i += 1;
    }

    Ok(out)
}

fn read_hex4(raw: &[u8], i: &mut usize) -> Result<u32, PickleError> {
    let digits = raw.get(*i..*i + 4).ok_or(PickleError::InvalidEscape)?;
    let text = std::str::from_utf8(digits).map_err(|_| PickleError::InvalidEscape)?;
    let code = u32::from_str_radix(text, 16).map_err(|_| PickleError::InvalidEscape)?;
    *i += 4;
    Ok(code)
}
