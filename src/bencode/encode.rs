use super::error::BencodeError;
use super::value::Value;
use std::io::Write;

/// Encodes a value into a bencoded byte vector.
///
/// Dictionary keys are emitted in ascending raw-byte order, as bencode
/// requires. Values outside bencode's domain (null, bool, float) fail
/// with [`BencodeError::Unrepresentable`].
pub fn encode(value: &Value) -> Result<Vec<u8>, BencodeError> {
    let mut buf = Vec::new();
    encode_to(value, &mut buf)?;
    Ok(buf)
}

/// Encodes a value into any byte sink.
pub fn encode_to<W: Write>(value: &Value, writer: &mut W) -> Result<(), BencodeError> {
    match value {
        Value::Integer(i) => {
            write!(writer, "i{}e", i)?;
        }
        Value::Uint(u) => {
            write!(writer, "i{}e", u)?;
        }
        Value::Bytes(b) => {
            write!(writer, "{}:", b.len())?;
            writer.write_all(b)?;
        }
        Value::List(l) => {
            writer.write_all(b"l")?;
            for item in l {
                encode_to(item, writer)?;
            }
            writer.write_all(b"e")?;
        }
        Value::Dict(d) => {
            writer.write_all(b"d")?;
            for (key, val) in d {
                write!(writer, "{}:", key.len())?;
                writer.write_all(key)?;
                encode_to(val, writer)?;
            }
            writer.write_all(b"e")?;
        }
        Value::Null => return Err(BencodeError::Unrepresentable("null")),
        Value::Bool(_) => return Err(BencodeError::Unrepresentable("bool")),
        Value::Float(_) => return Err(BencodeError::Unrepresentable("float")),
    }
    Ok(())
}
