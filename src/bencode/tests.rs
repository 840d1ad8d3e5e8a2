use std::collections::BTreeMap;
use std::io::Cursor;

use bytes::Bytes;

use super::*;

#[test]
fn test_decode_integer() {
    assert_eq!(decode(b"i42e").unwrap(), Value::Integer(42));
    assert_eq!(decode(b"i-42e").unwrap(), Value::Integer(-42));
    assert_eq!(decode(b"i0e").unwrap(), Value::Integer(0));
}

#[test]
fn test_decode_integer_invalid() {
    assert!(decode(b"i-0e").is_err());
    assert!(decode(b"i03e").is_err());
    assert!(decode(b"ie").is_err());
}

#[test]
fn test_decode_integer_beyond_i64() {
    // One past i64::MAX lands in the unsigned variant.
    assert_eq!(
        decode(b"i9223372036854775808e").unwrap(),
        Value::Uint(9223372036854775808)
    );
}

#[test]
fn test_decode_bytes() {
    assert_eq!(
        decode(b"4:spam").unwrap(),
        Value::Bytes(Bytes::from_static(b"spam"))
    );
    assert_eq!(decode(b"0:").unwrap(), Value::Bytes(Bytes::from_static(b"")));
}

#[test]
fn test_decode_bytes_oversize_length() {
    assert!(matches!(
        decode(b"100:short"),
        Err(BencodeError::UnexpectedEof)
    ));
}

#[test]
fn test_decode_list() {
    let result = decode(b"l4:spami42ee").unwrap();
    match result {
        Value::List(l) => {
            assert_eq!(l.len(), 2);
            assert_eq!(l[0], Value::Bytes(Bytes::from_static(b"spam")));
            assert_eq!(l[1], Value::Integer(42));
        }
        _ => panic!("expected list"),
    }
}

#[test]
fn test_decode_dict() {
    let result = decode(b"d3:cow3:moo4:spam4:eggse").unwrap();
    match result {
        Value::Dict(d) => {
            assert_eq!(d.len(), 2);
            assert_eq!(
                d.get(&Bytes::from_static(b"cow")),
                Some(&Value::Bytes(Bytes::from_static(b"moo")))
            );
        }
        _ => panic!("expected dict"),
    }
}

#[test]
fn test_decode_dict_non_string_key() {
    assert!(matches!(
        decode(b"di1e3:mooe"),
        Err(BencodeError::NonStringKey)
    ));
}

#[test]
fn test_decode_from_stops_at_value_end() {
    let mut cursor = Cursor::new(b"d3:cow3:mooetrailing".to_vec());
    let value = decode_from(&mut cursor).unwrap();
    assert!(value.as_dict().is_some());
    assert_eq!(cursor.position(), 12);
}

#[test]
fn test_encode_integer() {
    assert_eq!(encode(&Value::Integer(42)).unwrap(), b"i42e");
    assert_eq!(encode(&Value::Integer(-42)).unwrap(), b"i-42e");
    assert_eq!(encode(&Value::Uint(42)).unwrap(), b"i42e");
}

#[test]
fn test_encode_bytes() {
    assert_eq!(
        encode(&Value::Bytes(Bytes::from_static(b"spam"))).unwrap(),
        b"4:spam"
    );
}

#[test]
fn test_encode_list() {
    let list = Value::List(vec![
        Value::Bytes(Bytes::from_static(b"spam")),
        Value::Integer(42),
    ]);
    assert_eq!(encode(&list).unwrap(), b"l4:spami42ee");
}

#[test]
fn test_encode_dict_sorts_keys() {
    // Keys inserted out of order come out in ascending byte order.
    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(b"zebra"), Value::Integer(1));
    dict.insert(Bytes::from_static(b"apple"), Value::Integer(2));
    let value = Value::Dict(dict);
    assert_eq!(encode(&value).unwrap(), b"d5:applei2e5:zebrai1ee");
}

#[test]
fn test_encode_unrepresentable() {
    assert!(matches!(
        encode(&Value::Null),
        Err(BencodeError::Unrepresentable(_))
    ));
    assert!(matches!(
        encode(&Value::Bool(true)),
        Err(BencodeError::Unrepresentable(_))
    ));
    assert!(matches!(
        encode(&Value::Float(1.5)),
        Err(BencodeError::Unrepresentable(_))
    ));
}

#[test]
fn test_roundtrip() {
    // Keys must be sorted lexicographically for bencode roundtrip
    let original = b"d8:announce15:http://test.com4:infod4:name4:test12:piece lengthi16384eee";
    let decoded = decode(original).unwrap();
    let encoded = encode(&decoded).unwrap();
    assert_eq!(encoded, original);
}

#[test]
fn test_nested_structures() {
    let data = b"d4:listl4:spami42eee";
    let decoded = decode(data).unwrap();
    let encoded = encode(&decoded).unwrap();
    assert_eq!(encoded, data);
}

#[test]
fn test_trailing_data_error() {
    assert!(decode(b"i42eextra").is_err());
}

#[test]
fn test_value_accessors() {
    let value = Value::Integer(42);
    assert_eq!(value.as_integer(), Some(42));
    assert_eq!(value.as_uinteger(), Some(42));
    assert!(value.as_bytes().is_none());

    let value = Value::Integer(-1);
    assert_eq!(value.as_uinteger(), None);

    let value = Value::Uint(7);
    assert_eq!(value.as_integer(), Some(7));

    let value = Value::Bytes(Bytes::from_static(b"test"));
    assert_eq!(value.as_str(), Some("test"));
    assert!(value.as_integer().is_none());

    let value = Value::Integer(1);
    assert_eq!(value.as_bool(), Some(true));
    assert_eq!(Value::Bool(false).as_bool(), Some(false));

    let value = Value::List(vec![]);
    assert!(value.as_list().is_some());
    assert!(value.as_dict().is_none());
}
