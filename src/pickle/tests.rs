use std::io::Cursor;

use bytes::Bytes;

use crate::bencode::Value;

use super::*;

#[test]
fn decodes_protocol0_dict() {
    let value = decode(b"(S'a'\nI1\nS'b'\nI2\nd.").unwrap();
    let dict = value.as_dict().unwrap();
    assert_eq!(dict.len(), 2);
    assert_eq!(dict.get(b"a".as_slice()), Some(&Value::Integer(1)));
    assert_eq!(dict.get(b"b".as_slice()), Some(&Value::Integer(2)));
}

#[test]
fn decodes_int_booleans() {
    assert_eq!(decode(b"I00\n.").unwrap(), Value::Bool(false));
    assert_eq!(decode(b"I01\n.").unwrap(), Value::Bool(true));
    assert_eq!(decode(b"I-7\n.").unwrap(), Value::Integer(-7));
}

#[test]
fn decodes_long_with_suffix() {
    assert_eq!(decode(b"L42L\n.").unwrap(), Value::Integer(42));
    assert_eq!(decode(b"L-3\n.").unwrap(), Value::Integer(-3));
}

#[test]
fn decodes_float_line() {
    assert_eq!(decode(b"F2.5\n.").unwrap(), Value::Float(2.5));
}

#[test]
fn decodes_list_and_tuple_from_mark() {
    let list = decode(b"(I1\nI2\nl.").unwrap();
    assert_eq!(
        list,
        Value::List(vec![Value::Integer(1), Value::Integer(2)])
    );

    let tuple = decode(b"(I1\nI2\nt.").unwrap();
    assert_eq!(
        tuple,
        Value::List(vec![Value::Integer(1), Value::Integer(2)])
    );
}

#[test]
fn decodes_append_and_appends() {
    assert_eq!(decode(b"]I7\na.").unwrap(), Value::List(vec![Value::Integer(7)]));
    assert_eq!(
        decode(b"](I1\nI2\ne.").unwrap(),
        Value::List(vec![Value::Integer(1), Value::Integer(2)])
    );
}

#[test]
fn decodes_protocol2_dict() {
    // PROTO 2, EMPTY_DICT, BINPUT 0, BINUNICODE "foo", BINPUT 1,
    // BININT1 42, SETITEM, STOP
    let data = b"\x80\x02}q\x00X\x03\x00\x00\x00fooq\x01K\x2as.";
    let value = decode(data).unwrap();
    let dict = value.as_dict().unwrap();
    assert_eq!(dict.get(b"foo".as_slice()), Some(&Value::Integer(42)));
}

#[test]
fn decodes_setitems_batch() {
    let value = decode(b"}(S'a'\nI1\nS'b'\nI2\nu.").unwrap();
    let dict = value.as_dict().unwrap();
    assert_eq!(dict.get(b"a".as_slice()), Some(&Value::Integer(1)));
    assert_eq!(dict.get(b"b".as_slice()), Some(&Value::Integer(2)));
}

#[test]
fn decodes_line_memo() {
    let value = decode(b"(S'x'\np0\ng0\nd.").unwrap();
    let dict = value.as_dict().unwrap();
    assert_eq!(
        dict.get(b"x".as_slice()),
        Some(&Value::Bytes(Bytes::from_static(b"x")))
    );
}

#[test]
fn decodes_binary_memo() {
    // EMPTY_LIST, BINPUT 0, BININT1 5, APPEND, POP, BINGET 0, STOP: the
    // memo snapshot was taken while the list was empty.
    let value = decode(b"]q\x00K\x05a0h\x00.").unwrap();
    assert_eq!(value, Value::List(vec![]));
}

#[test]
fn unknown_memo_key_fails() {
    assert!(matches!(
        decode(b"g9\n."),
        Err(PickleError::UnknownMemo(9))
    ));
}

#[test]
fn decodes_fixed_tuples() {
    assert_eq!(
        decode(b"I1\nI2\n\x86.").unwrap(),
        Value::List(vec![Value::Integer(1), Value::Integer(2)])
    );
    assert_eq!(
        decode(b"I1\nI2\nI3\n\x87.").unwrap(),
        Value::List(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3)
        ])
    );
}

#[test]
fn decodes_protocol2_booleans_and_none() {
    assert_eq!(decode(b"\x88.").unwrap(), Value::Bool(true));
    assert_eq!(decode(b"\x89.").unwrap(), Value::Bool(false));
    assert_eq!(decode(b"N.").unwrap(), Value::Null);
}

#[test]
fn decodes_binfloat() {
    let mut data = vec![b'G'];
    data.extend_from_slice(&1.5f64.to_be_bytes());
    data.push(b'.');
    assert_eq!(decode(&data).unwrap(), Value::Float(1.5));
}

#[test]
fn decodes_binint() {
    assert_eq!(decode(b"J\x2a\x00\x00\x00.").unwrap(), Value::Integer(42));
    assert_eq!(
        decode(b"J\xff\xff\xff\xff.").unwrap(),
        Value::Integer(-1)
    );
}

#[test]
fn decodes_global_and_newobj() {
    let marker = decode(b"c__builtin__\ndict\n.").unwrap();
    assert_eq!(marker, Value::Bytes(Bytes::from_static(b"__builtin__:dict")));

    let value = decode(b"c__builtin__\ndict\n)\x81.").unwrap();
    assert!(value.as_dict().unwrap().is_empty());
}

#[test]
fn inst_skips_class_and_builds_dict() {
    let value = decode(b"(S'k'\nI5\nimodule\nClassName\n.").unwrap();
    let dict = value.as_dict().unwrap();
    assert_eq!(dict.get(b"k".as_slice()), Some(&Value::Integer(5)));
}

#[test]
fn build_keeps_state_not_instance() {
    let value = decode(b"}S'state'\nb.").unwrap();
    assert_eq!(value, Value::Bytes(Bytes::from_static(b"state")));
}

#[test]
fn pop_mark_discards_to_mark() {
    assert_eq!(decode(b"N(I1\nI2\n1.").unwrap(), Value::Null);
}

#[test]
fn decodes_string_escapes() {
    assert_eq!(
        decode(b"S'a\\nb\\tc'\n.").unwrap(),
        Value::Bytes(Bytes::from_static(b"a\nb\tc"))
    );
    assert_eq!(
        decode(b"V\\u0041\n.").unwrap(),
        Value::Bytes(Bytes::from_static(b"A"))
    );
}

#[test]
fn decodes_surrogate_pair_to_utf8() {
    // U+1F600 encoded as a UTF-16 surrogate pair.
    let value = decode(b"V\\ud83d\\ude00\n.").unwrap();
    assert_eq!(
        value,
        Value::Bytes(Bytes::from_static("\u{1F600}".as_bytes()))
    );
}

#[test]
fn lone_high_surrogate_fails() {
    assert!(matches!(
        decode(b"V\\ud83dxx\n."),
        Err(PickleError::InvalidEscape)
    ));
}

#[test]
fn stops_exactly_at_stop_opcode() {
    let mut cursor = Cursor::new(b"N.garbage".to_vec());
    assert_eq!(decode_from(&mut cursor).unwrap(), Value::Null);
    assert_eq!(cursor.position(), 2);
}

#[test]
fn reduce_is_unsupported() {
    assert!(matches!(
        decode(b"R"),
        Err(PickleError::UnsupportedOpcode(b'R'))
    ));
}

#[test]
fn missing_stop_fails() {
    assert!(matches!(decode(b"I1\n"), Err(PickleError::MissingStop)));
}

#[test]
fn dangling_stack_fails() {
    assert!(matches!(
        decode(b"I1\nI2\n."),
        Err(PickleError::DanglingStack)
    ));
}
