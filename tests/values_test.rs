use bert_codec::{decode_slice, encode, Term, TermError, Value, MAX_ENCODABLE};
use bytes::Bytes;
use num_bigint::BigInt;
use std::collections::HashMap;

fn round_trip(value: &Value) -> Value {
    let bytes = encode(value).unwrap();
    decode_slice(&bytes).unwrap()
}

fn atom(s: &str) -> Value {
    Value::Atom(s.to_string())
}

fn binary(s: &'static str) -> Value {
    Value::Binary(Bytes::from_static(s.as_bytes()))
}

// =============================================================================
// Tag inference
// =============================================================================

#[test]
fn test_inference_table() {
    assert_eq!(Term::infer(Value::Null).unwrap(), Term::Nil);
    assert_eq!(Term::infer(Value::Integer(5)).unwrap(), Term::Int(5));
    assert_eq!(Term::infer(Value::Float(0.5)).unwrap(), Term::NewFloat(0.5));
    assert_eq!(Term::infer(atom("ok")).unwrap(), Term::Atom("ok".to_string()));
    assert_eq!(
        Term::infer(Value::Text("hi".to_string())).unwrap(),
        Term::binary("hi")
    );
    assert_eq!(Term::infer(Value::List(vec![])).unwrap(), Term::Nil);
    assert_eq!(
        Term::infer(Value::Tuple(vec![Value::Integer(1)])).unwrap(),
        Term::Tuple(vec![Term::Int(1)])
    );
    assert_eq!(
        Term::infer(Value::BigInteger(BigInt::from(3))).unwrap(),
        Term::Big(BigInt::from(3))
    );
}

#[test]
fn test_text_becomes_binary() {
    assert_eq!(
        round_trip(&Value::Text("thing".to_string())),
        binary("thing")
    );
}

#[test]
fn test_null_becomes_empty_list() {
    assert_eq!(&encode(&Value::Null).unwrap()[..], &[131, 106]);
    assert_eq!(round_trip(&Value::Null), Value::List(vec![]));
}

#[test]
fn test_unsupported_values_are_type_errors() {
    for value in [
        Value::Pid("node<1>".to_string()),
        Value::Port("node<2>".to_string()),
    ] {
        match Term::infer(value) {
            Err(TermError::Type(msg)) => assert!(msg.contains("explicit tagged value")),
            other => panic!("expected type error, got {:?}", other),
        }
    }
    // Nested too.
    assert!(matches!(
        encode(&Value::List(vec![Value::Integer(1), Value::Pid("n<1>".to_string())])),
        Err(TermError::Type(_))
    ));
}

#[test]
fn test_untagged_integer_range() {
    assert!(matches!(
        Term::infer(Value::Integer(MAX_ENCODABLE + 1)),
        Err(TermError::Range(_))
    ));
    assert!(matches!(
        encode(&Value::Integer(i64::MIN)),
        Err(TermError::Range(_))
    ));
    assert_eq!(
        round_trip(&Value::Integer(-MAX_ENCODABLE - 1)),
        Value::Integer(-MAX_ENCODABLE - 1)
    );
}

#[test]
fn test_integer_round_trip_over_range() {
    for i in [0, 1, 254, 255, 256, 65_535, 65_536, MAX_ENCODABLE - 1, MAX_ENCODABLE] {
        assert_eq!(round_trip(&Value::Integer(i)), Value::Integer(i));
    }
    for i in (0..=MAX_ENCODABLE).step_by(104_729) {
        assert_eq!(round_trip(&Value::Integer(i)), Value::Integer(i));
    }
}

// =============================================================================
// Constructors
// =============================================================================

#[test]
fn test_sequence_constructors() {
    let items = Value::List(vec![Value::Integer(1), atom("a")]);
    assert_eq!(
        Term::tuple_from(items.clone()).unwrap(),
        Term::Tuple(vec![Term::Int(1), Term::atom("a")])
    );
    assert_eq!(
        Term::list_from(Value::Tuple(vec![Value::Integer(1)])).unwrap(),
        Term::List(vec![Term::Int(1)])
    );

    assert!(matches!(
        Term::tuple_from(Value::Integer(1)),
        Err(TermError::Construction(_))
    ));
    assert!(matches!(
        Term::list_from(Value::Text("abc".to_string())),
        Err(TermError::Construction(_))
    ));
}

#[test]
fn test_map_constructor() {
    let pairs = Value::List(vec![
        Value::Tuple(vec![atom("a"), Value::Integer(1)]),
        Value::Tuple(vec![Value::Integer(2), binary("b")]),
    ]);
    assert_eq!(
        Term::map_from(pairs).unwrap(),
        Term::Map(vec![
            (Term::atom("a"), Term::Int(1)),
            (Term::Int(2), Term::binary("b")),
        ])
    );

    assert!(matches!(
        Term::map_from(Value::Integer(1)),
        Err(TermError::Construction(_))
    ));
    assert!(matches!(
        Term::map_from(Value::List(vec![Value::Integer(1)])),
        Err(TermError::Construction(_))
    ));
    assert!(matches!(
        Term::map_from(Value::List(vec![Value::Tuple(vec![atom("a")])])),
        Err(TermError::Construction(_))
    ));
}

// =============================================================================
// Maps
// =============================================================================

#[test]
fn test_tagged_map_keeps_atom_keys() {
    let term = Term::map(vec![(Term::atom("swamp"), Term::binary("thing"))]);
    let bytes = encode(&term).unwrap();
    let value: Value = decode_slice(&bytes).unwrap();
    assert_eq!(value, Value::Map(vec![(atom("swamp"), binary("thing"))]));
}

#[test]
fn test_plain_mapping_keys_become_text() {
    let mut mapping = HashMap::new();
    mapping.insert("swamp", "thing");
    let bytes = encode(&mapping).unwrap();
    let value: Value = decode_slice(&bytes).unwrap();
    match &value {
        Value::Map(pairs) => {
            assert_eq!(pairs.len(), 1);
            assert_eq!(pairs[0].0, binary("swamp"));
            assert_ne!(pairs[0].0, atom("swamp"));
        }
        other => panic!("expected map, got {:?}", other),
    }
    assert_eq!(value.get("swamp"), Some(&binary("thing")));
}

#[test]
fn test_host_map_keeps_key_types() {
    let value = Value::Map(vec![
        (atom("k"), Value::Integer(1)),
        (Value::Integer(2), Value::Tuple(vec![])),
    ]);
    assert_eq!(round_trip(&value), value);
}

// =============================================================================
// Structure
// =============================================================================

#[test]
fn test_nested_round_trip() {
    let value = Value::Tuple(vec![
        atom("ok"),
        Value::List(vec![
            Value::Integer(-5),
            Value::Float(2.5),
            binary("x"),
            Value::BigInteger(BigInt::from(1u8) << 100usize),
            Value::Map(vec![(atom("k"), Value::Tuple(vec![]))]),
        ]),
    ]);
    assert_eq!(round_trip(&value), value);
}

#[test]
fn test_error_tuple() {
    let bytes = encode(&Value::Tuple(vec![atom("error"), atom("closed")])).unwrap();
    let term: Term = decode_slice(&bytes).unwrap();
    assert!(term.is_error_tuple());

    let ok: Term = decode_slice(&encode(&Value::Tuple(vec![atom("ok"), atom("x")])).unwrap())
        .unwrap();
    assert!(!ok.is_error_tuple());
    assert!(!Term::tuple(vec![Term::atom("error")]).is_error_tuple());
}

#[test]
fn test_char_list_decodes_as_text() {
    let value: Value = decode_slice(&[131, 107, 0, 1, 0xE9]).unwrap();
    assert_eq!(value, Value::Text("é".to_string()));
    // Each byte is one code point, even when the bytes would form valid UTF-8.
    let value: Value = decode_slice(&[131, 107, 0, 2, 0xC3, 0xA9]).unwrap();
    assert_eq!(value, Value::Text("Ã©".to_string()));

    let code_points: Vec<u32> = decode_slice(&[131, 107, 0, 2, 0xE9, b'a']).unwrap();
    assert_eq!(code_points, vec![0xE9, 97]);
}

#[test]
fn test_display() {
    let value = Value::Tuple(vec![
        atom("ok"),
        Value::List(vec![Value::Integer(1), binary("a")]),
        Value::Map(vec![(atom("k"), Value::Float(1.0))]),
    ]);
    assert_eq!(value.to_string(), "{ok,[1,<<\"a\">>],#{k => 1.0}}");
}
