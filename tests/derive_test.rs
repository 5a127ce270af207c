use bert_codec::{decode_slice, encode, FromTerm, Term, TermError, ToTerm, Value};
use bytes::Bytes;

// =============================================================================
// Structs
// =============================================================================

#[derive(ToTerm, FromTerm, Debug, PartialEq)]
struct User {
    id: u32,
    name: String,
    #[bert(rename = "mail")]
    email: Option<String>,
    #[bert(default)]
    tags: Vec<String>,
}

#[derive(ToTerm, FromTerm, Debug, PartialEq)]
struct Point(i32, i32);

#[derive(ToTerm, FromTerm, Debug, PartialEq)]
struct Ping;

#[derive(ToTerm, FromTerm, Debug, PartialEq)]
struct Envelope {
    from: Point,
    users: Vec<User>,
    ping: Ping,
}

fn round_trip<T: ToTerm + FromTerm>(value: &T) -> T {
    let bytes = encode(value).unwrap();
    decode_slice(&bytes).unwrap()
}

#[test]
fn test_named_struct_is_map_with_atom_keys() {
    let user = User {
        id: 7,
        name: "ann".to_string(),
        email: None,
        tags: vec![],
    };
    let term = user.to_term().unwrap();
    assert_eq!(
        term,
        Term::Map(vec![
            (Term::atom("id"), Term::Int(7)),
            (Term::atom("name"), Term::binary("ann")),
            (Term::atom("mail"), Term::atom("undefined")),
            (Term::atom("tags"), Term::Nil),
        ])
    );
    assert_eq!(round_trip(&user), user);
}

#[test]
fn test_named_struct_round_trip() {
    let user = User {
        id: 1_000_000,
        name: "bob".to_string(),
        email: Some("bob@example.com".to_string()),
        tags: vec!["admin".to_string(), "ops".to_string()],
    };
    assert_eq!(round_trip(&user), user);

    let bytes = encode(&user).unwrap();
    let value: Value = decode_slice(&bytes).unwrap();
    assert_eq!(value.get("mail").and_then(Value::as_str), Some("bob@example.com"));
    assert_eq!(value.get("id").and_then(Value::as_i64), Some(1_000_000));
}

#[test]
fn test_missing_fields() {
    // Option fields fall back to None, #[bert(default)] fields to Default.
    let term = Term::map(vec![
        (Term::atom("name"), Term::binary("cy")),
        (Term::atom("id"), Term::int(3)),
    ]);
    let user = User::from_term(term).unwrap();
    assert_eq!(
        user,
        User {
            id: 3,
            name: "cy".to_string(),
            email: None,
            tags: vec![],
        }
    );

    let term = Term::map(vec![(Term::atom("id"), Term::int(3))]);
    match User::from_term(term) {
        Err(TermError::Type(msg)) => assert!(msg.contains("name")),
        other => panic!("expected type error, got {:?}", other),
    }
}

#[test]
fn test_binary_keys_are_accepted() {
    let term = Term::map(vec![
        (Term::binary("id"), Term::int(9)),
        (Term::chars("name"), Term::binary("dee")),
    ]);
    let user = User::from_term(term).unwrap();
    assert_eq!(user.id, 9);
    assert_eq!(user.name, "dee");
}

#[test]
fn test_tuple_struct() {
    let bytes = encode(&Point(1, 2)).unwrap();
    assert_eq!(&bytes[..], &[131, 104, 2, 97, 1, 97, 2]);
    assert_eq!(round_trip(&Point(-5, 100_000)), Point(-5, 100_000));

    assert!(matches!(
        Point::from_term(Term::tuple(vec![Term::int(1)])),
        Err(TermError::Type(_))
    ));
}

#[test]
fn test_unit_struct() {
    assert_eq!(&encode(&Ping).unwrap()[..], &[131, 100, 0, 4, b'p', b'i', b'n', b'g']);
    assert_eq!(round_trip(&Ping), Ping);
    assert!(matches!(
        Ping::from_term(Term::atom("pong")),
        Err(TermError::Type(_))
    ));
}

#[test]
fn test_nested_struct() {
    let envelope = Envelope {
        from: Point(3, 4),
        users: vec![User {
            id: 1,
            name: "eve".to_string(),
            email: None,
            tags: vec!["x".to_string()],
        }],
        ping: Ping,
    };
    assert_eq!(round_trip(&envelope), envelope);
}

// =============================================================================
// Enums
// =============================================================================

#[derive(ToTerm, FromTerm, Debug, PartialEq)]
enum Reply {
    Ok,
    Error(String),
    Moved { node: String, port: u16 },
    #[bert(rename = "noreply")]
    NoReply,
    TimedOut(u32, Option<String>),
}

#[test]
fn test_unit_variant_is_atom() {
    assert_eq!(&encode(&Reply::Ok).unwrap()[..], &[131, 100, 0, 2, 111, 107]);
    assert_eq!(Reply::NoReply.to_term().unwrap(), Term::atom("noreply"));
    assert_eq!(Reply::TimedOut(5, None).to_term().unwrap(), Term::tuple(vec![
        Term::atom("timed_out"),
        Term::Int(5),
        Term::atom("undefined"),
    ]));
}

#[test]
fn test_tuple_variant_is_tagged_tuple() {
    let term = Reply::Error("closed".to_string()).to_term().unwrap();
    assert!(term.is_error_tuple());
    assert_eq!(
        term,
        Term::tuple(vec![Term::atom("error"), Term::binary("closed")])
    );
}

#[test]
fn test_enum_round_trip() {
    for reply in [
        Reply::Ok,
        Reply::Error("closed".to_string()),
        Reply::Moved {
            node: "beam@host".to_string(),
            port: 4369,
        },
        Reply::NoReply,
        Reply::TimedOut(30, Some("slow".to_string())),
    ] {
        assert_eq!(round_trip(&reply), reply);
    }
}

#[test]
fn test_unknown_variant() {
    match Reply::from_term(Term::atom("maybe")) {
        Err(TermError::Type(msg)) => assert!(msg.contains("maybe")),
        other => panic!("expected type error, got {:?}", other),
    }
    assert!(matches!(
        Reply::from_term(Term::int(1)),
        Err(TermError::Type(_))
    ));
}

#[test]
fn test_extra_variant_elements() {
    assert_eq!(
        Reply::from_term(Term::tuple(vec![Term::atom("ok")])).unwrap(),
        Reply::Ok
    );
    assert!(matches!(
        Reply::from_term(Term::tuple(vec![Term::atom("ok"), Term::int(1)])),
        Err(TermError::Type(_))
    ));
    assert!(matches!(
        Reply::from_term(Term::tuple(vec![
            Term::atom("error"),
            Term::binary("closed"),
            Term::atom("again"),
        ])),
        Err(TermError::Type(_))
    ));
    let moved = Term::tuple(vec![
        Term::atom("moved"),
        Term::map(vec![
            (Term::atom("node"), Term::binary("n")),
            (Term::atom("port"), Term::int(1)),
        ]),
        Term::Nil,
    ]);
    assert!(matches!(Reply::from_term(moved), Err(TermError::Type(_))));
}

#[test]
fn test_decode_from_foreign_bytes() {
    // {error, <<"closed">>} as another encoder would write it.
    let bytes = [
        131, 104, 2, 100, 0, 5, b'e', b'r', b'r', b'o', b'r', 109, 0, 0, 0, 6, b'c', b'l', b'o',
        b's', b'e', b'd',
    ];
    let reply: Reply = decode_slice(&bytes).unwrap();
    assert_eq!(reply, Reply::Error("closed".to_string()));

    let raw: Bytes = decode_slice(&[131, 109, 0, 0, 0, 1, 0xFF]).unwrap();
    assert_eq!(&raw[..], &[0xFF]);
}
