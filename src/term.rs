//! The tagged value model flowing through the codec.
//!
//! [`Term`] is the tagged form: its variant alone decides the wire layout.
//! [`Value`] is the untagged host form returned by [`crate::decode`] and accepted by
//! [`crate::encode`], which turns it into a `Term` through [`Term::infer`].

use crate::core::MAX_ENCODABLE;
use crate::*;
use num_bigint::BigInt;
use std::fmt;

/// Node atom and numeric fields of a Pid or Port.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// The node atom, decoded as a full term.
    pub node: Box<Term>,
    pub id: u32,
    /// Present for Pids only.
    pub serial: Option<u32>,
    pub creation: u8,
}

impl Identifier {
    /// The display form `node<id>` a Pid or Port unwraps to.
    pub fn display_name(&self) -> String {
        let node = match self.node.as_ref() {
            Term::Atom(s) | Term::SmallAtom(s) | Term::AtomUtf8(s) | Term::SmallAtomUtf8(s) => {
                s.clone()
            }
            other => format!("{:?}", other),
        };
        format!("{}<{}>", node, self.id)
    }
}

/// A tagged value: a wire type plus its payload.
///
/// The integer, tuple and bignum families are compacted by the encoder (`Int(42)` is
/// written with the SmallInt tag, a 3-element `Tuple` with the SmallTuple tag), so the
/// decoded variant may be the compact sibling of the one encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// The empty list.
    Nil,
    SmallInt(u8),
    Int(i64),
    NewFloat(f64),
    /// Legacy 31-byte ASCII float. Re-encodes as `NewFloat`.
    Float(f64),
    Atom(String),
    SmallAtom(String),
    AtomUtf8(String),
    SmallAtomUtf8(String),
    /// A char list, held as UTF-8 text. Bytes that are not valid UTF-8 are read as
    /// Latin-1, one code point per byte.
    CharList(Bytes),
    Binary(Bytes),
    SmallTuple(Vec<Term>),
    Tuple(Vec<Term>),
    List(Vec<Term>),
    Map(Vec<(Term, Term)>),
    Port(Identifier),
    Pid(Identifier),
    SmallBig(BigInt),
    Big(BigInt),
}

/// An untagged host value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    BigInteger(BigInt),
    Float(f64),
    Atom(String),
    Text(String),
    Binary(Bytes),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Ordered key/value pairs; key types are preserved.
    Map(Vec<(Value, Value)>),
    /// Display form of a decoded Pid. Not encodable.
    Pid(String),
    /// Display form of a decoded Port. Not encodable.
    Port(String),
}

impl Term {
    pub fn atom(name: impl Into<String>) -> Self {
        Term::Atom(name.into())
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Term::Binary(data.into())
    }

    pub fn chars(text: impl Into<Bytes>) -> Self {
        Term::CharList(text.into())
    }

    pub fn int(value: i64) -> Self {
        Term::Int(value)
    }

    pub fn float(value: f64) -> Self {
        Term::NewFloat(value)
    }

    pub fn big(value: impl Into<BigInt>) -> Self {
        Term::Big(value.into())
    }

    pub fn tuple(elements: Vec<Term>) -> Self {
        Term::Tuple(elements)
    }

    pub fn list(elements: Vec<Term>) -> Self {
        Term::List(elements)
    }

    pub fn map(pairs: Vec<(Term, Term)>) -> Self {
        Term::Map(pairs)
    }

    /// Builds a `Tuple` from a host sequence, inferring each element.
    ///
    /// # Errors
    /// Returns `Construction` unless `value` is a `List` or `Tuple`.
    pub fn tuple_from(value: Value) -> Result<Self> {
        match value {
            Value::List(items) | Value::Tuple(items) => {
                Ok(Term::Tuple(Self::infer_all(items)?))
            }
            other => Err(TermError::Construction(format!(
                "Tuple requires an ordered sequence, got {}",
                other.kind()
            ))),
        }
    }

    /// Builds a `List` from a host sequence, inferring each element.
    ///
    /// # Errors
    /// Returns `Construction` unless `value` is a `List` or `Tuple`.
    pub fn list_from(value: Value) -> Result<Self> {
        match value {
            Value::List(items) | Value::Tuple(items) => Ok(Term::List(Self::infer_all(items)?)),
            other => Err(TermError::Construction(format!(
                "List requires an ordered sequence, got {}",
                other.kind()
            ))),
        }
    }

    /// Builds a `Map` from either a host `Map` or a sequence of 2-tuples.
    /// Key types are preserved in both cases.
    ///
    /// # Errors
    /// Returns `Construction` for any other shape, including sequence elements that are
    /// not 2-tuples.
    pub fn map_from(value: Value) -> Result<Self> {
        let pairs = match value {
            Value::Map(pairs) => pairs,
            Value::List(items) | Value::Tuple(items) => {
                let mut pairs = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Tuple(mut kv) if kv.len() == 2 => {
                            let v = kv.pop();
                            let k = kv.pop();
                            if let (Some(k), Some(v)) = (k, v) {
                                pairs.push((k, v));
                            }
                        }
                        other => {
                            return Err(TermError::Construction(format!(
                                "Map entries must be (key, value) pairs, got {}",
                                other.kind()
                            )))
                        }
                    }
                }
                pairs
            }
            other => {
                return Err(TermError::Construction(format!(
                    "Map requires pairs or a mapping, got {}",
                    other.kind()
                )))
            }
        };
        let mut terms = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            terms.push((Term::infer(k)?, Term::infer(v)?));
        }
        Ok(Term::Map(terms))
    }

    /// Builds a `Map` from a plain mapping; every key becomes a `Binary`.
    pub fn map_from_mapping<K, I>(entries: I) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Term)>,
    {
        Term::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Term::binary(k.as_ref().to_owned()), v))
                .collect(),
        )
    }

    /// Picks the wire type for an untagged host value.
    ///
    /// # Errors
    /// Returns `Type` for Pid/Port display strings, and `Range` for integers
    /// outside the encodable range.
    pub fn infer(value: Value) -> Result<Self> {
        Ok(match value {
            Value::Null => Term::Nil,
            Value::Integer(i) => {
                if i > MAX_ENCODABLE || i < -MAX_ENCODABLE - 1 {
                    return Err(TermError::Range(format!(
                        "Integer {} exceeds the encodable range; use an explicit Big term",
                        i
                    )));
                }
                Term::Int(i)
            }
            Value::BigInteger(b) => Term::Big(b),
            Value::Float(f) => Term::NewFloat(f),
            Value::Atom(s) => Term::Atom(s),
            Value::Text(s) => Term::Binary(Bytes::from(s)),
            Value::Binary(b) => Term::Binary(b),
            Value::List(items) if items.is_empty() => Term::Nil,
            Value::List(items) => Term::List(Self::infer_all(items)?),
            Value::Tuple(items) => Term::Tuple(Self::infer_all(items)?),
            Value::Map(_) => return Self::map_from(value),
            Value::Pid(_) | Value::Port(_) => {
                return Err(TermError::Type(format!(
                    "unsupported value ({}) - provide an explicit tagged value",
                    value.kind()
                )))
            }
        })
    }

    fn infer_all(items: Vec<Value>) -> Result<Vec<Term>> {
        items.into_iter().map(Term::infer).collect()
    }

    /// Unwraps to the host value.
    pub fn into_value(self) -> Value {
        match self {
            Term::Nil => Value::List(Vec::new()),
            Term::SmallInt(i) => Value::Integer(i as i64),
            Term::Int(i) => Value::Integer(i),
            Term::NewFloat(f) | Term::Float(f) => Value::Float(f),
            Term::Atom(s) | Term::SmallAtom(s) | Term::AtomUtf8(s) | Term::SmallAtomUtf8(s) => {
                Value::Atom(s)
            }
            Term::CharList(b) => Value::Text(chars_to_text(&b)),
            Term::Binary(b) => Value::Binary(b),
            Term::SmallTuple(items) | Term::Tuple(items) => {
                Value::Tuple(items.into_iter().map(Term::into_value).collect())
            }
            Term::List(items) => Value::List(items.into_iter().map(Term::into_value).collect()),
            Term::Map(pairs) => Value::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.into_value(), v.into_value()))
                    .collect(),
            ),
            Term::Port(id) => Value::Port(id.display_name()),
            Term::Pid(id) => Value::Pid(id.display_name()),
            Term::SmallBig(b) | Term::Big(b) => Value::BigInteger(b),
        }
    }

    /// Text of any atom variant.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Term::Atom(s) | Term::SmallAtom(s) | Term::AtomUtf8(s) | Term::SmallAtomUtf8(s) => {
                Some(s)
            }
            _ => None,
        }
    }

    /// Elements of any tuple variant.
    pub fn as_tuple(&self) -> Option<&[Term]> {
        match self {
            Term::SmallTuple(items) | Term::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Elements of a list; `Nil` is the empty list.
    pub fn as_list(&self) -> Option<&[Term]> {
        match self {
            Term::Nil => Some(&[]),
            Term::List(items) => Some(items),
            _ => None,
        }
    }

    /// True for the two-element `{error, Reason}` shape transports route to their
    /// error path.
    pub fn is_error_tuple(&self) -> bool {
        matches!(self.as_tuple(), Some([tag, _]) if tag.as_atom() == Some("error"))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Term::Nil => "nil",
            Term::SmallInt(_) => "small integer",
            Term::Int(_) => "integer",
            Term::NewFloat(_) | Term::Float(_) => "float",
            Term::Atom(_) | Term::SmallAtom(_) | Term::AtomUtf8(_) | Term::SmallAtomUtf8(_) => {
                "atom"
            }
            Term::CharList(_) => "string",
            Term::Binary(_) => "binary",
            Term::SmallTuple(_) | Term::Tuple(_) => "tuple",
            Term::List(_) => "list",
            Term::Map(_) => "map",
            Term::Port(_) => "port",
            Term::Pid(_) => "pid",
            Term::SmallBig(_) | Term::Big(_) => "bignum",
        }
    }
}

impl Value {
    /// Text of an atom, string, or UTF-8 binary.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Atom(s) | Value::Text(s) | Value::Pid(s) | Value::Port(s) => Some(s),
            Value::Binary(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::BigInteger(b) => i64::try_from(b).ok(),
            _ => None,
        }
    }

    /// Looks up `key` in a map by text, matching atom, string and binary keys alike.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::BigInteger(_) => "big integer",
            Value::Float(_) => "float",
            Value::Atom(_) => "atom",
            Value::Text(_) => "text",
            Value::Binary(_) => "binary",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
            Value::Pid(_) => "pid",
            Value::Port(_) => "port",
        }
    }
}

/// Char list bytes are UTF-8 when they validate, and Latin-1 code points otherwise.
pub(crate) fn chars_to_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(_) => bytes.iter().map(|&c| c as char).collect(),
    }
}

/// Code points of a char list, read the same way as [`chars_to_text`].
pub(crate) fn char_codes(bytes: &[u8]) -> Vec<u32> {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.chars().map(u32::from).collect(),
        Err(_) => bytes.iter().map(|&c| c as u32).collect(),
    }
}

impl From<Term> for Value {
    fn from(term: Term) -> Self {
        term.into_value()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn seq(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", item)?;
            }
            Ok(())
        }
        match self {
            Value::Null => f.write_str("null"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::BigInteger(b) => write!(f, "{}", b),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Atom(s) => f.write_str(s),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Binary(b) => match std::str::from_utf8(b) {
                Ok(s) => write!(f, "<<{:?}>>", s),
                Err(_) => write!(f, "<<{} bytes>>", b.len()),
            },
            Value::List(items) => {
                f.write_str("[")?;
                seq(f, items)?;
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("{")?;
                seq(f, items)?;
                f.write_str("}")
            }
            Value::Map(pairs) => {
                f.write_str("#{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{} => {}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Pid(s) | Value::Port(s) => f.write_str(s),
        }
    }
}
