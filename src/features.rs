#[cfg(feature = "indexmap")]
use indexmap::IndexMap;
#[cfg(feature = "serde_json")]
use serde_json::{Map, Number};

use crate::*;
use num_bigint::BigInt;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

fn type_error(expected: &str, term: &Term) -> TermError {
    TermError::Type(format!("Expected {}, got {}", expected, term.kind()))
}

// --- Term / Value ---
impl ToTerm for Term {
    fn to_term(&self) -> Result<Term> {
        Ok(self.clone())
    }
}
impl FromTerm for Term {
    fn from_term(term: Term) -> Result<Self> {
        Ok(term)
    }
}

/// Encodes a host value through tag inference.
impl ToTerm for Value {
    fn to_term(&self) -> Result<Term> {
        Term::infer(self.clone())
    }
}
impl FromTerm for Value {
    fn from_term(term: Term) -> Result<Self> {
        Ok(term.into_value())
    }
}

// --- References ---
impl<T: ToTerm + ?Sized> ToTerm for &T {
    fn to_term(&self) -> Result<Term> {
        (**self).to_term()
    }
}
impl<T: ToTerm + ?Sized> ToTerm for Box<T> {
    fn to_term(&self) -> Result<Term> {
        (**self).to_term()
    }
}
impl<T: FromTerm> FromTerm for Box<T> {
    fn from_term(term: Term) -> Result<Self> {
        Ok(Box::new(T::from_term(term)?))
    }
}

// --- bool ---
/// Encodes a `bool` as the atom `true` or `false`.
impl ToTerm for bool {
    fn to_term(&self) -> Result<Term> {
        Ok(Term::atom(if *self { "true" } else { "false" }))
    }
}
impl FromTerm for bool {
    fn from_term(term: Term) -> Result<Self> {
        match term.as_atom() {
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            _ => Err(type_error("atom true or false", &term)),
        }
    }
}

// --- Integers ---
fn integer_of(term: Term) -> Result<BigInt> {
    match term {
        Term::SmallInt(i) => Ok(BigInt::from(i)),
        Term::Int(i) => Ok(BigInt::from(i)),
        Term::SmallBig(b) | Term::Big(b) => Ok(b),
        other => Err(type_error("integer", &other)),
    }
}

/// Integers inside the `Int` range encode as `Int`; anything wider becomes a bignum,
/// which the encoder writes with the SmallBig tag.
macro_rules! impl_integer {
    ($($t:ty),*) => {
        $(
            impl ToTerm for $t {
                fn to_term(&self) -> Result<Term> {
                    match i64::try_from(*self) {
                        Ok(i) if (-MAX_ENCODABLE - 1..=MAX_ENCODABLE).contains(&i) => {
                            Ok(Term::Int(i))
                        }
                        _ => Ok(Term::Big(BigInt::from(*self))),
                    }
                }
            }
            impl FromTerm for $t {
                fn from_term(term: Term) -> Result<Self> {
                    let value = integer_of(term)?;
                    <$t>::try_from(&value).map_err(|_| {
                        TermError::Range(format!(
                            "Value {} too large for {}",
                            value,
                            stringify!($t)
                        ))
                    })
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl ToTerm for BigInt {
    fn to_term(&self) -> Result<Term> {
        Ok(Term::Big(self.clone()))
    }
}
impl FromTerm for BigInt {
    fn from_term(term: Term) -> Result<Self> {
        integer_of(term)
    }
}

// --- f32/f64 ---
impl ToTerm for f64 {
    fn to_term(&self) -> Result<Term> {
        Ok(Term::NewFloat(*self))
    }
}
/// Decodes an `f64` from either float form; integers are accepted as well.
impl FromTerm for f64 {
    fn from_term(term: Term) -> Result<Self> {
        match term {
            Term::NewFloat(f) | Term::Float(f) => Ok(f),
            Term::SmallInt(i) => Ok(i as f64),
            Term::Int(i) => Ok(i as f64),
            other => Err(type_error("float", &other)),
        }
    }
}
impl ToTerm for f32 {
    fn to_term(&self) -> Result<Term> {
        Ok(Term::NewFloat(*self as f64))
    }
}
impl FromTerm for f32 {
    fn from_term(term: Term) -> Result<Self> {
        let value = f64::from_term(term)?;
        if value.abs() > f32::MAX as f64 {
            return Err(TermError::Range(format!("Value {} too large for f32", value)));
        }
        Ok(value as f32)
    }
}

// --- Text and bytes ---
/// Encodes text as a `Binary`, the same as untagged text.
impl ToTerm for str {
    fn to_term(&self) -> Result<Term> {
        Ok(Term::binary(self.to_owned()))
    }
}
impl ToTerm for String {
    fn to_term(&self) -> Result<Term> {
        self.as_str().to_term()
    }
}
/// Decodes a `String` from a UTF-8 binary, a char list, or an atom.
impl FromTerm for String {
    fn from_term(term: Term) -> Result<Self> {
        match term {
            Term::Binary(b) => {
                String::from_utf8(b.to_vec()).map_err(|e| TermError::Type(e.to_string()))
            }
            Term::CharList(b) => Ok(crate::term::chars_to_text(&b)),
            Term::Atom(s) | Term::SmallAtom(s) | Term::AtomUtf8(s) | Term::SmallAtomUtf8(s) => {
                Ok(s)
            }
            Term::Nil => Ok(String::new()),
            other => Err(type_error("text", &other)),
        }
    }
}
impl ToTerm for Bytes {
    fn to_term(&self) -> Result<Term> {
        Ok(Term::Binary(self.clone()))
    }
}
impl FromTerm for Bytes {
    fn from_term(term: Term) -> Result<Self> {
        match term {
            Term::Binary(b) | Term::CharList(b) => Ok(b),
            Term::Nil => Ok(Bytes::new()),
            other => Err(type_error("binary", &other)),
        }
    }
}

// --- Option ---
/// Encodes `None` as the atom `undefined`.
impl<T: ToTerm> ToTerm for Option<T> {
    fn to_term(&self) -> Result<Term> {
        match self {
            Some(value) => value.to_term(),
            None => Ok(Term::atom("undefined")),
        }
    }
}
impl<T: FromTerm> FromTerm for Option<T> {
    fn from_term(term: Term) -> Result<Self> {
        if term.as_atom() == Some("undefined") {
            return Ok(None);
        }
        T::from_term(term).map(Some)
    }
}

// --- Sequences ---
/// Encodes a slice as a `List`, or `Nil` when empty.
impl<T: ToTerm> ToTerm for [T] {
    fn to_term(&self) -> Result<Term> {
        if self.is_empty() {
            return Ok(Term::Nil);
        }
        let items = self.iter().map(T::to_term).collect::<Result<Vec<_>>>()?;
        Ok(Term::List(items))
    }
}
impl<T: ToTerm> ToTerm for Vec<T> {
    fn to_term(&self) -> Result<Term> {
        self.as_slice().to_term()
    }
}
impl<T: ToTerm, const N: usize> ToTerm for [T; N] {
    fn to_term(&self) -> Result<Term> {
        self.as_slice().to_term()
    }
}
/// Decodes a `Vec<T>` from `Nil`, a `List`, or a char list (one integer per code point).
impl<T: FromTerm> FromTerm for Vec<T> {
    fn from_term(term: Term) -> Result<Self> {
        match term {
            Term::Nil => Ok(Vec::new()),
            Term::List(items) => items.into_iter().map(T::from_term).collect(),
            Term::CharList(bytes) => crate::term::char_codes(&bytes)
                .into_iter()
                .map(|c| T::from_term(Term::Int(c as i64)))
                .collect(),
            other => Err(type_error("list", &other)),
        }
    }
}

// --- Tuple ---
/// Implements conversion for Rust tuples up to 8 elements as Erlang tuples.
macro_rules! impl_tuple {
    ($len:expr => $($T:ident : $idx:tt),+) => {
        impl<$($T: ToTerm),+> ToTerm for ($($T,)+) {
            fn to_term(&self) -> Result<Term> {
                Ok(Term::Tuple(vec![$(self.$idx.to_term()?,)+]))
            }
        }
        impl<$($T: FromTerm),+> FromTerm for ($($T,)+) {
            fn from_term(term: Term) -> Result<Self> {
                let mut items = derive_support::expect_tuple(term, $len, "tuple")?.into_iter();
                Ok(($(
                    $T::from_term(derive_support::next_element(&mut items, "tuple")?)?,
                )+))
            }
        }
    };
}

impl_tuple!(1 => T0: 0);
impl_tuple!(2 => T0: 0, T1: 1);
impl_tuple!(3 => T0: 0, T1: 1, T2: 2);
impl_tuple!(4 => T0: 0, T1: 1, T2: 2, T3: 3);
impl_tuple!(5 => T0: 0, T1: 1, T2: 2, T3: 3, T4: 4);
impl_tuple!(6 => T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5);
impl_tuple!(7 => T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6);
impl_tuple!(8 => T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7);

// --- Maps ---
// Plain mappings: every key is coerced to a Binary.
fn mapping_to_term<'a, K, V, I>(entries: I) -> Result<Term>
where
    K: AsRef<str> + 'a,
    V: ToTerm + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let mut pairs = Vec::new();
    for (k, v) in entries {
        pairs.push((k.as_ref(), v.to_term()?));
    }
    Ok(Term::map_from_mapping(pairs))
}

fn collect_pairs<K, V, C>(term: Term) -> Result<C>
where
    K: FromTerm,
    V: FromTerm,
    C: FromIterator<(K, V)>,
{
    let pairs = match term {
        Term::Map(pairs) => pairs,
        other => return Err(type_error("map", &other)),
    };
    pairs
        .into_iter()
        .map(|(k, v)| -> Result<(K, V)> { Ok((K::from_term(k)?, V::from_term(v)?)) })
        .collect()
}

impl<K: AsRef<str>, V: ToTerm, S: BuildHasher> ToTerm for HashMap<K, V, S> {
    fn to_term(&self) -> Result<Term> {
        mapping_to_term(self.iter())
    }
}
impl<K, V, S> FromTerm for HashMap<K, V, S>
where
    K: FromTerm + Eq + Hash,
    V: FromTerm,
    S: BuildHasher + Default,
{
    fn from_term(term: Term) -> Result<Self> {
        collect_pairs(term)
    }
}
impl<K: AsRef<str>, V: ToTerm> ToTerm for BTreeMap<K, V> {
    fn to_term(&self) -> Result<Term> {
        mapping_to_term(self.iter())
    }
}
impl<K: FromTerm + Ord, V: FromTerm> FromTerm for BTreeMap<K, V> {
    fn from_term(term: Term) -> Result<Self> {
        collect_pairs(term)
    }
}

// --- IndexMap ---
#[cfg(feature = "indexmap")]
impl<K: AsRef<str>, V: ToTerm, S: BuildHasher> ToTerm for IndexMap<K, V, S> {
    fn to_term(&self) -> Result<Term> {
        mapping_to_term(self.iter())
    }
}
#[cfg(feature = "indexmap")]
impl<K, V, S> FromTerm for IndexMap<K, V, S>
where
    K: FromTerm + Eq + Hash,
    V: FromTerm,
    S: BuildHasher + Default,
{
    fn from_term(term: Term) -> Result<Self> {
        collect_pairs(term)
    }
}

// --- serde_json::Value ---
/// Converts JSON through the same inference as untagged host values. Objects are
/// plain mappings, so their keys become binaries. Booleans have no inferred wire
/// type and are rejected.
#[cfg(feature = "serde_json")]
fn json_to_value(json: &serde_json::Value) -> Result<Value> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => {
            return Err(TermError::Type(format!(
                "unsupported value ({}) - provide an explicit tagged value",
                b
            )))
        }
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(u) = n.as_u64() {
                return Err(TermError::Range(format!(
                    "Integer {} exceeds the encodable range",
                    u
                )));
            } else {
                Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Array(items) => {
            Value::List(items.iter().map(json_to_value).collect::<Result<_>>()?)
        }
        serde_json::Value::Object(obj) => {
            let mut pairs = Vec::with_capacity(obj.len());
            for (k, v) in obj {
                pairs.push((Value::Binary(Bytes::from(k.clone())), json_to_value(v)?));
            }
            Value::Map(pairs)
        }
    })
}

#[cfg(feature = "serde_json")]
impl ToTerm for serde_json::Value {
    fn to_term(&self) -> Result<Term> {
        Term::infer(json_to_value(self)?)
    }
}

/// Decodes JSON from any term without a Pid/Port: atoms `true`/`false` become
/// booleans, other atoms and all text become strings, tuples become arrays.
#[cfg(feature = "serde_json")]
impl FromTerm for serde_json::Value {
    fn from_term(term: Term) -> Result<Self> {
        Ok(match term {
            Term::Nil => serde_json::Value::Array(Vec::new()),
            Term::SmallInt(i) => serde_json::Value::Number(Number::from(i)),
            Term::Int(i) => serde_json::Value::Number(Number::from(i)),
            Term::NewFloat(f) | Term::Float(f) => Number::from_f64(f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| TermError::Range(format!("Float {} is not valid JSON", f)))?,
            Term::Atom(s) | Term::SmallAtom(s) | Term::AtomUtf8(s) | Term::SmallAtomUtf8(s) => {
                match s.as_str() {
                    "true" => serde_json::Value::Bool(true),
                    "false" => serde_json::Value::Bool(false),
                    _ => serde_json::Value::String(s),
                }
            }
            t @ (Term::CharList(_) | Term::Binary(_)) => {
                serde_json::Value::String(String::from_term(t)?)
            }
            Term::SmallTuple(items) | Term::Tuple(items) | Term::List(items) => {
                serde_json::Value::Array(
                    items
                        .into_iter()
                        .map(serde_json::Value::from_term)
                        .collect::<Result<_>>()?,
                )
            }
            Term::Map(pairs) => {
                let mut obj = Map::with_capacity(pairs.len());
                for (k, v) in pairs {
                    obj.insert(String::from_term(k)?, serde_json::Value::from_term(v)?);
                }
                serde_json::Value::Object(obj)
            }
            Term::SmallBig(b) | Term::Big(b) => {
                if let Ok(i) = i64::try_from(&b) {
                    serde_json::Value::Number(Number::from(i))
                } else if let Ok(u) = u64::try_from(&b) {
                    serde_json::Value::Number(Number::from(u))
                } else {
                    return Err(TermError::Range(format!("Integer {} is too large for JSON", b)));
                }
            }
            other @ (Term::Pid(_) | Term::Port(_)) => return Err(type_error("JSON value", &other)),
        })
    }
}

/// Helpers called from `#[derive(ToTerm, FromTerm)]` expansions.
pub mod derive_support {
    use crate::*;

    /// Removes and returns the value stored under `name`, matching atom and text keys.
    pub fn take_field(pairs: &mut Vec<(Term, Term)>, name: &str) -> Option<Term> {
        let index = pairs.iter().position(|(key, _)| match key {
            Term::Binary(b) | Term::CharList(b) => &b[..] == name.as_bytes(),
            other => other.as_atom() == Some(name),
        })?;
        Some(pairs.swap_remove(index).1)
    }

    pub fn expect_map(term: Term, type_name: &str) -> Result<Vec<(Term, Term)>> {
        match term {
            Term::Map(pairs) => Ok(pairs),
            other => Err(TermError::Type(format!(
                "Expected map for {}, got {}",
                type_name,
                other.kind()
            ))),
        }
    }

    pub fn expect_tuple(term: Term, arity: usize, type_name: &str) -> Result<Vec<Term>> {
        match term {
            Term::SmallTuple(items) | Term::Tuple(items) if items.len() == arity => Ok(items),
            Term::SmallTuple(items) | Term::Tuple(items) => Err(TermError::Type(format!(
                "Expected {}-tuple for {}, got {}-tuple",
                arity,
                type_name,
                items.len()
            ))),
            other => Err(TermError::Type(format!(
                "Expected tuple for {}, got {}",
                type_name,
                other.kind()
            ))),
        }
    }

    pub fn expect_atom(term: Term, name: &str, type_name: &str) -> Result<()> {
        match term.as_atom() {
            Some(atom) if atom == name => Ok(()),
            _ => Err(TermError::Type(format!(
                "Expected atom {} for {}, got {}",
                name,
                type_name,
                term.kind()
            ))),
        }
    }

    /// Splits an enum term into its variant name and remaining elements: a bare atom
    /// for unit variants, `{name, ...}` otherwise.
    pub fn variant(term: Term, type_name: &str) -> Result<(String, Vec<Term>)> {
        if let Some(name) = term.as_atom() {
            return Ok((name.to_owned(), Vec::new()));
        }
        match term {
            Term::SmallTuple(mut items) | Term::Tuple(mut items) if !items.is_empty() => {
                let rest = items.split_off(1);
                match items[0].as_atom() {
                    Some(name) => Ok((name.to_owned(), rest)),
                    None => Err(TermError::Type(format!(
                        "Expected variant atom for {}, got {}",
                        type_name,
                        items[0].kind()
                    ))),
                }
            }
            other => Err(TermError::Type(format!(
                "Expected atom or tagged tuple for {}, got {}",
                type_name,
                other.kind()
            ))),
        }
    }

    pub fn next_element(items: &mut std::vec::IntoIter<Term>, type_name: &str) -> Result<Term> {
        items.next().ok_or_else(|| {
            TermError::Type(format!("Too few elements for {}", type_name))
        })
    }

    /// Fails if a variant tuple carries more elements than its fields consumed.
    pub fn expect_end(items: std::vec::IntoIter<Term>, type_name: &str) -> Result<()> {
        let extra = items.len();
        if extra != 0 {
            return Err(TermError::Type(format!(
                "{} unexpected elements for {}",
                extra, type_name
            )));
        }
        Ok(())
    }

    pub fn missing_field(field: &str, type_name: &str) -> TermError {
        TermError::Type(format!(
            "Required field '{}' not found for {}",
            field, type_name
        ))
    }

    pub fn unknown_variant(name: &str, type_name: &str) -> TermError {
        TermError::Type(format!("Unknown variant '{}' for enum {}", name, type_name))
    }
}
