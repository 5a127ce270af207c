//! # bert-codec
//!
//! Encoder and decoder for BERT, the binary subset of Erlang's External Term Format.
//!
//! - Every frame starts with the version marker `131`, followed by one tagged term
//! - [`Term`] is the tagged value model; its variant alone decides the wire layout
//! - [`Value`] is the untagged host value; encoding infers a tag for it
//! - [`ToTerm`] / [`FromTerm`] convert Rust types, with derive macros for structs and enums
//! - Bignums are arbitrary precision (`num_bigint::BigInt`); nothing is silently truncated
//!
//! Only term encoding is covered. Framing, connection handling and the Erlang distribution
//! handshake belong to the transport.
//!
//! ## Derive Attributes
//!
//! - `#[bert(rename = "name")]`: Use the given atom instead of the snake_case field/variant name.
//! - `#[bert(default)]`: If a field is missing during decoding, its value is set to `Default::default()`.
//!
//! ## Feature Flags
//!
//! - `serde_json`: Converts `serde_json::Value` using the same inference as [`Value`].
//! - `indexmap`: Encodes `IndexMap` as a plain mapping, preserving insertion order.

pub mod core;
mod features;
pub mod numeric;
pub mod term;

use bytes::{Buf, BufMut, Bytes, BytesMut};
pub use bert_codec_derive::{FromTerm, ToTerm};
pub use crate::core::{
    decode_value, encode_value, Tag, MAX_DEPTH, MAX_ENCODABLE, VERSION_MARKER,
};
#[doc(hidden)]
pub use features::derive_support as __private;
use log::{debug, trace};
pub use term::{Identifier, Term, Value};

/// Errors that can occur during encoding or decoding operations.
#[derive(Debug, thiserror::Error)]
pub enum TermError {
    /// Malformed input: bad version marker, unknown tag, missing list terminator
    /// or an unparseable payload.
    #[error("Format error: {0}")]
    Format(String),
    /// A length, arity or integer exceeds what the encoder accepts.
    #[error("Range error: {0}")]
    Range(String),
    /// A value has no wire type, or a term does not fit the requested Rust type.
    #[error("Type error: {0}")]
    Type(String),
    /// A constructor received an argument of the wrong shape.
    #[error("Construction error: {0}")]
    Construction(String),
    /// The buffer did not contain enough data to complete the operation.
    #[error("Insufficient data in buffer")]
    InsufficientData,
}

/// The result type used throughout this crate for encode/decode operations.
pub type Result<T> = std::result::Result<T, TermError>;

/// Types that can be turned into a [`Term`].
///
/// Most users should use `#[derive(ToTerm)]` instead of a manual implementation.
pub trait ToTerm {
    /// Build the tagged term for this value.
    ///
    /// # Errors
    /// Returns `Type` or `Range` if the value has no wire representation.
    fn to_term(&self) -> Result<Term>;
}

/// Types that can be built from a decoded [`Term`].
///
/// Most users should use `#[derive(FromTerm)]` instead of a manual implementation.
pub trait FromTerm: Sized {
    /// Convert a decoded term into this type.
    ///
    /// # Errors
    /// Returns `Type` if the term has the wrong shape, `Range` if a number does not fit.
    fn from_term(term: Term) -> Result<Self>;
}

/// Encodes a value as a complete frame: the version marker followed by one term.
///
/// Untagged values go through tag inference first; see [`Term::infer`].
///
/// # Example
/// ```rust
/// use bert_codec::{encode, Term};
///
/// let bytes = encode(&Term::int(42)).unwrap();
/// assert_eq!(&bytes[..], &[131, 97, 42]);
///
/// let bytes = encode(&Term::atom("ok")).unwrap();
/// assert_eq!(&bytes[..], &[131, 100, 0, 2, 111, 107]);
/// ```
pub fn encode<T: ToTerm + ?Sized>(value: &T) -> Result<Bytes> {
    let term = value.to_term()?;
    encode_term(&term)
}

/// Encodes an already tagged term as a complete frame.
pub fn encode_term(term: &Term) -> Result<Bytes> {
    let mut writer = BytesMut::new();
    writer.put_u8(VERSION_MARKER);
    encode_value(term, &mut writer)?;
    trace!("encoded {} term into {} bytes", term.kind(), writer.len());
    Ok(writer.freeze())
}

/// Decodes one frame from the front of `reader` and converts it to `T`.
///
/// Bytes after the frame are left in `reader`.
///
/// # Example
/// ```rust
/// use bert_codec::{decode, Value};
/// use bytes::Bytes;
///
/// let mut reader = Bytes::from_static(&[131, 108, 0, 0, 0, 2, 97, 1, 97, 2, 106]);
/// let value: Value = decode(&mut reader).unwrap();
/// assert_eq!(value, Value::List(vec![Value::Integer(1), Value::Integer(2)]));
/// ```
pub fn decode<T: FromTerm>(reader: &mut Bytes) -> Result<T> {
    T::from_term(decode_term(reader)?)
}

/// Decodes one frame from the front of `reader`, keeping the tags.
///
/// # Errors
/// Returns `Format` if the first byte is not [`VERSION_MARKER`].
pub fn decode_term(reader: &mut Bytes) -> Result<Term> {
    if reader.remaining() == 0 {
        return Err(TermError::InsufficientData);
    }
    let marker = reader.get_u8();
    if marker != VERSION_MARKER {
        debug!("rejecting frame with marker {}", marker);
        return Err(TermError::Format(format!(
            "Expected version marker {}, got {}",
            VERSION_MARKER, marker
        )));
    }
    decode_value(reader)
}

/// Decodes a slice holding exactly one frame.
///
/// # Errors
/// Returns `Format` if bytes remain after the frame.
pub fn decode_slice<T: FromTerm>(bytes: &[u8]) -> Result<T> {
    let mut reader = Bytes::copy_from_slice(bytes);
    let value = decode(&mut reader)?;
    if reader.has_remaining() {
        return Err(TermError::Format(format!(
            "{} trailing bytes after term",
            reader.remaining()
        )));
    }
    Ok(value)
}
