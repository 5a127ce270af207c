//! Tag registry, decoder and encoder.
//!
//! A tag is written as the first byte of each encoded value and decides how the
//! payload that follows is read. Tag values are fixed by the Erlang runtime and are
//! part of the wire format.

use crate::numeric::{
    bignum_to_wire, get_bignum, get_f64, get_len32, get_uint_be, put_f64, put_uint_be,
};
use crate::term::{char_codes, chars_to_text, Identifier};
use crate::*;
use log::{debug, trace};

/// Leading byte of every complete frame.
pub const VERSION_MARKER: u8 = 131;

/// Largest length, arity or `Int` magnitude the encoder accepts (2^27 - 1).
/// Deliberately below the 4-byte wire limit.
pub const MAX_ENCODABLE: i64 = (1 << 27) - 1;

/// Deepest container nesting the decoder accepts. The top-level term is depth 0.
pub const MAX_DEPTH: usize = 128;

///< IEEE-754 double, 8 bytes big-endian
pub const TAG_NEW_FLOAT: u8 = 70;
///< Unsigned 8-bit integer
pub const TAG_SMALL_INT: u8 = 97;
///< Signed 32-bit integer, big-endian
pub const TAG_INT: u8 = 98;
///< Legacy float, 31 bytes of ASCII
pub const TAG_FLOAT: u8 = 99;
pub const TAG_ATOM: u8 = 100;
pub const TAG_PORT: u8 = 102;
pub const TAG_PID: u8 = 103;
pub const TAG_SMALL_TUPLE: u8 = 104;
pub const TAG_TUPLE: u8 = 105;
///< Empty list, also the terminator of every `TAG_LIST`
pub const TAG_NIL: u8 = 106;
///< Char list with a 2-byte length
pub const TAG_STRING: u8 = 107;
pub const TAG_LIST: u8 = 108;
pub const TAG_BINARY: u8 = 109;
pub const TAG_SMALL_BIG: u8 = 110;
pub const TAG_BIG: u8 = 111;
pub const TAG_SMALL_ATOM: u8 = 115;
pub const TAG_MAP: u8 = 116;
pub const TAG_ATOM_UTF8: u8 = 118;
pub const TAG_SMALL_ATOM_UTF8: u8 = 119;

/// A registered wire type. The discriminant is the tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    NewFloat = TAG_NEW_FLOAT,
    SmallInt = TAG_SMALL_INT,
    Int = TAG_INT,
    Float = TAG_FLOAT,
    Atom = TAG_ATOM,
    Port = TAG_PORT,
    Pid = TAG_PID,
    SmallTuple = TAG_SMALL_TUPLE,
    Tuple = TAG_TUPLE,
    Nil = TAG_NIL,
    String = TAG_STRING,
    List = TAG_LIST,
    Binary = TAG_BINARY,
    SmallBig = TAG_SMALL_BIG,
    Big = TAG_BIG,
    SmallAtom = TAG_SMALL_ATOM,
    Map = TAG_MAP,
    AtomUtf8 = TAG_ATOM_UTF8,
    SmallAtomUtf8 = TAG_SMALL_ATOM_UTF8,
}

impl Tag {
    /// Every registered tag, in wire order.
    pub const ALL: [Tag; 19] = [
        Tag::NewFloat,
        Tag::SmallInt,
        Tag::Int,
        Tag::Float,
        Tag::Atom,
        Tag::Port,
        Tag::Pid,
        Tag::SmallTuple,
        Tag::Tuple,
        Tag::Nil,
        Tag::String,
        Tag::List,
        Tag::Binary,
        Tag::SmallBig,
        Tag::Big,
        Tag::SmallAtom,
        Tag::Map,
        Tag::AtomUtf8,
        Tag::SmallAtomUtf8,
    ];

    /// Looks up a tag byte in the registry.
    pub const fn from_byte(byte: u8) -> Option<Tag> {
        Some(match byte {
            TAG_NEW_FLOAT => Tag::NewFloat,
            TAG_SMALL_INT => Tag::SmallInt,
            TAG_INT => Tag::Int,
            TAG_FLOAT => Tag::Float,
            TAG_ATOM => Tag::Atom,
            TAG_PORT => Tag::Port,
            TAG_PID => Tag::Pid,
            TAG_SMALL_TUPLE => Tag::SmallTuple,
            TAG_TUPLE => Tag::Tuple,
            TAG_NIL => Tag::Nil,
            TAG_STRING => Tag::String,
            TAG_LIST => Tag::List,
            TAG_BINARY => Tag::Binary,
            TAG_SMALL_BIG => Tag::SmallBig,
            TAG_BIG => Tag::Big,
            TAG_SMALL_ATOM => Tag::SmallAtom,
            TAG_MAP => Tag::Map,
            TAG_ATOM_UTF8 => Tag::AtomUtf8,
            TAG_SMALL_ATOM_UTF8 => Tag::SmallAtomUtf8,
            _ => return None,
        })
    }

    #[inline]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

// --- Decoder ---

/// Decodes one tagged value from the front of `reader`, leaving the remainder.
///
/// No version marker is expected; see [`crate::decode_term`] for whole frames.
///
/// # Errors
/// `Format` for unknown tags, malformed payloads and missing list terminators,
/// `InsufficientData` when a declared length runs past the input. Containers nested
/// deeper than [`MAX_DEPTH`] are a `Format` error as well.
pub fn decode_value(reader: &mut Bytes) -> Result<Term> {
    decode_nested(reader, 0)
}

fn decode_nested(reader: &mut Bytes, depth: usize) -> Result<Term> {
    if depth > MAX_DEPTH {
        debug!("rejecting term nested deeper than {}", MAX_DEPTH);
        return Err(TermError::Format(format!(
            "Term nesting exceeds maximum depth {}",
            MAX_DEPTH
        )));
    }
    if reader.remaining() == 0 {
        return Err(TermError::InsufficientData);
    }
    let byte = reader.get_u8();
    let tag = Tag::from_byte(byte).ok_or_else(|| {
        debug!("rejecting term with unknown tag {}", byte);
        TermError::Format(format!("Unknown tag: {}", byte))
    })?;
    decode_tagged(tag, reader, depth)
}

fn decode_tagged(tag: Tag, reader: &mut Bytes, depth: usize) -> Result<Term> {
    match tag {
        Tag::SmallInt => Ok(Term::SmallInt(get_uint_be(reader, 1)? as u8)),
        Tag::Int => Ok(Term::Int(get_uint_be(reader, 4)? as u32 as i32 as i64)),
        Tag::NewFloat => Ok(Term::NewFloat(get_f64(reader)?)),
        Tag::Float => decode_legacy_float(reader).map(Term::Float),
        Tag::Atom => Ok(Term::Atom(decode_latin1_text(reader, 2)?)),
        Tag::SmallAtom => Ok(Term::SmallAtom(decode_latin1_text(reader, 1)?)),
        Tag::AtomUtf8 => Ok(Term::AtomUtf8(decode_utf8_text(reader, 2)?)),
        Tag::SmallAtomUtf8 => Ok(Term::SmallAtomUtf8(decode_utf8_text(reader, 1)?)),
        Tag::Port => {
            let node = decode_node(reader, depth + 1)?;
            let id = get_uint_be(reader, 4)? as u32;
            let creation = get_uint_be(reader, 1)? as u8;
            Ok(Term::Port(Identifier {
                node: Box::new(node),
                id,
                serial: None,
                creation,
            }))
        }
        Tag::Pid => {
            let node = decode_node(reader, depth + 1)?;
            let id = get_uint_be(reader, 4)? as u32;
            let serial = get_uint_be(reader, 4)? as u32;
            let creation = get_uint_be(reader, 1)? as u8;
            Ok(Term::Pid(Identifier {
                node: Box::new(node),
                id,
                serial: Some(serial),
                creation,
            }))
        }
        Tag::SmallTuple => {
            let arity = get_uint_be(reader, 1)? as usize;
            decode_elements(reader, arity, depth + 1).map(Term::SmallTuple)
        }
        Tag::Tuple => {
            let arity = get_len32(reader)?;
            decode_elements(reader, arity, depth + 1).map(Term::Tuple)
        }
        Tag::Nil => Ok(Term::Nil),
        Tag::String => {
            let len = get_uint_be(reader, 2)? as usize;
            take(reader, len).map(decode_latin1_chars)
        }
        Tag::List => {
            let len = get_len32(reader)?;
            let elements = decode_elements(reader, len, depth + 1)?;
            if reader.remaining() == 0 || reader.get_u8() != TAG_NIL {
                debug!("rejecting list of {} elements without nil terminator", len);
                return Err(TermError::Format(
                    "List is not terminated by nil".to_string(),
                ));
            }
            Ok(Term::List(elements))
        }
        Tag::Binary => {
            let len = get_len32(reader)?;
            take(reader, len).map(Term::Binary)
        }
        Tag::SmallBig => {
            let len = get_uint_be(reader, 1)? as usize;
            get_bignum(reader, len).map(Term::SmallBig)
        }
        Tag::Big => {
            let len = get_len32(reader)?;
            get_bignum(reader, len).map(Term::Big)
        }
        Tag::Map => {
            let arity = get_len32(reader)?;
            // Each pair takes at least two bytes.
            let mut pairs = Vec::with_capacity(arity.min(reader.remaining() / 2));
            for _ in 0..arity {
                let key = decode_nested(reader, depth + 1)?;
                let value = decode_nested(reader, depth + 1)?;
                pairs.push((key, value));
            }
            Ok(Term::Map(pairs))
        }
    }
}

fn decode_elements(reader: &mut Bytes, count: usize, depth: usize) -> Result<Vec<Term>> {
    // Never reserve more than the input could hold; the count comes off the wire.
    let mut elements = Vec::with_capacity(count.min(reader.remaining()));
    for _ in 0..count {
        elements.push(decode_nested(reader, depth)?);
    }
    Ok(elements)
}

#[inline]
fn take(reader: &mut Bytes, len: usize) -> Result<Bytes> {
    if reader.remaining() < len {
        return Err(TermError::InsufficientData);
    }
    Ok(reader.split_to(len))
}

/// Each byte of the string form is one code point; the term keeps them as UTF-8.
fn decode_latin1_chars(raw: Bytes) -> Term {
    if raw.is_ascii() {
        return Term::CharList(raw);
    }
    let text: String = raw.iter().map(|&b| b as char).collect();
    Term::CharList(Bytes::from(text))
}

fn decode_latin1_text(reader: &mut Bytes, len_bytes: usize) -> Result<String> {
    let len = get_uint_be(reader, len_bytes)? as usize;
    Ok(chars_to_text(&take(reader, len)?))
}

fn decode_utf8_text(reader: &mut Bytes, len_bytes: usize) -> Result<String> {
    let len = get_uint_be(reader, len_bytes)? as usize;
    let bytes = take(reader, len)?;
    String::from_utf8(bytes.to_vec()).map_err(|e| TermError::Format(e.to_string()))
}

fn decode_node(reader: &mut Bytes, depth: usize) -> Result<Term> {
    let node = decode_nested(reader, depth)?;
    if node.as_atom().is_none() {
        return Err(TermError::Format(format!(
            "Expected atom as node name, got {}",
            node.kind()
        )));
    }
    Ok(node)
}

/// Parses the legacy float form: a NUL-padded 31-byte decimal string.
fn decode_legacy_float(reader: &mut Bytes) -> Result<f64> {
    let raw = take(reader, 31)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let text = std::str::from_utf8(&raw[..end])
        .map_err(|e| TermError::Format(e.to_string()))?
        .trim();
    let value: f64 = text
        .parse()
        .map_err(|_| TermError::Format(format!("Invalid legacy float text: {:?}", text)))?;
    if !value.is_finite() {
        return Err(TermError::Format(format!(
            "Non-finite legacy float: {:?}",
            text
        )));
    }
    Ok(value)
}

// --- Encoder ---

/// Appends the wire form of `term` to `writer`, without a version marker.
///
/// Integers, tuples and bignums are written with the most compact tag of their family.
///
/// # Errors
/// `Range` when a length, arity or integer exceeds [`MAX_ENCODABLE`] (or the width of
/// a small tag that was asked for explicitly), or when a float is not finite.
pub fn encode_value(term: &Term, writer: &mut BytesMut) -> Result<()> {
    match term {
        Term::Nil => writer.put_u8(TAG_NIL),
        Term::SmallInt(i) => {
            writer.put_u8(TAG_SMALL_INT);
            writer.put_u8(*i);
        }
        Term::Int(i) => encode_int(*i, writer)?,
        Term::NewFloat(f) | Term::Float(f) => {
            writer.put_u8(TAG_NEW_FLOAT);
            put_f64(writer, *f)?;
        }
        Term::Atom(s) => encode_text(TAG_ATOM, 2, s.as_bytes(), writer)?,
        Term::SmallAtom(s) => encode_text(TAG_SMALL_ATOM, 1, s.as_bytes(), writer)?,
        Term::AtomUtf8(s) => encode_text(TAG_ATOM_UTF8, 2, s.as_bytes(), writer)?,
        Term::SmallAtomUtf8(s) => encode_text(TAG_SMALL_ATOM_UTF8, 1, s.as_bytes(), writer)?,
        Term::CharList(chars) => encode_chars(chars, writer)?,
        Term::Binary(data) => {
            check_len(data.len(), "Binary")?;
            writer.put_u8(TAG_BINARY);
            put_uint_be(writer, data.len() as u64, 4);
            writer.put_slice(data);
        }
        Term::SmallTuple(items) | Term::Tuple(items) => {
            if items.len() < 256 {
                writer.put_u8(TAG_SMALL_TUPLE);
                writer.put_u8(items.len() as u8);
            } else {
                check_len(items.len(), "Tuple")?;
                writer.put_u8(TAG_TUPLE);
                put_uint_be(writer, items.len() as u64, 4);
            }
            for item in items {
                encode_value(item, writer)?;
            }
        }
        Term::List(items) => {
            check_len(items.len(), "List")?;
            writer.put_u8(TAG_LIST);
            put_uint_be(writer, items.len() as u64, 4);
            for item in items {
                encode_value(item, writer)?;
            }
            writer.put_u8(TAG_NIL);
        }
        Term::Map(pairs) => {
            check_len(pairs.len(), "Map")?;
            writer.put_u8(TAG_MAP);
            put_uint_be(writer, pairs.len() as u64, 4);
            for (key, value) in pairs {
                encode_value(key, writer)?;
                encode_value(value, writer)?;
            }
        }
        Term::Port(id) => {
            writer.put_u8(TAG_PORT);
            encode_value(&id.node, writer)?;
            put_uint_be(writer, id.id as u64, 4);
            writer.put_u8(id.creation);
        }
        Term::Pid(id) => {
            writer.put_u8(TAG_PID);
            encode_value(&id.node, writer)?;
            put_uint_be(writer, id.id as u64, 4);
            put_uint_be(writer, id.serial.unwrap_or(0) as u64, 4);
            writer.put_u8(id.creation);
        }
        Term::SmallBig(value) | Term::Big(value) => {
            let (sign, magnitude) = bignum_to_wire(value);
            if magnitude.len() < 256 {
                writer.put_u8(TAG_SMALL_BIG);
                writer.put_u8(magnitude.len() as u8);
            } else {
                check_len(magnitude.len(), "Big")?;
                writer.put_u8(TAG_BIG);
                put_uint_be(writer, magnitude.len() as u64, 4);
            }
            writer.put_u8(sign);
            writer.put_slice(&magnitude);
        }
    }
    Ok(())
}

#[inline]
fn check_len(len: usize, what: &str) -> Result<()> {
    if len as u64 > MAX_ENCODABLE as u64 {
        return Err(TermError::Range(format!(
            "{} length {} exceeds maximum {}",
            what, len, MAX_ENCODABLE
        )));
    }
    Ok(())
}

fn encode_int(value: i64, writer: &mut BytesMut) -> Result<()> {
    if (0..256).contains(&value) {
        writer.put_u8(TAG_SMALL_INT);
        writer.put_u8(value as u8);
    } else if (-MAX_ENCODABLE - 1..=MAX_ENCODABLE).contains(&value) {
        writer.put_u8(TAG_INT);
        put_uint_be(writer, value as i32 as u32 as u64, 4);
    } else {
        return Err(TermError::Range(format!(
            "Integer {} exceeds maximum {}",
            value, MAX_ENCODABLE
        )));
    }
    Ok(())
}

fn encode_text(tag: u8, len_bytes: usize, text: &[u8], writer: &mut BytesMut) -> Result<()> {
    let max = (1usize << (len_bytes * 8)) - 1;
    if text.len() > max {
        return Err(TermError::Range(format!(
            "Text of {} bytes does not fit a {}-byte length for tag {}",
            text.len(),
            len_bytes,
            tag
        )));
    }
    writer.put_u8(tag);
    put_uint_be(writer, text.len() as u64, len_bytes);
    writer.put_slice(text);
    Ok(())
}

/// Writes a char list in the string form, one byte per code point. Lists with more
/// than 65535 code points, or any code point above 255, are written as a list of
/// integers instead.
fn encode_chars(chars: &[u8], writer: &mut BytesMut) -> Result<()> {
    let code_points = char_codes(chars);
    if code_points.len() <= u16::MAX as usize && code_points.iter().all(|&c| c <= 0xFF) {
        writer.put_u8(TAG_STRING);
        put_uint_be(writer, code_points.len() as u64, 2);
        writer.extend(code_points.iter().map(|&c| c as u8));
        return Ok(());
    }
    trace!("char list of {} code points written as list", code_points.len());
    check_len(code_points.len(), "List")?;
    writer.put_u8(TAG_LIST);
    put_uint_be(writer, code_points.len() as u64, 4);
    for c in code_points {
        encode_int(c as i64, writer)?;
    }
    writer.put_u8(TAG_NIL);
    Ok(())
}
