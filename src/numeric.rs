//! Fixed-width, floating point and arbitrary-precision integer codecs.
//!
//! These are the leaf routines the decoder and encoder in [`crate::core`] are built on.
//! Every multi-byte quantity on the wire is big-endian, except the magnitude of a
//! bignum, which is little-endian.

use crate::*;
use num_bigint::{BigInt, BigUint, Sign};

/// Writes the low `byte_len` bytes of `value`, most significant byte first.
///
/// Bytes above `byte_len` are discarded; callers range-check before writing.
#[inline]
pub fn put_uint_be(writer: &mut BytesMut, value: u64, byte_len: usize) {
    debug_assert!(byte_len <= 8);
    for shift in (0..byte_len).rev() {
        writer.put_u8(((value >> (shift * 8)) & 0xff) as u8);
    }
}

/// Reads `byte_len` bytes as a big-endian unsigned integer.
///
/// # Errors
/// Returns `InsufficientData` if fewer than `byte_len` bytes remain.
#[inline]
pub fn get_uint_be(reader: &mut Bytes, byte_len: usize) -> Result<u64> {
    debug_assert!(byte_len <= 8);
    if reader.remaining() < byte_len {
        return Err(TermError::InsufficientData);
    }
    let mut value = 0u64;
    for _ in 0..byte_len {
        value = (value << 8) + reader.get_u8() as u64;
    }
    Ok(value)
}

/// Reads a 4-byte length or arity field.
#[inline]
pub(crate) fn get_len32(reader: &mut Bytes) -> Result<usize> {
    Ok(get_uint_be(reader, 4)? as usize)
}

/// Converts a finite `f64` into its 8-byte big-endian IEEE-754 wire form.
///
/// The native byte layout is reversed on little-endian hosts, so the output is
/// identical on every platform.
///
/// # Errors
/// Returns `Range` for NaN and the infinities, which the wire format cannot carry.
pub fn f64_to_wire(value: f64) -> Result<[u8; 8]> {
    if !value.is_finite() {
        return Err(TermError::Range(format!(
            "Non-finite float {} cannot be encoded",
            value
        )));
    }
    let mut bytes = value.to_bits().to_ne_bytes();
    if cfg!(target_endian = "little") {
        bytes.reverse();
    }
    Ok(bytes)
}

/// Converts an 8-byte big-endian IEEE-754 wire form into an `f64`.
///
/// # Errors
/// Returns `Format` if the bit pattern is NaN or an infinity.
pub fn f64_from_wire(mut bytes: [u8; 8]) -> Result<f64> {
    if cfg!(target_endian = "little") {
        bytes.reverse();
    }
    let value = f64::from_bits(u64::from_ne_bytes(bytes));
    if !value.is_finite() {
        return Err(TermError::Format(format!(
            "Non-finite float bit pattern 0x{:016X}",
            value.to_bits()
        )));
    }
    Ok(value)
}

#[inline]
pub(crate) fn put_f64(writer: &mut BytesMut, value: f64) -> Result<()> {
    writer.put_slice(&f64_to_wire(value)?);
    Ok(())
}

#[inline]
pub(crate) fn get_f64(reader: &mut Bytes) -> Result<f64> {
    if reader.remaining() < 8 {
        return Err(TermError::InsufficientData);
    }
    let mut bytes = [0u8; 8];
    reader.copy_to_slice(&mut bytes);
    f64_from_wire(bytes)
}

/// Splits a bignum into its wire sign byte (0 positive, 1 negative) and
/// little-endian magnitude bytes.
pub fn bignum_to_wire(value: &BigInt) -> (u8, Vec<u8>) {
    let (sign, magnitude) = value.to_bytes_le();
    let sign = match sign {
        Sign::Minus => 1,
        Sign::NoSign | Sign::Plus => 0,
    };
    (sign, magnitude)
}

/// Rebuilds a bignum as `sum(magnitude[i] * 256^i)`, negated when `sign` is non-zero.
pub fn bignum_from_wire(sign: u8, magnitude: &[u8]) -> BigInt {
    let magnitude = BigUint::from_bytes_le(magnitude);
    let sign = if sign == 0 { Sign::Plus } else { Sign::Minus };
    BigInt::from_biguint(sign, magnitude)
}

/// Reads the sign byte and `len` magnitude bytes of a SmallBig/Big payload.
pub(crate) fn get_bignum(reader: &mut Bytes, len: usize) -> Result<BigInt> {
    // Sign byte plus `len` magnitude bytes.
    if reader.remaining() <= len {
        return Err(TermError::InsufficientData);
    }
    let sign = reader.get_u8();
    let magnitude = reader.split_to(len);
    Ok(bignum_from_wire(sign, &magnitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_be_layout() {
        let mut writer = BytesMut::new();
        put_uint_be(&mut writer, 0x0102_0304, 4);
        assert_eq!(&writer[..], &[1, 2, 3, 4]);

        let mut writer = BytesMut::new();
        put_uint_be(&mut writer, 300, 2);
        assert_eq!(&writer[..], &[1, 44]);
    }

    #[test]
    fn test_uint_be_round_trip() {
        for byte_len in 1..=8usize {
            let max = if byte_len == 8 {
                u64::MAX
            } else {
                (1u64 << (byte_len * 8)) - 1
            };
            for value in [0, 1, 127, 128, 255, max / 3, max - 1, max] {
                let mut writer = BytesMut::new();
                put_uint_be(&mut writer, value, byte_len);
                assert_eq!(writer.len(), byte_len);
                let mut reader = writer.freeze();
                assert_eq!(get_uint_be(&mut reader, byte_len).unwrap(), value);
                assert!(reader.is_empty());
            }
        }
    }

    #[test]
    fn test_uint_be_truncated() {
        let mut reader = Bytes::from_static(&[0, 0, 1]);
        assert!(matches!(
            get_uint_be(&mut reader, 4),
            Err(TermError::InsufficientData)
        ));
    }

    #[test]
    fn test_f64_wire_is_big_endian() {
        assert_eq!(
            f64_to_wire(1.0).unwrap(),
            [0x3F, 0xF0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            f64_to_wire(-2.5).unwrap(),
            [0xC0, 0x04, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(f64_to_wire(2.75).unwrap(), 2.75f64.to_be_bytes());
        assert_eq!(
            f64_from_wire([0x40, 0x09, 0x21, 0xFB, 0x54, 0x44, 0x2D, 0x18]).unwrap(),
            std::f64::consts::PI
        );
    }

    #[test]
    fn test_f64_round_trip_is_exact() {
        for value in [0.0, -0.0, 1.5, -1e300, f64::MIN_POSITIVE, f64::MAX, 0.1 + 0.2] {
            let decoded = f64_from_wire(f64_to_wire(value).unwrap()).unwrap();
            assert_eq!(decoded.to_bits(), value.to_bits());
        }
    }

    #[test]
    fn test_f64_non_finite_rejected() {
        assert!(matches!(f64_to_wire(f64::NAN), Err(TermError::Range(_))));
        assert!(matches!(
            f64_to_wire(f64::INFINITY),
            Err(TermError::Range(_))
        ));
        assert!(matches!(
            f64_from_wire(f64::NEG_INFINITY.to_be_bytes()),
            Err(TermError::Format(_))
        ));
    }

    #[test]
    fn test_bignum_sign_magnitude() {
        assert_eq!(bignum_to_wire(&BigInt::from(258)), (0, vec![2, 1]));
        assert_eq!(bignum_to_wire(&BigInt::from(-258)), (1, vec![2, 1]));
        assert_eq!(bignum_from_wire(0, &[2, 1]), BigInt::from(258));
        assert_eq!(bignum_from_wire(7, &[2, 1]), BigInt::from(-258));
        assert_eq!(bignum_from_wire(0, &[]), BigInt::from(0));

        let mut reader = Bytes::from_static(&[0]);
        assert!(matches!(
            get_bignum(&mut reader, usize::MAX),
            Err(TermError::InsufficientData)
        ));
        let mut reader = Bytes::from_static(&[1, 2]);
        assert!(matches!(
            get_bignum(&mut reader, 2),
            Err(TermError::InsufficientData)
        ));

        let big = BigInt::from(u64::MAX) * BigInt::from(u64::MAX);
        let (sign, magnitude) = bignum_to_wire(&-big.clone());
        assert_eq!(bignum_from_wire(sign, &magnitude), -big);
    }
}
