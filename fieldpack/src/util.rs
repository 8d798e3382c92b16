//! Buffer guards and packed-decimal digit helpers shared by the codecs.

use crate::error::Error;
use bytes::{Buf, Bytes};

/// Checks that `buf` has at least `n` more bytes.
pub(crate) fn at_least(buf: &mut dyn Buf, n: usize) -> Result<(), Error> {
    if buf.remaining() < n {
        return Err(Error::end_of_buffer(n, buf.remaining()));
    }
    Ok(())
}

/// Consumes and returns exactly `n` bytes from `buf`.
pub(crate) fn take(buf: &mut dyn Buf, n: usize) -> Result<Bytes, Error> {
    at_least(buf, n)?;
    Ok(buf.copy_to_bytes(n))
}

/// Converts a string of decimal digits to their numeric values.
///
/// Fails on any non-digit character.
pub(crate) fn to_digits(s: &str) -> Result<Vec<u8>, Error> {
    s.chars()
        .map(|c| {
            c.to_digit(10)
                .map(|d| d as u8)
                .ok_or_else(|| Error::invalid(format!("non-decimal character {c:?}")))
        })
        .collect()
}

/// Renders the decimal digits of `value` left-zero-padded to `width` digits.
///
/// Fails if `value` does not fit in `width` digits.
pub(crate) fn decimal_digits(value: u64, width: usize) -> Result<Vec<u8>, Error> {
    let mut digits = vec![0u8; width];
    let mut rest = value;
    for slot in digits.iter_mut().rev() {
        *slot = (rest % 10) as u8;
        rest /= 10;
    }
    if rest != 0 {
        return Err(Error::invalid(format!(
            "value {value} does not fit in {width} decimal digits"
        )));
    }
    Ok(digits)
}

/// Packs nibble values (digits 0-9 or the pad nibble 0xF) two per byte.
///
/// The nibble count must be even; padding policy is the caller's concern.
pub(crate) fn pack_nibbles(nibbles: &[u8]) -> Vec<u8> {
    debug_assert!(nibbles.len() % 2 == 0);
    nibbles
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect()
}

/// Unpacks bytes into their high and low nibbles.
pub(crate) fn unpack_nibbles(bytes: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(bytes.len() * 2);
    for byte in bytes {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0F);
    }
    nibbles
}

/// Folds decimal digit values into a number, checking for overflow.
pub(crate) fn fold_decimal(digits: &[u8]) -> Result<u64, Error> {
    let mut value: u64 = 0;
    for &d in digits {
        if d > 9 {
            return Err(Error::invalid(format!("nibble {d:#x} is not a decimal digit")));
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(d as u64))
            .ok_or_else(|| Error::invalid("decimal value overflows u64"))?;
    }
    Ok(value)
}

/// Folds bytes big-endian into a number.
///
/// Fails if more than eight bytes are given.
pub(crate) fn fold_be(bytes: &[u8]) -> Result<u64, Error> {
    if bytes.len() > 8 {
        return Err(Error::invalid(format!(
            "{} tag bytes do not fit in u64",
            bytes.len()
        )));
    }
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_insufficient() {
        let mut buf = &[0x01u8][..];
        assert!(matches!(
            take(&mut buf, 2),
            Err(Error::EndOfBuffer { need: 2, have: 1, .. })
        ));
    }

    #[test]
    fn test_nibble_round_trip() {
        let nibbles = [1u8, 2, 3, 0xF];
        let packed = pack_nibbles(&nibbles);
        assert_eq!(packed, vec![0x12, 0x3F]);
        assert_eq!(unpack_nibbles(&packed), nibbles.to_vec());
    }

    #[test]
    fn test_decimal_digits() {
        assert_eq!(decimal_digits(90, 2).unwrap(), vec![9, 0]);
        assert_eq!(decimal_digits(7, 4).unwrap(), vec![0, 0, 0, 7]);
        assert!(decimal_digits(100, 2).is_err());
    }

    #[test]
    fn test_fold_decimal_rejects_pad() {
        assert_eq!(fold_decimal(&[1, 2, 3]).unwrap(), 123);
        assert!(fold_decimal(&[1, 0xF]).is_err());
    }

    #[test]
    fn test_fold_be() {
        assert_eq!(fold_be(&[0x01, 0x00]).unwrap(), 256);
        assert!(fold_be(&[0; 9]).is_err());
    }
}
