//! Bijective integer <-> path segment encoding
//!
//! Integers are written as little-endian base-2^27 digits, one path segment
//! per digit, least significant first:
//!
//! ```text
//! 0              -> /0
//! 2^27 - 1       -> /134217727
//! 2^27           -> /0/1
//! 2 * 2^27 + 100 -> /100/2
//! ```
//!
//! Every digit stays well below the BIP32 hardened boundary (2^31), so the
//! encoded segments can be spliced into a non-hardened derivation path. A
//! millisecond timestamp needs two segments until the year ~570,000.

use std::fmt::Write;

use crate::error::CryptoError;

/// Radix of a single path digit (2^27).
pub const PATH_DIGIT_BASE: u64 = 0x800_0000;

/// Split `value` into little-endian base-2^27 digits.
///
/// Always returns at least one digit.
pub fn int_to_segments(value: u64) -> Vec<u32> {
    let mut digits = Vec::with_capacity(3);
    let mut remaining = value;
    loop {
        digits.push((remaining % PATH_DIGIT_BASE) as u32);
        remaining /= PATH_DIGIT_BASE;
        if remaining == 0 {
            break;
        }
    }
    digits
}

/// Fold little-endian base-2^27 digits back into an integer.
///
/// Returns `None` for an empty slice, a digit outside the radix, or a value
/// that does not fit in `u64`.
pub fn segments_to_int(segments: &[u32]) -> Option<u64> {
    if segments.is_empty() {
        return None;
    }

    segments.iter().rev().try_fold(0u64, |acc, &digit| {
        let digit = u64::from(digit);
        if digit >= PATH_DIGIT_BASE {
            return None;
        }
        acc.checked_mul(PATH_DIGIT_BASE)?.checked_add(digit)
    })
}

/// Parse one decimal path segment in its canonical spelling.
///
/// Only ASCII digits, and no leading zero unless the segment is `0`. Signs,
/// padding and whitespace are rejected so each index has one text form.
pub(crate) fn parse_segment(segment: &str) -> Option<u32> {
    let canonical = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if !canonical {
        return None;
    }
    segment.parse().ok()
}

/// Encode `value` as `"/d0/d1/.../dn"`.
pub fn path_from_int(value: u64) -> String {
    let mut path = String::new();
    for digit in int_to_segments(value) {
        let Ok(()) = write!(path, "/{digit}") else {
            unreachable!("writing to a String cannot fail");
        };
    }
    path
}

/// Decode a path produced by [`path_from_int`].
///
/// A single leading `/` is required and a single trailing `/` is tolerated.
///
/// # Errors
///
/// - `InvalidPath`: missing leading `/`, empty, non-numeric or zero-padded
///   segment, digit outside the radix, or value overflowing `u64`
pub fn path_to_int(path: &str) -> Result<u64, CryptoError> {
    let invalid = |reason: &str| CryptoError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let body = path.strip_prefix('/').ok_or_else(|| invalid("missing leading '/'"))?;
    let body = body.strip_suffix('/').unwrap_or(body);
    if body.is_empty() {
        return Err(invalid("no segments"));
    }

    let digits = body
        .split('/')
        .map(|segment| parse_segment(segment).ok_or_else(|| invalid("segment is not a number")))
        .collect::<Result<Vec<_>, _>>()?;

    segments_to_int(&digits).ok_or_else(|| invalid("digit out of range or value overflows u64"))
}
