//! Opaque pagination cursors
//!
//! A cursor is the base64url (no padding) encoding of the decimal offset.
//! Decoding is total: malformed or absent cursors fall back to offset 0.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Encode a numeric offset into an opaque cursor
pub fn encode_offset(offset: u64) -> String {
    URL_SAFE_NO_PAD.encode(offset.to_string())
}

/// Decode a cursor back into an offset; anything unparseable reads as 0
pub fn decode_cursor(cursor: Option<&str>) -> u64 {
    cursor
        .and_then(|c| URL_SAFE_NO_PAD.decode(c).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Cursor for the page after (offset, limit), if one exists.
///
/// A well-formed cursor can decode to any u64, so the sum is checked: an
/// offset near u64::MAX means no next page, never a wrapped one.
pub fn next_cursor(offset: u64, limit: u64, total: u64) -> Option<String> {
    offset
        .checked_add(limit)
        .filter(|next| *next < total)
        .map(encode_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for n in [0u64, 1, 42, 199, 200, 10_000, u64::MAX] {
            assert_eq!(decode_cursor(Some(&encode_offset(n))), n);
        }
    }

    #[test]
    fn test_absent_cursor_is_zero() {
        assert_eq!(decode_cursor(None), 0);
    }

    #[test]
    fn test_malformed_cursor_is_zero() {
        assert_eq!(decode_cursor(Some("not base64 at all!!")), 0);
        assert_eq!(decode_cursor(Some("")), 0);
        // Valid base64 but not a decimal string
        assert_eq!(decode_cursor(Some(&URL_SAFE_NO_PAD.encode("abc"))), 0);
        // Valid base64 of a negative number
        assert_eq!(decode_cursor(Some(&URL_SAFE_NO_PAD.encode("-5"))), 0);
    }

    #[test]
    fn test_next_cursor_presence() {
        let next = next_cursor(0, 50, 100);
        assert_eq!(decode_cursor(next.as_deref()), 50);

        // Last page, exact boundary
        assert!(next_cursor(50, 50, 100).is_none());
        assert!(next_cursor(0, 50, 50).is_none());
        assert!(next_cursor(0, 50, 20).is_none());
    }

    #[test]
    fn test_next_cursor_near_max_offset_does_not_wrap() {
        let offset = decode_cursor(Some(&encode_offset(u64::MAX)));
        assert!(next_cursor(offset, 200, 10_000).is_none());
        assert!(next_cursor(u64::MAX - 1, 50, u64::MAX).is_none());
    }
}
