//! Reversible identifier encoding for cache and table names.
//!
//! Bytes outside `[A-Za-z0-9_.@-]` are written as `%HH` with uppercase hex.
//! Path separators survive [`encode`] untouched; cache names reject them and
//! table names escape them, so neither can escape the cache directory.
//! Names made only of dots (`.`, `..`) are escaped in full for the same
//! reason.

use std::string::FromUtf8Error;

use crate::cache::CacheError;

const SEPARATORS: [char; 2] = ['/', '\\'];

fn is_safe(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.' | b'@' | b'-')
}

fn is_dot_only(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b == b'.')
}

fn push_escaped(out: &mut String, byte: u8) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    out.push('%');
    out.push(HEX[(byte >> 4) as usize] as char);
    out.push(HEX[(byte & 0x0f) as usize] as char);
}

fn encode_with(name: &str, escape_separators: bool) -> String {
    let mut out = String::with_capacity(name.len());
    if escape_separators && is_dot_only(name) {
        for byte in name.bytes() {
            push_escaped(&mut out, byte);
        }
        return out;
    }
    for byte in name.bytes() {
        let separator = byte == b'/' || byte == b'\\';
        if is_safe(byte) || (separator && !escape_separators) {
            out.push(byte as char);
        } else {
            push_escaped(&mut out, byte);
        }
    }
    out
}

/// Escapes every unsafe byte except path separators.
pub fn encode(name: &str) -> String {
    encode_with(name, false)
}

/// Inverse of [`encode`], [`encode_cache_name`] and [`encode_table_name`].
pub fn decode(encoded: &str) -> Result<String, FromUtf8Error> {
    urlencoding::decode(encoded).map(|s| s.into_owned())
}

/// Encodes a cache name. Empty names and names containing a path
/// separator are rejected with [`CacheError::NameInvalid`].
pub fn encode_cache_name(name: &str) -> Result<String, CacheError> {
    if name.is_empty() || name.contains(SEPARATORS) {
        return Err(CacheError::NameInvalid {
            name: name.to_string(),
        });
    }
    Ok(encode_with(name, true))
}

/// Encodes a table name into a single file-name component.
pub fn encode_table_name(name: &str) -> Result<String, CacheError> {
    if name.is_empty() {
        return Err(CacheError::NameInvalid {
            name: name.to_string(),
        });
    }
    Ok(encode_with(name, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_names_are_unchanged() {
        assert_eq!(encode("abc.xyz-123_@"), "abc.xyz-123_@");
        assert_eq!(encode(""), "");
    }

    #[test]
    fn test_unsafe_bytes_are_escaped() {
        assert_eq!(encode("a#c"), "a%23c");
        assert_eq!(encode("a%c"), "a%25c");
        assert_eq!(encode("a c"), "a%20c");
        assert_eq!(encode("é"), "%C3%A9");
    }

    #[test]
    fn test_encode_keeps_separators() {
        assert_eq!(encode("/abc\\xyz"), "/abc\\xyz");
    }

    #[test]
    fn test_table_names_escape_separators() {
        assert_eq!(encode_table_name("/abc\\xyz").unwrap(), "%2Fabc%5Cxyz");
        assert_eq!(encode_table_name("also/valid/too").unwrap(), "also%2Fvalid%2Ftoo");
    }

    #[test]
    fn test_decode_inverts_encode() {
        for name in ["a#c", "a%c", "/abc\\xyz", "zone 1:é", "__alsovalid__"] {
            assert_eq!(decode(&encode(name)).unwrap(), name);
            assert_eq!(decode(&encode_table_name(name).unwrap()).unwrap(), name);
        }
    }

    #[test]
    fn test_cache_names_reject_separators() {
        assert!(matches!(
            encode_cache_name("a/b"),
            Err(CacheError::NameInvalid { .. })
        ));
        assert!(matches!(
            encode_cache_name("a\\b"),
            Err(CacheError::NameInvalid { .. })
        ));
        assert!(matches!(
            encode_cache_name(""),
            Err(CacheError::NameInvalid { .. })
        ));
        assert_eq!(encode_cache_name("resource.cache").unwrap(), "resource.cache");
    }

    #[test]
    fn test_dot_only_names_are_escaped() {
        assert_eq!(encode_table_name(".").unwrap(), "%2E");
        assert_eq!(encode_table_name("..").unwrap(), "%2E%2E");
        assert_eq!(encode_cache_name("..").unwrap(), "%2E%2E");
        assert_eq!(encode_table_name("a..b").unwrap(), "a..b");
        for name in [".", "..", "..."] {
            assert_eq!(decode(&encode_table_name(name).unwrap()).unwrap(), name);
            assert_eq!(decode(&encode_cache_name(name).unwrap()).unwrap(), name);
        }
    }
}
