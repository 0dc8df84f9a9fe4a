//! Identifier encoding.
//!
//! Two modes share one backend-parameterized alphabet:
//!
//! - **Legacy**: every character outside the alphabet becomes `_`. Collisions
//!   are possible (`a/b` and `a.b` both become `a_b`).
//! - **Reversible**: every character outside the alphabet becomes an escape
//!   token `x` + 4 lowercase hex digits of its UTF-16 code unit. The escape
//!   character `x` is always escaped itself, so every `x` in an encoded name
//!   starts a token and [`decode`] is unambiguous. Composite names join their
//!   components with [`CONCATENATOR`](crate::CONCATENATOR), a token that
//!   [`encode_reversible`] never emits.
//!
//! ```text
//! "/somePath"  --reversible-->  "x002fsomePath"
//! "/somePath"  --legacy------>  "_somePath"
//! ```

use crate::{BackendProfile, EncodingError};
use std::fmt::Write;

/// Leading character of every escape token.
pub const ESCAPE: char = 'x';

/// Replacement for disallowed characters in legacy mode.
pub const LEGACY_SUBSTITUTE: char = '_';

const TOKEN_DIGITS: usize = 4;
const SEPARATOR_UNIT: u16 = 0xFFFF;

/// How raw strings are turned into identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingMode {
    /// Substitute disallowed characters; not invertible.
    Legacy,
    /// Escape disallowed characters; invertible with [`decode`].
    Reversible,
}

impl EncodingMode {
    /// Mode selected by an `enable_encoding` flag.
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            EncodingMode::Reversible
        } else {
            EncodingMode::Legacy
        }
    }
}

/// Encode `raw` for `profile` in the given mode.
pub fn encode(raw: &str, mode: EncodingMode, profile: &BackendProfile) -> String {
    match mode {
        EncodingMode::Legacy => encode_legacy(raw, profile),
        EncodingMode::Reversible => encode_reversible(raw, profile),
    }
}

/// Replace every character outside the backend alphabet with `_`.
pub fn encode_legacy(raw: &str, profile: &BackendProfile) -> String {
    raw.chars()
        .map(|c| if profile.allows(c) { c } else { LEGACY_SUBSTITUTE })
        .collect()
}

/// Legacy form of a service path: the leading `/` is dropped, then the rest
/// is encoded. The root path truncates to an empty string.
pub fn truncate_service_path(service_path: &str, profile: &BackendProfile) -> String {
    let trimmed = service_path.strip_prefix('/').unwrap_or(service_path);
    encode_legacy(trimmed, profile)
}

/// Escape every character outside the backend alphabet, and `x` itself.
///
/// Characters beyond the BMP are escaped as their surrogate pair. U+FFFF is a
/// noncharacter whose token would collide with the component separator; it
/// is escaped as U+FFFD instead.
pub fn encode_reversible(raw: &str, profile: &BackendProfile) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut units = [0u16; 2];

    for c in raw.chars() {
        if c != ESCAPE && profile.allows(c) {
            out.push(c);
            continue;
        }

        let c = if c == '\u{FFFF}' { '\u{FFFD}' } else { c };
        for unit in c.encode_utf16(&mut units) {
            // Writing to a String cannot fail.
            let _ = write!(out, "{}{:04x}", ESCAPE, unit);
        }
    }

    out
}

/// Read the escape token starting at byte `offset` (which holds `x`).
fn token_at(encoded: &str, offset: usize) -> Option<u16> {
    let digits = encoded.get(offset + 1..offset + 1 + TOKEN_DIGITS)?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

/// Invert [`encode_reversible`] for a single component.
///
/// A separator token inside `encoded` decodes to U+FFFF; split composite
/// names with [`split_components`] first.
pub fn decode(encoded: &str) -> Result<String, EncodingError> {
    let mut out = String::with_capacity(encoded.len());
    let mut pending_high: Option<(u16, usize)> = None;
    let mut chars = encoded.char_indices();

    while let Some((offset, c)) = chars.next() {
        if c != ESCAPE {
            if let Some((_, at)) = pending_high {
                return Err(EncodingError::UnpairedSurrogate { offset: at });
            }
            out.push(c);
            continue;
        }

        let unit = token_at(encoded, offset).ok_or_else(|| EncodingError::InvalidEscape {
            token: encoded[offset..].chars().take(TOKEN_DIGITS + 1).collect(),
            offset,
        })?;
        // Hex digits are ASCII: one char per byte.
        for _ in 0..TOKEN_DIGITS {
            chars.next();
        }

        match (pending_high.take(), unit) {
            (Some((high, _)), 0xDC00..=0xDFFF) => {
                let decoded = char::decode_utf16([high, unit])
                    .next()
                    .and_then(Result::ok)
                    .ok_or(EncodingError::UnpairedSurrogate { offset })?;
                out.push(decoded);
            }
            (Some((_, at)), _) => return Err(EncodingError::UnpairedSurrogate { offset: at }),
            (None, 0xD800..=0xDBFF) => pending_high = Some((unit, offset)),
            (None, 0xDC00..=0xDFFF) => return Err(EncodingError::UnpairedSurrogate { offset }),
            (None, _) => {
                // Non-surrogate BMP units are always valid scalar values.
                let decoded = char::from_u32(u32::from(unit))
                    .ok_or(EncodingError::UnpairedSurrogate { offset })?;
                out.push(decoded);
            }
        }
    }

    match pending_high {
        Some((_, at)) => Err(EncodingError::UnpairedSurrogate { offset: at }),
        None => Ok(out),
    }
}

/// Split a reversibly encoded composite name on its separator tokens.
///
/// Token-aware: only a whole `xffff` token separates, never a substring that
/// straddles two tokens.
pub fn split_components(encoded: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut chars = encoded.char_indices();

    while let Some((offset, c)) = chars.next() {
        if c != ESCAPE {
            continue;
        }
        if let Some(unit) = token_at(encoded, offset) {
            for _ in 0..TOKEN_DIGITS {
                chars.next();
            }
            if unit == SEPARATOR_UNIT {
                parts.push(&encoded[start..offset]);
                start = offset + 1 + TOKEN_DIGITS;
            }
        }
    }

    parts.push(&encoded[start..]);
    parts
}

/// Split and decode every component of a reversibly encoded composite name.
pub fn decode_components(encoded: &str) -> Result<Vec<String>, EncodingError> {
    split_components(encoded).into_iter().map(decode).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Backend;

    fn pg() -> BackendProfile {
        Backend::PostgreSql.profile()
    }

    #[test]
    fn test_reversible_escapes_slash() {
        assert_eq!(encode_reversible("/somePath", &pg()), "x002fsomePath");
        assert_eq!(encode_reversible("/", &pg()), "x002f");
    }

    #[test]
    fn test_reversible_escapes_x_itself() {
        assert_eq!(encode_reversible("box", &pg()), "box0078");
        assert_eq!(decode("box0078").unwrap(), "box");
    }

    #[test]
    fn test_reversible_keeps_alphabet() {
        assert_eq!(encode_reversible("Room_1", &pg()), "Room_1");
    }

    #[test]
    fn test_reversible_backend_alphabet_differs() {
        assert_eq!(encode_reversible("a.b-c", &pg()), "ax002ebx002dc");
        let dynamo = Backend::DynamoDb.profile();
        assert_eq!(encode_reversible("a.b-c", &dynamo), "a.b-c");
    }

    #[test]
    fn test_reversible_non_bmp_uses_surrogates() {
        let encoded = encode_reversible("\u{1F600}", &pg());
        assert_eq!(encoded, "xd83dxde00");
        assert_eq!(decode(&encoded).unwrap(), "\u{1F600}");
    }

    #[test]
    fn test_reversible_never_emits_separator() {
        let encoded = encode_reversible("\u{FFFF}", &pg());
        assert_eq!(encoded, "xfffd");
        assert_eq!(split_components(&encoded), vec!["xfffd"]);
    }

    #[test]
    fn test_legacy_substitutes() {
        assert_eq!(encode_legacy("some.Path/x", &pg()), "some_Path_x");
        assert_eq!(encode_legacy("Room1", &pg()), "Room1");
    }

    #[test]
    fn test_truncate_service_path() {
        assert_eq!(truncate_service_path("/somePath", &pg()), "somePath");
        assert_eq!(truncate_service_path("/a/b", &pg()), "a_b");
        assert_eq!(truncate_service_path("/", &pg()), "");
    }

    #[test]
    fn test_encode_dispatches_on_mode() {
        assert_eq!(encode("/a", EncodingMode::Legacy, &pg()), "_a");
        assert_eq!(encode("/a", EncodingMode::Reversible, &pg()), "x002fa");
        assert_eq!(EncodingMode::from_enabled(true), EncodingMode::Reversible);
        assert_eq!(EncodingMode::from_enabled(false), EncodingMode::Legacy);
    }

    #[test]
    fn test_decode_rejects_bad_tokens() {
        assert_eq!(
            decode("abx00g1"),
            Err(EncodingError::InvalidEscape {
                token: "x00g1".to_string(),
                offset: 2
            })
        );
        assert!(matches!(
            decode("x00"),
            Err(EncodingError::InvalidEscape { offset: 0, .. })
        ));
        assert!(matches!(
            decode("x+fff"),
            Err(EncodingError::InvalidEscape { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_unpaired_surrogates() {
        assert_eq!(
            decode("xd83da"),
            Err(EncodingError::UnpairedSurrogate { offset: 0 })
        );
        assert_eq!(
            decode("axde00"),
            Err(EncodingError::UnpairedSurrogate { offset: 1 })
        );
        assert_eq!(
            decode("xd83d"),
            Err(EncodingError::UnpairedSurrogate { offset: 0 })
        );
    }

    #[test]
    fn test_split_components() {
        assert_eq!(
            split_components("x002fsomePathxffffsomeIdxffffsomeType"),
            vec!["x002fsomePath", "someId", "someType"]
        );
        assert_eq!(split_components("plain"), vec!["plain"]);
        assert_eq!(split_components("xffff"), vec!["", ""]);
    }

    #[test]
    fn test_decode_components() {
        let parts = decode_components("x002fsomePathxffffsomeIdxffffsomeType").unwrap();
        assert_eq!(parts, vec!["/somePath", "someId", "someType"]);
    }
}
