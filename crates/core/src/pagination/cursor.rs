//! Opaque cursor codec.
//!
//! A cursor wraps a row identifier, the tag of the ordering it was issued
//! for and, for composite orderings, the value of the secondary sort column
//! at that row. The wire format is versioned and checksummed so that tokens
//! not produced here are rejected instead of decoding into a bogus position:
//!
//! ```text
//! base64url( "v1|<id>[|<order>[|<kind>|<value>]]#<checksum>" )
//! ```
//!
//! `<checksum>` is the first four bytes of SHA-256 over everything before
//! the `#`, hex encoded. The encoding only depends on the key, so cursors
//! stay valid across restarts and across releases that keep `v1`.
//!
//! Every field is bounded when encoded (order tags to
//! [`MAX_ORDER_TAG_LEN`] bytes, text sort values to [`MAX_TEXT_SORT_LEN`]
//! bytes), so an encoded cursor always fits under [`MAX_CURSOR_LENGTH`].

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PaginationError, PaginationResult};

const CODEC_VERSION: &str = "v1";
const FIELD_SEPARATOR: char = '|';
const CHECKSUM_SEPARATOR: char = '#';
const CHECKSUM_BYTES: usize = 4;

/// Maximum accepted length of a client-supplied cursor string.
pub const MAX_CURSOR_LENGTH: usize = 1024;
/// Order tags longer than this are cut when encoded.
pub const MAX_ORDER_TAG_LEN: usize = 32;
/// Text sort values longer than this are cut when encoded.
pub const MAX_TEXT_SORT_LEN: usize = 512;

// =============================================================================
// Cursor
// =============================================================================

/// Opaque pagination cursor.
///
/// Clients must treat the value as an opaque token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Encode a position into a cursor.
    pub fn encode(key: &CursorKey) -> Self {
        encode(key)
    }

    /// Decode this cursor back into a position.
    pub fn decode(&self) -> PaginationResult<CursorKey> {
        decode(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Cursor Key
// =============================================================================

/// Type tag of a secondary sort value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortValueKind {
    Int,
    Float,
    Text,
    Time,
}

impl SortValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Time => "time",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "text" => Some(Self::Text),
            "time" => Some(Self::Time),
            _ => None,
        }
    }
}

/// Value of the secondary sort column at a cursor position.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Int(i64),
    Float(f64),
    Text(String),
    Time(DateTime<Utc>),
}

impl SortValue {
    pub fn kind(&self) -> SortValueKind {
        match self {
            Self::Int(_) => SortValueKind::Int,
            Self::Float(_) => SortValueKind::Float,
            Self::Text(_) => SortValueKind::Text,
            Self::Time(_) => SortValueKind::Time,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            // Display for f64 is the shortest string that parses back exactly.
            Self::Float(v) => v.to_string(),
            Self::Text(v) => truncated(v, MAX_TEXT_SORT_LEN).to_string(),
            Self::Time(v) => v.to_rfc3339_opts(SecondsFormat::Nanos, true),
        }
    }

    fn parse(kind: SortValueKind, raw: &str) -> Option<Self> {
        match kind {
            SortValueKind::Int => raw.parse().ok().map(Self::Int),
            SortValueKind::Float => raw.parse().ok().map(Self::Float),
            SortValueKind::Text => Some(Self::Text(raw.to_string())),
            SortValueKind::Time => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|t| Self::Time(t.with_timezone(&Utc))),
        }
    }
}

impl From<i64> for SortValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SortValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for SortValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<DateTime<Utc>> for SortValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Time(v)
    }
}

/// Logical position a cursor points at.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorKey {
    /// Stable row identifier. Anchors are matched on this field only.
    pub id: i64,
    /// Tag of the ordering the position belongs to, e.g. `latency_ms.asc`.
    ///
    /// Must not contain `|`; offending characters are dropped when encoded.
    pub order: Option<String>,
    /// Secondary sort value, present for composite orderings.
    pub sort: Option<SortValue>,
}

impl CursorKey {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            order: None,
            sort: None,
        }
    }

    pub fn with_sort(id: i64, sort: impl Into<SortValue>) -> Self {
        Self {
            id,
            order: None,
            sort: Some(sort.into()),
        }
    }

    /// Scope this position to an ordering.
    pub fn in_order(mut self, tag: impl Into<String>) -> Self {
        self.order = Some(tag.into());
        self
    }

    /// Kind of the secondary sort value, if any.
    pub fn sort_kind(&self) -> Option<SortValueKind> {
        self.sort.as_ref().map(SortValue::kind)
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Encode a position into an opaque cursor.
pub fn encode(key: &CursorKey) -> Cursor {
    let mut body = format!("{CODEC_VERSION}{FIELD_SEPARATOR}{}", key.id);
    if key.order.is_some() || key.sort.is_some() {
        body.push(FIELD_SEPARATOR);
        if let Some(order) = &key.order {
            let tag: String = order.chars().filter(|&c| c != FIELD_SEPARATOR).collect();
            body.push_str(truncated(&tag, MAX_ORDER_TAG_LEN));
        }
    }
    if let Some(sort) = &key.sort {
        body.push(FIELD_SEPARATOR);
        body.push_str(sort.kind().as_str());
        body.push(FIELD_SEPARATOR);
        body.push_str(&sort.render());
    }
    let token = format!("{body}{CHECKSUM_SEPARATOR}{}", checksum(&body));
    Cursor(URL_SAFE_NO_PAD.encode(token))
}

/// Decode a client-supplied cursor string.
///
/// Fails with [`PaginationError::InvalidCursor`] for anything this codec did
/// not produce: bad base64, wrong version, checksum mismatch, or a payload
/// that does not parse.
pub fn decode(raw: &str) -> PaginationResult<CursorKey> {
    if raw.is_empty() {
        return Err(invalid("cursor is empty"));
    }
    if raw.len() > MAX_CURSOR_LENGTH {
        return Err(invalid(format!(
            "cursor too long: maximum {MAX_CURSOR_LENGTH} characters allowed"
        )));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(raw)
        .map_err(|_| invalid("cursor is not valid base64"))?;
    let token = String::from_utf8(bytes).map_err(|_| invalid("cursor is not valid UTF-8"))?;

    let (body, sum) = token
        .rsplit_once(CHECKSUM_SEPARATOR)
        .ok_or_else(|| invalid("cursor has no checksum"))?;
    if sum != checksum(body) {
        return Err(invalid("cursor checksum mismatch"));
    }

    let mut fields = body.splitn(5, FIELD_SEPARATOR);
    if fields.next() != Some(CODEC_VERSION) {
        return Err(invalid("unsupported cursor version"));
    }

    let id = fields
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| invalid("cursor identifier is not an integer"))?;

    let order = fields
        .next()
        .filter(|tag| !tag.is_empty())
        .map(str::to_string);

    let sort = match (fields.next(), fields.next()) {
        (None, None) => None,
        (Some(kind), Some(value)) => {
            let kind = SortValueKind::parse(kind)
                .ok_or_else(|| invalid(format!("unknown sort key type '{kind}'")))?;
            let value = SortValue::parse(kind, value)
                .ok_or_else(|| invalid("sort key value does not match its type"))?;
            Some(value)
        }
        _ => return Err(invalid("cursor sort key is incomplete")),
    };

    Ok(CursorKey { id, order, sort })
}

fn checksum(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    hex::encode(&digest[..CHECKSUM_BYTES])
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn truncated(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn invalid(reason: impl Into<String>) -> PaginationError {
    PaginationError::InvalidCursor(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_roundtrip_plain_identifier() {
        for id in [0, 1, 9, -7, i64::MAX, i64::MIN] {
            let cursor = encode(&CursorKey::new(id));
            assert_eq!(decode(cursor.as_str()).unwrap(), CursorKey::new(id));
        }
    }

    #[test]
    fn test_roundtrip_with_sort_values() {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let keys = [
            CursorKey::with_sort(3, 42i64),
            CursorKey::with_sort(4, 12.5f64),
            CursorKey::with_sort(5, "a|b#c".to_string()),
            CursorKey::with_sort(6, time),
            CursorKey::new(7).in_order("id.desc"),
            CursorKey::with_sort(8, 3.25f64).in_order("latency_ms.asc"),
        ];
        for key in keys {
            assert_eq!(encode(&key).decode().unwrap(), key);
        }
    }

    #[test]
    fn test_encoding_is_deterministic_and_opaque() {
        let a = encode(&CursorKey::new(10));
        let b = encode(&CursorKey::new(10));
        assert_eq!(a, b);
        // Le client ne doit pas voir l'identifiant en clair
        assert!(!a.as_str().contains("10"));
        assert_ne!(a, encode(&CursorKey::new(11)));
        assert_ne!(a, encode(&CursorKey::with_sort(10, 0i64)));
        assert_ne!(a, encode(&CursorKey::new(10).in_order("id.desc")));
        assert_ne!(
            encode(&CursorKey::new(10).in_order("latency_ms.asc")),
            encode(&CursorKey::new(10).in_order("latency_ms.desc"))
        );
    }

    // Test critique: un curseur émis ici se décode toujours, même avec une longue clé texte
    #[test]
    fn test_long_text_key_still_decodes() {
        let key = CursorKey::with_sort(1, "x".repeat(800)).in_order("name.asc");
        let cursor = encode(&key);
        assert!(cursor.as_str().len() <= MAX_CURSOR_LENGTH);

        let decoded = cursor.decode().unwrap();
        assert_eq!(decoded.id, 1);
        assert_eq!(decoded.order.as_deref(), Some("name.asc"));
        assert_eq!(
            decoded.sort,
            Some(SortValue::Text("x".repeat(MAX_TEXT_SORT_LEN)))
        );
    }

    #[test]
    fn test_largest_key_fits_under_length_cap() {
        // Multi-byte chars are never split when a text key is cut
        let key = CursorKey::with_sort(i64::MIN, "é".repeat(1_000)).in_order("o".repeat(100));
        let cursor = encode(&key);
        assert!(cursor.as_str().len() <= MAX_CURSOR_LENGTH);
        match cursor.decode().unwrap().sort {
            Some(SortValue::Text(text)) => {
                assert_eq!(text.len(), MAX_TEXT_SORT_LEN);
                assert!(text.chars().all(|c| c == 'é'));
            }
            other => panic!("unexpected sort value {other:?}"),
        }
    }

    #[test]
    fn test_separator_in_order_tag_is_dropped() {
        let key = CursorKey::with_sort(2, 5i64).in_order("a|b");
        let decoded = encode(&key).decode().unwrap();
        assert_eq!(decoded.order.as_deref(), Some("ab"));
        assert_eq!(decoded.sort, Some(SortValue::Int(5)));
    }

    // Test critique: un curseur étranger ou corrompu est toujours rejeté
    #[test]
    fn test_rejects_foreign_and_corrupted_cursors() {
        let rejected = [
            "",
            "not-valid-base64!!!",
            // base64 of "10", a bare identifier
            "MTA",
            // base64 of "v1|10" without checksum
            "djF8MTA",
            // base64 of "arrayconnection:3", a foreign relay cursor
            "YXJyYXljb25uZWN0aW9uOjM",
        ];
        for raw in rejected {
            assert!(
                matches!(decode(raw), Err(PaginationError::InvalidCursor(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let token = format!("v1|11#{}", checksum("v1|10"));
        let forged = URL_SAFE_NO_PAD.encode(token);
        assert!(matches!(
            decode(&forged),
            Err(PaginationError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_version_even_with_valid_checksum() {
        let body = "v2|10";
        let forged = URL_SAFE_NO_PAD.encode(format!("{body}#{}", checksum(body)));
        assert!(decode(&forged).is_err());
    }

    #[test]
    fn test_rejects_oversized_cursor() {
        let raw = "A".repeat(MAX_CURSOR_LENGTH + 1);
        assert!(decode(&raw).is_err());
    }

    proptest! {
        #[test]
        fn prop_roundtrip_any_identifier(id in any::<i64>()) {
            let cursor = encode(&CursorKey::new(id));
            prop_assert_eq!(decode(cursor.as_str()).unwrap().id, id);
        }

        #[test]
        fn prop_roundtrip_any_text_key(id in any::<i64>(), text in ".{0,128}") {
            let key = CursorKey::with_sort(id, text);
            prop_assert_eq!(encode(&key).decode().unwrap(), key);
        }

        #[test]
        fn prop_encoded_cursor_always_decodes(
            id in any::<i64>(),
            tag in "[a-z_.|]{0,64}",
            text in ".{0,1500}",
        ) {
            let cursor = encode(&CursorKey::with_sort(id, text).in_order(tag));
            prop_assert!(cursor.as_str().len() <= MAX_CURSOR_LENGTH);
            prop_assert_eq!(cursor.decode().unwrap().id, id);
        }

        // Une altération d'un seul caractère ne produit jamais un autre identifiant
        #[test]
        fn prop_single_char_corruption_never_yields_other_id(
            id in any::<i64>(),
            pos in any::<prop::sample::Index>(),
            replacement in prop::sample::select(vec!['A', 'z', '0', '-', '_']),
        ) {
            let cursor = encode(&CursorKey::new(id)).into_string();
            let idx = pos.index(cursor.len());
            let mut corrupted: Vec<char> = cursor.chars().collect();
            prop_assume!(corrupted[idx] != replacement);
            corrupted[idx] = replacement;
            let corrupted: String = corrupted.into_iter().collect();
            match decode(&corrupted) {
                Ok(key) => prop_assert_eq!(key.id, id),
                Err(err) => prop_assert!(matches!(err, PaginationError::InvalidCursor(_))),
            }
        }
    }
}
