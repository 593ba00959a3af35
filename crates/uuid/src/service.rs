//! Internal implementation of the canonical storage identifier.

use crate::{IdError, IdResult};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// The docstore's canonical identifier (32 lowercase hex characters, no hyphens).
///
/// This wrapper guarantees that once constructed, the contained identifier is
/// in canonical form. It provides type safety for id handling and keeps blob
/// path derivation consistent across the workspace.
///
/// # When to use this type
/// Use this wrapper whenever you are:
/// - Accepting a document id from *outside* the core (API path or query
///   parameter), or
/// - Allocating a fresh id for a record, blob, or session token.
///
/// Once you hold a `StorageId`, the inner value is known to be valid and in
/// canonical form.
///
/// # Construction
/// - [`StorageId::new`] generates a fresh random identifier.
/// - [`StorageId::parse`] validates an externally supplied identifier.
///
/// # Errors
/// [`StorageId::parse`] returns [`IdError::InvalidInput`] if the input is not
/// already canonical.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StorageId(Uuid);

impl Default for StorageId {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageId {
    /// Generates a new identifier in canonical form.
    ///
    /// Suitable for allocating fresh document ids and blob file names. The
    /// generated value follows RFC 4122 version 4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses an identifier that must already be canonical.
    ///
    /// This does **not** normalise other common UUID forms (for example,
    /// hyphenated or uppercase). Callers must provide the canonical
    /// representation; anything else is rejected so that malformed ids from
    /// the API surface as validation failures instead of silently matching
    /// nothing in the index.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> IdResult<Self> {
        if Self::is_canonical(input) {
            // SAFETY: is_canonical guarantees valid hex, so parse_str will succeed
            let uuid = Uuid::parse_str(input).expect("is_canonical guarantees valid UUID");
            return Ok(Self(uuid));
        }
        Err(IdError::InvalidInput(format!(
            "identifier must be 32 lowercase hex characters without hyphens, got: '{}'",
            input
        )))
    }

    /// Returns the underlying `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in canonical identifier form.
    ///
    /// Purely syntactic check: exactly 32 bytes, lowercase hex only. Fast
    /// enough to use as a pre-validation before [`StorageId::parse`].
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Display for StorageId {
    /// Formats the identifier in canonical form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for StorageId {
    type Err = IdError;

    /// Parses a string into a `StorageId`, requiring canonical form.
    ///
    /// Equivalent to calling [`StorageId::parse`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorageId::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for StorageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self.0.simple())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for StorageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        StorageId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_canonical() {
        let id = StorageId::new();
        assert!(StorageId::is_canonical(&id.to_string()));
    }

    #[test]
    fn test_new_ids_are_distinct() {
        let a = StorageId::new();
        let b = StorageId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_canonical_roundtrip() {
        let input = "550e8400e29b41d4a716446655440000";
        let id = StorageId::parse(input).unwrap();
        assert_eq!(id.to_string(), input);
    }

    #[test]
    fn test_parse_rejects_hyphenated() {
        let result = StorageId::parse("550e8400-e29b-41d4-a716-446655440000");
        assert!(matches!(result, Err(IdError::InvalidInput(_))));
    }

    #[test]
    fn test_parse_rejects_uppercase() {
        let result = StorageId::parse("550E8400E29B41D4A716446655440000");
        assert!(matches!(result, Err(IdError::InvalidInput(_))));
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(StorageId::parse("abc123").is_err());
        assert!(StorageId::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        let result = StorageId::parse("zzze8400e29b41d4a716446655440000");
        assert!(matches!(result, Err(IdError::InvalidInput(_))));
    }

    #[test]
    fn test_from_str_matches_parse() {
        let input = "00000000000000000000000000000001";
        let parsed: StorageId = input.parse().unwrap();
        assert_eq!(parsed, StorageId::parse(input).unwrap());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let id = StorageId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: StorageId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
