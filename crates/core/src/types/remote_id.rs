//! Remote (upstream-assigned) entity identifiers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when normalizing a remote identifier.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteIdError {
    /// The input string is empty.
    #[error("remote id cannot be empty")]
    Empty,
    /// The trailing path component of a global id is not numeric.
    #[error("global id has no numeric suffix: {0}")]
    NonNumericSuffix(String),
}

/// A normalized remote identifier.
///
/// The upstream API hands out opaque global ids of the form
/// `scheme://domain/Type/<id>`. Everything stored locally is keyed by the
/// trailing numeric component, so `gid://shopify/Customer/123` and `123`
/// normalize to the same `RemoteId`.
///
/// Line items without an upstream id use a synthesized composite key (see
/// [`RemoteId::composite`]), which is why the inner value is a string rather
/// than an integer.
///
/// ## Examples
///
/// ```
/// use storepulse_core::RemoteId;
///
/// let id = RemoteId::from_global_id("gid://shopify/Order/5001").unwrap();
/// assert_eq!(id.as_str(), "5001");
///
/// assert!(RemoteId::from_global_id("gid://shopify/Order/abc").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    /// Normalize a global id (or an already-bare numeric id).
    ///
    /// Query strings on the global id (`gid://shopify/Product/1?v=2`) are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or its trailing component is
    /// not made of ASCII digits.
    pub fn from_global_id(gid: &str) -> Result<Self, RemoteIdError> {
        let trimmed = gid.trim();
        if trimmed.is_empty() {
            return Err(RemoteIdError::Empty);
        }

        let without_query = trimmed.split('?').next().unwrap_or(trimmed);
        let suffix = without_query
            .rsplit('/')
            .next()
            .unwrap_or(without_query);

        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RemoteIdError::NonNumericSuffix(gid.to_owned()));
        }

        Ok(Self(suffix.to_owned()))
    }

    /// Build a deterministic composite key `"{parent}:{discriminator}"`.
    ///
    /// Used for child records (order line items) that arrive without an
    /// upstream id. The same inputs always produce the same key, so
    /// re-ingesting the same payload never mints a new identity.
    #[must_use]
    pub fn composite(parent: &Self, discriminator: &str) -> Self {
        Self(format!("{}:{discriminator}", parent.0))
    }

    /// Wrap a value read back from storage without re-validating it.
    #[must_use]
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RemoteId {
    type Err = RemoteIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_global_id(s)
    }
}

impl AsRef<str> for RemoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for RemoteId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for RemoteId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values were normalized on the way in
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for RemoteId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_global_ids_normalize_to_numeric_suffix() {
        for (gid, expected) in [
            ("gid://shopify/Customer/123", "123"),
            ("gid://shopify/Product/9876543210", "9876543210"),
            ("gid://shopify/LineItem/42", "42"),
            ("gid://shopify/ProductVariant/7?v=2", "7"),
            ("555", "555"),
        ] {
            assert_eq!(RemoteId::from_global_id(gid).unwrap().as_str(), expected);
        }
    }

    #[test]
    fn test_same_entity_from_gid_and_bare_id_is_equal() {
        let a = RemoteId::from_global_id("gid://shopify/Order/77").unwrap();
        let b: RemoteId = "77".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_is_rejected() {
        assert_eq!(RemoteId::from_global_id("  "), Err(RemoteIdError::Empty));
    }

    #[test]
    fn test_non_numeric_suffix_is_rejected() {
        assert!(matches!(
            RemoteId::from_global_id("gid://shopify/Order/"),
            Err(RemoteIdError::NonNumericSuffix(_))
        ));
        assert!(matches!(
            RemoteId::from_global_id("gid://shopify/Order/abc"),
            Err(RemoteIdError::NonNumericSuffix(_))
        ));
    }

    #[test]
    fn test_composite_is_deterministic() {
        let order = RemoteId::from_global_id("gid://shopify/Order/10").unwrap();
        let a = RemoteId::composite(&order, "variant-3");
        let b = RemoteId::composite(&order, "variant-3");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "10:variant-3");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = RemoteId::from_global_id("gid://shopify/Customer/5").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"5\"");
    }
}
