//! Entity identities and type policies
//!
//! Provides [`EntityIdentity`], the normalized `(type, key)` pair every cached
//! record is stored under, and [`TypePolicies`] for resolving identities from
//! raw objects.

use crate::error::IdentityError;
use crate::record::FieldMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Key field used when a type has no explicit policy
pub const DEFAULT_KEY_FIELD: &str = "id";

/// Normalized identity of a cached entity
///
/// Two identities are equal iff both the type name and the primary key match
/// exactly. [`EntityIdentity::new`] stores its inputs verbatim; use
/// [`EntityIdentity::normalized`] (or `EntityCache::identify`) before using a
/// raw identity as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityIdentity {
    type_name: String,
    primary_key: String,
}

impl EntityIdentity {
    /// Create identity without validation
    #[inline]
    #[must_use]
    pub fn new(type_name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            primary_key: primary_key.into(),
        }
    }

    /// Entity type name
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Primary key within the type
    #[inline]
    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Trim and validate both components
    ///
    /// # Errors
    /// - `IdentityError::EmptyTypeName` / `EmptyPrimaryKey` for blank parts
    /// - `IdentityError::InvalidTypeName` for characters outside `[A-Za-z0-9_]`
    pub fn normalized(&self) -> Result<Self, IdentityError> {
        let type_name = self.type_name.trim();
        if type_name.is_empty() {
            return Err(IdentityError::EmptyTypeName);
        }
        if !type_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(IdentityError::InvalidTypeName(type_name.to_string()));
        }

        let primary_key = self.primary_key.trim();
        if primary_key.is_empty() {
            return Err(IdentityError::EmptyPrimaryKey {
                type_name: type_name.to_string(),
            });
        }

        Ok(Self::new(type_name, primary_key))
    }
}

impl Display for EntityIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.primary_key)
    }
}

impl FromStr for EntityIdentity {
    type Err = IdentityError;

    /// Parse `Type:key`; the key may itself contain colons
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_name, key) = s
            .split_once(':')
            .ok_or_else(|| IdentityError::Malformed(s.to_string()))?;
        Self::new(type_name, key).normalized()
    }
}

/// Per-type key field configuration
///
/// Mirrors how list and detail queries return plain objects: the cache needs
/// to know which field of an object carries its primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypePolicies {
    /// Key field used when a type is not listed in `key_fields`
    pub default_key_field: String,
    /// Type name -> key field name
    pub key_fields: BTreeMap<String, String>,
}

impl TypePolicies {
    /// Create policies with the default key field only
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register key field for a type
    #[must_use]
    pub fn with_key_field(mut self, type_name: impl Into<String>, field: impl Into<String>) -> Self {
        self.key_fields.insert(type_name.into(), field.into());
        self
    }

    /// Merge another set of policies into this one (other wins)
    pub fn extend(&mut self, other: &TypePolicies) {
        for (type_name, field) in &other.key_fields {
            self.key_fields.insert(type_name.clone(), field.clone());
        }
    }

    /// Key field for a type
    #[inline]
    #[must_use]
    pub fn key_field_for(&self, type_name: &str) -> &str {
        self.key_fields
            .get(type_name)
            .map_or(self.default_key_field.as_str(), String::as_str)
    }

    /// Resolve identity of an object from its fields
    ///
    /// # Errors
    /// - `IdentityError::MissingKeyField` when the key field is absent or null
    /// - `IdentityError::UnsupportedKeyValue` for non-scalar keys
    /// - any normalization error of the resulting identity
    pub fn identify_object(
        &self,
        type_name: &str,
        fields: &FieldMap,
    ) -> Result<EntityIdentity, IdentityError> {
        let field = self.key_field_for(type_name.trim());
        let key = match fields.get(field) {
            None | Some(Value::Null) => {
                return Err(IdentityError::MissingKeyField {
                    type_name: type_name.to_string(),
                    field: field.to_string(),
                })
            }
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
            Some(_) => {
                return Err(IdentityError::UnsupportedKeyValue {
                    type_name: type_name.to_string(),
                    field: field.to_string(),
                })
            }
        };

        EntityIdentity::new(type_name, key).normalized()
    }
}

impl Default for TypePolicies {
    fn default() -> Self {
        Self {
            default_key_field: DEFAULT_KEY_FIELD.to_string(),
            key_fields: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> FieldMap {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => unreachable!("fixture must be an object"),
        }
    }

    #[test]
    fn normalization_trims() {
        let identity = EntityIdentity::new("  Alert ", " a1\t").normalized().unwrap();
        assert_eq!(identity, EntityIdentity::new("Alert", "a1"));
    }

    #[test]
    fn normalization_rejects_blank_parts() {
        assert_eq!(
            EntityIdentity::new(" ", "a1").normalized(),
            Err(IdentityError::EmptyTypeName)
        );
        assert!(matches!(
            EntityIdentity::new("Alert", "").normalized(),
            Err(IdentityError::EmptyPrimaryKey { .. })
        ));
        assert!(matches!(
            EntityIdentity::new("Alert Details", "a1").normalized(),
            Err(IdentityError::InvalidTypeName(_))
        ));
    }

    #[test]
    fn equality_is_exact() {
        assert_ne!(
            EntityIdentity::new("Alert", "a1"),
            EntityIdentity::new("Alert", "A1")
        );
        assert_ne!(
            EntityIdentity::new("Alert", "a1"),
            EntityIdentity::new("AlertDetails", "a1")
        );
    }

    #[test]
    fn display_and_parse() {
        let identity = EntityIdentity::new("Alert", "a1");
        assert_eq!(identity.to_string(), "Alert:a1");

        let parsed: EntityIdentity = "Resource:arn:aws:s3:::bucket".parse().unwrap();
        assert_eq!(parsed.type_name(), "Resource");
        assert_eq!(parsed.primary_key(), "arn:aws:s3:::bucket");

        assert!(matches!(
            "no-separator".parse::<EntityIdentity>(),
            Err(IdentityError::Malformed(_))
        ));
    }

    #[test]
    fn identify_object_uses_policy() {
        let policies = TypePolicies::new().with_key_field("AlertDetails", "alertId");

        let alert = fields(json!({ "alertId": "a1", "status": "OPEN" }));
        let identity = policies.identify_object("AlertDetails", &alert).unwrap();
        assert_eq!(identity, EntityIdentity::new("AlertDetails", "a1"));

        let rule = fields(json!({ "id": 42 }));
        let identity = policies.identify_object("Rule", &rule).unwrap();
        assert_eq!(identity.primary_key(), "42");
    }

    #[test]
    fn identify_object_rejects_missing_or_bad_keys() {
        let policies = TypePolicies::new().with_key_field("AlertDetails", "alertId");

        let missing = fields(json!({ "id": "a1" }));
        assert!(matches!(
            policies.identify_object("AlertDetails", &missing),
            Err(IdentityError::MissingKeyField { .. })
        ));

        let null_key = fields(json!({ "alertId": null }));
        assert!(matches!(
            policies.identify_object("AlertDetails", &null_key),
            Err(IdentityError::MissingKeyField { .. })
        ));

        let nested = fields(json!({ "alertId": { "v": 1 } }));
        assert!(matches!(
            policies.identify_object("AlertDetails", &nested),
            Err(IdentityError::UnsupportedKeyValue { .. })
        ));
    }
}
