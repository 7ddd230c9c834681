// Filebridge - Unified File Storage
// Copyright (C) 2025 Filebridge Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Access-control values and their resolution
//!
//! Callers hand an ACL to the pipeline in whatever form is convenient: a
//! predefined value, a loose string such as `"public-read"`, an explicit
//! grant list, or nothing at all. [`AclResolver`] turns that into the one
//! concrete form a given platform applies, following a single algorithm:
//!
//! 1. Predefined values and grant lists are used as-is (grants only where
//!    the platform supports them natively).
//! 2. Strings, and the absence of a value, fall back to the platform's
//!    default ACL when empty, then match the known predefined names
//!    case-insensitively with `-` treated as `_`. No match means "leave the
//!    ACL unset", which is not an error.
//! 3. Anything else fails with [`StorageError::UnsupportedAclValue`].

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Predefined (canned) ACLs understood across platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredefinedAcl {
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
    AwsExecRead,
}

impl PredefinedAcl {
    /// Every predefined ACL
    pub const ALL: [PredefinedAcl; 7] = [
        PredefinedAcl::Private,
        PredefinedAcl::PublicRead,
        PredefinedAcl::PublicReadWrite,
        PredefinedAcl::AuthenticatedRead,
        PredefinedAcl::BucketOwnerRead,
        PredefinedAcl::BucketOwnerFullControl,
        PredefinedAcl::AwsExecRead,
    ];

    /// Canonical name, e.g. `PUBLIC_READ`
    pub fn as_str(&self) -> &'static str {
        match self {
            PredefinedAcl::Private => "PRIVATE",
            PredefinedAcl::PublicRead => "PUBLIC_READ",
            PredefinedAcl::PublicReadWrite => "PUBLIC_READ_WRITE",
            PredefinedAcl::AuthenticatedRead => "AUTHENTICATED_READ",
            PredefinedAcl::BucketOwnerRead => "BUCKET_OWNER_READ",
            PredefinedAcl::BucketOwnerFullControl => "BUCKET_OWNER_FULL_CONTROL",
            PredefinedAcl::AwsExecRead => "AWS_EXEC_READ",
        }
    }

    /// Wire form used in canned-ACL headers, e.g. `public-read`
    pub fn header_value(&self) -> &'static str {
        match self {
            PredefinedAcl::Private => "private",
            PredefinedAcl::PublicRead => "public-read",
            PredefinedAcl::PublicReadWrite => "public-read-write",
            PredefinedAcl::AuthenticatedRead => "authenticated-read",
            PredefinedAcl::BucketOwnerRead => "bucket-owner-read",
            PredefinedAcl::BucketOwnerFullControl => "bucket-owner-full-control",
            PredefinedAcl::AwsExecRead => "aws-exec-read",
        }
    }

    /// Look up a name among `candidates`, ignoring case and treating `-` as `_`
    pub fn match_name(name: &str, candidates: &[PredefinedAcl]) -> Option<PredefinedAcl> {
        let normalized = name.trim().replace('-', "_");
        candidates
            .iter()
            .copied()
            .find(|acl| acl.as_str().eq_ignore_ascii_case(&normalized))
    }
}

impl fmt::Display for PredefinedAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission carried by an explicit grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclPermission {
    Read,
    Write,
    ReadAcp,
    WriteAcp,
    FullControl,
}

/// One explicit grant
///
/// `grantee` uses the platform's grantee syntax, e.g. `id=...`,
/// `uri=http://acs.amazonaws.com/groups/global/AllUsers` or
/// `emailAddress=...` for S3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclGrant {
    pub grantee: String,
    pub permission: AclPermission,
}

impl AclGrant {
    pub fn new(grantee: impl Into<String>, permission: AclPermission) -> Self {
        AclGrant {
            grantee: grantee.into(),
            permission,
        }
    }
}

/// An ACL as supplied by a caller
///
/// Serialized through JSON: a string for `Text`, a grant array for
/// `Grants`, `{"predefined": "PUBLIC_READ"}` for `Predefined`, and the raw
/// value for `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value", from = "Value")]
pub enum AclValue {
    /// A predefined ACL
    Predefined(PredefinedAcl),
    /// Free-form name, resolved against the platform's predefined set
    Text(String),
    /// Explicit grants
    Grants(Vec<AclGrant>),
    /// Anything else; never resolvable
    Other(Value),
}

impl AclValue {
    /// Short description used in error messages
    fn describe(&self) -> String {
        match self {
            AclValue::Predefined(acl) => acl.to_string(),
            AclValue::Text(text) => text.clone(),
            AclValue::Grants(grants) => format!("{} grant(s)", grants.len()),
            AclValue::Other(value) => value.to_string(),
        }
    }
}

impl From<PredefinedAcl> for AclValue {
    fn from(acl: PredefinedAcl) -> Self {
        AclValue::Predefined(acl)
    }
}

impl From<&str> for AclValue {
    fn from(text: &str) -> Self {
        AclValue::Text(text.to_string())
    }
}

impl From<String> for AclValue {
    fn from(text: String) -> Self {
        AclValue::Text(text)
    }
}

impl From<Vec<AclGrant>> for AclValue {
    fn from(grants: Vec<AclGrant>) -> Self {
        AclValue::Grants(grants)
    }
}

impl From<AclGrant> for AclValue {
    fn from(grant: AclGrant) -> Self {
        AclValue::Grants(vec![grant])
    }
}

impl From<AclValue> for Value {
    fn from(acl: AclValue) -> Self {
        match acl {
            AclValue::Predefined(acl) => serde_json::json!({ "predefined": acl.as_str() }),
            AclValue::Text(text) => Value::String(text),
            AclValue::Grants(grants) => Value::Array(
                grants
                    .into_iter()
                    .map(|g| serde_json::json!({ "grantee": g.grantee, "permission": g.permission }))
                    .collect(),
            ),
            AclValue::Other(value) => value,
        }
    }
}

impl From<Value> for AclValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => AclValue::Text(text),
            Value::Array(_) => match serde_json::from_value::<Vec<AclGrant>>(value.clone()) {
                Ok(grants) => AclValue::Grants(grants),
                Err(_) => AclValue::Other(value),
            },
            Value::Object(ref map) if map.len() == 1 => {
                match map
                    .get("predefined")
                    .cloned()
                    .map(serde_json::from_value::<PredefinedAcl>)
                {
                    Some(Ok(acl)) => AclValue::Predefined(acl),
                    _ => AclValue::Other(value),
                }
            }
            other => AclValue::Other(other),
        }
    }
}

/// The concrete ACL a platform applies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAcl {
    Predefined(PredefinedAcl),
    Grants(Vec<AclGrant>),
}

/// Per-platform ACL resolution policy
#[derive(Debug, Clone)]
pub struct AclResolver {
    supported: Vec<PredefinedAcl>,
    supports_grants: bool,
    default_acl: Option<String>,
}

impl AclResolver {
    /// Create a resolver matching names against `supported`
    pub fn new(supported: &[PredefinedAcl], supports_grants: bool) -> Self {
        AclResolver {
            supported: supported.to_vec(),
            supports_grants,
            default_acl: None,
        }
    }

    /// Set the platform-level default used when a value is empty or unset
    pub fn with_default_acl(mut self, default_acl: Option<impl Into<String>>) -> Self {
        self.default_acl = default_acl.map(Into::into);
        self
    }

    /// The configured default ACL, if any
    pub fn default_acl(&self) -> Option<&str> {
        self.default_acl.as_deref()
    }

    /// Resolve a caller-supplied value
    ///
    /// `Ok(None)` means "apply no ACL".
    ///
    /// # Errors
    ///
    /// [`StorageError::UnsupportedAclValue`] for grant lists on a platform
    /// without native grants, and for any [`AclValue::Other`].
    pub fn resolve(&self, acl: Option<&AclValue>) -> StorageResult<Option<ResolvedAcl>> {
        match acl {
            Some(AclValue::Predefined(acl)) => Ok(Some(ResolvedAcl::Predefined(*acl))),
            Some(AclValue::Grants(grants)) => {
                if self.supports_grants {
                    Ok(Some(ResolvedAcl::Grants(grants.clone())))
                } else {
                    Err(StorageError::unsupported_acl(format!(
                        "explicit grants are not supported here ({})",
                        AclValue::Grants(grants.clone()).describe()
                    )))
                }
            }
            Some(AclValue::Text(text)) => Ok(self.resolve_name(text)),
            None => Ok(self.resolve_name("")),
            Some(other @ AclValue::Other(_)) => Err(StorageError::unsupported_acl(other.describe())),
        }
    }

    fn resolve_name(&self, name: &str) -> Option<ResolvedAcl> {
        let name = if name.trim().is_empty() {
            self.default_acl.as_deref().unwrap_or_default()
        } else {
            name
        };

        if name.trim().is_empty() {
            return None;
        }

        PredefinedAcl::match_name(name, &self.supported).map(ResolvedAcl::Predefined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> AclResolver {
        AclResolver::new(&PredefinedAcl::ALL, true)
    }

    #[test]
    fn test_string_matches_predefined() {
        let resolved = resolver().resolve(Some(&"public-read".into())).unwrap();
        assert_eq!(resolved, Some(ResolvedAcl::Predefined(PredefinedAcl::PublicRead)));

        let resolved = resolver().resolve(Some(&"Bucket_Owner-Full_Control".into())).unwrap();
        assert_eq!(
            resolved,
            Some(ResolvedAcl::Predefined(PredefinedAcl::BucketOwnerFullControl))
        );
    }

    #[test]
    fn test_unknown_string_is_unset() {
        assert_eq!(resolver().resolve(Some(&"bogus-acl".into())).unwrap(), None);
    }

    #[test]
    fn test_unknown_string_does_not_fall_back_to_default() {
        let resolver = resolver().with_default_acl(Some("private"));
        assert_eq!(resolver.resolve(Some(&"bogus-acl".into())).unwrap(), None);
    }

    #[test]
    fn test_empty_and_unset_use_default() {
        let resolver = resolver().with_default_acl(Some("public-read"));
        let expected = Some(ResolvedAcl::Predefined(PredefinedAcl::PublicRead));
        assert_eq!(resolver.resolve(None).unwrap(), expected);
        assert_eq!(resolver.resolve(Some(&"".into())).unwrap(), expected);
        assert_eq!(resolver.resolve(Some(&"  ".into())).unwrap(), expected);
    }

    #[test]
    fn test_unset_without_default() {
        assert_eq!(resolver().resolve(None).unwrap(), None);
    }

    #[test]
    fn test_predefined_passes_through() {
        let limited = AclResolver::new(&[PredefinedAcl::Private], false);
        let resolved = limited.resolve(Some(&PredefinedAcl::AwsExecRead.into())).unwrap();
        assert_eq!(resolved, Some(ResolvedAcl::Predefined(PredefinedAcl::AwsExecRead)));
    }

    #[test]
    fn test_names_outside_supported_set_are_unset() {
        let limited = AclResolver::new(&[PredefinedAcl::Private, PredefinedAcl::PublicRead], false);
        assert_eq!(limited.resolve(Some(&"aws-exec-read".into())).unwrap(), None);
    }

    #[test]
    fn test_grants() {
        let grants = vec![AclGrant::new("id=abc", AclPermission::Read)];
        let resolved = resolver().resolve(Some(&grants.clone().into())).unwrap();
        assert_eq!(resolved, Some(ResolvedAcl::Grants(grants.clone())));

        let no_grants = AclResolver::new(&PredefinedAcl::ALL, false);
        let err = no_grants.resolve(Some(&grants.into())).unwrap_err();
        assert!(err.is_unsupported_acl_value());
    }

    #[test]
    fn test_other_is_unsupported() {
        let value = AclValue::Other(serde_json::json!({"owner": 42}));
        assert!(resolver().resolve(Some(&value)).unwrap_err().is_unsupported_acl_value());
    }

    #[test]
    fn test_serde_forms() {
        let predefined: AclValue = serde_json::from_str(r#"{"predefined":"PUBLIC_READ"}"#).unwrap();
        assert_eq!(predefined, AclValue::Predefined(PredefinedAcl::PublicRead));

        let text: AclValue = serde_json::from_str(r#""private""#).unwrap();
        assert_eq!(text, AclValue::Text("private".into()));

        let grants: AclValue =
            serde_json::from_str(r#"[{"grantee":"id=1","permission":"FULL_CONTROL"}]"#).unwrap();
        assert_eq!(
            grants,
            AclValue::Grants(vec![AclGrant::new("id=1", AclPermission::FullControl)])
        );

        let other: AclValue = serde_json::from_str("17").unwrap();
        assert_eq!(other, AclValue::Other(serde_json::json!(17)));

        let json = serde_json::to_string(&AclValue::Predefined(PredefinedAcl::Private)).unwrap();
        assert_eq!(json, r#"{"predefined":"PRIVATE"}"#);
    }

    proptest::proptest! {
        #[test]
        fn prop_resolution_is_deterministic(
            name in "[A-Za-z_-]{0,24}",
            default in proptest::option::of("[a-z-]{0,24}"),
        ) {
            let resolver = AclResolver::new(&PredefinedAcl::ALL, false).with_default_acl(default);
            let value = AclValue::Text(name);
            let first = resolver.resolve(Some(&value)).unwrap();
            for _ in 0..4 {
                proptest::prop_assert_eq!(&resolver.resolve(Some(&value)).unwrap(), &first);
            }
        }

        #[test]
        fn prop_canonical_names_always_resolve(index in 0usize..7, upper in proptest::bool::ANY) {
            let acl = PredefinedAcl::ALL[index];
            let name = if upper { acl.as_str().to_string() } else { acl.header_value().to_string() };
            let resolved = AclResolver::new(&PredefinedAcl::ALL, false)
                .resolve(Some(&AclValue::Text(name)))
                .unwrap();
            proptest::prop_assert_eq!(resolved, Some(ResolvedAcl::Predefined(acl)));
        }
    }
}
