//! Claim set carried by gateway bearer tokens

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Audience may be a single string or a list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

/// Registered (RFC 7519) claims
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Verified contents of a bearer token
///
/// Built only by [`crate::auth::TokenValidator`] and dropped once the
/// request it authorizes has been handled.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Numeric identifier of the authenticated user
    #[serde(default)]
    pub id: i64,
    #[serde(
        default,
        deserialize_with = "nullable_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_name: Option<String>,
    /// Raw role claim; checked against [`Role`] by the gate
    #[serde(default)]
    pub role: String,
    /// Token type discriminator
    #[serde(default, rename = "type")]
    pub token_type: String,
    #[serde(flatten)]
    pub registered: RegisteredClaims,
}

/// Name claim as minted by issuers that wrap nullable columns
#[derive(Deserialize)]
#[serde(untagged)]
enum NameClaim {
    Plain(String),
    Nullable {
        #[serde(rename = "String", default)]
        value: String,
        #[serde(rename = "Valid", default)]
        valid: bool,
    },
}

/// Accepts `"Ada"`, `null`, or `{"String": "Ada", "Valid": true}`
fn nullable_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NameClaim>::deserialize(deserializer)? {
        None => None,
        Some(NameClaim::Plain(name)) => Some(name),
        Some(NameClaim::Nullable { value, valid }) => valid.then_some(value),
    })
}

impl TokenClaims {
    pub fn role(&self) -> Result<Role, UnknownRole> {
        self.role.parse()
    }
}

/// Roles allowed through the gateway
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
    Courier,
    Manager,
    Client,
    Vendor,
}

impl Role {
    pub const ALLOWED: [Self; 6] = [
        Self::Admin,
        Self::User,
        Self::Courier,
        Self::Manager,
        Self::Client,
        Self::Vendor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
            Self::Courier => "COURIER",
            Self::Manager => "MANAGER",
            Self::Client => "CLIENT",
            Self::Vendor => "VENDOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("role '{0}' is not permitted")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Exact, case-sensitive match
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALLOWED
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ADMIN", Role::Admin)]
    #[case("USER", Role::User)]
    #[case("COURIER", Role::Courier)]
    #[case("MANAGER", Role::Manager)]
    #[case("CLIENT", Role::Client)]
    #[case("VENDOR", Role::Vendor)]
    fn test_allowed_roles_parse(#[case] raw: &str, #[case] expected: Role) {
        assert_eq!(raw.parse::<Role>().unwrap(), expected);
        assert_eq!(expected.to_string(), raw);
    }

    #[rstest]
    #[case("admin")]
    #[case("GUEST")]
    #[case("")]
    #[case(" ADMIN")]
    fn test_other_roles_are_rejected(#[case] raw: &str) {
        assert_eq!(raw.parse::<Role>(), Err(UnknownRole(raw.to_string())));
    }

    #[test]
    fn test_claims_deserialize_with_registered_fields() {
        let json = serde_json::json!({
            "id": 42,
            "first_name": "Ada",
            "role": "COURIER",
            "type": "access",
            "iss": "orders",
            "aud": ["gateway", "mobile"],
            "exp": 1_900_000_000,
        });

        let claims: TokenClaims = serde_json::from_value(json).unwrap();
        assert_eq!(claims.id, 42);
        assert_eq!(claims.first_name.as_deref(), Some("Ada"));
        assert_eq!(claims.last_name, None);
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.role(), Ok(Role::Courier));
        assert_eq!(claims.registered.iss.as_deref(), Some("orders"));
        assert_eq!(
            claims.registered.aud,
            Some(Audience::Many(vec!["gateway".into(), "mobile".into()]))
        );
        assert_eq!(claims.registered.exp, Some(1_900_000_000));
    }

    #[rstest]
    #[case(serde_json::json!({"String": "Ada", "Valid": true}), Some("Ada"))]
    #[case(serde_json::json!({"String": "", "Valid": false}), None)]
    #[case(serde_json::json!("Ada"), Some("Ada"))]
    #[case(serde_json::Value::Null, None)]
    fn test_name_claim_shapes(
        #[case] first_name: serde_json::Value,
        #[case] expected: Option<&str>,
    ) {
        let json = serde_json::json!({
            "id": 42,
            "first_name": first_name,
            "role": "ADMIN",
            "type": "access",
        });

        let claims: TokenClaims = serde_json::from_value(json).unwrap();
        assert_eq!(claims.first_name.as_deref(), expected);
        assert_eq!(claims.last_name, None);
    }

    #[test]
    fn test_missing_role_is_empty_and_not_permitted() {
        let claims: TokenClaims = serde_json::from_value(serde_json::json!({ "id": 1 })).unwrap();
        assert!(claims.role.is_empty());
        assert!(claims.role().is_err());
    }
}
