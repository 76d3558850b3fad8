//! Allowlist entries and roles

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::store::DocumentSnapshot;

/// Capability level of an allowed user.
///
/// Variants are declared in ascending order so `Ord` gives
/// `User < Admin < Superadmin`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
    Superadmin,
}

impl UserRole {
    /// Wire form stored in the `role` field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
        }
    }

    /// Add or remove allowlist entries.
    pub fn can_manage_users(self) -> bool {
        self >= Self::Admin
    }

    /// Create, soft-delete and assign notes.
    pub fn can_manage_notes(self) -> bool {
        self >= Self::Admin
    }

    /// Promote or demote existing users.
    pub fn can_change_roles(self) -> bool {
        self == Self::Superadmin
    }

    /// Whether this role may hand out `role` to a new allowlist entry.
    pub fn can_grant(self, role: Self) -> bool {
        match role {
            Self::User => self.can_manage_users(),
            Self::Admin => self == Self::Superadmin,
            Self::Superadmin => false,
        }
    }

    /// Roles this role may choose from when adding a user.
    pub fn grantable_roles(self) -> &'static [Self] {
        match self {
            Self::Superadmin => &[Self::User, Self::Admin],
            Self::Admin => &[Self::User],
            Self::User => &[],
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::Superadmin),
            other => Err(Error::InvalidInput(format!("Unknown role: {other}"))),
        }
    }
}

// Unset or unrecognized roles read as the lowest role.
fn lenient_role<'de, D>(deserializer: D) -> std::result::Result<UserRole, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(|role| role.parse().ok())
        .unwrap_or_default())
}

/// A row of the `allowedUsers` collection, keyed by normalized email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: UserRole,
    #[serde(default)]
    pub added_by: String,
    #[serde(default)]
    pub added_at: Option<i64>,
}

impl AllowedUser {
    /// Decode a raw `allowedUsers` document.
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Result<Self> {
        let mut fields = snapshot.fields.clone();
        fields.insert(
            "id".to_string(),
            serde_json::Value::String(snapshot.id.clone()),
        );
        let mut user: Self = serde_json::from_value(serde_json::Value::Object(fields))?;
        if user.email.is_empty() {
            user.email.clone_from(&user.id);
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roles_are_totally_ordered() {
        assert!(UserRole::User < UserRole::Admin);
        assert!(UserRole::Admin < UserRole::Superadmin);
    }

    #[test]
    fn only_superadmin_grants_admin() {
        assert!(UserRole::Superadmin.can_grant(UserRole::Admin));
        assert!(!UserRole::Admin.can_grant(UserRole::Admin));
        assert!(UserRole::Admin.can_grant(UserRole::User));
        assert!(!UserRole::User.can_grant(UserRole::User));
        assert!(!UserRole::Superadmin.can_grant(UserRole::Superadmin));
    }

    #[test]
    fn capabilities_follow_role() {
        assert!(UserRole::Admin.can_manage_users());
        assert!(UserRole::Admin.can_manage_notes());
        assert!(!UserRole::Admin.can_change_roles());
        assert!(UserRole::Superadmin.can_change_roles());
        assert!(!UserRole::User.can_manage_notes());
        assert_eq!(
            UserRole::Superadmin.grantable_roles(),
            &[UserRole::User, UserRole::Admin]
        );
    }

    #[test]
    fn parse_and_display_round_trip_wire_names() {
        assert_eq!("Admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!(UserRole::Superadmin.to_string(), "superadmin");
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[test]
    fn from_snapshot_defaults_missing_role_to_user() {
        let snapshot = DocumentSnapshot {
            id: "carol@example.com".to_string(),
            fields: json!({ "email": "carol@example.com", "role": null, "addedBy": "root@example.com" })
                .as_object()
                .cloned()
                .unwrap(),
        };
        let user = AllowedUser::from_snapshot(&snapshot).unwrap();
        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.added_by, "root@example.com");

        let unknown = DocumentSnapshot {
            id: "dave@example.com".to_string(),
            fields: json!({ "role": "owner" }).as_object().cloned().unwrap(),
        };
        let user = AllowedUser::from_snapshot(&unknown).unwrap();
        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.email, "dave@example.com");
    }
}
