//! Allowlist authorization and user management.
//!
//! Access is granted by the configured superadmin address or by a row in the
//! `allowedUsers` collection keyed by normalized email. Nothing is cached:
//! every check reads the allowlist again.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::auth::AuthUser;
use crate::error::{Error, Result};
use crate::models::{AllowedUser, UserRole};
use crate::store::{
    DocumentSnapshot, DocumentStore, FieldFilter, Query, SetMode, Subscription, Write,
    ALLOWED_USERS_COLLECTION,
};
use crate::util::normalize_email;

/// Outcome of an allowlist check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorization {
    pub allowed: bool,
    pub role: UserRole,
}

impl Authorization {
    pub const DENIED: Self = Self {
        allowed: false,
        role: UserRole::User,
    };
}

/// A signed-in user together with the role the allowlist gave them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user: AuthUser,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user: AuthUser, role: UserRole) -> Self {
        Self { user, role }
    }

    /// Normalized email, empty when the identity has none.
    pub fn email(&self) -> String {
        self.user
            .email
            .as_deref()
            .map(normalize_email)
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn DocumentStore>,
    superadmin_email: String,
}

impl AccessResolver {
    pub fn new(store: Arc<dyn DocumentStore>, superadmin_email: &str) -> Self {
        Self {
            store,
            superadmin_email: normalize_email(superadmin_email),
        }
    }

    pub fn superadmin_email(&self) -> &str {
        &self.superadmin_email
    }

    /// Case-insensitive comparison against the configured superadmin.
    pub fn is_superadmin(&self, email: &str) -> bool {
        !self.superadmin_email.is_empty() && normalize_email(email) == self.superadmin_email
    }

    pub async fn check_user_allowed(&self, email: &str) -> Result<Authorization> {
        if self.is_superadmin(email) {
            return Ok(Authorization {
                allowed: true,
                role: UserRole::Superadmin,
            });
        }

        let email = normalize_email(email);
        if email.is_empty() {
            return Ok(Authorization::DENIED);
        }

        let query = Query::collection(ALLOWED_USERS_COLLECTION)
            .filter(FieldFilter::equal("email", email.as_str()));
        let rows = self.store.run_query(&query).await?;
        let Some(row) = rows.first() else {
            tracing::info!("{} is not on the allowlist", email);
            return Ok(Authorization::DENIED);
        };

        let user = AllowedUser::from_snapshot(row)?;
        Ok(Authorization {
            allowed: true,
            role: user.role,
        })
    }
}

/// Allowlist management on behalf of a privileged actor.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
    resolver: AccessResolver,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, superadmin_email: &str) -> Self {
        Self {
            resolver: AccessResolver::new(Arc::clone(&store), superadmin_email),
            store,
        }
    }

    pub fn resolver(&self) -> &AccessResolver {
        &self.resolver
    }

    /// Add or overwrite an allowlist row.
    pub async fn add_allowed_user(
        &self,
        actor: &Actor,
        email: &str,
        role: UserRole,
    ) -> Result<AllowedUser> {
        let email = validate_email(email)?;
        if self.resolver.is_superadmin(&email) {
            return Err(Error::InvalidInput(
                "Cannot add superadmin to allowed users".to_string(),
            ));
        }
        if !actor.role.can_manage_users() {
            return Err(Error::PermissionDenied(
                "Only admins can add users".to_string(),
            ));
        }
        if !actor.role.can_grant(role) {
            return Err(Error::PermissionDenied(format!(
                "A {} cannot grant the {} role",
                actor.role, role
            )));
        }

        let added_by = actor.email();
        let write = Write::new()
            .set("email", email.as_str())
            .set("role", role.as_str())
            .set("addedBy", added_by.as_str())
            .server_timestamp("addedAt");
        self.store
            .set(ALLOWED_USERS_COLLECTION, &email, write, SetMode::Overwrite)
            .await?;
        tracing::info!("{} added {} as {}", added_by, email, role);

        Ok(AllowedUser {
            id: email.clone(),
            email,
            role,
            added_by,
            added_at: None,
        })
    }

    /// Hard delete an allowlist row.
    pub async fn remove_allowed_user(&self, actor: &Actor, email: &str) -> Result<()> {
        if !actor.role.can_manage_users() {
            return Err(Error::PermissionDenied(
                "Only admins can remove users".to_string(),
            ));
        }
        let email = normalize_email(email);
        if self.resolver.is_superadmin(&email) {
            return Err(Error::InvalidInput(
                "The superadmin cannot be removed".to_string(),
            ));
        }

        self.store.delete(ALLOWED_USERS_COLLECTION, &email).await?;
        tracing::info!("{} removed {}", actor.email(), email);
        Ok(())
    }

    pub async fn update_user_role(&self, actor: &Actor, email: &str, role: UserRole) -> Result<()> {
        if !actor.role.can_change_roles() {
            return Err(Error::PermissionDenied(
                "Only the superadmin can change roles".to_string(),
            ));
        }
        let email = normalize_email(email);
        if self.resolver.is_superadmin(&email) {
            return Err(Error::InvalidInput(
                "The superadmin role cannot be changed".to_string(),
            ));
        }
        if role == UserRole::Superadmin {
            return Err(Error::InvalidInput(
                "The superadmin role cannot be granted".to_string(),
            ));
        }

        let write = Write::new().set("role", role.as_str());
        self.store
            .set(ALLOWED_USERS_COLLECTION, &email, write, SetMode::Merge)
            .await?;
        tracing::info!("{} changed {} to {}", actor.email(), email, role);
        Ok(())
    }

    pub async fn list_allowed_users(&self) -> Result<Vec<AllowedUser>> {
        let rows = self
            .store
            .run_query(&Query::collection(ALLOWED_USERS_COLLECTION))
            .await?;
        Ok(allowed_users_from_snapshots(&rows))
    }

    /// Live allowlist, sorted by email.
    pub fn subscribe_allowed_users(&self) -> Subscription<Vec<AllowedUser>> {
        self.store
            .listen_query(Query::collection(ALLOWED_USERS_COLLECTION))
            .map(|rows| allowed_users_from_snapshots(&rows))
    }
}

fn allowed_users_from_snapshots(rows: &[DocumentSnapshot]) -> Vec<AllowedUser> {
    let mut users: Vec<AllowedUser> = rows
        .iter()
        .filter_map(|row| match AllowedUser::from_snapshot(row) {
            Ok(user) => Some(user),
            Err(error) => {
                tracing::warn!("Skipping malformed allowlist row {}: {}", row.id, error);
                None
            }
        })
        .collect();
    users.sort_by(|a, b| a.email.cmp(&b.email));
    users
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex"))
}

/// Normalize an email from a form and check its shape.
pub fn validate_email(email: &str) -> Result<String> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(Error::InvalidInput("Email is required".to_string()));
    }
    if !email_pattern().is_match(&email) {
        return Err(Error::InvalidInput(format!("Invalid email address: {email}")));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    const SUPERADMIN: &str = "Boss@Example.com";

    fn actor(email: &str, role: UserRole) -> Actor {
        Actor::new(AuthUser::new("uid", Some(email.to_string())), role)
    }

    fn directory() -> (MemoryStore, UserDirectory) {
        let store = MemoryStore::new();
        let directory = UserDirectory::new(Arc::new(store.clone()), SUPERADMIN);
        (store, directory)
    }

    #[test]
    fn superadmin_match_ignores_case_and_whitespace() {
        let (_, directory) = directory();
        let resolver = directory.resolver();
        assert!(resolver.is_superadmin(" boss@EXAMPLE.com "));
        assert!(!resolver.is_superadmin("other@example.com"));
    }

    #[test]
    fn empty_superadmin_matches_nobody() {
        let resolver = AccessResolver::new(Arc::new(MemoryStore::new()), "  ");
        assert!(!resolver.is_superadmin(""));
    }

    #[tokio::test]
    async fn superadmin_is_allowed_without_a_row() {
        let (_, directory) = directory();
        let authorization = directory
            .resolver()
            .check_user_allowed("BOSS@example.com")
            .await
            .unwrap();
        assert_eq!(
            authorization,
            Authorization {
                allowed: true,
                role: UserRole::Superadmin
            }
        );
    }

    #[tokio::test]
    async fn unknown_email_is_denied() {
        let (_, directory) = directory();
        let authorization = directory
            .resolver()
            .check_user_allowed("stranger@example.com")
            .await
            .unwrap();
        assert_eq!(authorization, Authorization::DENIED);
    }

    #[tokio::test]
    async fn stored_row_grants_its_role_case_insensitively() {
        let (_, directory) = directory();
        let boss = actor(SUPERADMIN, UserRole::Superadmin);
        directory
            .add_allowed_user(&boss, "Ann@Example.com", UserRole::Admin)
            .await
            .unwrap();

        let authorization = directory
            .resolver()
            .check_user_allowed("ANN@example.COM")
            .await
            .unwrap();
        assert_eq!(
            authorization,
            Authorization {
                allowed: true,
                role: UserRole::Admin
            }
        );
    }

    #[tokio::test]
    async fn row_without_role_reads_as_user() {
        let (store, directory) = directory();
        store
            .set(
                ALLOWED_USERS_COLLECTION,
                "bob@example.com",
                Write::new().set("email", "bob@example.com"),
                SetMode::Overwrite,
            )
            .await
            .unwrap();

        let authorization = directory
            .resolver()
            .check_user_allowed("bob@example.com")
            .await
            .unwrap();
        assert!(authorization.allowed);
        assert_eq!(authorization.role, UserRole::User);
    }

    #[tokio::test]
    async fn add_writes_normalized_row_with_audit_fields() {
        let (store, directory) = directory();
        let admin = actor("Admin@Example.com", UserRole::Admin);
        directory
            .add_allowed_user(&admin, "  New.User@Example.com ", UserRole::User)
            .await
            .unwrap();

        let row = store
            .get(ALLOWED_USERS_COLLECTION, "new.user@example.com")
            .await
            .unwrap()
            .unwrap();
        let user = AllowedUser::from_snapshot(&row).unwrap();
        assert_eq!(user.email, "new.user@example.com");
        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.added_by, "admin@example.com");
        assert!(user.added_at.is_some());
    }

    #[tokio::test]
    async fn add_rejects_invalid_or_reserved_addresses() {
        let (_, directory) = directory();
        let boss = actor(SUPERADMIN, UserRole::Superadmin);

        for email in ["", "   ", "no-at-sign", "a@b", "a b@c.d"] {
            let error = directory
                .add_allowed_user(&boss, email, UserRole::User)
                .await
                .unwrap_err();
            assert!(matches!(error, Error::InvalidInput(_)), "{email}");
        }

        let error = directory
            .add_allowed_user(&boss, "boss@example.com", UserRole::User)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn admin_cannot_grant_admin_and_users_cannot_add() {
        let (_, directory) = directory();
        let admin = actor("admin@example.com", UserRole::Admin);
        let user = actor("user@example.com", UserRole::User);

        let error = directory
            .add_allowed_user(&admin, "x@example.com", UserRole::Admin)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::PermissionDenied(_)));

        let error = directory
            .add_allowed_user(&user, "x@example.com", UserRole::User)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::PermissionDenied(_)));

        let boss = actor(SUPERADMIN, UserRole::Superadmin);
        let error = directory
            .add_allowed_user(&boss, "x@example.com", UserRole::Superadmin)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn only_superadmin_changes_roles() {
        let (_, directory) = directory();
        let boss = actor(SUPERADMIN, UserRole::Superadmin);
        let admin = actor("admin@example.com", UserRole::Admin);
        directory
            .add_allowed_user(&boss, "carol@example.com", UserRole::User)
            .await
            .unwrap();

        let error = directory
            .update_user_role(&admin, "carol@example.com", UserRole::Admin)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::PermissionDenied(_)));

        directory
            .update_user_role(&boss, "Carol@Example.com", UserRole::Admin)
            .await
            .unwrap();
        let users = directory.list_allowed_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, UserRole::Admin);
        assert_eq!(users[0].added_by, "boss@example.com");

        let error = directory
            .update_user_role(&boss, SUPERADMIN, UserRole::User)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn remove_requires_admin_and_deletes_row() {
        let (_, directory) = directory();
        let boss = actor(SUPERADMIN, UserRole::Superadmin);
        let user = actor("dave@example.com", UserRole::User);
        directory
            .add_allowed_user(&boss, "dave@example.com", UserRole::User)
            .await
            .unwrap();

        let error = directory
            .remove_allowed_user(&user, "dave@example.com")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::PermissionDenied(_)));

        directory
            .remove_allowed_user(&boss, "dave@example.com")
            .await
            .unwrap();
        let authorization = directory
            .resolver()
            .check_user_allowed("dave@example.com")
            .await
            .unwrap();
        assert_eq!(authorization, Authorization::DENIED);
    }

    #[tokio::test]
    async fn allowed_users_are_sorted_by_email() {
        let (_, directory) = directory();
        let boss = actor(SUPERADMIN, UserRole::Superadmin);
        let mut subscription = directory.subscribe_allowed_users();
        assert_eq!(subscription.next().await.unwrap().unwrap(), Vec::new());

        for email in ["zoe@example.com", "amy@example.com", "mia@example.com"] {
            directory
                .add_allowed_user(&boss, email, UserRole::User)
                .await
                .unwrap();
        }

        let emails: Vec<String> = directory
            .list_allowed_users()
            .await
            .unwrap()
            .into_iter()
            .map(|user| user.email)
            .collect();
        assert_eq!(
            emails,
            vec!["amy@example.com", "mia@example.com", "zoe@example.com"]
        );

        let mut latest = Vec::new();
        while latest.len() < 3 {
            latest = subscription.next().await.unwrap().unwrap();
        }
        assert_eq!(latest[0].email, "amy@example.com");
    }
}
