//! Identity resolution: maps whatever identifier a client supplies (user id,
//! email, display name, in any casing) onto a canonical user and the set of
//! aliases under which that person's assessment runs may be stored.
//!
//! Runs written by current code carry an explicit `user_id` plus a normalized
//! `owner_key`; older rows may hold only a free-form identifier, so lookups
//! also match the raw string exactly. Zero matches is a normal outcome, never
//! an error.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::user::User;

/// An owner identifier as supplied by the client, paired with its canonical
/// lookup key (trimmed, lowercased).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerIdentifier {
    raw: String,
    key: String,
}

impl OwnerIdentifier {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let key = normalize_key(&raw);
        Self { raw, key }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

/// Canonical form of an identifier: surrounding whitespace removed, Unicode
/// lowercase. All persisted keys and all lookups go through this.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// The alias set used to find an owner's runs: the resolved user (if any),
/// every normalized key the owner is known under, and the raw identifier for
/// rows predating key normalization.
#[derive(Debug, Clone)]
pub struct OwnerQuery {
    pub raw: String,
    pub user_id: Option<Uuid>,
    pub keys: Vec<String>,
}

impl OwnerQuery {
    /// Builds the alias set from an identifier and the user it resolved to.
    pub fn new(ident: &OwnerIdentifier, user: Option<&User>) -> Self {
        let mut keys = vec![ident.key().to_string()];
        if let Some(user) = user {
            keys.push(normalize_key(&user.email));
            keys.push(normalize_key(&user.display_name));
        }
        keys.retain(|k| !k.is_empty());
        keys.sort();
        keys.dedup();

        Self {
            raw: ident.raw().to_string(),
            user_id: user.map(|u| u.id),
            keys,
        }
    }

    /// Alias set for a bare identifier with no account behind it.
    pub fn unresolved(ident: &OwnerIdentifier) -> Self {
        Self::new(ident, None)
    }
}

/// Looks up the canonical user behind an identifier. UUID-shaped input is
/// treated as a user id; anything else matches email first, then display
/// name, both case-insensitively against the stored values.
pub async fn resolve_user(
    pool: &PgPool,
    ident: &OwnerIdentifier,
) -> Result<Option<User>, sqlx::Error> {
    if let Ok(id) = Uuid::parse_str(ident.key()) {
        return sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await;
    }

    let by_email: Option<User> = sqlx::query_as(
        "SELECT * FROM users WHERE lower(email) = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(ident.key())
    .fetch_optional(pool)
    .await?;

    if by_email.is_some() {
        return Ok(by_email);
    }

    sqlx::query_as(
        "SELECT * FROM users WHERE lower(display_name) = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(ident.key())
    .fetch_optional(pool)
    .await
}

/// Resolves an identifier into the full alias set for run lookups.
pub async fn resolve_owner(pool: &PgPool, raw: &str) -> Result<OwnerQuery, sqlx::Error> {
    let ident = OwnerIdentifier::new(raw);
    let user = resolve_user(pool, &ident).await?;
    Ok(OwnerQuery::new(&ident, user.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_user(email: &str, display_name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            tier: "standard".to_string(),
            can_access_certificates: false,
            can_access_recommendations: false,
            status: "active".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize_key("  Jane@Example.com  "), "jane@example.com");
        assert_eq!(normalize_key("JANE DOE"), "jane doe");
    }

    #[test]
    fn test_identifier_keeps_raw_form() {
        let ident = OwnerIdentifier::new(" Jane@Example.com ");
        assert_eq!(ident.raw(), "Jane@Example.com");
        assert_eq!(ident.key(), "jane@example.com");
    }

    #[test]
    fn test_differently_cased_inputs_share_a_key() {
        let a = OwnerIdentifier::new("Jane@Example.com");
        let b = OwnerIdentifier::new("jane@example.COM");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_blank_identifier_is_empty() {
        assert!(OwnerIdentifier::new("   ").is_empty());
        assert!(!OwnerIdentifier::new("x").is_empty());
    }

    #[test]
    fn test_alias_set_without_user() {
        let query = OwnerQuery::unresolved(&OwnerIdentifier::new("Jane@Example.com"));
        assert_eq!(query.raw, "Jane@Example.com");
        assert_eq!(query.user_id, None);
        assert_eq!(query.keys, vec!["jane@example.com".to_string()]);
    }

    #[test]
    fn test_alias_set_includes_user_aliases() {
        let user = make_user("jane@example.com", "Jane Doe");
        let query = OwnerQuery::new(&OwnerIdentifier::new("Jane Doe"), Some(&user));

        assert_eq!(query.user_id, Some(user.id));
        assert!(query.keys.contains(&"jane doe".to_string()));
        assert!(query.keys.contains(&"jane@example.com".to_string()));
    }

    #[test]
    fn test_alias_set_dedups_overlapping_keys() {
        let user = make_user("jane@example.com", "Jane Doe");
        // Input key equals the user's email key; it must appear once.
        let query = OwnerQuery::new(&OwnerIdentifier::new("JANE@example.com"), Some(&user));
        let email_keys = query
            .keys
            .iter()
            .filter(|k| *k == "jane@example.com")
            .count();
        assert_eq!(email_keys, 1);
    }
}
