use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Tier value granting unconditional readiness.
pub const TIER_ELITE: &str = "elite";

/// A canonical user account. Assessment runs may reference one explicitly via
/// `user_id`, or only loosely through whatever identifier the client supplied
/// at the time; the identity resolver bridges the two.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub tier: String,
    pub can_access_certificates: bool,
    pub can_access_recommendations: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_elite(&self) -> bool {
        self.tier == TIER_ELITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user(tier: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: "jane@example.com".to_string(),
            display_name: "Jane Doe".to_string(),
            tier: tier.to_string(),
            can_access_certificates: false,
            can_access_recommendations: false,
            status: "active".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_elite_tier_detection() {
        assert!(make_user("elite").is_elite());
        assert!(!make_user("standard").is_elite());
        // Tier strings are stored as-is; casing matters.
        assert!(!make_user("Elite").is_elite());
    }
}
