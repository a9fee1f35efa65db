use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims embedded in the identity provider's session token.
/// The provider owns login/logout; this service only verifies and reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the authenticated user id
    pub sub: Uuid,
    /// Subscription plan tag resolved at login time ("free", "starter", "pro", "team")
    pub plan: String,
    /// Expiry (unix seconds)
    pub exp: i64,
}

/// Subscription plan tiers, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Starter,
    Pro,
    Team,
}

impl PlanTier {
    /// Parse a plan tag from the token. Unknown tags get the lowest tier
    /// rather than an error so a billing-side rename never locks users out
    /// of endpoints below the gated minimum.
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "team" => PlanTier::Team,
            "pro" => PlanTier::Pro,
            "starter" => PlanTier::Starter,
            _ => PlanTier::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Starter => "starter",
            PlanTier::Pro => "pro",
            PlanTier::Team => "team",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truncated user-id prefix for log lines. Full ids never hit the logs.
pub fn user_log_prefix(user_id: &Uuid) -> String {
    let simple = user_id.simple().to_string();
    simple[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_tiers_are_ordered() {
        assert!(PlanTier::Free < PlanTier::Starter);
        assert!(PlanTier::Starter < PlanTier::Pro);
        assert!(PlanTier::Pro < PlanTier::Team);
    }

    #[test]
    fn unknown_plan_tag_maps_to_free() {
        assert_eq!(PlanTier::from_tag("enterprise-legacy"), PlanTier::Free);
        assert_eq!(PlanTier::from_tag("PRO"), PlanTier::Pro);
    }

    #[test]
    fn log_prefix_is_truncated() {
        let id = Uuid::new_v4();
        let prefix = user_log_prefix(&id);
        assert_eq!(prefix.len(), 8);
        assert!(id.simple().to_string().starts_with(&prefix));
    }
}
