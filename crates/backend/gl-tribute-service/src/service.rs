use std::sync::Arc;

use gl_auth_core::JwtConfig;
use gl_entitlement::PlanCatalog;
use gl_remote_db::DatabaseManager;

pub struct AppState {
    pub db: Arc<DatabaseManager>,
    pub catalog: Arc<PlanCatalog>,
    pub jwt_config: Arc<JwtConfig>,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseManager>,
        catalog: Arc<PlanCatalog>,
        jwt_config: Arc<JwtConfig>,
    ) -> Self {
        Self {
            db,
            catalog,
            jwt_config,
        }
    }

    /// The plan key governing a user's entitlements. Missing profile rows
    /// and unrecognized stored plans both resolve to the free tier, so a
    /// corrupt plan column degrades to free limits instead of locking the
    /// user out entirely.
    pub async fn plan_key_for(&self, user_id: uuid::Uuid) -> Result<String, crate::error::TributeError> {
        let plan = self
            .db
            .find_profile(user_id)
            .await?
            .map(|p| p.plan().as_str().to_string())
            .unwrap_or_else(|| "free".to_string());
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use gl_entitlement::{PlanCatalog, ResourceKind};
    use gl_remote_db::Profile;
    use uuid::Uuid;

    fn profile_with_plan(plan: &str) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            plan: plan.to_string(),
            subscription_status: "active".to_string(),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            current_period_end: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unknown_stored_plan_gates_as_free() {
        let catalog = PlanCatalog::new("price_family", "price_legacy");
        let key = profile_with_plan("premium").plan().as_str().to_string();

        assert_eq!(key, "free");
        // Free limits, not a total lockout: the first tribute is allowed.
        assert!(!catalog.has_reached_limit(&key, ResourceKind::Tributes, 0));
        assert!(catalog.has_reached_limit(&key, ResourceKind::Tributes, 1));
    }

    #[test]
    fn known_stored_plan_keeps_its_limits() {
        let catalog = PlanCatalog::new("price_family", "price_legacy");
        let key = profile_with_plan("family").plan().as_str().to_string();

        assert_eq!(key, "family");
        assert!(!catalog.has_reached_limit(&key, ResourceKind::Contributors, 500));
    }
}
