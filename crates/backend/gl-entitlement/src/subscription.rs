use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::plan::Plan;

/// Status reported when a user has no subscription history at all.
pub const STATUS_NONE: &str = "none";

/// The subscription view returned to clients.
///
/// `status` is the literal status string last reported by Stripe
/// (`"active"`, `"trialing"`, `"past_due"`, ...) rather than a closed
/// enum; the webhook stores whatever the event carried and `"none"` is
/// the default for absent state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionView {
    pub plan: Plan,
    pub status: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl SubscriptionView {
    /// The safe default: no identity, no profile row, or any read failure
    /// all resolve here. Gating fails closed to the most restrictive tier.
    pub fn free() -> Self {
        Self {
            plan: Plan::Free,
            status: STATUS_NONE.to_string(),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            current_period_end: None,
        }
    }
}

impl Default for SubscriptionView {
    fn default() -> Self {
        Self::free()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_default_shape() {
        let view = SubscriptionView::free();
        assert_eq!(view.plan, Plan::Free);
        assert_eq!(view.status, "none");
        assert_eq!(view.stripe_customer_id, None);
        assert_eq!(view.stripe_subscription_id, None);
        assert_eq!(view.current_period_end, None);
    }

    #[test]
    fn serializes_with_lowercase_plan() {
        let json = serde_json::to_value(SubscriptionView::free()).unwrap();
        assert_eq!(json["plan"], "free");
        assert_eq!(json["status"], "none");
        assert!(json["stripe_customer_id"].is_null());
    }
}
