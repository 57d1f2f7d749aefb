use std::sync::Arc;

use chrono::{DateTime, Utc};
use gl_entitlement::{Plan, PlanCatalog, SubscriptionState, sync};
use gl_remote_db::DatabaseManager;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analytics;
use crate::error::PaymentError;

/// Reconciles Stripe lifecycle events into the profiles table.
///
/// Attribution comes first: checkout/subscription events must carry the
/// `user_id` metadata tag set at checkout creation, and invoice events
/// are matched by stored customer ref. Unattributable events are
/// acknowledged without touching state. Each transition is a pure
/// function (see `gl_entitlement::sync`) persisted as one upsert, so
/// redelivery converges.
pub struct SubscriptionSynchronizer {
    db: Arc<DatabaseManager>,
    catalog: Arc<PlanCatalog>,
}

impl SubscriptionSynchronizer {
    pub fn new(db: Arc<DatabaseManager>, catalog: Arc<PlanCatalog>) -> Self {
        Self { db, catalog }
    }

    async fn state_for(&self, user_id: Uuid) -> Result<SubscriptionState, PaymentError> {
        let state = self
            .db
            .find_profile(user_id)
            .await?
            .map(|p| p.subscription_state())
            .unwrap_or_default();
        Ok(state)
    }

    pub async fn on_checkout_completed(
        &self,
        user_id: Option<Uuid>,
        plan: Option<Plan>,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    ) -> Result<(), PaymentError> {
        let (Some(user_id), Some(plan)) = (user_id, plan) else {
            warn!("checkout.session.completed without user correlation tag, skipping");
            return Ok(());
        };

        let state = self.state_for(user_id).await?;
        let next = sync::checkout_completed(state, plan, customer_id, subscription_id);
        self.db.upsert_subscription_state(user_id, &next).await?;

        analytics::track_webhook_checkout_completed(next.stripe_subscription_id.is_some());
        info!(%user_id, plan = %next.plan, "Provisioned access after checkout");
        Ok(())
    }

    pub async fn on_subscription_updated(
        &self,
        user_id: Option<Uuid>,
        price_id: Option<&str>,
        status: &str,
        current_period_end: Option<DateTime<Utc>>,
    ) -> Result<(), PaymentError> {
        let Some(user_id) = user_id else {
            warn!("customer.subscription.updated without user correlation tag, skipping");
            return Ok(());
        };

        let state = self.state_for(user_id).await?;
        let next =
            sync::subscription_updated(&self.catalog, state, price_id, status, current_period_end);
        self.db.upsert_subscription_state(user_id, &next).await?;

        analytics::track_webhook_subscription_updated(status, next.plan.as_str());
        info!(%user_id, plan = %next.plan, %status, "Subscription updated");
        Ok(())
    }

    pub async fn on_subscription_deleted(&self, user_id: Option<Uuid>) -> Result<(), PaymentError> {
        let Some(user_id) = user_id else {
            warn!("customer.subscription.deleted without user correlation tag, skipping");
            return Ok(());
        };

        let state = self.state_for(user_id).await?;
        let next = sync::subscription_deleted(state);
        self.db.upsert_subscription_state(user_id, &next).await?;

        analytics::track_webhook_subscription_deleted();
        info!(%user_id, "Subscription deleted, access revoked");
        Ok(())
    }

    pub async fn on_payment_failed(&self, customer_id: Option<String>) -> Result<(), PaymentError> {
        let Some(customer_id) = customer_id else {
            warn!("invoice.payment_failed without customer ref, skipping");
            return Ok(());
        };

        let Some(profile) = self.db.find_profile_by_stripe_customer(&customer_id).await? else {
            warn!(%customer_id, "Payment failure for unknown customer, skipping");
            analytics::track_webhook_invoice_payment_failed(false);
            return Ok(());
        };

        let next = sync::payment_failed(profile.subscription_state());
        self.db.upsert_subscription_state(profile.id, &next).await?;

        analytics::track_webhook_invoice_payment_failed(true);
        info!(user_id = %profile.id, "Subscription marked past due");
        Ok(())
    }
}
