use axum::http::HeaderValue;
use gl_entitlement::PlanCatalog;

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub frontend_url: String,
    pub family_price_id: String,
    pub legacy_price_id: String,
}

impl PaymentConfig {
    pub fn from_env() -> Result<Self, crate::error::PaymentError> {
        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY").map_err(|_| {
            crate::error::PaymentError::Config(
                "STRIPE_SECRET_KEY environment variable must be set".into(),
            )
        })?;

        let stripe_webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET").map_err(|_| {
            crate::error::PaymentError::Config(
                "STRIPE_WEBHOOK_SECRET environment variable must be set".into(),
            )
        })?;

        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        HeaderValue::from_str(&frontend_url).map_err(|e| {
            crate::error::PaymentError::Config(format!(
                "FRONTEND_URL '{frontend_url}' is not a valid header value: {e}"
            ))
        })?;

        // Paid tiers without a configured price are rejected at checkout
        // time with a client error rather than failing startup, so a
        // deployment can run the free tier alone.
        let family_price_id = std::env::var("STRIPE_FAMILY_PRICE_ID").unwrap_or_default();
        let legacy_price_id = std::env::var("STRIPE_LEGACY_PRICE_ID").unwrap_or_default();
        if family_price_id.is_empty() || legacy_price_id.is_empty() {
            tracing::warn!("One or more plan price ids are not configured; paid checkout disabled for those plans");
        }

        Ok(Self {
            stripe_secret_key,
            stripe_webhook_secret,
            frontend_url,
            family_price_id,
            legacy_price_id,
        })
    }

    /// The immutable plan table for this deployment.
    pub fn plan_catalog(&self) -> PlanCatalog {
        PlanCatalog::new(self.family_price_id.clone(), self.legacy_price_id.clone())
    }
}
