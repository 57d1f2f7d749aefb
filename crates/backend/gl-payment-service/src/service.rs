use std::sync::Arc;

use gl_auth_core::JwtConfig;
use gl_entitlement::PlanCatalog;
use gl_remote_db::DatabaseManager;
use stripe::{Client, RequestStrategy};

use crate::config::PaymentConfig;
use crate::webhook::SubscriptionSynchronizer;

pub struct AppState {
    pub client: Client,
    pub config: PaymentConfig,
    pub catalog: Arc<PlanCatalog>,
    pub db: Arc<DatabaseManager>,
    pub synchronizer: SubscriptionSynchronizer,
    pub jwt_config: Arc<JwtConfig>,
}

impl AppState {
    pub fn from_env(db: Arc<DatabaseManager>) -> Result<Self, crate::error::PaymentError> {
        let config = PaymentConfig::from_env()?;
        let catalog = Arc::new(config.plan_catalog());
        let client = Client::new(&config.stripe_secret_key)
            .with_strategy(RequestStrategy::ExponentialBackoff(3));
        let jwt_config = Arc::new(JwtConfig::default());
        let synchronizer = SubscriptionSynchronizer::new(db.clone(), catalog.clone());
        Ok(Self {
            client,
            config,
            catalog,
            db,
            synchronizer,
            jwt_config,
        })
    }
}
