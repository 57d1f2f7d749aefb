use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use chrono::DateTime;
use gl_entitlement::{Plan, SubscriptionView};
use stripe::{
    BillingPortalSession, CheckoutSession, CheckoutSessionMode, CreateBillingPortalSession,
    CreateCheckoutSession, CreateCheckoutSessionLineItems, CreateCheckoutSessionSubscriptionData,
    CreateCustomer, Customer, CustomerId, Event, EventObject, EventType, Expandable, Webhook,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::analytics;
use crate::auth::AuthUser;
use crate::error::PaymentError;
use crate::service::AppState;
use crate::types::{CreateCheckoutRequest, CreateCheckoutResponse, CreatePortalResponse};

/// New paid subscriptions start with a two-week trial.
const TRIAL_PERIOD_DAYS: u32 = 14;

fn customer_ref(customer: &Expandable<Customer>) -> String {
    match customer {
        Expandable::Id(id) => id.to_string(),
        Expandable::Object(c) => c.id.to_string(),
    }
}

fn subscription_ref(subscription: &Expandable<stripe::Subscription>) -> String {
    match subscription {
        Expandable::Id(id) => id.to_string(),
        Expandable::Object(s) => s.id.to_string(),
    }
}

fn correlation_tags(metadata: &HashMap<String, String>) -> (Option<Uuid>, Option<Plan>) {
    let user_id = metadata
        .get("user_id")
        .and_then(|s| Uuid::parse_str(s).ok());
    let plan = metadata.get("plan").and_then(|p| Plan::parse(p));
    (user_id, plan)
}

// ---------------------------------------------------------------------------
// POST /payment/checkout
// ---------------------------------------------------------------------------

/// Creates a Stripe Checkout Session for a paid plan and returns its URL.
///
/// Plan validation happens before the auth check, matching the public API
/// contract: bad plans are 400 even for anonymous callers.
pub async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
    auth: Result<AuthUser, PaymentError>,
    Json(body): Json<CreateCheckoutRequest>,
) -> Result<Json<CreateCheckoutResponse>, PaymentError> {
    let plan = Plan::parse(&body.plan).ok_or(PaymentError::InvalidField("plan"))?;
    if plan == Plan::Free {
        return Err(PaymentError::InvalidField("plan"));
    }
    let price_id = state
        .catalog
        .price_id(plan)
        .ok_or(PaymentError::MissingField("price id for plan"))?
        .to_string();

    let AuthUser(claims) = auth?;
    let user_id = claims
        .user_id()
        .map_err(|e| PaymentError::Unauthorized(e.to_string()))?;

    // One Stripe customer per profile: create it on first checkout and
    // persist the ref so later checkouts and the portal reuse it.
    let existing = state
        .db
        .find_profile(user_id)
        .await?
        .and_then(|p| p.stripe_customer_id);

    let customer_id = match existing {
        Some(id) => id,
        None => {
            let mut params = CreateCustomer::new();
            params.email = Some(&claims.email);
            params.metadata = Some(HashMap::from([(
                "user_id".to_string(),
                user_id.to_string(),
            )]));

            let customer = Customer::create(&state.client, params).await?;
            let customer_id = customer.id.to_string();
            state.db.set_stripe_customer(user_id, &customer_id).await?;
            info!(%user_id, %customer_id, "Created Stripe customer");
            customer_id
        }
    };

    let customer = CustomerId::from_str(&customer_id)
        .map_err(|_| PaymentError::InvalidField("stripe customer id"))?;

    let success_url = format!("{}/dashboard?upgraded=true", state.config.frontend_url);
    let cancel_url = format!("{}/pricing", state.config.frontend_url);

    // The webhook attributes events to users through these tags; the
    // subscription copy makes them survive onto subscription.* events.
    let metadata = HashMap::from([
        ("user_id".to_string(), user_id.to_string()),
        ("plan".to_string(), plan.as_str().to_string()),
    ]);

    let mut params = CreateCheckoutSession::new();
    params.mode = Some(CheckoutSessionMode::Subscription);
    params.customer = Some(customer);
    params.line_items = Some(vec![CreateCheckoutSessionLineItems {
        price: Some(price_id),
        quantity: Some(1),
        ..Default::default()
    }]);
    params.success_url = Some(&success_url);
    params.cancel_url = Some(&cancel_url);
    params.metadata = Some(metadata.clone());
    params.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
        trial_period_days: Some(TRIAL_PERIOD_DAYS),
        metadata: Some(metadata),
        ..Default::default()
    });

    let session = match CheckoutSession::create(&state.client, params).await {
        Ok(session) => session,
        Err(e) => {
            analytics::track_checkout_session_creation_failed(plan.as_str(), "stripe");
            return Err(e.into());
        }
    };

    let url = session
        .url
        .ok_or(PaymentError::MissingField("checkout session URL"))?;

    analytics::track_checkout_session_created(plan.as_str());
    Ok(Json(CreateCheckoutResponse { url }))
}

// ---------------------------------------------------------------------------
// POST /payment/portal
// ---------------------------------------------------------------------------

/// Creates a Stripe Billing Portal session so customers can manage their
/// subscription. Users with no billing history have nothing to manage.
pub async fn create_portal_session(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<CreatePortalResponse>, PaymentError> {
    let user_id = claims
        .user_id()
        .map_err(|e| PaymentError::Unauthorized(e.to_string()))?;

    let customer_id = state
        .db
        .find_profile(user_id)
        .await?
        .and_then(|p| p.stripe_customer_id)
        .ok_or(PaymentError::MissingField("stripe customer for user"))?;

    let customer = CustomerId::from_str(&customer_id)
        .map_err(|_| PaymentError::InvalidField("stripe customer id"))?;

    let return_url = format!("{}/settings/billing", state.config.frontend_url);

    let mut params = CreateBillingPortalSession::new(customer);
    params.return_url = Some(&return_url);

    let session = BillingPortalSession::create(&state.client, params).await?;

    analytics::track_billing_portal_created();
    Ok(Json(CreatePortalResponse { url: session.url }))
}

// ---------------------------------------------------------------------------
// GET /payment/subscription
// ---------------------------------------------------------------------------

/// Returns the caller's subscription view. Never errors: anonymous
/// callers, missing rows, and read failures all get the free default.
pub async fn get_subscription_status(
    State(state): State<Arc<AppState>>,
    auth: Result<AuthUser, PaymentError>,
) -> Json<SubscriptionView> {
    let claims = auth.ok().map(|AuthUser(claims)| claims);
    let view = crate::subscription::get_user_subscription(&state.db, claims.as_ref()).await;
    Json(view)
}

// ---------------------------------------------------------------------------
// POST /payment/webhook
// ---------------------------------------------------------------------------

/// Handles incoming Stripe webhook events with signature verification.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, PaymentError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(PaymentError::WebhookSignatureInvalid)?;

    let event: Event =
        Webhook::construct_event(&body, signature, &state.config.stripe_webhook_secret)
            .map_err(|_| PaymentError::WebhookSignatureInvalid)?;

    match event.type_ {
        EventType::CheckoutSessionCompleted => {
            if let EventObject::CheckoutSession(session) = event.data.object {
                let (user_id, plan) = session
                    .metadata
                    .as_ref()
                    .map(|m| correlation_tags(m))
                    .unwrap_or((None, None));
                let customer_id = session.customer.as_ref().map(customer_ref);
                let subscription_id = session.subscription.as_ref().map(subscription_ref);

                info!(session_id = %session.id, user = ?user_id, "Checkout session completed");

                state
                    .synchronizer
                    .on_checkout_completed(user_id, plan, customer_id, subscription_id)
                    .await?;
            }
        }
        EventType::CustomerSubscriptionUpdated => {
            if let EventObject::Subscription(subscription) = event.data.object {
                let (user_id, _) = correlation_tags(&subscription.metadata);
                let price_id = subscription
                    .items
                    .data
                    .first()
                    .and_then(|item| item.price.as_ref())
                    .map(|price| price.id.to_string());
                let status = subscription.status.to_string();
                let period_end = DateTime::from_timestamp(subscription.current_period_end, 0);

                info!(subscription_id = %subscription.id, %status, "Subscription updated");

                state
                    .synchronizer
                    .on_subscription_updated(user_id, price_id.as_deref(), &status, period_end)
                    .await?;
            }
        }
        EventType::CustomerSubscriptionDeleted => {
            if let EventObject::Subscription(subscription) = event.data.object {
                let (user_id, _) = correlation_tags(&subscription.metadata);

                info!(subscription_id = %subscription.id, "Subscription deleted");

                state.synchronizer.on_subscription_deleted(user_id).await?;
            }
        }
        EventType::InvoicePaymentFailed => {
            if let EventObject::Invoice(invoice) = event.data.object {
                let customer_id = invoice.customer.as_ref().map(customer_ref);

                info!(invoice_id = %invoice.id, customer = ?customer_id, "Invoice payment failed");

                state.synchronizer.on_payment_failed(customer_id).await?;
            }
        }
        _ => {
            debug!(event_type = %event.type_, "Ignoring unhandled webhook event");
        }
    }

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use gl_remote_db::DatabaseManager;
    use jsonwebtoken::{Algorithm, DecodingKey, Validation};
    use tower::ServiceExt;

    use super::*;
    use crate::config::PaymentConfig;
    use crate::webhook::SubscriptionSynchronizer;

    // The pool is lazy: nothing here talks to Postgres, every request is
    // rejected before a query runs.
    fn test_state() -> Arc<AppState> {
        let config = PaymentConfig {
            stripe_secret_key: "sk_test_fake".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            family_price_id: "price_family".to_string(),
            legacy_price_id: "price_legacy".to_string(),
        };
        let catalog = Arc::new(config.plan_catalog());
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/gathered_light_test")
            .expect("lazy pool");
        let db = Arc::new(DatabaseManager { pool });
        let jwt_config = Arc::new(gl_auth_core::JwtConfig {
            access_token_decoding_key: DecodingKey::from_secret(b"test-secret"),
            validation: Validation::new(Algorithm::HS256),
        });
        Arc::new(AppState {
            client: stripe::Client::new(&config.stripe_secret_key),
            synchronizer: SubscriptionSynchronizer::new(db.clone(), catalog.clone()),
            config,
            catalog,
            db,
            jwt_config,
        })
    }

    // The checkout route sits behind the IP rate limiter; oneshot requests
    // have no peer address, so the client IP comes in as a forwarded header.
    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", "127.0.0.1")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn webhook_rejects_missing_signature() {
        let app = crate::create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payment/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_rejects_bad_signature() {
        let app = crate::create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payment/webhook")
                    .header("content-type", "application/json")
                    .header("stripe-signature", "t=123,v1=badsig")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn checkout_rejects_unknown_plan() {
        let app = crate::create_router(test_state());

        let response = app
            .oneshot(post_json("/payment/checkout", serde_json::json!({"plan": "premium"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn checkout_rejects_free_plan() {
        let app = crate::create_router(test_state());

        let response = app
            .oneshot(post_json("/payment/checkout", serde_json::json!({"plan": "free"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn checkout_requires_auth_for_valid_plan() {
        let app = crate::create_router(test_state());

        let response = app
            .oneshot(post_json("/payment/checkout", serde_json::json!({"plan": "family"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn checkout_rejects_unconfigured_price() {
        let config = PaymentConfig {
            stripe_secret_key: "sk_test_fake".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            family_price_id: String::new(),
            legacy_price_id: "price_legacy".to_string(),
        };
        let base = test_state();
        let catalog = Arc::new(config.plan_catalog());
        let state = Arc::new(AppState {
            client: stripe::Client::new(&config.stripe_secret_key),
            synchronizer: SubscriptionSynchronizer::new(base.db.clone(), catalog.clone()),
            config,
            catalog,
            db: base.db.clone(),
            jwt_config: base.jwt_config.clone(),
        });
        let app = crate::create_router(state);

        let response = app
            .oneshot(post_json("/payment/checkout", serde_json::json!({"plan": "family"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn portal_requires_auth() {
        let app = crate::create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payment/portal")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn subscription_defaults_to_free_for_anonymous() {
        let app = crate::create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/payment/subscription")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["plan"], "free");
        assert_eq!(json["status"], "none");
        assert!(json["stripe_customer_id"].is_null());
        assert!(json["stripe_subscription_id"].is_null());
        assert!(json["current_period_end"].is_null());
    }

    #[tokio::test]
    async fn subscription_defaults_to_free_for_garbage_token() {
        let app = crate::create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/payment/subscription")
                    .header("authorization", "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["plan"], "free");
    }
}
