use std::time::Duration;

use posthog_rs::Event;
use tracing::warn;

const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

fn capture_async(event: Event) {
    tokio::spawn(async move {
        match tokio::time::timeout(CAPTURE_TIMEOUT, posthog_rs::capture(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to capture analytics event: {e}"),
            Err(_) => warn!("Analytics event capture timed out"),
        }
    });
}

pub fn track_checkout_session_created(plan: &str) {
    let mut event = Event::new_anon("checkout_session_created");
    event.insert_prop("plan", plan).ok();
    capture_async(event);
}

pub fn track_checkout_session_creation_failed(plan: &str, error_kind: &str) {
    let mut event = Event::new_anon("checkout_session_creation_failed");
    event.insert_prop("plan", plan).ok();
    event.insert_prop("error_kind", error_kind).ok();
    capture_async(event);
}

pub fn track_billing_portal_created() {
    let event = Event::new_anon("billing_portal_created");
    capture_async(event);
}

pub fn track_webhook_checkout_completed(has_subscription: bool) {
    let mut event = Event::new_anon("webhook_checkout_completed");
    event.insert_prop("has_subscription", has_subscription).ok();
    capture_async(event);
}

pub fn track_webhook_subscription_updated(status: &str, plan: &str) {
    let mut event = Event::new_anon("webhook_subscription_updated");
    event.insert_prop("status", status).ok();
    event.insert_prop("plan", plan).ok();
    capture_async(event);
}

pub fn track_webhook_subscription_deleted() {
    let event = Event::new_anon("webhook_subscription_deleted");
    capture_async(event);
}

pub fn track_webhook_invoice_payment_failed(matched_profile: bool) {
    let mut event = Event::new_anon("webhook_invoice_payment_failed");
    event.insert_prop("matched_profile", matched_profile).ok();
    capture_async(event);
}
