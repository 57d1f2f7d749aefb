use gl_auth_core::Claims;
use gl_entitlement::SubscriptionView;
use gl_remote_db::DatabaseManager;
use tracing::warn;

/// Resolves the caller's subscription from the profiles table.
///
/// Never fails: no identity, no profile row, and read errors all resolve
/// to the free/none default. An inability to confirm paid status must
/// never be read as "assume paid".
pub async fn get_user_subscription(
    db: &DatabaseManager,
    claims: Option<&Claims>,
) -> SubscriptionView {
    let Some(claims) = claims else {
        return SubscriptionView::free();
    };
    let Ok(user_id) = claims.user_id() else {
        return SubscriptionView::free();
    };

    match db.find_profile(user_id).await {
        Ok(Some(profile)) => profile.subscription_view(),
        Ok(None) => SubscriptionView::free(),
        Err(e) => {
            warn!(error = %e, "Subscription lookup failed, defaulting to free");
            SubscriptionView::free()
        }
    }
}
