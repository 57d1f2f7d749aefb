use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use gl_entitlement::ResourceKind;
use gl_remote_db::{Contributor, ContributorStatus, Memory, Reaction, Tribute, TributePrivacy};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::TributeError;
use crate::service::AppState;
use crate::types::{
    CreateMemoryRequest, CreateTributeRequest, JoinTributeRequest, ReactionRequest,
    UpdateTributeRequest,
};

// ---------------------------------------------------------------------------
// POST /tributes
// ---------------------------------------------------------------------------

/// Creates a tribute after checking the caller's tribute cap. The gate
/// runs before any write, so a blocked request leaves no trace.
pub async fn create_tribute(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateTributeRequest>,
) -> Result<(StatusCode, Json<Tribute>), TributeError> {
    let user_id = auth.user_id()?;
    if body.name.trim().is_empty() {
        return Err(TributeError::InvalidField("name"));
    }

    let plan_key = state.plan_key_for(user_id).await?;
    let count = state.db.count_tributes_by_creator(user_id).await?;
    if state
        .catalog
        .has_reached_limit(&plan_key, ResourceKind::Tributes, count)
    {
        return Err(TributeError::Forbidden("tribute limit reached for plan"));
    }

    let tribute = state
        .db
        .create_tribute()
        .creator_id(user_id)
        .creator_name(auth.0.email.clone())
        .name(body.name)
        .maybe_born_date(body.born_date)
        .maybe_passed_date(body.passed_date)
        .maybe_bio(body.bio)
        .maybe_cover_photo_url(body.cover_photo_url)
        .maybe_privacy(body.privacy)
        .call()
        .await?;

    info!(%user_id, tribute_id = %tribute.id, "Created tribute");
    Ok((StatusCode::CREATED, Json(tribute)))
}

// ---------------------------------------------------------------------------
// GET /tributes
// ---------------------------------------------------------------------------

pub async fn list_tributes(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<Tribute>>, TributeError> {
    let user_id = auth.user_id()?;
    let tributes = state.db.list_tributes_for_user(user_id).await?;
    Ok(Json(tributes))
}

// ---------------------------------------------------------------------------
// GET /tributes/{id}
// ---------------------------------------------------------------------------

/// Public tributes are readable by anyone; everything else needs the
/// caller to be the creator or an active contributor.
pub async fn get_tribute(
    State(state): State<Arc<AppState>>,
    auth: Result<AuthUser, TributeError>,
    Path(tribute_id): Path<Uuid>,
) -> Result<Json<Tribute>, TributeError> {
    let tribute = state.db.get_tribute(tribute_id).await?;

    if tribute.privacy != TributePrivacy::Public {
        let auth = auth?;
        let user_id = auth.user_id()?;
        ensure_member(&state, &tribute, user_id).await?;
    }

    Ok(Json(tribute))
}

async fn ensure_member(
    state: &AppState,
    tribute: &Tribute,
    user_id: Uuid,
) -> Result<(), TributeError> {
    if tribute.creator_id == user_id {
        return Ok(());
    }

    let contributor = state.db.find_contributor(tribute.id, user_id).await?;
    match contributor {
        Some(c) if c.status == ContributorStatus::Active => Ok(()),
        _ => Err(TributeError::Forbidden(
            "not a contributor on this tribute",
        )),
    }
}

// ---------------------------------------------------------------------------
// PATCH /tributes/{id}
// ---------------------------------------------------------------------------

pub async fn update_tribute(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(tribute_id): Path<Uuid>,
    Json(body): Json<UpdateTributeRequest>,
) -> Result<Json<Tribute>, TributeError> {
    let user_id = auth.user_id()?;

    let tribute = state.db.get_tribute(tribute_id).await?;
    if tribute.creator_id != user_id {
        return Err(TributeError::Forbidden(
            "only the creator can modify a tribute",
        ));
    }

    let updated = state
        .db
        .update_tribute()
        .tribute_id(tribute_id)
        .maybe_name(body.name)
        .maybe_born_date(body.born_date)
        .maybe_passed_date(body.passed_date)
        .maybe_cover_photo_url(body.cover_photo_url)
        .maybe_bio(body.bio)
        .maybe_privacy(body.privacy)
        .maybe_theme_config(body.theme_config)
        .call()
        .await?;

    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// DELETE /tributes/{id}
// ---------------------------------------------------------------------------

pub async fn delete_tribute(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(tribute_id): Path<Uuid>,
) -> Result<StatusCode, TributeError> {
    let user_id = auth.user_id()?;

    let tribute = state.db.get_tribute(tribute_id).await?;
    if tribute.creator_id != user_id {
        return Err(TributeError::Forbidden(
            "only the creator can delete a tribute",
        ));
    }

    state.db.delete_tribute(tribute_id).await?;
    info!(%user_id, %tribute_id, "Deleted tribute");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /tributes/join
// ---------------------------------------------------------------------------

/// Joins a tribute through its invite code. The contributor cap is the
/// tribute creator's, not the joiner's: the creator pays for headroom.
pub async fn join_tribute(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<JoinTributeRequest>,
) -> Result<Json<Contributor>, TributeError> {
    let user_id = auth.user_id()?;
    if body.invite_code.trim().is_empty() {
        return Err(TributeError::InvalidField("invite_code"));
    }

    let tribute = state
        .db
        .find_tribute_by_invite_code(body.invite_code.trim())
        .await?
        .ok_or_else(|| TributeError::NotFound("no tribute for that invite code".to_string()))?;

    // Already a member: rejoining is a no-op and must not trip the
    // contributor cap. Only a removed row goes through the limit check
    // and reactivation below.
    if let Some(existing) = state.db.find_contributor(tribute.id, user_id).await? {
        if rejoin_is_noop(&existing) {
            return Ok(Json(existing));
        }
    }

    let creator_plan = state.plan_key_for(tribute.creator_id).await?;
    let count = state.db.count_contributors(tribute.id).await?;
    if state
        .catalog
        .has_reached_limit(&creator_plan, ResourceKind::Contributors, count)
    {
        return Err(TributeError::Forbidden(
            "contributor limit reached for this tribute",
        ));
    }

    let name = body.name.unwrap_or_else(|| auth.0.email.clone());
    let contributor = state
        .db
        .add_contributor()
        .tribute_id(tribute.id)
        .user_id(user_id)
        .name(name)
        .email(auth.0.email.clone())
        .maybe_relationship(body.relationship)
        .call()
        .await?;

    info!(%user_id, tribute_id = %tribute.id, "Joined tribute");
    Ok(Json(contributor))
}

fn rejoin_is_noop(existing: &Contributor) -> bool {
    existing.status != ContributorStatus::Removed
}

// ---------------------------------------------------------------------------
// DELETE /tributes/{id}/contributors/{user_id}
// ---------------------------------------------------------------------------

/// Marks a contributor as removed. Removal is soft: a later rejoin
/// through the invite code reactivates the same row.
pub async fn remove_contributor(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((tribute_id, target_user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, TributeError> {
    let user_id = auth.user_id()?;

    let tribute = state.db.get_tribute(tribute_id).await?;
    if tribute.creator_id != user_id {
        return Err(TributeError::Forbidden(
            "only the creator can remove contributors",
        ));
    }
    if target_user_id == tribute.creator_id {
        return Err(TributeError::InvalidField("user_id"));
    }

    state.db.remove_contributor(tribute_id, target_user_id).await?;
    info!(%user_id, %tribute_id, %target_user_id, "Removed contributor");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /tributes/{id}/memories
// ---------------------------------------------------------------------------

pub async fn create_memory(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(tribute_id): Path<Uuid>,
    Json(body): Json<CreateMemoryRequest>,
) -> Result<(StatusCode, Json<Memory>), TributeError> {
    let user_id = auth.user_id()?;

    let tribute = state.db.get_tribute(tribute_id).await?;
    let contributor = state.db.find_contributor(tribute_id, user_id).await?;
    let is_active_contributor = matches!(
        &contributor,
        Some(c) if c.status == ContributorStatus::Active
    );
    if tribute.creator_id != user_id && !is_active_contributor {
        return Err(TributeError::Forbidden(
            "only active contributors can add memories",
        ));
    }

    // The memory cap belongs to the tribute's creator, whatever plan the
    // contributing user happens to be on.
    let creator_plan = state.plan_key_for(tribute.creator_id).await?;
    let count = state.db.count_memories(tribute_id).await?;
    if state
        .catalog
        .has_reached_limit(&creator_plan, ResourceKind::Memories, count)
    {
        return Err(TributeError::Forbidden(
            "memory limit reached for this tribute",
        ));
    }

    let memory = state
        .db
        .create_memory()
        .tribute_id(tribute_id)
        .maybe_contributor_id(contributor.map(|c| c.id))
        .maybe_memory_type(body.memory_type)
        .maybe_title(body.title)
        .maybe_content(body.content)
        .maybe_media_url(body.media_url)
        .maybe_memory_date(body.memory_date)
        .maybe_location(body.location)
        .call()
        .await?;

    info!(%user_id, %tribute_id, memory_id = %memory.id, "Created memory");
    Ok((StatusCode::CREATED, Json(memory)))
}

// ---------------------------------------------------------------------------
// GET /tributes/{id}/memories
// ---------------------------------------------------------------------------

pub async fn list_memories(
    State(state): State<Arc<AppState>>,
    auth: Result<AuthUser, TributeError>,
    Path(tribute_id): Path<Uuid>,
) -> Result<Json<Vec<Memory>>, TributeError> {
    let tribute = state.db.get_tribute(tribute_id).await?;

    if tribute.privacy != TributePrivacy::Public {
        let auth = auth?;
        let user_id = auth.user_id()?;
        ensure_member(&state, &tribute, user_id).await?;
    }

    let memories = state.db.list_memories(tribute_id).await?;
    Ok(Json(memories))
}

// ---------------------------------------------------------------------------
// POST /memories/{id}/reactions
// ---------------------------------------------------------------------------

pub async fn add_reaction(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(memory_id): Path<Uuid>,
    Json(body): Json<ReactionRequest>,
) -> Result<Json<Reaction>, TributeError> {
    let user_id = auth.user_id()?;
    if body.emoji.trim().is_empty() {
        return Err(TributeError::InvalidField("emoji"));
    }

    // 404s before the insert when the memory does not exist.
    state.db.get_memory(memory_id).await?;

    let reaction = state
        .db
        .add_reaction(memory_id, user_id, body.emoji.trim())
        .await?;
    Ok(Json(reaction))
}

// ---------------------------------------------------------------------------
// GET /memories/{id}/reactions
// ---------------------------------------------------------------------------

/// Reactions on a memory, oldest first. Follows the memory's tribute
/// read gate: public tributes are open, everything else needs membership.
pub async fn list_reactions(
    State(state): State<Arc<AppState>>,
    auth: Result<AuthUser, TributeError>,
    Path(memory_id): Path<Uuid>,
) -> Result<Json<Vec<Reaction>>, TributeError> {
    let memory = state.db.get_memory(memory_id).await?;
    let tribute = state.db.get_tribute(memory.tribute_id).await?;

    if tribute.privacy != TributePrivacy::Public {
        let auth = auth?;
        let user_id = auth.user_id()?;
        ensure_member(&state, &tribute, user_id).await?;
    }

    let reactions = state.db.list_reactions(memory_id).await?;
    Ok(Json(reactions))
}

// ---------------------------------------------------------------------------
// DELETE /memories/{id}/reactions
// ---------------------------------------------------------------------------

pub async fn remove_reaction(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(memory_id): Path<Uuid>,
    Json(body): Json<ReactionRequest>,
) -> Result<StatusCode, TributeError> {
    let user_id = auth.user_id()?;
    if body.emoji.trim().is_empty() {
        return Err(TributeError::InvalidField("emoji"));
    }

    let removed = state
        .db
        .remove_reaction(memory_id, user_id, body.emoji.trim())
        .await?;
    if !removed {
        return Err(TributeError::NotFound("reaction".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use gl_auth_core::{Claims, JwtConfig};
    use gl_entitlement::PlanCatalog;
    use gl_remote_db::DatabaseManager;
    use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
    use tower::ServiceExt;

    use super::*;

    const TEST_SECRET: &[u8] = b"test-secret";

    // Lazy pool: these tests only exercise paths that reject before the
    // first query.
    fn test_state() -> Arc<AppState> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/gathered_light_test")
            .expect("lazy pool");
        let db = Arc::new(DatabaseManager { pool });
        let catalog = Arc::new(PlanCatalog::new("price_family", "price_legacy"));
        let jwt_config = Arc::new(JwtConfig {
            access_token_decoding_key: DecodingKey::from_secret(TEST_SECRET),
            validation: Validation::new(Algorithm::HS256),
        });
        Arc::new(AppState::new(db, catalog, jwt_config))
    }

    fn mint_token(token_type: &str) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "user@example.com".to_string(),
            exp: now + 3600,
            iat: now,
            token_type: token_type.to_string(),
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET),
        )
        .unwrap()
    }

    fn post_json(uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn create_tribute_requires_auth() {
        let app = crate::create_router(test_state());

        let response = app
            .oneshot(post_json("/tributes", None, serde_json::json!({"name": "Grandma June"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn list_tributes_requires_auth() {
        let app = crate::create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/tributes")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let app = crate::create_router(test_state());
        let token = mint_token("refresh");

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/tributes")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_tribute_rejects_blank_name() {
        let app = crate::create_router(test_state());
        let token = mint_token("access");

        let response = app
            .oneshot(post_json(
                "/tributes",
                Some(&token),
                serde_json::json!({"name": "   "}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn join_rejects_blank_invite_code() {
        let app = crate::create_router(test_state());
        let token = mint_token("access");

        let response = app
            .oneshot(post_json(
                "/tributes/join",
                Some(&token),
                serde_json::json!({"invite_code": ""}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reaction_rejects_blank_emoji() {
        let app = crate::create_router(test_state());
        let token = mint_token("access");
        let memory_id = Uuid::new_v4();

        let response = app
            .oneshot(post_json(
                &format!("/memories/{memory_id}/reactions"),
                Some(&token),
                serde_json::json!({"emoji": ""}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rejoin_skips_existing_members_but_not_removed_ones() {
        let base = Contributor {
            id: Uuid::new_v4(),
            tribute_id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            name: "June".to_string(),
            email: None,
            relationship: None,
            invited_by: None,
            status: ContributorStatus::Active,
            created_at: Utc::now(),
        };

        assert!(rejoin_is_noop(&base));
        assert!(rejoin_is_noop(&Contributor {
            status: ContributorStatus::Invited,
            ..base.clone()
        }));
        // Removed rows go through the limit check and reactivation.
        assert!(!rejoin_is_noop(&Contributor {
            status: ContributorStatus::Removed,
            ..base
        }));
    }

    #[tokio::test]
    async fn remove_contributor_requires_auth() {
        let app = crate::create_router(test_state());
        let tribute_id = Uuid::new_v4();
        let target = Uuid::new_v4();

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/tributes/{tribute_id}/contributors/{target}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn memory_create_requires_auth() {
        let app = crate::create_router(test_state());
        let tribute_id = Uuid::new_v4();

        let response = app
            .oneshot(post_json(
                &format!("/tributes/{tribute_id}/memories"),
                None,
                serde_json::json!({"content": "She loved the sea."}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
