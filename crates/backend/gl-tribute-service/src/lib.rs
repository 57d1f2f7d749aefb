use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use gl_auth_core::JwtConfig;
use gl_entitlement::PlanCatalog;
use gl_remote_db::DatabaseManager;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub mod auth;
pub mod error;
pub mod handlers;
pub mod service;
pub mod types;

use service::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let jwt_config = state.jwt_config.clone();

    Router::new()
        .route("/tributes", post(handlers::create_tribute).get(handlers::list_tributes))
        .route("/tributes/join", post(handlers::join_tribute))
        .route(
            "/tributes/{id}",
            get(handlers::get_tribute)
                .patch(handlers::update_tribute)
                .delete(handlers::delete_tribute),
        )
        .route(
            "/tributes/{id}/memories",
            post(handlers::create_memory).get(handlers::list_memories),
        )
        .route(
            "/tributes/{id}/contributors/{user_id}",
            delete(handlers::remove_contributor),
        )
        .route(
            "/memories/{id}/reactions",
            post(handlers::add_reaction)
                .get(handlers::list_reactions)
                .delete(handlers::remove_reaction),
        )
        .layer(Extension(jwt_config))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn init_tribute_service(
    db: Arc<DatabaseManager>,
    catalog: Arc<PlanCatalog>,
    jwt_config: Arc<JwtConfig>,
) -> Router {
    debug!("Initializing tribute service");

    let state = Arc::new(AppState::new(db, catalog, jwt_config));
    create_router(state)
}

pub use error::TributeError;
pub use types::{
    CreateMemoryRequest, CreateTributeRequest, JoinTributeRequest, ReactionRequest,
    UpdateTributeRequest,
};
