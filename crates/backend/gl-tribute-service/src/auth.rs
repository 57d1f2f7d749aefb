use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use gl_auth_core::JwtConfig;
use uuid::Uuid;

use crate::error::TributeError;

pub struct AuthUser(pub gl_auth_core::Claims);

impl AuthUser {
    pub fn user_id(&self) -> Result<Uuid, TributeError> {
        self.0
            .user_id()
            .map_err(|e| TributeError::Unauthorized(e.to_string()))
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = TributeError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jwt_config = parts.extensions.get::<Arc<JwtConfig>>().ok_or_else(|| {
            TributeError::Internal(anyhow::anyhow!("JwtConfig not found in extensions"))
        })?;

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                TributeError::Unauthorized("Missing authorization header".to_string())
            })?;

        if !auth_header.starts_with("Bearer ") {
            return Err(TributeError::Unauthorized(
                "Authorization header must start with 'Bearer '".to_string(),
            ));
        }

        let token = &auth_header[7..];
        let claims = jwt_config
            .validate_access_token(token)
            .map_err(|e| TributeError::Unauthorized(e.to_string()))?;

        Ok(AuthUser(claims))
    }
}
