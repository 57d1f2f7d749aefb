use anyhow::{Result, anyhow};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by a GatheredLight access token.
///
/// Tokens are issued by the auth service; this crate only validates them.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
}

impl Claims {
    /// The authenticated user id (`sub` is always a UUID for first-party tokens).
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|e| anyhow!("Invalid subject claim: {}", e))
    }
}

#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_decoding_key: DecodingKey,
    pub validation: Validation,
}

impl Default for JwtConfig {
    fn default() -> Self {
        let access_public = std::env::var("JWT_ACCESS_PUBLIC_KEY")
            .expect("JWT_ACCESS_PUBLIC_KEY must be set (PEM-encoded EC public key)");

        Self {
            access_token_decoding_key: DecodingKey::from_ec_pem(access_public.as_bytes())
                .expect("JWT_ACCESS_PUBLIC_KEY is not a valid EC PEM key"),
            validation: Validation::new(Algorithm::ES256),
        }
    }
}

impl JwtConfig {
    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.access_token_decoding_key, &self.validation)
            .map_err(|e| anyhow!("Invalid token: {}", e))?;

        if token_data.claims.token_type != "access" {
            return Err(anyhow!("Invalid token type: expected access token"));
        }

        Ok(token_data.claims)
    }
}
