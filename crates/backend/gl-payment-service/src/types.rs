use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct CreateCheckoutResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePortalResponse {
    pub url: String,
}
