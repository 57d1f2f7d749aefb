use chrono::NaiveDate;
use gl_remote_db::{MemoryType, TributePrivacy};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateTributeRequest {
    pub name: String,
    pub born_date: Option<NaiveDate>,
    pub passed_date: Option<NaiveDate>,
    pub bio: Option<String>,
    pub cover_photo_url: Option<String>,
    pub privacy: Option<TributePrivacy>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTributeRequest {
    pub name: Option<String>,
    pub born_date: Option<NaiveDate>,
    pub passed_date: Option<NaiveDate>,
    pub bio: Option<String>,
    pub cover_photo_url: Option<String>,
    pub privacy: Option<TributePrivacy>,
    pub theme_config: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct JoinTributeRequest {
    pub invite_code: String,
    pub name: Option<String>,
    pub relationship: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMemoryRequest {
    #[serde(rename = "type")]
    pub memory_type: Option<MemoryType>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub memory_date: Option<NaiveDate>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub emoji: String,
}
