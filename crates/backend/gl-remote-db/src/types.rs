use chrono::{DateTime, NaiveDate, Utc};
use gl_entitlement::{Plan, SubscriptionState, SubscriptionView};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// One row per user, keyed by the auth user id.
///
/// Subscription fields are written exclusively by the payment service;
/// there is no client-facing write path for them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub plan: String,
    pub subscription_status: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// The stored plan, defaulting unknown or empty values to free.
    pub fn plan(&self) -> Plan {
        Plan::parse(&self.plan).unwrap_or(Plan::Free)
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        SubscriptionState {
            plan: self.plan(),
            status: self.subscription_status.clone(),
            stripe_customer_id: self.stripe_customer_id.clone(),
            stripe_subscription_id: self.stripe_subscription_id.clone(),
            current_period_end: self.current_period_end,
        }
    }

    pub fn subscription_view(&self) -> SubscriptionView {
        SubscriptionView {
            plan: self.plan(),
            status: if self.subscription_status.is_empty() {
                gl_entitlement::STATUS_NONE.to_string()
            } else {
                self.subscription_status.clone()
            },
            stripe_customer_id: self.stripe_customer_id.clone(),
            stripe_subscription_id: self.stripe_subscription_id.clone(),
            current_period_end: self.current_period_end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "tribute_privacy", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TributePrivacy {
    Public,
    Private,
    Family,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tribute {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub name: String,
    pub born_date: Option<NaiveDate>,
    pub passed_date: Option<NaiveDate>,
    pub cover_photo_url: Option<String>,
    pub bio: Option<String>,
    pub privacy: TributePrivacy,
    pub invite_code: String,
    pub theme_config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "contributor_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContributorStatus {
    Invited,
    Active,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contributor {
    pub id: Uuid,
    pub tribute_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub relationship: Option<String>,
    pub invited_by: Option<Uuid>,
    pub status: ContributorStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "memory_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Story,
    Photo,
    Voice,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Memory {
    pub id: Uuid,
    pub tribute_id: Uuid,
    pub contributor_id: Option<Uuid>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub title: Option<String>,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub memory_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reaction {
    pub id: Uuid,
    pub memory_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}
