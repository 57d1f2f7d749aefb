use std::time::Duration;

use bon::bon;
use chrono::{NaiveDate, Utc};
use gl_entitlement::SubscriptionState;
use sqlx::{
    migrate::MigrateDatabase,
    postgres::{PgPool, PgPoolOptions},
};
use uuid::Uuid;

use crate::{
    error::{DbError, DbResult},
    types::{Contributor, Memory, MemoryType, Profile, Reaction, Tribute, TributePrivacy},
};

const PROFILE_COLUMNS: &str = "id, plan, subscription_status, stripe_customer_id, \
     stripe_subscription_id, current_period_end, created_at, updated_at";

const TRIBUTE_COLUMNS: &str = "id, creator_id, name, born_date, passed_date, cover_photo_url, \
     bio, privacy, invite_code, theme_config, created_at, updated_at";

const CONTRIBUTOR_COLUMNS: &str =
    "id, tribute_id, user_id, name, email, relationship, invited_by, status, created_at";

const MEMORY_COLUMNS: &str = "id, tribute_id, contributor_id, type, title, content, media_url, \
     memory_date, location, is_featured, created_at, updated_at";

/// Invite codes are eight lowercase hex characters; the unique index on
/// `tributes.invite_code` catches the rare collision.
fn generate_invite_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[derive(Debug)]
pub struct DatabaseManager {
    pub pool: PgPool,
}

#[bon]
impl DatabaseManager {
    pub async fn new(database_url: &str) -> DbResult<Self> {
        if !sqlx::Postgres::database_exists(database_url).await? {
            sqlx::Postgres::create_database(database_url).await?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(50)
            .min_connections(3)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        let db_manager = DatabaseManager { pool };

        Self::run_migrations(&db_manager.pool).await?;

        Ok(db_manager)
    }

    async fn run_migrations(pool: &PgPool) -> DbResult<()> {
        let migrator = sqlx::migrate!("./src/migrations");
        migrator.run(pool).await?;
        tracing::debug!("Database migrations up to date");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------

    pub async fn find_profile(&self, user_id: Uuid) -> DbResult<Option<Profile>> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");

        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    pub async fn find_profile_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> DbResult<Option<Profile>> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE stripe_customer_id = $1");

        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    /// Records the Stripe customer ref on the profile, creating the row if
    /// the user has never touched billing before.
    pub async fn set_stripe_customer(&self, user_id: Uuid, customer_id: &str) -> DbResult<Profile> {
        let now = Utc::now();
        let query = format!(
            r#"
            INSERT INTO profiles (id, stripe_customer_id, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (id) DO UPDATE SET stripe_customer_id = $2, updated_at = $3
            RETURNING {PROFILE_COLUMNS}
            "#
        );

        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .bind(customer_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(profile)
    }

    /// Writes the full subscription-relevant slice of a profile row as one
    /// upsert, so repeated delivery of the same webhook event converges.
    pub async fn upsert_subscription_state(
        &self,
        user_id: Uuid,
        state: &SubscriptionState,
    ) -> DbResult<Profile> {
        let now = Utc::now();
        let query = format!(
            r#"
            INSERT INTO profiles
                (id, plan, subscription_status, stripe_customer_id,
                 stripe_subscription_id, current_period_end, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (id) DO UPDATE SET
                plan = $2,
                subscription_status = $3,
                stripe_customer_id = $4,
                stripe_subscription_id = $5,
                current_period_end = $6,
                updated_at = $7
            RETURNING {PROFILE_COLUMNS}
            "#
        );

        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .bind(state.plan.as_str())
            .bind(&state.status)
            .bind(&state.stripe_customer_id)
            .bind(&state.stripe_subscription_id)
            .bind(state.current_period_end)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(profile)
    }

    // -----------------------------------------------------------------
    // Tributes
    // -----------------------------------------------------------------

    #[builder]
    pub async fn create_tribute(
        &self,
        creator_id: Uuid,
        creator_name: String,
        name: String,
        born_date: Option<NaiveDate>,
        passed_date: Option<NaiveDate>,
        bio: Option<String>,
        cover_photo_url: Option<String>,
        privacy: Option<TributePrivacy>,
    ) -> DbResult<Tribute> {
        let tribute_id = Uuid::now_v7();
        let now = Utc::now();
        let privacy = privacy.unwrap_or(TributePrivacy::Private);

        let mut tx = self.pool.begin().await?;

        let query = format!(
            r#"
            INSERT INTO tributes
                (id, creator_id, name, born_date, passed_date, cover_photo_url,
                 bio, privacy, invite_code, theme_config, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, '{{}}'::jsonb, $10, $10)
            RETURNING {TRIBUTE_COLUMNS}
            "#
        );

        let tribute = sqlx::query_as::<_, Tribute>(&query)
            .bind(tribute_id)
            .bind(creator_id)
            .bind(&name)
            .bind(born_date)
            .bind(passed_date)
            .bind(&cover_photo_url)
            .bind(&bio)
            .bind(privacy)
            .bind(generate_invite_code())
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        // The creator contributes from day one.
        sqlx::query(
            r#"
            INSERT INTO contributors (id, tribute_id, user_id, name, status, created_at)
            VALUES ($1, $2, $3, $4, 'active', $5)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(tribute_id)
        .bind(creator_id)
        .bind(&creator_name)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(tribute)
    }

    pub async fn get_tribute(&self, tribute_id: Uuid) -> DbResult<Tribute> {
        let query = format!("SELECT {TRIBUTE_COLUMNS} FROM tributes WHERE id = $1");

        sqlx::query_as::<_, Tribute>(&query)
            .bind(tribute_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found_with_id("tribute", tribute_id.to_string()))
    }

    pub async fn find_tribute_by_invite_code(&self, invite_code: &str) -> DbResult<Option<Tribute>> {
        let query = format!("SELECT {TRIBUTE_COLUMNS} FROM tributes WHERE invite_code = $1");

        let tribute = sqlx::query_as::<_, Tribute>(&query)
            .bind(invite_code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tribute)
    }

    /// Tributes the user created plus those they actively contribute to.
    pub async fn list_tributes_for_user(&self, user_id: Uuid) -> DbResult<Vec<Tribute>> {
        let query = r#"
            SELECT DISTINCT t.id, t.creator_id, t.name, t.born_date, t.passed_date,
                   t.cover_photo_url, t.bio, t.privacy, t.invite_code, t.theme_config,
                   t.created_at, t.updated_at
            FROM tributes t
            LEFT JOIN contributors c
                ON c.tribute_id = t.id AND c.user_id = $1 AND c.status = 'active'
            WHERE t.creator_id = $1 OR c.id IS NOT NULL
            ORDER BY t.created_at DESC
            "#;

        let tributes = sqlx::query_as::<_, Tribute>(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(tributes)
    }

    #[builder]
    pub async fn update_tribute(
        &self,
        tribute_id: Uuid,
        name: Option<String>,
        born_date: Option<NaiveDate>,
        passed_date: Option<NaiveDate>,
        cover_photo_url: Option<String>,
        bio: Option<String>,
        privacy: Option<TributePrivacy>,
        theme_config: Option<serde_json::Value>,
    ) -> DbResult<Tribute> {
        let query = format!(
            r#"
            UPDATE tributes SET
                name = COALESCE($2, name),
                born_date = COALESCE($3, born_date),
                passed_date = COALESCE($4, passed_date),
                cover_photo_url = COALESCE($5, cover_photo_url),
                bio = COALESCE($6, bio),
                privacy = COALESCE($7, privacy),
                theme_config = COALESCE($8, theme_config),
                updated_at = $9
            WHERE id = $1
            RETURNING {TRIBUTE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Tribute>(&query)
            .bind(tribute_id)
            .bind(name)
            .bind(born_date)
            .bind(passed_date)
            .bind(cover_photo_url)
            .bind(bio)
            .bind(privacy)
            .bind(theme_config)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found_with_id("tribute", tribute_id.to_string()))
    }

    pub async fn delete_tribute(&self, tribute_id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM tributes WHERE id = $1")
            .bind(tribute_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found_with_id("tribute", tribute_id.to_string()));
        }

        Ok(())
    }

    pub async fn count_tributes_by_creator(&self, user_id: Uuid) -> DbResult<u64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tributes WHERE creator_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0 as u64)
    }

    // -----------------------------------------------------------------
    // Contributors
    // -----------------------------------------------------------------

    pub async fn find_contributor(
        &self,
        tribute_id: Uuid,
        user_id: Uuid,
    ) -> DbResult<Option<Contributor>> {
        let query = format!(
            "SELECT {CONTRIBUTOR_COLUMNS} FROM contributors WHERE tribute_id = $1 AND user_id = $2"
        );

        let contributor = sqlx::query_as::<_, Contributor>(&query)
            .bind(tribute_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(contributor)
    }

    /// Join/add flow. A previously removed contributor is reactivated; an
    /// existing row in any other status is left untouched.
    #[builder]
    pub async fn add_contributor(
        &self,
        tribute_id: Uuid,
        user_id: Option<Uuid>,
        name: String,
        email: Option<String>,
        relationship: Option<String>,
        invited_by: Option<Uuid>,
    ) -> DbResult<Contributor> {
        let query = format!(
            r#"
            INSERT INTO contributors
                (id, tribute_id, user_id, name, email, relationship, invited_by, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', $8)
            ON CONFLICT (tribute_id, user_id) DO UPDATE SET status = 'active'
            WHERE contributors.status = 'removed'
            RETURNING {CONTRIBUTOR_COLUMNS}
            "#
        );

        let inserted = sqlx::query_as::<_, Contributor>(&query)
            .bind(Uuid::now_v7())
            .bind(tribute_id)
            .bind(user_id)
            .bind(&name)
            .bind(&email)
            .bind(&relationship)
            .bind(invited_by)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        if let Some(contributor) = inserted {
            return Ok(contributor);
        }

        // Conflicted with a non-removed row: the membership already exists.
        let user_id = user_id.ok_or_else(|| {
            DbError::invalid_input("anonymous contributor insert cannot conflict")
        })?;
        self.find_contributor(tribute_id, user_id)
            .await?
            .ok_or_else(|| DbError::not_found("contributor"))
    }

    pub async fn remove_contributor(&self, tribute_id: Uuid, user_id: Uuid) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE contributors SET status = 'removed' WHERE tribute_id = $1 AND user_id = $2",
        )
        .bind(tribute_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("contributor"));
        }

        Ok(())
    }

    pub async fn count_contributors(&self, tribute_id: Uuid) -> DbResult<u64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM contributors WHERE tribute_id = $1 AND status = 'active'",
        )
        .bind(tribute_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0 as u64)
    }

    // -----------------------------------------------------------------
    // Memories
    // -----------------------------------------------------------------

    #[builder]
    pub async fn create_memory(
        &self,
        tribute_id: Uuid,
        contributor_id: Option<Uuid>,
        memory_type: Option<MemoryType>,
        title: Option<String>,
        content: Option<String>,
        media_url: Option<String>,
        memory_date: Option<NaiveDate>,
        location: Option<String>,
    ) -> DbResult<Memory> {
        let now = Utc::now();
        let query = format!(
            r#"
            INSERT INTO memories
                (id, tribute_id, contributor_id, type, title, content, media_url,
                 memory_date, location, is_featured, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, false, $10, $10)
            RETURNING {MEMORY_COLUMNS}
            "#
        );

        let memory = sqlx::query_as::<_, Memory>(&query)
            .bind(Uuid::now_v7())
            .bind(tribute_id)
            .bind(contributor_id)
            .bind(memory_type.unwrap_or(MemoryType::Story))
            .bind(&title)
            .bind(&content)
            .bind(&media_url)
            .bind(memory_date)
            .bind(&location)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(memory)
    }

    pub async fn get_memory(&self, memory_id: Uuid) -> DbResult<Memory> {
        let query = format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = $1");

        sqlx::query_as::<_, Memory>(&query)
            .bind(memory_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found_with_id("memory", memory_id.to_string()))
    }

    pub async fn list_memories(&self, tribute_id: Uuid) -> DbResult<Vec<Memory>> {
        let query = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE tribute_id = $1 ORDER BY created_at DESC"
        );

        let memories = sqlx::query_as::<_, Memory>(&query)
            .bind(tribute_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(memories)
    }

    pub async fn count_memories(&self, tribute_id: Uuid) -> DbResult<u64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memories WHERE tribute_id = $1")
            .bind(tribute_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0 as u64)
    }

    // -----------------------------------------------------------------
    // Reactions
    // -----------------------------------------------------------------

    /// Idempotent on the `(memory_id, user_id, emoji)` key.
    pub async fn add_reaction(
        &self,
        memory_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> DbResult<Reaction> {
        let inserted = sqlx::query_as::<_, Reaction>(
            r#"
            INSERT INTO reactions (id, memory_id, user_id, emoji, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (memory_id, user_id, emoji) DO NOTHING
            RETURNING id, memory_id, user_id, emoji, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(memory_id)
        .bind(user_id)
        .bind(emoji)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(reaction) = inserted {
            return Ok(reaction);
        }

        let existing = sqlx::query_as::<_, Reaction>(
            r#"
            SELECT id, memory_id, user_id, emoji, created_at
            FROM reactions
            WHERE memory_id = $1 AND user_id = $2 AND emoji = $3
            "#,
        )
        .bind(memory_id)
        .bind(user_id)
        .bind(emoji)
        .fetch_one(&self.pool)
        .await?;

        Ok(existing)
    }

    pub async fn remove_reaction(
        &self,
        memory_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "DELETE FROM reactions WHERE memory_id = $1 AND user_id = $2 AND emoji = $3",
        )
        .bind(memory_id)
        .bind(user_id)
        .bind(emoji)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_reactions(&self, memory_id: Uuid) -> DbResult<Vec<Reaction>> {
        let reactions = sqlx::query_as::<_, Reaction>(
            r#"
            SELECT id, memory_id, user_id, emoji, created_at
            FROM reactions
            WHERE memory_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(memory_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_codes_are_short_and_lowercase() {
        let code = generate_invite_code();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn invite_codes_vary() {
        assert_ne!(generate_invite_code(), generate_invite_code());
    }
}
