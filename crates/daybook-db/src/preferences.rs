//! Owner preferences repository implementation.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use daybook_core::{Error, PreferencesRepository, Result, UserPreferences};

/// PostgreSQL implementation of PreferencesRepository.
#[derive(Clone)]
pub struct PgPreferencesRepository {
    pool: PgPool,
}

impl PgPreferencesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferencesRepository for PgPreferencesRepository {
    async fn get(&self, owner_id: Uuid) -> Result<Option<UserPreferences>> {
        let row = sqlx::query(
            "SELECT owner_id, timezone, day_ends_at FROM user_preferences WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| UserPreferences {
            owner_id: r.get("owner_id"),
            timezone: r.get("timezone"),
            day_ends_at: r.get("day_ends_at"),
        }))
    }

    async fn upsert(&self, prefs: &UserPreferences) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (owner_id, timezone, day_ends_at, updated_at_utc)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (owner_id) DO UPDATE
            SET timezone = EXCLUDED.timezone,
                day_ends_at = EXCLUDED.day_ends_at,
                updated_at_utc = NOW()
            "#,
        )
        .bind(prefs.owner_id)
        .bind(&prefs.timezone)
        .bind(prefs.day_ends_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
