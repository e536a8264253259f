use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use maitred_core::domain::customer::CustomerDetails;
use maitred_core::domain::user::{User, UserId};

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn create(&self, username: &str, credential_hash: &str) -> Result<User, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (username, credential_hash, profile_json, created_at, updated_at)
             VALUES (?, ?, '{}', ?, ?)",
        )
        .bind(username)
        .bind(credential_hash)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::DuplicateUsername(username.to_string())
            }
            _ => RepositoryError::Database(error),
        })?;

        Ok(User {
            id: UserId(result.last_insert_rowid()),
            username: username.to_string(),
            credential_hash: credential_hash.to_string(),
            profile: CustomerDetails::default(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, username, credential_hash, profile_json, created_at, updated_at
             FROM users
             WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(user_from_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, username, credential_hash, profile_json, created_at, updated_at
             FROM users
             WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(user_from_row).transpose()
    }

    async fn update_profile(
        &self,
        id: UserId,
        profile: &CustomerDetails,
    ) -> Result<(), RepositoryError> {
        let profile_json = serde_json::to_string(profile)
            .map_err(|error| RepositoryError::Decode(format!("profile encode: {error}")))?;

        sqlx::query("UPDATE users SET profile_json = ?, updated_at = ? WHERE id = ?")
            .bind(profile_json)
            .bind(Utc::now().to_rfc3339())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn user_from_row(row: SqliteRow) -> Result<User, RepositoryError> {
    let profile_raw = row.try_get::<String, _>("profile_json")?;
    let profile = serde_json::from_str(&profile_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid profile_json: {error}")))?;

    Ok(User {
        id: UserId(row.try_get("id")?),
        username: row.try_get("username")?,
        credential_hash: row.try_get("credential_hash")?,
        profile,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

#[cfg(test)]
mod tests {
    use maitred_core::domain::customer::CustomerDetails;

    use super::SqlUserRepository;
    use crate::migrations;
    use crate::repositories::{RepositoryError, UserRepository};
    use crate::{connect_with_settings, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[tokio::test]
    async fn create_and_lookup_round_trip() {
        let pool = setup_pool().await;
        let repo = SqlUserRepository::new(pool.clone());

        let created = repo.create("ann", "hash-a").await.expect("create user");
        assert_eq!(created.username, "ann");

        let by_name = repo.find_by_username("ann").await.expect("lookup").expect("present");
        assert_eq!(by_name, created);

        let by_id = repo.find_by_id(created.id).await.expect("lookup").expect("present");
        assert_eq!(by_id, created);

        pool.close().await;
    }

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let pool = setup_pool().await;
        let repo = SqlUserRepository::new(pool.clone());

        repo.create("ann", "hash-a").await.expect("first create");
        let error = repo.create("ann", "hash-b").await.expect_err("duplicate");
        assert!(matches!(error, RepositoryError::DuplicateUsername(name) if name == "ann"));

        pool.close().await;
    }

    #[tokio::test]
    async fn profile_updates_persist() {
        let pool = setup_pool().await;
        let repo = SqlUserRepository::new(pool.clone());

        let user = repo.create("ann", "hash-a").await.expect("create user");
        let profile = CustomerDetails {
            first_name: Some("Ann".to_string()),
            email: Some("ann@x.com".to_string()),
            ..CustomerDetails::default()
        };
        repo.update_profile(user.id, &profile).await.expect("update profile");

        let reloaded = repo.find_by_id(user.id).await.expect("lookup").expect("present");
        assert_eq!(reloaded.profile, profile);

        pool.close().await;
    }
}
