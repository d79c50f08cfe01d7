use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{StoreError, WaitlistStore, UNIQUE_VIOLATION};
use crate::domain::{NewWaitlistEntry, WaitlistEntry};

pub struct PostgresWaitlistStore {
    pool: PgPool,
}

impl PostgresWaitlistStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WaitlistStore for PostgresWaitlistStore {
    #[tracing::instrument(
        name = "Persisting waitlist entry to Postgres",
        skip(self, entry),
        fields(email = %entry.email)
    )]
    async fn insert(&self, entry: &NewWaitlistEntry) -> Result<WaitlistEntry, StoreError> {
        sqlx::query_as::<_, WaitlistEntry>(
            r#"INSERT INTO waitlist
                   (id, email, niche, source, ip_address, country, country_code, city, timezone, user_agent)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id, email, niche, source, ip_address, country, country_code, city,
                         timezone, user_agent, blocked, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.email.as_ref())
        .bind(&entry.niche)
        .bind(&entry.source)
        .bind(&entry.location.ip)
        .bind(&entry.location.country)
        .bind(&entry.location.country_code)
        .bind(&entry.location.city)
        .bind(&entry.location.timezone)
        .bind(&entry.user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    #[tracing::instrument(name = "Counting visible waitlist entries in Postgres", skip(self))]
    async fn count_visible(&self) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM waitlist WHERE blocked = false")
                .fetch_one(&self.pool)
                .await
                .map_err(classify)?;

        u64::try_from(count).map_err(|e| StoreError::Unavailable(e.into()))
    }
}

fn classify(e: sqlx::Error) -> StoreError {
    let unique_violation = matches!(
        &e,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION)
    );
    if unique_violation {
        return StoreError::DuplicateEmail;
    }

    tracing::error!("Failed to execute query: {:?}", e);
    if matches!(
        e,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut
    ) {
        StoreError::Unreachable(e.into())
    } else {
        StoreError::Unavailable(e.into())
    }
}
