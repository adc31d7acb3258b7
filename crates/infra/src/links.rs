//! Postgres-backed verification link store.
//!
//! Consumption is one conditional `UPDATE ... RETURNING`; zero rows means the
//! link was already used or had expired.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::{Span, instrument};

use campusid_accounts::{LinkCode, LinkIntent, LinkStore, NewLink, StoreError, VerificationLink};
use campusid_core::{LinkId, UserId};

use crate::db::map_sqlx_error;

const LINK_COLUMNS: &str = "id, code, user_id, intent, expires_at, utilised, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresLinkStore {
    pool: PgPool,
}

impl PostgresLinkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LinkStore for PostgresLinkStore {
    #[instrument(skip(self, link), fields(link_id = %link.id, user_id = %link.user_id), err)]
    async fn create(&self, link: NewLink) -> Result<VerificationLink, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO verify_links (id, code, user_id, intent, expires_at, utilised, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, FALSE, $6, $6) RETURNING {LINK_COLUMNS}"
        ))
        .bind(*link.id.as_uuid())
        .bind(link.code.as_str())
        .bind(*link.user_id.as_uuid())
        .bind(link.intent.as_str())
        .bind(link.expires_at)
        .bind(link.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("links.create", e))?;

        LinkRow::decode(&row)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&self, id: LinkId) -> Result<Option<VerificationLink>, StoreError> {
        let row = sqlx::query(&format!("SELECT {LINK_COLUMNS} FROM verify_links WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("links.get_by_id", e))?;
        row.as_ref().map(LinkRow::decode).transpose()
    }

    #[instrument(skip_all, err)]
    async fn get_by_code(&self, code: &LinkCode) -> Result<Option<VerificationLink>, StoreError> {
        let row = sqlx::query(&format!("SELECT {LINK_COLUMNS} FROM verify_links WHERE code = $1"))
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("links.get_by_code", e))?;
        row.as_ref().map(LinkRow::decode).transpose()
    }

    #[instrument(skip(self), fields(consumed = tracing::field::Empty), err)]
    async fn consume(
        &self,
        id: LinkId,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationLink>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE verify_links SET utilised = TRUE, expires_at = $2, updated_at = $2 \
             WHERE id = $1 AND NOT utilised AND expires_at > $2 RETURNING {LINK_COLUMNS}"
        ))
        .bind(*id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("links.consume", e))?;

        Span::current().record("consumed", row.is_some());
        row.as_ref().map(LinkRow::decode).transpose()
    }

    #[instrument(skip(self), err)]
    async fn expire_all_for_user(
        &self,
        user_id: UserId,
        intent: LinkIntent,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE verify_links SET expires_at = $3, updated_at = $3 \
             WHERE user_id = $1 AND intent = $2 AND NOT utilised AND expires_at > $3",
        )
        .bind(*user_id.as_uuid())
        .bind(intent.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("links.expire_all_for_user", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<VerificationLink>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {LINK_COLUMNS} FROM verify_links WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(*user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("links.list_by_user", e))?;

        rows.iter().map(LinkRow::decode).collect()
    }
}

#[derive(Debug, Clone)]
struct LinkRow {
    id: uuid::Uuid,
    code: String,
    user_id: uuid::Uuid,
    intent: String,
    expires_at: DateTime<Utc>,
    utilised: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LinkRow {
    fn decode(row: &PgRow) -> Result<VerificationLink, StoreError> {
        LinkRow::from_row(row)
            .map_err(|e| StoreError::Corrupt(format!("failed to deserialize link row: {}", e)))?
            .try_into()
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for LinkRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LinkRow {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            user_id: row.try_get("user_id")?,
            intent: row.try_get("intent")?,
            expires_at: row.try_get("expires_at")?,
            utilised: row.try_get("utilised")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<LinkRow> for VerificationLink {
    type Error = StoreError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        let code = row
            .code
            .parse::<LinkCode>()
            .map_err(|e| StoreError::Corrupt(format!("link {}: {}", row.id, e)))?;
        let intent = row
            .intent
            .parse::<LinkIntent>()
            .map_err(|e| StoreError::Corrupt(format!("link {}: {}", row.id, e)))?;

        Ok(VerificationLink {
            id: LinkId::from_uuid(row.id),
            code,
            user_id: UserId::from_uuid(row.user_id),
            intent,
            expires_at: row.expires_at,
            utilised: row.utilised,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
