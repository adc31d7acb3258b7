//! Postgres-backed account store.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{FromRow, PgPool, Postgres, Row};
use tracing::instrument;

use campusid_accounts::{NewUser, StoreError, User, UserChange, UserStore};
use campusid_auth::Permissions;
use campusid_core::UserId;

use crate::db::map_sqlx_error;

macro_rules! returning_user {
    ($sql:literal) => {
        concat!(
            $sql,
            " RETURNING id, email, password_hash, display_name, permissions, active, verified, created_at, updated_at"
        )
    };
}

const SELECT_USER: &str = "SELECT id, email, password_hash, display_name, permissions, active, verified, created_at, updated_at FROM users";

#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn bind_update<'q>(sql: &'q str, id: UserId, at: DateTime<Utc>) -> Query<'q, Postgres, PgArguments> {
    sqlx::query(sql).bind(*id.as_uuid()).bind(at)
}

#[async_trait::async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query(returning_user!(
            "INSERT INTO users (id, email, display_name, permissions, active, verified, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, FALSE, FALSE, $5, $5)"
        ))
        .bind(*user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.permissions.bits() as i64)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("users.create", e))?;

        UserRow::decode(&row)
    }

    #[instrument(skip(self, change), fields(change = change.kind()), err)]
    async fn update(
        &self,
        id: UserId,
        change: UserChange,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let query = match change {
            UserChange::Activation => bind_update(
                returning_user!("UPDATE users SET active = TRUE, verified = TRUE, updated_at = $2 WHERE id = $1"),
                id,
                at,
            ),
            UserChange::Deactivation => bind_update(
                returning_user!("UPDATE users SET active = FALSE, updated_at = $2 WHERE id = $1"),
                id,
                at,
            ),
            UserChange::Reactivation => bind_update(
                returning_user!("UPDATE users SET active = TRUE, updated_at = $2 WHERE id = $1"),
                id,
                at,
            ),
            UserChange::Password { hash } => bind_update(
                returning_user!("UPDATE users SET password_hash = $3, updated_at = $2 WHERE id = $1"),
                id,
                at,
            )
            .bind(hash),
            UserChange::Profile(update) => bind_update(
                returning_user!("UPDATE users SET display_name = $3, updated_at = $2 WHERE id = $1"),
                id,
                at,
            )
            .bind(update.display_name),
            // Bit 0 is the empty-set marker: cleared when a flag is set,
            // restored when the last flag goes.
            UserChange::GrantPermission(flag) => bind_update(
                returning_user!(
                    "UPDATE users SET permissions = (permissions & ~1::BIGINT) | $3, updated_at = $2 WHERE id = $1"
                ),
                id,
                at,
            )
            .bind(flag.bit() as i64),
            UserChange::RevokePermission(flag) => bind_update(
                returning_user!(
                    "UPDATE users SET permissions = CASE \
                         WHEN permissions & ~$3 & ~1::BIGINT = 0 THEN 1 \
                         ELSE permissions & ~$3 & ~1::BIGINT END, \
                     updated_at = $2 WHERE id = $1"
                ),
                id,
                at,
            )
            .bind(flag.bit() as i64),
        };

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("users.update", e))?;
        row.as_ref().map(UserRow::decode).transpose()
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("users.get_by_id", e))?;
        row.as_ref().map(UserRow::decode).transpose()
    }

    #[instrument(skip(self, email), err)]
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("users.get_by_email", e))?;
        row.as_ref().map(UserRow::decode).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self, page: u32, page_size: u32) -> Result<(Vec<User>, u64), StoreError> {
        let count_row = sqlx::query("SELECT COUNT(*) AS total FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("users.count", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StoreError::Corrupt(format!("failed to read count: {}", e)))?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        let rows = sqlx::query(&format!(
            "{SELECT_USER} ORDER BY created_at ASC, email ASC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("users.list", e))?;

        let users = rows.iter().map(UserRow::decode).collect::<Result<Vec<_>, _>>()?;
        Ok((users, total.max(0) as u64))
    }
}

#[derive(Debug, Clone)]
struct UserRow {
    id: uuid::Uuid,
    email: String,
    password_hash: Option<String>,
    display_name: String,
    permissions: i64,
    active: bool,
    verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn decode(row: &PgRow) -> Result<User, StoreError> {
        UserRow::from_row(row)
            .map(User::from)
            .map_err(|e| StoreError::Corrupt(format!("failed to deserialize user row: {}", e)))
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            display_name: row.try_get("display_name")?,
            permissions: row.try_get("permissions")?,
            active: row.try_get("active")?,
            verified: row.try_get("verified")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::from_uuid(row.id),
            email: row.email,
            password_hash: row.password_hash,
            display_name: row.display_name,
            permissions: Permissions::from_bits(row.permissions as u64),
            active: row.active,
            verified: row.verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
