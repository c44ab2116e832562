use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::debug;

use crate::users::error::StoreError;
use crate::users::repo_types::{NewUser, User, UserRow};

/// Durable CRUD for user records, keyed by numeric id.
///
/// `read`, `update` and `delete` report a missing id as [`StoreError::NotFound`].
/// `update` always receives a fully populated record; `touch_login` writes
/// `last_login` and nothing else.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn read(&self, id: u64) -> Result<User, StoreError>;
    async fn read_all(&self) -> Result<Vec<User>, StoreError>;
    async fn update(&self, user: &User) -> Result<(), StoreError>;
    async fn delete(&self, id: u64) -> Result<(), StoreError>;
    async fn touch_login(&self, id: u64, at: OffsetDateTime) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Ids above `i64::MAX` cannot exist in a BIGSERIAL column.
fn row_id(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::NotFound(id))
}

fn classify(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (first_name, last_name, email, birthday, username, passwd)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, first_name, last_name, email, birthday, username, passwd,
                      active, last_login, created_at, updated_at
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.birthday)
        .bind(&user.username)
        .bind(&user.passwd)
        .fetch_one(&self.db)
        .await
        .map_err(classify)?;
        debug!(user_id = row.id, "user row inserted");
        Ok(row.into())
    }

    async fn read(&self, id: u64) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, first_name, last_name, email, birthday, username, passwd,
                   active, last_login, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(row_id(id)?)
        .fetch_optional(&self.db)
        .await?;
        row.map(User::from).ok_or(StoreError::NotFound(id))
    }

    async fn read_all(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, first_name, last_name, email, birthday, username, passwd,
                   active, last_login, created_at, updated_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let done = sqlx::query(
            r#"
            UPDATE users SET
                first_name = $1,
                last_name = $2,
                email = $3,
                birthday = $4,
                username = $5,
                passwd = $6,
                active = $7,
                last_login = $8,
                updated_at = NOW()
            WHERE id = $9
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.birthday)
        .bind(&user.username)
        .bind(&user.passwd)
        .bind(user.active)
        .bind(user.last_login)
        .bind(row_id(user.id)?)
        .execute(&self.db)
        .await
        .map_err(classify)?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(user.id));
        }
        Ok(())
    }

    async fn delete(&self, id: u64) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(row_id(id)?)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn touch_login(&self, id: u64, at: OffsetDateTime) -> Result<(), StoreError> {
        let done = sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(at)
            .bind(row_id(id)?)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
