use sqlx::FromRow;
use time::{Date, OffsetDateTime};

/// User record as the domain sees it. `id == 0` never refers to a stored user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub birthday: Option<Date>,
    pub username: String,
    pub passwd: String, // always a PHC hash string, never cleartext
    pub active: bool,
    pub last_login: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

/// Fields supplied on creation; id and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub birthday: Option<Date>,
    pub username: String,
    pub passwd: String,
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub birthday: Option<Date>,
    pub username: String,
    pub passwd: String,
    pub active: bool,
    pub last_login: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            // BIGSERIAL starts at 1
            id: r.id.unsigned_abs(),
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            birthday: r.birthday,
            username: r.username,
            passwd: r.passwd,
            active: r.active,
            last_login: r.last_login,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
