use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::users::repo_types::User;
use crate::users::services::{CreateArgs, UpdateArgs};

time::serde::format_description!(date_format, Date, "[year]-[month]-[day]");

/// Request body for `POST /users`.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, with = "date_format::option")]
    pub birthday: Option<Date>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl From<CreateUserRequest> for CreateArgs {
    fn from(r: CreateUserRequest) -> Self {
        Self {
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            birthday: r.birthday,
            username: r.username,
            passwd: r.password,
        }
    }
}

/// Request body for `PUT /users`. Omitted or empty fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub id: u64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, with = "date_format::option")]
    pub birthday: Option<Date>,
}

impl From<UpdateUserRequest> for UpdateArgs {
    fn from(r: UpdateUserRequest) -> Self {
        Self {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            birthday: r.birthday,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeEmailRequest {
    pub id: u64,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub id: u64,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Query string carrying a user id; kept raw so bad values get a precise error.
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    pub filter: Option<String>,
    pub value: Option<String>,
}

/// Public view of a user; the password hash never leaves the service.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(with = "date_format::option")]
    pub birthday: Option<Date>,
    pub username: String,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            birthday: u.birthday,
            username: u.username,
            active: u.active,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
}

impl From<User> for LoginResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            username: u.username,
            last_login: u.last_login,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub message: String,
    pub id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveResponse {
    pub id: u64,
    pub active: bool,
}
