use std::{fmt, str::FromStr};

use lazy_static::lazy_static;
use regex::Regex;

use crate::users::{error::ValidationError, repo_types::User};

pub const MIN_PASSWD_LEN: usize = 6;

/// Field labels carried by `InvalidInput` errors.
pub mod field {
    pub const ID: &str = "ID";
    pub const ID_PARAM: &str = "id";
    pub const FIRST_NAME: &str = "FirstName";
    pub const LAST_NAME: &str = "LastName";
    pub const EMAIL: &str = "Email";
    pub const USERNAME: &str = "Username";
    pub const PASSWD: &str = "Passwd";
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::EmptyValue);
    }
    if !is_valid_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// Length is counted in characters, not bytes.
pub fn validate_passwd(passwd: &str) -> Result<(), ValidationError> {
    if passwd.is_empty() || passwd.chars().count() < MIN_PASSWD_LEN {
        return Err(ValidationError::InvalidPasswd);
    }
    Ok(())
}

pub fn require_non_empty(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        Err(ValidationError::EmptyValue)
    } else {
        Ok(())
    }
}

/// Search keys accepted by `UserService::find`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    FirstName,
    LastName,
    Email,
    Username,
}

impl Filter {
    pub const ALL: [Filter; 4] = [
        Filter::FirstName,
        Filter::LastName,
        Filter::Email,
        Filter::Username,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Filter::FirstName => "FirstName",
            Filter::LastName => "LastName",
            Filter::Email => "Email",
            Filter::Username => "Username",
        }
    }

    /// Exact, case-sensitive comparison against the named field.
    pub fn matches(self, user: &User, value: &str) -> bool {
        let field = match self {
            Filter::FirstName => &user.first_name,
            Filter::LastName => &user.last_name,
            Filter::Email => &user.email,
            Filter::Username => &user.username,
        };
        field == value
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::EmptyValue);
        }
        Filter::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or(ValidationError::NotSupported)
    }
}
