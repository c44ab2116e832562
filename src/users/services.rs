use std::{future::Future, sync::Arc, time::Duration};

use time::{Date, OffsetDateTime};
use tracing::{debug, info, instrument, warn};

use crate::users::{
    error::{HashError, ServiceError, ServiceResult, StoreError, ValidationError},
    password::CredentialHasher,
    repo::UserStore,
    repo_types::{NewUser, User},
    validators::{self, field, Filter},
};

/// Input of [`UserService::create`]. Everything but `birthday` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateArgs {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub birthday: Option<Date>,
    pub username: String,
    pub passwd: String,
}

/// Input of [`UserService::update`].
///
/// `None` and `Some("")` both mean "leave unchanged"; a stored field cannot be
/// cleared through this path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateArgs {
    pub id: u64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birthday: Option<Date>,
}

fn supplied(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl UpdateArgs {
    pub fn is_empty(&self) -> bool {
        supplied(&self.first_name).is_none()
            && supplied(&self.last_name).is_none()
            && self.birthday.is_none()
    }

    /// Overwrites only the supplied fields of `user`.
    pub fn merge_into(&self, user: &mut User) {
        if let Some(first_name) = supplied(&self.first_name) {
            user.first_name = first_name.to_string();
        }
        if let Some(last_name) = supplied(&self.last_name) {
            user.last_name = last_name.to_string();
        }
        if let Some(birthday) = self.birthday {
            user.birthday = Some(birthday);
        }
    }
}

fn validate_create(args: &CreateArgs) -> ServiceResult<()> {
    let checks = [
        (field::FIRST_NAME, validators::require_non_empty(&args.first_name)),
        (field::LAST_NAME, validators::require_non_empty(&args.last_name)),
        (field::EMAIL, validators::validate_email(&args.email)),
        (field::USERNAME, validators::require_non_empty(&args.username)),
        (field::PASSWD, validators::validate_passwd(&args.passwd)),
    ];
    for (name, check) in checks {
        check.map_err(|cause| ServiceError::invalid_input(name, cause))?;
    }
    Ok(())
}

/// Business rules for user accounts on top of a [`UserStore`].
///
/// Holds no mutable state; clones share the same store and hasher. Every store
/// call runs under `store_timeout`. Mutations other than `create` re-read the
/// record and write it back whole, without locking: concurrent writers to the
/// same id race and the last write wins.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn CredentialHasher>,
    store_timeout: Duration,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn CredentialHasher>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            store_timeout,
        }
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(res) => res,
            Err(_) => {
                warn!(timeout = ?self.store_timeout, "store call timed out");
                Err(StoreError::Timeout(self.store_timeout))
            }
        }
    }

    async fn load(&self, id: u64) -> ServiceResult<User> {
        if id == 0 {
            return Err(ServiceError::ZeroValue);
        }
        Ok(self.guarded(self.store.read(id)).await?)
    }

    async fn save(&self, user: &User) -> ServiceResult<()> {
        Ok(self.guarded(self.store.update(user)).await?)
    }

    #[instrument(skip(self, args), fields(username = %args.username))]
    pub async fn create(&self, args: CreateArgs) -> ServiceResult<User> {
        if let Err(e) = validate_create(&args) {
            warn!(error = %e, "create rejected");
            return Err(e);
        }
        let passwd = self.hasher.hash(&args.passwd)?;
        let user = self
            .guarded(self.store.create(NewUser {
                first_name: args.first_name,
                last_name: args.last_name,
                email: args.email,
                birthday: args.birthday,
                username: args.username,
                passwd,
            }))
            .await?;
        info!(user_id = user.id, "user created");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: u64) -> ServiceResult<User> {
        self.load(id).await
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> ServiceResult<Vec<User>> {
        Ok(self.guarded(self.store.read_all()).await?)
    }

    /// Full scan keeping users whose `filter` field equals `value` exactly.
    #[instrument(skip(self, value))]
    pub async fn find(&self, filter: &str, value: &str) -> ServiceResult<Vec<User>> {
        let parsed: Filter = filter.parse().map_err(|source| {
            warn!(%filter, "unsupported filter");
            ServiceError::InvalidFilter {
                filter: filter.to_string(),
                source,
            }
        })?;
        self.find_by(parsed, value).await
    }

    async fn find_by(&self, filter: Filter, value: &str) -> ServiceResult<Vec<User>> {
        let users = self.guarded(self.store.read_all()).await?;
        let found: Vec<User> = users
            .into_iter()
            .filter(|u| filter.matches(u, value))
            .collect();
        debug!(%filter, count = found.len(), "find");
        Ok(found)
    }

    #[instrument(skip(self, args), fields(user_id = args.id))]
    pub async fn update(&self, args: UpdateArgs) -> ServiceResult<User> {
        if args.is_empty() {
            return Err(ServiceError::EmptyArgs);
        }
        if args.id == 0 {
            return Err(ServiceError::invalid_input(field::ID, ValidationError::ZeroValue));
        }
        let mut user = self.load(args.id).await?;
        args.merge_into(&mut user);
        self.save(&user).await?;
        info!("user updated");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: u64) -> ServiceResult<()> {
        if id == 0 {
            return Err(ServiceError::invalid_input(
                field::ID_PARAM,
                ValidationError::ZeroValue,
            ));
        }
        self.guarded(self.store.delete(id)).await?;
        info!(user_id = id, "user deleted");
        Ok(())
    }

    /// Idempotent: an already active user is written back unchanged.
    #[instrument(skip(self))]
    pub async fn activate(&self, id: u64) -> ServiceResult<()> {
        let mut user = self.load(id).await?;
        user.active = true;
        self.save(&user).await?;
        info!(user_id = id, "user activated");
        Ok(())
    }

    #[instrument(skip(self, email))]
    pub async fn change_email(&self, id: u64, email: &str) -> ServiceResult<()> {
        validators::validate_email(email)
            .map_err(|cause| ServiceError::invalid_input(field::EMAIL, cause))?;
        let mut user = self.load(id).await?;
        user.email = email.to_string();
        self.save(&user).await?;
        info!(user_id = id, "email changed");
        Ok(())
    }

    #[instrument(skip(self, passwd))]
    pub async fn change_passwd(&self, id: u64, passwd: &str) -> ServiceResult<()> {
        validators::validate_passwd(passwd)
            .map_err(|cause| ServiceError::invalid_input(field::PASSWD, cause))?;
        let mut user = self.load(id).await?;
        user.passwd = self.hasher.hash(passwd)?;
        self.save(&user).await?;
        info!(user_id = id, "password changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn is_active(&self, id: u64) -> ServiceResult<bool> {
        Ok(self.load(id).await?.active)
    }

    /// Checks credentials and stamps `last_login` on success. Only that column is
    /// written, so a concurrent profile or password change is never undone.
    #[instrument(skip(self, passwd))]
    pub async fn validate_login(&self, username: &str, passwd: &str) -> ServiceResult<User> {
        validators::require_non_empty(username)
            .map_err(|cause| ServiceError::invalid_input(field::USERNAME, cause))?;
        validators::validate_passwd(passwd)
            .map_err(|cause| ServiceError::invalid_input(field::PASSWD, cause))?;

        let mut matches = self.find_by(Filter::Username, username).await?;
        if matches.len() != 1 {
            warn!(count = matches.len(), "login username did not match exactly one user");
            return Err(ServiceError::invalid_input(
                field::USERNAME,
                ValidationError::NotUnique,
            ));
        }
        let mut user = matches.remove(0);

        match self.hasher.verify(&user.passwd, passwd) {
            Ok(()) => {}
            Err(HashError::Mismatch) => {
                warn!(user_id = user.id, "login invalid password");
                return Err(ServiceError::PasswdDoNotMatch);
            }
            Err(e) => return Err(e.into()),
        }

        let now = OffsetDateTime::now_utc();
        self.guarded(self.store.touch_login(user.id, now)).await?;
        user.last_login = Some(now);
        info!(user_id = user.id, "user logged in");
        Ok(user)
    }
}
