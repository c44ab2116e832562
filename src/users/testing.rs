//! Hand-written [`UserStore`] double for unit and handler tests.

use std::{collections::BTreeMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use time::{macros::datetime, OffsetDateTime};

use crate::users::error::StoreError;
use crate::users::repo::UserStore;
use crate::users::repo_types::{NewUser, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Create,
    Read(u64),
    ReadAll,
    Update(u64),
    Delete(u64),
    TouchLogin(u64),
}

#[derive(Default)]
struct Inner {
    users: BTreeMap<u64, User>,
    next_id: u64,
    calls: Vec<Call>,
    created: Vec<NewUser>,
    updates: Vec<User>,
    failure: Option<fn() -> StoreError>,
    delay: Option<Duration>,
}

/// Keeps users in a map and records every call. Usernames are unique, like
/// the `users` table.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

pub fn sample_user(id: u64, first_name: &str, last_name: &str, username: &str) -> User {
    User {
        id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: format!("{username}@example.com"),
        birthday: None,
        username: username.to_string(),
        passwd: "$argon2id$placeholder".to_string(),
        active: false,
        last_login: None,
        created_at: datetime!(2024-01-01 0:00 UTC),
        updated_at: None,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().unwrap();
            for user in users {
                inner.next_id = inner.next_id.max(user.id);
                inner.users.insert(user.id, user);
            }
        }
        store
    }

    /// Every later call fails with the error built by `make`.
    pub fn fail_with(&self, make: fn() -> StoreError) {
        self.inner.lock().unwrap().failure = Some(make);
    }

    /// Every later call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn created(&self) -> Vec<NewUser> {
        self.inner.lock().unwrap().created.clone()
    }

    pub fn updates(&self) -> Vec<User> {
        self.inner.lock().unwrap().updates.clone()
    }

    async fn enter(&self, call: Call) -> Result<(), StoreError> {
        let (delay, failure) = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(call);
            (inner.delay, inner.failure)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        self.enter(Call::Create).await?;
        let mut inner = self.inner.lock().unwrap();
        inner.created.push(user.clone());
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username {} already exists",
                user.username
            )));
        }
        inner.next_id += 1;
        let stored = User {
            id: inner.next_id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            birthday: user.birthday,
            username: user.username,
            passwd: user.passwd,
            active: false,
            last_login: None,
            created_at: datetime!(2024-06-01 12:00 UTC),
            updated_at: None,
        };
        inner.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn read(&self, id: u64) -> Result<User, StoreError> {
        self.enter(Call::Read(id)).await?;
        let inner = self.inner.lock().unwrap();
        inner.users.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn read_all(&self) -> Result<Vec<User>, StoreError> {
        self.enter(Call::ReadAll).await?;
        Ok(self.inner.lock().unwrap().users.values().cloned().collect())
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        self.enter(Call::Update(user.id)).await?;
        let mut inner = self.inner.lock().unwrap();
        inner.updates.push(user.clone());
        match inner.users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(user.id)),
        }
    }

    async fn delete(&self, id: u64) -> Result<(), StoreError> {
        self.enter(Call::Delete(id)).await?;
        let mut inner = self.inner.lock().unwrap();
        inner
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn touch_login(&self, id: u64, at: OffsetDateTime) -> Result<(), StoreError> {
        self.enter(Call::TouchLogin(id)).await?;
        let mut inner = self.inner.lock().unwrap();
        match inner.users.get_mut(&id) {
            Some(user) => {
                user.last_login = Some(at);
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }
}
