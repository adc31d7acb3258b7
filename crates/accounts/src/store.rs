//! Persistence contracts for accounts and links, plus in-memory backends.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use thiserror::Error;

use campusid_core::{LinkId, UserId};

use crate::link::{LinkCode, LinkIntent, NewLink, VerificationLink};
use crate::user::{NewUser, User, UserChange};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// Stored data could not be mapped back into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// Apply `change`; `None` if no such account exists.
    async fn update(
        &self,
        id: UserId,
        change: UserChange,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// One page (1-based) ordered by creation time, plus the total count.
    async fn list(&self, page: u32, page_size: u32) -> Result<(Vec<User>, u64), StoreError>;
}

#[async_trait::async_trait]
pub trait LinkStore: Send + Sync {
    async fn create(&self, link: NewLink) -> Result<VerificationLink, StoreError>;

    async fn get_by_id(&self, id: LinkId) -> Result<Option<VerificationLink>, StoreError>;

    async fn get_by_code(&self, code: &LinkCode) -> Result<Option<VerificationLink>, StoreError>;

    /// Mark the link used and expire it at `now`, only if it is still
    /// unused and unexpired. Must be a single atomic step.
    async fn consume(
        &self,
        id: LinkId,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationLink>, StoreError>;

    /// Expire every consumable link of `intent` for `user_id`; returns how many.
    async fn expire_all_for_user(
        &self,
        user_id: UserId,
        intent: LinkIntent,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Newest first.
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<VerificationLink>, StoreError>;
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

/// Shared bookkeeping for the in-memory stores: a call counter and an
/// outage switch for exercising failure paths.
#[derive(Debug, Default)]
struct Probe {
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl Probe {
    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store unavailable".to_string()));
        }
        Ok(())
    }
}

/// In-memory account store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
    probe: Probe,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait calls made so far.
    pub fn calls(&self) -> usize {
        self.probe.calls.load(Ordering::SeqCst)
    }

    /// While set, every call fails with [`StoreError::Backend`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.probe.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        self.probe.enter()?;
        let mut users = self.users.write().map_err(poisoned)?;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }
        if users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user {}", user.id)));
        }
        let user = user.into_user();
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(
        &self,
        id: UserId,
        change: UserChange,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        self.probe.enter()?;
        let mut users = self.users.write().map_err(poisoned)?;
        Ok(users.get_mut(&id).map(|user| {
            change.apply(user, at);
            user.clone()
        }))
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.probe.enter()?;
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.probe.enter()?;
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn list(&self, page: u32, page_size: u32) -> Result<(Vec<User>, u64), StoreError> {
        self.probe.enter()?;
        let users = self.users.read().map_err(poisoned)?;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.email.cmp(&b.email)));

        let total = all.len() as u64;
        let skip = page.saturating_sub(1) as usize * page_size as usize;
        let items = all.into_iter().skip(skip).take(page_size as usize).collect();
        Ok((items, total))
    }
}

/// In-memory link store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryLinkStore {
    links: RwLock<HashMap<LinkId, VerificationLink>>,
    probe: Probe,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.probe.calls.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.probe.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl LinkStore for InMemoryLinkStore {
    async fn create(&self, link: NewLink) -> Result<VerificationLink, StoreError> {
        self.probe.enter()?;
        let mut links = self.links.write().map_err(poisoned)?;
        if links.values().any(|l| l.code == link.code) {
            return Err(StoreError::Duplicate("link code".to_string()));
        }
        let link = link.into_link();
        links.insert(link.id, link.clone());
        Ok(link)
    }

    async fn get_by_id(&self, id: LinkId) -> Result<Option<VerificationLink>, StoreError> {
        self.probe.enter()?;
        let links = self.links.read().map_err(poisoned)?;
        Ok(links.get(&id).cloned())
    }

    async fn get_by_code(&self, code: &LinkCode) -> Result<Option<VerificationLink>, StoreError> {
        self.probe.enter()?;
        let links = self.links.read().map_err(poisoned)?;
        Ok(links.values().find(|l| &l.code == code).cloned())
    }

    async fn consume(
        &self,
        id: LinkId,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationLink>, StoreError> {
        self.probe.enter()?;
        let mut links = self.links.write().map_err(poisoned)?;
        Ok(links
            .get_mut(&id)
            .filter(|link| link.is_consumable(now))
            .map(|link| {
                link.utilised = true;
                link.expires_at = now;
                link.updated_at = now;
                link.clone()
            }))
    }

    async fn expire_all_for_user(
        &self,
        user_id: UserId,
        intent: LinkIntent,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.probe.enter()?;
        let mut links = self.links.write().map_err(poisoned)?;
        let mut expired = 0;
        for link in links
            .values_mut()
            .filter(|l| l.user_id == user_id && l.intent == intent && l.is_consumable(now))
        {
            link.expires_at = now;
            link.updated_at = now;
            expired += 1;
        }
        Ok(expired)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<VerificationLink>, StoreError> {
        self.probe.enter()?;
        let links = self.links.read().map_err(poisoned)?;
        let mut found: Vec<_> = links.values().filter(|l| l.user_id == user_id).cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campusid_auth::Permissions;
    use chrono::Duration;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn new_user(email: &str, at: i64) -> NewUser {
        NewUser {
            id: UserId::new(),
            email: email.to_string(),
            display_name: "name".into(),
            permissions: Permissions::NONE,
            created_at: t(at),
        }
    }

    fn new_link(user_id: UserId, intent: LinkIntent, at: i64) -> NewLink {
        NewLink {
            id: LinkId::new(),
            code: LinkCode::generate(),
            user_id,
            intent,
            expires_at: t(at) + Duration::hours(1),
            created_at: t(at),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = InMemoryUserStore::new();
        store.create(new_user("a_b@auca.kg", 0)).await.unwrap();
        let err = store.create(new_user("a_b@auca.kg", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn update_of_missing_user_is_none() {
        let store = InMemoryUserStore::new();
        let out = store.update(UserId::new(), UserChange::Deactivation, t(0)).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn list_pages_in_creation_order() {
        let store = InMemoryUserStore::new();
        for (i, email) in ["c_c@auca.kg", "a_a@auca.kg", "b_b@auca.kg"].iter().enumerate() {
            store.create(new_user(email, i as i64)).await.unwrap();
        }

        let (first, total) = store.list(1, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(first.iter().map(|u| u.email.as_str()).collect::<Vec<_>>(), ["c_c@auca.kg", "a_a@auca.kg"]);

        let (second, _) = store.list(2, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].email, "b_b@auca.kg");
    }

    #[tokio::test]
    async fn consume_succeeds_once() {
        let store = InMemoryLinkStore::new();
        let link = store.create(new_link(UserId::new(), LinkIntent::Confirmation, 0)).await.unwrap();

        let consumed = store.consume(link.id, t(10)).await.unwrap().unwrap();
        assert!(consumed.utilised);
        assert_eq!(consumed.expires_at, t(10));
        assert!(store.consume(link.id, t(11)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn consume_after_expiry_is_none() {
        let store = InMemoryLinkStore::new();
        let link = store.create(new_link(UserId::new(), LinkIntent::Confirmation, 0)).await.unwrap();
        assert!(store.consume(link.id, t(3_600)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expire_all_touches_only_matching_intent() {
        let store = InMemoryLinkStore::new();
        let user = UserId::new();
        let reset = store.create(new_link(user, LinkIntent::PasswordReset, 0)).await.unwrap();
        let confirm = store.create(new_link(user, LinkIntent::Confirmation, 0)).await.unwrap();
        store.create(new_link(UserId::new(), LinkIntent::PasswordReset, 0)).await.unwrap();

        let n = store.expire_all_for_user(user, LinkIntent::PasswordReset, t(5)).await.unwrap();
        assert_eq!(n, 1);

        let reset = store.get_by_id(reset.id).await.unwrap().unwrap();
        assert!(!reset.is_consumable(t(5)));
        let confirm = store.get_by_id(confirm.id).await.unwrap().unwrap();
        assert!(confirm.is_consumable(t(5)));
    }

    #[tokio::test]
    async fn unavailable_store_fails_and_counts() {
        let store = InMemoryUserStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.get_by_email("x").await,
            Err(StoreError::Backend(_))
        ));
        assert_eq!(store.calls(), 1);
    }
}
