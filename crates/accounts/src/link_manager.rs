//! Creation, lookup and consumption of verification links.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, instrument};

use campusid_core::{Clock, LinkId, UserId};

use crate::errors::{AccountError, AccountResult, store_fault};
use crate::link::{LinkCode, LinkIntent, NewLink, VerificationLink};
use crate::store::LinkStore;

#[derive(Clone)]
pub struct LinkManager {
    store: Arc<dyn LinkStore>,
    clock: Arc<dyn Clock>,
}

impl LinkManager {
    pub fn new(store: Arc<dyn LinkStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Persist a fresh link for `user_id` that expires `ttl` from now.
    #[instrument(skip(self), err)]
    pub async fn create(
        &self,
        user_id: UserId,
        ttl: Duration,
        intent: LinkIntent,
    ) -> AccountResult<VerificationLink> {
        if ttl <= Duration::zero() {
            return Err(AccountError::Validation("link ttl must be positive".to_string()));
        }

        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AccountError::Validation("link ttl is out of range".to_string()))?;
        let link = self
            .store
            .create(NewLink {
                id: LinkId::new(),
                code: LinkCode::generate(),
                user_id,
                intent,
                expires_at,
                created_at: now,
            })
            .await
            .map_err(store_fault("links.create"))?;

        debug!(link_id = %link.id, expires_at = %link.expires_at, "verification link created");
        Ok(link)
    }

    pub async fn lookup(&self, code: &LinkCode) -> AccountResult<Option<VerificationLink>> {
        self.store
            .get_by_code(code)
            .await
            .map_err(store_fault("links.get_by_code"))
    }

    /// Atomically use up `link`. `None` means it was already used or expired,
    /// including when a concurrent caller won the race.
    pub async fn consume(&self, link: &VerificationLink) -> AccountResult<Option<VerificationLink>> {
        self.store
            .consume(link.id, self.clock.now())
            .await
            .map_err(store_fault("links.consume"))
    }

    /// Expire every outstanding `intent` link for `user_id`.
    pub async fn invalidate_all_for_user(&self, user_id: UserId, intent: LinkIntent) -> AccountResult<u64> {
        let expired = self
            .store
            .expire_all_for_user(user_id, intent, self.clock.now())
            .await
            .map_err(store_fault("links.expire_all_for_user"))?;
        if expired > 0 {
            debug!(user_id = %user_id, intent = %intent, expired, "outstanding links invalidated");
        }
        Ok(expired)
    }

    pub async fn list_for_user(&self, user_id: UserId) -> AccountResult<Vec<VerificationLink>> {
        self.store
            .list_by_user(user_id)
            .await
            .map_err(store_fault("links.list_by_user"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLinkStore;
    use campusid_core::ManualClock;

    fn manager() -> (LinkManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (LinkManager::new(Arc::new(InMemoryLinkStore::new()), clock.clone()), clock)
    }

    #[tokio::test]
    async fn create_sets_expiry_from_clock() {
        let (links, clock) = manager();
        let link = links
            .create(UserId::new(), Duration::hours(6), LinkIntent::Reactivation)
            .await
            .unwrap();

        assert_eq!(link.created_at, clock.now());
        assert_eq!(link.expires_at, clock.now() + Duration::hours(6));
        assert!(!link.utilised);
        assert_eq!(links.lookup(&link.code).await.unwrap(), Some(link));
    }

    #[tokio::test]
    async fn create_never_reuses_a_link() {
        let (links, _clock) = manager();
        let user = UserId::new();
        let a = links.create(user, Duration::hours(1), LinkIntent::Confirmation).await.unwrap();
        let b = links.create(user, Duration::hours(1), LinkIntent::Confirmation).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.code, b.code);
        assert_eq!(links.list_for_user(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_positive_ttl_is_rejected() {
        let (links, _clock) = manager();
        let err = links
            .create(UserId::new(), Duration::zero(), LinkIntent::Confirmation)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Validation(_)));
    }

    #[tokio::test]
    async fn ttl_past_the_calendar_is_rejected_without_storing() {
        let (links, _clock) = manager();
        let user = UserId::new();
        let err = links
            .create(user, Duration::seconds(9_000_000_000_000), LinkIntent::PasswordReset)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Validation(_)));
        assert!(links.list_for_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_code_is_none() {
        let (links, _clock) = manager();
        assert!(links.lookup(&LinkCode::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn consume_respects_the_clock() {
        let (links, clock) = manager();
        let link = links
            .create(UserId::new(), Duration::minutes(5), LinkIntent::Confirmation)
            .await
            .unwrap();

        clock.advance(Duration::minutes(5));
        assert!(links.consume(&link).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumption_has_one_winner() {
        let (links, _clock) = manager();
        let link = links
            .create(UserId::new(), Duration::hours(1), LinkIntent::Confirmation)
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let links = links.clone();
            let link = link.clone();
            tasks.push(tokio::spawn(async move { links.consume(&link).await }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
