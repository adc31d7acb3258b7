//! Account lifecycle orchestration.
//!
//! State is committed to the stores first; mail is sent afterwards and a
//! delivery failure is only logged.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, instrument, warn};

use campusid_auth::{
    MIN_PASSWORD_LEN, PasswordError, Permission, hash_password, meets_policy, verify_password,
};
use campusid_core::{Clock, UserId};

use crate::email::EmailPolicy;
use crate::errors::{AccountError, AccountResult, store_fault};
use crate::link::{LinkCode, LinkIntent, VerificationLink};
use crate::link_manager::LinkManager;
use crate::notifier::{MailMessage, Notifier};
use crate::store::{LinkStore, StoreError, UserStore};
use crate::user::{NewUser, Page, ProfileUpdate, User, UserChange};

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub email_policy: EmailPolicy,
    /// Public URL prefix that link paths are appended to.
    pub link_base_url: String,
    pub mail_sender: String,
    pub confirmation_ttl: Duration,
    pub reactivation_ttl: Duration,
    pub password_reset_ttl: Duration,
}

impl ServiceSettings {
    pub fn new(
        email_policy: EmailPolicy,
        link_base_url: impl Into<String>,
        mail_sender: impl Into<String>,
    ) -> Self {
        Self {
            email_policy,
            link_base_url: link_base_url.into().trim_end_matches('/').to_string(),
            mail_sender: mail_sender.into(),
            confirmation_ttl: Duration::days(7),
            reactivation_ttl: Duration::hours(6),
            password_reset_ttl: Duration::hours(12),
        }
    }

    pub fn link_url(&self, link: &VerificationLink) -> String {
        let base = &self.link_base_url;
        let code = &link.code;
        match link.intent {
            LinkIntent::Confirmation => format!("{base}/verify?code={code}&action=i"),
            LinkIntent::Reactivation => format!("{base}/verify?code={code}&action=r"),
            LinkIntent::PasswordReset => format!("{base}/reset?code={code}"),
        }
    }

    fn compose(&self, to: &str, link: &VerificationLink) -> MailMessage {
        let url = self.link_url(link);
        let (subject, action) = match link.intent {
            LinkIntent::Confirmation => ("Confirm your account", "confirm your account"),
            LinkIntent::Reactivation => ("Reactivate your account", "reactivate your account"),
            LinkIntent::PasswordReset => ("Reset your password", "choose a new password"),
        };
        MailMessage {
            from: self.mail_sender.clone(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html_body: format!(
                "<p>Follow the link below to {action}. It expires at {} UTC.</p><p><a href=\"{url}\">{url}</a></p>",
                link.expires_at.format("%Y-%m-%d %H:%M")
            ),
        }
    }
}

/// Drives every account state transition.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    links: LinkManager,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        links: Arc<dyn LinkStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            users,
            links: LinkManager::new(links, clock.clone()),
            notifier,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Create an inactive, unverified account and mail a confirmation link.
    #[instrument(skip(self), err)]
    pub async fn register(&self, email: &str) -> AccountResult<User> {
        let policy = &self.settings.email_policy;
        if !policy.is_institutional(email) {
            return Err(AccountError::NonInstitutionalEmail);
        }
        let email = policy.normalize(email);

        if self.find_by_email(&email).await?.is_some() {
            return Err(AccountError::AlreadyRegistered);
        }

        let user = self
            .users
            .create(NewUser {
                id: UserId::new(),
                display_name: policy.display_name_for(&email),
                email,
                permissions: Default::default(),
                created_at: self.clock.now(),
            })
            .await
            .map_err(|err| match err {
                StoreError::Duplicate(_) => AccountError::AlreadyRegistered,
                other => store_fault("users.create")(other),
            })?;

        let link = self
            .links
            .create(user.id, self.settings.confirmation_ttl, LinkIntent::Confirmation)
            .await?;

        info!(user_id = %user.id, "account registered");
        self.notify(&user, &link).await;
        Ok(user)
    }

    /// Consume a confirmation or reactivation link and activate its account.
    #[instrument(skip_all, err)]
    pub async fn validate_user(&self, code: &str) -> AccountResult<User> {
        let link = self
            .usable_link(code, |intent| {
                matches!(intent, LinkIntent::Confirmation | LinkIntent::Reactivation)
            })
            .await?;

        let change = match link.intent {
            LinkIntent::Confirmation => UserChange::Activation,
            _ => UserChange::Reactivation,
        };
        let user = self.apply(link.user_id, change).await?;

        info!(user_id = %user.id, intent = %link.intent, "account activated");
        Ok(user)
    }

    #[instrument(skip(self), err)]
    pub async fn deactivate_account(&self, user_id: UserId) -> AccountResult<User> {
        let user = self.apply(user_id, UserChange::Deactivation).await?;
        info!(user_id = %user.id, "account deactivated");
        Ok(user)
    }

    /// Mail a reactivation link to an inactive account.
    #[instrument(skip(self), err)]
    pub async fn reactivate_account(&self, email: &str) -> AccountResult<()> {
        let user = self.require_by_email(email).await?;
        if user.active {
            return Err(AccountError::AlreadyActive);
        }

        self.links
            .invalidate_all_for_user(user.id, LinkIntent::Reactivation)
            .await?;
        let link = self
            .links
            .create(user.id, self.settings.reactivation_ttl, LinkIntent::Reactivation)
            .await?;

        info!(user_id = %user.id, "reactivation requested");
        self.notify(&user, &link).await;
        Ok(())
    }

    /// Mail a password reset link; any earlier reset link stops working.
    #[instrument(skip(self), err)]
    pub async fn request_new_password(&self, email: &str) -> AccountResult<()> {
        let user = self.require_by_email(email).await?;

        self.links
            .invalidate_all_for_user(user.id, LinkIntent::PasswordReset)
            .await?;
        let link = self
            .links
            .create(user.id, self.settings.password_reset_ttl, LinkIntent::PasswordReset)
            .await?;

        info!(user_id = %user.id, "password reset requested");
        self.notify(&user, &link).await;
        Ok(())
    }

    #[instrument(skip_all, err)]
    pub async fn set_new_password(&self, password: &str, code: &str) -> AccountResult<User> {
        if !meets_policy(password) {
            return Err(AccountError::WeakPassword(MIN_PASSWORD_LEN));
        }

        let link = self.find_link(code).await?;
        Self::check_link(&link, self.clock.now(), |intent| intent == LinkIntent::PasswordReset)?;

        // Hash before consuming so a hashing fault leaves the link usable.
        let password = password.to_owned();
        let hash = off_runtime(move || hash_password(&password)).await?;
        let link = self.links.consume(&link).await?.ok_or(AccountError::LinkExpired)?;
        let user = self.apply(link.user_id, UserChange::Password { hash }).await?;

        info!(user_id = %user.id, "password changed");
        Ok(user)
    }

    /// Check credentials of an active, verified account.
    #[instrument(skip(self, password), err)]
    pub async fn authenticate(&self, email: &str, password: &str) -> AccountResult<User> {
        let email = self.settings.email_policy.normalize(email);
        let user = self
            .find_by_email(&email)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        let Some(hash) = user.password_hash.clone() else {
            return Err(AccountError::InvalidCredentials);
        };
        let password = password.to_owned();
        if !off_runtime(move || verify_password(&password, &hash)).await? {
            return Err(AccountError::InvalidCredentials);
        }
        if !(user.active && user.verified) {
            return Err(AccountError::AccountInactive);
        }
        Ok(user)
    }

    pub async fn get_user(&self, user_id: UserId) -> AccountResult<User> {
        self.users
            .get_by_id(user_id)
            .await
            .map_err(store_fault("users.get_by_id"))?
            .ok_or(AccountError::UserNotFound)
    }

    pub async fn get_user_by_email(&self, email: &str) -> AccountResult<User> {
        self.require_by_email(email).await
    }

    pub async fn list_users(&self, page: u32, page_size: u32) -> AccountResult<Page<User>> {
        if page == 0 {
            return Err(AccountError::Validation("page starts at 1".to_string()));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(AccountError::Validation(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let (items, total) = self
            .users
            .list(page, page_size)
            .await
            .map_err(store_fault("users.list"))?;
        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }

    /// All links ever issued to an account, newest first.
    pub async fn list_links(&self, user_id: UserId) -> AccountResult<Vec<VerificationLink>> {
        self.get_user(user_id).await?;
        self.links.list_for_user(user_id).await
    }

    #[instrument(skip(self), err)]
    pub async fn update_profile(&self, user_id: UserId, display_name: &str) -> AccountResult<User> {
        let update = ProfileUpdate::new(display_name)?;
        self.apply(user_id, UserChange::Profile(update)).await
    }

    #[instrument(skip(self), err)]
    pub async fn grant_permission(&self, user_id: UserId, flag: Permission) -> AccountResult<User> {
        self.apply(user_id, UserChange::GrantPermission(flag)).await
    }

    #[instrument(skip(self), err)]
    pub async fn revoke_permission(&self, user_id: UserId, flag: Permission) -> AccountResult<User> {
        self.apply(user_id, UserChange::RevokePermission(flag)).await
    }

    async fn apply(&self, user_id: UserId, change: UserChange) -> AccountResult<User> {
        let kind = change.kind();
        let updated = self
            .users
            .update(user_id, change, self.clock.now())
            .await
            .map_err(store_fault("users.update"))?;
        if updated.is_none() {
            warn!(user_id = %user_id, change = kind, "update for unknown account");
        }
        updated.ok_or(AccountError::UserNotFound)
    }

    async fn find_by_email(&self, email: &str) -> AccountResult<Option<User>> {
        self.users
            .get_by_email(email)
            .await
            .map_err(store_fault("users.get_by_email"))
    }

    async fn require_by_email(&self, email: &str) -> AccountResult<User> {
        let email = self.settings.email_policy.normalize(email);
        self.find_by_email(&email).await?.ok_or(AccountError::UserNotFound)
    }

    async fn find_link(&self, code: &str) -> AccountResult<VerificationLink> {
        // A code that cannot have been issued cannot exist.
        let code: LinkCode = code.parse().map_err(|_| AccountError::LinkNotFound)?;
        self.links.lookup(&code).await?.ok_or(AccountError::LinkNotFound)
    }

    fn check_link(
        link: &VerificationLink,
        now: chrono::DateTime<chrono::Utc>,
        allowed: impl Fn(LinkIntent) -> bool,
    ) -> AccountResult<()> {
        if !allowed(link.intent) {
            return Err(AccountError::LinkIntentMismatch);
        }
        if !link.is_consumable(now) {
            return Err(AccountError::LinkExpired);
        }
        Ok(())
    }

    /// Look up, check and consume a link in one go.
    async fn usable_link(
        &self,
        code: &str,
        allowed: impl Fn(LinkIntent) -> bool,
    ) -> AccountResult<VerificationLink> {
        let link = self.find_link(code).await?;
        Self::check_link(&link, self.clock.now(), allowed)?;
        self.links.consume(&link).await?.ok_or(AccountError::LinkExpired)
    }

    async fn notify(&self, user: &User, link: &VerificationLink) {
        let message = self.settings.compose(&user.email, link);
        if let Err(err) = self.notifier.send(message).await {
            warn!(user_id = %user.id, intent = %link.intent, error = %err, "failed to deliver link mail");
        }
    }
}

/// Run an Argon2 call on the blocking pool.
async fn off_runtime<T, F>(task: F) -> AccountResult<T>
where
    F: FnOnce() -> Result<T, PasswordError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| PasswordError::Hash(format!("hashing task failed: {e}")))?
        .map_err(AccountError::from)
}
