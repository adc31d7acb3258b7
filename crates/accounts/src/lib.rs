//! `campusid-accounts` — the account lifecycle.
//!
//! Registration, email confirmation, deactivation, reactivation and password
//! reset, all driven through single-use verification links. Persistence and
//! mail delivery are reached only through the [`store`] and [`notifier`]
//! contracts.

pub mod email;
pub mod errors;
pub mod link;
pub mod link_manager;
pub mod notifier;
pub mod service;
pub mod store;
pub mod user;

pub use email::EmailPolicy;
pub use errors::{AccountError, AccountResult};
pub use link::{LinkCode, LinkIntent, NewLink, VerificationLink};
pub use link_manager::LinkManager;
pub use notifier::{MailError, MailMessage, Notifier, RecordingNotifier};
pub use service::{AccountService, ServiceSettings};
pub use store::{InMemoryLinkStore, InMemoryUserStore, LinkStore, StoreError, UserStore};
pub use user::{NewUser, Page, ProfileUpdate, User, UserChange};
