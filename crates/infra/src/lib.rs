//! Infrastructure layer: Postgres-backed stores and outbound mail.

pub mod db;
pub mod links;
pub mod mailer;
pub mod users;

pub use db::{DbConfig, connect, ensure_schema};
pub use links::PostgresLinkStore;
pub use mailer::{HttpMailRelay, LogNotifier};
pub use users::PostgresUserStore;
