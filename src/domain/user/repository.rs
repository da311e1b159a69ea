use async_trait::async_trait;

use super::{NewUser, User};
use crate::domain::DomainResult;

/// Account storage used by login, registration and the admin seed
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `DomainError::Conflict` on a duplicate username or email.
    async fn create(&self, user: NewUser) -> DomainResult<User>;

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>>;
    async fn count(&self) -> DomainResult<u64>;
    /// All accounts, oldest first.
    async fn list(&self) -> DomainResult<Vec<User>>;

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> DomainResult<()>;
    /// Stamp `last_login_at`; unknown ids are ignored.
    async fn record_login(&self, id: &str) -> DomainResult<()>;
}
