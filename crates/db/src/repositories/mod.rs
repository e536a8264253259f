use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use maitred_core::domain::booking::{BookingRecord, BookingStatus};
use maitred_core::domain::chat::ChatHistory;
use maitred_core::domain::customer::CustomerDetails;
use maitred_core::domain::user::{User, UserId};

pub mod booking;
pub mod chat_session;
pub mod memory;
pub mod user;

pub use booking::SqlBookingRepository;
pub use chat_session::SqlChatSessionRepository;
pub use memory::{InMemoryBookingRepository, InMemoryChatSessionRepository, InMemoryUserRepository};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("username `{0}` is already taken")]
    DuplicateUsername(String),
}

/// One persisted conversation. Each user has at most one session row, which
/// carries their full turn history; a new login re-keys the row under a
/// fresh session id instead of starting the history over.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionRecord {
    pub session_id: String,
    pub owner: UserId,
    pub history: ChatHistory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, username: &str, credential_hash: &str) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
    async fn update_profile(
        &self,
        id: UserId,
        profile: &CustomerDetails,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<BookingRecord>, RepositoryError>;

    async fn list_for_user(&self, owner: UserId) -> Result<Vec<BookingRecord>, RepositoryError>;

    async fn save(&self, booking: BookingRecord) -> Result<(), RepositoryError>;

    async fn set_status(
        &self,
        reference: &str,
        status: BookingStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ChatSessionRepository: Send + Sync {
    async fn find(&self, session_id: &str) -> Result<Option<SessionRecord>, RepositoryError>;
    async fn find_for_user(&self, owner: UserId) -> Result<Option<SessionRecord>, RepositoryError>;
    async fn save(&self, session: SessionRecord) -> Result<(), RepositoryError>;
    async fn delete(&self, session_id: &str) -> Result<(), RepositoryError>;
}
