use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use maitred_core::domain::booking::{BookingRecord, BookingStatus};
use maitred_core::domain::customer::CustomerDetails;
use maitred_core::domain::user::{User, UserId};

use super::{
    BookingRepository, ChatSessionRepository, RepositoryError, SessionRecord, UserRepository,
};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<i64, User>>,
    next_id: AtomicI64,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, username: &str, credential_hash: &str) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|user| user.username == username) {
            return Err(RepositoryError::DuplicateUsername(username.to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let user = User {
            id: UserId(id),
            username: username.to_string(),
            credential_hash: credential_hash.to_string(),
            profile: CustomerDetails::default(),
            created_at: now,
            updated_at: now,
        };
        users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.username == username).cloned())
    }

    async fn update_profile(
        &self,
        id: UserId,
        profile: &CustomerDetails,
    ) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        if let Some(user) = users.get_mut(&id.0) {
            user.profile = profile.clone();
            user.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<String, BookingRecord>>,
}

#[async_trait::async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<BookingRecord>, RepositoryError> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(reference).cloned())
    }

    async fn list_for_user(&self, owner: UserId) -> Result<Vec<BookingRecord>, RepositoryError> {
        let bookings = self.bookings.read().await;
        let mut owned: Vec<BookingRecord> =
            bookings.values().filter(|booking| booking.owner == owner).cloned().collect();
        owned.sort_by(|a, b| {
            (a.visit_date, a.visit_time).cmp(&(b.visit_date, b.visit_time))
        });
        Ok(owned)
    }

    async fn save(&self, booking: BookingRecord) -> Result<(), RepositoryError> {
        let mut bookings = self.bookings.write().await;
        bookings.insert(booking.reference.clone(), booking);
        Ok(())
    }

    async fn set_status(
        &self,
        reference: &str,
        status: BookingStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut bookings = self.bookings.write().await;
        if let Some(booking) = bookings.get_mut(reference) {
            booking.status = status;
            booking.updated_at = updated_at;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryChatSessionRepository {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

#[async_trait::async_trait]
impl ChatSessionRepository for InMemoryChatSessionRepository {
    async fn find(&self, session_id: &str) -> Result<Option<SessionRecord>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn find_for_user(&self, owner: UserId) -> Result<Option<SessionRecord>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.values().find(|session| session.owner == owner).cloned())
    }

    async fn save(&self, session: SessionRecord) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        // same uniqueness as the SQL schema: one row per user
        sessions.retain(|_, existing| existing.owner != session.owner);
        sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }
}
