//! Durable room/membership/message store.
//!
//! The gateway talks to the system of record through the [`ChatStore`] trait;
//! membership decisions are always re-derived from it rather than cached.
//! [`postgres::PgChatStore`] is the production implementation,
//! [`memory::MemoryStore`] the hermetic double used by protocol tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chat_proto::{MessageKind, MessagePayload, RoomPayload};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A room as the room-list endpoint reports it: members resolved plus the
/// most recent message, ordered by activity in the handler.
#[derive(Debug, Clone, Serialize)]
pub struct RoomOverview {
    #[serde(flatten)]
    pub room: RoomPayload,
    pub last_message: Option<MessagePayload>,
}

/// Interface to the relational system of record. All calls are
/// suspend-capable; transactional operations commit before returning, which
/// is what the persist-before-broadcast guarantee hangs on.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Room ids the user belongs to. Drives bulk channel subscription at
    /// connect time.
    async fn rooms_for_user(&self, user_id: i64) -> Result<Vec<i64>, StoreError>;

    /// Rooms the user belongs to with members and last message resolved,
    /// most recently active first.
    async fn list_rooms(&self, user_id: i64) -> Result<Vec<RoomOverview>, StoreError>;

    async fn is_member(&self, room_id: i64, user_id: i64) -> Result<bool, StoreError>;

    /// Insert a message and touch the room's activity timestamp in one
    /// transaction, returning the row enriched with the sender's display
    /// fields.
    async fn insert_message(
        &self,
        room_id: i64,
        user_id: i64,
        body: &str,
        kind: MessageKind,
    ) -> Result<MessagePayload, StoreError>;

    /// Create a room with its memberships, or return an existing one found
    /// by the advisory duplicate check (group rooms by name, direct rooms by
    /// the unordered creator/member pair). The boolean is `true` when a row
    /// was inserted.
    async fn create_or_find_room(
        &self,
        creator_id: i64,
        name: Option<String>,
        is_group: bool,
        member_ids: &[i64],
    ) -> Result<(RoomPayload, bool), StoreError>;

    /// Message history for a room, oldest first, offset-paginated.
    async fn room_messages(
        &self,
        room_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<MessagePayload>, StoreError>;
}
