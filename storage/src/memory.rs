//! In-memory [`ChatStore`] used by protocol tests.
//!
//! Mirrors the Postgres implementation's observable semantics, including the
//! advisory duplicate-room check, so gateway tests exercise the same paths
//! they would hit in production. Writes can be made to fail on demand to
//! drive the persistence-failure branches.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chat_proto::{MemberPayload, MessageKind, MessagePayload, RoomPayload};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{ChatStore, RoomOverview, StoreError};

#[derive(Clone)]
struct UserProfile {
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Clone)]
struct StoredRoom {
    id: i64,
    name: Option<String>,
    is_group: bool,
    created_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<i64, UserProfile>,
    rooms: Vec<StoredRoom>,
    members: HashMap<i64, BTreeSet<i64>>,
    messages: Vec<MessagePayload>,
    next_room_id: i64,
    next_message_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write operation fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn add_user(&self, id: i64, username: &str) {
        let mut inner = self.inner.lock().await;
        inner.users.insert(
            id,
            UserProfile {
                username: username.to_string(),
                first_name: None,
                last_name: None,
                avatar_url: None,
            },
        );
    }

    /// Seed a room with memberships, bypassing the create flow.
    pub async fn seed_room(
        &self,
        name: Option<&str>,
        is_group: bool,
        created_by: i64,
        member_ids: &[i64],
    ) -> i64 {
        let mut inner = self.inner.lock().await;
        inner.next_room_id += 1;
        let id = inner.next_room_id;
        let now = Utc::now();
        inner.rooms.push(StoredRoom {
            id,
            name: name.map(ToString::to_string),
            is_group,
            created_by,
            created_at: now,
            updated_at: now,
        });
        inner
            .members
            .insert(id, member_ids.iter().copied().collect());
        id
    }

    /// Messages persisted for a room, in insert order.
    pub async fn messages_in(&self, room_id: i64) -> Vec<MessagePayload> {
        let inner = self.inner.lock().await;
        inner
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect()
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    fn member_payloads(inner: &Inner, room_id: i64) -> Vec<MemberPayload> {
        let Some(ids) = inner.members.get(&room_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| {
                inner.users.get(id).map(|u| MemberPayload {
                    user_id: *id,
                    username: u.username.clone(),
                    first_name: u.first_name.clone(),
                    last_name: u.last_name.clone(),
                })
            })
            .collect()
    }

    fn room_payload(inner: &Inner, room: &StoredRoom) -> RoomPayload {
        RoomPayload {
            id: room.id,
            name: room.name.clone(),
            is_group: room.is_group,
            created_by: room.created_by,
            created_at: room.created_at,
            updated_at: room.updated_at,
            members: Self::member_payloads(inner, room.id),
        }
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn rooms_for_user(&self, user_id: i64) -> Result<Vec<i64>, StoreError> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<i64> = inner
            .members
            .iter()
            .filter(|(_, users)| users.contains(&user_id))
            .map(|(room_id, _)| *room_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn list_rooms(&self, user_id: i64) -> Result<Vec<RoomOverview>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rooms: Vec<&StoredRoom> = inner
            .rooms
            .iter()
            .filter(|r| {
                inner
                    .members
                    .get(&r.id)
                    .is_some_and(|users| users.contains(&user_id))
            })
            .collect();
        rooms.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(rooms
            .into_iter()
            .map(|room| RoomOverview {
                room: Self::room_payload(&inner, room),
                last_message: inner
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.room_id == room.id)
                    .cloned(),
            })
            .collect())
    }

    async fn is_member(&self, room_id: i64, user_id: i64) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .members
            .get(&room_id)
            .is_some_and(|users| users.contains(&user_id)))
    }

    async fn insert_message(
        &self,
        room_id: i64,
        user_id: i64,
        body: &str,
        kind: MessageKind,
    ) -> Result<MessagePayload, StoreError> {
        self.check_writes()?;
        let mut inner = self.inner.lock().await;

        let sender = inner
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| StoreError::Unavailable(format!("unknown user {user_id}")))?;

        inner.next_message_id += 1;
        let now = Utc::now();
        let message = MessagePayload {
            id: inner.next_message_id,
            room_id,
            user_id,
            message: body.to_string(),
            message_type: kind,
            is_read: false,
            created_at: now,
            username: sender.username,
            first_name: sender.first_name,
            last_name: sender.last_name,
            avatar_url: sender.avatar_url,
        };
        inner.messages.push(message.clone());

        if let Some(room) = inner.rooms.iter_mut().find(|r| r.id == room_id) {
            room.updated_at = now;
        }
        Ok(message)
    }

    async fn create_or_find_room(
        &self,
        creator_id: i64,
        name: Option<String>,
        is_group: bool,
        member_ids: &[i64],
    ) -> Result<(RoomPayload, bool), StoreError> {
        self.check_writes()?;
        let mut inner = self.inner.lock().await;

        let other_member = member_ids.iter().copied().find(|&id| id != creator_id);
        let existing = inner.rooms.iter().find(|r| {
            if is_group {
                r.is_group && name.is_some() && r.name == name
            } else {
                let Some(other) = other_member else {
                    return false;
                };
                let members = inner.members.get(&r.id);
                !r.is_group
                    && r.name.is_none()
                    && members.is_some_and(|m| m.contains(&creator_id) && m.contains(&other))
            }
        });
        if let Some(room) = existing {
            let payload = Self::room_payload(&inner, room);
            return Ok((payload, false));
        }

        inner.next_room_id += 1;
        let id = inner.next_room_id;
        let now = Utc::now();
        let room = StoredRoom {
            id,
            name,
            is_group,
            created_by: creator_id,
            created_at: now,
            updated_at: now,
        };
        inner.rooms.push(room.clone());
        let mut members: BTreeSet<i64> = member_ids.iter().copied().collect();
        members.insert(creator_id);
        inner.members.insert(id, members);

        Ok((Self::room_payload(&inner, &room), true))
    }

    async fn room_messages(
        &self,
        room_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<MessagePayload>, StoreError> {
        let inner = self.inner.lock().await;
        let offset = (page.saturating_sub(1) as usize) * limit as usize;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .skip(offset)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
