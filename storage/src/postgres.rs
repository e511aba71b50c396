//! PostgreSQL implementation of [`ChatStore`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use chat_proto::{MemberPayload, MessageKind, MessagePayload, RoomPayload};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use crate::{ChatStore, RoomOverview, StoreError};

const MESSAGE_COLUMNS: &str = "cm.id, cm.room_id, cm.user_id, cm.message, cm.message_type, \
     cm.is_read, cm.created_at, u.username, u.first_name, u.last_name, u.avatar_url";

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    room_id: i64,
    user_id: i64,
    message: String,
    message_type: String,
    is_read: bool,
    created_at: DateTime<Utc>,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
}

impl From<MessageRow> for MessagePayload {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            room_id: row.room_id,
            user_id: row.user_id,
            message: row.message,
            message_type: MessageKind::from_db(&row.message_type),
            is_read: row.is_read,
            created_at: row.created_at,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RoomRow {
    id: i64,
    name: Option<String>,
    is_group: bool,
    created_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoomRow {
    fn into_payload(self, members: Vec<MemberPayload>) -> RoomPayload {
        RoomPayload {
            id: self.id,
            name: self.name,
            is_group: self.is_group,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            members,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    user_id: i64,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl From<MemberRow> for MemberPayload {
    fn from(row: MemberRow) -> Self {
        Self {
            user_id: row.user_id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn members_of<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        room_id: i64,
    ) -> Result<Vec<MemberPayload>, StoreError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT u.id AS user_id, u.username, u.first_name, u.last_name \
             FROM chat_rooms_members crm \
             JOIN users u ON crm.user_id = u.id \
             WHERE crm.room_id = $1 \
             ORDER BY u.id",
        )
        .bind(room_id)
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Advisory duplicate check: group rooms match on name, direct rooms on
    /// the unordered creator/member pair with a NULL name. Check-then-insert,
    /// so two concurrent creations for the same pair can still both commit.
    async fn find_existing_room(
        tx: &mut Transaction<'_, Postgres>,
        creator_id: i64,
        name: Option<&str>,
        is_group: bool,
        other_member: Option<i64>,
    ) -> Result<Option<RoomRow>, StoreError> {
        if is_group {
            let Some(name) = name else { return Ok(None) };
            let row = sqlx::query_as::<_, RoomRow>(
                "SELECT id, name, is_group, created_by, created_at, updated_at \
                 FROM chat_rooms WHERE name = $1 AND is_group = TRUE \
                 LIMIT 1",
            )
            .bind(name)
            .fetch_optional(&mut **tx)
            .await?;
            return Ok(row);
        }

        let Some(other) = other_member else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT cr.id, cr.name, cr.is_group, cr.created_by, cr.created_at, cr.updated_at \
             FROM chat_rooms cr \
             JOIN chat_rooms_members a ON cr.id = a.room_id AND a.user_id = $1 \
             JOIN chat_rooms_members b ON cr.id = b.room_id AND b.user_id = $2 \
             WHERE cr.is_group = FALSE AND cr.name IS NULL \
             LIMIT 1",
        )
        .bind(creator_id)
        .bind(other)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn rooms_for_user(&self, user_id: i64) -> Result<Vec<i64>, StoreError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT room_id FROM chat_rooms_members WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn list_rooms(&self, user_id: i64) -> Result<Vec<RoomOverview>, StoreError> {
        let rooms = sqlx::query_as::<_, RoomRow>(
            "SELECT cr.id, cr.name, cr.is_group, cr.created_by, cr.created_at, cr.updated_at \
             FROM chat_rooms cr \
             JOIN chat_rooms_members crm ON cr.id = crm.room_id \
             WHERE crm.user_id = $1 \
             ORDER BY cr.updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut overviews = Vec::with_capacity(rooms.len());
        for room in rooms {
            let members = Self::members_of(&self.pool, room.id).await?;

            let last_message = sqlx::query_as::<_, MessageRow>(&format!(
                "SELECT {MESSAGE_COLUMNS} \
                 FROM chat_messages cm \
                 JOIN users u ON cm.user_id = u.id \
                 WHERE cm.room_id = $1 \
                 ORDER BY cm.created_at DESC \
                 LIMIT 1"
            ))
            .bind(room.id)
            .fetch_optional(&self.pool)
            .await?;

            overviews.push(RoomOverview {
                room: room.into_payload(members),
                last_message: last_message.map(Into::into),
            });
        }
        Ok(overviews)
    }

    async fn is_member(&self, room_id: i64, user_id: i64) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM chat_rooms_members WHERE room_id = $1 AND user_id = $2)",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_message(
        &self,
        room_id: i64,
        user_id: i64,
        body: &str,
        kind: MessageKind,
    ) -> Result<MessagePayload, StoreError> {
        let mut tx = self.pool.begin().await?;

        let (id, is_read, created_at) = sqlx::query_as::<_, (i64, bool, DateTime<Utc>)>(
            "INSERT INTO chat_messages (room_id, user_id, message, message_type) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, is_read, created_at",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(body)
        .bind(kind.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE chat_rooms SET updated_at = NOW() WHERE id = $1")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;

        let (username, first_name, last_name, avatar_url) =
            sqlx::query_as::<_, (String, Option<String>, Option<String>, Option<String>)>(
                "SELECT username, first_name, last_name, avatar_url FROM users WHERE id = $1",
            )
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(MessagePayload {
            id,
            room_id,
            user_id,
            message: body.to_string(),
            message_type: kind,
            is_read,
            created_at,
            username,
            first_name,
            last_name,
            avatar_url,
        })
    }

    async fn create_or_find_room(
        &self,
        creator_id: i64,
        name: Option<String>,
        is_group: bool,
        member_ids: &[i64],
    ) -> Result<(RoomPayload, bool), StoreError> {
        let mut tx = self.pool.begin().await?;

        let other_member = member_ids.iter().copied().find(|&id| id != creator_id);
        if let Some(existing) =
            Self::find_existing_room(&mut tx, creator_id, name.as_deref(), is_group, other_member)
                .await?
        {
            let members = Self::members_of(&mut *tx, existing.id).await?;
            tx.commit().await?;
            return Ok((existing.into_payload(members), false));
        }

        let room = sqlx::query_as::<_, RoomRow>(
            "INSERT INTO chat_rooms (name, is_group, created_by) \
             VALUES ($1, $2, $3) \
             RETURNING id, name, is_group, created_by, created_at, updated_at",
        )
        .bind(name.as_deref())
        .bind(is_group)
        .bind(creator_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut all_members: BTreeSet<i64> = member_ids.iter().copied().collect();
        all_members.insert(creator_id);
        for member_id in all_members {
            sqlx::query(
                "INSERT INTO chat_rooms_members (room_id, user_id) \
                 VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(room.id)
            .bind(member_id)
            .execute(&mut *tx)
            .await?;
        }

        let members = Self::members_of(&mut *tx, room.id).await?;
        tx.commit().await?;

        Ok((room.into_payload(members), true))
    }

    async fn room_messages(
        &self,
        room_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<MessagePayload>, StoreError> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} \
             FROM chat_messages cm \
             JOIN users u ON cm.user_id = u.id \
             WHERE cm.room_id = $1 \
             ORDER BY cm.created_at ASC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(room_id)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
