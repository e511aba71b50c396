//! Per-room broadcast channels.
//!
//! Each room gets a `tokio::broadcast` channel created on first subscribe;
//! the channel key is derived from the numeric room id. Frames carry an
//! optional excluded connection so presence relays can skip their origin
//! while message broadcasts reach everyone, sender included.

use std::sync::Arc;

use chat_proto::ServerEvent;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::connection::ConnectionId;

/// Broadcast channel capacity per room.
/// Receivers that fall behind skip frames (RecvError::Lagged).
pub const CHANNEL_CAPACITY: usize = 256;

/// One fan-out frame: pre-serialized event plus the connection to skip, if
/// any.
#[derive(Debug, Clone)]
pub struct RoomFrame {
    pub exclude: Option<ConnectionId>,
    pub json: Arc<str>,
}

#[derive(Default)]
pub struct RoomChannels {
    channels: DashMap<i64, broadcast::Sender<RoomFrame>>,
}

impl RoomChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a room's channel, creating it on first use.
    pub fn subscribe(&self, room_id: i64) -> broadcast::Receiver<RoomFrame> {
        self.channels
            .entry(room_id)
            .or_insert_with(|| {
                tracing::debug!(room = room_id, "Creating room broadcast channel");
                broadcast::channel(CHANNEL_CAPACITY).0
            })
            .subscribe()
    }

    /// Publish to every subscriber, the originating connection included.
    /// Returns the number of receivers the frame reached.
    pub fn publish(&self, room_id: i64, event: &ServerEvent) -> usize {
        self.send_frame(room_id, None, event)
    }

    /// Publish to every subscriber except `origin`.
    pub fn publish_except(&self, room_id: i64, origin: &str, event: &ServerEvent) -> usize {
        self.send_frame(room_id, Some(origin.to_string()), event)
    }

    fn send_frame(&self, room_id: i64, exclude: Option<ConnectionId>, event: &ServerEvent) -> usize {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(room = room_id, error = %e, "Failed to serialize event");
                return 0;
            }
        };
        let Some(sender) = self.channels.get(&room_id) else {
            // Nobody subscribed yet; nothing to deliver.
            return 0;
        };
        sender
            .send(RoomFrame {
                exclude,
                json: json.into(),
            })
            .unwrap_or(0)
    }

    /// Drop the room's channel if no subscriber remains.
    pub fn drop_if_idle(&self, room_id: i64) {
        let removed = self
            .channels
            .remove_if(&room_id, |_, sender| sender.receiver_count() == 0);
        if removed.is_some() {
            tracing::debug!(room = room_id, "Room channel removed (no subscribers)");
        }
    }

    /// Sweep all channels with no subscribers. Called after disconnects.
    pub fn sweep_idle(&self) {
        self.channels
            .retain(|_, sender| sender.receiver_count() > 0);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let channels = RoomChannels::new();
        let mut rx_a = channels.subscribe(1);
        let mut rx_b = channels.subscribe(1);

        let reached = channels.publish(1, &ServerEvent::error("boom"));
        assert_eq!(reached, 2);

        let frame = rx_a.recv().await.unwrap();
        assert!(frame.exclude.is_none());
        assert!(frame.json.contains("boom"));
        assert!(rx_b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn publish_except_tags_the_origin() {
        let channels = RoomChannels::new();
        let mut rx = channels.subscribe(1);

        channels.publish_except(1, "conn_a", &ServerEvent::error("typing"));

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.exclude.as_deref(), Some("conn_a"));
    }

    #[tokio::test]
    async fn publish_without_subscribers_reaches_nobody() {
        let channels = RoomChannels::new();
        assert_eq!(channels.publish(99, &ServerEvent::error("void")), 0);
    }

    #[tokio::test]
    async fn idle_channels_are_swept() {
        let channels = RoomChannels::new();
        let rx = channels.subscribe(1);
        let _held = channels.subscribe(2);
        assert_eq!(channels.len(), 2);

        drop(rx);
        channels.sweep_idle();
        assert_eq!(channels.len(), 1);

        channels.drop_if_idle(2);
        assert_eq!(channels.len(), 1);
    }
}
