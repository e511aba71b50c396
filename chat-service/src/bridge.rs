//! Room lifecycle bridge.
//!
//! The seam between the stateless room-creation flow and the socket layer:
//! after the creation transaction commits, connected members get a direct
//! `new-room` frame on their connection. A channel broadcast would miss
//! them — nobody has subscribed to the new room's channel yet. Best-effort
//! by design: the room is already durable, so delivery failures are only
//! logged.

use chat_proto::{RoomPayload, ServerEvent};
use tracing::{debug, error, info};

use crate::registry::ConnectionRegistry;

pub fn notify_new_room(registry: &ConnectionRegistry, room: &RoomPayload) {
    let event = ServerEvent::NewRoom(room.clone());
    let frame = match serde_json::to_string(&event) {
        Ok(frame) => frame,
        Err(e) => {
            error!(room = room.id, error = %e, "Failed to serialize new-room event");
            return;
        }
    };

    let mut notified = 0usize;
    for member in &room.members {
        if registry.send_to(member.user_id, &frame) {
            notified += 1;
            debug!(
                user_id = member.user_id,
                room = room.id,
                "Notified member of new room"
            );
        } else {
            debug!(
                user_id = member.user_id,
                room = room.id,
                "Member offline, skipping new-room notification"
            );
        }
    }

    info!(
        room = room.id,
        notified,
        members = room.members.len(),
        "New-room notifications dispatched"
    );
}
