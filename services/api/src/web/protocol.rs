//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol of the live notification channel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::web::views::{AnswerRefView, DoubtRefView, NotificationView, SenderView};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keep-alive; answered with `Pong`.
    Ping,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Confirms the connection is registered for the authenticated user.
    Registered { user_id: Uuid },

    /// A notification that was just stored for this user.
    Notification {
        notification: NotificationView,
        sender: SenderView,
        doubt: Option<DoubtRefView>,
        answer: Option<AnswerRefView>,
    },

    Pong,

    /// Reports a problem with a message the client sent.
    Error { message: String },
}
