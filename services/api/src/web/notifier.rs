//! services/api/src/web/notifier.rs
//!
//! Registry of live WebSocket connections, keyed by user. It is the
//! `NotificationPublisher` the activity chain pushes through.

use doubtstack_core::domain::LiveNotification;
use doubtstack_core::ports::NotificationPublisher;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::web::protocol::ServerMessage;
use crate::web::views::{AnswerRefView, DoubtRefView, NotificationView, SenderView};

pub type ConnectionSender = mpsc::UnboundedSender<ServerMessage>;

/// Identifies one registered connection so it can be removed on close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionId {
    pub user_id: Uuid,
    id: u64,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: Mutex<HashMap<Uuid, Vec<(u64, ConnectionSender)>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: Uuid, sender: ConnectionSender) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut connections = self.lock();
        connections.entry(user_id).or_default().push((id, sender));
        debug!(user_id = %user_id, connection = id, "Connection registered");
        ConnectionId { user_id, id }
    }

    pub fn unregister(&self, connection: ConnectionId) {
        let mut connections = self.lock();
        if let Some(senders) = connections.get_mut(&connection.user_id) {
            senders.retain(|(id, _)| *id != connection.id);
            if senders.is_empty() {
                connections.remove(&connection.user_id);
            }
        }
        debug!(user_id = %connection.user_id, connection = connection.id, "Connection removed");
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.lock().contains_key(&user_id)
    }

    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.lock().get(&user_id).map_or(0, Vec::len)
    }

    /// Sends to every connection of `user_id`, pruning closed ones.
    /// Returns how many connections accepted the message.
    pub fn send_to(&self, user_id: Uuid, message: &ServerMessage) -> usize {
        let mut connections = self.lock();
        let Some(senders) = connections.get_mut(&user_id) else {
            return 0;
        };
        senders.retain(|(_, sender)| sender.send(message.clone()).is_ok());
        let delivered = senders.len();
        if delivered == 0 {
            connections.remove(&user_id);
        }
        delivered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Vec<(u64, ConnectionSender)>>> {
        // A poisoned registry still holds valid senders.
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl NotificationPublisher for ConnectionRegistry {
    fn publish(&self, recipient: Uuid, live: &LiveNotification) -> bool {
        let message = ServerMessage::Notification {
            notification: NotificationView::live(live),
            sender: SenderView::from(&live.sender),
            doubt: live.doubt.as_ref().map(DoubtRefView::from),
            answer: live.answer_id.map(|id| AnswerRefView { id, content: None }),
        };
        let delivered = self.send_to(recipient, &message);
        debug!(recipient = %recipient, connections = delivered, "Live notification pushed");
        delivered > 0
    }
}
