use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use fushub_types::events::ChangeEvent;

/// Fans change events out to connected clients.
///
/// Public events go through one broadcast channel that every connection reads;
/// each connection filters by visibility and its own subscriptions. Events meant
/// for a single user go through that user's targeted channels, one per open
/// connection, so a user signed in on two devices gets both.
///
/// Every connection also records the session it was opened with, so signing
/// out can close exactly the sockets that session opened.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<ChangeEvent>,

    /// user_id -> (conn_id -> connection)
    user_channels: RwLock<HashMap<Uuid, HashMap<Uuid, UserChannel>>>,
}

struct UserChannel {
    tx: mpsc::UnboundedSender<ChangeEvent>,
    session_id: Uuid,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish to every connection. Dropped silently when nobody is connected.
    pub fn broadcast(&self, event: ChangeEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a targeted channel for one connection. Returns (conn_id, receiver).
    /// `cancel` is fired when the connection's session is revoked.
    pub async fn register_user_channel(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        cancel: CancellationToken,
    ) -> (Uuid, mpsc::UnboundedReceiver<ChangeEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(
                conn_id,
                UserChannel {
                    tx,
                    session_id,
                    cancel,
                },
            );
        (conn_id, rx)
    }

    /// Cancel every connection opened with `session_id`. Returns how many were closed.
    /// The connections unregister themselves as they wind down.
    pub async fn revoke_session(&self, session_id: Uuid) -> usize {
        let channels = self.inner.user_channels.read().await;
        let mut closed = 0;
        for conn in channels.values().flat_map(HashMap::values) {
            if conn.session_id == session_id {
                conn.cancel.cancel();
                closed += 1;
            }
        }
        if closed > 0 {
            info!("Closing {} realtime connection(s) of session {}", closed, session_id);
        }
        closed
    }

    /// Drop one connection's channel. The user's other connections stay registered.
    pub async fn unregister_user_channel(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some(conns) = channels.get_mut(&user_id) {
            conns.remove(&conn_id);
            if conns.is_empty() {
                channels.remove(&user_id);
            }
        }
    }

    /// Send an event to every open connection of one user.
    pub async fn send_to_user(&self, user_id: Uuid, event: ChangeEvent) {
        let channels = self.inner.user_channels.read().await;
        let Some(conns) = channels.get(&user_id) else {
            debug!("{} has no open connection, dropping targeted event", user_id);
            return;
        };
        for conn in conns.values() {
            let _ = conn.tx.send(event.clone());
        }
    }

    pub async fn is_connected(&self, user_id: Uuid) -> bool {
        self.inner.user_channels.read().await.contains_key(&user_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner
            .user_channels
            .read()
            .await
            .values()
            .map(HashMap::len)
            .sum()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fushub_types::events::ListingChange;

    fn listing_event() -> ChangeEvent {
        ChangeEvent::ListingChanged {
            listing_id: Uuid::new_v4(),
            change: ListingChange::Updated,
        }
    }

    async fn register(
        dispatcher: &Dispatcher,
        user: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<ChangeEvent>) {
        dispatcher
            .register_user_channel(user, Uuid::new_v4(), CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn targeted_events_reach_every_connection_of_the_user() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (_, mut phone) = register(&dispatcher, user).await;
        let (_, mut laptop) = register(&dispatcher, user).await;
        let (_, mut other) = register(&dispatcher, Uuid::new_v4()).await;

        dispatcher.send_to_user(user, listing_event()).await;

        assert!(phone.try_recv().is_ok());
        assert!(laptop.try_recv().is_ok());
        assert!(other.try_recv().is_err());
        assert_eq!(dispatcher.connection_count().await, 3);
    }

    #[tokio::test]
    async fn unregister_keeps_sibling_connections() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (first, _rx1) = register(&dispatcher, user).await;
        let (second, mut rx2) = register(&dispatcher, user).await;

        dispatcher.unregister_user_channel(user, first).await;
        assert!(dispatcher.is_connected(user).await);
        dispatcher.send_to_user(user, listing_event()).await;
        assert!(rx2.try_recv().is_ok());

        dispatcher.unregister_user_channel(user, second).await;
        assert!(!dispatcher.is_connected(user).await);
        assert_eq!(dispatcher.connection_count().await, 0);
    }

    #[tokio::test]
    async fn revoking_a_session_cancels_only_its_connections() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (phone_session, laptop_session) = (Uuid::new_v4(), Uuid::new_v4());
        let (phone, laptop) = (CancellationToken::new(), CancellationToken::new());
        dispatcher
            .register_user_channel(user, phone_session, phone.clone())
            .await;
        dispatcher
            .register_user_channel(user, laptop_session, laptop.clone())
            .await;

        assert_eq!(dispatcher.revoke_session(phone_session).await, 1);
        assert!(phone.is_cancelled());
        assert!(!laptop.is_cancelled());
        assert_eq!(dispatcher.revoke_session(Uuid::new_v4()).await, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut a = dispatcher.subscribe();
        let mut b = dispatcher.subscribe();

        dispatcher.broadcast(listing_event());

        assert!(matches!(a.recv().await, Ok(ChangeEvent::ListingChanged { .. })));
        assert!(matches!(b.recv().await, Ok(ChangeEvent::ListingChanged { .. })));
    }
}
