use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fushub_types::events::{ChangeEvent, RealtimeCommand};

use crate::dispatcher::Dispatcher;
use crate::subscriptions::Subscriptions;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive one pre-authenticated WebSocket connection until the client leaves,
/// the heartbeat times out, `session_id` is revoked, or `shutdown` is cancelled.
/// The token was validated at the HTTP upgrade, so the socket starts with Ready.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    user_id: Uuid,
    session_id: Uuid,
    shutdown: CancellationToken,
) {
    let (mut sender, receiver) = socket.split();

    if !send_event(&mut sender, &ChangeEvent::Ready { user_id }).await {
        return;
    }

    run_connection_loop(
        sender,
        receiver,
        dispatcher,
        user_id,
        session_id,
        shutdown.child_token(),
    )
    .await;
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    user_id: Uuid,
    session_id: Uuid,
    cancel: CancellationToken,
) {
    let mut broadcast_rx = dispatcher.subscribe();
    let (conn_id, mut user_rx) = dispatcher
        .register_user_channel(user_id, session_id, cancel.clone())
        .await;
    info!(
        "{} connected to realtime ({} open)",
        user_id,
        dispatcher.connection_count().await
    );

    // Shared between the send and recv tasks
    let subscriptions = Arc::new(RwLock::new(Subscriptions::default()));
    let send_subscriptions = subscriptions.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let send_cancel = cancel.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                _ = send_cancel.cancelled() => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("{} broadcast receiver lagged by {} events", user_id, n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if !event.visible_to(user_id) || !send_subscriptions.read().await.wants(&event) {
                        continue;
                    }
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let Some(event) = result else { break };

                    if !send_subscriptions.read().await.wants(&event) {
                        continue;
                    }
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("{} heartbeat timeout (missed {} pongs), dropping connection", user_id, missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_subscriptions = subscriptions.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<RealtimeCommand>(&text) {
                    Ok(cmd) => {
                        debug!("{} realtime command: {:?}", user_id, cmd);
                        let mut subscriptions = recv_subscriptions.write().await;
                        subscriptions.apply(cmd);
                        if subscriptions.is_empty() {
                            debug!("{} has no subscriptions left", user_id);
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{} bad realtime command: {} -- raw: {}",
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    cancel.cancel();
    dispatcher.unregister_user_channel(user_id, conn_id).await;
    info!(
        "{} disconnected from realtime ({} open)",
        user_id,
        dispatcher.connection_count().await
    );
}

/// Serialize and send one event. Returns `false` once the socket is gone.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &ChangeEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize realtime event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}
