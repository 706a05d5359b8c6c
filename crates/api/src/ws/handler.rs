use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use researcher_core::types::DbId;
use researcher_events::{NotificationHub, Subscription};

use crate::error::AppResult;
use crate::state::AppState;
use crate::ws::heartbeat::{heartbeat, HEARTBEAT_INTERVAL};

/// GET /ws/{analysis_id}
///
/// Rejects unknown analyses with 404 before upgrading. After the upgrade
/// the connection is subscribed to the hub for that analysis.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(analysis_id): Path<DbId>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    state.orchestrator.get(analysis_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, analysis_id, state.hub)))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket, then:
///   1. Subscribes to the hub for `job_id`.
///   2. Spawns a sender task that forwards hub events as text frames and
///      sends heartbeat pings.
///   3. Drains inbound frames on the current task until the client closes
///      or the hub ends the subscription.
///   4. Unsubscribes.
async fn handle_socket(socket: WebSocket, job_id: DbId, hub: Arc<NotificationHub>) {
    let Subscription { handle, mut events } = hub.subscribe(job_id).await;
    let subscriber_id = handle.subscriber_id;
    tracing::info!(job_id, subscriber_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        let mut ticker = heartbeat(HEARTBEAT_INTERVAL);
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        // Hub dropped the sink: pruned or shutting down.
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    };
                    if sink.send(Message::Text(event.to_json().into())).await.is_err() {
                        tracing::debug!(job_id, subscriber_id, "WebSocket sink closed");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(job_id, subscriber_id, "Pong received");
                }
                // Clients have nothing to send; other frames are ignored.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(job_id, subscriber_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }

    hub.unsubscribe(&handle).await;
    send_task.abort();
    tracing::info!(job_id, subscriber_id, "WebSocket disconnected");
}
