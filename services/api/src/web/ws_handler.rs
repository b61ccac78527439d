//! services/api/src/web/ws_handler.rs
//!
//! This is the entry point and control loop for an order countdown WebSocket.
//! It observes the countdown, starts the timer task and relays its ticks until
//! the countdown expires, the customer pauses it, or the socket goes away.

use crate::error::{port_to_http, HttpError};
use crate::web::{
    countdown_task::{start_countdown, CountdownEvent},
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::Response,
    Extension,
};
use chrono::Utc;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use vidmart_core::countdown::format_remaining;
use vidmart_core::ports::OrderRepository;
use vidmart_core::{CountdownPhase, Order, OrderCountdown, OrderTracking};

/// The handler for upgrading HTTP requests to countdown WebSocket connections.
///
/// The order is loaded and its owner checked before the upgrade, so a wrong
/// id is answered with a plain HTTP error.
pub async fn countdown_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, HttpError> {
    let order = app_state
        .backend
        .find_order(order_id)
        .await
        .map_err(port_to_http)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Order {} not found", order_id)))?;

    if order.user_id != user_id {
        warn!("Order {} does not belong to user {}", order_id, user_id);
        return Err((StatusCode::FORBIDDEN, "Forbidden".to_string()));
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id, order)))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid, order: Order) {
    info!("Countdown WebSocket opened for order {} (user {})", order.id, user_id);

    let (mut sender, mut receiver) = socket.split();
    let session = app_state.sessions.session(user_id).await;

    // --- 1. Observe the countdown, resuming a paused one ---
    let countdown = {
        let mut session = session.lock().await;
        OrderCountdown::observe(order.id, order.created_at, &mut session.flags, Utc::now())
    };

    let CountdownPhase::Running { remaining_secs } = countdown.phase() else {
        let _ = send_message(&mut sender, &expired_message(order.id)).await;
        let _ = sender.send(Message::Close(None)).await;
        return;
    };
    let started = ServerMessage::CountdownStarted {
        order_id: order.id,
        remaining_secs,
        display: format_remaining(remaining_secs),
    };
    if !send_message(&mut sender, &started).await {
        return;
    }

    // --- 2. Relay ticks and client messages ---
    let mut timer = start_countdown(countdown, session.clone());

    loop {
        tokio::select! {
            event = timer.next_event() => match event {
                Some(CountdownEvent::Tick { remaining_secs }) => {
                    let tick = ServerMessage::Tick {
                        remaining_secs,
                        display: format_remaining(remaining_secs),
                    };
                    if !send_message(&mut sender, &tick).await {
                        break;
                    }
                }
                Some(CountdownEvent::Expired) | None => {
                    let _ = send_message(&mut sender, &expired_message(order.id)).await;
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::AddMoreItems) => {
                        info!("AddMoreItems received for order {}. Pausing countdown.", order.id);
                        let Some(mut countdown) = timer.stop().await else {
                            let _ = send_message(&mut sender, &ServerMessage::Error {
                                message: "Failed to pause the countdown.".to_string(),
                            }).await;
                            return;
                        };
                        let paused = {
                            let mut session = session.lock().await;
                            countdown.pause(&mut session.flags)
                        };
                        let reply = match paused {
                            Some(remaining_secs) => ServerMessage::Paused { order_id: order.id, remaining_secs },
                            None => expired_message(order.id),
                        };
                        let _ = send_message(&mut sender, &reply).await;
                        let _ = sender.send(Message::Close(None)).await;
                        info!("WebSocket connection closed.");
                        return;
                    }
                    Err(e) => {
                        warn!("Failed to deserialize client message: {}", e);
                    }
                },
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            },
        }
    }

    // --- 3. Cleanup ---
    // Dropping the handle cancels the timer task.
    drop(timer);
    info!("WebSocket connection closed.");
}

fn expired_message(order_id: Uuid) -> ServerMessage {
    let tracking = OrderTracking::for_order(order_id);
    ServerMessage::Expired {
        order_id,
        tracking_reference: tracking.reference,
        eta_minutes: tracking.eta_minutes,
    }
}

/// Serializes and sends one message. Returns `false` once the socket is gone.
async fn send_message(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return false;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}
