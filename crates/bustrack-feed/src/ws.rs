//! `WebSocket` channels for live vehicle updates.
//!
//! Two channels are served:
//!
//! - `GET /ws/buses/` covers the whole fleet. It answers `get_buses` with a
//!   `buses_update`.
//! - `GET /ws/route/{id}/` is scoped to one route. It answers
//!   `get_route_buses` with a `route_buses_update` and only forwards
//!   location updates for buses on that route.
//!
//! Both send an `initial_data` snapshot as soon as the socket opens and
//! forward every matching location update from the broadcast channel. If a
//! client falls behind, lagged updates are skipped.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use bustrack_types::{ClientMessage, FeedMessage, RouteId};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::error::FeedError;
use crate::state::FeedState;

/// Upgrade to the fleet-wide channel.
///
/// # Route
///
/// `GET /ws/buses/`
pub async fn ws_buses(
    ws: WebSocketUpgrade,
    State(state): State<Arc<FeedState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state, None))
}

/// Upgrade to a route-scoped channel.
///
/// # Route
///
/// `GET /ws/route/{id}/`
pub async fn ws_route(
    ws: WebSocketUpgrade,
    State(state): State<Arc<FeedState>>,
    Path(id): Path<String>,
) -> Response {
    let Ok(route) = id.trim().parse::<RouteId>() else {
        return FeedError::NotFound(format!("route {id}")).into_response();
    };
    ws.on_upgrade(move |socket| handle_ws(socket, state, Some(route)))
        .into_response()
}

/// The snapshot message for a channel, either on open or on request.
async fn snapshot(state: &FeedState, scope: Option<RouteId>, initial: bool) -> FeedMessage {
    let buses = state.fleet.read().await.vehicles(scope);
    match (initial, scope) {
        (true, route_id) => FeedMessage::InitialData { buses, route_id },
        (false, None) => FeedMessage::BusesUpdate { buses },
        (false, Some(route_id)) => FeedMessage::RouteBusesUpdate { route_id, buses },
    }
}

/// Whether a client request is answered on this channel.
const fn answers(request: ClientMessage, scope: Option<RouteId>) -> bool {
    matches!(
        (request, scope),
        (ClientMessage::GetBuses, None) | (ClientMessage::GetRouteBuses, Some(_))
    )
}

async fn send(socket: &mut WebSocket, message: &FeedMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize feed message: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Drive one channel: initial snapshot, then requests and broadcasts until
/// either side goes away.
async fn handle_ws(mut socket: WebSocket, state: Arc<FeedState>, scope: Option<RouteId>) {
    debug!(route = ?scope, "WebSocket client connected");

    let mut rx = state.subscribe();

    if !send(&mut socket, &snapshot(&state, scope, true).await).await {
        debug!("WebSocket client disconnected before initial data");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(update) => {
                        if scope.is_some_and(|route| update.route_id != Some(route)) {
                            continue;
                        }
                        let message = FeedMessage::LocationUpdate {
                            bus_id: update.bus_id,
                            location: update.location,
                        };
                        if !send(&mut socket, &message).await {
                            debug!("WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(request) if answers(request, scope) => {
                                let reply = snapshot(&state, scope, false).await;
                                if !send(&mut socket, &reply).await {
                                    debug!("WebSocket client disconnected (send failed)");
                                    return;
                                }
                            }
                            Ok(request) => {
                                debug!(?request, route = ?scope, "Request not served on this channel");
                            }
                            Err(e) => {
                                debug!(error = %e, "Ignoring unrecognised client frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket receive error: {e}");
                        return;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
