//! WebSocket push channel: accepts export commands and streams notifications.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::AppState;
use crate::export::{ClientCommand, ExportReporter, Exporter, ServerMessage};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    if !state.is_origin_allowed(origin) {
        warn!(origin = origin.unwrap_or_default(), "WebSocket connection denied");
        return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    }

    info!("WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state.exporter))
}

async fn handle_socket(mut socket: WebSocket, exporter: Exporter) {
    info!("WebSocket client connected");

    let hello = ServerMessage::Connected {
        message: "Connected to Websocket [Backend]".to_string(),
    };
    if send_json(&mut socket, &hello).await.is_err() {
        warn!("Failed to send greeting, client disconnected");
        return;
    }

    // Every export spawned from this connection reports through `reporter`
    // and stops when `connection` is cancelled.
    let (reporter, mut outgoing) = ExportReporter::channel();
    let connection = CancellationToken::new();

    loop {
        tokio::select! {
            Some(msg) = outgoing.recv() => {
                if send_json(&mut socket, &msg).await.is_err() {
                    debug!("Client disconnected during send");
                    break;
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, &exporter, &reporter, &connection);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    connection.cancel();
    info!("WebSocket connection closed");
}

fn handle_client_message(
    text: &str,
    exporter: &Exporter,
    reporter: &ExportReporter,
    connection: &CancellationToken,
) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::Export(request)) => {
            info!(
                channel_id = %request.channel_id,
                max_messages = ?request.max_messages,
                "Export requested"
            );
            exporter.spawn(request, reporter.clone(), connection.child_token());
        }
        Err(e) => {
            debug!(error = %e, "Unrecognized WS message from client");
        }
    }
}

async fn send_json(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!(error = %e, "Failed to serialize server message");
            Ok(())
        }
    }
}
