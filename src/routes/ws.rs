//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to the quest board. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "homequest_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "homequest_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    let reply = match msg {
      Message::Close(_) => break,
      other => reply_for(other, &state).await,
    };
    let Some(reply) = reply else { continue };

    if let Err(e) = socket.send(reply).await {
      error!(target: "homequest_backend", error = %e, "WS send error");
      break;
    }
  }
  info!(target: "homequest_backend", "WebSocket disconnected");
}

/// Frame to send back for one incoming frame, if any.
pub(crate) async fn reply_for(msg: Message, state: &AppState) -> Option<Message> {
  match msg {
    Message::Text(txt) => {
      let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(incoming) => {
          debug!(target: "homequest_backend", ?incoming, "WS received");
          handle_client_ws(incoming, state).await
        }
        Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
      };

      let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
      });
      Some(Message::Text(out))
    }
    Message::Ping(payload) => Some(Message::Pong(payload)),
    _ => None,
  }
}

#[instrument(level = "info", skip(state))]
pub(crate) async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::GetBoard => ServerWsMessage::Board { board: state.snapshot().await },

    ClientWsMessage::GenerateQuests => {
      let outcome = state.regenerate_quests().await;
      info!(target: "quest", ?outcome, "WS generate handled");
      ServerWsMessage::Generated { outcome, board: state.snapshot().await }
    }

    ClientWsMessage::ToggleComplete { quest_id } => {
      let matched = state.toggle_complete(&quest_id).await;
      info!(target: "quest", id = %quest_id, %matched, "WS toggle handled");
      ServerWsMessage::Board { board: state.snapshot().await }
    }

    ClientWsMessage::DismissAlert => {
      state.dismiss_alert().await;
      ServerWsMessage::Board { board: state.snapshot().await }
    }
  }
}
