//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::state::{BoardView, RegenerateOutcome};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetBoard,
    GenerateQuests,
    ToggleComplete {
        #[serde(rename = "questId")]
        quest_id: String,
    },
    DismissAlert,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Board {
        board: BoardView,
    },
    Generated {
        outcome: RegenerateOutcome,
        board: BoardView,
    },
    Error {
        message: String,
    },
}

//
// HTTP response DTOs
//

#[derive(Serialize)]
pub struct GenerateOut {
    pub outcome: RegenerateOutcome,
    pub board: BoardView,
}

#[derive(Serialize)]
pub struct ToggleOut {
    pub matched: bool,
    pub board: BoardView,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
