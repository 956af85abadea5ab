//! Protocol module - JSON message types for the multiplayer transport
//!
//! Line-delimited JSON. All messages have: type, seq (per-sender message
//! sequence), ts (timestamp in ms). Moves additionally carry `move_seq`, the
//! session's turn sequence number, which is what ordering is enforced on.

use serde::{Deserialize, Serialize};

use crate::core::{GameSession, MatchOutcome, SessionError, SessionSnapshot};
use crate::types::{Phase, PlayerId, TileId};

/// Protocol version spoken by this adapter; clients must match the major part
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Identifier sent in `welcome`
pub const GAME_ID: &str = "tile-match";

// ============== Client -> Server Messages ==============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HelloType {
    #[serde(rename = "hello")]
    Hello,
}

impl Default for HelloType {
    fn default() -> Self {
        Self::Hello
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmitType {
    #[serde(rename = "submit")]
    Submit,
}

impl Default for SubmitType {
    fn default() -> Self {
        Self::Submit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncType {
    #[serde(rename = "sync")]
    Sync,
}

impl Default for SyncType {
    fn default() -> Self {
        Self::Sync
    }
}

/// Client hello message (first message on a connection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloMessage {
    #[serde(rename = "type")]
    #[serde(default)]
    pub msg_type: HelloType,
    pub seq: u64,
    pub ts: u64,
    pub client: ClientInfo,
    pub protocol_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RequestedRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Seat request. `Auto` takes a free seat if there is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestedRole {
    Auto,
    Player,
    Observer,
}

impl<'de> Deserialize<'de> for RequestedRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <&str>::deserialize(deserializer)?;
        if s.eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else if s.eq_ignore_ascii_case("player") {
            Ok(Self::Player)
        } else if s.eq_ignore_ascii_case("observer") {
            Ok(Self::Observer)
        } else {
            Err(serde::de::Error::custom("invalid requested role"))
        }
    }
}

impl Serialize for RequestedRole {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            RequestedRole::Auto => serializer.serialize_str("auto"),
            RequestedRole::Player => serializer.serialize_str("player"),
            RequestedRole::Observer => serializer.serialize_str("observer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignedRole {
    #[serde(rename = "player")]
    Player,
    #[serde(rename = "observer")]
    Observer,
}

/// Move submission (players only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitMessage {
    #[serde(rename = "type")]
    #[serde(default)]
    pub msg_type: SubmitType,
    pub seq: u64,
    pub ts: u64,
    pub tile_a: TileId,
    pub tile_b: TileId,
    /// Session sequence number the client believes comes next
    pub move_seq: u64,
}

/// Request for a full `state` message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(rename = "type")]
    #[serde(default)]
    pub msg_type: SyncType,
    pub seq: u64,
    pub ts: u64,
}

// ============== Server -> Client Messages ==============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WelcomeType {
    #[serde(rename = "welcome")]
    Welcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckType {
    #[serde(rename = "ack")]
    Ack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckStatus {
    #[serde(rename = "ok")]
    Ok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    #[serde(rename = "error")]
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveType {
    #[serde(rename = "move")]
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateType {
    #[serde(rename = "state")]
    State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "handshake_required")]
    HandshakeRequired,
    #[serde(rename = "protocol_mismatch")]
    ProtocolMismatch,
    #[serde(rename = "not_a_player")]
    NotAPlayer,
    #[serde(rename = "not_your_turn")]
    NotYourTurn,
    #[serde(rename = "stale_move")]
    StaleMove,
    #[serde(rename = "invalid_selection")]
    InvalidSelection,
    #[serde(rename = "session_over")]
    SessionOver,
    #[serde(rename = "invalid_command")]
    InvalidCommand,
    #[serde(rename = "backpressure")]
    Backpressure,
}

/// Welcome message (response to hello)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeMessage {
    #[serde(rename = "type")]
    pub msg_type: WelcomeType,
    pub seq: u64,
    pub ts: u64,
    pub protocol_version: String,
    pub client_id: u64,
    pub role: AssignedRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    pub game_id: String,
}

/// Acknowledgment of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckMessage {
    #[serde(rename = "type")]
    pub msg_type: AckType,
    pub seq: u64,
    pub ts: u64,
    pub status: AckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_seq: Option<u64>,
}

/// Error message; ordering rejections carry what the client needs to resync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    #[serde(rename = "type")]
    pub msg_type: ErrorType,
    pub seq: u64,
    pub ts: u64,
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_player: Option<PlayerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveResult {
    Matched,
    NoMatch,
}

/// An applied move, broadcast to every client in `move_seq` order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveMessage {
    #[serde(rename = "type")]
    pub msg_type: MoveType,
    pub seq: u64,
    pub ts: u64,
    pub move_seq: u64,
    pub player: PlayerId,
    pub tile_a: TileId,
    pub tile_b: TileId,
    pub result: MoveResult,
    pub score_delta: u32,
    /// Session clock when the move was applied
    pub elapsed_ms: u64,
    pub phase: Phase,
    pub next_seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_player: Option<PlayerId>,
}

/// Full authoritative session state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMessage {
    #[serde(rename = "type")]
    pub msg_type: StateType,
    pub seq: u64,
    pub ts: u64,
    pub snapshot: SessionSnapshot,
}

// ============== Message Parsing ==============

/// Parse a JSON message from a string
pub fn parse_message(json: &str) -> Result<ParsedMessage, serde_json::Error> {
    #[derive(Debug, Deserialize)]
    #[serde(tag = "type")]
    enum InboundMessage {
        #[serde(rename = "hello")]
        Hello(HelloMessage),
        #[serde(rename = "submit")]
        Submit(SubmitMessage),
        #[serde(rename = "sync")]
        Sync(SyncMessage),
    }

    match serde_json::from_str::<InboundMessage>(json) {
        Ok(InboundMessage::Hello(m)) => Ok(ParsedMessage::Hello(m)),
        Ok(InboundMessage::Submit(m)) => Ok(ParsedMessage::Submit(m)),
        Ok(InboundMessage::Sync(m)) => Ok(ParsedMessage::Sync(m)),
        Err(e) => {
            // Unknown message type is not a hard parse error for the protocol.
            #[derive(Debug, Deserialize)]
            struct TypeOnly<'a> {
                #[serde(rename = "type")]
                msg_type: Option<&'a str>,
            }
            let msg_type = serde_json::from_str::<TypeOnly>(json)?
                .msg_type
                .unwrap_or("unknown");
            if !matches!(msg_type, "hello" | "submit" | "sync") {
                #[derive(Debug, Deserialize)]
                struct SeqOnly {
                    seq: Option<u64>,
                }
                let seq = serde_json::from_str::<SeqOnly>(json)?.seq.unwrap_or(0);
                return Ok(ParsedMessage::Unknown(UnknownMessage { seq }));
            }
            Err(e)
        }
    }
}

/// Parsed incoming message
#[derive(Debug, Clone)]
pub enum ParsedMessage {
    Hello(HelloMessage),
    Submit(SubmitMessage),
    Sync(SyncMessage),
    Unknown(UnknownMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMessage {
    pub seq: u64,
}

/// Any message the server may send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Welcome(WelcomeMessage),
    Ack(AckMessage),
    Error(ErrorMessage),
    Move(MoveMessage),
    State(Box<StateMessage>),
}

/// Parse a server line, as a client would
pub fn parse_server_message(json: &str) -> Result<ServerMessage, serde_json::Error> {
    #[derive(Debug, Deserialize)]
    struct TypeOnly<'a> {
        #[serde(rename = "type")]
        msg_type: &'a str,
    }

    Ok(match serde_json::from_str::<TypeOnly>(json)?.msg_type {
        "welcome" => ServerMessage::Welcome(serde_json::from_str(json)?),
        "ack" => ServerMessage::Ack(serde_json::from_str(json)?),
        "error" => ServerMessage::Error(serde_json::from_str(json)?),
        "move" => ServerMessage::Move(serde_json::from_str(json)?),
        // Anything else must at least look like a state message.
        _ => ServerMessage::State(Box::new(serde_json::from_str(json)?)),
    })
}

// ============== Utility Functions ==============

/// Create a hello message
pub fn create_hello(seq: u64, client_name: &str, role: RequestedRole) -> HelloMessage {
    HelloMessage {
        msg_type: HelloType::Hello,
        seq,
        ts: current_timestamp_ms(),
        client: ClientInfo {
            name: client_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        protocol_version: PROTOCOL_VERSION.to_string(),
        role: Some(role),
        name: None,
    }
}

/// Create a move submission
pub fn create_submit(seq: u64, tile_a: TileId, tile_b: TileId, move_seq: u64) -> SubmitMessage {
    SubmitMessage {
        msg_type: SubmitType::Submit,
        seq,
        ts: current_timestamp_ms(),
        tile_a,
        tile_b,
        move_seq,
    }
}

/// Create a sync request
pub fn create_sync(seq: u64) -> SyncMessage {
    SyncMessage {
        msg_type: SyncType::Sync,
        seq,
        ts: current_timestamp_ms(),
    }
}

/// Create a welcome message
pub fn create_welcome(
    seq: u64,
    client_id: u64,
    role: AssignedRole,
    player_id: Option<PlayerId>,
) -> WelcomeMessage {
    WelcomeMessage {
        msg_type: WelcomeType::Welcome,
        seq,
        ts: current_timestamp_ms(),
        protocol_version: PROTOCOL_VERSION.to_string(),
        client_id,
        role,
        player_id,
        game_id: GAME_ID.to_string(),
    }
}

/// Create an acknowledgment
pub fn create_ack(seq: u64, move_seq: Option<u64>) -> AckMessage {
    AckMessage {
        msg_type: AckType::Ack,
        seq,
        ts: current_timestamp_ms(),
        status: AckStatus::Ok,
        move_seq,
    }
}

/// Create an error message
pub fn create_error(seq: u64, code: ErrorCode, message: &str) -> ErrorMessage {
    ErrorMessage {
        msg_type: ErrorType::Error,
        seq,
        ts: current_timestamp_ms(),
        code,
        message: message.to_string(),
        expected_seq: None,
        active_player: None,
    }
}

/// Map an engine rejection to a wire error, attaching resync hints
pub fn error_from_session(
    seq: u64,
    err: &SessionError,
    expected_seq: u64,
    active_player: Option<PlayerId>,
) -> ErrorMessage {
    let code = match err {
        SessionError::NotYourTurn { .. } => ErrorCode::NotYourTurn,
        SessionError::StaleMove { .. } => ErrorCode::StaleMove,
        SessionError::InvalidSelection { .. } => ErrorCode::InvalidSelection,
        SessionError::SessionEnded | SessionError::InvalidPhase { .. } => ErrorCode::SessionOver,
        _ => ErrorCode::InvalidCommand,
    };
    ErrorMessage {
        expected_seq: Some(expected_seq),
        active_player,
        ..create_error(seq, code, &err.to_string())
    }
}

/// Create the broadcast for an accepted submission
///
/// `session` must already have applied the move.
pub fn create_move(
    seq: u64,
    move_seq: u64,
    player: PlayerId,
    tiles: (TileId, TileId),
    outcome: &MatchOutcome,
    session: &GameSession,
) -> MoveMessage {
    let (result, score_delta) = match outcome {
        MatchOutcome::Matched(mv) => (MoveResult::Matched, mv.score_delta),
        MatchOutcome::NoMatch => (MoveResult::NoMatch, 0),
    };
    MoveMessage {
        msg_type: MoveType::Move,
        seq,
        ts: current_timestamp_ms(),
        move_seq,
        player,
        tile_a: tiles.0,
        tile_b: tiles.1,
        result,
        score_delta,
        elapsed_ms: session.elapsed_ms(),
        phase: session.phase(),
        next_seq: session.next_sequence(),
        active_player: session.active_player(),
    }
}

/// Create a full state message
pub fn create_state(seq: u64, snapshot: SessionSnapshot) -> StateMessage {
    StateMessage {
        msg_type: StateType::State,
        seq,
        ts: current_timestamp_ms(),
        snapshot,
    }
}

/// Get current timestamp in milliseconds
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
