//! Adapter module - multiplayer transport via TCP socket with JSON protocol
//!
//! This module hosts one authoritative session and lets several clients play
//! it over a TCP socket. Every decision is made by the engine in
//! `tile-match-core`; the adapter only moves commands in and results out.
//!
//! # Protocol Overview
//!
//! The adapter implements a **line-delimited JSON protocol** over TCP:
//!
//! 1. **Connection**: Client connects to TCP socket (default: 127.0.0.1:7878)
//! 2. **Handshake**: Client sends `hello`, server responds with `welcome`
//! 3. **Seating**: Clients take free player seats in order; the rest observe
//! 4. **State**: After `welcome` the client receives a full `state`
//! 5. **Play**: The active player sends `submit`; everyone receives `move`
//!
//! # Message Types
//!
//! ## Client → Server
//!
//! - **hello**: Initial handshake with client info and requested role
//! - **submit**: A pair of tiles plus the session sequence number it targets
//! - **sync**: Ask for a full `state`
//!
//! ## Server → Client
//!
//! - **welcome**: Response to hello with the assigned role and seat
//! - **state**: Full session snapshot
//! - **move**: An accepted submission, broadcast in sequence order
//! - **ack**: Submission accepted
//! - **error**: Rejection; turn and ordering errors carry `expected_seq` and
//!   `active_player` so the client can resync
//!
//! # Environment Variables
//!
//! - `TILE_MATCH_HOST`: Bind address (default: "127.0.0.1")
//! - `TILE_MATCH_PORT`: Port number (default: 7878)
//! - `TILE_MATCH_PLAYERS`: Player seats, 1 to 8 (default: 2)
//! - `TILE_MATCH_SEED`, `TILE_MATCH_LAYOUT`, `TILE_MATCH_PROFILE`: deal settings
//! - `TILE_MATCH_MAX_PENDING`: Inbound queue bound (default: 16)
//! - `TILE_MATCH_DISABLED`: Set to "1" or "true" to disable the adapter
//!
//! # Example Protocol Flow
//!
//! ```text
//! Client -> Server: {"type":"hello","seq":1,"ts":1234567890,"client":{"name":"ann","version":"0.1.0"},"protocol_version":"1.0.0"}
//! Server -> Client: {"type":"welcome","seq":1,"ts":1234567890,"protocol_version":"1.0.0","client_id":1,"role":"player","player_id":1,"game_id":"tile-match"}
//! Server -> Client: {"type":"state","seq":1,"ts":1234567891,"snapshot":{...}}
//! Client -> Server: {"type":"submit","seq":2,"ts":1234567892,"tile_a":12,"tile_b":40,"move_seq":0}
//! Server -> Client: {"type":"ack","seq":2,"ts":1234567892,"status":"ok","move_seq":0}
//! Server -> Client: {"type":"move","seq":2,"ts":1234567892,"move_seq":0,"player":1,"tile_a":12,"tile_b":40,"result":"matched",...}
//! ```
//!
//! # Implementation
//!
//! - [`server`]: tokio TCP server, handshake and per-connection ordering
//! - [`room`]: the authoritative session loop
//! - [`runtime`]: channels between the two, plus a sync bridge
//! - [`client`]: in-order replica maintenance for clients

pub mod client;
pub mod protocol;
pub mod room;
pub mod runtime;
pub mod server;

pub use tile_match_core as core;
pub use tile_match_types as types;

// Re-export protocol types for convenience
pub use client::{ClientSync, LineTransport, MoveTransport, PendingMove, SyncEvent};
pub use protocol::*;
pub use room::{run_room, Room};
pub use runtime::{Adapter, InboundCommand, InboundPayload, OutboundMessage};
pub use server::*;
