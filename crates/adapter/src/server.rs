//! TCP server for the multiplayer transport
//!
//! Handles incoming connections and manages client lifecycle. The server owns
//! connection concerns only: handshake, per-connection message ordering and
//! seat assignment. Game decisions are made by whoever drains the inbound
//! command channel (see [`crate::room::Room`]).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::core::{LayoutPattern, SessionConfig, TileProfile};
use crate::protocol::*;
use crate::runtime::{InboundCommand, InboundPayload, OutboundMessage};
use crate::types::{PlayerId, MAX_PLAYERS};

fn extract_seq_best_effort(s: &str) -> Option<u64> {
    let start = s.find("\"seq\"")?;
    let after_key = &s[start + 5..];
    let colon = after_key.find(':')?;
    let rest = after_key[colon + 1..].trim_start();
    let end = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
    if end == 0 {
        return None;
    }
    rest[..end].parse::<u64>().ok()
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub protocol_version: String,
    pub max_pending_commands: usize,
    /// Number of player seats; further clients observe
    pub players: u8,
    pub seed: u32,
    pub layout: LayoutPattern,
    /// Profile name; resolved when the session is built
    pub profile: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7878,
            protocol_version: PROTOCOL_VERSION.to_string(),
            max_pending_commands: 16,
            players: 2,
            seed: 1,
            layout: LayoutPattern::default(),
            profile: "standard".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create from `TILE_MATCH_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("TILE_MATCH_HOST").unwrap_or(defaults.host);
        let port = env_parsed("TILE_MATCH_PORT").unwrap_or(defaults.port);
        let max_pending_commands =
            env_parsed("TILE_MATCH_MAX_PENDING").unwrap_or(defaults.max_pending_commands);
        let players = env_parsed("TILE_MATCH_PLAYERS").unwrap_or(defaults.players);
        let seed = env_parsed("TILE_MATCH_SEED").unwrap_or(defaults.seed);

        let layout = match std::env::var("TILE_MATCH_LAYOUT") {
            Ok(name) => LayoutPattern::from_str(&name).unwrap_or_else(|| {
                tracing::warn!(layout = %name, "unknown layout, using default");
                defaults.layout
            }),
            Err(_) => defaults.layout,
        };
        let profile = std::env::var("TILE_MATCH_PROFILE").unwrap_or(defaults.profile);

        Self {
            host,
            port,
            protocol_version: PROTOCOL_VERSION.to_string(),
            max_pending_commands,
            players: players.clamp(1, MAX_PLAYERS),
            seed,
            layout,
            profile,
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid socket address {}:{}", self.host, self.port))
    }

    /// Session configuration for the hosted room
    ///
    /// An unknown profile name falls back to the standard deck.
    pub fn session_config(&self) -> SessionConfig {
        let profile = TileProfile::named(&self.profile).unwrap_or_else(|| {
            tracing::warn!(profile = %self.profile, "unknown profile, using standard");
            TileProfile::default()
        });
        SessionConfig::multiplayer(self.players, self.seed)
            .with_layout(self.layout)
            .with_profile(profile)
    }
}

/// Shared server state
pub struct ServerState {
    config: ServerConfig,
    clients: Arc<RwLock<Vec<ClientHandle>>>,
    /// Seat index -> occupying client
    seats: Arc<RwLock<Vec<Option<u64>>>>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        let seats = vec![None; config.players as usize];
        Self {
            config,
            clients: Arc::new(RwLock::new(Vec::new())),
            seats: Arc::new(RwLock::new(seats)),
        }
    }

    /// Check if the transport is disabled via environment
    pub fn is_disabled() -> bool {
        std::env::var("TILE_MATCH_DISABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    async fn claim_seat(&self, client_id: u64) -> Option<PlayerId> {
        let mut seats = self.seats.write().await;
        let index = seats.iter().position(Option::is_none)?;
        seats[index] = Some(client_id);
        Some(PlayerId(index as u32 + 1))
    }

    async fn release_seat(&self, client_id: u64) -> Option<PlayerId> {
        let mut seats = self.seats.write().await;
        let index = seats.iter().position(|s| *s == Some(client_id))?;
        seats[index] = None;
        Some(PlayerId(index as u32 + 1))
    }
}

async fn is_handshaken(state: &ServerState, client_id: u64) -> bool {
    let clients = state.clients.read().await;
    clients
        .iter()
        .find(|c| c.id == client_id)
        .map(|c| c.handshaken)
        .unwrap_or(false)
}

async fn seat_of(state: &ServerState, client_id: u64) -> Option<PlayerId> {
    let clients = state.clients.read().await;
    clients
        .iter()
        .find(|c| c.id == client_id)
        .and_then(|c| c.player)
}

async fn check_and_update_seq(state: &ServerState, client_id: u64, seq: u64) -> bool {
    let mut clients = state.clients.write().await;
    let Some(client) = clients.iter_mut().find(|c| c.id == client_id) else {
        return true;
    };

    match client.last_seq {
        Some(prev) if seq <= prev => false,
        _ => {
            client.last_seq = Some(seq);
            true
        }
    }
}

/// Handle to a connected client
pub struct ClientHandle {
    pub id: u64,
    pub addr: SocketAddr,
    pub handshaken: bool,
    pub player: Option<PlayerId>,
    pub last_seq: Option<u64>,
    pub tx: mpsc::UnboundedSender<ClientOutbound>,
}

#[derive(Debug)]
pub enum ClientOutbound {
    Welcome(WelcomeMessage),
    Ack(AckMessage),
    Error(ErrorMessage),
    Move(MoveMessage),
    State(Arc<StateMessage>),
    /// Answered once everything queued before it has been written
    Flush(oneshot::Sender<()>),
}

/// Start the TCP server
///
/// `ready_tx` receives the bound address once the listener is up, which lets
/// callers bind port 0.
pub async fn run_server(
    config: ServerConfig,
    command_tx: mpsc::Sender<InboundCommand>,
    mut out_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    ready_tx: Option<oneshot::Sender<SocketAddr>>,
) -> anyhow::Result<()> {
    if ServerState::is_disabled() {
        tracing::info!("transport disabled via TILE_MATCH_DISABLED");
        return Ok(());
    }

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let bound = listener.local_addr()?;
    tracing::info!(%bound, seats = config.players, "tcp server listening");
    if let Some(tx) = ready_tx {
        let _ = tx.send(bound);
    }

    let state = Arc::new(ServerState::new(config));
    let mut client_id_counter = 0u64;

    // Outbound dispatcher.
    let mut dispatcher = {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let clients = state.clients.read().await;
                match msg {
                    OutboundMessage::ToClientAck { client_id, ack } => {
                        if let Some(c) = clients.iter().find(|c| c.id == client_id) {
                            let _ = c.tx.send(ClientOutbound::Ack(ack));
                        }
                    }
                    OutboundMessage::ToClientError { client_id, err } => {
                        if let Some(c) = clients.iter().find(|c| c.id == client_id) {
                            let _ = c.tx.send(ClientOutbound::Error(err));
                        }
                    }
                    OutboundMessage::ToClientState { client_id, state: msg } => {
                        if let Some(c) = clients.iter().find(|c| c.id == client_id) {
                            let _ = c.tx.send(ClientOutbound::State(Arc::from(msg)));
                        }
                    }
                    OutboundMessage::BroadcastMove { mv } => {
                        for c in clients.iter().filter(|c| c.handshaken) {
                            let _ = c.tx.send(ClientOutbound::Move(mv.clone()));
                        }
                    }
                    OutboundMessage::BroadcastState { state: msg } => {
                        let msg: Arc<StateMessage> = Arc::from(msg);
                        for c in clients.iter().filter(|c| c.handshaken) {
                            let _ = c.tx.send(ClientOutbound::State(Arc::clone(&msg)));
                        }
                    }
                }
            }

            // The host is done sending. Wait until every writer has caught up.
            let pending: Vec<oneshot::Receiver<()>> = {
                let clients = state.clients.read().await;
                clients
                    .iter()
                    .filter_map(|c| {
                        let (done_tx, done_rx) = oneshot::channel();
                        c.tx.send(ClientOutbound::Flush(done_tx)).ok().map(|_| done_rx)
                    })
                    .collect()
            };
            for done in pending {
                let _ = done.await;
            }
            tracing::debug!("outbound queue drained");
        })
    };

    // Accept incoming connections until the outbound side is closed and drained
    loop {
        let (socket, addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = &mut dispatcher => {
                tracing::info!("outbound channel closed, server stopping");
                return Ok(());
            }
        };
        client_id_counter += 1;
        let client_id = client_id_counter;

        tracing::info!(client_id, %addr, "client connected");

        let state = Arc::clone(&state);
        let command_tx = command_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, addr, client_id, state, command_tx).await {
                tracing::warn!(client_id, error = %e, "client error");
            }
            tracing::info!(client_id, "client disconnected");
        });
    }
}

/// Handle a single client connection
async fn handle_client(
    socket: TcpStream,
    addr: SocketAddr,
    client_id: u64,
    state: Arc<ServerState>,
    command_tx: mpsc::Sender<InboundCommand>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = tokio::io::split(socket);
    let mut reader = BufReader::new(reader);

    // Channel to send messages to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<ClientOutbound>();

    {
        let mut clients = state.clients.write().await;
        clients.push(ClientHandle {
            id: client_id,
            addr,
            handshaken: false,
            player: None,
            last_seq: None,
            tx: tx.clone(),
        });
    }

    // Spawn task to write messages to client
    let write_task = tokio::spawn(async move {
        let mut buf: Vec<u8> = Vec::with_capacity(4096);
        while let Some(msg) = rx.recv().await {
            buf.clear();
            let encoded = match msg {
                ClientOutbound::Welcome(m) => serde_json::to_writer(&mut buf, &m),
                ClientOutbound::Ack(m) => serde_json::to_writer(&mut buf, &m),
                ClientOutbound::Error(m) => serde_json::to_writer(&mut buf, &m),
                ClientOutbound::Move(m) => serde_json::to_writer(&mut buf, &m),
                ClientOutbound::State(m) => serde_json::to_writer(&mut buf, m.as_ref()),
                ClientOutbound::Flush(done) => {
                    let _ = done.send(());
                    continue;
                }
            };
            if let Err(e) = encoded {
                tracing::error!(client_id, error = %e, "failed to encode outbound message");
                continue;
            }
            buf.push(b'\n');
            if writer.write_all(&buf).await.is_err() || writer.flush().await.is_err() {
                break;
            }
        }
    });

    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        tracing::trace!(client_id, line = trimmed, "inbound");

        match parse_message(trimmed) {
            Ok(ParsedMessage::Hello(hello)) => {
                if is_handshaken(&state, client_id).await {
                    let error = create_error(
                        hello.seq,
                        ErrorCode::InvalidCommand,
                        "already handshaken",
                    );
                    let _ = tx.send(ClientOutbound::Error(error));
                    continue;
                }

                let major = state.config.protocol_version.split('.').next().unwrap_or("1");
                if hello.protocol_version.split('.').next() != Some(major) {
                    let error = create_error(
                        hello.seq,
                        ErrorCode::ProtocolMismatch,
                        &format!("Protocol version {} not supported", hello.protocol_version),
                    );
                    let _ = tx.send(ClientOutbound::Error(error));
                    break;
                }

                let requested = hello.role.unwrap_or(RequestedRole::Auto);
                let player = match requested {
                    RequestedRole::Observer => None,
                    RequestedRole::Auto | RequestedRole::Player => {
                        state.claim_seat(client_id).await
                    }
                };
                if requested == RequestedRole::Player && player.is_none() {
                    let error =
                        create_error(hello.seq, ErrorCode::NotAPlayer, "all player seats are taken");
                    let _ = tx.send(ClientOutbound::Error(error));
                    continue;
                }

                {
                    let mut clients = state.clients.write().await;
                    if let Some(client) = clients.iter_mut().find(|c| c.id == client_id) {
                        client.handshaken = true;
                        client.player = player;
                        client.last_seq = Some(hello.seq);
                    }
                }

                let role = if player.is_some() {
                    AssignedRole::Player
                } else {
                    AssignedRole::Observer
                };
                tracing::info!(client_id, ?role, player = ?player, "handshake complete");

                let welcome = create_welcome(hello.seq, client_id, role, player);
                let _ = tx.send(ClientOutbound::Welcome(welcome));

                // The room answers with the full state for this client, so the
                // join waits for queue space instead of being dropped.
                let name = hello.name.unwrap_or(hello.client.name);
                let joined = command_tx
                    .send(InboundCommand {
                        client_id,
                        seq: hello.seq,
                        payload: InboundPayload::Joined { player, name },
                    })
                    .await;
                if joined.is_err() {
                    tracing::warn!(client_id, "command channel closed during join");
                    break;
                }
            }

            Ok(ParsedMessage::Submit(submit)) => {
                if !is_handshaken(&state, client_id).await {
                    let error = create_error(
                        submit.seq,
                        ErrorCode::HandshakeRequired,
                        "Send hello before submit",
                    );
                    let _ = tx.send(ClientOutbound::Error(error));
                    continue;
                }

                if !check_and_update_seq(&state, client_id, submit.seq).await {
                    let error = create_error(
                        submit.seq,
                        ErrorCode::InvalidCommand,
                        "seq must be strictly increasing",
                    );
                    let _ = tx.send(ClientOutbound::Error(error));
                    continue;
                }

                let Some(player) = seat_of(&state, client_id).await else {
                    let error = create_error(
                        submit.seq,
                        ErrorCode::NotAPlayer,
                        "Observers may not submit moves",
                    );
                    let _ = tx.send(ClientOutbound::Error(error));
                    continue;
                };

                // Backpressure: bounded queue.
                let queued = command_tx.try_send(InboundCommand {
                    client_id,
                    seq: submit.seq,
                    payload: InboundPayload::Submit {
                        player,
                        tile_a: submit.tile_a,
                        tile_b: submit.tile_b,
                        move_seq: submit.move_seq,
                    },
                });
                if queued.is_err() {
                    let error =
                        create_error(submit.seq, ErrorCode::Backpressure, "Command queue is full");
                    let _ = tx.send(ClientOutbound::Error(error));
                }
            }

            Ok(ParsedMessage::Sync(sync)) => {
                if !is_handshaken(&state, client_id).await {
                    let error = create_error(
                        sync.seq,
                        ErrorCode::HandshakeRequired,
                        "Send hello before sync",
                    );
                    let _ = tx.send(ClientOutbound::Error(error));
                    continue;
                }
                if !check_and_update_seq(&state, client_id, sync.seq).await {
                    let error = create_error(
                        sync.seq,
                        ErrorCode::InvalidCommand,
                        "seq must be strictly increasing",
                    );
                    let _ = tx.send(ClientOutbound::Error(error));
                    continue;
                }
                if command_tx
                    .try_send(InboundCommand {
                        client_id,
                        seq: sync.seq,
                        payload: InboundPayload::SyncRequest,
                    })
                    .is_err()
                {
                    let error =
                        create_error(sync.seq, ErrorCode::Backpressure, "Command queue is full");
                    let _ = tx.send(ClientOutbound::Error(error));
                }
            }

            Ok(ParsedMessage::Unknown(unknown)) => {
                let error =
                    create_error(unknown.seq, ErrorCode::InvalidCommand, "Unknown message type");
                let _ = tx.send(ClientOutbound::Error(error));
            }

            Err(e) => {
                let seq = extract_seq_best_effort(trimmed).unwrap_or(0);
                let error = create_error(
                    seq,
                    ErrorCode::InvalidCommand,
                    &format!("JSON parse error: {}", e),
                );
                let _ = tx.send(ClientOutbound::Error(error));
            }
        }
    }

    // Clean up: remove client and free its seat.
    {
        let mut clients = state.clients.write().await;
        clients.retain(|c| c.id != client_id);
    }
    if let Some(player) = state.release_seat(client_id).await {
        tracing::info!(client_id, %player, "seat released");
    }

    drop(tx);
    let _ = write_task.await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_seq_handles_malformed_json() {
        assert_eq!(extract_seq_best_effort(r#"{"seq": 42, "type":"#), Some(42));
        assert_eq!(extract_seq_best_effort(r#"{"type":"x"}"#), None);
        assert_eq!(extract_seq_best_effort(r#"{"seq":"abc"}"#), None);
    }

    #[test]
    fn socket_addr_rejects_garbage_host() {
        let config = ServerConfig {
            host: "not a host".to_string(),
            ..ServerConfig::default()
        };
        assert!(config.socket_addr().is_err());
        assert!(ServerConfig::default().socket_addr().is_ok());
    }

    #[test]
    fn session_config_falls_back_to_standard_profile() {
        let config = ServerConfig {
            profile: "no-such-profile".to_string(),
            players: 3,
            ..ServerConfig::default()
        };
        let session = config.session_config();
        assert_eq!(session.profile, TileProfile::default());
        assert_eq!(session.mode.seats(), 3);
    }

    #[tokio::test]
    async fn seats_are_claimed_in_order_and_reused() {
        let state = ServerState::new(ServerConfig {
            players: 2,
            ..ServerConfig::default()
        });
        assert_eq!(state.claim_seat(10).await, Some(PlayerId(1)));
        assert_eq!(state.claim_seat(11).await, Some(PlayerId(2)));
        assert_eq!(state.claim_seat(12).await, None);

        assert_eq!(state.release_seat(10).await, Some(PlayerId(1)));
        assert_eq!(state.claim_seat(12).await, Some(PlayerId(1)));
        assert_eq!(state.release_seat(99).await, None);
    }

    #[tokio::test]
    async fn join_waits_for_a_full_command_queue() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<InboundCommand>(1);
        let (_out_tx, out_rx) = mpsc::unbounded_channel::<OutboundMessage>();
        let (ready_tx, ready_rx) = oneshot::channel();
        let server = tokio::spawn(run_server(config, cmd_tx, out_rx, Some(ready_tx)));
        let addr = ready_rx.await.unwrap();

        // Nothing drains the queue while both clients join.
        let mut streams = Vec::new();
        for name in ["ann", "bob"] {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let line = serde_json::to_string(&create_hello(1, name, RequestedRole::Auto)).unwrap();
            stream.write_all(line.as_bytes()).await.unwrap();
            stream.write_all(b"\n").await.unwrap();
            streams.push(stream);
        }

        let mut names = Vec::new();
        for _ in 0..2 {
            let cmd = tokio::time::timeout(std::time::Duration::from_secs(2), cmd_rx.recv())
                .await
                .unwrap()
                .unwrap();
            match cmd.payload {
                InboundPayload::Joined { name, .. } => names.push(name),
                other => panic!("expected join, got {:?}", other),
            }
        }
        names.sort();
        assert_eq!(names, vec!["ann".to_string(), "bob".to_string()]);

        server.abort();
    }
}
