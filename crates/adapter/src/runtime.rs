//! Adapter runtime integration.
//!
//! Bridges a synchronous host loop with the async TCP server.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::protocol::{AckMessage, ErrorMessage, MoveMessage, StateMessage};
use crate::server::{run_server, ServerConfig, ServerState};
use crate::types::{PlayerId, TileId};

/// Command delivered to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    pub client_id: u64,
    /// Message sequence of the originating client line
    pub seq: u64,
    pub payload: InboundPayload,
}

/// Command payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    /// Handshake finished; `player` is the claimed seat, if any
    Joined { player: Option<PlayerId>, name: String },
    Submit {
        player: PlayerId,
        tile_a: TileId,
        tile_b: TileId,
        move_seq: u64,
    },
    SyncRequest,
}

/// Outbound message to be delivered by the server.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    ToClientAck { client_id: u64, ack: AckMessage },
    ToClientError { client_id: u64, err: ErrorMessage },
    ToClientState { client_id: u64, state: Box<StateMessage> },
    BroadcastMove { mv: MoveMessage },
    BroadcastState { state: Box<StateMessage> },
}

/// Running adapter instance.
pub struct Adapter {
    rt: Runtime,
    server: JoinHandle<()>,
    local_addr: SocketAddr,
    cmd_rx: mpsc::Receiver<InboundCommand>,
    out_tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl Adapter {
    /// Start the adapter with the given configuration.
    ///
    /// Returns `Ok(None)` if `TILE_MATCH_DISABLED` is set. Blocks until the
    /// listener is bound, so a bind failure is reported here.
    pub fn start(config: ServerConfig) -> anyhow::Result<Option<Self>> {
        if ServerState::is_disabled() {
            return Ok(None);
        }

        let max_pending = config.max_pending_commands.max(1);
        let (cmd_tx, cmd_rx) = mpsc::channel::<InboundCommand>(max_pending);
        let (out_tx, out_rx) = mpsc::unbounded_channel::<OutboundMessage>();

        let (ready_tx, ready_rx) = oneshot::channel();

        let rt = Runtime::new().context("failed to create tokio runtime")?;
        let server = rt.spawn(async move {
            if let Err(e) = run_server(config, cmd_tx, out_rx, Some(ready_tx)).await {
                tracing::error!(error = %e, "tcp server stopped");
            }
        });
        let local_addr = rt
            .block_on(ready_rx)
            .context("tcp server failed to start")?;

        Ok(Some(Self {
            rt,
            server,
            local_addr,
            cmd_rx,
            out_tx,
        }))
    }

    /// Start the adapter from `TILE_MATCH_*` environment variables.
    pub fn start_from_env() -> anyhow::Result<Option<Self>> {
        Self::start(ServerConfig::from_env())
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn try_recv(&mut self) -> Option<InboundCommand> {
        self.cmd_rx.try_recv().ok()
    }

    /// Block until the next command; `None` once the server has stopped.
    pub fn recv(&mut self) -> Option<InboundCommand> {
        self.cmd_rx.blocking_recv()
    }

    pub fn send(&self, msg: OutboundMessage) {
        let _ = self.out_tx.send(msg);
    }

    /// Close the outbound queue and wait up to `grace` for queued messages
    /// to be written before the runtime stops.
    pub fn shutdown(self, grace: Duration) {
        let Self {
            rt,
            server,
            cmd_rx,
            out_tx,
            ..
        } = self;
        drop(out_tx);
        drop(cmd_rx);
        if rt.block_on(async { tokio::time::timeout(grace, server).await }).is_err() {
            tracing::warn!(?grace, "outbound queue not drained before shutdown");
        }
        rt.shutdown_timeout(Duration::from_millis(100));
        tracing::info!("adapter stopped");
    }
}
