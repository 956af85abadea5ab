//! Client-side synchronization
//!
//! [`ClientSync`] keeps a local replica of the session consistent with the
//! room. Broadcast moves are applied strictly in `move_seq` order through the
//! same engine the room runs, so a replica either matches the room or notices
//! that it does not. Anything it cannot apply (a gap, a divergent result)
//! surfaces as [`SyncEvent::NeedsResync`]; the caller answers with
//! [`ClientSync::sync_request`] and the next `state` message replaces the
//! replica wholesale.
//!
//! At most one submission is in flight at a time.

use std::io::Write;

use anyhow::bail;

use crate::core::{GameSession, MatchOutcome};
use crate::protocol::*;
use crate::types::{PlayerId, TileId};

/// Outgoing side of a client connection
pub trait MoveTransport {
    fn send_submit(&mut self, msg: &SubmitMessage) -> anyhow::Result<()>;
}

/// Writes each submission as one JSON line
pub struct LineTransport<W: Write> {
    writer: W,
}

impl<W: Write> LineTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MoveTransport for LineTransport<W> {
    fn send_submit(&mut self, msg: &SubmitMessage) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, msg)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// A submission waiting for the room's verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMove {
    pub move_seq: u64,
    /// Message sequence of the `submit` line
    pub msg_seq: u64,
    pub tile_a: TileId,
    pub tile_b: TileId,
    pub acked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Welcomed {
        player: Option<PlayerId>,
    },
    /// A broadcast move was applied to the replica
    Applied {
        move_seq: u64,
        result: MoveResult,
        own: bool,
    },
    /// Already applied; ignored
    Duplicate {
        move_seq: u64,
    },
    Acked {
        move_seq: u64,
    },
    Rejected {
        code: ErrorCode,
        message: String,
    },
    /// Replica replaced from a full state
    Resynced {
        next_seq: u64,
    },
    NeedsResync {
        reason: String,
    },
}

#[derive(Default)]
pub struct ClientSync {
    player: Option<PlayerId>,
    replica: Option<GameSession>,
    next_seq: u64,
    active: Option<PlayerId>,
    pending: Option<PendingMove>,
    msg_seq: u64,
}

impl ClientSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    pub fn replica(&self) -> Option<&GameSession> {
        self.replica.as_ref()
    }

    /// Next session sequence number as far as this client knows
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn active_player(&self) -> Option<PlayerId> {
        self.active
    }

    pub fn pending(&self) -> Option<&PendingMove> {
        self.pending.as_ref()
    }

    pub fn is_my_turn(&self) -> bool {
        self.player.is_some() && self.player == self.active
    }

    fn next_msg_seq(&mut self) -> u64 {
        self.msg_seq += 1;
        self.msg_seq
    }

    pub fn hello(&mut self, name: &str, role: RequestedRole) -> HelloMessage {
        let seq = self.next_msg_seq();
        create_hello(seq, name, role)
    }

    pub fn sync_request(&mut self) -> SyncMessage {
        let seq = self.next_msg_seq();
        create_sync(seq)
    }

    /// Submit a pair for the current turn
    pub fn submit(
        &mut self,
        transport: &mut dyn MoveTransport,
        tile_a: TileId,
        tile_b: TileId,
    ) -> anyhow::Result<u64> {
        if self.player.is_none() {
            bail!("observers cannot submit moves");
        }
        if let Some(pending) = &self.pending {
            bail!("move {} is still pending", pending.move_seq);
        }
        if !self.is_my_turn() {
            bail!("not this client's turn (active: {:?})", self.active);
        }

        let msg_seq = self.next_msg_seq();
        let msg = create_submit(msg_seq, tile_a, tile_b, self.next_seq);
        transport.send_submit(&msg)?;

        self.pending = Some(PendingMove {
            move_seq: self.next_seq,
            msg_seq,
            tile_a,
            tile_b,
            acked: false,
        });
        Ok(self.next_seq)
    }

    /// Dispatch any server message
    pub fn handle(&mut self, msg: &ServerMessage) -> SyncEvent {
        match msg {
            ServerMessage::Welcome(m) => self.on_welcome(m),
            ServerMessage::Ack(m) => self.on_ack(m),
            ServerMessage::Error(m) => self.on_error(m),
            ServerMessage::Move(m) => self.on_move_received(m),
            ServerMessage::State(m) => self.on_state(m),
        }
    }

    pub fn on_welcome(&mut self, msg: &WelcomeMessage) -> SyncEvent {
        self.player = msg.player_id;
        SyncEvent::Welcomed {
            player: msg.player_id,
        }
    }

    pub fn on_state(&mut self, msg: &StateMessage) -> SyncEvent {
        match GameSession::restore(msg.snapshot.clone()) {
            Ok(session) => {
                self.next_seq = session.next_sequence();
                self.active = session.active_player();
                self.replica = Some(session);
                if self.pending.is_some_and(|p| p.move_seq < self.next_seq) {
                    self.pending = None;
                }
                tracing::debug!(next_seq = self.next_seq, "replica resynced");
                SyncEvent::Resynced {
                    next_seq: self.next_seq,
                }
            }
            Err(e) => {
                self.replica = None;
                SyncEvent::NeedsResync {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Apply a broadcast move, enforcing strict sequence order
    pub fn on_move_received(&mut self, msg: &MoveMessage) -> SyncEvent {
        if msg.move_seq < self.next_seq {
            return SyncEvent::Duplicate {
                move_seq: msg.move_seq,
            };
        }
        if msg.move_seq > self.next_seq {
            return SyncEvent::NeedsResync {
                reason: format!("expected move {}, got {}", self.next_seq, msg.move_seq),
            };
        }

        if let Some(replica) = self.replica.as_mut() {
            replica.tick(msg.elapsed_ms.saturating_sub(replica.elapsed_ms()));
            let applied = replica.submit_move(msg.player, msg.tile_a, msg.tile_b, msg.move_seq);
            let agrees = match (&applied, msg.result) {
                (Ok(MatchOutcome::Matched(mv)), MoveResult::Matched) => mv.score_delta == msg.score_delta,
                (Ok(MatchOutcome::NoMatch), MoveResult::NoMatch) => true,
                _ => false,
            };
            if !agrees {
                tracing::warn!(move_seq = msg.move_seq, ?applied, "replica diverged");
                self.replica = None;
                return SyncEvent::NeedsResync {
                    reason: format!("replica disagrees on move {}", msg.move_seq),
                };
            }
        }

        self.next_seq = msg.next_seq;
        self.active = msg.active_player;
        if self.pending.is_some_and(|p| p.move_seq == msg.move_seq) {
            self.pending = None;
        }
        SyncEvent::Applied {
            move_seq: msg.move_seq,
            result: msg.result,
            own: Some(msg.player) == self.player,
        }
    }

    pub fn on_ack(&mut self, msg: &AckMessage) -> SyncEvent {
        if let Some(pending) = self.pending.as_mut() {
            if pending.msg_seq == msg.seq {
                pending.acked = true;
            }
        }
        SyncEvent::Acked {
            move_seq: msg.move_seq.unwrap_or(self.next_seq),
        }
    }

    /// A rejection clears the pending move and adopts the room's counters
    pub fn on_error(&mut self, msg: &ErrorMessage) -> SyncEvent {
        if self.pending.is_some_and(|p| p.msg_seq == msg.seq) {
            self.pending = None;
        }
        if let Some(expected) = msg.expected_seq {
            self.next_seq = expected;
            self.active = msg.active_player;
            let behind = self
                .replica
                .as_ref()
                .is_some_and(|r| r.next_sequence() != expected);
            if behind {
                return SyncEvent::NeedsResync {
                    reason: format!("room is at move {}", expected),
                };
            }
        }
        SyncEvent::Rejected {
            code: msg.code,
            message: msg.message.clone(),
        }
    }
}
