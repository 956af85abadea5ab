//! Room - the authoritative side of a multiplayer session
//!
//! A room owns the one [`GameSession`] every client plays against. It turns
//! inbound commands into engine calls and engine results into outbound
//! messages: an ack plus a `move` broadcast for every accepted submission, an
//! error with resync hints for every rejection.
//!
//! When a move leaves the board without a free pair, the room reshuffles on
//! everyone's behalf and broadcasts the new state. If no shuffle can be found
//! the session is abandoned.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::core::{ContentProvider, GameSession, SessionConfig, SessionError};
use crate::protocol::{create_ack, create_move, create_state, error_from_session, StateMessage};
use crate::runtime::{InboundCommand, InboundPayload, OutboundMessage};
use crate::types::Phase;

pub struct Room {
    session: GameSession,
    out_seq: u64,
}

impl Room {
    /// Deal a session and start it
    pub fn create(config: SessionConfig, content: &dyn ContentProvider) -> Result<Self, SessionError> {
        Self::from_session(GameSession::new(config, content)?)
    }

    /// Host an existing session, starting it if it is still in setup
    pub fn from_session(mut session: GameSession) -> Result<Self, SessionError> {
        if !session.mode().is_multiplayer() {
            return Err(SessionError::WrongMode("room"));
        }
        if session.phase() == Phase::Setup {
            session.start()?;
        }
        tracing::info!(
            seats = session.players().len(),
            tiles = session.board().total(),
            "room open"
        );
        Ok(Self { session, out_seq: 0 })
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn into_session(self) -> GameSession {
        self.session
    }

    /// Advance the session clock
    pub fn tick(&mut self, elapsed: Duration) {
        self.session.tick(elapsed.as_millis() as u64);
    }

    fn next_out_seq(&mut self) -> u64 {
        self.out_seq += 1;
        self.out_seq
    }

    fn state_message(&mut self) -> Box<StateMessage> {
        let seq = self.next_out_seq();
        Box::new(create_state(seq, self.session.snapshot()))
    }

    /// Apply one inbound command
    pub fn handle(&mut self, cmd: InboundCommand) -> Vec<OutboundMessage> {
        let client_id = cmd.client_id;
        match cmd.payload {
            InboundPayload::Joined { player, name } => {
                if let Some(player) = player {
                    self.session.set_display_name(player, name);
                }
                vec![OutboundMessage::ToClientState {
                    client_id,
                    state: self.state_message(),
                }]
            }
            InboundPayload::SyncRequest => vec![OutboundMessage::ToClientState {
                client_id,
                state: self.state_message(),
            }],
            InboundPayload::Submit {
                player,
                tile_a,
                tile_b,
                move_seq,
            } => match self.session.submit_move(player, tile_a, tile_b, move_seq) {
                Ok(outcome) => {
                    tracing::debug!(%player, move_seq, matched = outcome.is_matched(), "move applied");
                    let seq = self.next_out_seq();
                    let mv = create_move(seq, move_seq, player, (tile_a, tile_b), &outcome, &self.session);
                    let mut out = vec![
                        OutboundMessage::ToClientAck {
                            client_id,
                            ack: create_ack(cmd.seq, Some(move_seq)),
                        },
                        OutboundMessage::BroadcastMove { mv },
                    ];
                    if self.session.is_stalemate() {
                        self.reshuffle();
                        out.push(OutboundMessage::BroadcastState {
                            state: self.state_message(),
                        });
                    }
                    out
                }
                Err(e) => {
                    tracing::debug!(%player, move_seq, error = %e, "move rejected");
                    let err = error_from_session(
                        cmd.seq,
                        &e,
                        self.session.next_sequence(),
                        self.session.active_player(),
                    );
                    vec![OutboundMessage::ToClientError { client_id, err }]
                }
            },
        }
    }

    fn reshuffle(&mut self) {
        match self.session.shuffle() {
            Ok(report) => {
                tracing::info!(attempts = report.attempts, tiles = report.tiles, "stalemate reshuffled");
            }
            Err(e) => {
                tracing::warn!(error = %e, "no shuffle found, abandoning session");
                let _ = self.session.abandon();
            }
        }
    }
}

/// Drive a room from a command channel until either side closes
///
/// The session clock follows wall time between commands. Returns the room so
/// callers can inspect the final session.
pub async fn run_room(
    mut room: Room,
    mut cmd_rx: mpsc::Receiver<InboundCommand>,
    out_tx: mpsc::UnboundedSender<OutboundMessage>,
) -> Room {
    let mut clock = Instant::now();
    while let Some(cmd) = cmd_rx.recv().await {
        let now = Instant::now();
        room.tick(now - clock);
        clock = now;

        for msg in room.handle(cmd) {
            if out_tx.send(msg).is_err() {
                return room;
            }
        }
    }
    room
}
