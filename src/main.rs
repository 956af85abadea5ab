//! Tile match host (default binary).
//!
//! `tile-match` hosts one multiplayer room on the TCP adapter, configured from
//! `TILE_MATCH_*` environment variables. `tile-match solo` instead plays a
//! solitaire deal to the end using hints, which is handy for checking seeds.
//!
//! Logging goes through `tracing`; set `RUST_LOG` to change the level.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use tile_match::adapter::{Adapter, Room, ServerConfig};
use tile_match::core::{GameSession, GlyphContent, Selection, SessionConfig};
use tile_match::types::Phase;

/// How long queued messages may take to flush on exit
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    match std::env::args().nth(1).as_deref() {
        Some("solo") => solo(config.seed),
        Some(other) => anyhow::bail!("unknown mode `{}` (expected nothing or `solo`)", other),
        None => host(config),
    }
}

fn host(config: ServerConfig) -> Result<()> {
    let mut room = Room::create(config.session_config(), &GlyphContent)
        .context("failed to set up the room")?;

    let Some(mut adapter) = Adapter::start(config)? else {
        tracing::info!("adapter disabled, nothing to host");
        return Ok(());
    };

    let mut clock = Instant::now();
    while let Some(cmd) = adapter.recv() {
        let now = Instant::now();
        room.tick(now - clock);
        clock = now;

        for msg in room.handle(cmd) {
            adapter.send(msg);
        }

        let phase = room.session().phase();
        if matches!(phase, Phase::Won | Phase::Ended) {
            tracing::info!(
                phase = phase.as_str(),
                moves = room.session().next_sequence(),
                "session over"
            );
            for p in room.session().players() {
                tracing::info!(player = %p.id, name = %p.display_name, score = p.score, "final score");
            }
            break;
        }
    }

    // The last move and its ack are still queued; let them reach the clients.
    adapter.shutdown(SHUTDOWN_GRACE);
    Ok(())
}

fn solo(seed: u32) -> Result<()> {
    let mut session = GameSession::new(SessionConfig::solitaire(seed), &GlyphContent)?;
    session.start()?;

    while session.phase().accepts_play() {
        match session.hint() {
            Some((a, b)) => {
                session.select_tile(a)?;
                if let Selection::Matched(mv) = session.select_tile(b)? {
                    tracing::debug!(a = %mv.tile_a, b = %mv.tile_b, score = mv.score_delta, "matched");
                }
            }
            None => {
                if let Err(e) = session.shuffle() {
                    tracing::warn!(error = %e, "stuck with no shuffle available");
                    session.abandon()?;
                }
            }
        }
    }

    tracing::info!(
        seed,
        phase = session.phase().as_str(),
        score = session.score(),
        shuffles = session.shuffles(),
        remaining = session.board().remaining(),
        "solo run finished"
    );
    Ok(())
}
