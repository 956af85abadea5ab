//! Tile match (workspace facade crate).
//!
//! This package exposes `tile_match::{core,adapter,types}` while the
//! implementation lives in dedicated crates under `crates/`.

pub use tile_match_adapter as adapter;
pub use tile_match_core as core;
pub use tile_match_types as types;
