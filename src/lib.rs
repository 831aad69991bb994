//! Turn-based kabaddi match engine.
//!
//! Matches are hosted one per channel and move through a fixed lifecycle:
//! lobby assembly, the coin toss, a configured number of raid rounds, and a
//! final settlement with per-player honors. All participant interaction goes
//! through a pluggable [`engine::collector::ResponseChannel`], so the engine
//! itself stays front-end agnostic.

pub mod config;
pub mod dao;
pub mod engine;
pub mod error;
pub mod services;
pub mod state;
