//! Command-level services layered over the engine.

pub mod lobby;
