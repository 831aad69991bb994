use thiserror::Error;

use crate::state::{
    lifecycle::InvalidTransition,
    match_data::{ChannelId, PlayerId},
};

/// Errors surfaced to the command front-end by engine operations.
///
/// Participant timeouts and malformed private replies never appear here:
/// both are absorbed locally by the response collector's retry and fallback
/// policies. A returned error always means the match state was left
/// untouched.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An action was attempted in the wrong lifecycle phase.
    #[error("invalid phase: {0}")]
    InvalidPhase(#[from] InvalidTransition),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A non-host/non-captain attempted a privileged action.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Player count or role composition constraints are not satisfied.
    #[error("roster constraint violated: {0}")]
    Roster(String),
    /// The player is already registered in another match.
    #[error("player {player} already has an active match in channel {channel}")]
    PlayerBusy {
        /// The player that is already registered.
        player: PlayerId,
        /// The channel holding their existing match.
        channel: ChannelId,
    },
    /// No match (or player) matching the request exists.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Failure to reach a participant over the private response channel.
///
/// Treated identically to a timeout by the collector: the participant's
/// fallback kicks in immediately and the round proceeds.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// The participant cannot be reached privately.
    #[error("participant unreachable: {0}")]
    Unavailable(String),
    /// The underlying transport has shut down.
    #[error("response channel closed")]
    Closed,
}
