use thiserror::Error;

/// High-level phases a match moves through over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Roster is still being assembled; every lobby action is allowed.
    Lobby,
    /// The toss protocol has been opened but not yet resolved.
    TossPending,
    /// Toss resolved; waiting for the host to start the match.
    TossDone,
    /// Rounds are being played; `round` counts from 1.
    Active {
        /// Current round number (1-based, strictly monotonic).
        round: u32,
    },
    /// All rounds completed and the final record emitted.
    Settled,
}

/// Events that can be applied to the match lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// Open the toss protocol from the lobby.
    OpenToss,
    /// Both toss steps resolved (winner and first-role choice known).
    TossResolved,
    /// Roster and toss validated; round 1 begins.
    StartMatch,
    /// The current round has been scored and applied.
    RoundCompleted,
}

/// Error returned when an event cannot be applied from the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the lifecycle was in when the event was received.
    pub from: MatchPhase,
    /// The event that cannot be applied from this phase.
    pub event: MatchEvent,
}

/// State machine sequencing one match from lobby to settlement.
///
/// The machine owns nothing but the phase and the configured round count; all
/// validation of rosters, captains, and authorization happens in the service
/// layer before an event is applied. A rejected event leaves the phase
/// untouched.
#[derive(Debug, Clone)]
pub struct MatchLifecycle {
    phase: MatchPhase,
    rounds: u32,
}

impl MatchLifecycle {
    /// Create a lifecycle in the lobby phase for a match of `rounds` rounds.
    pub fn new(rounds: u32) -> Self {
        Self {
            phase: MatchPhase::Lobby,
            rounds,
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Total number of rounds this match plays before settling.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Whether roster-changing lobby actions are still allowed.
    ///
    /// Collaborators (command front-ends) use this guard to reject
    /// join/leave/kick/swap/rename/captain changes once play has begun.
    pub fn is_lobby_open(&self) -> bool {
        matches!(
            self.phase,
            MatchPhase::Lobby | MatchPhase::TossPending | MatchPhase::TossDone
        )
    }

    /// Whether rounds are currently being played.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, MatchPhase::Active { .. })
    }

    /// Whether the match has settled.
    pub fn is_settled(&self) -> bool {
        self.phase == MatchPhase::Settled
    }

    /// Apply an event, returning the new phase or the rejected transition.
    pub fn apply(&mut self, event: MatchEvent) -> Result<MatchPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        Ok(next)
    }

    /// Compute the phase an event would lead to, without applying it.
    fn compute_transition(&self, event: MatchEvent) -> Result<MatchPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (MatchPhase::Lobby, MatchEvent::OpenToss) => MatchPhase::TossPending,
            // An expired call step leaves the phase untouched, so the toss
            // can be resolved on any later attempt.
            (MatchPhase::TossPending, MatchEvent::TossResolved) => MatchPhase::TossDone,
            (MatchPhase::TossDone, MatchEvent::StartMatch) => MatchPhase::Active { round: 1 },
            (MatchPhase::Active { round }, MatchEvent::RoundCompleted) => {
                if round < self.rounds {
                    MatchPhase::Active { round: round + 1 }
                } else {
                    MatchPhase::Settled
                }
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
