//! Match data model, lifecycle state machine, and the live-match registry.

pub mod lifecycle;
pub mod match_data;
pub mod registry;

pub use lifecycle::{InvalidTransition, MatchEvent, MatchPhase};
pub use match_data::{
    ChannelId, CoinSide, FirstRole, IndividualStat, Match, Mode, PlayerId, RaidOutcome,
    RaiderTimeoutPolicy, Role, RoundResult, Rules, Team, TeamSide, TossRecord,
};
pub use registry::{MatchHandle, MatchRegistry};
