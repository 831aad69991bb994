use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::state::lifecycle::{InvalidTransition, MatchEvent, MatchLifecycle, MatchPhase};

/// Number of rounds played under the standard ruleset.
pub const STANDARD_ROUNDS: u32 = 10;
/// Number of rounds played under the extended ruleset.
pub const EXTENDED_ROUNDS: u32 = 30;
/// Largest number a raider or defender may pick.
pub const MAX_PICK: u8 = 6;

/// Identifier of the channel a match is hosted in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a participant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Game mode selected at match creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// 3v3, raider timeout substitutes a random number.
    Classic,
    /// 3v3, raider timeout routes to the penalty path instead.
    Elite,
    /// 7v7 with enforced role composition.
    Custom,
}

impl Mode {
    /// Required players per team for this mode.
    pub fn team_size(&self) -> usize {
        match self {
            Mode::Classic | Mode::Elite => 3,
            Mode::Custom => 7,
        }
    }

    /// Whether this mode constrains raid/defense eligibility by role.
    pub fn role_constrained(&self) -> bool {
        matches!(self, Mode::Custom)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Classic => write!(f, "classic"),
            Mode::Elite => write!(f, "elite"),
            Mode::Custom => write!(f, "custom"),
        }
    }
}

/// What happens when the acting raider never produces a valid number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaiderTimeoutPolicy {
    /// Substitute a uniformly random number and score the round normally.
    Substitute,
    /// Award the defending team one point per unresponsive participant.
    AwardDefenders,
    /// Deduct one point from the defending team, saturating at zero.
    DeductDefenders,
}

/// Tunable parameters the engine is configured with per match.
///
/// The two historical rulesets (10 rounds with the award-style elite penalty,
/// 30 rounds with the deduction-style one) are both surfaced as named
/// constructors rather than silently picking one behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    /// Total rounds before settlement.
    pub rounds: u32,
    /// Fallback applied when the raider misses the response deadline.
    pub raider_timeout: RaiderTimeoutPolicy,
}

impl Rules {
    /// Standard ruleset: 10 rounds, elite awards points to the defense.
    pub fn standard(mode: Mode) -> Self {
        Self {
            rounds: STANDARD_ROUNDS,
            raider_timeout: match mode {
                Mode::Elite => RaiderTimeoutPolicy::AwardDefenders,
                _ => RaiderTimeoutPolicy::Substitute,
            },
        }
    }

    /// Extended ruleset: 30 rounds, elite deducts from the defense instead.
    pub fn extended(mode: Mode) -> Self {
        Self {
            rounds: EXTENDED_ROUNDS,
            raider_timeout: match mode {
                Mode::Elite => RaiderTimeoutPolicy::DeductDefenders,
                _ => RaiderTimeoutPolicy::Substitute,
            },
        }
    }
}

/// One of the two sides of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    /// Team A (the host's initial team).
    A,
    /// Team B.
    B,
}

impl TeamSide {
    /// The opposing side.
    pub fn opponent(&self) -> TeamSide {
        match self {
            TeamSide::A => TeamSide::B,
            TeamSide::B => TeamSide::A,
        }
    }
}

impl fmt::Display for TeamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamSide::A => write!(f, "team_a"),
            TeamSide::B => write!(f, "team_b"),
        }
    }
}

/// Role a player is tagged with in role-constrained modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May raid, never defends.
    Raider,
    /// May defend, never raids.
    Defender,
    /// May do both.
    Allrounder,
}

/// One team's roster and metadata.
#[derive(Debug, Clone)]
pub struct Team {
    /// Display name, mutable while the lobby is open.
    pub name: String,
    /// Current members, in join order.
    pub players: Vec<PlayerId>,
    /// Captain, if one has been assigned. Must be a member.
    pub captain: Option<PlayerId>,
    /// Role tags, only populated in role-constrained modes.
    pub roles: IndexMap<PlayerId, Role>,
}

impl Team {
    /// Build an empty team with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            players: Vec::new(),
            captain: None,
            roles: IndexMap::new(),
        }
    }

    /// Whether the given player is on this team.
    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    /// Remove a player, clearing captaincy and role tag if needed.
    pub fn remove(&mut self, player: PlayerId) {
        self.players.retain(|p| *p != player);
        self.roles.shift_remove(&player);
        if self.captain == Some(player) {
            self.captain = None;
        }
    }

    /// Count members tagged with the given role.
    pub fn count_role(&self, role: Role) -> usize {
        self.roles.values().filter(|r| **r == role).count()
    }
}

/// The two sides of a coin used for the toss call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinSide {
    /// Heads.
    Heads,
    /// Tails.
    Tails,
}

/// What the toss winner elects to do in round 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstRole {
    /// Raid first.
    Raid,
    /// Defend first ("court").
    Court,
}

/// Outcome of a completed toss. Immutable once both steps have resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TossRecord {
    /// Captain picked uniformly at random to call the coin.
    pub caller: PlayerId,
    /// The side the caller called.
    pub call: CoinSide,
    /// The simulated coin result.
    pub result: CoinSide,
    /// Side that won the toss.
    pub winner: TeamSide,
    /// The winner's choice of first role (defaults to court on timeout).
    pub choice: FirstRole,
}

impl TossRecord {
    /// The side that raids in round 1, as fixed by the winner's choice.
    pub fn first_raiding_side(&self) -> TeamSide {
        match self.choice {
            FirstRole::Raid => self.winner,
            FirstRole::Court => self.winner.opponent(),
        }
    }
}

/// Per-player cumulative statistics for one match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndividualStat {
    /// Raid points accumulated.
    pub raid_points: u32,
    /// Tackle points accumulated.
    pub tackle_points: u32,
}

impl IndividualStat {
    /// Combined raid and tackle points.
    pub fn total(&self) -> u32 {
        self.raid_points + self.tackle_points
    }
}

/// How one round was classified by the arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RaidOutcome {
    /// Raider missed the deadline; defense awarded one point per
    /// unresponsive participant.
    Penalty {
        /// Points awarded to the defending team.
        points: u32,
    },
    /// Raider missed the deadline; one point deducted from the defense.
    Deduction,
    /// Exactly one defender matched the raider's number.
    Tackle {
        /// The matching defender.
        defender: PlayerId,
    },
    /// Two or more defenders matched the raider's number.
    SuperTackle {
        /// All matching defenders.
        defenders: Vec<PlayerId>,
    },
    /// No defender matched, but several coincided on a wrong number.
    SuperRaid {
        /// The most-repeated wrong number.
        number: u8,
        /// How many defenders picked it; equals the points awarded.
        count: u32,
    },
    /// No match and no qualifying repeat; the raider walks free.
    Escape,
}

/// Everything recorded about one completed round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundResult {
    /// Round number, 1-based.
    pub number: u32,
    /// Side that raided this round.
    pub raiding_side: TeamSide,
    /// The acting raider.
    pub raider: PlayerId,
    /// The raider's number, or `None` when the penalty path fired.
    pub raider_number: Option<u8>,
    /// Validated or substituted number per solicited defender.
    pub defender_numbers: IndexMap<PlayerId, u8>,
    /// Classified outcome.
    pub outcome: RaidOutcome,
    /// One-line narrative for the scorecard renderer.
    pub summary: String,
}

/// One match: roster, lifecycle, toss, scores, and running statistics.
///
/// Owned exclusively by the engine driver; the fan-out coordinator and the
/// arbiter only ever see immutable slices of it and hand back pure results.
#[derive(Debug, Clone)]
pub struct Match {
    /// Player who created the match.
    pub host: PlayerId,
    /// Selected game mode.
    pub mode: Mode,
    /// Ruleset parameters (round count, raider-timeout policy).
    pub rules: Rules,
    /// Creation instant, used by the idle sweep.
    pub created_at: Instant,
    /// The two teams.
    teams: [Team; 2],
    /// Cumulative team scores, indexed by [`TeamSide`].
    scores: [u32; 2],
    /// Side raiding in the current round. Meaningful once active.
    pub raiding_side: TeamSide,
    /// Resolved toss, if any.
    pub toss: Option<TossRecord>,
    /// Per-player statistics, seeded to zero at match start.
    stats: IndexMap<PlayerId, IndividualStat>,
    /// Result of the most recently completed round.
    pub last_round: Option<RoundResult>,
    lifecycle: MatchLifecycle,
}

impl Match {
    /// Create a lobby-phase match. The host is seated in team A.
    pub fn new(host: PlayerId, mode: Mode, rules: Rules) -> Self {
        let mut team_a = Team::new("Team A");
        team_a.players.push(host);

        let mut stats = IndexMap::new();
        stats.insert(host, IndividualStat::default());

        Self {
            host,
            mode,
            rules,
            created_at: Instant::now(),
            teams: [team_a, Team::new("Team B")],
            scores: [0, 0],
            raiding_side: TeamSide::A,
            toss: None,
            stats,
            last_round: None,
            lifecycle: MatchLifecycle::new(rules.rounds),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> MatchPhase {
        self.lifecycle.phase()
    }

    /// Whether roster changes are still allowed.
    pub fn is_lobby_open(&self) -> bool {
        self.lifecycle.is_lobby_open()
    }

    /// Whether rounds are currently being played.
    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    /// Apply a lifecycle event.
    pub fn apply_event(&mut self, event: MatchEvent) -> Result<MatchPhase, InvalidTransition> {
        self.lifecycle.apply(event)
    }

    /// Borrow a team by side.
    pub fn team(&self, side: TeamSide) -> &Team {
        &self.teams[side as usize]
    }

    /// Mutably borrow a team by side.
    pub fn team_mut(&mut self, side: TeamSide) -> &mut Team {
        &mut self.teams[side as usize]
    }

    /// All rostered players, team A first.
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.teams.iter().flat_map(|t| t.players.iter().copied())
    }

    /// Which side a player is rostered on, if any.
    pub fn side_of(&self, player: PlayerId) -> Option<TeamSide> {
        if self.team(TeamSide::A).contains(player) {
            Some(TeamSide::A)
        } else if self.team(TeamSide::B).contains(player) {
            Some(TeamSide::B)
        } else {
            None
        }
    }

    /// Whether the player created this match.
    pub fn is_host(&self, player: PlayerId) -> bool {
        self.host == player
    }

    /// Whether the player captains either team.
    pub fn is_captain(&self, player: PlayerId) -> bool {
        self.teams.iter().any(|t| t.captain == Some(player))
    }

    /// Both captains, if both are assigned (A first).
    pub fn captains(&self) -> Option<(PlayerId, PlayerId)> {
        match (self.team(TeamSide::A).captain, self.team(TeamSide::B).captain) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    /// Current score for a side.
    pub fn score(&self, side: TeamSide) -> u32 {
        self.scores[side as usize]
    }

    /// Award points to a side.
    pub fn add_score(&mut self, side: TeamSide, delta: u32) {
        self.scores[side as usize] += delta;
    }

    /// Deduct points from a side, saturating at zero.
    pub fn deduct_score(&mut self, side: TeamSide, amount: u32) {
        let slot = &mut self.scores[side as usize];
        *slot = slot.saturating_sub(amount);
    }

    /// Read a player's stats, if the player has an entry.
    pub fn stat(&self, player: PlayerId) -> Option<&IndividualStat> {
        self.stats.get(&player)
    }

    /// Mutable stats entry for a player, created lazily on first use.
    pub fn stat_mut(&mut self, player: PlayerId) -> &mut IndividualStat {
        self.stats.entry(player).or_default()
    }

    /// Snapshot of all stat entries in roster-insertion order.
    pub fn stats(&self) -> &IndexMap<PlayerId, IndividualStat> {
        &self.stats
    }

    /// Seed a zeroed stats entry for every rostered player and reset scores.
    ///
    /// Called exactly once on the `TossDone → Active` transition.
    pub fn seed_for_start(&mut self) {
        self.scores = [0, 0];
        let players: Vec<PlayerId> = self.players().collect();
        self.stats.clear();
        for player in players {
            self.stats.insert(player, IndividualStat::default());
        }
        if let Some(toss) = &self.toss {
            self.raiding_side = toss.first_raiding_side();
        }
    }

    /// Roster members eligible to raid for a side.
    pub fn eligible_raiders(&self, side: TeamSide) -> Vec<PlayerId> {
        self.eligible(side, Role::Raider)
    }

    /// Roster members eligible to defend for a side.
    pub fn eligible_defenders(&self, side: TeamSide) -> Vec<PlayerId> {
        self.eligible(side, Role::Defender)
    }

    fn eligible(&self, side: TeamSide, wanted: Role) -> Vec<PlayerId> {
        let team = self.team(side);
        if !self.mode.role_constrained() {
            return team.players.clone();
        }
        team.players
            .iter()
            .copied()
            .filter(|p| {
                matches!(
                    team.roles.get(p),
                    Some(role) if *role == wanted || *role == Role::Allrounder
                )
            })
            .collect()
    }

    /// Validate player count and role composition ahead of `StartMatch`.
    pub fn validate_start_roster(&self) -> Result<(), String> {
        let size = self.mode.team_size();
        for side in [TeamSide::A, TeamSide::B] {
            let team = self.team(side);
            if team.players.len() != size {
                return Err(format!(
                    "{} must have exactly {size} players (has {})",
                    team.name,
                    team.players.len()
                ));
            }

            if self.mode.role_constrained() {
                if team.roles.len() != team.players.len() {
                    return Err(format!("every player in {} needs a role", team.name));
                }
                if team.count_role(Role::Raider) > 4 {
                    return Err(format!("{} cannot have more than 4 raiders", team.name));
                }
                if team.count_role(Role::Defender) < 3 {
                    return Err(format!("{} must have at least 3 defenders", team.name));
                }
                if team.count_role(Role::Allrounder) > 1 {
                    return Err(format!("{} cannot have more than 1 allrounder", team.name));
                }
                if team.count_role(Role::Raider) + team.count_role(Role::Allrounder) == 0 {
                    return Err(format!("{} needs at least one player able to raid", team.name));
                }
            }
        }
        Ok(())
    }
}
