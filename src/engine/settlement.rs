use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::match_data::{Match, PlayerId, TeamSide};

/// Raid points above which a player crossed the "super 10" threshold.
const SUPER10_THRESHOLD: u32 = 5;
/// Tackle points above which a player crossed the "high 5" threshold.
const HIGH5_THRESHOLD: u32 = 5;

/// One per-player line of the finalized record, shaped for an external
/// statistics-store upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    /// The player this line belongs to.
    pub player: PlayerId,
    /// Side the player was rostered on.
    pub team: TeamSide,
    /// Whether the player's team won.
    pub won: bool,
    /// Whether the player's team lost.
    pub lost: bool,
    /// Whether the match ended in a tie.
    pub tied: bool,
    /// Raid points accumulated this match.
    pub raid_points: u32,
    /// Tackle points accumulated this match.
    pub tackle_points: u32,
    /// More than [`SUPER10_THRESHOLD`] raid points.
    pub super10: bool,
    /// More than [`HIGH5_THRESHOLD`] tackle points.
    pub high5: bool,
    /// Whether the player was awarded MVP.
    pub mvp: bool,
}

/// The finalized record of a settled match.
#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    /// Unique identifier for the settled record.
    pub id: Uuid,
    /// Winning side, or `None` on a tie.
    pub winner: Option<TeamSide>,
    /// Final score of team A.
    pub score_a: u32,
    /// Final score of team B.
    pub score_b: u32,
    /// Best raider of the match, if anyone scored raid points.
    pub top_raider: Option<PlayerId>,
    /// Best defender of the match, if anyone scored tackle points.
    pub top_defender: Option<PlayerId>,
    /// Most valuable player, if one qualifies.
    pub mvp: Option<PlayerId>,
    /// One line per rostered player, for external persistence.
    pub records: Vec<PlayerRecord>,
    /// When the match settled.
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
}

/// Compute the final record for a match whose rounds have all completed.
///
/// Pure over the match state: reads scores and stats, mutates nothing.
pub fn settle(game: &Match) -> Settlement {
    let score_a = game.score(TeamSide::A);
    let score_b = game.score(TeamSide::B);
    let winner = if score_a > score_b {
        Some(TeamSide::A)
    } else if score_b > score_a {
        Some(TeamSide::B)
    } else {
        None
    };

    let top_raider = resolve_top(game, winner, |stat| stat.0);
    let top_defender = resolve_top(game, winner, |stat| stat.1);
    let mvp = resolve_mvp(game, winner);

    let records = game
        .players()
        .map(|player| {
            let (raid_points, tackle_points) = stat_of(game, player);
            let team = game.side_of(player).unwrap_or(TeamSide::A);
            let won = winner == Some(team);
            let tied = winner.is_none();
            PlayerRecord {
                player,
                team,
                won,
                lost: !won && !tied,
                tied,
                raid_points,
                tackle_points,
                super10: raid_points > SUPER10_THRESHOLD,
                high5: tackle_points > HIGH5_THRESHOLD,
                mvp: mvp == Some(player),
            }
        })
        .collect();

    Settlement {
        id: Uuid::new_v4(),
        winner,
        score_a,
        score_b,
        top_raider,
        top_defender,
        mvp,
        records,
        finished_at: OffsetDateTime::now_utc(),
    }
}

fn stat_of(game: &Match, player: PlayerId) -> (u32, u32) {
    game.stat(player)
        .map(|s| (s.raid_points, s.tackle_points))
        .unwrap_or((0, 0))
}

/// Best player by one stat dimension, with the deterministic tie-break
/// chain: total points, then winning-team membership, then lowest id.
fn resolve_top(
    game: &Match,
    winner: Option<TeamSide>,
    dimension: impl Fn((u32, u32)) -> u32,
) -> Option<PlayerId> {
    let best = game
        .players()
        .map(|p| dimension(stat_of(game, p)))
        .max()
        .filter(|max| *max > 0)?;

    let tied: Vec<PlayerId> = game
        .players()
        .filter(|p| dimension(stat_of(game, *p)) == best)
        .collect();
    break_tie(game, winner, tied)
}

fn break_tie(
    game: &Match,
    winner: Option<TeamSide>,
    mut tied: Vec<PlayerId>,
) -> Option<PlayerId> {
    if tied.len() > 1 {
        let best_total = tied
            .iter()
            .map(|p| stat_of(game, *p))
            .map(|(r, t)| r + t)
            .max()
            .unwrap_or(0);
        tied.retain(|p| {
            let (r, t) = stat_of(game, *p);
            r + t == best_total
        });
    }

    if tied.len() > 1
        && let Some(winning_side) = winner
    {
        let on_winner: Vec<PlayerId> = tied
            .iter()
            .copied()
            .filter(|p| game.side_of(*p) == Some(winning_side))
            .collect();
        if !on_winner.is_empty() {
            tied = on_winner;
        }
    }

    tied.into_iter().min()
}

/// MVP over combined points across the whole roster.
///
/// Awarded only to a sole top scorer, or to a tied top scorer on the winning
/// team (lowest id among those, for reproducibility). A tied match with tied
/// top scorers awards no MVP.
fn resolve_mvp(game: &Match, winner: Option<TeamSide>) -> Option<PlayerId> {
    let best = game
        .players()
        .map(|p| {
            let (r, t) = stat_of(game, p);
            r + t
        })
        .max()
        .filter(|max| *max > 0)?;

    let tied: Vec<PlayerId> = game
        .players()
        .filter(|p| {
            let (r, t) = stat_of(game, *p);
            r + t == best
        })
        .collect();

    if tied.len() == 1 {
        return tied.into_iter().next();
    }

    let winning_side = winner?;
    tied.into_iter()
        .filter(|p| game.side_of(*p) == Some(winning_side))
        .min()
}
