use std::collections::BTreeMap;

use crate::{
    engine::fanout::RaidBallot,
    state::match_data::{PlayerId, RaidOutcome, RaiderTimeoutPolicy},
};

/// Pure result of arbitrating one round's ballot.
///
/// All deltas are non-negative; the deduction variant of the elite penalty
/// is expressed separately so the caller can apply it saturating at zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidVerdict {
    /// Classified outcome.
    pub outcome: RaidOutcome,
    /// Points awarded to the raiding team.
    pub raiding_delta: u32,
    /// Points awarded to the defending team.
    pub defending_delta: u32,
    /// Points removed from the defending team (saturating).
    pub defending_deduction: u32,
    /// Raid-stat increments, `(player, points)`.
    pub raid_credit: Vec<(PlayerId, u32)>,
    /// Defenders whose tackle stat increments by one.
    pub tackle_credit: Vec<PlayerId>,
}

impl RaidVerdict {
    /// One-line narrative of the round for the scorecard renderer.
    pub fn summary(&self) -> String {
        match &self.outcome {
            RaidOutcome::Penalty { points } => format!(
                "Raider was out of time. +{points} penalty to the defending team."
            ),
            RaidOutcome::Deduction => {
                "Raider was out of time. Defending team loses 1 point.".to_string()
            }
            RaidOutcome::Tackle { .. } => {
                "Tackle! One defender guessed the raider's number. +1 to the defending team."
                    .to_string()
            }
            RaidOutcome::SuperTackle { defenders } => format!(
                "Super Tackle! {} defenders guessed the raider's number. +2 to the defending team.",
                defenders.len()
            ),
            RaidOutcome::SuperRaid { number, count } => format!(
                "Super Raid! {count} defenders coincided on {number}. +{count} to the raiding team."
            ),
            RaidOutcome::Escape => {
                "Escape! No defender guessed the raider's number. +1 to the raiding team."
                    .to_string()
            }
        }
    }
}

/// Classify one round's collected numbers into an outcome and score deltas.
///
/// Total over every ballot: exactly one of penalty, tackle, super tackle,
/// super raid, or escape fires. The function reads nothing but the ballot
/// and the raider-timeout policy, and mutates nothing.
pub fn arbitrate(ballot: &RaidBallot, policy: RaiderTimeoutPolicy) -> RaidVerdict {
    let Some(raider_number) = ballot.raider_number else {
        return penalty_verdict(ballot, policy);
    };

    let matching: Vec<PlayerId> = ballot
        .defenders
        .iter()
        .filter(|(_, number)| **number == raider_number)
        .map(|(player, _)| *player)
        .collect();

    match matching.len() {
        1 => {
            let defender = matching[0];
            RaidVerdict {
                outcome: RaidOutcome::Tackle { defender },
                raiding_delta: 0,
                defending_delta: 1,
                defending_deduction: 0,
                raid_credit: Vec::new(),
                tackle_credit: vec![defender],
            }
        }
        n if n > 1 => RaidVerdict {
            outcome: RaidOutcome::SuperTackle {
                defenders: matching.clone(),
            },
            raiding_delta: 0,
            defending_delta: 2,
            defending_deduction: 0,
            raid_credit: Vec::new(),
            tackle_credit: matching,
        },
        _ => match most_repeated_wrong_number(ballot, raider_number) {
            Some((number, count)) => RaidVerdict {
                outcome: RaidOutcome::SuperRaid { number, count },
                raiding_delta: count,
                defending_delta: 0,
                defending_deduction: 0,
                raid_credit: vec![(ballot.raider, count)],
                tackle_credit: Vec::new(),
            },
            None => RaidVerdict {
                outcome: RaidOutcome::Escape,
                raiding_delta: 1,
                defending_delta: 0,
                defending_deduction: 0,
                raid_credit: vec![(ballot.raider, 1)],
                tackle_credit: Vec::new(),
            },
        },
    }
}

/// Raider never answered: score the round via the configured penalty.
fn penalty_verdict(ballot: &RaidBallot, policy: RaiderTimeoutPolicy) -> RaidVerdict {
    match policy {
        RaiderTimeoutPolicy::DeductDefenders => RaidVerdict {
            outcome: RaidOutcome::Deduction,
            raiding_delta: 0,
            defending_delta: 0,
            defending_deduction: 1,
            raid_credit: Vec::new(),
            tackle_credit: Vec::new(),
        },
        // Substitute never reaches here through the fan-out; award style is
        // the total fallback.
        RaiderTimeoutPolicy::AwardDefenders | RaiderTimeoutPolicy::Substitute => RaidVerdict {
            outcome: RaidOutcome::Penalty {
                points: ballot.unresponsive,
            },
            raiding_delta: 0,
            defending_delta: ballot.unresponsive,
            defending_deduction: 0,
            raid_credit: Vec::new(),
            tackle_credit: Vec::new(),
        },
    }
}

/// The wrong number chosen by the most defenders, if any was chosen by at
/// least two. Ties between equally repeated numbers go to the lowest number
/// so the outcome is deterministic.
fn most_repeated_wrong_number(ballot: &RaidBallot, raider_number: u8) -> Option<(u8, u32)> {
    let mut counts: BTreeMap<u8, u32> = BTreeMap::new();
    for (_, number) in &ballot.defenders {
        if *number != raider_number {
            *counts.entry(*number).or_default() += 1;
        }
    }

    // BTreeMap iterates in ascending number order, so on equal counts the
    // lowest number is kept.
    counts
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .fold(None, |best, (number, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((number, count)),
        })
}
