use std::time::Duration;

use futures::future::join_all;
use indexmap::IndexMap;
use rand::Rng;
use tracing::debug;

use crate::{
    engine::collector::{PickedNumber, Prompt, ResponseChannel, SolicitRole, solicit},
    state::match_data::{MAX_PICK, PlayerId, RaiderTimeoutPolicy},
};

/// Everything the fan-out collected for one round, fallbacks applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidBallot {
    /// The acting raider.
    pub raider: PlayerId,
    /// The raider's validated or substituted number; `None` only when the
    /// raider timed out under a penalty policy.
    pub raider_number: Option<u8>,
    /// One entry per solicited defender, timed-out entries substituted.
    pub defenders: IndexMap<PlayerId, u8>,
    /// Participants (raider included) that never produced a valid reply.
    pub unresponsive: u32,
}

/// Solicit numbers from the raider and every defender concurrently.
///
/// Every solicitation is launched together and carries its own independent
/// deadline; the round does not proceed until all of them have terminated —
/// there is no early return even when partial results already decide the
/// outcome. Timed-out defenders get a uniformly random substitute so the
/// round can be scored; a timed-out raider is substituted or routed to the
/// penalty path depending on `policy`.
pub async fn collect_round(
    channel: &dyn ResponseChannel,
    round: u32,
    raider: PlayerId,
    defenders: &[PlayerId],
    policy: RaiderTimeoutPolicy,
    deadline: Duration,
) -> RaidBallot {
    let raider_fut = solicit::<PickedNumber>(
        channel,
        raider,
        Prompt::PickNumber {
            round,
            min: 0,
            max: MAX_PICK,
            role: SolicitRole::Raider,
        },
        deadline,
    );

    let defender_futs = defenders.iter().map(|&defender| async move {
        let picked = solicit::<PickedNumber>(
            channel,
            defender,
            Prompt::PickNumber {
                round,
                min: 0,
                max: MAX_PICK,
                role: SolicitRole::Defender,
            },
            deadline,
        )
        .await;
        (defender, picked)
    });

    // Join barrier: one slow participant never cancels another.
    let (raider_pick, defender_picks) = futures::join!(raider_fut, join_all(defender_futs));

    let mut unresponsive = 0u32;
    let mut rng = rand::rng();

    let mut collected = IndexMap::with_capacity(defender_picks.len());
    for (defender, picked) in defender_picks {
        let number = match picked {
            Some(PickedNumber(n)) => n,
            None => {
                unresponsive += 1;
                let substitute = rng.random_range(0..=MAX_PICK);
                debug!(round, %defender, substitute, "defender timed out, substituting");
                substitute
            }
        };
        collected.insert(defender, number);
    }

    let raider_number = match raider_pick {
        Some(PickedNumber(n)) => Some(n),
        None => {
            unresponsive += 1;
            match policy {
                RaiderTimeoutPolicy::Substitute => {
                    let substitute = rng.random_range(0..=MAX_PICK);
                    debug!(round, %raider, substitute, "raider timed out, substituting");
                    Some(substitute)
                }
                RaiderTimeoutPolicy::AwardDefenders | RaiderTimeoutPolicy::DeductDefenders => {
                    debug!(round, %raider, "raider timed out, penalty path");
                    None
                }
            }
        }
    };

    RaidBallot {
        raider,
        raider_number,
        defenders: collected,
        unresponsive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedChannel;

    const RAIDER: PlayerId = PlayerId(1);
    const D1: PlayerId = PlayerId(11);
    const D2: PlayerId = PlayerId(12);
    const D3: PlayerId = PlayerId(13);
    const DEADLINE: Duration = Duration::from_secs(15);

    #[tokio::test(start_paused = true)]
    async fn all_participants_answer() {
        let channel = ScriptedChannel::new();
        channel.script(RAIDER, Duration::from_secs(2), "3");
        channel.script(D1, Duration::from_secs(5), "0");
        channel.script(D2, Duration::from_secs(9), "6");
        channel.script(D3, Duration::from_secs(14), "3");

        let ballot = collect_round(
            &channel,
            1,
            RAIDER,
            &[D1, D2, D3],
            RaiderTimeoutPolicy::Substitute,
            DEADLINE,
        )
        .await;

        assert_eq!(ballot.raider_number, Some(3));
        assert_eq!(ballot.defenders.get(&D1), Some(&0));
        assert_eq!(ballot.defenders.get(&D2), Some(&6));
        assert_eq!(ballot.defenders.get(&D3), Some(&3));
        assert_eq!(ballot.unresponsive, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_defender_gets_a_substitute_without_blocking_others() {
        let channel = ScriptedChannel::new();
        channel.script(RAIDER, Duration::from_secs(1), "2");
        channel.script(D1, Duration::from_secs(1), "5");
        // D2 never answers.

        let ballot = collect_round(
            &channel,
            3,
            RAIDER,
            &[D1, D2],
            RaiderTimeoutPolicy::Substitute,
            DEADLINE,
        )
        .await;

        assert_eq!(ballot.raider_number, Some(2));
        assert_eq!(ballot.defenders.get(&D1), Some(&5));
        let substituted = *ballot.defenders.get(&D2).unwrap();
        assert!(substituted <= MAX_PICK);
        assert_eq!(ballot.unresponsive, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn classic_raider_timeout_substitutes_a_number() {
        let channel = ScriptedChannel::new();
        channel.script(D1, Duration::from_secs(1), "4");

        let ballot = collect_round(
            &channel,
            5,
            RAIDER,
            &[D1],
            RaiderTimeoutPolicy::Substitute,
            DEADLINE,
        )
        .await;

        let substituted = ballot.raider_number.unwrap();
        assert!(substituted <= MAX_PICK);
        assert_eq!(ballot.unresponsive, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn elite_raider_timeout_routes_to_the_penalty_path() {
        let channel = ScriptedChannel::new();
        channel.script(D1, Duration::from_secs(1), "4");
        // D2 silent too: two unresponsive participants in total.

        let ballot = collect_round(
            &channel,
            7,
            RAIDER,
            &[D1, D2],
            RaiderTimeoutPolicy::AwardDefenders,
            DEADLINE,
        )
        .await;

        assert_eq!(ballot.raider_number, None);
        assert_eq!(ballot.unresponsive, 2);
        assert_eq!(ballot.defenders.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_defender_is_treated_like_a_timeout() {
        let channel = ScriptedChannel::new();
        channel.script(RAIDER, Duration::from_secs(1), "1");
        channel.mark_unreachable(D1);

        let start = tokio::time::Instant::now();
        let ballot = collect_round(
            &channel,
            2,
            RAIDER,
            &[D1],
            RaiderTimeoutPolicy::Substitute,
            DEADLINE,
        )
        .await;

        assert!(ballot.defenders.contains_key(&D1));
        assert_eq!(ballot.unresponsive, 1);
        // The unreachable branch resolves without waiting out the deadline.
        assert!(tokio::time::Instant::now().duration_since(start) < DEADLINE);
    }
}
