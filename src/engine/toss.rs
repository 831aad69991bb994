use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::{
    engine::collector::{Prompt, ResponseChannel, solicit},
    state::match_data::{CoinSide, FirstRole, PlayerId, TeamSide, TossRecord},
};

/// How a toss attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TossOutcome {
    /// The caller never called the coin; the whole protocol must be
    /// restarted from step 1 — no partial state carries over.
    Expired,
    /// Both steps resolved; the record is immutable from here on.
    Completed(TossRecord),
}

/// Run the two-step toss protocol between the two captains.
///
/// Step 1 picks a caller uniformly at random and solicits a coin call under
/// its own deadline; step 2 asks the winning captain for the first-role
/// choice under a fresh deadline, defaulting to court (defend first) on
/// timeout.
pub async fn run_toss(
    channel: &dyn ResponseChannel,
    captain_a: PlayerId,
    captain_b: PlayerId,
    deadline: Duration,
) -> TossOutcome {
    let caller_is_a = rand::rng().random_bool(0.5);
    let (caller, caller_side) = if caller_is_a {
        (captain_a, TeamSide::A)
    } else {
        (captain_b, TeamSide::B)
    };
    debug!(%caller, side = %caller_side, "toss caller selected");

    let Some(call) = solicit::<CoinSide>(channel, caller, Prompt::CallCoin, deadline).await
    else {
        debug!(%caller, "toss call expired");
        return TossOutcome::Expired;
    };

    let result = if rand::rng().random_bool(0.5) {
        CoinSide::Heads
    } else {
        CoinSide::Tails
    };

    let winner = if call == result {
        caller_side
    } else {
        caller_side.opponent()
    };
    let winner_captain = match winner {
        TeamSide::A => captain_a,
        TeamSide::B => captain_b,
    };

    let choice = solicit::<FirstRole>(channel, winner_captain, Prompt::ChooseFirstRole, deadline)
        .await
        .unwrap_or(FirstRole::Court);

    debug!(?call, ?result, %winner, ?choice, "toss resolved");
    TossOutcome::Completed(TossRecord {
        caller,
        call,
        result,
        winner,
        choice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedChannel;

    const CAPTAIN_A: PlayerId = PlayerId(1);
    const CAPTAIN_B: PlayerId = PlayerId(2);
    const DEADLINE: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn completed_toss_is_internally_consistent() {
        let channel = ScriptedChannel::new();
        // Either captain may be picked as caller; script both. A reply of
        // "heads" is invalid for the first-role prompt and gets retried, so
        // queueing ["heads", "raid"] per captain covers every pairing.
        for captain in [CAPTAIN_A, CAPTAIN_B] {
            channel.script(captain, Duration::from_secs(1), "heads");
            channel.script(captain, Duration::from_secs(1), "raid");
        }

        let TossOutcome::Completed(record) =
            run_toss(&channel, CAPTAIN_A, CAPTAIN_B, DEADLINE).await
        else {
            panic!("toss unexpectedly expired");
        };

        assert_eq!(record.call, CoinSide::Heads);
        assert_eq!(record.choice, FirstRole::Raid);
        // Winner mapping: caller's side wins iff the coin matched the call.
        let caller_side = if record.caller == CAPTAIN_A {
            TeamSide::A
        } else {
            TeamSide::B
        };
        if record.result == record.call {
            assert_eq!(record.winner, caller_side);
        } else {
            assert_eq!(record.winner, caller_side.opponent());
        }
        // Choosing raid means the winner raids first.
        assert_eq!(record.first_raiding_side(), record.winner);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_caller_expires_the_toss() {
        let channel = ScriptedChannel::new();
        let outcome = run_toss(&channel, CAPTAIN_A, CAPTAIN_B, DEADLINE).await;
        assert_eq!(outcome, TossOutcome::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_winner_defaults_to_court() {
        let channel = ScriptedChannel::new();
        // One call each; nothing scripted for the choice step.
        channel.script(CAPTAIN_A, Duration::from_secs(1), "tails");
        channel.script(CAPTAIN_B, Duration::from_secs(1), "tails");

        let TossOutcome::Completed(record) =
            run_toss(&channel, CAPTAIN_A, CAPTAIN_B, DEADLINE).await
        else {
            panic!("toss unexpectedly expired");
        };

        assert_eq!(record.choice, FirstRole::Court);
        // Court means the winner defends first.
        assert_eq!(record.first_raiding_side(), record.winner.opponent());
    }
}
