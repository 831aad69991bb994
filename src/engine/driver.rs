//! Round-by-round orchestration: toss, raider selection, fan-out,
//! arbitration, score application, and settlement.

use rand::Rng;
use tracing::{info, warn};

use crate::{
    engine::{
        EngineEvent, MatchEngine, Scorecard,
        arbiter::arbitrate,
        collector::{Prompt, solicit_index},
        fanout::collect_round,
        settlement::{Settlement, settle},
        toss::{TossOutcome, run_toss},
    },
    error::EngineError,
    state::{
        lifecycle::{MatchEvent, MatchPhase},
        match_data::{ChannelId, PlayerId, RoundResult, Rules, TeamSide},
        registry::MatchHandle,
    },
};

impl MatchEngine {
    /// Run the toss protocol for the match hosted in `channel`.
    ///
    /// Opens the toss from the lobby on first call; an expired attempt leaves
    /// the match in the toss-pending phase so the protocol can simply be run
    /// again from step 1. Only the host or a captain may trigger it.
    pub async fn run_toss_for(
        &self,
        channel: ChannelId,
        requester: PlayerId,
    ) -> Result<TossOutcome, EngineError> {
        let handle = self.registry().get(channel)?;

        let (captain_a, captain_b) = {
            let mut game = handle.lock().await;
            if !game.is_host(requester) && !game.is_captain(requester) {
                return Err(EngineError::Unauthorized(
                    "only the host or a captain can run the toss".into(),
                ));
            }
            let captains = game.captains().ok_or_else(|| {
                EngineError::InvalidState("both teams need a captain before the toss".into())
            })?;
            // A pending toss is re-run in place; any other phase must accept
            // the open event or the request is rejected.
            if !matches!(game.phase(), MatchPhase::TossPending) {
                game.apply_event(MatchEvent::OpenToss)?;
            }
            captains
        };

        let outcome = run_toss(
            self.response_channel(),
            captain_a,
            captain_b,
            self.config().toss_deadline,
        )
        .await;

        match outcome {
            TossOutcome::Expired => {
                info!(%channel, "toss expired, awaiting a fresh attempt");
            }
            TossOutcome::Completed(record) => {
                let mut game = handle.lock().await;
                game.apply_event(MatchEvent::TossResolved)?;
                game.toss = Some(record);
                info!(%channel, winner = %record.winner, choice = ?record.choice, "toss resolved");
                drop(game);
                self.emit(EngineEvent::TossResolved { channel, record });
            }
        }
        Ok(outcome)
    }

    /// Start the match and drive every round through to settlement.
    ///
    /// Host-only; requires a resolved toss and a valid roster. The future
    /// resolves once the settlement has been emitted and the match removed
    /// from the registry.
    pub async fn start_match(
        &self,
        channel: ChannelId,
        requester: PlayerId,
    ) -> Result<Settlement, EngineError> {
        let handle = self.registry().get(channel)?;

        let rules = {
            let mut game = handle.lock().await;
            if !game.is_host(requester) {
                return Err(EngineError::Unauthorized(
                    "only the host can start the match".into(),
                ));
            }
            game.validate_start_roster().map_err(EngineError::Roster)?;
            if game.captains().is_none() {
                return Err(EngineError::InvalidState(
                    "both teams need a captain before the match can start".into(),
                ));
            }
            game.apply_event(MatchEvent::StartMatch)?;
            game.seed_for_start();
            info!(%channel, mode = %game.mode, rounds = game.rules.rounds, "match started");
            game.rules
        };

        for round in 1..=rules.rounds {
            self.play_round(&handle, channel, round, rules).await?;
            if round < rules.rounds {
                tokio::time::sleep(self.config().inter_round_delay).await;
            }
        }

        let settlement = {
            let game = handle.lock().await;
            settle(&game)
        };

        let stored = self.persist(&settlement).await;
        info!(
            %channel,
            winner = ?settlement.winner,
            score_a = settlement.score_a,
            score_b = settlement.score_b,
            stored,
            "match settled"
        );
        self.emit(EngineEvent::MatchSettled {
            channel,
            settlement: settlement.clone(),
            stored,
        });
        self.registry().remove(channel).await;
        Ok(settlement)
    }

    /// Play one round: pick the raider, fan out, arbitrate, apply the verdict.
    ///
    /// The match lock is released for the entire solicitation window and
    /// re-taken only to apply the verdict atomically.
    async fn play_round(
        &self,
        handle: &MatchHandle,
        channel: ChannelId,
        round: u32,
        rules: Rules,
    ) -> Result<(), EngineError> {
        let (raiding_side, captain, raiders, defenders) = {
            let game = handle.lock().await;
            let side = game.raiding_side;
            let captain = game.team(side).captain.unwrap_or(game.host);
            let raiders = game.eligible_raiders(side);
            let defenders = game.eligible_defenders(side.opponent());
            (side, captain, raiders, defenders)
        };

        let pick = solicit_index(
            self.response_channel(),
            captain,
            Prompt::PickRaider {
                round,
                candidates: raiders.clone(),
            },
            raiders.len(),
            self.config().selection_deadline,
        )
        .await;
        let raider = match pick {
            Some(index) => raiders[index],
            None => {
                let index = rand::rng().random_range(0..raiders.len());
                info!(%channel, round, raider = %raiders[index], "captain silent, raider picked at random");
                raiders[index]
            }
        };

        let ballot = collect_round(
            self.response_channel(),
            round,
            raider,
            &defenders,
            rules.raider_timeout,
            self.config().response_deadline,
        )
        .await;
        let verdict = arbitrate(&ballot, rules.raider_timeout);

        let scorecard = {
            let mut game = handle.lock().await;
            let defending_side = raiding_side.opponent();
            game.add_score(raiding_side, verdict.raiding_delta);
            game.add_score(defending_side, verdict.defending_delta);
            game.deduct_score(defending_side, verdict.defending_deduction);
            for (player, points) in &verdict.raid_credit {
                game.stat_mut(*player).raid_points += points;
            }
            for player in &verdict.tackle_credit {
                game.stat_mut(*player).tackle_points += 1;
            }

            let summary = verdict.summary();
            game.last_round = Some(RoundResult {
                number: round,
                raiding_side,
                raider,
                raider_number: ballot.raider_number,
                defender_numbers: ballot.defenders.clone(),
                outcome: verdict.outcome,
                summary: summary.clone(),
            });
            game.apply_event(MatchEvent::RoundCompleted)?;
            game.raiding_side = defending_side;

            Scorecard {
                round,
                score_a: game.score(TeamSide::A),
                score_b: game.score(TeamSide::B),
                raider,
                summary,
            }
        };

        self.emit(EngineEvent::RoundCompleted { channel, scorecard });
        Ok(())
    }

    /// Push a settlement's records to the installed stats store, if any.
    async fn persist(&self, settlement: &Settlement) -> bool {
        let Some(store) = self.stats_store().await else {
            return false;
        };
        match store.upsert(settlement.records.clone()).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "failed to persist career records");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::EngineConfig,
        dao::stats::MemoryStatsStore,
        engine::testing::{AutoChannel, ScriptedChannel},
        state::match_data::Mode,
    };

    const CHANNEL: ChannelId = ChannelId(500);
    const HOST: PlayerId = PlayerId(1);

    /// Seed a 3v3 classic roster (A = 1,2,3 / B = 101,102,103) with the two
    /// captains assigned.
    async fn seed_roster(engine: &MatchEngine) -> MatchHandle {
        let handle = engine
            .registry()
            .create(CHANNEL, HOST, Mode::Classic, Rules::standard(Mode::Classic))
            .unwrap();
        {
            let mut game = handle.lock().await;
            game.team_mut(TeamSide::A)
                .players
                .extend([PlayerId(2), PlayerId(3)]);
            game.team_mut(TeamSide::B)
                .players
                .extend([PlayerId(101), PlayerId(102), PlayerId(103)]);
            game.team_mut(TeamSide::A).captain = Some(PlayerId(1));
            game.team_mut(TeamSide::B).captain = Some(PlayerId(101));
        }
        handle
    }

    /// Engine where every team A player answers 2 and every team B player
    /// answers 5. Captains pick the first candidate, the toss completes
    /// instantly.
    async fn seeded_engine() -> crate::engine::SharedEngine {
        let numbers = [
            (PlayerId(1), 2),
            (PlayerId(2), 2),
            (PlayerId(3), 2),
            (PlayerId(101), 5),
            (PlayerId(102), 5),
            (PlayerId(103), 5),
        ];
        let engine = MatchEngine::new(
            Arc::new(AutoChannel::new(numbers)),
            EngineConfig::default(),
        );
        seed_roster(&engine).await;
        engine
    }

    #[tokio::test(start_paused = true)]
    async fn toss_requires_host_or_captain() {
        let engine = seeded_engine().await;
        let err = engine
            .run_toss_for(CHANNEL, PlayerId(102))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized(_)));

        // A captain other than the host is allowed.
        let outcome = engine.run_toss_for(CHANNEL, PlayerId(101)).await.unwrap();
        assert!(matches!(outcome, TossOutcome::Completed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn an_expired_toss_is_rerun_from_a_pending_phase() {
        let channel = Arc::new(ScriptedChannel::new());
        let engine = MatchEngine::new(channel.clone(), EngineConfig::default());
        let handle = seed_roster(&engine).await;

        // Nothing scripted: the caller stays silent and the attempt expires.
        let outcome = engine.run_toss_for(CHANNEL, HOST).await.unwrap();
        assert!(matches!(outcome, TossOutcome::Expired));
        assert_eq!(handle.lock().await.phase(), MatchPhase::TossPending);

        // The next attempt restarts the protocol in place instead of
        // reopening the toss from the lobby.
        for captain in [PlayerId(1), PlayerId(101)] {
            channel.script(captain, Duration::from_secs(1), "heads");
            channel.script(captain, Duration::from_secs(1), "raid");
        }
        let outcome = engine.run_toss_for(CHANNEL, HOST).await.unwrap();
        assert!(matches!(outcome, TossOutcome::Completed(_)));

        let game = handle.lock().await;
        assert_eq!(game.phase(), MatchPhase::TossDone);
        assert!(game.toss.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn start_requires_a_resolved_toss() {
        let engine = seeded_engine().await;
        let err = engine.start_match(CHANNEL, HOST).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidPhase(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_host_only() {
        let engine = seeded_engine().await;
        engine.run_toss_for(CHANNEL, HOST).await.unwrap();
        let err = engine
            .start_match(CHANNEL, PlayerId(101))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn full_match_runs_to_a_deterministic_tie() {
        let engine = seeded_engine().await;
        let mut events = engine.subscribe();

        let outcome = engine.run_toss_for(CHANNEL, HOST).await.unwrap();
        assert!(matches!(outcome, TossOutcome::Completed(_)));

        // Per round the three defenders coincide on one wrong number, so
        // every raid is a +3 super raid. Sides alternate over 10 rounds:
        // five raids each, 15 points each, a tie.
        let settlement = engine.start_match(CHANNEL, HOST).await.unwrap();
        assert_eq!((settlement.score_a, settlement.score_b), (15, 15));
        assert_eq!(settlement.winner, None);
        assert_eq!(settlement.mvp, None);
        // Captains always pick candidate 1, so the two captains carry all
        // raid points and tie as top raider; the lowest id wins.
        assert_eq!(settlement.top_raider, Some(PlayerId(1)));
        assert_eq!(settlement.top_defender, None);

        assert!(engine.registry().is_empty());
        assert_eq!(engine.registry().channel_of(HOST), None);

        let mut rounds_seen = 0;
        let mut settled_seen = false;
        while let Ok(event) = events.try_recv() {
            match event {
                EngineEvent::RoundCompleted { scorecard, .. } => {
                    rounds_seen += 1;
                    assert_eq!(scorecard.round, rounds_seen);
                }
                EngineEvent::MatchSettled { stored, .. } => {
                    settled_seen = true;
                    // No store installed.
                    assert!(!stored);
                }
                _ => {}
            }
        }
        assert_eq!(rounds_seen, 10);
        assert!(settled_seen);
    }

    #[tokio::test(start_paused = true)]
    async fn settlement_reaches_an_installed_store() {
        let engine = seeded_engine().await;
        let store = Arc::new(MemoryStatsStore::new());
        engine.install_store(store.clone()).await;

        engine.run_toss_for(CHANNEL, HOST).await.unwrap();
        engine.start_match(CHANNEL, HOST).await.unwrap();

        let career = store.career(PlayerId(1)).unwrap();
        assert_eq!(career.matches, 1);
        assert_eq!(career.ties, 1);
        assert_eq!(career.raid_points, 15);
        assert_eq!(career.super10s, 1);
    }
}
