use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;

use crate::{
    dao::storage::StorageResult,
    engine::settlement::PlayerRecord,
    state::match_data::PlayerId,
};

/// Career-wide aggregate for one player, across every settled match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CareerStats {
    /// Matches played.
    pub matches: u32,
    /// Matches won.
    pub wins: u32,
    /// Matches lost.
    pub losses: u32,
    /// Matches tied.
    pub ties: u32,
    /// Lifetime raid points.
    pub raid_points: u32,
    /// Lifetime tackle points.
    pub tackle_points: u32,
    /// Matches with a super-10 raid performance.
    pub super10s: u32,
    /// Matches with a high-5 defensive performance.
    pub high5s: u32,
    /// MVP awards received.
    pub mvps: u32,
    /// Consecutive wins; resets to zero on any loss or tie.
    pub win_streak: u32,
    /// When the most recent match settled.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_match: Option<OffsetDateTime>,
}

impl CareerStats {
    fn absorb(&mut self, record: &PlayerRecord, settled_at: OffsetDateTime) {
        self.matches += 1;
        if record.won {
            self.wins += 1;
            self.win_streak += 1;
        } else {
            if record.lost {
                self.losses += 1;
            } else {
                self.ties += 1;
            }
            self.win_streak = 0;
        }
        self.raid_points += record.raid_points;
        self.tackle_points += record.tackle_points;
        self.super10s += u32::from(record.super10);
        self.high5s += u32::from(record.high5);
        self.mvps += u32::from(record.mvp);
        self.last_match = Some(settled_at);
    }
}

/// Sink for the per-player records a settlement produces.
///
/// Dyn-safe so front-ends can inject their own backend; the engine only ever
/// holds an `Arc<dyn StatsStore>` and fires one upsert per settled match.
pub trait StatsStore: Send + Sync {
    /// Merge one settled match's records into the career aggregates.
    fn upsert(&self, records: Vec<PlayerRecord>) -> BoxFuture<'static, StorageResult<()>>;
    /// Probe the backing store.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// In-process [`StatsStore`] backed by a concurrent map. Never fails.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatsStore {
    players: Arc<DashMap<PlayerId, CareerStats>>,
}

impl MemoryStatsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot one player's career aggregate.
    pub fn career(&self, player: PlayerId) -> Option<CareerStats> {
        self.players.get(&player).map(|entry| *entry.value())
    }
}

impl StatsStore for MemoryStatsStore {
    fn upsert(&self, records: Vec<PlayerRecord>) -> BoxFuture<'static, StorageResult<()>> {
        let players = self.players.clone();
        Box::pin(async move {
            let settled_at = OffsetDateTime::now_utc();
            for record in &records {
                players
                    .entry(record.player)
                    .or_default()
                    .absorb(record, settled_at);
            }
            debug!(count = records.len(), "career records upserted");
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::match_data::TeamSide;

    fn record(player: u64, won: bool, lost: bool, raid: u32, tackle: u32) -> PlayerRecord {
        PlayerRecord {
            player: PlayerId(player),
            team: TeamSide::A,
            won,
            lost,
            tied: !won && !lost,
            raid_points: raid,
            tackle_points: tackle,
            super10: raid > 5,
            high5: tackle > 5,
            mvp: false,
        }
    }

    #[tokio::test]
    async fn upsert_accumulates_across_matches() {
        let store = MemoryStatsStore::new();
        store
            .upsert(vec![record(1, true, false, 7, 1)])
            .await
            .unwrap();
        store
            .upsert(vec![record(1, true, false, 2, 3)])
            .await
            .unwrap();

        let career = store.career(PlayerId(1)).unwrap();
        assert_eq!(career.matches, 2);
        assert_eq!(career.wins, 2);
        assert_eq!(career.win_streak, 2);
        assert_eq!(career.raid_points, 9);
        assert_eq!(career.tackle_points, 4);
        assert_eq!(career.super10s, 1);
        assert!(career.last_match.is_some());
    }

    #[tokio::test]
    async fn loss_and_tie_reset_the_win_streak() {
        let store = MemoryStatsStore::new();
        store
            .upsert(vec![record(2, true, false, 1, 0)])
            .await
            .unwrap();
        store
            .upsert(vec![record(2, false, true, 0, 0)])
            .await
            .unwrap();

        let career = store.career(PlayerId(2)).unwrap();
        assert_eq!(career.win_streak, 0);
        assert_eq!((career.wins, career.losses, career.ties), (1, 1, 0));

        store
            .upsert(vec![record(2, true, false, 0, 0)])
            .await
            .unwrap();
        store
            .upsert(vec![record(2, false, false, 0, 0)])
            .await
            .unwrap();
        let career = store.career(PlayerId(2)).unwrap();
        assert_eq!(career.win_streak, 0);
        assert_eq!(career.ties, 1);
    }

    #[tokio::test]
    async fn unknown_player_has_no_career() {
        let store = MemoryStatsStore::new();
        assert_eq!(store.career(PlayerId(99)), None);
    }
}
