//! The match engine: response collection, toss, arbitration, settlement, and
//! the driver orchestrating them round by round.

pub mod arbiter;
pub mod collector;
pub mod driver;
pub mod fanout;
pub mod settlement;
pub mod toss;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::info;

use crate::{
    config::EngineConfig,
    dao::stats::StatsStore,
    engine::{collector::ResponseChannel, settlement::Settlement},
    state::{
        match_data::{ChannelId, PlayerId, TossRecord},
        registry::MatchRegistry,
    },
};

/// Capacity of the broadcast channel carrying [`EngineEvent`]s.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Engine shared across every command front-end task.
pub type SharedEngine = Arc<MatchEngine>;

/// Public snapshot of a completed round, for scorecard rendering.
#[derive(Debug, Clone, Serialize)]
pub struct Scorecard {
    /// Round number, 1-based.
    pub round: u32,
    /// Team A's score after the round.
    pub score_a: u32,
    /// Team B's score after the round.
    pub score_b: u32,
    /// The round's acting raider.
    pub raider: PlayerId,
    /// One-line narrative of the outcome.
    pub summary: String,
}

/// Notifications emitted on the engine's broadcast stream.
///
/// Front-ends subscribe to render public announcements; dropped receivers
/// never block the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EngineEvent {
    /// The toss completed and the first raiding side is fixed.
    TossResolved {
        /// Channel hosting the match.
        channel: ChannelId,
        /// The immutable toss record.
        record: TossRecord,
    },
    /// A round was scored and applied.
    RoundCompleted {
        /// Channel hosting the match.
        channel: ChannelId,
        /// Snapshot for the public scorecard.
        scorecard: Scorecard,
    },
    /// All rounds completed; the match left the registry.
    MatchSettled {
        /// Channel that hosted the match.
        channel: ChannelId,
        /// The final record.
        settlement: Settlement,
        /// Whether the career records reached the stats store.
        stored: bool,
    },
    /// An idle, unstarted lobby was discarded by the sweep.
    MatchExpired {
        /// Channel that hosted the lobby.
        channel: ChannelId,
    },
}

/// Root object wiring the registry, the response channel, the event stream,
/// and the optional stats store together.
pub struct MatchEngine {
    registry: MatchRegistry,
    channel: Arc<dyn ResponseChannel>,
    events: broadcast::Sender<EngineEvent>,
    store: RwLock<Option<Arc<dyn StatsStore>>>,
    config: EngineConfig,
}

impl MatchEngine {
    /// Build an engine around a participant response channel.
    pub fn new(channel: Arc<dyn ResponseChannel>, config: EngineConfig) -> SharedEngine {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            registry: MatchRegistry::new(),
            channel,
            events,
            store: RwLock::new(None),
            config,
        })
    }

    /// Subscribe to the engine's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// The live-match registry.
    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    /// The runtime configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Install (or replace) the stats store settlements are persisted to.
    pub async fn install_store(&self, store: Arc<dyn StatsStore>) {
        *self.store.write().await = Some(store);
        info!("stats store installed");
    }

    /// Detach the stats store; later settlements are announced but not stored.
    pub async fn clear_store(&self) {
        *self.store.write().await = None;
    }

    /// Discard lobbies older than the configured idle timeout.
    ///
    /// Returns the swept channels; each one also gets a
    /// [`EngineEvent::MatchExpired`] on the event stream.
    pub async fn sweep_idle(&self) -> Vec<ChannelId> {
        let swept = self.registry.sweep_idle(self.config.idle_timeout).await;
        for &channel in &swept {
            self.emit(EngineEvent::MatchExpired { channel });
        }
        swept
    }

    pub(crate) fn response_channel(&self) -> &dyn ResponseChannel {
        self.channel.as_ref()
    }

    pub(crate) async fn stats_store(&self) -> Option<Arc<dyn StatsStore>> {
        self.store.read().await.clone()
    }

    pub(crate) fn emit(&self, event: EngineEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{engine::testing::AutoChannel, state::match_data::{Mode, Rules}};

    #[tokio::test(start_paused = true)]
    async fn sweep_announces_expired_lobbies() {
        let engine = MatchEngine::new(
            Arc::new(AutoChannel::new(std::iter::empty())),
            EngineConfig::default(),
        );
        let mut events = engine.subscribe();
        engine
            .registry()
            .create(
                ChannelId(7),
                PlayerId(1),
                Mode::Classic,
                Rules::standard(Mode::Classic),
            )
            .unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        let swept = engine.sweep_idle().await;
        assert_eq!(swept, vec![ChannelId(7)]);

        let event = events.try_recv().unwrap();
        assert!(matches!(
            event,
            EngineEvent::MatchExpired { channel: ChannelId(7) }
        ));
    }
}
