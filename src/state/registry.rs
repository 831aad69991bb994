use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;

use crate::{
    error::EngineError,
    state::match_data::{ChannelId, Match, Mode, PlayerId, Rules},
};

/// Handle to one registered match.
pub type MatchHandle = Arc<Mutex<Match>>;

/// Concurrency-safe registry of every live match.
///
/// Keyed both by channel (one match per channel) and by player (one match per
/// player across all channels). All mutation goes through the engine's public
/// operations; the maps are never exposed directly.
#[derive(Debug, Default)]
pub struct MatchRegistry {
    matches: DashMap<ChannelId, MatchHandle>,
    players: DashMap<PlayerId, ChannelId>,
}

impl MatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a match in `channel` hosted by `host`.
    ///
    /// Fails without touching either map when the channel already hosts a
    /// match or the host is registered anywhere.
    pub fn create(
        &self,
        channel: ChannelId,
        host: PlayerId,
        mode: Mode,
        rules: Rules,
    ) -> Result<MatchHandle, EngineError> {
        // Claim the host first so a concurrent create in another channel
        // cannot seat the same player twice.
        match self.players.entry(host) {
            Entry::Occupied(existing) => {
                return Err(EngineError::PlayerBusy {
                    player: host,
                    channel: *existing.get(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(channel);
            }
        }

        match self.matches.entry(channel) {
            Entry::Occupied(_) => {
                self.players.remove(&host);
                Err(EngineError::InvalidState(format!(
                    "a match is already running in channel {channel}"
                )))
            }
            Entry::Vacant(slot) => {
                let handle = Arc::new(Mutex::new(Match::new(host, mode, rules)));
                slot.insert(handle.clone());
                info!(%channel, %host, %mode, "match created");
                Ok(handle)
            }
        }
    }

    /// Look up the match hosted in a channel.
    pub fn get(&self, channel: ChannelId) -> Result<MatchHandle, EngineError> {
        self.matches
            .get(&channel)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::NotFound(format!("no match in channel {channel}")))
    }

    /// Channel the player is currently registered in, if any.
    pub fn channel_of(&self, player: PlayerId) -> Option<ChannelId> {
        self.players.get(&player).map(|entry| *entry.value())
    }

    /// Atomically bind a player to a channel, enforcing one match per player.
    ///
    /// The caller adds the player to the roster only after this succeeds, so
    /// a rejected join mutates nothing.
    pub fn register_player(
        &self,
        player: PlayerId,
        channel: ChannelId,
    ) -> Result<(), EngineError> {
        match self.players.entry(player) {
            Entry::Occupied(existing) => Err(EngineError::PlayerBusy {
                player,
                channel: *existing.get(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(channel);
                Ok(())
            }
        }
    }

    /// Release a player's registration (leave/kick).
    pub fn release_player(&self, player: PlayerId) {
        self.players.remove(&player);
    }

    /// Remove a match and release every rostered player.
    pub async fn remove(&self, channel: ChannelId) {
        let Some((_, handle)) = self.matches.remove(&channel) else {
            return;
        };
        let guard = handle.lock().await;
        for player in guard.players() {
            self.players.remove(&player);
        }
        info!(%channel, "match removed from registry");
    }

    /// Number of live matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether no match is registered.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Discard matches still in a pre-active phase older than `max_age`.
    ///
    /// Active and settled matches are never swept. Returns the channels that
    /// were discarded.
    pub async fn sweep_idle(&self, max_age: Duration) -> Vec<ChannelId> {
        let now = Instant::now();
        let candidates: Vec<(ChannelId, MatchHandle)> = self
            .matches
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut swept = Vec::new();
        for (channel, handle) in candidates {
            let expired = {
                let guard = handle.lock().await;
                guard.is_lobby_open() && now.duration_since(guard.created_at) >= max_age
            };
            if expired {
                self.remove(channel).await;
                info!(%channel, "idle lobby expired");
                swept.push(channel);
            }
        }
        swept
    }
}
