//! In-memory response channels used by the engine tests.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Mutex,
    time::Duration,
};

use futures::future::BoxFuture;

use crate::{
    engine::collector::{Prompt, ResponseChannel},
    error::ChannelError,
    state::match_data::PlayerId,
};

/// Channel replaying pre-scripted replies with per-reply delays.
///
/// A player with an empty script stays silent forever, so solicitations run
/// out their deadline under paused time.
#[derive(Default)]
pub(crate) struct ScriptedChannel {
    replies: Mutex<HashMap<PlayerId, VecDeque<(Duration, String)>>>,
    sent: Mutex<Vec<(PlayerId, Prompt)>>,
    unreachable: Mutex<HashSet<PlayerId>>,
    closed: Mutex<HashSet<PlayerId>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply the player sends `after` the previous recv started.
    pub fn script(&self, player: PlayerId, after: Duration, text: &str) {
        self.replies
            .lock()
            .unwrap()
            .entry(player)
            .or_default()
            .push_back((after, text.to_string()));
    }

    /// Make every delivery to this player fail.
    pub fn mark_unreachable(&self, player: PlayerId) {
        self.unreachable.lock().unwrap().insert(player);
    }

    /// Shut down this player's reply transport; sends still go through.
    pub fn close_replies(&self, player: PlayerId) {
        self.closed.lock().unwrap().insert(player);
    }

    /// Every prompt delivered so far, in order.
    pub fn prompts(&self) -> Vec<(PlayerId, Prompt)> {
        self.sent.lock().unwrap().clone()
    }
}

impl ResponseChannel for ScriptedChannel {
    fn send(&self, player: PlayerId, prompt: Prompt) -> BoxFuture<'_, Result<(), ChannelError>> {
        Box::pin(async move {
            if self.unreachable.lock().unwrap().contains(&player) {
                return Err(ChannelError::Unavailable(format!("player {player}")));
            }
            self.sent.lock().unwrap().push((player, prompt));
            Ok(())
        })
    }

    fn recv(&self, player: PlayerId) -> BoxFuture<'_, Result<String, ChannelError>> {
        Box::pin(async move {
            if self.closed.lock().unwrap().contains(&player) {
                return Err(ChannelError::Closed);
            }
            let next = self
                .replies
                .lock()
                .unwrap()
                .get_mut(&player)
                .and_then(|queue| queue.pop_front());
            match next {
                Some((after, text)) => {
                    tokio::time::sleep(after).await;
                    Ok(text)
                }
                None => futures::future::pending().await,
            }
        })
    }
}

/// Channel answering every prompt deterministically and immediately.
///
/// Number picks come from a fixed per-player table; captains always pick the
/// first candidate; toss steps get `heads` / `raid`.
pub(crate) struct AutoChannel {
    numbers: HashMap<PlayerId, u8>,
    last_prompt: Mutex<HashMap<PlayerId, Prompt>>,
}

impl AutoChannel {
    pub fn new(numbers: impl IntoIterator<Item = (PlayerId, u8)>) -> Self {
        Self {
            numbers: numbers.into_iter().collect(),
            last_prompt: Mutex::new(HashMap::new()),
        }
    }
}

impl ResponseChannel for AutoChannel {
    fn send(&self, player: PlayerId, prompt: Prompt) -> BoxFuture<'_, Result<(), ChannelError>> {
        Box::pin(async move {
            // Retries and confirmations keep the original question current.
            if !matches!(prompt, Prompt::Retry { .. } | Prompt::Confirm { .. }) {
                self.last_prompt.lock().unwrap().insert(player, prompt);
            }
            Ok(())
        })
    }

    fn recv(&self, player: PlayerId) -> BoxFuture<'_, Result<String, ChannelError>> {
        Box::pin(async move {
            let prompt = self.last_prompt.lock().unwrap().get(&player).cloned();
            match prompt {
                Some(Prompt::PickNumber { .. }) => {
                    let number = self.numbers.get(&player).copied().unwrap_or(0);
                    Ok(number.to_string())
                }
                Some(Prompt::PickRaider { .. }) => Ok("1".to_string()),
                Some(Prompt::CallCoin) => Ok("heads".to_string()),
                Some(Prompt::ChooseFirstRole) => Ok("raid".to_string()),
                _ => futures::future::pending().await,
            }
        })
    }
}
