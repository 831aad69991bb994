use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::{
    error::ChannelError,
    state::match_data::{CoinSide, FirstRole, MAX_PICK, PlayerId},
};

/// Which side of the raid a number solicitation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolicitRole {
    /// The acting raider.
    Raider,
    /// A defending player.
    Defender,
}

/// One declarative request pushed to a participant's private channel.
///
/// Every timed interaction in the engine (raid numbers, raider selection,
/// both toss steps) goes through this single type, so the timeout, retry,
/// and validation logic exists exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Prompt {
    /// Pick a number in `[min, max]` for the current round.
    PickNumber {
        /// Round the pick belongs to.
        round: u32,
        /// Smallest accepted number.
        min: u8,
        /// Largest accepted number.
        max: u8,
        /// Whether the participant raids or defends.
        role: SolicitRole,
    },
    /// Captain: pick the round's raider from `candidates` (1-based index).
    PickRaider {
        /// Round the selection belongs to.
        round: u32,
        /// Eligible raiders, in roster order.
        candidates: Vec<PlayerId>,
    },
    /// Call the coin for the toss.
    CallCoin,
    /// Toss winner: choose to raid or defend first.
    ChooseFirstRole,
    /// The previous reply was invalid; try again within the same deadline.
    Retry {
        /// Why the reply was rejected.
        reason: String,
    },
    /// The reply was accepted.
    Confirm {
        /// Echo of the accepted reply.
        echo: String,
    },
}

/// Private, out-of-band reply channel to the participants.
///
/// Implemented by the chat front-end; the engine only ever pushes [`Prompt`]s
/// and pulls raw reply strings. Unreachable participants surface as
/// [`ChannelError`], which the collector treats exactly like a timeout.
pub trait ResponseChannel: Send + Sync {
    /// Deliver a prompt to the participant's private channel.
    fn send(&self, player: PlayerId, prompt: Prompt) -> BoxFuture<'_, Result<(), ChannelError>>;
    /// Wait for the participant's next raw reply.
    fn recv(&self, player: PlayerId) -> BoxFuture<'_, Result<String, ChannelError>>;
}

/// A reply kind the collector knows how to validate.
pub trait FromReply: Sized {
    /// Parse a trimmed raw reply, describing the problem on failure.
    fn parse(raw: &str) -> Result<Self, String>;
}

/// A validated number pick in `[0, MAX_PICK]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickedNumber(pub u8);

impl FromReply for PickedNumber {
    fn parse(raw: &str) -> Result<Self, String> {
        let number: u8 = raw
            .parse()
            .map_err(|_| format!("expected a number between 0 and {MAX_PICK}"))?;
        if number > MAX_PICK {
            return Err(format!("{number} is out of range, pick 0 to {MAX_PICK}"));
        }
        Ok(PickedNumber(number))
    }
}

impl FromReply for CoinSide {
    fn parse(raw: &str) -> Result<Self, String> {
        match raw.to_ascii_lowercase().as_str() {
            "heads" | "h" => Ok(CoinSide::Heads),
            "tails" | "t" => Ok(CoinSide::Tails),
            other => Err(format!("`{other}` is not a coin side, say heads or tails")),
        }
    }
}

impl FromReply for FirstRole {
    fn parse(raw: &str) -> Result<Self, String> {
        match raw.to_ascii_lowercase().as_str() {
            "raid" | "r" => Ok(FirstRole::Raid),
            "court" | "c" | "defend" => Ok(FirstRole::Court),
            other => Err(format!("`{other}` is not a choice, say raid or court")),
        }
    }
}

/// Solicit one validated reply of type `T` from a participant.
///
/// The deadline is fixed when the prompt is issued; invalid replies trigger a
/// [`Prompt::Retry`] but never extend it. Returns `None` on deadline expiry
/// or when the participant is unreachable.
pub async fn solicit<T: FromReply>(
    channel: &dyn ResponseChannel,
    player: PlayerId,
    prompt: Prompt,
    deadline: Duration,
) -> Option<T> {
    solicit_with(channel, player, prompt, deadline, T::parse).await
}

/// Solicit a 1-based pick out of `len` options, returning the 0-based index.
pub async fn solicit_index(
    channel: &dyn ResponseChannel,
    player: PlayerId,
    prompt: Prompt,
    len: usize,
    deadline: Duration,
) -> Option<usize> {
    solicit_with(channel, player, prompt, deadline, |raw| {
        let pick: usize = raw
            .parse()
            .map_err(|_| format!("expected a number between 1 and {len}"))?;
        if pick == 0 || pick > len {
            return Err(format!("{pick} is out of range, pick 1 to {len}"));
        }
        Ok(pick - 1)
    })
    .await
}

async fn solicit_with<T>(
    channel: &dyn ResponseChannel,
    player: PlayerId,
    prompt: Prompt,
    deadline: Duration,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Option<T> {
    if let Err(err) = channel.send(player, prompt).await {
        debug!(%player, error = %err, "participant unreachable, falling back");
        return None;
    }

    let cutoff = Instant::now() + deadline;
    loop {
        let raw = match timeout_at(cutoff, channel.recv(player)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                debug!(%player, error = %err, "reply channel failed, falling back");
                return None;
            }
            Err(_) => {
                debug!(%player, "solicitation deadline expired");
                return None;
            }
        };

        match parse(raw.trim()) {
            Ok(value) => {
                let _ = channel
                    .send(
                        player,
                        Prompt::Confirm {
                            echo: raw.trim().to_string(),
                        },
                    )
                    .await;
                return Some(value);
            }
            Err(reason) => {
                if channel
                    .send(player, Prompt::Retry { reason })
                    .await
                    .is_err()
                {
                    return None;
                }
            }
        }
    }
}
