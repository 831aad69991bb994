//! Simulation binary: runs one full classic match with bot participants.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use futures::future::BoxFuture;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kabaddi_engine::{
    config::EngineConfig,
    dao::stats::MemoryStatsStore,
    engine::{
        MatchEngine,
        collector::{Prompt, ResponseChannel},
        toss::TossOutcome,
    },
    error::ChannelError,
    services::lobby,
    state::match_data::{ChannelId, Mode, PlayerId, Rules},
};

/// Response channel whose participants are bots answering every prompt with
/// a random valid reply after a short delay.
#[derive(Default)]
struct SimChannel {
    prompts: Mutex<HashMap<PlayerId, Prompt>>,
}

impl ResponseChannel for SimChannel {
    fn send(&self, player: PlayerId, prompt: Prompt) -> BoxFuture<'_, Result<(), ChannelError>> {
        Box::pin(async move {
            // Retries and confirmations keep the original question current.
            if !matches!(prompt, Prompt::Retry { .. } | Prompt::Confirm { .. }) {
                self.prompts.lock().await.insert(player, prompt);
            }
            Ok(())
        })
    }

    fn recv(&self, player: PlayerId) -> BoxFuture<'_, Result<String, ChannelError>> {
        Box::pin(async move {
            let Some(prompt) = self.prompts.lock().await.get(&player).cloned() else {
                return futures::future::pending().await;
            };
            let (delay_ms, reply) = {
                let mut rng = rand::rng();
                let reply = match prompt {
                    Prompt::PickNumber { min, max, .. } => {
                        rng.random_range(min..=max).to_string()
                    }
                    Prompt::PickRaider { candidates, .. } => {
                        rng.random_range(1..=candidates.len()).to_string()
                    }
                    Prompt::CallCoin => {
                        let side = if rng.random_bool(0.5) { "heads" } else { "tails" };
                        side.to_string()
                    }
                    Prompt::ChooseFirstRole => {
                        let choice = if rng.random_bool(0.5) { "raid" } else { "court" };
                        choice.to_string()
                    }
                    Prompt::Retry { .. } | Prompt::Confirm { .. } => String::new(),
                };
                (rng.random_range(200..900u64), reply)
            };
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(reply)
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = EngineConfig::load();
    let engine = MatchEngine::new(Arc::new(SimChannel::default()), config);
    engine.install_store(Arc::new(MemoryStatsStore::new())).await;

    let mut events = engine.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(?event, "engine event");
        }
    });

    let channel = ChannelId(1);
    let host = PlayerId(1);
    lobby::create_match(&engine, channel, host, Mode::Classic, Rules::standard(Mode::Classic))?;
    for id in 2..=6 {
        lobby::join(&engine, channel, PlayerId(id)).await?;
    }
    // Host captains team A; the first joiner landed on B and captains it.
    lobby::set_captain(&engine, channel, host, PlayerId(1)).await?;
    lobby::set_captain(&engine, channel, host, PlayerId(2)).await?;

    while !matches!(
        engine.run_toss_for(channel, host).await?,
        TossOutcome::Completed(_)
    ) {}

    let settlement = engine.start_match(channel, host).await?;
    info!(
        winner = ?settlement.winner,
        score_a = settlement.score_a,
        score_b = settlement.score_b,
        mvp = ?settlement.mvp,
        "simulation finished"
    );
    println!("{}", serde_json::to_string_pretty(&settlement)?);
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
