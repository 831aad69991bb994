//! Roster management commands, valid only while the lobby is open.
//!
//! Every function validates phase and authorization up front; a returned
//! error means neither the match nor the registry was touched.

use tracing::info;

use crate::{
    engine::MatchEngine,
    error::EngineError,
    state::match_data::{ChannelId, Match, Mode, PlayerId, Role, Rules, TeamSide},
};

/// Create a match hosted by `host` in `channel`.
pub fn create_match(
    engine: &MatchEngine,
    channel: ChannelId,
    host: PlayerId,
    mode: Mode,
    rules: Rules,
) -> Result<(), EngineError> {
    engine.registry().create(channel, host, mode, rules)?;
    Ok(())
}

/// Join the match in `channel`, seated on the smaller team.
///
/// Ties go to team A. Fails when the match is full, the roster is locked, or
/// the player already sits in any match.
pub async fn join(
    engine: &MatchEngine,
    channel: ChannelId,
    player: PlayerId,
) -> Result<TeamSide, EngineError> {
    let handle = engine.registry().get(channel)?;
    let mut game = handle.lock().await;
    ensure_lobby_open(&game)?;
    if game.side_of(player).is_some() {
        return Err(EngineError::InvalidState(format!(
            "player {player} is already in this match"
        )));
    }
    let len_a = game.team(TeamSide::A).players.len();
    let len_b = game.team(TeamSide::B).players.len();
    if len_a + len_b >= game.mode.team_size() * 2 {
        return Err(EngineError::Roster("the match is full".into()));
    }

    engine.registry().register_player(player, channel)?;
    let side = if len_a <= len_b { TeamSide::A } else { TeamSide::B };
    game.team_mut(side).players.push(player);
    info!(%channel, %player, %side, "player joined");
    Ok(side)
}

/// Leave the match. The host cannot leave; they cancel instead.
pub async fn leave(
    engine: &MatchEngine,
    channel: ChannelId,
    player: PlayerId,
) -> Result<(), EngineError> {
    let handle = engine.registry().get(channel)?;
    let mut game = handle.lock().await;
    ensure_lobby_open(&game)?;
    if game.is_host(player) {
        return Err(EngineError::InvalidState(
            "the host cannot leave; cancel the match instead".into(),
        ));
    }
    let side = rostered_side(&game, player)?;
    game.team_mut(side).remove(player);
    engine.registry().release_player(player);
    info!(%channel, %player, "player left");
    Ok(())
}

/// Remove a player from the match. Host-only.
pub async fn kick(
    engine: &MatchEngine,
    channel: ChannelId,
    requester: PlayerId,
    target: PlayerId,
) -> Result<(), EngineError> {
    let handle = engine.registry().get(channel)?;
    let mut game = handle.lock().await;
    ensure_lobby_open(&game)?;
    ensure_host(&game, requester, "kick a player")?;
    if game.is_host(target) {
        return Err(EngineError::InvalidState("the host cannot be kicked".into()));
    }
    let side = rostered_side(&game, target)?;
    game.team_mut(side).remove(target);
    engine.registry().release_player(target);
    info!(%channel, %target, "player kicked");
    Ok(())
}

/// Move a player to the other team. Host-only; captaincy and role tags do
/// not survive the move.
pub async fn swap(
    engine: &MatchEngine,
    channel: ChannelId,
    requester: PlayerId,
    player: PlayerId,
) -> Result<TeamSide, EngineError> {
    let handle = engine.registry().get(channel)?;
    let mut game = handle.lock().await;
    ensure_lobby_open(&game)?;
    ensure_host(&game, requester, "swap a player")?;
    let side = rostered_side(&game, player)?;
    let target = side.opponent();
    if game.team(target).players.len() >= game.mode.team_size() {
        return Err(EngineError::Roster(format!(
            "{} is full",
            game.team(target).name
        )));
    }
    game.team_mut(side).remove(player);
    game.team_mut(target).players.push(player);
    info!(%channel, %player, from = %side, to = %target, "player swapped");
    Ok(target)
}

/// Rename a team. Allowed to the host or that team's captain.
pub async fn rename_team(
    engine: &MatchEngine,
    channel: ChannelId,
    requester: PlayerId,
    side: TeamSide,
    name: &str,
) -> Result<(), EngineError> {
    let handle = engine.registry().get(channel)?;
    let mut game = handle.lock().await;
    ensure_lobby_open(&game)?;
    if !game.is_host(requester) && game.team(side).captain != Some(requester) {
        return Err(EngineError::Unauthorized(
            "only the host or the team's captain can rename it".into(),
        ));
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidState("a team name cannot be empty".into()));
    }
    if game
        .team(side.opponent())
        .name
        .eq_ignore_ascii_case(name)
    {
        return Err(EngineError::InvalidState(
            "both teams cannot share a name".into(),
        ));
    }
    game.team_mut(side).name = name.to_string();
    info!(%channel, %side, name, "team renamed");
    Ok(())
}

/// Assign a team's captain. Host-only; the captain must be a member.
pub async fn set_captain(
    engine: &MatchEngine,
    channel: ChannelId,
    requester: PlayerId,
    player: PlayerId,
) -> Result<(), EngineError> {
    let handle = engine.registry().get(channel)?;
    let mut game = handle.lock().await;
    ensure_lobby_open(&game)?;
    ensure_host(&game, requester, "assign a captain")?;
    let side = rostered_side(&game, player)?;
    game.team_mut(side).captain = Some(player);
    info!(%channel, %player, %side, "captain assigned");
    Ok(())
}

/// Tag your own role, in role-constrained modes only.
pub async fn set_role(
    engine: &MatchEngine,
    channel: ChannelId,
    player: PlayerId,
    role: Role,
) -> Result<(), EngineError> {
    let handle = engine.registry().get(channel)?;
    let mut game = handle.lock().await;
    ensure_lobby_open(&game)?;
    if !game.mode.role_constrained() {
        return Err(EngineError::InvalidState(format!(
            "{} mode does not use roles",
            game.mode
        )));
    }
    let side = rostered_side(&game, player)?;
    game.team_mut(side).roles.insert(player, role);
    info!(%channel, %player, ?role, "role set");
    Ok(())
}

/// Cancel an unstarted match. Host-only; releases every rostered player.
pub async fn cancel(
    engine: &MatchEngine,
    channel: ChannelId,
    requester: PlayerId,
) -> Result<(), EngineError> {
    let handle = engine.registry().get(channel)?;
    {
        let game = handle.lock().await;
        ensure_host(&game, requester, "cancel the match")?;
        ensure_lobby_open(&game)?;
    }
    engine.registry().remove(channel).await;
    info!(%channel, "match cancelled");
    Ok(())
}

fn ensure_lobby_open(game: &Match) -> Result<(), EngineError> {
    if game.is_lobby_open() {
        Ok(())
    } else {
        Err(EngineError::InvalidState(
            "the roster is locked once the match has started".into(),
        ))
    }
}

fn ensure_host(game: &Match, requester: PlayerId, action: &str) -> Result<(), EngineError> {
    if game.is_host(requester) {
        Ok(())
    } else {
        Err(EngineError::Unauthorized(format!(
            "only the host can {action}"
        )))
    }
}

fn rostered_side(game: &Match, player: PlayerId) -> Result<TeamSide, EngineError> {
    game.side_of(player)
        .ok_or_else(|| EngineError::NotFound(format!("player {player} is not in this match")))
}
