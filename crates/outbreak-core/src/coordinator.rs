use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::city::PLAYER_RADIUS;
use crate::error::GameError;
use crate::geometry::{Point, WORLD_HEIGHT, WORLD_WIDTH};
use crate::player::{Player, PlayerId, normalize_username};
use crate::round::{Round, RoundStatus, Transition};
use crate::time::Timestamp;
use crate::world::World;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOutcome {
    pub player_id: PlayerId,
    pub connection_id: String,
    pub is_host: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    pub players_removed: usize,
    pub npcs_removed: usize,
}

impl World {
    pub fn join(
        &mut self,
        username: &str,
        connection_id: String,
        now: Timestamp,
    ) -> Result<JoinOutcome, GameError> {
        let username = normalize_username(username)
            .ok_or_else(|| GameError::InvalidUsername(username.to_string()))?;

        let round = match self.store.round() {
            Some(round) => round,
            None => {
                self.store.put_round(Round::default());
                tracing::info!("Round created");
                Round::default()
            },
        };
        if round.status == RoundStatus::Ended {
            self.reset_to_lobby(now);
        }

        // A client rejoining on the same session under the same name replaces
        // its old record. Stale records free both their session and their name.
        let mut replaced = Vec::new();
        if let Some(previous) = self.store.player_by_connection(&connection_id) {
            if previous.username != username && self.is_active(&previous, now) {
                return Err(GameError::ConnectionInUse);
            }
            replaced.push(previous.id);
        }
        if let Some(holder) = self.store.player_by_username(&username)
            && !replaced.contains(&holder.id)
        {
            if self.is_active(&holder, now) {
                return Err(GameError::UsernameTaken(username));
            }
            replaced.push(holder.id);
        }

        let active = self
            .active_players(now)
            .iter()
            .filter(|p| !replaced.contains(&p.id))
            .count();
        if active >= self.rules.max_players {
            return Err(GameError::LobbyFull {
                max: self.rules.max_players,
            });
        }

        for old_id in replaced {
            if let Ok(old) = self.store.delete_player(old_id) {
                tracing::info!(player_id = old_id, username = %old.username, "Replaced player record");
            }
        }

        let spawn = self.random_spawn_point();
        let player_id = self.store.insert_player(Player::spawn(
            username.clone(),
            connection_id.clone(),
            spawn,
            now,
        ));
        tracing::info!(player_id, username = %username, x = spawn.x, y = spawn.y, "Player joined");

        self.on_population_change(now);
        let is_host = self
            .store
            .round()
            .is_some_and(|r| r.host == Some(player_id));

        Ok(JoinOutcome {
            player_id,
            connection_id,
            is_host,
        })
    }

    /// Move a player and resolve any contact infections. Returns the ids of
    /// players infected by this move.
    pub fn update_position(
        &mut self,
        player_id: PlayerId,
        x: f32,
        y: f32,
        now: Timestamp,
    ) -> Result<Vec<PlayerId>, GameError> {
        let pos = Point::new(x, y).clamp_to_world(PLAYER_RADIUS);
        self.store
            .patch_player(player_id, &mut |p| {
                p.x = pos.x;
                p.y = pos.y;
                p.last_active = now;
            })
            .map_err(|_| GameError::PlayerNotFound(player_id))?;

        let playing = self
            .store
            .round()
            .is_some_and(|r| r.status == RoundStatus::Playing);
        if !playing {
            return Ok(Vec::new());
        }
        Ok(self.resolve_infection(player_id, now))
    }

    /// Host-only. Arms the countdown and returns its deadline.
    pub fn start_countdown(
        &mut self,
        player_id: PlayerId,
        now: Timestamp,
    ) -> Result<Timestamp, GameError> {
        let round = self.store.round().ok_or(GameError::GameNotFound)?;
        if round.host != Some(player_id) {
            return Err(GameError::NotHost);
        }
        if round.status != RoundStatus::Lobby {
            return Err(GameError::NotInLobby);
        }
        let active = self.active_players(now).len();
        if active < self.rules.min_players_to_start {
            return Err(GameError::InsufficientPlayers {
                required: self.rules.min_players_to_start,
                active,
            });
        }

        let deadline = now + self.rules.countdown_ms;
        self.update_round(|r| r.countdown_deadline = Some(deadline));
        self.schedule(
            deadline,
            Transition::StartRound {
                countdown_deadline: deadline,
            },
        );
        tracing::info!(player_id, deadline, active, "Countdown started");
        Ok(deadline)
    }

    pub fn cancel_countdown(&mut self, player_id: PlayerId, now: Timestamp) -> Result<(), GameError> {
        let round = self.store.round().ok_or(GameError::GameNotFound)?;
        if round.host != Some(player_id) {
            return Err(GameError::NotHost);
        }
        if !round.countdown_active() {
            return Err(GameError::NoActiveCountdown);
        }
        self.update_round(|r| r.countdown_deadline = None);
        tracing::info!(player_id, now, "Countdown cancelled");
        Ok(())
    }

    pub fn disconnect(&mut self, player_id: PlayerId, now: Timestamp) -> Result<(), GameError> {
        let player = self
            .store
            .delete_player(player_id)
            .map_err(|_| GameError::PlayerNotFound(player_id))?;
        tracing::info!(player_id, username = %player.username, "Player left");
        self.on_population_change(now);
        Ok(())
    }

    /// Wipe every NPC, every player and the round record.
    pub fn admin_reset(&mut self, now: Timestamp) -> ResetReport {
        let npcs_removed = self.clear_npcs();
        let mut players_removed = 0;
        for player in self.store.players() {
            if self.store.delete_player(player.id).is_ok() {
                players_removed += 1;
            }
        }
        self.store.delete_round();
        self.scheduled.clear();
        tracing::warn!(now, players_removed, npcs_removed, "Game state reset");
        ResetReport {
            players_removed,
            npcs_removed,
        }
    }

    /// Run a deferred transition. Returns false when its precondition no
    /// longer holds and nothing happened.
    pub fn fire(&mut self, transition: Transition, now: Timestamp) -> bool {
        let Some(round) = self.store.round() else {
            tracing::debug!(?transition, "Transition voided: no round");
            return false;
        };
        let applies = match transition {
            Transition::StartRound { countdown_deadline } => {
                round.status == RoundStatus::Lobby
                    && round.countdown_deadline == Some(countdown_deadline)
            },
            Transition::EndRound { round_start_time } => {
                round.status == RoundStatus::Playing
                    && round.round_start_time == Some(round_start_time)
            },
            Transition::ReturnToLobby { round_end_time } => {
                round.status == RoundStatus::Ended && round.round_end_time == Some(round_end_time)
            },
        };
        if !applies {
            tracing::debug!(?transition, status = ?round.status, "Transition voided");
            return false;
        }

        match transition {
            Transition::StartRound { .. } => self.start_round(now),
            Transition::EndRound { .. } => self.end_round(now),
            Transition::ReturnToLobby { .. } => self.reset_to_lobby(now),
        }
        true
    }

    fn start_round(&mut self, now: Timestamp) {
        let active = self.active_players(now);
        if active.len() < self.rules.min_players_to_start {
            self.update_round(|r| r.countdown_deadline = None);
            tracing::info!(
                active = active.len(),
                "Countdown expired without enough players"
            );
            return;
        }

        for player in &active {
            let _ = self.store.patch_player(player.id, &mut Player::reset_to_human);
        }
        let patient_zero = active[self.rng.random_range(0..active.len())].id;
        let _ = self.store.patch_player(patient_zero, &mut |p| {
            p.infect();
        });

        let player_count = active.len();
        let round_end = now + self.rules.round_duration_ms;
        self.update_round(|r| {
            r.status = RoundStatus::Playing;
            r.round_start_time = Some(now);
            r.round_end_time = Some(round_end);
            r.player_count = player_count;
            r.zombie_count = 1;
            r.countdown_deadline = None;
            r.last_npc_update = None;
        });
        tracing::info!(player_count, patient_zero, round_end, "Round started");

        self.balance_npcs(now);
        self.schedule(
            round_end,
            Transition::EndRound {
                round_start_time: now,
            },
        );
    }

    /// Close the round: record the result, remove every NPC and schedule
    /// the return to lobby.
    pub(crate) fn end_round(&mut self, now: Timestamp) {
        let zombie_count = self
            .active_players(now)
            .iter()
            .filter(|p| p.is_zombie())
            .count();
        self.update_round(|r| {
            r.status = RoundStatus::Ended;
            r.round_end_time = Some(now);
            r.zombie_count = zombie_count;
        });
        let npcs_removed = self.clear_npcs();
        tracing::info!(zombie_count, npcs_removed, "Round ended");

        self.schedule(
            now + self.rules.return_to_lobby_ms,
            Transition::ReturnToLobby {
                round_end_time: now,
            },
        );
    }

    pub(crate) fn reset_to_lobby(&mut self, now: Timestamp) {
        let active = self.active_players(now);
        for player in &active {
            let _ = self.store.patch_player(player.id, &mut Player::reset_to_human);
        }
        let current_host = self.store.round().and_then(|r| r.host);
        let host = current_host
            .filter(|h| active.iter().any(|p| p.id == *h))
            .or_else(|| active.first().map(|p| p.id));
        let player_count = active.len();
        self.update_round(|r| {
            r.status = RoundStatus::Lobby;
            r.round_start_time = None;
            r.round_end_time = None;
            r.countdown_deadline = None;
            r.last_npc_update = None;
            r.zombie_count = 0;
            r.player_count = player_count;
            r.host = host;
        });
        tracing::info!(player_count, host = ?host, "Returned to lobby");
    }

    /// Bring the round in line with who is still here after a join, leave or
    /// eviction.
    pub(crate) fn on_population_change(&mut self, now: Timestamp) {
        let Some(round) = self.store.round() else {
            return;
        };
        let active = self.active_players(now);
        if active.is_empty() {
            self.update_round(Round::clear);
            let npcs_removed = self.clear_npcs();
            tracing::info!(npcs_removed, "All players gone; round reset");
            return;
        }

        let host_present = round
            .host
            .is_some_and(|h| active.iter().any(|p| p.id == h));
        if !host_present {
            let new_host = active[0].id;
            self.update_round(|r| r.host = Some(new_host));
            tracing::info!(previous = ?round.host, host = new_host, "Host reassigned");
        }

        self.refresh_counts(now);
        let playing = self
            .store
            .round()
            .is_some_and(|r| r.status == RoundStatus::Playing);
        if playing {
            self.balance_npcs(now);
        }
    }

    /// Recompute the cached counts from a fresh scan and end the round when
    /// no humans are left.
    pub fn refresh_counts(&mut self, now: Timestamp) {
        let active = self.active_players(now);
        let zombie_count = active.iter().filter(|p| p.is_zombie()).count();
        let humans = active.len() - zombie_count;
        let player_count = active.len();
        self.update_round(|r| {
            r.player_count = player_count;
            r.zombie_count = zombie_count;
        });

        let playing = self
            .store
            .round()
            .is_some_and(|r| r.status == RoundStatus::Playing);
        if playing && humans == 0 && player_count > 0 {
            tracing::info!(zombie_count, "No humans left");
            self.end_round(now);
        }
    }

    fn random_spawn_point(&mut self) -> Point {
        let spawns = self.map.valid_spawn_points();
        if spawns.is_empty() {
            return Point::new(WORLD_WIDTH / 2.0, WORLD_HEIGHT / 2.0);
        }
        spawns[self.rng.random_range(0..spawns.len())]
    }
}
