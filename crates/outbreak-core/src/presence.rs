use crate::player::{Player, PlayerId};
use crate::time::{Timestamp, elapsed_ms};
use crate::world::World;

impl World {
    pub fn is_active(&self, player: &Player, now: Timestamp) -> bool {
        elapsed_ms(player.last_active, now) < self.rules.active_timeout_ms
    }

    /// Players seen within the activity timeout, ascending id.
    pub fn active_players(&self, now: Timestamp) -> Vec<Player> {
        match now.checked_sub(self.rules.active_timeout_ms) {
            Some(cutoff) => self.store.players_active_since(cutoff),
            None => self.store.players(),
        }
    }

    /// Evict every player that has gone quiet, then rebalance the round
    /// around whoever is left. Counts are refreshed even when nobody leaves.
    pub fn cleanup_stale(&mut self, now: Timestamp) -> Vec<PlayerId> {
        let stale: Vec<PlayerId> = self
            .store
            .players()
            .into_iter()
            .filter(|p| !self.is_active(p, now))
            .map(|p| p.id)
            .collect();

        for &player_id in &stale {
            match self.store.delete_player(player_id) {
                Ok(player) => {
                    tracing::info!(player_id, username = %player.username, "Evicted stale player");
                },
                Err(err) => tracing::debug!(player_id, %err, "Stale player already gone"),
            }
        }

        self.on_population_change(now);
        stale
    }
}
