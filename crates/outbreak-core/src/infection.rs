use crate::player::{Faction, PlayerId};
use crate::round::RoundStatus;
use crate::time::Timestamp;
use crate::world::World;

impl World {
    /// Contact infection after `mover_id` moved.
    ///
    /// A zombie mover converts every active human in reach at once. A human
    /// mover is checked against NPCs in store order and is converted by the
    /// first one in reach.
    pub(crate) fn resolve_infection(&mut self, mover_id: PlayerId, now: Timestamp) -> Vec<PlayerId> {
        let Some(mover) = self.store.player(mover_id) else {
            return Vec::new();
        };
        let origin = mover.position();
        let mut infected = Vec::new();

        match mover.faction {
            Faction::Zombie => {
                let reach = self.rules.player_infection_radius;
                let victims: Vec<PlayerId> = self
                    .active_players(now)
                    .into_iter()
                    .filter(|p| p.id != mover_id && p.is_human() && origin.within(p.position(), reach))
                    .map(|p| p.id)
                    .collect();
                for victim in victims {
                    if self.infect_player(victim) {
                        tracing::info!(player_id = victim, by = mover_id, "Player infected");
                        infected.push(victim);
                    }
                }
            },
            Faction::Human => {
                let reach = self.rules.npc_infection_radius;
                let biter = self
                    .store
                    .npcs()
                    .into_iter()
                    .find(|npc| origin.within(npc.position(), reach));
                if let Some(npc) = biter
                    && self.infect_player(mover_id)
                {
                    tracing::info!(player_id = mover_id, npc_id = npc.id, "Player caught by NPC");
                    infected.push(mover_id);
                }
            },
        }

        if !infected.is_empty() {
            self.refresh_counts(now);
            let playing = self
                .store
                .round()
                .is_some_and(|r| r.status == RoundStatus::Playing);
            if playing {
                self.balance_npcs(now);
            }
        }
        infected
    }

    /// Already-zombie is a no-op.
    fn infect_player(&mut self, player_id: PlayerId) -> bool {
        let mut converted = false;
        let result = self
            .store
            .patch_player(player_id, &mut |p| converted = p.infect());
        match result {
            Ok(()) => converted,
            Err(err) => {
                tracing::debug!(player_id, %err, "Infection target vanished");
                false
            },
        }
    }
}
