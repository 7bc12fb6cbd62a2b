use std::collections::{BTreeMap, HashMap};

use crate::error::StoreError;
use crate::npc::{Npc, NpcId};
use crate::player::{Player, PlayerId};
use crate::round::Round;
use crate::time::Timestamp;

/// Record storage for players, NPCs and the singleton round.
///
/// Reads return owned copies; writes go through `patch_*` closures so an
/// implementation can keep its secondary indexes consistent. Every listing is
/// in ascending id order, which for NPCs is creation order.
pub trait EntityStore: Send {
    fn insert_player(&mut self, player: Player) -> PlayerId;
    fn player(&self, id: PlayerId) -> Option<Player>;
    fn patch_player(
        &mut self,
        id: PlayerId,
        patch: &mut dyn FnMut(&mut Player),
    ) -> Result<(), StoreError>;
    fn delete_player(&mut self, id: PlayerId) -> Result<Player, StoreError>;
    fn players(&self) -> Vec<Player>;
    fn player_by_username(&self, username: &str) -> Option<Player>;
    fn player_by_connection(&self, connection_id: &str) -> Option<Player>;
    /// Players whose `last_active` is strictly after `cutoff`.
    fn players_active_since(&self, cutoff: Timestamp) -> Vec<Player>;

    fn insert_npc(&mut self, npc: Npc) -> NpcId;
    fn npc(&self, id: NpcId) -> Option<Npc>;
    fn patch_npc(&mut self, id: NpcId, patch: &mut dyn FnMut(&mut Npc)) -> Result<(), StoreError>;
    fn delete_npc(&mut self, id: NpcId) -> Result<Npc, StoreError>;
    fn npcs(&self) -> Vec<Npc>;

    fn round(&self) -> Option<Round>;
    fn put_round(&mut self, round: Round);
    fn patch_round(&mut self, patch: &mut dyn FnMut(&mut Round)) -> Result<(), StoreError>;
    fn delete_round(&mut self) -> Option<Round>;
}

/// In-process store backed by ordered maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    players: BTreeMap<PlayerId, Player>,
    usernames: HashMap<String, PlayerId>,
    connections: HashMap<String, PlayerId>,
    npcs: BTreeMap<NpcId, Npc>,
    round: Option<Round>,
    next_player_id: PlayerId,
    next_npc_id: NpcId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_player_id: 1,
            next_npc_id: 1,
            ..Self::default()
        }
    }

    fn unindex(&mut self, player: &Player) {
        if self.usernames.get(&player.username) == Some(&player.id) {
            self.usernames.remove(&player.username);
        }
        if self.connections.get(&player.connection_id) == Some(&player.id) {
            self.connections.remove(&player.connection_id);
        }
    }

    fn index(&mut self, player: &Player) {
        self.usernames.insert(player.username.clone(), player.id);
        self.connections
            .insert(player.connection_id.clone(), player.id);
    }
}

impl EntityStore for MemoryStore {
    fn insert_player(&mut self, mut player: Player) -> PlayerId {
        let id = self.next_player_id.max(1);
        self.next_player_id = id + 1;
        player.id = id;
        self.index(&player);
        self.players.insert(id, player);
        id
    }

    fn player(&self, id: PlayerId) -> Option<Player> {
        self.players.get(&id).cloned()
    }

    fn patch_player(
        &mut self,
        id: PlayerId,
        patch: &mut dyn FnMut(&mut Player),
    ) -> Result<(), StoreError> {
        let Some(mut player) = self.players.remove(&id) else {
            return Err(StoreError::NotFound { table: "players", id });
        };
        self.unindex(&player);
        patch(&mut player);
        player.id = id;
        self.index(&player);
        self.players.insert(id, player);
        Ok(())
    }

    fn delete_player(&mut self, id: PlayerId) -> Result<Player, StoreError> {
        let player = self
            .players
            .remove(&id)
            .ok_or(StoreError::NotFound { table: "players", id })?;
        self.unindex(&player);
        Ok(player)
    }

    fn players(&self) -> Vec<Player> {
        self.players.values().cloned().collect()
    }

    fn player_by_username(&self, username: &str) -> Option<Player> {
        self.usernames
            .get(username)
            .and_then(|id| self.players.get(id))
            .cloned()
    }

    fn player_by_connection(&self, connection_id: &str) -> Option<Player> {
        self.connections
            .get(connection_id)
            .and_then(|id| self.players.get(id))
            .cloned()
    }

    fn players_active_since(&self, cutoff: Timestamp) -> Vec<Player> {
        self.players
            .values()
            .filter(|p| p.last_active > cutoff)
            .cloned()
            .collect()
    }

    fn insert_npc(&mut self, mut npc: Npc) -> NpcId {
        let id = self.next_npc_id.max(1);
        self.next_npc_id = id + 1;
        npc.id = id;
        self.npcs.insert(id, npc);
        id
    }

    fn npc(&self, id: NpcId) -> Option<Npc> {
        self.npcs.get(&id).cloned()
    }

    fn patch_npc(&mut self, id: NpcId, patch: &mut dyn FnMut(&mut Npc)) -> Result<(), StoreError> {
        let npc = self
            .npcs
            .get_mut(&id)
            .ok_or(StoreError::NotFound { table: "npcs", id })?;
        patch(npc);
        npc.id = id;
        Ok(())
    }

    fn delete_npc(&mut self, id: NpcId) -> Result<Npc, StoreError> {
        self.npcs
            .remove(&id)
            .ok_or(StoreError::NotFound { table: "npcs", id })
    }

    fn npcs(&self) -> Vec<Npc> {
        self.npcs.values().cloned().collect()
    }

    fn round(&self) -> Option<Round> {
        self.round.clone()
    }

    fn put_round(&mut self, round: Round) {
        self.round = Some(round);
    }

    fn patch_round(&mut self, patch: &mut dyn FnMut(&mut Round)) -> Result<(), StoreError> {
        let round = self
            .round
            .as_mut()
            .ok_or(StoreError::NotFound { table: "round", id: 0 })?;
        patch(round);
        Ok(())
    }

    fn delete_round(&mut self) -> Option<Round> {
        self.round.take()
    }
}
