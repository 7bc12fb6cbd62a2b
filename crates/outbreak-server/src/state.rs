use std::sync::Arc;

use outbreak_core::World;
use outbreak_core::city::CityMap;

use crate::auth::AuthConfig;
use crate::clock::GameClock;
use crate::config::ServerConfig;
use crate::service::{GameHandle, spawn_game_service};

#[derive(Clone)]
pub struct AppState {
    pub game: GameHandle,
    pub auth: AuthConfig,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Build the world described by `config` and start its service task.
    /// Must be called from within a tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        let rules = config.rules.clone();
        let world = match config.seed {
            Some(seed) => World::with_seed(rules, CityMap::default(), seed),
            None => World::new(rules, CityMap::default()),
        };
        let (game, _task) = spawn_game_service(world, GameClock::start());
        let auth = AuthConfig {
            bearer_token: config.auth.admin_token.clone(),
        };
        Self {
            game,
            auth,
            config: Arc::new(config),
        }
    }
}
