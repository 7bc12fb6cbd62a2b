use serde::Deserialize;

use outbreak_core::rules::GameRules;

/// Default config file, looked up in the working directory.
pub const CONFIG_FILE: &str = "outbreak.toml";

/// Top-level server configuration, loaded from `outbreak.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub auth: AuthFileConfig,
    pub rules: GameRules,
    pub scheduler: SchedulerConfig,
    /// Fixed RNG seed for reproducible sessions. Random when unset.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            auth: AuthFileConfig::default(),
            rules: GameRules::default(),
            scheduler: SchedulerConfig::default(),
            seed: None,
        }
    }
}

/// Auth section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthFileConfig {
    /// Bearer token guarding the admin routes. None = admin routes open.
    pub admin_token: Option<String>,
}

/// Periodic background work driven by the server itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// When false, NPC ticks and stale cleanup only run through the admin routes.
    pub enabled: bool,
    pub npc_tick_ms: u64,
    pub cleanup_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            npc_tick_ms: 120,
            cleanup_interval_ms: 10_000,
        }
    }
}

impl ServerConfig {
    /// Collect every configuration problem. `Ok` when the server can start.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            problems.push(format!(
                "listen_addr '{}' is not a valid socket address",
                self.listen_addr
            ));
        }
        if self.scheduler.npc_tick_ms == 0 {
            problems.push("scheduler.npc_tick_ms must be > 0".to_string());
        }
        if self.scheduler.cleanup_interval_ms == 0 {
            problems.push("scheduler.cleanup_interval_ms must be > 0".to_string());
        }
        problems.extend(self.rules.problems());

        if self.auth.admin_token.is_some() {
            tracing::warn!(
                "admin_token is set in config file; use OUTBREAK_ADMIN_TOKEN env var in production"
            );
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Load config from `outbreak.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file(CONFIG_FILE);
        config.apply_env_overrides();
        config
    }

    fn load_file(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(path, "Loaded configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(path, "Failed to parse config: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(path, "No config file found, using defaults");
                ServerConfig::default()
            },
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("OUTBREAK_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Ok(token) = std::env::var("OUTBREAK_ADMIN_TOKEN")
            && !token.is_empty()
        {
            self.auth.admin_token = Some(token);
        }
        if let Ok(val) = std::env::var("OUTBREAK_NPC_PER_HUMAN")
            && let Ok(n) = val.parse::<usize>()
        {
            self.rules.npc_per_human = n;
        }
        if let Ok(val) = std::env::var("OUTBREAK_NPC_TICK_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            self.scheduler.npc_tick_ms = n;
        }
        if let Ok(val) = std::env::var("OUTBREAK_SEED")
            && let Ok(n) = val.parse::<u64>()
        {
            self.seed = Some(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert!(cfg.auth.admin_token.is_none());
        assert!(cfg.scheduler.enabled);
        assert_eq!(cfg.scheduler.npc_tick_ms, 120);
        assert_eq!(cfg.rules.max_players, 20);
        assert!(cfg.seed.is_none());
    }

    #[test]
    fn parse_minimal_toml() {
        let cfg: ServerConfig = toml::from_str(r#"listen_addr = "127.0.0.1:9000""#).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
        assert_eq!(cfg.scheduler.cleanup_interval_ms, 10_000);
        assert_eq!(cfg.rules.npc_per_human, 5);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
listen_addr = "127.0.0.1:3000"
seed = 42

[auth]
admin_token = "secret"

[rules]
npc_per_human = 8
round_duration_ms = 120000

[scheduler]
enabled = false
npc_tick_ms = 200
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.auth.admin_token.as_deref(), Some("secret"));
        assert_eq!(cfg.rules.npc_per_human, 8);
        assert_eq!(cfg.rules.round_duration_ms, 120_000);
        assert_eq!(cfg.rules.countdown_ms, 10_000);
        assert!(!cfg.scheduler.enabled);
        assert_eq!(cfg.scheduler.npc_tick_ms, 200);
        assert_eq!(cfg.scheduler.cleanup_interval_ms, 10_000);
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_collects_every_problem() {
        let cfg = ServerConfig {
            listen_addr: "not-an-address".to_string(),
            scheduler: SchedulerConfig {
                npc_tick_ms: 0,
                ..SchedulerConfig::default()
            },
            rules: GameRules {
                max_players: 1,
                ..GameRules::default()
            },
            ..ServerConfig::default()
        };
        let problems = cfg.validate().unwrap_err();
        assert_eq!(problems.len(), 3, "{problems:?}");
        assert!(problems[0].contains("not-an-address"));
    }

    #[test]
    fn negative_jitter_from_toml_fails_validation() {
        let cfg: ServerConfig = toml::from_str("[rules]\nspawn_jitter = -10.0").unwrap();
        let problems = cfg.validate().unwrap_err();
        assert_eq!(problems, vec!["rules.spawn_jitter must be a finite value >= 0".to_string()]);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = ServerConfig::load_file("definitely/not/here/outbreak.toml");
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
    }
}
