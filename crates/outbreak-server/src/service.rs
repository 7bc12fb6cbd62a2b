use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use outbreak_core::coordinator::{JoinOutcome, ResetReport};
use outbreak_core::player::PlayerId;
use outbreak_core::round::ScheduledTransition;
use outbreak_core::steering::TickReport;
use outbreak_core::time::Timestamp;
use outbreak_core::{ErrorKind, GameError, World, WorldSnapshot};

use crate::clock::GameClock;
use crate::config::SchedulerConfig;

type Reply<T> = oneshot::Sender<T>;

/// Commands processed one at a time by the game service task.
#[derive(Debug)]
pub enum GameCommand {
    Join {
        username: String,
        connection_id: String,
        reply: Reply<Result<JoinOutcome, GameError>>,
    },
    UpdatePosition {
        player_id: PlayerId,
        x: f32,
        y: f32,
        reply: Reply<Result<Vec<PlayerId>, GameError>>,
    },
    StartCountdown {
        player_id: PlayerId,
        reply: Reply<Result<Timestamp, GameError>>,
    },
    CancelCountdown {
        player_id: PlayerId,
        reply: Reply<Result<(), GameError>>,
    },
    Disconnect {
        player_id: PlayerId,
        reply: Reply<Result<(), GameError>>,
    },
    Cleanup {
        reply: Reply<Vec<PlayerId>>,
    },
    NpcTick {
        reply: Reply<TickReport>,
    },
    Snapshot {
        reply: Reply<WorldSnapshot>,
    },
    AdminReset {
        reply: Reply<ResetReport>,
    },
    /// A deferred transition whose timer ran out.
    Fire(ScheduledTransition),
    Stop,
}

/// Errors surfaced by [`GameHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    Game(GameError),
    /// The service task has stopped.
    Unavailable,
}

impl ServiceError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Game(e) => Some(e.kind()),
            Self::Unavailable => None,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Game(e) => write!(f, "{e}"),
            Self::Unavailable => write!(f, "Game service unavailable"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<GameError> for ServiceError {
    fn from(e: GameError) -> Self {
        Self::Game(e)
    }
}

/// Cloneable async front for the game service.
#[derive(Debug, Clone)]
pub struct GameHandle {
    tx: mpsc::UnboundedSender<GameCommand>,
    clock: GameClock,
}

impl GameHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> GameCommand,
    ) -> Result<T, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| ServiceError::Unavailable)?;
        rx.await.map_err(|_| ServiceError::Unavailable)
    }

    pub fn clock(&self) -> GameClock {
        self.clock
    }

    pub async fn join(
        &self,
        username: String,
        connection_id: String,
    ) -> Result<JoinOutcome, ServiceError> {
        Ok(self
            .request(|reply| GameCommand::Join {
                username,
                connection_id,
                reply,
            })
            .await??)
    }

    pub async fn update_position(
        &self,
        player_id: PlayerId,
        x: f32,
        y: f32,
    ) -> Result<Vec<PlayerId>, ServiceError> {
        Ok(self
            .request(|reply| GameCommand::UpdatePosition {
                player_id,
                x,
                y,
                reply,
            })
            .await??)
    }

    pub async fn start_countdown(&self, player_id: PlayerId) -> Result<Timestamp, ServiceError> {
        Ok(self
            .request(|reply| GameCommand::StartCountdown { player_id, reply })
            .await??)
    }

    pub async fn cancel_countdown(&self, player_id: PlayerId) -> Result<(), ServiceError> {
        Ok(self
            .request(|reply| GameCommand::CancelCountdown { player_id, reply })
            .await??)
    }

    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), ServiceError> {
        Ok(self
            .request(|reply| GameCommand::Disconnect { player_id, reply })
            .await??)
    }

    pub async fn cleanup(&self) -> Result<Vec<PlayerId>, ServiceError> {
        self.request(|reply| GameCommand::Cleanup { reply }).await
    }

    pub async fn npc_tick(&self) -> Result<TickReport, ServiceError> {
        self.request(|reply| GameCommand::NpcTick { reply }).await
    }

    pub async fn snapshot(&self) -> Result<WorldSnapshot, ServiceError> {
        self.request(|reply| GameCommand::Snapshot { reply }).await
    }

    pub async fn admin_reset(&self) -> Result<ResetReport, ServiceError> {
        self.request(|reply| GameCommand::AdminReset { reply }).await
    }

    /// Ask the service to exit after the commands already queued.
    pub fn stop(&self) {
        let _ = self.tx.send(GameCommand::Stop);
    }
}

/// Spawn the task that owns `world`. Every mutation goes through it, in
/// arrival order.
pub fn spawn_game_service(world: World, clock: GameClock) -> (GameHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let timers = tx.downgrade();
    let handle = tokio::spawn(run_game_service(world, clock, rx, timers));
    (GameHandle { tx, clock }, handle)
}

async fn run_game_service(
    mut world: World,
    clock: GameClock,
    mut cmd_rx: mpsc::UnboundedReceiver<GameCommand>,
    timers: mpsc::WeakUnboundedSender<GameCommand>,
) {
    tracing::info!("Game service started");
    while let Some(cmd) = cmd_rx.recv().await {
        let now = clock.now();
        match cmd {
            GameCommand::Join {
                username,
                connection_id,
                reply,
            } => {
                let _ = reply.send(world.join(&username, connection_id, now));
            },
            GameCommand::UpdatePosition {
                player_id,
                x,
                y,
                reply,
            } => {
                let _ = reply.send(world.update_position(player_id, x, y, now));
            },
            GameCommand::StartCountdown { player_id, reply } => {
                let _ = reply.send(world.start_countdown(player_id, now));
            },
            GameCommand::CancelCountdown { player_id, reply } => {
                let _ = reply.send(world.cancel_countdown(player_id, now));
            },
            GameCommand::Disconnect { player_id, reply } => {
                let _ = reply.send(world.disconnect(player_id, now));
            },
            GameCommand::Cleanup { reply } => {
                let _ = reply.send(world.cleanup_stale(now));
            },
            GameCommand::NpcTick { reply } => {
                let _ = reply.send(world.npc_tick(now));
            },
            GameCommand::Snapshot { reply } => {
                let _ = reply.send(world.snapshot(now));
            },
            GameCommand::AdminReset { reply } => {
                let _ = reply.send(world.admin_reset(now));
            },
            GameCommand::Fire(scheduled) => {
                world.fire(scheduled.transition, now.max(scheduled.fire_at));
            },
            GameCommand::Stop => break,
        }

        for scheduled in world.take_scheduled() {
            arm_timer(&timers, clock, scheduled);
        }
    }
    tracing::info!("Game service stopped");
}

/// Sleep until the transition is due, then hand it back to the service.
/// The timer holds only a weak sender so it never keeps the service alive.
fn arm_timer(
    timers: &mpsc::WeakUnboundedSender<GameCommand>,
    clock: GameClock,
    scheduled: ScheduledTransition,
) {
    let timers = timers.clone();
    let deadline = clock.instant_at(scheduled.fire_at);
    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;
        if let Some(tx) = timers.upgrade() {
            let _ = tx.send(GameCommand::Fire(scheduled));
        }
    });
}

/// Periodic NPC ticks and stale-player sweeps. Returns no tasks when the
/// scheduler is disabled.
pub fn spawn_tickers(game: GameHandle, config: &SchedulerConfig) -> Vec<JoinHandle<()>> {
    if !config.enabled {
        tracing::info!("Background scheduler disabled");
        return Vec::new();
    }

    let npc_game = game.clone();
    let npc_every = Duration::from_millis(config.npc_tick_ms);
    let npc = tokio::spawn(async move {
        let mut interval = tokio::time::interval(npc_every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if npc_game.npc_tick().await.is_err() {
                break;
            }
        }
    });

    let cleanup_every = Duration::from_millis(config.cleanup_interval_ms);
    let cleanup = tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            match game.cleanup().await {
                Ok(evicted) if !evicted.is_empty() => {
                    tracing::debug!(count = evicted.len(), "Stale sweep evicted players");
                },
                Ok(_) => {},
                Err(_) => break,
            }
        }
    });

    vec![npc, cleanup]
}
