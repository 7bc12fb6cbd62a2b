use crate::player::PlayerId;

/// Broad category of a [`GameError`], used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Precondition,
    NotFound,
    Conflict,
    Invalid,
}

/// Failures of player-facing operations. All are synchronous, scoped to the
/// one call, and never retried by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    NotHost,
    GameNotFound,
    NotInLobby,
    InsufficientPlayers { required: usize, active: usize },
    LobbyFull { max: usize },
    UsernameTaken(String),
    /// The connection id belongs to another active player.
    ConnectionInUse,
    NoActiveCountdown,
    PlayerNotFound(PlayerId),
    InvalidUsername(String),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotHost => ErrorKind::Authorization,
            Self::NotInLobby
            | Self::InsufficientPlayers { .. }
            | Self::LobbyFull { .. }
            | Self::NoActiveCountdown => ErrorKind::Precondition,
            Self::GameNotFound | Self::PlayerNotFound(_) => ErrorKind::NotFound,
            Self::UsernameTaken(_) | Self::ConnectionInUse => ErrorKind::Conflict,
            Self::InvalidUsername(_) => ErrorKind::Invalid,
        }
    }
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotHost => write!(f, "Only the host can do that"),
            Self::GameNotFound => write!(f, "Game state not found"),
            Self::NotInLobby => write!(f, "Game is not in lobby state"),
            Self::InsufficientPlayers { required, active } => {
                write!(f, "Need at least {required} players to start ({active} active)")
            },
            Self::LobbyFull { max } => write!(f, "Lobby is full ({max} players)"),
            Self::UsernameTaken(name) => write!(f, "Username '{name}' already taken"),
            Self::ConnectionInUse => write!(f, "Connection already in use by another player"),
            Self::NoActiveCountdown => write!(f, "No game start to cancel"),
            Self::PlayerNotFound(id) => write!(f, "Player {id} not found"),
            Self::InvalidUsername(name) => {
                write!(f, "Invalid username '{name}': must be 1-20 characters")
            },
        }
    }
}

impl std::error::Error for GameError {}

/// Failures of the entity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound { table: &'static str, id: u64 },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { table, id } => write!(f, "{table} record {id} not found"),
        }
    }
}

impl std::error::Error for StoreError {}
