/// Milliseconds since the Unix epoch. Every timestamp in the game uses this unit.
pub type Timestamp = u64;

/// Current wall-clock time as a [`Timestamp`].
pub fn now_millis() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Timestamp
}

/// Milliseconds elapsed from `earlier` to `now`, zero if `earlier` is in the future.
pub fn elapsed_ms(earlier: Timestamp, now: Timestamp) -> u64 {
    now.saturating_sub(earlier)
}
