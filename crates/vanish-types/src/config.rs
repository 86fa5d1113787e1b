/// Erasure policy, read once at startup and passed by value to the creation
/// path and the reaper. Both knobs are floored to 1.
#[derive(Debug, Clone, Copy)]
pub struct ErasePolicy {
    /// Minutes a message lives before it becomes eligible for deletion.
    pub ttl_minutes: i64,
    /// Number of random-overwrite passes before an attachment is deleted.
    pub wipe_passes: u32,
}

impl ErasePolicy {
    pub const DEFAULT_TTL_MINUTES: i64 = 10;
    pub const DEFAULT_WIPE_PASSES: u32 = 1;

    pub fn new(ttl_minutes: i64, wipe_passes: u32) -> Self {
        Self {
            ttl_minutes: ttl_minutes.max(1),
            wipe_passes: wipe_passes.max(1),
        }
    }

    /// Reads `MESSAGE_TTL_MINUTES` and `VOICE_WIPE_PASSES`, falling back to
    /// the defaults when unset or unparseable.
    pub fn from_env() -> Self {
        let ttl = std::env::var("MESSAGE_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Self::DEFAULT_TTL_MINUTES);
        let passes = std::env::var("VOICE_WIPE_PASSES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Self::DEFAULT_WIPE_PASSES);
        Self::new(ttl, passes)
    }
}

impl Default for ErasePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL_MINUTES, Self::DEFAULT_WIPE_PASSES)
    }
}
