//! Per-(guild, target) concurrency guard
//!
//! Serializes wizard sessions so two moderators cannot both reach
//! confirmation against the same target. Lock attempts fast-fail with the
//! holding session's URL; a reaper task force-releases entries left behind
//! by sessions that never reached a terminal stage.
//!
//! All check-and-mutate operations are a single synchronous step on the map
//! entry, with no await in between, so no interleaving task can observe a
//! half-taken lock.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use poise::serenity_prelude::{GuildId, MessageId, UserId};
use std::sync::Arc;
use tracing::{info, warn};

use crate::MODERATION_TARGET;
use crate::moderation::{ModerationError, ModerationResult};

/// Default staleness threshold and reaper interval
pub const STALE_LOCK_MINUTES: i64 = 10;

/// One held lock: the wizard message that owns it and when it was taken
#[derive(Debug, Clone)]
pub struct GuardEntry {
    pub session_message: MessageId,
    pub session_url: String,
    pub created_at: DateTime<Utc>,
}

/// The lock table. Owned by [`Data`](crate::Data), created at startup.
#[derive(Clone)]
pub struct TargetGuard {
    entries: Arc<DashMap<(GuildId, UserId), GuardEntry>>,
    stale_after: Duration,
}

impl Default for TargetGuard {
    fn default() -> Self {
        Self::new(Duration::minutes(STALE_LOCK_MINUTES))
    }
}

impl TargetGuard {
    #[must_use]
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            stale_after,
        }
    }

    /// Take the lock for (guild, target).
    ///
    /// # Errors
    /// Fails immediately with [`ModerationError::TargetLocked`] carrying the
    /// holding session's URL; never blocks or queues.
    pub fn lock(
        &self,
        guild_id: GuildId,
        target_id: UserId,
        session_message: MessageId,
        session_url: impl Into<String>,
    ) -> ModerationResult<()> {
        match self.entries.entry((guild_id, target_id)) {
            Entry::Occupied(held) => Err(ModerationError::TargetLocked {
                url: held.get().session_url.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(GuardEntry {
                    session_message,
                    session_url: session_url.into(),
                    created_at: Utc::now(),
                });
                Ok(())
            }
        }
    }

    /// Release the lock for (guild, target). Removes the entry entirely so
    /// the map cannot grow without bound. Releasing an unheld lock is a no-op.
    pub fn unlock(&self, guild_id: GuildId, target_id: UserId) -> bool {
        self.entries.remove(&(guild_id, target_id)).is_some()
    }

    /// Non-mutating check
    #[must_use]
    pub fn is_locked(&self, guild_id: GuildId, target_id: UserId) -> bool {
        self.entries.contains_key(&(guild_id, target_id))
    }

    /// Release whichever lock is owned by a wizard message, if any.
    /// Called from the message-delete event so a deleted wizard message
    /// cannot leave its target locked until the reaper runs.
    pub fn release_session(&self, session_message: MessageId) -> bool {
        let key = self
            .entries
            .iter()
            .find(|e| e.session_message == session_message)
            .map(|e| *e.key());
        match key {
            Some(key) => {
                self.entries.remove(&key);
                info!(
                    target: MODERATION_TARGET,
                    guild_id = %key.0,
                    target_id = %key.1,
                    "Guard released after wizard message deletion"
                );
                true
            }
            None => false,
        }
    }

    /// Force-release entries older than the staleness threshold.
    /// Returns how many were reaped.
    pub fn reap_stale(&self) -> usize {
        let cutoff = Utc::now() - self.stale_after;
        let stale: Vec<(GuildId, UserId)> = self
            .entries
            .iter()
            .filter(|e| e.created_at < cutoff)
            .map(|e| *e.key())
            .collect();

        for key in &stale {
            self.entries.remove(key);
            warn!(
                target: MODERATION_TARGET,
                guild_id = %key.0,
                target_id = %key.1,
                "Reaped stale wizard lock"
            );
        }
        stale.len()
    }

    /// Spawn the periodic reaper task
    pub fn start_reaper(&self, interval_secs: u64) {
        let guard = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));
            // The first tick fires immediately; skip it
            interval.tick().await;
            loop {
                interval.tick().await;
                guard.reap_stale();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> TargetGuard {
        TargetGuard::new(Duration::minutes(10))
    }

    #[test]
    fn test_lock_is_exclusive_and_fast_fails() {
        let guard = guard();
        let guild = GuildId::new(1);
        let target = UserId::new(2);

        guard
            .lock(guild, target, MessageId::new(100), "https://example/session/100")
            .unwrap();
        assert!(guard.is_locked(guild, target));

        // A second session fails immediately with the holder's URL
        let err = guard
            .lock(guild, target, MessageId::new(200), "https://example/session/200")
            .unwrap_err();
        match err {
            ModerationError::TargetLocked { url } => {
                assert_eq!(url, "https://example/session/100");
            }
            other => panic!("unexpected error: {other}"),
        }

        // A different target is unaffected
        guard
            .lock(guild, UserId::new(3), MessageId::new(300), "url")
            .unwrap();
    }

    #[test]
    fn test_unlock_is_idempotent_and_removes_entry() {
        let guard = guard();
        let guild = GuildId::new(1);
        let target = UserId::new(2);

        guard.lock(guild, target, MessageId::new(100), "url").unwrap();
        assert!(guard.unlock(guild, target));
        assert!(!guard.is_locked(guild, target));
        // Double release is a no-op
        assert!(!guard.unlock(guild, target));

        // The slot is reusable
        guard.lock(guild, target, MessageId::new(101), "url2").unwrap();
    }

    #[test]
    fn test_release_by_session_message() {
        let guard = guard();
        let guild = GuildId::new(1);
        let target = UserId::new(2);

        guard.lock(guild, target, MessageId::new(100), "url").unwrap();
        assert!(guard.release_session(MessageId::new(100)));
        assert!(!guard.is_locked(guild, target));
        assert!(!guard.release_session(MessageId::new(100)));
    }

    #[test]
    fn test_release_session_only_touches_its_own_lock() {
        let guard = guard();
        let guild = GuildId::new(1);
        let target = UserId::new(2);

        guard.lock(guild, target, MessageId::new(100), "url1").unwrap();
        // The first wizard message is deleted; the hook releases the lock
        assert!(guard.release_session(MessageId::new(100)));

        // A second session takes the slot
        guard.lock(guild, target, MessageId::new(200), "url2").unwrap();

        // The first session's exit path releases by ownership and must not
        // disturb the new holder
        assert!(!guard.release_session(MessageId::new(100)));
        assert!(guard.is_locked(guild, target));
    }

    #[test]
    fn test_reaper_only_takes_stale_entries() {
        let guard = TargetGuard::new(Duration::minutes(10));
        let guild = GuildId::new(1);

        guard.lock(guild, UserId::new(2), MessageId::new(100), "url").unwrap();
        guard.lock(guild, UserId::new(3), MessageId::new(101), "url").unwrap();

        // Backdate one entry past the threshold
        guard
            .entries
            .get_mut(&(guild, UserId::new(2)))
            .unwrap()
            .created_at = Utc::now() - Duration::minutes(11);

        assert_eq!(guard.reap_stale(), 1);
        assert!(!guard.is_locked(guild, UserId::new(2)));
        assert!(guard.is_locked(guild, UserId::new(3)));
    }
}
