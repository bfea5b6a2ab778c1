//! Punishment case records and the case repository
//!
//! A case is created exactly once when a punishment is issued. Its tail
//! (reason, expiry, visibility, handled flag) stays mutable; the record
//! itself is never deleted. Expiry is a soft state.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use poise::serenity_prelude::{GuildId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::moderation::{ModerationError, ModerationResult};

/// Maximum length of a case reason, in characters
pub const MAX_REASON_LEN: usize = 512;

/// Kind of punishment a case records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseType {
    Ban,
    Kick,
    Jail,
    Timeout,
    Warning,
    /// Legacy role-based mute, kept so old records stay readable
    Mute,
}

impl std::fmt::Display for CaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ban => write!(f, "Ban"),
            Self::Kick => write!(f, "Kick"),
            Self::Jail => write!(f, "Jail"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Warning => write!(f, "Warning"),
            Self::Mute => write!(f, "Mute"),
        }
    }
}

/// A persisted record of one issued punishment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    /// Unique internal ID of this case
    pub id: String,
    /// Guild-scoped sequential case number, never reused
    pub case_number: u64,
    /// Kind of punishment recorded
    pub kind: CaseType,
    /// Guild the punishment was issued in
    pub guild_id: u64,
    /// Punished user
    pub target_id: u64,
    /// Display name of the target at issue time
    pub target_name: String,
    /// Issuing moderator
    pub moderator_id: u64,
    /// Display name of the moderator at issue time
    pub moderator_name: String,
    /// Reason, at most [`MAX_REASON_LEN`] characters
    pub reason: Option<String>,
    /// When the punishment was issued
    pub issued_at: DateTime<Utc>,
    /// When the punishment expires; None means it never does
    pub expires_at: Option<DateTime<Utc>>,
    /// False once a warning has been invalidated
    pub visible: bool,
    /// True once the case has been explicitly closed or expired
    pub handled: bool,
}

impl Case {
    /// Whether this case is no longer in force
    #[must_use]
    pub fn has_expired(&self) -> bool {
        self.handled || self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Whether this case still binds the target
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.has_expired()
    }
}

/// Fields needed to create a new case
#[derive(Debug, Clone)]
pub struct NewCase {
    pub kind: CaseType,
    pub guild_id: GuildId,
    pub target_id: UserId,
    pub target_name: String,
    pub moderator_id: UserId,
    pub moderator_name: String,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Mutable-tail update for an existing case; None leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct CaseUpdate {
    pub reason: Option<String>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub visible: Option<bool>,
    pub handled: Option<bool>,
}

/// The persistence abstraction for punishment cases
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CaseRepository: Send + Sync {
    /// Create a new case, assigning the next case number for the guild
    async fn insert_case(&self, new: NewCase) -> ModerationResult<Case>;

    /// Apply a mutable-tail update to a case by internal ID
    async fn update_case(&self, case_id: &str, update: CaseUpdate) -> ModerationResult<Case>;

    /// Mark every active case of a kind for a target as handled.
    /// Returns how many cases were closed.
    async fn expire_cases_by_type(
        &self,
        kind: CaseType,
        guild_id: GuildId,
        target_id: UserId,
    ) -> ModerationResult<u32>;

    /// Look up a case by its guild-scoped number
    async fn fetch_case(&self, guild_id: GuildId, case_number: u64)
        -> ModerationResult<Option<Case>>;

    /// All unhandled ban cases for a guild
    async fn fetch_active_bans(&self, guild_id: GuildId) -> ModerationResult<Vec<Case>>;

    /// All active cases currently binding a target
    async fn fetch_active_by_target(
        &self,
        guild_id: GuildId,
        target_id: UserId,
    ) -> ModerationResult<Vec<Case>>;
}

/// In-memory case repository backed by a dashmap.
///
/// The single source of truth while the process runs; [`Data`](crate::Data)
/// snapshots it to YAML so case numbers and open punishments survive restarts.
#[derive(Clone, Default)]
pub struct MemoryCaseRepository {
    /// Map of case id -> case
    cases: Arc<DashMap<String, Case>>,
    /// Map of guild id -> next case number
    counters: Arc<DashMap<u64, u64>>,
}

impl MemoryCaseRepository {
    /// Create a new empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All cases, for persistence snapshots
    #[must_use]
    pub fn snapshot(&self) -> Vec<Case> {
        self.cases.iter().map(|e| e.value().clone()).collect()
    }

    /// Restore cases from a persistence snapshot, rebuilding the per-guild
    /// case number counters so numbering stays monotonic across restarts.
    pub fn restore(&self, cases: Vec<Case>) {
        for case in cases {
            let mut next = self.counters.entry(case.guild_id).or_insert(1);
            if case.case_number >= *next {
                *next = case.case_number + 1;
            }
            drop(next);
            self.cases.insert(case.id.clone(), case);
        }
    }

    fn next_case_number(&self, guild_id: u64) -> u64 {
        let mut entry = self.counters.entry(guild_id).or_insert(1);
        let number = *entry;
        *entry += 1;
        number
    }
}

#[async_trait::async_trait]
impl CaseRepository for MemoryCaseRepository {
    async fn insert_case(&self, new: NewCase) -> ModerationResult<Case> {
        if new.reason.as_ref().is_some_and(|r| r.chars().count() > MAX_REASON_LEN) {
            return Err(ModerationError::Validation(format!(
                "Reason must be at most {MAX_REASON_LEN} characters"
            )));
        }

        let case = Case {
            id: Uuid::new_v4().to_string(),
            case_number: self.next_case_number(new.guild_id.get()),
            kind: new.kind,
            guild_id: new.guild_id.get(),
            target_id: new.target_id.get(),
            target_name: new.target_name,
            moderator_id: new.moderator_id.get(),
            moderator_name: new.moderator_name,
            reason: new.reason,
            issued_at: Utc::now(),
            expires_at: new.expires_at,
            visible: true,
            handled: false,
        };

        self.cases.insert(case.id.clone(), case.clone());
        Ok(case)
    }

    async fn update_case(&self, case_id: &str, update: CaseUpdate) -> ModerationResult<Case> {
        if update.reason.as_ref().is_some_and(|r| r.chars().count() > MAX_REASON_LEN) {
            return Err(ModerationError::Validation(format!(
                "Reason must be at most {MAX_REASON_LEN} characters"
            )));
        }

        let mut case = self
            .cases
            .get_mut(case_id)
            .ok_or_else(|| ModerationError::NotFound(format!("case {case_id}")))?;

        if let Some(reason) = update.reason {
            case.reason = Some(reason);
        }
        if let Some(expires_at) = update.expires_at {
            case.expires_at = expires_at;
        }
        if let Some(visible) = update.visible {
            case.visible = visible;
        }
        if let Some(handled) = update.handled {
            case.handled = handled;
        }

        Ok(case.clone())
    }

    async fn expire_cases_by_type(
        &self,
        kind: CaseType,
        guild_id: GuildId,
        target_id: UserId,
    ) -> ModerationResult<u32> {
        let mut closed = 0;
        for mut entry in self.cases.iter_mut() {
            let case = entry.value_mut();
            if case.kind == kind
                && case.guild_id == guild_id.get()
                && case.target_id == target_id.get()
                && !case.handled
            {
                case.handled = true;
                closed += 1;
            }
        }
        Ok(closed)
    }

    async fn fetch_case(
        &self,
        guild_id: GuildId,
        case_number: u64,
    ) -> ModerationResult<Option<Case>> {
        Ok(self
            .cases
            .iter()
            .find(|e| e.guild_id == guild_id.get() && e.case_number == case_number)
            .map(|e| e.value().clone()))
    }

    async fn fetch_active_bans(&self, guild_id: GuildId) -> ModerationResult<Vec<Case>> {
        Ok(self
            .cases
            .iter()
            .filter(|e| e.kind == CaseType::Ban && e.guild_id == guild_id.get() && !e.handled)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn fetch_active_by_target(
        &self,
        guild_id: GuildId,
        target_id: UserId,
    ) -> ModerationResult<Vec<Case>> {
        Ok(self
            .cases
            .iter()
            .filter(|e| {
                e.guild_id == guild_id.get() && e.target_id == target_id.get() && e.is_active()
            })
            .map(|e| e.value().clone())
            .collect())
    }
}
