//! The moderation core for Warden
//!
//! Everything here is headless: the wizard, authority checks, punishment
//! execution, and expiry reconciliation operate on traits and plain data, so
//! the whole punishment lifecycle is testable without a gateway connection.

mod authority;
mod case;
mod duration;
mod error;
mod expiry;
mod guard;
mod punishment;
mod wizard;

pub use authority::{AuthorityConfig, MemberProfile, Rank, RankLadder, validate_action};
pub use case::{
    Case, CaseRepository, CaseType, CaseUpdate, MAX_REASON_LEN, MemoryCaseRepository, NewCase,
};
pub use duration::{ParsedLength, parse_length};
pub use error::{ModerationError, ModerationResult};
pub use expiry::{BAN_POLL_INTERVAL_SECS, ExpiryService};
pub use guard::{GuardEntry, STALE_LOCK_MINUTES, TargetGuard};
pub use punishment::{
    ActionMode, PlatformActor, Punishment, PunishmentKind, SentMessage, SerenityPlatform,
    UserSnapshot, max_timeout,
};
pub use wizard::{
    EditField, PunishmentDraft, WIZARD_TIMEOUT_SECS, WizardEvent, WizardReply, WizardSession,
    WizardStage, length_presets, reason_presets,
};

#[cfg(test)]
pub use case::MockCaseRepository;
#[cfg(test)]
pub use punishment::MockPlatformActor;

/// Request type for the expiry reconciliation task
#[derive(Debug, Clone)]
pub enum ModerationCheckRequest {
    /// Reconcile every registered guild now
    CheckAll,
    /// Reconcile a single guild
    CheckGuild { guild_id: poise::serenity_prelude::GuildId },
    /// Shut the reconciliation task down
    Shutdown,
}
