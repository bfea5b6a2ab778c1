//! Punishment domain objects
//!
//! One transient command object per punishment kind, built from a validated
//! wizard draft. Executing it performs the platform side effect, writes the
//! case record, and notifies the target. The platform itself sits behind the
//! [`PlatformActor`] trait so the whole lifecycle is testable headlessly.

use chrono::{DateTime, Duration, Utc};
use poise::serenity_prelude::{
    self as serenity, ChannelId, GuildId, Http, MessageId, RoleId, Timestamp, UserId,
    builder::EditMember,
};
use rand::prelude::IndexedRandom;
use std::sync::Arc;
use tracing::{info, warn};

use crate::MODERATION_TARGET;
use crate::moderation::{
    Case, CaseRepository, CaseType, MAX_REASON_LEN, ModerationError, ModerationResult, NewCase,
};

/// Whether an action issues a new punishment or lifts an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionMode {
    Issue,
    Revoke,
}

impl ActionMode {
    /// Human verb phrase for permission errors and summaries
    #[must_use]
    pub fn verb(self, kind: PunishmentKind) -> String {
        match (self, kind) {
            (Self::Issue, PunishmentKind::Ban) => "ban members".to_string(),
            (Self::Revoke, PunishmentKind::Ban) => "unban members".to_string(),
            (Self::Issue, PunishmentKind::Kick) => "kick members".to_string(),
            (Self::Issue, PunishmentKind::Jail) => "jail members".to_string(),
            (Self::Revoke, PunishmentKind::Jail) => "unjail members".to_string(),
            (Self::Issue, PunishmentKind::Timeout) => "time members out".to_string(),
            (Self::Revoke, PunishmentKind::Timeout) => "remove timeouts".to_string(),
            (Self::Issue, PunishmentKind::Warning) => "warn members".to_string(),
            (Self::Revoke, kind) => format!("revoke a {kind}"),
        }
    }
}

/// The closed set of punishment kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PunishmentKind {
    Ban,
    Kick,
    Jail,
    Timeout,
    Warning,
}

impl std::fmt::Display for PunishmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ban => write!(f, "Ban"),
            Self::Kick => write!(f, "Kick"),
            Self::Jail => write!(f, "Jail"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Warning => write!(f, "Warning"),
        }
    }
}

/// Discord's hard ceiling on a single timeout
#[must_use]
pub fn max_timeout() -> Duration {
    Duration::weeks(4)
}

impl PunishmentKind {
    /// All kinds, in menu order
    pub const ALL: [Self; 5] = [
        Self::Ban,
        Self::Kick,
        Self::Jail,
        Self::Timeout,
        Self::Warning,
    ];

    /// Whether an issued punishment of this kind can later be lifted
    #[must_use]
    pub fn supports_revoke(self) -> bool {
        matches!(self, Self::Ban | Self::Jail | Self::Timeout)
    }

    /// Whether this kind can carry an expiry, and so gets a length stage
    #[must_use]
    pub fn supports_expiry(self) -> bool {
        matches!(self, Self::Ban | Self::Jail | Self::Timeout | Self::Warning)
    }

    /// The case type recorded for this kind
    #[must_use]
    pub fn case_type(self) -> CaseType {
        match self {
            Self::Ban => CaseType::Ban,
            Self::Kick => CaseType::Kick,
            Self::Jail => CaseType::Jail,
            Self::Timeout => CaseType::Timeout,
            Self::Warning => CaseType::Warning,
        }
    }
}

/// Id plus cached display name, denormalized into the case record
#[derive(Debug, Clone)]
pub struct UserSnapshot {
    pub id: UserId,
    pub name: String,
}

/// Reference to a sent direct message, kept so a pre-notification can be
/// retracted if the platform action then fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// The platform side effects the moderation core needs.
///
/// Every call may fail with a forbidden/not-found condition; callers treat
/// that as a normal, logged failure, never a crash.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlatformActor: Send + Sync {
    async fn ban(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        delete_message_days: u8,
        reason: &str,
    ) -> ModerationResult<()>;

    async fn unban(&self, guild_id: GuildId, user_id: UserId, reason: &str)
        -> ModerationResult<()>;

    async fn kick(&self, guild_id: GuildId, user_id: UserId, reason: &str)
        -> ModerationResult<()>;

    async fn timeout(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        until: DateTime<Utc>,
        reason: &str,
    ) -> ModerationResult<()>;

    async fn clear_timeout(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        reason: &str,
    ) -> ModerationResult<()>;

    async fn add_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> ModerationResult<()>;

    async fn remove_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> ModerationResult<()>;

    /// Send a DM. Ok(None) when the target's DMs are closed; that is not an
    /// error, punishments proceed without notification.
    async fn direct_message(
        &self,
        user_id: UserId,
        content: &str,
    ) -> ModerationResult<Option<SentMessage>>;

    /// Delete a previously sent DM (pre-notification retraction)
    async fn retract_message(&self, message: SentMessage) -> ModerationResult<()>;

    /// Post to a guild channel (the public moderation log)
    async fn post_to_channel(
        &self,
        channel_id: ChannelId,
        content: &str,
    ) -> ModerationResult<()>;
}

/// [`PlatformActor`] backed by the serenity HTTP client
pub struct SerenityPlatform {
    http: Arc<Http>,
}

impl SerenityPlatform {
    #[must_use]
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl PlatformActor for SerenityPlatform {
    async fn ban(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        delete_message_days: u8,
        reason: &str,
    ) -> ModerationResult<()> {
        guild_id
            .ban_with_reason(&self.http, user_id, delete_message_days, reason)
            .await
            .map_err(ModerationError::from)
    }

    async fn unban(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        _reason: &str,
    ) -> ModerationResult<()> {
        guild_id
            .unban(&self.http, user_id)
            .await
            .map_err(ModerationError::from)
    }

    async fn kick(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        reason: &str,
    ) -> ModerationResult<()> {
        guild_id
            .kick_with_reason(&self.http, user_id, reason)
            .await
            .map_err(ModerationError::from)
    }

    async fn timeout(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        until: DateTime<Utc>,
        reason: &str,
    ) -> ModerationResult<()> {
        let until = Timestamp::from(until);
        guild_id
            .edit_member(
                &self.http,
                user_id,
                EditMember::new()
                    .audit_log_reason(reason)
                    .disable_communication_until_datetime(until),
            )
            .await
            .map_err(ModerationError::from)?;
        Ok(())
    }

    async fn clear_timeout(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        reason: &str,
    ) -> ModerationResult<()> {
        guild_id
            .edit_member(
                &self.http,
                user_id,
                EditMember::new()
                    .audit_log_reason(reason)
                    .enable_communication(),
            )
            .await
            .map_err(ModerationError::from)?;
        Ok(())
    }

    async fn add_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> ModerationResult<()> {
        self.http
            .add_member_role(guild_id, user_id, role_id, Some(reason))
            .await
            .map_err(|e| ModerationError::from(serenity::Error::from(e)))
    }

    async fn remove_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> ModerationResult<()> {
        self.http
            .remove_member_role(guild_id, user_id, role_id, Some(reason))
            .await
            .map_err(|e| ModerationError::from(serenity::Error::from(e)))
    }

    async fn direct_message(
        &self,
        user_id: UserId,
        content: &str,
    ) -> ModerationResult<Option<SentMessage>> {
        let channel = match user_id.create_dm_channel(&self.http).await {
            Ok(channel) => channel,
            Err(e) => {
                // Closed DMs are routine, not an error
                warn!(target: MODERATION_TARGET, user_id = %user_id, error = %e, "Could not open DM channel");
                return Ok(None);
            }
        };
        match channel.say(&self.http, content).await {
            Ok(message) => Ok(Some(SentMessage {
                channel_id: channel.id,
                message_id: message.id,
            })),
            Err(e) => {
                warn!(target: MODERATION_TARGET, user_id = %user_id, error = %e, "Could not deliver DM");
                Ok(None)
            }
        }
    }

    async fn retract_message(&self, message: SentMessage) -> ModerationResult<()> {
        message
            .channel_id
            .delete_message(&self.http, message.message_id)
            .await
            .map_err(ModerationError::from)
    }

    async fn post_to_channel(
        &self,
        channel_id: ChannelId,
        content: &str,
    ) -> ModerationResult<()> {
        channel_id
            .say(&self.http, content)
            .await
            .map_err(ModerationError::from)?;
        Ok(())
    }
}

/// Public-message flavour lines for the cosmetic kidnapping variant of jail
const KIDNAP_LINES: [&str; 3] = [
    "has been kidnapped. No ransom will be accepted.",
    "was last seen being dragged into an unmarked van.",
    "has vanished. The jail logs say otherwise.",
];

/// A fully specified punishment, ready to execute.
///
/// Constructed once from a confirmed wizard draft; executing it creates
/// exactly one case (issue) or closes matching cases (revoke).
#[derive(Debug, Clone)]
pub struct Punishment {
    pub kind: PunishmentKind,
    pub guild_id: GuildId,
    pub target: UserSnapshot,
    pub moderator: UserSnapshot,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Days of message history to delete; ban only
    pub delete_message_days: u8,
    /// Required for jail
    pub jail_role: Option<RoleId>,
    /// Channel receiving the public moderation log line, when configured
    pub log_channel: Option<ChannelId>,
    /// Cosmetic jail variant, changes messaging only
    pub kidnapping: bool,
    /// Appeal link included in ban notifications when configured
    pub appeal_url: Option<String>,
}

impl Punishment {
    /// Validate the fields that gate any side effect
    fn validate(&self) -> ModerationResult<()> {
        if self.reason.as_ref().is_some_and(|r| r.chars().count() > MAX_REASON_LEN) {
            return Err(ModerationError::Validation(format!(
                "Reason must be at most {MAX_REASON_LEN} characters"
            )));
        }
        if self.kind == PunishmentKind::Jail && self.jail_role.is_none() {
            return Err(ModerationError::Validation(
                "No jail role is configured for this server".to_string(),
            ));
        }
        Ok(())
    }

    /// The audit-log line attached to the platform action
    #[must_use]
    pub fn audit_reason(&self) -> String {
        let reason = self.reason.as_deref().unwrap_or("No reason specified");
        match self.expires_at {
            Some(at) => format!(
                "{} by {}: {reason} (until {})",
                self.kind,
                self.moderator.name,
                at.format("%Y-%m-%d %H:%M UTC")
            ),
            None => format!("{} by {}: {reason}", self.kind, self.moderator.name),
        }
    }

    /// The notification text sent to the target
    #[must_use]
    pub fn notification(&self, mode: ActionMode) -> String {
        if mode == ActionMode::Revoke {
            return format!(
                "Your **{}** has been lifted.\nReason: {}",
                self.kind,
                self.reason.as_deref().unwrap_or("No reason specified"),
            );
        }

        let mut text = if self.kind == PunishmentKind::Jail && self.kidnapping {
            let line = KIDNAP_LINES
                .choose(&mut rand::rng())
                .copied()
                .unwrap_or(KIDNAP_LINES[0]);
            format!("You {line}\n")
        } else {
            format!("You have received a **{}**.\n", self.kind)
        };
        text.push_str(&format!(
            "Reason: {}\nExpires: {}",
            self.reason.as_deref().unwrap_or("No reason specified"),
            self.expires_at
                .map_or_else(|| "Never".to_string(), |at| at
                    .format("%Y-%m-%d %H:%M UTC")
                    .to_string()),
        ));
        if self.kind == PunishmentKind::Ban {
            if let Some(url) = &self.appeal_url {
                text.push_str(&format!("\nAppeal: {url}"));
            }
        }
        text
    }

    /// Issue this punishment: platform side effect, then the case record,
    /// then the post-issue notification.
    ///
    /// Ban and Kick pre-notify before the irreversible action so the target
    /// still receives the DM after losing the shared guild; if the action
    /// then fails, that DM is retracted.
    ///
    /// # Errors
    /// Any platform failure propagates after retraction; no case is created.
    pub async fn issue(
        &self,
        repo: &dyn CaseRepository,
        platform: &dyn PlatformActor,
    ) -> ModerationResult<Case> {
        self.validate()?;

        let removes_from_guild =
            matches!(self.kind, PunishmentKind::Ban | PunishmentKind::Kick);
        let pre_notification = if removes_from_guild {
            platform
                .direct_message(self.target.id, &self.notification(ActionMode::Issue))
                .await?
        } else {
            None
        };

        let audit = self.audit_reason();
        let effect = match self.kind {
            PunishmentKind::Ban => {
                platform
                    .ban(self.guild_id, self.target.id, self.delete_message_days, &audit)
                    .await
            }
            PunishmentKind::Kick => platform.kick(self.guild_id, self.target.id, &audit).await,
            PunishmentKind::Jail => {
                // validate() guarantees the role
                let role = self.jail_role.ok_or(ModerationError::InvalidStateTransition)?;
                platform.add_role(self.guild_id, self.target.id, role, &audit).await
            }
            PunishmentKind::Timeout => {
                let until = self.expires_at.ok_or_else(|| {
                    ModerationError::Validation("A timeout needs a duration".to_string())
                })?;
                platform.timeout(self.guild_id, self.target.id, until, &audit).await
            }
            PunishmentKind::Warning => Ok(()),
        };

        if let Err(e) = effect {
            if let Some(message) = pre_notification {
                if let Err(retract_err) = platform.retract_message(message).await {
                    warn!(
                        target: MODERATION_TARGET,
                        error = %retract_err,
                        "Failed to retract pre-notification after action failure"
                    );
                }
            }
            return Err(e);
        }

        // Removal from the guild supersedes in-guild restrictions
        if removes_from_guild {
            for kind in [CaseType::Jail, CaseType::Mute] {
                if let Err(e) = repo
                    .expire_cases_by_type(kind, self.guild_id, self.target.id)
                    .await
                {
                    warn!(target: MODERATION_TARGET, error = %e, "Failed to expire superseded {kind} cases");
                }
            }
        }

        let case = repo
            .insert_case(NewCase {
                kind: self.kind.case_type(),
                guild_id: self.guild_id,
                target_id: self.target.id,
                target_name: self.target.name.clone(),
                moderator_id: self.moderator.id,
                moderator_name: self.moderator.name.clone(),
                reason: self.reason.clone(),
                expires_at: self.expires_at,
            })
            .await?;

        if !removes_from_guild {
            // Post-issue notification; delivery failure never voids the case
            let _ = platform
                .direct_message(self.target.id, &self.notification(ActionMode::Issue))
                .await;
        }

        if let Some(channel) = self.log_channel {
            let line = format!(
                "Case #{}: **{}** issued for **{}** by **{}** — {}",
                case.case_number,
                self.kind,
                self.target.name,
                self.moderator.name,
                self.reason.as_deref().unwrap_or("No reason specified"),
            );
            if let Err(e) = platform.post_to_channel(channel, &line).await {
                warn!(
                    target: MODERATION_TARGET,
                    error = %e,
                    "Could not post to the moderation log channel"
                );
            }
        }

        info!(
            target: MODERATION_TARGET,
            case_number = case.case_number,
            kind = %self.kind,
            guild_id = %self.guild_id,
            target_id = %self.target.id,
            moderator_id = %self.moderator.id,
            expires_at = ?case.expires_at,
            "Punishment issued"
        );

        Ok(case)
    }

    /// Revoke this punishment: inverse platform effect, close matching open
    /// cases, notify the target.
    ///
    /// # Errors
    /// [`ModerationError::NotRevocable`] when the kind cannot be revoked;
    /// the menu layer must never offer that.
    pub async fn revoke(
        &self,
        repo: &dyn CaseRepository,
        platform: &dyn PlatformActor,
    ) -> ModerationResult<u32> {
        if !self.kind.supports_revoke() {
            debug_assert!(false, "revoke called on non-revocable kind");
            return Err(ModerationError::NotRevocable(self.kind));
        }
        self.validate()?;

        let audit = self.audit_reason();
        match self.kind {
            PunishmentKind::Ban => {
                platform.unban(self.guild_id, self.target.id, &audit).await?;
            }
            PunishmentKind::Jail => {
                let role = self.jail_role.ok_or(ModerationError::InvalidStateTransition)?;
                platform
                    .remove_role(self.guild_id, self.target.id, role, &audit)
                    .await?;
            }
            PunishmentKind::Timeout => {
                platform.clear_timeout(self.guild_id, self.target.id, &audit).await?;
            }
            PunishmentKind::Kick | PunishmentKind::Warning => unreachable!(),
        }

        let closed = repo
            .expire_cases_by_type(self.kind.case_type(), self.guild_id, self.target.id)
            .await?;

        let _ = platform
            .direct_message(self.target.id, &self.notification(ActionMode::Revoke))
            .await;

        if let Some(channel) = self.log_channel {
            let line = format!(
                "**{}** lifted for **{}** by **{}**",
                self.kind, self.target.name, self.moderator.name,
            );
            if let Err(e) = platform.post_to_channel(channel, &line).await {
                warn!(
                    target: MODERATION_TARGET,
                    error = %e,
                    "Could not post to the moderation log channel"
                );
            }
        }

        info!(
            target: MODERATION_TARGET,
            kind = %self.kind,
            guild_id = %self.guild_id,
            target_id = %self.target.id,
            moderator_id = %self.moderator.id,
            cases_closed = closed,
            "Punishment revoked"
        );

        Ok(closed)
    }
}
