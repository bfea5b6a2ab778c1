//! The punishment wizard state machine
//!
//! Drives the guided flow a moderator walks through to construct a
//! punishment: type selection, reason, length, confirmation. The machine is
//! pure state and transitions; rendering the stages as messages and buttons
//! is the command layer's job, which keeps every path testable headlessly.
//!
//! Exactly one case is created or closed per completed session; a cancelled
//! or timed-out session touches nothing.

use chrono::{DateTime, Duration, Utc};
use poise::serenity_prelude::{ChannelId, GuildId, RoleId};

use crate::moderation::{
    ActionMode, MAX_REASON_LEN, ModerationError, ModerationResult, ParsedLength, Punishment,
    PunishmentKind, UserSnapshot, max_timeout,
};

/// Default wizard inactivity timeout, matching the component lifetime
pub const WIZARD_TIMEOUT_SECS: u64 = 240;

/// Minimum distance into the future for any expiry. Anything shorter is an
/// effectively-instant punishment that is really a reason-less no-op.
pub fn min_expiry() -> Duration {
    Duration::minutes(5)
}

/// Stages of the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStage {
    TypeSelection,
    EditReason,
    EditExpiry,
    EditDeleteMessageDays,
    Confirmation,
    Finished,
    Cancelled,
    TimedOut,
}

impl WizardStage {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::TimedOut)
    }
}

/// Summary fields that can be revisited from confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    Reason,
    Expiry,
    DeleteMessageDays,
}

/// User selections fed into the machine
#[derive(Debug, Clone)]
pub enum WizardEvent {
    SelectType { kind: PunishmentKind, mode: ActionMode },
    SelectReason(String),
    SelectLength(ParsedLength),
    SetDeleteMessageDays(u8),
    Edit(EditField),
    Confirm,
    Cancel,
    Timeout,
}

/// What a transition produced
#[derive(Debug)]
pub enum WizardReply {
    /// Moved to a new non-terminal stage (or updated the current one)
    Advanced,
    /// Confirm consumed the draft into exactly one punishment
    Completed(Box<Punishment>, ActionMode),
    /// Session ended without touching any case
    Closed,
}

/// The mutable draft held for the duration of one session. Never persisted.
#[derive(Debug, Clone)]
pub struct PunishmentDraft {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub moderator: UserSnapshot,
    pub target: UserSnapshot,
    pub kind: Option<PunishmentKind>,
    /// Fixed at the moment a type is selected; never changes afterward
    pub mode: ActionMode,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether a length was explicitly chosen (permanent counts)
    pub expiry_chosen: bool,
    pub delete_message_days: u8,
    pub jail_role: Option<RoleId>,
    /// Channel receiving the public moderation log line
    pub log_channel: Option<ChannelId>,
    pub kidnapping: bool,
}

/// One open wizard session
#[derive(Debug)]
pub struct WizardSession {
    pub draft: PunishmentDraft,
    stage: WizardStage,
    /// Guided flow; edits from confirmation are only allowed while guided
    guided: bool,
    /// Set while revisiting a field from confirmation
    editing: Option<EditField>,
    last_activity: DateTime<Utc>,
    timeout_after: Duration,
    guard_release_pending: bool,
    appeal_url: Option<String>,
    warning_default_expiry: Duration,
}

impl WizardSession {
    /// Open a session for one (guild, target) pair. The caller holds the
    /// concurrency guard before this and releases it on any terminal stage.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        guild_id: GuildId,
        channel_id: ChannelId,
        moderator: UserSnapshot,
        target: UserSnapshot,
        jail_role: Option<RoleId>,
        appeal_url: Option<String>,
        log_channel: Option<ChannelId>,
        warning_default_expiry: Duration,
        timeout_after: Duration,
    ) -> Self {
        Self {
            draft: PunishmentDraft {
                guild_id,
                channel_id,
                moderator,
                target,
                kind: None,
                mode: ActionMode::Issue,
                reason: None,
                expires_at: None,
                expiry_chosen: false,
                delete_message_days: 0,
                jail_role,
                log_channel,
                kidnapping: false,
            },
            stage: WizardStage::TypeSelection,
            guided: true,
            editing: None,
            last_activity: Utc::now(),
            timeout_after,
            guard_release_pending: false,
            appeal_url,
            warning_default_expiry,
        }
    }

    #[must_use]
    pub fn stage(&self) -> WizardStage {
        self.stage
    }

    /// Whether the session has sat idle past its timeout
    #[must_use]
    pub fn is_idle_expired(&self, now: DateTime<Utc>) -> bool {
        !self.stage.is_terminal() && now - self.last_activity > self.timeout_after
    }

    /// True exactly once, when a terminal stage has been reached and the
    /// guard has not yet been released. Guarantees release cannot double-fire.
    pub fn take_guard_release(&mut self) -> bool {
        std::mem::take(&mut self.guard_release_pending)
    }

    /// Apply one event.
    ///
    /// # Errors
    /// Validation errors leave the session on its current stage so the user
    /// can re-enter; [`ModerationError::InvalidStateTransition`] flags events
    /// that the current stage never offers.
    pub fn apply(&mut self, event: WizardEvent) -> ModerationResult<WizardReply> {
        if self.stage.is_terminal() {
            return Err(ModerationError::InvalidStateTransition);
        }

        // Cancellation and timeout are offered from every stage
        match event {
            WizardEvent::Cancel => {
                self.close(WizardStage::Cancelled);
                return Ok(WizardReply::Closed);
            }
            WizardEvent::Timeout => {
                self.close(WizardStage::TimedOut);
                return Ok(WizardReply::Closed);
            }
            _ => {}
        }

        let reply = match (self.stage, event) {
            (WizardStage::TypeSelection, WizardEvent::SelectType { kind, mode }) => {
                if mode == ActionMode::Revoke && !kind.supports_revoke() {
                    return Err(ModerationError::NotRevocable(kind));
                }
                self.draft.kind = Some(kind);
                self.draft.mode = mode;
                // Revocations close an existing record; no reason/length guidance
                self.stage = if mode == ActionMode::Revoke || !self.guided {
                    WizardStage::Confirmation
                } else {
                    WizardStage::EditReason
                };
                WizardReply::Advanced
            }

            (WizardStage::EditReason, WizardEvent::SelectReason(reason)) => {
                let reason = reason.trim().to_string();
                if reason.is_empty() {
                    return Err(ModerationError::Validation(
                        "Reason cannot be empty".to_string(),
                    ));
                }
                if reason.chars().count() > MAX_REASON_LEN {
                    return Err(ModerationError::Validation(format!(
                        "Reason must be at most {MAX_REASON_LEN} characters"
                    )));
                }
                self.draft.reason = Some(reason);
                self.stage = if self.editing.take().is_some() {
                    WizardStage::Confirmation
                } else if self.draft.kind.is_some_and(PunishmentKind::supports_expiry) {
                    WizardStage::EditExpiry
                } else {
                    WizardStage::Confirmation
                };
                WizardReply::Advanced
            }

            (WizardStage::EditExpiry, WizardEvent::SelectLength(choice)) => {
                match choice {
                    ParsedLength::Permanent => {
                        if self.draft.kind == Some(PunishmentKind::Timeout) {
                            return Err(ModerationError::Validation(
                                "A timeout cannot be permanent".to_string(),
                            ));
                        }
                        self.draft.expires_at = None;
                    }
                    ParsedLength::After(span) => {
                        if span < min_expiry() {
                            return Err(ModerationError::Validation(
                                "The punishment must last at least 5 minutes".to_string(),
                            ));
                        }
                        if self.draft.kind == Some(PunishmentKind::Timeout)
                            && span > max_timeout()
                        {
                            return Err(ModerationError::Validation(
                                "A timeout cannot last longer than 4 weeks".to_string(),
                            ));
                        }
                        // Parseable spans can still overflow the date range
                        let expires_at =
                            Utc::now().checked_add_signed(span).ok_or_else(|| {
                                ModerationError::Validation(
                                    "That duration is too far in the future".to_string(),
                                )
                            })?;
                        self.draft.expires_at = Some(expires_at);
                    }
                }
                self.draft.expiry_chosen = true;
                self.editing.take();
                self.stage = WizardStage::Confirmation;
                WizardReply::Advanced
            }

            (WizardStage::EditDeleteMessageDays, WizardEvent::SetDeleteMessageDays(days)) => {
                if days > 7 {
                    return Err(ModerationError::Validation(
                        "At most 7 days of messages can be deleted".to_string(),
                    ));
                }
                self.draft.delete_message_days = days;
                self.editing.take();
                self.stage = WizardStage::Confirmation;
                WizardReply::Advanced
            }

            (WizardStage::Confirmation, WizardEvent::Edit(field)) => {
                if !self.guided || self.draft.mode != ActionMode::Issue {
                    return Err(ModerationError::InvalidStateTransition);
                }
                let kind = self.draft.kind.ok_or(ModerationError::InvalidStateTransition)?;
                self.stage = match field {
                    EditField::Reason => WizardStage::EditReason,
                    EditField::Expiry if kind.supports_expiry() => WizardStage::EditExpiry,
                    EditField::DeleteMessageDays if kind == PunishmentKind::Ban => {
                        WizardStage::EditDeleteMessageDays
                    }
                    _ => return Err(ModerationError::InvalidStateTransition),
                };
                self.editing = Some(field);
                WizardReply::Advanced
            }

            (WizardStage::Confirmation, WizardEvent::Confirm) => {
                let punishment = self.build_punishment()?;
                let mode = self.draft.mode;
                self.close(WizardStage::Finished);
                WizardReply::Completed(Box::new(punishment), mode)
            }

            _ => return Err(ModerationError::InvalidStateTransition),
        };

        self.last_activity = Utc::now();
        Ok(reply)
    }

    fn close(&mut self, stage: WizardStage) {
        self.stage = stage;
        self.guard_release_pending = true;
    }

    /// Consume the draft into the concrete domain object
    fn build_punishment(&self) -> ModerationResult<Punishment> {
        let kind = self.draft.kind.ok_or(ModerationError::InvalidStateTransition)?;

        let expires_at = if kind == PunishmentKind::Warning && !self.draft.expiry_chosen {
            // Warnings are not meant to be permanent unless deliberately extended
            Some(Utc::now() + self.warning_default_expiry)
        } else {
            self.draft.expires_at
        };

        Ok(Punishment {
            kind,
            guild_id: self.draft.guild_id,
            target: self.draft.target.clone(),
            moderator: self.draft.moderator.clone(),
            reason: self.draft.reason.clone(),
            expires_at,
            delete_message_days: self.draft.delete_message_days,
            jail_role: self.draft.jail_role,
            log_channel: self.draft.log_channel,
            kidnapping: self.draft.kidnapping,
            appeal_url: self.appeal_url.clone(),
        })
    }

    /// Summary text for the renderer: target, action, reason, expiry
    #[must_use]
    pub fn summary(&self) -> String {
        let action = match (self.draft.kind, self.draft.mode) {
            (Some(kind), ActionMode::Issue) => kind.to_string(),
            (Some(kind), ActionMode::Revoke) => format!("Revoke {kind}"),
            (None, _) => "—".to_string(),
        };
        let mut lines = vec![
            format!("**Target:** {}", self.draft.target.name),
            format!("**Action:** {action}"),
            format!(
                "**Reason:** {}",
                self.draft.reason.as_deref().unwrap_or("No reason specified")
            ),
            format!(
                "**Expires:** {}",
                self.draft.expires_at.map_or_else(
                    || "Never".to_string(),
                    |at| at.format("%Y-%m-%d %H:%M UTC").to_string()
                )
            ),
        ];
        if self.draft.kind == Some(PunishmentKind::Ban) {
            lines.push(format!(
                "**Delete messages:** {} day(s)",
                self.draft.delete_message_days
            ));
        }
        lines.join("\n")
    }
}

/// Curated reason shortlist for a punishment kind
#[must_use]
pub fn reason_presets(kind: PunishmentKind) -> &'static [&'static str] {
    match kind {
        PunishmentKind::Ban => &["Spam", "Advertising", "Harassment", "Ban evasion", "NSFW content"],
        PunishmentKind::Kick => &["Spam", "Inappropriate name", "Troll account"],
        PunishmentKind::Jail => &["Cool-down", "Disruptive behaviour", "Pending review"],
        PunishmentKind::Timeout => &["Spam", "Flaming", "Channel misuse"],
        PunishmentKind::Warning => &["Spam", "Rude behaviour", "Off-topic", "Minor rule breach"],
    }
}

/// Curated length shortlist for a punishment kind. Timeout is capped by the
/// platform's 4-week ceiling and never offers permanent.
#[must_use]
pub fn length_presets(kind: PunishmentKind) -> Vec<(&'static str, ParsedLength)> {
    let mut presets = vec![
        ("1 hour", ParsedLength::After(Duration::hours(1))),
        ("24 hours", ParsedLength::After(Duration::hours(24))),
        ("7 days", ParsedLength::After(Duration::days(7))),
    ];
    if kind == PunishmentKind::Timeout {
        presets.push(("4 weeks", ParsedLength::After(Duration::weeks(4))));
    } else {
        presets.push(("30 days", ParsedLength::After(Duration::days(30))));
        presets.push(("Permanent", ParsedLength::Permanent));
    }
    presets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::parse_length;
    use poise::serenity_prelude::UserId;

    fn session() -> WizardSession {
        WizardSession::open(
            GuildId::new(67890),
            ChannelId::new(555),
            UserSnapshot {
                id: UserId::new(54321),
                name: "moderator".to_string(),
            },
            UserSnapshot {
                id: UserId::new(12345),
                name: "target".to_string(),
            },
            Some(RoleId::new(77)),
            Some("https://example.com/appeal".to_string()),
            None,
            Duration::days(90),
            Duration::seconds(240),
        )
    }

    #[test]
    fn test_full_issue_walkthrough_round_trip() {
        // Ban, 24 hours, reason "Spam", confirmed end to end
        let mut s = session();
        assert_eq!(s.stage(), WizardStage::TypeSelection);

        s.apply(WizardEvent::SelectType {
            kind: PunishmentKind::Ban,
            mode: ActionMode::Issue,
        })
        .unwrap();
        assert_eq!(s.stage(), WizardStage::EditReason);

        s.apply(WizardEvent::SelectReason("Spam".to_string())).unwrap();
        assert_eq!(s.stage(), WizardStage::EditExpiry);

        s.apply(WizardEvent::SelectLength(ParsedLength::After(Duration::hours(24))))
            .unwrap();
        assert_eq!(s.stage(), WizardStage::Confirmation);

        let reply = s.apply(WizardEvent::Confirm).unwrap();
        assert_eq!(s.stage(), WizardStage::Finished);
        assert!(s.take_guard_release());

        let WizardReply::Completed(punishment, mode) = reply else {
            panic!("expected Completed");
        };
        assert_eq!(mode, ActionMode::Issue);
        assert_eq!(punishment.kind, PunishmentKind::Ban);
        assert_eq!(punishment.reason.as_deref(), Some("Spam"));
        let until = punishment.expires_at.unwrap() - Utc::now();
        assert!(until > Duration::hours(23) && until <= Duration::hours(24));
    }

    #[test]
    fn test_revoke_skips_to_confirmation() {
        let mut s = session();
        s.apply(WizardEvent::SelectType {
            kind: PunishmentKind::Ban,
            mode: ActionMode::Revoke,
        })
        .unwrap();
        assert_eq!(s.stage(), WizardStage::Confirmation);

        let reply = s.apply(WizardEvent::Confirm).unwrap();
        let WizardReply::Completed(_, mode) = reply else {
            panic!("expected Completed");
        };
        assert_eq!(mode, ActionMode::Revoke);
    }

    #[test]
    fn test_revoke_never_offered_for_kick() {
        let mut s = session();
        let err = s
            .apply(WizardEvent::SelectType {
                kind: PunishmentKind::Kick,
                mode: ActionMode::Revoke,
            })
            .unwrap_err();
        assert!(matches!(err, ModerationError::NotRevocable(_)));
        assert_eq!(s.stage(), WizardStage::TypeSelection);
    }

    #[test]
    fn test_kick_skips_length_stage() {
        let mut s = session();
        s.apply(WizardEvent::SelectType {
            kind: PunishmentKind::Kick,
            mode: ActionMode::Issue,
        })
        .unwrap();
        s.apply(WizardEvent::SelectReason("Troll account".to_string())).unwrap();
        assert_eq!(s.stage(), WizardStage::Confirmation);
    }

    #[test]
    fn test_short_expiry_rejected_and_stage_kept() {
        let mut s = session();
        s.apply(WizardEvent::SelectType {
            kind: PunishmentKind::Jail,
            mode: ActionMode::Issue,
        })
        .unwrap();
        s.apply(WizardEvent::SelectReason("Cool-down".to_string())).unwrap();

        let err = s
            .apply(WizardEvent::SelectLength(ParsedLength::After(Duration::minutes(4))))
            .unwrap_err();
        assert!(matches!(err, ModerationError::Validation(_)));
        // Session stays on the stage and can re-enter
        assert_eq!(s.stage(), WizardStage::EditExpiry);
        s.apply(WizardEvent::SelectLength(ParsedLength::After(Duration::hours(1))))
            .unwrap();
        assert_eq!(s.stage(), WizardStage::Confirmation);
    }

    #[test]
    fn test_huge_duration_rejected_at_stage() {
        // Fully parseable spans can still overflow the date range; the
        // session reports a validation error and stays on the stage
        let mut s = session();
        s.apply(WizardEvent::SelectType {
            kind: PunishmentKind::Ban,
            mode: ActionMode::Issue,
        })
        .unwrap();
        s.apply(WizardEvent::SelectReason("Spam".to_string())).unwrap();

        let length = parse_length("2000000000d").unwrap();
        assert!(matches!(length, ParsedLength::After(_)));
        let err = s.apply(WizardEvent::SelectLength(length)).unwrap_err();
        assert!(matches!(err, ModerationError::Validation(_)));
        assert_eq!(s.stage(), WizardStage::EditExpiry);

        s.apply(WizardEvent::SelectLength(ParsedLength::After(Duration::hours(1))))
            .unwrap();
        assert_eq!(s.stage(), WizardStage::Confirmation);
    }

    #[test]
    fn test_timeout_rejects_permanent() {
        // "permanent" typed into the free-text prompt must fail here, not
        // after confirmation
        let mut s = session();
        s.apply(WizardEvent::SelectType {
            kind: PunishmentKind::Timeout,
            mode: ActionMode::Issue,
        })
        .unwrap();
        s.apply(WizardEvent::SelectReason("Flaming".to_string())).unwrap();

        let err = s.apply(WizardEvent::SelectLength(ParsedLength::Permanent)).unwrap_err();
        assert!(matches!(err, ModerationError::Validation(_)));
        assert_eq!(s.stage(), WizardStage::EditExpiry);

        s.apply(WizardEvent::SelectLength(ParsedLength::After(Duration::hours(1))))
            .unwrap();
        assert_eq!(s.stage(), WizardStage::Confirmation);
    }

    #[test]
    fn test_timeout_duration_ceiling() {
        let mut s = session();
        s.apply(WizardEvent::SelectType {
            kind: PunishmentKind::Timeout,
            mode: ActionMode::Issue,
        })
        .unwrap();
        s.apply(WizardEvent::SelectReason("Flaming".to_string())).unwrap();

        let err = s
            .apply(WizardEvent::SelectLength(ParsedLength::After(
                Duration::weeks(4) + Duration::minutes(1),
            )))
            .unwrap_err();
        assert!(matches!(err, ModerationError::Validation(_)));
        assert_eq!(s.stage(), WizardStage::EditExpiry);

        s.apply(WizardEvent::SelectLength(ParsedLength::After(Duration::weeks(4))))
            .unwrap();
        assert_eq!(s.stage(), WizardStage::Confirmation);
    }

    #[test]
    fn test_edit_returns_to_confirmation() {
        let mut s = session();
        s.apply(WizardEvent::SelectType {
            kind: PunishmentKind::Ban,
            mode: ActionMode::Issue,
        })
        .unwrap();
        s.apply(WizardEvent::SelectReason("Spam".to_string())).unwrap();
        s.apply(WizardEvent::SelectLength(ParsedLength::Permanent)).unwrap();
        assert_eq!(s.stage(), WizardStage::Confirmation);

        // Revisit the reason; the next reason selection returns straight
        // to confirmation instead of continuing to the length stage
        s.apply(WizardEvent::Edit(EditField::Reason)).unwrap();
        assert_eq!(s.stage(), WizardStage::EditReason);
        s.apply(WizardEvent::SelectReason("Ban evasion".to_string())).unwrap();
        assert_eq!(s.stage(), WizardStage::Confirmation);
        assert_eq!(s.draft.reason.as_deref(), Some("Ban evasion"));

        // Delete-message-days is reachable for bans
        s.apply(WizardEvent::Edit(EditField::DeleteMessageDays)).unwrap();
        assert_eq!(s.stage(), WizardStage::EditDeleteMessageDays);
        s.apply(WizardEvent::SetDeleteMessageDays(7)).unwrap();
        assert_eq!(s.stage(), WizardStage::Confirmation);
        assert_eq!(s.draft.delete_message_days, 7);
    }

    #[test]
    fn test_edit_not_offered_for_unsupported_fields() {
        let mut s = session();
        s.apply(WizardEvent::SelectType {
            kind: PunishmentKind::Kick,
            mode: ActionMode::Issue,
        })
        .unwrap();
        s.apply(WizardEvent::SelectReason("Spam".to_string())).unwrap();

        // Kick has no expiry and no delete-message-days
        assert!(s.apply(WizardEvent::Edit(EditField::Expiry)).is_err());
        assert!(s.apply(WizardEvent::Edit(EditField::DeleteMessageDays)).is_err());
        assert_eq!(s.stage(), WizardStage::Confirmation);
    }

    #[test]
    fn test_cancel_from_any_stage_releases_guard_once() {
        // An abandoned session times out the same way; cancel only
        // differs in wording
        let mut s = session();
        s.apply(WizardEvent::SelectType {
            kind: PunishmentKind::Ban,
            mode: ActionMode::Issue,
        })
        .unwrap();
        assert_eq!(s.stage(), WizardStage::EditReason);

        let reply = s.apply(WizardEvent::Cancel).unwrap();
        assert!(matches!(reply, WizardReply::Closed));
        assert_eq!(s.stage(), WizardStage::Cancelled);

        // Release fires exactly once
        assert!(s.take_guard_release());
        assert!(!s.take_guard_release());

        // No further events are accepted
        assert!(s.apply(WizardEvent::Confirm).is_err());
    }

    #[test]
    fn test_timeout_transition() {
        let mut s = session();
        let reply = s.apply(WizardEvent::Timeout).unwrap();
        assert!(matches!(reply, WizardReply::Closed));
        assert_eq!(s.stage(), WizardStage::TimedOut);
        assert!(s.take_guard_release());
    }

    #[test]
    fn test_idle_detection() {
        let s = session();
        assert!(!s.is_idle_expired(Utc::now()));
        assert!(s.is_idle_expired(Utc::now() + Duration::seconds(241)));
    }

    #[test]
    fn test_warning_defaults_to_ninety_days() {
        let mut s = session();
        s.apply(WizardEvent::SelectType {
            kind: PunishmentKind::Warning,
            mode: ActionMode::Issue,
        })
        .unwrap();
        s.apply(WizardEvent::SelectReason("Spam".to_string())).unwrap();
        // Skip straight past the length stage without a choice by editing
        // nothing; the wizard still requires a length selection, so choose
        // permanent explicitly and compare with the defaulted path below.
        s.apply(WizardEvent::SelectLength(ParsedLength::Permanent)).unwrap();
        let WizardReply::Completed(punishment, _) = s.apply(WizardEvent::Confirm).unwrap() else {
            panic!("expected Completed");
        };
        // Explicit permanent is honoured
        assert!(punishment.expires_at.is_none());

        // A draft confirmed without an explicit choice gets the default
        let mut s = session();
        s.apply(WizardEvent::SelectType {
            kind: PunishmentKind::Warning,
            mode: ActionMode::Issue,
        })
        .unwrap();
        s.apply(WizardEvent::SelectReason("Spam".to_string())).unwrap();
        s.draft.expiry_chosen = false;
        s.stage = WizardStage::Confirmation;
        let WizardReply::Completed(punishment, _) = s.apply(WizardEvent::Confirm).unwrap() else {
            panic!("expected Completed");
        };
        let span = punishment.expires_at.unwrap() - Utc::now();
        assert!(span > Duration::days(89) && span <= Duration::days(90));
    }

    #[test]
    fn test_reason_and_length_presets() {
        for kind in PunishmentKind::ALL {
            assert!(!reason_presets(kind).is_empty());
        }
        let timeout_presets = length_presets(PunishmentKind::Timeout);
        assert!(timeout_presets.iter().all(|(_, l)| *l != ParsedLength::Permanent));
        let ban_presets = length_presets(PunishmentKind::Ban);
        assert!(ban_presets.iter().any(|(_, l)| *l == ParsedLength::Permanent));
    }
}
