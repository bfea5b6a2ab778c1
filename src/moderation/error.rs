//! Error types for the moderation system
//!
//! This module defines the various errors that can occur while issuing,
//! revoking, or reconciling punishments.

use thiserror::Error;

use crate::moderation::PunishmentKind;

/// Errors that can occur during moderation operations
#[derive(Debug, Error)]
pub enum ModerationError {
    /// The acting moderator lacks the rank or permission for this action
    #[error("You are not allowed to {0}")]
    MissingPermission(String),

    /// The bot itself lacks the platform capability for this action.
    /// Surfaced differently from `MissingPermission` because it is a
    /// setup problem, not a moderator problem.
    #[error("The bot is missing a required permission: {0}")]
    MissingBotPermission(String),

    /// The chosen target can never be punished (bot, self, protected)
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Recoverable input problem (bad duration, reason too long, ...)
    #[error("{0}")]
    Validation(String),

    /// Another wizard session already holds the lock for this target
    #[error("A punishment menu for this user is already open at {url}")]
    TargetLocked { url: String },

    /// Invalid state transition attempted
    #[error("Invalid state transition")]
    InvalidStateTransition,

    /// Revoke was called on a punishment kind that does not support it.
    /// The menu layer must never offer this, so reaching it is a bug.
    #[error("{0} punishments cannot be revoked")]
    NotRevocable(PunishmentKind),

    /// Case or session not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Discord API error
    #[error("Discord API error: {0}")]
    DiscordApi(#[from] Box<poise::serenity_prelude::Error>),

    /// Generic error
    #[error("Moderation error: {0}")]
    Other(String),
}

impl From<poise::serenity_prelude::Error> for ModerationError {
    fn from(error: poise::serenity_prelude::Error) -> Self {
        Self::DiscordApi(Box::new(error))
    }
}

/// Convert a string into a ModerationError
impl From<String> for ModerationError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

impl ModerationError {
    /// Whether this error should be shown to the invoking user as-is.
    /// Everything else gets a generic message unless the user is an operator.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::MissingPermission(_)
                | Self::MissingBotPermission(_)
                | Self::InvalidTarget(_)
                | Self::Validation(_)
                | Self::TargetLocked { .. }
                | Self::NotFound(_)
        )
    }
}

/// Result type for moderation operations
pub type ModerationResult<T> = Result<T, ModerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ModerationError::MissingPermission("ban members".to_string());
        assert_eq!(error.to_string(), "You are not allowed to ban members");

        let error = ModerationError::MissingBotPermission("Ban Members".to_string());
        assert_eq!(
            error.to_string(),
            "The bot is missing a required permission: Ban Members"
        );

        let error = ModerationError::TargetLocked {
            url: "https://discord.com/channels/1/2/3".to_string(),
        };
        assert!(error.to_string().contains("already open at"));

        let error = ModerationError::from("Something went wrong".to_string());
        assert_eq!(error.to_string(), "Moderation error: Something went wrong");
    }

    #[test]
    fn test_user_facing_split() {
        assert!(ModerationError::Validation("bad duration".into()).is_user_facing());
        assert!(ModerationError::MissingPermission("x".into()).is_user_facing());
        assert!(!ModerationError::InvalidStateTransition.is_user_facing());
        assert!(!ModerationError::Other("internal".into()).is_user_facing());
    }
}
