//! The authority model
//!
//! Decides whether a moderator may issue or revoke a punishment against a
//! target, and whether the bot itself can carry the action out. Two parallel
//! strategies: the home guild uses a hardcoded role-rank ladder; every other
//! guild falls back to channel-resolved permission bits.
//!
//! [`validate_action`] is the single entry point and is called both when the
//! punishment menu is rendered and again when a selection executes, so the
//! two checks can never drift apart across suspension points.

use poise::serenity_prelude::{Permissions, RoleId, UserId};
use serde::{Deserialize, Serialize};

use crate::moderation::{ActionMode, ModerationError, ModerationResult, PunishmentKind};

/// A moderator's position in the home guild's authority ladder.
/// Each rank implies every rank below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    /// Not a moderator at all
    None,
    /// Moderator for the foreign-language chat only
    ForeignChatModerator,
    JuniorModerator,
    Moderator,
    SeniorModerator,
    Administrator,
    Developer,
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "Member"),
            Self::ForeignChatModerator => write!(f, "Foreign Chat Moderator"),
            Self::JuniorModerator => write!(f, "Junior Moderator"),
            Self::Moderator => write!(f, "Moderator"),
            Self::SeniorModerator => write!(f, "Senior Moderator"),
            Self::Administrator => write!(f, "Administrator"),
            Self::Developer => write!(f, "Developer"),
        }
    }
}

/// Role-id sets that define the home guild's rank ladder
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankLadder {
    /// User ids that always count as developers
    pub developer_ids: Vec<u64>,
    pub administrator_roles: Vec<u64>,
    pub senior_moderator_roles: Vec<u64>,
    pub moderator_roles: Vec<u64>,
    pub junior_moderator_roles: Vec<u64>,
    pub foreign_chat_roles: Vec<u64>,
}

impl RankLadder {
    /// Determine a member's rank from their user id and role set
    #[must_use]
    pub fn rank_of(&self, user_id: UserId, roles: &[RoleId]) -> Rank {
        if self.developer_ids.contains(&user_id.get()) {
            return Rank::Developer;
        }
        let has_any = |ids: &[u64]| roles.iter().any(|r| ids.contains(&r.get()));

        if has_any(&self.administrator_roles) {
            Rank::Administrator
        } else if has_any(&self.senior_moderator_roles) {
            Rank::SeniorModerator
        } else if has_any(&self.moderator_roles) {
            Rank::Moderator
        } else if has_any(&self.junior_moderator_roles) {
            Rank::JuniorModerator
        } else if has_any(&self.foreign_chat_roles) {
            Rank::ForeignChatModerator
        } else {
            Rank::None
        }
    }
}

/// Snapshot of one guild member, captured so authority checks run without
/// touching the gateway or cache mid-decision
#[derive(Debug, Clone)]
pub struct MemberProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub roles: Vec<RoleId>,
    /// Position of the member's highest role
    pub top_role_position: u16,
    /// Permission bits resolved for the channel the action occurs in,
    /// not guild-level bits: channel overrides can differ
    pub permissions: Permissions,
    pub is_bot: bool,
    /// Whether the user is currently a member of the guild
    pub present: bool,
}

/// Authority-relevant slice of a guild's configuration
#[derive(Debug, Clone, Default)]
pub struct AuthorityConfig {
    /// Set when this guild is the home guild
    pub ladder: Option<RankLadder>,
    /// Whether moderators may be punished at all in this guild
    pub allow_punishing_moderators: bool,
    /// Configured jail role, required for jail actions
    pub jail_role: Option<RoleId>,
}

impl AuthorityConfig {
    /// Whether a member independently qualifies as "guild moderator or above"
    #[must_use]
    pub fn is_moderator(&self, profile: &MemberProfile) -> bool {
        match &self.ladder {
            Some(ladder) => ladder.rank_of(profile.user_id, &profile.roles) > Rank::None,
            None => {
                profile.permissions.administrator()
                    || profile.permissions.ban_members()
                    || profile.permissions.kick_members()
                    || profile.permissions.moderate_members()
            }
        }
    }
}

/// The bot capability a punishment kind depends on
fn required_bot_permission(kind: PunishmentKind) -> (Permissions, &'static str) {
    match kind {
        PunishmentKind::Ban => (Permissions::BAN_MEMBERS, "Ban Members"),
        PunishmentKind::Kick => (Permissions::KICK_MEMBERS, "Kick Members"),
        PunishmentKind::Jail => (Permissions::MANAGE_ROLES, "Manage Roles"),
        PunishmentKind::Timeout => (Permissions::MODERATE_MEMBERS, "Moderate Members"),
        // Warnings only write a case record
        PunishmentKind::Warning => (Permissions::empty(), ""),
    }
}

/// Minimum home-guild rank for an action
fn required_rank(kind: PunishmentKind, mode: ActionMode) -> Rank {
    match (kind, mode) {
        (PunishmentKind::Ban, ActionMode::Issue) => Rank::Moderator,
        // Unbanning has a deliberately higher bar than banning
        (PunishmentKind::Ban, ActionMode::Revoke) => Rank::SeniorModerator,
        (PunishmentKind::Kick, ActionMode::Issue) => Rank::JuniorModerator,
        // Jail and timeout are reversible, low-severity tools; warnings are
        // open to every rank. Base moderator status is still required.
        (PunishmentKind::Jail | PunishmentKind::Timeout | PunishmentKind::Warning, _) => {
            Rank::ForeignChatModerator
        }
        (PunishmentKind::Kick, ActionMode::Revoke) => Rank::Developer,
    }
}

/// The permission bit a moderator needs in a non-home guild
fn required_actor_permission(kind: PunishmentKind) -> (Permissions, &'static str) {
    match kind {
        PunishmentKind::Ban => (Permissions::BAN_MEMBERS, "ban members"),
        PunishmentKind::Kick => (Permissions::KICK_MEMBERS, "kick members"),
        PunishmentKind::Jail => (Permissions::MANAGE_ROLES, "manage roles"),
        PunishmentKind::Timeout | PunishmentKind::Warning => {
            (Permissions::MODERATE_MEMBERS, "moderate members")
        }
    }
}

/// Decide whether `actor` may perform `kind`/`mode` against `target`, and
/// whether `bot` can carry it out.
///
/// # Errors
/// - [`ModerationError::InvalidTarget`] for bots, self-targeting, and
///   protected moderators
/// - [`ModerationError::MissingPermission`] when the actor lacks rank or bits
/// - [`ModerationError::MissingBotPermission`] when the bot lacks capability
///   or role position, or no jail role is configured
pub fn validate_action(
    actor: &MemberProfile,
    target: &MemberProfile,
    bot: &MemberProfile,
    kind: PunishmentKind,
    mode: ActionMode,
    config: &AuthorityConfig,
) -> ModerationResult<()> {
    if mode == ActionMode::Revoke && !kind.supports_revoke() {
        debug_assert!(false, "revoke offered for a non-revocable kind");
        return Err(ModerationError::NotRevocable(kind));
    }

    // Cross-cutting target rules, checked before any strategy
    if target.is_bot {
        return Err(ModerationError::InvalidTarget(
            "Bots cannot be punished".to_string(),
        ));
    }
    if actor.user_id == target.user_id {
        return Err(ModerationError::InvalidTarget(
            "You cannot punish yourself".to_string(),
        ));
    }

    // Strategy-specific authority
    match &config.ladder {
        Some(ladder) => {
            let actor_rank = ladder.rank_of(actor.user_id, &actor.roles);
            let target_rank = ladder.rank_of(target.user_id, &target.roles);

            let floor = required_rank(kind, mode);
            if actor_rank < floor {
                return Err(ModerationError::MissingPermission(format!(
                    "{} a member (requires {floor})",
                    mode.verb(kind)
                )));
            }
            // No lateral or upward punishment
            if target_rank >= actor_rank {
                return Err(ModerationError::InvalidTarget(
                    "You cannot punish a member at or above your own rank".to_string(),
                ));
            }
        }
        None => {
            let (bits, label) = required_actor_permission(kind);
            if !actor.permissions.administrator() && !actor.permissions.contains(bits) {
                return Err(ModerationError::MissingPermission(format!(
                    "{} (requires {label})",
                    mode.verb(kind)
                )));
            }
            if target.top_role_position >= actor.top_role_position
                && !actor.permissions.administrator()
            {
                return Err(ModerationError::InvalidTarget(
                    "You cannot punish a member whose roles are at or above yours".to_string(),
                ));
            }
        }
    }

    // Moderator protection applies regardless of the actor's own authority
    if !config.allow_punishing_moderators && config.is_moderator(target) {
        return Err(ModerationError::InvalidTarget(
            "Moderators cannot be punished in this server".to_string(),
        ));
    }

    // Bot capability checks
    let (bot_bits, bot_label) = required_bot_permission(kind);
    if !bot_bits.is_empty() && !bot.permissions.contains(bot_bits) {
        return Err(ModerationError::MissingBotPermission(bot_label.to_string()));
    }
    if kind != PunishmentKind::Warning && target.top_role_position >= bot.top_role_position {
        return Err(ModerationError::MissingBotPermission(
            "the bot's highest role must be above the target's".to_string(),
        ));
    }
    if kind == PunishmentKind::Jail && config.jail_role.is_none() {
        return Err(ModerationError::MissingBotPermission(
            "no jail role is configured for this server".to_string(),
        ));
    }
    if kind == PunishmentKind::Warning && mode == ActionMode::Issue && !target.present {
        return Err(ModerationError::InvalidTarget(
            "Only present members can be warned".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> RankLadder {
        RankLadder {
            developer_ids: vec![1],
            administrator_roles: vec![10],
            senior_moderator_roles: vec![20],
            moderator_roles: vec![30],
            junior_moderator_roles: vec![40],
            foreign_chat_roles: vec![50],
        }
    }

    fn profile(user_id: u64, roles: &[u64], position: u16, perms: Permissions) -> MemberProfile {
        MemberProfile {
            user_id: UserId::new(user_id),
            display_name: format!("user-{user_id}"),
            roles: roles.iter().map(|r| RoleId::new(*r)).collect(),
            top_role_position: position,
            permissions: perms,
            is_bot: false,
            present: true,
        }
    }

    fn bot() -> MemberProfile {
        let mut p = profile(999, &[], 100, Permissions::all());
        p.is_bot = true;
        p
    }

    fn home_config() -> AuthorityConfig {
        AuthorityConfig {
            ladder: Some(ladder()),
            allow_punishing_moderators: false,
            jail_role: Some(RoleId::new(77)),
        }
    }

    #[test]
    fn test_rank_ladder_ordering() {
        assert!(Rank::Developer > Rank::Administrator);
        assert!(Rank::SeniorModerator > Rank::Moderator);
        assert!(Rank::Moderator > Rank::JuniorModerator);
        assert!(Rank::JuniorModerator > Rank::ForeignChatModerator);
        assert!(Rank::ForeignChatModerator > Rank::None);
    }

    #[test]
    fn test_rank_of() {
        let l = ladder();
        assert_eq!(l.rank_of(UserId::new(1), &[]), Rank::Developer);
        assert_eq!(l.rank_of(UserId::new(2), &[RoleId::new(20)]), Rank::SeniorModerator);
        // Highest rank wins when several roles are held
        assert_eq!(
            l.rank_of(UserId::new(2), &[RoleId::new(50), RoleId::new(30)]),
            Rank::Moderator
        );
        assert_eq!(l.rank_of(UserId::new(2), &[RoleId::new(999)]), Rank::None);
    }

    #[test]
    fn test_home_ban_requires_moderator() {
        let config = home_config();
        let junior = profile(2, &[40], 5, Permissions::empty());
        let member = profile(3, &[], 1, Permissions::empty());

        let err = validate_action(
            &junior,
            &member,
            &bot(),
            PunishmentKind::Ban,
            ActionMode::Issue,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ModerationError::MissingPermission(_)));

        let moderator = profile(4, &[30], 6, Permissions::empty());
        validate_action(
            &moderator,
            &member,
            &bot(),
            PunishmentKind::Ban,
            ActionMode::Issue,
            &config,
        )
        .unwrap();
    }

    #[test]
    fn test_unban_has_higher_bar_than_ban() {
        let config = home_config();
        let moderator = profile(4, &[30], 6, Permissions::empty());
        let member = profile(3, &[], 1, Permissions::empty());

        let err = validate_action(
            &moderator,
            &member,
            &bot(),
            PunishmentKind::Ban,
            ActionMode::Revoke,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ModerationError::MissingPermission(_)));

        let senior = profile(5, &[20], 7, Permissions::empty());
        validate_action(
            &senior,
            &member,
            &bot(),
            PunishmentKind::Ban,
            ActionMode::Revoke,
            &config,
        )
        .unwrap();
    }

    #[test]
    fn test_no_self_target_and_no_bots() {
        let config = home_config();
        let moderator = profile(4, &[30], 6, Permissions::empty());

        let err = validate_action(
            &moderator,
            &moderator.clone(),
            &bot(),
            PunishmentKind::Warning,
            ActionMode::Issue,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ModerationError::InvalidTarget(_)));

        let mut robot = profile(8, &[], 1, Permissions::empty());
        robot.is_bot = true;
        let err = validate_action(
            &moderator,
            &robot,
            &bot(),
            PunishmentKind::Kick,
            ActionMode::Issue,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ModerationError::InvalidTarget(_)));
    }

    #[test]
    fn test_no_lateral_or_upward_punishment() {
        let mut config = home_config();
        config.allow_punishing_moderators = true;

        let moderator = profile(4, &[30], 6, Permissions::empty());
        let peer = profile(5, &[30], 6, Permissions::empty());
        let senior = profile(6, &[20], 7, Permissions::empty());

        for target in [&peer, &senior] {
            let err = validate_action(
                &moderator,
                target,
                &bot(),
                PunishmentKind::Kick,
                ActionMode::Issue,
                &config,
            )
            .unwrap_err();
            assert!(matches!(err, ModerationError::InvalidTarget(_)));
        }
    }

    #[test]
    fn test_moderator_protection_toggle() {
        // Even a senior moderator cannot punish a junior moderator
        // while punishing moderators is disabled
        let config = home_config();
        let senior = profile(5, &[20], 7, Permissions::empty());
        let junior = profile(6, &[40], 5, Permissions::empty());

        let err = validate_action(
            &senior,
            &junior,
            &bot(),
            PunishmentKind::Ban,
            ActionMode::Issue,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ModerationError::InvalidTarget(_)));

        // With the toggle on, rank ordering alone decides
        let mut config = home_config();
        config.allow_punishing_moderators = true;
        validate_action(
            &senior,
            &junior,
            &bot(),
            PunishmentKind::Ban,
            ActionMode::Issue,
            &config,
        )
        .unwrap();
    }

    #[test]
    fn test_verdict_follows_the_current_snapshot() {
        // A target promoted to a protected rank after the menu was built is
        // refused once the decision is re-made from a fresh snapshot
        let config = home_config();
        let moderator = profile(4, &[30], 6, Permissions::empty());
        let member = profile(3, &[], 1, Permissions::empty());

        validate_action(
            &moderator,
            &member,
            &bot(),
            PunishmentKind::Ban,
            ActionMode::Issue,
            &config,
        )
        .unwrap();

        let mut promoted = member;
        promoted.roles = vec![RoleId::new(40)];
        let err = validate_action(
            &moderator,
            &promoted,
            &bot(),
            PunishmentKind::Ban,
            ActionMode::Issue,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ModerationError::InvalidTarget(_)));
    }

    #[test]
    fn test_bot_capability_is_distinct_error() {
        let config = home_config();
        let moderator = profile(4, &[30], 6, Permissions::empty());
        let member = profile(3, &[], 1, Permissions::empty());
        let mut weak_bot = bot();
        weak_bot.permissions = Permissions::empty();

        let err = validate_action(
            &moderator,
            &member,
            &weak_bot,
            PunishmentKind::Ban,
            ActionMode::Issue,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ModerationError::MissingBotPermission(_)));
    }

    #[test]
    fn test_bot_role_position_guards_target() {
        let config = home_config();
        let admin = profile(9, &[10], 50, Permissions::empty());
        let member = profile(3, &[], 20, Permissions::empty());
        let mut low_bot = bot();
        low_bot.top_role_position = 10;

        let err = validate_action(
            &admin,
            &member,
            &low_bot,
            PunishmentKind::Ban,
            ActionMode::Issue,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ModerationError::MissingBotPermission(_)));
    }

    #[test]
    fn test_jail_requires_configured_role() {
        let mut config = home_config();
        config.jail_role = None;
        let moderator = profile(4, &[50], 6, Permissions::empty());
        let member = profile(3, &[], 1, Permissions::empty());

        let err = validate_action(
            &moderator,
            &member,
            &bot(),
            PunishmentKind::Jail,
            ActionMode::Issue,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ModerationError::MissingBotPermission(_)));
    }

    #[test]
    fn test_warning_requires_present_member() {
        let config = home_config();
        let moderator = profile(4, &[50], 6, Permissions::empty());
        let mut gone = profile(3, &[], 1, Permissions::empty());
        gone.present = false;

        let err = validate_action(
            &moderator,
            &gone,
            &bot(),
            PunishmentKind::Warning,
            ActionMode::Issue,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ModerationError::InvalidTarget(_)));
    }

    #[test]
    fn test_generic_strategy_uses_permission_bits() {
        let config = AuthorityConfig {
            ladder: None,
            allow_punishing_moderators: true,
            jail_role: None,
        };
        let member = profile(3, &[], 1, Permissions::empty());

        let no_perms = profile(4, &[], 5, Permissions::empty());
        let err = validate_action(
            &no_perms,
            &member,
            &bot(),
            PunishmentKind::Ban,
            ActionMode::Issue,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ModerationError::MissingPermission(_)));

        let can_ban = profile(4, &[], 5, Permissions::BAN_MEMBERS);
        validate_action(
            &can_ban,
            &member,
            &bot(),
            PunishmentKind::Ban,
            ActionMode::Issue,
            &config,
        )
        .unwrap();
    }

    #[test]
    fn test_revoke_on_non_revocable_kind_is_loud() {
        let config = home_config();
        let senior = profile(5, &[20], 7, Permissions::empty());
        let member = profile(3, &[], 1, Permissions::empty());

        let result = std::panic::catch_unwind(|| {
            validate_action(
                &senior,
                &member,
                &bot(),
                PunishmentKind::Kick,
                ActionMode::Revoke,
                &config,
            )
        });
        // Debug builds assert; release builds return the typed error
        if let Ok(inner) = result {
            assert!(matches!(inner, Err(ModerationError::NotRevocable(_))));
        }
    }
}
