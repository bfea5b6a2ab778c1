//! Expiry reconciliation service
//!
//! Owns repository and platform handles and runs the background loop that
//! turns recorded expiries into platform state: an expired ban case is marked
//! handled in storage first, then the unban is attempted, so a crash between
//! the two steps can only leave an extra unban (idempotent), never a ban the
//! repository believes has lapsed.
//!
//! Also hosts the event-driven complements fed by the gateway handlers:
//! externally lifted punishments close their cases, and a rejoin while
//! recorded jailed re-applies the jail role.

use dashmap::DashSet;
use poise::serenity_prelude::{GuildId, RoleId, UserId};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::{self, Sender};
use tracing::{error, info, warn};

use crate::MODERATION_TARGET;
use crate::moderation::{
    Case, CaseRepository, CaseType, CaseUpdate, ModerationCheckRequest, ModerationError,
    ModerationResult, PlatformActor,
};

/// How often the reconciliation loop polls for expired bans
pub const BAN_POLL_INTERVAL_SECS: u64 = 5;

/// Service for expiry reconciliation
#[derive(Clone)]
pub struct ExpiryService {
    repo: Arc<dyn CaseRepository>,
    platform: Arc<dyn PlatformActor>,
    /// Guilds the bot is in; populated by the ready/guild-create handlers
    guilds: Arc<DashSet<GuildId>>,
    /// Sender for reconciliation requests, set once the task is started
    tx: Arc<RwLock<Option<Sender<ModerationCheckRequest>>>>,
}

impl ExpiryService {
    #[must_use]
    pub fn new(repo: Arc<dyn CaseRepository>, platform: Arc<dyn PlatformActor>) -> Self {
        Self {
            repo,
            platform,
            guilds: Arc::new(DashSet::new()),
            tx: Arc::new(RwLock::new(None)),
        }
    }

    /// Record a guild for periodic reconciliation
    pub fn register_guild(&self, guild_id: GuildId) {
        self.guilds.insert(guild_id);
    }

    /// Spawn the reconciliation task and keep its request sender
    pub fn start(&self, check_interval_seconds: u64) {
        let (tx, mut rx) = mpsc::channel::<ModerationCheckRequest>(100);
        *self
            .tx
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);

        let service = self.clone();
        tokio::spawn(async move {
            info!(
                target: MODERATION_TARGET,
                "Starting expiry reconciliation task with {check_interval_seconds}s interval"
            );

            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(check_interval_seconds));

            loop {
                tokio::select! {
                    Some(request) = rx.recv() => {
                        match request {
                            ModerationCheckRequest::CheckAll => {
                                service.check_all().await;
                            }
                            ModerationCheckRequest::CheckGuild { guild_id } => {
                                if let Err(e) = service.check_guild(guild_id).await {
                                    error!(
                                        target: MODERATION_TARGET,
                                        guild_id = %guild_id,
                                        "Error reconciling guild: {e}"
                                    );
                                }
                            }
                            ModerationCheckRequest::Shutdown => {
                                info!(target: MODERATION_TARGET, "Expiry task shutting down");
                                break;
                            }
                        }
                    }

                    _ = interval.tick() => {
                        service.check_all().await;
                    }
                }
            }
        });
    }

    /// Ask the running task to reconcile one guild soon
    ///
    /// # Errors
    /// Fails when the task has not been started or has shut down.
    pub async fn notify_guild(&self, guild_id: GuildId) -> ModerationResult<()> {
        let tx = self
            .tx
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match tx {
            Some(tx) => tx
                .send(ModerationCheckRequest::CheckGuild { guild_id })
                .await
                .map_err(|e| ModerationError::Other(format!("Expiry task unavailable: {e}"))),
            None => Err(ModerationError::Other(
                "Expiry task not started".to_string(),
            )),
        }
    }

    /// Ask the running task to stop. A no-op when it was never started.
    pub async fn shutdown(&self) {
        let tx = self
            .tx
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(tx) = tx {
            let _ = tx.send(ModerationCheckRequest::Shutdown).await;
        }
    }

    /// Reconcile every registered guild. Per-guild errors are logged and
    /// swallowed; the loop never dies.
    pub async fn check_all(&self) {
        let guild_ids: Vec<GuildId> = self.guilds.iter().map(|g| *g).collect();
        for guild_id in guild_ids {
            if let Err(e) = self.check_guild(guild_id).await {
                error!(
                    target: MODERATION_TARGET,
                    guild_id = %guild_id,
                    "Error reconciling guild: {e}"
                );
            }
        }
    }

    /// Reconcile one guild: expire lapsed ban cases in storage, then lift
    /// the corresponding platform bans. Per-case errors are logged and the
    /// remaining cases still get processed.
    ///
    /// # Errors
    /// Only a repository fetch failure propagates.
    pub async fn check_guild(&self, guild_id: GuildId) -> ModerationResult<()> {
        let lapsed: Vec<Case> = self
            .repo
            .fetch_active_bans(guild_id)
            .await?
            .into_iter()
            .filter(Case::has_expired)
            .collect();

        for case in lapsed {
            // Storage first. If the unban then fails, the case is already
            // closed and the next external unban simply finds nothing to do.
            if let Err(e) = self
                .repo
                .update_case(
                    &case.id,
                    CaseUpdate {
                        handled: Some(true),
                        ..Default::default()
                    },
                )
                .await
            {
                error!(
                    target: MODERATION_TARGET,
                    case_number = case.case_number,
                    guild_id = %guild_id,
                    "Failed to expire ban case: {e}"
                );
                continue;
            }

            let reason = format!("Ban expired (case #{})", case.case_number);
            match self
                .platform
                .unban(guild_id, UserId::new(case.target_id), &reason)
                .await
            {
                Ok(()) => {
                    info!(
                        target: MODERATION_TARGET,
                        case_number = case.case_number,
                        guild_id = %guild_id,
                        target_id = case.target_id,
                        "Expired ban lifted"
                    );
                }
                Err(e) => {
                    // Already unbanned externally, or permissions changed.
                    // The case stays closed either way.
                    warn!(
                        target: MODERATION_TARGET,
                        case_number = case.case_number,
                        guild_id = %guild_id,
                        target_id = case.target_id,
                        "Could not lift expired ban: {e}"
                    );
                }
            }
        }

        Ok(())
    }

    /// A member update no longer carries the jail role: someone removed it
    /// by hand, so the recorded jail is over.
    ///
    /// # Errors
    /// Repository failures propagate to the calling handler for logging.
    pub async fn jail_role_removed(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> ModerationResult<u32> {
        let closed = self
            .repo
            .expire_cases_by_type(CaseType::Jail, guild_id, user_id)
            .await?;
        if closed > 0 {
            info!(
                target: MODERATION_TARGET,
                guild_id = %guild_id,
                user_id = %user_id,
                cases_closed = closed,
                "Jail closed after manual role removal"
            );
        }
        Ok(closed)
    }

    /// An unban happened outside the bot. Close the recorded ban; there is
    /// no platform action left to take.
    ///
    /// # Errors
    /// Repository failures propagate to the calling handler for logging.
    pub async fn external_unban(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> ModerationResult<u32> {
        let closed = self
            .repo
            .expire_cases_by_type(CaseType::Ban, guild_id, user_id)
            .await?;
        if closed > 0 {
            info!(
                target: MODERATION_TARGET,
                guild_id = %guild_id,
                user_id = %user_id,
                cases_closed = closed,
                "Ban case closed after external unban"
            );
        }
        Ok(closed)
    }

    /// A member rejoined. If an unexpired jail case is still on record, the
    /// jail role comes straight back; leaving and rejoining is not an escape.
    ///
    /// # Errors
    /// Repository and platform failures propagate to the calling handler.
    pub async fn member_rejoined(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        jail_role: Option<RoleId>,
    ) -> ModerationResult<bool> {
        let jailed = self
            .repo
            .fetch_active_by_target(guild_id, user_id)
            .await?
            .iter()
            .any(|case| case.kind == CaseType::Jail && case.is_active());
        if !jailed {
            return Ok(false);
        }

        let Some(role) = jail_role else {
            warn!(
                target: MODERATION_TARGET,
                guild_id = %guild_id,
                user_id = %user_id,
                "Jailed member rejoined but no jail role is configured"
            );
            return Ok(false);
        };

        self.platform
            .add_role(guild_id, user_id, role, "Re-applying jail after rejoin")
            .await?;
        info!(
            target: MODERATION_TARGET,
            guild_id = %guild_id,
            user_id = %user_id,
            "Jail role re-applied after rejoin"
        );
        Ok(true)
    }
}
