use poise::serenity_prelude::{
    self as serenity, ChannelId, Context, EventHandler, Guild, GuildId, GuildMemberUpdateEvent,
    Member, MessageId, Ready, RoleId, User,
};
use tracing::{error, info, warn};

use crate::{Data, EVENT_TARGET};

pub struct Handler;

/// Fetch the shared bot data out of the serenity type map
async fn bot_data(ctx: &Context) -> Option<Data> {
    ctx.data.read().await.get::<Data>().cloned()
}

#[serenity::async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        info!("Connected as {user_name}, shard {shard_id}");
    }

    /// Called when the cache is fully populated.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let guild_count_cache = ctx.cache.guild_count();
        let guild_count = guilds.len();
        if guild_count != guild_count_cache {
            warn!(
                "Cache guild count mismatch: {guild_count_cache} (cache) vs {guild_count} (actual)"
            );
        }
        info!("Cache ready! The bot is in {guild_count} guild(s)");

        if let Some(data) = bot_data(&ctx).await {
            for guild_id in guilds {
                data.expiry.register_guild(guild_id);
            }
        }
    }

    /// The bot joined a guild, or one became available after an outage.
    /// Register it and ask for an immediate reconciliation pass so expired
    /// punishments do not wait for the next interval.
    async fn guild_create(&self, ctx: Context, guild: Guild, _is_new: Option<bool>) {
        let Some(data) = bot_data(&ctx).await else {
            return;
        };
        data.expiry.register_guild(guild.id);
        if let Err(e) = data.expiry.notify_guild(guild.id).await {
            warn!(
                target: EVENT_TARGET,
                guild_id = %guild.id,
                "Could not request guild reconciliation: {e}"
            );
        }
    }

    /// A member's roles changed. A jail role that disappeared means someone
    /// lifted the jail by hand, so the recorded case closes too.
    async fn guild_member_update(
        &self,
        ctx: Context,
        _old_if_available: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        let Some(data) = bot_data(&ctx).await else {
            return;
        };
        let Some(jail_role) = data.guild_config(event.guild_id).jail_role_id else {
            return;
        };

        if event.roles.contains(&RoleId::new(jail_role)) {
            return;
        }
        if let Err(e) = data
            .expiry
            .jail_role_removed(event.guild_id, event.user.id)
            .await
        {
            error!(
                target: EVENT_TARGET,
                guild_id = %event.guild_id,
                user_id = %event.user.id,
                "Failed to close jail after role removal: {e}"
            );
        }
    }

    /// An unban happened, either ours or a manual one. Closing the recorded
    /// ban is idempotent so the distinction does not matter here.
    async fn guild_ban_removal(&self, ctx: Context, guild_id: GuildId, unbanned_user: User) {
        let Some(data) = bot_data(&ctx).await else {
            return;
        };
        if let Err(e) = data.expiry.external_unban(guild_id, unbanned_user.id).await {
            error!(
                target: EVENT_TARGET,
                guild_id = %guild_id,
                user_id = %unbanned_user.id,
                "Failed to close ban case after unban: {e}"
            );
        }
    }

    /// A member joined. If they are still recorded as jailed, the role comes
    /// straight back.
    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        let Some(data) = bot_data(&ctx).await else {
            return;
        };
        let jail_role = data
            .guild_config(new_member.guild_id)
            .jail_role_id
            .map(RoleId::new);
        match data
            .expiry
            .member_rejoined(new_member.guild_id, new_member.user.id, jail_role)
            .await
        {
            Ok(true) => {
                info!(
                    target: EVENT_TARGET,
                    guild_id = %new_member.guild_id,
                    user_id = %new_member.user.id,
                    "Re-jailed returning member"
                );
            }
            Ok(false) => {}
            Err(e) => {
                error!(
                    target: EVENT_TARGET,
                    guild_id = %new_member.guild_id,
                    user_id = %new_member.user.id,
                    "Failed to re-jail returning member: {e}"
                );
            }
        }
    }

    /// A deleted wizard message must not leave its target locked until the
    /// stale reaper notices.
    async fn message_delete(
        &self,
        ctx: Context,
        _channel_id: ChannelId,
        deleted_message_id: MessageId,
        _guild_id: Option<GuildId>,
    ) {
        if let Some(data) = bot_data(&ctx).await {
            data.guard.release_session(deleted_message_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_implements_event_handler() {
        // This test verifies at compile time that Handler implements EventHandler
        fn assert_impl<T: EventHandler>() {}
        assert_impl::<Handler>();
    }
}
