use std::{
    default::Default,
    ops::Deref,
    sync::Arc,
};

use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use serde::{Deserialize, Serialize};
use serenity::prelude::TypeMapKey;

use crate::moderation::{
    AuthorityConfig, ExpiryService, MemoryCaseRepository, PlatformActor, RankLadder,
    STALE_LOCK_MINUTES, TargetGuard, WIZARD_TIMEOUT_SECS,
};

/// Guild configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildConfig {
    // The ID of the guild
    pub guild_id: u64,
    // Role applied to jailed members
    pub jail_role_id: Option<u64>,
    // Whether moderators may themselves be punished in this guild
    pub allow_punishing_moderators: bool,
    // Appeal link included in ban notifications
    pub ban_appeal_url: Option<String>,
    // Channel for public moderation logs
    pub moderation_log_channel_id: Option<u64>,
    // Whether jail notifications use the kidnapping flavour text
    pub kidnap_flavour: bool,
    // Rank ladder; set only for the home guild. Other guilds fall back to
    // channel-resolved permission bits.
    pub ladder: Option<RankLadder>,
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            guild_id: 0,
            jail_role_id: None,
            allow_punishing_moderators: false,
            ban_appeal_url: None,
            moderation_log_channel_id: None,
            kidnap_flavour: false,
            ladder: None,
        }
    }
}

impl GuildConfig {
    /// The authority-relevant slice of this config
    #[must_use]
    pub fn authority(&self) -> AuthorityConfig {
        AuthorityConfig {
            ladder: self.ladder.clone(),
            allow_punishing_moderators: self.allow_punishing_moderators,
            jail_role: self.jail_role_id.map(serenity::RoleId::new),
        }
    }
}

/// Process-wide moderation tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationSettings {
    // Days until a warning expires when no length is chosen
    pub warning_default_expiry_days: i64,
    // Minutes before an abandoned wizard lock is force-released
    pub stale_lock_minutes: i64,
    // Seconds between expired-ban reconciliation passes
    pub ban_poll_interval_secs: u64,
    // Seconds of wizard inactivity before the session times out
    pub wizard_timeout_secs: u64,
    // User ids shown full error detail instead of the generic message
    pub operator_ids: Vec<u64>,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            warning_default_expiry_days: 90,
            stale_lock_minutes: STALE_LOCK_MINUTES,
            ban_poll_interval_secs: crate::moderation::BAN_POLL_INTERVAL_SECS,
            wizard_timeout_secs: WIZARD_TIMEOUT_SECS,
            operator_ids: Vec::new(),
        }
    }
}

impl ModerationSettings {
    #[must_use]
    pub fn is_operator(&self, user_id: serenity::UserId) -> bool {
        self.operator_ids.contains(&user_id.get())
    }
}

/// Centralized data structure for the bot
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

// Implement TypeMapKey for Data to allow storing it in Serenity's data map
impl TypeMapKey for Data {
    type Value = Data;
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("guild_configs", &self.guild_configs)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    /// Create a new Data instance over a platform handle
    #[must_use]
    pub fn new(platform: Arc<dyn PlatformActor>) -> Self {
        Self(Arc::new(DataInner::new(platform, ModerationSettings::default())))
    }

    /// Load data from the YAML files
    pub async fn load(platform: Arc<dyn PlatformActor>) -> Self {
        Self(Arc::new(DataInner::load(platform).await))
    }

    /// Save data to the YAML files
    /// # Errors
    /// This function will return an error if:
    /// - The data directory cannot be created
    /// - The configurations or cases cannot be serialized to YAML
    /// - The YAML data cannot be written out
    pub async fn save(&self) -> Result<(), crate::Error> {
        self.0.save().await
    }

    /// Get the guild configuration for a guild, falling back to defaults
    #[must_use]
    pub fn guild_config(&self, guild_id: serenity::GuildId) -> GuildConfig {
        self.0
            .guild_configs
            .get(&guild_id)
            .map_or_else(
                || GuildConfig {
                    guild_id: guild_id.get(),
                    ..Default::default()
                },
                |entry| entry.value().clone(),
            )
    }

    /// Insert or replace a guild configuration
    pub fn set_guild_config(&self, config: GuildConfig) {
        self.0
            .guild_configs
            .insert(serenity::GuildId::new(config.guild_id), config);
    }
}

/// Main centralized data structure for the bot
pub struct DataInner {
    // Map of guild_id -> guild configuration
    pub guild_configs: DashMap<serenity::GuildId, GuildConfig>,
    // Process-wide moderation tunables
    pub settings: ModerationSettings,
    // All punishment cases, snapshotted to YAML on save
    pub cases: MemoryCaseRepository,
    // Per-(guild, target) wizard locks
    pub guard: TargetGuard,
    // Background expiry reconciliation
    pub expiry: ExpiryService,
    // Platform side effects, shared with the expiry service
    pub platform: Arc<dyn PlatformActor>,
}

const CONFIG_FILE: &str = "data/guild_configs.yaml";
const SETTINGS_FILE: &str = "data/settings.yaml";
const CASES_FILE: &str = "data/cases.yaml";
const DATA_DIR: &str = "data";

impl DataInner {
    #[must_use]
    pub fn new(platform: Arc<dyn PlatformActor>, settings: ModerationSettings) -> Self {
        let cases = MemoryCaseRepository::new();
        let guard = TargetGuard::new(chrono::Duration::minutes(settings.stale_lock_minutes));
        let expiry = ExpiryService::new(Arc::new(cases.clone()), Arc::clone(&platform));
        Self {
            guild_configs: DashMap::new(),
            settings,
            cases,
            guard,
            expiry,
            platform,
        }
    }

    /// Load configurations, settings, and cases from their YAML files.
    /// Missing or unreadable files leave the corresponding part empty.
    pub async fn load(platform: Arc<dyn PlatformActor>) -> Self {
        let settings = match tokio::fs::read_to_string(SETTINGS_FILE).await {
            Ok(content) => serde_yaml::from_str(&content).unwrap_or_default(),
            Err(_) => ModerationSettings::default(),
        };

        let data = Self::new(platform, settings);

        if let Ok(file_content) = tokio::fs::read_to_string(CONFIG_FILE).await {
            if let Ok(configs) = serde_yaml::from_str::<Vec<GuildConfig>>(&file_content) {
                for config in configs {
                    let guild_id = serenity::GuildId::new(config.guild_id);
                    data.guild_configs.insert(guild_id, config);
                }
            }
        }

        if let Ok(file_content) = tokio::fs::read_to_string(CASES_FILE).await {
            if let Ok(cases) = serde_yaml::from_str(&file_content) {
                data.cases.restore(cases);
            }
        }

        data
    }

    /// Save configurations, settings, and cases to their YAML files
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The data directory cannot be created
    /// - Serialization to YAML fails
    /// - Any of the files cannot be written
    pub async fn save(&self) -> Result<(), crate::Error> {
        if !std::path::Path::new(DATA_DIR).exists() {
            tokio::fs::create_dir_all(DATA_DIR).await?;
        }

        let configs: Vec<GuildConfig> = self
            .guild_configs
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let yaml = serde_yaml::to_string(&configs)?;
        tokio::fs::write(CONFIG_FILE, yaml).await?;

        let settings_yaml = serde_yaml::to_string(&self.settings)?;
        tokio::fs::write(SETTINGS_FILE, settings_yaml).await?;

        let cases_yaml = serde_yaml::to_string(&self.cases.snapshot())?;
        tokio::fs::write(CASES_FILE, cases_yaml).await?;

        Ok(())
    }
}

/// Tests for the data module
#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::MockPlatformActor;

    fn data() -> Data {
        Data::new(Arc::new(MockPlatformActor::new()))
    }

    #[test]
    fn test_data_new() {
        let data = data();
        assert_eq!(data.guild_configs.len(), 0);
        assert!(data.cases.snapshot().is_empty());
        assert_eq!(data.settings.warning_default_expiry_days, 90);
    }

    #[test]
    fn test_guild_config_default_and_fallback() {
        let config = GuildConfig::default();
        assert_eq!(config.guild_id, 0);
        assert!(config.jail_role_id.is_none());
        assert!(!config.allow_punishing_moderators);
        assert!(config.ladder.is_none());

        // Unknown guild gets a default carrying its own id
        let data = data();
        let config = data.guild_config(serenity::GuildId::new(12345));
        assert_eq!(config.guild_id, 12345);
    }

    #[test]
    fn test_settings_defaults_match_tunables() {
        let settings = ModerationSettings::default();
        assert_eq!(settings.stale_lock_minutes, 10);
        assert_eq!(settings.ban_poll_interval_secs, 5);
        assert_eq!(settings.wizard_timeout_secs, 240);
        assert!(!settings.is_operator(serenity::UserId::new(1)));
    }

    #[test]
    fn test_guild_config_serialization() {
        let config = GuildConfig {
            guild_id: 12345,
            jail_role_id: Some(77),
            allow_punishing_moderators: true,
            ban_appeal_url: Some("https://example.com/appeal".to_string()),
            moderation_log_channel_id: Some(54321),
            kidnap_flavour: true,
            ladder: Some(RankLadder {
                developer_ids: vec![1],
                moderator_roles: vec![30],
                ..Default::default()
            }),
        };

        let serialized = serde_yaml::to_string(&config).expect("Failed to serialize");
        assert!(serialized.contains("guild_id: 12345"));
        assert!(serialized.contains("jail_role_id: 77"));
        assert!(serialized.contains("allow_punishing_moderators: true"));

        let deserialized: GuildConfig =
            serde_yaml::from_str(&serialized).expect("Failed to deserialize");
        assert_eq!(deserialized.guild_id, 12345);
        assert_eq!(deserialized.jail_role_id, Some(77));
        let ladder = deserialized.ladder.expect("ladder survives round trip");
        assert_eq!(ladder.moderator_roles, vec![30]);
    }

    #[test]
    fn test_authority_slice_mapping() {
        let config = GuildConfig {
            guild_id: 12345,
            jail_role_id: Some(77),
            allow_punishing_moderators: true,
            ..Default::default()
        };
        let authority = config.authority();
        assert_eq!(authority.jail_role, Some(serenity::RoleId::new(77)));
        assert!(authority.allow_punishing_moderators);
        assert!(authority.ladder.is_none());
    }
}
