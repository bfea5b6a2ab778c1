pub mod commands;
pub mod data;
pub mod handlers;
pub mod logging;
pub mod moderation;

// Customize these constants for your bot
pub const BOT_NAME: &str = "warden";
pub const COMMAND_TARGET: &str = "warden::command";
pub const ERROR_TARGET: &str = "warden::error";
pub const EVENT_TARGET: &str = "warden::handlers";
pub const MODERATION_TARGET: &str = "warden::moderation";
pub const CONSOLE_TARGET: &str = "warden";

pub use data::{Data, DataInner, GuildConfig, ModerationSettings};
pub use moderation::{Case, CaseType, ModerationError, PunishmentKind};
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
