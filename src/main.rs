use std::env;
use std::sync::Arc;

use poise::serenity_prelude::{self as serenity};
use serenity::GatewayIntents;
use tracing::info;

use warden::moderation::SerenityPlatform;
use warden::{Data, Error, commands, handlers, logging};

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    // Initialize logging
    logging::init()?;

    // Load environment variables
    let token = env::var("DISCORD_TOKEN").expect("DISCORD_TOKEN must be set");

    // Set up the bot's data over a standalone HTTP handle
    let http = Arc::new(serenity::Http::new(&token));
    let platform = Arc::new(SerenityPlatform::new(http));
    let data = Data::load(platform).await;

    // Background tasks: expiry reconciliation and the stale-lock reaper
    data.expiry.start(data.settings.ban_poll_interval_secs);
    data.guard
        .start_reaper(60 * u64::try_from(data.settings.stale_lock_minutes).unwrap_or(10));

    // Configure the Poise framework
    let framework_data = data.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::punish(),
                commands::case(),
                commands::punishments(),
            ],
            pre_command: |ctx| {
                Box::pin(async move {
                    // Log the start of command execution
                    logging::log_command_start(ctx);
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    // Log the end of command execution
                    logging::log_command_end(ctx);
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    // Log the error using our logging system
                    logging::log_command_error(&error);
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(framework_data)
            })
        })
        .build();

    // Configure the Serenity client. Member and ban events need the
    // privileged GUILD_MEMBERS intent.
    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::MESSAGE_CONTENT;
    let mut client = serenity::ClientBuilder::new(token, intents)
        .event_handler(handlers::Handler)
        .framework(framework)
        .await
        .expect("Failed to create client");

    // The gateway handlers pull the shared data out of the type map
    client.data.write().await.insert::<Data>(data.clone());

    // Graceful shutdown: stop the expiry task and the gateway on Ctrl-C
    let shard_manager = client.shard_manager.clone();
    let shutdown_data = data.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shutdown_data.expiry.shutdown().await;
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting bot...");
    // Start the bot
    if let Err(err) = client.start().await {
        eprintln!("Error starting the bot: {err}");
    }

    Ok(())
}

fn main() {
    // Run the async main function
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async_main());

    // Handle any errors that occurred during execution
    if let Err(err) = result {
        eprintln!("Error: {err}");
    }
}
