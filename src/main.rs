use anyhow::{anyhow, Context as _};
use serenity::async_trait;
use serenity::model::application::interaction::Interaction;
use serenity::model::channel::Reaction;
use serenity::model::event::ResumedEvent;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
mod data;
mod reactionroles;
mod slashcommands;
use crate::data::{config::Config, configmap::ConfigMap};
use crate::reactionroles::{reconcile, DiscordRoles, ReactionEvent, ReactionKind};
use crate::slashcommands::static_reply;

struct Bot;

#[async_trait]
impl EventHandler for Bot {
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::ApplicationCommand(command) = interaction {
            debug!("Received command interaction: {}", command.data.name);
            let Some(config) = config(&ctx).await else {
                return;
            };

            if let Err(why) = static_reply::run(&ctx, &command, &config).await {
                error!("Cannot respond to slash command '{}': {}", command.data.name, why);
            }
        }
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Connected as {:?} (id={})", ready.user.name, ready.user.id);
        let Some(config) = config(&ctx).await else {
            return;
        };

        // Check we're in the correct guild
        let guild = match config.server_id.to_partial_guild(&ctx).await {
            Ok(guild) => guild,
            Err(why) => {
                error!(
                    "Not connected to guild with requested id={}: {}",
                    config.server_id, why
                );
                return;
            }
        };

        let commands = guild
            .id
            .set_application_commands(&ctx.http, |commands| {
                for cmd in &config.commands {
                    commands.create_application_command(|command| {
                        static_reply::register(command, cmd)
                    });
                }
                commands
            })
            .await;

        match commands {
            Ok(commands) => info!(
                "Registered {} slash commands in guild {:?} (id={})",
                commands.len(),
                guild.name,
                guild.id
            ),
            Err(why) => error!("Could not register slash commands: {}", why),
        }
    }

    async fn resume(&self, _: Context, _: ResumedEvent) {
        info!("Resumed");
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        handle_reaction(ctx, reaction, ReactionKind::Add).await;
    }

    async fn reaction_remove(&self, ctx: Context, reaction: Reaction) {
        handle_reaction(ctx, reaction, ReactionKind::Remove).await;
    }
}

async fn config(ctx: &Context) -> Option<Arc<Config>> {
    let config = ctx.data.read().await.get::<ConfigMap>().cloned();
    if config.is_none() {
        error!("Expected ConfigMap in TypeMap.");
    }
    config
}

async fn handle_reaction(ctx: Context, reaction: Reaction, kind: ReactionKind) {
    let Some(event) = ReactionEvent::from_reaction(&reaction, kind) else {
        debug!(
            "Ignoring reaction on message id={} without guild or user",
            reaction.message_id
        );
        return;
    };
    let Some(config) = config(&ctx).await else {
        return;
    };

    let outcome = reconcile(&DiscordRoles::new(&ctx), &config, &event).await;
    debug!("Reaction handled: {:?}", outcome);
}

/// Loads `.env` (or `path`) into the environment, then builds the log filter.
/// `.env` may set `RUST_LOG`, so the order matters.
fn env_filter(path: Option<&Path>) -> (Result<PathBuf, dotenvy::Error>, EnvFilter) {
    let dotenv = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_owned()),
        None => dotenvy::dotenv(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    (dotenv, filter)
}

fn config_path() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CONFIG_PATH").ok())
        .unwrap_or_else(|| String::from("config.yaml"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (dotenv, filter) = env_filter(None);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match dotenv {
        Ok(path) => debug!("Loaded environment from {:?}", path),
        Err(why) => debug!("No .env file loaded: {}", why),
    }

    let token = std::env::var("DISCORD_TOKEN")
        .map_err(|_| anyhow!("DISCORD_TOKEN environment variable not set!"))?;

    let config_path = config_path();
    let config = Config::load(&config_path)
        .with_context(|| format!("Invalid config file {config_path:?}"))?;
    info!(
        "Loaded config: {} reaction roles, {} slash commands",
        config.roles.emoji_to_role.len(),
        config.commands.len()
    );

    // Set gateway intents, which decides what events the bot will be notified about
    let intents = GatewayIntents::non_privileged() | GatewayIntents::GUILD_MEMBERS;

    let mut client = Client::builder(&token, intents)
        .event_handler(Bot)
        .await
        .context("Err creating client")?;

    {
        let mut data = client.data.write().await;
        data.insert::<ConfigMap>(Arc::new(config));
    }

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(why) = tokio::signal::ctrl_c().await {
            error!("Could not register ctrl+c handler: {}", why);
            return;
        }
        shard_manager.lock().await.shutdown_all().await;
    });

    client.start().await.context("Client error")
}
