use std::sync::Arc;

use serenity::async_trait;
use serenity::model::channel::Message as DiscordMessage;
use serenity::model::gateway::Ready;
use serenity::model::id::ChannelId;
use serenity::prelude::*;
use tracing::{error, info};

use crate::error::MagpieError;
use crate::handler::{self, AppState};

use super::Delivery;

/// Delivery sink bound to one Discord channel.
pub struct ChannelSink {
    http: Arc<serenity::http::Http>,
    channel_id: ChannelId,
}

#[async_trait]
impl Delivery for ChannelSink {
    async fn send(&self, text: &str) -> Result<(), MagpieError> {
        self.channel_id
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| MagpieError::Delivery(e.to_string()))
    }
}

struct Handler {
    app_state: Arc<AppState>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: DiscordMessage) {
        // Ignore messages from bots (including ourselves)
        if msg.author.bot {
            return;
        }

        let channel_id = msg.channel_id.get();

        // Check allowed channels (empty = all)
        if !self.app_state.config.discord_allowed_channels.is_empty()
            && !self
                .app_state
                .config
                .discord_allowed_channels
                .contains(&channel_id)
        {
            return;
        }

        // Determine if we should respond
        let should_respond = if msg.guild_id.is_some() {
            // In a guild: only respond to @mentions
            let bot_id = ctx.cache.current_user().id;
            msg.mentions.iter().any(|u| u.id == bot_id)
        } else {
            // DM: respond to all messages
            true
        };
        if !should_respond {
            return;
        }

        let text = msg.content.clone();
        if text.is_empty() {
            return;
        }
        let sender_id = msg.author.id.get();
        let sender_name = msg.author.name.clone();

        info!(
            "Discord message from {} in channel {}: {}",
            sender_name,
            channel_id,
            text.chars().take(100).collect::<String>()
        );

        let state = self.app_state.clone();
        let sink: Arc<dyn Delivery> = Arc::new(ChannelSink {
            http: ctx.http.clone(),
            channel_id: msg.channel_id,
        });

        // One task per message: a slow provider call for one sender must not
        // stall anyone else's messages.
        tokio::spawn(async move {
            let typing = msg.channel_id.start_typing(&ctx.http);
            let result = handler::handle_message(
                &state,
                channel_id,
                sender_id,
                &sender_name,
                &text,
                sink.clone(),
            )
            .await;
            drop(typing);
            if let Err(e) = result {
                error!("Error processing Discord message: {e}");
                let _ = sink.send(&format!("Error: {e}")).await;
            }
        });
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);
    }
}

/// Start the Discord client and block until it shuts down.
pub async fn start_discord_bot(app_state: Arc<AppState>) -> anyhow::Result<()> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let token = app_state.config.discord_bot_token.clone();
    let handler = Handler { app_state };

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await?;

    info!("Starting Discord bot...");
    client.start().await?;
    Ok(())
}
