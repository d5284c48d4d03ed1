//! The Serenity crate we're using for the Discord API is designed around callbacks to handle
//! events.  To keep dispatch in one place, the callbacks are translated to a distinct Event
//! enum which the rest of the bot consumes.

use crate::{context::Context, log_error, log_event, logging::*};
use anyhow::Result;
use serenity::all::{Message, Ready, VoiceState};

/// A Discord event
pub enum Event {
    Ready(Ready),
    Message(Message),
    VoiceStateUpdate {
        old: Option<VoiceState>,
        new: VoiceState,
    },
}

impl Event {
    /// Process one event.  Errors that escape the per-command reporting boundary are logged
    /// and dropped here; a bad event must never take down the event loop.
    pub async fn handle(self, ctx: Context<'_>) {
        if let Err(err) = self.process(&ctx).await {
            log_error!("Error handling event: {}", err);
        }
    }

    async fn process(&self, ctx: &Context<'_>) -> Result<()> {
        match self {
            Event::Ready(ready) => {
                log_event!(
                    "Connected to {} server(s) as {}",
                    ready.guilds.len(),
                    ctx.cache.current_user().color(),
                );
            }
            Event::Message(msg) => {
                log_event!(
                    "{}{}{}{}{}{} {}",
                    msg.guild_id.color(ctx.http).await,
                    Glue {}.color(),
                    msg.channel_id.color(ctx.http).await,
                    Glue {}.color(),
                    msg.author.color(),
                    Glue {}.color(),
                    msg.content,
                );

                crate::command::dispatch(ctx, msg).await;
            }
            Event::VoiceStateUpdate { old, new } => {
                self.log_voice_movement(ctx, old, new).await;
                crate::voice::on_voice_state_update(ctx, old, new).await?;
            }
        }

        Ok(())
    }

    async fn log_voice_movement(
        &self,
        ctx: &Context<'_>,
        old: &Option<VoiceState>,
        new: &VoiceState,
    ) {
        match (old.as_ref().and_then(|o| o.channel_id), new.channel_id) {
            (Some(old_id), Some(new_id)) if old_id == new_id => {
                // State change within same channel, e.g. mute/unmute
                // Not currently logging this
            }
            (Some(old_id), Some(new_id)) => log_event!(
                "{} moved VC channel from \"{}\" to \"{}\"",
                new.user_id.color(ctx.http).await,
                old_id.color(ctx.http).await,
                new_id.color(ctx.http).await,
            ),
            (Some(old_id), None) => log_event!(
                "{} left VC channel \"{}\"",
                new.user_id.color(ctx.http).await,
                old_id.color(ctx.http).await,
            ),
            (None, Some(new_id)) => log_event!(
                "{} joined VC channel \"{}\"",
                new.user_id.color(ctx.http).await,
                new_id.color(ctx.http).await,
            ),
            (None, None) => {}
        }
    }
}
