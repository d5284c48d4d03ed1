use crate::{
    command::Registry, config::Config, context::Context, event::Event, voice::VoiceSessions,
    youtube::MediaResolver,
};
use serenity::all::{Message, Ready, VoiceState};

/// Discord event handler
pub struct Handler {
    cfg: Config,
    registry: Registry,
    voice: VoiceSessions,
    resolver: MediaResolver,
}

impl<'a> Handler {
    pub fn new(
        cfg: Config,
        registry: Registry,
        voice: VoiceSessions,
        resolver: MediaResolver,
    ) -> Self {
        Self {
            cfg,
            registry,
            voice,
            resolver,
        }
    }

    fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            registry: &self.registry,
            voice: &self.voice,
            resolver: &self.resolver,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        Event::Ready(ready).handle(self.ctx(&discord_ctx)).await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        Event::Message(msg).handle(self.ctx(&discord_ctx)).await;
    }

    async fn voice_state_update(
        &self,
        discord_ctx: serenity::all::Context,
        old: Option<VoiceState>,
        new: VoiceState,
    ) {
        Event::VoiceStateUpdate { old, new }
            .handle(self.ctx(&discord_ctx))
            .await;
    }
}
