use anyhow::{anyhow, Result};
use serenity::all::{ChannelId, GuildId};
use songbird::{input::YoutubeDl, Call, Songbird};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The few platform voice operations the session manager needs.  Narrow on purpose:
/// tests swap in a recording mock, production uses songbird.
#[serenity::async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(&self, guild: GuildId, channel: ChannelId) -> Result<()>;
    async fn leave(&self, guild: GuildId) -> Result<()>;
    async fn play(&self, guild: GuildId, url: &str) -> Result<()>;
    async fn stop(&self, guild: GuildId) -> Result<()>;
}

pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { manager, http }
    }

    fn call(&self, guild: GuildId) -> Result<Arc<Mutex<Call>>> {
        self.manager
            .get(guild)
            .ok_or_else(|| anyhow!("no active voice call for guild {}", guild))
    }
}

#[serenity::async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(&self, guild: GuildId, channel: ChannelId) -> Result<()> {
        self.manager
            .join(guild, channel)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }

    async fn leave(&self, guild: GuildId) -> Result<()> {
        self.manager.remove(guild).await.map_err(Into::into)
    }

    async fn play(&self, guild: GuildId, url: &str) -> Result<()> {
        let source = YoutubeDl::new(self.http.clone(), url.to_string());
        let call = self.call(guild)?;
        call.lock().await.enqueue_input(source.into()).await;
        Ok(())
    }

    async fn stop(&self, guild: GuildId) -> Result<()> {
        let call = self.call(guild)?;
        call.lock().await.queue().stop();
        Ok(())
    }
}
