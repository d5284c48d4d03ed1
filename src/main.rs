mod command;
mod config;
mod context;
mod event;
mod handler;
mod logging;
mod voice;
mod youtube;

use serenity::{all::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;
    let token = cfg.discord_token.clone();

    let http = reqwest::Client::new();
    let manager = Songbird::serenity();
    let gateway = voice::SongbirdGateway::new(manager.clone(), http.clone());
    let resolver = youtube::MediaResolver::new(http, cfg.yt_api_key.clone());
    let handler = handler::Handler::new(
        cfg,
        command::Registry::new(),
        voice::VoiceSessions::new(Box::new(gateway)),
        resolver,
    );

    // Things we want discord to tell us about.
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::MESSAGE_CONTENT;

    Client::builder(&token, intents)
        .event_handler(handler)
        .register_songbird_with(manager)
        .await?
        .start()
        .await
        .map_err(Into::into)
}
