//! The voice-channel commands: `play`, `stop`, `disconnect`.
//!
//! These are thin: state decisions live in [`crate::voice::VoiceSessions`], media
//! resolution in [`crate::youtube::MediaResolver`].

use crate::{
    command::{ArgValue, CommandError, Invocation},
    log_internal,
};

pub async fn play(invocation: &Invocation<'_>, args: &[ArgValue]) -> Result<(), CommandError> {
    let query = args
        .first()
        .and_then(ArgValue::as_text)
        .ok_or_else(|| CommandError::Argument("missing required argument <query>".to_string()))?;
    let guild_id = invocation.guild_id()?;

    // check if user is connected to a vc
    let Some(voice_channel) = invocation.voice_channel else {
        return Err(CommandError::State(
            "You are not connected to a voice channel".to_string(),
        ));
    };

    invocation
        .ctx
        .voice
        .ensure_connected(guild_id, voice_channel)
        .await?;

    let track = invocation
        .ctx
        .resolver
        .search(query)
        .await
        .map_err(|err| CommandError::External(err.to_string()))?;

    let Some(track) = track else {
        return invocation.reply("No video found").await;
    };

    log_internal!("Resolved \"{}\" to \"{}\" ({})", query, track.title, track.url);

    invocation
        .reply(format!("Now playing\n{}", track.url))
        .await?;
    invocation.ctx.voice.play(guild_id, &track.url).await?;

    Ok(())
}

pub async fn stop(invocation: &Invocation<'_>) -> Result<(), CommandError> {
    let guild_id = invocation.guild_id()?;

    // Halts playback only; the voice connection deliberately stays open.
    invocation.ctx.voice.stop(guild_id).await?;

    Ok(())
}

pub async fn disconnect(invocation: &Invocation<'_>) -> Result<(), CommandError> {
    let guild_id = invocation.guild_id()?;

    let channel = invocation.ctx.voice.disconnect(guild_id).await?;
    invocation
        .reply(format!("Disconnected from <#{}>", channel))
        .await
}
