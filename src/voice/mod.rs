//! Per-guild voice session lifecycle.
//!
//! Each guild has at most one session, a tiny state machine:
//!
//! ```text
//! Idle -> Connecting -> Connected -> Idle
//!           (join)        (leave / alone in channel)
//! ```
//!
//! All transitions for a guild happen under that guild's session lock, which is held
//! across the platform join/leave awaits.  That serializes connect/play/stop/disconnect
//! per guild: a second `play` arriving while the first is still joining waits on the
//! lock and then re-reads the state, so both can never observe `Idle` and both connect.

mod gateway;
mod manager;

pub use gateway::{SongbirdGateway, VoiceGateway};
pub use manager::VoiceSessions;

use crate::{context::Context, log_event, logging::*};
use anyhow::Result;
use serenity::all::{ChannelId, VoiceState};

/// Where a guild's voice session is in its lifecycle.  `Connected` is the only state
/// with a channel; the invariant "connected iff channel set" is the enum shape itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected { channel: ChannelId },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I am not connected to any voice channel")]
    NotConnected,
    #[error("could not join the voice channel: {0}")]
    Join(anyhow::Error),
    #[error("voice operation failed: {0}")]
    Gateway(anyhow::Error),
}

/// React to a voice-state change: if someone just left the channel we are playing in and
/// we would now be alone, hang up.  Events for guilds or channels we are not connected to
/// never touch any session.
pub async fn on_voice_state_update(
    ctx: &Context<'_>,
    old: &Option<VoiceState>,
    new: &VoiceState,
) -> Result<()> {
    let Some(guild_id) = new.guild_id else {
        return Ok(());
    };
    let Some(bot_channel) = ctx.voice.connected_channel(guild_id).await else {
        return Ok(());
    };

    let before = old.as_ref().and_then(|state| state.channel_id);
    if !is_departure_from(bot_channel, before, new.channel_id) {
        return Ok(());
    }

    // Count who is still in our channel, ourselves included.  The cache ref is a guard,
    // so finish the count before awaiting anything.
    let remaining = match ctx.cache.guild(guild_id) {
        Some(guild) => guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(bot_channel))
            .count(),
        None => return Ok(()),
    };

    if !would_be_alone(remaining) {
        return Ok(());
    }

    // The session may have moved on while we were counting; force_disconnect re-checks
    // the channel under the session lock.
    if ctx.voice.force_disconnect(guild_id, bot_channel).await? {
        log_event!(
            "Left VC channel \"{}\": nobody else is listening",
            bot_channel.color(ctx.http).await,
        );
    }

    Ok(())
}

/// Fewer than 2 left in the channel (the count includes the bot) means nobody is
/// listening anymore.
fn would_be_alone(remaining: usize) -> bool {
    remaining < 2
}

/// Did this voice-state change take a member out of `bot_channel`?
fn is_departure_from(
    bot_channel: ChannelId,
    before: Option<ChannelId>,
    after: Option<ChannelId>,
) -> bool {
    before == Some(bot_channel) && after != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn departure_detection_filters_to_our_channel() {
        let ours = ChannelId::new(10);
        let other = ChannelId::new(20);

        // Left our channel entirely, or moved elsewhere
        assert!(is_departure_from(ours, Some(ours), None));
        assert!(is_departure_from(ours, Some(ours), Some(other)));

        // Movement that never touched our channel
        assert!(!is_departure_from(ours, Some(other), None));
        assert!(!is_departure_from(ours, None, Some(other)));
        assert!(!is_departure_from(ours, None, Some(ours)));

        // Non-movement state change, e.g. mute/unmute
        assert!(!is_departure_from(ours, Some(ours), Some(ours)));
    }

    #[test]
    fn alone_threshold_is_fewer_than_two() {
        // Only the bot left: hang up
        assert!(would_be_alone(1));
        // Bot plus one listener: stay
        assert!(!would_be_alone(2));
        assert!(!would_be_alone(3));
        // Degenerate case, e.g. a stale cache with the bot itself missing
        assert!(would_be_alone(0));
    }
}
