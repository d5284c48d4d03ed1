use crate::voice::{SessionError, SessionState, VoiceGateway};
use serenity::all::{ChannelId, GuildId};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

/// One voice session per guild, created lazily on the first connect.
///
/// The outer map lock is only ever held long enough to clone a session slot out.  The
/// per-guild inner lock is held across the platform calls, which is what guarantees at
/// most one in-flight connect/disconnect transition per guild.
pub struct VoiceSessions {
    gateway: Box<dyn VoiceGateway>,
    sessions: Mutex<HashMap<GuildId, Arc<Mutex<SessionState>>>>,
}

impl VoiceSessions {
    pub fn new(gateway: Box<dyn VoiceGateway>) -> Self {
        Self {
            gateway,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    async fn session(&self, guild: GuildId) -> Arc<Mutex<SessionState>> {
        self.sessions
            .lock()
            .await
            .entry(guild)
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::Idle)))
            .clone()
    }

    /// Session slot if one was ever created for this guild.  Never allocates, so
    /// voice-state events for guilds we never joined stay cheap.
    async fn peek(&self, guild: GuildId) -> Option<Arc<Mutex<SessionState>>> {
        self.sessions.lock().await.get(&guild).cloned()
    }

    pub async fn connected_channel(&self, guild: GuildId) -> Option<ChannelId> {
        let session = self.peek(guild).await?;
        let state = *session.lock().await;

        match state {
            SessionState::Connected { channel } => Some(channel),
            _ => None,
        }
    }

    /// Join `channel` unless the session is already live.  The state is re-read after the
    /// lock is acquired: a caller that raced a concurrent connect sees `Connected` here
    /// and does nothing.
    pub async fn ensure_connected(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<(), SessionError> {
        let session = self.session(guild).await;
        let mut state = session.lock().await;

        match *state {
            SessionState::Connected { .. } => Ok(()),
            // Unreachable while the lock is held across the join, but harmless.
            SessionState::Connecting => Ok(()),
            SessionState::Idle => {
                *state = SessionState::Connecting;
                match self.gateway.join(guild, channel).await {
                    Ok(()) => {
                        *state = SessionState::Connected { channel };
                        Ok(())
                    }
                    Err(err) => {
                        // Roll back so a failed join never wedges the session.
                        *state = SessionState::Idle;
                        Err(SessionError::Join(err))
                    }
                }
            }
        }
    }

    pub async fn play(&self, guild: GuildId, url: &str) -> Result<(), SessionError> {
        let session = self.peek(guild).await.ok_or(SessionError::NotConnected)?;
        let state = session.lock().await;

        match *state {
            SessionState::Connected { .. } => self
                .gateway
                .play(guild, url)
                .await
                .map_err(SessionError::Gateway),
            _ => Err(SessionError::NotConnected),
        }
    }

    /// Halt playback.  Deliberately leaves the connection open; `stop` has never meant
    /// "leave the channel".
    pub async fn stop(&self, guild: GuildId) -> Result<(), SessionError> {
        let session = self.peek(guild).await.ok_or(SessionError::NotConnected)?;
        let state = session.lock().await;

        match *state {
            SessionState::Connected { .. } => self
                .gateway
                .stop(guild)
                .await
                .map_err(SessionError::Gateway),
            _ => Err(SessionError::NotConnected),
        }
    }

    /// Leave the channel and reset to `Idle`.  Returns the channel that was left so the
    /// caller can name it in the confirmation.
    pub async fn disconnect(&self, guild: GuildId) -> Result<ChannelId, SessionError> {
        let session = self.peek(guild).await.ok_or(SessionError::NotConnected)?;
        let mut state = session.lock().await;

        match *state {
            SessionState::Connected { channel } => {
                // Leave first: if the platform call fails the session stays Connected.
                self.gateway
                    .leave(guild)
                    .await
                    .map_err(SessionError::Gateway)?;
                *state = SessionState::Idle;
                Ok(channel)
            }
            _ => Err(SessionError::NotConnected),
        }
    }

    /// Disconnect only if still connected to `channel`.  The auto-disconnect path observes
    /// the channel before taking the session lock, so it must re-check it here; a session
    /// that moved or already hung up in the meantime is left alone.
    pub async fn force_disconnect(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<bool, SessionError> {
        let Some(session) = self.peek(guild).await else {
            return Ok(false);
        };
        let mut state = session.lock().await;

        match *state {
            SessionState::Connected { channel: current } if current == channel => {
                self.gateway
                    .leave(guild)
                    .await
                    .map_err(SessionError::Gateway)?;
                *state = SessionState::Idle;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    #[cfg(test)]
    pub(crate) async fn state(&self, guild: GuildId) -> SessionState {
        match self.peek(guild).await {
            Some(session) => *session.lock().await,
            None => SessionState::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Records every gateway call; `fail_join` makes the next join fail.
    #[derive(Clone, Default)]
    struct MockGateway {
        joins: Arc<AtomicUsize>,
        leaves: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
        plays: Arc<std::sync::Mutex<Vec<String>>>,
        fail_join: Arc<AtomicBool>,
    }

    #[serenity::async_trait]
    impl VoiceGateway for MockGateway {
        async fn join(&self, _guild: GuildId, _channel: ChannelId) -> Result<()> {
            // Suspend mid-transition so concurrent callers get a chance to interleave.
            tokio::task::yield_now().await;
            if self.fail_join.load(Ordering::SeqCst) {
                bail!("join denied");
            }
            self.joins.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn leave(&self, _guild: GuildId) -> Result<()> {
            self.leaves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn play(&self, _guild: GuildId, url: &str) -> Result<()> {
            self.plays.lock().unwrap().push(url.to_string());
            Ok(())
        }

        async fn stop(&self, _guild: GuildId) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sessions(gateway: &MockGateway) -> VoiceSessions {
        VoiceSessions::new(Box::new(gateway.clone()))
    }

    const GUILD: GuildId = GuildId::new(1);
    const CHANNEL: ChannelId = ChannelId::new(10);
    const OTHER_CHANNEL: ChannelId = ChannelId::new(20);

    #[tokio::test]
    async fn connect_then_disconnect_ends_idle() {
        let gateway = MockGateway::default();
        let voice = sessions(&gateway);

        voice.ensure_connected(GUILD, CHANNEL).await.unwrap();
        assert_eq!(
            voice.state(GUILD).await,
            SessionState::Connected { channel: CHANNEL }
        );

        let left = voice.disconnect(GUILD).await.unwrap();
        assert_eq!(left, CHANNEL);
        assert_eq!(voice.state(GUILD).await, SessionState::Idle);
        assert_eq!(gateway.joins.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.leaves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_twice_reports_state_error() {
        let gateway = MockGateway::default();
        let voice = sessions(&gateway);

        voice.ensure_connected(GUILD, CHANNEL).await.unwrap();
        voice.disconnect(GUILD).await.unwrap();

        assert!(matches!(
            voice.disconnect(GUILD).await,
            Err(SessionError::NotConnected)
        ));
        assert_eq!(gateway.leaves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_while_idle_is_a_state_error() {
        let gateway = MockGateway::default();
        let voice = sessions(&gateway);

        assert!(matches!(
            voice.stop(GUILD).await,
            Err(SessionError::NotConnected)
        ));
        assert_eq!(voice.state(GUILD).await, SessionState::Idle);
        assert_eq!(gateway.stops.load(Ordering::SeqCst), 0);
    }

    // `stop` halting playback but keeping the connection open mirrors the original
    // command surface; pinned here so nobody "fixes" the asymmetry by accident.
    #[tokio::test]
    async fn stop_leaves_connection_open() {
        let gateway = MockGateway::default();
        let voice = sessions(&gateway);

        voice.ensure_connected(GUILD, CHANNEL).await.unwrap();
        voice.stop(GUILD).await.unwrap();

        assert_eq!(
            voice.state(GUILD).await,
            SessionState::Connected { channel: CHANNEL }
        );
        assert_eq!(gateway.stops.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.leaves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_plays_connect_once() {
        let gateway = MockGateway::default();
        let voice = sessions(&gateway);

        let (first, second) = tokio::join!(
            voice.ensure_connected(GUILD, CHANNEL),
            voice.ensure_connected(GUILD, CHANNEL),
        );
        first.unwrap();
        second.unwrap();

        assert_eq!(gateway.joins.load(Ordering::SeqCst), 1);
        assert_eq!(
            voice.state(GUILD).await,
            SessionState::Connected { channel: CHANNEL }
        );
    }

    #[tokio::test]
    async fn failed_join_rolls_back_to_idle() {
        let gateway = MockGateway::default();
        let voice = sessions(&gateway);

        gateway.fail_join.store(true, Ordering::SeqCst);
        assert!(matches!(
            voice.ensure_connected(GUILD, CHANNEL).await,
            Err(SessionError::Join(_))
        ));
        assert_eq!(voice.state(GUILD).await, SessionState::Idle);

        // A later attempt starts from a clean slate.
        gateway.fail_join.store(false, Ordering::SeqCst);
        voice.ensure_connected(GUILD, CHANNEL).await.unwrap();
        assert_eq!(
            voice.state(GUILD).await,
            SessionState::Connected { channel: CHANNEL }
        );
    }

    #[tokio::test]
    async fn play_requires_connection() {
        let gateway = MockGateway::default();
        let voice = sessions(&gateway);

        assert!(matches!(
            voice.play(GUILD, "https://example.com/a").await,
            Err(SessionError::NotConnected)
        ));

        voice.ensure_connected(GUILD, CHANNEL).await.unwrap();
        voice.play(GUILD, "https://example.com/a").await.unwrap();
        assert_eq!(
            *gateway.plays.lock().unwrap(),
            vec!["https://example.com/a".to_string()]
        );
    }

    #[tokio::test]
    async fn force_disconnect_only_fires_for_own_channel() {
        let gateway = MockGateway::default();
        let voice = sessions(&gateway);

        voice.ensure_connected(GUILD, CHANNEL).await.unwrap();

        // Wrong channel: session untouched
        assert!(!voice.force_disconnect(GUILD, OTHER_CHANNEL).await.unwrap());
        assert_eq!(
            voice.state(GUILD).await,
            SessionState::Connected { channel: CHANNEL }
        );

        // Our channel: exactly one leave
        assert!(voice.force_disconnect(GUILD, CHANNEL).await.unwrap());
        assert_eq!(voice.state(GUILD).await, SessionState::Idle);
        assert_eq!(gateway.leaves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn force_disconnect_without_session_is_a_noop() {
        let gateway = MockGateway::default();
        let voice = sessions(&gateway);

        assert!(!voice.force_disconnect(GUILD, CHANNEL).await.unwrap());
        assert_eq!(gateway.leaves.load(Ordering::SeqCst), 0);
    }
}
