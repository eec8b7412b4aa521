//! Session orchestration.
//!
//! Composes the protocol layers into the two public operations:
//!
//! * [`Session::current_state`] - join the session as an idle shadow device
//!   and report what is playing
//! * [`Session::push_track`] - replace the queue with a single track and
//!   start playing it
//!
//! Every call mints a fresh [`DeviceIdentity`], resolves a fresh
//! [`RedirectTicket`](crate::protocol::ynison::RedirectTicket) and opens its
//! own state channel, which is closed before the call returns. Nothing is
//! cached between calls and nothing is retried: the backend is authoritative
//! and may reorder or drop requests, so a `current_state` after a
//! `push_track` is not guaranteed to observe it.

use std::sync::Arc;

use serde::Serialize;

use crate::{
    channel::StateChannel,
    config::Config,
    error::Result,
    protocol::ynison::{Command, DeviceIdentity, SessionState},
    redirect,
    token::Token,
    transport::{self, Transport},
};

/// Summary of the session as reported by [`Session::current_state`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CurrentState {
    pub paused: bool,
    pub duration_ms: u64,
    pub progress_ms: u64,
    pub entity_id: String,
    pub entity_type: String,

    /// Selected queue entry, `None` if nothing is selected.
    pub track_id: Option<String>,
}

impl From<&SessionState> for CurrentState {
    fn from(state: &SessionState) -> Self {
        Self {
            paused: state.status.paused,
            duration_ms: state.status.duration_ms,
            progress_ms: state.status.progress_ms,
            entity_id: state.queue.entity_id.clone(),
            entity_type: state.queue.entity_type.clone(),
            track_id: state.selected().map(|playable| playable.playable_id.clone()),
        }
    }
}

/// Entry point to the session protocol.
///
/// Cheap to clone; clones share the process-wide [`Transport`].
#[derive(Clone)]
pub struct Session {
    config: Config,
    transport: Arc<Transport>,
}

impl Session {
    /// Creates a session client on the shared transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared transport cannot be created.
    pub fn new(config: Config) -> Result<Self> {
        let transport = transport::shared(&config)?;
        Ok(Self { config, transport })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::generate(self.config.device_id_length)
            .with_app_name(self.config.app_name.as_str())
    }

    /// Resolves a ticket and opens a state channel for `identity`.
    async fn open(&self, token: &Token, identity: &DeviceIdentity) -> Result<StateChannel> {
        let ticket = redirect::resolve(
            &self.transport,
            &self.config,
            token,
            &identity.descriptor(),
        )
        .await?;

        StateChannel::open(
            &self.transport,
            &self.config,
            &ticket,
            token,
            &identity.descriptor_with_ticket(&ticket.ticket),
        )
        .await
    }

    /// Reads the full session state.
    ///
    /// # Errors
    ///
    /// Propagates `HandshakeFailed`, `ChannelFailed`, `MalformedPayload` and
    /// `IndexOutOfRange` unchanged.
    pub async fn state(&self, token: &Token) -> Result<SessionState> {
        let identity = self.identity();
        let command = Command::full_state(&identity, &self.config.device_title);

        let mut channel = self.open(token, &identity).await?;
        let state = channel.query(&command).await;
        channel.close().await;

        let state = state?;
        debug!(
            "session state: {} entries, active device {:?}",
            state.queue.playable_list().len(),
            state.active_device_id
        );
        Ok(state)
    }

    /// Reports playback status and the selected track.
    ///
    /// Track metadata is not resolved here; see
    /// [`TrackInfo`](crate::catalog::TrackInfo).
    ///
    /// # Errors
    ///
    /// Same as [`state`](Self::state).
    pub async fn current_state(&self, token: &Token) -> Result<CurrentState> {
        self.state(token).await.map(|state| CurrentState::from(&state))
    }

    /// Replaces the queue with `track_id` and starts playing it on repeat.
    ///
    /// Does not wait for a reply: `true` means the frame was accepted by the
    /// transport, not that playback started.
    ///
    /// # Errors
    ///
    /// Propagates `HandshakeFailed` and `ChannelFailed` unchanged.
    pub async fn push_track(&self, token: &Token, track_id: u64) -> Result<bool> {
        let identity = self.identity();
        let command = Command::player_update(&identity.device_id, track_id);

        let mut channel = self.open(token, &identity).await?;
        let sent = channel.send(&command).await;
        channel.close().await;

        sent?;
        info!("pushed track {track_id}");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ynison::{Playable, PlayerQueue, VersionStamp};

    #[test]
    fn nothing_selected_has_no_track() {
        let state = SessionState::default();
        let current = CurrentState::from(&state);
        assert_eq!(current.track_id, None);
    }

    #[test]
    fn selected_track_is_reported() {
        let queue = PlayerQueue::single(Playable::track(42), VersionStamp::default());
        let mut state = SessionState {
            queue,
            ..SessionState::default()
        };
        state.status.paused = true;
        state.status.progress_ms = 1_500;

        let current = CurrentState::from(&state);
        assert_eq!(current.track_id.as_deref(), Some("42"));
        assert!(current.paused);
        assert_eq!(current.progress_ms, 1_500);
        assert_eq!(current.entity_type, "VARIOUS");
    }
}
