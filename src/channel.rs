//! Second handshake: the state channel.
//!
//! A [`StateChannel`] is authorized by a single [`RedirectTicket`] and lives
//! for one operation. It is used in one of two ways:
//!
//! * query: [`send`](StateChannel::send) a command, then
//!   [`receive`](StateChannel::receive) the single decoded reply
//! * fire-and-forget: [`send`](StateChannel::send) a command and
//!   [`close`](StateChannel::close) without reading
//!
//! Callers close the channel on every exit path.

use std::time::Duration;

use futures_util::SinkExt;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::{
    config::Config,
    error::{Error, ErrorKind, Result},
    protocol::ynison::{codec, Command, Descriptor, RedirectTicket, SessionState},
    token::Token,
    transport::Transport,
    websocket::{self, Stream},
};

/// Path of the state service on a redirect host.
pub const STATE_PATH: &str = "/ynison_state.YnisonStateService/PutYnisonState";

pub struct StateChannel {
    stream: Stream,
    host: String,
    receive_timeout: Duration,
}

impl StateChannel {
    /// URL of the state service on `host`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPayload` if `host` does not form a valid URL.
    pub fn url(config: &Config, host: &str) -> Result<Url> {
        Url::parse(&format!("{}://{host}{STATE_PATH}", config.scheme())).map_err(|e| {
            Error::malformed_payload(format!("redirect host {host:?} is unusable: {e}"))
        })
    }

    /// Connects to the host named by `ticket`.
    ///
    /// `descriptor` must carry the ticket; see
    /// [`DeviceIdentity::descriptor_with_ticket`].
    ///
    /// [`DeviceIdentity::descriptor_with_ticket`]: crate::protocol::ynison::DeviceIdentity::descriptor_with_ticket
    ///
    /// # Errors
    ///
    /// * `ChannelFailed` - connection refused, failed or timed out
    /// * `MalformedPayload` - the redirect host is unusable
    pub async fn open(
        transport: &Transport,
        config: &Config,
        ticket: &RedirectTicket,
        token: &Token,
        descriptor: &Descriptor,
    ) -> Result<Self> {
        let url = Self::url(config, &ticket.host)?;
        let handshake = websocket::request(&url, token, descriptor, &config.origin)?;
        let connect = websocket::connect(transport, handshake, websocket::limits(config));

        let stream = timeout(config.handshake_timeout, connect)
            .await
            .map_err(|_| {
                Error::channel_failed(format!("connecting to {} timed out", ticket.host))
            })?
            .map_err(Error::channel_failed)?;

        Ok(Self {
            stream,
            host: ticket.host.clone(),
            receive_timeout: config.handshake_timeout,
        })
    }

    /// Sends `command` as one text frame.
    ///
    /// Success means the transport accepted the frame.
    ///
    /// # Errors
    ///
    /// Returns `ChannelFailed` if the frame could not be sent.
    pub async fn send(&mut self, command: &Command) -> Result<()> {
        let text = codec::encode(command)?;
        self.stream
            .send(Message::text(text))
            .await
            .map_err(Error::channel_failed)
    }

    /// Waits for the single reply and decodes it.
    ///
    /// # Errors
    ///
    /// * `ChannelFailed` - closed, failed or no reply in time
    /// * `MalformedPayload` - reply cannot be decoded
    /// * `IndexOutOfRange` - queue index outside the playable list
    pub async fn receive(&mut self) -> Result<SessionState> {
        let reply = timeout(self.receive_timeout, websocket::recv_text(&mut self.stream))
            .await
            .map_err(|_| {
                Error::channel_failed(format!(
                    "no state from {} within {}s",
                    self.host,
                    self.receive_timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| e.classify(ErrorKind::ChannelFailed))?;

        codec::decode(&reply)
    }

    /// Sends `command` and waits for the reply.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send) and [`receive`](Self::receive).
    pub async fn query(&mut self, command: &Command) -> Result<SessionState> {
        self.send(command).await?;
        self.receive().await
    }

    /// Closes the channel.
    pub async fn close(self) {
        websocket::close(self.stream).await;
    }
}
