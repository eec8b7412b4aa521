//! WebSocket plumbing shared by the redirect resolver and the state channel.
//!
//! Both handshakes carry the same header shape:
//!
//! ```text
//! Sec-WebSocket-Protocol: Bearer, v2, {"Ynison-Device-Id": "...", ...}
//! Origin: http://music.yandex.ru
//! Authorization: OAuth <token>
//! ```
//!
//! The sub-protocol header is a carrier for the descriptor, not a real
//! sub-protocol offer, and the backend does not have to select one. The
//! upgrade is therefore done over a plain HTTP/1.1 request and only the
//! resulting socket is handed to `tokio-tungstenite`.
//!
//! Both endpoints answer with a single JSON frame per request. This module
//! builds the upgrade request, connects with the frame-size cap of the
//! caller's [`Config`], and reads that one frame.

use futures_util::StreamExt;
use http::{
    header::{
        HeaderMap, HeaderValue, AUTHORIZATION, CONNECTION, ORIGIN, SEC_WEBSOCKET_ACCEPT,
        SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_PROTOCOL, SEC_WEBSOCKET_VERSION, UPGRADE,
    },
    Method, StatusCode,
};
use thiserror::Error;
use tokio_tungstenite::{
    tungstenite::{
        self,
        handshake::{client::generate_key, derive_accept_key},
        protocol::{Role, WebSocketConfig},
        Message,
    },
    WebSocketStream,
};
use url::Url;

use crate::{
    config::Config,
    error::{Error, ErrorKind, Result},
    protocol::ynison::Descriptor,
    token::Token,
    transport::Transport,
};

pub type Stream = WebSocketStream<reqwest::Upgraded>;

/// Authentication scheme tag of the sub-protocol header.
pub const SCHEME: &str = "Bearer";

/// Protocol version tag of the sub-protocol header.
pub const VERSION: &str = "v2";

/// WebSocket protocol version sent in the upgrade request.
const WEBSOCKET_VERSION: &str = "13";

/// Failure while upgrading the connection.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("server refused the upgrade with {0}")]
    Refused(StatusCode),

    #[error("server answered with a wrong accept key")]
    AcceptKey,
}

/// Failure while waiting for the reply frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection closed before reply ({0})")]
    Closed(String),

    #[error("reply is not UTF-8: {0}")]
    NotUtf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Transport(#[from] tungstenite::Error),
}

impl FrameError {
    /// Classifies the failure: undecodable replies are malformed payloads,
    /// everything else is a failure of the connection.
    #[must_use]
    pub fn classify(self, kind: ErrorKind) -> Error {
        match self {
            Self::NotUtf8(e) => Error::malformed_payload(e),
            other => Error::new(kind, other),
        }
    }
}

/// An upgrade request and the key its answer must be derived from.
#[derive(Debug)]
pub struct Handshake {
    request: reqwest::Request,
    key: String,
}

impl Handshake {
    #[must_use]
    pub fn url(&self) -> &Url {
        self.request.url()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }
}

/// Frame limits for connections made on behalf of `config`.
#[must_use]
pub fn limits(config: &Config) -> WebSocketConfig {
    let mut limits = WebSocketConfig::default();
    limits.max_frame_size = Some(config.max_frame_size);
    limits.max_message_size = Some(config.max_frame_size);
    limits
}

/// Builds the upgrade request for the WebSocket `url`.
///
/// # Errors
///
/// Returns `InvalidArgument` if `url` is not a `ws` or `wss` URL or a header
/// value cannot be encoded.
pub fn request(url: &Url, token: &Token, descriptor: &Descriptor, origin: &str) -> Result<Handshake> {
    let scheme = match url.scheme() {
        "ws" => "http",
        "wss" => "https",
        other => {
            return Err(Error::invalid_argument(format!(
                "{url} is not a WebSocket URL (scheme {other:?})"
            )))
        }
    };
    let mut upgrade_url = url.clone();
    upgrade_url
        .set_scheme(scheme)
        .map_err(|()| Error::invalid_argument(format!("{url} cannot be upgraded")))?;

    let key = generate_key();
    let descriptor = serde_json::to_string(descriptor)?;

    let mut request = reqwest::Request::new(Method::GET, upgrade_url);
    let headers = request.headers_mut();
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static(WEBSOCKET_VERSION));
    headers.insert(SEC_WEBSOCKET_KEY, HeaderValue::from_str(&key)?);
    headers.insert(
        SEC_WEBSOCKET_PROTOCOL,
        HeaderValue::from_str(&format!("{SCHEME}, {VERSION}, {descriptor}"))?,
    );
    headers.insert(ORIGIN, HeaderValue::from_str(origin)?);

    let mut authorization = HeaderValue::from_str(&format!("OAuth {}", token.as_str()))?;
    authorization.set_sensitive(true);
    headers.insert(AUTHORIZATION, authorization);

    Ok(Handshake { request, key })
}

/// Upgrades the connection and wraps it as a client WebSocket.
///
/// Whether the server selects a sub-protocol is not checked.
///
/// # Errors
///
/// Returns the failure unclassified; callers decide which protocol phase
/// failed.
pub async fn connect(
    transport: &Transport,
    handshake: Handshake,
    limits: WebSocketConfig,
) -> std::result::Result<Stream, HandshakeError> {
    let Handshake { request, key } = handshake;
    let url = request.url().clone();
    debug!("connecting to {url}");

    let response = transport.upgrade_client().execute(request).await?;
    let status = response.status();
    trace!("{url}: handshake response {status}");
    if status != StatusCode::SWITCHING_PROTOCOLS {
        return Err(HandshakeError::Refused(status));
    }

    let expected = derive_accept_key(key.as_bytes());
    let accept = response
        .headers()
        .get(SEC_WEBSOCKET_ACCEPT)
        .and_then(|value| value.to_str().ok());
    if accept != Some(expected.as_str()) {
        return Err(HandshakeError::AcceptKey);
    }

    let upgraded = response.upgrade().await?;
    Ok(WebSocketStream::from_raw_socket(upgraded, Role::Client, Some(limits)).await)
}

/// Waits for the next text or binary frame and returns it as text.
///
/// Ping and pong frames are skipped; pings are answered by the transport.
///
/// # Errors
///
/// Returns `FrameError` if the connection is closed or fails before a frame
/// arrives, or if a binary frame is not UTF-8.
pub async fn recv_text(stream: &mut Stream) -> std::result::Result<String, FrameError> {
    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => {
                let text = text.as_str().to_owned();
                trace!("received: {text}");
                return Ok(text);
            }
            Message::Binary(bytes) => {
                let text = String::from_utf8(bytes.to_vec())?;
                trace!("received binary: {text}");
                return Ok(text);
            }
            Message::Close(frame) => {
                let reason = frame.map_or_else(
                    || String::from("no close frame"),
                    |frame| format!("{}: {}", frame.code, frame.reason.as_str()),
                );
                return Err(FrameError::Closed(reason));
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                trace!("skipping control frame");
            }
        }
    }

    Err(FrameError::Closed(String::from("end of stream")))
}

/// Closes the connection, logging instead of failing.
pub async fn close(mut stream: Stream) {
    if let Err(e) = stream.close(None).await {
        match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {}
            e => warn!("error closing websocket: {e}"),
        }
    }
    debug!("websocket closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ynison::DeviceIdentity;

    #[test]
    fn request_carries_protocol_headers() {
        let identity = DeviceIdentity::generate(16);
        let token = Token::new("y0_secret").unwrap();
        let url = Url::parse("wss://h1.example/ynison_state.YnisonStateService/PutYnisonState")
            .unwrap();

        let handshake = request(
            &url,
            &token,
            &identity.descriptor_with_ticket("T1"),
            "http://music.yandex.ru",
        )
        .unwrap();
        assert_eq!(
            handshake.url().as_str(),
            "https://h1.example/ynison_state.YnisonStateService/PutYnisonState"
        );

        let headers = handshake.headers();
        let protocol = headers[SEC_WEBSOCKET_PROTOCOL].to_str().unwrap();
        let descriptor = protocol.strip_prefix("Bearer, v2, ").unwrap();
        let descriptor: Descriptor = serde_json::from_str(descriptor).unwrap();
        assert_eq!(descriptor.device_id, identity.device_id);
        assert_eq!(descriptor.redirect_ticket.as_deref(), Some("T1"));

        assert_eq!(headers[ORIGIN], "http://music.yandex.ru");
        assert_eq!(headers[AUTHORIZATION], "OAuth y0_secret");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers[UPGRADE], "websocket");
        assert_eq!(headers[SEC_WEBSOCKET_VERSION], "13");
        assert!(!headers[SEC_WEBSOCKET_KEY].is_empty());
    }

    #[test]
    fn plain_websocket_urls_upgrade_over_http() {
        let identity = DeviceIdentity::generate(16);
        let token = Token::new("y0_secret").unwrap();
        let url = Url::parse("ws://127.0.0.1:9000/redirector").unwrap();

        let handshake = request(&url, &token, &identity.descriptor(), "http://music.yandex.ru")
            .unwrap();
        assert_eq!(handshake.url().as_str(), "http://127.0.0.1:9000/redirector");
    }

    #[test]
    fn rejects_non_websocket_urls() {
        let identity = DeviceIdentity::generate(16);
        let token = Token::new("y0_secret").unwrap();

        for url in ["data:text/plain,hello", "https://h1.example/"] {
            let url = Url::parse(url).unwrap();
            let err = request(&url, &token, &identity.descriptor(), "http://music.yandex.ru")
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn frame_size_follows_config() {
        let config = Config {
            max_frame_size: 4096,
            ..Config::default()
        };
        let limits = limits(&config);
        assert_eq!(limits.max_frame_size, Some(4096));
        assert_eq!(limits.max_message_size, Some(4096));
    }

    #[test]
    fn undecodable_replies_are_malformed() {
        let utf8 = String::from_utf8(vec![0xff]).unwrap_err();
        let err = FrameError::from(utf8).classify(ErrorKind::ChannelFailed);
        assert_eq!(err.kind, ErrorKind::MalformedPayload);

        let err = FrameError::Closed(String::from("1000: bye")).classify(ErrorKind::HandshakeFailed);
        assert_eq!(err.kind, ErrorKind::HandshakeFailed);
    }
}
