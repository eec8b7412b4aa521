//! First handshake: redirect discovery.
//!
//! The discovery endpoint decides which host serves the session. It takes
//! no request body: the device descriptor and token travel in the handshake
//! headers, and the endpoint answers with a single frame holding a
//! [`RedirectTicket`]. The connection is closed right after that frame.

use tokio::time::timeout;

use crate::{
    config::Config,
    error::{Error, ErrorKind, Result},
    protocol::ynison::{Descriptor, RedirectTicket},
    token::Token,
    transport::Transport,
    websocket,
};

/// Asks the discovery endpoint for the host and ticket of a state channel.
///
/// Connecting and receiving the reply together are bounded by
/// `config.handshake_timeout`.
///
/// # Errors
///
/// * `HandshakeFailed` - endpoint unreachable, connection refused or closed
///   early, or no reply in time
/// * `MalformedPayload` - reply is not JSON or lacks `redirect_ticket` or
///   `host`
/// * `InvalidArgument` - the handshake headers cannot be encoded
pub async fn resolve(
    transport: &Transport,
    config: &Config,
    token: &Token,
    descriptor: &Descriptor,
) -> Result<RedirectTicket> {
    let handshake =
        websocket::request(&config.discovery_url, token, descriptor, &config.origin)?;

    let reply = timeout(config.handshake_timeout, async {
        let mut stream = websocket::connect(transport, handshake, websocket::limits(config))
            .await
            .map_err(Error::handshake_failed)?;
        let reply = websocket::recv_text(&mut stream).await;
        websocket::close(stream).await;
        reply.map_err(|e| e.classify(ErrorKind::HandshakeFailed))
    })
    .await
    .map_err(|_| {
        Error::handshake_failed(format!(
            "no redirect within {}s",
            config.handshake_timeout.as_secs_f32()
        ))
    })??;

    let ticket = RedirectTicket::parse(&reply)?;
    debug!("redirected to {}", ticket.host);
    Ok(ticket)
}
