//! Process-wide outbound transport.
//!
//! Concurrent orchestrator calls share no protocol state, but they do share
//! one [`Transport`]: the rate-limited catalog client and the HTTP/1.1 client
//! that carries WebSocket upgrades. Per-call limits such as the frame cap
//! come from each caller's own [`Config`] and are not part of the shared
//! handle.
//!
//! The handle is created on first use and released by [`shutdown`]; a later
//! call to [`shared`] creates a fresh one.
//!
//! # Example
//!
//! ```rust
//! use ynison_bridge::{config::Config, transport};
//!
//! let transport = transport::shared(&Config::default())?;
//! // ...
//! transport::shutdown();
//! ```

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{config::Config, error::Result, http};

/// Handle guarded by [`shared`] and [`shutdown`].
static SHARED: Mutex<Option<Arc<Transport>>> = Mutex::new(None);

/// Outbound clients shared by every call.
pub struct Transport {
    /// Client for catalog requests.
    pub http: http::Client,

    upgrade: reqwest::Client,
}

impl Transport {
    /// Duration to keep upgrade connections alive at the TCP level.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Creates a transport identifying itself with `config.user_agent`.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        // Upgrades are an HTTP/1.1 mechanism. No read timeout: the upgraded
        // socket is bounded by the callers' own deadlines.
        let upgrade = reqwest::Client::builder()
            .http1_only()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            http: http::Client::new(config)?,
            upgrade,
        })
    }

    /// Client for WebSocket upgrade requests. Not rate limited.
    #[must_use]
    pub fn upgrade_client(&self) -> &reqwest::Client {
        &self.upgrade
    }
}

/// Returns the shared transport, creating it from `config` on first use.
///
/// Only the first call's `user_agent` takes effect until [`shutdown`].
///
/// # Errors
///
/// Returns an error if the transport cannot be created or the guard is
/// poisoned.
pub fn shared(config: &Config) -> Result<Arc<Transport>> {
    let mut guard = SHARED.lock()?;
    if let Some(transport) = guard.as_ref() {
        return Ok(Arc::clone(transport));
    }

    debug!("creating shared transport");
    let transport = Arc::new(Transport::new(config)?);
    *guard = Some(Arc::clone(&transport));
    Ok(transport)
}

/// Releases the shared transport.
///
/// Calls in flight keep their handle until they finish.
pub fn shutdown() {
    match SHARED.lock() {
        Ok(mut guard) => {
            if guard.take().is_some() {
                debug!("released shared transport");
            }
        }
        Err(e) => error!("releasing shared transport failed: {e}"),
    }
}
