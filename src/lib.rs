//! Remote playback state and control for Yandex Music sessions.
//!
//! Ynison is the device synchronization service behind the Yandex Music
//! clients. This crate joins a user's Ynison session as a short-lived
//! synthetic device in order to:
//!
//! * read what is currently playing ([`session::Session::current_state`])
//! * replace the queue with a single track ([`session::Session::push_track`])
//!
//! # Protocol
//!
//! Every operation takes two WebSocket handshakes:
//!
//! 1. [`redirect`] asks a fixed discovery endpoint which host serves the
//!    session and receives a single-use ticket
//! 2. [`channel`] connects to that host with the ticket and exchanges one
//!    JSON state envelope
//!
//! Envelopes are built by [`protocol::ynison::Command`] and encoded and
//! decoded by [`protocol::ynison::codec`].
//!
//! # Surroundings
//!
//! * [`catalog`] resolves track ids to display metadata and direct links
//! * [`server`] exposes both over HTTP
//! * [`transport`] holds the outbound clients shared by all calls
//!
//! # Example
//!
//! ```rust
//! use ynison_bridge::{config::Config, session::Session, token::Token};
//!
//! let session = Session::new(Config::default())?;
//! let token: Token = "y0_...".parse()?;
//!
//! let state = session.current_state(&token).await?;
//! if let Some(track_id) = state.track_id {
//!     println!("playing {track_id}");
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]

#[macro_use]
extern crate log;

pub mod catalog;
pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod protocol;
pub mod redirect;
pub mod server;
pub mod session;
pub mod signal;
pub mod token;
pub mod transport;
pub mod util;
pub mod websocket;
