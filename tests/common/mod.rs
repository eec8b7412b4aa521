//! In-process stand-in for the Ynison backend.
//!
//! Serves both handshakes on one loopback port: the discovery path answers
//! with a scripted redirect, any other path is treated as the state service,
//! reads one command frame and answers with a scripted reply. Every accepted
//! connection is reported on [`FakeYnison::next`].
//!
//! Like the production backend, the server does not select a sub-protocol
//! unless started with [`FakeYnison::start_selecting`].

#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::timeout,
};
use tokio_tungstenite::{
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::HeaderValue,
        Message,
    },
    WebSocketStream,
};
use url::Url;

use ynison_bridge::{config::Config, token::Token};

pub const DISCOVERY_PATH: &str = "/redirector.YnisonRedirectService/GetRedirectToYnison";

/// Placeholder replaced by the server's own address in replies.
pub const SELF_HOST: &str = "{host}";

/// What the server does after a handshake.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Send this text frame, then close.
    Text(String),
    /// Send this text as a binary frame, then close.
    Binary(String),
    /// Send a ping, then this text frame, then close.
    PingThen(String),
    /// Close without replying.
    Close,
    /// Never reply; wait for the client to go away.
    Silent,
}

/// One accepted connection.
#[derive(Clone, Debug, Default)]
pub struct Received {
    pub path: String,
    pub protocol: String,
    pub authorization: String,
    pub origin: String,
    pub frame: Option<String>,
}

impl Received {
    pub fn is_discovery(&self) -> bool {
        self.path == DISCOVERY_PATH
    }

    pub fn frame_json(&self) -> serde_json::Value {
        serde_json::from_str(self.frame.as_deref().expect("no frame received"))
            .expect("frame is not JSON")
    }
}

pub struct FakeYnison {
    pub addr: SocketAddr,
    received: mpsc::UnboundedReceiver<Received>,
}

impl FakeYnison {
    pub async fn start(redirect: Reply, state: Reply) -> Self {
        Self::spawn(redirect, state, None).await
    }

    /// Like [`start`](Self::start), but answers every handshake with
    /// `protocol` as the selected sub-protocol.
    pub async fn start_selecting(redirect: Reply, state: Reply, protocol: &'static str) -> Self {
        Self::spawn(redirect, state, Some(protocol)).await
    }

    async fn spawn(redirect: Reply, state: Reply, protocol: Option<&'static str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, received) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                let redirect = redirect.clone();
                let state = state.clone();
                tokio::spawn(async move {
                    handle(stream, addr, tx, redirect, state, protocol).await;
                });
            }
        });

        Self { addr, received }
    }

    /// Redirects to itself and answers the state service with `state`.
    pub async fn with_state(state: Reply) -> Self {
        Self::start(redirect_to_self("T1"), state).await
    }

    pub fn config(&self) -> Config {
        config_for(self.addr)
    }

    /// Waits for the next accepted connection.
    pub async fn next(&mut self) -> Received {
        timeout(Duration::from_secs(5), self.received.recv())
            .await
            .expect("no connection within 5s")
            .expect("server stopped")
    }

    /// Waits for the next connection to the state service.
    pub async fn next_state(&mut self) -> Received {
        loop {
            let received = self.next().await;
            if !received.is_discovery() {
                return received;
            }
        }
    }
}

pub fn config_for(addr: SocketAddr) -> Config {
    Config {
        discovery_url: Url::parse(&format!("ws://{addr}{DISCOVERY_PATH}")).unwrap(),
        secure: false,
        handshake_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

pub fn token() -> Token {
    "y0_test_token".parse().unwrap()
}

pub fn redirect_to_self(ticket: &str) -> Reply {
    Reply::Text(
        json!({
            "redirect_ticket": ticket,
            "host": SELF_HOST,
            "session_id": 7,
        })
        .to_string(),
    )
}

/// A session reply selecting `index` in a list of catalog tracks.
pub fn state_reply(index: i64, track_ids: &[u64], paused: bool, progress_ms: u64) -> Reply {
    let playables: Vec<_> = track_ids
        .iter()
        .map(|id| {
            json!({
                "playable_id": id.to_string(),
                "playable_type": "TRACK",
                "from": "web",
                "title": format!("track {id}"),
            })
        })
        .collect();

    Reply::Text(
        json!({
            "player_state": {
                "player_queue": {
                    "current_playable_index": index,
                    "entity_id": "playlist:1",
                    "entity_type": "PLAYLIST",
                    "playable_list": playables,
                    "options": { "repeat_mode": "NONE" },
                    "entity_context": "BASED_ON_ENTITY_BY_DEFAULT",
                    "version": { "device_id": "phone", "version": "1", "timestamp_ms": "0" },
                    "from_optional": "",
                },
                "status": {
                    "duration_ms": "180000",
                    "paused": paused,
                    "playback_speed": 1.0,
                    "progress_ms": progress_ms.to_string(),
                    "version": { "device_id": "phone", "version": "2", "timestamp_ms": "0" },
                },
            },
            "devices": [],
            "active_device_id_optional": "phone",
            "timestamp_ms": "1700000000000",
            "rid": "r1",
        })
        .to_string(),
    )
}

async fn handle(
    stream: TcpStream,
    addr: SocketAddr,
    tx: mpsc::UnboundedSender<Received>,
    redirect: Reply,
    state: Reply,
    protocol: Option<&'static str>,
) {
    let mut received = Received::default();
    let callback = |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_owned()
        };
        received.path = request.uri().path().to_owned();
        received.protocol = header("sec-websocket-protocol");
        received.authorization = header("authorization");
        received.origin = header("origin");

        if let Some(protocol) = protocol {
            response
                .headers_mut()
                .insert("sec-websocket-protocol", HeaderValue::from_static(protocol));
        }
        Ok(response)
    };

    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };

    let reply = if received.is_discovery() {
        redirect
    } else {
        received.frame = next_text(&mut ws).await;
        state
    };
    let _ = tx.send(received);

    let host = addr.to_string();
    match reply {
        Reply::Text(text) => {
            let _ = ws.send(Message::text(text.replace(SELF_HOST, &host))).await;
            let _ = ws.close(None).await;
        }
        Reply::Binary(text) => {
            let bytes = text.replace(SELF_HOST, &host).into_bytes();
            let _ = ws.send(Message::binary(bytes)).await;
            let _ = ws.close(None).await;
        }
        Reply::PingThen(text) => {
            let _ = ws.send(Message::Ping(Vec::from("keepalive").into())).await;
            let _ = ws.send(Message::text(text.replace(SELF_HOST, &host))).await;
            let _ = ws.close(None).await;
        }
        Reply::Close => {
            let _ = ws.close(None).await;
        }
        Reply::Silent => {}
    }

    // Drain until the client hangs up.
    while let Some(Ok(_)) = ws.next().await {}
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> Option<String> {
    while let Some(Ok(message)) = ws.next().await {
        match message {
            Message::Text(text) => return Some(text.as_str().to_owned()),
            Message::Close(_) => return None,
            _ => {}
        }
    }
    None
}
