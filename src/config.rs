//! Runtime configuration.
//!
//! [`Config`] carries the endpoints, identity strings and limits used by the
//! protocol layers, the catalog client and the HTTP surface. The binary builds
//! it from command line arguments; library users start from
//! [`Config::default`] and override what they need.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use url::Url;

/// Default discovery endpoint of the session protocol backend.
pub const DISCOVERY_URL: &str =
    "wss://ynison.music.yandex.ru/redirector.YnisonRedirectService/GetRedirectToYnison";

/// Default base URL of the catalog REST API.
pub const CATALOG_URL: &str = "https://api.music.yandex.net";

/// `Origin` sent on both handshakes, as the web client does.
pub const ORIGIN: &str = "http://music.yandex.ru";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Discovery endpoint that hands out redirect tickets.
    pub discovery_url: Url,

    /// Whether the state channel uses `wss` (true) or `ws` (false).
    pub secure: bool,

    /// Value of the `Origin` header on both handshakes.
    pub origin: String,

    /// Application name announced in the device descriptor and device block.
    pub app_name: String,

    /// Human-readable device title announced in the device block.
    pub device_title: String,

    /// Number of characters in generated device ids.
    pub device_id_length: usize,

    /// Bounded wait for connecting and for the single reply frame.
    pub handshake_timeout: Duration,

    /// Deadline the HTTP surface imposes on each orchestrator call.
    pub request_timeout: Duration,

    /// Largest reply frame accepted from either endpoint.
    pub max_frame_size: usize,

    /// Base URL of the catalog REST API.
    pub catalog_url: Url,

    /// `User-Agent` for catalog requests.
    pub user_agent: String,

    /// Address the HTTP surface listens on.
    pub bind: SocketAddr,

    /// Directory served as static fallback by the HTTP surface.
    pub static_dir: PathBuf,
}

impl Config {
    /// Builds the `User-Agent` string from the crate name and version and
    /// the host operating system.
    #[must_use]
    pub fn default_user_agent() -> String {
        let app_name = env!("CARGO_PKG_NAME");
        let app_version = env!("CARGO_PKG_VERSION");

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));

        // `/` and `;` delimit the product tokens.
        let illegal_chars = |chr| chr == '/' || chr == ';';
        let os_version = if os_version.is_empty() || os_version.contains(illegal_chars) {
            String::from("0")
        } else {
            os_version
        };

        let user_agent = format!("{app_name}/{app_version} (Rust; {os_name}/{os_version})");
        trace!("user agent: {user_agent}");
        user_agent
    }

    /// Scheme of the state channel URL.
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_url: Url::parse(DISCOVERY_URL).expect("invalid discovery url"),
            secure: true,
            origin: ORIGIN.to_owned(),
            app_name: String::from("Chrome"),
            device_title: String::from("Chrome Browser"),
            device_id_length: 16,
            handshake_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_frame_size: 1024 * 1024,
            catalog_url: Url::parse(CATALOG_URL).expect("invalid catalog url"),
            user_agent: Self::default_user_agent(),
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            static_dir: PathBuf::from("./static"),
        }
    }
}
