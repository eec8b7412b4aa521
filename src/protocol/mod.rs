//! Wire types for the services this crate talks to.
//!
//! # Submodules
//!
//! * [`ynison`] - session protocol: device identity, state envelopes,
//!   commands and their codec
//! * [`catalog`] - catalog REST API responses
//!
//! # Shared Functionality
//!
//! [`json`] parses a response body with consistent logging, so that every
//! endpoint reports parse failures the same way.

pub mod catalog;
pub mod ynison;

use crate::error::Result;
use serde::{Deserialize, Deserializer};
use std::fmt::Debug;

/// Parses and logs JSON responses.
///
/// # Arguments
///
/// * `body` - Response body text to parse
/// * `origin` - Description of the endpoint for logging
///
/// # Errors
///
/// Returns `MalformedPayload` if the body is not valid JSON or does not
/// match `T`.
///
/// # Logging
///
/// * Success: Logs parsed structure at TRACE level
/// * Parse Error: Logs raw JSON at TRACE level if valid JSON
/// * Invalid JSON: Logs error and raw text at ERROR level
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{origin}: {result:#?}");
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{origin}: {json:#?}");
            } else {
                error!("{origin}: failed parsing response ({e:?})");
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}

/// Deserializes an identifier sent as either a string or a number.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        String(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::String(id) => id,
        Id::Unsigned(id) => id.to_string(),
        Id::Signed(id) => id.to_string(),
    })
}
