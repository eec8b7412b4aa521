//! Discovery reply.

use serde::Deserialize;
use veil::Redact;

use crate::{
    error::{Error, Result},
    protocol,
};

/// Authorizes exactly one state channel connection to `host`.
#[derive(Clone, Redact, PartialEq, Eq)]
pub struct RedirectTicket {
    #[redact]
    pub ticket: String,
    pub host: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRedirect {
    redirect_ticket: Option<String>,
    host: Option<String>,
    session_id: Option<serde_json::Value>,
}

impl RedirectTicket {
    /// Parses the single frame sent by the discovery endpoint.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPayload` if the frame is not a JSON object or lacks
    /// a non-empty `redirect_ticket` or `host`.
    pub fn parse(raw: &str) -> Result<Self> {
        let reply: RawRedirect = protocol::json(raw, "ynison redirect")?;

        let ticket = reply
            .redirect_ticket
            .filter(|ticket| !ticket.is_empty())
            .ok_or_else(|| Error::malformed_payload("redirect reply lacks `redirect_ticket`"))?;
        let host = reply
            .host
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::malformed_payload("redirect reply lacks `host`"))?;

        // Sent as a number or a string depending on the backend version.
        let session_id = reply.session_id.and_then(|id| match id {
            serde_json::Value::String(id) if !id.is_empty() => Some(id),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        });

        Ok(Self {
            ticket,
            host,
            session_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parses_ticket_and_host() {
        let ticket = RedirectTicket::parse(
            r#"{"redirect_ticket": "T1", "host": "h1.example", "session_id": 8372, "keep_alive_params": {}}"#,
        )
        .unwrap();
        assert_eq!(ticket.ticket, "T1");
        assert_eq!(ticket.host, "h1.example");
        assert_eq!(ticket.session_id.as_deref(), Some("8372"));
    }

    #[test]
    fn missing_fields_are_malformed() {
        for raw in [
            r#"{"redirect_ticket": "T1"}"#,
            r#"{"host": "h1.example"}"#,
            r#"{"redirect_ticket": "", "host": "h1.example"}"#,
            r#"{"redirect_ticket": "T1", "host": null}"#,
            "[]",
            "ticket",
        ] {
            let err = RedirectTicket::parse(raw).unwrap_err();
            assert_eq!(err.kind, ErrorKind::MalformedPayload, "reply {raw:?}");
        }
    }

    #[test]
    fn ticket_is_redacted() {
        let ticket = RedirectTicket::parse(r#"{"redirect_ticket": "secret", "host": "h"}"#).unwrap();
        assert!(!format!("{ticket:?}").contains("secret"));
    }
}
