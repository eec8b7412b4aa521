//! OAuth token used on both handshakes and for catalog requests.
//!
//! The token is redacted from debug output. It can be parsed from a string
//! or loaded from a small TOML secrets file:
//!
//! ```toml
//! token = "y0_AgAAAA..."
//! ```

use std::{fs, path::Path, str::FromStr};

use veil::Redact;

use crate::error::{Error, Result};

#[derive(Clone, PartialEq, Eq, Hash, Redact)]
#[redact(all)]
pub struct Token(String);

impl Token {
    /// Value shipped in example configurations.
    const PLACEHOLDER: &'static str = "<your token>";

    /// Largest secrets file that will be read.
    const MAX_FILE_SIZE: u64 = 1024;

    /// Creates a validated token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the token is empty, still the placeholder,
    /// or contains whitespace or control characters (it ends up in header
    /// values).
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::invalid_argument("token is empty"));
        }
        if token == Self::PLACEHOLDER {
            return Err(Error::invalid_argument("token is still the placeholder"));
        }
        if token.contains(|chr: char| chr.is_whitespace() || chr.is_control()) {
            return Err(Error::invalid_argument(
                "token contains whitespace or control characters",
            ));
        }

        Ok(Self(token))
    }

    /// Loads the token from the `token` key of a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is too large, is not
    /// valid TOML, or holds no valid token.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Prevent out-of-memory condition: secrets file should be small.
        let file_size = fs::metadata(path)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::invalid_argument(format!(
                "{} is too large ({file_size} bytes)",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        let value = contents.parse::<toml::Table>()?;
        match value.get("token").and_then(toml::Value::as_str) {
            Some(token) => Self::new(token),
            None => Err(Error::invalid_argument(format!(
                "{} does not contain a token",
                path.display()
            ))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn rejects_unusable_tokens() {
        for token in ["", "<your token>", "two words", "tab\there"] {
            let err = Token::new(token).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidArgument, "{token:?}");
        }
    }

    #[test]
    fn parsing_trims() {
        let token: Token = "  y0_secret\n".parse().unwrap();
        assert_eq!(token.as_str(), "y0_secret");
    }

    #[test]
    fn debug_is_redacted() {
        let token = Token::new("y0_secret").unwrap();
        assert!(!format!("{token:?}").contains("y0_secret"));
    }

    #[test]
    fn loads_from_toml() {
        let path = std::env::temp_dir().join(format!("ynison-token-{}.toml", fastrand::u64(..)));
        fs::write(&path, "token = \"y0_from_file\"\n").unwrap();
        let token = Token::from_file(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(token.unwrap().as_str(), "y0_from_file");
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = Token::from_file("/nonexistent/ynison/secrets.toml").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
