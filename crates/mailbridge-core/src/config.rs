//! Bridge configuration.
//!
//! Loaded once from a JSON file; every field is optional.
//!
//! ```json
//! {
//!   "linePolicy": { "firstLineMaxLength": 78, "continuationLineMaxLength": 78 },
//!   "smtp": {
//!     "security": "STARTTLS",
//!     "clientHostname": "client.example.com",
//!     "connectTimeoutMs": 30000,
//!     "ioTimeoutMs": 60000,
//!     "mechanisms": ["PLAIN", "LOGIN"],
//!     "verifyPeer": true
//!   }
//! }
//! ```

use crate::error::{Error, Result};
use mailbridge_mime::LinePolicy;
use mailbridge_smtp::{AuthMechanism, DEFAULT_MECHANISMS, Security, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Line policy used when a request gives no lengths.
    pub line_policy: LinePolicyConfig,
    /// Defaults for new SMTP sessions.
    pub smtp: SmtpDefaults,
}

/// Line length limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinePolicyConfig {
    /// Limit for the first line of each paragraph.
    pub first_line_max_length: i64,
    /// Limit for lines after a fold.
    pub continuation_line_max_length: i64,
}

impl Default for LinePolicyConfig {
    fn default() -> Self {
        let policy = LinePolicy::default();
        Self {
            first_line_max_length: i64::try_from(policy.first_line_max()).unwrap_or(i64::MAX),
            continuation_line_max_length: i64::try_from(policy.continuation_line_max())
                .unwrap_or(i64::MAX),
        }
    }
}

/// Session settings applied to every `smtp.open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmtpDefaults {
    /// `NONE`, `STARTTLS` or `TLS`; unset picks by port.
    pub security: Option<String>,
    /// Hostname announced with EHLO.
    pub client_hostname: String,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Per-read/write timeout in milliseconds.
    pub io_timeout_ms: u64,
    /// Enabled SASL mechanism names.
    pub mechanisms: Vec<String>,
    /// Verify server certificates during TLS negotiation.
    pub verify_peer: bool,
}

impl Default for SmtpDefaults {
    fn default() -> Self {
        Self {
            security: None,
            client_hostname: "localhost".to_string(),
            connect_timeout_ms: 30_000,
            io_timeout_ms: 60_000,
            mechanisms: DEFAULT_MECHANISMS
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
            verify_peer: true,
        }
    }
}

impl BridgeConfig {
    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// holds out-of-range values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parses and validates configuration JSON.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or out-of-range values.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value can be turned into its typed form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] or the codec's configuration
    /// error for the first bad value.
    pub fn validate(&self) -> Result<()> {
        self.line_policy()?;
        self.smtp.security()?;
        self.smtp.mechanisms()?;
        if self.smtp.connect_timeout_ms == 0 || self.smtp.io_timeout_ms == 0 {
            return Err(Error::configuration("SMTP timeouts must be positive"));
        }
        if self.smtp.client_hostname.trim().is_empty() {
            return Err(Error::configuration("clientHostname must not be empty"));
        }
        Ok(())
    }

    /// Returns the default line policy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a length is not positive.
    pub fn line_policy(&self) -> Result<LinePolicy> {
        Ok(LinePolicy::from_signed(
            self.line_policy.first_line_max_length,
            self.line_policy.continuation_line_max_length,
        )?)
    }

    /// Builds a session configuration from the defaults and per-request
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for an unknown security name or
    /// mechanism.
    pub fn session_config(
        &self,
        host: &str,
        port: u16,
        security: Option<Security>,
        timeout: Option<Duration>,
        verify_peer: Option<bool>,
    ) -> Result<SessionConfig> {
        let security = match security {
            Some(security) => security,
            None => self.smtp.security()?.unwrap_or_else(|| Security::for_port(port)),
        };
        let connect_timeout =
            timeout.unwrap_or_else(|| Duration::from_millis(self.smtp.connect_timeout_ms));
        let io_timeout = timeout.unwrap_or_else(|| Duration::from_millis(self.smtp.io_timeout_ms));

        Ok(SessionConfig::builder(host)
            .port(port)
            .security(security)
            .client_hostname(self.smtp.client_hostname.clone())
            .connect_timeout(connect_timeout)
            .io_timeout(io_timeout)
            .mechanisms(self.smtp.mechanisms()?)
            .verify_peer(verify_peer.unwrap_or(self.smtp.verify_peer))
            .build())
    }
}

impl SmtpDefaults {
    fn security(&self) -> Result<Option<Security>> {
        self.security
            .as_deref()
            .map(|name| {
                Security::parse(name)
                    .ok_or_else(|| Error::configuration(format!("unknown security mode {name:?}")))
            })
            .transpose()
    }

    fn mechanisms(&self) -> Result<Vec<AuthMechanism>> {
        self.mechanisms
            .iter()
            .map(|name| {
                AuthMechanism::parse(name)
                    .ok_or_else(|| Error::configuration(format!("unknown SASL mechanism {name:?}")))
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = BridgeConfig::from_json("{}").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.line_policy().unwrap(), LinePolicy::RECOMMENDED);
        assert_eq!(config.smtp.client_hostname, "localhost");
    }

    #[test]
    fn test_partial_override() {
        let config = BridgeConfig::from_json(
            r#"{"linePolicy": {"firstLineMaxLength": 998}, "smtp": {"ioTimeoutMs": 500}}"#,
        )
        .unwrap();
        let policy = config.line_policy().unwrap();
        assert_eq!(policy.first_line_max(), 998);
        assert_eq!(policy.continuation_line_max(), 78);
        assert_eq!(config.smtp.connect_timeout_ms, 30_000);
        assert_eq!(config.smtp.io_timeout_ms, 500);
    }

    #[test]
    fn test_invalid_values() {
        let err = BridgeConfig::from_json(r#"{"linePolicy": {"firstLineMaxLength": 0}}"#)
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidConfiguration");

        let err = BridgeConfig::from_json(r#"{"smtp": {"security": "maybe"}}"#).unwrap_err();
        assert_eq!(err.kind(), "InvalidConfiguration");

        let err =
            BridgeConfig::from_json(r#"{"smtp": {"mechanisms": ["PLAIN", "NTLM"]}}"#).unwrap_err();
        assert!(err.to_string().contains("NTLM"));

        let err = BridgeConfig::from_json(r#"{"smtp": {"ioTimeoutMs": 0}}"#).unwrap_err();
        assert_eq!(err.kind(), "InvalidConfiguration");

        assert!(BridgeConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_session_config_overrides() {
        let config = BridgeConfig::from_json(
            r#"{"smtp": {"clientHostname": "me.example.com", "mechanisms": ["LOGIN"]}}"#,
        )
        .unwrap();

        let session = config
            .session_config("smtp.example.com", 465, None, None, None)
            .unwrap();
        assert_eq!(session.security, Security::Implicit);
        assert_eq!(session.client_hostname, "me.example.com");
        assert_eq!(session.mechanisms, vec![AuthMechanism::Login]);
        assert_eq!(session.io_timeout, Duration::from_secs(60));
        assert!(session.verify_peer);

        let session = config
            .session_config(
                "smtp.example.com",
                2525,
                Some(Security::StartTls),
                Some(Duration::from_secs(2)),
                Some(false),
            )
            .unwrap();
        assert_eq!(session.port, 2525);
        assert_eq!(session.security, Security::StartTls);
        assert_eq!(session.connect_timeout, Duration::from_secs(2));
        assert_eq!(session.io_timeout, Duration::from_secs(2));
        assert!(!session.verify_peer);
    }

    #[test]
    fn test_verify_peer_default_from_file() {
        let config = BridgeConfig::from_json(r#"{"smtp": {"verifyPeer": false}}"#).unwrap();
        assert!(!config.smtp.verify_peer);

        let session = config
            .session_config("smtp.example.com", 465, None, None, None)
            .unwrap();
        assert!(!session.verify_peer);

        let session = config
            .session_config("smtp.example.com", 465, None, None, Some(true))
            .unwrap();
        assert!(session.verify_peer);
    }
}
