//! Session configuration types.

use crate::types::AuthMechanism;
use std::time::Duration;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption. **Not recommended outside trusted networks.**
    #[default]
    None,
    /// Start with plaintext, upgrade with STARTTLS before authenticating.
    StartTls,
    /// TLS from the start (port 465).
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }

    /// Returns the conventional security mode for a port.
    #[must_use]
    pub const fn for_port(port: u16) -> Self {
        match port {
            465 => Self::Implicit,
            587 => Self::StartTls,
            _ => Self::None,
        }
    }

    /// Parses a security mode name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "NONE" | "PLAIN" => Some(Self::None),
            "STARTTLS" | "START_TLS" => Some(Self::StartTls),
            "TLS" | "SSL" | "IMPLICIT" => Some(Self::Implicit),
            _ => None,
        }
    }
}

/// Mechanisms enabled when none are configured explicitly.
pub const DEFAULT_MECHANISMS: [AuthMechanism; 5] = [
    AuthMechanism::Plain,
    AuthMechanism::Login,
    AuthMechanism::CramMd5,
    AuthMechanism::XOAuth2,
    AuthMechanism::OAuthBearer,
];

/// SMTP session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Hostname sent with EHLO/HELO.
    pub client_hostname: String,
    /// Connection timeout (includes the TLS handshake).
    pub connect_timeout: Duration,
    /// Timeout for each read or write.
    pub io_timeout: Duration,
    /// SASL mechanisms the session may use.
    pub mechanisms: Vec<AuthMechanism>,
    /// Check the server certificate against the webpki roots.
    pub verify_peer: bool,
}

impl SessionConfig {
    /// Creates a configuration with the security mode conventional for `port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            security: Security::for_port(port),
            client_hostname: "localhost".to_string(),
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
            mechanisms: DEFAULT_MECHANISMS.to_vec(),
            verify_peer: true,
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder::new(host)
    }

    /// Returns true if `mechanism` is enabled by this configuration.
    #[must_use]
    pub fn allows(&self, mechanism: AuthMechanism) -> bool {
        self.mechanisms.contains(&mechanism)
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    client_hostname: String,
    connect_timeout: Duration,
    io_timeout: Duration,
    mechanisms: Vec<AuthMechanism>,
    verify_peer: bool,
}

impl SessionConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::StartTls,
            client_hostname: "localhost".to_string(),
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
            mechanisms: DEFAULT_MECHANISMS.to_vec(),
            verify_peer: true,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the hostname announced with EHLO.
    #[must_use]
    pub fn client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the enabled SASL mechanisms.
    #[must_use]
    pub fn mechanisms(mut self, mechanisms: impl IntoIterator<Item = AuthMechanism>) -> Self {
        self.mechanisms = mechanisms.into_iter().collect();
        self
    }

    /// Sets whether the server certificate is verified.
    #[must_use]
    pub const fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SessionConfig {
        SessionConfig {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            client_hostname: self.client_hostname,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            mechanisms: self.mechanisms,
            verify_peer: self.verify_peer,
        }
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
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Implicit.default_port(), 465);
    }

    #[test]
    fn test_security_for_port() {
        assert_eq!(Security::for_port(465), Security::Implicit);
        assert_eq!(Security::for_port(587), Security::StartTls);
        assert_eq!(Security::for_port(2525), Security::None);
    }

    #[test]
    fn test_security_parse() {
        assert_eq!(Security::parse("starttls"), Some(Security::StartTls));
        assert_eq!(Security::parse("START_TLS"), Some(Security::StartTls));
        assert_eq!(Security::parse("tls"), Some(Security::Implicit));
        assert_eq!(Security::parse("none"), Some(Security::None));
        assert_eq!(Security::parse("bogus"), None);
    }

    #[test]
    fn test_config_new() {
        let config = SessionConfig::new("smtp.example.com", 587);
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.client_hostname, "localhost");
        assert!(config.allows(AuthMechanism::Plain));
        assert!(config.allows(AuthMechanism::CramMd5));
        assert!(config.verify_peer);
    }

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::builder("smtp.example.com")
            .port(2525)
            .security(Security::None)
            .client_hostname("client.example.com")
            .connect_timeout(Duration::from_secs(5))
            .mechanisms([AuthMechanism::Login])
            .verify_peer(false)
            .build();

        assert_eq!(config.port, 2525);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.client_hostname, "client.example.com");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.mechanisms, vec![AuthMechanism::Login]);
        assert!(!config.verify_peer);
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = SessionConfig::builder("smtp.example.com")
            .security(Security::Implicit)
            .build();

        assert_eq!(config.port, 465);
    }
}
