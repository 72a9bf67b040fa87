//! SMTP submission session.
//!
//! `SmtpSession` drives one connection through greeting, authentication and
//! a single message submission, tracking progress in a [`SessionState`].
//! Calls that do not fit the current state fail immediately without touching
//! the network.
//!
//! ## Example
//!
//! ```ignore
//! use mailbridge_smtp::{AuthMethod, Credential, SessionConfig, SmtpSession};
//!
//! let mut session = SmtpSession::new(SessionConfig::new("smtp.example.com", 587));
//! let credential = Credential::new("user@example.com", "secret", AuthMethod::parse("PLAIN")?);
//!
//! let greeting = session.authenticate(&credential).await?;
//! let response = session.submit(raw_message).await?;
//! session.close().await;
//! ```

mod abort;
mod data;
mod state;
mod transport;

pub use abort::AbortHandle;
pub use state::SessionState;

use crate::command::{Body, Command};
use crate::connection::{Security, ServerInfo, SessionConfig};
use crate::error::{Error, Result};
use crate::sasl;
use crate::types::{AuthMechanism, AuthMethod, Credential, Envelope, Reply, ReplyCode};
use std::sync::Arc;
use tokio::sync::watch;
use transport::Transport;

/// Stateful SMTP client for one submission.
#[derive(Debug)]
pub struct SmtpSession {
    config: SessionConfig,
    state: SessionState,
    transport: Option<Transport>,
    server: Option<ServerInfo>,
    abort: Arc<watch::Sender<bool>>,
}

impl SmtpSession {
    /// Creates a session. No connection is made until [`authenticate`](Self::authenticate).
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Disconnected,
            transport: None,
            server: None,
            abort: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the server greeting and capabilities once greeted.
    #[must_use]
    pub const fn server_info(&self) -> Option<&ServerInfo> {
        self.server.as_ref()
    }

    /// Returns the hostname announced with EHLO.
    #[must_use]
    pub fn source_hostname(&self) -> &str {
        &self.config.client_hostname
    }

    /// Sets the hostname announced with EHLO.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for an empty hostname or one
    /// containing whitespace, and [`Error::InvalidState`] once the session
    /// has been greeted.
    pub fn set_source_hostname(&mut self, hostname: impl Into<String>) -> Result<()> {
        let hostname = hostname.into();
        if hostname.is_empty() || hostname.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::InvalidConfiguration(format!(
                "invalid source hostname {hostname:?}"
            )));
        }
        if !matches!(self.state, SessionState::Disconnected) {
            return Err(Error::InvalidState(format!(
                "source hostname is fixed once the session is {}",
                self.state
            )));
        }
        self.config.client_hostname = hostname;
        Ok(())
    }

    /// Returns true if the server certificate is checked during TLS
    /// negotiation.
    #[must_use]
    pub const fn verify_peer(&self) -> bool {
        self.config.verify_peer
    }

    /// Enables or disables server certificate verification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] once the session has left
    /// `Disconnected`.
    pub fn set_verify_peer(&mut self, verify: bool) -> Result<()> {
        if !matches!(self.state, SessionState::Disconnected) {
            return Err(Error::InvalidState(format!(
                "TLS options are fixed once the session is {}",
                self.state
            )));
        }
        if !verify {
            tracing::warn!(host = %self.config.host, "Server certificate verification disabled");
        }
        self.config.verify_peer = verify;
        Ok(())
    }

    /// Returns a handle that aborts in-flight I/O from another task.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle::new(Arc::clone(&self.abort))
    }

    /// Connects, greets the server and authenticates.
    ///
    /// Returns the server's greeting banner.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyAuthenticated`] or [`Error::InvalidState`] if the
    ///   state does not allow authentication.
    /// - [`Error::UnsupportedAuthMethod`] if the method is not enabled (checked
    ///   before connecting) or not offered by the server.
    /// - [`Error::Authentication`] if the server rejects the greeting
    ///   exchange or the credentials.
    /// - Transport errors on connection failure, timeout or abort.
    ///
    /// Any failure after the connection attempt starts leaves the session
    /// [`Failed`](SessionState::Failed).
    pub async fn authenticate(&mut self, credential: &Credential) -> Result<String> {
        if self.state.is_authenticated() {
            return Err(Error::AlreadyAuthenticated);
        }
        if self.state != SessionState::Disconnected {
            return Err(Error::InvalidState(format!(
                "cannot authenticate a session that is {}",
                self.state
            )));
        }
        if let Some(mechanism) = credential.method.mechanism() {
            if !self.config.allows(mechanism) {
                return Err(Error::UnsupportedAuthMethod(credential.method.to_string()));
            }
        }

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            method = %credential.method,
            "Authenticating"
        );

        match self.run_authentication(credential).await {
            Ok(greeting) => {
                self.state = SessionState::Authenticated;
                tracing::info!(username = %credential.username, "Authenticated");
                Ok(greeting)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Submits a raw RFC 5322 message, deriving the envelope from its
    /// `Sender`/`From`, `To`, `Cc` and `Bcc` headers.
    ///
    /// Returns the text of the server's final reply.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthRequired`] or [`Error::InvalidState`] if the session is
    ///   not authenticated or already used.
    /// - [`Error::InvalidAddress`] if the envelope cannot be derived.
    /// - [`Error::MessageTooLarge`] if the server's SIZE limit is exceeded.
    /// - [`Error::Submission`] if the server rejects the sender, a recipient
    ///   or the data; transport errors on I/O failure.
    pub async fn submit(&mut self, raw: &str) -> Result<String> {
        self.check_can_submit()?;
        let envelope = Envelope::from_message(raw)?;
        self.submit_with_envelope(&envelope, raw).await
    }

    /// Submits a raw message with an explicit envelope.
    ///
    /// # Errors
    ///
    /// As for [`submit`](Self::submit), minus envelope derivation.
    pub async fn submit_with_envelope(&mut self, envelope: &Envelope, raw: &str) -> Result<String> {
        self.check_can_submit()?;

        let payload = data::prepare(raw);
        let server = self
            .server
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no server information".into()))?;

        if let Some(limit) = server.max_message_size() {
            if payload.len() > limit {
                return Err(Error::MessageTooLarge {
                    size: payload.len(),
                    limit,
                });
            }
        }

        let body = (!raw.is_ascii() && server.supports_8bitmime()).then_some(Body::EightBitMime);
        let size = server.supports_size().then_some(payload.len());

        tracing::info!(
            from = %envelope.sender(),
            recipients = envelope.recipients().len(),
            bytes = payload.len(),
            "Submitting message"
        );

        match self.run_transaction(envelope, body, size, &payload).await {
            Ok(response) => {
                self.state = SessionState::Completed;
                tracing::info!(response = %response, "Message accepted");
                Ok(response)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Sends QUIT (best effort) and drops the connection.
    ///
    /// A non-terminal session returns to `Disconnected`; `Completed` and
    /// `Failed` are kept.
    pub async fn quit(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            match transport.command(&Command::Quit).await {
                Ok(reply) if !reply.is(ReplyCode::CLOSING) => {
                    tracing::debug!(code = reply.code.as_u16(), "Unexpected reply to QUIT");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(?e, "QUIT failed"),
            }
        }
        self.server = None;
        if !self.state.is_terminal() {
            self.state = SessionState::Disconnected;
        }
    }

    /// Returns the session to `Disconnected` from any state, closing the
    /// connection and clearing a fired abort.
    pub async fn reset(&mut self) {
        self.quit().await;
        self.state = SessionState::Disconnected;
        self.abort.send_replace(false);
        tracing::debug!("Session reset");
    }

    /// Sends QUIT and closes the connection.
    pub async fn close(mut self) {
        self.quit().await;
    }

    fn check_can_submit(&self) -> Result<()> {
        match self.state {
            SessionState::Authenticated => Ok(()),
            SessionState::Disconnected | SessionState::Connected | SessionState::Greeted => {
                Err(Error::AuthRequired)
            }
            SessionState::Ready | SessionState::Submitting => Err(Error::InvalidState(
                "a submission is already in progress".into(),
            )),
            SessionState::Completed | SessionState::Failed => Err(Error::InvalidState(format!(
                "session is {}; reset it before submitting again",
                self.state
            ))),
        }
    }

    /// Marks the session failed and drops the connection.
    fn fail(&mut self, error: Error) -> Error {
        tracing::warn!(
            ?error,
            state = %self.state,
            transient = error.is_transient(),
            "Session failed"
        );
        self.transport = None;
        self.state = SessionState::Failed;
        error
    }

    async fn run_authentication(&mut self, credential: &Credential) -> Result<String> {
        let mut transport = Transport::open(&self.config, self.abort.subscribe()).await?;
        self.state = SessionState::Connected;

        let greeting = transport.read_reply().await?;
        if !greeting.is(ReplyCode::SERVICE_READY) {
            return Err(auth_error(&greeting));
        }
        let mut server = ServerInfo::from_greeting(&greeting);
        hello(&mut transport, &self.config.client_hostname, &mut server).await?;

        let wants_tls = self.config.security == Security::StartTls
            || credential.method == AuthMethod::StartTlsLogin;
        if wants_tls && !transport.is_tls() {
            if !server.supports_starttls() {
                return Err(Error::NotSupported("STARTTLS".into()));
            }
            let reply = transport.command(&Command::StartTls).await?;
            if !reply.is(ReplyCode::SERVICE_READY) {
                return Err(auth_error(&reply));
            }
            transport = transport
                .upgrade(&self.config.host, self.config.verify_peer)
                .await?;
            tracing::debug!("TLS established");
            hello(&mut transport, &self.config.client_hostname, &mut server).await?;
        }

        self.state = SessionState::Greeted;
        let greeting = server.greeting.clone();
        let advertised = server.auth_mechanisms().map(<[AuthMechanism]>::to_vec);
        self.server = Some(server);

        if let Some(mechanism) = credential.method.mechanism() {
            if advertised.is_some_and(|offered| !offered.contains(&mechanism)) {
                return Err(Error::UnsupportedAuthMethod(format!(
                    "{mechanism} is not offered by the server"
                )));
            }
            sasl_exchange(&mut transport, mechanism, credential).await?;
        }

        self.transport = Some(transport);
        Ok(greeting)
    }

    async fn run_transaction(
        &mut self,
        envelope: &Envelope,
        body: Option<Body>,
        size: Option<usize>,
        payload: &str,
    ) -> Result<String> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| Error::InvalidState("not connected".into()))?;

        let reply = transport
            .command(&Command::MailFrom {
                from: envelope.sender().clone(),
                body,
                size,
            })
            .await?;
        expect_success(&reply)?;

        for rcpt in envelope.recipients() {
            let reply = transport
                .command(&Command::RcptTo { to: rcpt.clone() })
                .await?;
            expect_success(&reply)?;
        }
        self.state = SessionState::Ready;

        let reply = transport.command(&Command::Data).await?;
        if !reply.is(ReplyCode::START_DATA) {
            return Err(submission_error(&reply));
        }
        self.state = SessionState::Submitting;

        transport.write(payload.as_bytes()).await?;
        let reply = transport.read_reply().await?;
        expect_success(&reply)?;

        Ok(reply.message_text())
    }
}

/// Sends EHLO, falling back to HELO when EHLO is not recognized.
async fn hello(transport: &mut Transport, hostname: &str, server: &mut ServerInfo) -> Result<()> {
    let reply = transport
        .command(&Command::Ehlo {
            hostname: hostname.to_string(),
        })
        .await?;
    if reply.is_success() {
        server.set_extensions(&reply);
        return Ok(());
    }
    if !(reply.is(ReplyCode::SYNTAX_ERROR) || reply.is(ReplyCode::NOT_IMPLEMENTED)) {
        return Err(auth_error(&reply));
    }

    tracing::debug!(code = reply.code.as_u16(), "EHLO rejected, trying HELO");
    let reply = transport
        .command(&Command::Helo {
            hostname: hostname.to_string(),
        })
        .await?;
    if !reply.is_success() {
        return Err(auth_error(&reply));
    }
    server.extensions.clear();
    Ok(())
}

/// Runs the AUTH exchange for `mechanism`.
async fn sasl_exchange(
    transport: &mut Transport,
    mechanism: AuthMechanism,
    credential: &Credential,
) -> Result<()> {
    let initial_response = sasl::initial_response(mechanism, credential);
    let mut reply = transport
        .command(&Command::Auth {
            mechanism,
            initial_response: initial_response.clone(),
        })
        .await?;

    match mechanism {
        AuthMechanism::Login => {
            let mut answers = [
                sasl::encode(&credential.username),
                sasl::encode(&credential.password),
            ]
            .into_iter();
            while reply.is(ReplyCode::AUTH_CONTINUE) {
                let Some(answer) = answers.next() else { break };
                reply = transport.command(&Command::SaslResponse(answer)).await?;
            }
        }
        AuthMechanism::Plain => {
            // Server ignored the initial response and asks for it again
            if reply.is(ReplyCode::AUTH_CONTINUE) {
                let answer = initial_response.unwrap_or_default();
                reply = transport.command(&Command::SaslResponse(answer)).await?;
            }
        }
        AuthMechanism::XOAuth2 | AuthMechanism::OAuthBearer => {
            // 334 carries an error document; an empty line ends the exchange
            if reply.is(ReplyCode::AUTH_CONTINUE) {
                let detail = reply
                    .message
                    .first()
                    .and_then(|c| sasl::decode_challenge(c))
                    .unwrap_or_default();
                tracing::debug!(detail = %detail, "OAuth challenge");
                reply = transport
                    .command(&Command::SaslResponse(String::new()))
                    .await?;
            }
        }
        AuthMechanism::CramMd5 => {
            if reply.is(ReplyCode::AUTH_CONTINUE) {
                let challenge = reply.message.first().map_or("", String::as_str);
                let answer =
                    sasl::cram_md5_response(&credential.username, &credential.password, challenge)?;
                reply = transport.command(&Command::SaslResponse(answer)).await?;
            }
        }
    }

    if reply.is_success() {
        Ok(())
    } else {
        Err(auth_error(&reply))
    }
}

fn auth_error(reply: &Reply) -> Error {
    Error::authentication(reply.code.as_u16(), reply.message_text())
}

fn submission_error(reply: &Reply) -> Error {
    Error::submission(reply.code.as_u16(), reply.message_text())
}

fn expect_success(reply: &Reply) -> Result<()> {
    if reply.is_success() {
        Ok(())
    } else {
        Err(submission_error(reply))
    }
}
