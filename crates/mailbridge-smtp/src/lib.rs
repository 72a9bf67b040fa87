//! # mailbridge-smtp
//!
//! SMTP submission client (RFC 5321) built around an explicit session state
//! machine.
//!
//! ## Features
//!
//! - **Session state machine**: `Disconnected → Connected → Greeted →
//!   Authenticated → Ready → Submitting → Completed`, with `Failed` reachable
//!   from every non-terminal state; out-of-order calls fail without I/O
//! - **TLS**: implicit TLS (port 465) and STARTTLS, via rustls
//! - **Authentication**: PLAIN, LOGIN, CRAM-MD5, XOAUTH2, OAUTHBEARER, or none
//! - **Extensions**: SIZE, 8BITMIME, AUTH capability checks
//! - **Timeouts and cancellation**: every connect, read and write is bounded
//!   and can be aborted from another task through an [`AbortHandle`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailbridge_smtp::{AuthMethod, Credential, Security, SessionConfig, SmtpSession};
//!
//! #[tokio::main]
//! async fn main() -> mailbridge_smtp::Result<()> {
//!     let config = SessionConfig::builder("smtp.example.com")
//!         .security(Security::StartTls)
//!         .build();
//!     let mut session = SmtpSession::new(config);
//!
//!     let credential = Credential::new("user@example.com", "password", AuthMethod::parse("LOGIN")?);
//!     session.authenticate(&credential).await?;
//!
//!     let message = "From: user@example.com\r\nTo: friend@example.com\r\nSubject: Hi\r\n\r\nHello!\r\n";
//!     let response = session.submit(message).await?;
//!     println!("accepted: {response}");
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Streams, TLS and session configuration
//! - [`parser`]: Reply parser
//! - [`sasl`]: SASL client responses
//! - [`types`]: Addresses, envelopes, credentials, extensions, replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod sasl;
mod session;
pub mod types;

pub use connection::{DEFAULT_MECHANISMS, Security, ServerInfo, SessionConfig, SessionConfigBuilder};
pub use error::{Error, Result};
pub use session::{AbortHandle, SessionState, SmtpSession};
pub use types::{
    Address, AuthMechanism, AuthMethod, Credential, Envelope, Extension, Mailbox, Reply,
    ReplyCode,
};
