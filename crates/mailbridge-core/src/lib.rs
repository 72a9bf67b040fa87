//! # mailbridge-core
//!
//! JSON request/response boundary over the `mailbridge` codec and SMTP
//! session.
//!
//! This crate provides:
//! - Request decoding, with argument type checks at the edge
//! - Dispatch to the 7bit/8bit codec and to registered SMTP sessions
//! - Response encoding with a stable `error.kind`
//! - Configuration file loading
//!
//! ```ignore
//! use mailbridge_core::{Bridge, BridgeConfig};
//!
//! let bridge = Bridge::new(BridgeConfig::default())?;
//! let response = bridge
//!     .handle_line(r#"{"id":1,"op":"encode","encoding":"7bit","text":"hello"}"#)
//!     .await;
//! println!("{}", response.to_line());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod bridge;
pub mod config;
mod error;
pub mod request;
pub mod response;

pub use bridge::Bridge;
pub use config::{BridgeConfig, LinePolicyConfig, SmtpDefaults};
pub use error::{Error, Result};
pub use request::{PolicyArgs, Request, SessionId};
pub use response::{ErrorBody, Response};
