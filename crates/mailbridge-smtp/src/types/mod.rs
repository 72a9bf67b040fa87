//! Core SMTP types.

mod address;
mod credential;
mod envelope;
mod extension;
mod reply;

pub use address::{Address, Mailbox};
pub use credential::{AuthMethod, Credential};
pub use envelope::{Envelope, parse_address_list};
pub use extension::{AuthMechanism, Extension};
pub use reply::{Reply, ReplyCode};
