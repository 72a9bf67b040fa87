//! Request decoding.
//!
//! Requests arrive as untyped JSON; this module is the only place where a
//! value's JSON type is checked. Everything past it works with typed values.

use crate::error::{Error, Result};
use mailbridge_mime::TransferEncoding;
use mailbridge_smtp::{AuthMethod, Credential, Security};
use serde_json::{Map, Value};
use std::time::Duration;

/// Session handle returned by `smtp.open`.
pub type SessionId = u64;

/// Line lengths given with an encode or decode request; unset values fall
/// back to the configured policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyArgs {
    /// `firstLineMaxLength`
    pub first_line_max: Option<i64>,
    /// `continuationLineMaxLength`
    pub continuation_line_max: Option<i64>,
}

/// A decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `encode`
    Encode {
        /// Transfer encoding.
        encoding: TransferEncoding,
        /// Line lengths.
        policy: PolicyArgs,
        /// Text to encode.
        text: String,
    },
    /// `decode`
    Decode {
        /// Transfer encoding.
        encoding: TransferEncoding,
        /// Line lengths.
        policy: PolicyArgs,
        /// Encoded lines.
        lines: Vec<String>,
    },
    /// `smtp.open`
    Open {
        /// Server host.
        host: String,
        /// Server port.
        port: u16,
        /// Security override.
        security: Option<Security>,
        /// Connect and I/O timeout override.
        timeout: Option<Duration>,
        /// Certificate verification override.
        verify_peer: Option<bool>,
    },
    /// `smtp.authenticate`
    Authenticate {
        /// Target session.
        session: SessionId,
        /// Credentials and method.
        credential: Credential,
    },
    /// `smtp.submit`
    Submit {
        /// Target session.
        session: SessionId,
        /// Complete RFC 5322 message.
        raw_message: String,
    },
    /// `smtp.setSourceHostname`
    SetSourceHostname {
        /// Target session.
        session: SessionId,
        /// EHLO hostname.
        hostname: String,
    },
    /// `smtp.getSourceHostname`
    GetSourceHostname {
        /// Target session.
        session: SessionId,
    },
    /// `smtp.setSslOptions`
    SetSslOptions {
        /// Target session.
        session: SessionId,
        /// Verify the server certificate.
        verify_peer: bool,
    },
    /// `smtp.state`
    State {
        /// Target session.
        session: SessionId,
    },
    /// `smtp.abort`
    Abort {
        /// Target session.
        session: SessionId,
    },
    /// `smtp.reset`
    Reset {
        /// Target session.
        session: SessionId,
    },
    /// `smtp.close`
    Close {
        /// Target session.
        session: SessionId,
    },
}

impl Request {
    /// Decodes a request object.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgumentType`] for a non-object request, an unknown
    ///   `op`, or a field with the wrong JSON type (naming the field, and for
    ///   arrays the offending index).
    /// - [`Error::InvalidConfiguration`] for in-type values out of range.
    /// - The SMTP `UnsupportedAuthMethod` error for an unknown `authMethod`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::argument(format!("request must be an object, found {}", type_name(value))))?;
        let args = Args(obj);
        let op = args.string("op")?;

        match op.as_str() {
            "encode" => Ok(Self::Encode {
                encoding: args.encoding()?,
                policy: args.policy()?,
                text: args.string("text")?,
            }),
            "decode" => Ok(Self::Decode {
                encoding: args.encoding()?,
                policy: args.policy()?,
                lines: args.string_array("lines")?,
            }),
            "smtp.open" => Ok(Self::Open {
                host: args.string("host")?,
                port: args.port()?,
                security: args.security()?,
                timeout: args.timeout()?,
                verify_peer: args.optional_bool("verifyPeer")?,
            }),
            "smtp.authenticate" => Ok(Self::Authenticate {
                session: args.session()?,
                credential: Credential::new(
                    args.string("username")?,
                    args.string("password")?,
                    AuthMethod::parse(&args.string("authMethod")?)?,
                ),
            }),
            "smtp.submit" => Ok(Self::Submit {
                session: args.session()?,
                raw_message: args.string("rawMessage")?,
            }),
            "smtp.setSourceHostname" => Ok(Self::SetSourceHostname {
                session: args.session()?,
                hostname: args.string("hostname")?,
            }),
            "smtp.getSourceHostname" => Ok(Self::GetSourceHostname {
                session: args.session()?,
            }),
            "smtp.setSslOptions" => Ok(Self::SetSslOptions {
                session: args.session()?,
                verify_peer: args.bool("verifyPeer")?,
            }),
            "smtp.state" => Ok(Self::State {
                session: args.session()?,
            }),
            "smtp.abort" => Ok(Self::Abort {
                session: args.session()?,
            }),
            "smtp.reset" => Ok(Self::Reset {
                session: args.session()?,
            }),
            "smtp.close" => Ok(Self::Close {
                session: args.session()?,
            }),
            other => Err(Error::argument(format!("unknown op {other:?}"))),
        }
    }

    /// Returns the op name.
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Encode { .. } => "encode",
            Self::Decode { .. } => "decode",
            Self::Open { .. } => "smtp.open",
            Self::Authenticate { .. } => "smtp.authenticate",
            Self::Submit { .. } => "smtp.submit",
            Self::SetSourceHostname { .. } => "smtp.setSourceHostname",
            Self::GetSourceHostname { .. } => "smtp.getSourceHostname",
            Self::SetSslOptions { .. } => "smtp.setSslOptions",
            Self::State { .. } => "smtp.state",
            Self::Abort { .. } => "smtp.abort",
            Self::Reset { .. } => "smtp.reset",
            Self::Close { .. } => "smtp.close",
        }
    }
}

/// JSON type name for error messages.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Typed accessors over a request object.
struct Args<'a>(&'a Map<String, Value>);

impl Args<'_> {
    /// Returns a present, non-null field.
    fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    fn string(&self, name: &str) -> Result<String> {
        match self.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(Error::argument(format!(
                "`{name}` must be a string, found {}",
                type_name(other)
            ))),
            None => Err(Error::argument(format!("`{name}` is required and must be a string"))),
        }
    }

    fn optional_string(&self, name: &str) -> Result<Option<String>> {
        if self.get(name).is_none() {
            return Ok(None);
        }
        self.string(name).map(Some)
    }

    fn string_array(&self, name: &str) -> Result<Vec<String>> {
        let items = match self.get(name) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(Error::argument(format!(
                    "`{name}` must be an array of strings, found {}",
                    type_name(other)
                )));
            }
            None => {
                return Err(Error::argument(format!(
                    "`{name}` is required and must be an array of strings"
                )));
            }
        };

        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(Error::argument(format!(
                    "`{name}[{i}]` must be a string, found {}",
                    type_name(other)
                ))),
            })
            .collect()
    }

    fn optional_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(Error::argument(format!(
                "`{name}` must be a boolean, found {}",
                type_name(other)
            ))),
        }
    }

    fn bool(&self, name: &str) -> Result<bool> {
        self.optional_bool(name)?
            .ok_or_else(|| Error::argument(format!("`{name}` is required and must be a boolean")))
    }

    fn optional_int(&self, name: &str) -> Result<Option<i64>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| {
                Error::argument(format!("`{name}` must be an integer, found {n}"))
            }),
            Some(other) => Err(Error::argument(format!(
                "`{name}` must be an integer, found {}",
                type_name(other)
            ))),
        }
    }

    fn int(&self, name: &str) -> Result<i64> {
        self.optional_int(name)?
            .ok_or_else(|| Error::argument(format!("`{name}` is required and must be an integer")))
    }

    fn encoding(&self) -> Result<TransferEncoding> {
        let name = self.string("encoding")?;
        TransferEncoding::parse(&name).ok_or_else(|| {
            Error::argument(format!("`encoding` must be \"7bit\" or \"8bit\", found {name:?}"))
        })
    }

    fn policy(&self) -> Result<PolicyArgs> {
        Ok(PolicyArgs {
            first_line_max: self.optional_int("firstLineMaxLength")?,
            continuation_line_max: self.optional_int("continuationLineMaxLength")?,
        })
    }

    fn port(&self) -> Result<u16> {
        let port = self.int("port")?;
        u16::try_from(port)
            .ok()
            .filter(|&p| p > 0)
            .ok_or_else(|| Error::configuration(format!("`port` must be between 1 and 65535, found {port}")))
    }

    fn security(&self) -> Result<Option<Security>> {
        self.optional_string("security")?
            .map(|name| {
                Security::parse(&name)
                    .ok_or_else(|| Error::configuration(format!("unknown security mode {name:?}")))
            })
            .transpose()
    }

    fn timeout(&self) -> Result<Option<Duration>> {
        self.optional_int("timeoutMs")?
            .map(|ms| {
                u64::try_from(ms)
                    .ok()
                    .filter(|&ms| ms > 0)
                    .map(Duration::from_millis)
                    .ok_or_else(|| Error::configuration(format!("`timeoutMs` must be positive, found {ms}")))
            })
            .transpose()
    }

    fn session(&self) -> Result<SessionId> {
        let id = self.int("session")?;
        SessionId::try_from(id)
            .map_err(|_| Error::argument(format!("`session` must be a non-negative integer, found {id}")))
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
    use serde_json::json;

    fn parse(value: Value) -> Result<Request> {
        Request::from_value(&value)
    }

    #[test]
    fn test_encode_request() {
        let request = parse(json!({
            "op": "encode",
            "encoding": "7bit",
            "firstLineMaxLength": 78,
            "text": "hello"
        }))
        .unwrap();

        assert_eq!(
            request,
            Request::Encode {
                encoding: TransferEncoding::SevenBit,
                policy: PolicyArgs {
                    first_line_max: Some(78),
                    continuation_line_max: None,
                },
                text: "hello".to_string(),
            }
        );
        assert_eq!(request.op(), "encode");
    }

    #[test]
    fn test_encode_text_must_be_string() {
        let err = parse(json!({"op": "encode", "encoding": "8bit", "text": 42})).unwrap_err();
        assert_eq!(err.kind(), "InvalidArgumentType");
        assert!(err.to_string().contains("`text` must be a string, found number"));

        let err = parse(json!({"op": "encode", "encoding": "8bit"})).unwrap_err();
        assert_eq!(err.kind(), "InvalidArgumentType");
    }

    #[test]
    fn test_decode_lines_must_be_array() {
        let err = parse(json!({"op": "decode", "encoding": "7bit", "lines": "a\r\nb"})).unwrap_err();
        assert_eq!(err.kind(), "InvalidArgumentType");
        assert!(err.to_string().contains("found string"));
    }

    #[test]
    fn test_decode_names_bad_element() {
        let err = parse(json!({"op": "decode", "encoding": "7bit", "lines": ["a", null, "c"]}))
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidArgumentType");
        assert!(err.to_string().contains("`lines[1]` must be a string, found null"));
    }

    #[test]
    fn test_lengths_must_be_integers() {
        let err = parse(json!({
            "op": "encode",
            "encoding": "7bit",
            "firstLineMaxLength": 7.5,
            "text": "x"
        }))
        .unwrap_err();
        assert_eq!(err.kind(), "InvalidArgumentType");

        let err = parse(json!({
            "op": "encode",
            "encoding": "7bit",
            "continuationLineMaxLength": "78",
            "text": "x"
        }))
        .unwrap_err();
        assert_eq!(err.kind(), "InvalidArgumentType");
    }

    #[test]
    fn test_unknown_op_and_encoding() {
        assert_eq!(
            parse(json!({"op": "explode"})).unwrap_err().kind(),
            "InvalidArgumentType"
        );
        assert_eq!(
            parse(json!({"op": "encode", "encoding": "base64", "text": ""}))
                .unwrap_err()
                .kind(),
            "InvalidArgumentType"
        );
        assert_eq!(parse(json!([1, 2])).unwrap_err().kind(), "InvalidArgumentType");
    }

    #[test]
    fn test_open_request() {
        let request = parse(json!({
            "op": "smtp.open",
            "host": "smtp.example.com",
            "port": 587,
            "timeoutMs": 1500
        }))
        .unwrap();
        assert_eq!(
            request,
            Request::Open {
                host: "smtp.example.com".to_string(),
                port: 587,
                security: None,
                timeout: Some(Duration::from_millis(1500)),
                verify_peer: None,
            }
        );

        let err = parse(json!({"op": "smtp.open", "host": "h", "port": 70000})).unwrap_err();
        assert_eq!(err.kind(), "InvalidConfiguration");
        let err = parse(json!({"op": "smtp.open", "host": "h", "port": 25, "timeoutMs": 0}))
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidConfiguration");
        let err = parse(json!({"op": "smtp.open", "host": "h", "port": "25"})).unwrap_err();
        assert_eq!(err.kind(), "InvalidArgumentType");
    }

    #[test]
    fn test_verify_peer_must_be_boolean() {
        let request = parse(json!({"op": "smtp.open", "host": "h", "port": 465, "verifyPeer": false}))
            .unwrap();
        assert!(matches!(request, Request::Open { verify_peer: Some(false), .. }));

        let err = parse(json!({"op": "smtp.open", "host": "h", "port": 465, "verifyPeer": "no"}))
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidArgumentType");
        assert!(err.to_string().contains("`verifyPeer` must be a boolean, found string"));

        let request = parse(json!({"op": "smtp.setSslOptions", "session": 2, "verifyPeer": true}))
            .unwrap();
        assert_eq!(
            request,
            Request::SetSslOptions {
                session: 2,
                verify_peer: true,
            }
        );
        assert_eq!(request.op(), "smtp.setSslOptions");

        let err = parse(json!({"op": "smtp.setSslOptions", "session": 2})).unwrap_err();
        assert_eq!(err.kind(), "InvalidArgumentType");
    }

    #[test]
    fn test_authenticate_request() {
        let request = parse(json!({
            "op": "smtp.authenticate",
            "session": 1,
            "username": "user",
            "password": "pw",
            "authMethod": "LOGIN"
        }))
        .unwrap();
        let Request::Authenticate { session, credential } = request else {
            panic!("expected authenticate");
        };
        assert_eq!(session, 1);
        assert_eq!(credential.username, "user");

        let err = parse(json!({
            "op": "smtp.authenticate",
            "session": 1,
            "username": "user",
            "password": "pw",
            "authMethod": "KERBEROS"
        }))
        .unwrap_err();
        assert_eq!(err.kind(), "UnsupportedAuthMethod");
    }
}
