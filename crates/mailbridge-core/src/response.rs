//! Response encoding.

use crate::error::Error;
use serde::Serialize;
use serde_json::Value;

/// Error payload of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Error class, e.g. `EncodingError` or `AuthenticationError`.
    pub kind: String,
    /// Human-readable message, including server text for SMTP failures.
    pub message: String,
    /// SMTP reply code, when the server produced the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl From<&Error> for ErrorBody {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            code: error.code(),
        }
    }
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Request id, echoed back unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Operation result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    /// Successful response.
    #[must_use]
    pub const fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    /// Failed response.
    #[must_use]
    pub fn failure(id: Option<Value>, error: &Error) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Renders the response as a single JSON line without the newline.
    #[must_use]
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(?e, "Failed to serialize response");
            r#"{"ok":false,"error":{"kind":"InternalError","message":"response serialization failed"}}"#
                .to_string()
        })
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

    #[test]
    fn test_success_omits_error() {
        let response = Response::success(Some(json!(7)), json!({"state": "Disconnected"}));
        let value: Value = serde_json::from_str(&response.to_line()).unwrap();
        assert_eq!(
            value,
            json!({"id": 7, "ok": true, "result": {"state": "Disconnected"}})
        );
    }

    #[test]
    fn test_failure_carries_code() {
        let error = Error::from(mailbridge_smtp::Error::authentication(535, "5.7.8 bad credentials"));
        let response = Response::failure(None, &error);
        let value: Value = serde_json::from_str(&response.to_line()).unwrap();

        assert_eq!(value["ok"], json!(false));
        assert!(value.get("id").is_none());
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["kind"], json!("AuthenticationError"));
        assert_eq!(value["error"]["code"], json!(535));
        assert!(
            value["error"]["message"]
                .as_str()
                .unwrap()
                .contains("bad credentials")
        );
    }

    #[test]
    fn test_failure_without_code() {
        let response = Response::failure(Some(json!("a")), &Error::UnknownSession(9));
        let value: Value = serde_json::from_str(&response.to_line()).unwrap();
        assert_eq!(value["id"], json!("a"));
        assert!(value["error"].get("code").is_none());
        assert_eq!(value["error"]["kind"], json!("UnknownSession"));
    }
}
