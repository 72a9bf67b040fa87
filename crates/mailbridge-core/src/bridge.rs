//! Request dispatch and the session registry.

use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::request::{PolicyArgs, Request, SessionId};
use crate::response::Response;
use mailbridge_mime::{Codec, LinePolicy, TransferCodec};
use mailbridge_smtp::{AbortHandle, SmtpSession};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A registered session.
///
/// The abort handle lives outside the lock so `smtp.abort` reaches a session
/// that is busy.
#[derive(Clone)]
struct Entry {
    session: Arc<AsyncMutex<SmtpSession>>,
    abort: AbortHandle,
}

/// Executes requests against the codec and a set of SMTP sessions.
///
/// Shared by reference between concurrent request tasks.
pub struct Bridge {
    config: BridgeConfig,
    sessions: Mutex<HashMap<SessionId, Entry>>,
    next_id: AtomicU64,
}

impl Bridge {
    /// Creates a bridge.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Returns the number of open sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.registry().len()
    }

    /// Handles one JSON request line.
    pub async fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => self.handle(value).await,
            Err(e) => {
                tracing::warn!(%e, "Malformed request line");
                Response::failure(None, &Error::from(e))
            }
        }
    }

    /// Handles one request value. The `id` field, if any, is echoed back.
    pub async fn handle(&self, value: Value) -> Response {
        let id = value.get("id").cloned();
        let request = match Request::from_value(&value) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(kind = e.kind(), %e, "Rejected request");
                return Response::failure(id, &e);
            }
        };

        let op = request.op();
        tracing::debug!(op, "Handling request");
        match self.dispatch(request).await {
            Ok(result) => Response::success(id, result),
            Err(e) => {
                tracing::warn!(op, kind = e.kind(), code = ?e.code(), %e, "Request failed");
                Response::failure(id, &e)
            }
        }
    }

    /// Executes a decoded request and returns its result object.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying operation, [`Error::UnknownSession`]
    /// for an unregistered session, or [`Error::Busy`] if the session is
    /// running another operation.
    pub async fn dispatch(&self, request: Request) -> Result<Value> {
        match request {
            Request::Encode {
                encoding,
                policy,
                text,
            } => {
                let codec = Codec::new(encoding, self.line_policy(policy)?);
                let lines = codec.encode(&text)?;
                Ok(json!({ "lines": lines.into_vec() }))
            }
            Request::Decode {
                encoding,
                policy,
                lines,
            } => {
                let codec = Codec::new(encoding, self.line_policy(policy)?);
                Ok(json!({ "text": codec.decode(lines.as_slice()) }))
            }
            Request::Open {
                host,
                port,
                security,
                timeout,
                verify_peer,
            } => {
                let config =
                    self.config
                        .session_config(&host, port, security, timeout, verify_peer)?;
                let id = self.open(SmtpSession::new(config));
                tracing::info!(session = id, %host, port, "Session opened");
                Ok(json!({ "session": id }))
            }
            Request::Authenticate {
                session,
                credential,
            } => {
                let mut guard = self.lock(session)?;
                let greeting = guard.authenticate(&credential).await?;
                Ok(json!({ "greeting": greeting }))
            }
            Request::Submit {
                session,
                raw_message,
            } => {
                let mut guard = self.lock(session)?;
                let response = guard.submit(&raw_message).await?;
                Ok(json!({ "response": response }))
            }
            Request::SetSourceHostname { session, hostname } => {
                let mut guard = self.lock(session)?;
                guard.set_source_hostname(hostname)?;
                Ok(json!({ "hostname": guard.source_hostname() }))
            }
            Request::GetSourceHostname { session } => {
                let guard = self.lock(session)?;
                Ok(json!({ "hostname": guard.source_hostname() }))
            }
            Request::SetSslOptions {
                session,
                verify_peer,
            } => {
                let mut guard = self.lock(session)?;
                guard.set_verify_peer(verify_peer)?;
                Ok(json!({ "verifyPeer": guard.verify_peer() }))
            }
            Request::State { session } => {
                let guard = self.lock(session)?;
                Ok(json!({ "state": guard.state().as_str() }))
            }
            Request::Abort { session } => {
                self.entry(session)?.abort.abort();
                tracing::info!(session, "Session aborted");
                Ok(json!({}))
            }
            Request::Reset { session } => {
                let mut guard = self.lock(session)?;
                guard.reset().await;
                Ok(json!({ "state": guard.state().as_str() }))
            }
            Request::Close { session } => {
                let mut guard = self.lock(session)?;
                self.registry().remove(&session);
                guard.quit().await;
                tracing::info!(session, "Session closed");
                Ok(json!({}))
            }
        }
    }

    /// Closes every session. Idle sessions are sent QUIT; busy ones are
    /// aborted.
    pub async fn shutdown(&self) {
        let entries: Vec<(SessionId, Entry)> = self.registry().drain().collect();
        for (id, entry) in entries {
            if let Ok(mut guard) = entry.session.try_lock_owned() {
                guard.quit().await;
            } else {
                tracing::debug!(session = id, "Aborting busy session at shutdown");
                entry.abort.abort();
            }
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self, session: SmtpSession) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            abort: session.abort_handle(),
            session: Arc::new(AsyncMutex::new(session)),
        };
        self.registry().insert(id, entry);
        id
    }

    fn entry(&self, id: SessionId) -> Result<Entry> {
        self.registry()
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownSession(id))
    }

    fn lock(&self, id: SessionId) -> Result<OwnedMutexGuard<SmtpSession>> {
        self.entry(id)?
            .session
            .try_lock_owned()
            .map_err(|_| Error::Busy(id))
    }

    fn line_policy(&self, args: PolicyArgs) -> Result<LinePolicy> {
        let defaults = &self.config.line_policy;
        Ok(LinePolicy::from_signed(
            args.first_line_max.unwrap_or(defaults.first_line_max_length),
            args.continuation_line_max
                .unwrap_or(defaults.continuation_line_max_length),
        )?)
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

    fn bridge() -> Bridge {
        Bridge::new(BridgeConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_busy_session_rejects_second_operation() {
        let bridge = bridge();
        let opened = bridge
            .handle(json!({"op": "smtp.open", "host": "127.0.0.1", "port": 2525}))
            .await;
        let id = opened.result.unwrap()["session"].as_u64().unwrap();

        let held = bridge.entry(id).unwrap().session.try_lock_owned().unwrap();

        let response = bridge.handle(json!({"op": "smtp.state", "session": id})).await;
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().kind, "Busy");

        let response = bridge.handle(json!({"op": "smtp.close", "session": id})).await;
        assert_eq!(response.error.unwrap().kind, "Busy");
        assert_eq!(bridge.session_count(), 1);

        let response = bridge.handle(json!({"op": "smtp.abort", "session": id})).await;
        assert!(response.ok);
        assert!(held.abort_handle().is_aborted());

        drop(held);
        let response = bridge.handle(json!({"op": "smtp.state", "session": id})).await;
        assert_eq!(response.result.unwrap()["state"], json!("Disconnected"));
    }

    #[tokio::test]
    async fn test_close_removes_session() {
        let bridge = bridge();
        let opened = bridge
            .handle(json!({"op": "smtp.open", "host": "127.0.0.1", "port": 2525}))
            .await;
        let id = opened.result.unwrap()["session"].as_u64().unwrap();
        assert_eq!(bridge.session_count(), 1);

        assert!(bridge.handle(json!({"op": "smtp.close", "session": id})).await.ok);
        assert_eq!(bridge.session_count(), 0);

        let response = bridge.handle(json!({"op": "smtp.close", "session": id})).await;
        assert_eq!(response.error.unwrap().kind, "UnknownSession");
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let bridge = bridge();
        let a = bridge
            .handle(json!({"op": "smtp.open", "host": "a", "port": 25}))
            .await;
        let b = bridge
            .handle(json!({"op": "smtp.open", "host": "b", "port": 25}))
            .await;
        assert_ne!(a.result.unwrap()["session"], b.result.unwrap()["session"]);

        bridge.shutdown().await;
        assert_eq!(bridge.session_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_busy_sessions() {
        let bridge = bridge();
        let opened = bridge
            .handle(json!({"op": "smtp.open", "host": "127.0.0.1", "port": 2525}))
            .await;
        let id = opened.result.unwrap()["session"].as_u64().unwrap();
        let held = bridge.entry(id).unwrap().session.try_lock_owned().unwrap();

        bridge.shutdown().await;

        assert!(held.abort_handle().is_aborted());
        assert_eq!(bridge.session_count(), 0);
    }
}
