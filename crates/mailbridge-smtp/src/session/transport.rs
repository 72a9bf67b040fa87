//! Timeout- and abort-guarded command channel.

use crate::command::Command;
use crate::connection::{Security, SessionConfig, SmtpStream};
use crate::error::{Error, Result};
use crate::parser::{parse_reply, parse_reply_line};
use crate::types::Reply;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Runs `fut` unless it exceeds `limit` or the abort flag is raised first.
async fn guarded<T>(
    abort: &mut watch::Receiver<bool>,
    limit: Duration,
    what: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    if *abort.borrow_and_update() {
        return Err(Error::Aborted);
    }

    tokio::select! {
        res = tokio::time::timeout(limit, fut) => res.map_err(|_| Error::Timeout(what))?,
        Ok(_) = abort.wait_for(|&aborted| aborted) => Err(Error::Aborted),
    }
}

/// Open connection to the server, with every read and write bounded by the
/// I/O timeout and cancellable through the session's abort flag.
#[derive(Debug)]
pub(crate) struct Transport {
    stream: SmtpStream,
    abort: watch::Receiver<bool>,
    io_timeout: Duration,
}

impl Transport {
    /// Opens the TCP (or implicit TLS) connection described by `config`.
    pub(crate) async fn open(config: &SessionConfig, mut abort: watch::Receiver<bool>) -> Result<Self> {
        let host = config.host.as_str();
        let implicit_tls = config.security == Security::Implicit;
        let stream = guarded(
            &mut abort,
            config.connect_timeout,
            "connecting",
            SmtpStream::connect(host, config.port, implicit_tls, config.verify_peer),
        )
        .await?;

        tracing::debug!(host, port = config.port, tls = stream.is_tls(), "Connected");

        Ok(Self {
            stream,
            abort,
            io_timeout: config.io_timeout,
        })
    }

    /// Returns true if the connection is encrypted.
    pub(crate) fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    /// Reads one complete reply.
    pub(crate) async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = guarded(
                &mut self.abort,
                self.io_timeout,
                "reading reply",
                self.stream.read_line(),
            )
            .await?;
            tracing::trace!(line = %line, "S:");
            let last = parse_reply_line(&line)?.last;
            lines.push(line);
            if last {
                break;
            }
        }
        parse_reply(&lines)
    }

    /// Sends a command without waiting for the reply.
    pub(crate) async fn send(&mut self, command: &Command) -> Result<()> {
        tracing::debug!(command = %command.log_line(), "C:");
        self.write(&command.serialize()).await
    }

    /// Sends a command and reads its reply.
    pub(crate) async fn command(&mut self, command: &Command) -> Result<Reply> {
        self.send(command).await?;
        let reply = self.read_reply().await?;
        tracing::debug!(code = reply.code.as_u16(), "S:");
        Ok(reply)
    }

    /// Writes raw bytes (message data).
    pub(crate) async fn write(&mut self, data: &[u8]) -> Result<()> {
        guarded(
            &mut self.abort,
            self.io_timeout,
            "writing",
            self.stream.write_all(data),
        )
        .await
    }

    /// Negotiates TLS over the open connection after a 220 to STARTTLS.
    pub(crate) async fn upgrade(self, hostname: &str, verify_peer: bool) -> Result<Self> {
        let Self {
            stream,
            mut abort,
            io_timeout,
        } = self;

        let stream = guarded(
            &mut abort,
            io_timeout,
            "negotiating TLS",
            stream.upgrade_to_tls(hostname, verify_peer),
        )
        .await?;

        Ok(Self {
            stream,
            abort,
            io_timeout,
        })
    }
}
