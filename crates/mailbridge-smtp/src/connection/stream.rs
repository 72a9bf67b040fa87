//! Line-oriented SMTP stream over TCP or TLS.

use crate::error::{Error, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

/// Client TLS configuration, verified against the webpki roots.
static VERIFIED: LazyLock<Arc<ClientConfig>> = LazyLock::new(|| {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
});

/// Client TLS configuration that accepts any server certificate.
static UNVERIFIED: LazyLock<Arc<ClientConfig>> = LazyLock::new(|| {
    Arc::new(
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth(),
    )
});

/// Returns the shared client configuration for a session's verification
/// setting.
fn client_config(verify_peer: bool) -> Arc<ClientConfig> {
    if verify_peer {
        Arc::clone(&VERIFIED)
    } else {
        Arc::clone(&UNVERIFIED)
    }
}

/// Certificate verifier for sessions opened with peer verification off.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

/// Socket under an [`SmtpStream`].
#[derive(Debug)]
enum Socket {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Socket {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Socket {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Buffered connection to an SMTP server.
#[derive(Debug)]
pub struct SmtpStream {
    inner: BufReader<Socket>,
}

impl SmtpStream {
    /// Connects to `host:port`, negotiating TLS immediately when `implicit_tls`
    /// is set (port 465 style).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the TLS handshake fails.
    pub async fn connect(
        host: &str,
        port: u16,
        implicit_tls: bool,
        verify_peer: bool,
    ) -> Result<Self> {
        let tcp = TcpStream::connect((host, port)).await?;
        tcp.set_nodelay(true)?;

        let socket = if implicit_tls {
            Socket::Tls(Box::new(handshake(host, tcp, verify_peer).await?))
        } else {
            Socket::Plain(tcp)
        };
        Ok(Self {
            inner: BufReader::new(socket),
        })
    }

    /// Reads one reply line, without its line terminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] at end of stream, or an I/O error.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.inner.read_line(&mut line).await? == 0 {
            return Err(Error::ConnectionClosed);
        }
        line.truncate(line.trim_end_matches(['\r', '\n']).len());
        Ok(line)
    }

    /// Writes `data` and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let socket = self.inner.get_mut();
        socket.write_all(data).await?;
        socket.flush().await?;
        Ok(())
    }

    /// Returns true if the stream is encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        matches!(self.inner.get_ref(), Socket::Tls(_))
    }

    /// Negotiates TLS on a plain connection after the server accepted
    /// STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the stream is already encrypted or the
    /// server sent data ahead of the handshake, or the handshake error.
    pub async fn upgrade_to_tls(self, host: &str, verify_peer: bool) -> Result<Self> {
        if !self.inner.buffer().is_empty() {
            return Err(Error::Protocol(
                "unexpected data received before TLS negotiation".into(),
            ));
        }
        let tcp = match self.inner.into_inner() {
            Socket::Plain(tcp) => tcp,
            Socket::Tls(_) => return Err(Error::Protocol("connection already uses TLS".into())),
        };

        let tls = handshake(host, tcp, verify_peer).await?;
        Ok(Self {
            inner: BufReader::new(Socket::Tls(Box::new(tls))),
        })
    }
}

async fn handshake(host: &str, tcp: TcpStream, verify_peer: bool) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| Error::Protocol(format!("invalid TLS server name {host:?}")))?;
    let connector = TlsConnector::from(client_config(verify_peer));
    connector.connect(server_name, tcp).await.map_err(|e| {
        let tls = e
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<rustls::Error>())
            .cloned();
        tls.map_or_else(|| Error::Io(e), Error::Tls)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_lines_and_writes_over_plain_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"220 ready\r\n250 ok\n").await.unwrap();
            let mut buf = [0u8; 6];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut stream = SmtpStream::connect("127.0.0.1", port, false, true)
            .await
            .unwrap();
        assert!(!stream.is_tls());
        assert_eq!(stream.read_line().await.unwrap(), "220 ready");
        assert_eq!(stream.read_line().await.unwrap(), "250 ok");
        stream.write_all(b"QUIT\r\n").await.unwrap();
        assert_eq!(&server.await.unwrap(), b"QUIT\r\n");

        assert!(matches!(
            stream.read_line().await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_upgrade_refuses_buffered_data() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"220 go ahead\r\n250 injected\r\n")
                .await
                .unwrap();
            socket
        });

        let mut stream = SmtpStream::connect("127.0.0.1", port, false, true)
            .await
            .unwrap();
        let _socket = server.await.unwrap();
        assert_eq!(stream.read_line().await.unwrap(), "220 go ahead");

        let err = stream.upgrade_to_tls("localhost", true).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_client_config_follows_verify_peer() {
        assert!(Arc::ptr_eq(&client_config(true), &client_config(true)));
        assert!(!Arc::ptr_eq(&client_config(true), &client_config(false)));
    }

    #[test]
    fn test_unverified_config_accepts_any_certificate() {
        let cert = CertificateDer::from(vec![0x30, 0x03, 0x02, 0x01, 0x00]);
        let name = ServerName::try_from("mail.invalid").unwrap();
        let verified =
            AcceptAnyCertificate.verify_server_cert(&cert, &[], &name, &[], UnixTime::now());
        assert!(verified.is_ok());
        assert!(!AcceptAnyCertificate.supported_verify_schemes().is_empty());
    }
}
