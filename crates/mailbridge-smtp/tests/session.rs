//! Session tests against a scripted loopback SMTP server.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::redundant_clone,
    clippy::needless_collect,
    clippy::similar_names
)]

use std::time::Duration;

use mailbridge_smtp::{
    AuthMechanism, AuthMethod, Credential, Error, Security, SessionConfig, SessionState,
    SmtpSession,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// One step of the server side of a conversation.
enum Step {
    /// Send a reply line (CRLF appended).
    Say(&'static str),
    /// Read a command line and check its prefix.
    Expect(&'static str),
    /// Read message data up to the terminating `.` line.
    ReadData,
    /// Stop responding.
    Hang,
}

use Step::{Expect, Hang, ReadData, Say};

const GREETING: Step = Say("220 mx.test ESMTP ready");

fn ehlo_reply() -> Vec<Step> {
    vec![
        Expect("EHLO localhost"),
        Say("250-mx.test greets localhost"),
        Say("250-SIZE 1000000"),
        Say("250-8BITMIME"),
        Say("250 AUTH PLAIN LOGIN"),
    ]
}

/// Serves one connection following `script`; resolves to the received lines.
async fn serve(script: Vec<Step>) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut received = Vec::new();

        for step in script {
            match step {
                Say(line) => {
                    write
                        .write_all(format!("{line}\r\n").as_bytes())
                        .await
                        .unwrap();
                }
                Expect(prefix) => {
                    let mut line = String::new();
                    reader.read_line(&mut line).await.unwrap();
                    let line = line.trim_end_matches(['\r', '\n']).to_string();
                    assert!(
                        line.starts_with(prefix),
                        "expected {prefix:?}, got {line:?}"
                    );
                    received.push(line);
                }
                ReadData => {
                    let mut data = String::new();
                    loop {
                        let mut line = String::new();
                        let read = reader.read_line(&mut line).await.unwrap();
                        assert!(read > 0, "connection closed during DATA");
                        if line == ".\r\n" {
                            break;
                        }
                        data.push_str(&line);
                    }
                    received.push(data);
                }
                Hang => tokio::time::sleep(Duration::from_secs(30)).await,
            }
        }
        received
    });

    (port, handle)
}

fn session(port: u16) -> SmtpSession {
    SmtpSession::new(
        SessionConfig::builder("127.0.0.1")
            .port(port)
            .security(Security::None)
            .io_timeout(Duration::from_secs(5))
            .build(),
    )
}

fn starttls_session(port: u16) -> SmtpSession {
    SmtpSession::new(
        SessionConfig::builder("127.0.0.1")
            .port(port)
            .security(Security::StartTls)
            .io_timeout(Duration::from_secs(5))
            .build(),
    )
}

fn plain(username: &str, password: &str) -> Credential {
    Credential::new(username, password, AuthMethod::Sasl(AuthMechanism::Plain))
}

fn script(parts: Vec<Vec<Step>>) -> Vec<Step> {
    parts.into_iter().flatten().collect()
}

#[tokio::test]
async fn authenticate_plain_returns_greeting() {
    let (port, server) = serve(script(vec![
        vec![GREETING],
        ehlo_reply(),
        vec![
            Expect("AUTH PLAIN AHVzZXIAc2VjcmV0"),
            Say("235 2.7.0 Authentication successful"),
        ],
    ]))
    .await;

    let mut session = session(port);
    let greeting = session.authenticate(&plain("user", "secret")).await.unwrap();

    assert_eq!(greeting, "mx.test ESMTP ready");
    assert_eq!(session.state(), SessionState::Authenticated);
    let info = session.server_info().unwrap();
    assert!(info.supports_8bitmime());
    assert_eq!(info.max_message_size(), Some(1_000_000));
    server.await.unwrap();
}

#[tokio::test]
async fn rejected_credentials_fail_the_session() {
    let (port, server) = serve(script(vec![
        vec![GREETING],
        ehlo_reply(),
        vec![
            Expect("AUTH PLAIN"),
            Say("535 5.7.8 Authentication credentials invalid"),
        ],
    ]))
    .await;

    let mut session = session(port);
    let err = session
        .authenticate(&plain("user", "wrong"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Authentication { code: 535, ref message } if message == "5.7.8 Authentication credentials invalid"
    ));
    assert_eq!(err.kind(), "AuthenticationError");
    assert_eq!(session.state(), SessionState::Failed);
    server.await.unwrap();

    // Terminal until reset
    let err = session.authenticate(&plain("user", "x")).await.unwrap_err();
    assert_eq!(err.kind(), "InvalidState");
    session.reset().await;
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn submit_before_authenticate_needs_no_network() {
    // Nothing listens on this session's port
    let mut session = session(9);
    let err = session
        .submit("From: a@example.com\r\nTo: b@example.com\r\n\r\nhi")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AuthRequired));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn submit_derives_envelope_and_stuffs_data() {
    let (port, server) = serve(script(vec![
        vec![GREETING],
        ehlo_reply(),
        vec![
            Expect("AUTH PLAIN"),
            Say("235 ok"),
            Expect("MAIL FROM:<alice@example.com> BODY=8BITMIME SIZE="),
            Say("250 2.1.0 Ok"),
            Expect("RCPT TO:<bob@example.com>"),
            Say("250 2.1.5 Ok"),
            Expect("RCPT TO:<carol@example.com>"),
            Say("250 2.1.5 Ok"),
            Expect("DATA"),
            Say("354 End data with <CR><LF>.<CR><LF>"),
            ReadData,
            Say("250 2.0.0 Ok: queued as 12345"),
            Expect("QUIT"),
            Say("221 2.0.0 Bye"),
        ],
    ]))
    .await;

    let message = concat!(
        "From: Alice <alice@example.com>\n",
        "To: bob@example.com\n",
        "Cc: Carol <carol@example.com>, BOB@example.com\n",
        "Subject: Prix\n",
        "\n",
        "Café\n",
        ".hidden\n"
    );

    let mut session = session(port);
    session.authenticate(&plain("user", "secret")).await.unwrap();
    let response = session.submit(message).await.unwrap();

    assert_eq!(response, "2.0.0 Ok: queued as 12345");
    assert_eq!(session.state(), SessionState::Completed);

    session.quit().await;
    assert_eq!(session.state(), SessionState::Completed);

    let received = server.await.unwrap();
    let data = received
        .iter()
        .find(|entry| entry.starts_with("From:"))
        .unwrap();
    assert_eq!(
        data,
        concat!(
            "From: Alice <alice@example.com>\r\n",
            "To: bob@example.com\r\n",
            "Cc: Carol <carol@example.com>, BOB@example.com\r\n",
            "Subject: Prix\r\n",
            "\r\n",
            "Café\r\n",
            "..hidden\r\n"
        )
    );
}

#[tokio::test]
async fn rejected_recipient_is_a_submission_error() {
    let (port, server) = serve(script(vec![
        vec![GREETING],
        ehlo_reply(),
        vec![
            Expect("AUTH PLAIN"),
            Say("235 ok"),
            Expect("MAIL FROM:<alice@example.com>"),
            Say("250 Ok"),
            Expect("RCPT TO:<nobody@example.com>"),
            Say("550 5.1.1 User unknown"),
        ],
    ]))
    .await;

    let mut session = session(port);
    session.authenticate(&plain("user", "secret")).await.unwrap();
    let err = session
        .submit("From: alice@example.com\r\nTo: nobody@example.com\r\n\r\nhi\r\n")
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(550));
    assert_eq!(err.kind(), "SubmissionError");
    assert!(err.is_permanent());
    assert_eq!(session.state(), SessionState::Failed);
    server.await.unwrap();
}

#[tokio::test]
async fn local_submission_errors_keep_the_session() {
    let (port, server) = serve(vec![
        GREETING,
        Expect("EHLO"),
        Say("250-mx.test"),
        Say("250 SIZE 10"),
    ])
    .await;

    let mut session = session(port);
    let none = Credential::new("", "", AuthMethod::None);
    session.authenticate(&none).await.unwrap();
    server.await.unwrap();

    let err = session
        .submit("Subject: no addresses\r\n\r\nhi")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidAddress");

    let err = session
        .submit("From: a@example.com\r\nTo: b@example.com\r\n\r\nway more than ten bytes")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MessageTooLarge { limit: 10, .. }));
    assert_eq!(session.state(), SessionState::Authenticated);

    let err = session.authenticate(&none).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyAuthenticated));
}

#[tokio::test]
async fn login_exchange() {
    let (port, server) = serve(script(vec![
        vec![GREETING],
        ehlo_reply(),
        vec![
            Expect("AUTH LOGIN"),
            Say("334 VXNlcm5hbWU6"),
            Expect("dXNlcg=="),
            Say("334 UGFzc3dvcmQ6"),
            Expect("c2VjcmV0"),
            Say("235 2.7.0 Accepted"),
        ],
    ]))
    .await;

    let mut session = session(port);
    let login = Credential::new("user", "secret", AuthMethod::parse("LOGIN").unwrap());
    session.authenticate(&login).await.unwrap();
    assert_eq!(session.state(), SessionState::Authenticated);

    let received = server.await.unwrap();
    assert_eq!(received.last().map(String::as_str), Some("c2VjcmV0"));
}

#[tokio::test]
async fn helo_fallback_when_ehlo_unknown() {
    let (port, server) = serve(vec![
        GREETING,
        Expect("EHLO client.test"),
        Say("502 5.5.2 Command not recognized"),
        Expect("HELO client.test"),
        Say("250 mx.test"),
    ])
    .await;

    let mut session = session(port);
    session.set_source_hostname("client.test").unwrap();
    assert_eq!(session.source_hostname(), "client.test");

    session
        .authenticate(&Credential::new("", "", AuthMethod::None))
        .await
        .unwrap();
    assert!(session.server_info().unwrap().extensions.is_empty());
    server.await.unwrap();

    let err = session.set_source_hostname("late.test").unwrap_err();
    assert_eq!(err.kind(), "InvalidState");
}

#[tokio::test]
async fn unsupported_methods() {
    // Not enabled: rejected before connecting
    let mut session = SmtpSession::new(
        SessionConfig::builder("127.0.0.1")
            .port(9)
            .security(Security::None)
            .mechanisms([AuthMechanism::Plain])
            .build(),
    );
    let cram = Credential::new("u", "p", AuthMethod::parse("CRAM-MD5").unwrap());
    let err = session.authenticate(&cram).await.unwrap_err();
    assert_eq!(err.kind(), "UnsupportedAuthMethod");
    assert_eq!(session.state(), SessionState::Disconnected);

    // Enabled but not offered by the server
    let (port, server) = serve(script(vec![vec![GREETING], ehlo_reply()])).await;
    let mut session = self::session(port);
    let oauth = Credential::new("u", "token", AuthMethod::Sasl(AuthMechanism::XOAuth2));
    let err = session.authenticate(&oauth).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedAuthMethod(_)));
    assert_eq!(session.state(), SessionState::Failed);
    server.await.unwrap();
}

#[tokio::test]
async fn silent_server_times_out() {
    let (port, _server) = serve(vec![GREETING, Hang]).await;

    let mut session = SmtpSession::new(
        SessionConfig::builder("127.0.0.1")
            .port(port)
            .security(Security::None)
            .io_timeout(Duration::from_millis(200))
            .build(),
    );
    let err = session.authenticate(&plain("user", "secret")).await.unwrap_err();

    assert!(matches!(err, Error::Timeout(_)));
    assert_eq!(err.kind(), "TransportError");
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn abort_interrupts_authentication() {
    let (port, _server) = serve(vec![Hang]).await;

    let mut session = session(port);
    let abort = session.abort_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        abort.abort();
    });

    let err = session.authenticate(&plain("user", "secret")).await.unwrap_err();
    assert!(matches!(err, Error::Aborted));
    assert!(err.is_transport());
    assert_eq!(session.state(), SessionState::Failed);

    session.reset().await;
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!session.abort_handle().is_aborted());
}

#[tokio::test]
async fn rejected_sender_is_a_submission_error() {
    let (port, server) = serve(script(vec![
        vec![GREETING],
        ehlo_reply(),
        vec![
            Expect("AUTH PLAIN"),
            Say("235 ok"),
            Expect("MAIL FROM:<spammer@example.com>"),
            Say("553 5.7.1 Sender address rejected"),
        ],
    ]))
    .await;

    let mut session = session(port);
    session.authenticate(&plain("user", "secret")).await.unwrap();
    let err = session
        .submit("From: spammer@example.com\r\nTo: bob@example.com\r\n\r\nhi\r\n")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Submission { code: 553, ref message } if message == "5.7.1 Sender address rejected"
    ));
    assert_eq!(err.kind(), "SubmissionError");
    assert_eq!(session.state(), SessionState::Failed);
    server.await.unwrap();
}

#[tokio::test]
async fn rejected_message_data_is_a_submission_error() {
    let (port, server) = serve(script(vec![
        vec![GREETING],
        ehlo_reply(),
        vec![
            Expect("AUTH PLAIN"),
            Say("235 ok"),
            Expect("MAIL FROM:<alice@example.com> SIZE="),
            Say("250 Ok"),
            Expect("RCPT TO:<bob@example.com>"),
            Say("250 Ok"),
            Expect("DATA"),
            Say("354 go ahead"),
            ReadData,
            Say("554 5.6.0 Message rejected as spam"),
        ],
    ]))
    .await;

    let mut session = session(port);
    session.authenticate(&plain("user", "secret")).await.unwrap();
    let err = session
        .submit("From: alice@example.com\r\nTo: bob@example.com\r\n\r\nBuy now\r\n")
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(554));
    assert_eq!(err.kind(), "SubmissionError");
    assert!(err.to_string().contains("Message rejected as spam"));
    assert_eq!(session.state(), SessionState::Failed);

    let received = server.await.unwrap();
    assert_eq!(
        received.last().map(String::as_str),
        Some("From: alice@example.com\r\nTo: bob@example.com\r\n\r\nBuy now\r\n")
    );
}

#[tokio::test]
async fn completed_session_refuses_second_submit() {
    let message = "From: alice@example.com\r\nTo: bob@example.com\r\n\r\nonce\r\n";
    let (port, server) = serve(script(vec![
        vec![GREETING],
        ehlo_reply(),
        vec![
            Expect("AUTH PLAIN"),
            Say("235 ok"),
            Expect("MAIL FROM:<alice@example.com>"),
            Say("250 Ok"),
            Expect("RCPT TO:<bob@example.com>"),
            Say("250 Ok"),
            Expect("DATA"),
            Say("354 go ahead"),
            ReadData,
            Say("250 2.0.0 queued"),
            // The refused second submit must not reach the server
            Expect("QUIT"),
            Say("221 Bye"),
        ],
    ]))
    .await;

    let mut session = session(port);
    session.authenticate(&plain("user", "secret")).await.unwrap();
    session.submit(message).await.unwrap();
    assert_eq!(session.state(), SessionState::Completed);

    let err = session.submit(message).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    assert_eq!(err.kind(), "InvalidState");
    assert_eq!(session.state(), SessionState::Completed);

    session.close().await;
    let received = server.await.unwrap();
    assert_eq!(received.last().map(String::as_str), Some("QUIT"));
}

#[tokio::test]
async fn cram_md5_answers_the_challenge() {
    let (port, server) = serve(vec![
        GREETING,
        Expect("EHLO localhost"),
        Say("250-mx.test"),
        Say("250 AUTH CRAM-MD5 PLAIN"),
        Expect("AUTH CRAM-MD5"),
        Say("334 PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+"),
        Expect("dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw"),
        Say("235 2.7.0 Authentication successful"),
    ])
    .await;

    let mut session = session(port);
    let cram = Credential::new("tim", "tanstaaftanstaaf", AuthMethod::parse("CRAM-MD5").unwrap());
    session.authenticate(&cram).await.unwrap();
    assert_eq!(session.state(), SessionState::Authenticated);

    let received = server.await.unwrap();
    assert_eq!(received[1], "AUTH CRAM-MD5");
}

#[tokio::test]
async fn xoauth2_sends_bearer_token() {
    let (port, server) = serve(vec![
        GREETING,
        Expect("EHLO localhost"),
        Say("250-mx.test"),
        Say("250 AUTH XOAUTH2 OAUTHBEARER"),
        Expect("AUTH XOAUTH2 dXNlcj11QGV4YW1wbGUuY29tAWF1dGg9QmVhcmVyIHRvawEB"),
        Say("235 2.7.0 Accepted"),
    ])
    .await;

    let mut session = session(port);
    let oauth = Credential::new("u@example.com", "tok", AuthMethod::parse("XOAUTH2").unwrap());
    session.authenticate(&oauth).await.unwrap();
    assert_eq!(session.state(), SessionState::Authenticated);
    server.await.unwrap();
}

#[tokio::test]
async fn oauthbearer_error_challenge_gets_empty_reply() {
    let (port, server) = serve(vec![
        GREETING,
        Expect("EHLO localhost"),
        Say("250-mx.test"),
        Say("250 AUTH XOAUTH2 OAUTHBEARER"),
        Expect("AUTH OAUTHBEARER bixhPXVAZXhhbXBsZS5jb20sAWF1dGg9QmVhcmVyIHRvawEB"),
        Say("334 eyJzdGF0dXMiOiI0MDEiLCJzY2hlbWVzIjoiYmVhcmVyIn0="),
        Expect(""),
        Say("535 5.7.8 Token expired"),
    ])
    .await;

    let mut session = session(port);
    let oauth = Credential::new("u@example.com", "tok", AuthMethod::parse("OAUTHBEARER").unwrap());
    let err = session.authenticate(&oauth).await.unwrap_err();

    assert_eq!(err.kind(), "AuthenticationError");
    assert_eq!(err.code(), Some(535));
    assert_eq!(session.state(), SessionState::Failed);

    let received = server.await.unwrap();
    assert_eq!(received.last().map(String::as_str), Some(""));
}

fn starttls_ehlo() -> Vec<Step> {
    vec![
        Expect("EHLO localhost"),
        Say("250-mx.test"),
        Say("250-STARTTLS"),
        Say("250 AUTH LOGIN"),
    ]
}

#[tokio::test]
async fn starttls_security_upgrades_before_auth() {
    // The server accepts STARTTLS, then hangs up instead of negotiating
    let (port, server) = serve(script(vec![
        vec![GREETING],
        starttls_ehlo(),
        vec![Expect("STARTTLS"), Say("220 2.0.0 Ready to start TLS")],
    ]))
    .await;

    let mut session = starttls_session(port);
    let err = session.authenticate(&plain("user", "secret")).await.unwrap_err();

    assert_eq!(err.kind(), "TransportError");
    assert_eq!(session.state(), SessionState::Failed);
    let received = server.await.unwrap();
    assert_eq!(received.last().map(String::as_str), Some("STARTTLS"));
}

#[tokio::test]
async fn start_tls_method_upgrades_plain_session() {
    let (port, server) = serve(script(vec![
        vec![GREETING],
        starttls_ehlo(),
        vec![Expect("STARTTLS"), Say("220 Go ahead")],
    ]))
    .await;

    let mut session = session(port);
    let method = AuthMethod::parse("START_TLS").unwrap();
    let err = session
        .authenticate(&Credential::new("user", "secret", method))
        .await
        .unwrap_err();

    assert!(err.is_transport());
    let received = server.await.unwrap();
    assert!(received.iter().any(|line| line == "STARTTLS"));
    assert!(!received.iter().any(|line| line.starts_with("AUTH")));
}

#[tokio::test]
async fn starttls_refusal_fails_authentication() {
    let (port, server) = serve(script(vec![
        vec![GREETING],
        starttls_ehlo(),
        vec![Expect("STARTTLS"), Say("454 4.7.0 TLS not available due to temporary reason")],
    ]))
    .await;

    let mut session = starttls_session(port);
    let err = session.authenticate(&plain("user", "secret")).await.unwrap_err();

    assert_eq!(err.kind(), "AuthenticationError");
    assert_eq!(err.code(), Some(454));
    assert!(err.is_transient());
    assert_eq!(session.state(), SessionState::Failed);
    server.await.unwrap();
}

#[tokio::test]
async fn starttls_not_advertised_is_a_transport_error() {
    let (port, server) = serve(script(vec![vec![GREETING], ehlo_reply()])).await;

    let mut session = session(port);
    let method = AuthMethod::parse("START_TLS").unwrap();
    let err = session
        .authenticate(&Credential::new("user", "secret", method))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotSupported(_)));
    assert_eq!(err.kind(), "TransportError");
    assert_eq!(session.state(), SessionState::Failed);

    let received = server.await.unwrap();
    assert!(!received.iter().any(|line| line == "STARTTLS"));
}

#[tokio::test]
async fn malformed_reply_is_a_transport_error() {
    let (port, server) = serve(vec![Say("hello there")]).await;

    let mut session = session(port);
    let err = session.authenticate(&plain("user", "secret")).await.unwrap_err();

    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(err.kind(), "TransportError");
    assert_eq!(session.state(), SessionState::Failed);
    server.await.unwrap();
}

#[tokio::test]
async fn verify_peer_is_fixed_after_connecting() {
    let (port, server) = serve(script(vec![vec![GREETING], ehlo_reply()])).await;

    let mut session = session(port);
    assert!(session.verify_peer());
    session.set_verify_peer(false).unwrap();
    assert!(!session.verify_peer());

    session
        .authenticate(&Credential::new("", "", AuthMethod::None))
        .await
        .unwrap();
    server.await.unwrap();

    let err = session.set_verify_peer(true).unwrap_err();
    assert_eq!(err.kind(), "InvalidState");
    assert!(!session.verify_peer());
}
