//! SASL client responses for the AUTH command.
//!
//! PLAIN (RFC 4616), LOGIN, CRAM-MD5 (RFC 2195), OAUTHBEARER (RFC 7628) and
//! XOAUTH2.

use crate::error::{Error, Result};
use crate::types::{AuthMechanism, Credential};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md5::Md5;
use std::fmt::Write;

/// Encodes arbitrary text as one SASL response line.
#[must_use]
pub fn encode(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Decodes a 334 challenge for logging and LOGIN prompt detection.
///
/// Invalid base64 or UTF-8 yields `None`; challenges are advisory.
#[must_use]
pub fn decode_challenge(challenge: &str) -> Option<String> {
    let bytes = STANDARD.decode(challenge.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

/// PLAIN response: `\0<username>\0<password>`, empty authorization identity.
#[must_use]
pub fn plain_response(username: &str, password: &str) -> String {
    encode(&format!("\0{username}\0{password}"))
}

/// OAUTHBEARER response: `n,a=<user>,\x01auth=Bearer <token>\x01\x01`.
#[must_use]
pub fn oauthbearer_response(user: &str, token: &str) -> String {
    encode(&format!("n,a={user},\x01auth=Bearer {token}\x01\x01"))
}

/// XOAUTH2 response: `user=<user>\x01auth=Bearer <token>\x01\x01`.
#[must_use]
pub fn xoauth2_response(user: &str, token: &str) -> String {
    encode(&format!("user={user}\x01auth=Bearer {token}\x01\x01"))
}

/// CRAM-MD5 response to a base64 challenge: `<user> <hex HMAC-MD5>`, keyed
/// with the password.
///
/// # Errors
///
/// Returns [`Error::Authentication`] with code 334 if the challenge is not
/// valid base64.
pub fn cram_md5_response(username: &str, password: &str, challenge: &str) -> Result<String> {
    let challenge = STANDARD
        .decode(challenge.trim())
        .map_err(|_| Error::authentication(334, format!("malformed CRAM-MD5 challenge {challenge:?}")))?;

    let mut mac = Hmac::<Md5>::new_from_slice(password.as_bytes())
        .map_err(|e| Error::authentication(334, e.to_string()))?;
    mac.update(&challenge);

    let mut answer = format!("{username} ");
    for byte in mac.finalize().into_bytes() {
        let _ = write!(answer, "{byte:02x}");
    }
    Ok(encode(&answer))
}

/// Returns the initial response sent with `AUTH <mechanism>`, or `None` for
/// mechanisms that wait for a server prompt.
#[must_use]
pub fn initial_response(mechanism: AuthMechanism, credential: &Credential) -> Option<String> {
    let Credential {
        username, password, ..
    } = credential;

    match mechanism {
        AuthMechanism::Plain => Some(plain_response(username, password)),
        AuthMechanism::Login | AuthMechanism::CramMd5 => None,
        AuthMechanism::XOAuth2 => Some(xoauth2_response(username, password)),
        AuthMechanism::OAuthBearer => Some(oauthbearer_response(username, password)),
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
    use crate::types::AuthMethod;

    fn decoded(response: &str) -> String {
        String::from_utf8(STANDARD.decode(response).unwrap()).unwrap()
    }

    #[test]
    fn test_plain_format() {
        assert_eq!(decoded(&plain_response("test", "pass")), "\0test\0pass");
        assert_eq!(plain_response("test", "pass"), "AHRlc3QAcGFzcw==");
    }

    #[test]
    fn test_oauth_formats() {
        assert_eq!(
            decoded(&oauthbearer_response("test@test.com", "abc")),
            "n,a=test@test.com,\x01auth=Bearer abc\x01\x01"
        );
        assert_eq!(
            decoded(&xoauth2_response("test@test.com", "abc")),
            "user=test@test.com\x01auth=Bearer abc\x01\x01"
        );
    }

    #[test]
    fn test_decode_login_prompts() {
        assert_eq!(decode_challenge("VXNlcm5hbWU6").as_deref(), Some("Username:"));
        assert_eq!(decode_challenge("UGFzc3dvcmQ6").as_deref(), Some("Password:"));
        assert_eq!(decode_challenge("not base64!"), None);
    }

    #[test]
    fn test_initial_response_per_mechanism() {
        let credential = Credential::new("user", "secret", AuthMethod::None);
        assert!(initial_response(AuthMechanism::Plain, &credential).is_some());
        assert_eq!(initial_response(AuthMechanism::Login, &credential), None);
        assert_eq!(initial_response(AuthMechanism::CramMd5, &credential), None);
    }

    #[test]
    fn test_cram_md5_rfc2195_vector() {
        let challenge = encode("<1896.697170952@postoffice.reston.mci.net>");
        let response = cram_md5_response("tim", "tanstaaftanstaaf", &challenge).unwrap();
        assert_eq!(decoded(&response), "tim b913a602c7eda7a495b4e6e7334d3890");
    }

    #[test]
    fn test_cram_md5_rejects_malformed_challenge() {
        let err = cram_md5_response("tim", "secret", "not base64!").unwrap_err();
        assert_eq!(err.kind(), "AuthenticationError");
        assert_eq!(err.code(), Some(334));
    }
}
