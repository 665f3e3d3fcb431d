/*
 * mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! SASL authentication mechanisms shared by IMAP `AUTHENTICATE`, POP3
//! `AUTH` and SMTP `AUTH`. Each mechanism owns its own step counter behind
//! a small trait rather than a callback driven by the caller: the session
//! layer reads a continuation challenge, hands it to `respond()`, and
//! writes back whatever bytes come out — base64 framing is the session's
//! job, not the mechanism's.

mod cram_md5;
mod login;
mod ntlm;
mod plain;
mod scram;
mod xoauth2;

pub use cram_md5::CramMd5;
pub use login::Login;
pub use ntlm::Ntlm;
pub use plain::Plain;
pub use scram::{ScramSha1, ScramSha256};
pub use xoauth2::XOAuth2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslError(String);

impl SaslError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl std::fmt::Display for SaslError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SaslError {}

/// One SASL mechanism's state machine. `initial_response` is consulted
/// once, before the first server challenge is read; `respond` is called
/// once per subsequent continuation. A mechanism that has no more data to
/// send reports `is_complete() == true` and must not be called again.
pub trait SaslMechanism {
    fn name(&self) -> &'static str;

    /// Client-first data sent as the initial response, if the mechanism
    /// has one (e.g. PLAIN, XOAUTH2). `None` means the exchange starts
    /// with a server challenge instead (LOGIN, CRAM-MD5).
    fn initial_response(&mut self) -> Option<Vec<u8>>;

    /// Compute this mechanism's answer to a decoded server challenge.
    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, SaslError>;

    fn is_complete(&self) -> bool;
}

/// Pick the best mechanism the server offers, given what credentials the
/// caller actually has. Priority: CRAM-MD5 > NTLM > PLAIN > LOGIN; XOAUTH2
/// is only chosen when an access token was supplied, in which case it
/// takes priority over everything else (a bearer token is not a password
/// substitute for the other mechanisms).
pub fn choose_authentication(
    username: &str,
    password: &str,
    access_token: Option<&str>,
    offered_mechs: &[String],
) -> Option<Box<dyn SaslMechanism>> {
    let offers = |name: &str| offered_mechs.iter().any(|m| m.eq_ignore_ascii_case(name));

    if let Some(token) = access_token {
        if offers("XOAUTH2") {
            return Some(Box::new(XOAuth2::new(username, token)));
        }
    }
    if offers("CRAM-MD5") {
        return Some(Box::new(CramMd5::new(username, password)));
    }
    if offers("NTLM") {
        return Some(Box::new(Ntlm::new(username, password)));
    }
    if offers("PLAIN") {
        return Some(Box::new(Plain::new(username, password)));
    }
    if offers("LOGIN") {
        return Some(Box::new(Login::new(username, password)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_cram_md5_over_plain_and_login() {
        let offered = vec!["PLAIN".to_string(), "LOGIN".to_string(), "CRAM-MD5".to_string()];
        let mech = choose_authentication("tim", "pw", None, &offered).unwrap();
        assert_eq!(mech.name(), "CRAM-MD5");
    }

    #[test]
    fn prefers_xoauth2_when_token_supplied_and_offered() {
        let offered = vec!["CRAM-MD5".to_string(), "XOAUTH2".to_string()];
        let mech = choose_authentication("tim", "pw", Some("token"), &offered).unwrap();
        assert_eq!(mech.name(), "XOAUTH2");
    }

    #[test]
    fn falls_back_to_login_when_only_login_offered() {
        let offered = vec!["LOGIN".to_string()];
        let mech = choose_authentication("tim", "pw", None, &offered).unwrap();
        assert_eq!(mech.name(), "LOGIN");
    }

    #[test]
    fn none_when_nothing_offered_matches() {
        let offered = vec!["GSSAPI".to_string()];
        assert!(choose_authentication("tim", "pw", None, &offered).is_none());
    }
}
