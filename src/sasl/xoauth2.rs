/*
 * xoauth2.rs
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

//! SASL XOAUTH2: a single initial response carrying a bearer token. On
//! failure the server sends a JSON error challenge and expects an empty
//! response to close the exchange; this mechanism honors that by treating
//! any post-initial challenge as "respond empty and finish".

use super::{SaslError, SaslMechanism};

pub struct XOAuth2 {
    user: String,
    access_token: String,
    sent: bool,
    done: bool,
}

impl XOAuth2 {
    pub fn new(user: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self { user: user.into(), access_token: access_token.into(), sent: false, done: false }
    }
}

/// `user={user}\x01auth=Bearer {token}\x01\x01`.
pub fn encode(user: &str, access_token: &str) -> Vec<u8> {
    format!("user={}\x01auth=Bearer {}\x01\x01", user, access_token).into_bytes()
}

impl SaslMechanism for XOAuth2 {
    fn name(&self) -> &'static str {
        "XOAUTH2"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        self.sent = true;
        Some(encode(&self.user, &self.access_token))
    }

    fn respond(&mut self, _challenge: &[u8]) -> Result<Vec<u8>, SaslError> {
        if !self.sent {
            return Err(SaslError::new("XOAUTH2 initial response was not sent"));
        }
        self.done = true;
        Ok(Vec::new())
    }

    fn is_complete(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_bearer_token() {
        let mut mech = XOAuth2::new("user@example.com", "ya29.token");
        let resp = mech.initial_response().unwrap();
        assert_eq!(resp, b"user=user@example.com\x01auth=Bearer ya29.token\x01\x01");
    }

    #[test]
    fn responds_empty_to_error_challenge_and_completes() {
        let mut mech = XOAuth2::new("u", "t");
        mech.initial_response();
        let resp = mech.respond(br#"{"status":"401"}"#).unwrap();
        assert!(resp.is_empty());
        assert!(mech.is_complete());
    }
}
