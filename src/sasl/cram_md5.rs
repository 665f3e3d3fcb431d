/*
 * cram_md5.rs
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

//! SASL CRAM-MD5 (RFC 2195): one server challenge, answered with
//! `user + " " + hex(HMAC-MD5(password, challenge))`.

use hmac::{Hmac, Mac};
use md5::Md5;

use super::{SaslError, SaslMechanism};

pub struct CramMd5 {
    username: String,
    password: String,
    done: bool,
}

impl CramMd5 {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into(), done: false }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl SaslMechanism for CramMd5 {
    fn name(&self) -> &'static str {
        "CRAM-MD5"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, SaslError> {
        if self.done {
            return Err(SaslError::new("CRAM-MD5 exchange already complete"));
        }
        let mut mac = Hmac::<Md5>::new_from_slice(self.password.as_bytes())
            .map_err(|e| SaslError::new(format!("invalid HMAC key: {}", e)))?;
        mac.update(challenge);
        let digest = mac.finalize().into_bytes();
        self.done = true;
        Ok(format!("{} {}", self.username, hex(&digest)).into_bytes())
    }

    fn is_complete(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};

    #[test]
    fn matches_spec_test_vector() {
        // spec.md §8: user "tim", password "tanstaaftanstaaf", challenge
        // base64 "PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+"
        let challenge_b64 = "PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+";
        let challenge = STANDARD.decode(challenge_b64).unwrap();
        let mut mech = CramMd5::new("tim", "tanstaaftanstaaf");
        let response = mech.respond(&challenge).unwrap();
        let expected = STANDARD.decode("dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw").unwrap();
        assert_eq!(response, expected);
        assert!(mech.is_complete());
    }

    #[test]
    fn errors_once_complete() {
        let mut mech = CramMd5::new("tim", "pw");
        mech.respond(b"challenge").unwrap();
        assert!(mech.respond(b"again").is_err());
    }
}
