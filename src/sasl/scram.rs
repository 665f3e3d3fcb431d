/*
 * scram.rs
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

//! SASL SCRAM-SHA-1 and SCRAM-SHA-256 (RFC 5802 / RFC 7677). Both share
//! the same three-message exchange and differ only in the underlying
//! hash, so a single [`ScramMechanism`] is parameterized by a [`ScramHash`]
//! rather than duplicated per algorithm.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::{SaslError, SaslMechanism};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ScramHash {
    Sha1,
    Sha256,
}

impl ScramHash {
    fn output_len(self) -> usize {
        match self {
            ScramHash::Sha1 => 20,
            ScramHash::Sha256 => 32,
        }
    }
}

fn h(hash: ScramHash, data: &[u8]) -> Vec<u8> {
    match hash {
        ScramHash::Sha1 => {
            let mut hasher = Sha1::new();
            sha1::Digest::update(&mut hasher, data);
            sha1::Digest::finalize(hasher).to_vec()
        }
        ScramHash::Sha256 => {
            let mut hasher = Sha256::new();
            Digest::update(&mut hasher, data);
            Digest::finalize(hasher).to_vec()
        }
    }
}

fn hmac_bytes(hash: ScramHash, key: &[u8], data: &[u8]) -> Vec<u8> {
    match hash {
        ScramHash::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        ScramHash::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

fn pbkdf2_derive(hash: ScramHash, password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut out = vec![0u8; hash.output_len()];
    match hash {
        ScramHash::Sha1 => pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut out),
        ScramHash::Sha256 => pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out),
    }
    out
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

/// Escapes `,` and `=` per RFC 5802 §5.1 so usernames can appear in the
/// `n=` attribute of a SCRAM message unambiguously.
fn saslname(name: &str) -> String {
    name.replace('=', "=3D").replace(',', "=2C")
}

fn random_nonce() -> String {
    let seed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let raw = format!("{}{}", seed.as_secs(), seed.subsec_nanos());
    STANDARD.encode(raw.as_bytes())
}

/// Parses the comma-separated `key=value` attributes of a SCRAM server
/// message, e.g. `r=nonce,s=salt,i=4096`.
fn parse_attrs(msg: &str) -> std::collections::HashMap<char, String> {
    let mut out = std::collections::HashMap::new();
    for field in msg.split(',') {
        if let Some((k, v)) = field.split_once('=') {
            if let Some(c) = k.chars().next() {
                out.insert(c, v.to_string());
            }
        }
    }
    out
}

enum Step {
    ClientFirst,
    AwaitingServerFinal { server_signature: Vec<u8> },
    Done,
}

pub struct ScramMechanism {
    hash: ScramHash,
    username: String,
    password: String,
    client_nonce: String,
    client_first_bare: String,
    step: Step,
}

impl ScramMechanism {
    pub fn new(hash: ScramHash, username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        let client_nonce = random_nonce();
        let client_first_bare = format!("n={},r={}", saslname(&username), client_nonce);
        Self { hash, username, password: password.into(), client_nonce, client_first_bare, step: Step::ClientFirst }
    }

    fn gs2_header(&self) -> &'static str {
        "n,,"
    }

    fn client_first_message(&self) -> Vec<u8> {
        format!("{}{}", self.gs2_header(), self.client_first_bare).into_bytes()
    }

    fn client_final_message(&mut self, server_first: &str) -> Result<Vec<u8>, SaslError> {
        let attrs = parse_attrs(server_first);
        let server_nonce = attrs.get(&'r').ok_or_else(|| SaslError::new("SCRAM server-first missing nonce"))?;
        if !server_nonce.starts_with(&self.client_nonce) {
            return Err(SaslError::new("SCRAM server nonce does not extend client nonce"));
        }
        let salt_b64 = attrs.get(&'s').ok_or_else(|| SaslError::new("SCRAM server-first missing salt"))?;
        let salt = STANDARD.decode(salt_b64).map_err(|e| SaslError::new(format!("invalid SCRAM salt: {}", e)))?;
        let iterations: u32 = attrs
            .get(&'i')
            .ok_or_else(|| SaslError::new("SCRAM server-first missing iteration count"))?
            .parse()
            .map_err(|_| SaslError::new("SCRAM iteration count is not a number"))?;

        let gs2_b64 = STANDARD.encode(self.gs2_header().as_bytes());
        let channel_binding = format!("c={}", gs2_b64);
        let client_final_no_proof = format!("{},r={}", channel_binding, server_nonce);

        let salted_password = pbkdf2_derive(self.hash, self.password.as_bytes(), &salt, iterations);
        let client_key = hmac_bytes(self.hash, &salted_password, b"Client Key");
        let stored_key = h(self.hash, &client_key);

        let auth_message =
            format!("{},{},{}", self.client_first_bare, server_first, client_final_no_proof);

        let client_signature = hmac_bytes(self.hash, &stored_key, auth_message.as_bytes());
        let client_proof = xor(&client_key, &client_signature);

        let server_key = hmac_bytes(self.hash, &salted_password, b"Server Key");
        let server_signature = hmac_bytes(self.hash, &server_key, auth_message.as_bytes());

        self.step = Step::AwaitingServerFinal { server_signature };

        Ok(format!("{},p={}", client_final_no_proof, STANDARD.encode(client_proof)).into_bytes())
    }

    fn verify_server_final(&mut self, server_final: &str, expected: &[u8]) -> Result<(), SaslError> {
        let attrs = parse_attrs(server_final);
        if let Some(err) = attrs.get(&'e') {
            return Err(SaslError::new(format!("SCRAM authentication failed: {}", err)));
        }
        let v = attrs.get(&'v').ok_or_else(|| SaslError::new("SCRAM server-final missing verifier"))?;
        let got = STANDARD.decode(v).map_err(|e| SaslError::new(format!("invalid SCRAM verifier: {}", e)))?;
        if got != expected {
            return Err(SaslError::new("SCRAM server signature does not match"));
        }
        Ok(())
    }
}

impl SaslMechanism for ScramMechanism {
    fn name(&self) -> &'static str {
        match self.hash {
            ScramHash::Sha1 => "SCRAM-SHA-1",
            ScramHash::Sha256 => "SCRAM-SHA-256",
        }
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        Some(self.client_first_message())
    }

    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, SaslError> {
        let text = std::str::from_utf8(challenge).map_err(|_| SaslError::new("SCRAM challenge is not UTF-8"))?;
        match std::mem::replace(&mut self.step, Step::Done) {
            Step::ClientFirst => {
                let msg = self.client_final_message(text)?;
                Ok(msg)
            }
            Step::AwaitingServerFinal { server_signature } => {
                self.verify_server_final(text, &server_signature)?;
                Ok(Vec::new())
            }
            Step::Done => Err(SaslError::new("SCRAM exchange already complete")),
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.step, Step::Done)
    }
}

pub struct ScramSha1(ScramMechanism);

impl ScramSha1 {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self(ScramMechanism::new(ScramHash::Sha1, username, password))
    }
}

impl SaslMechanism for ScramSha1 {
    fn name(&self) -> &'static str {
        self.0.name()
    }
    fn initial_response(&mut self) -> Option<Vec<u8>> {
        self.0.initial_response()
    }
    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, SaslError> {
        self.0.respond(challenge)
    }
    fn is_complete(&self) -> bool {
        self.0.is_complete()
    }
}

pub struct ScramSha256(ScramMechanism);

impl ScramSha256 {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self(ScramMechanism::new(ScramHash::Sha256, username, password))
    }
}

impl SaslMechanism for ScramSha256 {
    fn name(&self) -> &'static str {
        self.0.name()
    }
    fn initial_response(&mut self) -> Option<Vec<u8>> {
        self.0.initial_response()
    }
    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, SaslError> {
        self.0.respond(challenge)
    }
    fn is_complete(&self) -> bool {
        self.0.is_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_first_message_carries_gs2_header_and_username() {
        let mut mech = ScramSha256::new("user", "pencil");
        let msg = mech.initial_response().unwrap();
        let text = String::from_utf8(msg).unwrap();
        assert!(text.starts_with("n,,n=user,r="));
    }

    #[test]
    fn full_exchange_verifies_matching_server_signature() {
        let mut mech = ScramMechanism::new(ScramHash::Sha256, "user", "pencil");
        mech.initial_response().unwrap();

        let salt = STANDARD.encode(b"saltsalt");
        let iterations = 4096u32;
        let server_nonce = format!("{}SERVERPART", mech.client_nonce);
        let server_first = format!("r={},s={},i={}", server_nonce, salt, iterations);

        let client_final = mech.respond(server_first.as_bytes()).unwrap();
        let client_final_text = String::from_utf8(client_final).unwrap();
        assert!(client_final_text.contains(&format!("r={}", server_nonce)));
        assert!(client_final_text.contains("p="));

        // Recompute the expected server signature the same way a
        // compliant server would, to produce a server-final that verifies.
        let salted = pbkdf2_derive(ScramHash::Sha256, b"pencil", b"saltsalt", iterations);
        let server_key = hmac_bytes(ScramHash::Sha256, &salted, b"Server Key");
        let client_first_bare = format!("n=user,r={}", mech.client_nonce);
        let gs2_b64 = STANDARD.encode(b"n,,");
        let client_final_no_proof = format!("c={},r={}", gs2_b64, server_nonce);
        let auth_message = format!("{},{},{}", client_first_bare, server_first, client_final_no_proof);
        let server_signature = hmac_bytes(ScramHash::Sha256, &server_key, auth_message.as_bytes());
        let server_final = format!("v={}", STANDARD.encode(server_signature));

        let last = mech.respond(server_final.as_bytes()).unwrap();
        assert!(last.is_empty());
        assert!(mech.is_complete());
    }

    #[test]
    fn rejects_nonce_that_does_not_extend_client_nonce() {
        let mut mech = ScramMechanism::new(ScramHash::Sha1, "user", "pw");
        mech.initial_response().unwrap();
        let bogus = format!("r=totally-different,s={},i=4096", STANDARD.encode(b"salt"));
        assert!(mech.respond(bogus.as_bytes()).is_err());
    }

    #[test]
    fn saslname_escapes_comma_and_equals() {
        assert_eq!(saslname("a=b,c"), "a=3Db=2Cc");
    }
}
