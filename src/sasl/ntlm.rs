/*
 * ntlm.rs
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

//! SASL NTLM (MS-NLMP), NTLMv2 variant: Type-1 negotiate sent as the
//! initial response, Type-2 challenge parsed for the server nonce and
//! target info, Type-3 authenticate computed from an HMAC-MD5 chain over
//! the MD4 NT hash.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;

use super::{SaslError, SaslMechanism};

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const NEGOTIATE_OEM: u32 = 0x0000_0002;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_EXTENDED_SESSION_SECURITY: u32 = 0x0008_0000;
const NEGOTIATE_128: u32 = 0x2000_0000;
const NEGOTIATE_56: u32 = 0x8000_0000;

pub struct Ntlm {
    domain: String,
    username: String,
    password: String,
    state: Step,
}

enum Step {
    Start,
    AwaitingChallenge,
    Done,
}

impl Ntlm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { domain: String::new(), username: username.into(), password: password.into(), state: Step::Start }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }
}

fn type1_message(domain: &str, workstation: &str) -> Vec<u8> {
    let flags = NEGOTIATE_UNICODE
        | NEGOTIATE_OEM
        | REQUEST_TARGET
        | NEGOTIATE_NTLM
        | NEGOTIATE_ALWAYS_SIGN
        | NEGOTIATE_EXTENDED_SESSION_SECURITY
        | NEGOTIATE_128
        | NEGOTIATE_56;
    let mut msg = Vec::new();
    msg.extend_from_slice(b"NTLMSSP\0");
    msg.extend_from_slice(&1u32.to_le_bytes());
    msg.extend_from_slice(&flags.to_le_bytes());
    // domain and workstation security buffers: len/maxlen/offset, both empty here.
    let offset = 32u32;
    msg.extend_from_slice(&(domain.len() as u16).to_le_bytes());
    msg.extend_from_slice(&(domain.len() as u16).to_le_bytes());
    msg.extend_from_slice(&offset.to_le_bytes());
    msg.extend_from_slice(&(workstation.len() as u16).to_le_bytes());
    msg.extend_from_slice(&(workstation.len() as u16).to_le_bytes());
    msg.extend_from_slice(&(offset + domain.len() as u32).to_le_bytes());
    msg.extend_from_slice(domain.as_bytes());
    msg.extend_from_slice(workstation.as_bytes());
    msg
}

struct Type2 {
    server_challenge: [u8; 8],
    target_info: Vec<u8>,
}

fn parse_type2(msg: &[u8]) -> Result<Type2, SaslError> {
    if msg.len() < 32 || &msg[0..8] != b"NTLMSSP\0" {
        return Err(SaslError::new("malformed NTLM type-2 message"));
    }
    let mut challenge = [0u8; 8];
    challenge.copy_from_slice(&msg[24..32]);

    let target_info = if msg.len() >= 48 {
        let len = u16::from_le_bytes([msg[40], msg[41]]) as usize;
        let offset = u32::from_le_bytes([msg[44], msg[45], msg[46], msg[47]]) as usize;
        if offset + len <= msg.len() {
            msg[offset..offset + len].to_vec()
        } else {
            Vec::new()
        }
    } else {
        Vec::new()
    };

    Ok(Type2 { server_challenge: challenge, target_info })
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn hmac_md5(key: &[u8], data: &[u8]) -> [u8; 16] {
    let mut mac = Hmac::<Md5>::new_from_slice(key).expect("HMAC-MD5 accepts any key length");
    mac.update(data);
    let mut out = [0u8; 16];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn nt_hash(password: &str) -> [u8; 16] {
    let mut hasher = Md4::new();
    hasher.update(utf16le(password));
    let digest = hasher.finalize();
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest);
    out
}

/// `HMAC-MD5(NT_hash, UPPER(username) || domain)`, the NTLMv2 key.
fn ntlmv2_hash(username: &str, domain: &str, password: &str) -> [u8; 16] {
    let nth = nt_hash(password);
    let identity = utf16le(&format!("{}{}", username.to_uppercase(), domain));
    hmac_md5(&nth, &identity)
}

/// Builds the Type-3 NTLMv2 response blob and its HMAC, given the server
/// challenge, a fresh 8-byte client challenge and a 64-bit Windows epoch
/// timestamp. Split out from [`Ntlm::respond`] so tests can supply fixed
/// values instead of depending on the system clock.
fn ntlmv2_response(
    username: &str,
    domain: &str,
    password: &str,
    server_challenge: &[u8; 8],
    target_info: &[u8],
    client_challenge: [u8; 8],
    timestamp: u64,
) -> Vec<u8> {
    let v2hash = ntlmv2_hash(username, domain, password);

    let mut blob = Vec::new();
    blob.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let mut hmac_input = Vec::with_capacity(8 + blob.len());
    hmac_input.extend_from_slice(server_challenge);
    hmac_input.extend_from_slice(&blob);
    let nt_proof = hmac_md5(&v2hash, &hmac_input);

    let mut response = Vec::with_capacity(16 + blob.len());
    response.extend_from_slice(&nt_proof);
    response.extend_from_slice(&blob);
    response
}

fn windows_epoch_now() -> u64 {
    // 100ns intervals since 1601-01-01, matching MS-NLMP's timestamp field.
    let unix = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    (unix.as_secs() + 11_644_473_600) * 10_000_000 + u64::from(unix.subsec_nanos()) / 100
}

fn random_client_challenge() -> [u8; 8] {
    let seed = windows_epoch_now();
    let mut out = [0u8; 8];
    out.copy_from_slice(&seed.to_le_bytes());
    out
}

fn type3_message(domain: &str, username: &str, workstation: &str, nt_response: &[u8]) -> Vec<u8> {
    let domain_u = utf16le(domain);
    let username_u = utf16le(username);
    let workstation_u = utf16le(workstation);
    let lm_response = vec![0u8; 24];

    let header_len = 64;
    let mut offset = header_len as u32;

    let lm_off = offset;
    offset += lm_response.len() as u32;
    let nt_off = offset;
    offset += nt_response.len() as u32;
    let domain_off = offset;
    offset += domain_u.len() as u32;
    let user_off = offset;
    offset += username_u.len() as u32;
    let ws_off = offset;
    offset += workstation_u.len() as u32;
    let session_key_off = offset;

    let flags = NEGOTIATE_UNICODE | NEGOTIATE_NTLM | NEGOTIATE_EXTENDED_SESSION_SECURITY | NEGOTIATE_128;

    let mut msg = Vec::new();
    msg.extend_from_slice(b"NTLMSSP\0");
    msg.extend_from_slice(&3u32.to_le_bytes());

    let mut sec_buf = |len: u32, off: u32, out: &mut Vec<u8>| {
        out.extend_from_slice(&(len as u16).to_le_bytes());
        out.extend_from_slice(&(len as u16).to_le_bytes());
        out.extend_from_slice(&off.to_le_bytes());
    };
    sec_buf(lm_response.len() as u32, lm_off, &mut msg);
    sec_buf(nt_response.len() as u32, nt_off, &mut msg);
    sec_buf(domain_u.len() as u32, domain_off, &mut msg);
    sec_buf(username_u.len() as u32, user_off, &mut msg);
    sec_buf(workstation_u.len() as u32, ws_off, &mut msg);
    sec_buf(0, session_key_off, &mut msg);

    msg.extend_from_slice(&flags.to_le_bytes());

    msg.extend_from_slice(&lm_response);
    msg.extend_from_slice(nt_response);
    msg.extend_from_slice(&domain_u);
    msg.extend_from_slice(&username_u);
    msg.extend_from_slice(&workstation_u);

    msg
}

impl SaslMechanism for Ntlm {
    fn name(&self) -> &'static str {
        "NTLM"
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        self.state = Step::AwaitingChallenge;
        Some(type1_message(&self.domain, ""))
    }

    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>, SaslError> {
        if !matches!(self.state, Step::AwaitingChallenge) {
            return Err(SaslError::new("NTLM challenge received out of order"));
        }
        let type2 = parse_type2(challenge)?;
        let client_challenge = random_client_challenge();
        let timestamp = windows_epoch_now();
        let nt_response = ntlmv2_response(
            &self.username,
            &self.domain,
            &self.password,
            &type2.server_challenge,
            &type2.target_info,
            client_challenge,
            timestamp,
        );
        self.state = Step::Done;
        Ok(type3_message(&self.domain, &self.username, "", &nt_response))
    }

    fn is_complete(&self) -> bool {
        matches!(self.state, Step::Done)
    }
}
