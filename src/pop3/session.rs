/*
 * session.rs
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

//! The POP3 session state machine: greeting, USER/PASS or APOP or SASL
//! `AUTH`, then STAT/LIST/UIDL/RETR/TOP/DELE/RSET/NOOP/LAST/QUIT. Only
//! `Authenticated`-phase commands need a selected mailbox — POP3 has no
//! analogue of IMAP's selected state, every authenticated session sees
//! the whole maildrop.

use base64::{engine::general_purpose::STANDARD, Engine};
use md5::{Digest, Md5};

use crate::capabilities::CapabilitySet;
use crate::decode::{Pop3Event, Pop3MultilineDecoder, Pop3Status};
use crate::error::{Phase, ProtocolError};
use crate::sasl::{choose_authentication, SaslMechanism};
use crate::transport::Transport;

/// `STAT` reply: message count and total size in octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub count: u32,
    pub total_size: u64,
}

/// One `LIST`/`UIDL` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pop3ListEntry {
    pub msg_no: u32,
    pub value: String,
}

/// A `RETR`/`TOP` body: the three surface shapes `spec.md` §4.4 requires,
/// all derived from the same dot-unstuffed event stream.
pub struct MessageBody {
    lines: Vec<Vec<u8>>,
}

impl MessageBody {
    /// UTF-8 decoded line by line; invalid bytes are replaced, never an error.
    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().map(|l| String::from_utf8_lossy(l).to_string()).collect()
    }

    /// The exact 8-bit-clean payload, lines rejoined with CRLF and no
    /// trailing terminator.
    pub fn raw_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(line);
        }
        out
    }
}

pub struct Pop3Session<T: Transport> {
    transport: T,
    decoder: Pop3MultilineDecoder,
    phase: Phase,
    capabilities: CapabilitySet,
    apop_challenge: Option<String>,
    greeting: String,
}

impl<T: Transport> Pop3Session<T> {
    /// Read the server greeting and extract the APOP challenge (the
    /// angle-bracketed nonce), if the greeting carries one.
    pub async fn connect(transport: T) -> Result<Self, ProtocolError> {
        let mut session = Self {
            transport,
            decoder: Pop3MultilineDecoder::new(),
            phase: Phase::Connected,
            capabilities: CapabilitySet::new(),
            apop_challenge: None,
            greeting: String::new(),
        };
        let (status, message) = session.read_status().await?;
        if status != Pop3Status::Ok {
            return Err(ProtocolError::Pop3Error(message));
        }
        session.apop_challenge = extract_apop_challenge(&message);
        session.greeting = message;
        Ok(session)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    fn require_phase(&self, required: Phase) -> Result<(), ProtocolError> {
        let ok = match required {
            Phase::Connected => !matches!(self.phase, Phase::Disconnected | Phase::LoggedOut),
            Phase::Authenticated => matches!(self.phase, Phase::Authenticated),
            _ => true,
        };
        if ok {
            Ok(())
        } else {
            Err(ProtocolError::invalid_phase(required, self.phase))
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        let mut bytes = Vec::with_capacity(line.len() + 2);
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        self.transport.write(&bytes).await.map_err(|e| ProtocolError::TransportWrite(e.to_string()))
    }

    async fn next_event(&mut self) -> Result<Pop3Event, ProtocolError> {
        loop {
            if let Some(event) = self.decoder.poll() {
                return Ok(event);
            }
            let chunk = self.transport.read_chunk().await.map_err(|e| ProtocolError::TransportRead(e.to_string()))?;
            if chunk.is_empty() {
                return Err(ProtocolError::TransportRead("connection closed".to_string()));
            }
            self.decoder.push(&chunk);
        }
    }

    async fn read_status(&mut self) -> Result<(Pop3Status, String), ProtocolError> {
        match self.next_event().await? {
            Pop3Event::Status { status, message } => Ok((status, message)),
            other => Err(ProtocolError::bad_response(format!("expected a status line, got {:?}", other))),
        }
    }

    /// Send a command whose reply is a single `+OK`/`-ERR` line.
    async fn simple_command(&mut self, cmd: &str) -> Result<String, ProtocolError> {
        self.write_line(cmd).await?;
        let (status, message) = self.read_status().await?;
        match status {
            Pop3Status::Ok => Ok(message),
            _ => Err(ProtocolError::Pop3Error(message)),
        }
    }

    /// Send a command whose successful reply is a dot-terminated multiline
    /// body. On `-ERR` there is no body to drain.
    async fn multiline_command(&mut self, cmd: &str) -> Result<Vec<Vec<u8>>, ProtocolError> {
        self.decoder.expect_multiline();
        self.write_line(cmd).await?;
        let (status, message) = self.read_status().await?;
        if status != Pop3Status::Ok {
            return Err(ProtocolError::Pop3Error(message));
        }
        let mut lines = Vec::new();
        loop {
            match self.next_event().await? {
                Pop3Event::BodyLine(line) => lines.push(line),
                Pop3Event::BodyEnd => break,
                other => return Err(ProtocolError::bad_response(format!("unexpected event in body: {:?}", other))),
            }
        }
        Ok(lines)
    }

    /// `USER`/`PASS` login.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        self.simple_command(&format!("USER {}", username)).await?;
        self.simple_command(&format!("PASS {}", password)).await.map_err(|e| match e {
            ProtocolError::Pop3Error(text) => ProtocolError::AuthenticationFailed(text),
            other => other,
        })?;
        self.phase = Phase::Authenticated;
        Ok(())
    }

    /// `APOP user md5(challenge + password)`. Fails if the greeting carried
    /// no angle-bracketed challenge.
    pub async fn apop(&mut self, username: &str, password: &str) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let challenge = self
            .apop_challenge
            .clone()
            .ok_or_else(|| ProtocolError::AuthenticationFailed("server greeting carried no APOP challenge".to_string()))?;
        let mut hasher = Md5::new();
        hasher.update(challenge.as_bytes());
        hasher.update(password.as_bytes());
        let digest = hex_encode(&hasher.finalize());
        self.simple_command(&format!("APOP {} {}", username, digest)).await.map_err(|e| match e {
            ProtocolError::Pop3Error(text) => ProtocolError::AuthenticationFailed(text),
            other => other,
        })?;
        self.phase = Phase::Authenticated;
        Ok(())
    }

    /// `CAPA`. Each reply line is one capability name optionally followed
    /// by space-separated parameters (`SASL PLAIN LOGIN CRAM-MD5`, bare
    /// `PIPELINING`); the `SASL` token's parameters double as the
    /// advertised mechanism list for [`Self::authenticate_best`].
    pub async fn capa(&mut self) -> Result<CapabilitySet, ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let lines = self.multiline_command("CAPA").await?;
        let mut caps = CapabilitySet::new();
        for raw in &lines {
            let line = String::from_utf8_lossy(raw).to_string();
            let mut words = line.split_whitespace();
            let Some(name) = words.next() else { continue };
            let rest: Vec<&str> = words.collect();
            let value = if rest.is_empty() { None } else { Some(rest.join(" ")) };
            caps.insert(name, value);
        }
        self.capabilities = caps.clone();
        Ok(caps)
    }

    /// Drive a SASL mechanism through `AUTH mech [initial-response]` and
    /// any subsequent `+ base64challenge` continuation rounds.
    pub async fn authenticate(&mut self, mut mechanism: Box<dyn SaslMechanism>) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let mut cmd = format!("AUTH {}", mechanism.name());
        if let Some(initial) = mechanism.initial_response() {
            cmd.push(' ');
            cmd.push_str(&STANDARD.encode(initial));
        }
        self.write_line(&cmd).await?;
        loop {
            let (status, message) = self.read_status().await?;
            match status {
                Pop3Status::Ok => {
                    self.phase = Phase::Authenticated;
                    return Ok(());
                }
                Pop3Status::Err => return Err(ProtocolError::AuthenticationFailed(message)),
                Pop3Status::Continuation => {
                    let challenge = STANDARD
                        .decode(message.trim())
                        .map_err(|e| ProtocolError::bad_response(format!("invalid base64 challenge: {}", e)))?;
                    let response = mechanism.respond(&challenge)?;
                    self.write_line(&STANDARD.encode(response)).await?;
                }
            }
        }
    }

    /// Choose the best SASL mechanism the server offers via `CAPA`'s `SASL`
    /// token (priority CRAM-MD5 > NTLM > PLAIN > LOGIN; XOAUTH2 only when
    /// an access token is supplied) and drive it to completion.
    pub async fn authenticate_best(&mut self, username: &str, password: &str, access_token: Option<&str>) -> Result<(), ProtocolError> {
        let caps = self.capa().await?;
        let offered: Vec<String> = caps.value("SASL").map(|v| v.split_whitespace().map(str::to_string).collect()).unwrap_or_default();
        let mechanism = choose_authentication(username, password, access_token, &offered)
            .ok_or_else(|| ProtocolError::AuthenticationFailed("no mutually supported SASL mechanism".to_string()))?;
        self.authenticate(mechanism).await
    }

    pub async fn stat(&mut self) -> Result<Stat, ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        let message = self.simple_command("STAT").await?;
        let mut parts = message.split_whitespace();
        let count = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let total_size = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        Ok(Stat { count, total_size })
    }

    pub async fn list(&mut self, msg_no: Option<u32>) -> Result<Vec<Pop3ListEntry>, ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        match msg_no {
            Some(n) => {
                let message = self.simple_command(&format!("LIST {}", n)).await?;
                Ok(vec![parse_list_entry(&message)].into_iter().flatten().collect())
            }
            None => {
                let lines = self.multiline_command("LIST").await?;
                Ok(lines.iter().filter_map(|l| parse_list_entry(&String::from_utf8_lossy(l))).collect())
            }
        }
    }

    pub async fn uidl(&mut self, msg_no: Option<u32>) -> Result<Vec<Pop3ListEntry>, ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        match msg_no {
            Some(n) => {
                let message = self.simple_command(&format!("UIDL {}", n)).await?;
                Ok(vec![parse_list_entry(&message)].into_iter().flatten().collect())
            }
            None => {
                let lines = self.multiline_command("UIDL").await?;
                Ok(lines.iter().filter_map(|l| parse_list_entry(&String::from_utf8_lossy(l))).collect())
            }
        }
    }

    pub async fn retr(&mut self, msg_no: u32) -> Result<MessageBody, ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        let lines = self.multiline_command(&format!("RETR {}", msg_no)).await?;
        Ok(MessageBody { lines })
    }

    /// `TOP msg n`: headers plus the first `n` lines of the body (`n = 0`
    /// for headers only).
    pub async fn top(&mut self, msg_no: u32, n: u32) -> Result<MessageBody, ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        let lines = self.multiline_command(&format!("TOP {} {}", msg_no, n)).await?;
        Ok(MessageBody { lines })
    }

    /// `RETR` with each dot-unstuffed line delivered to `on_line` as it
    /// arrives, for large messages the caller doesn't want to buffer whole.
    pub async fn retr_streaming<F>(&mut self, msg_no: u32, mut on_line: F) -> Result<(), ProtocolError>
    where
        F: FnMut(&[u8]),
    {
        self.require_phase(Phase::Authenticated)?;
        self.decoder.expect_multiline();
        self.write_line(&format!("RETR {}", msg_no)).await?;
        let (status, message) = self.read_status().await?;
        if status != Pop3Status::Ok {
            return Err(ProtocolError::Pop3Error(message));
        }
        loop {
            match self.next_event().await? {
                Pop3Event::BodyLine(line) => on_line(&line),
                Pop3Event::BodyEnd => return Ok(()),
                other => return Err(ProtocolError::bad_response(format!("unexpected event in body: {:?}", other))),
            }
        }
    }

    pub async fn dele(&mut self, msg_no: u32) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        self.simple_command(&format!("DELE {}", msg_no)).await.map(|_| ())
    }

    pub async fn rset(&mut self) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        self.simple_command("RSET").await.map(|_| ())
    }

    pub async fn noop(&mut self) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        self.simple_command("NOOP").await.map(|_| ())
    }

    /// `LAST`: highest message number already retrieved.
    pub async fn last(&mut self) -> Result<u32, ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        let message = self.simple_command("LAST").await?;
        message.split_whitespace().next().and_then(|s| s.parse().ok()).ok_or_else(|| {
            ProtocolError::bad_response(format!("LAST reply was not an integer: {:?}", message))
        })
    }

    pub async fn quit(&mut self) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let resp = self.simple_command("QUIT").await;
        self.phase = Phase::LoggedOut;
        resp.map(|_| ())
    }
}

fn parse_list_entry(line: &str) -> Option<Pop3ListEntry> {
    let mut parts = line.trim().splitn(2, ' ');
    let msg_no: u32 = parts.next()?.parse().ok()?;
    let value = parts.next().unwrap_or("").to_string();
    if msg_no == 0 {
        return None;
    }
    Some(Pop3ListEntry { msg_no, value })
}

/// Extract the angle-bracketed APOP nonce from a greeting, e.g.
/// `<1896.697170952@dbc.mtview.ca.us>`.
fn extract_apop_challenge(greeting: &str) -> Option<String> {
    let start = greeting.find('<')?;
    let end = greeting[start..].find('>')? + start;
    Some(greeting[start..=end].to_string())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedTransport {
        reads: VecDeque<Vec<u8>>,
        pub writes: Vec<Vec<u8>>,
    }

    impl ScriptedTransport {
        fn new(chunks: Vec<&[u8]>) -> Self {
            Self { reads: chunks.into_iter().map(|c| c.to_vec()).collect(), writes: Vec::new() }
        }
    }

    impl Transport for ScriptedTransport {
        async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
            self.writes.push(bytes.to_vec());
            Ok(())
        }

        async fn read_chunk(&mut self) -> std::io::Result<Vec<u8>> {
            Ok(self.reads.pop_front().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn connect_extracts_apop_challenge() {
        let greeting = b"+OK POP3 server ready <1896.697170952@dbc.mtview.ca.us>\r\n";
        let transport = ScriptedTransport::new(vec![greeting]);
        let session = Pop3Session::connect(transport).await.unwrap();
        assert_eq!(session.apop_challenge.as_deref(), Some("<1896.697170952@dbc.mtview.ca.us>"));
    }

    #[tokio::test]
    async fn login_transitions_to_authenticated() {
        let transport = ScriptedTransport::new(vec![b"+OK ready\r\n", b"+OK\r\n", b"+OK maildrop locked\r\n"]);
        let mut session = Pop3Session::connect(transport).await.unwrap();
        session.login("mrose", "tanstaaf").await.unwrap();
        assert_eq!(session.phase(), Phase::Authenticated);
    }

    #[tokio::test]
    async fn login_error_on_pass_is_authentication_failed() {
        let transport = ScriptedTransport::new(vec![b"+OK ready\r\n", b"+OK\r\n", b"-ERR invalid password\r\n"]);
        let mut session = Pop3Session::connect(transport).await.unwrap();
        let err = session.login("mrose", "wrong").await.unwrap_err();
        assert!(matches!(err, ProtocolError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn stat_parses_count_and_size() {
        let transport = ScriptedTransport::new(vec![b"+OK ready\r\n", b"+OK\r\n", b"+OK\r\n", b"+OK 2 320\r\n"]);
        let mut session = Pop3Session::connect(transport).await.unwrap();
        session.login("mrose", "tanstaaf").await.unwrap();
        let stat = session.stat().await.unwrap();
        assert_eq!(stat, Stat { count: 2, total_size: 320 });
    }

    #[tokio::test]
    async fn retr_streaming_dot_unstuffing_matches_spec_scenario() {
        let greeting = b"+OK ready\r\n".to_vec();
        let retr = b"+OK\r\n\r\n..\r\n..dot\r\nplain\r\n.\r\n".to_vec();
        let transport = ScriptedTransport::new(vec![&greeting, &retr]);
        let mut session = Pop3Session::connect(transport).await.unwrap();
        session.phase = Phase::Authenticated;
        let mut collected = Vec::new();
        session.retr_streaming(1, |line| collected.push(line.to_vec())).await.unwrap();
        assert_eq!(collected, vec![b"".to_vec(), b".".to_vec(), b".dot".to_vec(), b"plain".to_vec()]);
    }

    #[tokio::test]
    async fn list_single_message_does_not_expect_multiline() {
        let transport = ScriptedTransport::new(vec![b"+OK ready\r\n", b"+OK 1 120\r\n"]);
        let mut session = Pop3Session::connect(transport).await.unwrap();
        session.phase = Phase::Authenticated;
        let entries = session.list(Some(1)).await.unwrap();
        assert_eq!(entries, vec![Pop3ListEntry { msg_no: 1, value: "120".to_string() }]);
    }

    #[test]
    fn apop_challenge_extraction_ignores_trailing_text() {
        assert_eq!(
            extract_apop_challenge("POP3 ready <1896.697170952@dbc.mtview.ca.us> welcome"),
            Some("<1896.697170952@dbc.mtview.ca.us>".to_string())
        );
        assert_eq!(extract_apop_challenge("POP3 ready"), None);
    }
}
