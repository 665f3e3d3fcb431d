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

//! The ESMTP session state machine: EHLO/HELO, optional STARTTLS, AUTH,
//! and envelope submission in its three shapes — sequential DATA,
//! PIPELINING, and chunked BDAT.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::capabilities::CapabilitySet;
use crate::decode::SmtpResponseDecoder;
use crate::error::{Phase, ProtocolError};
use crate::sasl::{choose_authentication, SaslMechanism};
use crate::transport::Transport;

use super::dot_stuffer::DotStuffer;

/// Per-recipient result of an envelope submission: the address plus the
/// response code/text the server gave it. A submission only fails outright
/// when every recipient was rejected.
#[derive(Debug, Clone)]
pub struct RecipientResult {
    pub address: String,
    pub accepted: bool,
    pub code: u16,
    pub text: String,
}

/// `MAIL FROM`/`RCPT TO` extension parameters, rendered as `NAME=value` or
/// bare `NAME` when `value` is empty.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeParams(pub Vec<(String, String)>);

impl EnvelopeParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((name.into(), value.into()));
        self
    }

    fn render(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| if v.is_empty() { k.clone() } else { format!("{}={}", k, v) })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct SmtpSession<T: Transport> {
    transport: T,
    decoder: SmtpResponseDecoder,
    phase: Phase,
    capabilities: CapabilitySet,
    greeting_domain: String,
}

/// Extracts a leading `X.Y.Z` enhanced status code from response text, if
/// present (RFC 3463).
fn enhanced_status_code(text: &str) -> Option<String> {
    let mut words = text.splitn(2, ' ');
    let first = words.next()?;
    let parts: Vec<&str> = first.split('.').collect();
    if parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())) {
        Some(first.to_string())
    } else {
        None
    }
}

impl<T: Transport> SmtpSession<T> {
    /// Read the 220 greeting and build a session in `Connected` phase.
    pub async fn connect(transport: T) -> Result<Self, ProtocolError> {
        let mut session = Self {
            transport,
            decoder: SmtpResponseDecoder::new(),
            phase: Phase::Connected,
            capabilities: CapabilitySet::new(),
            greeting_domain: String::new(),
        };
        let resp = session.next_response().await?;
        if resp.code != 220 {
            return Err(ProtocolError::SmtpError { code: resp.code, enhanced: None, text: resp.message() });
        }
        session.greeting_domain = resp.message();
        Ok(session)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
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

    async fn next_response(&mut self) -> Result<crate::decode::SmtpResponse, ProtocolError> {
        loop {
            if let Some(resp) = self.decoder.poll()? {
                return Ok(resp);
            }
            let chunk = self.transport.read_chunk().await.map_err(|e| ProtocolError::TransportRead(e.to_string()))?;
            if chunk.is_empty() {
                return Err(ProtocolError::TransportRead("connection closed".to_string()));
            }
            self.decoder.push(&chunk);
        }
    }

    fn to_error(resp: &crate::decode::SmtpResponse) -> ProtocolError {
        let text = resp.message();
        ProtocolError::SmtpError { code: resp.code, enhanced: enhanced_status_code(&text), text }
    }

    async fn command(&mut self, line: &str) -> Result<crate::decode::SmtpResponse, ProtocolError> {
        self.write_line(line).await?;
        self.next_response().await
    }

    async fn expect_success(&mut self, line: &str) -> Result<crate::decode::SmtpResponse, ProtocolError> {
        let resp = self.command(line).await?;
        if resp.is_success() {
            Ok(resp)
        } else {
            Err(Self::to_error(&resp))
        }
    }

    /// EHLO first; on a `5xx` reply fall back to HELO (no capabilities in
    /// that case — HELO servers have none to offer).
    pub async fn ehlo(&mut self, hostname: &str) -> Result<CapabilitySet, ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let resp = self.command(&format!("EHLO {}", hostname)).await?;
        if resp.is_permanent() {
            self.expect_success(&format!("HELO {}", hostname)).await?;
            self.capabilities = CapabilitySet::new();
            return Ok(self.capabilities.clone());
        }
        if !resp.is_success() {
            return Err(Self::to_error(&resp));
        }
        // First line is the server's greeting domain, not a capability.
        let mut caps = CapabilitySet::new();
        for line in resp.lines.iter().skip(1) {
            let mut words = line.split_whitespace();
            let Some(name) = words.next() else { continue };
            let rest: Vec<&str> = words.collect();
            let value = if rest.is_empty() { None } else { Some(rest.join(" ")) };
            caps.insert(name, value);
        }
        self.capabilities = caps.clone();
        Ok(caps)
    }

    pub async fn start_tls(&mut self, validate_cert: bool) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        if !self.capabilities.has("STARTTLS") {
            return Err(ProtocolError::StartTlsNotSupported);
        }
        self.expect_success("STARTTLS").await?;
        self.transport.start_tls(validate_cert).await.map_err(|e| ProtocolError::TransportWrite(e.to_string()))?;
        self.capabilities.clear();
        self.decoder = SmtpResponseDecoder::new();
        Ok(())
    }

    /// Drive a SASL mechanism through `AUTH mech [initial-response]` and
    /// any subsequent `334 base64challenge` continuation rounds.
    pub async fn authenticate(&mut self, mut mechanism: Box<dyn SaslMechanism>) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let mut cmd = format!("AUTH {}", mechanism.name());
        if let Some(initial) = mechanism.initial_response() {
            cmd.push(' ');
            let encoded = STANDARD.encode(initial);
            cmd.push_str(if encoded.is_empty() { "=" } else { &encoded });
        }
        let mut resp = self.command(&cmd).await?;
        loop {
            match resp.code {
                235 => {
                    self.phase = Phase::Authenticated;
                    return Ok(());
                }
                334 => {
                    let challenge = STANDARD
                        .decode(resp.message().trim())
                        .map_err(|e| ProtocolError::bad_response(format!("invalid base64 challenge: {}", e)))?;
                    let response = mechanism.respond(&challenge)?;
                    resp = self.command(&STANDARD.encode(response)).await?;
                }
                _ => return Err(ProtocolError::AuthenticationFailed(resp.message())),
            }
        }
    }

    /// Choose the best SASL mechanism from the EHLO-advertised `AUTH` line
    /// (priority CRAM-MD5 > NTLM > PLAIN > LOGIN; XOAUTH2 only when an
    /// access token is supplied) and drive it to completion.
    pub async fn authenticate_best(&mut self, username: &str, password: &str, access_token: Option<&str>) -> Result<(), ProtocolError> {
        let offered = self.capabilities.smtp_auth_mechanisms();
        let mechanism = choose_authentication(username, password, access_token, &offered)
            .ok_or_else(|| ProtocolError::AuthenticationFailed("no mutually supported SASL mechanism".to_string()))?;
        self.authenticate(mechanism).await
    }

    async fn mail_from(&mut self, from: &str, params: &EnvelopeParams) -> Result<(), ProtocolError> {
        let rendered = params.render();
        let cmd = if rendered.is_empty() {
            format!("MAIL FROM:<{}>", from)
        } else {
            format!("MAIL FROM:<{}> {}", from, rendered)
        };
        self.expect_success(&cmd).await?;
        Ok(())
    }

    /// `RCPT TO` for one recipient; `2xx` (including `251`/`252`) is
    /// accepted, everything else is recorded as a per-recipient rejection
    /// rather than surfaced immediately.
    async fn rcpt_to(&mut self, rcpt: &str, params: &EnvelopeParams) -> Result<RecipientResult, ProtocolError> {
        let rendered = params.render();
        let cmd = if rendered.is_empty() {
            format!("RCPT TO:<{}>", rcpt)
        } else {
            format!("RCPT TO:<{}> {}", rcpt, rendered)
        };
        let resp = self.command(&cmd).await?;
        Ok(RecipientResult { address: rcpt.to_string(), accepted: resp.is_success(), code: resp.code, text: resp.message() })
    }

    fn prepare_dot_stuffed(message: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(message.len() + 8);
        let mut stuffer = DotStuffer::new();
        stuffer.process_chunk(message, |s| out.extend_from_slice(s));
        stuffer.end_message(|s| out.extend_from_slice(s));
        out
    }

    /// Sequential-DATA submission: `MAIL FROM` → per-recipient `RCPT TO`
    /// (collecting failures, failing only if every recipient was rejected)
    /// → `DATA` → dot-stuffed payload ending in `\r\n.\r\n` → final reply.
    pub async fn send_mail(
        &mut self,
        from: &str,
        mail_params: &EnvelopeParams,
        recipients: &[&str],
        rcpt_params: &EnvelopeParams,
        message: &[u8],
    ) -> Result<Vec<RecipientResult>, ProtocolError> {
        self.require_phase(Phase::Connected)?;
        self.mail_from(from, mail_params).await?;

        let mut results = Vec::with_capacity(recipients.len());
        for rcpt in recipients {
            results.push(self.rcpt_to(rcpt, rcpt_params).await?);
        }
        if results.iter().all(|r| !r.accepted) {
            let first = &results[0];
            return Err(ProtocolError::SmtpError { code: first.code, enhanced: enhanced_status_code(&first.text), text: first.text.clone() });
        }

        let data_resp = self.command("DATA").await?;
        if data_resp.code != 354 {
            return Err(Self::to_error(&data_resp));
        }
        let stuffed = Self::prepare_dot_stuffed(message);
        self.transport.write(&stuffed).await.map_err(|e| ProtocolError::TransportWrite(e.to_string()))?;
        let final_resp = self.next_response().await?;
        if !final_resp.is_success() {
            return Err(Self::to_error(&final_resp));
        }
        Ok(results)
    }

    /// PIPELINING submission: write `MAIL`+`RCPT`*+`DATA` back-to-back with
    /// no intervening reads, then drain the responses in order. Only valid
    /// when the server advertises `PIPELINING`.
    pub async fn send_mail_pipelined(
        &mut self,
        from: &str,
        mail_params: &EnvelopeParams,
        recipients: &[&str],
        rcpt_params: &EnvelopeParams,
        message: &[u8],
    ) -> Result<Vec<RecipientResult>, ProtocolError> {
        self.require_phase(Phase::Connected)?;
        if !self.capabilities.has("PIPELINING") {
            return Err(ProtocolError::bad_response("server does not advertise PIPELINING"));
        }

        let mail_rendered = mail_params.render();
        let mut batch = if mail_rendered.is_empty() {
            format!("MAIL FROM:<{}>\r\n", from)
        } else {
            format!("MAIL FROM:<{}> {}\r\n", from, mail_rendered)
        };
        let rcpt_rendered = rcpt_params.render();
        for rcpt in recipients {
            if rcpt_rendered.is_empty() {
                batch.push_str(&format!("RCPT TO:<{}>\r\n", rcpt));
            } else {
                batch.push_str(&format!("RCPT TO:<{}> {}\r\n", rcpt, rcpt_rendered));
            }
        }
        batch.push_str("DATA\r\n");
        self.transport.write(batch.as_bytes()).await.map_err(|e| ProtocolError::TransportWrite(e.to_string()))?;

        let mail_resp = self.next_response().await?;
        if !mail_resp.is_success() {
            return Err(Self::to_error(&mail_resp));
        }

        let mut results = Vec::with_capacity(recipients.len());
        for rcpt in recipients {
            let resp = self.next_response().await?;
            results.push(RecipientResult { address: rcpt.to_string(), accepted: resp.is_success(), code: resp.code, text: resp.message() });
        }
        if results.iter().all(|r| !r.accepted) {
            let first = &results[0];
            return Err(ProtocolError::SmtpError { code: first.code, enhanced: enhanced_status_code(&first.text), text: first.text.clone() });
        }

        let data_resp = self.next_response().await?;
        if data_resp.code != 354 {
            return Err(Self::to_error(&data_resp));
        }
        let stuffed = Self::prepare_dot_stuffed(message);
        self.transport.write(&stuffed).await.map_err(|e| ProtocolError::TransportWrite(e.to_string()))?;
        let final_resp = self.next_response().await?;
        if !final_resp.is_success() {
            return Err(Self::to_error(&final_resp));
        }
        Ok(results)
    }

    /// Chunked `BDAT` submission: one `BDAT n` per chunk, the final one
    /// `BDAT n LAST`. No dot-stuffing is performed. Only valid when the
    /// server advertises `CHUNKING`.
    pub async fn send_mail_chunked(
        &mut self,
        from: &str,
        mail_params: &EnvelopeParams,
        recipients: &[&str],
        rcpt_params: &EnvelopeParams,
        chunks: &[&[u8]],
    ) -> Result<Vec<RecipientResult>, ProtocolError> {
        self.require_phase(Phase::Connected)?;
        if !self.capabilities.has("CHUNKING") {
            return Err(ProtocolError::bad_response("server does not advertise CHUNKING"));
        }
        self.mail_from(from, mail_params).await?;

        let mut results = Vec::with_capacity(recipients.len());
        for rcpt in recipients {
            results.push(self.rcpt_to(rcpt, rcpt_params).await?);
        }
        if results.iter().all(|r| !r.accepted) {
            let first = &results[0];
            return Err(ProtocolError::SmtpError { code: first.code, enhanced: enhanced_status_code(&first.text), text: first.text.clone() });
        }

        let last_index = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            let is_last = i == last_index;
            let verb = if is_last { format!("BDAT {} LAST", chunk.len()) } else { format!("BDAT {}", chunk.len()) };
            self.write_line(&verb).await?;
            self.transport.write(chunk).await.map_err(|e| ProtocolError::TransportWrite(e.to_string()))?;
            let resp = self.next_response().await?;
            if !resp.is_success() {
                return Err(Self::to_error(&resp));
            }
        }
        Ok(results)
    }

    pub async fn vrfy(&mut self, address: &str) -> Result<String, ProtocolError> {
        self.require_phase(Phase::Connected)?;
        self.expect_success(&format!("VRFY {}", address)).await.map(|r| r.message())
    }

    pub async fn expn(&mut self, list: &str) -> Result<Vec<String>, ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let resp = self.expect_success(&format!("EXPN {}", list)).await?;
        Ok(resp.lines)
    }

    pub async fn help(&mut self, topic: Option<&str>) -> Result<Vec<String>, ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let cmd = match topic {
            Some(t) => format!("HELP {}", t),
            None => "HELP".to_string(),
        };
        let resp = self.expect_success(&cmd).await?;
        Ok(resp.lines)
    }

    pub async fn etrn(&mut self, domain: &str) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        self.expect_success(&format!("ETRN {}", domain)).await.map(|_| ())
    }

    pub async fn noop(&mut self) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        self.expect_success("NOOP").await.map(|_| ())
    }

    pub async fn rset(&mut self) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        self.expect_success("RSET").await.map(|_| ())
    }

    pub async fn quit(&mut self) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let resp = self.expect_success("QUIT").await;
        self.phase = Phase::LoggedOut;
        resp.map(|_| ())
    }
}
