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

//! The IMAP session state machine: phase gating, command dispatch, and the
//! glue between the wire decoder/parser and the selected-state reducer.
//! Only one command is ever in flight — pipelining belongs to a lower
//! client layer this crate doesn't provide.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::capabilities::CapabilitySet;
use crate::decode::ImapLiteralDecoder;
use crate::error::{Phase, ProtocolError};
use crate::flags::MessageFlags;
use crate::sasl::SaslMechanism;
use crate::transport::Transport;
use crate::uid::{UniqueIdMap, UniqueIdSet};

use super::fetch::FetchRequest;
use super::mailbox_name;
use super::response::{self, FrameTag, ImapStatus, ListEntry, ResponseCode, StatusResponse, UntaggedEvent};
use super::search::SearchQuery;
use super::selected_state::{self, SelectedState};
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Add,
    Remove,
    Replace,
}

struct IdleState {
    tag: String,
    buffered: Vec<UntaggedEvent>,
}

/// Everything a completed command observed: its final status/code/text
/// plus every untagged event folded in while it was in flight.
struct CommandResponse {
    status: ImapStatus,
    code: Option<ResponseCode>,
    text: String,
    untagged: Vec<UntaggedEvent>,
}

pub struct ImapSession<T: Transport> {
    transport: T,
    decoder: ImapLiteralDecoder,
    phase: Phase,
    capabilities: CapabilitySet,
    tag_counter: u32,
    selected: Option<SelectedState>,
    idle: Option<IdleState>,
    greeting: String,
}

fn quote_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl<T: Transport> ImapSession<T> {
    /// Read the server greeting over `transport` and build a session in
    /// `Connected` phase, or `Authenticated` directly on a `PREAUTH` greeting.
    pub async fn connect(transport: T) -> Result<Self, ProtocolError> {
        let mut session = Self {
            transport,
            decoder: ImapLiteralDecoder::new(),
            phase: Phase::Connected,
            capabilities: CapabilitySet::new(),
            tag_counter: 0,
            selected: None,
            idle: None,
            greeting: String::new(),
        };

        let (frame, _payloads) = session.next_frame().await?;
        if !matches!(frame.tag, FrameTag::Untagged) {
            return Err(ProtocolError::bad_response("expected untagged greeting"));
        }
        session.greeting = frame.text.clone();
        match frame.status {
            Some(ImapStatus::PreAuth) => session.phase = Phase::Authenticated,
            Some(ImapStatus::Bye) => {
                return Err(ProtocolError::ImapError { status: ImapStatus::Bye, text: frame.text });
            }
            _ => {}
        }
        if let Some(ResponseCode::Capability(caps)) = frame.code {
            session.capabilities = caps;
        }
        Ok(session)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn selected(&self) -> Option<&SelectedState> {
        self.selected.as_ref()
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    fn require_phase(&self, required: Phase) -> Result<(), ProtocolError> {
        let ok = match required {
            Phase::Connected => !matches!(self.phase, Phase::Disconnected | Phase::LoggedOut),
            Phase::Authenticated => matches!(self.phase, Phase::Authenticated | Phase::Selected),
            Phase::Selected => matches!(self.phase, Phase::Selected),
            _ => true,
        };
        if ok {
            Ok(())
        } else {
            Err(ProtocolError::invalid_phase(required, self.phase))
        }
    }

    fn next_tag(&mut self) -> String {
        self.tag_counter += 1;
        format!("A{:04}", self.tag_counter)
    }

    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        let mut bytes = Vec::with_capacity(line.len() + 2);
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        self.transport.write(&bytes).await.map_err(|e| ProtocolError::TransportWrite(e.to_string()))
    }

    async fn next_frame(&mut self) -> Result<(response::Frame, Vec<Vec<u8>>), ProtocolError> {
        loop {
            if let Some(msg) = self.decoder.poll() {
                let frame = response::parse_frame(&msg.line)
                    .ok_or_else(|| ProtocolError::bad_response(format!("unparseable line: {}", msg.line)))?;
                return Ok((frame, msg.payloads));
            }
            let chunk = self.transport.read_chunk().await.map_err(|e| ProtocolError::TransportRead(e.to_string()))?;
            if chunk.is_empty() {
                return Err(ProtocolError::TransportRead("connection closed".to_string()));
            }
            self.decoder.push(&chunk);
        }
    }

    fn apply_code(&mut self, code: &Option<ResponseCode>) {
        if let Some(code) = code {
            if let Some(state) = &mut self.selected {
                selected_state::apply_response_code(state, code);
            }
            if let ResponseCode::Capability(caps) = code {
                self.capabilities = caps.clone();
            }
        }
    }

    fn ingest_event(&mut self, event: &UntaggedEvent) {
        if let UntaggedEvent::Capability(caps) = event {
            self.capabilities = caps.clone();
        }
        if let Some(state) = &mut self.selected {
            selected_state::reduce(state, event);
        }
        if let Some(idle) = &mut self.idle {
            idle.buffered.push(event.clone());
        }
    }

    /// Read frames until the tagged reply for `tag` arrives, folding every
    /// untagged event into capabilities/selected-state along the way.
    async fn run_command(&mut self, tag: &str) -> Result<CommandResponse, ProtocolError> {
        let mut untagged = Vec::new();
        loop {
            let (frame, payloads) = self.next_frame().await?;
            self.apply_code(&frame.code);
            match frame.tag {
                FrameTag::Untagged => {
                    let event = response::parse_untagged_data(&frame.text, &payloads);
                    self.ingest_event(&event);
                    untagged.push(event);
                }
                FrameTag::Continuation => {
                    return Err(ProtocolError::bad_response("unexpected continuation while awaiting tagged reply"));
                }
                FrameTag::Tagged(t) if t == tag => {
                    let status = frame
                        .status
                        .ok_or_else(|| ProtocolError::bad_response("tagged reply missing status"))?;
                    return Ok(CommandResponse { status, code: frame.code, text: frame.text, untagged });
                }
                FrameTag::Tagged(_) => continue,
            }
        }
    }

    async fn send_command(&mut self, command: &str) -> Result<CommandResponse, ProtocolError> {
        let tag = self.next_tag();
        let line = format!("{} {}", tag, command);
        self.write_line(&line).await?;
        self.run_command(&tag).await
    }

    fn expect_ok(&self, resp: &CommandResponse) -> Result<(), ProtocolError> {
        if resp.status == ImapStatus::Ok {
            Ok(())
        } else {
            Err(ProtocolError::ImapError { status: resp.status, text: resp.text.clone() })
        }
    }

    pub async fn capability(&mut self) -> Result<CapabilitySet, ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let resp = self.send_command("CAPABILITY").await?;
        self.expect_ok(&resp)?;
        Ok(self.capabilities.clone())
    }

    pub async fn start_tls(&mut self, validate_cert: bool) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        if !self.capabilities.has("STARTTLS") {
            return Err(ProtocolError::StartTlsNotSupported);
        }
        let resp = self.send_command("STARTTLS").await?;
        self.expect_ok(&resp)?;
        self.transport
            .start_tls(validate_cert)
            .await
            .map_err(|e| ProtocolError::TransportWrite(e.to_string()))?;
        // RFC 3501 §6.2.1: capabilities must be discarded and re-queried post-upgrade.
        self.capabilities.clear();
        self.decoder = ImapLiteralDecoder::new();
        Ok(())
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let cmd = format!("LOGIN {} {}", quote_string(username), quote_string(password));
        let resp = self.send_command(&cmd).await?;
        self.expect_ok(&resp)?;
        self.phase = Phase::Authenticated;
        Ok(())
    }

    pub async fn authenticate(&mut self, mut mechanism: Box<dyn SaslMechanism>) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let offered = self.capabilities.imap_auth_mechanisms();
        if !offered.iter().any(|m| m.eq_ignore_ascii_case(mechanism.name())) {
            return Err(ProtocolError::AuthenticationFailed(format!(
                "server does not advertise AUTH={}",
                mechanism.name()
            )));
        }

        let tag = self.next_tag();
        let mut cmd = format!("{} AUTHENTICATE {}", tag, mechanism.name());
        if let Some(initial) = mechanism.initial_response() {
            cmd.push(' ');
            cmd.push_str(&STANDARD.encode(initial));
        }
        self.write_line(&cmd).await?;

        loop {
            let (frame, payloads) = self.next_frame().await?;
            self.apply_code(&frame.code);
            match frame.tag {
                FrameTag::Continuation => {
                    let challenge = STANDARD
                        .decode(frame.text.trim())
                        .map_err(|e| ProtocolError::bad_response(format!("invalid base64 challenge: {}", e)))?;
                    let response = mechanism.respond(&challenge)?;
                    let encoded = STANDARD.encode(response);
                    self.write_line(&encoded).await?;
                }
                FrameTag::Untagged => {
                    let event = response::parse_untagged_data(&frame.text, &payloads);
                    self.ingest_event(&event);
                }
                FrameTag::Tagged(t) if t == tag => {
                    return match frame.status {
                        Some(ImapStatus::Ok) => {
                            self.phase = Phase::Authenticated;
                            Ok(())
                        }
                        _ => Err(ProtocolError::AuthenticationFailed(frame.text)),
                    };
                }
                FrameTag::Tagged(_) => continue,
            }
        }
    }

    async fn select_impl(&mut self, mailbox: &str, read_only: bool) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        let verb = if read_only { "EXAMINE" } else { "SELECT" };
        let cmd = format!("{} {}", verb, quote_string(&mailbox_name::encode(mailbox)));
        self.selected = Some(SelectedState::new(mailbox.to_string()));
        match self.send_command(&cmd).await {
            Ok(resp) if resp.status == ImapStatus::Ok => {
                self.phase = Phase::Selected;
                Ok(())
            }
            Ok(resp) => {
                self.selected = None;
                Err(ProtocolError::ImapError { status: resp.status, text: resp.text })
            }
            Err(e) => {
                self.selected = None;
                Err(e)
            }
        }
    }

    pub async fn select(&mut self, mailbox: &str) -> Result<(), ProtocolError> {
        self.select_impl(mailbox, false).await
    }

    pub async fn examine(&mut self, mailbox: &str) -> Result<(), ProtocolError> {
        self.select_impl(mailbox, true).await
    }

    pub async fn close(&mut self) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Selected)?;
        let resp = self.send_command("CLOSE").await?;
        self.expect_ok(&resp)?;
        self.selected = None;
        self.phase = Phase::Authenticated;
        Ok(())
    }

    pub async fn unselect(&mut self) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Selected)?;
        if !self.capabilities.has("UNSELECT") {
            return Err(ProtocolError::bad_response("server does not advertise UNSELECT"));
        }
        let resp = self.send_command("UNSELECT").await?;
        self.expect_ok(&resp)?;
        self.selected = None;
        self.phase = Phase::Authenticated;
        Ok(())
    }

    pub async fn noop(&mut self) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let resp = self.send_command("NOOP").await?;
        self.expect_ok(&resp)
    }

    pub async fn logout(&mut self) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Connected)?;
        let resp = self.send_command("LOGOUT").await?;
        self.phase = Phase::LoggedOut;
        self.expect_ok(&resp)
    }

    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListEntry>, ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        let cmd = format!("LIST {} {}", quote_string(reference), quote_string(pattern));
        let resp = self.send_command(&cmd).await?;
        self.expect_ok(&resp)?;
        Ok(resp
            .untagged
            .into_iter()
            .filter_map(|e| if let UntaggedEvent::List(entry) = e { Some(entry) } else { None })
            .collect())
    }

    pub async fn lsub(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListEntry>, ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        let cmd = format!("LSUB {} {}", quote_string(reference), quote_string(pattern));
        let resp = self.send_command(&cmd).await?;
        self.expect_ok(&resp)?;
        Ok(resp
            .untagged
            .into_iter()
            .filter_map(|e| if let UntaggedEvent::Lsub(entry) = e { Some(entry) } else { None })
            .collect())
    }

    pub async fn status(&mut self, mailbox: &str, items: &[&str]) -> Result<StatusResponse, ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        let cmd = format!("STATUS {} ({})", quote_string(&mailbox_name::encode(mailbox)), items.join(" "));
        let resp = self.send_command(&cmd).await?;
        self.expect_ok(&resp)?;
        resp.untagged
            .into_iter()
            .find_map(|e| if let UntaggedEvent::Status(s) = e { Some(s) } else { None })
            .ok_or_else(|| ProtocolError::bad_response("STATUS reply carried no status data"))
    }

    pub async fn search(&mut self, query: &SearchQuery, use_uid: bool) -> Result<Vec<u32>, ProtocolError> {
        self.require_phase(Phase::Selected)?;
        let verb = if use_uid { "UID SEARCH" } else { "SEARCH" };
        let cmd = format!("{} {}", verb, query.serialize());
        let resp = self.send_command(&cmd).await?;
        self.expect_ok(&resp)?;
        Ok(resp
            .untagged
            .into_iter()
            .find_map(|e| if let UntaggedEvent::Search(ids) = e { Some(ids) } else { None })
            .unwrap_or_default())
    }

    pub async fn fetch(
        &mut self,
        set: &UniqueIdSet,
        request: &FetchRequest,
        use_uid: bool,
    ) -> Result<Vec<(u32, Vec<(String, Value)>)>, ProtocolError> {
        self.require_phase(Phase::Selected)?;
        let verb = if use_uid { "UID FETCH" } else { "FETCH" };
        let cmd = format!("{} {} {}", verb, set.serialize(), request.resolve());
        let resp = self.send_command(&cmd).await?;
        self.expect_ok(&resp)?;
        Ok(resp
            .untagged
            .into_iter()
            .filter_map(|e| if let UntaggedEvent::Fetch { seq, attrs } = e { Some((seq, attrs)) } else { None })
            .collect())
    }

    pub async fn store(
        &mut self,
        set: &UniqueIdSet,
        flags: &MessageFlags,
        mode: StoreMode,
        silent: bool,
        use_uid: bool,
    ) -> Result<Vec<(u32, Vec<String>)>, ProtocolError> {
        self.require_phase(Phase::Selected)?;
        let verb = if use_uid { "UID STORE" } else { "STORE" };
        let mut op = match mode {
            StoreMode::Add => "+FLAGS".to_string(),
            StoreMode::Remove => "-FLAGS".to_string(),
            StoreMode::Replace => "FLAGS".to_string(),
        };
        if silent {
            op.push_str(".SILENT");
        }
        let cmd = format!("{} {} {} ({})", verb, set.serialize(), op, flags.to_tokens().join(" "));
        let resp = self.send_command(&cmd).await?;
        self.expect_ok(&resp)?;
        Ok(resp
            .untagged
            .into_iter()
            .filter_map(|e| {
                let UntaggedEvent::Fetch { seq, attrs } = e else { return None };
                let flags = attrs
                    .iter()
                    .find(|(k, _)| k == "FLAGS")
                    .and_then(|(_, v)| v.as_list())
                    .map(|l| l.into_iter().filter_map(|v| v.as_text()).collect())
                    .unwrap_or_default();
                Some((seq, flags))
            })
            .collect())
    }

    async fn copy_or_move(&mut self, verb: &str, set: &UniqueIdSet, mailbox: &str) -> Result<Option<UniqueIdMap>, ProtocolError> {
        self.require_phase(Phase::Selected)?;
        let cmd = format!("{} {} {}", verb, set.serialize(), quote_string(&mailbox_name::encode(mailbox)));
        let resp = self.send_command(&cmd).await?;
        self.expect_ok(&resp)?;
        Ok(match resp.code {
            Some(ResponseCode::Copyuid(_, source, dest)) => Some(UniqueIdMap::from_copyuid(&source, &dest)),
            _ => None,
        })
    }

    pub async fn copy(&mut self, set: &UniqueIdSet, mailbox: &str, use_uid: bool) -> Result<Option<UniqueIdMap>, ProtocolError> {
        let verb = if use_uid { "UID COPY" } else { "COPY" };
        self.copy_or_move(verb, set, mailbox).await
    }

    pub async fn move_messages(&mut self, set: &UniqueIdSet, mailbox: &str, use_uid: bool) -> Result<Option<UniqueIdMap>, ProtocolError> {
        let verb = if use_uid { "UID MOVE" } else { "MOVE" };
        self.copy_or_move(verb, set, mailbox).await
    }

    pub async fn expunge(&mut self) -> Result<Vec<u32>, ProtocolError> {
        self.require_phase(Phase::Selected)?;
        let resp = self.send_command("EXPUNGE").await?;
        self.expect_ok(&resp)?;
        Ok(resp
            .untagged
            .into_iter()
            .filter_map(|e| if let UntaggedEvent::Expunge(seq) = e { Some(seq) } else { None })
            .collect())
    }

    /// Streams `message` as a `{N}` literal, pausing on the server's `+`
    /// continuation before writing the bytes and the terminating CRLF.
    pub async fn append(&mut self, mailbox: &str, flags: Option<&MessageFlags>, message: &[u8]) -> Result<Option<UniqueIdSet>, ProtocolError> {
        self.require_phase(Phase::Authenticated)?;
        let tag = self.next_tag();
        let mut cmd = format!("{} APPEND {}", tag, quote_string(&mailbox_name::encode(mailbox)));
        if let Some(f) = flags {
            let tokens = f.to_tokens().join(" ");
            if !tokens.is_empty() {
                cmd.push_str(&format!(" ({})", tokens));
            }
        }
        cmd.push_str(&format!(" {{{}}}", message.len()));
        self.write_line(&cmd).await?;

        loop {
            let (frame, payloads) = self.next_frame().await?;
            self.apply_code(&frame.code);
            match frame.tag {
                FrameTag::Continuation => break,
                FrameTag::Untagged => {
                    let event = response::parse_untagged_data(&frame.text, &payloads);
                    self.ingest_event(&event);
                }
                FrameTag::Tagged(t) if t == tag => {
                    return Err(ProtocolError::bad_response(format!(
                        "server rejected APPEND before the literal continuation: {}",
                        frame.text
                    )));
                }
                FrameTag::Tagged(_) => continue,
            }
        }

        self.transport.write(message).await.map_err(|e| ProtocolError::TransportWrite(e.to_string()))?;
        self.transport.write(b"\r\n").await.map_err(|e| ProtocolError::TransportWrite(e.to_string()))?;

        let resp = self.run_command(&tag).await?;
        self.expect_ok(&resp)?;
        Ok(match resp.code {
            Some(ResponseCode::Appenduid(_, uids)) => Some(uids),
            _ => None,
        })
    }

    /// Sends `IDLE` and waits for the `+` continuation. Events observed
    /// afterward are buffered for [`Self::idle_drain`] rather than returned
    /// directly, since the caller is not "inside" a command while idling.
    pub async fn idle_start(&mut self) -> Result<(), ProtocolError> {
        self.require_phase(Phase::Selected)?;
        if !self.capabilities.has("IDLE") {
            return Err(ProtocolError::IdleNotSupported);
        }
        let tag = self.next_tag();
        self.write_line(&format!("{} IDLE", tag)).await?;
        loop {
            let (frame, payloads) = self.next_frame().await?;
            self.apply_code(&frame.code);
            match frame.tag {
                FrameTag::Continuation => {
                    self.idle = Some(IdleState { tag, buffered: Vec::new() });
                    return Ok(());
                }
                FrameTag::Untagged => {
                    let event = response::parse_untagged_data(&frame.text, &payloads);
                    self.ingest_event(&event);
                }
                FrameTag::Tagged(t) if t == tag => {
                    return Err(ProtocolError::bad_response(format!("IDLE rejected: {}", frame.text)));
                }
                FrameTag::Tagged(_) => continue,
            }
        }
    }

    pub fn is_idling(&self) -> bool {
        self.idle.is_some()
    }

    /// Read one transport chunk and fold every untagged frame it yields
    /// into capabilities/selected-state and the IDLE buffer. Blocks until
    /// at least one frame is parsed; callers that want non-blocking access
    /// to what has already arrived should use [`Self::idle_drain`] instead.
    pub async fn idle_poll(&mut self) -> Result<(), ProtocolError> {
        if self.idle.is_none() {
            return Err(ProtocolError::bad_response("idle_poll called while not idling"));
        }
        let (frame, payloads) = self.next_frame().await?;
        self.apply_code(&frame.code);
        match frame.tag {
            FrameTag::Untagged => {
                let event = response::parse_untagged_data(&frame.text, &payloads);
                self.ingest_event(&event);
                Ok(())
            }
            FrameTag::Continuation => Ok(()),
            FrameTag::Tagged(_) => Err(ProtocolError::bad_response("unexpected tagged reply while idling")),
        }
    }

    /// Take every untagged event buffered since the last drain, without
    /// blocking. Does not itself read from the transport; pair with
    /// [`Self::idle_poll`] to actually pull new frames in first.
    pub fn idle_drain(&mut self) -> Vec<UntaggedEvent> {
        self.idle.as_mut().map(|s| std::mem::take(&mut s.buffered)).unwrap_or_default()
    }

    /// Sends `DONE` and waits for the tagged reply that closes the IDLE
    /// command. Callers that need to cancel a blocked idle read should
    /// still call this afterward — IDLE has no other way to leave the
    /// sub-state cleanly.
    pub async fn idle_stop(&mut self) -> Result<(), ProtocolError> {
        let Some(tag) = self.idle.as_ref().map(|s| s.tag.clone()) else { return Ok(()) };
        self.transport.write(b"DONE\r\n").await.map_err(|e| ProtocolError::TransportWrite(e.to_string()))?;
        // `self.idle` stays `Some` through this read loop so any untagged
        // frames the server sends before its tagged reply are still folded
        // into the IDLE buffer by `ingest_event`, not dropped on the floor.
        let resp = self.run_command(&tag).await?;
        self.idle = None;
        self.expect_ok(&resp)
    }
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
    async fn connect_reads_greeting_and_capabilities() {
        let transport = ScriptedTransport::new(vec![b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n"]);
        let session = ImapSession::connect(transport).await.unwrap();
        assert_eq!(session.phase(), Phase::Connected);
        assert!(session.capabilities().has("IDLE"));
    }

    #[tokio::test]
    async fn preauth_greeting_skips_login() {
        let transport = ScriptedTransport::new(vec![b"* PREAUTH server ready, already authenticated\r\n"]);
        let session = ImapSession::connect(transport).await.unwrap();
        assert_eq!(session.phase(), Phase::Authenticated);
    }

    #[tokio::test]
    async fn login_transitions_to_authenticated() {
        let transport = ScriptedTransport::new(vec![b"* OK ready\r\n", b"A0001 OK LOGIN completed\r\n"]);
        let mut session = ImapSession::connect(transport).await.unwrap();
        session.login("tim", "tanstaaftanstaaf").await.unwrap();
        assert_eq!(session.phase(), Phase::Authenticated);
    }

    #[tokio::test]
    async fn select_populates_selected_state_from_untagged_data() {
        let greeting = b"* OK ready\r\n".to_vec();
        let login_ok = b"A0001 OK LOGIN completed\r\n".to_vec();
        let select_resp = concat!(
            "* 5 EXISTS\r\n",
            "* 2 RECENT\r\n",
            "* OK [UIDVALIDITY 3857529045] UIDs valid\r\n",
            "* OK [UIDNEXT 106] Predicted next UID\r\n",
            "* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n",
            "A0002 OK [READ-WRITE] SELECT completed\r\n",
        )
        .as_bytes()
        .to_vec();

        let transport = ScriptedTransport::new(vec![&greeting, &login_ok, &select_resp]);
        let mut session = ImapSession::connect(transport).await.unwrap();
        session.login("tim", "pw").await.unwrap();
        session.select("INBOX").await.unwrap();

        assert_eq!(session.phase(), Phase::Selected);
        let state = session.selected().unwrap();
        assert_eq!(state.message_count, 5);
        assert_eq!(state.recent, 2);
        assert_eq!(state.uid_validity, Some(3857529045));
        assert_eq!(state.uid_next, Some(106));
        assert!(state.read_write);
    }

    #[tokio::test]
    async fn append_pauses_on_continuation_before_streaming_literal() {
        let greeting = b"* OK ready\r\n".to_vec();
        let login_ok = b"A0001 OK LOGIN completed\r\n".to_vec();
        let continuation = b"+ Ready for literal data\r\n".to_vec();
        let final_reply = b"A0003 OK [APPENDUID 3857529045 1] APPEND completed\r\n".to_vec();

        let transport = ScriptedTransport::new(vec![&greeting, &login_ok, &continuation, &final_reply]);
        let mut session = ImapSession::connect(transport).await.unwrap();
        session.login("tim", "pw").await.unwrap();

        let message = b"Subject: hi\r\n\r\nbody\r\n";
        let uids = session.append("INBOX", None, message).await.unwrap();
        assert!(uids.is_some());
        assert!(session.selected().is_none());
    }

    #[tokio::test]
    async fn idle_buffers_events_until_drained_then_stop_completes() {
        let greeting = b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n".to_vec();
        let login_ok = b"A0001 OK LOGIN completed\r\n".to_vec();
        let select_resp = b"* 5 EXISTS\r\nA0002 OK [READ-WRITE] SELECT completed\r\n".to_vec();
        let idle_continuation = b"+ idling\r\n".to_vec();
        let idle_events = b"* 6 EXISTS\r\n* 1 EXPUNGE\r\n".to_vec();
        let idle_done = b"A0004 OK IDLE terminated\r\n".to_vec();

        let transport =
            ScriptedTransport::new(vec![&greeting, &login_ok, &select_resp, &idle_continuation, &idle_events, &idle_done]);
        let mut session = ImapSession::connect(transport).await.unwrap();
        session.login("tim", "pw").await.unwrap();
        session.select("INBOX").await.unwrap();

        session.idle_start().await.unwrap();
        assert!(session.is_idling());

        // The scripted transport hands both untagged lines back as one
        // chunk; the decoder still yields them one frame per poll.
        session.idle_poll().await.unwrap();
        session.idle_poll().await.unwrap();
        let events = session.idle_drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], UntaggedEvent::Exists(6)));
        assert!(matches!(events[1], UntaggedEvent::Expunge(1)));
        // Already drained: a second drain without a poll is empty.
        assert!(session.idle_drain().is_empty());

        session.idle_stop().await.unwrap();
        assert!(!session.is_idling());
        assert_eq!(session.selected().unwrap().message_count, 6);
    }

    #[test]
    fn store_mode_variants_are_distinct() {
        assert_ne!(StoreMode::Add, StoreMode::Remove);
        assert_ne!(StoreMode::Remove, StoreMode::Replace);
    }
}
