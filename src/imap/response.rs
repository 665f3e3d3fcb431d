/*
 * response.rs
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

//! IMAP response parsing: many small, narrow functions rather than one
//! monolithic grammar, each total on valid server output and lenient on
//! vendor extensions it doesn't recognize.

use std::collections::HashMap;

use crate::capabilities::CapabilitySet;
use crate::message::{Address, EnvelopeDateTime};
use crate::uid::UniqueIdSet;

use super::mailbox_name;
use super::value::{tokenize, Value};

pub use crate::message::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImapStatus {
    Ok,
    No,
    Bad,
    Bye,
    PreAuth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    UidValidity(u32),
    UidNext(u32),
    HighestModSeq(u64),
    PermanentFlags(Vec<String>),
    Capability(CapabilitySet),
    Copyuid(u32, UniqueIdSet, UniqueIdSet),
    Appenduid(u32, UniqueIdSet),
    ReadWrite,
    ReadOnly,
    Alert,
    NonExistent,
    AuthenticationFailed,
    /// Unrecognized response code, kept verbatim so callers can still see it.
    Other(String, Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameTag {
    Untagged,
    Tagged(String),
    Continuation,
}

/// One parsed top-level frame: tagged, untagged, or a continuation
/// request. `text` is either the human-readable status text (when
/// `status` is set) or the raw untagged data payload (`"5 EXISTS"`,
/// `LIST (...) "/" INBOX`, …) for further per-command parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: FrameTag,
    pub status: Option<ImapStatus>,
    pub code: Option<ResponseCode>,
    pub text: String,
}

pub fn parse_frame(line: &str) -> Option<Frame> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (tag, rest) = if let Some(rest) = line.strip_prefix("* ") {
        (FrameTag::Untagged, rest)
    } else if let Some(rest) = line.strip_prefix('+') {
        (FrameTag::Continuation, rest.trim_start())
    } else {
        let (t, rest) = line.split_once(' ')?;
        (FrameTag::Tagged(t.to_string()), rest)
    };

    let (status, remainder) = parse_status_prefix(rest);
    let remainder = remainder.trim_start();
    let (code, text) = if let Some(rest) = remainder.strip_prefix('[') {
        match rest.find(']') {
            Some(end) => (parse_response_code(&rest[..end]), rest[end + 1..].trim_start().to_string()),
            None => (None, remainder.to_string()),
        }
    } else {
        (None, remainder.to_string())
    };

    Some(Frame { tag, status, code, text })
}

fn parse_status_prefix(rest: &str) -> (Option<ImapStatus>, &str) {
    let mut it = rest.splitn(2, ' ');
    let first = it.next().unwrap_or("");
    let status = match first.to_ascii_uppercase().as_str() {
        "OK" => Some(ImapStatus::Ok),
        "NO" => Some(ImapStatus::No),
        "BAD" => Some(ImapStatus::Bad),
        "BYE" => Some(ImapStatus::Bye),
        "PREAUTH" => Some(ImapStatus::PreAuth),
        _ => None,
    };
    match status {
        Some(s) => (Some(s), it.next().unwrap_or("")),
        None => (None, rest),
    }
}

fn parse_response_code(s: &str) -> Option<ResponseCode> {
    let mut it = s.splitn(2, ' ');
    let name = it.next()?.to_ascii_uppercase();
    let rest = it.next().unwrap_or("").trim();
    Some(match name.as_str() {
        "UIDVALIDITY" => ResponseCode::UidValidity(rest.parse().ok()?),
        "UIDNEXT" => ResponseCode::UidNext(rest.parse().ok()?),
        "HIGHESTMODSEQ" => ResponseCode::HighestModSeq(rest.parse().ok()?),
        "PERMANENTFLAGS" => {
            let inner = rest.trim_start_matches('(').trim_end_matches(')');
            ResponseCode::PermanentFlags(inner.split_whitespace().map(|s| s.to_string()).collect())
        }
        "CAPABILITY" => ResponseCode::Capability(CapabilitySet::parse_tokens(rest)),
        "COPYUID" => {
            let mut parts = rest.split_whitespace();
            let validity: u32 = parts.next()?.parse().ok()?;
            let source = UniqueIdSet::parse(parts.next()?).ok()?;
            let dest = UniqueIdSet::parse(parts.next()?).ok()?;
            ResponseCode::Copyuid(validity, source, dest)
        }
        "APPENDUID" => {
            let mut parts = rest.split_whitespace();
            let validity: u32 = parts.next()?.parse().ok()?;
            let uids = UniqueIdSet::parse(parts.next()?).ok()?;
            ResponseCode::Appenduid(validity, uids)
        }
        "READ-WRITE" => ResponseCode::ReadWrite,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "ALERT" => ResponseCode::Alert,
        "NONEXISTENT" => ResponseCode::NonExistent,
        "AUTHENTICATIONFAILED" => ResponseCode::AuthenticationFailed,
        _ => ResponseCode::Other(name, if rest.is_empty() { None } else { Some(rest.to_string()) }),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialUse {
    Sent,
    Trash,
    Junk,
    Drafts,
    All,
    Archive,
    Flagged,
    Important,
    Inbox,
}

fn special_use_from_flag(flag: &str) -> Option<SpecialUse> {
    match flag {
        "\\Sent" => Some(SpecialUse::Sent),
        "\\Trash" => Some(SpecialUse::Trash),
        "\\Junk" => Some(SpecialUse::Junk),
        "\\Drafts" => Some(SpecialUse::Drafts),
        "\\All" => Some(SpecialUse::All),
        "\\Archive" => Some(SpecialUse::Archive),
        "\\Flagged" => Some(SpecialUse::Flagged),
        "\\Important" => Some(SpecialUse::Important),
        "\\Inbox" => Some(SpecialUse::Inbox),
        _ => None,
    }
}

/// `delimiter`: `None` means the server sent `NIL` (no hierarchy); an
/// empty string is a distinct, valid delimiter and is carried as
/// `Some(String::new())` rather than conflated with `NIL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub flags: Vec<String>,
    pub special_use: Vec<SpecialUse>,
    pub delimiter: Option<String>,
    pub mailbox: String,
}

pub fn parse_list_line(text: &str, payloads: &[Vec<u8>]) -> Option<ListEntry> {
    let tokens = tokenize(text, payloads);
    let mut it = tokens.into_iter();
    let flags_val = it.next()?;
    let flags: Vec<String> = flags_val.as_list()?.iter().filter_map(|v| v.as_text()).collect();
    let special_use = flags.iter().filter_map(|f| special_use_from_flag(f)).collect();
    let delim_val = it.next()?;
    let delimiter = if delim_val.is_nil() { None } else { delim_val.as_text() };
    let mailbox_val = it.next()?;
    let mailbox_raw = mailbox_val.as_text()?;
    let mailbox = mailbox_name::decode(&mailbox_raw);
    Some(ListEntry { flags, special_use, delimiter, mailbox })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusItems(HashMap<String, String>);

impl StatusItems {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_ascii_uppercase()).map(|s| s.as_str())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|s| s.parse().ok())
    }

    pub fn messages(&self) -> Option<u32> {
        self.get_u64("MESSAGES").map(|v| v as u32)
    }

    pub fn uid_next(&self) -> Option<u32> {
        self.get_u64("UIDNEXT").map(|v| v as u32)
    }

    pub fn uid_validity(&self) -> Option<u32> {
        self.get_u64("UIDVALIDITY").map(|v| v as u32)
    }

    pub fn highest_mod_seq(&self) -> Option<u64> {
        self.get_u64("HIGHESTMODSEQ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub mailbox: String,
    pub items: StatusItems,
}

pub fn parse_status_line(text: &str, payloads: &[Vec<u8>]) -> Option<StatusResponse> {
    let tokens = tokenize(text, payloads);
    let mut it = tokens.into_iter();
    let mailbox = mailbox_name::decode(&it.next()?.as_text()?);
    let items_list = it.next()?;
    let mut map = HashMap::new();
    let mut iit = items_list.as_list()?.iter();
    while let (Some(k), Some(v)) = (iit.next(), iit.next()) {
        if let (Some(k), Some(v)) = (k.as_text(), v.as_text()) {
            map.insert(k.to_ascii_uppercase(), v);
        }
    }
    Some(StatusResponse { mailbox, items: StatusItems(map) })
}

pub fn parse_search_line(text: &str) -> Vec<u32> {
    text.split_whitespace()
        .take_while(|t| !t.starts_with('('))
        .filter_map(|t| t.parse().ok())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EsearchResult {
    pub tag: Option<String>,
    pub uid: bool,
    pub all: Option<UniqueIdSet>,
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub count: Option<u32>,
    pub modseq: Option<u64>,
}

pub fn parse_esearch_line(text: &str) -> Option<EsearchResult> {
    let tokens = tokenize(text, &[]);
    let mut idx = 0;
    let mut result = EsearchResult::default();

    if let Some(Value::List(items)) = tokens.get(idx) {
        if items.first().and_then(|v| v.as_text()).map(|s| s.eq_ignore_ascii_case("TAG")).unwrap_or(false) {
            result.tag = items.get(1).and_then(|v| v.as_text());
            idx += 1;
        }
    }
    if tokens.get(idx).and_then(|v| v.as_text()).map(|s| s.eq_ignore_ascii_case("UID")).unwrap_or(false) {
        result.uid = true;
        idx += 1;
    }
    while idx + 1 < tokens.len() {
        let key = tokens[idx].as_text()?.to_ascii_uppercase();
        let val = tokens[idx + 1].as_text()?;
        idx += 2;
        match key.as_str() {
            "ALL" => result.all = UniqueIdSet::parse(&val).ok(),
            "COUNT" => result.count = val.parse().ok(),
            "MIN" => result.min = val.parse().ok(),
            "MAX" => result.max = val.parse().ok(),
            "MODSEQ" => result.modseq = val.parse().ok(),
            _ => {}
        }
    }
    Some(result)
}

/// A parsed FETCH attribute stream: `(KEY value KEY value …)`, keys
/// upper-cased, values left as generic [`Value`]s for per-attribute
/// interpretation. Unrecognized keys are kept (not dropped), so vendor
/// extensions never break parsing of the attributes around them.
pub fn parse_fetch_line(text: &str, payloads: &[Vec<u8>]) -> Option<(u32, Vec<(String, Value)>)> {
    let (seq_str, rest) = text.trim_start().split_once(' ')?;
    let seq: u32 = seq_str.parse().ok()?;
    let rest = rest.trim_start().strip_prefix("FETCH")?.trim_start();
    let tokens = tokenize(rest, payloads);
    let items = match tokens.into_iter().next()? {
        Value::List(items) => items,
        _ => return None,
    };
    let mut out = Vec::new();
    let mut it = items.into_iter();
    while let (Some(k), Some(v)) = (it.next(), it.next()) {
        if let Some(ks) = k.as_text() {
            out.push((ks.to_ascii_uppercase(), v));
        }
    }
    Some((seq, out))
}

fn strip_angle_brackets(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('<').and_then(|s| s.strip_suffix('>')).unwrap_or(s).to_string()
}

fn text_or_nil(v: Option<&Value>) -> Option<String> {
    v.and_then(|v| if v.is_nil() { None } else { v.as_text() })
}

pub fn parse_address_list(val: &Value) -> Vec<Address> {
    let Some(items) = val.as_list() else { return Vec::new() };
    let mut out = Vec::new();
    let mut i = 0;
    while i < items.len() {
        let Some(fields) = items[i].as_list() else {
            i += 1;
            continue;
        };
        let name = text_or_nil(fields.first());
        let mailbox = text_or_nil(fields.get(2));
        let host = text_or_nil(fields.get(3));
        if mailbox.is_none() && host.is_none() {
            if let Some(group_name) = name {
                let mut members = Vec::new();
                i += 1;
                while i < items.len() {
                    let Some(f2) = items[i].as_list() else { break };
                    let n2 = text_or_nil(f2.first());
                    let m2 = text_or_nil(f2.get(2));
                    let h2 = text_or_nil(f2.get(3));
                    i += 1;
                    if n2.is_none() && m2.is_none() && h2.is_none() {
                        break;
                    }
                    if let (Some(mbox), Some(host)) = (m2, h2) {
                        members.push(Address::Mailbox { display_name: n2, local_part: mbox, domain: Some(host) });
                    }
                }
                out.push(Address::Group { name: group_name, members });
                continue;
            }
            i += 1;
            continue;
        }
        out.push(Address::Mailbox { display_name: name, local_part: mailbox.unwrap_or_default(), domain: host });
        i += 1;
    }
    out
}

fn parse_envelope_date(s: &str) -> Option<EnvelopeDateTime> {
    let parsed = chrono::DateTime::parse_from_rfc2822(s.trim()).ok()?;
    Some(EnvelopeDateTime { timestamp: parsed.timestamp(), tz_offset_secs: Some(parsed.offset().local_minus_utc()) })
}

/// Parse an ENVELOPE fetch value's 10-tuple. Message-ids (`in_reply_to`,
/// `message_id`) always have surrounding angle brackets stripped; callers
/// re-add them when building wire commands that need the brackets back.
pub fn parse_envelope(val: &Value) -> Option<Envelope> {
    let items = val.as_list()?;
    let nil = Value::Nil;
    let date = text_or_nil(items.first()).and_then(|s| parse_envelope_date(&s));
    let subject = text_or_nil(items.get(1));
    let from = parse_address_list(items.get(2).unwrap_or(&nil));
    let sender = parse_address_list(items.get(3).unwrap_or(&nil));
    let reply_to = parse_address_list(items.get(4).unwrap_or(&nil));
    let to = parse_address_list(items.get(5).unwrap_or(&nil));
    let cc = parse_address_list(items.get(6).unwrap_or(&nil));
    let bcc = parse_address_list(items.get(7).unwrap_or(&nil));
    let in_reply_to = text_or_nil(items.get(8)).map(|s| strip_angle_brackets(&s));
    let message_id = text_or_nil(items.get(9)).map(|s| strip_angle_brackets(&s));
    Some(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        resent_from: Vec::new(),
        resent_to: Vec::new(),
        in_reply_to,
        message_id,
    })
}

/// Lets callers write `Envelope::parse(value)` rather than the free
/// function name, matching how `BodyStructure::parse` reads next to it.
impl Envelope {
    pub fn parse(val: &Value) -> Option<Envelope> {
        parse_envelope(val)
    }
}

/// A fully interpreted untagged data response, folded by the selected-state
/// reducer or surfaced directly to the caller for events the reducer
/// doesn't own (SEARCH results, LIST entries, …).
#[derive(Debug, Clone, PartialEq)]
pub enum UntaggedEvent {
    Exists(u32),
    Recent(u32),
    Expunge(u32),
    Vanished { earlier: bool, uids: UniqueIdSet },
    Fetch { seq: u32, attrs: Vec<(String, Value)> },
    Search(Vec<u32>),
    Esearch(EsearchResult),
    Flags(Vec<String>),
    List(ListEntry),
    Lsub(ListEntry),
    Status(StatusResponse),
    Capability(CapabilitySet),
    Bye(String),
    Other(String),
}

pub fn parse_untagged_data(text: &str, payloads: &[Vec<u8>]) -> UntaggedEvent {
    let trimmed = text.trim();

    if let Some((num, rest)) = trimmed.split_once(' ') {
        if let Ok(n) = num.parse::<u32>() {
            let rest = rest.trim_start();
            if rest.eq_ignore_ascii_case("EXISTS") {
                return UntaggedEvent::Exists(n);
            }
            if rest.eq_ignore_ascii_case("RECENT") {
                return UntaggedEvent::Recent(n);
            }
            if rest.eq_ignore_ascii_case("EXPUNGE") {
                return UntaggedEvent::Expunge(n);
            }
            if rest.to_ascii_uppercase().starts_with("FETCH") {
                if let Some((_, attrs)) = parse_fetch_line(trimmed, payloads) {
                    return UntaggedEvent::Fetch { seq: n, attrs };
                }
            }
        }
    }

    if let Some(rest) = trimmed.strip_prefix("VANISHED (EARLIER) ") {
        if let Ok(uids) = UniqueIdSet::parse(rest) {
            return UntaggedEvent::Vanished { earlier: true, uids };
        }
    }
    if let Some(rest) = trimmed.strip_prefix("VANISHED ") {
        if let Ok(uids) = UniqueIdSet::parse(rest) {
            return UntaggedEvent::Vanished { earlier: false, uids };
        }
    }
    if trimmed.eq_ignore_ascii_case("SEARCH") {
        return UntaggedEvent::Search(Vec::new());
    }
    if let Some(rest) = strip_ci_prefix(trimmed, "SEARCH ") {
        return UntaggedEvent::Search(parse_search_line(rest));
    }
    if let Some(rest) = strip_ci_prefix(trimmed, "ESEARCH ") {
        if let Some(r) = parse_esearch_line(rest) {
            return UntaggedEvent::Esearch(r);
        }
    }
    if let Some(rest) = strip_ci_prefix(trimmed, "FLAGS ") {
        let tokens = tokenize(rest, payloads);
        if let Some(Value::List(items)) = tokens.into_iter().next() {
            return UntaggedEvent::Flags(items.into_iter().filter_map(|v| v.as_text()).collect());
        }
    }
    if let Some(rest) = strip_ci_prefix(trimmed, "LIST ") {
        if let Some(entry) = parse_list_line(rest, payloads) {
            return UntaggedEvent::List(entry);
        }
    }
    if let Some(rest) = strip_ci_prefix(trimmed, "LSUB ") {
        if let Some(entry) = parse_list_line(rest, payloads) {
            return UntaggedEvent::Lsub(entry);
        }
    }
    if let Some(rest) = strip_ci_prefix(trimmed, "STATUS ") {
        if let Some(status) = parse_status_line(rest, payloads) {
            return UntaggedEvent::Status(status);
        }
    }
    if let Some(rest) = strip_ci_prefix(trimmed, "CAPABILITY ") {
        return UntaggedEvent::Capability(CapabilitySet::parse_tokens(rest));
    }
    if let Some(rest) = strip_ci_prefix(trimmed, "BYE ") {
        return UntaggedEvent::Bye(rest.to_string());
    }

    UntaggedEvent::Other(trimmed.to_string())
}

fn strip_ci_prefix<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_ok_with_code() {
        let f = parse_frame("A0001 OK [READ-WRITE] SELECT completed").unwrap();
        assert_eq!(f.tag, FrameTag::Tagged("A0001".to_string()));
        assert_eq!(f.status, Some(ImapStatus::Ok));
        assert_eq!(f.code, Some(ResponseCode::ReadWrite));
        assert_eq!(f.text, "SELECT completed");
    }

    #[test]
    fn parses_untagged_exists() {
        let f = parse_frame("* 5 EXISTS").unwrap();
        assert_eq!(f.tag, FrameTag::Untagged);
        assert_eq!(f.status, None);
        assert_eq!(f.text, "5 EXISTS");
        assert_eq!(parse_untagged_data(&f.text, &[]), UntaggedEvent::Exists(5));
    }

    #[test]
    fn parses_continuation() {
        let f = parse_frame("+ idling").unwrap();
        assert_eq!(f.tag, FrameTag::Continuation);
        assert_eq!(f.text, "idling");
    }

    #[test]
    fn parses_uidvalidity_code() {
        let f = parse_frame("* OK [UIDVALIDITY 1234567890] UIDs valid").unwrap();
        assert_eq!(f.code, Some(ResponseCode::UidValidity(1234567890)));
    }

    #[test]
    fn parses_copyuid_code() {
        let f = parse_frame("A003 OK [COPYUID 1234567890 1:3 101:103] COPY completed").unwrap();
        let source = UniqueIdSet::parse("1:3").unwrap();
        let dest = UniqueIdSet::parse("101:103").unwrap();
        assert_eq!(f.code, Some(ResponseCode::Copyuid(1234567890, source, dest)));
    }

    #[test]
    fn parses_list_line_with_nil_delimiter() {
        let entry = parse_list_line(r#"(\Noselect) NIL "foo""#, &[]).unwrap();
        assert_eq!(entry.delimiter, None);
        assert_eq!(entry.mailbox, "foo");
    }

    #[test]
    fn parses_list_line_with_empty_string_delimiter_distinct_from_nil() {
        let entry = parse_list_line(r#"() "" "foo""#, &[]).unwrap();
        assert_eq!(entry.delimiter, Some(String::new()));
    }

    #[test]
    fn parses_special_use_flag() {
        let entry = parse_list_line(r#"(\HasNoChildren \Sent) "/" "Sent Items""#, &[]).unwrap();
        assert_eq!(entry.special_use, vec![SpecialUse::Sent]);
        assert_eq!(entry.mailbox, "Sent Items");
    }

    #[test]
    fn parses_status_line() {
        let status = parse_status_line(r#"INBOX (MESSAGES 231 UIDNEXT 44292)"#, &[]).unwrap();
        assert_eq!(status.mailbox, "INBOX");
        assert_eq!(status.items.messages(), Some(231));
        assert_eq!(status.items.uid_next(), Some(44292));
    }

    #[test]
    fn parses_plain_search() {
        assert_eq!(parse_search_line("2 3 5 8"), vec![2, 3, 5, 8]);
    }

    #[test]
    fn parses_esearch_count() {
        let r = parse_esearch_line(r#"(TAG "A1") UID COUNT 5"#).unwrap();
        assert_eq!(r.tag, Some("A1".to_string()));
        assert!(r.uid);
        assert_eq!(r.count, Some(5));
    }

    #[test]
    fn parses_fetch_line_flags_and_uid() {
        let (seq, attrs) = parse_fetch_line(r#"12 FETCH (FLAGS (\Seen) UID 349)"#, &[]).unwrap();
        assert_eq!(seq, 12);
        assert_eq!(attrs[0].0, "FLAGS");
        assert_eq!(attrs[1].0, "UID");
        assert_eq!(attrs[1].1.as_text(), Some("349".to_string()));
    }

    #[test]
    fn fetch_line_skips_unknown_vendor_keys() {
        let (_, attrs) = parse_fetch_line(r#"1 FETCH (X-GM-LABELS (foo bar) UID 9)"#, &[]).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[1].0, "UID");
    }

    #[test]
    fn message_id_angle_brackets_always_stripped() {
        let env_text = r#"(NIL "hi" NIL NIL NIL NIL NIL NIL NIL "<abc@example.com>")"#;
        let tokens = tokenize(env_text, &[]);
        let env = parse_envelope(&tokens[0]).unwrap();
        assert_eq!(env.message_id, Some("abc@example.com".to_string()));
    }

    #[test]
    fn address_list_parses_group_marker() {
        let text = r#"(("undisclosed-recipients" NIL NIL NIL)(NIL NIL NIL NIL))"#;
        let tokens = tokenize(text, &[]);
        let addrs = parse_address_list(&tokens[0]);
        assert_eq!(addrs.len(), 1);
        match &addrs[0] {
            Address::Group { name, members } => {
                assert_eq!(name, "undisclosed-recipients");
                assert!(members.is_empty());
            }
            _ => panic!("expected group"),
        }
    }

    #[test]
    fn vanished_earlier_is_exposed() {
        let event = parse_untagged_data("VANISHED (EARLIER) 300:310", &[]);
        assert_eq!(event, UntaggedEvent::Vanished { earlier: true, uids: UniqueIdSet::parse("300:310").unwrap() });
    }
}
