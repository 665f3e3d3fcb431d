/*
 * selected_state.rs
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

//! The selected-mailbox reducer. Kept as a pure function of
//! `(&mut SelectedState, &UntaggedEvent)` returning the events a caller
//! might want to react to, separate from the per-command accumulator
//! that picks out only the responses its own command cares about.

use std::collections::BTreeMap;

use crate::uid::UniqueIdSet;

use super::response::{ResponseCode, UntaggedEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedState {
    pub mailbox: String,
    pub message_count: u32,
    pub recent: u32,
    pub uid_validity: Option<u32>,
    pub uid_next: Option<u32>,
    pub highest_mod_seq: Option<u64>,
    pub flags: Vec<String>,
    pub permanent_flags: Vec<String>,
    pub read_write: bool,
    seq_to_uid: BTreeMap<u32, u32>,
    uid_to_seq: BTreeMap<u32, u32>,
}

impl SelectedState {
    pub fn new(mailbox: impl Into<String>) -> Self {
        Self { mailbox: mailbox.into(), ..Default::default() }
    }

    pub fn uid_for_seq(&self, seq: u32) -> Option<u32> {
        self.seq_to_uid.get(&seq).copied()
    }

    pub fn seq_for_uid(&self, uid: u32) -> Option<u32> {
        self.uid_to_seq.get(&uid).copied()
    }

    pub fn uid_set(&self) -> impl Iterator<Item = u32> + '_ {
        self.uid_to_seq.keys().copied()
    }

    fn install(&mut self, seq: u32, uid: u32) {
        if let Some(old_uid) = self.seq_to_uid.insert(seq, uid) {
            if old_uid != uid {
                self.uid_to_seq.remove(&old_uid);
            }
        }
        self.uid_to_seq.insert(uid, seq);
    }

    /// Remove the message currently at `seq`, shifting every higher
    /// sequence number down by one so `1..=message_count` stays
    /// contiguous. Idempotent: removing a sequence with nothing mapped
    /// still performs the shift and count decrement spec.md requires.
    fn remove_seq(&mut self, seq: u32) {
        if let Some(uid) = self.seq_to_uid.remove(&seq) {
            self.uid_to_seq.remove(&uid);
        }
        let shifted: Vec<(u32, u32)> =
            self.seq_to_uid.range(seq + 1..).map(|(&s, &u)| (s, u)).collect();
        for (s, _) in &shifted {
            self.seq_to_uid.remove(s);
        }
        for (s, u) in shifted {
            self.seq_to_uid.insert(s - 1, u);
            self.uid_to_seq.insert(u, s - 1);
        }
        self.message_count = self.message_count.saturating_sub(1);
    }

    fn remove_uid(&mut self, uid: u32) {
        if let Some(seq) = self.uid_to_seq.get(&uid).copied() {
            self.remove_seq(seq);
        } else {
            self.uid_to_seq.remove(&uid);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaEvent {
    Exists(u32),
    Recent(u32),
    Expunge(u32),
    Vanished { earlier: bool, uids: Vec<u32> },
    FlagsChanged { seq: u32, uid: Option<u32>, mod_seq: Option<u64> },
    UidValidityReset,
}

/// Fold one untagged data event into `state`, returning the caller-facing
/// deltas it produced. Response codes observed alongside tagged/untagged
/// `OK`/`NO` replies are folded separately via [`apply_response_code`].
pub fn reduce(state: &mut SelectedState, event: &UntaggedEvent) -> Vec<DeltaEvent> {
    match event {
        UntaggedEvent::Exists(n) => {
            state.message_count = *n;
            vec![DeltaEvent::Exists(*n)]
        }
        UntaggedEvent::Recent(n) => {
            state.recent = *n;
            vec![DeltaEvent::Recent(*n)]
        }
        UntaggedEvent::Expunge(seq) => {
            state.remove_seq(*seq);
            vec![DeltaEvent::Expunge(*seq)]
        }
        UntaggedEvent::Vanished { earlier, uids } => {
            let ids: Vec<u32> = uids.iter().collect();
            for &uid in &ids {
                state.remove_uid(uid);
            }
            vec![DeltaEvent::Vanished { earlier: *earlier, uids: ids }]
        }
        UntaggedEvent::Fetch { seq, attrs } => {
            let mut uid = None;
            let mut mod_seq = None;
            for (key, value) in attrs {
                match key.as_str() {
                    "UID" => uid = value.as_text().and_then(|s| s.parse().ok()),
                    "MODSEQ" => {
                        mod_seq = value
                            .as_list()
                            .and_then(|l| l.first())
                            .and_then(|v| v.as_text())
                            .and_then(|s| s.parse().ok());
                    }
                    _ => {}
                }
            }
            if let Some(u) = uid {
                state.install(*seq, u);
            }
            if let Some(m) = mod_seq {
                state.highest_mod_seq = Some(state.highest_mod_seq.map_or(m, |cur| cur.max(m)));
            }
            vec![DeltaEvent::FlagsChanged { seq: *seq, uid, mod_seq }]
        }
        UntaggedEvent::Flags(flags) => {
            state.flags = flags.clone();
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Fold a bracketed response code observed on a tagged or untagged
/// `OK`/`NO` reply into selected state. A `UIDVALIDITY` that differs from
/// the one already recorded for this selection is a hard reset: cached
/// sequence/UID mappings are no longer trustworthy and are dropped.
pub fn apply_response_code(state: &mut SelectedState, code: &ResponseCode) -> Vec<DeltaEvent> {
    match code {
        ResponseCode::UidValidity(v) => {
            let reset = matches!(state.uid_validity, Some(prev) if prev != *v);
            state.uid_validity = Some(*v);
            if reset {
                state.seq_to_uid.clear();
                state.uid_to_seq.clear();
                vec![DeltaEvent::UidValidityReset]
            } else {
                Vec::new()
            }
        }
        ResponseCode::UidNext(n) => {
            state.uid_next = Some(*n);
            Vec::new()
        }
        ResponseCode::HighestModSeq(m) => {
            state.highest_mod_seq = Some(*m);
            Vec::new()
        }
        ResponseCode::PermanentFlags(flags) => {
            state.permanent_flags = flags.clone();
            Vec::new()
        }
        ResponseCode::ReadWrite => {
            state.read_write = true;
            Vec::new()
        }
        ResponseCode::ReadOnly => {
            state.read_write = false;
            Vec::new()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SelectedState {
        let mut s = SelectedState::new("INBOX");
        s.message_count = 5;
        for (seq, uid) in [(1, 101), (2, 102), (3, 103), (4, 104), (5, 105)] {
            s.install(seq, uid);
        }
        s
    }

    #[test]
    fn expunge_shift_scenario_from_spec() {
        let mut s = seeded();
        reduce(&mut s, &UntaggedEvent::Expunge(3));
        reduce(&mut s, &UntaggedEvent::Expunge(3));
        assert_eq!(s.message_count, 3);
        assert_eq!(s.uid_for_seq(1), Some(101));
        assert_eq!(s.uid_for_seq(2), Some(102));
        assert_eq!(s.uid_for_seq(3), Some(105));
        let mut uids: Vec<u32> = s.uid_set().collect();
        uids.sort();
        assert_eq!(uids, vec![101, 102, 105]);
    }

    #[test]
    fn maps_stay_mutual_inverses_after_mixed_events() {
        let mut s = seeded();
        reduce(&mut s, &UntaggedEvent::Expunge(2));
        reduce(&mut s, &UntaggedEvent::Exists(6));
        reduce(
            &mut s,
            &UntaggedEvent::Fetch {
                seq: 4,
                attrs: vec![("UID".to_string(), crate::imap::value::Value::Atom("999".to_string()))],
            },
        );
        for seq in 1..=s.message_count {
            if let Some(uid) = s.uid_for_seq(seq) {
                assert_eq!(s.seq_for_uid(uid), Some(seq));
            }
        }
        let uid_count = s.uid_set().count() as u32;
        assert!(uid_count <= s.message_count);
    }

    #[test]
    fn vanished_earlier_removes_uids_and_shifts() {
        let mut s = seeded();
        let uids = UniqueIdSet::parse("103:104").unwrap();
        let deltas = reduce(&mut s, &UntaggedEvent::Vanished { earlier: true, uids });
        assert_eq!(s.message_count, 3);
        assert!(matches!(&deltas[0], DeltaEvent::Vanished { earlier: true, .. }));
        let mut remaining: Vec<u32> = s.uid_set().collect();
        remaining.sort();
        assert_eq!(remaining, vec![101, 102, 105]);
    }

    #[test]
    fn uidvalidity_mismatch_resets_selected_state() {
        let mut s = seeded();
        apply_response_code(&mut s, &ResponseCode::UidValidity(111));
        let deltas = apply_response_code(&mut s, &ResponseCode::UidValidity(222));
        assert_eq!(deltas, vec![DeltaEvent::UidValidityReset]);
        assert_eq!(s.uid_set().count(), 0);
    }

    #[test]
    fn expunge_on_unknown_sequence_still_decrements_and_shifts() {
        let mut s = seeded();
        reduce(&mut s, &UntaggedEvent::Expunge(10));
        assert_eq!(s.message_count, 4);
    }
}
