/*
 * uid.rs
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

//! IMAP unique identifiers, ranges, and sets (UID sets and sequence sets
//! share the same wire grammar and are represented by the same type).

use std::fmt;

/// A message UID together with the UIDVALIDITY it was observed under.
/// `value == 0` is never constructed — callers get `None` instead.
/// Ordering only means anything between two ids sharing `uid_validity`;
/// `Ord` compares `value` alone and callers must not compare ids from
/// different validities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniqueId {
    pub value: u32,
    pub uid_validity: u32,
}

impl UniqueId {
    pub fn new(value: u32, uid_validity: u32) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self { value, uid_validity })
        }
    }
}

impl PartialOrd for UniqueId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UniqueId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// The end of a range: either a concrete value or the `*` sentinel meaning
/// "the highest id that exists" (resolved by the server, not the client).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    Value(u32),
    Highest,
}

impl fmt::Display for RangeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeEnd::Value(v) => write!(f, "{}", v),
            RangeEnd::Highest => write!(f, "*"),
        }
    }
}

/// Sort direction a `UniqueIdSet`/`SequenceSet` was parsed in or should be
/// iterated in. Serialization of each individual range is always
/// lowest:highest regardless of direction; direction only governs the
/// order ranges are iterated/joined in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A contiguous `[start, end]` range within one UIDVALIDITY (or one
/// sequence-number space). `start` is always the numerically lower bound
/// once normalized; `end` may be the `*` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueIdRange {
    pub start: u32,
    pub end: RangeEnd,
}

impl UniqueIdRange {
    /// A single-id range.
    pub fn single(id: u32) -> Self {
        Self { start: id, end: RangeEnd::Value(id) }
    }

    pub fn to(start: u32, end: u32) -> Self {
        if start <= end {
            Self { start, end: RangeEnd::Value(end) }
        } else {
            Self { start: end, end: RangeEnd::Value(start) }
        }
    }

    pub fn to_highest(start: u32) -> Self {
        Self { start, end: RangeEnd::Highest }
    }

    /// True if `id` falls within the range. `*` is treated as "no upper
    /// bound" for membership purposes, matching server semantics where the
    /// client cannot know the true highest id without resolving it first.
    pub fn contains(&self, id: u32) -> bool {
        match self.end {
            RangeEnd::Value(end) => id >= self.start && id <= end,
            RangeEnd::Highest => id >= self.start,
        }
    }

    fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty range".to_string());
        }
        match s.split_once(':') {
            Some((a, b)) => {
                let a = parse_id(a)?;
                let end = if b == "*" {
                    RangeEnd::Highest
                } else {
                    RangeEnd::Value(parse_id(b)?)
                };
                let start = a;
                match end {
                    RangeEnd::Value(e) if e < start => Ok(Self { start: e, end: RangeEnd::Value(start) }),
                    _ => Ok(Self { start, end }),
                }
            }
            None => {
                if s == "*" {
                    Ok(Self { start: u32::MAX, end: RangeEnd::Highest })
                } else {
                    Ok(Self::single(parse_id(s)?))
                }
            }
        }
    }
}

fn parse_id(s: &str) -> Result<u32, String> {
    let v: u32 = s.parse().map_err(|_| format!("invalid id: {}", s))?;
    if v == 0 {
        return Err("id 0 is not valid".to_string());
    }
    Ok(v)
}

impl fmt::Display for UniqueIdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            RangeEnd::Value(end) if end == self.start => write!(f, "{}", self.start),
            _ => write!(f, "{}:{}", self.start, self.end),
        }
    }
}

/// A set of `UniqueIdRange`s plus the sort direction it was built/parsed in.
/// Used both for IMAP UID sets and for plain sequence-number sets — the
/// wire grammar (and this type) is identical for both; `SequenceSet` below
/// is just a readability alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueIdSet {
    ranges: Vec<UniqueIdRange>,
    direction: SortDirection,
}

pub type SequenceSet = UniqueIdSet;

impl UniqueIdSet {
    pub fn new() -> Self {
        Self { ranges: Vec::new(), direction: SortDirection::Ascending }
    }

    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        let mut set = Self::new();
        for id in ids {
            set.insert(id);
        }
        set
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges
            .iter()
            .map(|r| match r.end {
                RangeEnd::Value(end) => (end - r.start + 1) as usize,
                RangeEnd::Highest => 1,
            })
            .sum()
    }

    pub fn ranges(&self) -> &[UniqueIdRange] {
        &self.ranges
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ranges.iter().any(|r| r.contains(id))
    }

    /// Insert a single id, merging it into an adjacent/overlapping range
    /// when possible and keeping ranges sorted and non-overlapping.
    pub fn insert(&mut self, id: u32) {
        self.insert_range(UniqueIdRange::single(id));
    }

    pub fn insert_range(&mut self, range: UniqueIdRange) {
        self.ranges.push(range);
        self.normalize();
    }

    pub fn remove(&mut self, id: u32) {
        let mut new_ranges = Vec::with_capacity(self.ranges.len());
        for r in &self.ranges {
            match r.end {
                RangeEnd::Highest => {
                    if id == r.start {
                        new_ranges.push(UniqueIdRange::to_highest(r.start.saturating_add(1)));
                    } else {
                        new_ranges.push(*r);
                    }
                }
                RangeEnd::Value(end) => {
                    if id < r.start || id > end {
                        new_ranges.push(*r);
                        continue;
                    }
                    if r.start == end {
                        // whole range removed
                    } else if id == r.start {
                        new_ranges.push(UniqueIdRange::to(r.start + 1, end));
                    } else if id == end {
                        new_ranges.push(UniqueIdRange::to(r.start, end - 1));
                    } else {
                        new_ranges.push(UniqueIdRange::to(r.start, id - 1));
                        new_ranges.push(UniqueIdRange::to(id + 1, end));
                    }
                }
            }
        }
        self.ranges = new_ranges;
        self.normalize();
    }

    /// Union with another set, merging overlapping/adjacent ranges.
    pub fn union(&self, other: &Self) -> Self {
        let mut merged = self.ranges.clone();
        merged.extend(other.ranges.iter().copied());
        let mut set = Self { ranges: merged, direction: self.direction };
        set.normalize();
        set
    }

    fn normalize(&mut self) {
        if self.ranges.is_empty() {
            return;
        }
        self.ranges.sort_by_key(|r| r.start);
        let mut merged: Vec<UniqueIdRange> = Vec::with_capacity(self.ranges.len());
        for r in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if ranges_touch(last, &r) => {
                    *last = merge_ranges(last, &r);
                }
                _ => merged.push(r),
            }
        }
        self.ranges = merged;
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        let mut set = Self::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err("empty element in sequence set".to_string());
            }
            set.insert_range(UniqueIdRange::parse(part)?);
        }
        Ok(set)
    }

    /// Serialize to the wire grammar: comma-joined ranges, each `a:b`
    /// lowest:highest, single ids as a bare number.
    pub fn serialize(&self) -> String {
        self.ranges
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Split into subsets whose serialized form is no longer than
    /// `max_len` bytes, for servers that cap command-line length. Never
    /// splits a single range across subsets' byte budget check — a lone
    /// range longer than `max_len` still becomes its own (oversized)
    /// chunk, since a range cannot be serialized any shorter.
    pub fn split_by_byte_budget(&self, max_len: usize) -> Vec<Self> {
        let mut chunks = Vec::new();
        let mut current = Self::new();
        let mut current_len = 0usize;
        for r in &self.ranges {
            let piece = r.to_string();
            let added = if current_len == 0 { piece.len() } else { piece.len() + 1 };
            if current_len != 0 && current_len + added > max_len {
                chunks.push(std::mem::replace(&mut current, Self::new()));
                current_len = 0;
            }
            current.ranges.push(*r);
            current_len += if current.ranges.len() == 1 { piece.len() } else { piece.len() + 1 };
        }
        if !current.ranges.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|r| {
            let end = match r.end {
                RangeEnd::Value(v) => v,
                RangeEnd::Highest => r.start,
            };
            r.start..=end
        })
    }
}

impl Default for UniqueIdSet {
    fn default() -> Self {
        Self::new()
    }
}

fn ranges_touch(a: &UniqueIdRange, b: &UniqueIdRange) -> bool {
    match (a.end, b.end) {
        (RangeEnd::Highest, _) => true,
        (RangeEnd::Value(ae), _) => b.start <= ae.saturating_add(1),
    }
}

fn merge_ranges(a: &UniqueIdRange, b: &UniqueIdRange) -> UniqueIdRange {
    let start = a.start.min(b.start);
    let end = match (a.end, b.end) {
        (RangeEnd::Highest, _) | (_, RangeEnd::Highest) => RangeEnd::Highest,
        (RangeEnd::Value(ae), RangeEnd::Value(be)) => RangeEnd::Value(ae.max(be)),
    };
    UniqueIdRange { start, end }
}

/// Ordered, possibly-partial bijection between two id sequences — used to
/// model `COPYUID`/`APPENDUID` source→destination pairings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueIdMap {
    pairs: Vec<(u32, u32)>,
}

impl UniqueIdMap {
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    pub fn insert(&mut self, from: u32, to: u32) {
        self.pairs.push((from, to));
    }

    pub fn get(&self, from: u32) -> Option<u32> {
        self.pairs.iter().find(|(f, _)| *f == from).map(|(_, t)| *t)
    }

    pub fn get_reverse(&self, to: u32) -> Option<u32> {
        self.pairs.iter().find(|(_, t)| *t == to).map(|(f, _)| *f)
    }

    pub fn pairs(&self) -> &[(u32, u32)] {
        &self.pairs
    }

    /// Build a map from a COPYUID response-code pair of `UniqueIdSet`s,
    /// zipping them positionally as RFC 4315 requires.
    pub fn from_copyuid(source: &UniqueIdSet, dest: &UniqueIdSet) -> Self {
        let mut map = Self::new();
        for (from, to) in source.iter().zip(dest.iter()) {
            map.insert(from, to);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_serializes_lowest_highest() {
        assert_eq!(UniqueIdRange::to(5, 2).to_string(), "2:5");
    }

    #[test]
    fn parse_rejects_zero() {
        assert!(UniqueIdSet::parse("0").is_err());
        assert!(UniqueIdSet::parse("1,0:5").is_err());
    }

    #[test]
    fn parse_accepts_comma_separated_with_spaces() {
        let set = UniqueIdSet::parse("1:3, 7, 9:*").unwrap();
        assert!(set.contains(2));
        assert!(set.contains(7));
        assert!(!set.contains(8));
        assert!(set.contains(100));
    }

    #[test]
    fn round_trip_serialize_parse() {
        let set = UniqueIdSet::parse("1:3,7,10:12").unwrap();
        let again = UniqueIdSet::parse(&set.serialize()).unwrap();
        assert_eq!(set, again);
    }

    #[test]
    fn insert_merges_adjacent_ranges() {
        let mut set = UniqueIdSet::new();
        set.insert(1);
        set.insert(2);
        set.insert(3);
        assert_eq!(set.serialize(), "1:3");
    }

    #[test]
    fn remove_splits_range() {
        let mut set = UniqueIdSet::parse("1:10").unwrap();
        set.remove(5);
        assert_eq!(set.serialize(), "1:4,6:10");
    }

    #[test]
    fn split_by_byte_budget_respects_limit() {
        let set = UniqueIdSet::parse("1,2,3,4,5,6,7,8,9,10").unwrap();
        let chunks = set.split_by_byte_budget(5);
        for c in &chunks {
            assert!(c.serialize().len() <= 5 || c.ranges().len() == 1);
        }
        let rejoined: Vec<u32> = chunks.iter().flat_map(|c| c.iter()).collect();
        assert_eq!(rejoined, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn copyuid_map_zips_positionally() {
        let source = UniqueIdSet::parse("1:3").unwrap();
        let dest = UniqueIdSet::parse("101:103").unwrap();
        let map = UniqueIdMap::from_copyuid(&source, &dest);
        assert_eq!(map.get(1), Some(101));
        assert_eq!(map.get(3), Some(103));
    }
}
