/*
 * search.rs
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

//! SEARCH/STORE query composition. `SearchQuery` is a flat list of
//! [`SearchKey`]s joined by implicit AND (adjacency, per RFC 3501); `OR`
//! and `NOT` nest explicitly where the grammar requires it.

use chrono::NaiveDate;

use crate::uid::UniqueIdSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    All,
    Answered,
    Unanswered,
    Seen,
    Unseen,
    Deleted,
    Undeleted,
    Flagged,
    Unflagged,
    Draft,
    Undraft,
    Recent,
    New,
    Old,
    From(String),
    To(String),
    Cc(String),
    Bcc(String),
    Subject(String),
    Body(String),
    Text(String),
    Header(String, String),
    Since(NaiveDate),
    Before(NaiveDate),
    On(NaiveDate),
    SentSince(NaiveDate),
    SentBefore(NaiveDate),
    SentOn(NaiveDate),
    Larger(u64),
    Smaller(u64),
    Uid(UniqueIdSet),
    SequenceSet(UniqueIdSet),
    Keyword(String),
    Unkeyword(String),
    Not(Box<SearchKey>),
    Or(Box<SearchKey>, Box<SearchKey>),
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn date_str(d: &NaiveDate) -> String {
    d.format("%d-%b-%Y").to_string()
}

impl SearchKey {
    pub fn serialize(&self) -> String {
        match self {
            SearchKey::All => "ALL".to_string(),
            SearchKey::Answered => "ANSWERED".to_string(),
            SearchKey::Unanswered => "UNANSWERED".to_string(),
            SearchKey::Seen => "SEEN".to_string(),
            SearchKey::Unseen => "UNSEEN".to_string(),
            SearchKey::Deleted => "DELETED".to_string(),
            SearchKey::Undeleted => "UNDELETED".to_string(),
            SearchKey::Flagged => "FLAGGED".to_string(),
            SearchKey::Unflagged => "UNFLAGGED".to_string(),
            SearchKey::Draft => "DRAFT".to_string(),
            SearchKey::Undraft => "UNDRAFT".to_string(),
            SearchKey::Recent => "RECENT".to_string(),
            SearchKey::New => "NEW".to_string(),
            SearchKey::Old => "OLD".to_string(),
            SearchKey::From(s) => format!("FROM {}", quote(s)),
            SearchKey::To(s) => format!("TO {}", quote(s)),
            SearchKey::Cc(s) => format!("CC {}", quote(s)),
            SearchKey::Bcc(s) => format!("BCC {}", quote(s)),
            SearchKey::Subject(s) => format!("SUBJECT {}", quote(s)),
            SearchKey::Body(s) => format!("BODY {}", quote(s)),
            SearchKey::Text(s) => format!("TEXT {}", quote(s)),
            SearchKey::Header(name, value) => format!("HEADER {} {}", quote(name), quote(value)),
            SearchKey::Since(d) => format!("SINCE {}", date_str(d)),
            SearchKey::Before(d) => format!("BEFORE {}", date_str(d)),
            SearchKey::On(d) => format!("ON {}", date_str(d)),
            SearchKey::SentSince(d) => format!("SENTSINCE {}", date_str(d)),
            SearchKey::SentBefore(d) => format!("SENTBEFORE {}", date_str(d)),
            SearchKey::SentOn(d) => format!("SENTON {}", date_str(d)),
            SearchKey::Larger(n) => format!("LARGER {}", n),
            SearchKey::Smaller(n) => format!("SMALLER {}", n),
            SearchKey::Uid(set) => format!("UID {}", set.serialize()),
            SearchKey::SequenceSet(set) => set.serialize(),
            SearchKey::Keyword(k) => format!("KEYWORD {}", k),
            SearchKey::Unkeyword(k) => format!("UNKEYWORD {}", k),
            SearchKey::Not(inner) => format!("NOT {}", inner.serialize()),
            SearchKey::Or(a, b) => format!("OR {} {}", a.serialize(), b.serialize()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    keys: Vec<SearchKey>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, key: SearchKey) -> Self {
        self.keys.push(key);
        self
    }

    pub fn keys(&self) -> &[SearchKey] {
        &self.keys
    }

    /// Render as the space-separated key list that follows `SEARCH`/`UID
    /// SEARCH` on the wire. An empty query serializes as `ALL`.
    pub fn serialize(&self) -> String {
        if self.keys.is_empty() {
            return SearchKey::All.serialize();
        }
        self.keys.iter().map(SearchKey::serialize).collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_serializes_as_all() {
        assert_eq!(SearchQuery::new().serialize(), "ALL");
    }

    #[test]
    fn implicit_and_via_adjacency() {
        let q = SearchQuery::new().and(SearchKey::Unseen).and(SearchKey::From("alice@example.com".to_string()));
        assert_eq!(q.serialize(), r#"UNSEEN FROM "alice@example.com""#);
    }

    #[test]
    fn date_serializes_as_dd_mon_yyyy() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(SearchKey::Since(d).serialize(), "SINCE 05-Jan-2024");
    }

    #[test]
    fn or_and_not_nest_explicitly() {
        let q = SearchKey::Or(Box::new(SearchKey::Seen), Box::new(SearchKey::Not(Box::new(SearchKey::Flagged))));
        assert_eq!(q.serialize(), "OR SEEN NOT FLAGGED");
    }

    #[test]
    fn uid_key_wraps_set_serialization() {
        let set = UniqueIdSet::parse("1:5").unwrap();
        assert_eq!(SearchKey::Uid(set).serialize(), "UID 1:5");
    }
}
