/*
 * flags.rs
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

//! IMAP message flags: the predefined set plus arbitrary keywords.

/// Predefined system flags, stored as a bitset. `UserDefined` marks that at
/// least one keyword (stored separately) is present — it is not itself a
/// keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemFlags(u8);

impl SystemFlags {
    pub const SEEN: SystemFlags = SystemFlags(1 << 0);
    pub const ANSWERED: SystemFlags = SystemFlags(1 << 1);
    pub const FLAGGED: SystemFlags = SystemFlags(1 << 2);
    pub const DELETED: SystemFlags = SystemFlags(1 << 3);
    pub const DRAFT: SystemFlags = SystemFlags(1 << 4);
    pub const RECENT: SystemFlags = SystemFlags(1 << 5);
    pub const USER_DEFINED: SystemFlags = SystemFlags(1 << 6);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, other: SystemFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: SystemFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: SystemFlags) {
        self.0 &= !other.0;
    }

    fn from_name(name: &str) -> Option<SystemFlags> {
        match name {
            "\\Seen" => Some(Self::SEEN),
            "\\Answered" => Some(Self::ANSWERED),
            "\\Flagged" => Some(Self::FLAGGED),
            "\\Deleted" => Some(Self::DELETED),
            "\\Draft" => Some(Self::DRAFT),
            "\\Recent" => Some(Self::RECENT),
            _ => None,
        }
    }
}

impl std::ops::BitOr for SystemFlags {
    type Output = SystemFlags;
    fn bitor(self, rhs: Self) -> Self::Output {
        SystemFlags(self.0 | rhs.0)
    }
}

/// A full flag set: predefined flags plus a side list of keyword strings
/// (e.g. `$Forwarded`, custom labels).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFlags {
    system: SystemFlags,
    keywords: Vec<String>,
}

impl MessageFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system(&self) -> SystemFlags {
        self.system
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn has_system(&self, flag: SystemFlags) -> bool {
        self.system.contains(flag)
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword))
    }

    pub fn insert_system(&mut self, flag: SystemFlags) {
        self.system.insert(flag);
    }

    pub fn insert_keyword(&mut self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        if !self.has_keyword(&keyword) {
            self.system.insert(SystemFlags::USER_DEFINED);
            self.keywords.push(keyword);
        }
    }

    /// Parse a parenthesized IMAP flag list's inner content, already split
    /// on whitespace by the caller (the FETCH/STORE attribute tokenizer
    /// does the parenthesis matching; this just classifies each token).
    pub fn from_tokens<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Self {
        let mut flags = Self::new();
        for tok in tokens {
            if tok.eq_ignore_ascii_case("\\Recent") {
                flags.insert_system(SystemFlags::RECENT);
            } else if let Some(sys) = SystemFlags::from_name(tok) {
                flags.insert_system(sys);
            } else if tok == "\\*" {
                flags.insert_system(SystemFlags::USER_DEFINED);
            } else if !tok.is_empty() {
                flags.insert_keyword(tok.to_string());
            }
        }
        flags
    }

    /// Render back to the space-separated token list used inside `(...)`.
    pub fn to_tokens(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.has_system(SystemFlags::SEEN) {
            out.push("\\Seen".to_string());
        }
        if self.has_system(SystemFlags::ANSWERED) {
            out.push("\\Answered".to_string());
        }
        if self.has_system(SystemFlags::FLAGGED) {
            out.push("\\Flagged".to_string());
        }
        if self.has_system(SystemFlags::DELETED) {
            out.push("\\Deleted".to_string());
        }
        if self.has_system(SystemFlags::DRAFT) {
            out.push("\\Draft".to_string());
        }
        if self.has_system(SystemFlags::RECENT) {
            out.push("\\Recent".to_string());
        }
        out.extend(self.keywords.iter().cloned());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_system_and_keyword_flags() {
        let flags = MessageFlags::from_tokens(["\\Seen", "\\Flagged", "$Forwarded"]);
        assert!(flags.has_system(SystemFlags::SEEN));
        assert!(flags.has_system(SystemFlags::FLAGGED));
        assert!(!flags.has_system(SystemFlags::DELETED));
        assert!(flags.has_keyword("$Forwarded"));
    }

    #[test]
    fn round_trips_tokens() {
        let flags = MessageFlags::from_tokens(["\\Seen", "\\Draft", "Work"]);
        let tokens = flags.to_tokens();
        assert!(tokens.contains(&"\\Seen".to_string()));
        assert!(tokens.contains(&"\\Draft".to_string()));
        assert!(tokens.contains(&"Work".to_string()));
    }
}
