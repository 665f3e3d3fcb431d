/*
 * fetch.rs
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

//! FETCH request composition: resolves a list of data items (including
//! `BODY[section]<partial>` section specifiers) to the wire string that
//! follows `FETCH <set>`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySectionPart {
    Header,
    HeaderFields(Vec<String>),
    HeaderFieldsNot(Vec<String>),
    Text,
    Mime,
    All,
}

/// A `BODY[section]<partial>` / `BODY.PEEK[section]<partial>` specifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchBodySection {
    /// Dotted part path, e.g. `"1.2"`; empty means the top-level message.
    pub part_path: String,
    pub part: Option<BodySectionPart>,
    /// `<offset.length>`, when a partial fetch is requested.
    pub partial: Option<(u64, u64)>,
    /// Use `BODY.PEEK[...]` instead of `BODY[...]` (does not set `\Seen`).
    pub peek: bool,
}

impl FetchBodySection {
    pub fn resolve(&self) -> String {
        let mut section = self.part_path.clone();
        if let Some(part) = &self.part {
            if !section.is_empty() {
                section.push('.');
            }
            section.push_str(&match part {
                BodySectionPart::Header => "HEADER".to_string(),
                BodySectionPart::HeaderFields(fields) => format!("HEADER.FIELDS ({})", fields.join(" ")),
                BodySectionPart::HeaderFieldsNot(fields) => format!("HEADER.FIELDS.NOT ({})", fields.join(" ")),
                BodySectionPart::Text => "TEXT".to_string(),
                BodySectionPart::Mime => "MIME".to_string(),
                BodySectionPart::All => String::new(),
            });
        }
        let keyword = if self.peek { "BODY.PEEK" } else { "BODY" };
        let mut out = format!("{}[{}]", keyword, section);
        if let Some((offset, length)) = self.partial {
            out.push_str(&format!("<{}.{}>", offset, length));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    Flags,
    Uid,
    Rfc822Size,
    InternalDate,
    Envelope,
    BodyStructure,
    Body(FetchBodySection),
    ModSeq,
    Fast,
    All,
    Full,
}

impl FetchItem {
    pub fn resolve(&self) -> String {
        match self {
            FetchItem::Flags => "FLAGS".to_string(),
            FetchItem::Uid => "UID".to_string(),
            FetchItem::Rfc822Size => "RFC822.SIZE".to_string(),
            FetchItem::InternalDate => "INTERNALDATE".to_string(),
            FetchItem::Envelope => "ENVELOPE".to_string(),
            FetchItem::BodyStructure => "BODYSTRUCTURE".to_string(),
            FetchItem::Body(section) => section.resolve(),
            FetchItem::ModSeq => "MODSEQ".to_string(),
            FetchItem::Fast => "FAST".to_string(),
            FetchItem::All => "ALL".to_string(),
            FetchItem::Full => "FULL".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    items: Vec<FetchItem>,
}

impl FetchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, item: FetchItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn items(&self) -> &[FetchItem] {
        &self.items
    }

    /// The parenthesized item list that follows `FETCH <set> `, e.g.
    /// `(FLAGS UID)`, or a single bare item with no parens when exactly
    /// one was requested, matching how most servers log a single-item
    /// fetch (both forms parse identically on the wire).
    pub fn resolve(&self) -> String {
        match self.items.as_slice() {
            [] => "()".to_string(),
            [one] => one.resolve(),
            many => format!("({})", many.iter().map(FetchItem::resolve).collect::<Vec<_>>().join(" ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_simple_items() {
        let req = FetchRequest::new().with(FetchItem::Flags).with(FetchItem::Uid);
        assert_eq!(req.resolve(), "(FLAGS UID)");
    }

    #[test]
    fn resolves_body_section_with_partial() {
        let section = FetchBodySection {
            part_path: "1".to_string(),
            part: Some(BodySectionPart::Text),
            partial: Some((0, 1024)),
            peek: true,
        };
        assert_eq!(section.resolve(), "BODY.PEEK[1.TEXT]<0.1024>");
    }

    #[test]
    fn resolves_header_fields_section() {
        let section = FetchBodySection {
            part_path: String::new(),
            part: Some(BodySectionPart::HeaderFields(vec!["FROM".to_string(), "SUBJECT".to_string()])),
            partial: None,
            peek: false,
        };
        assert_eq!(section.resolve(), "BODY[HEADER.FIELDS (FROM SUBJECT)]");
    }

    #[test]
    fn single_item_resolves_without_parens() {
        let req = FetchRequest::new().with(FetchItem::BodyStructure);
        assert_eq!(req.resolve(), "BODYSTRUCTURE");
    }
}
