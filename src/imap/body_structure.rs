/*
 * body_structure.rs
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

//! BODYSTRUCTURE: a recursive tree discriminated by whether the first
//! token of a parenthesized group is an atom (single part) or another
//! list (multipart child). Extension data past the required fields is
//! optional and purely positional.

use super::response::Envelope;
use super::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Disposition {
    pub kind: String,
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Part {
    pub content_type: String,
    pub subtype: String,
    pub params: Vec<(String, String)>,
    pub id: Option<String>,
    pub description: Option<String>,
    pub transfer_encoding: String,
    pub size_bytes: u64,
    /// Line count, present for TEXT/* and MESSAGE/RFC822 parts only.
    pub lines: Option<u64>,
    pub md5: Option<String>,
    pub disposition: Option<Disposition>,
    pub language: Vec<String>,
    pub location: Option<String>,
    /// For MESSAGE/RFC822 parts: the embedded envelope, body structure and
    /// line count that appear at fixed positions after the basic fields.
    pub embedded: Option<Box<EmbeddedMessage>>,
    /// Part id as a dotted path, e.g. `"1"`, `"1.2"`. Filled in by the
    /// caller that walks the assembled tree (`BodyStructure::assign_ids`),
    /// not by the parser itself, since ids depend on tree position.
    pub part_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedMessage {
    pub envelope: Envelope,
    pub body: BodyStructure,
    pub line_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyStructure {
    Single(Part),
    Multipart {
        children: Vec<BodyStructure>,
        subtype: String,
        params: Vec<(String, String)>,
        disposition: Option<Disposition>,
        language: Vec<String>,
        location: Option<String>,
    },
}

impl BodyStructure {
    /// Parse a BODYSTRUCTURE (or BODY) fetch value, already tokenized.
    /// `value` must be the `Value::List` that followed the `BODYSTRUCTURE`
    /// atom in the FETCH attribute stream.
    pub fn parse(value: &Value) -> Option<Self> {
        let items = value.as_list()?;
        if items.is_empty() {
            return None;
        }
        if matches!(items[0], Value::List(_)) {
            parse_multipart(items)
        } else {
            parse_single(items).map(BodyStructure::Single)
        }
    }

    /// Walk the tree assigning dotted-path part ids in document order.
    /// Single-part messages get `"1"`; multipart children are numbered
    /// `1`, `2`, … and nested parts get `"parent.child"`.
    pub fn assign_ids(&mut self) {
        assign_ids_rec(self, "");
    }
}

fn assign_ids_rec(node: &mut BodyStructure, prefix: &str) {
    match node {
        BodyStructure::Single(part) => {
            part.part_id = if prefix.is_empty() { "1".to_string() } else { prefix.to_string() };
            if let Some(embedded) = &mut part.embedded {
                let child_prefix = if prefix.is_empty() { "1".to_string() } else { prefix.to_string() };
                assign_ids_rec(&mut embedded.body, &child_prefix);
            }
        }
        BodyStructure::Multipart { children, .. } => {
            for (i, child) in children.iter_mut().enumerate() {
                let id = i + 1;
                let child_prefix = if prefix.is_empty() { id.to_string() } else { format!("{}.{}", prefix, id) };
                assign_ids_rec(child, &child_prefix);
            }
        }
    }
}

fn text_of(v: Option<&Value>) -> Option<String> {
    v.and_then(|v| if v.is_nil() { None } else { v.as_text() })
}

fn params_of(v: Option<&Value>) -> Vec<(String, String)> {
    let Some(list) = v.and_then(|v| v.as_list()) else { return Vec::new() };
    let mut out = Vec::new();
    let mut it = list.iter();
    while let (Some(k), Some(val)) = (it.next(), it.next()) {
        if let (Some(k), Some(val)) = (k.as_text(), val.as_text()) {
            out.push((k, val));
        }
    }
    out
}

fn disposition_of(v: Option<&Value>) -> Option<Disposition> {
    let v = v?;
    if v.is_nil() {
        return None;
    }
    let list = v.as_list()?;
    let kind = list.first().and_then(|v| v.as_text())?;
    let params = params_of(list.get(1));
    Some(Disposition { kind, params })
}

fn language_of(v: Option<&Value>) -> Vec<String> {
    match v {
        None => Vec::new(),
        Some(Value::Nil) => Vec::new(),
        Some(Value::List(items)) => items.iter().filter_map(|i| i.as_text()).collect(),
        Some(other) => other.as_text().into_iter().collect(),
    }
}

fn parse_single(items: &[Value]) -> Option<Part> {
    let content_type = items.first()?.as_text()?.to_ascii_uppercase();
    let subtype = items.get(1)?.as_text()?.to_ascii_uppercase();
    let params = params_of(items.get(2));
    let id = text_of(items.get(3));
    let description = text_of(items.get(4));
    let transfer_encoding = items.get(5).and_then(|v| v.as_text()).unwrap_or_default();
    let size_bytes: u64 = items.get(6).and_then(|v| v.as_text()).and_then(|s| s.parse().ok()).unwrap_or(0);

    let mut idx = 7;
    let mut embedded = None;
    let mut lines = None;

    if content_type == "MESSAGE" && subtype == "RFC822" {
        let envelope = items.get(idx).and_then(Envelope::parse);
        idx += 1;
        let body = items.get(idx).and_then(BodyStructure::parse);
        idx += 1;
        let line_count: u64 = items.get(idx).and_then(|v| v.as_text()).and_then(|s| s.parse().ok()).unwrap_or(0);
        idx += 1;
        if let (Some(envelope), Some(body)) = (envelope, body) {
            embedded = Some(Box::new(EmbeddedMessage { envelope, body, line_count }));
        }
    } else if content_type == "TEXT" {
        lines = items.get(idx).and_then(|v| v.as_text()).and_then(|s| s.parse().ok());
        idx += 1;
    }

    let md5 = text_of(items.get(idx));
    idx += 1;
    let disposition = disposition_of(items.get(idx));
    idx += 1;
    let language = language_of(items.get(idx));
    idx += 1;
    let location = text_of(items.get(idx));

    Some(Part {
        content_type,
        subtype,
        params,
        id,
        description,
        transfer_encoding,
        size_bytes,
        lines,
        md5,
        disposition,
        language,
        location,
        embedded,
        part_id: String::new(),
    })
}

fn parse_multipart(items: &[Value]) -> Option<BodyStructure> {
    let mut children = Vec::new();
    let mut i = 0;
    while let Some(Value::List(_)) = items.get(i) {
        if let Some(child) = BodyStructure::parse(&items[i]) {
            children.push(child);
        }
        i += 1;
    }
    let subtype = items.get(i)?.as_text()?.to_ascii_uppercase();
    let params = params_of(items.get(i + 1));
    let disposition = disposition_of(items.get(i + 2));
    let language = language_of(items.get(i + 3));
    let location = text_of(items.get(i + 4));
    Some(BodyStructure::Multipart { children, subtype, params, disposition, language, location })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imap::value::tokenize;

    #[test]
    fn parses_single_text_part() {
        let text = r#"("TEXT" "PLAIN" ("CHARSET" "UTF-8") NIL NIL "7BIT" 1152 23)"#;
        let vals = tokenize(text, &[]);
        let mut bs = BodyStructure::parse(&vals[0]).unwrap();
        bs.assign_ids();
        match bs {
            BodyStructure::Single(part) => {
                assert_eq!(part.content_type, "TEXT");
                assert_eq!(part.subtype, "PLAIN");
                assert_eq!(part.params, vec![("CHARSET".to_string(), "UTF-8".to_string())]);
                assert_eq!(part.size_bytes, 1152);
                assert_eq!(part.lines, Some(23));
                assert_eq!(part.part_id, "1");
            }
            _ => panic!("expected single part"),
        }
    }

    #[test]
    fn parses_multipart_with_dotted_ids() {
        let text = concat!(
            r#"(("TEXT" "PLAIN" NIL NIL NIL "7BIT" 100 3)"#,
            r#"("TEXT" "HTML" NIL NIL NIL "7BIT" 200 8)"#,
            r#" "ALTERNATIVE")"#
        );
        let vals = tokenize(text, &[]);
        let mut bs = BodyStructure::parse(&vals[0]).unwrap();
        bs.assign_ids();
        match bs {
            BodyStructure::Multipart { children, subtype, .. } => {
                assert_eq!(subtype, "ALTERNATIVE");
                assert_eq!(children.len(), 2);
                if let BodyStructure::Single(p) = &children[0] {
                    assert_eq!(p.part_id, "1");
                }
                if let BodyStructure::Single(p) = &children[1] {
                    assert_eq!(p.part_id, "2");
                }
            }
            _ => panic!("expected multipart"),
        }
    }
}
