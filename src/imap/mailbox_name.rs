/*
 * mailbox_name.rs
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

//! IMAP modified UTF-7 (RFC 3501 §5.1.3) mailbox name encode/decode.
//!
//! Modified UTF-7 differs from standard UTF-7 in two ways: `&` rather than
//! `+` introduces a shifted sequence, and the base64 alphabet uses `,`
//! instead of `/`. `&-` encodes a literal `&`.

const B64_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+,";

fn b64_value(c: u8) -> Option<u8> {
    B64_ALPHABET.iter().position(|&x| x == c).map(|p| p as u8)
}

/// Encode a Unicode mailbox name to modified UTF-7.
pub fn encode(name: &str) -> String {
    let mut out = String::new();
    let mut run: Vec<u16> = Vec::new();

    fn flush(run: &mut Vec<u16>, out: &mut String) {
        if run.is_empty() {
            return;
        }
        out.push('&');
        let mut bitbuf: u32 = 0;
        let mut bits = 0u32;
        for &u in run.iter() {
            bitbuf = (bitbuf << 16) | u as u32;
            bits += 16;
            while bits >= 6 {
                bits -= 6;
                let idx = ((bitbuf >> bits) & 0x3f) as usize;
                out.push(B64_ALPHABET[idx] as char);
            }
        }
        if bits > 0 {
            let idx = ((bitbuf << (6 - bits)) & 0x3f) as usize;
            out.push(B64_ALPHABET[idx] as char);
        }
        out.push('-');
        run.clear();
    }

    for c in name.chars() {
        let is_printable_ascii = (0x20..=0x7e).contains(&(c as u32)) && c != '&';
        if is_printable_ascii {
            flush(&mut run, &mut out);
            out.push(c);
        } else if c == '&' {
            flush(&mut run, &mut out);
            out.push_str("&-");
        } else {
            let mut buf = [0u16; 2];
            for u in c.encode_utf16(&mut buf) {
                run.push(*u);
            }
        }
    }
    flush(&mut run, &mut out);
    out
}

/// Decode a modified UTF-7 mailbox name back to Unicode. Invalid sequences
/// are passed through as their literal source characters rather than
/// erroring, matching the leniency the rest of the decoder stack favors.
pub fn decode(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut out = String::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'&' {
            out.push(bytes[i] as char);
            i += 1;
            continue;
        }
        // '&' shift sequence
        let start = i;
        i += 1;
        if i < bytes.len() && bytes[i] == b'-' {
            out.push('&');
            i += 1;
            continue;
        }
        let seq_start = i;
        while i < bytes.len() && bytes[i] != b'-' {
            i += 1;
        }
        let seq = &bytes[seq_start..i];
        if i < bytes.len() {
            i += 1; // consume trailing '-'
        }
        match decode_shifted(seq) {
            Some(units) => {
                if let Ok(s) = String::from_utf16(&units) {
                    out.push_str(&s);
                } else {
                    out.push_str(&encoded[start..i]);
                }
            }
            None => out.push_str(&encoded[start..i]),
        }
    }
    out
}

fn decode_shifted(seq: &[u8]) -> Option<Vec<u16>> {
    let mut bitbuf: u32 = 0;
    let mut bits = 0u32;
    let mut units = Vec::new();
    for &b in seq {
        let v = b64_value(b)?;
        bitbuf = (bitbuf << 6) | v as u32;
        bits += 6;
        if bits >= 16 {
            bits -= 16;
            units.push(((bitbuf >> bits) & 0xffff) as u16);
        }
    }
    Some(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii() {
        let name = "INBOX/Archive";
        assert_eq!(decode(&encode(name)), name);
    }

    #[test]
    fn round_trips_non_ascii() {
        let name = "Отправленные";
        let encoded = encode(name);
        assert_eq!(decode(&encoded), name);
    }

    #[test]
    fn encodes_literal_ampersand_as_shift_minus() {
        assert_eq!(encode("Q&A"), "Q&-A");
        assert_eq!(decode("Q&-A"), "Q&A");
    }

    #[test]
    fn decodes_known_rfc_example() {
        // "Hello & world" style mix of plain + shifted segment, informal smoke test.
        let name = "Hello & world";
        assert_eq!(decode(&encode(name)), name);
    }
}
