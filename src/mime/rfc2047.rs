/*
 * rfc2047.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, an embeddable mail submission and retrieval engine.
 *
 * Postino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Postino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Postino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! RFC 2047 encoded-word decoding for header values (=?charset?q?text?=),
//! plus charset capture for the per-field charset slots of the result store.

use crate::mime::base64;

/// Charset declared by a leading encoded-word, e.g. "UTF-8" for
/// "=?UTF-8?B?...?=". None when the value does not start with one.
pub fn encoded_word_charset(value: &str) -> Option<&str> {
    let rest = value.trim_start().strip_prefix("=?")?;
    let end = rest.find('?')?;
    if end == 0 {
        return None;
    }
    Some(&rest[..end])
}

/// Expand every RFC 2047 encoded-word in the string; literal segments are
/// copied through unchanged.
pub fn decode_encoded_words(s: &str) -> String {
    let mut out = String::new();
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut pos = 0;

    while pos < len {
        if let Some(start) = find_encoded_word_start(bytes, pos) {
            out.push_str(std::str::from_utf8(&bytes[pos..start]).unwrap_or(""));
            pos = start;
            if let Some((decoded, end)) = decode_one_encoded_word(bytes, len, &mut pos) {
                out.push_str(&decoded);
                pos = end;
            } else {
                out.push_str(std::str::from_utf8(&bytes[pos..pos + 2.min(len - pos)]).unwrap_or(""));
                pos = (pos + 2).min(len);
            }
        } else {
            out.push_str(std::str::from_utf8(&bytes[pos..]).unwrap_or(""));
            break;
        }
    }
    out
}

fn find_encoded_word_start(bytes: &[u8], from: usize) -> Option<usize> {
    let rest = bytes.get(from..)?;
    let needle = b"=?";
    rest.windows(needle.len())
        .position(|w| w == needle)
        .map(|i| from + i)
}

/// Decode one encoded-word at current pos. Returns (decoded_string, position_after_?=) or None.
fn decode_one_encoded_word(bytes: &[u8], len: usize, pos: &mut usize) -> Option<(String, usize)> {
    if *pos + 4 > len || &bytes[*pos..*pos + 2] != b"=?" {
        return None;
    }
    *pos += 2;
    let charset_start = *pos;
    let qmark1 = bytes[*pos..].iter().position(|&b| b == b'?')? + *pos;
    if qmark1 < charset_start + 1 || qmark1 + 2 >= len {
        return None;
    }
    let charset = std::str::from_utf8(&bytes[charset_start..qmark1]).ok()?.trim();
    let encoding = bytes[qmark1 + 1].to_ascii_lowercase();
    if bytes[qmark1 + 2] != b'?' {
        return None;
    }
    *pos = qmark1 + 3;
    let payload_start = *pos;
    let rest = &bytes[*pos..];
    let end_in_rest = rest.windows(2).position(|w| w[0] == b'?' && w[1] == b'=')?;
    let payload_end = *pos + end_in_rest;
    *pos = payload_end + 2; // consume ?=

    let payload = &bytes[payload_start..payload_end];
    let decoded_bytes = match encoding {
        b'b' => base64::decode_fragment(payload).unwrap_or_default(),
        b'q' => decode_q(payload),
        _ => return None,
    };
    let decoded = charset_bytes_to_string(&decoded_bytes, charset);
    Some((decoded, *pos))
}

/// Q encoding: _ is space, =XX is a hex-encoded byte, anything else literal.
fn decode_q(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    let mut i = 0;
    while i < payload.len() {
        match payload[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => match (hex_val(payload.get(i + 1)), hex_val(payload.get(i + 2))) {
                (Some(hi), Some(lo)) => {
                    out.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'=');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

fn hex_val(b: Option<&u8>) -> Option<u8> {
    match *b? {
        b @ b'0'..=b'9' => Some(b - b'0'),
        b @ b'A'..=b'F' => Some(b - b'A' + 10),
        b @ b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

fn charset_bytes_to_string(bytes: &[u8], charset: &str) -> String {
    let charset_lower = charset.to_ascii_lowercase();
    match charset_lower.as_str() {
        "utf-8" | "utf8" | "us-ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin1" | "iso_8859-1" => bytes.iter().map(|&b| b as char).collect(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}
