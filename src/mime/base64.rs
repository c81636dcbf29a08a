/*
 * base64.rs
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

//! Base64 codec. Encode side feeds the transport in bounded output windows;
//! decode side accepts arbitrary line fragments, since IMAP frames payloads
//! in text lines rather than base64 quanta.

use std::sync::OnceLock;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::MailError;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Output window size for streaming encode: 512 base64 bytes per flush,
/// produced from 384 input bytes.
pub const ENCODE_WINDOW: usize = 512;

const ENCODE_INPUT_WINDOW: usize = ENCODE_WINDOW / 4 * 3;

/// Symbol -> 6-bit value; -1 for bytes outside the alphabet.
fn decode_table() -> &'static [i8; 256] {
    static TABLE: OnceLock<[i8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [-1i8; 256];
        for (i, &c) in ALPHABET.iter().enumerate() {
            t[c as usize] = i as i8;
        }
        t
    })
}

fn encode_quantum(chunk: &[u8], out: &mut Vec<u8>) {
    let b0 = chunk[0];
    let b1 = chunk.get(1).copied().unwrap_or(0);
    let b2 = chunk.get(2).copied().unwrap_or(0);
    out.push(ALPHABET[(b0 >> 2) as usize]);
    out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize]);
    out.push(if chunk.len() > 1 {
        ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize]
    } else {
        b'='
    });
    out.push(if chunk.len() > 2 {
        ALPHABET[(b2 & 0x3f) as usize]
    } else {
        b'='
    });
}

/// Encode a whole buffer into one unwrapped base64 string.
pub fn encode(data: &[u8]) -> String {
    let mut out = Vec::with_capacity((data.len() + 2) / 3 * 4);
    for chunk in data.chunks(3) {
        encode_quantum(chunk, &mut out);
    }
    // the alphabet and '=' are ASCII
    String::from_utf8(out).unwrap_or_default()
}

/// Encode a byte source onto a sink in 512-byte output windows, each
/// terminated by CRLF and flushed before the next is produced. The source
/// may be an in-memory slice or an open file; both go through the same
/// path. Returns the count of base64 symbols written, excluding the CRLFs.
pub async fn encode_stream<R, W>(src: &mut R, out: &mut W) -> Result<usize, MailError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut input = vec![0u8; ENCODE_INPUT_WINDOW];
    let mut filled = 0usize;
    let mut written = 0usize;
    loop {
        let n = src.read(&mut input[filled..]).await?;
        filled += n;
        let at_end = n == 0;
        if filled == ENCODE_INPUT_WINDOW || (at_end && filled > 0) {
            let mut window = Vec::with_capacity(ENCODE_WINDOW + 2);
            for chunk in input[..filled].chunks(3) {
                encode_quantum(chunk, &mut window);
            }
            written += window.len();
            window.extend_from_slice(b"\r\n");
            out.write_all(&window).await?;
            out.flush().await?;
            filled = 0;
            if !at_end {
                tokio::task::yield_now().await;
            }
        }
        if at_end {
            out.flush().await?;
            return Ok(written);
        }
    }
}

/// Decode one line fragment. Invalid bytes are skipped; the needed padding
/// is `(4 - valid mod 4) mod 4`; whole quanta decode to 3 bytes each and
/// the trailing padding bytes are dropped from the output. Returns None
/// when no valid symbol is present.
pub fn decode_fragment(fragment: &[u8]) -> Option<Vec<u8>> {
    let table = decode_table();
    let mut values: Vec<u8> = Vec::with_capacity(fragment.len());
    let mut pad_chars = 0usize;
    for &b in fragment {
        if b == b'=' {
            pad_chars += 1;
            continue;
        }
        let v = table[b as usize];
        if v >= 0 {
            values.push(v as u8);
        }
    }
    if values.is_empty() {
        return None;
    }
    let fill = (4 - values.len() % 4) % 4;
    for _ in 0..fill {
        values.push(0);
    }
    let mut out = Vec::with_capacity(values.len() / 4 * 3);
    for q in values.chunks(4) {
        out.push((q[0] << 2) | (q[1] >> 4));
        out.push((q[1] << 4) | (q[2] >> 2));
        out.push((q[2] << 6) | q[3]);
    }
    let drop = if fill != 0 { fill } else { pad_chars.min(2) };
    let keep = out.len().saturating_sub(drop);
    out.truncate(keep);
    Some(out)
}

/// Estimated decoded size of a base64 run of `symbol_len` symbols with
/// `padding` trailing '=' bytes. Callers must first strip per-line CRLF
/// overhead from a declared literal length, sized against the server's
/// actual line width.
pub fn decoded_size_estimate(symbol_len: usize, padding: usize) -> usize {
    (symbol_len / 4 * 3).saturating_sub(padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_known_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "Zg==");
        assert_eq!(encode(b"fo"), "Zm8=");
        assert_eq!(encode(b"foo"), "Zm9v");
        assert_eq!(encode(b"foobar"), "Zm9vYmFy");
    }

    #[test]
    fn round_trip_all_lengths() {
        for len in 0..64usize {
            let data: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            let encoded = encode(&data);
            let decoded = decode_fragment(encoded.as_bytes());
            if len == 0 {
                assert!(decoded.is_none());
            } else {
                assert_eq!(decoded.unwrap(), data, "len {}", len);
            }
        }
    }

    #[test]
    fn decode_skips_invalid_bytes() {
        let decoded = decode_fragment(b"Zm\r\n9v YmFy").unwrap();
        assert_eq!(decoded, b"foobar");
        let decoded = decode_fragment(b"#Zg=!=").unwrap();
        assert_eq!(decoded, b"f");
    }

    #[test]
    fn decode_without_valid_symbols_is_none() {
        assert!(decode_fragment(b"").is_none());
        assert!(decode_fragment(b"\r\n \t").is_none());
    }

    #[test]
    fn decode_unaligned_fragment_drops_fill() {
        // five symbols carry 30 bits: three whole bytes survive
        let decoded = decode_fragment(b"QUJDQ").unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(&decoded, b"ABC");
    }

    #[test]
    fn size_estimate() {
        assert_eq!(decoded_size_estimate(8, 2), 4);
        assert_eq!(decoded_size_estimate(4, 0), 3);
        assert_eq!(decoded_size_estimate(0, 0), 0);
    }

    #[tokio::test]
    async fn encode_stream_matches_buffer_encode() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        let mut src = &data[..];
        let expected = encode(&data);
        let writer = async {
            let n = encode_stream(&mut src, &mut client).await.unwrap();
            drop(client);
            n
        };
        let reader = async {
            let mut out = Vec::new();
            tokio::io::AsyncReadExt::read_to_end(&mut server, &mut out)
                .await
                .unwrap();
            out
        };
        let (written, out) = tokio::join!(writer, reader);
        assert_eq!(written, expected.len());
        let text = String::from_utf8(out).unwrap();
        // windows are CRLF-separated; the symbol stream itself is unchanged
        let joined: String = text.split("\r\n").collect();
        assert_eq!(joined, expected);
        for line in text.trim_end().split("\r\n") {
            assert!(line.len() <= ENCODE_WINDOW);
        }
    }
}
