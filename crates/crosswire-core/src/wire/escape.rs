//! String quoting for payload tokens.
//!
//! Quoting rules of the wire grammar:
//! - NUL is written as `\0`, the token separator as `\!`, backslash as `\\`.
//! - Any character outside printable ASCII (`0x20..=0x7E`) is written as a
//!   fixed-width `\uXXXX` hex escape, one escape per UTF-16 code unit, so the
//!   server-side reader sees the exact code-unit sequence it expects.

use crate::error::{CrosswireError, Result};
use crate::wire::SEPARATOR;

/// Escape one string-table entry.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\\' => out.push_str("\\\\"),
            c if c == SEPARATOR => out.push_str("\\!"),
            c if (' '..='~').contains(&c) => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
    }
    out
}

/// Reverse of [`escape`]. Rejects truncated or unknown escape sequences.
pub fn unescape(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut units: Vec<u16> = Vec::new();
    let mut chars = s.chars();

    // Pending UTF-16 units are flushed whenever a non-\u sequence appears.
    fn flush(units: &mut Vec<u16>, out: &mut String) -> Result<()> {
        if units.is_empty() {
            return Ok(());
        }
        let decoded: String = char::decode_utf16(units.drain(..))
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| CrosswireError::Protocol("unpaired surrogate in \\u escape".into()))?;
        out.push_str(&decoded);
        Ok(())
    }

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            flush(&mut units, &mut out)?;
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('0') => {
                flush(&mut units, &mut out)?;
                out.push('\0');
            }
            Some('!') => {
                flush(&mut units, &mut out)?;
                out.push(SEPARATOR);
            }
            Some('\\') => {
                flush(&mut units, &mut out)?;
                out.push('\\');
            }
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return Err(CrosswireError::Protocol("truncated \\u escape".into()));
                }
                let unit = u16::from_str_radix(&hex, 16)
                    .map_err(|_| CrosswireError::Protocol(format!("bad \\u escape: {hex}")))?;
                units.push(unit);
            }
            other => {
                return Err(CrosswireError::Protocol(format!(
                    "unknown escape sequence: \\{}",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    flush(&mut units, &mut out)?;
    Ok(out)
}
