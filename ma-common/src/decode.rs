//! Percent-decoding for campaign parameter values
//!
//! Ad platforms sometimes encode a value more than once, and sometimes leave a
//! literal `%` unescaped (ad names like "77% off"). Decoding is therefore a
//! two-step affair: rewrite every `%` that does not start a valid escape to
//! `%25`, then percent-decode repeatedly until the value stops changing.
//!
//! Neither step ever fails. A value that cannot be decoded further is
//! returned as-is.

use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use tracing::debug;

/// Rewrite every `%` not followed by two hex digits to `%25`
///
/// Equivalent to the global replacement of `%(?![0-9A-Fa-f]{2})` with `%25`:
/// each `%` is judged on its own, escapes are not consumed.
pub fn normalize_bare_percent(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    if !has_bare_percent(bytes) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 8);
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'%' && !is_escape_at(bytes, i) {
            out.push_str(&input[start..=i]);
            out.push_str("25");
            start = i + 1;
        }
    }
    out.push_str(&input[start..]);
    Cow::Owned(out)
}

/// Decode a value until it reaches a fixed point
///
/// `+` is read as a space (query-string convention) before the first pass.
/// A pass that fails is retried once after a fresh bare-`%` normalization;
/// if that also fails the current state is returned.
pub fn fully_decode(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let mut decoded = normalize_bare_percent(value).replace('+', " ");
    loop {
        let next = match decode_once(&decoded) {
            Some(next) => next,
            None => match decode_once(&normalize_bare_percent(&decoded)) {
                Some(next) => next,
                None => {
                    debug!(
                        "Percent-decoding stopped, keeping partially decoded value for {:?}",
                        value
                    );
                    break;
                }
            },
        };

        if next == decoded {
            break;
        }
        decoded = next;
    }
    decoded
}

/// Strict single pass: fails on a bare `%` or on invalid UTF-8
fn decode_once(value: &str) -> Option<String> {
    if has_bare_percent(value.as_bytes()) {
        return None;
    }
    percent_decode_str(value)
        .decode_utf8()
        .ok()
        .map(|cow| cow.into_owned())
}

fn has_bare_percent(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .enumerate()
        .any(|(i, &b)| b == b'%' && !is_escape_at(bytes, i))
}

fn is_escape_at(bytes: &[u8], i: usize) -> bool {
    matches!(
        (bytes.get(i + 1), bytes.get(i + 2)),
        (Some(h), Some(l)) if h.is_ascii_hexdigit() && l.is_ascii_hexdigit()
    )
}
