// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! String escaping and shape checks for submitted form fields.
//!
//! Escaping is the boundary that keeps user input from being interpreted as
//! markup in the generated email. It is idempotent: an `&` that already opens
//! a well-formed entity reference is kept as is, so escaped text can pass
//! through `escape` again without turning `&lt;` into `&amp;lt;`.

use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of a full address (RFC 5321 path limit minus brackets).
const MAX_EMAIL_LEN: usize = 254;
const MAX_LOCAL_PART_LEN: usize = 64;
const MAX_DOMAIN_LEN: usize = 253;

fn local_part_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*$")
            .expect("local part pattern is valid")
    })
}

fn domain_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$")
            .expect("domain label pattern is valid")
    })
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^&(?:[A-Za-z][A-Za-z0-9]{1,31}|#[0-9]{1,7}|#[xX][0-9A-Fa-f]{1,6});")
            .expect("entity pattern is valid")
    })
}

/// Escape HTML-significant characters.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (idx, ch) in value.char_indices() {
        match ch {
            '&' if entity_re().is_match(&value[idx..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            '\\' => out.push_str("&#x5C;"),
            '`' => out.push_str("&#96;"),
            _ => out.push(ch),
        }
    }
    out
}

/// True for empty or whitespace-only strings.
pub fn is_empty(value: &str) -> bool {
    value.trim().is_empty()
}

/// Length check in Unicode scalar values, inclusive on both ends.
pub fn is_length_in_range(value: &str, min: usize, max: usize) -> bool {
    let len = value.chars().count();
    (min..=max).contains(&len)
}

/// Syntactic email address check.
///
/// Accepts the dot-atom form of RFC 5322 with a DNS hostname domain whose
/// last label is alphabetic. Quoted local parts and address literals are
/// rejected.
pub fn is_email(value: &str) -> bool {
    if value.len() > MAX_EMAIL_LEN {
        return false;
    }

    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };

    if local.is_empty() || local.len() > MAX_LOCAL_PART_LEN || !local_part_re().is_match(local) {
        return false;
    }

    if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|l| domain_label_re().is_match(l)) {
        return false;
    }

    labels
        .last()
        .map_or(false, |tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
}

/// Remove line breaks and other control characters from a header value.
pub fn strip_header_breaks(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '\r' || c == '\n' || c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}
