// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! `key: value; key: value` blocks submitted in a single text field.
//!
//! Segments are separated by `;` and split on their first `:`. Keys and
//! values are trimmed. Empty segments (including a trailing `;`) are ignored.
//! A later duplicate key replaces the earlier value.

use std::collections::BTreeMap;
use thiserror::Error;

/// A malformed segment in a structured block. `segment` is zero-based and
/// counts non-empty segments only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructuredFieldError {
    #[error("entry {segment} has no ':' separator")]
    MissingSeparator { segment: usize },

    #[error("entry {segment} has an empty key")]
    EmptyKey { segment: usize },
}

/// Parse a block into an ordered map.
pub fn parse_block(text: &str) -> Result<BTreeMap<String, String>, StructuredFieldError> {
    let mut entries = BTreeMap::new();

    let segments = text.split(';').map(str::trim).filter(|s| !s.is_empty());
    for (segment, raw) in segments.enumerate() {
        let (key, value) = raw
            .split_once(':')
            .ok_or(StructuredFieldError::MissingSeparator { segment })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(StructuredFieldError::EmptyKey { segment });
        }
        entries.insert(key.to_string(), value.trim().to_string());
    }

    Ok(entries)
}

/// Every malformed segment of a block, for error reporting.
pub fn block_errors(text: &str) -> Vec<StructuredFieldError> {
    text.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .filter_map(|(segment, raw)| match raw.split_once(':') {
            None => Some(StructuredFieldError::MissingSeparator { segment }),
            Some((key, _)) if key.trim().is_empty() => {
                Some(StructuredFieldError::EmptyKey { segment })
            }
            Some(_) => None,
        })
        .collect()
}
