// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Inbound submission body and its normalized form.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Display origin used when the form does not say where it was embedded.
pub const UNKNOWN_ORIGIN: &str = "Unknown Origin";

/// Contact form body as posted by the browser.
///
/// Wire names follow the deployed form (`from_name`, `replyto`, `botcheck`,
/// `Origin`, `selectedOption`); camel-case aliases are accepted. Every other
/// key lands in `fields`.
///
/// Decoding never fails on the shape of a value. A distinguished field that
/// is not a string is treated as absent, and when a field arrives under more
/// than one alias the first non-null one in [`FIELD_ALIASES`] order wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>")]
pub struct SubmissionRequest {
    #[serde(rename = "from_name")]
    pub from_name: Option<String>,

    #[serde(rename = "replyto")]
    pub reply_to: Option<String>,

    #[serde(rename = "botcheck")]
    pub bot_check: Option<Value>,

    #[serde(rename = "Origin")]
    pub origin: Option<String>,

    #[serde(rename = "selectedOption")]
    pub selected_category: Option<String>,

    #[serde(rename = "selectedSubOption")]
    pub selected_sub_category: Option<String>,

    #[serde(rename = "access_key")]
    pub access_key: Option<String>,

    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// Accepted wire names for each distinguished field, preferred first.
pub const FIELD_ALIASES: [&[&str]; 7] = [
    &["from_name", "fromName"],
    &["replyto", "replyTo"],
    &["botcheck", "botCheck", "botCheckFlag"],
    &["Origin", "origin"],
    &["selectedOption", "selectedCategory"],
    &["selectedSubOption", "selectedSubCategory"],
    &["access_key", "accessKey"],
];

impl From<BTreeMap<String, Value>> for SubmissionRequest {
    fn from(mut body: BTreeMap<String, Value>) -> Self {
        let [from_name, reply_to, bot_check, origin, category, sub_category, access_key] =
            FIELD_ALIASES.map(|names| take_first(&mut body, names));

        Self {
            from_name: text(from_name),
            reply_to: text(reply_to),
            bot_check,
            origin: text(origin),
            selected_category: text(category),
            selected_sub_category: text(sub_category),
            access_key: text(access_key),
            fields: body,
        }
    }
}

/// Remove every alias from `body`, keeping the first non-null value.
fn take_first(body: &mut BTreeMap<String, Value>, names: &[&str]) -> Option<Value> {
    names
        .iter()
        .filter_map(|name| body.remove(*name))
        .filter(|value| !value.is_null())
        .reduce(|first, _| first)
}

fn text(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

impl SubmissionRequest {
    /// Set a free-form field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// One free-form field after escaping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Block(BTreeMap<String, String>),
}

/// Validated, escaped and defaulted submission ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedSubmission {
    /// Sender name as typed (headers are sanitized separately)
    pub from_name: String,
    /// Reply address, possibly replaced by policy
    pub reply_to: String,
    /// Where the form was embedded, defaulted to [`UNKNOWN_ORIGIN`]
    pub origin: String,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
}

/// JavaScript-style truthiness, except that the usual spellings of "no" in
/// a string are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty()
                || s.eq_ignore_ascii_case("false")
                || s == "0"
                || s.eq_ignore_ascii_case("off")
                || s.eq_ignore_ascii_case("no"))
        }
        Value::Array(_) | Value::Object(_) => true,
    }
}
