// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outbound message built from a normalized submission.

use crate::sanitizer::{escape, strip_header_breaks};
use crate::submission::{FieldValue, NormalizedSubmission};
use serde::Serialize;
use std::fmt::Write;

/// Message handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub to: String,
    /// `Name <address>` display for the From header
    pub from_display: String,
    pub reply_to: String,
    pub subject: String,
    pub html_body: String,
}

impl OutboundEmail {
    /// Build the message for `submission`, addressed to `recipient`.
    pub fn compose(submission: &NormalizedSubmission, recipient: &str, heading: &str) -> Self {
        let name = strip_header_breaks(&submission.from_name);
        let reply_to = strip_header_breaks(&submission.reply_to);

        Self {
            to: recipient.to_string(),
            from_display: format!("{} <{reply_to}>", quoted_display_name(&name)),
            reply_to,
            subject: subject_line(submission),
            html_body: render_html(submission, heading),
        }
    }
}

/// Subject naming the sender and where the form lives.
pub fn subject_line(submission: &NormalizedSubmission) -> String {
    strip_header_breaks(&format!(
        "Someone from the **{}** named {} is trying to reach us",
        submission.origin, submission.from_name
    ))
}

/// HTML body: a banner followed by a definition list of the fields.
pub fn render_html(submission: &NormalizedSubmission, heading: &str) -> String {
    let mut html = String::new();

    let _ = write!(
        html,
        "<div style=\"padding: 20px; background-color: #f4f4f4; text-align: center;\">\
         <h1 style=\"color: orange;\">{}</h1>\
         <p style=\"color: #555;\">Below are the details of the submission:</p>\
         </div>",
        escape(heading)
    );

    html.push_str("<div style=\"padding: 20px;\"><dl>");
    push_entry(&mut html, "Name", &escape(&submission.from_name));
    push_entry(&mut html, "Reply-To", &escape(&submission.reply_to));
    push_entry(&mut html, "Origin", &escape(&submission.origin));
    if let Some(category) = &submission.category {
        push_entry(&mut html, "Category", category);
    }
    if let Some(sub_category) = &submission.sub_category {
        push_entry(&mut html, "Subcategory", sub_category);
    }

    // Field names and values were escaped during normalization.
    for (name, value) in &submission.fields {
        match value {
            FieldValue::Text(text) => push_entry(&mut html, name, text),
            FieldValue::Block(entries) => {
                let _ = write!(html, "<dt>{name}</dt><dd><ul>");
                for (key, val) in entries {
                    let _ = write!(html, "<li><strong>{key}</strong>: {val}</li>");
                }
                html.push_str("</ul></dd>");
            }
        }
    }
    html.push_str("</dl></div>");

    html
}

/// RFC 5322 quoted-string form of a display name.
pub fn quoted_display_name(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn push_entry(html: &mut String, label: &str, value: &str) {
    let _ = write!(html, "<dt>{label}</dt><dd>{value}</dd>");
}
