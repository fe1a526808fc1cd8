// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission pipeline.
//!
//! Takes one inbound call to the submit endpoint to a terminal decision:
//!
//! 1. reads are redirected to the status view
//! 2. the client's rate-limit quota is consumed
//! 3. the validator runs (bot trap, access key, field rules)
//! 4. the request is normalized: transport-only fields dropped, strings
//!    escaped, category fields defaulted, structured fields parsed
//! 5. subject and body are composed
//! 6. the status counter is incremented and the submission accepted
//!
//! Only step 2 and step 6 have side effects. Delivery happens after the
//! pipeline and never feeds back into it.

use crate::client::ClientIdentity;
use crate::clock::Clock;
use crate::config::{Config, ConditionalFieldMode, PolicyConfig};
use crate::email::OutboundEmail;
use crate::error::Rejection;
use crate::limiter::{RateLimitResult, RateLimiter};
use crate::sanitizer::escape;
use crate::status::StatusCounter;
use crate::structured;
use crate::submission::{FieldValue, NormalizedSubmission, SubmissionRequest, UNKNOWN_ORIGIN};
use crate::validator::{is_blank, SubmissionValidator, ValidationOutcome};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Where reads of the submit endpoint are sent.
pub const STATUS_PATH: &str = "/api/status";

/// A call to the submit endpoint.
#[derive(Debug, Clone)]
pub enum InboundCall {
    /// GET or HEAD
    Read,
    /// POST with a parsed body
    Write(SubmissionRequest),
}

/// Accepted submission and the message composed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedSubmission {
    pub submission: NormalizedSubmission,
    pub email: OutboundEmail,
}

/// Terminal decision for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResult {
    Redirected(&'static str),
    Rejected(Rejection),
    Accepted(AcceptedSubmission),
}

/// Validation and throttling pipeline with its owned state.
pub struct SubmissionPipeline {
    limiter: RateLimiter,
    validator: SubmissionValidator,
    status: Arc<StatusCounter>,
    clock: Arc<dyn Clock>,
    recipient: String,
    heading: String,
    rate_limit_message: String,
}

impl SubmissionPipeline {
    pub fn new(config: &Config, status: Arc<StatusCounter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            limiter: RateLimiter::new(config.rate_limit.clone()),
            validator: SubmissionValidator::new(config.policy.clone()),
            status,
            clock,
            recipient: config.mail.recipient.clone(),
            heading: config.mail.heading.clone(),
            rate_limit_message: config.rate_limit.message.clone(),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn policy(&self) -> &PolicyConfig {
        self.validator.policy()
    }

    pub fn status(&self) -> &StatusCounter {
        &self.status
    }

    /// Decide the outcome of `call` from `client`.
    pub async fn handle(&self, call: InboundCall, client: &ClientIdentity) -> PipelineResult {
        let request = match call {
            InboundCall::Read => return PipelineResult::Redirected(STATUS_PATH),
            InboundCall::Write(request) => request,
        };

        if let RateLimitResult::Limited { retry_after } =
            self.limiter.admit(client, self.clock.now()).await
        {
            info!(client = %client, retry_after_secs = retry_after.as_secs(), "Submission rate limited");
            return PipelineResult::Rejected(Rejection::RateLimited {
                retry_after,
                message: self.rate_limit_message.clone(),
            });
        }

        match self.validator.validate(&request) {
            ValidationOutcome::Valid => {}
            ValidationOutcome::BotDetected => {
                info!(client = %client, "Bot trap triggered");
                return PipelineResult::Rejected(Rejection::BotDetected(
                    self.policy().bot_rejection,
                ));
            }
            ValidationOutcome::Forbidden => {
                info!(client = %client, "Invalid access key");
                return PipelineResult::Rejected(Rejection::Forbidden);
            }
            ValidationOutcome::Invalid(errors) => {
                let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
                info!(client = %client, errors = ?errors, "Validation failed");
                return PipelineResult::Rejected(Rejection::ValidationFailed(errors));
            }
        }

        let submission = normalize(request, self.policy());
        let email = OutboundEmail::compose(&submission, &self.recipient, &self.heading);
        debug!(origin = %submission.origin, fields = submission.fields.len(), "Submission normalized");

        self.status.increment();
        info!(client = %client, origin = %submission.origin, "Submission accepted");

        PipelineResult::Accepted(AcceptedSubmission { submission, email })
    }
}

/// Build the normalized form of a validated request.
pub fn normalize(request: SubmissionRequest, policy: &PolicyConfig) -> NormalizedSubmission {
    let defaulted: Vec<String> = match policy.conditional_mode {
        ConditionalFieldMode::Require => Vec::new(),
        ConditionalFieldMode::Default => request
            .selected_category
            .as_deref()
            .and_then(|c| policy.category_fields(c))
            .unwrap_or(&[])
            .iter()
            .filter(|field| request.fields.get(*field).map_or(true, is_blank))
            .cloned()
            .collect(),
    };

    let mut fields = BTreeMap::new();
    for (name, value) in request.fields {
        if policy.is_transport_field(&name) {
            continue;
        }
        let structured = policy.is_structured(&name);
        if let Some(value) = normalize_value(value, structured) {
            fields.insert(escape(&name), value);
        }
    }

    for field in defaulted {
        fields.insert(escape(&field), FieldValue::Text(escape(&policy.placeholder)));
    }

    let origin = request
        .origin
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string());

    let reply_to = policy
        .fixed_reply_to
        .clone()
        .or(request.reply_to)
        .unwrap_or_default();

    NormalizedSubmission {
        from_name: request.from_name.unwrap_or_default(),
        reply_to,
        origin,
        category: request.selected_category.as_deref().map(escape),
        sub_category: request.selected_sub_category.as_deref().map(escape),
        fields,
    }
}

fn normalize_value(value: Value, structured: bool) -> Option<FieldValue> {
    match value {
        Value::Null => None,
        Value::String(text) if structured => Some(
            structured::parse_block(&text)
                .map(|entries| FieldValue::Block(escape_entries(entries)))
                .unwrap_or_else(|_| FieldValue::Text(escape(&text))),
        ),
        Value::String(text) => Some(FieldValue::Text(escape(&text))),
        Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
        Value::Number(n) => Some(FieldValue::Text(n.to_string())),
        Value::Array(items) => Some(FieldValue::Text(
            items
                .iter()
                .map(|item| escape(&scalar_text(item)))
                .collect::<Vec<_>>()
                .join(", "),
        )),
        Value::Object(map) => Some(FieldValue::Block(
            map.iter()
                .map(|(k, v)| (escape(k), escape(&scalar_text(v))))
                .collect(),
        )),
    }
}

fn escape_entries(entries: BTreeMap<String, String>) -> BTreeMap<String, String> {
    entries
        .into_iter()
        .map(|(k, v)| (escape(&k), escape(&v)))
        .collect()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
