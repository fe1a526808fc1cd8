// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact form validator.
//!
//! Rules, in order:
//! - bot trap (short-circuits)
//! - access key, when the policy requires one (short-circuits)
//! - sender name length
//! - reply-to address shape, unless the policy fixes the reply address
//! - non-empty free-form fields, except optional and transport-only ones
//! - fields required by the selected category
//! - structured field syntax
//!
//! Everything after the access key is collected, never short-circuited.

use crate::config::{ConditionalFieldMode, PolicyConfig};
use crate::sanitizer;
use crate::structured::{self, StructuredFieldError};
use crate::submission::{is_truthy, SubmissionRequest};
use serde_json::Value;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;

pub const FROM_NAME_MIN_LEN: usize = 1;
pub const FROM_NAME_MAX_LEN: usize = 100;

/// Field-level validation errors. The display strings are returned to the
/// caller verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("From name must be between 1 and 100 characters.")]
    FromNameLength,

    #[error("Reply-to email is invalid.")]
    InvalidReplyTo,

    #[error("{0} cannot be empty.")]
    EmptyField(String),

    #[error("{field} is required for the {category} option.")]
    MissingCategoryField { category: String, field: String },

    #[error("{field} has a malformed entry: {source}")]
    MalformedStructuredField {
        field: String,
        #[source]
        source: StructuredFieldError,
    },
}

/// Result of validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Submission may proceed
    Valid,
    /// Bot trap field was set
    BotDetected,
    /// Access key missing or wrong
    Forbidden,
    /// One or more field errors, in rule order
    Invalid(Vec<ValidationError>),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    pub fn errors(&self) -> &[ValidationError] {
        match self {
            ValidationOutcome::Invalid(errors) => errors,
            _ => &[],
        }
    }
}

/// Contact form validator bound to one policy.
pub struct SubmissionValidator {
    policy: PolicyConfig,
}

impl SubmissionValidator {
    /// Create a new validator with the given policy.
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Validate a complete submission.
    pub fn validate(&self, request: &SubmissionRequest) -> ValidationOutcome {
        if request.bot_check.as_ref().map_or(false, is_truthy) {
            debug!("Bot trap field set");
            return ValidationOutcome::BotDetected;
        }

        if !self.access_key_ok(request.access_key.as_deref()) {
            debug!(present = request.access_key.is_some(), "Access key rejected");
            return ValidationOutcome::Forbidden;
        }

        let mut errors = Vec::new();

        let from_name = request.from_name.as_deref().unwrap_or("");
        if !sanitizer::is_length_in_range(from_name, FROM_NAME_MIN_LEN, FROM_NAME_MAX_LEN) {
            errors.push(ValidationError::FromNameLength);
        }

        if self.policy.fixed_reply_to.is_none()
            && !request.reply_to.as_deref().map_or(false, sanitizer::is_email)
        {
            errors.push(ValidationError::InvalidReplyTo);
        }

        let category = request.selected_category.as_deref();
        let governed = category
            .and_then(|c| self.policy.category_fields(c))
            .unwrap_or(&[]);

        for (name, value) in &request.fields {
            let Value::String(text) = value else {
                continue;
            };
            if self.policy.is_optional(name)
                || self.policy.is_transport_field(name)
                || governed.contains(name)
            {
                continue;
            }
            if sanitizer::is_empty(text) {
                errors.push(ValidationError::EmptyField(name.clone()));
            }
        }

        if self.policy.conditional_mode == ConditionalFieldMode::Require {
            if let Some(category) = category {
                for field in governed {
                    if request.fields.get(field).map_or(true, is_blank) {
                        errors.push(ValidationError::MissingCategoryField {
                            category: category.to_string(),
                            field: field.clone(),
                        });
                    }
                }
            }
        }

        for (name, value) in &request.fields {
            if !self.policy.is_structured(name) {
                continue;
            }
            if let Value::String(text) = value {
                errors.extend(structured::block_errors(text).into_iter().map(|source| {
                    ValidationError::MalformedStructuredField {
                        field: name.clone(),
                        source,
                    }
                }));
            }
        }

        if errors.is_empty() {
            ValidationOutcome::Valid
        } else {
            debug!(count = errors.len(), "Field validation failed");
            ValidationOutcome::Invalid(errors)
        }
    }

    fn access_key_ok(&self, presented: Option<&str>) -> bool {
        if !self.policy.require_access_key {
            return true;
        }
        match (self.policy.access_key.as_deref(), presented) {
            (Some(expected), Some(presented)) if !expected.is_empty() => {
                bool::from(expected.as_bytes().ct_eq(presented.as_bytes()))
            }
            _ => false,
        }
    }
}

/// Absent-equivalent values for conditionally required fields.
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => sanitizer::is_empty(s),
        _ => false,
    }
}
