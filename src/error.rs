// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Terminal rejections and their HTTP rendering.

use crate::config::BotRejectionStatus;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Why a submission did not go through.
///
/// Only `ValidationFailed` carries detail back to the caller. Bot and
/// access-key rejections say nothing about what tripped them, and delivery
/// failures are logged where they happen and reported generically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Invalid submission")]
    BotDetected(BotRejectionStatus),

    #[error("Forbidden")]
    Forbidden,

    #[error("{message}")]
    RateLimited {
        retry_after: Duration,
        message: String,
    },

    #[error("Validation failed: {}", .0.join(" "))]
    ValidationFailed(Vec<String>),

    #[error("Failed to send email.")]
    DeliveryFailed,

    #[error("Request body must be a JSON object.")]
    MalformedBody,
}

impl Rejection {
    /// Short label for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::BotDetected(_) => "bot_detected",
            Rejection::Forbidden => "forbidden",
            Rejection::RateLimited { .. } => "rate_limited",
            Rejection::ValidationFailed(_) => "validation_failed",
            Rejection::DeliveryFailed => "delivery_failed",
            Rejection::MalformedBody => "malformed_body",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Rejection::BotDetected(BotRejectionStatus::BadRequest) => StatusCode::BAD_REQUEST,
            Rejection::BotDetected(BotRejectionStatus::Forbidden) => StatusCode::FORBIDDEN,
            Rejection::Forbidden => StatusCode::FORBIDDEN,
            Rejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Rejection::DeliveryFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Rejection::MalformedBody => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Rejection::ValidationFailed(errors) => {
                (status, Json(json!({ "message": errors }))).into_response()
            }
            Rejection::RateLimited {
                retry_after,
                message,
            } => {
                // Round up so clients never retry inside the window.
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                (
                    status,
                    [(header::RETRY_AFTER, secs.to_string())],
                    Json(json!({ "message": message })),
                )
                    .into_response()
            }
            other => (status, Json(json!({ "message": other.to_string() }))).into_response(),
        }
    }
}
