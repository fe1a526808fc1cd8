// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Relay
//!
//! Accepts contact form submissions over HTTP, validates and escapes them,
//! throttles each client, and relays accepted submissions to a fixed
//! recipient through a mail relay:
//!
//! - Fixed-window rate limiting per client identity (1000 per 24h default)
//! - Bot trap and optional shared access key
//! - Sender name and reply address checks
//! - Category-conditional required fields
//! - HTML escaping of every free-form field
//! - Read-only count of accepted submissions

pub mod client;
pub mod clock;
pub mod config;
pub mod email;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod mailer;
pub mod metrics;
pub mod pipeline;
pub mod sanitizer;
pub mod status;
pub mod structured;
pub mod submission;
pub mod validator;

pub use client::ClientIdentity;
pub use config::Config;
pub use error::Rejection;
pub use limiter::{RateLimitResult, RateLimiter};
pub use pipeline::{InboundCall, PipelineResult, SubmissionPipeline};
pub use status::StatusCounter;
pub use validator::{SubmissionValidator, ValidationOutcome};
