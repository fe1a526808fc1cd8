// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for submission outcomes.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `contact_relay_submissions_total` | Counter | `outcome` |
//! | `contact_relay_deliveries_total` | Counter | `result` |
//! | `contact_relay_tracked_clients` | Gauge | |

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to register metric: {0}")]
    RegistrationFailed(#[from] prometheus::Error),

    #[error("failed to encode metrics: {0}")]
    EncodingFailed(String),
}

/// Service metrics registered in a private registry.
#[derive(Clone)]
pub struct RelayMetrics {
    registry: Registry,
    submissions: IntCounterVec,
    deliveries: IntCounterVec,
    tracked_clients: IntGauge,
}

impl RelayMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let submissions = IntCounterVec::new(
            Opts::new(
                "contact_relay_submissions_total",
                "Submission pipeline outcomes",
            ),
            &["outcome"],
        )?;
        let deliveries = IntCounterVec::new(
            Opts::new("contact_relay_deliveries_total", "Mail relay hand-offs"),
            &["result"],
        )?;
        let tracked_clients = IntGauge::new(
            "contact_relay_tracked_clients",
            "Client identities in the rate limit table",
        )?;

        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(deliveries.clone()))?;
        registry.register(Box::new(tracked_clients.clone()))?;

        Ok(Self {
            registry,
            submissions,
            deliveries,
            tracked_clients,
        })
    }

    /// Count a pipeline outcome (`accepted`, `rate_limited`, ...).
    pub fn submission(&self, outcome: &str) {
        self.submissions.with_label_values(&[outcome]).inc();
    }

    pub fn delivery(&self, ok: bool) {
        let result = if ok { "sent" } else { "failed" };
        self.deliveries.with_label_values(&[result]).inc();
    }

    pub fn set_tracked_clients(&self, count: usize) {
        self.tracked_clients.set(count as i64);
    }

    pub fn submission_count(&self, outcome: &str) -> u64 {
        self.submissions.with_label_values(&[outcome]).get()
    }

    /// Prometheus text exposition.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::EncodingFailed(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingFailed(e.to_string()))
    }
}
