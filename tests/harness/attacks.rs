// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Abuse patterns for security testing.

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of submissions to send
    pub total_requests: usize,
    /// Number of distinct clients sending them
    pub unique_clients: usize,
    /// Share of submissions with the bot trap filled (0.0-1.0)
    pub bot_ratio: f64,
    /// Share of submissions failing field validation (0.0-1.0)
    pub invalid_ratio: f64,
    /// Per-client quota the limiter is configured with
    pub max_requests: u32,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            unique_clients: 1,
            bot_ratio: 0.0,
            invalid_ratio: 0.0,
            max_requests: 10,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// One client submitting far beyond its quota.
    pub fn single_client_flood() -> Self {
        Self {
            total_requests: 500,
            unique_clients: 1,
            ..Default::default()
        }
    }

    /// Many clients each staying inside the quota.
    pub fn distributed_flood() -> Self {
        Self {
            total_requests: 500,
            unique_clients: 100,
            ..Default::default()
        }
    }

    /// Automated form filler tripping the honeypot every time.
    pub fn bot_flood() -> Self {
        Self {
            total_requests: 50,
            unique_clients: 5,
            bot_ratio: 1.0,
            ..Default::default()
        }
    }

    /// Garbage submissions that fail field validation.
    pub fn junk_flood() -> Self {
        Self {
            total_requests: 50,
            unique_clients: 5,
            invalid_ratio: 1.0,
            ..Default::default()
        }
    }

    /// Mixed traffic from a handful of clients.
    pub fn mixed_traffic() -> Self {
        Self {
            total_requests: 200,
            unique_clients: 4,
            bot_ratio: 0.25,
            invalid_ratio: 0.25,
            max_requests: 100,
        }
    }

    /// Requests each client sends under round-robin scheduling.
    pub fn requests_per_client(&self, client: usize) -> usize {
        let base = self.total_requests / self.unique_clients;
        base + usize::from(client < self.total_requests % self.unique_clients)
    }
}

/// Expected outcomes for an attack pattern.
pub struct AttackExpectations {
    /// Upper bound on accepted submissions
    pub max_accepted: usize,
    /// Lower bound on rate-limited submissions
    pub min_rate_limited: usize,
    pub description: &'static str,
}

impl AttackConfig {
    pub fn expectations(&self) -> AttackExpectations {
        let quota = self.max_requests as usize;
        let admitted: usize = (0..self.unique_clients)
            .map(|c| self.requests_per_client(c).min(quota))
            .sum();

        if self.bot_ratio >= 1.0 {
            AttackExpectations {
                max_accepted: 0,
                min_rate_limited: self.total_requests - admitted,
                description: "Every submission trips the bot trap",
            }
        } else if self.invalid_ratio >= 1.0 {
            AttackExpectations {
                max_accepted: 0,
                min_rate_limited: self.total_requests - admitted,
                description: "Every submission fails validation",
            }
        } else {
            AttackExpectations {
                max_accepted: admitted,
                min_rate_limited: self.total_requests - admitted,
                description: "Each client is capped at its quota",
            }
        }
    }
}
