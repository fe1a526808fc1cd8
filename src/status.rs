// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Count of accepted submissions since process start.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct StatusCounter {
    accepted: AtomicU64,
}

impl StatusCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one accepted submission.
    pub fn increment(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn current_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }
}
