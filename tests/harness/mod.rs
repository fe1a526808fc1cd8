// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for contact relay abuse simulation.
//!
//! Drives the submission pipeline with generated traffic and tallies how
//! each request was decided.

pub mod attacks;
pub mod generators;
pub mod metrics;
