// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Traffic generators for abuse simulation.

use contact_relay::submission::SubmissionRequest;
use serde_json::json;
use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of distinct client addresses.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// A submission that passes every check under the default policy.
pub fn valid_submission(i: usize) -> SubmissionRequest {
    SubmissionRequest {
        from_name: Some(format!("Visitor {i}")),
        reply_to: Some(format!("visitor{i}@example.com")),
        origin: Some("Landing Page".to_string()),
        bot_check: Some(json!(false)),
        ..Default::default()
    }
    .with_field("message", format!("Hello number {i}"))
}

/// A submission with the bot trap filled in.
pub fn bot_submission(i: usize) -> SubmissionRequest {
    SubmissionRequest {
        bot_check: Some(json!("on")),
        ..valid_submission(i)
    }
}

/// A submission that fails field validation.
pub fn invalid_submission(i: usize) -> SubmissionRequest {
    SubmissionRequest {
        from_name: Some("x".repeat(101)),
        reply_to: Some(format!("visitor{i}-at-example.com")),
        ..valid_submission(i)
    }
}

/// Markup and script payloads that must never reach the email body raw.
pub fn injection_payloads() -> Vec<&'static str> {
    vec![
        "<script>alert(1)</script>",
        "<img src=x onerror=alert(1)>",
        "\"><svg onload=alert(1)>",
        "'; DROP TABLE contacts; --",
        "<a href=\"javascript:alert(1)\">click</a>",
        "</dd></dl><iframe src=//evil.example>",
        "`${alert(1)}`",
        "<<SCRIPT>alert(1)//<</SCRIPT>",
    ]
}

/// Raw markup fragments that must be absent from escaped output.
pub fn forbidden_fragments() -> Vec<&'static str> {
    vec!["<script", "<SCRIPT", "<img", "<svg", "<iframe", "<a href"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ips() {
        let ips = generate_ips(256);
        assert_eq!(ips.len(), 256);
        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), 256);
    }

    #[test]
    fn test_payloads_contain_forbidden_markup() {
        let payloads = injection_payloads();
        let with_markup = payloads
            .iter()
            .filter(|p| forbidden_fragments().iter().any(|f| p.contains(f)))
            .count();
        assert!(with_markup >= 5);
    }
}
