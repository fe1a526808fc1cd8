// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Client identity used to key rate-limit state.
//!
//! The identity is the peer address unless the service sits behind
//! reverse proxies, in which case the configured number of trusted hops is
//! walked back through `X-Forwarded-For` (right to left).

use axum::http::HeaderMap;
use std::fmt;
use std::net::IpAddr;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Rate-limit key for a caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Resolve the identity from the peer address and forwarding headers.
    ///
    /// With `trusted_hops == 0` the header is ignored. Otherwise each trusted
    /// hop vouches for the address to its left; resolution stops early at
    /// the first entry that is not an IP address.
    pub fn resolve(peer: IpAddr, headers: &HeaderMap, trusted_hops: usize) -> Self {
        if trusted_hops == 0 {
            return Self::from(peer);
        }

        let chain: Vec<&str> = headers
            .get_all(FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let mut client = peer;
        for entry in chain.iter().rev().take(trusted_hops) {
            match entry.parse::<IpAddr>() {
                Ok(ip) => client = ip,
                Err(_) => break,
            }
        }

        Self::from(client)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientIdentity {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
