use std::fmt;
use std::net::Ipv4Addr;

use axum::http::HeaderName;

use crate::http::context::RequestContext;

/// Coarse address family of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
    Unknown,
}

impl AddressFamily {
    /// Classify a candidate address string.
    ///
    /// Any colon means IPv6, including `a.b.c.d:port` and IPv4-mapped forms.
    pub fn of(candidate: &str) -> Self {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Self::Unknown;
        }
        if candidate.contains(':') {
            Self::Ipv6
        } else if candidate.parse::<Ipv4Addr>().is_ok() {
            Self::Ipv4
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the client address came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSource {
    ForwardedFor,
    Header(HeaderName),
    Peer,
    None,
}

impl fmt::Display for AddressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForwardedFor => f.write_str("x-forwarded-for"),
            Self::Header(name) => f.write_str(name.as_str()),
            Self::Peer => f.write_str("peer"),
            Self::None => f.write_str("none"),
        }
    }
}

/// The selected client address and its family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress {
    /// Empty when no source produced an address.
    pub address: String,
    pub source: AddressSource,
    pub family: AddressFamily,
}

/// Pick the client address of a request and classify it.
pub fn classify(ctx: &RequestContext) -> ClientAddress {
    let (address, source) = forwarded_for_candidate(&ctx.forwarded_for)
        .map(|address| (address.to_string(), AddressSource::ForwardedFor))
        .or_else(|| {
            ctx.trusted_addresses
                .iter()
                .find(|(_, value)| !value.trim().is_empty())
                .map(|(name, value)| (value.trim().to_string(), AddressSource::Header(name.clone())))
        })
        .or_else(|| ctx.peer.map(|peer| (peer.ip().to_string(), AddressSource::Peer)))
        .unwrap_or_else(|| (String::new(), AddressSource::None));

    let family = AddressFamily::of(&address);
    ClientAddress {
        address,
        source,
        family,
    }
}

/// The rightmost non-blank `X-Forwarded-For` entry, trimmed.
pub fn forwarded_for_candidate(entries: &[String]) -> Option<&str> {
    entries
        .iter()
        .rev()
        .map(|entry| entry.trim())
        .find(|entry| !entry.is_empty())
}
