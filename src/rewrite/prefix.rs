//! Forwarded-prefix reconciliation of backend redirects.
//!
//! A reverse proxy that strips a path prefix before forwarding announces it
//! in `X-Forwarded-Prefix`. Backends unaware of the prefix emit redirects
//! that drop it; this puts it back.

use url::{ParseError, Url};

use crate::rewrite::error::MalformedLocationError;

/// Re-apply `forwarded_prefix` to `location` when the backend dropped it.
///
/// Empty `forwarded_host` / `forwarded_prefix` mean the header was absent.
/// Cross-origin locations are returned as they are. Query and fragment are
/// preserved.
pub fn reconcile_prefix(
    location: &str,
    forwarded_host: &str,
    forwarded_prefix: &str,
) -> Result<String, MalformedLocationError> {
    match Url::parse(location) {
        Ok(mut url) => {
            if url.cannot_be_a_base() {
                return Ok(location.to_string());
            }
            if !same_origin(url.host_str().unwrap_or(""), forwarded_host) {
                return Ok(location.to_string());
            }
            match prefixed_path(url.path(), forwarded_prefix) {
                Some(path) => {
                    url.set_path(&path);
                    Ok(url.into())
                }
                None => Ok(location.to_string()),
            }
        }
        Err(ParseError::RelativeUrlWithoutBase) => {
            let reference = RelativeReference::parse(location)?;
            if let Some(authority) = reference.authority {
                if !same_origin(authority_host(authority), forwarded_host) {
                    return Ok(location.to_string());
                }
            }
            match prefixed_path(reference.path, forwarded_prefix) {
                Some(path) => Ok(reference.with_path(&path)),
                None => Ok(location.to_string()),
            }
        }
        Err(err) => Err(MalformedLocationError::new(location, err.to_string())),
    }
}

/// Join a prefix and a path, collapsing runs of `/`.
pub fn join_paths(prefix: &str, path: &str) -> String {
    let separator = if path.is_empty() { None } else { Some('/') };
    let mut joined = String::with_capacity(prefix.len() + path.len() + 1);
    for c in prefix.chars().chain(separator).chain(path.chars()) {
        if c == '/' && joined.ends_with('/') {
            continue;
        }
        joined.push(c);
    }
    joined
}

/// `None` when `path` already carries the prefix.
fn prefixed_path(path: &str, prefix: &str) -> Option<String> {
    let wanted = prefix.trim_start_matches('/');
    if path.trim_start_matches('/').starts_with(wanted) {
        return None;
    }
    Some(join_paths(prefix, path))
}

fn same_origin(location_host: &str, forwarded_host: &str) -> bool {
    location_host.is_empty() || location_host.eq_ignore_ascii_case(authority_host(forwarded_host))
}

/// Host part of an authority, without userinfo or port. IPv6 literals keep
/// their brackets, matching `Url::host_str`.
fn authority_host(authority: &str) -> &str {
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);

    if host_port.starts_with('[') {
        return match host_port.find(']') {
            Some(end) => &host_port[..=end],
            None => host_port,
        };
    }

    host_port
        .split_once(':')
        .map_or(host_port, |(host, _)| host)
}

/// A relative reference (`path?query#fragment`, optionally `//authority`).
#[derive(Debug, PartialEq, Eq)]
struct RelativeReference<'a> {
    authority: Option<&'a str>,
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> RelativeReference<'a> {
    fn parse(location: &'a str) -> Result<Self, MalformedLocationError> {
        validate_reference(location)?;

        let (rest, fragment) = match location.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (location, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };
        let (authority, path) = match rest.strip_prefix("//") {
            Some(network) => match network.find('/') {
                Some(slash) => (Some(&network[..slash]), &network[slash..]),
                None => (Some(network), ""),
            },
            None => (None, rest),
        };

        Ok(Self {
            authority,
            path,
            query,
            fragment,
        })
    }

    fn with_path(&self, path: &str) -> String {
        let mut out = String::new();
        if let Some(authority) = self.authority {
            out.push_str("//");
            out.push_str(authority);
            if !path.starts_with('/') {
                out.push('/');
            }
        }
        out.push_str(path);
        if let Some(query) = self.query {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = self.fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

fn validate_reference(location: &str) -> Result<(), MalformedLocationError> {
    let bytes = location.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b if b < 0x20 || b == 0x7f || b == b' ' => {
                return Err(MalformedLocationError::new(
                    location,
                    format!("invalid character at offset {i}"),
                ));
            }
            b'%' => {
                let escape = bytes.get(i + 1..i + 3);
                if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                    return Err(MalformedLocationError::new(
                        location,
                        format!("invalid URL escape at offset {i}"),
                    ));
                }
                i += 3;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    Ok(())
}
