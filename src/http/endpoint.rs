use std::fmt;
use std::net::{IpAddr, SocketAddr};
use url::Url;

const HTTP_SCHEME: &str = "http://";
const HTTPS_SCHEME: &str = "https://";
const HTTPS_PORT: u16 = 443;

/// A connectable upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Numeric IP literal with an explicit port. Carries the literal's true
    /// address family.
    Ip(SocketAddr),
    /// Hostname resolved at connect time. Always treated as IPv4-resolvable;
    /// the actual family is decided when the connect step runs the lookup.
    Dns { host: String, port: u16 },
}

impl Endpoint {
    /// Whether the endpoint satisfies the IPv4-only invariant. Hostnames
    /// always do; numeric literals only when they actually are IPv4.
    pub fn is_ipv4(&self) -> bool {
        match self {
            Endpoint::Ip(addr) => addr.is_ipv4(),
            Endpoint::Dns { .. } => true,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Endpoint::Ip(addr) => addr.port(),
            Endpoint::Dns { port, .. } => *port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Ip(addr) => write!(f, "{addr}"),
            Endpoint::Dns { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

/// Resolves a request target into an endpoint.
///
/// Tries an IP literal first, then falls back to URI parsing with
/// scheme-aware port defaulting. Returns `None` on malformed input; callers
/// turn that into a bad-request error.
pub fn resolve_endpoint(target: &str) -> Option<Endpoint> {
    if target.trim().is_empty() {
        return None;
    }

    if let Some(endpoint) = parse_ip_endpoint(target) {
        return Some(endpoint);
    }

    parse_uri_endpoint(target)
}

/// `[scheme://]ip:port[/path]` with a literal IP. The rightmost colon group
/// is the port; anything after the first slash is dropped.
fn parse_ip_endpoint(target: &str) -> Option<Endpoint> {
    let stripped = target
        .replace(HTTP_SCHEME, "")
        .replace(HTTPS_SCHEME, "");
    let stripped = stripped.split('/').next()?;

    let (host, port) = stripped.rsplit_once(':')?;
    let ip: IpAddr = host.parse().ok()?;
    let port: u16 = port.parse().ok()?;

    Some(Endpoint::Ip(SocketAddr::new(ip, port)))
}

/// URI fallback. An explicit non-443 port without an `https://` prefix is
/// stripped so the plain URI defaults apply; an explicit 443 without a
/// scheme gets `https://` prepended so the default port resolves correctly.
fn parse_uri_endpoint(target: &str) -> Option<Endpoint> {
    let url = match find_explicit_port(target) {
        Some(port) if !target.starts_with(HTTPS_SCHEME) => {
            let stripped = target.replace(&format!(":{port}"), "");
            if port == HTTPS_PORT {
                Url::parse(&format!("{HTTPS_SCHEME}{stripped}")).ok()?
            } else {
                Url::parse(&stripped).ok()?
            }
        }
        _ => Url::parse(target).ok()?,
    };

    let host = url.host_str()?.to_string();
    let port = url.port_or_known_default()?;

    Some(Endpoint::Dns { host, port })
}

/// First `:<digits>` group in the string, if it parses as a port.
fn find_explicit_port(target: &str) -> Option<u16> {
    let bytes = target.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b':' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > start {
                return target[start..end].parse().ok();
            }
        }
        i += 1;
    }

    None
}
