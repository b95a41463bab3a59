use crate::error::ProxyError;
use crate::http::endpoint::{Endpoint, resolve_endpoint};

/// Parsed request line. Constructed once per request, never mutated.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// HTTP method token, verbatim.
    pub method: String,
    /// Raw request target as the client sent it.
    pub target: String,
    /// Endpoint the target resolved to.
    pub endpoint: Endpoint,
    /// Protocol token, e.g. `HTTP/1.1`.
    pub protocol: String,
}

/// Parses a request line of the form `<METHOD> <TARGET> <PROTOCOL>`,
/// separated by single spaces.
///
/// Fails with `BadRequest` on fewer than 3 tokens, a blank method or
/// target, a target that does not resolve, or a resolved address family
/// that is not IPv4.
pub fn parse_request_head(line: &str) -> Result<RequestHead, ProxyError> {
    let parts: Vec<&str> = line.split(' ').collect();

    if parts.len() < 3 {
        return Err(ProxyError::BadRequest(format!("bad request line: {line}")));
    }

    let method = parts[0];
    if method.trim().is_empty() {
        return Err(ProxyError::BadRequest(format!("bad http method: {method}")));
    }

    let target = parts[1];
    if target.trim().is_empty() {
        return Err(ProxyError::BadRequest(format!("bad request url: {target}")));
    }

    let endpoint = resolve_endpoint(target)
        .ok_or_else(|| ProxyError::BadRequest(format!("bad url: {target}")))?;

    if !endpoint.is_ipv4() {
        return Err(ProxyError::BadRequest(format!("not ipv4: {target}")));
    }

    Ok(RequestHead {
        method: method.to_string(),
        target: target.to_string(),
        endpoint,
        protocol: parts[2].to_string(),
    })
}
