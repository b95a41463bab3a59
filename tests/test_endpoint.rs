//! Tests for target endpoint resolution

use siphon::http::endpoint::Endpoint;
use siphon::http::resolve_endpoint;

fn dns(host: &str, port: u16) -> Endpoint {
    Endpoint::Dns {
        host: host.to_string(),
        port,
    }
}

#[test]
fn test_ip_with_port() {
    assert_eq!(
        resolve_endpoint("127.0.0.1:9000"),
        Some(Endpoint::Ip("127.0.0.1:9000".parse().unwrap()))
    );
}

#[test]
fn test_ip_with_scheme_and_path() {
    assert_eq!(
        resolve_endpoint("http://8.8.8.8:53/query"),
        Some(Endpoint::Ip("8.8.8.8:53".parse().unwrap()))
    );
}

#[test]
fn test_ip_without_port_is_not_found() {
    assert_eq!(resolve_endpoint("127.0.0.1"), None);
}

#[test]
fn test_http_url_defaults_to_port_80() {
    assert_eq!(
        resolve_endpoint("http://example.com/page"),
        Some(dns("example.com", 80))
    );
}

#[test]
fn test_https_url_defaults_to_port_443() {
    assert_eq!(
        resolve_endpoint("https://example.com/"),
        Some(dns("example.com", 443))
    );
}

#[test]
fn test_host_with_443_gets_https_default() {
    // no scheme plus an explicit 443 resolves through the https default
    assert_eq!(
        resolve_endpoint("www.example.com:443"),
        Some(dns("www.example.com", 443))
    );
}

#[test]
fn test_https_url_keeps_explicit_port() {
    assert_eq!(
        resolve_endpoint("https://example.com:8443/"),
        Some(dns("example.com", 8443))
    );
}

#[test]
fn test_http_url_with_explicit_port_falls_back_to_default() {
    // an explicit non-443 port without an https prefix is stripped before
    // the final parse, so URI defaults apply
    assert_eq!(
        resolve_endpoint("http://example.com:8080/path"),
        Some(dns("example.com", 80))
    );
}

#[test]
fn test_bare_hostname_with_other_port_is_not_found() {
    // stripping a non-443 port leaves a schemeless string, which is not an
    // absolute URI
    assert_eq!(resolve_endpoint("example.com:8080"), None);
}

#[test]
fn test_garbage_is_not_found() {
    assert_eq!(resolve_endpoint(""), None);
    assert_eq!(resolve_endpoint("   "), None);
    assert_eq!(resolve_endpoint("jdjskdskdfh"), None);
}

#[test]
fn test_ipv6_literal_keeps_its_family() {
    let endpoint = resolve_endpoint("::1:443").unwrap();
    assert!(!endpoint.is_ipv4());
}

#[test]
fn test_display_formats_host_and_port() {
    assert_eq!(dns("example.com", 80).to_string(), "example.com:80");
    assert_eq!(
        resolve_endpoint("127.0.0.1:9000").unwrap().to_string(),
        "127.0.0.1:9000"
    );
}
