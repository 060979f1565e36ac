//! Request forwarding to the live backend.
//!
//! ```text
//! tiny_http::Request ──(method, headers − hop-by-hop, body)──→ reqwest
//! tiny_http::Response ←──(status, headers − hop-by-hop, streamed body)──┘
//! ```

use std::io::Read;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tiny_http::{Header, Request, Response, StatusCode};
use url::Url;

use super::response;
use crate::debug;

/// Connection-scoped headers that must not cross the proxy.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Time allowed to open a connection to the backend.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking client used by every worker: no redirects followed, no proxy.
///
/// `timeout` bounds a whole exchange; `None` lifts reqwest's 30s default.
pub fn build_client(timeout: Option<Duration>) -> Result<Client> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Resolve the inbound request target (`/path?query`) against `target`.
///
/// Only path and query are taken from the request; scheme and authority
/// always come from `target`.
pub fn upstream_url(target: &Url, request_url: &str) -> Url {
    let (path, query) = match request_url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (request_url, None),
    };
    let mut url = target.clone();
    if path.starts_with('/') {
        url.set_path(path);
    } else {
        url.set_path(&format!("/{path}"));
    }
    url.set_query(query);
    url
}

/// Forward `request` to `target` and relay the response.
///
/// Connection failures answer 502; the error is only returned when the
/// client could not be answered at all.
pub fn forward(client: &Client, target: &Url, mut request: Request) -> Result<()> {
    let url = upstream_url(target, request.url());
    let is_head = *request.method() == tiny_http::Method::Head;
    let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
        .context("Unsupported request method")?;
    let headers = outbound_headers(request.headers(), request.remote_addr());

    let mut body = Vec::new();
    request
        .as_reader()
        .read_to_end(&mut body)
        .context("Failed to read request body")?;

    debug!("proxy"; "{method} {url}");
    let upstream = match client.request(method, url).headers(headers).body(body).send() {
        Ok(upstream) => upstream,
        Err(e) => {
            debug!("proxy"; "backend unreachable: {e}");
            return response::respond_bad_gateway(request, "backend unreachable");
        }
    };

    let status = StatusCode(upstream.status().as_u16());
    let headers = inbound_headers(upstream.headers());
    // A HEAD reply has no body, so its length comes from the header alone.
    let length = if is_head {
        declared_length(upstream.headers())
    } else {
        upstream.content_length().and_then(|n| usize::try_from(n).ok())
    };

    let response = Response::new(status, headers, upstream, length, None);
    request
        .respond(response)
        .context("Failed to relay backend response")
}

/// `Content-Length` as sent by the backend.
fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(reqwest::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Client → backend headers.
///
/// `Host` passes through unchanged. `X-Forwarded-For` gets the client
/// address appended.
fn outbound_headers(headers: &[Header], remote: Option<&SocketAddr>) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len() + 1);
    let mut forwarded_for = None;

    for header in headers {
        let name = header.field.as_str().as_str();
        if is_hop_by_hop(name) || name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        if name.eq_ignore_ascii_case("x-forwarded-for") {
            forwarded_for = Some(header.value.as_str().to_string());
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(header.value.as_bytes()),
        ) {
            map.append(name, value);
        }
    }

    let client_ip = remote.map(|addr| addr.ip().to_string());
    let value = match (forwarded_for, client_ip) {
        (Some(prior), Some(ip)) => Some(format!("{prior}, {ip}")),
        (prior, ip) => prior.or(ip),
    };
    if let Some(value) = value
        && let Ok(value) = HeaderValue::from_str(&value)
    {
        map.insert("x-forwarded-for", value);
    }
    map
}

/// Backend → client headers. Length and framing are left to tiny_http.
fn inbound_headers(headers: &HeaderMap) -> Vec<Header> {
    headers
        .iter()
        .filter(|(name, _)| {
            !is_hop_by_hop(name.as_str()) && name.as_str() != "content-length"
        })
        .filter_map(|(name, value)| Header::from_bytes(name.as_str(), value.as_bytes()).ok())
        .collect()
}
