//! HTTP response handlers for requests the proxy answers itself.

use anyhow::Result;
use tiny_http::{Header, Request, Response, StatusCode};

const PLAIN: &str = "text/plain; charset=utf-8";

/// Respond with 503 Service Unavailable (no backend yet, or shutting down).
pub fn respond_unavailable(request: Request, reason: &str) -> Result<()> {
    send_text(request, 503, &format!("503 Service Unavailable: {reason}\n"))
}

/// Respond with 502 Bad Gateway (backend unreachable).
pub fn respond_bad_gateway(request: Request, reason: &str) -> Result<()> {
    send_text(request, 502, &format!("502 Bad Gateway: {reason}\n"))
}

fn send_text(request: Request, status: u16, body: &str) -> Result<()> {
    let response = Response::from_string(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", PLAIN));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).expect("static header is valid")
}
