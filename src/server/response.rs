use may_minihttp::Response;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "OK",
    }
}

/// Serialize a handler body onto the response. JSON values keep their key
/// order and numeric form exactly as decoded, so an echoed body reproduces
/// the client's bytes.
pub fn write_handler_response(res: &mut Response, status: u16, body: &Value) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: application/json");
    let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    res.body_vec(bytes);
}

pub fn write_json_error(res: &mut Response, status: u16, body: &Value) {
    write_handler_response(res, status, body);
}

/// Interned `Allow:` header lines. `Response::header` wants a `'static str`,
/// so each distinct allow list is leaked exactly once and reused afterwards.
/// The route table is fixed at startup, so the interned set stays bounded no
/// matter how many 405s a client produces.
fn allow_header(allow: &[String]) -> &'static str {
    static INTERNED: OnceLock<Mutex<HashMap<String, &'static str>>> = OnceLock::new();
    let line = format!("Allow: {}", allow.join(", "));
    let mut map = INTERNED
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    if let Some(&interned) = map.get(&line) {
        return interned;
    }
    let leaked: &'static str = Box::leak(line.clone().into_boxed_str());
    map.insert(line, leaked);
    leaked
}

/// A 405 response with its Allow header, methods in registration order.
pub fn write_method_not_allowed(res: &mut Response, body: &Value, allow: &[String]) {
    res.status_code(405, status_reason(405));
    res.header(allow_header(allow));
    res.header("Content-Type: application/json");
    let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    res.body_vec(bytes);
}

/// Plain-text response for the metrics endpoint.
pub fn write_text_response(res: &mut Response, status: u16, body: String) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: text/plain; version=0.0.4");
    res.body_vec(body.into_bytes());
}
