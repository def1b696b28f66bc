use std::io::Read;
use std::sync::Arc;

use may_minihttp::Request;
use tracing::debug;

use crate::dispatcher::HeaderVec;
use crate::router::ParamVec;

/// Raw material extracted from a `may_minihttp::Request` before routing.
///
/// The body stays as bytes here; decoding happens after routing so that
/// unroutable requests never pay for a JSON parse.
#[derive(Debug)]
pub struct ParsedRequest {
    /// Method string as it appeared on the request line.
    pub method: String,
    /// Path with the query string stripped.
    pub path: String,
    /// Path as received, query string included.
    pub raw_path: String,
    /// Headers with lowercased names.
    pub headers: HeaderVec,
    pub query_params: ParamVec,
    /// Raw body bytes, empty when the request carried none.
    pub body: Vec<u8>,
}

impl ParsedRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Query string parameters in the order they appear on the wire.
#[must_use]
pub fn parse_query_params(raw_path: &str) -> ParamVec {
    let mut params = ParamVec::new();
    if let Some(pos) = raw_path.find('?') {
        for (k, v) in url::form_urlencoded::parse(raw_path[pos + 1..].as_bytes()) {
            params.push((Arc::from(k.as_ref()), v.to_string()));
        }
    }
    params
}

pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let raw_path = req.path().to_string();
    let path = raw_path
        .split('?')
        .next()
        .unwrap_or("/")
        .to_string();

    let mut headers = HeaderVec::new();
    for h in req.headers() {
        headers.push((
            Arc::from(h.name.to_ascii_lowercase().as_str()),
            String::from_utf8_lossy(h.value).to_string(),
        ));
    }

    let query_params = parse_query_params(&raw_path);

    let mut body = Vec::new();
    if req.body().read_to_end(&mut body).is_err() {
        body.clear();
    }

    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        query_param_count = query_params.len(),
        body_bytes = body.len(),
        "Request parsed"
    );

    ParsedRequest {
        method,
        path,
        raw_path,
        headers,
        query_params,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_params_preserves_order() {
        let q = parse_query_params("/p?b=2&a=1");
        assert_eq!(q.len(), 2);
        assert_eq!(q[0].0.as_ref(), "b");
        assert_eq!(q[0].1, "2");
        assert_eq!(q[1].0.as_ref(), "a");
        assert_eq!(q[1].1, "1");
    }

    #[test]
    fn test_parse_query_params_decodes() {
        let q = parse_query_params("/p?name=hello%20world");
        assert_eq!(q[0].1, "hello world");
    }

    #[test]
    fn test_no_query_string() {
        assert!(parse_query_params("/p").is_empty());
    }
}
