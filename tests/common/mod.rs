#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::sync::Once;

use volley::config::ServerConfig;
use volley::server::{AppService, HttpServer, ServerHandle};

static INIT: Once = Once::new();

/// One-time process setup shared by all integration tests.
pub fn setup() {
    INIT.call_once(|| {
        may::config().set_stack_size(0x8000);
        let _ = tracing_subscriber::fmt()
            .with_env_filter("warn")
            .with_test_writer()
            .try_init();
    });
}

/// Reserve a free localhost port by binding and immediately releasing it.
pub fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    addr
}

/// Running server fixture with RAII teardown. Dropping it cancels the accept
/// coroutine so tests cannot leak ports across each other.
pub struct TestServer {
    handle: Option<ServerHandle>,
    addr: SocketAddr,
}

impl TestServer {
    /// Start the stock service with default configuration on a random port.
    pub fn start_default() -> Self {
        Self::start_with_config(ServerConfig::default())
    }

    /// Start the stock service with a custom configuration on a random port.
    pub fn start_with_config(mut config: ServerConfig) -> Self {
        setup();
        let addr = free_addr();
        config.addr = addr.to_string();
        let service = unsafe { volley::app::build_service(&config).expect("build service") };
        Self::start_service_at(service, addr)
    }

    /// Start a hand-assembled service, for tests that wire their own routes
    /// and handler pools.
    pub fn start_service(service: AppService) -> Self {
        setup();
        let addr = free_addr();
        Self::start_service_at(service, addr)
    }

    fn start_service_at(service: AppService, addr: SocketAddr) -> Self {
        let handle = HttpServer(service).start(addr).expect("start server");
        handle.wait_ready().expect("server ready");
        Self {
            handle: Some(handle),
            addr,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    use serde_json::Value;

    /// Send one raw HTTP request and return the raw response text.
    pub fn send_request(addr: &SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .expect("read timeout");
        stream.write_all(request.as_bytes()).expect("write request");
        read_response(&mut stream).expect("read response")
    }

    /// Build a request with a JSON body and standard headers.
    pub fn json_request(method: &str, path: &str, body: &str) -> String {
        format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
    }

    pub fn get_request(path: &str) -> String {
        format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n")
    }

    /// Read exactly one HTTP response off the stream, honoring
    /// Content-Length so the connection stays usable for the next request.
    pub fn read_response(stream: &mut TcpStream) -> std::io::Result<String> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed before headers",
                ));
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find_header_end(&buf) {
                break pos;
            }
        };

        let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = headers
            .lines()
            .find_map(|line| {
                let (name, val) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| val.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);

        let body_start = header_end + 4;
        while buf.len() < body_start + content_length {
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        Ok(String::from_utf8_lossy(&buf[..body_start + content_length]).to_string())
    }

    fn find_header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n")
    }

    /// Split a raw response into status, header block, and body text.
    pub fn parse_response_parts(resp: &str) -> (u16, String, String) {
        let mut parts = resp.splitn(2, "\r\n\r\n");
        let headers = parts.next().unwrap_or("").to_string();
        let body = parts.next().unwrap_or("").to_string();
        let status = headers
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        (status, headers, body)
    }

    /// Status plus parsed JSON body.
    pub fn parse_response(resp: &str) -> (u16, Value) {
        let (status, _, body) = parse_response_parts(resp);
        let json: Value = serde_json::from_str(&body).unwrap_or_default();
        (status, json)
    }

    /// Value of a response header, case-insensitive on the name.
    pub fn response_header(resp: &str, name: &str) -> Option<String> {
        let (_, headers, _) = parse_response_parts(resp);
        headers.lines().find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.eq_ignore_ascii_case(name).then(|| v.trim().to_string())
        })
    }
}
