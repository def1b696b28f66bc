mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::http::{json_request, parse_response, send_request};
use common::TestServer;
use serde_json::json;
use volley::config::{BackpressureMode, RequestLimits, WorkerPoolConfig};
use volley::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse};
use volley::health::HealthState;
use volley::route::RouteMeta;
use volley::router::Router;
use volley::server::AppService;

fn slow_service(pool: WorkerPoolConfig) -> (AppService, Arc<Dispatcher>) {
    common::setup();
    let route = RouteMeta::new(http::Method::POST, "/slow/{id}", "slow").expect("route");
    let router = Router::new(vec![route]);
    let health = HealthState::new();
    let mut dispatcher = Dispatcher::new(Duration::from_secs(5), health.clone());
    unsafe {
        dispatcher.register_handler(Arc::from("slow"), pool, |req: HandlerRequest| {
            may::coroutine::sleep(Duration::from_millis(500));
            let _ = req.reply_tx.send(HandlerResponse::ok(json!({ "done": true })));
        });
    }
    let dispatcher = Arc::new(dispatcher);
    let service = AppService::new(
        Arc::new(router),
        Arc::clone(&dispatcher),
        health,
        RequestLimits::default(),
    );
    (service, dispatcher)
}

fn flood(server: &TestServer, n: usize) -> Vec<u16> {
    let addr = server.addr();
    let handles: Vec<_> = (0..n)
        .map(|i| {
            std::thread::spawn(move || {
                let resp = send_request(&addr, &json_request("POST", &format!("/slow/{i}"), "{}"));
                parse_response(&resp).0
            })
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("client thread"))
        .collect()
}

#[test]
fn test_shed_mode_rejects_overflow_with_503() {
    let (service, dispatcher) = slow_service(WorkerPoolConfig {
        num_workers: 1,
        queue_bound: 1,
        backpressure_mode: BackpressureMode::Shed,
        ..WorkerPoolConfig::default()
    });
    let server = TestServer::start_service(service);

    let statuses = flood(&server, 6);
    let ok = statuses.iter().filter(|s| **s == 200).count();
    let shed = statuses.iter().filter(|s| **s == 503).count();
    assert!(ok >= 1, "expected at least one success, got {statuses:?}");
    assert!(shed >= 1, "expected at least one shed, got {statuses:?}");
    assert_eq!(ok + shed, statuses.len(), "unexpected statuses {statuses:?}");

    let metrics = dispatcher.pool("slow").expect("pool").metrics();
    assert_eq!(metrics.shed_count(), shed as u64);
    assert_eq!(metrics.dispatched_count(), ok as u64);
}

#[test]
fn test_shed_response_is_immediate() {
    let (service, _dispatcher) = slow_service(WorkerPoolConfig {
        num_workers: 1,
        queue_bound: 1,
        backpressure_mode: BackpressureMode::Shed,
        ..WorkerPoolConfig::default()
    });
    let server = TestServer::start_service(service);
    let addr = server.addr();

    // Occupy the single queue slot.
    let filler = std::thread::spawn(move || {
        send_request(&addr, &json_request("POST", "/slow/fill", "{}"));
    });
    std::thread::sleep(Duration::from_millis(100));

    let start = Instant::now();
    let resp = send_request(&server.addr(), &json_request("POST", "/slow/next", "{}"));
    let elapsed = start.elapsed();
    let (status, body) = parse_response(&resp);
    assert_eq!(status, 503);
    assert_eq!(body["error"], "Service Unavailable");
    assert_eq!(body["handler"], "slow");
    // Shedding must not wait for the queue to drain.
    assert!(elapsed < Duration::from_millis(300), "took {elapsed:?}");

    filler.join().expect("filler thread");
}

#[test]
fn test_block_mode_waits_then_sheds() {
    let (service, _dispatcher) = slow_service(WorkerPoolConfig {
        num_workers: 1,
        queue_bound: 1,
        backpressure_mode: BackpressureMode::Block,
        backpressure_timeout: Duration::from_millis(100),
        ..WorkerPoolConfig::default()
    });
    let server = TestServer::start_service(service);
    let addr = server.addr();

    let filler = std::thread::spawn(move || {
        send_request(&addr, &json_request("POST", "/slow/fill", "{}"));
    });
    std::thread::sleep(Duration::from_millis(100));

    let start = Instant::now();
    let resp = send_request(&server.addr(), &json_request("POST", "/slow/next", "{}"));
    let elapsed = start.elapsed();
    let (status, _) = parse_response(&resp);
    assert_eq!(status, 503);
    // Block mode holds the request for the configured wait before giving up.
    assert!(elapsed >= Duration::from_millis(90), "took {elapsed:?}");

    filler.join().expect("filler thread");
}

#[test]
fn test_health_stays_ok_under_shedding() {
    let (service, _dispatcher) = slow_service(WorkerPoolConfig {
        num_workers: 1,
        queue_bound: 1,
        ..WorkerPoolConfig::default()
    });
    let server = TestServer::start_service(service);
    let _ = flood(&server, 4);

    // Shedding is expected under overload; it must not trip the fault latch.
    let resp = send_request(
        &server.addr(),
        "GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    let (status, body) = parse_response(&resp);
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}
