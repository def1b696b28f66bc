use std::sync::Arc;

use http::Method;
use volley::error::ServiceError;
use volley::route::RouteMeta;
use volley::router::Router;

fn table() -> Vec<RouteMeta> {
    vec![
        RouteMeta::new(Method::POST, "/test/{param_a}/subcommand/{param_b}", "echo")
            .expect("route"),
        RouteMeta::new(Method::GET, "/test/{param_a}/subcommand/{param_b}", "lookup")
            .expect("route"),
        RouteMeta::new(Method::GET, "/test/static/subcommand/fixed", "pinned").expect("route"),
        RouteMeta::new(Method::GET, "/health", "health").expect("route"),
        RouteMeta::new(Method::DELETE, "/test/{param_a}/subcommand/{param_b}", "purge")
            .expect("route"),
    ]
}

#[test]
fn test_literal_wins_over_parameter() {
    let router = Router::new(table());
    let m = router
        .route(&Method::GET, "/test/static/subcommand/fixed")
        .expect("match");
    assert_eq!(m.handler_name.as_ref(), "pinned");
    assert!(m.path_params.is_empty());

    // One segment off the literal route falls back to the parameterized one.
    let m = router
        .route(&Method::GET, "/test/static/subcommand/other")
        .expect("match");
    assert_eq!(m.handler_name.as_ref(), "lookup");
    assert_eq!(m.get_path_param("param_a"), Some("static"));
    assert_eq!(m.get_path_param("param_b"), Some("other"));
}

#[test]
fn test_param_extraction_order_follows_template() {
    let router = Router::new(table());
    let m = router
        .route(&Method::POST, "/test/1/subcommand/2")
        .expect("match");
    assert_eq!(m.handler_name.as_ref(), "echo");
    assert_eq!(m.path_params[0].0.as_ref(), "param_a");
    assert_eq!(m.path_params[0].1, "1");
    assert_eq!(m.path_params[1].0.as_ref(), "param_b");
    assert_eq!(m.path_params[1].1, "2");
}

#[test]
fn test_allow_list_in_registration_order() {
    let router = Router::new(table());
    let err = router
        .route(&Method::PUT, "/test/1/subcommand/2")
        .expect_err("no PUT route");
    match err {
        ServiceError::MethodNotAllowed { allow, .. } => {
            assert_eq!(allow, vec!["POST", "GET", "DELETE"]);
        }
        other => panic!("expected MethodNotAllowed, got {other:?}"),
    }
}

#[test]
fn test_partial_path_is_not_found() {
    let router = Router::new(table());
    assert!(matches!(
        router.route(&Method::POST, "/test/1/subcommand"),
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        router.route(&Method::POST, "/test/1/subcommand/2/extra"),
        Err(ServiceError::NotFound { .. })
    ));
}

#[test]
fn test_trailing_slash_matches() {
    let router = Router::new(table());
    let m = router
        .route(&Method::POST, "/test/1/subcommand/2/")
        .expect("trailing slash tolerated");
    assert_eq!(m.handler_name.as_ref(), "echo");
}

#[test]
fn test_empty_segment_is_not_a_param_value() {
    let router = Router::new(table());
    assert!(router.route(&Method::POST, "/test//subcommand/2").is_err());
}

#[test]
fn test_render_path_inverts_matching() {
    let route = RouteMeta::new(Method::POST, "/test/{param_a}/subcommand/{param_b}", "echo")
        .expect("route");
    let rendered = route
        .render_path(&[
            (Arc::from("param_a"), "1".to_string()),
            (Arc::from("param_b"), "2".to_string()),
        ])
        .expect("render");
    assert_eq!(rendered, "/test/1/subcommand/2");

    let router = Router::new(vec![route]);
    let m = router.route(&Method::POST, &rendered).expect("match");
    assert_eq!(m.get_path_param("param_a"), Some("1"));
    assert_eq!(m.get_path_param("param_b"), Some("2"));
}

#[test]
fn test_whitespace_segments_survive() {
    let router = Router::new(table());
    let m = router
        .route(&Method::POST, "/test/ padded /subcommand/2")
        .expect("match");
    assert_eq!(m.get_path_param("param_a"), Some(" padded "));
}
