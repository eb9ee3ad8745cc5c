//! End-to-end tests: HTTP request in, command execution, HTTP response out.

#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{client, config_with, mapping, proc_route, shell_route, start_server};
use webcmd::config::schema::{ParamSource, ResponseStream, RouteParameter};

#[tokio::test]
async fn test_path_and_query_parameters() {
    let mut route = proc_route("GET", "/hello/{name}", "echo \"$WC_NAME from $CITY\"");
    route.parameters.push(RouteParameter {
        name: "city".to_string(),
        source: ParamSource::Query,
        env_name: "CITY".to_string(),
        default: "nowhere".to_string(),
        ..Default::default()
    });
    let server = start_server(config_with(vec![route])).await;
    let client = client();

    let res = client
        .get(server.url("/hello/world?city=Paris"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "world from Paris\n");

    let res = client.get(server.url("/hello/a%24b")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "ab from nowhere\n");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_exit_code_mapping() {
    let mut route = proc_route("GET", "/check/{code:[0-9]+}", "echo out; echo err >&2; exit $WC_CODE");
    route.status_codes.push(mapping(Some(3), 404, Some(ResponseStream::Stderr)));
    let mut teapot = mapping(None, 418, Some(ResponseStream::Empty));
    teapot.headers.insert("X-Failed".to_string(), "yes".to_string());
    route.status_codes.push(teapot);
    route.headers.insert("X-Served-By".to_string(), "webcmd".to_string());
    let server = start_server(config_with(vec![route])).await;
    let client = client();

    let res = client.get(server.url("/check/0")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-served-by"], "webcmd");
    let body = res.text().await.unwrap();
    assert!(body.contains("out\n"));
    assert!(body.contains("err\n"));

    let res = client.get(server.url("/check/3")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "err\n");

    let res = client.get(server.url("/check/7")).send().await.unwrap();
    assert_eq!(res.status(), 418);
    assert_eq!(res.headers()["x-failed"], "yes");
    assert_eq!(res.headers()["x-served-by"], "webcmd");
    assert_eq!(res.text().await.unwrap(), "");

    // Constraint does not match.
    let res = client.get(server.url("/check/abc")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_not_found_and_method_not_allowed() {
    let routes = vec![
        proc_route("GET", "/items", "echo list"),
        proc_route("DELETE", "/items", "echo gone"),
    ];
    let server = start_server(config_with(routes)).await;
    let client = client();

    let res = client.get(server.url("/nothing")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let res = client.put(server.url("/items")).send().await.unwrap();
    assert_eq!(res.status(), 405);
    let allow = res.headers()["allow"].to_str().unwrap().to_string();
    assert!(allow.contains("GET"));
    assert!(allow.contains("DELETE"));

    let res = client.delete(server.url("/items/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "gone\n");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_request_id() {
    let server = start_server(config_with(vec![proc_route("GET", "/", "true")])).await;
    let client = client();

    let res = client.get(server.url("/")).send().await.unwrap();
    let generated = res.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);

    let res = client
        .get(server.url("/"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "abc-123");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_cached_route() {
    let mut cached = proc_route("GET", "/now", "date +%s%N");
    cached.caching = true;
    let mut config = config_with(vec![cached, proc_route("GET", "/fresh", "date +%s%N")]);
    config.modules.cache.ttl_secs = 30;
    let server = start_server(config).await;
    let client = client();

    let first = client.get(server.url("/now")).send().await.unwrap();
    assert_eq!(first.headers()["cache-control"], "max-age=30");
    let first = first.text().await.unwrap();
    let second = client.get(server.url("/now")).send().await.unwrap();
    assert_eq!(second.text().await.unwrap(), first);

    // The query string is part of the cache key.
    let other = client.get(server.url("/now?v=2")).send().await.unwrap();
    assert_ne!(other.text().await.unwrap(), first);

    let res = client.get(server.url("/fresh")).send().await.unwrap();
    assert!(res.headers().get("cache-control").is_none());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_post_body_reaches_stdin() {
    let mut route = proc_route("POST", "/upload", "wc -c");
    route.allow_body = true;
    let server = start_server(config_with(vec![route])).await;

    let res = client()
        .post(server.url("/upload"))
        .body("twelve bytes")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap().trim(), "12");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_shell_route_uses_pool() {
    let mut route = shell_route("GET", "/greet/{who}", "echo \"hi $WC_WHO\"; exit 2");
    route.status_codes.push(mapping(Some(2), 202, None));
    let mut config = config_with(vec![route]);
    config.modules.shell_pool.size = 1;
    let server = start_server(config).await;
    let client = client();

    for name in ["ann", "bob", "cy"] {
        let res = client
            .get(server.url(&format!("/greet/{name}")))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 202);
        assert_eq!(res.text().await.unwrap(), format!("hi {name}\n"));
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_graceful_shutdown_finishes_in_flight_request() {
    let server = start_server(config_with(vec![proc_route("GET", "/slow", "sleep 1; echo done")])).await;
    let url = server.url("/slow");

    let in_flight = tokio::spawn(async move { client().get(url).send().await });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let addr = server.addr;
    server.stop().await.unwrap();

    let res = in_flight.await.unwrap().unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "done\n");

    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
