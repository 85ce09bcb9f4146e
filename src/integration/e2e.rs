//! End-to-end request flows

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use std::time::Duration;
use tower::util::ServiceExt;

use super::fixtures::{config_with, echo_tool, script_tool, spawn_origin, test_app};
use crate::config::FetchConfig;
use crate::relay::registry::{OutcomeCounts, RelayRegistry};
use crate::relay::RelayOutcome;

async fn send(router: Router, uri: &str) -> Response {
    router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Outcomes are recorded by the relay task after the body ends.
async fn wait_for_finished(registry: &RelayRegistry) {
    for _ in 0..100 {
        if registry.active_count() == 0 && registry.outcomes().graceful_end > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("relay did not finish: {:?}", registry.snapshot());
}

#[tokio::test]
async fn test_stream_passes_request_to_fetch_tool() {
    let (state, router) = test_app(config_with(echo_tool()));

    let response = send(
        router,
        "/getStream/https%3A%2F%2Fmedia.test%2Flive.m3u8?referer=https%3A%2F%2Fref.test%2F&agent=UA-1",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/octet-stream"
    );
    let args: Vec<String> = body_text(response).await.lines().map(String::from).collect();
    assert_eq!(
        args,
        [
            "-q",
            "--no-warnings",
            "--downloader",
            "ffmpeg",
            "-o",
            "-",
            "--referer",
            "https://ref.test/",
            "--user-agent",
            "UA-1",
            "--",
            "https://media.test/live.m3u8",
        ]
    );

    wait_for_finished(&state.registry).await;
    let snapshot = state.registry.snapshot();
    assert_eq!(snapshot.outcomes.graceful_end, 1);
    assert_eq!(snapshot.recent[0].exit_code, Some(0));
    assert_eq!(snapshot.recent[0].kills_issued, 0);
    assert!(snapshot.bytes_relayed > 0);
}

#[tokio::test]
async fn test_stream_uses_default_agent() {
    let fetch = FetchConfig {
        default_user_agent: Some("UA-2".to_string()),
        ..echo_tool()
    };
    let (_state, router) = test_app(config_with(fetch));

    let output = body_text(send(router, "/getStream/https%3A%2F%2Fmedia.test%2Fv").await).await;

    assert!(!output.contains("--referer"));
    assert!(
        output.ends_with("--user-agent\nUA-2\n--\nhttps://media.test/v\n"),
        "got {output:?}"
    );
}

#[tokio::test]
async fn test_stream_rejects_option_like_target() {
    let (state, router) = test_app(config_with(echo_tool()));

    for uri in [
        "/getStream/--exec%3Dtouch%20%2Ftmp%2Fowned",
        "/getStream/-U",
        "/getStream/--update-to%3Dnightly",
    ] {
        let response = send(router.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }

    assert_eq!(state.registry.outcomes(), OutcomeCounts::default());
    assert!(state.registry.snapshot().active.is_empty());
}

#[tokio::test]
async fn test_stream_client_disconnect_kills_relay() {
    let (state, router) = test_app(config_with(script_tool("while :; do echo chunk; done")));

    let response = send(router, "/getStream/https%3A%2F%2Fmedia.test%2Fendless").await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    assert!(first.starts_with(b"chunk"));
    drop(body);

    for _ in 0..100 {
        if state.registry.outcomes().client_disconnected == 1
            && state.registry.active_count() == 0
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let snapshot = state.registry.snapshot();
    assert_eq!(snapshot.outcomes.client_disconnected, 1, "{snapshot:?}");
    assert_eq!(snapshot.active_count, 0);
    assert_eq!(snapshot.outcomes.graceful_end, 0);
    assert_eq!(snapshot.recent[0].outcome, RelayOutcome::ClientDisconnected);
    assert_eq!(snapshot.recent[0].kills_issued, 1);
}

#[tokio::test]
async fn test_stream_spawn_failure() {
    let fetch = FetchConfig {
        executable: "/nonexistent/fetch-tool".to_string(),
        ..Default::default()
    };
    let (state, router) = test_app(config_with(fetch));

    let response = send(router, "/getStream/https%3A%2F%2Fmedia.test%2Fv").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(state.registry.outcomes().spawn_failures, 1);
    assert_eq!(state.registry.active_count(), 0);
}

#[tokio::test]
async fn test_stream_limit_rejects_when_full() {
    let mut config = config_with(script_tool("exec sleep 2"));
    config.max_concurrent_streams = Some(1);
    let (state, router) = test_app(config);

    let first = send(router.clone(), "/getStream/https%3A%2F%2Fmedia.test%2Fa").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(state.registry.active_count(), 1);

    let second = send(router, "/getStream/https%3A%2F%2Fmedia.test%2Fb").await;
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_convert_rewrites_nested_playlists() {
    let origin = spawn_origin(Router::new().route(
        "/master.m3u8",
        get(|| async {
            (
                [(header::CONTENT_TYPE, "audio/mpegurl")],
                "#EXTM3U\r\n#EXT-X-STREAM-INF:BANDWIDTH=1280000\r\nhttps://cdn.test/low/index.m3u8\r\nsegment0.ts\r\n",
            )
        }),
    ))
    .await;
    let (_state, router) = test_app(config_with(echo_tool()));

    let uri = format!(
        "/convertM3U/{}?token=abc",
        urlencoding::encode(&format!("http://{}/master.m3u8", origin))
    );
    let request = Request::builder()
        .uri(uri)
        .header(header::HOST, "relay.test:11034")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "audio/mpegurl"
    );
    assert_eq!(
        body_text(response).await,
        "#EXTM3U\n\
         #EXT-X-STREAM-INF:BANDWIDTH=1280000\n\
         http://relay.test:11034/getStream/https%3A%2F%2Fcdn.test%2Flow%2Findex.m3u8?token=abc\n\
         segment0.ts\n"
    );
}

#[tokio::test]
async fn test_convert_origin_error_is_bad_gateway() {
    let origin = spawn_origin(Router::new()).await;
    let (_state, router) = test_app(config_with(echo_tool()));

    let uri = format!(
        "/convertM3U/{}",
        urlencoding::encode(&format!("http://{}/missing.m3u8", origin))
    );
    let response = send(router, &uri).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
