//! End-to-end exchanges over the hyper transport against mock backends.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use http::{Method, Request, StatusCode};

use exchange_pipeline::transport::{CurrentRuntime, RuntimePool};
use exchange_pipeline::{Client, ExchangeError, ExchangeEvent, TransportError};

mod common;
use common::{start_mock_backend, test_config, Reply};

fn get(addr: std::net::SocketAddr) -> Request<Bytes> {
    Request::builder()
        .uri(format!("http://{}/", addr))
        .body(Bytes::new())
        .unwrap()
}

#[tokio::test]
async fn get_returns_head_and_body() {
    let addr = start_mock_backend(Reply::Fixed {
        status: "200 OK",
        body: "hello".into(),
    })
    .await;
    let client = Client::with_hyper(&test_config(), Arc::new(CurrentRuntime));

    let (head, body) = client.execute(get(addr)).response().await.expect("exchange failed");
    assert_eq!(head.status(), StatusCode::OK);
    assert_eq!(head.reason(), "OK");
    assert!(!head.keep_alive(), "backend sends Connection: close");
    assert_eq!(body.collect().await.unwrap(), Bytes::from_static(b"hello"));
}

#[tokio::test]
async fn custom_reason_phrase_is_kept() {
    let addr = start_mock_backend(Reply::Fixed {
        status: "404 Nothing Here",
        body: String::new(),
    })
    .await;
    let client = Client::with_hyper(&test_config(), Arc::new(CurrentRuntime));

    let (head, mut body) = client.execute(get(addr)).response().await.unwrap();
    assert_eq!(head.status(), StatusCode::NOT_FOUND);
    assert_eq!(head.reason(), "Nothing Here");
    assert!(body.next().await.is_none());
}

#[tokio::test]
async fn post_reports_upload_progress_before_download() {
    let addr = start_mock_backend(Reply::Echo).await;
    let client = Client::with_hyper(&test_config(), Arc::new(CurrentRuntime));

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("http://{}/echo", addr))
        .body(Bytes::from_static(b"0123456789"))
        .unwrap();

    let mut events = client.execute(request);
    let mut uploaded = 0;
    let mut body = None;
    while let Some(event) = events.next().await {
        match event.unwrap() {
            ExchangeEvent::Upload(n) => {
                assert!(body.is_none(), "upload event after download");
                assert!(n <= 4);
                uploaded += n;
            }
            ExchangeEvent::Download { head, body: b } => {
                assert!(body.is_none(), "second download event");
                assert_eq!(head.status(), StatusCode::OK);
                body = Some(b);
            }
        }
    }

    assert_eq!(uploaded, 10);
    let echoed = body.expect("no download event").collect().await.unwrap();
    assert_eq!(echoed, Bytes::from_static(b"0123456789"));
}

#[tokio::test]
async fn refused_connection_surfaces_connect_error() {
    // Bind and drop to get a port nobody listens on.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = Client::with_hyper(&test_config(), Arc::new(CurrentRuntime));

    let result = client.execute(get(addr)).response().await;
    assert!(
        matches!(result, Err(ExchangeError::Transport(TransportError::Connect(_)))),
        "unexpected result: {:?}",
        result.map(|(head, _)| head.status())
    );
}

#[tokio::test]
async fn stalled_backend_times_out() {
    let addr = start_mock_backend(Reply::Stall(Duration::from_secs(10))).await;
    let mut config = test_config();
    config.transport.request_timeout_secs = 1;
    let client = Client::with_hyper(&config, Arc::new(CurrentRuntime));

    let result = client.execute(get(addr)).response().await;
    assert!(matches!(
        result,
        Err(ExchangeError::Transport(TransportError::Timeout(d))) if d == Duration::from_secs(1)
    ));
}

#[tokio::test]
async fn runtime_pool_drives_exchanges() {
    let addr = start_mock_backend(Reply::Fixed {
        status: "201 Created",
        body: "made".into(),
    })
    .await;
    let config = test_config();
    let pool = Arc::new(RuntimePool::new(config.runtime.clone()));
    let client = Client::with_hyper(&config, pool.clone());

    for _ in 0..3 {
        let (head, body) = client.execute(get(addr)).response().await.unwrap();
        assert_eq!(head.status(), StatusCode::CREATED);
        assert_eq!(body.collect().await.unwrap(), Bytes::from_static(b"made"));
    }
    assert_eq!(pool.group_count(), 1);
    pool.shutdown();
}
