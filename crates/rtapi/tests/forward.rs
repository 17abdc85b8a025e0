// Numan Thabit 2025
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use rtapi::{
    config::load_splunk_settings, report::Forwarder, EndpointSpec, ForwardError, SplunkSettings,
};
use tokio::net::TcpListener;

#[derive(Default)]
struct Sink {
    events: Mutex<Vec<serde_json::Value>>,
    auth: Mutex<Vec<String>>,
}

async fn collect(
    State(sink): State<Arc<Sink>>,
    headers: HeaderMap,
    Json(event): Json<serde_json::Value>,
) -> (StatusCode, &'static str) {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    sink.auth.lock().expect("auth lock").push(auth);
    let mut events = sink.events.lock().expect("events lock");
    events.push(event);
    if events.len() == 2 {
        (StatusCode::INTERNAL_SERVER_ERROR, r#"{"text":"Internal Error","code":8}"#)
    } else {
        (StatusCode::OK, r#"{"text":"Success","code":0}"#)
    }
}

async fn spawn_sink() -> Result<(SocketAddr, Arc<Sink>)> {
    let sink = Arc::new(Sink::default());
    let app = Router::new()
        .route("/services/collector", post(collect))
        .with_state(Arc::clone(&sink));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((addr, sink))
}

fn endpoints(urls: &[&str]) -> Result<Vec<EndpointSpec>> {
    urls.iter()
        .map(|url| -> Result<EndpointSpec> {
            Ok(serde_json::from_value(serde_json::json!({"target": {"url": url}}))?)
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn forwarding_stops_at_first_rejected_event() -> Result<()> {
    let (addr, sink) = spawn_sink().await?;
    let settings = load_splunk_settings(&format!(
        r#"{{"url": "http://{addr}/services/collector", "authkey": "Splunk 0000", "source": "rtapi-test"}}"#
    ))?;
    let forwarder = Forwarder::with_host(settings, "bench-01".into())?;

    let err = forwarder
        .forward_all(&endpoints(&["http://a/", "http://b/", "http://c/"])?)
        .await
        .expect_err("second event is rejected");

    match err {
        ForwardError::Status {
            endpoint, status, ..
        } => {
            assert_eq!(endpoint, "http://b/");
            assert_eq!(status.as_u16(), 500);
        }
        other => panic!("unexpected error: {other}"),
    }

    let events = sink.events.lock().expect("events lock").clone();
    assert_eq!(events.len(), 2, "third event must never be sent");
    assert_eq!(events[0]["host"], "bench-01");
    assert_eq!(events[0]["source"], "rtapi-test");
    assert_eq!(events[0]["event"]["target"]["url"], "http://a/");
    assert!(events[0]["time"].as_i64().expect("unix time") > 0);
    assert!(sink
        .auth
        .lock()
        .expect("auth lock")
        .iter()
        .all(|auth| auth == "Splunk 0000"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn forwarding_succeeds_for_accepted_events() -> Result<()> {
    let (addr, sink) = spawn_sink().await?;
    let forwarder = Forwarder::with_host(
        SplunkSettings {
            url: format!("http://{addr}/services/collector"),
            authkey: "Splunk 0000".into(),
            source: String::new(),
        },
        "bench-01".into(),
    )?;

    forwarder.forward_all(&endpoints(&["http://a/"])?).await?;

    assert_eq!(sink.events.lock().expect("events lock").len(), 1);
    Ok(())
}
