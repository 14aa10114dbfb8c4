use std::net::SocketAddr;

use axum::Json;
use axum::Router;
use axum::extract::RawQuery;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};

use super::*;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn ctx_for(addr: SocketAddr, user: Option<&str>) -> CliContext {
    CliContext {
        base_url: format!("http://{addr}"),
        user: user.map(ToOwned::to_owned),
        password: user.map(|_| "secret".to_owned()),
        stats_url: None,
    }
}

#[test]
fn envelope_carries_version_method_and_params() {
    let call = DeviceCall::new(WIDGET_CGI, "listWidgets", json!({}));
    assert_eq!(call.envelope(), json!({ "apiVersion": "1.0", "method": "listWidgets", "params": {} }));
}

#[test]
fn reply_error_object_becomes_cli_error() {
    let reply = json!({ "apiVersion": "1.0", "method": "addWidget", "error": { "code": 2104, "message": "Invalid parameter" } });
    match check_reply("addWidget", reply) {
        Err(CliError::Device { method, code, message }) => {
            assert_eq!(method, "addWidget");
            assert_eq!(code, "2104");
            assert_eq!(message, "Invalid parameter");
        }
        other => panic!("unexpected: {other:?}"),
    }

    let ok = json!({ "apiVersion": "1.0", "data": { "widgets": [] } });
    assert_eq!(check_reply("listWidgets", ok.clone()).expect("ok reply"), ok);
}

#[test]
fn parse_data_requires_an_object() {
    assert!(parse_data(r#"{"identity":1}"#).is_ok());
    assert!(matches!(parse_data("42"), Err(CliError::InvalidData(_))));
    assert!(matches!(parse_data(""), Err(CliError::InvalidData(_))));
}

#[test]
fn ptz_queries() {
    let query = PtzAction::Move(PanTilt { pan: 30, tilt: -40 }).query(1);
    assert_eq!(query, vec![("camera", "1".to_owned()), ("continuouspantiltmove", "30,-40".to_owned())]);

    let query = PtzAction::Stop.query(2);
    assert!(query.contains(&("continuouspantiltmove", "0,0".to_owned())));
    assert!(query.contains(&("continuouszoommove", "0".to_owned())));
}

#[tokio::test]
async fn call_posts_envelope_with_basic_auth() {
    let app = Router::new().route(
        WIDGET_CGI,
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default().to_owned();
            Json(json!({ "apiVersion": "1.0", "method": body["method"], "data": { "auth": auth, "params": body["params"] } }))
        }),
    );
    let addr = serve(app).await;

    let call = DeviceCall::new(WIDGET_CGI, "removeWidget", json!({ "generalParams": { "id": 3 } }));
    let reply = super::call(&ctx_for(addr, Some("root")), &call).await.expect("reply");
    assert_eq!(reply["method"], json!("removeWidget"));
    assert_eq!(reply["data"]["params"]["generalParams"]["id"], json!(3));
    assert!(reply["data"]["auth"].as_str().is_some_and(|a| a.starts_with("Basic ")));
}

#[tokio::test]
async fn call_reports_device_errors_and_http_status() {
    let app = Router::new()
        .route(
            OVERLAY_CGI,
            post(|| async { Json(json!({ "apiVersion": "1.0", "error": { "code": "1001", "message": "bad" } })) }),
        )
        .route(WIDGET_CGI, post(|| async { (StatusCode::UNAUTHORIZED, "no") }));
    let addr = serve(app).await;
    let ctx = ctx_for(addr, None);

    let err = super::call(&ctx, &DeviceCall::new(OVERLAY_CGI, "list", json!({}))).await.expect_err("device error");
    assert!(matches!(err, CliError::Device { ref code, .. } if code == "1001"));

    let err = super::call(&ctx, &DeviceCall::new(WIDGET_CGI, "listWidgets", json!({}))).await.expect_err("http error");
    assert!(matches!(err, CliError::HttpStatus { status: 401, .. }));
}

#[tokio::test]
async fn ptz_sends_query_parameters() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let app = Router::new().route(
        PTZ_CGI,
        get(move |RawQuery(query): RawQuery| async move {
            tx.send(query.unwrap_or_default()).expect("record query");
            StatusCode::NO_CONTENT
        }),
    );
    let addr = serve(app).await;

    ptz(&ctx_for(addr, None), &PtzAction::Zoom(-25), 1).await.expect("ptz");
    let query = rx.recv().await.expect("query recorded");
    assert_eq!(query, "camera=1&continuouszoommove=-25");
}
