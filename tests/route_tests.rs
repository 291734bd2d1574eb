use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use world_api::config::TableInfo;
use world_api::permission::{Access, Class, Permission};
use world_api::{app_router, assemble, CmsConfig};

// Every request below is answered before any SQL runs; the pool points at a closed port.
fn app() -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://127.0.0.1:1/world_test")
        .expect("lazy pool");
    let widgets = TableInfo {
        table_name: "widgets".into(),
        permission: Permission::NONE.with(Class::Owner, Access::Peek).0,
        ..Default::default()
    };
    let mut config = CmsConfig::default();
    config.admin_user_ids.insert("root".into());
    let state = assemble(pool, vec![widgets], config).expect("assemble");
    app_router(state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.oneshot(request).await.expect("request failed");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("failed to build request")
}

#[tokio::test]
async fn health_and_version_are_served() {
    let (status, body) = send(app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(app(), get("/version")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "world-api");
}

#[tokio::test]
async fn unknown_table_is_not_found() {
    let (status, body) = send(app(), get("/api/gadgets")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn guest_without_table_permission_is_forbidden() {
    let (status, body) = send(app(), get("/api/widgets")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");

    let (status, _) = send(app(), get("/api/widgets/r1")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signed_in_user_without_create_bit_is_forbidden() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/widgets")
        .header("content-type", "application/json")
        .header("X-User-ID", "u1")
        .body(Body::from(r#"{"title":"w"}"#))
        .expect("failed to build request");
    let (status, _) = send(app(), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_paging_is_a_bad_request() {
    let request = Request::builder()
        .uri("/api/widgets?limit=lots")
        .header("X-User-ID", "u1")
        .body(Body::empty())
        .expect("failed to build request");
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn update_and_delete_are_denied_before_the_row_is_read() {
    let request = Request::builder()
        .method("DELETE")
        .uri("/api/widgets/r1")
        .body(Body::empty())
        .expect("failed to build request");
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");

    let request = Request::builder()
        .method("PATCH")
        .uri("/api/widgets/r1")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"title":"w"}"#))
        .expect("failed to build request");
    let (status, _) = send(app(), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/widgets/r1")
        .header("X-User-ID", "u1")
        .body(Body::empty())
        .expect("failed to build request");
    let (status, _) = send(app(), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
