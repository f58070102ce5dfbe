mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use common::Fixture;
use serde_json::Value;
use tabula_console::config::Config;
use tabula_console::db::provider;
use tabula_console::router::{ConsoleState, console_router};
use tabula_console::types::views::LOGIN_FAILED;
use tower::ServiceExt;

fn config(connect_target: &str) -> Config {
    let mut cfg = Config::default();
    cfg.database.connect_target = connect_target.to_string();
    cfg.basic.insecure_cookie = true;
    cfg
}

async fn console(fx: &Fixture, connect_target: &str) -> Router {
    console_with(fx, config(connect_target)).await
}

async fn console_with(fx: &Fixture, cfg: Config) -> Router {
    let handle = provider::spawn(fx.settings(2)).await.expect("spawn provider");
    let state = ConsoleState::new(handle, &cfg).expect("console state");
    console_router(state)
}

fn form_body(pairs: &[(&str, &str)]) -> String {
    let mut ser = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        ser.append_pair(k, v);
    }
    ser.finish()
}

fn post(uri: &str, cookie: Option<&str>, pairs: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(form_body(pairs))).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn location(resp: &axum::response::Response) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("json body")
}

/// Log in as `u1` and return the `name=value` pair to send back as a cookie.
async fn login(app: &Router) -> String {
    let resp = app
        .clone()
        .oneshot(post(
            "/login",
            None,
            &[("username", "u1"), ("password", "secret")],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/home");
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn data_routes_redirect_to_login_without_session() {
    let fx = Fixture::new("routes-nosession").await;
    let app = console(&fx, &fx.target).await;

    let resp = app.clone().oneshot(get("/home", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let resp = app
        .clone()
        .oneshot(post("/view-table", None, &[("table", "EMPLOYEES")]))
        .await
        .unwrap();
    assert_eq!(location(&resp), "/login");

    let resp = app
        .clone()
        .oneshot(get("/home", Some("tabula_sid=forged")))
        .await
        .unwrap();
    assert_eq!(location(&resp), "/login");

    let resp = app.oneshot(get("/", None)).await.unwrap();
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn failed_login_shows_generic_message() {
    let fx = Fixture::new("routes-badlogin").await;
    let missing = format!("{}.missing", fx.target);
    let app = console(&fx, &missing).await;

    let resp = app
        .oneshot(post(
            "/login",
            None,
            &[("username", "nobody"), ("password", "wrong")],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    let body = json(resp).await;
    assert_eq!(body["error"], LOGIN_FAILED);
}

#[tokio::test]
async fn browse_view_and_update_after_login() {
    let fx = Fixture::new("routes-edit").await;
    let app = console(&fx, &fx.target).await;
    let cookie = login(&app).await;

    let resp = app.clone().oneshot(get("/home", Some(&cookie))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json(resp).await["modules"], serde_json::json!(["FINANCE", "HR", "OPS"]));

    let resp = app
        .clone()
        .oneshot(post("/tables", Some(&cookie), &[("module", "HR")]))
        .await
        .unwrap();
    assert_eq!(json(resp).await["tables"], serde_json::json!(["EMPLOYEES", "ORGS"]));

    let resp = app
        .clone()
        .oneshot(post("/view-table", Some(&cookie), &[("table", "employees")]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let view = json(resp).await;
    assert_eq!(view["table"], "EMPLOYEES");
    assert_eq!(view["columns"][2]["type"], "DATE");
    assert_eq!(view["rows"][0][2], "01-MAR-2019");
    assert_eq!(view["fields"][1]["name"], "data[0][NAME]");
    assert_eq!(view["fields"][1]["value"], "Ann");

    let resp = app
        .clone()
        .oneshot(post(
            "/update-table",
            Some(&cookie),
            &[
                ("table", "EMPLOYEES"),
                ("data[0][ORG_ID]", "2"),
                ("data[0][NAME]", "Bobby"),
                ("data[0][HIRED]", "02-JAN-2020"),
                ("data[0][SALARY]", "4100"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/home");

    let rows = fx.employees().await;
    assert_eq!(rows[0].1, "Ann");
    assert_eq!(
        rows[1],
        (
            2,
            "Bobby".to_string(),
            Some("2020-01-02".to_string()),
            Some("4100".to_string())
        )
    );
}

#[tokio::test]
async fn rejected_updates_return_home_and_change_nothing() {
    let fx = Fixture::new("routes-reject").await;
    let app = console(&fx, &fx.target).await;
    let cookie = login(&app).await;
    let before = fx.employees().await;

    let attempts: [&[(&str, &str)]; 3] = [
        &[
            ("table", "EMPLOYEES; DROP TABLE EMPLOYEES"),
            ("data[0][ORG_ID]", "1"),
            ("data[0][NAME]", "x"),
        ],
        &[
            ("table", "EMPLOYEES"),
            ("data[0][ORG_ID]", "1"),
            ("data[0][NAME]", "x"),
            ("data[1][ORG_ID]", "2"),
            ("data[1][HIRED]", "2020-13-45"),
        ],
        &[
            ("table", "EMPLOYEES"),
            ("data[0][ORG_ID]", "1"),
            ("data[0][SALARY]", "-1"),
        ],
    ];
    for fields in attempts {
        let resp = app
            .clone()
            .oneshot(post("/update-table", Some(&cookie), fields))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/home");
    }

    assert_eq!(fx.employees().await, before);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let fx = Fixture::new("routes-logout").await;
    let app = console(&fx, &fx.target).await;
    let cookie = login(&app).await;

    let resp = app
        .clone()
        .oneshot(post("/logout", Some(&cookie), &[]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let resp = app.oneshot(get("/home", Some(&cookie))).await.unwrap();
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn repeated_logins_are_throttled_per_username() {
    let fx = Fixture::new("routes-throttle").await;
    let mut cfg = config(&fx.target);
    cfg.basic.login_attempts_per_minute = 1;
    let app = console_with(&fx, cfg).await;

    login(&app).await;

    let resp = app
        .clone()
        .oneshot(post(
            "/login",
            None,
            &[("username", "u1"), ("password", "secret")],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(json(resp).await["error"], LOGIN_FAILED);

    let resp = app
        .oneshot(post(
            "/login",
            None,
            &[("username", "u2"), ("password", "secret")],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
}
