//! End-to-end dispatch over HTTP.

mod common;

use std::time::Duration;

use common::{eventually, spawn_server};
use switchyard::config::parse_config;
use switchyard::routing::{Arguments, Controller, DispatchError, Flow, Outcome, Signature};
use axum::http::StatusCode;
use switchyard::{Application, Exchange, Handler, Response};

const CONFIG: &str = r#"
[[routes]]
path = "/users/{id:int}"
controller = "Users@show"
method = "GET"
as = "users.show"

[[routes]]
path = "/users"
controller = "Users@create"
method = "POST"

[[routes]]
path = "/broken"
controller = "Users@broken"
method = "GET"

[[routes]]
path = "/private"
controller = "Users@show"
method = "GET"
middleware = ["deny"]

[[blueprints]]
prefix = "/admin"
domain = "admin.test"
namespace = "Admin"

[[blueprints.routes]]
path = "/"
controller = "Dashboard"
method = "GET"
"#;

#[derive(Default)]
struct Users;

impl Controller for Users {
    fn signature(&self, action: &str) -> Option<Signature> {
        match action {
            "show" => Some(Signature::of([("id", "0")])),
            "create" | "broken" => Some(Signature::empty()),
            _ => None,
        }
    }

    fn call(&self, action: &str, exchange: &mut Exchange, args: &Arguments) -> Result<Outcome, DispatchError> {
        match action {
            "show" => Ok(format!("user {}", args.get("id").unwrap_or_default()).into()),
            "create" => Ok(format!("created {}", String::from_utf8_lossy(exchange.request.body())).into()),
            _ => Err(DispatchError::Handler("storage offline".into())),
        }
    }
}

#[derive(Default)]
struct Dashboard;

impl Controller for Dashboard {
    fn signature(&self, _: &str) -> Option<Signature> {
        Some(Signature::empty())
    }

    fn call(&self, _: &str, _: &mut Exchange, _: &Arguments) -> Result<Outcome, DispatchError> {
        Ok("admin dashboard".into())
    }
}

fn setup(app: &mut Application) {
    app.controller::<Users>("Users").controller::<Dashboard>("Admin::Dashboard");
    app.middleware_fn("deny", |_, _| {
        Ok(Flow::Replace(
            Response::new().with_status(StatusCode::FORBIDDEN).with_body("denied"),
        ))
    });
}

#[tokio::test]
async fn test_routes_over_http() {
    let server = spawn_server(CONFIG, setup).await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/users/42")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(
        res.headers()["content-type"].to_str().unwrap(),
        "text/html; charset=utf-8"
    );
    assert_eq!(res.text().await.unwrap(), "user 42");

    let res = client.get(server.url("/users/abc")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let res = client.delete(server.url("/users/42")).send().await.unwrap();
    assert_eq!(res.status(), 400);

    let res = client.post(server.url("/users")).body("ada").send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "created ada");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_options_and_method_override() {
    let server = spawn_server(CONFIG, setup).await;
    let client = reqwest::Client::new();

    let res = client
        .request(reqwest::Method::OPTIONS, server.url("/users/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.text().await.unwrap().is_empty());

    let res = client
        .post(server.url("/users/7"))
        .header("x-http-method-override", "GET")
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "user 7");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_blueprint_selected_by_host() {
    let server = spawn_server(CONFIG, setup).await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/admin"))
        .header("host", "admin.test")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "admin dashboard");

    let res = client.get(server.url("/admin")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_failures_and_middleware_replacement() {
    let server = spawn_server(CONFIG, setup).await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/broken")).send().await.unwrap();
    assert_eq!(res.status(), 503);

    let res = client.get(server.url("/private")).send().await.unwrap();
    assert_eq!(res.status(), 403);
    assert_eq!(res.text().await.unwrap(), "denied");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_body_limit() {
    let config = format!("[listener]\nmax_body_size = 16\n{CONFIG}");
    let server = spawn_server(&config, setup).await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/users"))
        .body("x".repeat(64))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_reload_swaps_application() {
    let server = spawn_server(CONFIG, |app: &mut Application| {
        setup(app);
        app.router_mut()
            .get("/version", Handler::new(Vec::<&str>::new(), |_, _| Ok("v1".into())));
    })
    .await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let reloaded = format!(
        "{CONFIG}\n[[blueprints]]\nprefix = \"/health\"\n\n[[blueprints.routes]]\npath = \"/\"\ncontroller = \"Users@show\"\nmethod = \"GET\"\n"
    );
    server.updates.send(parse_config(&reloaded).unwrap()).unwrap();

    let url = server.url("/health");
    let swapped = eventually(Duration::from_secs(2), || {
        let client = client.clone();
        let url = url.clone();
        async move {
            match client.get(&url).send().await {
                Ok(res) => res.status() == 200,
                Err(_) => false,
            }
        }
    })
    .await;
    assert!(swapped);

    // Routes registered in code survive the rebuild
    let res = client.get(server.url("/version")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "v1");

    server.shutdown.trigger();
}
