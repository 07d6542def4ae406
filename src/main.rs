//! Switchyard server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (axum fallback, request id, timeout, trace)
//!                         │ spawn_blocking
//!                         ▼
//!                     app::Application::handle
//!                         │
//!                         ▼
//!                     routing::Router::execute ──▶ blueprint routers
//!                         │  middleware, hooks, callbacks
//!                         ▼
//!                     events (beforeRoute, obtain, present, completed, ...)
//!     Client Response
//!     ◀────────────── http::Response
//! ```
//!
//! The binary loads a TOML config, registers the demo controllers below and
//! serves until SIGINT/SIGTERM. With `--watch` the config file is reloaded
//! on change and the application is rebuilt in place.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use switchyard::app::{build_application, Application, Setup, Templates};
use switchyard::config::{load_config, parse_config, watcher::ConfigWatcher};
use switchyard::lifecycle::{signals, Shutdown};
use switchyard::observability;
use switchyard::routing::{Arguments, Controller, DispatchError, Flow, Outcome, Signature};
use switchyard::{Exchange, HttpServer};

#[derive(Debug, Parser)]
#[command(name = "switchyard", version, about = "Micro web framework server")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the configuration and route table, then exit
    #[arg(long)]
    check: bool,

    /// Reload the configuration file when it changes
    #[arg(long)]
    watch: bool,
}

#[derive(Default)]
struct Home;

impl Controller for Home {
    fn signature(&self, action: &str) -> Option<Signature> {
        match action {
            "invoke" => Some(Signature::empty()),
            "greet" => Some(Signature::of([("name", "world")])),
            _ => None,
        }
    }

    fn call(&self, action: &str, exchange: &mut Exchange, args: &Arguments) -> Result<Outcome, DispatchError> {
        match action {
            "greet" => Ok(format!("Hello, {}!", args.get("name").unwrap_or("world")).into()),
            _ => {
                exchange.response.set_header("cache-control", "no-cache");
                Ok("Switchyard is running".into())
            }
        }
    }
}

#[derive(Default)]
struct Users;

impl Controller for Users {
    fn signature(&self, action: &str) -> Option<Signature> {
        match action {
            "index" => Some(Signature::empty()),
            "show" => Some(Signature::of(["id"])),
            _ => None,
        }
    }

    fn call(&self, action: &str, exchange: &mut Exchange, args: &Arguments) -> Result<Outcome, DispatchError> {
        exchange.response.set_header("content-type", "application/json");
        match action {
            "show" => {
                let id: u64 = args.parse("id")?;
                Ok(json!({ "id": id, "name": format!("user-{id}") }).to_string().into())
            }
            _ => Ok(json!([{ "id": 1, "name": "user-1" }]).to_string().into()),
        }
    }
}

fn demo_setup(app: &mut Application) {
    app.controller::<Home>("Home").controller::<Users>("Users");
    app.middleware_fn("powered-by", |exchange, args| {
        let value = args.first().map(String::as_str).unwrap_or("switchyard");
        exchange.response.set_header("x-powered-by", value);
        Ok(Flow::Next)
    });

    let mut templates = Templates::new();
    templates.insert("status", "<p>{{ name }} {{ version }}</p>");
    app.set_renderer(templates);
    if let Ok(page) = app.render("status", &json!({ "name": "switchyard", "version": env!("CARGO_PKG_VERSION") })) {
        tracing::debug!(page = %page, "Renderer ready");
    }
}

const DEFAULT_ROUTES: &str = r#"
[[routes]]
path = "/"
controller = "Home"
as = "home"
middleware = ["powered-by"]

[[routes]]
path = "/hello/{name}?"
controller = "Home@greet"
method = "GET"
as = "greet"

[[routes]]
path = "/users"
controller = "Users@index"
method = "GET"
as = "users.index"

[[routes]]
path = "/users/{id:int}"
controller = "Users@show"
method = "GET"
as = "users.show"
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => parse_config(DEFAULT_ROUTES)?,
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }

    observability::logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "switchyard starting");

    let setup: Setup = Arc::new(demo_setup);
    let app = build_application(config.clone(), &*setup)?;

    if cli.check {
        tracing::info!(routes = app.router().routes().len(), "Configuration is valid");
        return Ok(());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Arc::new(Shutdown::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move { signals::forward_to(&signal_shutdown).await });

    // The watcher stops when dropped, so it lives until main returns
    let (updates, _watcher) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        _ => {
            if cli.watch {
                tracing::warn!("--watch needs --config, not watching");
            }
            let (_tx, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    HttpServer::new(app, setup).run(listener, updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
