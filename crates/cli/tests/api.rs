//! HTTP API tests driven in-process against a fake engine.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use foxden::testing::FakeEngine;
use foxden::{Supervisor, SupervisorConfig};
use foxden_cli::server::{AppState, router, with_static_files};
use foxden_cli::store::ProfileStore;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
	app: Router,
	engine: FakeEngine,
	supervisor: Arc<Supervisor>,
	_temp: TempDir,
}

fn test_app() -> TestApp {
	let temp = TempDir::new().unwrap();
	let engine = FakeEngine::new();
	let supervisor = Arc::new(Supervisor::new(
		Arc::new(engine.clone()),
		SupervisorConfig {
			readiness_timeout: Duration::from_secs(5),
			stop_timeout: Duration::from_secs(5),
			poll_interval: Duration::from_millis(20),
			scratch_dir: temp.path().join("scratch"),
		},
	));
	let store = Arc::new(ProfileStore::new(temp.path().join("profiles.json")));
	let app = router(AppState {
		supervisor: Arc::clone(&supervisor),
		store,
	});
	TestApp {
		app,
		engine,
		supervisor,
		_temp: temp,
	}
}

impl TestApp {
	async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		let mut request = Request::builder().method(method).uri(uri);
		let body = match body {
			Some(value) => {
				request = request.header("content-type", "application/json");
				Body::from(value.to_string())
			}
			None => Body::empty(),
		};
		self.send_request(request.body(body).unwrap()).await
	}

	async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
		let response = self.app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
		};
		(status, value)
	}

	async fn create_profile(&self, name: &str) {
		let (status, _) = self.send(Method::POST, "/api/profiles", Some(json!({ "name": name }))).await;
		assert_eq!(status, StatusCode::CREATED);
	}
}

#[tokio::test]
async fn health_check() {
	let app = test_app();
	let (status, body) = app.send(Method::GET, "/health", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, Value::String("ok".to_string()));
}

#[tokio::test]
async fn profile_crud() {
	let app = test_app();

	let (status, body) = app.send(Method::GET, "/api/profiles", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!([]));

	let (status, body) = app
		.send(
			Method::POST,
			"/api/profiles",
			Some(json!({ "name": "Work", "viewport_width": 1440, "viewport_height": 900 })),
		)
		.await;
	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(body["name"], "Work");
	assert_eq!(body["viewport_width"], 1440);

	let (status, body) = app.send(Method::POST, "/api/profiles", Some(json!({ "name": "Work" }))).await;
	assert_eq!(status, StatusCode::CONFLICT);
	assert_eq!(body["error"], "Conflict");
	assert_eq!(body["message"], "Profile 'Work' already exists");

	let (status, body) = app.send(Method::GET, "/api/profiles/Work", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["viewport_height"], 900);

	let (status, body) = app
		.send(Method::PUT, "/api/profiles/Work", Some(json!({ "name": "Work", "fullscreen": true })))
		.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["fullscreen"], true);

	let (status, body) = app.send(Method::PUT, "/api/profiles/Missing", Some(json!({ "name": "Missing" }))).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error"], "Not Found");

	let (status, _) = app.send(Method::DELETE, "/api/profiles/Work", None).await;
	assert_eq!(status, StatusCode::NO_CONTENT);

	let (status, body) = app.send(Method::GET, "/api/profiles/Work", None).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["message"], "Profile 'Work' not found");

	let (status, _) = app.send(Method::DELETE, "/api/profiles/Work", None).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_profiles_are_rejected() {
	let app = test_app();

	let (status, body) = app
		.send(Method::POST, "/api/profiles", Some(json!({ "name": "Tiny", "viewport_width": 100 })))
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "Validation failed");
	assert_eq!(body["message"], "Viewport width must be between 320 and 10000");

	let (status, body) = app
		.send(
			Method::POST,
			"/api/profiles",
			Some(json!({ "name": "P", "proxy": { "enabled": true, "host": "", "port": 0 } })),
		)
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["message"], "Proxy error: Host and port required when proxy is enabled");

	let (status, body) = app
		.send(Method::POST, "/api/profiles", Some(json!({ "name": "P", "proxy": { "protocol": "ftp" } })))
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "Validation failed");

	let (status, body) = app.send(Method::POST, "/api/profiles", Some(json!({}))).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["message"], "Profile name cannot be empty");

	let request = Request::builder()
		.method(Method::POST)
		.uri("/api/profiles")
		.header("content-type", "application/json")
		.body(Body::from("{ nope"))
		.unwrap();
	let (status, body) = app.send_request(request).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "Validation failed");

	let (_, body) = app.send(Method::GET, "/api/profiles", None).await;
	assert_eq!(body, json!([]));
}

#[tokio::test]
async fn session_lifecycle() {
	let app = test_app();
	app.create_profile("Work").await;

	let (status, session) = app
		.send(Method::POST, "/api/session", Some(json!({ "profile_name": "Work" })))
		.await;
	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(session["profile_name"], "Work");
	assert_eq!(session["status"], "running");
	let id = session["session_id"].as_str().unwrap().to_string();
	assert!(id.starts_with("work-"));
	assert!(session["started_at"].as_str().unwrap().ends_with('Z'));

	let (status, body) = app
		.send(Method::POST, "/api/session", Some(json!({ "profile_name": "Work" })))
		.await;
	assert_eq!(status, StatusCode::CONFLICT);
	assert_eq!(body["error"], "Conflict");

	let (status, body) = app.send(Method::GET, "/api/session", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!([session]));

	let (status, _) = app.send(Method::DELETE, "/api/session", Some(json!({ "session_id": id }))).await;
	assert_eq!(status, StatusCode::NO_CONTENT);

	let (_, body) = app.send(Method::GET, "/api/session", None).await;
	assert_eq!(body, json!([]));
	assert_eq!(app.engine.open_windows(), 0);
}

#[tokio::test]
async fn session_request_errors() {
	let app = test_app();

	let (status, body) = app.send(Method::POST, "/api/session", Some(json!({}))).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["message"], "profile_name is required");

	let (status, body) = app
		.send(Method::POST, "/api/session", Some(json!({ "profile_name": "Ghost" })))
		.await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["message"], "Profile 'Ghost' not found");

	let (status, body) = app.send(Method::DELETE, "/api/session", Some(json!({}))).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["message"], "session_id is required");

	let (status, body) = app
		.send(Method::DELETE, "/api/session", Some(json!({ "session_id": "ghost-1" })))
		.await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn engine_unavailable_is_503() {
	let app = test_app();
	app.create_profile("Work").await;
	app.engine.set_unavailable("no browser installed");

	let (status, body) = app
		.send(Method::POST, "/api/session", Some(json!({ "profile_name": "Work" })))
		.await;
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body["error"], "Engine Unavailable");
	assert!(app.supervisor.list().is_empty());
}

#[tokio::test]
async fn launch_failure_is_500() {
	let app = test_app();
	app.create_profile("Work").await;
	app.engine.fail_next_launch("display not found");

	let (status, body) = app
		.send(Method::POST, "/api/session", Some(json!({ "profile_name": "Work" })))
		.await;
	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["error"], "Internal Server Error");
	assert!(body["message"].as_str().unwrap().contains("display not found"));
	assert!(app.supervisor.list().is_empty());
}

#[tokio::test]
async fn fullscreen_session_uses_screen_size() {
	let app = test_app();
	let (status, _) = app
		.send(Method::POST, "/api/profiles", Some(json!({ "name": "Wide", "fullscreen": true })))
		.await;
	assert_eq!(status, StatusCode::CREATED);

	let (status, _) = app
		.send(
			Method::POST,
			"/api/session",
			Some(json!({ "profile_name": "Wide", "screen_width": 2560, "screen_height": 1440 })),
		)
		.await;
	assert_eq!(status, StatusCode::CREATED);

	let viewports = app.engine.viewports();
	assert_eq!(viewports.len(), 1);
	let viewport = viewports[0].unwrap();
	assert_eq!((viewport.width, viewport.height), (2560, 1440));
}

#[tokio::test]
async fn web_ui_is_served_next_to_the_api() {
	let test = test_app();
	let ui = TempDir::new().unwrap();
	std::fs::write(ui.path().join("index.html"), "<h1>foxden</h1>").unwrap();
	let test = TestApp {
		app: with_static_files(test.app.clone(), ui.path()),
		..test
	};

	let (status, body) = test.send(Method::GET, "/", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, Value::String("<h1>foxden</h1>".to_string()));

	let (status, body) = test.send(Method::GET, "/api/profiles", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!([]));

	let (status, _) = test.send(Method::GET, "/missing.js", None).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}
