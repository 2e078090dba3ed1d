//! End-to-end engine behavior against a mock Jenkins server.
//!
//! The mock keeps a tiny semantic model (folders, jobs, builds) plus hit
//! counters, so the tests can assert not just outcomes but which remote
//! calls were (and were not) issued.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use indexmap::IndexMap;
use jenky_engine::Engine;
use jenky_engine::config::{EngineConfig, ServerEntry};
use jenky_types::{
    Error, ParameterMap, ParameterValue, ProvisionAction, Scenario, StopStatus, TriggerStatus,
};
use serde_json::{Value, json};
use url::Url;

#[derive(Default)]
struct MockJenkins {
    /// Fixed node payloads served for `GET .../api/json`, keyed by full path
    /// ("" is the server root).
    nodes: Mutex<HashMap<String, Value>>,
    /// Existing folders, by full path.
    folders: Mutex<HashSet<String>>,
    /// Existing jobs, full path -> stored config XML.
    jobs: Mutex<HashMap<String, String>>,
    /// Build snapshots, (job full path, number) -> payload.
    builds: Mutex<HashMap<(String, u32), Value>>,
    /// Paths whose next existence check 404s even though the item exists.
    fail_next_exists: Mutex<HashSet<String>>,
    trigger_hits: AtomicUsize,
    stop_hits: AtomicUsize,
    deny_stop: AtomicBool,
}

fn split_job_path(path: &str) -> (Vec<String>, String) {
    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    let mut components = Vec::new();
    let mut index = 0;
    while index + 1 < segments.len() && segments[index] == "job" {
        components.push(segments[index + 1].to_string());
        index += 2;
    }
    (components, segments[index..].join("/"))
}

fn json_response(status: u16, body: Value) -> Response {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("response")
}

fn empty_response(status: u16) -> Response {
    Response::builder().status(status).body(Body::empty()).expect("response")
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix(&format!("{name}=")).map(str::to_string))
}

impl MockJenkins {
    fn node_payload(&self, key: &str) -> Option<Value> {
        if let Some(fixture) = self.nodes.lock().unwrap().get(key) {
            return Some(fixture.clone());
        }
        if self.jobs.lock().unwrap().contains_key(key) {
            let name = key.rsplit('/').next().unwrap_or(key);
            return Some(json!({
                "_class": "org.jenkinsci.plugins.workflow.job.WorkflowJob",
                "name": name,
                "fullName": key,
                "url": format!("http://mock/job/{name}/"),
                "buildable": true,
                "color": "notbuilt"
            }));
        }
        if self.folders.lock().unwrap().contains(key) {
            let name = key.rsplit('/').next().unwrap_or(key);
            return Some(json!({
                "_class": "com.cloudbees.hudson.plugins.folder.Folder",
                "name": name,
                "fullName": key,
                "jobs": []
            }));
        }
        None
    }
}

async fn handle(State(state): State<Arc<MockJenkins>>, request: Request) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let body_bytes = axum::body::to_bytes(request.into_body(), 1 << 20).await.unwrap_or_default();
    let body_text = String::from_utf8_lossy(&body_bytes).to_string();
    let query = uri.query().unwrap_or("").to_string();
    let (components, rest) = split_job_path(uri.path());
    let key = components.join("/");

    match (method.as_str(), rest.as_str()) {
        // CSRF protection is disabled on the mock.
        ("GET", "crumbIssuer/api/json") => empty_response(404),

        ("GET", "api/json") => {
            if state.fail_next_exists.lock().unwrap().remove(&key) {
                return empty_response(404);
            }
            match state.node_payload(&key) {
                Some(payload) => json_response(200, payload),
                None => empty_response(404),
            }
        }

        ("GET", rest) if rest.starts_with("queue/item/") => json_response(
            200,
            json!({
                "blocked": false,
                "buildable": false,
                "stuck": false,
                "why": null,
                "executable": {"number": 7, "url": "http://mock/job/deploy/7/"}
            }),
        ),

        ("GET", rest) if rest.ends_with("/api/json") => {
            let number: u32 = rest.split('/').next().and_then(|n| n.parse().ok()).unwrap_or(0);
            match state.builds.lock().unwrap().get(&(key.clone(), number)) {
                Some(payload) => json_response(200, payload.clone()),
                None => empty_response(404),
            }
        }

        ("POST", "build") | ("POST", "buildWithParameters") => {
            state.trigger_hits.fetch_add(1, Ordering::SeqCst);
            Response::builder()
                .status(201)
                .header("Location", "http://mock/queue/item/42/")
                .body(Body::empty())
                .expect("response")
        }

        ("POST", "createItem") => {
            let Some(name) = query_param(&query, "name") else {
                return empty_response(400);
            };
            let full_path = if key.is_empty() { name.clone() } else { format!("{key}/{name}") };
            if query_param(&query, "mode").is_some() {
                let mut folders = state.folders.lock().unwrap();
                if folders.contains(&full_path) {
                    return empty_response(400);
                }
                folders.insert(full_path);
                empty_response(200)
            } else {
                let mut jobs = state.jobs.lock().unwrap();
                if jobs.contains_key(&full_path) {
                    return empty_response(400);
                }
                jobs.insert(full_path, body_text);
                empty_response(200)
            }
        }

        ("POST", "config.xml") => {
            let mut jobs = state.jobs.lock().unwrap();
            if jobs.contains_key(&key) {
                jobs.insert(key, body_text);
                empty_response(200)
            } else {
                empty_response(404)
            }
        }

        ("POST", rest) if rest.ends_with("/stop") => {
            state.stop_hits.fetch_add(1, Ordering::SeqCst);
            if state.deny_stop.load(Ordering::SeqCst) {
                return Response::builder()
                    .status(403)
                    .body(Body::from("bot is missing the Run/Abort permission"))
                    .expect("response");
            }
            empty_response(200)
        }

        _ => empty_response(404),
    }
}

async fn start_mock(scenarios: IndexMap<String, Scenario>) -> (Arc<MockJenkins>, Engine) {
    let state = Arc::new(MockJenkins::default());
    let app = axum::Router::new().fallback(handle).with_state(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let address = listener.local_addr().expect("mock address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock");
    });

    let engine = Engine::new(EngineConfig {
        servers: vec![ServerEntry {
            name: "mock".to_string(),
            uri: Url::parse(&format!("http://{address}")).expect("mock url"),
            user: "alice@example.com".to_string(),
            token: Some("t0k3n".to_string()),
            token_env: None,
        }],
        scenarios,
    });
    (state, engine)
}

fn parameterized_job_node() -> Value {
    json!({
        "_class": "org.jenkinsci.plugins.workflow.job.WorkflowJob",
        "name": "deploy",
        "fullName": "deploy",
        "url": "http://mock/job/deploy/",
        "buildable": true,
        "color": "blue",
        "property": [
            {"parameterDefinitions": [
                {"name": "ENV", "type": "ChoiceParameterDefinition",
                 "choices": ["dev", "prod"],
                 "defaultParameterValue": {"value": "dev"}}
            ]}
        ]
    })
}

fn supplied(pairs: &[(&str, &str)]) -> ParameterMap {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), ParameterValue::Str(value.to_string())))
        .collect()
}

#[tokio::test]
async fn invalid_choice_value_fails_validation_without_any_trigger_call() {
    let (state, engine) = start_mock(IndexMap::new()).await;
    state.nodes.lock().unwrap().insert("deploy".to_string(), parameterized_job_node());

    let error = engine
        .trigger_build("mock", "deploy", Some(supplied(&[("ENV", "staging")])))
        .await
        .expect_err("staging is not a declared choice");

    match error {
        Error::Validation(report) => {
            assert!(!report.ok);
            assert!(report.missing.is_empty());
            assert_eq!(report.type_errors.len(), 1);
            assert_eq!(report.type_errors[0].name, "ENV");
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert_eq!(state.trigger_hits.load(Ordering::SeqCst), 0, "no HTTP trigger may be issued");
}

#[tokio::test]
async fn valid_parameters_trigger_and_resolve_the_started_build() {
    let (state, engine) = start_mock(IndexMap::new()).await;
    state.nodes.lock().unwrap().insert("deploy".to_string(), parameterized_job_node());

    let outcome = engine
        .trigger_build("mock", "deploy", Some(supplied(&[("ENV", "prod")])))
        .await
        .expect("trigger");

    assert_eq!(outcome.status, TriggerStatus::BuildStarted);
    assert_eq!(outcome.build_number, Some(7));
    assert_eq!(outcome.queue_id, Some(42));
    assert_eq!(state.trigger_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stopping_a_terminal_build_is_a_no_op_without_a_stop_call() {
    let (state, engine) = start_mock(IndexMap::new()).await;
    state.jobs.lock().unwrap().insert("demo".to_string(), "<xml/>".to_string());
    state.builds.lock().unwrap().insert(
        ("demo".to_string(), 9),
        json!({"number": 9, "building": false, "result": "SUCCESS",
               "url": "http://mock/job/demo/9/", "timestamp": 1700000000000u64, "duration": 60000}),
    );

    let outcome = engine.stop_build("mock", "demo", 9).await.expect("stop");
    assert_eq!(outcome.status, StopStatus::AlreadyTerminated);
    assert_eq!(state.stop_hits.load(Ordering::SeqCst), 0, "terminal builds are not stopped again");
}

#[tokio::test]
async fn stop_permission_denial_is_a_typed_permission_error() {
    let (state, engine) = start_mock(IndexMap::new()).await;
    state.deny_stop.store(true, Ordering::SeqCst);
    state.jobs.lock().unwrap().insert("demo".to_string(), "<xml/>".to_string());
    state.builds.lock().unwrap().insert(
        ("demo".to_string(), 10),
        json!({"number": 10, "building": true, "result": null,
               "url": "http://mock/job/demo/10/", "timestamp": 1700000000000u64, "duration": 0}),
    );

    let error = engine.stop_build("mock", "demo", 10).await.expect_err("stop is denied");
    assert!(matches!(error, Error::Permission { .. }), "got {error:?}");
    assert_eq!(state.stop_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stopping_an_unknown_build_reports_not_found() {
    let (state, engine) = start_mock(IndexMap::new()).await;
    state.jobs.lock().unwrap().insert("demo".to_string(), "<xml/>".to_string());

    let outcome = engine.stop_build("mock", "demo", 99).await.expect("stop");
    assert_eq!(outcome.status, StopStatus::NotFound);
    assert_eq!(state.stop_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn create_then_update_is_idempotent_and_stores_the_latest_script() {
    let (state, engine) = start_mock(IndexMap::new()).await;

    let first = engine
        .create_or_update_job("mock", "nightly", "echo 'round one'", Some("nightly build"), None)
        .await
        .expect("create");
    assert_eq!(first.action, ProvisionAction::Created);
    assert_eq!(first.full_path, "MCPS/alice/nightly");

    {
        let folders = state.folders.lock().unwrap();
        assert!(folders.contains("MCPS"));
        assert!(folders.contains("MCPS/alice"));
    }

    let second = engine
        .create_or_update_job("mock", "nightly", "echo 'a < b'", None, None)
        .await
        .expect("update");
    assert_eq!(second.action, ProvisionAction::Updated);
    assert_eq!(second.full_path, first.full_path);

    let stored = state.jobs.lock().unwrap()["MCPS/alice/nightly"].clone();
    assert!(stored.contains("echo &apos;a &lt; b&apos;"), "stored: {stored}");
    assert!(stored.contains("<sandbox>true</sandbox>"));
}

#[tokio::test]
async fn folder_creation_race_is_not_an_error() {
    let (state, engine) = start_mock(IndexMap::new()).await;
    // Another caller created MCPS between our existence check and our
    // create call: the check 404s once, then the create answers 400.
    state.folders.lock().unwrap().insert("MCPS".to_string());
    state.fail_next_exists.lock().unwrap().insert("MCPS".to_string());

    let outcome = engine
        .create_or_update_job("mock", "racer", "echo hello", None, Some("team"))
        .await
        .expect("race loser must still succeed");
    assert_eq!(outcome.action, ProvisionAction::Created);
    assert_eq!(outcome.full_path, "MCPS/alice/team/racer");
}

#[tokio::test]
async fn scenario_search_returns_only_jobs_under_the_prefix() {
    let mut scenarios = IndexMap::new();
    scenarios.insert(
        "Deploy Application".to_string(),
        Scenario {
            description: "deploy the application".to_string(),
            server: "mock".to_string(),
            job_path: "release/deploy/".to_string(),
            prompt_template: String::new(),
        },
    );
    let (state, engine) = start_mock(scenarios).await;
    state.nodes.lock().unwrap().insert(
        "release/deploy".to_string(),
        json!({
            "_class": "com.cloudbees.hudson.plugins.folder.Folder",
            "name": "deploy",
            "fullName": "release/deploy",
            "jobs": [
                {"_class": "org.jenkinsci.plugins.workflow.job.WorkflowJob", "name": "app-a",
                 "fullName": "release/deploy/app-a", "url": "http://mock/job/app-a/",
                 "buildable": true, "color": "blue"},
                {"_class": "org.jenkinsci.plugins.workflow.job.WorkflowJob", "name": "app-b",
                 "fullName": "release/deploy/app-b", "url": "http://mock/job/app-b/",
                 "buildable": true, "color": "red"}
            ]
        }),
    );

    let jobs = engine.search_by_scenario("Deploy Application").await.expect("scenario search");
    let paths: Vec<&str> = jobs.iter().map(|job| job.full_path.as_str()).collect();
    assert_eq!(paths, ["release/deploy/app-a", "release/deploy/app-b"]);
    assert!(jobs.iter().all(|job| job.full_path.starts_with("release/deploy/")));
}

#[tokio::test]
async fn deep_folders_are_expanded_with_follow_up_listing_calls() {
    let (state, engine) = start_mock(IndexMap::new()).await;
    {
        let mut nodes = state.nodes.lock().unwrap();
        // The root listing reaches its horizon at `deep`: the folder is
        // reported without its `jobs` array.
        nodes.insert(
            String::new(),
            json!({"jobs": [
                {"_class": "com.cloudbees.hudson.plugins.folder.Folder", "name": "deep", "fullName": "deep",
                 "url": "http://mock/job/deep/"}
            ]}),
        );
        nodes.insert(
            "deep".to_string(),
            json!({"jobs": [
                {"_class": "org.jenkinsci.plugins.workflow.job.WorkflowJob", "name": "hidden",
                 "fullName": "deep/hidden", "url": "http://mock/job/deep/job/hidden/",
                 "buildable": true, "color": "blue"}
            ]}),
        );
    }

    let jobs = engine.search_jobs("mock", None).await.expect("search");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].full_path, "deep/hidden");
}

#[tokio::test]
async fn unknown_server_fails_before_any_network_traffic() {
    let (state, engine) = start_mock(IndexMap::new()).await;
    let error = engine.search_jobs("absent", None).await.expect_err("unknown server");
    assert!(matches!(error, Error::UnknownServer(name) if name == "absent"));
    assert_eq!(state.trigger_hits.load(Ordering::SeqCst), 0);
}
