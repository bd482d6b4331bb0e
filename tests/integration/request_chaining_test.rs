//! Request chaining through the runner: handlers publish globals that later
//! requests reference, responses are stored for `<>` links.

use super::{init_test_env, write_file};
use restflow::environment::{discover, load_environments};
use restflow::models::{HttpResponse, ResponseRef};
use restflow::parser::parse_file;
use restflow::runtime::{
    DirectoryStorage, HandlerContext, HandlerOutcome, ResponseStorage, RunError, Runner,
    ScriptEngine, TestResult, Transport, TransportError,
};
use restflow::store::GlobalStore;
use restflow::variables::{ExpandedRequest, ResolveOptions};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Answers `/login` with a token and echoes everything else.
#[derive(Default)]
struct FakeApi {
    seen: Mutex<Vec<ExpandedRequest>>,
}

impl Transport for FakeApi {
    fn execute(&self, request: &ExpandedRequest) -> Result<HttpResponse, TransportError> {
        if !request.url.starts_with("https://") {
            return Err(TransportError::UnsupportedProtocol(request.url.clone()));
        }
        self.seen
            .lock()
            .map_err(|_| TransportError::Protocol("poisoned".to_string()))?
            .push(request.clone());

        let mut response = if request.url.ends_with("/login") {
            HttpResponse::new(200).with_body(r#"{"token":"abc123","userId":42}"#)
        } else if request
            .header("authorization")
            .is_some_and(|h| h.value() == "Bearer abc123")
        {
            HttpResponse::new(200).with_body(r#"{"ok":true}"#)
        } else {
            HttpResponse::new(401)
        };
        response = response.with_header("Content-Type", "application/json");
        response.duration = Duration::from_millis(5);
        Ok(response)
    }
}

/// Understands `set NAME from FIELD` lines and `assert status N` lines.
struct LineScript;

impl ScriptEngine for LineScript {
    fn run_handler(&self, script: &str, context: &HandlerContext<'_>) -> HandlerOutcome {
        let body: Value = serde_json::from_slice(&context.response.body).unwrap_or(Value::Null);

        let mut outcome = HandlerOutcome::default();
        for line in script.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                ["set", name, "from", field] => match body.get(*field) {
                    Some(value) => {
                        outcome.globals.insert(name.to_string(), value.clone());
                    }
                    None => outcome.error = Some(format!("missing field {field}")),
                },
                ["assert", "status", expected] => {
                    let name = format!("status is {expected}");
                    if context.response.status_code.to_string() == *expected {
                        outcome.tests.push(TestResult::passed(name));
                    } else {
                        outcome.tests.push(TestResult::failed(
                            name,
                            format!("got {}", context.response.status_code),
                        ));
                    }
                }
                _ => outcome.logs.push(line.to_string()),
            }
        }
        outcome
    }
}

const FLOW: &str = r#"### login
POST {{baseUrl}}/login
Content-Type: application/json

{"user": "{{user}}"}

> {%
set token from token
set userId from userId
assert status 200
%}

### profile
GET {{baseUrl}}/users/{{userId}}
Authorization: Bearer {{token}}

> ./handlers/profile.js
"#;

fn workspace() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write_file(
        &dir,
        "http-client.env.json",
        r#"{ "dev": { "baseUrl": "https://api.example.com", "user": "alice" } }"#,
    );
    write_file(&dir, "requests/flow.http", FLOW);
    write_file(&dir, "requests/handlers/profile.js", "assert status 200\n");
    dir
}

#[test]
fn test_token_flows_from_login_to_profile() {
    init_test_env();
    let dir = workspace();
    let request_dir = dir.path().join("requests");

    let file = parse_file("flow.http", FLOW).unwrap();
    let (public, private) = load_environments(&discover(dir.path())).unwrap();

    let api = FakeApi::default();
    let runner = Runner::new(&api)
        .with_script_engine(&LineScript)
        .with_base_dir(&request_dir)
        .with_resolve_options(ResolveOptions {
            system_variables: false,
            ..Default::default()
        });

    let report = runner
        .run_in_environment(&file, &public, &private, "dev")
        .unwrap();

    assert_eq!(report.len(), 2);
    assert!(report.handlers_succeeded());

    let seen = api.seen.lock().unwrap();
    assert_eq!(seen[1].url, "https://api.example.com/users/42");
    assert_eq!(
        seen[1].header("Authorization").map(|h| h.value()),
        Some("Bearer abc123")
    );

    let profile = report.outcomes[1].handler.as_ref().unwrap();
    assert_eq!(profile.tests, vec![TestResult::passed("status is 200")]);

    assert_eq!(runner.globals().get("token"), Some(json!("abc123")));
    assert_eq!(runner.globals().get("userId"), Some(json!(42)));
}

#[test]
fn test_globals_survive_across_runners() {
    init_test_env();
    let dir = workspace();
    let (public, private) = load_environments(&discover(dir.path())).unwrap();
    let file = parse_file("flow.http", FLOW).unwrap();

    let globals = GlobalStore::new();
    let api = FakeApi::default();
    Runner::new(&api)
        .with_script_engine(&LineScript)
        .with_base_dir(dir.path().join("requests"))
        .with_globals(globals.clone())
        .run_in_environment(&file, &public, &private, "dev")
        .unwrap();

    let follow_up = parse_file(
        "follow.http",
        "GET https://api.example.com/users/{{userId}}/posts\nAuthorization: Bearer {{token}}\n",
    )
    .unwrap();
    let report = Runner::new(&api)
        .with_globals(globals)
        .run_in_environment(&follow_up, &public, &private, "dev")
        .unwrap();

    assert_eq!(report.outcomes[0].request.url, "https://api.example.com/users/42/posts");
    assert_eq!(report.outcomes[0].response.status_code, 200);
}

#[test]
fn test_failed_handler_is_reported_and_run_continues() {
    init_test_env();
    let text = "GET https://api.example.com/anonymous\n\n> {%\nassert status 200\nset id from id\n%}\n\n###\nGET https://api.example.com/next\n";
    let file = parse_file("t.http", text).unwrap();
    let env = restflow::ResolvedEnvironment::new("none");

    let api = FakeApi::default();
    let report = Runner::new(&api)
        .with_script_engine(&LineScript)
        .run(&file, &env)
        .unwrap();

    assert_eq!(report.len(), 2);
    let handler = report.outcomes[0].handler.as_ref().unwrap();
    assert!(!handler.is_success());
    assert!(!handler.tests[0].passed);
    assert_eq!(handler.tests[0].message.as_deref(), Some("got 401"));
    assert_eq!(report.handler_errors(), vec![(0, "missing field id")]);
    assert!(report.outcomes[1].handler.is_none());
}

#[test]
fn test_transport_failure_stops_the_sequence() {
    init_test_env();
    let text = "GET http://insecure.example.com/\n\n###\nGET https://api.example.com/never\n";
    let file = parse_file("t.http", text).unwrap();

    let api = FakeApi::default();
    let err = Runner::new(&api)
        .run(&file, &restflow::ResolvedEnvironment::new("none"))
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::Transport {
            index: 0,
            source: TransportError::UnsupportedProtocol(_),
            ..
        }
    ));
    assert!(api.seen.lock().unwrap().is_empty());
}

#[test]
fn test_stored_responses_back_response_refs() {
    init_test_env();
    let dir = workspace();
    let storage = DirectoryStorage::new(dir.path().join(".responses"));
    let (public, private) = load_environments(&discover(dir.path())).unwrap();

    let file = parse_file("flow.http", FLOW).unwrap();
    let api = FakeApi::default();
    let report = Runner::new(&api)
        .with_storage(&storage)
        .run_in_environment(&file, &public, &private, "dev")
        .unwrap();

    let saved = report.outcomes[0].saved_to.clone().unwrap();
    let relative = saved.strip_prefix(storage.dir()).unwrap().to_string_lossy().into_owned();

    let with_ref = format!("GET https://api.example.com/users/42\n\n<> {}\n", relative);
    let linked = parse_file("linked.http", &with_ref).unwrap();
    let reference: &ResponseRef = linked.requests[0].response_ref.as_ref().unwrap();

    let stored = storage.load(Path::new(&reference.path)).unwrap();
    assert_eq!(stored.request_name.as_deref(), Some("login"));
    assert_eq!(stored.method, "POST");
    assert_eq!(stored.status_code, 200);
    assert!(stored.body.contains("abc123"));
}
