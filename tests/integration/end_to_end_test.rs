//! End-to-end tests: request files and environment documents on disk through
//! parsing, validation, resolution and expansion.

use super::{init_test_env, write_file};
use restflow::config::RestflowConfig;
use restflow::environment::{discover, load_environments, EnvError};
use restflow::models::{ContentType, HttpMethod, RequestBody, ResponseHandler};
use restflow::parser::parse_file;
use restflow::validator::validate;
use restflow::variables::{
    expand_request, expand_string, resolve_with, validate_resolution, NoSystemVariables,
    ResolveError, ResolveOptions, VariableSource,
};
use restflow::ParseError;
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

const PUBLIC_ENV: &str = r#"{
  // shared by every environment
  "$shared": {
    "apiVersion": "v2",
    "timeout": 30000
  },
  "dev": {
    "host": "localhost:3000",
    "baseUrl": "http://{{host}}/api/{{apiVersion}}", /* composed */
    "requestTimeout": "{{timeout}}"
  },
  "prod": {
    "host": "api.example.com",
    "baseUrl": "https://{{host}}/api/{{apiVersion}}"
  }
}"#;

const PRIVATE_ENV: &str = r#"{
  "dev": { "token": "dev-secret", "host": "127.0.0.1:3000" },
  "prod": { "token": "prod-secret" }
}"#;

const REQUESTS: &str = r#"### Get Users
GET {{baseUrl}}/users?limit=10 HTTP/1.1
Accept: application/json
Authorization: Bearer {{token}}

###
# @name createUser
POST {{baseUrl}}/users
Content-Type: application/json

{
  "name": "Alice",
  // dropped from the body
  "timeout": {{requestTimeout}}
}

> {%
    client.global.set("userId", response.body.id);
%}

###
PUT {{baseUrl}}/users/{{userId}}/avatar
Content-Type: application/octet-stream

< ./avatar.png
"#;

fn workspace() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write_file(&dir, "http-client.env.json", PUBLIC_ENV);
    write_file(&dir, "http-client.private.env.json", PRIVATE_ENV);
    write_file(&dir, "api/users.http", REQUESTS);
    write_file(&dir, "api/avatar.png", "png");
    dir
}

#[test]
fn test_single_line_request() {
    init_test_env();
    let file = parse_file("one.http", "GET https://api.example.com/users").unwrap();

    assert_eq!(file.len(), 1);
    let request = &file.requests[0];
    assert_eq!(request.http_method(), Some(HttpMethod::GET));
    assert_eq!(request.url.raw(), "https://api.example.com/users");
    assert!(request.headers.is_empty());
    assert!(request.body.is_none());
}

#[test]
fn test_json_body_content_type() {
    init_test_env();
    let text = "POST https://api.example.com/users\nContent-Type: application/json\n\n{\"name\": \"Bob\"}\n";
    let file = parse_file("post.http", text).unwrap();

    match &file.requests[0].body {
        Some(RequestBody::Inline {
            content,
            content_type,
        }) => {
            assert_eq!(content, "{\"name\": \"Bob\"}");
            assert_eq!(*content_type, ContentType::Json);
        }
        other => panic!("unexpected body: {other:?}"),
    }
}

#[test]
fn test_separated_requests_with_names() {
    init_test_env();
    let text = "### Get Users\nGET https://api.example.com/users\n\n###\nGET https://api.example.com/posts\n\n###\nDELETE https://api.example.com/posts/1\n";
    let file = parse_file("three.http", text).unwrap();

    assert_eq!(file.len(), 3);
    assert_eq!(file.requests[0].name.as_deref(), Some("Get Users"));
    assert_eq!(file.requests[1].name, None);
    assert_eq!(file.requests[2].http_method(), Some(HttpMethod::DELETE));
}

#[test]
fn test_header_value_keeps_spaces() {
    init_test_env();
    let file = parse_file(
        "auth.http",
        "GET https://api.example.com/me\nAuthorization: Bearer {{token}}\n",
    )
    .unwrap();

    let header = &file.requests[0].headers[0];
    assert_eq!(header.value(), "Bearer {{token}}");
    assert_eq!(header.variables(), ["token".to_string()]);
}

#[test]
fn test_full_pipeline_from_disk() {
    init_test_env();
    let dir = workspace();
    let api_dir = dir.path().join("api");

    let text = fs::read_to_string(api_dir.join("users.http")).unwrap();
    let file = parse_file("users.http", &text).unwrap();
    assert_eq!(file.len(), 3);
    assert_eq!(file.requests[1].name.as_deref(), Some("createUser"));
    assert!(matches!(
        file.requests[1].response_handler,
        Some(ResponseHandler::Inline { .. })
    ));
    assert!(validate(&file, true, &api_dir).is_empty());

    let loader = discover(&api_dir);
    assert_eq!(
        loader.public_file.as_deref(),
        Some(dir.path().join("http-client.env.json").as_path())
    );
    let (public, private) = load_environments(&loader).unwrap();
    assert_eq!(public.names(), vec!["dev", "prod"]);

    let resolved = resolve_with(
        &public,
        &private,
        "dev",
        &ResolveOptions::default(),
        &NoSystemVariables,
    )
    .unwrap();
    assert_eq!(
        resolved.get("baseUrl"),
        Some(&json!("http://127.0.0.1:3000/api/v2"))
    );
    assert_eq!(resolved.get("requestTimeout"), Some(&json!(30000)));
    assert_eq!(resolved.source_of("host"), Some(VariableSource::Private));
    assert!(validate_resolution(&resolved).is_empty());

    let first = expand_request(&file.requests[0], &resolved);
    assert_eq!(first.url, "http://127.0.0.1:3000/api/v2/users?limit=10");
    assert_eq!(
        first.header("authorization").map(|h| h.value()),
        Some("Bearer dev-secret")
    );

    let second = expand_request(&file.requests[1], &resolved);
    match &second.body {
        Some(RequestBody::Inline { content, .. }) => {
            assert!(content.contains("\"timeout\": 30000"));
            assert!(!content.contains("dropped"));
        }
        other => panic!("unexpected body: {other:?}"),
    }

    let third = expand_request(&file.requests[2], &resolved);
    assert_eq!(third.unresolved(), vec!["userId".to_string()]);
}

#[test]
fn test_config_drives_loading() {
    init_test_env();
    let dir = TempDir::new().unwrap();
    write_file(&dir, "env/public.json", r#"{ "dev": { "a": "1" } }"#);

    let config = RestflowConfig {
        environment_file: "env/public.json".to_string(),
        system_variables: false,
        ..Default::default()
    };
    let (public, private) = load_environments(&config.loader_config(dir.path())).unwrap();
    assert!(private.is_empty());

    let resolved = resolve_with(
        &public,
        &private,
        "dev",
        &config.resolve_options(),
        &NoSystemVariables,
    )
    .unwrap();
    assert_eq!(resolved.get_text("a").as_deref(), Some("1"));
}

#[test]
fn test_system_variables_with_prefix() {
    init_test_env();
    let dir = TempDir::new().unwrap();
    write_file(
        &dir,
        "http-client.env.json",
        r#"{ "ci": { "url": "https://{{APP_HOST}}/{{OTHER}}" } }"#,
    );
    let (public, private) = load_environments(&discover(dir.path())).unwrap();

    let system: HashMap<String, String> = [
        ("APP_HOST".to_string(), "ci.example.com".to_string()),
        ("OTHER".to_string(), "hidden".to_string()),
    ]
    .into_iter()
    .collect();
    let options = ResolveOptions {
        system_prefix: Some("APP_".to_string()),
        ..Default::default()
    };

    let resolved = resolve_with(&public, &private, "ci", &options, &system).unwrap();
    assert_eq!(
        resolved.get("url"),
        Some(&json!("https://ci.example.com/{{OTHER}}"))
    );
    assert_eq!(resolved.source_of("APP_HOST"), Some(VariableSource::System));

    let errors = validate_resolution(&resolved);
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        ResolveError::UnresolvedVariable { key, reference } if key == "url" && reference == "OTHER"
    ));
}

#[test]
fn test_circular_environment_from_disk() {
    init_test_env();
    let dir = TempDir::new().unwrap();
    write_file(
        &dir,
        "http-client.env.json",
        r#"{ "loop": { "a": "{{b}}", "b": "{{a}}" } }"#,
    );
    let (public, private) = load_environments(&discover(dir.path())).unwrap();

    let err = resolve_with(
        &public,
        &private,
        "loop",
        &ResolveOptions::default(),
        &NoSystemVariables,
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Circular variable reference detected: a -> b -> a"
    );
}

#[test]
fn test_unknown_environment_lists_available() {
    init_test_env();
    let dir = workspace();
    let (public, private) = load_environments(&discover(dir.path())).unwrap();

    let err = resolve_with(
        &public,
        &private,
        "staging",
        &ResolveOptions::default(),
        &NoSystemVariables,
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Environment 'staging' not found. Available environments: dev, prod"
    );
}

#[test]
fn test_malformed_environment_document() {
    init_test_env();
    let dir = TempDir::new().unwrap();
    write_file(&dir, "http-client.env.json", "{ \"dev\": { \"a\": 1, } ");

    let err = load_environments(&discover(dir.path())).unwrap_err();
    assert!(matches!(err, EnvError::Parse { .. }));

    write_file(&dir, "http-client.env.json", r#"{ "dev": { "a": [1] } }"#);
    let err = load_environments(&discover(dir.path())).unwrap_err();
    assert!(matches!(err, EnvError::InvalidFormat { .. }));
}

#[test]
fn test_parse_errors_carry_positions() {
    init_test_env();
    let err = parse_file("bad.http", "GET https://a.example.com\nX-Id: {{id\n").unwrap_err();
    assert!(matches!(err, ParseError::Lex(_)));
    assert_eq!(err.line(), 2);
    assert_eq!(err.column(), 7);
}

#[test]
fn test_expand_string_leaves_unknown_references() {
    init_test_env();
    let dir = workspace();
    let (public, private) = load_environments(&discover(dir.path())).unwrap();
    let resolved = resolve_with(
        &public,
        &private,
        "prod",
        &ResolveOptions::default(),
        &NoSystemVariables,
    )
    .unwrap();

    assert_eq!(
        expand_string("{{baseUrl}}/{{missing}}", &resolved),
        "https://api.example.com/api/v2/{{missing}}"
    );
}
