//! End-to-end tests: context, query builder and cursors over HTTP.

use chrono::{TimeZone, Utc};
use graphq_core::{CursorState, Error, TransportErrorKind, UnixDateTime};
use graphq_net::{DecodeOptions, GraphContext, QueryBuilder, QuerySignature};
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct User {
    id: u32,
    name: String,
    role: Role,
    created_at: UnixDateTime,
}

#[derive(Debug, Deserialize, PartialEq)]
enum Role {
    Admin,
    ReadOnly,
}

fn users_signature() -> QuerySignature {
    QuerySignature::new("users")
        .param("first", "Int")
        .param("role", "Role")
}

/// Run blocking client code off the runtime thread.
async fn blocking<R: Send + 'static>(f: impl FnOnce() -> R + Send + 'static) -> R {
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task panicked")
}

#[tokio::test]
async fn test_collection_query_end_to_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({"variables": {"first": 2}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "result": [
                    {"id": 1, "name": "Ada", "role": "ADMIN", "createdAt": 0},
                    {"id": 2, "name": "Brian", "role": "READ_ONLY", "createdAt": "1700000000"}
                ]
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/graphql", mock_server.uri());
    let users = blocking(move || {
        let context = GraphContext::builder(url).bearer_auth("secret").build()?;
        let signature = users_signature();
        let query = QueryBuilder::new(&signature)
            .arguments(signature.bind([json!(2)])?)
            .fields(["id", "name", "role", "createdAt"])
            .build();
        context.collection_query::<User>(query).to_vec()
    })
    .await
    .unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(users[0].name, "Ada");
    assert_eq!(users[0].role, Role::Admin);
    assert_eq!(users[0].created_at.0, Utc.timestamp_opt(0, 0).unwrap());
    assert_eq!(users[1].role, Role::ReadOnly);
    assert_eq!(users[1].created_at.timestamp(), 1_700_000_000);
}

#[tokio::test]
async fn test_item_query_returns_single_object() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"result": {"id": 7, "name": "Grace", "role": "ADMIN", "createdAt": 100}}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = mock_server.uri();
    let user = blocking(move || {
        let context = GraphContext::new(url)?;
        let signature = QuerySignature::new("user").param("id", "ID!");
        let query = QueryBuilder::new(&signature)
            .arguments(signature.bind([json!("7")])?)
            .fields(["id", "name", "role", "createdAt"])
            .build();
        context.item_query::<User>(query).fetch()
    })
    .await
    .unwrap();

    assert_eq!(user.id, 7);
    assert_eq!(
        user.created_at.0,
        Utc.with_ymd_and_hms(1970, 1, 1, 0, 1, 40).unwrap()
    );
}

#[tokio::test]
async fn test_item_query_with_empty_result_is_protocol_violation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"result": []}})))
        .mount(&mock_server)
        .await;

    let url = mock_server.uri();
    let err = blocking(move || {
        let context = GraphContext::new(url)?;
        let query = QueryBuilder::new(&QuerySignature::new("viewer")).field("id").build();
        context.item_query::<serde_json::Value>(query).fetch()
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::ProtocolViolation(_)));
}

#[tokio::test]
async fn test_error_envelope_with_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [
                {"message": "Unknown argument \"frist\"", "locations": [{"line": 1, "column": 20}]}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = mock_server.uri();
    let err = blocking(move || {
        let context = GraphContext::new(url)?;
        let query = QueryBuilder::new(&users_signature()).field("id").build();
        context.collection_query::<serde_json::Value>(query).to_vec()
    })
    .await
    .unwrap_err();

    let errors = err.execution_errors().expect("execution error");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Unknown argument \"frist\"");
    assert_eq!(errors[0].locations[0].line, 1);
    match err {
        Error::Execution { query, .. } => assert!(query.starts_with("query users")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_html_error_page_stays_transport_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&mock_server)
        .await;

    let url = mock_server.uri();
    let err = blocking(move || {
        let context = GraphContext::new(url)?;
        let query = QueryBuilder::new(&QuerySignature::new("viewer")).field("id").build();
        context.collection_query::<serde_json::Value>(query).to_vec()
    })
    .await
    .unwrap_err();

    match err {
        Error::Transport(transport) => {
            assert_eq!(transport.kind(), TransportErrorKind::Status);
            assert_eq!(transport.http_status(), Some(502));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_each_cursor_runs_its_own_exchange() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"result": [1, 2, 3]}})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let url = mock_server.uri();
    let (first, second, untouched) = blocking(move || -> graphq_net::Result<_> {
        let context = GraphContext::new(url)?;
        let signature = QuerySignature::new("ids");
        let ids = context.collection_query::<u32>(QueryBuilder::new(&signature).build());

        let first: Vec<u32> = ids.select(|n| n * 2).collect::<Result<_, _>>()?;
        let second = ids.to_vec()?;

        // Never advanced, so never sent.
        let mut idle = ids.cursor();
        idle.dispose();
        Ok((first, second, idle.state()))
    })
    .await
    .unwrap();

    assert_eq!(first, vec![2, 4, 6]);
    assert_eq!(second, vec![1, 2, 3]);
    assert_eq!(untouched, CursorState::Exhausted);
}

#[tokio::test]
async fn test_ordinal_enums_when_strings_disabled() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"result": [1, 0]}})))
        .mount(&mock_server)
        .await;

    let url = mock_server.uri();
    let roles = blocking(move || {
        let context = GraphContext::builder(url)
            .decode_options(DecodeOptions::new().enum_as_string(false))
            .build()?;
        let query = QueryBuilder::new(&QuerySignature::new("roles")).build();
        context.collection_query::<Role>(query).to_vec()
    })
    .await
    .unwrap();

    assert_eq!(roles, vec![Role::ReadOnly, Role::Admin]);
}
