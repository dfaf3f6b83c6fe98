//! End-to-end API tests against the in-process router with stubbed models
//! and search.

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

use verity::api::{AppState, KeyStatus, router};
use verity::config::PipelineConfig;
use verity::domains::DomainRegistry;
use verity::error::{ProviderError, ProviderErrorKind, SearchError};
use verity::pipeline::Pipeline;
use verity::providers::{ChatModel, ModelRole, RoleClients};
use verity::search::WebSearch;
use verity::service::QueryService;
use verity::store::ChatStore;
use verity::types::SearchHit;

struct StubModel {
    role: ModelRole,
    reply: Result<String, String>,
    calls: Arc<AtomicUsize>,
}

impl StubModel {
    fn ok(role: ModelRole, reply: &str) -> Self {
        Self {
            role,
            reply: Ok(reply.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing(role: ModelRole, message: &str) -> Self {
        Self {
            role,
            reply: Err(message.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ChatModel for StubModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(ProviderError::new(
                self.role,
                ProviderErrorKind::ApiRequest {
                    message: message.clone(),
                },
            )),
        }
    }

    fn role(&self) -> ModelRole {
        self.role
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

struct StubSearch {
    hits: Result<Vec<SearchHit>, String>,
}

#[async_trait]
impl WebSearch for StubSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, SearchError> {
        match &self.hits {
            Ok(hits) => Ok(hits.clone()),
            Err(message) => Err(SearchError::ApiRequest {
                message: message.clone(),
            }),
        }
    }
}

fn france_hit() -> SearchHit {
    SearchHit {
        title: "France".to_string(),
        url: "https://en.wikipedia.org/wiki/France".to_string(),
        content: "Paris is the capital and largest city of France.".to_string(),
    }
}

fn build_app(
    generator: StubModel,
    verifier: StubModel,
    synthesizer: StubModel,
    search: StubSearch,
) -> Router {
    let clients = RoleClients {
        generator: Arc::new(generator),
        verifier: Arc::new(verifier),
        synthesizer: Arc::new(synthesizer),
    };
    let pipeline = Pipeline::new(
        clients,
        Arc::new(search),
        &PipelineConfig {
            request_timeout_secs: 30,
        },
    );
    let store = ChatStore::open_in_memory().unwrap();
    let service = QueryService::new(store, pipeline, DomainRegistry::builtin());
    let state = Arc::new(AppState {
        service,
        key_status: KeyStatus {
            tavily: false,
            openrouter_1: true,
            openrouter_2: true,
            openrouter_3: true,
        },
    });
    router(state, &["http://localhost:3000".to_string()])
}

fn happy_path_app() -> Router {
    build_app(
        StubModel::ok(ModelRole::Generator, "Paris, I believe."),
        StubModel::ok(ModelRole::Verifier, "The context confirms Paris."),
        StubModel::ok(ModelRole::Synthesizer, "Paris is the capital of France."),
        StubSearch {
            hits: Ok(vec![france_hit()]),
        },
    )
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_query_end_to_end() {
    let app = happy_path_app();

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/query",
        Some(json!({"query": "What is the capital of France?"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["final_answer"], "Paris is the capital of France.");
    assert_eq!(body["generator_answer"], "Paris, I believe.");
    assert_eq!(body["verifier_answer"], "The context confirms Paris.");
    assert_eq!(body["search_results"].as_array().unwrap().len(), 1);
    assert_eq!(body["domain"], "general");
    assert!(body["processing_time"].as_f64().unwrap() >= 0.0);
    let chat_id = body["chat_id"].as_str().unwrap().to_string();

    // The chat now exists with a title derived from the query.
    let (status, chats) = send_json(&app, "GET", "/api/chats", None).await;
    assert_eq!(status, StatusCode::OK);
    let chats = chats.as_array().unwrap().clone();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["id"], chat_id.as_str());
    assert_eq!(chats[0]["title"], "What is the capital of France?");

    // Transcript holds the user message then the assistant message.
    let (status, messages) =
        send_json(&app, "GET", &format!("/api/chats/{chat_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = messages.as_array().unwrap().clone();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "What is the capital of France?");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Paris is the capital of France.");
    assert_eq!(
        messages[1]["metadata"]["final_answer"],
        "Paris is the capital of France."
    );
}

#[tokio::test]
async fn test_query_follow_up_in_same_chat() {
    let app = happy_path_app();

    let (_, first) = send_json(
        &app,
        "POST",
        "/api/query",
        Some(json!({"query": "What is the capital of France?"})),
    )
    .await;
    let chat_id = first["chat_id"].as_str().unwrap().to_string();

    let (status, second) = send_json(
        &app,
        "POST",
        "/api/query",
        Some(json!({"query": "And its population?", "chat_id": chat_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["chat_id"], chat_id.as_str());

    let (_, chats) = send_json(&app, "GET", "/api/chats", None).await;
    assert_eq!(chats.as_array().unwrap().len(), 1);

    let (_, messages) = send_json(&app, "GET", &format!("/api/chats/{chat_id}"), None).await;
    assert_eq!(messages.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_empty_query_rejected_without_model_calls() {
    let generator = StubModel::ok(ModelRole::Generator, "gen");
    let generator_calls = generator.calls.clone();
    let app = build_app(
        generator,
        StubModel::ok(ModelRole::Verifier, "ver"),
        StubModel::ok(ModelRole::Synthesizer, "final"),
        StubSearch { hits: Ok(vec![]) },
    );

    let (status, body) =
        send_json(&app, "POST", "/api/query", Some(json!({"query": "   "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("empty"));
    assert_eq!(generator_calls.load(Ordering::SeqCst), 0);

    // Nothing was persisted.
    let (_, chats) = send_json(&app, "GET", "/api/chats", None).await;
    assert!(chats.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_failure_degrades_to_empty_results() {
    let app = build_app(
        StubModel::ok(ModelRole::Generator, "gen answer"),
        StubModel::ok(
            ModelRole::Verifier,
            "I cannot answer based on the information provided.",
        ),
        StubModel::ok(ModelRole::Synthesizer, "final answer"),
        StubSearch {
            hits: Err("connection refused".to_string()),
        },
    );

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/query",
        Some(json!({"query": "anything recent?"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["search_results"], json!([]));
    assert_eq!(
        body["verifier_answer"],
        "I cannot answer based on the information provided."
    );
    assert_eq!(body["final_answer"], "final answer");
}

#[tokio::test]
async fn test_generator_failure_returns_502_and_keeps_user_message() {
    let app = build_app(
        StubModel::failing(ModelRole::Generator, "upstream down"),
        StubModel::ok(ModelRole::Verifier, "ver"),
        StubModel::ok(ModelRole::Synthesizer, "final"),
        StubSearch { hits: Ok(vec![]) },
    );

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/query",
        Some(json!({"query": "doomed question"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("generator"));

    // The chat and the user message survive; no assistant message is stored.
    let (_, chats) = send_json(&app, "GET", "/api/chats", None).await;
    let chats = chats.as_array().unwrap().clone();
    assert_eq!(chats.len(), 1);
    let chat_id = chats[0]["id"].as_str().unwrap();

    let (_, messages) = send_json(&app, "GET", &format!("/api/chats/{chat_id}"), None).await;
    let messages = messages.as_array().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "doomed question");
}

#[tokio::test]
async fn test_unknown_chat_id_is_404() {
    let app = happy_path_app();

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/query",
        Some(json!({
            "query": "hello",
            "chat_id": "00000000-0000-0000-0000-000000000001"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("chat"));
}

#[tokio::test]
async fn test_verbose_false_omits_intermediate_fields() {
    let app = happy_path_app();

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/query",
        Some(json!({"query": "What is the capital of France?", "verbose": false})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["final_answer"], "Paris is the capital of France.");
    assert!(body.get("generator_answer").is_none());
    assert!(body.get("verifier_answer").is_none());
    assert!(body.get("search_results").is_none());

    // The stored transcript still carries the full metadata.
    let chat_id = body["chat_id"].as_str().unwrap();
    let (_, messages) = send_json(&app, "GET", &format!("/api/chats/{chat_id}"), None).await;
    let messages = messages.as_array().unwrap().clone();
    assert_eq!(
        messages[1]["metadata"]["search_results"]
            .as_array()
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_delete_chat_is_idempotent() {
    let app = happy_path_app();

    let (_, body) = send_json(
        &app,
        "POST",
        "/api/query",
        Some(json!({"query": "delete me"})),
    )
    .await;
    let chat_id = body["chat_id"].as_str().unwrap().to_string();

    let (status, _) = send_json(&app, "DELETE", &format!("/api/chats/{chat_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(&app, "DELETE", &format!("/api/chats/{chat_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, messages) =
        send_json(&app, "GET", &format!("/api/chats/{chat_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(messages.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_long_query_truncated_into_title() {
    let app = happy_path_app();
    let query = "q".repeat(80);

    let (_, body) = send_json(&app, "POST", "/api/query", Some(json!({"query": query}))).await;
    let chat_id = body["chat_id"].as_str().unwrap();

    let (_, chats) = send_json(&app, "GET", "/api/chats", None).await;
    let chats = chats.as_array().unwrap().clone();
    assert_eq!(chats[0]["id"], chat_id);
    let title = chats[0]["title"].as_str().unwrap();
    assert_eq!(title.chars().count(), 53);
    assert!(title.ends_with("..."));
}

#[tokio::test]
async fn test_unknown_domain_falls_back_to_general() {
    let app = happy_path_app();

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/query",
        Some(json!({"query": "hi", "domain": "astrology"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["domain"], "general");
}

#[tokio::test]
async fn test_domains_endpoint_lists_builtins() {
    let app = happy_path_app();

    let (status, body) = send_json(&app, "GET", "/api/domains", None).await;
    assert_eq!(status, StatusCode::OK);
    let domains = body["domains"].as_object().unwrap();
    assert_eq!(domains.len(), 6);
    assert_eq!(domains["medical"]["name"], "Medical Assistant");
    assert_eq!(domains["general"]["icon"], "brain");
    // Prompts are internal, never exposed over the wire.
    assert!(domains["medical"].get("verifier_prompt").is_none());
}

#[tokio::test]
async fn test_example_queries_endpoint() {
    let app = happy_path_app();

    let (status, body) = send_json(&app, "GET", "/api/example-queries", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queries"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = happy_path_app();

    let (status, body) = send_json(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["api_keys_configured"]["tavily"], false);
    assert_eq!(body["api_keys_configured"]["openrouter_1"], true);
}

#[tokio::test]
async fn test_test_models_endpoint_reports_components() {
    let app = build_app(
        StubModel::ok(ModelRole::Generator, "Paris."),
        StubModel::failing(ModelRole::Verifier, "down"),
        StubModel::ok(ModelRole::Synthesizer, "Paris."),
        StubSearch {
            hits: Ok(vec![france_hit()]),
        },
    );

    let (status, body) = send_json(&app, "GET", "/api/test-models", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generator"]["status"], "success");
    assert_eq!(body["verifier"]["status"], "error");
    assert_eq!(body["search_tool"]["status"], "success");
}

#[tokio::test]
async fn test_concurrent_queries_same_chat_do_not_interleave() {
    let app = happy_path_app();

    let (_, first) = send_json(
        &app,
        "POST",
        "/api/query",
        Some(json!({"query": "seed"})),
    )
    .await;
    let chat_id = first["chat_id"].as_str().unwrap().to_string();

    let (a, b) = tokio::join!(
        send_json(
            &app,
            "POST",
            "/api/query",
            Some(json!({"query": "first follow-up", "chat_id": chat_id})),
        ),
        send_json(
            &app,
            "POST",
            "/api/query",
            Some(json!({"query": "second follow-up", "chat_id": chat_id})),
        ),
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);

    let (_, messages) = send_json(&app, "GET", &format!("/api/chats/{chat_id}"), None).await;
    let messages = messages.as_array().unwrap().clone();
    assert_eq!(messages.len(), 6);
    // Each request's user message is immediately followed by its answer.
    for pair in messages.chunks(2) {
        assert_eq!(pair[0]["role"], "user");
        assert_eq!(pair[1]["role"], "assistant");
    }
}
