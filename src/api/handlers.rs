//! Request handlers and wire DTOs.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;
use crate::error::VerityError;
use crate::pipeline::ProbeReport;
use crate::types::{Chat, Message, SearchHit};

fn default_verbose() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub domain: Option<String>,
    pub chat_id: Option<Uuid>,
    #[serde(default = "default_verbose")]
    pub verbose: bool,
}

/// Wire shape of a successful query. The intermediate answers and search
/// hits are omitted (not just nulled) when the client asks for a terse
/// response.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier_answer: Option<String>,
    pub final_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<SearchHit>>,
    pub domain: String,
    pub processing_time: f64,
    pub timestamp: String,
    pub chat_id: Uuid,
}

pub async fn post_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, VerityError> {
    let result = state
        .service
        .handle_query(&request.query, request.domain.as_deref(), request.chat_id)
        .await?;

    let chat_id = result.chat_id.ok_or_else(|| VerityError::InvalidQuery {
        reason: "query result missing chat id".to_string(),
    })?;

    let response = QueryResponse {
        query: request.query.trim().to_string(),
        generator_answer: request.verbose.then_some(result.generator_answer),
        verifier_answer: request.verbose.then_some(result.verifier_answer),
        final_answer: result.final_answer,
        search_results: request.verbose.then_some(result.search_results),
        domain: result.domain,
        processing_time: result.processing_time_seconds,
        timestamp: Utc::now().to_rfc3339(),
        chat_id,
    };
    Ok(Json(response))
}

pub async fn list_chats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Chat>>, VerityError> {
    Ok(Json(state.service.list_chats().await?))
}

pub async fn get_chat_messages(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, VerityError> {
    Ok(Json(state.service.get_messages(chat_id).await?))
}

pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<Uuid>,
) -> Result<StatusCode, VerityError> {
    state.service.delete_chat(chat_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_domains(State(state): State<Arc<AppState>>) -> Response {
    let domains: serde_json::Map<String, serde_json::Value> = state
        .service
        .registry()
        .list()
        .iter()
        .map(|d| {
            (
                d.key.clone(),
                json!({
                    "name": d.name,
                    "description": d.description,
                    "icon": d.icon,
                }),
            )
        })
        .collect();
    Json(json!({ "domains": domains })).into_response()
}

pub async fn example_queries() -> Response {
    Json(json!({
        "queries": [
            "What were the key outcomes of the 2024 Nobel Prize announcements?",
            "What is the current status of the James Webb Space Telescope's latest discoveries?",
            "Explain the latest breakthroughs in quantum computing from 2024",
            "What are the most recent updates to Python 3.13 released in 2024?",
            "Who won the Formula 1 World Championship in 2024?",
            "Compare F1 standings 2024 and 2023",
            "What are the latest developments in AI safety research?",
            "Summarize the recent climate change reports from 2024",
        ]
    }))
    .into_response()
}

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({
        "status": "healthy",
        "api_keys_configured": state.key_status,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

pub async fn test_models(State(state): State<Arc<AppState>>) -> Json<ProbeReport> {
    let registry = state.service.registry();
    let report = state.service.pipeline().probe(registry.get("general")).await;
    Json(report)
}
