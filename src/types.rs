//! Core data types: chats, messages, search hits, and pipeline results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    /// Unique chat identifier.
    pub id: Uuid,
    /// Title derived from the first query, fixed thereafter.
    pub title: String,
    /// Domain key the chat was opened under.
    pub domain: String,
    /// When the chat was created.
    pub created_at: DateTime<Utc>,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

/// A single message in a chat transcript. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Full pipeline result for assistant messages, absent for user messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<QueryResult>,
    pub timestamp: DateTime<Utc>,
}

/// A single web search hit used as grounding context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// The complete output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// The synthesized, reconciled answer.
    pub final_answer: String,
    /// The ungrounded first-pass answer.
    pub generator_answer: String,
    /// The search-grounded answer.
    pub verifier_answer: String,
    /// Search hits the verifier was shown. Empty when search failed or
    /// returned nothing.
    pub search_results: Vec<SearchHit>,
    /// Domain key the prompts were drawn from.
    pub domain: String,
    /// Cumulative wall-clock time for the run.
    pub processing_time_seconds: f64,
    /// Owning chat, filled in by the query service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_role_roundtrip() {
        assert_eq!("user".parse::<MessageRole>().unwrap(), MessageRole::User);
        assert_eq!(
            "assistant".parse::<MessageRole>().unwrap(),
            MessageRole::Assistant
        );
        assert!("system".parse::<MessageRole>().is_err());
        assert_eq!(MessageRole::User.as_str(), "user");
    }

    #[test]
    fn test_message_role_serde_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_query_result_serialization_roundtrip() {
        let result = QueryResult {
            final_answer: "Paris is the capital of France.".into(),
            generator_answer: "Paris is the capital.".into(),
            verifier_answer: "Paris, confirmed by source.".into(),
            search_results: vec![SearchHit {
                title: "Paris – Capital of France".into(),
                url: "https://example.com/paris".into(),
                content: "Paris is the capital and largest city of France.".into(),
            }],
            domain: "general".into(),
            processing_time_seconds: 1.25,
            chat_id: Some(Uuid::new_v4()),
        };
        let json = serde_json::to_string(&result).unwrap();
        let restored: QueryResult = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, result);
    }

    #[test]
    fn test_query_result_chat_id_omitted_when_none() {
        let result = QueryResult {
            final_answer: "x".into(),
            generator_answer: "y".into(),
            verifier_answer: "z".into(),
            search_results: vec![],
            domain: "general".into(),
            processing_time_seconds: 0.0,
            chat_id: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("chat_id"));
    }
}
