//! Query orchestration over the pipeline and the chat store.
//!
//! `handle_query` is the one write path: it resolves the chat, persists the
//! user message, runs the pipeline, and persists the assistant message.
//! Runs against the same chat are serialized so message order in the
//! transcript always alternates per request.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::domains::DomainRegistry;
use crate::error::{Result, StoreError, VerityError};
use crate::pipeline::Pipeline;
use crate::store::ChatStore;
use crate::types::{Chat, Message, MessageRole, QueryResult};

const TITLE_MAX_CHARS: usize = 50;

pub struct QueryService {
    store: ChatStore,
    pipeline: Pipeline,
    registry: DomainRegistry,
    chat_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl QueryService {
    pub fn new(store: ChatStore, pipeline: Pipeline, registry: DomainRegistry) -> Self {
        Self {
            store,
            pipeline,
            registry,
            chat_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    /// Answer one query, recording it in a chat transcript.
    ///
    /// The user message is persisted before the pipeline runs, so a failed
    /// run still leaves the question in the transcript. No assistant
    /// message is written on failure.
    pub async fn handle_query(
        &self,
        query: &str,
        domain: Option<&str>,
        chat_id: Option<Uuid>,
    ) -> Result<QueryResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(VerityError::InvalidQuery {
                reason: "query must not be empty".to_string(),
            });
        }

        let domain = self.registry.get(domain.unwrap_or("general"));

        let chat = match chat_id {
            Some(id) => self
                .store
                .get_chat(id)
                .await?
                .ok_or(StoreError::ChatNotFound { chat_id: id })?,
            None => {
                self.store
                    .create_chat(&derive_title(query), &domain.key)
                    .await?
            }
        };

        let lock = self.chat_lock(chat.id).await;
        let _guard = lock.lock().await;

        self.store
            .append_message(chat.id, MessageRole::User, query, None)
            .await?;

        info!(chat_id = %chat.id, domain = %domain.key, "running query");
        let mut result = self.pipeline.run(query, domain).await?;
        result.chat_id = Some(chat.id);

        self.store
            .append_message(
                chat.id,
                MessageRole::Assistant,
                &result.final_answer,
                Some(&result),
            )
            .await?;

        Ok(result)
    }

    pub async fn list_chats(&self) -> Result<Vec<Chat>> {
        Ok(self.store.list_chats().await?)
    }

    pub async fn get_chat(&self, chat_id: Uuid) -> Result<Option<Chat>> {
        Ok(self.store.get_chat(chat_id).await?)
    }

    pub async fn get_messages(&self, chat_id: Uuid) -> Result<Vec<Message>> {
        Ok(self.store.get_messages(chat_id).await?)
    }

    pub async fn delete_chat(&self, chat_id: Uuid) -> Result<()> {
        self.store.delete_chat(chat_id).await?;
        self.chat_locks.lock().await.remove(&chat_id);
        Ok(())
    }

    async fn chat_lock(&self, chat_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.chat_locks.lock().await;
        locks.entry(chat_id).or_default().clone()
    }
}

/// Chat titles come from the first query, truncated for display.
fn derive_title(query: &str) -> String {
    if query.chars().count() <= TITLE_MAX_CHARS {
        query.to_string()
    } else {
        let cut: String = query.chars().take(TITLE_MAX_CHARS).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_short_query_unchanged() {
        assert_eq!(derive_title("What is Rust?"), "What is Rust?");
    }

    #[test]
    fn test_derive_title_truncates_long_query() {
        let query = "a".repeat(80);
        let title = derive_title(&query);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_derive_title_exactly_fifty_chars() {
        let query = "b".repeat(50);
        assert_eq!(derive_title(&query), query);
    }
}
