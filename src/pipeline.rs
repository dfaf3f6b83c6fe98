//! The generate / verify / synthesize pipeline.
//!
//! One run fans out two concurrent branches: the generator answers from
//! model knowledge alone, while the verifier answers strictly from fresh
//! web search context. The synthesizer then reconciles the two into the
//! final answer. A failed model call aborts the run; a failed search
//! degrades to an empty context and the verifier still runs.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::domains::DomainConfig;
use crate::error::VerityError;
use crate::providers::{ChatModel, RoleClients};
use crate::search::WebSearch;
use crate::types::{QueryResult, SearchHit};

/// Stage transitions emitted while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    Generating,
    Searching,
    Verifying,
    Synthesizing,
    Done { elapsed_secs: f64 },
    Aborted,
}

/// Connectivity probe outcome for one component.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProbeStatus {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
}

impl ProbeStatus {
    fn ok(message: String, sample: String) -> Self {
        Self {
            status: "success".to_string(),
            message,
            sample: Some(truncate(&sample, 100)),
        }
    }

    fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            sample: None,
        }
    }
}

/// Per-component probe report for the diagnostics endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProbeReport {
    pub generator: ProbeStatus,
    pub verifier: ProbeStatus,
    pub synthesizer: ProbeStatus,
    pub search_tool: ProbeStatus,
}

pub struct Pipeline {
    generator: Arc<dyn ChatModel>,
    verifier: Arc<dyn ChatModel>,
    synthesizer: Arc<dyn ChatModel>,
    search: Arc<dyn WebSearch>,
    request_timeout: Duration,
    events: broadcast::Sender<StageEvent>,
}

impl Pipeline {
    pub fn new(clients: RoleClients, search: Arc<dyn WebSearch>, config: &PipelineConfig) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            generator: clients.generator,
            verifier: clients.verifier,
            synthesizer: clients.synthesizer,
            search,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            events,
        }
    }

    /// Subscribe to stage transitions. Events are best-effort; a lagging
    /// subscriber misses events rather than slowing the pipeline.
    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.events.subscribe()
    }

    /// Run the full pipeline for one query under the aggregate timeout.
    pub async fn run(&self, query: &str, domain: &DomainConfig) -> Result<QueryResult, VerityError> {
        let start = Instant::now();
        let result =
            tokio::time::timeout(self.request_timeout, self.run_stages(query, domain, start)).await;

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => {
                let _ = self.events.send(StageEvent::Aborted);
                Err(e)
            }
            Err(_) => {
                let _ = self.events.send(StageEvent::Aborted);
                Err(VerityError::PipelineTimeout {
                    timeout_secs: self.request_timeout.as_secs(),
                })
            }
        }
    }

    async fn run_stages(
        &self,
        query: &str,
        domain: &DomainConfig,
        start: Instant,
    ) -> Result<QueryResult, VerityError> {
        let _ = self.events.send(StageEvent::Generating);

        let generate = async {
            let answer = self
                .generator
                .complete(&domain.generator_prompt, &generator_content(query))
                .await?;
            Ok::<_, VerityError>(answer)
        };

        let verify = async {
            let _ = self.events.send(StageEvent::Searching);
            let hits = match self.search.search(query).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(error = %e, "web search failed, verifying without context");
                    Vec::new()
                }
            };
            let _ = self.events.send(StageEvent::Verifying);
            let context = format_search_results(&hits);
            let answer = self
                .verifier
                .complete(&domain.verifier_prompt, &verifier_content(&context, query))
                .await?;
            Ok::<_, VerityError>((answer, hits))
        };

        let (generator_answer, (verifier_answer, search_results)) =
            tokio::try_join!(generate, verify)?;

        let _ = self.events.send(StageEvent::Synthesizing);
        let final_answer = self
            .synthesizer
            .complete(
                &domain.synthesizer_prompt,
                &synthesis_content(query, &generator_answer, &verifier_answer),
            )
            .await?;

        let elapsed_secs = start.elapsed().as_secs_f64();
        let _ = self.events.send(StageEvent::Done { elapsed_secs });
        info!(
            domain = %domain.key,
            elapsed_secs,
            hits = search_results.len(),
            "pipeline run complete"
        );

        Ok(QueryResult {
            final_answer,
            generator_answer,
            verifier_answer,
            search_results,
            domain: domain.key.clone(),
            processing_time_seconds: elapsed_secs,
            chat_id: None,
        })
    }

    /// Probe each model and the search backend with a fixed test query.
    /// Failures are reported per component, never propagated.
    pub async fn probe(&self, domain: &DomainConfig) -> ProbeReport {
        let test_query = "What is the capital of France?";

        let generator = match self
            .generator
            .complete(&domain.generator_prompt, &generator_content(test_query))
            .await
        {
            Ok(sample) => ProbeStatus::ok(
                format!("Generator ({}) is working", self.generator.model_name()),
                sample,
            ),
            Err(e) => ProbeStatus::error(e.to_string()),
        };

        let verifier = match self
            .verifier
            .complete(
                &domain.verifier_prompt,
                &verifier_content("No search results found.", test_query),
            )
            .await
        {
            Ok(sample) => ProbeStatus::ok(
                format!("Verifier ({}) is working", self.verifier.model_name()),
                sample,
            ),
            Err(e) => ProbeStatus::error(e.to_string()),
        };

        let synthesizer = match self
            .synthesizer
            .complete(
                &domain.synthesizer_prompt,
                &synthesis_content(test_query, "Paris.", "Paris."),
            )
            .await
        {
            Ok(sample) => ProbeStatus::ok(
                format!("Synthesizer ({}) is working", self.synthesizer.model_name()),
                sample,
            ),
            Err(e) => ProbeStatus::error(e.to_string()),
        };

        let search_tool = match self.search.search(test_query).await {
            Ok(hits) if !hits.is_empty() => ProbeStatus::ok(
                "Web search is working".to_string(),
                format_search_results(&hits),
            ),
            Ok(_) => ProbeStatus::error("No search results".to_string()),
            Err(e) => ProbeStatus::error(e.to_string()),
        };

        ProbeReport {
            generator,
            verifier,
            synthesizer,
            search_tool,
        }
    }
}

/// User content for the generator stage.
fn generator_content(query: &str) -> String {
    format!("Query: {query}\n\nAnswer:")
}

/// User content for the verifier stage.
fn verifier_content(context: &str, query: &str) -> String {
    format!("Context:\n{context}\n\nQuery: {query}")
}

/// Render search hits into the numbered context block the verifier reads.
pub fn format_search_results(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No search results found.".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "Result {}:\nTitle: {}\nURL: {}\nContent: {}\n",
                i + 1,
                hit.title,
                hit.url,
                hit.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// User content for the synthesis stage, laying both answers side by side.
fn synthesis_content(query: &str, generator_answer: &str, verifier_answer: &str) -> String {
    format!(
        "Original Query: {query}\n\
         \n\
         ---\n\
         \n\
         Generator Model (creative but potentially unreliable):\n\
         {generator_answer}\n\
         \n\
         ---\n\
         \n\
         Verifier Model (grounded in web search results):\n\
         {verifier_answer}\n\
         \n\
         ---\n\
         \n\
         INSTRUCTIONS:\n\
         1.  Carefully compare the 'Generator Model' answer against the 'Verifier Model' answer.\n\
         2.  Identify any statements in the 'Generator Model' answer that are not supported by the facts in the 'Verifier Model' answer.\n\
         3.  Synthesize a final, comprehensive answer that corrects any inaccuracies or hallucinations from the 'Generator Model' using the factual information from the 'Verifier Model'.\n\
         4.  If the 'Verifier Model' provides more relevant or up-to-date information, prioritize it.\n\
         5.  **FORMATTING:** Use Markdown to make the answer highly readable.\n\
         \x20   -   Use **bold** for key terms.\n\
         \x20   -   Use bullet points or numbered lists for steps or lists.\n\
         \x20   -   Use `#` Headers to organize sections.\n\
         6.  Present only the final, synthesized answer. Do not explain your reasoning process unless the query asks for it.\n\
         \n\
         Final Corrected Answer:"
    )
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
