//! Automatic history summarization.
//!
//! Long conversations are compressed into a single assistant-visible
//! summary message once a session crosses its configured thresholds,
//! preserving the most recent user message so the next turn still has its
//! immediate prompt. Any failure leaves the session untouched; the
//! orchestrator continues on the uncompressed history.

use conductor_core::{
    AgentConfig, ChatMessage, Role, Session, SessionStore, Tracer,
};
use conductor_llm::factory::ProviderFactory;
use conductor_llm::types::{LLMError, OrchestrationRequest};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix of every generated summary message.
pub const SUMMARY_PREFIX: &str = "[AUTOMATIC SUMMARY] ";

const COMPONENT: &str = "HistorySummarizer";

#[derive(Debug, thiserror::Error)]
enum SummarizeFailure {
    #[error("summarization LLM returned no content")]
    EmptySummary,
    #[error(transparent)]
    Llm(#[from] LLMError),
    #[error("summary content rejected: {0}")]
    Content(#[from] conductor_core::ContentError),
}

pub struct HistorySummarizer {
    factory: Arc<ProviderFactory>,
    store: Arc<dyn SessionStore>,
}

impl HistorySummarizer {
    pub fn new(factory: Arc<ProviderFactory>, store: Arc<dyn SessionStore>) -> Self {
        Self { factory, store }
    }

    /// Compress the session history if its thresholds are exceeded.
    ///
    /// On success the persisted history is
    /// `[summary message, last user message]` (the user message is absent
    /// when the history holds none) and `updated_at` is bumped. On any
    /// failure the session is left exactly as it was.
    pub async fn summarize_if_needed(&self, session_id: Uuid, tracer: Option<&Tracer>) {
        let session = match self.store.get(session_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!(%session_id, "summarizer could not load session: {e}");
                return;
            }
        };

        if !session.history_config.enabled || !session.should_summarize() {
            debug!(%session_id, "summarization thresholds not reached");
            return;
        }

        let metrics = session.metrics();
        info!(%session_id, messages = metrics.messages, "summarization triggered");
        if let Some(tracer) = tracer {
            tracer
                .log_summarization_trigger("threshold_reached", metrics)
                .await;
        }

        match self.compress(&session).await {
            Ok(summary_message) => {
                let summary_length = summary_message.char_count();
                // Reload right before the swap so trace steps appended by
                // the tracer in the meantime are not lost.
                let mut latest = match self.store.get(session_id).await {
                    Ok(latest) => latest,
                    Err(e) => {
                        warn!(%session_id, "summarizer lost the session mid-flight: {e}");
                        return;
                    }
                };

                let last_user_message = latest
                    .history
                    .iter()
                    .rev()
                    .find(|msg| msg.role == Role::User)
                    .cloned();

                let mut new_history = vec![summary_message];
                new_history.extend(last_user_message);
                latest.history = new_history;
                latest.updated_at = chrono::Utc::now();

                if let Err(e) = self.store.save(&mut latest).await {
                    warn!(%session_id, "summarized session not persisted: {e}");
                    if let Some(tracer) = tracer {
                        self.trace_failure(tracer, &e.to_string()).await;
                    }
                    return;
                }

                info!(
                    %session_id,
                    from = metrics.messages,
                    to = latest.history.len(),
                    "history compressed"
                );
                if let Some(tracer) = tracer {
                    tracer
                        .log_summarization_complete(summary_length, metrics.messages)
                        .await;
                }
            }
            Err(e) => {
                warn!(%session_id, "summarization failed, session unchanged: {e}");
                if let Some(tracer) = tracer {
                    self.trace_failure(tracer, &e.to_string()).await;
                }
            }
        }
    }

    async fn trace_failure(&self, tracer: &Tracer, message: &str) {
        tracer
            .log_step(
                COMPONENT,
                "summarization_error",
                [("error_message".to_string(), json!(message))]
                    .into_iter()
                    .collect(),
            )
            .await;
    }

    /// Produce the summary message via the dedicated summarization agent.
    async fn compress(&self, session: &Session) -> Result<ChatMessage, SummarizeFailure> {
        let history_config = &session.history_config;
        let provider = self.factory.provider_for(history_config.provider)?;

        let history_text = render_history(&session.history);
        let messages = vec![
            ChatMessage::system(history_config.system_prompt.clone())?,
            ChatMessage::user(format!(
                "Conversation history to summarize:\n\n{history_text}\n\n\
                 Produce a concise summary that preserves the essential \
                 context for the rest of the conversation."
            ))?,
        ];

        // The summarization agent runs cool and short, with tools off.
        // Its system prompt is the HistoryConfig's, by construction.
        let config = AgentConfig {
            provider: history_config.provider,
            model_version: history_config.model_version.clone(),
            system_prompt: history_config.system_prompt.clone(),
            ..AgentConfig::default()
        }
        .with_temperature(0.3)
        .with_max_tokens(1000)
        .without_tools();

        let request = OrchestrationRequest::new(config, messages, Vec::new());
        let response = provider.orchestration_completion(&request).await?;

        if response.content.trim().is_empty() {
            return Err(SummarizeFailure::EmptySummary);
        }

        Ok(ChatMessage::assistant(format!(
            "{SUMMARY_PREFIX}{}",
            response.content
        ))?)
    }
}

/// Render the history as a numbered, role-prefixed plaintext block.
fn render_history(history: &[ChatMessage]) -> String {
    if history.is_empty() {
        return "No history available.".to_string();
    }
    history
        .iter()
        .enumerate()
        .map(|(index, msg)| {
            let content = if msg.content.is_empty() {
                "[empty]"
            } else {
                msg.content.as_str()
            };
            format!("{}. {}: {content}", index + 1, msg.role.as_str().to_uppercase())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
