//! Resilient LLM call path: bounded retry with exponential backoff.
//!
//! Every attempt, backoff delay, success, and final failure is traced with
//! component `ResilientLLMService`. The original error never crosses into
//! a user-visible payload; it is classified into a sanitized message and
//! kept only in trace details, length-capped.

use crate::factory::ProviderFactory;
use crate::types::{LLMError, OrchestrationRequest, OrchestrationResponse};
use conductor_core::{AgentConfig, Tracer};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const COMPONENT: &str = "ResilientLLMService";
const MAX_TRACED_ERROR_LEN: usize = 200;

/// Raised once retries are exhausted. `message` is safe to show a user;
/// the classified source stays internal.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AgentExecutionError {
    pub message: String,
    pub attempts: u32,
    #[source]
    pub source: Option<LLMError>,
}

/// Retrying wrapper over [`ProviderFactory`]-resolved providers.
pub struct ResilientLlmService {
    factory: Arc<ProviderFactory>,
}

impl ResilientLlmService {
    pub fn new(factory: Arc<ProviderFactory>) -> Self {
        Self { factory }
    }

    /// Run one orchestration completion with retry and backoff.
    ///
    /// Attempt `k` sleeps `delay_base · 2^(k−1)` before attempt `k+1`.
    pub async fn orchestration_completion(
        &self,
        config: &AgentConfig,
        request: &OrchestrationRequest,
        tracer: Option<&Tracer>,
    ) -> Result<OrchestrationResponse, AgentExecutionError> {
        let retry = &config.retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut last_error: Option<LLMError> = None;

        for attempt in 1..=max_attempts {
            if let Some(tracer) = tracer {
                tracer
                    .log_step(
                        COMPONENT,
                        "retry_attempt_start",
                        details(&[
                            ("attempt", json!(attempt)),
                            ("max_attempts", json!(max_attempts)),
                            ("provider", json!(config.provider.as_str())),
                        ]),
                    )
                    .await;
            }

            let outcome = match self.factory.provider_for(config.provider) {
                Ok(provider) => provider.orchestration_completion(request).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(response) => {
                    if let Some(tracer) = tracer {
                        let mut success_details = details(&[
                            ("attempt", json!(attempt)),
                            ("provider", json!(response.provider)),
                            ("model", json!(response.model)),
                            ("response_length", json!(response.content.chars().count())),
                        ]);
                        // Token counts feed the consumption series.
                        for key in ["prompt_tokens", "completion_tokens"] {
                            if let Some(value) = response.usage.get(key) {
                                success_details.insert(key.to_string(), value.clone());
                            }
                        }
                        tracer
                            .log_step(COMPONENT, "llm_call_success", success_details)
                            .await;
                    }
                    info!(provider = config.provider.as_str(), attempt, "LLM call succeeded");
                    return Ok(response);
                }
                Err(error) => {
                    warn!(
                        provider = config.provider.as_str(),
                        attempt, max_attempts, "LLM attempt failed: {error}"
                    );
                    if let Some(tracer) = tracer {
                        tracer
                            .log_step(
                                COMPONENT,
                                "retry_attempt_failed",
                                details(&[
                                    ("attempt", json!(attempt)),
                                    ("error_type", json!(error.error_type())),
                                    ("error_message", json!(truncate(&error.to_string()))),
                                ]),
                            )
                            .await;
                    }
                    last_error = Some(error);

                    if attempt >= max_attempts {
                        break;
                    }

                    let delay = retry.delay_after(attempt);
                    if let Some(tracer) = tracer {
                        tracer
                            .log_step(
                                COMPONENT,
                                "retry_backoff_delay",
                                details(&[
                                    ("delay_seconds", json!(delay.as_secs_f64())),
                                    ("attempt", json!(attempt)),
                                    (
                                        "backoff_formula",
                                        json!(format!(
                                            "{} * (2 ^ {})",
                                            retry.delay_base,
                                            attempt - 1
                                        )),
                                    ),
                                ]),
                            )
                            .await;
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }

        let message = safe_error_message(last_error.as_ref(), max_attempts);
        if let Some(tracer) = tracer {
            tracer
                .log_step(
                    COMPONENT,
                    "max_retries_exceeded",
                    details(&[
                        ("max_attempts", json!(max_attempts)),
                        (
                            "final_error_type",
                            json!(last_error
                                .as_ref()
                                .map(LLMError::error_type)
                                .unwrap_or("Unknown")),
                        ),
                        ("safe_error_message", json!(message)),
                    ]),
                )
                .await;
        }
        warn!(
            provider = config.provider.as_str(),
            max_attempts, "LLM call failed permanently"
        );

        Err(AgentExecutionError {
            message,
            attempts: max_attempts,
            source: last_error,
        })
    }
}

/// Map the classified error to its sanitized user message, suffixed with
/// the attempt count.
fn safe_error_message(error: Option<&LLMError>, attempts: u32) -> String {
    match error {
        Some(error) => format!("{} (after {attempts} attempts)", error.safe_message()),
        None => format!("LLM service unavailable (after {attempts} attempts)"),
    }
}

fn truncate(message: &str) -> String {
    message.chars().take(MAX_TRACED_ERROR_LEN).collect()
}

fn details(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}
