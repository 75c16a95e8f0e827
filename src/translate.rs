use crate::config::{TranslationConfig, TranslationProvider};
use crate::error::TranslateError;
use crate::retry::{parse_retry_after, retry_delay, should_retry, RetryConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Turns a source-language label into the display language.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

pub fn from_config(config: &TranslationConfig) -> Result<Arc<dyn Translator>> {
    let translator: Arc<dyn Translator> = match config.provider {
        TranslationProvider::None => Arc::new(NoopTranslator),
        TranslationProvider::Glossary => Arc::new(GlossaryTranslator::new(config.glossary.clone())),
        TranslationProvider::LibreTranslate => Arc::new(LibreTranslator::new(config)?),
    };
    Ok(translator)
}

/// Returns its input unchanged.
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        Ok(text.to_string())
    }
}

/// Fixed word list; unknown words pass through.
pub struct GlossaryTranslator {
    entries: HashMap<String, String>,
}

impl GlossaryTranslator {
    pub fn new(entries: HashMap<String, String>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self { entries }
    }
}

#[async_trait]
impl Translator for GlossaryTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        Ok(self
            .entries
            .get(&text.to_lowercase())
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Client for a LibreTranslate-compatible `/translate` endpoint.
pub struct LibreTranslator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    source: String,
    target: String,
    retry: RetryConfig,
}

impl LibreTranslator {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build translation HTTP client")?;
        Ok(Self {
            client,
            url: format!("{}/translate", config.endpoint.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            source: config.source.clone(),
            target: config.target.clone(),
            retry: RetryConfig::from(config),
        })
    }
}

#[async_trait]
impl Translator for LibreTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let request = TranslateRequest {
            q: text,
            source: &self.source,
            target: &self.target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let mut attempt = 0;
        loop {
            let can_retry = attempt < self.retry.max_retries;
            let mut delay = retry_delay(attempt, &self.retry);
            match self.client.post(&self.url).json(&request).send().await {
                Ok(response) if response.status().is_success() => {
                    let body: TranslateResponse = response
                        .json()
                        .await
                        .map_err(|e| TranslateError::Malformed(e.to_string()))?;
                    debug!(text, translated = %body.translated_text, "Translated label");
                    return Ok(body.translated_text);
                }
                Ok(response) => {
                    let status = response.status();
                    if !(can_retry && should_retry(status)) {
                        let body = response.text().await.unwrap_or_default();
                        return Err(TranslateError::Http {
                            status: status.as_u16(),
                            body,
                        });
                    }
                    if let Some(wait) = parse_retry_after(response.headers()) {
                        delay = wait;
                    }
                    warn!(%status, attempt, ?delay, "Translation request failed, retrying");
                }
                Err(e) => {
                    if !can_retry {
                        return Err(TranslateError::Unavailable {
                            attempts: attempt + 1,
                            message: e.to_string(),
                        });
                    }
                    warn!(error = %e, attempt, "Translation service unreachable, retrying");
                }
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
