//! YandexGPT foundation-models completion provider.
//!
//! One stateless request per question: a fixed system prompt plus the
//! user's text. Docs: <https://yandex.cloud/docs/foundation-models/>

use async_trait::async_trait;
use evrika_core::{config::YandexGptConfig, error::EvrikaError, traits::Provider};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Persona and content rules sent with every question.
pub const SYSTEM_PROMPT: &str = "Вы — дружелюбный и понимающий помощник для обучающихся. \
Отвечай только на вопросы. Не предлагай ничего своего. \
Не приветствуй пользователя. \
Тебя зовут Эврика. \
Не начинай свой ответ с приветствия и со своего имени. \
Объясняйте темы простым и понятным языком для детей от 6 до 15 лет. \
Используй мотивирующий тон, чтобы ученику было интересно и весело. \
Используйте примеры из повседневной жизни, чтобы сделать сложные концепции более доступными и наглядными. \
Поддерживайте позитивный тон и иногда добавляйте эмодзи, чтобы сделать общение веселым. \
Не отвечай на темы секса, сексуальные темы, порнографию, наркотики, экстремизм, терроризм. Вежливо отказывай.";

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 2000;

/// YandexGPT provider.
pub struct YandexGptProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model_uri: String,
    timeout: Duration,
}

impl YandexGptProvider {
    /// Create from config values.
    pub fn from_config(config: &YandexGptConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model_uri: config.model_uri(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn build_request(&self, question: &str) -> CompletionRequest {
        CompletionRequest {
            model_uri: self.model_uri.clone(),
            completion_options: CompletionOptions {
                stream: false,
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
            },
            messages: vec![
                Message {
                    role: "system".to_string(),
                    text: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    text: question.to_string(),
                },
            ],
        }
    }

    async fn send_request(&self, body: &CompletionRequest) -> Result<String, EvrikaError> {
        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| EvrikaError::Provider(format!("yandexgpt request failed: {e}")))?;

        if resp.status() != reqwest::StatusCode::OK {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(EvrikaError::Provider(format!(
                "yandexgpt returned {status}: {text}"
            )));
        }

        let parsed: CompletionResponse = resp.json().await.map_err(|e| {
            EvrikaError::Provider(format!("yandexgpt: failed to parse response: {e}"))
        })?;

        extract_text(parsed)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest {
    model_uri: String,
    completion_options: CompletionOptions,
    messages: Vec<Message>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    text: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    result: Option<CompletionResult>,
}

#[derive(Deserialize)]
struct CompletionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Deserialize)]
struct Alternative {
    message: Option<Message>,
}

/// Text of the first alternative, or a shape error.
fn extract_text(parsed: CompletionResponse) -> Result<String, EvrikaError> {
    parsed
        .result
        .and_then(|r| r.alternatives.into_iter().next())
        .and_then(|a| a.message)
        .map(|m| m.text)
        .ok_or_else(|| {
            EvrikaError::Provider("yandexgpt: response has no alternatives".to_string())
        })
}

#[async_trait]
impl Provider for YandexGptProvider {
    fn name(&self) -> &str {
        "yandexgpt"
    }

    async fn complete(&self, question: &str) -> Result<String, EvrikaError> {
        let body = self.build_request(question);
        let start = Instant::now();
        debug!("yandexgpt: POST {} model={}", self.url, self.model_uri);

        let text = tokio::time::timeout(self.timeout, self.send_request(&body))
            .await
            .map_err(|_| {
                EvrikaError::Provider(format!(
                    "yandexgpt timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        debug!(
            "yandexgpt: answered in {}ms ({} chars)",
            start.elapsed().as_millis(),
            text.chars().count()
        );
        Ok(text)
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("yandexgpt: no API key configured");
            return false;
        }
        if self.model_uri.starts_with("gpt:///") {
            warn!("yandexgpt: no catalog id configured");
            return false;
        }
        true
    }
}
