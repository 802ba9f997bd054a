//! OpenAI-compatible chat-completions backend for structured extraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{decode_response, http_client};
use crate::config::InsightConfig;
use crate::error::{Error, Result};
use crate::extraction::{CompletionBackend, ExtractionSchema};

const EXTRACTION_SERVICE: &str = "extraction service";

const SYSTEM_PROMPT: &str = "You convert repository analysis notes into a JSON object. \
Respond only with JSON that matches the provided schema. Every field is required; \
percentages are numbers between 0 and 100.";

/// Chat-completions client using `response_format: json_schema`
#[derive(Clone)]
pub struct OpenAiCompletion {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompletion {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            client,
        }
    }

    pub fn from_config(config: &InsightConfig) -> Result<Self> {
        Ok(Self::new(
            config.extraction.base_url.clone(),
            config.extraction.api_key.clone(),
            config.extraction.model.clone(),
            http_client(config)?,
        ))
    }

    fn request_body<'a>(&'a self, prompt: &'a str, schema: &'a ExtractionSchema) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: schema.name,
                    schema: &schema.schema,
                    strict: false,
                },
            },
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletion {
    async fn complete(&self, prompt: &str, schema: &ExtractionSchema) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Auth("missing extraction service API key".into()))?;

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, "Extraction request: POST {}", url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.request_body(prompt, schema))
            .send()
            .await?;
        let parsed: ChatResponse = decode_response(EXTRACTION_SERVICE, resp).await?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| Error::schema("completion returned no choices"))?;

        if let Some(refusal) = message.refusal {
            return Err(Error::schema(format!("completion refused: {}", refusal)));
        }
        message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::schema("completion returned empty content"))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}
