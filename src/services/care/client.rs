// Care model client: Ollama-style chat API returning structured JSON

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use super::PlantCare;
use crate::core::config::Config;
use crate::core::errors::{CareError, CareResult};
use crate::middleware::circuit_breaker::CircuitBreaker;
use crate::utils::Metrics;

const SYSTEM_PROMPT: &str = "You are a plant care expert. You will receive text from a plant label. \
Extract and output the following fields as JSON:\n\
- watering_frequency: one of ['weekly', 'fortnightly', 'monthly', 'none'] (string)\n\
- name: well-formatted name of the plant (string)\n\
- fertiliser: a list of seasons or periods (e.g. ['spring', 'autumn']) or an empty list if none\n\n\
Rules:\n\
- Look for words such as 'moist', 'watering', 'water' to select the watering_frequency.\n\
- Look for words such as 'fertilise', 'fertiliser', and 'spring', 'autumn', 'winter', 'weekly' to select fertiliser value(s).\n\
- If the text contains the words 'moist', 'moderate', or 'regular' (case-insensitive), set watering_frequency to 'weekly'.\n\
- If fertiliser instructions mention seasons such as 'spring', 'autumn', extract all of them in a list such as ['spring', 'autumn'].\n\
- Treat the input text as case-insensitive.\n\
- Respond ONLY with a valid JSON object, no extra text or explanation.\n\n\
Example input text:\n\
'Jasminum azoricum\\nWatering: Moderate water requirement\\nFertilise: Use a long-term controlled-release fertiliser in spring and autumn'\n\n\
The example input text has the words 'Watering' and 'Moderate' so the frequency is weekly. \
The example input text has the words 'fertiliser', 'spring and autumn' so the fertiliser is ['spring', 'autumn'].\n\
Expected JSON output:\n\
{\"watering_frequency\": \"weekly\", \"name\": \"Jasminum azoricum\", \"fertiliser\": [\"spring\", \"autumn\"]}\n\n\
Now extract the information from the following text:\n";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Client for the language model that turns label text into [`PlantCare`]
pub struct CareExtractor {
    url: String,
    model: String,
    http_client: reqwest::Client,
    circuit_breaker: CircuitBreaker,
    metrics: Option<Metrics>,
}

impl CareExtractor {
    pub fn new(
        config: &Config,
        circuit_breaker: Option<CircuitBreaker>,
        metrics: Option<Metrics>,
    ) -> CareResult<Self> {
        Self::with_endpoint(
            config.care_model_url(),
            config.care_model_name(),
            config.care_model_timeout(),
            circuit_breaker,
            metrics,
        )
    }

    pub fn with_endpoint(
        url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        circuit_breaker: Option<CircuitBreaker>,
        metrics: Option<Metrics>,
    ) -> CareResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            url: url.into(),
            model: model.into(),
            http_client,
            circuit_breaker: circuit_breaker.unwrap_or_default(),
            metrics,
        })
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Ask the model for care instructions.
    ///
    /// Fails with [`CareError::Uninterpretable`] when no watering frequency was found.
    #[instrument(skip(self, label_text), fields(chars = label_text.len(), model = %self.model))]
    pub async fn extract(&self, label_text: &str) -> CareResult<PlantCare> {
        if !self.circuit_breaker.allow_request() {
            warn!("Care model circuit open, failing fast");
            return Err(CareError::CircuitOpen);
        }

        let start = Instant::now();
        let result = self.request(label_text).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) | Err(CareError::Uninterpretable) => self.circuit_breaker.record_success(),
            Err(e) => {
                warn!("Care model call failed: {}", e);
                if self.circuit_breaker.record_failure() {
                    warn!("Care model circuit opened");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_circuit_breaker_trip();
                    }
                }
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_care_call(result.is_ok(), elapsed);
        }

        let care = result?;
        debug!(
            "Care for '{}': water {:?}, fertilise {:?}",
            care.name, care.watering_frequency, care.fertiliser
        );
        Ok(care)
    }

    async fn request(&self, label_text: &str) -> CareResult<PlantCare> {
        let body = build_request(&self.model, label_text);

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CareError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let chat: ChatResponse =
            serde_json::from_str(&text).map_err(|e| CareError::InvalidResponse {
                reason: e.to_string(),
                content: text.clone(),
            })?;

        parse_care(&chat.message.content)
    }
}

fn build_request<'a>(model: &'a str, label_text: &str) -> ChatRequest<'a> {
    // The label is sent as a quoted JSON string so line breaks survive verbatim
    let quoted = serde_json::to_string(label_text).unwrap_or_else(|_| label_text.to_string());

    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content: quoted,
            },
        ],
        stream: false,
        format: response_schema(),
    }
}

/// JSON schema constraining the model's answer
fn response_schema() -> Value {
    json!({
        "title": "PlantCare",
        "type": "object",
        "properties": {
            "watering_frequency": {
                "anyOf": [
                    { "enum": ["Weekly", "Fortnightly", "Monthly"], "type": "string" },
                    { "type": "null" }
                ]
            },
            "name": { "type": "string" },
            "fertiliser": {
                "type": "array",
                "items": {
                    "enum": ["Weekly", "Monthly", "Bi-Annually", "Spring", "Winter", "Summer", "Autumn"],
                    "type": "string"
                }
            }
        }
    })
}

/// Parse the model's message content, requiring a watering frequency
fn parse_care(content: &str) -> CareResult<PlantCare> {
    let care: PlantCare =
        serde_json::from_str(content.trim()).map_err(|e| CareError::InvalidResponse {
            reason: e.to_string(),
            content: content.to_string(),
        })?;

    if care.watering_frequency.is_none() {
        return Err(CareError::Uninterpretable);
    }
    Ok(care)
}
