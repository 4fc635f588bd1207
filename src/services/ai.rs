use crate::{
    config::AppConfig,
    errors::ServiceError,
    services::products::ProductProjection,
    services::sales::PurchaseHistoryEntry,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Settings for the OpenAI-compatible text-generation collaborator.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl AiConfig {
    /// Extracts the AI settings from the app configuration; `None` disables
    /// the AI endpoints entirely.
    pub fn from_app_config(cfg: &AppConfig) -> Option<Self> {
        cfg.ai_api_key.as_ref().map(|api_key| Self {
            api_key: api_key.clone(),
            base_url: cfg.ai_base_url.clone(),
            model: cfg.ai_model.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// One product recommendation with the model's reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: Uuid,
    pub name: String,
    pub reason: String,
    pub confidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationReply {
    pub recommendations: Vec<Recommendation>,
    pub message: String,
}

/// Client for the LLM-backed helper endpoints (recommendations, marketing
/// copy, support chat). Consumes only the read-only product and sale
/// projections; no stock mutation path exists here.
#[derive(Clone)]
pub struct AiService {
    http: reqwest::Client,
    config: AiConfig,
}

impl AiService {
    pub fn new(config: AiConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self { http, config })
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ServiceError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature,
            max_tokens,
            stream: false,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalApiError(format!("chat completion failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::ExternalApiError(format!(
                "chat completion returned status {}",
                status
            )));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|e| {
            ServiceError::ExternalApiError(format!("malformed completion payload: {}", e))
        })?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ServiceError::ExternalApiError("empty completion".to_string()))
    }

    /// Recommends products from the catalog based on the customer's purchase
    /// history. The model must answer with strict JSON naming only products
    /// that exist in the supplied catalog.
    #[instrument(skip(self, history, catalog))]
    pub async fn recommend_products(
        &self,
        history: &[PurchaseHistoryEntry],
        catalog: &[ProductProjection],
        limit: usize,
    ) -> Result<RecommendationReply, ServiceError> {
        let prompt = format!(
            r#"You are an expert retail sales assistant. Analyze the customer's purchase history and recommend {limit} products they might be interested in.

CUSTOMER PURCHASE HISTORY:
{history}

FULL PRODUCT CATALOG ({count} products):
{catalog}

INSTRUCTIONS:
1. Recommend exactly {limit} different products
2. Use only products that exist in the supplied catalog, with their exact product_id
3. Base the recommendations on the customer's buying patterns; without history, recommend popular or varied products
4. Give a short reason per product
5. Answer with valid JSON only

RESPONSE FORMAT (JSON):
{{
    "recommendations": [
        {{
            "product_id": "00000000-0000-0000-0000-000000000000",
            "name": "Product name",
            "reason": "Short explanation",
            "confidence": "high|medium|low"
        }}
    ],
    "message": "Personalized message for the customer"
}}"#,
            limit = limit,
            count = catalog.len(),
            history = serde_json::to_string_pretty(history)
                .unwrap_or_else(|_| "[]".to_string()),
            catalog = serde_json::to_string_pretty(catalog)
                .unwrap_or_else(|_| "[]".to_string()),
        );

        let messages = [
            ChatMessage::system(
                "You are an expert retail sales assistant that recommends products based on \
                 purchase history. You always answer with valid JSON.",
            ),
            ChatMessage::user(prompt),
        ];

        let content = self
            .chat(&messages, DEFAULT_TEMPERATURE, DEFAULT_MAX_TOKENS)
            .await?;

        let payload = extract_json_object(&content).ok_or_else(|| {
            ServiceError::ExternalApiError("completion did not contain a JSON object".to_string())
        })?;

        let reply: RecommendationReply = serde_json::from_str(payload).map_err(|e| {
            ServiceError::ExternalApiError(format!("malformed recommendation JSON: {}", e))
        })?;

        info!(
            recommendations = reply.recommendations.len(),
            "Generated product recommendations"
        );
        Ok(reply)
    }

    /// Generates short marketing copy for one product.
    #[instrument(skip(self, product), fields(code = %product.code))]
    pub async fn generate_description(
        &self,
        product: &ProductProjection,
    ) -> Result<String, ServiceError> {
        let messages = [
            ChatMessage::system(
                "You are a marketing copywriter for a retail store. Write concise, appealing \
                 product descriptions in two or three sentences, without inventing technical \
                 specifications.",
            ),
            ChatMessage::user(format!(
                "Write a marketing description for this product:\n{}",
                json!({
                    "name": product.name,
                    "code": product.code,
                    "price": product.price,
                })
            )),
        ];

        self.chat(&messages, 0.8, 256).await
    }

    /// Single-turn store assistant grounded in the current catalog.
    #[instrument(skip(self, catalog))]
    pub async fn support_chat(
        &self,
        message: &str,
        catalog: &[ProductProjection],
    ) -> Result<String, ServiceError> {
        let messages = [
            ChatMessage::system(format!(
                "You are the support assistant of a retail store. Answer briefly and only from \
                 the catalog below; say so when something is not in it. Never promise stock \
                 beyond the listed quantities.\n\nCATALOG:\n{}",
                serde_json::to_string_pretty(catalog).unwrap_or_else(|_| "[]".to_string())
            )),
            ChatMessage::user(message.to_string()),
        ];

        self.chat(&messages, DEFAULT_TEMPERATURE, 512).await
    }
}

/// Returns the first top-level JSON object in `content`, tolerating prose or
/// code fences around it.
fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_json() {
        let content = r#"{"message": "hi"}"#;
        assert_eq!(extract_json_object(content), Some(content));
    }

    #[test]
    fn extracts_fenced_json() {
        let content = "Here you go:\n```json\n{\"message\": \"hi\"}\n```";
        assert_eq!(extract_json_object(content), Some("{\"message\": \"hi\"}"));
    }

    #[test]
    fn rejects_content_without_object() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
