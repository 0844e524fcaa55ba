//! Gemini generateContent 客户端（functionDeclarations）
//!
//! system 消息合并进 systemInstruction，其余按 user / model 角色放入 contents。

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::llm::provider::handle_error_response;
use crate::llm::{LlmClient, LlmError, Provider};
use crate::memory::{Message, Role};
use crate::react::{AgentStepInput, AgentStepOutput, ToolCall};
use crate::tools::ToolSignature;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: String) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    async fn post(&self, body: &Value) -> Result<String, LlmError> {
        let response = self
            .http
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        let response = handle_error_response(response).await?;
        Ok(response.text().await?)
    }
}

fn request_body(messages: &[Message], tools: &[ToolSignature]) -> Value {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let contents: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            json!({
                "role": m.native_role(Provider::Gemini),
                "parts": [{"text": m.content}],
            })
        })
        .collect();

    let mut body = json!({ "contents": contents });
    if !system.is_empty() {
        body["systemInstruction"] = json!({ "parts": [{"text": system.join("\n\n")}] });
    }
    if !tools.is_empty() {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();
        body["tools"] = json!([{ "functionDeclarations": declarations }]);
    }
    body
}

fn candidate_parts(json: &Value) -> Option<&Vec<Value>> {
    json.get("candidates")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .filter(|parts| !parts.is_empty())
}

pub(crate) fn parse_decision(body: &str) -> AgentStepOutput {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return AgentStepOutput::degraded(body);
    };
    let Some(parts) = candidate_parts(&json) else {
        return AgentStepOutput::degraded(json.to_string());
    };
    let raw = json!({ "role": "model" });

    if let Some(call) = parts.iter().find_map(|p| p.get("functionCall")) {
        let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
        let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
        return AgentStepOutput::tool(ToolCall::new(name, args)).with_raw(raw);
    }

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    AgentStepOutput::text(text).with_raw(raw)
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn decide(&self, input: &AgentStepInput) -> Result<AgentStepOutput, LlmError> {
        let body = request_body(&input.messages, &input.tools);
        let text = self.post(&body).await?;
        Ok(parse_decision(&text))
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let body = request_body(messages, &[]);
        let text = self.post(&body).await?;
        let json: Value =
            serde_json::from_str(&text).map_err(|e| LlmError::Transport(e.to_string()))?;
        let out: String = candidate_parts(&json)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        Ok(out.trim().to_string())
    }
}
