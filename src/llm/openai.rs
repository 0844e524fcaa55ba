//! OpenAI 兼容 Chat Completions 客户端（原生 function calling）
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；请求与响应都走其类型化结构。
//! 只取首个 choice 的首个 function tool_call；参数 JSON 非法时按空对象处理。

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse, FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{LlmClient, LlmError, Provider};
use crate::memory::{Message, Role};
use crate::react::{AgentStepInput, AgentStepOutput, ToolCall};
use crate::tools::ToolSignature;

pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: String) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new()
                .with_api_base(url.trim_end_matches('/'))
                .with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }
}

fn to_openai_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    messages
        .iter()
        .map(|m| {
            Ok(match m.role {
                Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()?,
                ),
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()?,
                ),
                Role::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()?,
                ),
            })
        })
        .collect()
}

fn to_openai_tools(tools: &[ToolSignature]) -> Result<Vec<ChatCompletionTools>, OpenAIError> {
    tools
        .iter()
        .map(|t| {
            let function = FunctionObjectArgs::default()
                .name(t.name.clone())
                .description(t.description.clone())
                .parameters(t.parameters.clone())
                .build()?;
            Ok(ChatCompletionTools::Function(ChatCompletionTool { function }))
        })
        .collect()
}

/// async_openai 错误 -> LlmError：限流 / 5xx / 传输可重试，其余 API 错误按 400 处理
fn map_error(e: OpenAIError) -> LlmError {
    match e {
        OpenAIError::Reqwest(e) => LlmError::Transport(e.to_string()),
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.as_deref().unwrap_or_default();
            let code = api.code.as_deref().unwrap_or_default();
            if kind.contains("rate_limit") || code.contains("rate_limit") {
                LlmError::RateLimited { retry_after_ms: None }
            } else if kind == "server_error" || code == "server_error" {
                LlmError::Http {
                    status: 500,
                    body: api.message,
                }
            } else {
                LlmError::Http {
                    status: 400,
                    body: api.message,
                }
            }
        }
        other => LlmError::Transport(other.to_string()),
    }
}

/// 解析 chat/completions 响应为决策结果
pub(crate) fn parse_decision(response: &CreateChatCompletionResponse) -> AgentStepOutput {
    let Some(choice) = response.choices.first() else {
        return AgentStepOutput::degraded("");
    };
    let message = &choice.message;
    let raw = json!({ "role": "assistant" });

    let function = message.tool_calls.iter().flatten().find_map(|call| match call {
        ChatCompletionMessageToolCalls::Function(call) => Some(&call.function),
        _ => None,
    });
    if let Some(function) = function {
        let arguments = serde_json::from_str::<Value>(&function.arguments).unwrap_or_else(|_| json!({}));
        return AgentStepOutput::tool(ToolCall::new(function.name.clone(), arguments)).with_raw(raw);
    }

    let text = message.content.clone().unwrap_or_default();
    AgentStepOutput::text(text).with_raw(raw)
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn decide(&self, input: &AgentStepInput) -> Result<AgentStepOutput, LlmError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(self.model.clone())
            .messages(to_openai_messages(&input.messages).map_err(map_error)?);
        if !input.tools.is_empty() {
            builder.tools(to_openai_tools(&input.tools).map_err(map_error)?);
        }
        let request = builder.build().map_err(map_error)?;

        match self.client.chat().create(request).await {
            Ok(response) => Ok(parse_decision(&response)),
            Err(OpenAIError::JSONDeserialize(e, ..)) => {
                tracing::warn!(error = %e, "unparseable chat completion, degrading to text");
                Ok(AgentStepOutput::degraded(e.to_string()))
            }
            Err(e) => Err(map_error(e)),
        }
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(to_openai_messages(messages).map_err(map_error)?)
            .build()
            .map_err(map_error)?;
        let response = self.client.chat().create(request).await.map_err(map_error)?;
        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(message: Value) -> CreateChatCompletionResponse {
        serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": message,
                "finish_reason": "stop",
                "logprobs": null
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_tool_call() {
        let out = parse_decision(&response(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "c1",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"location\":\"Paris\"}"}
            }]
        })));
        let call = out.tool_call.unwrap();
        assert_eq!(call.name, "get_weather");
        assert_eq!(call.arguments["location"], "Paris");
        assert!(!out.is_final);
    }

    #[test]
    fn test_invalid_arguments_become_empty_object() {
        let out = parse_decision(&response(json!({
            "role": "assistant",
            "tool_calls": [{
                "id": "c2",
                "type": "function",
                "function": {"name": "manage_email", "arguments": "{not json"}
            }]
        })));
        let call = out.tool_call.unwrap();
        assert_eq!(call.name, "manage_email");
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn test_final_text_detected() {
        let out = parse_decision(&response(json!({
            "role": "assistant",
            "content": "Final Answer: done"
        })));
        assert!(out.is_final_answer());
        assert_eq!(out.output_text.as_deref(), Some("Final Answer: done"));
    }

    #[test]
    fn test_empty_choices_degrade_to_empty_text() {
        let mut resp = response(json!({"role": "assistant", "content": "x"}));
        resp.choices.clear();
        let out = parse_decision(&resp);
        assert!(!out.is_final);
        assert!(out.tool_call.is_none());
        assert!(out.text_content().is_none());
    }

    #[test]
    fn test_tools_are_sent_as_functions() {
        let sig = ToolSignature {
            name: "t".into(),
            description: "d".into(),
            parameters: json!({"type": "object"}),
        };
        let tools = serde_json::to_value(to_openai_tools(&[sig]).unwrap()).unwrap();
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["function"]["name"], "t");
        assert_eq!(tools[0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_messages_keep_roles() {
        let messages = to_openai_messages(&[
            Message {
                role: Role::System,
                content: "sys".into(),
            },
            Message::user("hi"),
            Message {
                role: Role::Assistant,
                content: "hello".into(),
            },
        ])
        .unwrap();
        let value = serde_json::to_value(&messages).unwrap();
        let roles: Vec<&str> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, ["system", "user", "assistant"]);
        assert_eq!(value[1]["content"], "hi");
    }
}
