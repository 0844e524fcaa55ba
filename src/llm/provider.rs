//! Provider 选择与客户端构建
//!
//! 启动时根据 [llm] 配置一次性构建 LlmClient 并注入编排器；缺少 API Key 时退回 Mock 并告警。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::LlmSection;
use crate::llm::{GeminiClient, LlmClient, LlmError, MockLlmClient, OpenAiClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Gemini,
    Mock,
}

impl Provider {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "gemini" | "google" => Some(Provider::Gemini),
            "mock" => Some(Provider::Mock),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Mock => "mock",
        }
    }

    /// 未在配置里给出 Key 时读取的环境变量（按顺序）
    fn key_env_vars(&self) -> &'static [&'static str] {
        match self {
            Provider::OpenAi => &["OPENAI_API_KEY"],
            Provider::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            Provider::Mock => &[],
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn resolve_api_key(provider: Provider, configured: Option<&str>) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .or_else(|| {
            provider
                .key_env_vars()
                .iter()
                .find_map(|var| std::env::var(var).ok().filter(|k| !k.trim().is_empty()))
        })
}

/// 根据配置构建决策客户端
pub fn create_llm_from_config(section: &LlmSection) -> Arc<dyn LlmClient> {
    let Some(provider) = Provider::parse(&section.provider) else {
        tracing::warn!(provider = %section.provider, "未知的 LLM provider，使用 Mock");
        return Arc::new(MockLlmClient);
    };
    if provider == Provider::Mock {
        return Arc::new(MockLlmClient);
    }
    let Some(api_key) = resolve_api_key(provider, section.api_key.as_deref()) else {
        tracing::warn!(
            provider = %provider,
            env = ?provider.key_env_vars(),
            "未找到 API Key，使用 Mock 客户端"
        );
        return Arc::new(MockLlmClient);
    };
    tracing::info!(provider = %provider, model = %section.model, "LLM client ready");
    match provider {
        Provider::OpenAi => Arc::new(OpenAiClient::new(
            section.base_url.as_deref(),
            &section.model,
            api_key,
        )),
        Provider::Gemini => Arc::new(GeminiClient::new(
            section.base_url.as_deref(),
            &section.model,
            api_key,
        )),
        Provider::Mock => Arc::new(MockLlmClient),
    }
}

/// 非 2xx 响应映射为 LlmError（429 带 Retry-After）
pub(crate) async fn handle_error_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 429 {
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs * 1000);
        return Err(LlmError::RateLimited { retry_after_ms });
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::Http {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}
