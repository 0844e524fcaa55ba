//! browse_page：GET 网页并提取可读文本片段
//!
//! 不执行 JavaScript；HTML 用 html2text 提取，失败时回退到简单去标签。
//! 抓取失败不视为工具错误：结果 JSON 的 note 字段说明原因，snippet 为空。

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::{decode_args, Tool, ToolError, ToolSignature};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const FETCHED_NOTE: &str = "Content fetched successfully; snippet may be truncated.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BrowseArgs {
    /// 目标 URL（http/https）
    pub url: String,
    /// 需要从页面中关注的信息
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BrowseResult {
    pub url: String,
    pub snippet: String,
    pub instructions: String,
    pub note: String,
}

pub struct BrowsePageTool {
    client: Client,
    max_chars: usize,
}

/// html2text 失败时的回退：去标签并折叠空白
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn html_to_text(html: &str) -> String {
    match from_read(html.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => collapse_whitespace(&text),
        _ => strip_html_tags(html),
    }
}

fn snippet_of(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

impl BrowsePageTool {
    pub fn new(timeout_secs: u64, max_chars: usize) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client, max_chars }
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("Unsupported URL scheme: {url}"));
        }
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| format!("Read body: {e}"))?;
        let body = body.trim_start_matches('\u{FEFF}');
        Ok(snippet_of(&html_to_text(body), self.max_chars))
    }
}

#[async_trait]
impl Tool for BrowsePageTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature::of::<BrowseArgs>(
            "browse_page",
            "Fetch a web page and return a plain-text snippet of its visible content as JSON \
             {url, snippet, instructions, note}. Does not execute JavaScript.",
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let args: BrowseArgs = decode_args(args)?;
        let url = args.url.trim().to_string();
        let (snippet, note) = match self.fetch(&url).await {
            Ok(snippet) => (snippet, FETCHED_NOTE.to_string()),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "browse_page fetch failed");
                (String::new(), format!("Failed to fetch URL: {e}"))
            }
        };
        let result = BrowseResult {
            url,
            snippet,
            instructions: args.instructions.unwrap_or_default(),
            note,
        };
        serde_json::to_string(&result).map_err(|e| ToolError::Failed(e.to_string()))
    }
}
