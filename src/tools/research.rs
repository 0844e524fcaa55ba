//! 公司研究工具：由 LLM 知识驱动的校验 / 行业 / 竞品 / 报告
//!
//! 每个工具拼好提示词后调用 `LlmClient::complete`；JSON 类工具会剥掉模型偶尔包裹的 ``` 代码块。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::{decode_args, Tool, ToolError, ToolSignature};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompanyArgs {
    /// 公司名称
    pub company_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompetitorArgs {
    pub company_name: String,
    /// 行业（可为空）
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReportArgs {
    pub company_name: String,
    /// 报告素材：事实、工具输出、已有推理
    #[serde(default)]
    pub context: Option<String>,
}

/// 折叠空白
pub fn normalize_company_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 去掉 ```json ... ``` 包裹
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}

async fn ask(llm: &Arc<dyn LlmClient>, prompt: String) -> Result<String, ToolError> {
    llm.complete(&[Message::user(prompt)])
        .await
        .map_err(|e| ToolError::Failed(format!("LLM call failed: {e}")))
}

async fn ask_json(llm: &Arc<dyn LlmClient>, prompt: String) -> Result<String, ToolError> {
    let raw = ask(llm, prompt).await?;
    Ok(strip_code_fence(&raw))
}

fn validate_prompt(company: &str) -> String {
    format!(
        r#"You are an expert in business and industry knowledge.

Task: Determine whether the following company name refers to a real, recognized company.

Company: "{company}"

Respond with a single JSON object with fields:
- "is_valid": boolean
- "normalized_name": string or null
- "confidence": number between 0 and 1
- "reason": short string explanation

Do not include any text before or after the JSON."#
    )
}

fn sector_prompt(company: &str) -> String {
    format!(
        r#"You are an expert in business and industry classification.

Task: Identify the primary industry sector for the following company.

Company: "{company}"

Respond with a single JSON object with fields:
- "sector": short sector label, such as "Technology", "EdTech", "Finance", etc.
- "confidence": number between 0 and 1
- "reason": short explanation of why this sector was chosen

If you genuinely cannot determine a sector, use "Unknown sector" with low confidence.

Do not include any text before or after the JSON."#
    )
}

fn competitors_prompt(company: &str, sector: &str) -> String {
    format!(
        r#"You are an expert in market and competitive analysis.

Task: Identify the top competitors for a company within a sector.

Company: "{company}"
Sector context (may be empty): "{sector}"

Respond with a single JSON object with fields:
- "competitors": array of competitor company names (up to 3), excluding the focal company.
- "sector": sector you used for your reasoning (may refine or correct the input sector).
- "reason": short explanation of why these companies were chosen.

Focus on real-world, meaningful competitors. If you cannot identify any, return an empty array
and explain why in the reason.

Do not include any text before or after the JSON."#
    )
}

fn report_prompt(company: &str, context: &str) -> String {
    format!(
        r#"You are an expert in competitive strategy and business analysis.

Write a clear, well-structured Markdown report for the company "{company}".

Use the context below, which may include facts, tool outputs, and prior reasoning:

```text
{context}
```

Produce a Markdown report with these sections, in order:
- Executive Summary
- Comparison Table
- Actionable Insights

Guidelines:
- In Executive Summary, briefly describe the competitive landscape and key themes.
- In Comparison Table, include at least the focal company and up to three key competitors, with columns for Strategy Type, Key Tactics, Strengths, and Weaknesses.
- In Actionable Insights, list 3-5 concrete, high-impact recommendations for "{company}" based on the context.
- Do not include any additional commentary outside the Markdown report itself."#
    )
}

/// validate_company：is_valid=false 时研究应停止
pub struct ValidateCompanyTool {
    llm: Arc<dyn LlmClient>,
}

impl ValidateCompanyTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tool for ValidateCompanyTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature::of::<CompanyArgs>(
            "validate_company",
            "Validate whether the company name refers to a real, recognized company. \
             Returns JSON {is_valid, normalized_name, confidence, reason}. \
             Treat is_valid=false as a signal to stop the analysis.",
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let args: CompanyArgs = decode_args(args)?;
        let company = normalize_company_name(&args.company_name);
        ask_json(&self.llm, validate_prompt(&company)).await
    }
}

/// identify_sector
pub struct IdentifySectorTool {
    llm: Arc<dyn LlmClient>,
}

impl IdentifySectorTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tool for IdentifySectorTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature::of::<CompanyArgs>(
            "identify_sector",
            "Determine the primary industry sector of the company. \
             Returns JSON {sector, confidence, reason}.",
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let args: CompanyArgs = decode_args(args)?;
        let company = normalize_company_name(&args.company_name);
        ask_json(&self.llm, sector_prompt(&company)).await
    }
}

/// identify_competitors：最多 3 家，排除目标公司
pub struct IdentifyCompetitorsTool {
    llm: Arc<dyn LlmClient>,
}

impl IdentifyCompetitorsTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tool for IdentifyCompetitorsTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature::of::<CompetitorArgs>(
            "identify_competitors",
            "Identify up to three top competitors in the sector, excluding the company itself. \
             Returns JSON {competitors, sector, reason}.",
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let args: CompetitorArgs = decode_args(args)?;
        let company = normalize_company_name(&args.company_name);
        let sector = args.sector.as_deref().unwrap_or("").trim().to_string();
        ask_json(&self.llm, competitors_prompt(&company, &sector)).await
    }
}

/// generate_report：Markdown 报告（执行摘要 / 对比表 / 行动建议）
pub struct GenerateReportTool {
    llm: Arc<dyn LlmClient>,
}

impl GenerateReportTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tool for GenerateReportTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature::of::<ReportArgs>(
            "generate_report",
            "Generate a Markdown competitive analysis report (Executive Summary, Comparison Table, \
             Actionable Insights) from the gathered context.",
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let args: ReportArgs = decode_args(args)?;
        let company = normalize_company_name(&args.company_name);
        let context = args.context.unwrap_or_default();
        let report = ask(&self.llm, report_prompt(&company, &context)).await?;
        Ok(report.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLlmClient;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_normalize_company_name() {
        assert_eq!(normalize_company_name("  Acme \n  Corp "), "Acme Corp");
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence(" {\"a\":1} "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_validate_company_uses_llm_completion() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![]).with_completions(vec![
            "```json\n{\"is_valid\": true}\n```".to_string(),
        ]));
        let tool = ValidateCompanyTool::new(llm.clone());
        let out = tool
            .execute(obj(json!({"company_name": " Acme  Corp"})))
            .await
            .unwrap();
        assert_eq!(out, "{\"is_valid\": true}");
        let prompts = llm.completion_prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Company: \"Acme Corp\""));
    }

    #[tokio::test]
    async fn test_report_requires_company_name() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![]));
        let err = GenerateReportTool::new(llm)
            .execute(obj(json!({"context": "facts"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
