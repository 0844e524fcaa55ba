//! company_research：委派工具的签名占位
//!
//! 只为让决策操作在工具目录里看到它；编排循环会拦截这个工具名并交给子 Agent 委派器，
//! execute 只在未接入委派器时才会被调到。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::tools::{decode_args, Tool, ToolError, ToolSignature};

pub const COMPANY_RESEARCH_TOOL: &str = "company_research";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompanyResearchArgs {
    /// 要研究的公司名称
    pub company: String,
}

pub struct CompanyResearchTool;

#[async_trait]
impl Tool for CompanyResearchTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature::of::<CompanyResearchArgs>(
            COMPANY_RESEARCH_TOOL,
            "Run an in-depth competitive analysis of a company (sector, top competitors, \
             comparison table, actionable insights). Long-running; returns a report summary.",
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let args: CompanyResearchArgs = decode_args(args)?;
        Ok(format!(
            "Company research requested for {:?}. The full analysis is performed by the \
             company research sub-agent.",
            args.company
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_declares_company() {
        let sig = CompanyResearchTool.signature();
        assert_eq!(sig.name, COMPANY_RESEARCH_TOOL);
        assert_eq!(sig.required(), vec!["company".to_string()]);
    }
}
