//! 工具签名（静态声明的参数描述）
//!
//! 每个工具的参数结构体派生 JsonSchema，注册时一次性生成签名（名称、描述、参数 schema），
//! 决策操作与执行器直接查阅签名，不在调用时做运行时类型探测。

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 工具签名：交给决策操作的工具目录条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSignature {
    pub name: String,
    pub description: String,
    /// 参数 JSON Schema（object）
    pub parameters: Value,
}

impl ToolSignature {
    /// 由参数结构体生成签名（OpenAPI 3 风格：可选字段用 nullable，兼容 Gemini 的 schema 子集）
    pub fn of<A: JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: parameters_schema_for::<A>(),
        }
    }

    /// 参数名列表（schema properties 的键）
    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// 必填参数
    pub fn required(&self) -> Vec<String> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// 生成参数 schema，并去掉 provider 不接受的元信息键（$schema / title / definitions）
pub fn parameters_schema_for<A: JsonSchema>() -> Value {
    let settings = SchemaSettings::openapi3().with(|s| {
        s.inline_subschemas = true;
    });
    let root = settings.into_generator().into_root_schema_for::<A>();
    let mut value = serde_json::to_value(root).unwrap_or_else(|_| empty_object_schema());
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("definitions");
        obj.remove("components");
    }
    value
}

fn empty_object_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct WeatherArgs {
        /// 城市名
        location: String,
        unit: Option<String>,
    }

    #[test]
    fn test_signature_from_struct() {
        let sig = ToolSignature::of::<WeatherArgs>("get_weather", "Current conditions");
        assert_eq!(sig.parameters["type"], "object");
        let mut names = sig.parameter_names();
        names.sort();
        assert_eq!(names, vec!["location".to_string(), "unit".to_string()]);
        assert_eq!(sig.required(), vec!["location".to_string()]);
        assert!(sig.parameters.get("$schema").is_none());
        assert!(sig.parameters.get("title").is_none());
    }
}
