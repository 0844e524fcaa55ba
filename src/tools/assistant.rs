//! 个人助理工具：日程与邮件（确定性桩实现，不做真实 I/O）
//!
//! schedule_event / manage_email 接收自然语言请求，返回可读的执行摘要，供监督 Agent 练习工具选择。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::tools::{decode_args, Tool, ToolError, ToolSignature};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NaturalLanguageRequest {
    /// 用户的自然语言描述
    pub request: String,
}

/// 创建日程（桩）
pub fn create_calendar_event(
    title: &str,
    start_time: &str,
    end_time: &str,
    attendees: &[String],
    location: &str,
) -> String {
    let attendees_display = if attendees.is_empty() {
        "no attendees".to_string()
    } else {
        attendees.join(", ")
    };
    let location_display = if location.is_empty() {
        String::new()
    } else {
        format!(" at {location}")
    };
    format!(
        "Event created: {title}{location_display} from {start_time} to {end_time} with {} attendees ({attendees_display}).",
        attendees.len()
    )
}

/// 发送邮件（桩）：正文预览最多 80 字符
pub fn send_email(to: &[String], subject: &str, body: &str, cc: &[String]) -> String {
    let recipients = if to.is_empty() {
        "<no recipients>".to_string()
    } else {
        to.join(", ")
    };
    let cc_display = if cc.is_empty() {
        String::new()
    } else {
        format!(" (cc: {})", cc.join(", "))
    };
    let preview = body.trim();
    let preview = if preview.chars().count() > 80 {
        format!("{}...", preview.chars().take(77).collect::<String>())
    } else {
        preview.to_string()
    };
    format!("Email sent to {recipients}{cc_display} - Subject: {subject:?} - Preview: {preview:?}")
}

/// 可用时段（桩）：固定返回三个时段
pub fn available_time_slots(_attendees: &[String], _date: &str, _duration_minutes: u32) -> Vec<&'static str> {
    vec!["09:00", "14:00", "16:00"]
}

/// schedule_event：从自然语言请求安排会议
pub struct ScheduleEventTool;

#[async_trait]
impl Tool for ScheduleEventTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature::of::<NaturalLanguageRequest>(
            "schedule_event",
            "Schedule a calendar event from a natural language request \
             (e.g. 'team standup tomorrow at 9am'). Returns a confirmation summary.",
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let args: NaturalLanguageRequest = decode_args(args)?;
        let date = "2024-01-15";
        let attendees = vec!["team@example.com".to_string()];
        let slots = available_time_slots(&attendees, date, 60);
        let slot = slots.first().copied().unwrap_or("09:00");
        let hour: u32 = slot
            .split(':')
            .next()
            .and_then(|h| h.parse().ok())
            .unwrap_or(9);

        let summary = create_calendar_event(
            "Team meeting",
            &format!("{date}T{slot}:00"),
            &format!("{date}T{:02}:00", hour + 1),
            &attendees,
            "Virtual",
        );
        Ok(format!(
            "{summary} The event was scheduled in response to: {:?}.",
            args.request
        ))
    }
}

/// manage_email：从自然语言请求撰写并发送邮件
pub struct ManageEmailTool;

#[async_trait]
impl Tool for ManageEmailTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature::of::<NaturalLanguageRequest>(
            "manage_email",
            "Compose and send an email from a natural language request. \
             Returns who it was sent to and a preview.",
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<String, ToolError> {
        let args: NaturalLanguageRequest = decode_args(args)?;
        let to = vec!["recipient@example.com".to_string()];
        let body = format!(
            "The user asked the assistant to perform the following action:\n\n{}\n\n\
             This is an automated email sent by the assistant.",
            args.request
        );
        let summary = send_email(&to, "Automated message from your assistant", &body, &[]);
        Ok(format!(
            "{summary}\n\nA professional email was composed and sent to the recipient(s) above, \
             using the text of your request as the core message."
        ))
    }
}
