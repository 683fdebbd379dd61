//! update_problem_config_tool：会话状态的唯一写入入口
//!
//! 按 key 找到所属分组（problem_config 优先，其次 details），按字段声明的形态归一化取值后覆盖写入。
//! 校验失败（未知 key / 列表字段类型不符）以 status=error 的返回体报告，状态保持不变。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::{ConfigSnapshot, FieldKey, FieldKind, FieldValue, StateRecord};
use crate::tools::schema::args_schema;
use crate::tools::{Tool, ToolContext};

pub const UPDATE_TOOL_NAME: &str = "update_problem_config_tool";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Success,
    Error,
}

/// 更新结果：状态、审计信息、更新后的两组字段快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub status: UpdateStatus,
    pub message: String,
    pub updated_config: ConfigSnapshot,
}

impl UpdateOutcome {
    fn error(state: &StateRecord, message: String) -> Self {
        Self {
            status: UpdateStatus::Error,
            message,
            updated_config: state.config_snapshot(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UpdateStatus::Success
    }
}

/// 按字段形态归一化取值；列表字段收到非字符串非数组时返回 None
fn coerce(kind: FieldKind, value: &Value) -> Option<FieldValue> {
    let text_of = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match kind {
        FieldKind::List => match value {
            Value::String(s) => Some(FieldValue::List(
                s.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect(),
            )),
            Value::Array(items) => Some(FieldValue::List(items.iter().map(text_of).collect())),
            _ => None,
        },
        FieldKind::Scalar => Some(FieldValue::Text(text_of(value))),
    }
}

/// 写入单个字段并返回结果；任何失败都不会修改状态
pub fn update_field(state: &mut StateRecord, key: &str, value: &Value) -> UpdateOutcome {
    let Some(field) = FieldKey::parse(key) else {
        return UpdateOutcome::error(
            state,
            format!("Key '{key}' is not a valid problem_config or details field."),
        );
    };
    let Some(coerced) = coerce(field.kind(), value) else {
        return UpdateOutcome::error(
            state,
            format!("Invalid type for '{key}': expected list or comma-separated string."),
        );
    };

    let new_text = coerced.to_string();
    let previous = state.assign(field, coerced);
    let prev_text = previous
        .map(|v| v.to_string())
        .unwrap_or_else(|| "None".to_string());
    tracing::debug!(field = %field, group = field.group().name(), "state field updated");

    UpdateOutcome {
        status: UpdateStatus::Success,
        message: format!("Updated '{field}' from '{prev_text}' to '{new_text}'"),
        updated_config: state.config_snapshot(),
    }
}

/// 工具参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateArgs {
    /// 字段名，例如 "Page Title"、"Navigation Menu"（大小写与空格需完全一致）
    pub key: String,
    /// 新值：字符串；列表字段也可传数组或逗号分隔字符串
    pub value: Value,
}

/// 供 requirement_gatherer 使用的状态写入工具
pub struct UpdateProblemConfigTool;

#[async_trait]
impl Tool for UpdateProblemConfigTool {
    fn name(&self) -> &str {
        UPDATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Update one field of problem_config or details in the session state. Args: {\"key\": \"Page Title\", \"value\": \"My Bakery\"}. List fields (Page Structure, Navigation Menu, Primary Media, Forms) accept an array or a comma-separated string."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<UpdateArgs>()
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<Value, String> {
        let key = args.get("key").and_then(Value::as_str);
        let outcome = match key {
            Some(key) => {
                let value = args.get("value").cloned().unwrap_or(Value::Null);
                update_field(ctx.state, key, &value)
            }
            None => UpdateOutcome::error(
                &*ctx.state,
                "Missing or non-string 'key' argument.".to_string(),
            ),
        };

        if outcome.is_success() {
            let snapshot = &outcome.updated_config;
            ctx.actions.state_delta.insert(
                "problem_config".to_string(),
                serde_json::to_value(&snapshot.problem_config).map_err(|e| e.to_string())?,
            );
            ctx.actions.state_delta.insert(
                "details".to_string(),
                serde_json::to_value(&snapshot.details).map_err(|e| e.to_string())?,
            );
        } else {
            tracing::warn!(agent = ctx.agent_name, message = %outcome.message, "state update rejected");
        }
        serde_json::to_value(&outcome).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::react::events::EventActions;
    use serde_json::json;

    #[test]
    fn test_unknown_key_leaves_state_untouched() {
        let mut state = StateRecord::default();
        update_field(&mut state, "Page Title", &json!("Bakery"));
        let before = state.clone();

        let outcome = update_field(&mut state, "Favourite Colour", &json!("blue"));
        assert_eq!(outcome.status, UpdateStatus::Error);
        assert_eq!(
            outcome.message,
            "Key 'Favourite Colour' is not a valid problem_config or details field."
        );
        assert_eq!(state, before);
        assert_eq!(outcome.updated_config, before.config_snapshot());
    }

    #[test]
    fn test_list_field_splits_comma_string() {
        for key in FieldKey::LIST_FIELDS {
            let mut state = StateRecord::default();
            let outcome = update_field(&mut state, key.name(), &json!("a, b ,,c"));
            assert!(outcome.is_success());
            assert_eq!(
                state.field(key),
                Some(FieldValue::List(vec!["a".into(), "b".into(), "c".into()]))
            );
        }
    }

    #[test]
    fn test_list_field_keeps_order_and_duplicates() {
        let mut state = StateRecord::default();
        update_field(&mut state, "navigation_links", &json!("Home, About, Home"));
        assert_eq!(
            state.problem_config.navigation_menu,
            Some(vec!["Home".into(), "About".into(), "Home".into()])
        );
    }

    #[test]
    fn test_list_field_accepts_array() {
        let mut state = StateRecord::default();
        let outcome = update_field(&mut state, "Primary Media", &json!(["hero.jpg", 3]));
        assert!(outcome.is_success());
        assert_eq!(
            state.problem_config.primary_media,
            Some(vec!["hero.jpg".into(), "3".into()])
        );
        assert_eq!(
            outcome.message,
            "Updated 'Primary Media' from 'None' to '[\"hero.jpg\",\"3\"]'"
        );
    }

    #[test]
    fn test_list_field_rejects_number() {
        for key in FieldKey::LIST_FIELDS {
            let mut state = StateRecord::default();
            let outcome = update_field(&mut state, key.name(), &json!(42));
            assert_eq!(outcome.status, UpdateStatus::Error);
            assert_eq!(
                outcome.message,
                format!(
                    "Invalid type for '{}': expected list or comma-separated string.",
                    key.name()
                )
            );
            assert_eq!(state, StateRecord::default());
        }
    }

    #[test]
    fn test_scalar_coerces_to_text() {
        let mut state = StateRecord::default();
        update_field(&mut state, "Keywords", &json!(3));
        assert_eq!(state.problem_config.keywords.as_deref(), Some("3"));
        update_field(&mut state, "Simple Interactivity", &json!(true));
        assert_eq!(state.details.simple_interactivity.as_deref(), Some("true"));
        update_field(&mut state, "Favicon", &Value::Null);
        assert_eq!(state.problem_config.favicon.as_deref(), Some("null"));
    }

    #[test]
    fn test_repeated_write_is_idempotent() {
        let mut state = StateRecord::default();
        let first = update_field(&mut state, "Page Title", &json!("Bakery"));
        assert_eq!(first.message, "Updated 'Page Title' from 'None' to 'Bakery'");
        let after_first = state.clone();
        let second = update_field(&mut state, "Page Title", &json!("Bakery"));
        assert_eq!(second.message, "Updated 'Page Title' from 'Bakery' to 'Bakery'");
        assert_eq!(state, after_first);
    }

    #[test]
    fn test_number_then_string_form() {
        let mut state = StateRecord::default();
        update_field(&mut state, "Keywords", &json!(7));
        let second = update_field(&mut state, "Keywords", &json!("7"));
        assert_eq!(second.message, "Updated 'Keywords' from '7' to '7'");
    }

    #[test]
    fn test_details_routing() {
        let mut state = StateRecord::default();
        let outcome = update_field(&mut state, "Layout & Styling", &json!("two columns"));
        assert!(outcome.is_success());
        assert_eq!(state.details.layout_styling.as_deref(), Some("two columns"));
        assert_eq!(
            outcome.updated_config.details.layout_styling.as_deref(),
            Some("two columns")
        );
        assert!(state.problem_config == Default::default());
    }

    #[tokio::test]
    async fn test_tool_records_state_delta() {
        let mut state = StateRecord::default();
        let mut actions = EventActions::default();
        let mut ctx = ToolContext::new("requirement_gatherer", &mut state, &mut actions);
        let out = UpdateProblemConfigTool
            .execute(json!({"key": "Page Title", "value": "Bakery"}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(out["status"], "success");
        assert_eq!(out["updated_config"]["problem_config"]["Page Title"], "Bakery");
        assert_eq!(actions.state_delta["problem_config"]["Page Title"], "Bakery");
    }

    #[tokio::test]
    async fn test_tool_missing_key_is_error_value() {
        let mut state = StateRecord::default();
        let mut actions = EventActions::default();
        let mut ctx = ToolContext::new("requirement_gatherer", &mut state, &mut actions);
        let out = UpdateProblemConfigTool
            .execute(json!({"value": "Bakery"}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(out["status"], "error");
        assert!(actions.state_delta.is_empty());
        assert_eq!(state, StateRecord::default());
    }

    #[test]
    fn test_schema_mentions_key_and_value() {
        let schema = UpdateProblemConfigTool.parameters_schema().to_string();
        assert!(schema.contains("\"key\""));
        assert!(schema.contains("\"value\""));
    }
}
