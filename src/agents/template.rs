//! 指令模板渲染：`{slot}` -> 当前状态中的对应槽位

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::session::StateRecord;

static SLOT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").ok());

/// 替换已知槽位；未知的花括号内容（例如 JSON 示例）原样保留
pub fn render_instruction(template: &str, state: &StateRecord) -> String {
    let Some(re) = SLOT_RE.as_ref() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &Captures| {
        state
            .slot_text(&caps[1])
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_slots_replaced() {
        let mut state = StateRecord::default();
        state.instruct = Some("add the hero".into());
        let out = render_instruction("Do: {instruct}\nCode: [{generated_code}]", &state);
        assert_eq!(out, "Do: add the hero\nCode: []");
    }

    #[test]
    fn test_unknown_and_json_braces_untouched() {
        let state = StateRecord::default();
        let template = r#"{user_name} then {"tool": "exit_loop", "args": {}}"#;
        assert_eq!(render_instruction(template, &state), template);
    }

    #[test]
    fn test_problem_config_rendered_as_json() {
        let state = StateRecord::default();
        let out = render_instruction("{problem_config}", &state);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(parsed["Page Title"].is_null());
    }
}
