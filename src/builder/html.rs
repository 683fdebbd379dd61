//! HTML 文档骨架与分段占位符
//!
//! 每个规划分段对应一个占位元素 `<section data-section="NAME"></section>`；
//! 占位元素内为空即视为该分段尚未生成。

use crate::session::{SectionPlan, StateRecord};

/// 转义文本/属性中的 HTML 特殊字符
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// 分段占位元素的开始标签
pub fn section_open_tag(name: &str) -> String {
    format!("<section data-section=\"{}\">", escape_html(name))
}

/// 空占位元素
pub fn section_placeholder(name: &str) -> String {
    format!("{}</section>", section_open_tag(name))
}

/// 根据 problem_config 与 section_plan 生成完整骨架：doctype、head（title / description / keywords）、
/// 按规划顺序排列的空占位元素、body 末尾的空 script
pub fn render_skeleton(state: &StateRecord) -> String {
    let config = &state.problem_config;
    let title = config.page_title.as_deref().unwrap_or("Untitled Page");

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("  <meta charset=\"UTF-8\">\n");
    html.push_str("  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str(&format!("  <title>{}</title>\n", escape_html(title)));
    if let Some(description) = config.meta_description.as_deref() {
        html.push_str(&format!(
            "  <meta name=\"description\" content=\"{}\">\n",
            escape_html(description)
        ));
    }
    if let Some(keywords) = config.keywords.as_deref() {
        html.push_str(&format!(
            "  <meta name=\"keywords\" content=\"{}\">\n",
            escape_html(keywords)
        ));
    }
    html.push_str("</head>\n<body>\n");
    for name in state.section_plan.names() {
        html.push_str("  ");
        html.push_str(&section_placeholder(name));
        html.push('\n');
    }
    html.push_str("  <script></script>\n</body>\n</html>\n");
    html
}

/// 占位元素内的内容；找不到占位元素返回 None
fn section_body<'a>(code: &'a str, name: &str) -> Option<&'a str> {
    let open = section_open_tag(name);
    let start = code.find(&open)? + open.len();
    let rest = &code[start..];
    let end = rest.find("</section>").unwrap_or(rest.len());
    Some(&rest[..end])
}

/// 尚未生成的分段名：占位元素缺失或为空（按规划顺序）
pub fn pending_sections(code: &str, plan: &SectionPlan) -> Vec<String> {
    plan.names()
        .into_iter()
        .filter(|name| !section_body(code, name).is_some_and(|body| !body.trim().is_empty()))
        .map(String::from)
        .collect()
}

/// 从模型回复中取出 HTML 文档：优先 ```html 围栏，其次 `<!DOCTYPE` / `<html` 到 `</html>` 的区间
pub fn extract_html_document(reply: &str) -> Option<String> {
    if let Some(start) = reply.find("```html") {
        let rest = &reply[start + 7..];
        let body = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        let body = body.trim();
        return (!body.is_empty()).then(|| body.to_string());
    }
    let lower = reply.to_ascii_lowercase();
    let start = lower.find("<!doctype").or_else(|| lower.find("<html"))?;
    let end = lower
        .rfind("</html>")
        .map(|i| i + "</html>".len())
        .unwrap_or(reply.len());
    (end > start).then(|| reply[start..end].trim().to_string())
}
