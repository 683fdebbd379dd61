//! 会话状态记录（State Record）
//!
//! 六个顶层槽位：details、problem_config、web_info_output、section_plan、generated_code、instruct。
//! details / problem_config 为具名可选字段的结构体，按展示名序列化（未设置为 null）；
//! `field` / `assign` 是字段枚举到结构体字段的分派表。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::react::planner::extract_json_block;
use crate::session::fields::FieldKey;

/// 单个字段的取值（已按字段形态归一化）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => {
                let rendered = serde_json::to_string(items).unwrap_or_else(|_| items.join(", "));
                f.write_str(&rendered)
            }
        }
    }
}

/// details 组：用户需求要点
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Details {
    #[serde(rename = "Page Purpose")]
    pub page_purpose: Option<String>,
    #[serde(rename = "Content")]
    pub content: Option<String>,
    #[serde(rename = "Layout & Styling")]
    pub layout_styling: Option<String>,
    #[serde(rename = "Images")]
    pub images: Option<String>,
    #[serde(rename = "External Resources")]
    pub external_resources: Option<String>,
    #[serde(rename = "Simple Interactivity")]
    pub simple_interactivity: Option<String>,
}

/// problem_config 组：页面生成所需的结构化配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemConfig {
    #[serde(rename = "Page Title")]
    pub page_title: Option<String>,
    #[serde(rename = "Main Content")]
    pub main_content: Option<String>,
    #[serde(rename = "Page Structure")]
    pub page_structure: Option<Vec<String>>,
    #[serde(rename = "Navigation Menu")]
    pub navigation_menu: Option<Vec<String>>,
    #[serde(rename = "Primary Media")]
    pub primary_media: Option<Vec<String>>,
    #[serde(rename = "Meta Description")]
    pub meta_description: Option<String>,
    #[serde(rename = "Keywords")]
    pub keywords: Option<String>,
    #[serde(rename = "Favicon")]
    pub favicon: Option<String>,
    #[serde(rename = "Secondary Content")]
    pub secondary_content: Option<String>,
    #[serde(rename = "Footer Content")]
    pub footer_content: Option<String>,
    #[serde(rename = "External Scripts")]
    pub external_scripts: Option<String>,
    #[serde(rename = "Custom Fonts")]
    pub custom_fonts: Option<String>,
    #[serde(rename = "Accessibility Attributes")]
    pub accessibility_attributes: Option<String>,
    #[serde(rename = "Social Sharing Metadata")]
    pub social_sharing_metadata: Option<String>,
    #[serde(rename = "Forms")]
    pub forms: Option<Vec<String>>,
    #[serde(rename = "Animations / Effects")]
    pub animations_effects: Option<String>,
}

impl ProblemConfig {
    /// 尚未填写的必填字段
    pub fn missing_mandatory(&self) -> Vec<FieldKey> {
        let state = StateRecord {
            problem_config: self.clone(),
            ..StateRecord::default()
        };
        FieldKey::ALL
            .into_iter()
            .filter(|k| k.is_mandatory() && state.field(*k).is_none())
            .collect()
    }
}

/// 规划中的单个分段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSection {
    pub name: String,
    pub content: String,
}

/// 分段规划：分段名 -> 内容，保持插入顺序（即页面自上而下的顺序）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct SectionPlan {
    sections: Vec<PlannedSection>,
}

impl SectionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或覆盖分段；覆盖时保留原位置
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        let name = name.into();
        let content = content.into();
        match self.sections.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.content = content,
            None => self.sections.push(PlannedSection { name, content }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.content.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedSection> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl<N: Into<String>, C: Into<String>> FromIterator<(N, C)> for SectionPlan {
    fn from_iter<T: IntoIterator<Item = (N, C)>>(iter: T) -> Self {
        let mut plan = SectionPlan::new();
        for (name, content) in iter {
            plan.insert(name, content);
        }
        plan
    }
}

impl From<Map<String, Value>> for SectionPlan {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter()
            .map(|(name, value)| {
                let content = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (name, content)
            })
            .collect()
    }
}

impl From<SectionPlan> for Map<String, Value> {
    fn from(plan: SectionPlan) -> Self {
        plan.sections
            .into_iter()
            .map(|s| (s.name, Value::String(s.content)))
            .collect()
    }
}

/// 智能体文本输出写回的状态槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKey {
    WebInfoOutput,
    SectionPlan,
    GeneratedCode,
    Instruct,
}

impl OutputKey {
    pub fn name(&self) -> &'static str {
        match self {
            OutputKey::WebInfoOutput => "web_info_output",
            OutputKey::SectionPlan => "section_plan",
            OutputKey::GeneratedCode => "generated_code",
            OutputKey::Instruct => "instruct",
        }
    }
}

/// details + problem_config 的快照（更新工具的返回体）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSnapshot {
    pub problem_config: ProblemConfig,
    pub details: Details,
}

/// 单个会话的完整状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub details: Details,
    pub problem_config: ProblemConfig,
    /// 外部检索结果，不做结构校验
    pub web_info_output: Option<Value>,
    pub section_plan: SectionPlan,
    /// 逐步累积的 HTML 文档，只由生成步骤写入
    pub generated_code: Option<String>,
    /// 下一条待执行的生成指令
    pub instruct: Option<String>,
}

impl StateRecord {
    /// 读取字段当前值；未设置返回 None
    pub fn field(&self, key: FieldKey) -> Option<FieldValue> {
        let d = &self.details;
        let p = &self.problem_config;
        let text = |v: &Option<String>| v.clone().map(FieldValue::Text);
        let list = |v: &Option<Vec<String>>| v.clone().map(FieldValue::List);
        match key {
            FieldKey::PagePurpose => text(&d.page_purpose),
            FieldKey::Content => text(&d.content),
            FieldKey::LayoutStyling => text(&d.layout_styling),
            FieldKey::Images => text(&d.images),
            FieldKey::ExternalResources => text(&d.external_resources),
            FieldKey::SimpleInteractivity => text(&d.simple_interactivity),
            FieldKey::PageTitle => text(&p.page_title),
            FieldKey::MainContent => text(&p.main_content),
            FieldKey::PageStructure => list(&p.page_structure),
            FieldKey::NavigationMenu => list(&p.navigation_menu),
            FieldKey::PrimaryMedia => list(&p.primary_media),
            FieldKey::MetaDescription => text(&p.meta_description),
            FieldKey::Keywords => text(&p.keywords),
            FieldKey::Favicon => text(&p.favicon),
            FieldKey::SecondaryContent => text(&p.secondary_content),
            FieldKey::FooterContent => text(&p.footer_content),
            FieldKey::ExternalScripts => text(&p.external_scripts),
            FieldKey::CustomFonts => text(&p.custom_fonts),
            FieldKey::AccessibilityAttributes => text(&p.accessibility_attributes),
            FieldKey::SocialSharingMetadata => text(&p.social_sharing_metadata),
            FieldKey::Forms => list(&p.forms),
            FieldKey::AnimationsEffects => text(&p.animations_effects),
        }
    }

    /// 覆盖字段值，返回旧值。值形态与字段不符时按字段形态转换（列表拼接 / 单元素列表）。
    pub fn assign(&mut self, key: FieldKey, value: FieldValue) -> Option<FieldValue> {
        let previous = self.field(key);
        match value {
            FieldValue::Text(s) => {
                if let Some(slot) = self.text_slot(key) {
                    *slot = Some(s);
                } else if let Some(slot) = self.list_slot(key) {
                    *slot = Some(vec![s]);
                }
            }
            FieldValue::List(items) => {
                if let Some(slot) = self.list_slot(key) {
                    *slot = Some(items);
                } else if let Some(slot) = self.text_slot(key) {
                    *slot = Some(items.join(", "));
                }
            }
        }
        previous
    }

    fn text_slot(&mut self, key: FieldKey) -> Option<&mut Option<String>> {
        let d = &mut self.details;
        let p = &mut self.problem_config;
        match key {
            FieldKey::PagePurpose => Some(&mut d.page_purpose),
            FieldKey::Content => Some(&mut d.content),
            FieldKey::LayoutStyling => Some(&mut d.layout_styling),
            FieldKey::Images => Some(&mut d.images),
            FieldKey::ExternalResources => Some(&mut d.external_resources),
            FieldKey::SimpleInteractivity => Some(&mut d.simple_interactivity),
            FieldKey::PageTitle => Some(&mut p.page_title),
            FieldKey::MainContent => Some(&mut p.main_content),
            FieldKey::MetaDescription => Some(&mut p.meta_description),
            FieldKey::Keywords => Some(&mut p.keywords),
            FieldKey::Favicon => Some(&mut p.favicon),
            FieldKey::SecondaryContent => Some(&mut p.secondary_content),
            FieldKey::FooterContent => Some(&mut p.footer_content),
            FieldKey::ExternalScripts => Some(&mut p.external_scripts),
            FieldKey::CustomFonts => Some(&mut p.custom_fonts),
            FieldKey::AccessibilityAttributes => Some(&mut p.accessibility_attributes),
            FieldKey::SocialSharingMetadata => Some(&mut p.social_sharing_metadata),
            FieldKey::AnimationsEffects => Some(&mut p.animations_effects),
            FieldKey::PageStructure
            | FieldKey::NavigationMenu
            | FieldKey::PrimaryMedia
            | FieldKey::Forms => None,
        }
    }

    fn list_slot(&mut self, key: FieldKey) -> Option<&mut Option<Vec<String>>> {
        let p = &mut self.problem_config;
        match key {
            FieldKey::PageStructure => Some(&mut p.page_structure),
            FieldKey::NavigationMenu => Some(&mut p.navigation_menu),
            FieldKey::PrimaryMedia => Some(&mut p.primary_media),
            FieldKey::Forms => Some(&mut p.forms),
            _ => None,
        }
    }

    pub fn config_snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            problem_config: self.problem_config.clone(),
            details: self.details.clone(),
        }
    }

    /// 把智能体的文本输出写入对应槽位；web_info_output / section_plan 需为 JSON 对象
    pub fn apply_output(&mut self, key: OutputKey, text: &str) -> Result<(), AgentError> {
        let trimmed = text.trim();
        match key {
            OutputKey::WebInfoOutput => {
                let parsed = extract_json_block(trimmed)
                    .and_then(|json| serde_json::from_str::<Value>(json).ok());
                self.web_info_output = Some(parsed.unwrap_or_else(|| Value::String(trimmed.to_string())));
            }
            OutputKey::SectionPlan => {
                let json = extract_json_block(trimmed).unwrap_or(trimmed);
                let map: Map<String, Value> = serde_json::from_str(json).map_err(|e| {
                    AgentError::JsonParseError(format!("section_plan must be a JSON object ({e}): {json}"))
                })?;
                self.section_plan = SectionPlan::from(map);
            }
            OutputKey::GeneratedCode => {
                self.generated_code = Some(trimmed.to_string());
            }
            OutputKey::Instruct => {
                self.instruct = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
        }
        Ok(())
    }

    /// 指令模板中 `{slot}` 的替换文本；未知槽位返回 None
    pub fn slot_text(&self, slot: &str) -> Option<String> {
        let json = |v: Result<String, serde_json::Error>| v.unwrap_or_default();
        let text = match slot {
            "details" => json(serde_json::to_string_pretty(&self.details)),
            "problem_config" => json(serde_json::to_string_pretty(&self.problem_config)),
            "web_info_output" => match &self.web_info_output {
                Some(v) => json(serde_json::to_string_pretty(v)),
                None => String::new(),
            },
            "section_plan" => json(serde_json::to_string_pretty(&self.section_plan)),
            "generated_code" => self.generated_code.clone().unwrap_or_default(),
            "instruct" => self.instruct.clone().unwrap_or_default(),
            _ => return None,
        };
        Some(text)
    }
}
