//! 状态字段注册表
//!
//! 两组固定字段：`details`（自由填写的需求要点，全部为标量）与 `problem_config`（5 个必填 + 11 个可选）。
//! 每个字段在定义处声明取值形态（标量字符串 / 有序字符串列表），写入时据此做类型归一化。

use std::fmt;

/// 字段所属分组
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    Details,
    ProblemConfig,
}

impl FieldGroup {
    pub fn name(&self) -> &'static str {
        match self {
            FieldGroup::Details => "details",
            FieldGroup::ProblemConfig => "problem_config",
        }
    }
}

/// 字段取值形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// 标量：写入时转为字符串
    Scalar,
    /// 有序字符串列表：接受逗号分隔字符串或数组
    List,
}

/// 所有已知字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    // details
    PagePurpose,
    Content,
    LayoutStyling,
    Images,
    ExternalResources,
    SimpleInteractivity,
    // problem_config（必填）
    PageTitle,
    MainContent,
    PageStructure,
    NavigationMenu,
    PrimaryMedia,
    // problem_config（可选）
    MetaDescription,
    Keywords,
    Favicon,
    SecondaryContent,
    FooterContent,
    ExternalScripts,
    CustomFonts,
    AccessibilityAttributes,
    SocialSharingMetadata,
    Forms,
    AnimationsEffects,
}

impl FieldKey {
    pub const ALL: [FieldKey; 22] = [
        FieldKey::PagePurpose,
        FieldKey::Content,
        FieldKey::LayoutStyling,
        FieldKey::Images,
        FieldKey::ExternalResources,
        FieldKey::SimpleInteractivity,
        FieldKey::PageTitle,
        FieldKey::MainContent,
        FieldKey::PageStructure,
        FieldKey::NavigationMenu,
        FieldKey::PrimaryMedia,
        FieldKey::MetaDescription,
        FieldKey::Keywords,
        FieldKey::Favicon,
        FieldKey::SecondaryContent,
        FieldKey::FooterContent,
        FieldKey::ExternalScripts,
        FieldKey::CustomFonts,
        FieldKey::AccessibilityAttributes,
        FieldKey::SocialSharingMetadata,
        FieldKey::Forms,
        FieldKey::AnimationsEffects,
    ];

    /// 列表字段固定集合
    pub const LIST_FIELDS: [FieldKey; 4] = [
        FieldKey::PageStructure,
        FieldKey::PrimaryMedia,
        FieldKey::NavigationMenu,
        FieldKey::Forms,
    ];

    /// 展示名（即状态中的键名，也是模型调用工具时使用的 key）
    pub fn name(&self) -> &'static str {
        match self {
            FieldKey::PagePurpose => "Page Purpose",
            FieldKey::Content => "Content",
            FieldKey::LayoutStyling => "Layout & Styling",
            FieldKey::Images => "Images",
            FieldKey::ExternalResources => "External Resources",
            FieldKey::SimpleInteractivity => "Simple Interactivity",
            FieldKey::PageTitle => "Page Title",
            FieldKey::MainContent => "Main Content",
            FieldKey::PageStructure => "Page Structure",
            FieldKey::NavigationMenu => "Navigation Menu",
            FieldKey::PrimaryMedia => "Primary Media",
            FieldKey::MetaDescription => "Meta Description",
            FieldKey::Keywords => "Keywords",
            FieldKey::Favicon => "Favicon",
            FieldKey::SecondaryContent => "Secondary Content",
            FieldKey::FooterContent => "Footer Content",
            FieldKey::ExternalScripts => "External Scripts",
            FieldKey::CustomFonts => "Custom Fonts",
            FieldKey::AccessibilityAttributes => "Accessibility Attributes",
            FieldKey::SocialSharingMetadata => "Social Sharing Metadata",
            FieldKey::Forms => "Forms",
            FieldKey::AnimationsEffects => "Animations / Effects",
        }
    }

    /// 列表字段的 snake_case 别名（模型常用这些名字指代多值字段）
    fn alias(&self) -> Option<&'static str> {
        match self {
            FieldKey::PageStructure => Some("main_headings_sections"),
            FieldKey::PrimaryMedia => Some("images_media"),
            FieldKey::NavigationMenu => Some("navigation_links"),
            FieldKey::Forms => Some("interactive_elements"),
            _ => None,
        }
    }

    /// 按展示名或别名查找；都不匹配返回 None
    pub fn parse(key: &str) -> Option<FieldKey> {
        FieldKey::ALL
            .into_iter()
            .find(|k| k.name() == key || k.alias() == Some(key))
    }

    pub fn group(&self) -> FieldGroup {
        match self {
            FieldKey::PagePurpose
            | FieldKey::Content
            | FieldKey::LayoutStyling
            | FieldKey::Images
            | FieldKey::ExternalResources
            | FieldKey::SimpleInteractivity => FieldGroup::Details,
            _ => FieldGroup::ProblemConfig,
        }
    }

    pub fn kind(&self) -> FieldKind {
        if FieldKey::LIST_FIELDS.contains(self) {
            FieldKind::List
        } else {
            FieldKind::Scalar
        }
    }

    pub fn is_mandatory(&self) -> bool {
        matches!(
            self,
            FieldKey::PageTitle
                | FieldKey::MainContent
                | FieldKey::PageStructure
                | FieldKey::NavigationMenu
                | FieldKey::PrimaryMedia
        )
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
