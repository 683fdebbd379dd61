//! 智能体覆盖加载器
//!
//! 从 config/agents/*.toml 读取对内置智能体描述与指令的覆盖。

use std::path::Path;

use serde::Deserialize;

/// 单个覆盖（文件中的 [agent] 段）
#[derive(Debug, Clone, Deserialize)]
pub struct AgentOverride {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentToml {
    agent: AgentOverride,
}

/// 读取目录下所有 .toml 覆盖文件（按文件名排序）；目录不存在时返回空
pub fn load_overrides(dir: &Path) -> Vec<AgentOverride> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    let mut overrides = Vec::new();
    for path in paths {
        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| toml::from_str::<AgentToml>(&content).map_err(|e| e.to_string()));
        match parsed {
            Ok(file) => overrides.push(file.agent),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "invalid agent override"),
        }
    }
    tracing::info!("Loaded {} agent overrides", overrides.len());
    overrides
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentTree, CREATOR_AGENT};

    #[test]
    fn test_load_overrides_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("creator.toml"),
            "[agent]\nname = \"Creator\"\ninstruction = \"Write HTML for {instruct}\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.toml"), "[agent\nname=").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let overrides = load_overrides(dir.path());
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].name, "Creator");

        let tree = AgentTree::load(dir.path());
        assert_eq!(
            tree.get(CREATOR_AGENT).unwrap().instruction,
            "Write HTML for {instruct}"
        );
    }

    #[test]
    fn test_missing_dir_is_empty() {
        assert!(load_overrides(Path::new("/definitely/not/here")).is_empty());
    }
}
