//! 可观测性：控制台日志 + 可选日志文件

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogSection;

/// 初始化全局 subscriber：默认 info 级别（RUST_LOG 可覆盖），配置了 [log] file 时同时追加写入文件（无 ANSI 颜色）
pub fn init(log: &LogSection) -> std::io::Result<()> {
    let file_layer = match &log.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    let installed = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .with(fmt::layer())
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
