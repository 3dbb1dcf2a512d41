//! 配置文件加载与管理

use crate::{error::ImportError, remap::TargetBlock};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 本地配置文件名
pub const LOCAL_CONFIG: &str = "bpimport.toml";

/// 主配置结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 追加的目标方块类型
    pub catalogue: Vec<TargetBlock>,
    /// 存储配置
    pub store: StoreConfig,
    /// 导入配置
    pub import: ImportConfig,
}

/// 存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 覆盖映射表文件
    pub mappings: PathBuf,
    /// 导入结果输出目录
    pub schematics: PathBuf,
}

/// 导入配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// 有未知方块名时在终端询问
    pub interactive: bool,
}

// ============== 默认值 ==============

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("bpimport"))
        .unwrap_or_else(|| PathBuf::from(".bpimport"))
}

impl Default for StoreConfig {
    fn default() -> Self {
        let base = data_dir();
        Self {
            mappings: base.join("mappings.json"),
            schematics: base.join("schematics"),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { interactive: true }
    }
}

// ============== 配置加载 ==============

impl Config {
    /// 从文件加载配置
    pub fn load_from_file(path: &Path) -> Result<Self, ImportError> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ImportError::Config(format!("{}: {}", path.display(), e)))
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, path: &Path) -> Result<(), ImportError> {
        let content = toml::to_string_pretty(self).map_err(|e| ImportError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// 获取默认配置文件路径
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("bpimport").join("config.toml"))
    }

    /// 按优先级加载配置：
    /// 1. 当前目录的 bpimport.toml
    /// 2. 用户配置目录的 config.toml
    /// 3. 默认配置
    pub fn load() -> Self {
        let local_config = Path::new(LOCAL_CONFIG);
        let candidates =
            std::iter::once(local_config.to_path_buf()).chain(Self::default_config_path());

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("已加载配置: {}", path.display());
                    return config;
                }
                Err(e) => warn!("无法加载配置 {}: {}", path.display(), e),
            }
        }

        Self::default()
    }

    /// 生成默认配置文件内容
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}
