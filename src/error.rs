use crate::types::BlockPos;
use thiserror::Error;
use std::io;

/// 致命的格式错误：出现即中止整个导入，不返回部分结果
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("无效的魔数")]
    InvalidMagic,

    #[error("{section} 段缺少长度前缀")]
    Truncated { section: &'static str },

    #[error("{section} 段声明长度 {declared} 超出剩余数据 {remaining}")]
    SectionOverflow {
        section: &'static str,
        declared: u32,
        remaining: usize,
    },

    #[error("元数据解析错误: {0}")]
    Metadata(String),

    #[error("结构数据无法解析 (gzip: {gzip}; 原始: {raw})")]
    UndecodableStructure { gzip: String, raw: String },

    #[error("坐标跨度超出范围: {position} 相对原点 {origin}")]
    ExtentOverflow { origin: BlockPos, position: BlockPos },
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("格式错误: {0}")]
    Format(#[from] FormatError),

    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("映射存储错误: {0}")]
    Store(String),

    #[error("组件文件错误: {0}")]
    Companion(String),

    #[error("无效的映射: {0}")]
    InvalidMapping(String),
}
