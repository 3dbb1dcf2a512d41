//! 蓝图 (.bp) 导入工具
//!
//! 解析蓝图容器，解包调色板索引，按名称重映射到目标方块ID空间，并归一化为以原点为基准的结构。

pub mod assembler;
pub mod companion;
pub mod compression;
pub mod config;
pub mod confirm;
pub mod container;
pub mod error;
pub mod import;
pub mod nbt;
pub mod palette;
pub mod region;
pub mod remap;
pub mod schematic;
pub mod store;
pub mod types;
pub mod utils;

pub use crate::assembler::{assemble, scan, Assembly, DiscoverOrCommit, Discovery, Pass};
pub use crate::config::Config;
pub use crate::container::BlueprintContainer;
pub use crate::error::{FormatError, ImportError};
pub use crate::import::{Importer, PendingImport};
pub use crate::remap::{DefaultSuggester, Mapping, MappingTable, NameRemapper};
pub use crate::schematic::{normalize, Schematic};
pub use crate::store::MappingStore;

/// 蓝图文件魔数
pub const BP_MAGIC: &[u8; 4] = &[0x0A, 0xE5, 0xBB, 0x36];

/// 区域边长
pub const REGION_EDGE: usize = 16;

/// 每个区域的体素数
pub const REGION_VOLUME: usize = REGION_EDGE * REGION_EDGE * REGION_EDGE;
