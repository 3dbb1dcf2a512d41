use crate::error::ImportError;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// 源方块名的处理方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Mapping {
    /// 映射为目标方块ID
    Map {
        #[serde(alias = "targetBlockId", deserialize_with = "de_target_id")]
        id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// 在该位置放置实体
    Entity {
        #[serde(rename = "entityName", alias = "targetEntityName")]
        entity_name: String,
    },
    Skip,
}

/// 目标ID可能以数字或字符串形式出现
fn de_target_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u32),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text.trim().parse().map_err(D::Error::custom),
    }
}

impl Mapping {
    pub fn map(id: u32) -> Self {
        Mapping::Map { id, name: None }
    }

    pub fn entity(entity_name: impl Into<String>) -> Self {
        Mapping::Entity {
            entity_name: entity_name.into(),
        }
    }

    /// 是否给出了可用的结果（ID 0 是目标空间的空方块，视同跳过）
    pub fn is_resolved(&self) -> bool {
        match self {
            Mapping::Map { id, .. } => *id > 0,
            Mapping::Entity { entity_name } => !entity_name.is_empty(),
            Mapping::Skip => false,
        }
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mapping::Map { id, name: Some(name) } => write!(f, "{} ({})", id, name),
            Mapping::Map { id, name: None } => write!(f, "{}", id),
            Mapping::Entity { entity_name } => write!(f, "entity:{}", entity_name),
            Mapping::Skip => write!(f, "skip"),
        }
    }
}

impl FromStr for Mapping {
    type Err = ImportError;

    /// 命令行写法：`skip`、`<id>`、`map:<id>`、`entity:<名称>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("skip") {
            return Ok(Mapping::Skip);
        }
        if let Some(entity) = s.strip_prefix("entity:") {
            let entity = entity.trim();
            if entity.is_empty() {
                return Err(ImportError::InvalidMapping("实体名为空".to_string()));
            }
            return Ok(Mapping::entity(entity));
        }
        let id = s.strip_prefix("map:").unwrap_or(s).trim();
        id.parse::<u32>()
            .map(Mapping::map)
            .map_err(|_| ImportError::InvalidMapping(s.to_string()))
    }
}

/// 源方块名 -> 映射，区分大小写的精确匹配
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable {
    entries: BTreeMap<String, Mapping>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Mapping> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, mapping: Mapping) -> Option<Mapping> {
        self.entries.insert(name.into(), mapping)
    }

    pub fn remove(&mut self, name: &str) -> Option<Mapping> {
        self.entries.remove(name)
    }

    /// 合并确认结果，新条目覆盖旧条目
    pub fn merge(&mut self, confirmed: MappingTable) {
        self.entries.extend(confirmed.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Mapping)> {
        self.entries.iter()
    }
}

impl FromIterator<(String, Mapping)> for MappingTable {
    fn from_iter<I: IntoIterator<Item = (String, Mapping)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// 默认映射表与“最佳猜测”
pub trait Suggest {
    /// 静态默认表中的条目（可能是显式的 Skip）
    fn default_mapping(&self, name: &str) -> Option<Mapping>;

    /// 启发式猜测
    fn guess(&self, name: &str) -> Option<Mapping>;

    fn suggest(&self, name: &str) -> Option<Mapping> {
        self.default_mapping(name).or_else(|| self.guess(name))
    }
}

/// 目标方块类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetBlock {
    pub id: u32,
    pub name: String,
}

/// 内置目标方块目录
const TARGET_CATALOGUE: &[(u32, &str)] = &[
    (1, "bricks"),
    (2, "cobblestone"),
    (3, "dirt"),
    (4, "glass"),
    (5, "grass"),
    (6, "gravel"),
    (7, "ice"),
    (8, "lava"),
    (9, "leaves"),
    (10, "log"),
    (11, "oak-planks"),
    (12, "sand"),
    (13, "sandstone"),
    (14, "snow"),
    (15, "stone"),
    (16, "stone-bricks"),
    (17, "water-still"),
    (18, "wool"),
    (19, "clay"),
    (20, "andesite"),
    (21, "granite"),
    (22, "diorite"),
    (23, "deepslate"),
    (24, "mossy-cobblestone"),
    (25, "obsidian"),
];

/// 内置默认映射（按源方块全名）
const DEFAULT_BLOCKS: &[(&str, u32)] = &[
    ("minecraft:stone", 15),
    ("minecraft:cobblestone", 2),
    ("minecraft:dirt", 3),
    ("minecraft:coarse_dirt", 3),
    ("minecraft:grass_block", 5),
    ("minecraft:sand", 12),
    ("minecraft:gravel", 6),
    ("minecraft:glass", 4),
    ("minecraft:oak_planks", 11),
    ("minecraft:oak_log", 10),
    ("minecraft:oak_leaves", 9),
    ("minecraft:bricks", 1),
    ("minecraft:stone_bricks", 16),
    ("minecraft:sandstone", 13),
    ("minecraft:snow_block", 14),
    ("minecraft:ice", 7),
    ("minecraft:water", 17),
    ("minecraft:lava", 8),
    ("minecraft:white_wool", 18),
    ("minecraft:clay", 19),
];

const DEFAULT_SKIPPED: &[&str] = &["minecraft:air", "minecraft:cave_air", "minecraft:void_air"];

const DEFAULT_ENTITIES: &[(&str, &str)] = &[
    ("minecraft:oak_sapling", "oak-tree"),
    ("minecraft:torch", "torch"),
    ("minecraft:lantern", "lantern"),
];

/// 按名称中的单词归类的兜底规则，顺序即优先级（单词也可带复数 s）
const KEYWORD_FAMILIES: &[(&str, &str)] = &[
    ("planks", "oak-planks"),
    ("leaves", "leaves"),
    ("log", "log"),
    ("wood", "log"),
    ("stem", "log"),
    ("wool", "wool"),
    ("glass", "glass"),
    ("brick", "bricks"),
    ("sandstone", "sandstone"),
    ("cobblestone", "cobblestone"),
    ("deepslate", "deepslate"),
    ("stone", "stone"),
    ("sand", "sand"),
    ("dirt", "dirt"),
    ("snow", "snow"),
    ("ice", "ice"),
];

/// 去掉命名空间与方块状态后缀: `minecraft:oak_log[axis=y]` -> `oak_log`
pub fn base_name(name: &str) -> &str {
    let without_state = name.split('[').next().unwrap_or(name);
    without_state.rsplit(':').next().unwrap_or(without_state)
}

/// 小写并只保留字母数字
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// 内置默认表 + 启发式
#[derive(Debug, Clone)]
pub struct DefaultSuggester {
    defaults: HashMap<String, Mapping>,
    catalogue: Vec<TargetBlock>,
    by_normalized: HashMap<String, usize>,
}

impl Default for DefaultSuggester {
    fn default() -> Self {
        Self::with_catalogue(Vec::new())
    }
}

impl DefaultSuggester {
    /// 在内置目录基础上追加目标方块类型（同名时追加项优先）
    pub fn with_catalogue(extra: Vec<TargetBlock>) -> Self {
        let mut catalogue: Vec<TargetBlock> = TARGET_CATALOGUE
            .iter()
            .map(|&(id, name)| TargetBlock {
                id,
                name: name.to_string(),
            })
            .collect();
        catalogue.extend(extra);

        let by_normalized = catalogue
            .iter()
            .enumerate()
            .map(|(i, block)| (normalize_name(&block.name), i))
            .collect();

        let mut defaults: HashMap<String, Mapping> = DEFAULT_BLOCKS
            .iter()
            .map(|&(name, id)| (name.to_string(), Mapping::map(id)))
            .collect();
        defaults.extend(DEFAULT_SKIPPED.iter().map(|&name| (name.to_string(), Mapping::Skip)));
        defaults.extend(
            DEFAULT_ENTITIES
                .iter()
                .map(|&(name, entity)| (name.to_string(), Mapping::entity(entity))),
        );

        Self {
            defaults,
            catalogue,
            by_normalized,
        }
    }

    pub fn catalogue(&self) -> &[TargetBlock] {
        &self.catalogue
    }

    fn catalogue_mapping(&self, name: &str) -> Option<Mapping> {
        let index = *self.by_normalized.get(&normalize_name(name))?;
        let block = &self.catalogue[index];
        Some(Mapping::Map {
            id: block.id,
            name: Some(block.name.clone()),
        })
    }
}

impl Suggest for DefaultSuggester {
    fn default_mapping(&self, name: &str) -> Option<Mapping> {
        self.defaults.get(name).cloned()
    }

    fn guess(&self, name: &str) -> Option<Mapping> {
        let base = base_name(name);
        if let Some(mapping) = self.catalogue_mapping(base) {
            return Some(mapping);
        }
        if let Some(stripped) = base.strip_suffix("_block") {
            if let Some(mapping) = self.catalogue_mapping(stripped) {
                return Some(mapping);
            }
        }

        let words: Vec<String> = base.split('_').map(normalize_name).collect();
        KEYWORD_FAMILIES
            .iter()
            .find(|(keyword, _)| {
                words
                    .iter()
                    .any(|w| w == keyword || w.strip_suffix('s') == Some(*keyword))
            })
            .and_then(|(_, target)| self.catalogue_mapping(target))
    }
}

/// 名称重映射器：覆盖表优先，其次默认表与启发式，最后跳过
#[derive(Clone, Copy)]
pub struct NameRemapper<'a> {
    overrides: &'a MappingTable,
    suggester: &'a dyn Suggest,
}

impl<'a> NameRemapper<'a> {
    pub fn new(overrides: &'a MappingTable, suggester: &'a dyn Suggest) -> Self {
        Self { overrides, suggester }
    }

    pub fn resolve(&self, name: &str) -> Mapping {
        if let Some(mapping) = self.overrides.get(name) {
            return mapping.clone();
        }
        self.suggester.suggest(name).unwrap_or(Mapping::Skip)
    }

    /// 覆盖表、默认表与启发式都没有给出结果的名称需要人工确认
    ///
    /// 默认表里显式跳过的名称（如空气）视为已知，不再询问。
    pub fn is_unmapped(&self, name: &str) -> bool {
        if self.overrides.get(name).is_some_and(Mapping::is_resolved) {
            return false;
        }
        if self.suggester.default_mapping(name).is_some() {
            return false;
        }
        !self.suggester.guess(name).is_some_and(|m| m.is_resolved())
    }
}
