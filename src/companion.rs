//! JSON 组件文件导入
//!
//! 组件文件是已解码的方块表：`{"schematic": {"blocks": {"x,y,z": 源ID}}}` 或直接 `{"blocks": {...}}`，
//! 可选的图例 `blocksMeta` / `blockDetails` 把源ID映射为方块名。有图例时，名称同样经过重映射与确认流程。

use crate::{
    assembler::Discovery,
    error::{FormatError, ImportError},
    remap::{Mapping, NameRemapper},
    schematic::{normalize, Schematic},
    types::{BlockPos, EntityPlacement, TerrainMap},
};
use log::{debug, warn};
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};

/// 解析后的组件文件
#[derive(Debug, Clone, PartialEq)]
pub struct CompanionFile {
    pub name: Option<String>,
    pub prompt: Option<String>,
    /// 坐标 -> 源ID
    pub blocks: BTreeMap<BlockPos, u32>,
    pub entities: Vec<EntityPlacement>,
    /// 源ID（字符串形式）-> 方块名
    pub legend: Option<HashMap<String, String>>,
}

fn companion_error(message: impl Into<String>) -> ImportError {
    ImportError::Companion(message.into())
}

fn source_id(value: &JsonValue) -> Option<u32> {
    match value {
        JsonValue::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_legend(meta: &Map<String, JsonValue>) -> HashMap<String, String> {
    meta.iter()
        .map(|(key, info)| {
            let name = match info {
                JsonValue::String(s) => Some(s.clone()),
                JsonValue::Object(obj) => obj
                    .get("name")
                    .or_else(|| obj.get("id"))
                    .and_then(|v| match v {
                        JsonValue::String(s) => Some(s.clone()),
                        JsonValue::Number(n) => Some(n.to_string()),
                        _ => None,
                    }),
                _ => None,
            };
            (key.clone(), name.unwrap_or_else(|| key.clone()))
        })
        .collect()
}

/// 坐标分量：整数或四舍五入的小数，超出 i32 范围视为无效
fn coordinate(value: &JsonValue) -> Option<i32> {
    if let Some(v) = value.as_i64() {
        return i32::try_from(v).ok();
    }
    let v = value.as_f64()?.round();
    (v >= i32::MIN as f64 && v <= i32::MAX as f64).then_some(v as i32)
}

fn read_entity(item: &JsonValue) -> Option<EntityPlacement> {
    let name = item.get("entityName")?.as_str().filter(|n| !n.is_empty())?;
    let position = match item.get("position")?.as_array()?.as_slice() {
        [x, y, z] => BlockPos::new(coordinate(x)?, coordinate(y)?, coordinate(z)?),
        _ => return None,
    };

    let mut entity = EntityPlacement::new(name, position);
    let rotation = item.get("rotation").and_then(JsonValue::as_array).map(Vec::as_slice);
    if let Some([rx, ry, rz]) = rotation {
        entity.rotation = [
            rx.as_f64().unwrap_or(0.0) as f32,
            ry.as_f64().unwrap_or(0.0) as f32,
            rz.as_f64().unwrap_or(0.0) as f32,
        ];
    }
    Some(entity)
}

impl CompanionFile {
    pub fn parse(json: &str) -> Result<Self, ImportError> {
        let data: JsonValue = serde_json::from_str(json)?;
        let root = data
            .as_object()
            .ok_or_else(|| companion_error("根节点不是对象"))?;

        let schematic = match root.get("schematic") {
            Some(JsonValue::Object(schematic)) => schematic,
            _ if root.contains_key("blocks") => root,
            _ => return Err(companion_error("文件中没有组件结构")),
        };
        let block_object = match schematic.get("blocks") {
            Some(JsonValue::Object(blocks)) => blocks,
            Some(_) => return Err(companion_error("blocks 不是对象")),
            None => schematic,
        };

        let mut blocks = BTreeMap::new();
        for (key, value) in block_object {
            let pos = key
                .parse::<BlockPos>()
                .map_err(|e| companion_error(e.to_string()))?;
            let id = source_id(value)
                .ok_or_else(|| companion_error(format!("坐标 {} 的方块ID无效", key)))?;
            blocks.insert(pos, id);
        }

        let entities = match schematic.get("entities") {
            Some(JsonValue::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| {
                    let entity = read_entity(item);
                    if entity.is_none() {
                        warn!("组件实体 #{} 无法解析，已跳过", i);
                    }
                    entity
                })
                .collect(),
            Some(_) => {
                warn!("组件实体列表不是数组，已忽略");
                Vec::new()
            }
            None => Vec::new(),
        };

        let legend = root
            .get("blocksMeta")
            .or_else(|| root.get("blockDetails"))
            .and_then(JsonValue::as_object)
            .map(parse_legend);

        let text = |key: &str| root.get(key).and_then(JsonValue::as_str).map(str::to_string);

        debug!("组件文件: {} 个方块, 图例 {}", blocks.len(), legend.is_some());

        Ok(Self {
            name: text("name"),
            prompt: text("prompt"),
            blocks,
            entities,
            legend,
        })
    }

    /// 源ID对应的方块名；图例里没有时为 `Block_<ID>`
    pub fn source_name(&self, id: u32) -> String {
        self.legend
            .as_ref()
            .and_then(|legend| legend.get(&id.to_string()).cloned())
            .unwrap_or_else(|| format!("Block_{}", id))
    }

    /// 统计名称与待确认名称；没有图例时无需确认
    pub fn discover(&self, remapper: &NameRemapper<'_>) -> Discovery {
        let mut discovery = Discovery::default();
        if self.legend.is_none() {
            return discovery;
        }

        for &id in self.blocks.values() {
            *discovery.counts.entry(self.source_name(id)).or_insert(0) += 1;
        }
        discovery.unmapped = discovery
            .counts
            .keys()
            .filter(|name| remapper.is_unmapped(name))
            .cloned()
            .collect();
        discovery
    }

    /// 生成归一化结构；没有图例时源ID直接作为目标ID
    pub fn commit(&self, remapper: &NameRemapper<'_>) -> Result<Schematic, FormatError> {
        let mut terrain = TerrainMap::new();
        let mut entities = self.entities.clone();

        if self.legend.is_none() {
            terrain.extend(
                self.blocks
                    .iter()
                    .filter(|(_, &id)| id > 0)
                    .map(|(&pos, &id)| (pos, id)),
            );
            return normalize(&terrain, entities);
        }

        let mut resolved: HashMap<u32, Mapping> = HashMap::new();
        for (&pos, &id) in &self.blocks {
            let mapping = resolved
                .entry(id)
                .or_insert_with(|| remapper.resolve(&self.source_name(id)));
            match mapping {
                Mapping::Map { id: target, .. } if *target > 0 => {
                    terrain.insert(pos, *target);
                }
                Mapping::Entity { entity_name } if !entity_name.is_empty() => {
                    entities.push(EntityPlacement::new(entity_name.clone(), pos));
                }
                _ => {}
            }
        }

        normalize(&terrain, entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remap::{DefaultSuggester, MappingTable};

    const WITH_LEGEND: &str = r#"{
        "name": "Well",
        "schematic": {"blocks": {"10,0,10": 1, "11,0,10": 2, "10,1,10": "3", "12,0,10": 1}},
        "blocksMeta": {"1": {"name": "minecraft:stone"}, "2": {"id": "mod:pump"}}
    }"#;

    #[test]
    fn parses_nested_and_flat_layouts() {
        let nested = CompanionFile::parse(WITH_LEGEND).unwrap();
        assert_eq!(nested.name.as_deref(), Some("Well"));
        assert_eq!(nested.blocks.len(), 4);
        assert_eq!(nested.blocks.get(&BlockPos::new(10, 1, 10)), Some(&3));
        assert_eq!(nested.source_name(2), "mod:pump");
        assert_eq!(nested.source_name(3), "Block_3");

        let flat = CompanionFile::parse(r#"{"blocks": {"0,0,0": 4}}"#).unwrap();
        assert!(flat.legend.is_none());
        assert_eq!(flat.blocks.get(&BlockPos::new(0, 0, 0)), Some(&4));
    }

    #[test]
    fn rejects_malformed_files() {
        assert!(CompanionFile::parse("[]").is_err());
        assert!(CompanionFile::parse(r#"{"other": 1}"#).is_err());
        assert!(CompanionFile::parse(r#"{"blocks": {"0,0": 1}}"#).is_err());
        assert!(CompanionFile::parse(r#"{"blocks": {"0,0,0": "stone"}}"#).is_err());
    }

    #[test]
    fn legend_names_go_through_discovery_and_commit() {
        let file = CompanionFile::parse(WITH_LEGEND).unwrap();
        let suggester = DefaultSuggester::default();
        let empty = MappingTable::new();
        let discovery = file.discover(&NameRemapper::new(&empty, &suggester));

        assert_eq!(discovery.counts.get("minecraft:stone"), Some(&2));
        assert_eq!(
            discovery.unmapped.iter().cloned().collect::<Vec<_>>(),
            vec!["Block_3".to_string(), "mod:pump".to_string()]
        );

        let mut confirmed = MappingTable::new();
        confirmed.insert("mod:pump", Mapping::entity("pump"));
        let schematic = file.commit(&NameRemapper::new(&confirmed, &suggester)).unwrap();

        assert_eq!(schematic.origin, Some(BlockPos::new(10, 0, 10)));
        assert_eq!(schematic.blocks.len(), 2);
        assert_eq!(schematic.blocks.get(&BlockPos::new(2, 0, 0)), Some(&15));
        assert_eq!(schematic.entities.len(), 1);
        assert_eq!(schematic.entities[0].position, BlockPos::new(1, 0, 0));
    }

    #[test]
    fn without_legend_ids_pass_through() {
        let file = CompanionFile::parse(r#"{"blocks": {"3,3,3": 5, "4,3,3": 0}}"#).unwrap();
        let suggester = DefaultSuggester::default();
        let empty = MappingTable::new();
        let remapper = NameRemapper::new(&empty, &suggester);

        assert_eq!(file.discover(&remapper), Discovery::default());
        let schematic = file.commit(&remapper).unwrap();
        assert_eq!(schematic.blocks.len(), 1);
        assert_eq!(schematic.blocks.get(&BlockPos::new(0, 0, 0)), Some(&5));
    }

    #[test]
    fn entities_are_read_one_by_one() {
        let file = CompanionFile::parse(
            r#"{"schematic": {"blocks": {"0,0,0": 1}, "entities": [
                {"entityName": "tree", "position": [1, 0, 0]},
                {"entityName": "rock", "position": [2.6, -0.4, 3], "rotation": [0, 90, 0]},
                {"entityName": "broken", "position": [1, 2]},
                {"position": [0, 0, 0]}
            ]}}"#,
        )
        .unwrap();

        assert_eq!(file.entities.len(), 2);
        assert_eq!(file.entities[0], EntityPlacement::new("tree", BlockPos::new(1, 0, 0)));
        assert_eq!(file.entities[1].position, BlockPos::new(3, 0, 3));
        assert_eq!(file.entities[1].rotation, [0.0, 90.0, 0.0]);

        let empty = MappingTable::new();
        let suggester = DefaultSuggester::default();
        let schematic = file.commit(&NameRemapper::new(&empty, &suggester)).unwrap();
        assert_eq!(schematic.entities.len(), 2);
    }

    #[test]
    fn extreme_coordinates_are_rejected() {
        let json = r#"{"blocks": {"2147483647,0,0": 1, "-2147483648,0,0": 1}}"#;
        let file = CompanionFile::parse(json).unwrap();
        let empty = MappingTable::new();
        let suggester = DefaultSuggester::default();
        assert!(matches!(
            file.commit(&NameRemapper::new(&empty, &suggester)),
            Err(FormatError::ExtentOverflow { .. })
        ));
    }
}
