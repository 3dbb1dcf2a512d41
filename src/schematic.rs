use crate::{
    error::FormatError,
    types::{BlockPos, EntityPlacement, TerrainMap},
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 以原点为基准的相对结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schematic {
    /// 相对坐标 -> 目标方块ID，序列化为 "x,y,z" 键
    #[serde(with = "coord_map")]
    pub blocks: BTreeMap<BlockPos, u32>,
    #[serde(default)]
    pub entities: Vec<EntityPlacement>,
    /// 归一化时减去的偏移；空结构为 None
    #[serde(default, with = "origin_object")]
    pub origin: Option<BlockPos>,
    /// 包围盒尺寸 (x, y, z)
    #[serde(default)]
    pub size: [u32; 3],
}

impl Schematic {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.entities.is_empty()
    }
}

/// 求分量最小值与最大值
fn bounds(positions: impl Iterator<Item = BlockPos>) -> Option<(BlockPos, BlockPos)> {
    positions.fold(None, |acc, pos| match acc {
        None => Some((pos, pos)),
        Some((min, max)) => Some((min.min(pos), max.max(pos))),
    })
}

/// 相对原点的坐标；跨度超过 i32 时报错
fn relative(position: BlockPos, origin: BlockPos) -> Result<BlockPos, FormatError> {
    position
        .checked_relative_to(origin)
        .ok_or(FormatError::ExtentOverflow { origin, position })
}

/// 包围盒尺寸；相对坐标不超过 i32::MAX，加一后仍在 u32 内
fn extent(min: BlockPos, max: BlockPos) -> Result<[u32; 3], FormatError> {
    let span = relative(max, min)?;
    Ok([span.x as u32 + 1, span.y as u32 + 1, span.z as u32 + 1])
}

/// 将绝对坐标的地形与实体平移到以最小角为原点的相对坐标
///
/// 有方块时，原点取方块坐标的分量最小值，实体也按这个原点平移（即使实体落在方块包围盒之外）。
/// 没有方块时，实体按自身的分量最小值平移。
/// 任何相对坐标无法用 i32 表示时整个结构作废。
pub fn normalize(
    terrain: &TerrainMap,
    entities: Vec<EntityPlacement>,
) -> Result<Schematic, FormatError> {
    let block_bounds = bounds(terrain.keys().copied());
    let (origin, size) = match block_bounds {
        Some((min, max)) => (min, extent(min, max)?),
        None => match bounds(entities.iter().map(|e| e.position)) {
            Some((min, max)) => {
                debug!("没有方块，实体按自身最小坐标 {} 归一化", min);
                (min, extent(min, max)?)
            }
            None => return Ok(Schematic::default()),
        },
    };

    let blocks = terrain
        .iter()
        .map(|(&pos, &id)| Ok((relative(pos, origin)?, id)))
        .collect::<Result<_, FormatError>>()?;
    let entities = entities
        .into_iter()
        .map(|mut entity| {
            entity.position = relative(entity.position, origin)?;
            Ok(entity)
        })
        .collect::<Result<_, FormatError>>()?;

    Ok(Schematic {
        blocks,
        entities,
        origin: Some(origin),
        size,
    })
}

/// 坐标映射的 "x,y,z" 字符串键形式
pub(crate) mod coord_map {
    use crate::types::BlockPos;
    use serde::{de::Error as _, ser::SerializeMap, Deserialize, Deserializer, Serializer};
    use std::collections::{BTreeMap, HashMap};

    pub fn serialize<S: Serializer>(
        blocks: &BTreeMap<BlockPos, u32>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(blocks.len()))?;
        for (pos, id) in blocks {
            map.serialize_entry(&pos.to_string(), id)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<BlockPos, u32>, D::Error> {
        let raw = HashMap::<String, u32>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, id)| key.parse::<BlockPos>().map(|pos| (pos, id)).map_err(D::Error::custom))
            .collect()
    }
}

/// 原点序列化为 {x, y, z} 对象
mod origin_object {
    use crate::types::BlockPos;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Xyz {
        x: i32,
        y: i32,
        z: i32,
    }

    pub fn serialize<S: Serializer>(
        origin: &Option<BlockPos>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        origin
            .map(|p| Xyz { x: p.x, y: p.y, z: p.z })
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BlockPos>, D::Error> {
        Ok(Option::<Xyz>::deserialize(deserializer)?.map(|p| BlockPos::new(p.x, p.y, p.z)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terrain(entries: &[((i32, i32, i32), u32)]) -> TerrainMap {
        entries
            .iter()
            .map(|&((x, y, z), id)| (BlockPos::new(x, y, z), id))
            .collect()
    }

    #[test]
    fn translates_to_minimum_corner() {
        let map = terrain(&[((5, 10, 5), 1), ((7, 10, 8), 2), ((5, 12, 5), 3)]);
        let schematic = normalize(&map, vec![]).unwrap();

        assert_eq!(schematic.origin, Some(BlockPos::new(5, 10, 5)));
        assert_eq!(schematic.blocks.len(), 3);
        assert_eq!(schematic.blocks.get(&BlockPos::new(0, 0, 0)), Some(&1));
        assert_eq!(schematic.blocks.get(&BlockPos::new(2, 0, 3)), Some(&2));
        assert_eq!(schematic.blocks.get(&BlockPos::new(0, 2, 0)), Some(&3));
        assert_eq!(schematic.size, [3, 3, 4]);
    }

    #[test]
    fn entities_follow_block_origin() {
        let map = terrain(&[((-4, 60, 2), 1), ((0, 64, 2), 1)]);
        let entities = vec![EntityPlacement::new("tree", BlockPos::new(-2, 61, 3))];
        let schematic = normalize(&map, entities).unwrap();
        assert_eq!(schematic.origin, Some(BlockPos::new(-4, 60, 2)));
        assert_eq!(schematic.entities[0].position, BlockPos::new(2, 1, 1));
        assert_eq!(schematic.entities[0].rotation, [0.0; 3]);
    }

    #[test]
    fn entities_without_blocks_use_their_own_minimum() {
        let entities = vec![
            EntityPlacement::new("tree", BlockPos::new(10, 5, -3)),
            EntityPlacement::new("rock", BlockPos::new(8, 7, -1)),
        ];
        let schematic = normalize(&TerrainMap::new(), entities).unwrap();
        assert!(schematic.blocks.is_empty());
        assert_eq!(schematic.origin, Some(BlockPos::new(8, 5, -3)));
        assert_eq!(schematic.entities[0].position, BlockPos::new(2, 0, 0));
        assert_eq!(schematic.entities[1].position, BlockPos::new(0, 2, 2));
    }

    #[test]
    fn empty_input_gives_empty_schematic() {
        let schematic = normalize(&TerrainMap::new(), vec![]).unwrap();
        assert!(schematic.is_empty());
        assert_eq!(schematic.origin, None);
        assert_eq!(schematic.size, [0, 0, 0]);
    }

    #[test]
    fn json_uses_coordinate_string_keys() {
        let map = terrain(&[((1, 2, 3), 7), ((2, 2, 3), 8)]);
        let schematic = normalize(&map, vec![]).unwrap();
        let json = serde_json::to_value(&schematic).unwrap();
        assert_eq!(json["blocks"]["0,0,0"], 7);
        assert_eq!(json["blocks"]["1,0,0"], 8);
        assert_eq!(json["origin"], serde_json::json!({"x": 1, "y": 2, "z": 3}));

        let back: Schematic = serde_json::from_value(json).unwrap();
        assert_eq!(back, schematic);

        let bad = serde_json::json!({"blocks": {"1,2": 3}});
        assert!(serde_json::from_value::<Schematic>(bad).is_err());
    }

    #[test]
    fn span_wider_than_i32_is_rejected() {
        let map = terrain(&[((i32::MAX, 0, 0), 1), ((i32::MIN, 0, 0), 1)]);
        assert!(matches!(
            normalize(&map, vec![]),
            Err(FormatError::ExtentOverflow { .. })
        ));

        let far_entity = vec![EntityPlacement::new("tree", BlockPos::new(0, i32::MIN, 0))];
        let map = terrain(&[((0, 1, 0), 1)]);
        assert!(normalize(&map, far_entity).is_err());
    }

    #[test]
    fn widest_representable_span_fits() {
        let map = terrain(&[((i32::MAX, 0, 0), 1), ((0, 0, 0), 2)]);
        let schematic = normalize(&map, vec![]).unwrap();
        assert_eq!(schematic.size, [i32::MAX as u32 + 1, 1, 1]);
        assert_eq!(schematic.blocks.get(&BlockPos::new(i32::MAX, 0, 0)), Some(&1));
    }
}
