use crate::{
    nbt::TagView,
    palette,
    types::BlockPos,
    REGION_EDGE, REGION_VOLUME,
};
use fastnbt::Value;
use log::warn;
use std::collections::BTreeMap;

/// 调色板条目，方块状态属性只做保留
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteEntry {
    pub name: Option<String>,
    pub properties: BTreeMap<String, String>,
}

/// 16×16×16 区域
#[derive(Debug, Clone)]
pub struct Region {
    /// 区域坐标（以16格为单位）
    pub origin: BlockPos,
    pub palette: Vec<PaletteEntry>,
    pub words: Vec<u64>,
}

impl Region {
    /// 区域在世界中的起点坐标，溢出时返回 None
    pub fn base(&self) -> Option<BlockPos> {
        let edge = REGION_EDGE as i32;
        Some(BlockPos::new(
            self.origin.x.checked_mul(edge)?,
            self.origin.y.checked_mul(edge)?,
            self.origin.z.checked_mul(edge)?,
        ))
    }

    /// 每个体素的调色板索引
    pub fn indices(&self) -> Vec<u32> {
        palette::unpack(&self.words, self.palette.len(), REGION_VOLUME)
    }
}

/// 找到结构中的区域列表（扁平或 value 包装形态都可以）
pub fn region_views(structure: &Value) -> Vec<TagView<'_>> {
    TagView::new(structure)
        .get("BlockRegion")
        .and_then(|regions| regions.list())
        .unwrap_or_default()
}

fn origin_component(view: TagView<'_>, key: &str) -> Option<i32> {
    view.get(key)?.as_int().and_then(|v| i32::try_from(v).ok())
}

fn read_palette_entry(view: TagView<'_>) -> PaletteEntry {
    let name = view.get("Name").and_then(|n| n.as_str()).map(str::to_string);
    let properties = match view.get("Properties").map(|p| p.raw()) {
        Some(Value::Compound(map)) => map
            .iter()
            .filter_map(|(k, v)| TagView::new(v).as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
        _ => BTreeMap::new(),
    };
    PaletteEntry { name, properties }
}

/// 读取单个区域；缺少原点、调色板或数据的区域整体跳过
pub fn read_region(view: TagView<'_>, index: usize) -> Option<Region> {
    let origin = match (
        origin_component(view, "X"),
        origin_component(view, "Y"),
        origin_component(view, "Z"),
    ) {
        (Some(x), Some(y), Some(z)) => BlockPos::new(x, y, z),
        _ => {
            warn!("区域 #{} 缺少原点坐标，已跳过", index);
            return None;
        }
    };

    let Some(block_states) = view.get("BlockStates") else {
        warn!("区域 #{} 缺少 BlockStates，已跳过", index);
        return None;
    };

    let palette: Vec<PaletteEntry> = block_states
        .get("palette")
        .and_then(|p| p.list())
        .unwrap_or_default()
        .into_iter()
        .map(read_palette_entry)
        .collect();
    if palette.is_empty() {
        warn!("区域 #{} 调色板为空，已跳过", index);
        return None;
    }

    let Some(words) = block_states.get("data").and_then(|d| d.words()) else {
        warn!("区域 #{} 缺少打包数据，已跳过", index);
        return None;
    };

    Some(Region {
        origin,
        palette,
        words,
    })
}
