use crate::{
    region::{read_region, region_views, Region},
    remap::{Mapping, NameRemapper},
    types::{BlockPos, EntityPlacement, LocalPos, TerrainMap},
};
use fastnbt::Value;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};

/// 区域组装的两种模式：只统计名称，或生成最终方块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverOrCommit {
    Discover,
    Commit,
}

/// 发现模式的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// 需要人工确认的名称
    pub unmapped: BTreeSet<String>,
    /// 每个名称出现的体素数
    pub counts: BTreeMap<String, u32>,
}

/// 提交模式的结果（绝对坐标）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    pub terrain: TerrainMap,
    pub entities: Vec<EntityPlacement>,
}

/// 每种模式各自的累加结果
pub trait Pass: Default {
    const MODE: DiscoverOrCommit;

    /// 处理一个区域，返回无效体素数
    fn visit(&mut self, region: &Region, base: BlockPos, remapper: &NameRemapper<'_>) -> usize;
}

impl Pass for Discovery {
    const MODE: DiscoverOrCommit = DiscoverOrCommit::Discover;

    fn visit(&mut self, region: &Region, _base: BlockPos, remapper: &NameRemapper<'_>) -> usize {
        discover_region(region, remapper, self)
    }
}

impl Pass for Assembly {
    const MODE: DiscoverOrCommit = DiscoverOrCommit::Commit;

    fn visit(&mut self, region: &Region, base: BlockPos, remapper: &NameRemapper<'_>) -> usize {
        commit_region(region, base, remapper, self)
    }
}

/// 发现模式：收集无法解析的名称及体素计数
pub fn scan(structure: &Value, remapper: &NameRemapper<'_>) -> Discovery {
    run(structure, remapper)
}

/// 提交模式：生成绝对坐标的地形与实体列表
pub fn assemble(structure: &Value, remapper: &NameRemapper<'_>) -> Assembly {
    let assembly: Assembly = run(structure, remapper);
    info!(
        "组装完成: {} 个方块, {} 个实体",
        assembly.terrain.len(),
        assembly.entities.len()
    );
    assembly
}

/// 两种模式共用的区域遍历
pub fn run<P: Pass>(structure: &Value, remapper: &NameRemapper<'_>) -> P {
    let views = region_views(structure);
    debug!("{:?}: 结构包含 {} 个区域", P::MODE, views.len());

    let mut pass = P::default();
    let mut skipped_voxels = 0usize;

    for (index, view) in views.into_iter().enumerate() {
        let Some(region) = read_region(view, index) else {
            continue;
        };
        let Some(base) = region.base() else {
            warn!("区域 #{} 原点 {} 超出坐标范围，已跳过", index, region.origin);
            continue;
        };
        debug!(
            "区域 #{} @({}) 调色板 {} 项, {} 个字",
            index,
            base,
            region.palette.len(),
            region.words.len()
        );

        skipped_voxels += pass.visit(&region, base, remapper);
    }

    if skipped_voxels > 0 {
        warn!("{} 个体素的调色板索引或名称无效，已跳过", skipped_voxels);
    }

    pass
}

/// 遍历区域内每个有效体素，回调参数为局部坐标与调色板索引；返回无效体素数
fn for_each_voxel(region: &Region, mut visit: impl FnMut(LocalPos, usize)) -> usize {
    let mut skipped = 0;
    for (i, palette_index) in region.indices().into_iter().enumerate() {
        let palette_index = palette_index as usize;
        match region.palette.get(palette_index) {
            Some(entry) if entry.name.is_some() => visit(LocalPos::from_index(i), palette_index),
            _ => skipped += 1,
        }
    }
    skipped
}

fn discover_region(
    region: &Region,
    remapper: &NameRemapper<'_>,
    discovery: &mut Discovery,
) -> usize {
    let mut per_entry = vec![0u32; region.palette.len()];
    let skipped = for_each_voxel(region, |_, palette_index| per_entry[palette_index] += 1);

    for (entry, count) in region.palette.iter().zip(per_entry) {
        let Some(name) = entry.name.as_deref() else {
            continue;
        };
        if count == 0 {
            continue;
        }
        *discovery.counts.entry(name.to_string()).or_insert(0) += count;
        if remapper.is_unmapped(name) {
            discovery.unmapped.insert(name.to_string());
        }
    }

    skipped
}

fn commit_region(
    region: &Region,
    base: BlockPos,
    remapper: &NameRemapper<'_>,
    assembly: &mut Assembly,
) -> usize {
    // 每个调色板项只解析一次
    let actions: Vec<Mapping> = region
        .palette
        .iter()
        .map(|entry| match entry.name.as_deref() {
            Some(name) => remapper.resolve(name),
            None => Mapping::Skip,
        })
        .collect();

    for_each_voxel(region, |local, palette_index| {
        let world = base.offset(local.x as i32, local.y as i32, local.z as i32);
        match &actions[palette_index] {
            Mapping::Map { id, .. } if *id > 0 => {
                assembly.terrain.insert(world, *id);
            }
            Mapping::Entity { entity_name } if !entity_name.is_empty() => {
                assembly.entities.push(EntityPlacement::new(entity_name.clone(), world));
            }
            _ => {}
        }
    })
}
