use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// 方块位置（整数三元组）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// 分量取最小
    pub fn min(self, other: BlockPos) -> BlockPos {
        BlockPos::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// 分量取最大
    pub fn max(self, other: BlockPos) -> BlockPos {
        BlockPos::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> BlockPos {
        BlockPos::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// 减去原点得到相对坐标，任一分量溢出 i32 时返回 None
    pub fn checked_relative_to(self, origin: BlockPos) -> Option<BlockPos> {
        Some(BlockPos::new(
            self.x.checked_sub(origin.x)?,
            self.y.checked_sub(origin.y)?,
            self.z.checked_sub(origin.z)?,
        ))
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// 坐标键解析错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePosError(pub String);

impl fmt::Display for ParsePosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "无效的坐标键: {:?}", self.0)
    }
}

impl std::error::Error for ParsePosError {}

impl FromStr for BlockPos {
    type Err = ParsePosError;

    /// 解析 "x,y,z" 形式的坐标键，必须恰好三个整数
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(|p| p.trim().parse::<i32>());
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(x)), Some(Ok(y)), Some(Ok(z)), None) => Ok(BlockPos::new(x, y, z)),
            _ => Err(ParsePosError(s.to_string())),
        }
    }
}

/// 区域内的局部坐标 (0-15)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalPos {
    /// 蓝图使用 X-Z-Y 顺序（X 变化最快），与原版区块的 Y-Z-X 不同
    pub fn from_index(index: usize) -> Self {
        Self {
            x: (index & 15) as u8,
            z: ((index >> 4) & 15) as u8,
            y: ((index >> 8) & 15) as u8,
        }
    }

    #[cfg(test)]
    fn to_index(self) -> usize {
        let edge = crate::REGION_EDGE;
        self.x as usize + self.z as usize * edge + self.y as usize * edge * edge
    }
}

/// 绝对坐标 -> 目标方块ID
pub type TerrainMap = HashMap<BlockPos, u32>;

/// 实体放置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPlacement {
    pub entity_name: String,
    #[serde(with = "pos_array")]
    pub position: BlockPos,
    #[serde(default)]
    pub rotation: [f32; 3],
}

impl EntityPlacement {
    /// 以零旋转放置实体
    pub fn new(entity_name: impl Into<String>, position: BlockPos) -> Self {
        Self {
            entity_name: entity_name.into(),
            position,
            rotation: [0.0; 3],
        }
    }
}

/// 以 [x, y, z] 数组形式序列化坐标
pub(crate) mod pos_array {
    use super::BlockPos;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(pos: &BlockPos, serializer: S) -> Result<S::Ok, S::Error> {
        [pos.x, pos.y, pos.z].serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BlockPos, D::Error> {
        let [x, y, z] = <[i32; 3]>::deserialize(deserializer)?;
        Ok(BlockPos::new(x, y, z))
    }
}
