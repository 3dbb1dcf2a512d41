// NBT 标签树的解码与形态适配
// 解码本身交给 fastnbt，这里只负责把两种嵌套形态（扁平 / value 包装）统一成一种视图

use crate::palette::compose_long_pair;
use fastnbt::Value;

/// 标签树解码器
pub trait TagDecoder {
    /// 将未压缩的 NBT 字节解码为标签树
    fn decode(&self, bytes: &[u8]) -> Result<Value, String>;
}

/// 基于 fastnbt 的默认解码器
#[derive(Debug, Clone, Copy, Default)]
pub struct FastNbtDecoder;

impl TagDecoder for FastNbtDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Value, String> {
        if bytes.is_empty() {
            return Err("NBT数据为空".to_string());
        }
        fastnbt::from_bytes::<Value>(bytes).map_err(|e| e.to_string())
    }
}

/// 将标签树编码为未压缩的 NBT 字节（根必须是 Compound）
pub fn encode_tags(value: &Value) -> Result<Vec<u8>, String> {
    fastnbt::to_bytes(value).map_err(|e| e.to_string())
}

/// 剥掉 `{ value: ... }` 包装层，直到遇到真正的节点
fn unwrap_value(mut node: &Value) -> &Value {
    while let Value::Compound(map) = node {
        match map.get("value") {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// 标签树的只读视图
///
/// 无论解码器产出的是扁平形态（`list`）还是包装形态（`list.value.value`），
/// 视图都会先剥掉包装层，调用方不需要关心具体形态。
#[derive(Debug, Clone, Copy)]
pub struct TagView<'a> {
    node: &'a Value,
}

impl<'a> TagView<'a> {
    pub fn new(node: &'a Value) -> Self {
        Self {
            node: unwrap_value(node),
        }
    }

    /// 剥掉包装后的原始节点
    pub fn raw(&self) -> &'a Value {
        self.node
    }

    /// 按名称查找子节点
    pub fn get(&self, key: &str) -> Option<TagView<'a>> {
        match self.node {
            Value::Compound(map) => map.get(key).map(TagView::new),
            _ => None,
        }
    }

    pub fn list(&self) -> Option<Vec<TagView<'a>>> {
        match self.node {
            Value::List(items) => Some(items.iter().map(TagView::new).collect()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self.node {
            Value::Byte(v) => Some(v as i64),
            Value::Short(v) => Some(v as i64),
            Value::Int(v) => Some(v as i64),
            Value::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match self.node {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 读取打包的64位字数组
    ///
    /// 支持 LongArray、Long 列表，以及（高位，低位）32位整数对的列表。
    /// 无法识别的元素按 0 处理，保持后续字的位置不变。
    pub fn words(&self) -> Option<Vec<u64>> {
        match self.node {
            Value::LongArray(longs) => Some(longs.iter().map(|&v| v as u64).collect()),
            Value::List(items) => Some(
                items
                    .iter()
                    .map(|item| word_from_item(TagView::new(item)))
                    .collect(),
            ),
            _ => None,
        }
    }
}

fn word_from_item(item: TagView<'_>) -> u64 {
    match item.raw() {
        Value::Long(v) => *v as u64,
        Value::IntArray(pair) if pair.len() == 2 => {
            compose_long_pair(pair[0] as u32, pair[1] as u32)
        }
        Value::List(pair) if pair.len() == 2 => {
            let hi = TagView::new(&pair[0]).as_int();
            let lo = TagView::new(&pair[1]).as_int();
            match (hi, lo) {
                (Some(hi), Some(lo)) => compose_long_pair(hi as u32, lo as u32),
                _ => 0,
            }
        }
        _ => 0,
    }
}
