use crate::{
    error::ImportError,
    remap::MappingTable,
    schematic::Schematic,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// 以原子替换方式写文件
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), ImportError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.flush()?;
    file.persist(path)
        .map_err(|e| ImportError::Store(format!("无法写入 {}: {}", path.display(), e)))?;
    Ok(())
}

/// 持久化的覆盖映射表
///
/// 进程内共享一个句柄；写入走“读取-合并-写回”，由互斥锁串行化，后写者胜出。
#[derive(Debug)]
pub struct MappingStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl MappingStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取映射表；文件不存在或内容损坏时返回空表
    pub fn load(&self) -> Result<MappingTable, ImportError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MappingTable::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<MappingTable>(&content) {
            Ok(table) => {
                debug!("已加载 {} 条映射: {}", table.len(), self.path.display());
                Ok(table)
            }
            Err(e) => {
                warn!("映射文件 {} 无法解析，按空表处理: {}", self.path.display(), e);
                Ok(MappingTable::new())
            }
        }
    }

    /// 在锁内读取、修改并写回，返回修改后的表
    pub fn update(&self, f: impl FnOnce(&mut MappingTable)) -> Result<MappingTable, ImportError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut table = self.load()?;
        f(&mut table);
        let json = serde_json::to_vec_pretty(&table)?;
        write_atomically(&self.path, &json)?;
        Ok(table)
    }

    /// 合并确认结果（确认项覆盖已有项）
    pub fn merge(&self, confirmed: MappingTable) -> Result<MappingTable, ImportError> {
        if confirmed.is_empty() {
            return self.load();
        }
        self.update(|table| table.merge(confirmed))
    }
}

/// 一次导入的持久化条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchematicEntry {
    pub id: String,
    pub name: String,
    pub prompt: String,
    pub schematic: Schematic,
    pub timestamp: u64,
}

/// 导入结果的持久化接口
pub trait SchematicSink {
    /// 保存条目，返回保存位置的描述
    fn save(&self, entry: &SchematicEntry) -> Result<String, ImportError>;
}

/// 每个条目写成目录下的 `<id>.json`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

impl SchematicSink for DirectorySink {
    fn save(&self, entry: &SchematicEntry) -> Result<String, ImportError> {
        let path = self.entry_path(&entry.id);
        let json = serde_json::to_vec_pretty(entry)?;
        write_atomically(&path, &json)?;
        Ok(path.display().to_string())
    }
}
