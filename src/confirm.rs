use crate::{
    assembler::Discovery,
    error::ImportError,
    remap::{Mapping, MappingTable},
};
use log::warn;
use std::cell::RefCell;
use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// 人工确认：展示待确认名称（附体素数），返回用户的决定
///
/// 返回空表表示“未解析的全部跳过”。
pub trait Confirm {
    fn confirm(&self, discovery: &Discovery) -> Result<MappingTable, ImportError>;
}

/// 不询问，全部跳过
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConfirm;

impl Confirm for NoConfirm {
    fn confirm(&self, _discovery: &Discovery) -> Result<MappingTable, ImportError> {
        Ok(MappingTable::new())
    }
}

/// 从 JSON 文件读取预先写好的决定，只取待确认的名称
#[derive(Debug, Clone)]
pub struct FileConfirm {
    path: PathBuf,
}

impl FileConfirm {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Confirm for FileConfirm {
    fn confirm(&self, discovery: &Discovery) -> Result<MappingTable, ImportError> {
        let content = fs::read_to_string(&self.path)?;
        let decisions: MappingTable = serde_json::from_str(&content)?;
        Ok(decisions
            .iter()
            .filter(|(name, _)| discovery.unmapped.contains(name.as_str()))
            .map(|(name, mapping)| (name.clone(), mapping.clone()))
            .collect())
    }
}

/// 逐个名称在终端询问
///
/// 输入 `skip`、目标ID、`entity:<名称>`；直接回车表示跳过。
pub struct PromptConfirm<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }
}

impl<R: BufRead, W: Write> Confirm for PromptConfirm<R, W> {
    fn confirm(&self, discovery: &Discovery) -> Result<MappingTable, ImportError> {
        let mut input = self.input.borrow_mut();
        let mut output = self.output.borrow_mut();
        let mut decisions = MappingTable::new();

        writeln!(output, "有 {} 个方块名需要确认映射:", discovery.unmapped.len())?;
        for name in &discovery.unmapped {
            let count = discovery.counts.get(name).copied().unwrap_or(0);
            loop {
                write!(output, "  {} ({} 个) [skip | <ID> | entity:<名称>]: ", name, count)?;
                output.flush()?;

                let mut line = String::new();
                if input.read_line(&mut line)? == 0 {
                    // 输入结束，剩余名称全部跳过
                    return Ok(decisions);
                }
                let line = line.trim();
                if line.is_empty() {
                    decisions.insert(name.clone(), Mapping::Skip);
                    break;
                }
                match line.parse::<Mapping>() {
                    Ok(mapping) => {
                        decisions.insert(name.clone(), mapping);
                        break;
                    }
                    Err(e) => {
                        warn!("{}", e);
                        writeln!(output, "  无法识别: {}", line)?;
                    }
                }
            }
        }

        Ok(decisions)
    }
}
