use crate::{
    assembler::{assemble, scan, Discovery},
    companion::CompanionFile,
    confirm::Confirm,
    container::BlueprintContainer,
    error::ImportError,
    nbt::TagDecoder,
    remap::{MappingTable, NameRemapper, Suggest},
    schematic::{normalize, Schematic},
    store::{MappingStore, SchematicEntry},
    utils::{content_id, unix_millis},
    BP_MAGIC,
};
use log::{debug, info, warn};
use std::path::Path;

/// 一次导入的输入来源
#[derive(Debug, Clone)]
pub enum ImportSource {
    Blueprint(BlueprintContainer),
    Companion(CompanionFile),
}

impl ImportSource {
    fn id_prefix(&self) -> &'static str {
        match self {
            ImportSource::Blueprint(_) => "bp",
            ImportSource::Companion(_) => "comp",
        }
    }
}

/// 已解析、等待确认的导入
#[derive(Debug, Clone)]
pub struct PendingImport {
    pub name: String,
    pub source: ImportSource,
    pub discovery: Discovery,
}

/// 文件名去掉扩展名
fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("Imported")
        .to_string()
}

/// 两阶段导入：先发现未知名称，再带着确认结果提交
///
/// 覆盖映射表由 `MappingStore` 持有，两个阶段都从它读取；确认结果在提交前合并进去。
pub struct Importer<'a> {
    store: &'a MappingStore,
    suggester: &'a dyn Suggest,
    decoder: &'a dyn TagDecoder,
}

impl<'a> Importer<'a> {
    pub fn new(
        store: &'a MappingStore,
        suggester: &'a dyn Suggest,
        decoder: &'a dyn TagDecoder,
    ) -> Self {
        Self {
            store,
            suggester,
            decoder,
        }
    }

    /// 按内容识别文件类型：蓝图魔数，否则按 JSON 组件文件处理
    pub fn open(&self, bytes: &[u8], file_name: &str) -> Result<ImportSource, ImportError> {
        let looks_like_json = file_name.to_lowercase().ends_with(".json")
            || bytes.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{');

        if looks_like_json && !bytes.starts_with(BP_MAGIC) {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| ImportError::Companion(format!("不是 UTF-8 文本: {}", e)))?;
            return Ok(ImportSource::Companion(CompanionFile::parse(text)?));
        }

        Ok(ImportSource::Blueprint(BlueprintContainer::parse(bytes, self.decoder)?))
    }

    /// 发现阶段：统计名称并找出需要确认的名称
    pub fn discover(
        &self,
        source: ImportSource,
        file_name: &str,
    ) -> Result<PendingImport, ImportError> {
        let overrides = self.store.load()?;
        let remapper = NameRemapper::new(&overrides, self.suggester);

        let (name, discovery) = match &source {
            ImportSource::Blueprint(container) => (
                container.name().map(str::to_string),
                scan(&container.structure, &remapper),
            ),
            ImportSource::Companion(file) => (file.name.clone(), file.discover(&remapper)),
        };
        let name = name.unwrap_or_else(|| file_stem(file_name));

        info!(
            "{}: {} 种方块名, {} 个需要确认",
            name,
            discovery.counts.len(),
            discovery.unmapped.len()
        );

        Ok(PendingImport {
            name,
            source,
            discovery,
        })
    }

    /// 提交阶段：合并确认结果，组装并归一化
    pub fn commit(
        &self,
        pending: &PendingImport,
        confirmed: MappingTable,
    ) -> Result<SchematicEntry, ImportError> {
        debug!("合并 {} 条确认结果", confirmed.len());
        let overrides = self.store.merge(confirmed)?;
        let remapper = NameRemapper::new(&overrides, self.suggester);

        let (schematic, prompt) = match &pending.source {
            ImportSource::Blueprint(container) => {
                let assembly = assemble(&container.structure, &remapper);
                (
                    normalize(&assembly.terrain, assembly.entities)?,
                    format!("Imported BP: {}", pending.name),
                )
            }
            ImportSource::Companion(file) => (
                file.commit(&remapper)?,
                file.prompt
                    .clone()
                    .unwrap_or_else(|| format!("Imported Component: {}", pending.name)),
            ),
        };

        if schematic.is_empty() {
            warn!("{}: 没有可放置的方块或实体", pending.name);
        }

        let entry = build_entry(pending.source.id_prefix(), &pending.name, prompt, schematic)?;
        info!(
            "导入完成 {}: {} 个方块, {} 个实体",
            entry.id,
            entry.schematic.blocks.len(),
            entry.schematic.entities.len()
        );
        Ok(entry)
    }

    /// 完整流程：打开、发现、（需要时）确认、提交
    pub fn run(
        &self,
        bytes: &[u8],
        file_name: &str,
        confirm: &dyn Confirm,
    ) -> Result<SchematicEntry, ImportError> {
        let source = self.open(bytes, file_name)?;
        let pending = self.discover(source, file_name)?;

        let confirmed = if pending.discovery.unmapped.is_empty() {
            MappingTable::new()
        } else {
            confirm.confirm(&pending.discovery)?
        };

        self.commit(&pending, confirmed)
    }
}

fn build_entry(
    prefix: &str,
    name: &str,
    prompt: String,
    schematic: Schematic,
) -> Result<SchematicEntry, ImportError> {
    let json = serde_json::to_vec(&schematic)?;
    Ok(SchematicEntry {
        id: content_id(prefix, &json),
        name: name.to_string(),
        prompt,
        schematic,
        timestamp: unix_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        confirm::{FileConfirm, NoConfirm},
        container::{write_container, StructureEncoding},
        error::FormatError,
        nbt::FastNbtDecoder,
        palette::pack,
        remap::{DefaultSuggester, Mapping},
        types::BlockPos,
        REGION_VOLUME,
    };
    use fastnbt::{LongArray, Value};
    use std::collections::HashMap;
    use std::fs;

    fn compound(entries: Vec<(&str, Value)>) -> Value {
        Value::Compound(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<HashMap<_, _>>(),
        )
    }

    fn region(origin: (i32, i32, i32), names: &[&str], indices: &[u32]) -> Value {
        let palette = names
            .iter()
            .map(|n| compound(vec![("Name", Value::String(n.to_string()))]))
            .collect();
        let words = pack(indices, names.len()).into_iter().map(|w| w as i64).collect();
        compound(vec![
            ("X", Value::Int(origin.0)),
            ("Y", Value::Int(origin.1)),
            ("Z", Value::Int(origin.2)),
            (
                "BlockStates",
                compound(vec![
                    ("palette", Value::List(palette)),
                    ("data", Value::LongArray(LongArray::new(words))),
                ]),
            ),
        ])
    }

    fn container(name: &str, regions: Vec<Value>, encoding: StructureEncoding) -> Vec<u8> {
        let structure = compound(vec![("BlockRegion", Value::List(regions))]);
        let metadata = compound(vec![("Name", Value::String(name.to_string()))]);

        let mut bytes = Vec::new();
        write_container(&mut bytes, &metadata, b"png", &structure, encoding).unwrap();
        bytes
    }

    /// 区域原点 (2,4,-1)：索引 1、2 为石头，索引 16 为未知方块，其余为空气
    fn blueprint(name: &str, encoding: StructureEncoding) -> Vec<u8> {
        let mut indices = vec![0u32; REGION_VOLUME];
        indices[1] = 1;
        indices[2] = 1;
        indices[16] = 2;
        let names = ["minecraft:air", "minecraft:stone", "mod:mystery"];
        container(name, vec![region((2, 4, -1), &names, &indices)], encoding)
    }

    #[test]
    fn file_stem_strips_extension() {
        assert_eq!(file_stem("towers/Castle.bp"), "Castle");
        assert_eq!(file_stem("well.json"), "well");
        assert_eq!(file_stem(""), "Imported");
    }

    #[test]
    fn blueprint_import_skips_unconfirmed_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::open(dir.path().join("mappings.json"));
        let suggester = DefaultSuggester::default();
        let importer = Importer::new(&store, &suggester, &FastNbtDecoder);

        let bytes = blueprint(" Tower ", StructureEncoding::Gzip);
        let source = importer.open(&bytes, "tower.bp").unwrap();
        let pending = importer.discover(source, "tower.bp").unwrap();
        assert_eq!(pending.name, "Tower");
        assert_eq!(pending.discovery.unmapped.iter().collect::<Vec<_>>(), vec!["mod:mystery"]);
        assert_eq!(pending.discovery.counts.get("minecraft:stone"), Some(&2));

        let entry = importer.run(&bytes, "tower.bp", &NoConfirm).unwrap();
        assert!(entry.id.starts_with("bp-"));
        assert_eq!(entry.prompt, "Imported BP: Tower");
        assert_eq!(entry.schematic.origin, Some(BlockPos::new(33, 64, -16)));
        assert_eq!(entry.schematic.size, [2, 1, 1]);
        assert_eq!(entry.schematic.blocks.get(&BlockPos::new(0, 0, 0)), Some(&15));
        assert_eq!(entry.schematic.blocks.get(&BlockPos::new(1, 0, 0)), Some(&15));
        assert_eq!(entry.schematic.blocks.len(), 2);
    }

    #[test]
    fn confirmed_mapping_is_applied_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::open(dir.path().join("mappings.json"));
        let suggester = DefaultSuggester::default();
        let importer = Importer::new(&store, &suggester, &FastNbtDecoder);

        let answers = dir.path().join("answers.json");
        fs::write(&answers, r#"{"mod:mystery": {"action": "map", "id": 7}}"#).unwrap();

        let bytes = blueprint("Tower", StructureEncoding::Raw);
        let entry = importer.run(&bytes, "tower.bp", &FileConfirm::new(&answers)).unwrap();

        // 未知方块在区域局部 (0,0,1)，包围盒扩展到 x=0 和 z=1
        assert_eq!(entry.schematic.origin, Some(BlockPos::new(32, 64, -16)));
        assert_eq!(entry.schematic.size, [3, 1, 2]);
        assert_eq!(entry.schematic.blocks.get(&BlockPos::new(0, 0, 1)), Some(&7));
        assert_eq!(entry.schematic.blocks.get(&BlockPos::new(1, 0, 0)), Some(&15));
        assert_eq!(store.load().unwrap().get("mod:mystery"), Some(&Mapping::map(7)));

        // 第二次导入不再需要确认
        let source = importer.open(&bytes, "tower.bp").unwrap();
        assert!(importer.discover(source, "tower.bp").unwrap().discovery.unmapped.is_empty());
    }

    #[test]
    fn same_content_gives_same_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::open(dir.path().join("mappings.json"));
        let suggester = DefaultSuggester::default();
        let importer = Importer::new(&store, &suggester, &FastNbtDecoder);

        let gzip = importer
            .run(&blueprint("A", StructureEncoding::Gzip), "a.bp", &NoConfirm)
            .unwrap();
        let raw = importer
            .run(&blueprint("B", StructureEncoding::Raw), "b.bp", &NoConfirm)
            .unwrap();
        assert_eq!(gzip.id, raw.id);
        assert_eq!(gzip.schematic, raw.schematic);
    }

    #[test]
    fn companion_file_is_imported() {
        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::open(dir.path().join("mappings.json"));
        let suggester = DefaultSuggester::default();
        let importer = Importer::new(&store, &suggester, &FastNbtDecoder);

        let json = br#"{"name": "Well", "blocks": {"10,5,10": 3, "11,5,10": 0, "12,6,10": 15}}"#;
        let entry = importer.run(json, "well.json", &NoConfirm).unwrap();

        assert!(entry.id.starts_with("comp-"));
        assert_eq!(entry.name, "Well");
        assert_eq!(entry.prompt, "Imported Component: Well");
        assert_eq!(entry.schematic.origin, Some(BlockPos::new(10, 5, 10)));
        assert_eq!(entry.schematic.blocks.get(&BlockPos::new(0, 0, 0)), Some(&3));
        assert_eq!(entry.schematic.blocks.get(&BlockPos::new(2, 1, 0)), Some(&15));
        assert_eq!(entry.schematic.blocks.len(), 2);
    }

    #[test]
    fn bad_magic_aborts_import() {
        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::open(dir.path().join("mappings.json"));
        let suggester = DefaultSuggester::default();
        let importer = Importer::new(&store, &suggester, &FastNbtDecoder);

        let mut bytes = blueprint("Tower", StructureEncoding::Gzip);
        bytes[0] = 0x00;
        let result = importer.run(&bytes, "tower.bp", &NoConfirm);
        assert!(matches!(result, Err(ImportError::Format(FormatError::InvalidMagic))));
    }

    #[test]
    fn regions_too_far_apart_fail_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::open(dir.path().join("mappings.json"));
        let suggester = DefaultSuggester::default();
        let importer = Importer::new(&store, &suggester, &FastNbtDecoder);

        let mut indices = vec![0u32; REGION_VOLUME];
        indices[0] = 1;
        let names = ["minecraft:air", "minecraft:stone"];
        let bytes = container(
            "Far",
            vec![
                region((134217727, 0, 0), &names, &indices),
                region((-134217728, 0, 0), &names, &indices),
            ],
            StructureEncoding::Gzip,
        );

        let result = importer.run(&bytes, "far.bp", &NoConfirm);
        assert!(matches!(
            result,
            Err(ImportError::Format(FormatError::ExtentOverflow { .. }))
        ));
    }

    #[test]
    fn companion_entities_survive_import() {
        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::open(dir.path().join("mappings.json"));
        let suggester = DefaultSuggester::default();
        let importer = Importer::new(&store, &suggester, &FastNbtDecoder);

        let json = br#"{"schematic": {"blocks": {"0,0,0": 1},
            "entities": [{"entityName": "tree", "position": [1, 0, 0]}]}}"#;
        let entry = importer.run(json, "grove.json", &NoConfirm).unwrap();
        assert_eq!(entry.schematic.entities.len(), 1);
        assert_eq!(entry.schematic.entities[0].position, BlockPos::new(1, 0, 0));
    }
}
