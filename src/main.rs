use bpimport::{
    confirm::{Confirm, FileConfirm, NoConfirm, PromptConfirm},
    container::StructureEncoding,
    nbt::FastNbtDecoder,
    region::{read_region, region_views},
    store::{DirectorySink, SchematicSink},
    BlueprintContainer, Config, DefaultSuggester, ImportError, Importer, Mapping, MappingStore,
};
use clap::{Parser, Subcommand};
use log::info;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// 蓝图导入命令行工具 - 解码 .bp 文件并重映射到目标方块ID
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 查看蓝图文件信息
    Info {
        /// 蓝图文件路径
        #[arg(short, long)]
        file: PathBuf,

        /// 将预览图写入该路径
        #[arg(long)]
        preview: Option<PathBuf>,
    },

    /// 只做发现：列出方块名、数量与需要确认的名称
    Scan {
        /// 输入文件（.bp 或 .json）
        #[arg(short, long)]
        input: PathBuf,
    },

    /// 导入文件并生成结构
    Import {
        /// 输入文件（.bp 或 .json）
        #[arg(short, long)]
        input: PathBuf,

        /// 预先写好的映射决定（JSON）
        #[arg(short, long)]
        mappings: Option<PathBuf>,

        /// 输出结构文件路径（默认写入配置的结构目录）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 不询问，未确认的名称全部跳过
        #[arg(long)]
        no_prompt: bool,
    },

    /// 管理覆盖映射表
    Map {
        #[command(subcommand)]
        action: MapAction,
    },

    /// 生成默认配置文件
    Config {
        /// 输出路径
        #[arg(short, long, default_value = bpimport::config::LOCAL_CONFIG)]
        output: PathBuf,

        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum MapAction {
    /// 列出所有映射
    List,

    /// 设置映射：skip、<ID>、entity:<名称>
    Set { name: String, mapping: String },

    /// 删除映射
    Remove { name: String },

    /// 列出可用的目标方块类型
    Targets,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn load_config(config_path: Option<&Path>) -> Result<Config, ImportError> {
    match config_path {
        Some(path) => {
            let config = Config::load_from_file(path)?;
            info!("已加载配置: {}", path.display());
            Ok(config)
        }
        None => Ok(Config::load()),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("失败: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<(), ImportError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { file, preview } => print_info(&file, preview.as_deref()),
        Commands::Scan { input } => scan_file(&config, &input),
        Commands::Import {
            input,
            mappings,
            output,
            no_prompt,
        } => import_file(&config, &input, mappings.as_deref(), output.as_deref(), no_prompt),
        Commands::Map { action } => manage_mappings(&config, action),
        Commands::Config { output, force } => write_default_config(&output, force),
    }
}

/// 打印蓝图文件信息
fn print_info(file: &Path, preview: Option<&Path>) -> Result<(), ImportError> {
    let bytes = fs::read(file)?;
    let container = BlueprintContainer::parse(&bytes, &FastNbtDecoder)?;

    println!("=== 蓝图文件信息 ===");
    println!("文件: {}", file.display());
    println!("名称: {}", container.name().unwrap_or("-"));
    println!("作者: {}", container.author().unwrap_or("-"));
    println!("预览图: {} 字节", container.preview.len());
    let encoding = match container.structure_encoding {
        StructureEncoding::Gzip => "gzip",
        StructureEncoding::Raw => "未压缩",
    };
    println!("结构编码: {}", encoding);

    let views = region_views(&container.structure);
    let valid: Vec<_> = views
        .iter()
        .enumerate()
        .filter_map(|(i, view)| read_region(*view, i))
        .collect();
    println!("区域数量: {} (有效 {})", views.len(), valid.len());

    if let Some(path) = preview {
        fs::write(path, &container.preview)?;
        println!("预览图已写入: {}", path.display());
    }

    Ok(())
}

/// 发现阶段报告
fn scan_file(config: &Config, input: &Path) -> Result<(), ImportError> {
    let store = MappingStore::open(&config.store.mappings);
    let suggester = DefaultSuggester::with_catalogue(config.catalogue.clone());
    let importer = Importer::new(&store, &suggester, &FastNbtDecoder);

    let bytes = fs::read(input)?;
    let name = file_name(input);
    let pending = importer.discover(importer.open(&bytes, &name)?, &name)?;

    println!("=== {} ===", pending.name);
    for (block, count) in &pending.discovery.counts {
        let marker = if pending.discovery.unmapped.contains(block) { " *" } else { "" };
        println!("  {:>8}  {}{}", count, block, marker);
    }
    println!(
        "共 {} 种方块名，{} 个需要确认（* 标记）",
        pending.discovery.counts.len(),
        pending.discovery.unmapped.len()
    );

    Ok(())
}

/// 完整导入
fn import_file(
    config: &Config,
    input: &Path,
    mappings: Option<&Path>,
    output: Option<&Path>,
    no_prompt: bool,
) -> Result<(), ImportError> {
    let store = MappingStore::open(&config.store.mappings);
    let suggester = DefaultSuggester::with_catalogue(config.catalogue.clone());
    let importer = Importer::new(&store, &suggester, &FastNbtDecoder);

    let confirm: Box<dyn Confirm> = match mappings {
        Some(path) => Box::new(FileConfirm::new(path)),
        None if no_prompt || !config.import.interactive => Box::new(NoConfirm),
        None => Box::new(PromptConfirm::new(io::stdin().lock(), io::stdout())),
    };

    let bytes = fs::read(input)?;
    let entry = importer.run(&bytes, &file_name(input), confirm.as_ref())?;

    let location = match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &entry.schematic)?;
            path.display().to_string()
        }
        None => DirectorySink::new(&config.store.schematics).save(&entry)?,
    };

    println!("导入完成: {} ({})", entry.name, entry.id);
    println!("  方块: {}", entry.schematic.blocks.len());
    println!("  实体: {}", entry.schematic.entities.len());
    println!(
        "  尺寸: {} x {} x {}",
        entry.schematic.size[0], entry.schematic.size[1], entry.schematic.size[2]
    );
    println!("  输出: {}", location);

    Ok(())
}

/// 查看或修改覆盖映射表
fn manage_mappings(config: &Config, action: MapAction) -> Result<(), ImportError> {
    let store = MappingStore::open(&config.store.mappings);

    match action {
        MapAction::List => {
            let table = store.load()?;
            println!("映射文件: {}", store.path().display());
            for (name, mapping) in table.iter() {
                println!("  {} -> {}", name, mapping);
            }
            println!("共 {} 条", table.len());
        }
        MapAction::Set { name, mapping } => {
            let mapping: Mapping = mapping.parse()?;
            println!("{} -> {}", name, mapping);
            store.update(|table| {
                table.insert(name, mapping);
            })?;
        }
        MapAction::Targets => {
            let suggester = DefaultSuggester::with_catalogue(config.catalogue.clone());
            for block in suggester.catalogue() {
                println!("  {:>4}  {}", block.id, block.name);
            }
        }
        MapAction::Remove { name } => {
            let mut removed = None;
            store.update(|table| removed = table.remove(&name))?;
            match removed {
                Some(mapping) => println!("已删除 {} -> {}", name, mapping),
                None => println!("没有 {} 的映射", name),
            }
        }
    }

    Ok(())
}

/// 写出默认配置
fn write_default_config(output: &Path, force: bool) -> Result<(), ImportError> {
    if output.exists() && !force {
        return Err(ImportError::Config(format!(
            "{} 已存在，使用 --force 覆盖",
            output.display()
        )));
    }
    Config::default().save_to_file(output)?;
    println!("已生成配置: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bpimport").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn failures_come_back_as_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.bp");
        let result = execute(cli(&["info", "-f", missing.to_str().unwrap()]));
        assert!(matches!(result, Err(ImportError::Io(_))));
    }

    #[test]
    fn config_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bpimport.toml");
        let path = path.to_str().unwrap();

        execute(cli(&["--config", path, "config", "-o", path])).unwrap_err();
        execute(cli(&["config", "-o", path])).unwrap();
        assert!(matches!(
            execute(cli(&["--config", path, "config", "-o", path])),
            Err(ImportError::Config(_))
        ));
        execute(cli(&["--config", path, "config", "-o", path, "--force"])).unwrap();
    }
}
