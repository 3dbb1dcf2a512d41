use crate::{
    compression::{gunzip, gzip},
    error::{FormatError, ImportError},
    nbt::{encode_tags, TagDecoder, TagView},
    BP_MAGIC,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use fastnbt::Value;
use log::debug;
use std::io::{Cursor, Write};

/// 结构段的存储方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureEncoding {
    Gzip,
    Raw,
}

/// 解析后的蓝图容器，一次导入期间只读
#[derive(Debug, Clone)]
pub struct BlueprintContainer {
    pub metadata: Value,
    pub preview: Vec<u8>,
    pub structure: Value,
    pub structure_encoding: StructureEncoding,
}

impl BlueprintContainer {
    /// 解析蓝图文件字节
    ///
    /// 布局：`[魔数 4][u32 元数据长度][元数据 NBT][u32 预览长度][预览][u32 结构长度][结构 gzip/原始 NBT]`，
    /// 长度均为大端序。
    pub fn parse(bytes: &[u8], decoder: &dyn TagDecoder) -> Result<Self, FormatError> {
        if bytes.len() < BP_MAGIC.len() || bytes[..BP_MAGIC.len()] != *BP_MAGIC {
            return Err(FormatError::InvalidMagic);
        }

        let mut cursor = Cursor::new(bytes);
        cursor.set_position(BP_MAGIC.len() as u64);

        let metadata_bytes = read_section(&mut cursor, "metadata")?;
        let preview = read_section(&mut cursor, "preview")?.to_vec();
        let structure_bytes = read_section(&mut cursor, "structure")?;

        debug!(
            "蓝图分段: 元数据 {} 字节, 预览 {} 字节, 结构 {} 字节",
            metadata_bytes.len(),
            preview.len(),
            structure_bytes.len()
        );

        let metadata = decoder.decode(metadata_bytes).map_err(FormatError::Metadata)?;
        let (structure, structure_encoding) = decode_structure(structure_bytes, decoder)?;

        Ok(Self {
            metadata,
            preview,
            structure,
            structure_encoding,
        })
    }

    /// 蓝图名称（元数据 Name 标签）
    pub fn name(&self) -> Option<&str> {
        TagView::new(&self.metadata)
            .get("Name")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn author(&self) -> Option<&str> {
        TagView::new(&self.metadata)
            .get("Author")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// 读取一个（长度，数据）分段
fn read_section<'a>(
    cursor: &mut Cursor<&'a [u8]>,
    section: &'static str,
) -> Result<&'a [u8], FormatError> {
    let declared = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| FormatError::Truncated { section })?;

    let buffer: &'a [u8] = *cursor.get_ref();
    let offset = cursor.position() as usize;
    let remaining = buffer.len() - offset;

    if declared as usize > remaining {
        return Err(FormatError::SectionOverflow {
            section,
            declared,
            remaining,
        });
    }

    let end = offset + declared as usize;
    cursor.set_position(end as u64);
    Ok(&buffer[offset..end])
}

/// 先按 gzip 解压再解码；失败则把数据当作未压缩 NBT 再试一次
fn decode_structure(
    payload: &[u8],
    decoder: &dyn TagDecoder,
) -> Result<(Value, StructureEncoding), FormatError> {
    let gzip_error = match gunzip(payload) {
        Ok(inflated) => match decoder.decode(&inflated) {
            Ok(structure) => {
                debug!("结构段: gzip 解压后 {} 字节", inflated.len());
                return Ok((structure, StructureEncoding::Gzip));
            }
            Err(e) => e,
        },
        Err(e) => e.to_string(),
    };

    match decoder.decode(payload) {
        Ok(structure) => {
            debug!("结构段: gzip 失败 ({}), 按原始 NBT 解析 {} 字节", gzip_error, payload.len());
            Ok((structure, StructureEncoding::Raw))
        }
        Err(raw_error) => Err(FormatError::UndecodableStructure {
            gzip: gzip_error,
            raw: raw_error,
        }),
    }
}

/// 写入蓝图容器
pub fn write_container<W: Write>(
    writer: &mut W,
    metadata: &Value,
    preview: &[u8],
    structure: &Value,
    encoding: StructureEncoding,
) -> Result<(), ImportError> {
    let metadata_bytes = encode_tags(metadata).map_err(FormatError::Metadata)?;
    let structure_raw = encode_tags(structure).map_err(|e| FormatError::UndecodableStructure {
        gzip: String::new(),
        raw: e,
    })?;
    let structure_bytes = match encoding {
        StructureEncoding::Gzip => gzip(&structure_raw)?,
        StructureEncoding::Raw => structure_raw,
    };

    writer.write_all(BP_MAGIC)?;
    for section in [&metadata_bytes[..], preview, &structure_bytes[..]] {
        writer.write_u32::<BigEndian>(section.len() as u32)?;
        writer.write_all(section)?;
    }

    Ok(())
}
