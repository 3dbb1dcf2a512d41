use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{self, Read, Write};

/// gzip 压缩数据
pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// gzip 解压数据（头部错误或数据损坏时返回错误）
pub fn gunzip(compressed_data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decompressed = Vec::new();
    let mut decoder = GzDecoder::new(compressed_data);
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}
