use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// 计算SHA-256哈希
pub fn calculate_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// 由内容哈希生成标识符，例如 `bp-3f2a9c01d4e5b6a7`
pub fn content_id(prefix: &str, data: &[u8]) -> String {
    let hash = calculate_sha256(data);
    let hex: String = hash[..8].iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}", prefix, hex)
}

/// 当前 Unix 时间（毫秒）
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
