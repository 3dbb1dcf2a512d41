/// 每个索引最少占用的位数（与原版生态一致，即使调色板少于16项）
pub const MIN_BITS_PER_ENTRY: u32 = 4;

/// 计算每个调色板索引的位宽: max(4, ceil(log2(max(1, n))))
pub fn bits_per_entry(palette_size: usize) -> u32 {
    let n = palette_size.max(1);
    // ceil(log2(n)) 等于表示 n-1 所需的位数
    let needed = usize::BITS - (n - 1).leading_zeros();
    needed.max(MIN_BITS_PER_ENTRY)
}

/// 每个64位字可容纳的索引数量，索引不会跨越字边界
pub fn entries_per_word(bits: u32) -> usize {
    (64 / bits.max(1)).max(1) as usize
}

fn entry_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// 将一对无符号32位整数（高位，低位）组合为64位字，不做符号扩展
pub fn compose_long_pair(hi: u32, lo: u32) -> u64 {
    ((hi as u64) << 32) | lo as u64
}

/// 解包调色板索引
///
/// 返回 `voxel_count` 个值。数据不足时缺失部分为 0（即第一个调色板项），
/// 越界索引原样返回，由调用方负责检查。
pub fn unpack(words: &[u64], palette_size: usize, voxel_count: usize) -> Vec<u32> {
    let bits = bits_per_entry(palette_size);
    let per_word = entries_per_word(bits);
    let mask = entry_mask(bits);

    (0..voxel_count)
        .map(|i| {
            let word = words.get(i / per_word).copied().unwrap_or(0);
            let shift = (i % per_word) as u32 * bits;
            ((word >> shift) & mask) as u32
        })
        .collect()
}

/// 打包调色板索引，`unpack` 的逆操作
pub fn pack(indices: &[u32], palette_size: usize) -> Vec<u64> {
    let bits = bits_per_entry(palette_size);
    let per_word = entries_per_word(bits);
    let mask = entry_mask(bits);

    indices
        .chunks(per_word)
        .map(|chunk| {
            chunk.iter().enumerate().fold(0u64, |word, (j, &index)| {
                word | ((index as u64 & mask) << (j as u32 * bits))
            })
        })
        .collect()
}
