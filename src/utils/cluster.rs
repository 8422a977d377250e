/// Smallest node count that forms a majority of `total_nodes`.
pub fn majority_count(total_nodes: usize) -> usize {
    (total_nodes / 2) + 1
}

/// Maps a key onto one of `partition_count` partitions.
///
/// CRC32 of the key, upper half-word, modulo the partition count. Every
/// client and the store must agree on this mapping.
pub fn partition_for_key(
    key: &[u8],
    partition_count: u16,
) -> u16 {
    let crc = crc32fast::hash(key);
    (((crc >> 16) & 0x7fff) % partition_count.max(1) as u32) as u16
}
