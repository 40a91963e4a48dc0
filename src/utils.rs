/// Packs bits into bytes, lsb first.
#[inline]
pub(crate) fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut v = vec![0u8; bits.len().div_ceil(8)];
    for (i, b) in bits.iter().enumerate() {
        v[i / 8] |= (*b as u8) << (i % 8);
    }
    v
}

/// Unpacks the first `len` bits from `bytes`, lsb first.
///
/// Returns `None` if `bytes` does not have exactly the length [`pack_bits`]
/// produces for `len` bits.
#[inline]
pub(crate) fn unpack_bits(bytes: &[u8], len: usize) -> Option<Vec<bool>> {
    if bytes.len() != len.div_ceil(8) {
        return None;
    }
    Some((0..len).map(|i| (bytes[i / 8] >> (i % 8)) & 1 == 1).collect())
}
