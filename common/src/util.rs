use anyhow::Context;

/// Widest access the cache accessors accept, in bytes
pub const MAX_ACCESS: usize = 4;

/// Splits the low `len` bytes of `value` into memory order (little-endian),
/// independent of the host's byte order.
#[inline(always)]
pub fn encode_le(value: u32, len: usize) -> [u8; MAX_ACCESS] {
    assert!(len >= 1 && len <= MAX_ACCESS, "invalid access length {}", len);
    let mut bytes = value.to_le_bytes();
    bytes[len..].fill(0);
    bytes
}

/// Assembles up to four bytes in memory order into a value. Missing high bytes are zero.
#[inline(always)]
pub fn decode_le(bytes: &[u8]) -> u32 {
    assert!(bytes.len() <= MAX_ACCESS, "invalid access length {}", bytes.len());
    let mut word = [0u8; MAX_ACCESS];
    word[..bytes.len()].copy_from_slice(bytes);
    u32::from_le_bytes(word)
}

/// Parses decimal or `0x`-prefixed hexadecimal numbers
pub fn parse_u32(s: &str) -> Result<u32, anyhow::Error> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse::<u32>(),
    };
    parsed.with_context(|| format!("invalid number {:?}", s))
}

/// Like [`parse_u32`], but for sizes that may exceed 32 bits
pub fn parse_size(s: &str) -> Result<usize, anyhow::Error> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse::<usize>(),
    };
    parsed.with_context(|| format!("invalid size {:?}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_order() {
        assert_eq!(encode_le(0xcafe_babe, 4), [0xbe, 0xba, 0xfe, 0xca]);
        assert_eq!(encode_le(0xcafe_babe, 2), [0xbe, 0xba, 0, 0]);
        assert_eq!(decode_le(&[0xbe, 0xba, 0xfe, 0xca]), 0xcafe_babe);
        assert_eq!(decode_le(&[0x34, 0x12]), 0x1234);
    }

    #[test]
    #[should_panic]
    fn oversized_access() {
        encode_le(0, 5);
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_u32("0x100").unwrap(), 0x100);
        assert_eq!(parse_u32("0xCAFE_BABE").unwrap(), 0xcafe_babe);
        assert_eq!(parse_u32("42").unwrap(), 42);
        assert!(parse_u32("0xzz").is_err());
        assert_eq!(parse_size("0x1_0000_0000").unwrap(), 1 << 32);
    }
}
