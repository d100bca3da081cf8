use crate::ConfigError;

/// Shape of one cache level. Fixed once the level is built.
///
/// Addresses split into `tag | set index | offset`, from the top bit down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    offset_bits: u32,
    set_index_bits: u32,
    ways: usize,
}

impl Geometry {
    pub fn new(offset_bits: u32, set_index_bits: u32, ways: usize) -> Result<Geometry, ConfigError> {
        if ways == 0 {
            return Err(ConfigError::ZeroWays);
        }
        if offset_bits + set_index_bits > u32::BITS {
            return Err(ConfigError::AddressOverflow { offset_bits, set_index_bits });
        }
        Ok(Geometry { offset_bits, set_index_bits, ways })
    }

    /// For shapes known to be valid, like the reference presets
    pub(crate) const fn preset(offset_bits: u32, set_index_bits: u32, ways: usize) -> Geometry {
        Geometry { offset_bits, set_index_bits, ways }
    }

    #[inline(always)]
    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    #[inline(always)]
    pub fn set_index_bits(&self) -> u32 {
        self.set_index_bits
    }

    #[inline(always)]
    pub fn ways(&self) -> usize {
        self.ways
    }

    #[inline(always)]
    pub fn block_size(&self) -> usize {
        1 << self.offset_bits
    }

    #[inline(always)]
    pub fn sets(&self) -> usize {
        1 << self.set_index_bits
    }

    pub fn blocks(&self) -> usize {
        self.sets() * self.ways
    }

    /// Total data capacity in bytes
    pub fn capacity(&self) -> usize {
        self.blocks() * self.block_size()
    }

    // Shifts are done in 64 bits so a geometry using all 32 address bits stays total.

    #[inline(always)]
    pub fn offset(&self, addr: u32) -> usize {
        (addr as u64 & ((1u64 << self.offset_bits) - 1)) as usize
    }

    #[inline(always)]
    pub fn set_index(&self, addr: u32) -> usize {
        ((addr as u64 >> self.offset_bits) & ((1u64 << self.set_index_bits) - 1)) as usize
    }

    #[inline(always)]
    pub fn tag(&self, addr: u32) -> u32 {
        (addr as u64 >> self.offset_bits >> self.set_index_bits) as u32
    }

    /// Reconstructs the block aligned address a `(tag, set)` pair caches
    #[inline(always)]
    pub fn block_base(&self, tag: u32, set_index: usize) -> u32 {
        ((tag as u64) << (self.offset_bits + self.set_index_bits)
            | (set_index as u64) << self.offset_bits) as u32
    }

    #[inline(always)]
    pub fn align(&self, addr: u32) -> u32 {
        self.block_base(self.tag(addr), self.set_index(addr))
    }
}
