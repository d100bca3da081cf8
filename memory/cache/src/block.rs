use std::ops::Range;

use modular_bitfield::{bitfield, specifiers::*};

/// Per-block state word: validity, dirtiness and the tag of the resident region.
#[bitfield(bits = 64)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineTag {
    pub valid: bool,
    pub dirty: bool,
    #[skip] __: B30,
    pub tag: u32,
}

impl LineTag {
    #[inline(always)]
    pub fn invalid() -> LineTag {
        LineTag::new()
    }

    /// A freshly filled, clean line
    #[inline(always)]
    pub fn filled(tag: u32) -> LineTag {
        LineTag::new().with_valid(true).with_tag(tag)
    }

    #[inline(always)]
    pub fn is_hit(&self, tag: u32) -> bool {
        self.valid() && self.tag() == tag
    }

    #[inline(always)]
    pub fn needs_writeback(&self) -> bool {
        self.valid() && self.dirty()
    }
}

/// Flat storage for every block of one level.
///
/// Tags and data live in separate arrays, both indexed by slot. Slot `set * ways + way`
/// holds way `way` of set `set`, so each set is a contiguous run of slots.
pub struct BlockStore {
    tags: Vec<LineTag>,
    data: Vec<u8>,
    ways: usize,
    block_size: usize,
}

impl BlockStore {
    pub fn new(sets: usize, ways: usize, block_size: usize) -> BlockStore {
        BlockStore {
            tags: vec![LineTag::invalid(); sets * ways],
            data: vec![0; sets * ways * block_size],
            ways,
            block_size,
        }
    }

    #[inline(always)]
    pub fn slot(&self, set_index: usize, way: usize) -> usize {
        set_index * self.ways + way
    }

    /// Slots making up one set
    #[inline(always)]
    pub fn set(&self, set_index: usize) -> Range<usize> {
        let first = self.slot(set_index, 0);
        first..first + self.ways
    }

    /// Slot of the valid block in `set_index` carrying `tag`, if any
    pub fn find(&self, set_index: usize, tag: u32) -> Option<usize> {
        self.set(set_index).find(|&slot| self.tags[slot].is_hit(tag))
    }

    #[inline(always)]
    pub fn tag(&self, slot: usize) -> LineTag {
        self.tags[slot]
    }

    #[inline(always)]
    pub fn set_tag(&mut self, slot: usize, tag: LineTag) {
        self.tags[slot] = tag;
    }

    #[inline(always)]
    pub fn mark_dirty(&mut self, slot: usize) {
        self.tags[slot].set_dirty(true);
    }

    #[inline(always)]
    pub fn mark_clean(&mut self, slot: usize) {
        self.tags[slot].set_dirty(false);
    }

    #[inline(always)]
    pub fn data(&self, slot: usize) -> &[u8] {
        let start = slot * self.block_size;
        &self.data[start..start + self.block_size]
    }

    #[inline(always)]
    pub fn data_mut(&mut self, slot: usize) -> &mut [u8] {
        let start = slot * self.block_size;
        &mut self.data[start..start + self.block_size]
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }
}
