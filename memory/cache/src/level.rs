use std::fmt;

use common::Memory;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::block::{BlockStore, LineTag};
use crate::geometry::Geometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Writes go to the next level first. Misses don't allocate and lines are never dirty.
    WriteThrough,
    /// Writes allocate and stay local until the line is evicted.
    WriteBack,
}

impl WritePolicy {
    #[inline(always)]
    pub fn allocate_on_write(self) -> bool {
        self == WritePolicy::WriteBack
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub name: &'static str,
    pub geometry: Geometry,
    pub policy: WritePolicy,
}

impl CacheConfig {
    pub fn new(name: &'static str, geometry: Geometry, policy: WritePolicy) -> CacheConfig {
        CacheConfig { name, geometry, policy }
    }

    /// 128 sets x 8 ways x 64B, write-through
    pub fn l1() -> CacheConfig {
        CacheConfig {
            name: "L1",
            geometry: Geometry::preset(6, 7, 8),
            policy: WritePolicy::WriteThrough,
        }
    }

    /// 4096 sets x 16 ways x 64B, write-back
    pub fn l2() -> CacheConfig {
        CacheConfig {
            name: "L2",
            geometry: Geometry::preset(6, 12, 16),
            policy: WritePolicy::WriteBack,
        }
    }
}

/// Activity counters for one level. Probes are never counted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub reads: u64,
    pub writes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub writebacks: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lookups = self.hits + self.misses;
        let rate = if lookups == 0 { 0.0 } else { self.hits as f64 * 100.0 / lookups as f64 };
        write!(f, "reads: {}, writes: {}, hits: {}, misses: {} ({:.1}% hit), evictions: {}, writebacks: {}",
            self.reads, self.writes, self.hits, self.misses, rate, self.evictions, self.writebacks)
    }
}

pub struct CacheLevel {
    name: &'static str,
    geometry: Geometry,
    policy: WritePolicy,
    store: BlockStore,
    rng: ChaCha8Rng,
    stats: CacheStats,
}

impl CacheLevel {
    /// Builds an empty level. Each level of a seeded hierarchy draws victims from its own
    /// stream of the seed, so levels don't share a sequence.
    pub fn new(config: CacheConfig, seed: Option<u64>, stream: u64) -> CacheLevel {
        let geometry = config.geometry;
        let rng = match seed {
            Some(seed) => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(stream);
                rng
            }
            None => ChaCha8Rng::from_entropy(),
        };

        CacheLevel {
            name: config.name,
            geometry,
            policy: config.policy,
            store: BlockStore::new(geometry.sets(), geometry.ways(), geometry.block_size()),
            rng,
            stats: CacheStats::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// Slot currently caching `addr`. Touches nothing.
    pub fn resident(&self, addr: u32) -> Option<usize> {
        self.store.find(self.geometry.set_index(addr), self.geometry.tag(addr))
    }
}

/// Finds the block holding `addr` in `levels[0]`, allocating it on a miss when `allocate`
/// is set. Misses are filled from `levels[1..]`, or from `memory` at the last level.
///
/// Returns the slot in `levels[0]`, or `None` on a miss without allocation.
pub(crate) fn find<M: Memory>(levels: &mut [CacheLevel], memory: &mut M, addr: u32, allocate: bool) -> Option<usize> {
    let (level, below) = levels.split_first_mut()?;
    let geometry = level.geometry;
    let set_index = geometry.set_index(addr);
    let tag = geometry.tag(addr);

    if let Some(slot) = level.store.find(set_index, tag) {
        level.stats.hits += 1;
        return Some(slot);
    }
    level.stats.misses += 1;
    trace!(cache = level.name, "miss at {:#010x}, set {} tag {:#x}", addr, set_index, tag);

    if !allocate {
        return None;
    }

    let way = level.rng.gen_range(0..geometry.ways());
    let slot = level.store.slot(set_index, way);
    let victim = level.store.tag(slot);

    if victim.valid() {
        level.stats.evictions += 1;
    }
    // Must go out before the victim's tag is overwritten
    if victim.needs_writeback() {
        let victim_addr = geometry.block_base(victim.tag(), set_index);
        trace!(cache = level.name, "way {} writes back {:#010x}", way, victim_addr);
        level.stats.writebacks += 1;
        write(below, memory, victim_addr, level.store.data(slot));
    }

    let base = geometry.block_base(tag, set_index);
    trace!(cache = level.name, "way {} fills {:#010x}", way, base);
    if below.is_empty() {
        memory.read_bytes(base, level.store.data_mut(slot));
    } else if let Some(source) = find(below, memory, base, true) {
        let next = &below[0];
        let start = next.geometry.offset(base);
        let size = geometry.block_size();
        level.store.data_mut(slot).copy_from_slice(&next.store.data(source)[start..start + size]);
    }
    level.store.set_tag(slot, LineTag::filled(tag));

    Some(slot)
}

/// Reads `buf.len()` bytes starting at `addr` through `levels[0]`.
///
/// Every block the range touches is looked up separately, against the cache state at the
/// time that block is reached.
pub(crate) fn read<M: Memory>(levels: &mut [CacheLevel], memory: &mut M, addr: u32, buf: &mut [u8]) {
    let Some(level) = levels.first_mut() else {
        memory.read_bytes(addr, buf);
        return;
    };
    level.stats.reads += 1;
    let geometry = level.geometry;

    let mut done = 0;
    while done < buf.len() {
        let cursor = addr.wrapping_add(done as u32);
        let offset = geometry.offset(cursor);
        let count = (geometry.block_size() - offset).min(buf.len() - done);

        if let Some(slot) = find(levels, memory, cursor, true) {
            let data = levels[0].store.data(slot);
            buf[done..done + count].copy_from_slice(&data[offset..offset + count]);
        }
        done += count;
    }
}

/// Writes `data` at `addr` into `levels[0]` according to its policy.
///
/// Write-through levels forward the whole write to the next level (or memory) first and
/// then refresh whichever blocks they already hold. Write-back levels allocate every block
/// the write touches and mark each of them dirty.
pub(crate) fn write<M: Memory>(levels: &mut [CacheLevel], memory: &mut M, addr: u32, data: &[u8]) {
    let Some(level) = levels.first_mut() else {
        memory.write_bytes(addr, data);
        return;
    };
    level.stats.writes += 1;
    let geometry = level.geometry;
    let policy = level.policy;

    if policy == WritePolicy::WriteThrough {
        write(&mut levels[1..], memory, addr, data);
    }

    let mut done = 0;
    while done < data.len() {
        let cursor = addr.wrapping_add(done as u32);
        let offset = geometry.offset(cursor);
        let count = (geometry.block_size() - offset).min(data.len() - done);

        // Absent blocks at a no-write-allocate level are skipped
        if let Some(slot) = find(levels, memory, cursor, policy.allocate_on_write()) {
            let store = &mut levels[0].store;
            if policy == WritePolicy::WriteBack {
                store.mark_dirty(slot);
            }
            store.data_mut(slot)[offset..offset + count].copy_from_slice(&data[done..done + count]);
        }
        done += count;
    }
}

/// Writes every dirty block of `levels[0]` down to the next level and marks it clean
pub(crate) fn flush<M: Memory>(levels: &mut [CacheLevel], memory: &mut M) {
    let Some((level, below)) = levels.split_first_mut() else {
        return;
    };
    let geometry = level.geometry;

    for set_index in 0..geometry.sets() {
        for slot in level.store.set(set_index) {
            let tag = level.store.tag(slot);
            if tag.needs_writeback() {
                level.stats.writebacks += 1;
                write(below, memory, geometry.block_base(tag.tag(), set_index), level.store.data(slot));
                level.store.mark_clean(slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(offset_bits: u32, set_index_bits: u32, ways: usize, policy: WritePolicy) -> CacheLevel {
        let geometry = Geometry::new(offset_bits, set_index_bits, ways).unwrap();
        CacheLevel::new(CacheConfig::new("test", geometry, policy), Some(1), 0)
    }

    fn pattern(size: usize) -> Vec<u8> {
        (0..size).map(|i| i as u8).collect()
    }

    #[test]
    fn hit_has_no_side_effects() {
        let mut levels = vec![level(6, 2, 2, WritePolicy::WriteBack)];
        let mut mem = pattern(1024);

        let slot = find(&mut levels, &mut mem, 0x104, true).unwrap();
        let before = levels[0].store.tag(slot);
        assert_eq!(find(&mut levels, &mut mem, 0x13f, true), Some(slot));
        assert_eq!(levels[0].store.tag(slot), before);
        assert_eq!(levels[0].stats().hits, 1);
        assert_eq!(levels[0].stats().misses, 1);
    }

    #[test]
    fn miss_without_allocation() {
        let mut levels = vec![level(6, 2, 2, WritePolicy::WriteThrough)];
        let mut mem = pattern(1024);

        assert_eq!(find(&mut levels, &mut mem, 0x100, false), None);
        assert!((0..levels[0].store.len()).all(|slot| !levels[0].store.tag(slot).valid()));
    }

    #[test]
    fn fill_from_memory() {
        let mut levels = vec![level(6, 2, 2, WritePolicy::WriteBack)];
        let mut mem = pattern(1024);

        let slot = find(&mut levels, &mut mem, 0x17f, true).unwrap();
        assert!(levels[0].store.set(1).contains(&slot));
        assert_eq!(levels[0].store.data(slot), &mem[0x140..0x180]);
        assert_eq!(levels[0].store.tag(slot), LineTag::filled(1));
    }

    #[test]
    fn fill_from_wider_level() {
        let mut levels = vec![
            level(4, 1, 1, WritePolicy::WriteThrough),
            level(6, 1, 1, WritePolicy::WriteBack),
        ];
        let mut mem = pattern(1024);

        let slot = find(&mut levels, &mut mem, 0x1b4, true).unwrap();
        assert_eq!(levels[0].store.data(slot), &mem[0x1b0..0x1c0]);
        assert!(levels[1].resident(0x180).is_some());
    }

    #[test]
    fn no_duplicate_residency() {
        let mut levels = vec![level(4, 2, 4, WritePolicy::WriteBack)];
        let mut mem = pattern(1024);

        for addr in (0..1024u32).step_by(12) {
            let mut buf = [0; 3];
            read(&mut levels, &mut mem, addr, &mut buf);
        }
        let store = &levels[0].store;
        for set_index in 0..4 {
            let tags: Vec<u32> = store.set(set_index)
                .map(|slot| store.tag(slot))
                .filter(|tag| tag.valid())
                .map(|tag| tag.tag())
                .collect();
            let mut unique = tags.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(tags.len(), unique.len());
        }
    }

    #[test]
    fn straddling_write_dirties_both_blocks() {
        let mut levels = vec![level(4, 2, 2, WritePolicy::WriteBack)];
        let mut mem = pattern(256);

        write(&mut levels, &mut mem, 0x1e, &[1, 2, 3, 4]);
        let first = levels[0].resident(0x1e).unwrap();
        let second = levels[0].resident(0x20).unwrap();
        assert!(levels[0].store.tag(first).dirty());
        assert!(levels[0].store.tag(second).dirty());

        flush(&mut levels, &mut mem);
        assert_eq!(&mem[0x1e..0x22], &[1, 2, 3, 4]);
        assert!(!levels[0].store.tag(first).dirty());
        assert!(!levels[0].store.tag(second).dirty());
    }

    #[test]
    fn write_through_never_dirties() {
        let mut levels = vec![level(4, 2, 2, WritePolicy::WriteThrough)];
        let mut mem = pattern(256);

        let mut buf = [0; 1];
        read(&mut levels, &mut mem, 0x40, &mut buf);
        write(&mut levels, &mut mem, 0x4e, &[9, 9, 9, 9]);

        assert_eq!(&mem[0x4e..0x52], &[9, 9, 9, 9]);
        let slot = levels[0].resident(0x40).unwrap();
        assert!(!levels[0].store.tag(slot).dirty());
        assert_eq!(&levels[0].store.data(slot)[0xe..], &[9, 9]);
        // 0x50 was never allocated by the write
        assert_eq!(levels[0].resident(0x50), None);
    }

    #[test]
    fn victims_spread_evenly_across_ways() {
        let mut levels = vec![level(4, 0, 4, WritePolicy::WriteBack)];
        let mut mem = pattern(64);

        // Every address is a new tag in the only set, so each lookup draws a victim
        let ways: Vec<usize> = (0..4000u32)
            .map(|i| find(&mut levels, &mut mem, i * 16, true).unwrap())
            .collect();
        assert_eq!(levels[0].stats().misses, 4000);

        let mut counts = [0; 4];
        for &way in &ways {
            counts[way] += 1;
        }
        for count in counts {
            assert!((850..1150).contains(&count), "uneven victims {:?}", counts);
        }

        // One generator advancing across calls: back to back repeats happen about a quarter of the time
        let repeats = ways.windows(2).filter(|pair| pair[0] == pair[1]).count();
        assert!((850..1150).contains(&repeats), "{} repeated victims", repeats);
    }

    #[test]
    fn stats_display() {
        let stats = CacheStats { reads: 3, writes: 1, hits: 3, misses: 1, evictions: 0, writebacks: 0 };
        assert_eq!(stats.to_string(), "reads: 3, writes: 1, hits: 3, misses: 1 (75.0% hit), evictions: 0, writebacks: 0");
    }
}
