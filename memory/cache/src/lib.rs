//! Set-associative cache hierarchy sitting between an emulated CPU and its memory.
//!
//! Levels are chained top to bottom. Each level looks up, allocates and evicts through the
//! same code, and only differs by its [`Geometry`] and [`WritePolicy`]. The last level is
//! backed by a [`Memory`] implementation.

use common::util::{decode_le, encode_le, MAX_ACCESS};
use common::Memory;
use thiserror::Error;
use tracing::debug;

pub mod block;
pub mod geometry;
pub mod level;
pub mod probe;

pub use geometry::Geometry;
pub use level::{CacheConfig, CacheLevel, CacheStats, WritePolicy};
pub use probe::{Probe, ProbedLine};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a cache level needs at least one way")]
    ZeroWays,
    #[error("{offset_bits} offset bits and {set_index_bits} set index bits don't fit a 32-bit address")]
    AddressOverflow { offset_bits: u32, set_index_bits: u32 },
    #[error("a hierarchy needs at least one cache level")]
    NoLevels,
    #[error("{upper} blocks ({upper_size}B) are larger than the {lower} blocks backing them ({lower_size}B)")]
    BlockSize {
        upper: &'static str,
        upper_size: usize,
        lower: &'static str,
        lower_size: usize,
    },
}

/// Levels from the top (closest to the CPU) down, plus the seed for victim selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyConfig {
    pub levels: Vec<CacheConfig>,
    /// `None` seeds every level from the OS
    pub seed: Option<u64>,
}

impl HierarchyConfig {
    /// Write-through L1 in front of a write-back L2
    pub fn reference() -> HierarchyConfig {
        HierarchyConfig {
            levels: vec![CacheConfig::l1(), CacheConfig::l2()],
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.levels.is_empty() {
            return Err(ConfigError::NoLevels);
        }
        // A fill copies the whole upper block out of a single lower block
        for pair in self.levels.windows(2) {
            let (upper, lower) = (&pair[0], &pair[1]);
            if upper.geometry.block_size() > lower.geometry.block_size() {
                return Err(ConfigError::BlockSize {
                    upper: upper.name,
                    upper_size: upper.geometry.block_size(),
                    lower: lower.name,
                    lower_size: lower.geometry.block_size(),
                });
            }
        }
        Ok(())
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        HierarchyConfig::reference()
    }
}

/// The cache levels and the memory behind them. Owned by whoever executes instructions.
pub struct Hierarchy<M: Memory> {
    levels: Vec<CacheLevel>,
    memory: M,
}

impl<M: Memory> Hierarchy<M> {
    pub fn new(config: HierarchyConfig, memory: M) -> Result<Hierarchy<M>, ConfigError> {
        config.validate()?;

        let levels: Vec<CacheLevel> = config.levels.iter()
            .enumerate()
            .map(|(i, level)| CacheLevel::new(*level, config.seed, i as u64))
            .collect();

        for level in &levels {
            let g = level.geometry();
            debug!(
                "{}: {} sets x {} ways x {}B ({}KiB), {:?}",
                level.name(), g.sets(), g.ways(), g.block_size(), g.capacity() / 1024, level.policy()
            );
        }

        Ok(Hierarchy { levels, memory })
    }

    /// Little-endian read of `len` (1 to 4) bytes through the top level
    #[inline(always)]
    pub fn read(&mut self, addr: u32, len: usize) -> u32 {
        self.read_at(0, addr, len)
    }

    /// Little-endian write of the low `len` (1 to 4) bytes of `value` through the top level
    #[inline(always)]
    pub fn write(&mut self, addr: u32, len: usize, value: u32) {
        self.write_at(0, addr, len, value)
    }

    /// Reads entering the hierarchy at level `first` instead of the top.
    /// `first == levels().len()` reads memory directly. Panics if `first` is past that.
    pub fn read_at(&mut self, first: usize, addr: u32, len: usize) -> u32 {
        assert!(len >= 1 && len <= MAX_ACCESS, "invalid access length {}", len);
        self.check_level(first);
        let mut buf = [0u8; MAX_ACCESS];
        level::read(&mut self.levels[first..], &mut self.memory, addr, &mut buf[..len]);
        decode_le(&buf[..len])
    }

    /// Writes entering the hierarchy at level `first` instead of the top.
    /// Levels above `first` are not updated. Panics like [`Hierarchy::read_at`].
    pub fn write_at(&mut self, first: usize, addr: u32, len: usize, value: u32) {
        self.check_level(first);
        let bytes = encode_le(value, len);
        level::write(&mut self.levels[first..], &mut self.memory, addr, &bytes[..len]);
    }

    #[inline(always)]
    fn check_level(&self, first: usize) {
        assert!(first <= self.levels.len(), "no cache level {} (hierarchy has {})", first, self.levels.len());
    }

    /// Bypasses every level. Cached copies of the same address are neither consulted nor updated.
    pub fn read_uncached(&self, addr: u32, len: usize) -> u32 {
        assert!(len >= 1 && len <= MAX_ACCESS, "invalid access length {}", len);
        let mut buf = [0u8; MAX_ACCESS];
        self.memory.read_bytes(addr, &mut buf[..len]);
        decode_le(&buf[..len])
    }

    pub fn write_uncached(&mut self, addr: u32, len: usize, value: u32) {
        let bytes = encode_le(value, len);
        self.memory.write_bytes(addr, &bytes[..len]);
    }

    /// What every level holds for `addr`, top first. Changes nothing, not even statistics.
    pub fn probe(&self, addr: u32) -> Vec<Probe> {
        self.levels.iter().map(|level| Probe::new(level, addr)).collect()
    }

    /// Pushes every dirty block down, top level first, so memory holds the latest data
    pub fn flush(&mut self) {
        for i in 0..self.levels.len() {
            level::flush(&mut self.levels[i..], &mut self.memory);
        }
    }

    pub fn levels(&self) -> &[CacheLevel] {
        &self.levels
    }

    pub fn stats(&self) -> impl Iterator<Item = (&'static str, CacheStats)> + '_ {
        self.levels.iter().map(|level| (level.name(), level.stats()))
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Direct access to memory, behind the caches' back. Call [`Hierarchy::flush`] first
    /// if dirty lines must not be lost.
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }
}
