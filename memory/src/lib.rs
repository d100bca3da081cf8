//! The emulated machine's memory system: the cache hierarchy in front of [`Dram`].

use cache::{CacheConfig, ConfigError, Geometry, Hierarchy, HierarchyConfig, WritePolicy};
use common::cli::CacheOpts;
use thiserror::Error;
use tracing::info;

pub mod dram;

pub use dram::Dram;

pub type System = Hierarchy<Dram>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Cache(#[from] ConfigError),
    #[error("memory size {0:#x} is not a power of two of at most 4GiB")]
    MemorySize(usize),
    #[error("image of {len:#x} bytes at {addr:#010x} doesn't fit in {size:#x} bytes of memory")]
    ImageTooLarge { addr: u32, len: usize, size: usize },
}

/// Write-through L1 over write-back L2, shaped by the command line options
pub fn config(opts: &CacheOpts) -> Result<HierarchyConfig, Error> {
    let l1 = Geometry::new(opts.l1_offset_bits, opts.l1_set_bits, opts.l1_ways)?;
    let l2 = Geometry::new(opts.l2_offset_bits, opts.l2_set_bits, opts.l2_ways)?;

    Ok(HierarchyConfig {
        levels: vec![
            CacheConfig::new("L1", l1, WritePolicy::WriteThrough),
            CacheConfig::new("L2", l2, WritePolicy::WriteBack),
        ],
        seed: opts.seed,
    })
}

pub fn new(opts: &CacheOpts) -> Result<System, Error> {
    let dram = Dram::new(opts.memory_size)?;
    let system = Hierarchy::new(config(opts)?, dram)?;
    info!("{} bytes of memory behind {} cache levels", system.memory().size(), system.levels().len());
    Ok(system)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> CacheOpts {
        CacheOpts {
            l1_offset_bits: 6,
            l1_set_bits: 7,
            l1_ways: 8,
            l2_offset_bits: 6,
            l2_set_bits: 12,
            l2_ways: 16,
            memory_size: 0x10_0000,
            seed: Some(3),
        }
    }

    #[test]
    fn reference_options_match_presets() {
        let config = config(&opts()).unwrap();
        assert_eq!(config.levels, HierarchyConfig::reference().levels);
        assert_eq!(config.seed, Some(3));
    }

    #[test]
    fn bad_options() {
        let mut zero_ways = opts();
        zero_ways.l2_ways = 0;
        assert!(matches!(new(&zero_ways), Err(Error::Cache(ConfigError::ZeroWays))));

        let mut odd_memory = opts();
        odd_memory.memory_size = 3000;
        assert!(matches!(new(&odd_memory), Err(Error::MemorySize(3000))));

        let mut inverted = opts();
        inverted.l1_offset_bits = 7;
        assert!(matches!(new(&inverted), Err(Error::Cache(ConfigError::BlockSize { .. }))));
    }

    #[test]
    fn program_image_through_the_caches() {
        let mut system = new(&opts()).unwrap();
        system.memory_mut().load(0x1000, &[0x55, 0x89, 0xe5, 0x83, 0xec, 0x10]).unwrap();

        assert_eq!(system.read(0x1000, 1), 0x55);
        assert_eq!(system.read(0x1001, 4), 0xec83_e589);
        assert_eq!(system.read(0x1002, 2), 0x83e5);

        // Stores stay in L2 until flushed
        system.write(0x103e, 4, 0xdead_beef);
        assert_eq!(system.read_uncached(0x103e, 4), 0);
        assert_eq!(system.read(0x103e, 4), 0xdead_beef);
        system.flush();
        assert_eq!(system.read_uncached(0x103e, 4), 0xdead_beef);
        assert_eq!(&system.memory().as_slice()[0x103e..0x1042], &[0xef, 0xbe, 0xad, 0xde]);
    }

    #[test]
    fn probe_dump() {
        let mut system = new(&opts()).unwrap();
        system.write(0x40, 1, 0xab);

        let dump: Vec<String> = system.probe(0x40).iter().map(|p| p.to_string()).collect();
        assert_eq!(dump[0], "L1 miss");
        assert!(dump[1].starts_with("L2 hit\ntag: 0, valid: 1, dirty: 1, data:\n  ab 00"));
    }
}
