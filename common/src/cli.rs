use clap::Args;

use crate::util::parse_size;

/// Geometry and memory options shared by every frontend.
///
/// Defaults describe the reference hierarchy: a 64KiB L1 (128 sets x 8 ways x 64B)
/// in front of a 4MiB L2 (4096 sets x 16 ways x 64B) and 128MiB of memory.
#[derive(Debug, Clone, Args)]
#[clap(next_help_heading = "Cache Geometry")]
pub struct CacheOpts {
    /// log2 of the L1 block size
    #[arg(long, default_value_t = 6)]
    pub l1_offset_bits: u32,

    /// log2 of the L1 set count
    #[arg(long, default_value_t = 7)]
    pub l1_set_bits: u32,

    #[arg(long, default_value_t = 8)]
    pub l1_ways: usize,

    /// log2 of the L2 block size
    #[arg(long, default_value_t = 6)]
    pub l2_offset_bits: u32,

    /// log2 of the L2 set count
    #[arg(long, default_value_t = 12)]
    pub l2_set_bits: u32,

    #[arg(long, default_value_t = 16)]
    pub l2_ways: usize,

    /// Backing memory size in bytes, must be a power of two
    #[arg(long, default_value = "0x800_0000", value_parser = parse_size)]
    pub memory_size: usize,

    /// Seed for victim selection. Omit to seed from the OS
    #[arg(long)]
    pub seed: Option<u64>,
}
