//! Text access traces, one access per line:
//!
//! ```text
//! r  ADDR LEN         read through the caches
//! w  ADDR LEN VALUE   write through the caches
//! ur ADDR LEN         uncached read
//! uw ADDR LEN VALUE   uncached write
//! p  ADDR             dump what each level holds for ADDR
//! f                   flush dirty lines to memory
//! ```
//!
//! Numbers are decimal or `0x` hex. `#` starts a comment.

use anyhow::{bail, ensure, Context};
use common::util::{parse_u32, MAX_ACCESS};
use memory::System;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read { addr: u32, len: usize },
    Write { addr: u32, len: usize, value: u32 },
    UncachedRead { addr: u32, len: usize },
    UncachedWrite { addr: u32, len: usize, value: u32 },
    Probe { addr: u32 },
    Flush,
}

pub fn parse(text: &str) -> Result<Vec<Access>, anyhow::Error> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i, line.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(i, line)| parse_line(line).with_context(|| format!("line {}: {:?}", i + 1, line)))
        .collect()
}

fn parse_line(line: &str) -> Result<Access, anyhow::Error> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let access = match fields.as_slice() {
        ["r", addr, len] => Access::Read { addr: parse_u32(addr)?, len: parse_len(len)? },
        ["ur", addr, len] => Access::UncachedRead { addr: parse_u32(addr)?, len: parse_len(len)? },
        ["w", addr, len, value] => {
            let len = parse_len(len)?;
            Access::Write { addr: parse_u32(addr)?, len, value: parse_value(value, len)? }
        }
        ["uw", addr, len, value] => {
            let len = parse_len(len)?;
            Access::UncachedWrite { addr: parse_u32(addr)?, len, value: parse_value(value, len)? }
        }
        ["p", addr] => Access::Probe { addr: parse_u32(addr)? },
        ["f"] => Access::Flush,
        _ => bail!("unknown access"),
    };
    Ok(access)
}

fn parse_len(s: &str) -> Result<usize, anyhow::Error> {
    let len = parse_u32(s)? as usize;
    ensure!(len >= 1 && len <= MAX_ACCESS, "access length {} out of range", len);
    Ok(len)
}

fn parse_value(s: &str, len: usize) -> Result<u32, anyhow::Error> {
    let value = parse_u32(s)?;
    ensure!(len == MAX_ACCESS || value >> (8 * len) == 0, "{:#x} doesn't fit in {} bytes", value, len);
    Ok(value)
}

impl Access {
    /// Performs the access, returning anything worth printing
    pub fn run(&self, system: &mut System) -> Option<String> {
        match *self {
            Access::Read { addr, len } => {
                let value = system.read(addr, len);
                Some(format!("{:#010x}: {:#0width$x}", addr, value, width = 2 + 2 * len))
            }
            Access::UncachedRead { addr, len } => {
                let value = system.read_uncached(addr, len);
                Some(format!("{:#010x}: {:#0width$x} (uncached)", addr, value, width = 2 + 2 * len))
            }
            Access::Write { addr, len, value } => {
                system.write(addr, len, value);
                None
            }
            Access::UncachedWrite { addr, len, value } => {
                system.write_uncached(addr, len, value);
                None
            }
            Access::Probe { addr } => {
                let probes: Vec<String> = system.probe(addr).iter().map(|p| p.to_string()).collect();
                Some(probes.join("\n"))
            }
            Access::Flush => {
                system.flush();
                None
            }
        }
    }
}
