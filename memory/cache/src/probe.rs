use std::fmt;

use crate::level::CacheLevel;

/// What one level holds for a probed address. Built without touching the level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub level: &'static str,
    pub line: Option<ProbedLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedLine {
    pub tag: u32,
    pub valid: bool,
    pub dirty: bool,
    pub data: Vec<u8>,
}

impl Probe {
    pub fn new(level: &CacheLevel, addr: u32) -> Probe {
        let line = level.resident(addr).map(|slot| {
            let tag = level.store().tag(slot);
            ProbedLine {
                tag: tag.tag(),
                valid: tag.valid(),
                dirty: tag.dirty(),
                data: level.store().data(slot).to_vec(),
            }
        });

        Probe { level: level.name(), line }
    }

    pub fn is_hit(&self) -> bool {
        self.line.is_some()
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.line {
            Some(line) => {
                writeln!(f, "{} hit", self.level)?;
                write!(f, "tag: {:x}, valid: {}, dirty: {}, data:", line.tag, line.valid as u8, line.dirty as u8)?;
                for (i, byte) in line.data.iter().enumerate() {
                    if i % 16 == 0 {
                        write!(f, "\n  ")?;
                    } else {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            None => write!(f, "{} miss", self.level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_format() {
        let probe = Probe {
            level: "L1",
            line: Some(ProbedLine { tag: 0x1a, valid: true, dirty: false, data: (0..20).collect() }),
        };
        assert_eq!(
            probe.to_string(),
            "L1 hit\ntag: 1a, valid: 1, dirty: 0, data:\n  00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f\n  10 11 12 13"
        );

        let miss = Probe { level: "L2", line: None };
        assert!(!miss.is_hit());
        assert_eq!(miss.to_string(), "L2 miss");
    }
}
