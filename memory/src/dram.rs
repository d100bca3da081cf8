use common::Memory;

use crate::Error;

/// Main memory: one flat, power-of-two sized bank.
///
/// Addresses are masked to the bank size, so every 32-bit address maps somewhere and the
/// bank simply mirrors across the rest of the address space.
pub struct Dram {
    mem: Box<[u8]>,
    mask: u32,
}

impl Dram {
    pub fn new(size: usize) -> Result<Dram, Error> {
        if !size.is_power_of_two() || size as u64 > 1 << 32 {
            return Err(Error::MemorySize(size));
        }
        Ok(Dram {
            mem: vec![0; size].into_boxed_slice(),
            mask: (size - 1) as u32,
        })
    }

    pub fn size(&self) -> usize {
        self.mem.len()
    }

    /// Copies a raw image into memory starting at `addr`
    pub fn load(&mut self, addr: u32, image: &[u8]) -> Result<(), Error> {
        let start = (addr & self.mask) as usize;
        if start + image.len() > self.mem.len() {
            return Err(Error::ImageTooLarge { addr, len: image.len(), size: self.mem.len() });
        }
        self.mem[start..start + image.len()].copy_from_slice(image);
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mem
    }
}

impl Memory for Dram {
    #[inline(always)]
    fn read_byte(&self, addr: u32) -> u8 {
        self.mem[(addr & self.mask) as usize]
    }

    #[inline(always)]
    fn write_byte(&mut self, addr: u32, value: u8) {
        self.mem[(addr & self.mask) as usize] = value;
    }
}
