pub mod cli;
pub mod util;

/// Linear, byte addressable storage that sits below the last cache level.
///
/// Implementations must be total over the emulated address space: every
/// address reads something and every write lands somewhere.
pub trait Memory {
    fn read_byte(&self, addr: u32) -> u8;
    fn write_byte(&mut self, addr: u32, value: u8);

    fn read_bytes(&self, addr: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.read_byte(addr.wrapping_add(i as u32));
        }
    }

    fn write_bytes(&mut self, addr: u32, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.write_byte(addr.wrapping_add(i as u32), *byte);
        }
    }
}

/// Plain vectors are handy as small backing stores. Addresses wrap modulo the length,
/// so the contents mirror across the address space. An empty vector reads as zero
/// and drops writes.
impl Memory for Vec<u8> {
    #[inline(always)]
    fn read_byte(&self, addr: u32) -> u8 {
        self.get(addr as usize % self.len().max(1)).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn write_byte(&mut self, addr: u32, value: u8) {
        let len = self.len().max(1);
        if let Some(byte) = self.get_mut(addr as usize % len) {
            *byte = value;
        }
    }
}
