//! Trait representing the minimal bus interface required by the 65C816 core.

pub trait CpuBus {
    fn read_u8(&mut self, addr: u32) -> u8;
    fn write_u8(&mut self, addr: u32, value: u8);

    /// Little-endian word as two byte accesses, wrapping over 24 bits.
    fn read_u16(&mut self, addr: u32) -> u16 {
        let lo = self.read_u8(addr & 0xFF_FFFF) as u16;
        let hi = self.read_u8(addr.wrapping_add(1) & 0xFF_FFFF) as u16;
        (hi << 8) | lo
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        self.write_u8(addr & 0xFF_FFFF, (value & 0xFF) as u8);
        self.write_u8(addr.wrapping_add(1) & 0xFF_FFFF, (value >> 8) as u8);
    }
}
