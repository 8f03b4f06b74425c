use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

pub const WRAM_SIZE: usize = 0x20000;

/// Fixed-length byte buffer. The length is chosen at construction and is
/// checked again when a save state is restored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryBlock(Box<[u8]>);

impl MemoryBlock {
    pub fn new(len: usize) -> Self {
        Self(vec![0; len].into_boxed_slice())
    }

    pub fn filled(len: usize, value: u8) -> Self {
        Self(vec![value; len].into_boxed_slice())
    }
}

impl Deref for MemoryBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for MemoryBlock {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for MemoryBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryBlock({} bytes)", self.0.len())
    }
}

/// Work RAM, battery SRAM and the $2180 WRAM port pointer. The ROM image is
/// owned by the `Cartridge`; video memories belong to the `Ppu`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegions {
    pub wram: MemoryBlock,
    pub sram: MemoryBlock,
    /// 17-bit address used by $2180 (WMDATA).
    pub wram_port: u32,
}

impl MemoryRegions {
    pub fn new(sram_size: usize) -> Self {
        Self {
            wram: MemoryBlock::new(WRAM_SIZE),
            sram: MemoryBlock::filled(sram_size, 0xFF),
            wram_port: 0,
        }
    }

    #[inline]
    pub fn read_wram(&self, offset: u32) -> u8 {
        self.wram[(offset as usize) & (WRAM_SIZE - 1)]
    }

    #[inline]
    pub fn write_wram(&mut self, offset: u32, value: u8) {
        self.wram[(offset as usize) & (WRAM_SIZE - 1)] = value;
    }

    pub fn read_wram_port(&mut self) -> u8 {
        let value = self.read_wram(self.wram_port);
        self.wram_port = (self.wram_port + 1) & 0x1FFFF;
        value
    }

    pub fn write_wram_port(&mut self, value: u8) {
        self.write_wram(self.wram_port, value);
        self.wram_port = (self.wram_port + 1) & 0x1FFFF;
    }

    /// $2181-$2183 set the port address one byte at a time.
    pub fn set_wram_port_byte(&mut self, index: u8, value: u8) {
        let shift = 8 * index as u32;
        let mask = 0xFFu32 << shift;
        self.wram_port = ((self.wram_port & !mask) | ((value as u32) << shift)) & 0x1FFFF;
    }
}
