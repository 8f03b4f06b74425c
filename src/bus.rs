//! System bus views. `Snes` owns every component and lends them to a `Bus`
//! for the duration of one sub-step.

use snes_apu::Apu;

use crate::cartridge::Cartridge;
use crate::cpu_bus::CpuBus;
use crate::dma::{DmaBus, DmaController};
use crate::input::Input;
use crate::io::CpuIo;
use crate::memory::MemoryRegions;
use crate::ppu::Ppu;

/// Everything reachable from the A and B buses except the DMA registers.
pub struct Bus<'a> {
    pub cart: &'a Cartridge,
    pub memory: &'a mut MemoryRegions,
    pub ppu: &'a mut Ppu,
    pub apu: &'a mut Apu,
    pub io: &'a mut CpuIo,
    pub input: &'a mut Input,
    /// Last value driven on the data bus (MDR).
    pub open_bus: &'a mut u8,
}

#[inline]
fn is_system_bank(bank: u8) -> bool {
    matches!(bank, 0x00..=0x3F | 0x80..=0xBF)
}

impl<'a> Bus<'a> {
    pub fn read(&mut self, addr: u32) -> u8 {
        let addr = addr & 0xFF_FFFF;
        let bank = (addr >> 16) as u8;
        let offset = addr as u16;
        let value = match bank {
            0x7E | 0x7F => Some(self.memory.read_wram(addr - 0x7E_0000)),
            _ if is_system_bank(bank) && offset < 0x8000 => self.read_system(addr, offset),
            _ => self.read_cart(addr),
        };
        self.settle(addr, value)
    }

    pub fn write(&mut self, addr: u32, value: u8) {
        let addr = addr & 0xFF_FFFF;
        let bank = (addr >> 16) as u8;
        let offset = addr as u16;
        *self.open_bus = value;
        match bank {
            0x7E | 0x7F => self.memory.write_wram(addr - 0x7E_0000, value),
            _ if is_system_bank(bank) && offset < 0x8000 => self.write_system(addr, offset, value),
            _ => self.write_cart(addr, value),
        }
    }

    fn settle(&mut self, addr: u32, value: Option<u8>) -> u8 {
        match value {
            Some(v) => {
                *self.open_bus = v;
                v
            }
            None => {
                log::trace!("open bus read ${:06X} -> {:02X}", addr, *self.open_bus);
                *self.open_bus
            }
        }
    }

    fn read_system(&mut self, addr: u32, offset: u16) -> Option<u8> {
        let mdr = *self.open_bus;
        match offset {
            0x0000..=0x1FFF => Some(self.memory.read_wram(offset as u32)),
            0x2137 => {
                if self.io.wrio() & 0x80 != 0 {
                    self.ppu.latch_counters();
                }
                None
            }
            0x2100..=0x213F => self.ppu.read_register(offset),
            0x2140..=0x217F => Some(self.apu.cpu_read_port((offset & 0x03) as u8)),
            0x2180 => Some(self.memory.read_wram_port()),
            0x4016 => Some((mdr & 0xFC) | self.input.read_serial(0)),
            0x4017 => Some((mdr & 0xE0) | 0x1C | self.input.read_serial(1)),
            0x4212 => Some(self.io.hvbjoy(self.ppu.in_vblank(), self.ppu.in_hblank(), mdr)),
            0x4200..=0x421F => self.io.read(offset, mdr),
            _ => self.read_cart(addr),
        }
    }

    fn write_system(&mut self, addr: u32, offset: u16, value: u8) {
        match offset {
            0x0000..=0x1FFF => self.memory.write_wram(offset as u32, value),
            0x2100..=0x213F => self.ppu.write_register(offset, value),
            0x2140..=0x217F => self.apu.cpu_write_port((offset & 0x03) as u8, value),
            0x2180 => self.memory.write_wram_port(value),
            0x2181..=0x2183 => self.memory.set_wram_port_byte((offset - 0x2181) as u8, value),
            0x4016 => self.input.write_strobe(value),
            0x4201 => {
                // WRIO bit 7 falling latches the H/V counters.
                if self.io.wrio() & 0x80 != 0 && value & 0x80 == 0 {
                    self.ppu.latch_counters();
                }
                self.io.write(offset, value);
            }
            0x4200..=0x421F => self.io.write(offset, value),
            _ => self.write_cart(addr, value),
        }
    }

    fn read_cart(&self, addr: u32) -> Option<u8> {
        if let Some(index) = self.cart.map_sram(addr) {
            return self.memory.sram.get(index).copied();
        }
        self.cart.read(addr)
    }

    fn write_cart(&mut self, addr: u32, value: u8) {
        match self.cart.map_sram(addr) {
            Some(index) => {
                if let Some(byte) = self.memory.sram.get_mut(index) {
                    *byte = value;
                }
            }
            None => log::trace!("ignored write ${:06X} <- {:02X}", addr, value),
        }
    }
}

/// A-bus addresses DMA cannot reach: the $21xx, $42xx and $43xx windows.
fn dma_blocked(addr: u32) -> bool {
    let bank = (addr >> 16) as u8;
    let offset = addr as u16;
    is_system_bank(bank) && matches!(offset >> 8, 0x21 | 0x42 | 0x43)
}

impl DmaBus for Bus<'_> {
    fn read_a(&mut self, addr: u32) -> u8 {
        if dma_blocked(addr) {
            return *self.open_bus;
        }
        self.read(addr)
    }

    fn write_a(&mut self, addr: u32, value: u8) {
        if dma_blocked(addr) {
            return;
        }
        self.write(addr, value);
    }

    fn read_b(&mut self, reg: u8) -> u8 {
        let offset = 0x2100 | reg as u16;
        let value = self.read_system(offset as u32, offset);
        self.settle(offset as u32, value)
    }

    fn write_b(&mut self, reg: u8, value: u8) {
        let offset = 0x2100 | reg as u16;
        *self.open_bus = value;
        self.write_system(offset as u32, offset, value);
    }
}

/// The CPU's view: the system bus plus the DMA register file.
pub struct CpuView<'a> {
    pub bus: Bus<'a>,
    pub dma: &'a mut DmaController,
}

#[inline]
fn is_dma_register(addr: u32) -> bool {
    let offset = addr as u16;
    is_system_bank((addr >> 16) as u8) && matches!(offset, 0x420B | 0x420C | 0x4300..=0x437F)
}

impl CpuBus for CpuView<'_> {
    fn read_u8(&mut self, addr: u32) -> u8 {
        if is_dma_register(addr) {
            let value = self.dma.read(addr as u16);
            return self.bus.settle(addr, value);
        }
        self.bus.read(addr)
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        if is_dma_register(addr) {
            *self.bus.open_bus = value;
            self.dma.write(addr as u16, value);
            return;
        }
        self.bus.write(addr, value);
    }
}
