// SNES DMA and HDMA implementation

use serde::{Deserialize, Serialize};

/// System cycles per byte moved by general DMA or HDMA.
pub const CYCLES_PER_BYTE: u32 = 2;

/// Access used by transfers. The A bus is the 24-bit CPU address space,
/// the B bus is the $21xx register page.
pub trait DmaBus {
    fn read_a(&mut self, addr: u32) -> u8;
    fn write_a(&mut self, addr: u32, value: u8);
    fn read_b(&mut self, reg: u8) -> u8;
    fn write_b(&mut self, reg: u8, value: u8);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmaChannel {
    /// DMAPn ($43x0)
    pub control: u8,
    /// BBADn ($43x1)
    pub b_address: u8,
    /// A1TnL/H ($43x2-$43x3)
    pub a_address: u16,
    /// A1Bn ($43x4)
    pub a_bank: u8,
    /// DASnL/H ($43x5-$43x6): byte count, or HDMA indirect address.
    pub count: u16,
    /// DASBn ($43x7)
    pub indirect_bank: u8,
    /// A2AnL/H ($43x8-$43x9): current HDMA table address.
    pub table_address: u16,
    /// NLTRn ($43xA)
    pub line_counter: u8,
    /// $43xB/$43xF
    pub unused: u8,
    pub do_transfer: bool,
    pub terminated: bool,
}

impl Default for DmaChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaChannel {
    pub fn new() -> Self {
        // Power-on values are all ones.
        Self {
            control: 0xFF,
            b_address: 0xFF,
            a_address: 0xFFFF,
            a_bank: 0xFF,
            count: 0xFFFF,
            indirect_bank: 0xFF,
            table_address: 0xFFFF,
            line_counter: 0xFF,
            unused: 0xFF,
            do_transfer: false,
            terminated: true,
        }
    }

    pub fn b_to_a(&self) -> bool {
        self.control & 0x80 != 0
    }

    pub fn hdma_indirect(&self) -> bool {
        self.control & 0x40 != 0
    }

    pub fn transfer_unit(&self) -> u8 {
        self.control & 0x07
    }

    /// A-bus step: +1, fixed or -1 (DMAP bits 3-4).
    fn a_step(&self) -> u16 {
        match (self.control >> 3) & 0x03 {
            0 => 1,
            2 => 0xFFFF,
            _ => 0,
        }
    }

    fn a_bus(&self) -> u32 {
        ((self.a_bank as u32) << 16) | self.a_address as u32
    }

    fn table_bus(&self) -> u32 {
        ((self.a_bank as u32) << 16) | self.table_address as u32
    }

    fn indirect_bus(&self) -> u32 {
        ((self.indirect_bank as u32) << 16) | self.count as u32
    }

    fn read_register(&self, reg: u16) -> Option<u8> {
        let value = match reg {
            0x0 => self.control,
            0x1 => self.b_address,
            0x2 => self.a_address as u8,
            0x3 => (self.a_address >> 8) as u8,
            0x4 => self.a_bank,
            0x5 => self.count as u8,
            0x6 => (self.count >> 8) as u8,
            0x7 => self.indirect_bank,
            0x8 => self.table_address as u8,
            0x9 => (self.table_address >> 8) as u8,
            0xA => self.line_counter,
            0xB | 0xF => self.unused,
            _ => return None,
        };
        Some(value)
    }

    fn write_register(&mut self, reg: u16, value: u8) {
        match reg {
            0x0 => self.control = value,
            0x1 => self.b_address = value,
            0x2 => self.a_address = (self.a_address & 0xFF00) | value as u16,
            0x3 => self.a_address = (self.a_address & 0x00FF) | ((value as u16) << 8),
            0x4 => self.a_bank = value,
            0x5 => self.count = (self.count & 0xFF00) | value as u16,
            0x6 => self.count = (self.count & 0x00FF) | ((value as u16) << 8),
            0x7 => self.indirect_bank = value,
            0x8 => self.table_address = (self.table_address & 0xFF00) | value as u16,
            0x9 => self.table_address = (self.table_address & 0x00FF) | ((value as u16) << 8),
            0xA => self.line_counter = value,
            0xB | 0xF => self.unused = value,
            _ => {}
        }
    }
}

/// B-bus register offsets written for each byte of a transfer unit.
fn unit_pattern(unit: u8) -> &'static [u8] {
    match unit & 0x07 {
        0 => &[0],
        1 => &[0, 1],
        2 | 6 => &[0, 0],
        3 | 7 => &[0, 0, 1, 1],
        4 => &[0, 1, 2, 3],
        _ => &[0, 1, 0, 1],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmaController {
    pub channels: [DmaChannel; 8],
    /// MDMAEN ($420B)
    dma_enable: u8,
    /// HDMAEN ($420C)
    hdma_enable: u8,
}

impl Default for DmaController {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaController {
    pub fn new() -> Self {
        Self {
            channels: Default::default(),
            dma_enable: 0,
            hdma_enable: 0,
        }
    }

    pub fn reset(&mut self) {
        self.dma_enable = 0;
        self.hdma_enable = 0;
        for channel in &mut self.channels {
            channel.do_transfer = false;
            channel.terminated = true;
        }
    }

    pub fn dma_enable(&self) -> u8 {
        self.dma_enable
    }

    pub fn hdma_enable(&self) -> u8 {
        self.hdma_enable
    }

    /// A general DMA is armed and waits for the next CPU instruction boundary.
    pub fn gp_pending(&self) -> bool {
        self.dma_enable != 0
    }

    /// $420B/$420C are write-only; unused channel bytes read as open bus.
    pub fn read(&self, addr: u16) -> Option<u8> {
        match addr {
            0x4300..=0x437F => {
                let channel = ((addr >> 4) & 0x07) as usize;
                self.channels[channel].read_register(addr & 0x0F)
            }
            _ => None,
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x420B => {
                self.dma_enable = value;
                if value != 0 {
                    log::debug!("DMA armed: MDMAEN={:02X}", value);
                }
            }
            0x420C => self.hdma_enable = value,
            0x4300..=0x437F => {
                let channel = ((addr >> 4) & 0x07) as usize;
                self.channels[channel].write_register(addr & 0x0F, value);
            }
            _ => {}
        }
    }

    /// Runs every armed channel to completion, lowest first, and returns the
    /// system cycles the transfer took.
    pub fn run_general<B: DmaBus>(&mut self, bus: &mut B) -> u32 {
        let mut cycles = 0;
        for index in 0..8 {
            if self.dma_enable & (1 << index) == 0 {
                continue;
            }
            cycles += self.run_channel(index, bus);
            self.dma_enable &= !(1 << index);
        }
        cycles
    }

    fn run_channel<B: DmaBus>(&mut self, index: usize, bus: &mut B) -> u32 {
        let ch = &mut self.channels[index];
        let bytes: u32 = if ch.count == 0 { 0x10000 } else { ch.count as u32 };
        let pattern = unit_pattern(ch.transfer_unit());
        let step = ch.a_step();
        log::debug!(
            "DMA ch{} {} ${:06X} {} $21{:02X}, {} bytes (DMAP={:02X})",
            index,
            if ch.b_to_a() { "to" } else { "from" },
            ch.a_bus(),
            if ch.b_to_a() { "<-" } else { "->" },
            ch.b_address,
            bytes,
            ch.control
        );

        for i in 0..bytes {
            let reg = ch.b_address.wrapping_add(pattern[i as usize % pattern.len()]);
            let a = ch.a_bus();
            if ch.b_to_a() {
                let value = bus.read_b(reg);
                bus.write_a(a, value);
            } else {
                let value = bus.read_a(a);
                bus.write_b(reg, value);
            }
            ch.a_address = ch.a_address.wrapping_add(step);
            ch.count = ch.count.wrapping_sub(1);
        }
        bytes * CYCLES_PER_BYTE
    }

    /// Start of frame: reload every enabled HDMA channel from its table.
    pub fn hdma_init<B: DmaBus>(&mut self, bus: &mut B) -> u32 {
        let mut bytes = 0;
        for index in 0..8 {
            let ch = &mut self.channels[index];
            ch.do_transfer = false;
            ch.terminated = true;
            if self.hdma_enable & (1 << index) == 0 {
                continue;
            }
            ch.table_address = ch.a_address;
            ch.terminated = false;
            bytes += Self::load_entry(ch, bus);
            log::debug!(
                "HDMA ch{} init: table ${:06X}, NLTR={:02X}",
                index,
                ch.a_bus(),
                ch.line_counter
            );
        }
        bytes * CYCLES_PER_BYTE
    }

    /// One line of HDMA, before the line's first pixel.
    pub fn hdma_line<B: DmaBus>(&mut self, bus: &mut B) -> u32 {
        let mut bytes = 0;
        for index in 0..8 {
            let ch = &mut self.channels[index];
            if self.hdma_enable & (1 << index) == 0 || ch.terminated {
                continue;
            }
            if ch.do_transfer {
                for &offset in unit_pattern(ch.transfer_unit()) {
                    let source = if ch.hdma_indirect() {
                        let addr = ch.indirect_bus();
                        ch.count = ch.count.wrapping_add(1);
                        addr
                    } else {
                        let addr = ch.table_bus();
                        ch.table_address = ch.table_address.wrapping_add(1);
                        addr
                    };
                    let reg = ch.b_address.wrapping_add(offset);
                    if ch.b_to_a() {
                        let value = bus.read_b(reg);
                        bus.write_a(source, value);
                    } else {
                        let value = bus.read_a(source);
                        bus.write_b(reg, value);
                    }
                    bytes += 1;
                }
            }
            ch.line_counter = ch.line_counter.wrapping_sub(1);
            ch.do_transfer = ch.line_counter & 0x80 != 0;
            if ch.line_counter & 0x7F == 0 {
                bytes += Self::load_entry(ch, bus);
            }
        }
        bytes * CYCLES_PER_BYTE
    }

    /// Reads the next NLTR (and indirect address). A zero NLTR ends the table.
    fn load_entry<B: DmaBus>(ch: &mut DmaChannel, bus: &mut B) -> u32 {
        ch.line_counter = bus.read_a(ch.table_bus());
        ch.table_address = ch.table_address.wrapping_add(1);
        let mut bytes = 1;
        if ch.line_counter == 0 {
            ch.terminated = true;
            ch.do_transfer = false;
            return bytes;
        }
        if ch.hdma_indirect() {
            let lo = bus.read_a(ch.table_bus()) as u16;
            ch.table_address = ch.table_address.wrapping_add(1);
            let hi = bus.read_a(ch.table_bus()) as u16;
            ch.table_address = ch.table_address.wrapping_add(1);
            ch.count = (hi << 8) | lo;
            bytes += 2;
        }
        ch.do_transfer = true;
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeBus {
        a: Vec<u8>,
        b_writes: Vec<(u8, u8)>,
        b_value: u8,
    }

    impl FakeBus {
        fn new() -> Self {
            Self {
                a: vec![0; 0x20000],
                ..Default::default()
            }
        }
    }

    impl DmaBus for FakeBus {
        fn read_a(&mut self, addr: u32) -> u8 {
            self.a[addr as usize & 0x1FFFF]
        }
        fn write_a(&mut self, addr: u32, value: u8) {
            self.a[addr as usize & 0x1FFFF] = value;
        }
        fn read_b(&mut self, _reg: u8) -> u8 {
            self.b_value = self.b_value.wrapping_add(1);
            self.b_value
        }
        fn write_b(&mut self, reg: u8, value: u8) {
            self.b_writes.push((reg, value));
        }
    }

    fn setup(dma: &mut DmaController, channel: u16, regs: &[u8]) {
        for (i, &v) in regs.iter().enumerate() {
            dma.write(0x4300 | (channel << 4) | i as u16, v);
        }
    }

    #[test]
    fn general_dma_uses_unit_pattern_and_costs_two_cycles_per_byte() {
        let mut dma = DmaController::new();
        let mut bus = FakeBus::new();
        bus.a[0x1000..0x1004].copy_from_slice(&[1, 2, 3, 4]);
        // unit 1 (two registers), $2118, source $00:1000, 4 bytes
        setup(&mut dma, 0, &[0x01, 0x18, 0x00, 0x10, 0x00, 0x04, 0x00]);
        dma.write(0x420B, 0x01);
        assert!(dma.gp_pending());
        let cycles = dma.run_general(&mut bus);
        assert_eq!(cycles, 8);
        assert_eq!(bus.b_writes, vec![(0x18, 1), (0x19, 2), (0x18, 3), (0x19, 4)]);
        assert!(!dma.gp_pending());
        assert_eq!(dma.channels[0].count, 0);
        assert_eq!(dma.channels[0].a_address, 0x1004);
    }

    #[test]
    fn zero_count_moves_64k() {
        let mut dma = DmaController::new();
        let mut bus = FakeBus::new();
        setup(&mut dma, 3, &[0x08, 0x22, 0x00, 0x00, 0x00, 0x00, 0x00]);
        dma.write(0x420B, 0x08);
        assert_eq!(dma.run_general(&mut bus), 0x10000 * 2);
        assert_eq!(bus.b_writes.len(), 0x10000);
        // Fixed A-bus address.
        assert_eq!(dma.channels[3].a_address, 0);
    }

    #[test]
    fn b_to_a_with_decrement() {
        let mut dma = DmaController::new();
        let mut bus = FakeBus::new();
        setup(&mut dma, 1, &[0x90, 0x39, 0x02, 0x20, 0x00, 0x03, 0x00]);
        dma.write(0x420B, 0x02);
        dma.run_general(&mut bus);
        assert_eq!(&bus.a[0x2000..0x2003], &[3, 2, 1]);
    }

    #[test]
    fn channels_run_in_order() {
        let mut dma = DmaController::new();
        let mut bus = FakeBus::new();
        setup(&mut dma, 2, &[0x00, 0x22, 0x00, 0x00, 0x00, 0x01, 0x00]);
        setup(&mut dma, 5, &[0x00, 0x18, 0x00, 0x00, 0x00, 0x01, 0x00]);
        dma.write(0x420B, 0x24);
        dma.run_general(&mut bus);
        let regs: Vec<u8> = bus.b_writes.iter().map(|&(r, _)| r).collect();
        assert_eq!(regs, vec![0x22, 0x18]);
    }

    #[test]
    fn hdma_direct_table_with_repeat_and_termination() {
        let mut dma = DmaController::new();
        let mut bus = FakeBus::new();
        // 2 lines with one value, then 2 repeat lines with one value each, then end.
        bus.a[0x3000..0x3007].copy_from_slice(&[0x02, 0xAA, 0x82, 0x11, 0x22, 0x00, 0x00]);
        setup(&mut dma, 0, &[0x00, 0x32, 0x00, 0x30, 0x00]);
        dma.write(0x420C, 0x01);
        dma.hdma_init(&mut bus);
        for _ in 0..6 {
            dma.hdma_line(&mut bus);
        }
        assert_eq!(bus.b_writes, vec![(0x32, 0xAA), (0x32, 0x11), (0x32, 0x22)]);
        assert!(dma.channels[0].terminated);
    }

    #[test]
    fn hdma_indirect_reads_through_pointer() {
        let mut dma = DmaController::new();
        let mut bus = FakeBus::new();
        bus.a[0x3000..0x3004].copy_from_slice(&[0x01, 0x00, 0x40, 0x00]);
        bus.a[0x4000..0x4002].copy_from_slice(&[0x5A, 0xA5]);
        setup(&mut dma, 0, &[0x41, 0x0D, 0x00, 0x30, 0x00, 0x00, 0x00, 0x00]);
        dma.write(0x420C, 0x01);
        dma.hdma_init(&mut bus);
        dma.hdma_line(&mut bus);
        assert_eq!(bus.b_writes, vec![(0x0D, 0x5A), (0x0E, 0xA5)]);
        dma.hdma_line(&mut bus);
        assert_eq!(bus.b_writes.len(), 2);
        assert!(dma.channels[0].terminated);
    }

    #[test]
    fn unused_registers_read_open_bus() {
        let dma = DmaController::new();
        assert_eq!(dma.read(0x430C), None);
        assert_eq!(dma.read(0x4300), Some(0xFF));
        assert_eq!(dma.read(0x420B), None);
    }
}
