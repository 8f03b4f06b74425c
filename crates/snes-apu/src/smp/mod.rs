mod cycles;

#[cfg(test)]
mod tests;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub use cycles::{BRANCH_TAKEN_CYCLES, CYCLE_TABLE};

/// Memory seen by the SPC700. Implemented by the APU address space, which
/// decodes the $F0-$FF I/O page and the IPL ROM overlay.
pub trait SmpBus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Psw: u8 {
        const CARRY = 0x01;
        const ZERO = 0x02;
        const IRQ_ENABLE = 0x04;
        const HALF_CARRY = 0x08;
        const BREAK = 0x10;
        const DIRECT_PAGE = 0x20;
        const OVERFLOW = 0x40;
        const NEGATIVE = 0x80;
    }
}

const RESET_VECTOR: u16 = 0xFFFE;
const BRK_VECTOR: u16 = 0xFFDE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Smp {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub psw: Psw,
    /// Set by SLEEP/STOP. The core only leaves this state on reset.
    pub halted: bool,
    pub cycles: u64,
}

impl Default for Smp {
    fn default() -> Self {
        Self::new()
    }
}

impl Smp {
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0,
            pc: 0,
            psw: Psw::empty(),
            halted: false,
            cycles: 0,
        }
    }

    pub fn reset<B: SmpBus>(&mut self, bus: &mut B) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        // The reset sequence performs three dummy pushes from SP = 0.
        self.sp = 0xFD;
        self.psw = Psw::empty();
        self.halted = false;
        self.pc = read_word(bus, RESET_VECTOR);
    }

    /// Executes one instruction and returns the number of APU cycles it took.
    /// A halted core idles for two cycles per call so the timers and DSP keep
    /// running.
    pub fn step<B: SmpBus>(&mut self, bus: &mut B) -> u32 {
        if self.halted {
            self.cycles += 2;
            return 2;
        }
        let opcode = self.fetch(bus);
        let cycles = CYCLE_TABLE[opcode as usize] as u32 + self.execute(bus, opcode);
        self.cycles += cycles as u64;
        cycles
    }

    pub fn ya(&self) -> u16 {
        ((self.y as u16) << 8) | self.a as u16
    }

    fn set_ya(&mut self, value: u16) {
        self.a = value as u8;
        self.y = (value >> 8) as u8;
    }

    fn flag(&self, flag: Psw) -> bool {
        self.psw.contains(flag)
    }

    fn set_nz(&mut self, value: u8) {
        self.psw.set(Psw::ZERO, value == 0);
        self.psw.set(Psw::NEGATIVE, value & 0x80 != 0);
    }

    fn set_nz16(&mut self, value: u16) {
        self.psw.set(Psw::ZERO, value == 0);
        self.psw.set(Psw::NEGATIVE, value & 0x8000 != 0);
    }

    fn fetch<B: SmpBus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn fetch_word<B: SmpBus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch(bus) as u16;
        let hi = self.fetch(bus) as u16;
        (hi << 8) | lo
    }

    fn dp(&self, offset: u8) -> u16 {
        if self.flag(Psw::DIRECT_PAGE) {
            0x0100 | offset as u16
        } else {
            offset as u16
        }
    }

    fn read_dp_word<B: SmpBus>(&self, bus: &mut B, offset: u8) -> u16 {
        let lo = bus.read(self.dp(offset)) as u16;
        let hi = bus.read(self.dp(offset.wrapping_add(1))) as u16;
        (hi << 8) | lo
    }

    fn write_dp_word<B: SmpBus>(&self, bus: &mut B, offset: u8, value: u16) {
        bus.write(self.dp(offset), value as u8);
        bus.write(self.dp(offset.wrapping_add(1)), (value >> 8) as u8);
    }

    fn push<B: SmpBus>(&mut self, bus: &mut B, value: u8) {
        bus.write(0x0100 | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop<B: SmpBus>(&mut self, bus: &mut B) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x0100 | self.sp as u16)
    }

    fn push_pc<B: SmpBus>(&mut self, bus: &mut B) {
        self.push(bus, (self.pc >> 8) as u8);
        self.push(bus, self.pc as u8);
    }

    fn pop_pc<B: SmpBus>(&mut self, bus: &mut B) {
        let lo = self.pop(bus) as u16;
        let hi = self.pop(bus) as u16;
        self.pc = (hi << 8) | lo;
    }

    // Effective addresses.

    fn addr_dp<B: SmpBus>(&mut self, bus: &mut B) -> u16 {
        let d = self.fetch(bus);
        self.dp(d)
    }

    fn addr_dp_x<B: SmpBus>(&mut self, bus: &mut B) -> u16 {
        let d = self.fetch(bus);
        self.dp(d.wrapping_add(self.x))
    }

    fn addr_dp_y<B: SmpBus>(&mut self, bus: &mut B) -> u16 {
        let d = self.fetch(bus);
        self.dp(d.wrapping_add(self.y))
    }

    fn addr_abs<B: SmpBus>(&mut self, bus: &mut B) -> u16 {
        self.fetch_word(bus)
    }

    fn addr_abs_x<B: SmpBus>(&mut self, bus: &mut B) -> u16 {
        self.fetch_word(bus).wrapping_add(self.x as u16)
    }

    fn addr_abs_y<B: SmpBus>(&mut self, bus: &mut B) -> u16 {
        self.fetch_word(bus).wrapping_add(self.y as u16)
    }

    /// `[dp+X]`
    fn addr_indexed_indirect<B: SmpBus>(&mut self, bus: &mut B) -> u16 {
        let d = self.fetch(bus).wrapping_add(self.x);
        self.read_dp_word(bus, d)
    }

    /// `[dp]+Y`
    fn addr_indirect_indexed<B: SmpBus>(&mut self, bus: &mut B) -> u16 {
        let d = self.fetch(bus);
        self.read_dp_word(bus, d).wrapping_add(self.y as u16)
    }

    /// `m.b` operands: 13-bit address plus a 3-bit bit number.
    fn addr_membit<B: SmpBus>(&mut self, bus: &mut B) -> (u16, u8) {
        let word = self.fetch_word(bus);
        (word & 0x1FFF, (word >> 13) as u8)
    }

    // ALU helpers.

    fn or(&mut self, a: u8, b: u8) -> u8 {
        let r = a | b;
        self.set_nz(r);
        r
    }

    fn and(&mut self, a: u8, b: u8) -> u8 {
        let r = a & b;
        self.set_nz(r);
        r
    }

    fn eor(&mut self, a: u8, b: u8) -> u8 {
        let r = a ^ b;
        self.set_nz(r);
        r
    }

    fn cmp(&mut self, a: u8, b: u8) -> u8 {
        let r = a.wrapping_sub(b);
        self.psw.set(Psw::CARRY, a >= b);
        self.set_nz(r);
        a
    }

    fn adc(&mut self, a: u8, b: u8) -> u8 {
        let carry = self.flag(Psw::CARRY) as u16;
        let r = a as u16 + b as u16 + carry;
        let r8 = r as u8;
        self.psw.set(Psw::CARRY, r > 0xFF);
        self.psw
            .set(Psw::OVERFLOW, (!(a ^ b) & (a ^ r8) & 0x80) != 0);
        self.psw.set(Psw::HALF_CARRY, ((a ^ b ^ r8) & 0x10) != 0);
        self.set_nz(r8);
        r8
    }

    fn sbc(&mut self, a: u8, b: u8) -> u8 {
        self.adc(a, !b)
    }

    /// Applies one of the six two-operand ALU operations selected by the top
    /// three bits of the opcode.
    fn alu(&mut self, opcode: u8, a: u8, b: u8) -> u8 {
        match opcode >> 5 {
            0 => self.or(a, b),
            1 => self.and(a, b),
            2 => self.eor(a, b),
            3 => self.cmp(a, b),
            4 => self.adc(a, b),
            _ => self.sbc(a, b),
        }
    }

    fn asl(&mut self, v: u8) -> u8 {
        self.psw.set(Psw::CARRY, v & 0x80 != 0);
        let r = v << 1;
        self.set_nz(r);
        r
    }

    fn rol(&mut self, v: u8) -> u8 {
        let carry = self.flag(Psw::CARRY) as u8;
        self.psw.set(Psw::CARRY, v & 0x80 != 0);
        let r = (v << 1) | carry;
        self.set_nz(r);
        r
    }

    fn lsr(&mut self, v: u8) -> u8 {
        self.psw.set(Psw::CARRY, v & 0x01 != 0);
        let r = v >> 1;
        self.set_nz(r);
        r
    }

    fn ror(&mut self, v: u8) -> u8 {
        let carry = self.flag(Psw::CARRY) as u8;
        self.psw.set(Psw::CARRY, v & 0x01 != 0);
        let r = (v >> 1) | (carry << 7);
        self.set_nz(r);
        r
    }

    /// Shift/rotate family selected by bits 5-6 of the opcode.
    fn shift(&mut self, opcode: u8, v: u8) -> u8 {
        match (opcode >> 5) & 0x03 {
            0 => self.asl(v),
            1 => self.rol(v),
            2 => self.lsr(v),
            _ => self.ror(v),
        }
    }

    fn inc(&mut self, v: u8) -> u8 {
        let r = v.wrapping_add(1);
        self.set_nz(r);
        r
    }

    fn dec(&mut self, v: u8) -> u8 {
        let r = v.wrapping_sub(1);
        self.set_nz(r);
        r
    }

    fn branch<B: SmpBus>(&mut self, bus: &mut B, taken: bool) -> u32 {
        let offset = self.fetch(bus) as i8;
        if taken {
            self.pc = self.pc.wrapping_add(offset as i16 as u16);
            BRANCH_TAKEN_CYCLES
        } else {
            0
        }
    }

    /// Executes `opcode` and returns cycles beyond the table's base cost.
    fn execute<B: SmpBus>(&mut self, bus: &mut B, opcode: u8) -> u32 {
        match opcode {
            0x00 => {}

            // TCALL n
            op if op & 0x0F == 0x01 => {
                let vector = 0xFFDE - 2 * (op >> 4) as u16;
                self.push_pc(bus);
                self.pc = read_word(bus, vector);
            }

            // SET1 / CLR1 dp.bit
            op if op & 0x0F == 0x02 => {
                let bit = 1u8 << (op >> 5);
                let addr = self.addr_dp(bus);
                let v = bus.read(addr);
                let v = if op & 0x10 == 0 { v | bit } else { v & !bit };
                bus.write(addr, v);
            }

            // BBS / BBC dp.bit, rel
            op if op & 0x0F == 0x03 => {
                let bit = 1u8 << (op >> 5);
                let addr = self.addr_dp(bus);
                let v = bus.read(addr);
                let set = v & bit != 0;
                return self.branch(bus, if op & 0x10 == 0 { set } else { !set });
            }

            // Two-operand ALU group: OR AND EOR CMP ADC SBC.
            op if (op & 0x0F) >= 0x04 && (op & 0x0F) <= 0x09 && op < 0xC0 => {
                self.execute_alu(bus, op);
            }

            // OR1 / AND1 / EOR1 / MOV1 on memory bits.
            0x0A | 0x2A | 0x4A | 0x6A | 0x8A | 0xAA => {
                let (addr, bit) = self.addr_membit(bus);
                let set = (bus.read(addr) >> bit) & 1 != 0;
                let c = self.flag(Psw::CARRY);
                let c = match opcode {
                    0x0A => c | set,
                    0x2A => c | !set,
                    0x4A => c & set,
                    0x6A => c & !set,
                    0x8A => c ^ set,
                    _ => set,
                };
                self.psw.set(Psw::CARRY, c);
            }
            0xCA => {
                let (addr, bit) = self.addr_membit(bus);
                let v = bus.read(addr);
                let v = if self.flag(Psw::CARRY) {
                    v | (1 << bit)
                } else {
                    v & !(1 << bit)
                };
                bus.write(addr, v);
            }
            0xEA => {
                let (addr, bit) = self.addr_membit(bus);
                let v = bus.read(addr) ^ (1 << bit);
                bus.write(addr, v);
            }

            // ASL/ROL/LSR/ROR dp, !abs, dp+X, A
            0x0B | 0x2B | 0x4B | 0x6B => {
                let addr = self.addr_dp(bus);
                let v = bus.read(addr);
                let r = self.shift(opcode, v);
                bus.write(addr, r);
            }
            0x0C | 0x2C | 0x4C | 0x6C => {
                let addr = self.addr_abs(bus);
                let v = bus.read(addr);
                let r = self.shift(opcode, v);
                bus.write(addr, r);
            }
            0x1B | 0x3B | 0x5B | 0x7B => {
                let addr = self.addr_dp_x(bus);
                let v = bus.read(addr);
                let r = self.shift(opcode, v);
                bus.write(addr, r);
            }
            0x1C | 0x3C | 0x5C | 0x7C => {
                self.a = self.shift(opcode, self.a);
            }

            // PUSH / POP
            0x0D => {
                let v = self.psw.bits();
                self.push(bus, v);
            }
            0x2D => self.push(bus, self.a),
            0x4D => self.push(bus, self.x),
            0x6D => self.push(bus, self.y),
            0x8E => {
                let v = self.pop(bus);
                self.psw = Psw::from_bits_retain(v);
            }
            0xAE => self.a = self.pop(bus),
            0xCE => self.x = self.pop(bus),
            0xEE => self.y = self.pop(bus),

            // TSET1 / TCLR1 !abs
            0x0E | 0x4E => {
                let addr = self.addr_abs(bus);
                let v = bus.read(addr);
                let diff = self.a.wrapping_sub(v);
                self.set_nz(diff);
                let r = if opcode == 0x0E { v | self.a } else { v & !self.a };
                bus.write(addr, r);
            }

            0x0F => {
                self.push_pc(bus);
                let p = self.psw.bits();
                self.push(bus, p);
                self.psw.insert(Psw::BREAK);
                self.psw.remove(Psw::IRQ_ENABLE);
                self.pc = read_word(bus, BRK_VECTOR);
            }

            // Conditional branches.
            0x10 => return self.branch(bus, !self.flag(Psw::NEGATIVE)),
            0x30 => return self.branch(bus, self.flag(Psw::NEGATIVE)),
            0x50 => return self.branch(bus, !self.flag(Psw::OVERFLOW)),
            0x70 => return self.branch(bus, self.flag(Psw::OVERFLOW)),
            0x90 => return self.branch(bus, !self.flag(Psw::CARRY)),
            0xB0 => return self.branch(bus, self.flag(Psw::CARRY)),
            0xD0 => return self.branch(bus, !self.flag(Psw::ZERO)),
            0xF0 => return self.branch(bus, self.flag(Psw::ZERO)),
            0x2F => {
                // BRA: the table cost already includes the taken branch.
                self.branch(bus, true);
            }

            // DECW / INCW dp
            0x1A | 0x3A => {
                let d = self.fetch(bus);
                let w = self.read_dp_word(bus, d);
                let r = if opcode == 0x1A {
                    w.wrapping_sub(1)
                } else {
                    w.wrapping_add(1)
                };
                self.write_dp_word(bus, d, r);
                self.set_nz16(r);
            }

            // INC/DEC on registers.
            0x1D => self.x = self.dec(self.x),
            0x3D => self.x = self.inc(self.x),
            0x9C => self.a = self.dec(self.a),
            0xBC => self.a = self.inc(self.a),
            0xDC => self.y = self.dec(self.y),
            0xFC => self.y = self.inc(self.y),

            // INC/DEC on memory.
            0x8B | 0xAB => {
                let addr = self.addr_dp(bus);
                let v = bus.read(addr);
                let r = if opcode == 0x8B { self.dec(v) } else { self.inc(v) };
                bus.write(addr, r);
            }
            0x9B | 0xBB => {
                let addr = self.addr_dp_x(bus);
                let v = bus.read(addr);
                let r = if opcode == 0x9B { self.dec(v) } else { self.inc(v) };
                bus.write(addr, r);
            }
            0x8C | 0xAC => {
                let addr = self.addr_abs(bus);
                let v = bus.read(addr);
                let r = if opcode == 0x8C { self.dec(v) } else { self.inc(v) };
                bus.write(addr, r);
            }

            // CMP X / CMP Y
            0x1E => {
                let addr = self.addr_abs(bus);
                let v = bus.read(addr);
                self.cmp(self.x, v);
            }
            0x3E => {
                let addr = self.addr_dp(bus);
                let v = bus.read(addr);
                self.cmp(self.x, v);
            }
            0xC8 => {
                let v = self.fetch(bus);
                self.cmp(self.x, v);
            }
            0x5E => {
                let addr = self.addr_abs(bus);
                let v = bus.read(addr);
                self.cmp(self.y, v);
            }
            0x7E => {
                let addr = self.addr_dp(bus);
                let v = bus.read(addr);
                self.cmp(self.y, v);
            }
            0xAD => {
                let v = self.fetch(bus);
                self.cmp(self.y, v);
            }

            // Jumps and calls.
            0x1F => {
                let ptr = self.addr_abs_x(bus);
                self.pc = read_word(bus, ptr);
            }
            0x5F => self.pc = self.fetch_word(bus),
            0x3F => {
                let target = self.fetch_word(bus);
                self.push_pc(bus);
                self.pc = target;
            }
            0x4F => {
                let offset = self.fetch(bus);
                self.push_pc(bus);
                self.pc = 0xFF00 | offset as u16;
            }
            0x6F => self.pop_pc(bus),
            0x7F => {
                let p = self.pop(bus);
                self.psw = Psw::from_bits_retain(p);
                self.pop_pc(bus);
            }

            // Flag operations.
            0x20 => self.psw.remove(Psw::DIRECT_PAGE),
            0x40 => self.psw.insert(Psw::DIRECT_PAGE),
            0x60 => self.psw.remove(Psw::CARRY),
            0x80 => self.psw.insert(Psw::CARRY),
            0xA0 => self.psw.insert(Psw::IRQ_ENABLE),
            0xC0 => self.psw.remove(Psw::IRQ_ENABLE),
            0xE0 => self.psw.remove(Psw::OVERFLOW | Psw::HALF_CARRY),
            0xED => self.psw.toggle(Psw::CARRY),

            // CBNE / DBNZ
            0x2E => {
                let addr = self.addr_dp(bus);
                let v = bus.read(addr);
                return self.branch(bus, self.a != v);
            }
            0xDE => {
                let addr = self.addr_dp_x(bus);
                let v = bus.read(addr);
                return self.branch(bus, self.a != v);
            }
            0x6E => {
                let addr = self.addr_dp(bus);
                let v = bus.read(addr).wrapping_sub(1);
                bus.write(addr, v);
                return self.branch(bus, v != 0);
            }
            0xFE => {
                self.y = self.y.wrapping_sub(1);
                return self.branch(bus, self.y != 0);
            }

            // 16-bit YA arithmetic.
            0x5A => {
                let d = self.fetch(bus);
                let w = self.read_dp_word(bus, d);
                let ya = self.ya();
                self.psw.set(Psw::CARRY, ya >= w);
                self.set_nz16(ya.wrapping_sub(w));
            }
            0x7A => {
                let d = self.fetch(bus);
                let w = self.read_dp_word(bus, d) as u32;
                let ya = self.ya() as u32;
                let r = ya + w;
                self.psw.set(Psw::CARRY, r > 0xFFFF);
                self.psw
                    .set(Psw::OVERFLOW, (!(ya ^ w) & (ya ^ r) & 0x8000) != 0);
                self.psw.set(Psw::HALF_CARRY, ((ya ^ w ^ r) & 0x1000) != 0);
                self.set_ya(r as u16);
                self.set_nz16(r as u16);
            }
            0x9A => {
                let d = self.fetch(bus);
                let w = self.read_dp_word(bus, d) as u32;
                let ya = self.ya() as u32;
                let r = ya.wrapping_sub(w) & 0xFFFF;
                self.psw.set(Psw::CARRY, ya >= w);
                self.psw
                    .set(Psw::OVERFLOW, ((ya ^ w) & (ya ^ r) & 0x8000) != 0);
                self.psw.set(Psw::HALF_CARRY, ((ya ^ w ^ r) & 0x1000) == 0);
                self.set_ya(r as u16);
                self.set_nz16(r as u16);
            }
            0xBA => {
                let d = self.fetch(bus);
                let w = self.read_dp_word(bus, d);
                self.set_ya(w);
                self.set_nz16(w);
            }
            0xDA => {
                let d = self.fetch(bus);
                let ya = self.ya();
                self.write_dp_word(bus, d, ya);
            }

            // Register transfers.
            0x5D => {
                self.x = self.a;
                self.set_nz(self.x);
            }
            0x7D => {
                self.a = self.x;
                self.set_nz(self.a);
            }
            0x9D => {
                self.x = self.sp;
                self.set_nz(self.x);
            }
            0xBD => self.sp = self.x,
            0xDD => {
                self.a = self.y;
                self.set_nz(self.a);
            }
            0xFD => {
                self.y = self.a;
                self.set_nz(self.y);
            }

            // MOV immediate / memory.
            0x8D => {
                self.y = self.fetch(bus);
                self.set_nz(self.y);
            }
            0x8F => {
                let imm = self.fetch(bus);
                let addr = self.addr_dp(bus);
                bus.write(addr, imm);
            }
            0xFA => {
                let src = self.addr_dp(bus);
                let v = bus.read(src);
                let dst = self.addr_dp(bus);
                bus.write(dst, v);
            }
            0xAF => {
                bus.write(self.dp(self.x), self.a);
                self.x = self.x.wrapping_add(1);
            }
            0xBF => {
                self.a = bus.read(self.dp(self.x));
                self.x = self.x.wrapping_add(1);
                self.set_nz(self.a);
            }

            // MOV stores (no flags).
            0xC4 => {
                let addr = self.addr_dp(bus);
                bus.write(addr, self.a);
            }
            0xC5 => {
                let addr = self.addr_abs(bus);
                bus.write(addr, self.a);
            }
            0xC6 => bus.write(self.dp(self.x), self.a),
            0xC7 => {
                let addr = self.addr_indexed_indirect(bus);
                bus.write(addr, self.a);
            }
            0xC9 => {
                let addr = self.addr_abs(bus);
                bus.write(addr, self.x);
            }
            0xCB => {
                let addr = self.addr_dp(bus);
                bus.write(addr, self.y);
            }
            0xCC => {
                let addr = self.addr_abs(bus);
                bus.write(addr, self.y);
            }
            0xD4 => {
                let addr = self.addr_dp_x(bus);
                bus.write(addr, self.a);
            }
            0xD5 => {
                let addr = self.addr_abs_x(bus);
                bus.write(addr, self.a);
            }
            0xD6 => {
                let addr = self.addr_abs_y(bus);
                bus.write(addr, self.a);
            }
            0xD7 => {
                let addr = self.addr_indirect_indexed(bus);
                bus.write(addr, self.a);
            }
            0xD8 => {
                let addr = self.addr_dp(bus);
                bus.write(addr, self.x);
            }
            0xD9 => {
                let addr = self.addr_dp_y(bus);
                bus.write(addr, self.x);
            }
            0xDB => {
                let addr = self.addr_dp_x(bus);
                bus.write(addr, self.y);
            }

            // MOV loads.
            0xE4 => {
                let addr = self.addr_dp(bus);
                self.a = bus.read(addr);
                self.set_nz(self.a);
            }
            0xE5 => {
                let addr = self.addr_abs(bus);
                self.a = bus.read(addr);
                self.set_nz(self.a);
            }
            0xE6 => {
                self.a = bus.read(self.dp(self.x));
                self.set_nz(self.a);
            }
            0xE7 => {
                let addr = self.addr_indexed_indirect(bus);
                self.a = bus.read(addr);
                self.set_nz(self.a);
            }
            0xE8 => {
                self.a = self.fetch(bus);
                self.set_nz(self.a);
            }
            0xE9 => {
                let addr = self.addr_abs(bus);
                self.x = bus.read(addr);
                self.set_nz(self.x);
            }
            0xEB => {
                let addr = self.addr_dp(bus);
                self.y = bus.read(addr);
                self.set_nz(self.y);
            }
            0xEC => {
                let addr = self.addr_abs(bus);
                self.y = bus.read(addr);
                self.set_nz(self.y);
            }
            0xF4 => {
                let addr = self.addr_dp_x(bus);
                self.a = bus.read(addr);
                self.set_nz(self.a);
            }
            0xF5 => {
                let addr = self.addr_abs_x(bus);
                self.a = bus.read(addr);
                self.set_nz(self.a);
            }
            0xF6 => {
                let addr = self.addr_abs_y(bus);
                self.a = bus.read(addr);
                self.set_nz(self.a);
            }
            0xF7 => {
                let addr = self.addr_indirect_indexed(bus);
                self.a = bus.read(addr);
                self.set_nz(self.a);
            }
            0xF8 => {
                let addr = self.addr_dp(bus);
                self.x = bus.read(addr);
                self.set_nz(self.x);
            }
            0xF9 => {
                let addr = self.addr_dp_y(bus);
                self.x = bus.read(addr);
                self.set_nz(self.x);
            }
            0xFB => {
                let addr = self.addr_dp_x(bus);
                self.y = bus.read(addr);
                self.set_nz(self.y);
            }
            0xCD => {
                self.x = self.fetch(bus);
                self.set_nz(self.x);
            }

            // Multiply, divide, decimal adjust, nibble swap.
            0xCF => {
                let r = self.y as u16 * self.a as u16;
                self.set_ya(r);
                self.set_nz(self.y);
            }
            0x9E => self.divide(),
            0xDF => {
                if self.flag(Psw::CARRY) || self.a > 0x99 {
                    self.a = self.a.wrapping_add(0x60);
                    self.psw.insert(Psw::CARRY);
                }
                if self.flag(Psw::HALF_CARRY) || (self.a & 0x0F) > 0x09 {
                    self.a = self.a.wrapping_add(0x06);
                }
                self.set_nz(self.a);
            }
            0xBE => {
                if !self.flag(Psw::CARRY) || self.a > 0x99 {
                    self.a = self.a.wrapping_sub(0x60);
                    self.psw.remove(Psw::CARRY);
                }
                if !self.flag(Psw::HALF_CARRY) || (self.a & 0x0F) > 0x09 {
                    self.a = self.a.wrapping_sub(0x06);
                }
                self.set_nz(self.a);
            }
            0x9F => {
                self.a = self.a.rotate_left(4);
                self.set_nz(self.a);
            }

            0xEF | 0xFF => {
                log::debug!("SMP halted by opcode {:02X} at {:04X}", opcode, self.pc.wrapping_sub(1));
                self.halted = true;
            }

            // Every opcode is covered above; kept for exhaustiveness.
            _ => {}
        }
        0
    }

    /// Columns 4-9 of rows $00-$B0: OR, AND, EOR, CMP, ADC, SBC.
    fn execute_alu<B: SmpBus>(&mut self, bus: &mut B, opcode: u8) {
        let low_row = opcode & 0x10 == 0;
        match (low_row, opcode & 0x0F) {
            (true, 0x04) => {
                let addr = self.addr_dp(bus);
                let v = bus.read(addr);
                self.a = self.alu(opcode, self.a, v);
            }
            (true, 0x05) => {
                let addr = self.addr_abs(bus);
                let v = bus.read(addr);
                self.a = self.alu(opcode, self.a, v);
            }
            (true, 0x06) => {
                let v = bus.read(self.dp(self.x));
                self.a = self.alu(opcode, self.a, v);
            }
            (true, 0x07) => {
                let addr = self.addr_indexed_indirect(bus);
                let v = bus.read(addr);
                self.a = self.alu(opcode, self.a, v);
            }
            (true, 0x08) => {
                let v = self.fetch(bus);
                self.a = self.alu(opcode, self.a, v);
            }
            (true, _) => {
                // dp(d), dp(s): source operand comes first.
                let src = self.addr_dp(bus);
                let s = bus.read(src);
                let dst = self.addr_dp(bus);
                let d = bus.read(dst);
                let r = self.alu(opcode, d, s);
                if opcode >> 5 != 3 {
                    bus.write(dst, r);
                }
            }
            (false, 0x04) => {
                let addr = self.addr_dp_x(bus);
                let v = bus.read(addr);
                self.a = self.alu(opcode, self.a, v);
            }
            (false, 0x05) => {
                let addr = self.addr_abs_x(bus);
                let v = bus.read(addr);
                self.a = self.alu(opcode, self.a, v);
            }
            (false, 0x06) => {
                let addr = self.addr_abs_y(bus);
                let v = bus.read(addr);
                self.a = self.alu(opcode, self.a, v);
            }
            (false, 0x07) => {
                let addr = self.addr_indirect_indexed(bus);
                let v = bus.read(addr);
                self.a = self.alu(opcode, self.a, v);
            }
            (false, 0x08) => {
                // dp, #imm: immediate comes first.
                let imm = self.fetch(bus);
                let addr = self.addr_dp(bus);
                let d = bus.read(addr);
                let r = self.alu(opcode, d, imm);
                if opcode >> 5 != 3 {
                    bus.write(addr, r);
                }
            }
            (false, _) => {
                // (X), (Y)
                let s = bus.read(self.dp(self.y));
                let dst = self.dp(self.x);
                let d = bus.read(dst);
                let r = self.alu(opcode, d, s);
                if opcode >> 5 != 3 {
                    bus.write(dst, r);
                }
            }
        }
    }

    fn divide(&mut self) {
        let ya = self.ya() as u32;
        let x = self.x as u32;
        let y = self.y as u32;
        self.psw.set(Psw::HALF_CARRY, (y & 0x0F) >= (x & 0x0F));
        self.psw.set(Psw::OVERFLOW, y >= x);
        if y < (x << 1) {
            self.a = (ya / x) as u8;
            self.y = (ya % x) as u8;
        } else {
            // Quotient does not fit in nine bits; the hardware divider
            // produces this pattern instead.
            self.a = (255 - (ya - (x << 9)) / (256 - x)) as u8;
            self.y = (x + (ya - (x << 9)) % (256 - x)) as u8;
        }
        self.set_nz(self.a);
    }
}

fn read_word<B: SmpBus>(bus: &mut B, addr: u16) -> u16 {
    let lo = bus.read(addr) as u16;
    let hi = bus.read(addr.wrapping_add(1)) as u16;
    (hi << 8) | lo
}
