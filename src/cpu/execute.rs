use super::opcodes::{AddrMode, Mnemonic, OPCODES};
use super::{
    CpuState, StatusFlags, VECTOR_EMU_COP, VECTOR_EMU_IRQ, VECTOR_NATIVE_BRK, VECTOR_NATIVE_COP,
};
use crate::cpu_bus::CpuBus;

/// Where an instruction's data lives once the addressing mode is resolved.
#[derive(Debug, Clone, Copy)]
enum Operand {
    None,
    Accumulator,
    Immediate(u16),
    /// `bank0` marks direct page and stack relative operands, whose second
    /// byte wraps inside bank 0 instead of carrying into the next bank.
    Memory { addr: u32, bank0: bool },
}

impl Operand {
    /// The resolved 24-bit address, for instructions that use it as a value
    /// (jumps, PEA, PEI).
    fn address(self) -> u32 {
        match self {
            Operand::Memory { addr, .. } => addr,
            Operand::Immediate(v) => v as u32,
            _ => 0,
        }
    }
}

struct Resolved {
    operand: Operand,
    /// Direct page low byte penalty.
    penalty: u32,
    /// Indexed read crossed a page, or the index registers are 16-bit.
    crossed: bool,
}

#[inline]
fn mask(wide: bool) -> u16 {
    if wide {
        0xFFFF
    } else {
        0x00FF
    }
}

#[inline]
fn sign_bit(wide: bool) -> u16 {
    if wide {
        0x8000
    } else {
        0x0080
    }
}

fn fetch8<B: CpuBus>(s: &mut CpuState, bus: &mut B) -> u8 {
    let value = bus.read_u8(s.full_pc());
    s.pc = s.pc.wrapping_add(1);
    value
}

fn fetch16<B: CpuBus>(s: &mut CpuState, bus: &mut B) -> u16 {
    let lo = fetch8(s, bus) as u16;
    let hi = fetch8(s, bus) as u16;
    (hi << 8) | lo
}

fn fetch24<B: CpuBus>(s: &mut CpuState, bus: &mut B) -> u32 {
    let lo = fetch16(s, bus) as u32;
    let bank = fetch8(s, bus) as u32;
    (bank << 16) | lo
}

/// Direct page address. In emulation mode with a page-aligned direct page
/// the offset wraps inside that page.
fn direct_addr(s: &CpuState, offset: u16) -> u32 {
    if s.emulation_mode && s.dp & 0x00FF == 0 {
        (s.dp | (offset & 0x00FF)) as u32
    } else {
        s.dp.wrapping_add(offset) as u32
    }
}

fn read_direct_word<B: CpuBus>(s: &CpuState, bus: &mut B, offset: u16) -> u16 {
    let lo = bus.read_u8(direct_addr(s, offset)) as u16;
    let hi = bus.read_u8(direct_addr(s, offset.wrapping_add(1))) as u16;
    (hi << 8) | lo
}

fn read_direct_long<B: CpuBus>(s: &CpuState, bus: &mut B, offset: u16) -> u32 {
    let lo = read_direct_word(s, bus, offset) as u32;
    let bank = bus.read_u8(direct_addr(s, offset.wrapping_add(2))) as u32;
    (bank << 16) | lo
}

fn read_bank0_word<B: CpuBus>(bus: &mut B, addr: u16) -> u16 {
    let lo = bus.read_u8(addr as u32) as u16;
    let hi = bus.read_u8(addr.wrapping_add(1) as u32) as u16;
    (hi << 8) | lo
}

#[inline]
fn next_addr(addr: u32, bank0: bool) -> u32 {
    if bank0 {
        (addr + 1) & 0xFFFF
    } else {
        (addr + 1) & 0xFF_FFFF
    }
}

fn read_data<B: CpuBus>(bus: &mut B, addr: u32, bank0: bool, wide: bool) -> u16 {
    let lo = bus.read_u8(addr) as u16;
    if !wide {
        return lo;
    }
    let hi = bus.read_u8(next_addr(addr, bank0)) as u16;
    (hi << 8) | lo
}

fn write_data<B: CpuBus>(bus: &mut B, addr: u32, bank0: bool, wide: bool, value: u16) {
    bus.write_u8(addr, value as u8);
    if wide {
        bus.write_u8(next_addr(addr, bank0), (value >> 8) as u8);
    }
}

#[inline]
fn data_bank(s: &CpuState, offset: u16) -> u32 {
    ((s.db as u32) << 16) | offset as u32
}

#[inline]
fn indexed(base: u32, index: u16) -> u32 {
    (base + index as u32) & 0xFF_FFFF
}

#[inline]
fn page_crossed(base: u16, index: u16) -> bool {
    (base & 0xFF00) != (base.wrapping_add(index) & 0xFF00)
}

fn resolve<B: CpuBus>(s: &mut CpuState, bus: &mut B, mode: AddrMode) -> Resolved {
    use AddrMode::*;

    let penalty = (mode.uses_direct_page() && s.dp & 0x00FF != 0) as u32;
    let x8 = s.index_is_8bit();
    let mut crossed = false;

    let operand = match mode {
        Implied | Relative | RelativeLong | BlockMove | AbsoluteIndirect
        | AbsoluteIndexedIndirect | AbsoluteIndirectLong => Operand::None,
        Accumulator => Operand::Accumulator,
        ImmediateM => {
            if s.memory_is_8bit() {
                Operand::Immediate(fetch8(s, bus) as u16)
            } else {
                Operand::Immediate(fetch16(s, bus))
            }
        }
        ImmediateX => {
            if x8 {
                Operand::Immediate(fetch8(s, bus) as u16)
            } else {
                Operand::Immediate(fetch16(s, bus))
            }
        }
        Immediate8 => Operand::Immediate(fetch8(s, bus) as u16),
        Direct => {
            let offset = fetch8(s, bus) as u16;
            Operand::Memory { addr: direct_addr(s, offset), bank0: true }
        }
        DirectX => {
            let offset = fetch8(s, bus) as u16;
            Operand::Memory { addr: direct_addr(s, offset.wrapping_add(s.x)), bank0: true }
        }
        DirectY => {
            let offset = fetch8(s, bus) as u16;
            Operand::Memory { addr: direct_addr(s, offset.wrapping_add(s.y)), bank0: true }
        }
        DirectIndirect => {
            let offset = fetch8(s, bus) as u16;
            let ptr = read_direct_word(s, bus, offset);
            Operand::Memory { addr: data_bank(s, ptr), bank0: false }
        }
        DirectIndexedIndirect => {
            let offset = fetch8(s, bus) as u16;
            let ptr = read_direct_word(s, bus, offset.wrapping_add(s.x));
            Operand::Memory { addr: data_bank(s, ptr), bank0: false }
        }
        DirectIndirectIndexed => {
            let offset = fetch8(s, bus) as u16;
            let ptr = read_direct_word(s, bus, offset);
            crossed = !x8 || page_crossed(ptr, s.y);
            Operand::Memory { addr: indexed(data_bank(s, ptr), s.y), bank0: false }
        }
        DirectIndirectLong => {
            let offset = fetch8(s, bus) as u16;
            Operand::Memory { addr: read_direct_long(s, bus, offset), bank0: false }
        }
        DirectIndirectLongIndexed => {
            let offset = fetch8(s, bus) as u16;
            let ptr = read_direct_long(s, bus, offset);
            Operand::Memory { addr: indexed(ptr, s.y), bank0: false }
        }
        Absolute => {
            let offset = fetch16(s, bus);
            Operand::Memory { addr: data_bank(s, offset), bank0: false }
        }
        AbsoluteX => {
            let base = fetch16(s, bus);
            crossed = !x8 || page_crossed(base, s.x);
            Operand::Memory { addr: indexed(data_bank(s, base), s.x), bank0: false }
        }
        AbsoluteY => {
            let base = fetch16(s, bus);
            crossed = !x8 || page_crossed(base, s.y);
            Operand::Memory { addr: indexed(data_bank(s, base), s.y), bank0: false }
        }
        AbsoluteLong => Operand::Memory { addr: fetch24(s, bus), bank0: false },
        AbsoluteLongX => {
            let base = fetch24(s, bus);
            Operand::Memory { addr: indexed(base, s.x), bank0: false }
        }
        StackRelative => {
            let offset = fetch8(s, bus) as u16;
            Operand::Memory { addr: s.sp.wrapping_add(offset) as u32, bank0: true }
        }
        StackRelativeIndirectIndexed => {
            let offset = fetch8(s, bus) as u16;
            let ptr = read_bank0_word(bus, s.sp.wrapping_add(offset));
            Operand::Memory { addr: indexed(data_bank(s, ptr), s.y), bank0: false }
        }
    };

    Resolved { operand, penalty, crossed }
}

fn load<B: CpuBus>(s: &CpuState, bus: &mut B, operand: Operand, wide: bool) -> u16 {
    match operand {
        Operand::Immediate(v) => v & mask(wide),
        Operand::Memory { addr, bank0 } => read_data(bus, addr, bank0, wide),
        Operand::Accumulator => s.a & mask(wide),
        Operand::None => 0,
    }
}

fn store<B: CpuBus>(bus: &mut B, operand: Operand, wide: bool, value: u16) {
    if let Operand::Memory { addr, bank0 } = operand {
        write_data(bus, addr, bank0, wide, value);
    }
}

fn set_nz(s: &mut CpuState, value: u16, wide: bool) {
    let value = value & mask(wide);
    s.p.set(StatusFlags::ZERO, value == 0);
    s.p.set(StatusFlags::NEGATIVE, value & sign_bit(wide) != 0);
}

fn set_a(s: &mut CpuState, value: u16) {
    if s.memory_is_8bit() {
        s.a = (s.a & 0xFF00) | (value & 0x00FF);
        set_nz(s, value, false);
    } else {
        s.a = value;
        set_nz(s, value, true);
    }
}

fn set_index(s: &mut CpuState, value: u16) -> u16 {
    let wide = !s.index_is_8bit();
    let value = value & mask(wide);
    set_nz(s, value, wide);
    value
}

fn compare(s: &mut CpuState, register: u16, value: u16, wide: bool) {
    let register = register & mask(wide);
    let value = value & mask(wide);
    s.p.set(StatusFlags::CARRY, register >= value);
    set_nz(s, register.wrapping_sub(value), wide);
}

fn adc(s: &mut CpuState, data: u16) {
    let carry = s.p.contains(StatusFlags::CARRY) as i32;
    let decimal = s.p.contains(StatusFlags::DECIMAL);
    if s.memory_is_8bit() {
        let a = (s.a & 0xFF) as i32;
        let data = (data & 0xFF) as i32;
        let mut result;
        if !decimal {
            result = a + data + carry;
        } else {
            result = (a & 0x0F) + (data & 0x0F) + carry;
            if result > 0x09 {
                result += 0x06;
            }
            let c = (result > 0x0F) as i32;
            result = (a & 0xF0) + (data & 0xF0) + (c << 4) + (result & 0x0F);
        }
        s.p.set(StatusFlags::OVERFLOW, !(a ^ data) & (a ^ result) & 0x80 != 0);
        if decimal && result > 0x9F {
            result += 0x60;
        }
        s.p.set(StatusFlags::CARRY, result > 0xFF);
        set_a(s, result as u16);
    } else {
        let a = s.a as i32;
        let data = data as i32;
        let mut result;
        if !decimal {
            result = a + data + carry;
        } else {
            result = (a & 0x000F) + (data & 0x000F) + carry;
            if result > 0x0009 {
                result += 0x0006;
            }
            let mut c = (result > 0x000F) as i32;
            result = (a & 0x00F0) + (data & 0x00F0) + (c << 4) + (result & 0x000F);
            if result > 0x009F {
                result += 0x0060;
            }
            c = (result > 0x00FF) as i32;
            result = (a & 0x0F00) + (data & 0x0F00) + (c << 8) + (result & 0x00FF);
            if result > 0x09FF {
                result += 0x0600;
            }
            c = (result > 0x0FFF) as i32;
            result = (a & 0xF000) + (data & 0xF000) + (c << 12) + (result & 0x0FFF);
        }
        s.p.set(StatusFlags::OVERFLOW, !(a ^ data) & (a ^ result) & 0x8000 != 0);
        if decimal && result > 0x9FFF {
            result += 0x6000;
        }
        s.p.set(StatusFlags::CARRY, result > 0xFFFF);
        set_a(s, result as u16);
    }
}

fn sbc(s: &mut CpuState, data: u16) {
    let carry = s.p.contains(StatusFlags::CARRY) as i32;
    let decimal = s.p.contains(StatusFlags::DECIMAL);
    if s.memory_is_8bit() {
        let a = (s.a & 0xFF) as i32;
        let data = (!data & 0xFF) as i32;
        let mut result;
        if !decimal {
            result = a + data + carry;
        } else {
            result = (a & 0x0F) + (data & 0x0F) + carry;
            if result <= 0x0F {
                result -= 0x06;
            }
            let c = (result > 0x0F) as i32;
            result = (a & 0xF0) + (data & 0xF0) + (c << 4) + (result & 0x0F);
        }
        s.p.set(StatusFlags::OVERFLOW, !(a ^ data) & (a ^ result) & 0x80 != 0);
        if decimal && result <= 0xFF {
            result -= 0x60;
        }
        s.p.set(StatusFlags::CARRY, result > 0xFF);
        set_a(s, result as u16);
    } else {
        let a = s.a as i32;
        let data = (!data) as i32 & 0xFFFF;
        let mut result;
        if !decimal {
            result = a + data + carry;
        } else {
            result = (a & 0x000F) + (data & 0x000F) + carry;
            if result <= 0x000F {
                result -= 0x0006;
            }
            let mut c = (result > 0x000F) as i32;
            result = (a & 0x00F0) + (data & 0x00F0) + (c << 4) + (result & 0x000F);
            if result <= 0x00FF {
                result -= 0x0060;
            }
            c = (result > 0x00FF) as i32;
            result = (a & 0x0F00) + (data & 0x0F00) + (c << 8) + (result & 0x00FF);
            if result <= 0x0FFF {
                result -= 0x0600;
            }
            c = (result > 0x0FFF) as i32;
            result = (a & 0xF000) + (data & 0xF000) + (c << 12) + (result & 0x0FFF);
        }
        s.p.set(StatusFlags::OVERFLOW, !(a ^ data) & (a ^ result) & 0x8000 != 0);
        if decimal && result <= 0xFFFF {
            result -= 0x6000;
        }
        s.p.set(StatusFlags::CARRY, result > 0xFFFF);
        set_a(s, result as u16);
    }
}

/// Read-modify-write on the accumulator or memory at the accumulator width.
fn modify<B, F>(s: &mut CpuState, bus: &mut B, operand: Operand, f: F)
where
    B: CpuBus,
    F: Fn(&mut CpuState, u16, bool) -> u16,
{
    let wide = !s.memory_is_8bit();
    match operand {
        Operand::Accumulator => {
            let value = s.a & mask(wide);
            let result = f(s, value, wide) & mask(wide);
            s.a = if wide { result } else { (s.a & 0xFF00) | result };
        }
        Operand::Memory { addr, bank0 } => {
            let value = read_data(bus, addr, bank0, wide);
            let result = f(s, value, wide);
            write_data(bus, addr, bank0, wide, result);
        }
        _ => {}
    }
}

fn asl(s: &mut CpuState, v: u16, wide: bool) -> u16 {
    s.p.set(StatusFlags::CARRY, v & sign_bit(wide) != 0);
    let r = (v << 1) & mask(wide);
    set_nz(s, r, wide);
    r
}

fn lsr(s: &mut CpuState, v: u16, wide: bool) -> u16 {
    s.p.set(StatusFlags::CARRY, v & 1 != 0);
    let r = v >> 1;
    set_nz(s, r, wide);
    r
}

fn rol(s: &mut CpuState, v: u16, wide: bool) -> u16 {
    let carry_in = s.p.contains(StatusFlags::CARRY) as u16;
    s.p.set(StatusFlags::CARRY, v & sign_bit(wide) != 0);
    let r = ((v << 1) | carry_in) & mask(wide);
    set_nz(s, r, wide);
    r
}

fn ror(s: &mut CpuState, v: u16, wide: bool) -> u16 {
    let carry_in = if s.p.contains(StatusFlags::CARRY) { sign_bit(wide) } else { 0 };
    s.p.set(StatusFlags::CARRY, v & 1 != 0);
    let r = (v >> 1) | carry_in;
    set_nz(s, r, wide);
    r
}

fn inc(s: &mut CpuState, v: u16, wide: bool) -> u16 {
    let r = v.wrapping_add(1) & mask(wide);
    set_nz(s, r, wide);
    r
}

fn dec(s: &mut CpuState, v: u16, wide: bool) -> u16 {
    let r = v.wrapping_sub(1) & mask(wide);
    set_nz(s, r, wide);
    r
}

fn tsb(s: &mut CpuState, v: u16, wide: bool) -> u16 {
    let a = s.a & mask(wide);
    s.p.set(StatusFlags::ZERO, a & v == 0);
    v | a
}

fn trb(s: &mut CpuState, v: u16, wide: bool) -> u16 {
    let a = s.a & mask(wide);
    s.p.set(StatusFlags::ZERO, a & v == 0);
    v & !a
}

pub(super) fn push8<B: CpuBus>(s: &mut CpuState, bus: &mut B, value: u8) {
    bus.write_u8(s.sp as u32, value);
    s.sp = if s.emulation_mode {
        0x0100 | (s.sp.wrapping_sub(1) & 0x00FF)
    } else {
        s.sp.wrapping_sub(1)
    };
}

pub(super) fn push16<B: CpuBus>(s: &mut CpuState, bus: &mut B, value: u16) {
    push8(s, bus, (value >> 8) as u8);
    push8(s, bus, value as u8);
}

fn pull8<B: CpuBus>(s: &mut CpuState, bus: &mut B) -> u8 {
    s.sp = if s.emulation_mode {
        0x0100 | (s.sp.wrapping_add(1) & 0x00FF)
    } else {
        s.sp.wrapping_add(1)
    };
    bus.read_u8(s.sp as u32)
}

fn pull16<B: CpuBus>(s: &mut CpuState, bus: &mut B) -> u16 {
    let lo = pull8(s, bus) as u16;
    let hi = pull8(s, bus) as u16;
    (hi << 8) | lo
}

/// Re-establishes the register width invariants after P or E changed.
fn apply_mode(s: &mut CpuState) {
    if s.emulation_mode {
        s.p.insert(StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT);
        s.sp = 0x0100 | (s.sp & 0x00FF);
    }
    if s.index_is_8bit() {
        s.x &= 0x00FF;
        s.y &= 0x00FF;
    }
}

fn status_for_push(s: &CpuState, break_flag: bool) -> u8 {
    let bits = s.p.bits();
    if !s.emulation_mode {
        bits
    } else if break_flag {
        bits | 0x30
    } else {
        (bits | 0x20) & !0x10
    }
}

/// Pushes the return state and jumps through `vector`. BRK and COP pass
/// `software = true` so the emulation-mode B flag is set in the pushed P.
pub(super) fn enter_interrupt<B: CpuBus>(s: &mut CpuState, bus: &mut B, vector: u32, software: bool) {
    if !s.emulation_mode {
        push8(s, bus, s.pb);
    }
    push16(s, bus, s.pc);
    let p = status_for_push(s, software);
    push8(s, bus, p);
    s.p.insert(StatusFlags::IRQ_DISABLE);
    s.p.remove(StatusFlags::DECIMAL);
    s.pb = 0;
    s.pc = bus.read_u16(vector);
}

fn branch<B: CpuBus>(s: &mut CpuState, bus: &mut B, condition: bool) -> u32 {
    let offset = fetch8(s, bus) as i8;
    if !condition {
        return 0;
    }
    let from = s.pc;
    s.pc = from.wrapping_add(offset as i16 as u16);
    if s.emulation_mode && (from & 0xFF00) != (s.pc & 0xFF00) {
        2
    } else {
        1
    }
}

/// Executes one instruction whose opcode byte has already been fetched and
/// returns its total cycle cost.
pub(super) fn execute<B: CpuBus>(s: &mut CpuState, bus: &mut B, opcode: u8) -> u32 {
    use Mnemonic::*;

    let info = OPCODES[opcode as usize];
    let m16 = !s.memory_is_8bit();
    let x16 = !s.index_is_8bit();
    let r = resolve(s, bus, info.mode);
    let mut cycles = info.cycles as u32 + r.penalty;

    match info.mnemonic {
        Lda | Ora | And | Eor | Adc | Sbc | Cmp | Bit => {
            cycles += m16 as u32 + r.crossed as u32;
            let value = load(s, bus, r.operand, m16);
            match info.mnemonic {
                Lda => set_a(s, value),
                Ora => set_a(s, s.a | value),
                And => set_a(s, s.a & value),
                Eor => set_a(s, s.a ^ value),
                Adc => adc(s, value),
                Sbc => sbc(s, value),
                Cmp => compare(s, s.a, value, m16),
                _ => {
                    let a = s.a & mask(m16);
                    s.p.set(StatusFlags::ZERO, a & value == 0);
                    if !matches!(r.operand, Operand::Immediate(_)) {
                        s.p.set(StatusFlags::NEGATIVE, value & sign_bit(m16) != 0);
                        s.p.set(StatusFlags::OVERFLOW, value & (sign_bit(m16) >> 1) != 0);
                    }
                }
            }
        }
        Ldx | Ldy | Cpx | Cpy => {
            cycles += x16 as u32 + r.crossed as u32;
            let value = load(s, bus, r.operand, x16);
            match info.mnemonic {
                Ldx => s.x = set_index(s, value),
                Ldy => s.y = set_index(s, value),
                Cpx => compare(s, s.x, value, x16),
                _ => compare(s, s.y, value, x16),
            }
        }
        Sta => {
            cycles += m16 as u32;
            store(bus, r.operand, m16, s.a);
        }
        Stz => {
            cycles += m16 as u32;
            store(bus, r.operand, m16, 0);
        }
        Stx => {
            cycles += x16 as u32;
            store(bus, r.operand, x16, s.x);
        }
        Sty => {
            cycles += x16 as u32;
            store(bus, r.operand, x16, s.y);
        }
        Asl | Lsr | Rol | Ror | Inc | Dec | Tsb | Trb => {
            if matches!(r.operand, Operand::Memory { .. }) && m16 {
                cycles += 2;
            }
            let f = match info.mnemonic {
                Asl => asl,
                Lsr => lsr,
                Rol => rol,
                Ror => ror,
                Inc => inc,
                Dec => dec,
                Tsb => tsb,
                _ => trb,
            };
            modify(s, bus, r.operand, f);
        }

        Inx => s.x = set_index(s, s.x.wrapping_add(1)),
        Iny => s.y = set_index(s, s.y.wrapping_add(1)),
        Dex => s.x = set_index(s, s.x.wrapping_sub(1)),
        Dey => s.y = set_index(s, s.y.wrapping_sub(1)),

        Bpl => cycles += branch(s, bus, !s.p.contains(StatusFlags::NEGATIVE)),
        Bmi => cycles += branch(s, bus, s.p.contains(StatusFlags::NEGATIVE)),
        Bvc => cycles += branch(s, bus, !s.p.contains(StatusFlags::OVERFLOW)),
        Bvs => cycles += branch(s, bus, s.p.contains(StatusFlags::OVERFLOW)),
        Bcc => cycles += branch(s, bus, !s.p.contains(StatusFlags::CARRY)),
        Bcs => cycles += branch(s, bus, s.p.contains(StatusFlags::CARRY)),
        Bne => cycles += branch(s, bus, !s.p.contains(StatusFlags::ZERO)),
        Beq => cycles += branch(s, bus, s.p.contains(StatusFlags::ZERO)),
        Bra => cycles += branch(s, bus, true),
        Brl => {
            let offset = fetch16(s, bus);
            s.pc = s.pc.wrapping_add(offset);
        }

        Jmp => match info.mode {
            AddrMode::AbsoluteIndirect => {
                let ptr = fetch16(s, bus);
                s.pc = read_bank0_word(bus, ptr);
            }
            AddrMode::AbsoluteIndexedIndirect => {
                let ptr = fetch16(s, bus).wrapping_add(s.x);
                s.pc = read_program_bank_word(s, bus, ptr);
            }
            _ => s.pc = r.operand.address() as u16,
        },
        Jml => {
            let target = if info.mode == AddrMode::AbsoluteIndirectLong {
                let ptr = fetch16(s, bus);
                let lo = read_bank0_word(bus, ptr) as u32;
                let bank = bus.read_u8(ptr.wrapping_add(2) as u32) as u32;
                (bank << 16) | lo
            } else {
                r.operand.address()
            };
            s.pb = (target >> 16) as u8;
            s.pc = target as u16;
        }
        Jsr => {
            if info.mode == AddrMode::AbsoluteIndexedIndirect {
                let ptr = fetch16(s, bus).wrapping_add(s.x);
                push16(s, bus, s.pc.wrapping_sub(1));
                s.pc = read_program_bank_word(s, bus, ptr);
            } else {
                let target = r.operand.address() as u16;
                push16(s, bus, s.pc.wrapping_sub(1));
                s.pc = target;
            }
        }
        Jsl => {
            let target = r.operand.address();
            push8(s, bus, s.pb);
            push16(s, bus, s.pc.wrapping_sub(1));
            s.pb = (target >> 16) as u8;
            s.pc = target as u16;
        }
        Rts => s.pc = pull16(s, bus).wrapping_add(1),
        Rtl => {
            s.pc = pull16(s, bus).wrapping_add(1);
            s.pb = pull8(s, bus);
        }
        Rti => {
            s.p = StatusFlags::from_bits_retain(pull8(s, bus));
            apply_mode(s);
            s.pc = pull16(s, bus);
            if !s.emulation_mode {
                s.pb = pull8(s, bus);
                cycles += 1;
            }
        }
        Brk | Cop => {
            let vector = match (info.mnemonic, s.emulation_mode) {
                (Brk, false) => VECTOR_NATIVE_BRK,
                (Brk, true) => VECTOR_EMU_IRQ,
                (_, false) => VECTOR_NATIVE_COP,
                (_, true) => VECTOR_EMU_COP,
            };
            if !s.emulation_mode {
                cycles += 1;
            }
            enter_interrupt(s, bus, vector, true);
        }

        Pha => {
            cycles += m16 as u32;
            if m16 {
                push16(s, bus, s.a);
            } else {
                push8(s, bus, s.a as u8);
            }
        }
        Phx | Phy => {
            cycles += x16 as u32;
            let value = if info.mnemonic == Phx { s.x } else { s.y };
            if x16 {
                push16(s, bus, value);
            } else {
                push8(s, bus, value as u8);
            }
        }
        Php => {
            let p = status_for_push(s, true);
            push8(s, bus, p);
        }
        Phb => push8(s, bus, s.db),
        Phk => push8(s, bus, s.pb),
        Phd => push16(s, bus, s.dp),
        Pla => {
            cycles += m16 as u32;
            let value = if m16 { pull16(s, bus) } else { pull8(s, bus) as u16 };
            set_a(s, value);
        }
        Plx | Ply => {
            cycles += x16 as u32;
            let value = if x16 { pull16(s, bus) } else { pull8(s, bus) as u16 };
            let value = set_index(s, value);
            if info.mnemonic == Plx {
                s.x = value;
            } else {
                s.y = value;
            }
        }
        Plp => {
            s.p = StatusFlags::from_bits_retain(pull8(s, bus));
            apply_mode(s);
        }
        Plb => {
            s.db = pull8(s, bus);
            set_nz(s, s.db as u16, false);
        }
        Pld => {
            s.dp = pull16(s, bus);
            set_nz(s, s.dp, true);
        }
        // PEA and PEI push the operand address itself.
        Pea | Pei => push16(s, bus, r.operand.address() as u16),
        Per => {
            let offset = fetch16(s, bus);
            push16(s, bus, s.pc.wrapping_add(offset));
        }

        Clc => s.p.remove(StatusFlags::CARRY),
        Cld => s.p.remove(StatusFlags::DECIMAL),
        Cli => s.p.remove(StatusFlags::IRQ_DISABLE),
        Clv => s.p.remove(StatusFlags::OVERFLOW),
        Sec => s.p.insert(StatusFlags::CARRY),
        Sed => s.p.insert(StatusFlags::DECIMAL),
        Sei => s.p.insert(StatusFlags::IRQ_DISABLE),
        Rep => {
            let bits = r.operand.address() as u8;
            s.p.remove(StatusFlags::from_bits_retain(bits));
            apply_mode(s);
        }
        Sep => {
            let bits = r.operand.address() as u8;
            s.p.insert(StatusFlags::from_bits_retain(bits));
            apply_mode(s);
        }
        Xce => {
            let carry = s.p.contains(StatusFlags::CARRY);
            s.p.set(StatusFlags::CARRY, s.emulation_mode);
            s.emulation_mode = carry;
            apply_mode(s);
        }

        Tax => s.x = set_index(s, s.a),
        Tay => s.y = set_index(s, s.a),
        Txa => set_a(s, s.x),
        Tya => set_a(s, s.y),
        Txy => s.y = set_index(s, s.x),
        Tyx => s.x = set_index(s, s.y),
        Tsx => s.x = set_index(s, s.sp),
        Txs => {
            s.sp = if s.emulation_mode { 0x0100 | (s.x & 0x00FF) } else { s.x };
        }
        Tcs => {
            s.sp = if s.emulation_mode { 0x0100 | (s.a & 0x00FF) } else { s.a };
        }
        Tsc => {
            s.a = s.sp;
            set_nz(s, s.a, true);
        }
        Tcd => {
            s.dp = s.a;
            set_nz(s, s.dp, true);
        }
        Tdc => {
            s.a = s.dp;
            set_nz(s, s.a, true);
        }
        Xba => {
            s.a = s.a.swap_bytes();
            set_nz(s, s.a, false);
        }

        Mvn | Mvp => {
            let dest = fetch8(s, bus);
            let src = fetch8(s, bus);
            s.db = dest;
            let value = bus.read_u8(((src as u32) << 16) | s.x as u32);
            bus.write_u8(((dest as u32) << 16) | s.y as u32, value);
            let step = if info.mnemonic == Mvn { 1u16 } else { 0xFFFF };
            let index_mask = mask(x16);
            s.x = s.x.wrapping_add(step) & index_mask;
            s.y = s.y.wrapping_add(step) & index_mask;
            s.a = s.a.wrapping_sub(1);
            if s.a != 0xFFFF {
                s.pc = s.pc.wrapping_sub(3);
            }
        }

        Wai => s.waiting_for_interrupt = true,
        Stp => {
            s.stopped = true;
            log::debug!("CPU stopped at {:02X}:{:04X}", s.pb, s.pc.wrapping_sub(1));
        }
        Nop | Wdm => {}
    }

    cycles
}

fn read_program_bank_word<B: CpuBus>(s: &CpuState, bus: &mut B, ptr: u16) -> u16 {
    let bank = (s.pb as u32) << 16;
    let lo = bus.read_u8(bank | ptr as u32) as u16;
    let hi = bus.read_u8(bank | ptr.wrapping_add(1) as u32) as u16;
    (hi << 8) | lo
}
