//! 65C816 main CPU.
//!
//! Instructions execute atomically on the cycle they start; the cost from the
//! dispatch table (plus penalties) is then paid off one `tick` at a time.
//! Interrupts are only looked at when the previous instruction has been paid
//! for.

mod execute;
pub mod opcodes;

#[cfg(test)]
mod tests;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::cpu_bus::CpuBus;
use opcodes::OPCODES;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct StatusFlags: u8 {
        const CARRY = 0x01;
        const ZERO = 0x02;
        const IRQ_DISABLE = 0x04;
        const DECIMAL = 0x08;
        const INDEX_8BIT = 0x10;
        const MEMORY_8BIT = 0x20;
        const OVERFLOW = 0x40;
        const NEGATIVE = 0x80;
    }
}

pub(crate) const VECTOR_NATIVE_COP: u32 = 0x00FFE4;
pub(crate) const VECTOR_NATIVE_BRK: u32 = 0x00FFE6;
pub(crate) const VECTOR_NATIVE_NMI: u32 = 0x00FFEA;
pub(crate) const VECTOR_NATIVE_IRQ: u32 = 0x00FFEE;
pub(crate) const VECTOR_EMU_COP: u32 = 0x00FFF4;
pub(crate) const VECTOR_EMU_NMI: u32 = 0x00FFFA;
pub(crate) const VECTOR_RESET: u32 = 0x00FFFC;
pub(crate) const VECTOR_EMU_IRQ: u32 = 0x00FFFE;

/// Programmer-visible registers plus the interrupt and halt latches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuState {
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub sp: u16,
    pub dp: u16,
    pub db: u8,
    pub pb: u8,
    pub pc: u16,
    pub p: StatusFlags,
    pub emulation_mode: bool,
    /// Edge-latched NMI, cleared when serviced.
    pub nmi_pending: bool,
    /// Level of the IRQ line, driven by the timer unit every cycle.
    pub irq_line: bool,
    pub waiting_for_interrupt: bool,
    pub stopped: bool,
}

impl CpuState {
    fn power_on() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0x01FF,
            dp: 0,
            db: 0,
            pb: 0,
            pc: 0,
            p: StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT | StatusFlags::IRQ_DISABLE,
            emulation_mode: true,
            nmi_pending: false,
            irq_line: false,
            waiting_for_interrupt: false,
            stopped: false,
        }
    }

    #[inline]
    pub fn memory_is_8bit(&self) -> bool {
        self.emulation_mode || self.p.contains(StatusFlags::MEMORY_8BIT)
    }

    #[inline]
    pub fn index_is_8bit(&self) -> bool {
        self.emulation_mode || self.p.contains(StatusFlags::INDEX_8BIT)
    }

    #[inline]
    pub fn full_pc(&self) -> u32 {
        ((self.pb as u32) << 16) | self.pc as u32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    pub state: CpuState,
    /// Cycles still owed by the instruction in flight.
    stall: u32,
    /// Cost of the most recently started instruction or interrupt entry.
    last_cost: u32,
    cycles: u64,
    instructions: u64,
    #[serde(skip)]
    trace: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            state: CpuState::power_on(),
            stall: 0,
            last_cost: 0,
            cycles: 0,
            instructions: 0,
            trace: false,
        }
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    /// Reset line: emulation mode, 8-bit registers, direct page 0, stack in
    /// page 1 and PC from $FFFC. A and X/Y low bytes survive a reset.
    pub fn reset<B: CpuBus>(&mut self, bus: &mut B) {
        let s = &mut self.state;
        s.emulation_mode = true;
        s.p.insert(StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT | StatusFlags::IRQ_DISABLE);
        s.p.remove(StatusFlags::DECIMAL);
        s.x &= 0x00FF;
        s.y &= 0x00FF;
        s.sp = 0x0100 | (s.sp & 0x00FF);
        s.dp = 0;
        s.db = 0;
        s.pb = 0;
        s.nmi_pending = false;
        s.irq_line = false;
        s.waiting_for_interrupt = false;
        s.stopped = false;
        s.pc = bus.read_u16(VECTOR_RESET);
        self.stall = 0;
        self.last_cost = 0;
        log::debug!("CPU reset, PC={:04X}", self.state.pc);
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    /// True when the next `tick` starts a new instruction (or interrupt).
    pub fn at_instruction_boundary(&self) -> bool {
        self.stall == 0
    }

    pub fn last_instruction_cycles(&self) -> u32 {
        self.last_cost
    }

    pub fn signal_nmi(&mut self) {
        self.state.nmi_pending = true;
    }

    pub fn set_irq_line(&mut self, asserted: bool) {
        self.state.irq_line = asserted;
    }

    /// Advances the CPU by one system cycle.
    pub fn tick<B: CpuBus>(&mut self, bus: &mut B) {
        self.cycles += 1;
        if self.stall > 0 {
            self.stall -= 1;
            return;
        }
        let cost = self.step(bus);
        self.stall = cost.saturating_sub(1);
    }

    /// Runs everything up to and including the next instruction (or
    /// interrupt entry) and returns its cost. Used by tests and debuggers;
    /// the scheduler goes through `tick`.
    pub fn step_instruction<B: CpuBus>(&mut self, bus: &mut B) -> u32 {
        while self.stall > 0 {
            self.tick(bus);
        }
        self.tick(bus);
        self.last_cost
    }

    fn step<B: CpuBus>(&mut self, bus: &mut B) -> u32 {
        let cost = self.step_inner(bus);
        self.last_cost = cost;
        cost
    }

    fn step_inner<B: CpuBus>(&mut self, bus: &mut B) -> u32 {
        if self.state.stopped {
            return 1;
        }

        if self.state.nmi_pending {
            self.state.nmi_pending = false;
            self.state.waiting_for_interrupt = false;
            return self.interrupt(bus, Interrupt::Nmi);
        }

        let irq_enabled = !self.state.p.contains(StatusFlags::IRQ_DISABLE);
        if self.state.irq_line && irq_enabled {
            self.state.waiting_for_interrupt = false;
            return self.interrupt(bus, Interrupt::Irq);
        }

        if self.state.waiting_for_interrupt {
            if !self.state.irq_line {
                return 1;
            }
            // A masked IRQ still ends WAI; execution continues after it.
            self.state.waiting_for_interrupt = false;
        }

        let pc = self.state.full_pc();
        let opcode = bus.read_u8(pc);
        self.state.pc = self.state.pc.wrapping_add(1);
        if self.trace {
            let info = &OPCODES[opcode as usize];
            log::trace!(
                "{:06X} {:02X} {:?} {:?} A:{:04X} X:{:04X} Y:{:04X} S:{:04X} D:{:04X} DB:{:02X} P:{:02X} E:{}",
                pc,
                opcode,
                info.mnemonic,
                info.mode,
                self.state.a,
                self.state.x,
                self.state.y,
                self.state.sp,
                self.state.dp,
                self.state.db,
                self.state.p.bits(),
                self.state.emulation_mode as u8
            );
        }
        self.instructions += 1;
        execute::execute(&mut self.state, bus, opcode)
    }

    fn interrupt<B: CpuBus>(&mut self, bus: &mut B, kind: Interrupt) -> u32 {
        let vector = match (kind, self.state.emulation_mode) {
            (Interrupt::Nmi, false) => VECTOR_NATIVE_NMI,
            (Interrupt::Nmi, true) => VECTOR_EMU_NMI,
            (Interrupt::Irq, false) => VECTOR_NATIVE_IRQ,
            (Interrupt::Irq, true) => VECTOR_EMU_IRQ,
        };
        execute::enter_interrupt(&mut self.state, bus, vector, false);
        if self.state.emulation_mode {
            7
        } else {
            8
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Interrupt {
    Nmi,
    Irq,
}
