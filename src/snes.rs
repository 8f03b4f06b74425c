//! The console: owns every component and interleaves them one system cycle
//! at a time.

use std::path::Path;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use snes_apu::Apu;

use crate::bus::{Bus, CpuView};
use crate::cartridge::{Cartridge, Region};
use crate::config::Config;
use crate::cpu::Cpu;
use crate::cpu_bus::CpuBus;
use crate::debugger::{self, Debugger, Instruction};
use crate::dma::DmaController;
use crate::error::{Result, StateError};
use crate::input::Input;
use crate::io::CpuIo;
use crate::memory::{MemoryBlock, MemoryRegions};
use crate::ppu::{Ppu, PpuEvents};
use crate::savestate::SaveState;

/// SPC700 clock: 32040 Hz output x 32 cycles per sample.
pub const APU_CLOCK_HZ: u64 = 1_025_280;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// Power cycle. Everything except battery SRAM starts over.
    Hard,
    /// Reset button. Memories keep their contents.
    Soft,
}

bitflags! {
    /// What happened during one `run_cycle`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CycleEvents: u16 {
        /// The CPU began an instruction or interrupt entry.
        const INSTRUCTION = 0x0001;
        /// DMA or HDMA owned the CPU slot.
        const CPU_STALLED = 0x0002;
        const DMA_STARTED = 0x0004;
        const HDMA = 0x0008;
        const NMI = 0x0010;
        const IRQ = 0x0020;
        const VBLANK_START = 0x0040;
        const FRAME_COMPLETE = 0x0080;
        /// The CPU stopped on an execute breakpoint; the instruction at the
        /// breakpoint has not run yet.
        const BREAKPOINT = 0x0100;
    }
}

/// Scheduler bookkeeping that belongs in a save state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerState {
    /// Last value on the data bus.
    pub open_bus: u8,
    /// APU clock remainder, in units of 1/(system cycles per second).
    pub apu_remainder: u64,
    /// System cycles still owed to DMA/HDMA.
    pub dma_stall: u32,
    pub cycles: u64,
    pub frames: u64,
}

/// Builds the system bus out of disjoint field borrows of a `Snes`.
macro_rules! bus {
    ($snes:ident) => {
        Bus {
            cart: &$snes.cart,
            memory: &mut $snes.memory,
            ppu: &mut $snes.ppu,
            apu: &mut $snes.apu,
            io: &mut $snes.io,
            input: &mut $snes.input,
            open_bus: &mut $snes.sched.open_bus,
        }
    };
}

#[derive(Debug)]
pub struct Snes {
    cpu: Cpu,
    apu: Apu,
    ppu: Ppu,
    dma: DmaController,
    io: CpuIo,
    input: Input,
    memory: MemoryRegions,
    cart: Cartridge,
    config: Config,
    region: Region,
    sched: SchedulerState,
    debugger: Debugger,
}

impl Snes {
    pub fn new(rom: Vec<u8>) -> Result<Self> {
        Self::with_config(rom, Config::default())
    }

    pub fn with_config(rom: Vec<u8>, config: Config) -> Result<Self> {
        let cart = Cartridge::load_from_bytes(rom)?;
        Ok(Self::from_cartridge(cart, config))
    }

    pub fn from_cartridge(cart: Cartridge, config: Config) -> Self {
        let region = config.region.unwrap_or_else(|| cart.region());
        let mut apu = Apu::new();
        apu.set_interpolation(config.interpolation);
        apu.set_queue_capacity(config.audio_queue);
        let mut cpu = Cpu::new();
        cpu.set_trace(config.trace_cpu);

        let mut snes = Snes {
            cpu,
            apu,
            ppu: Ppu::new(region),
            dma: DmaController::new(),
            io: CpuIo::new(),
            input: Input::new(),
            memory: MemoryRegions::new(cart.ram_size()),
            cart,
            config,
            region,
            sched: SchedulerState::default(),
            debugger: Debugger::new(),
        };
        snes.reset(ResetKind::Hard);
        snes
    }

    pub fn reset(&mut self, kind: ResetKind) {
        match kind {
            ResetKind::Hard => {
                let sram = std::mem::replace(&mut self.memory.sram, MemoryBlock::new(0));
                self.memory = MemoryRegions::new(0);
                self.memory.sram = sram;
                self.apu.reset(true);
                self.ppu = Ppu::new(self.region);
                self.input = Input::new();
                self.cpu = Cpu::new();
                self.cpu.set_trace(self.config.trace_cpu);
            }
            ResetKind::Soft => {
                self.apu.reset(false);
                self.ppu.reset();
            }
        }
        self.dma.reset();
        self.io.reset();
        self.sched = SchedulerState::default();
        self.debugger.rearm();

        let mut view = CpuView {
            bus: bus!(self),
            dma: &mut self.dma,
        };
        self.cpu.reset(&mut view);
        log::info!(
            "{:?} reset, {:?}, PC=${:06X}",
            kind,
            self.region,
            self.cpu.state.full_pc()
        );
    }

    /// System cycles per second; the APU accumulator divides by this.
    fn cycles_per_second(&self) -> u64 {
        crate::ppu::DOTS_PER_LINE as u64
            * self.region.lines_per_frame() as u64
            * self.region.frames_per_second() as u64
    }

    /// One system cycle: CPU (or DMA), APU, PPU dot, mailbox commit.
    pub fn run_cycle(&mut self) -> CycleEvents {
        let mut events = CycleEvents::empty();

        if self.sched.dma_stall > 0 {
            self.sched.dma_stall -= 1;
            events |= CycleEvents::CPU_STALLED;
        } else if self.dma.gp_pending() && self.cpu.at_instruction_boundary() {
            let cost = self.dma.run_general(&mut bus!(self));
            // This cycle is the first of the transfer.
            self.sched.dma_stall = cost.saturating_sub(1);
            events |= CycleEvents::DMA_STARTED | CycleEvents::CPU_STALLED;
        } else {
            if self.cpu.at_instruction_boundary() {
                events |= CycleEvents::INSTRUCTION;
            }
            let mut view = CpuView {
                bus: bus!(self),
                dma: &mut self.dma,
            };
            self.cpu.tick(&mut view);
        }

        self.sched.apu_remainder += APU_CLOCK_HZ;
        let per_second = self.cycles_per_second();
        let apu_cycles = self.sched.apu_remainder / per_second;
        if apu_cycles > 0 {
            self.sched.apu_remainder -= apu_cycles * per_second;
            self.apu.advance(apu_cycles as u32);
        }

        let (line, dot) = (self.ppu.line(), self.ppu.dot());
        let ppu_events = self.ppu.tick();
        self.io.tick(line, dot);
        if ppu_events.contains(PpuEvents::HDMA_INIT) {
            self.sched.dma_stall += self.dma.hdma_init(&mut bus!(self));
        }
        if ppu_events.contains(PpuEvents::HDMA_LINE) {
            let cost = self.dma.hdma_line(&mut bus!(self));
            if cost > 0 {
                self.sched.dma_stall += cost;
                events |= CycleEvents::HDMA;
            }
        }
        if ppu_events.contains(PpuEvents::VBLANK_START) {
            self.io.start_vblank(&mut self.input);
            events |= CycleEvents::VBLANK_START;
        }
        if ppu_events.contains(PpuEvents::VBLANK_END) {
            self.io.end_vblank();
        }
        if ppu_events.contains(PpuEvents::FRAME_COMPLETE) {
            self.sched.frames += 1;
            events |= CycleEvents::FRAME_COMPLETE;
        }

        self.apu.commit_ports();

        if self.io.take_nmi_request() {
            self.cpu.signal_nmi();
            events |= CycleEvents::NMI;
        }
        let irq = self.io.irq_asserted();
        self.cpu.set_irq_line(irq);
        if irq {
            events |= CycleEvents::IRQ;
        }

        if self.debugger.has_breakpoints()
            && self.cpu.at_instruction_boundary()
            && self
                .debugger
                .check_breakpoint(self.cpu.state.full_pc(), self.cpu.instructions())
        {
            events |= CycleEvents::BREAKPOINT;
        }

        self.sched.cycles += 1;
        events
    }

    /// Runs until the PPU wraps back to line 0 or a breakpoint is hit.
    /// Returns the cycles taken.
    pub fn run_frame(&mut self) -> u64 {
        let start = self.sched.cycles;
        let stop = CycleEvents::FRAME_COMPLETE | CycleEvents::BREAKPOINT;
        while !self.run_cycle().intersects(stop) {}
        self.sched.cycles - start
    }

    /// Button snapshot for the next frame (`input::button` masks).
    pub fn set_input(&mut self, port: usize, buttons: u16) {
        self.input.set_buttons(port, buttons);
    }

    /// 256x224 ARGB8888.
    pub fn frame_buffer(&self) -> &[u32] {
        self.ppu.frame_buffer()
    }

    /// Interleaved stereo samples at 32040 Hz. Returns the pairs that came
    /// from the queue; the rest of `out` repeats the last sample.
    pub fn audio_samples(&mut self, out: &mut [i16]) -> usize {
        self.apu.read_samples(out)
    }

    /// Debug bus read with the side effects a CPU read would have.
    pub fn read8(&mut self, addr: u32) -> u8 {
        let mut view = CpuView {
            bus: bus!(self),
            dma: &mut self.dma,
        };
        view.read_u8(addr)
    }

    pub fn write8(&mut self, addr: u32, value: u8) {
        let mut view = CpuView {
            bus: bus!(self),
            dma: &mut self.dma,
        };
        view.write_u8(addr, value);
    }

    /// Bus read without side effects. I/O registers read as open bus.
    pub fn peek8(&self, addr: u32) -> u8 {
        let addr = addr & 0xFF_FFFF;
        let bank = (addr >> 16) as u8;
        let offset = addr as u16;
        let system = matches!(bank, 0x00..=0x3F | 0x80..=0xBF);
        match bank {
            0x7E | 0x7F => self.memory.read_wram(addr - 0x7E_0000),
            _ if system && offset < 0x2000 => self.memory.read_wram(offset as u32),
            _ if system && matches!(offset >> 8, 0x21 | 0x40..=0x43) => self.sched.open_bus,
            _ => self
                .cart
                .map_sram(addr)
                .and_then(|index| self.memory.sram.get(index).copied())
                .or_else(|| self.cart.read(addr))
                .unwrap_or(self.sched.open_bus),
        }
    }

    /// Decodes `count` instructions from `addr` using the CPU's current
    /// register widths.
    pub fn disassemble(&self, addr: u32, count: usize) -> Vec<Instruction> {
        let state = &self.cpu.state;
        debugger::disassemble_range(
            addr,
            count,
            state.memory_is_8bit(),
            state.index_is_8bit(),
            |a| self.peek8(a),
        )
    }

    pub fn debugger(&self) -> &Debugger {
        &self.debugger
    }

    pub fn debugger_mut(&mut self) -> &mut Debugger {
        &mut self.debugger
    }

    pub fn snapshot(&self) -> Result<Vec<u8>, StateError> {
        SaveState {
            magic: crate::savestate::STATE_MAGIC,
            format_version: crate::savestate::FORMAT_VERSION,
            core_version: crate::savestate::CORE_VERSION.to_string(),
            rom_checksum: self.cart.fingerprint(),
            cpu: self.cpu.clone(),
            apu: self.apu.clone(),
            ppu: self.ppu.clone(),
            memory: self.memory.clone(),
            dma: self.dma.clone(),
            io: self.io.clone(),
            input: self.input.clone(),
            scheduler: self.sched.clone(),
        }
        .encode()
    }

    /// Replaces the whole machine state with `blob`. On error nothing has
    /// been touched.
    pub fn restore(&mut self, blob: &[u8]) -> Result<(), StateError> {
        let state = SaveState::decode(blob)?;
        state.validate(
            self.cart.fingerprint(),
            self.memory.sram.len(),
            self.region.lines_per_frame(),
        )?;

        let SaveState {
            cpu,
            apu,
            ppu,
            memory,
            dma,
            io,
            input,
            scheduler,
            ..
        } = state;
        self.cpu = cpu;
        self.cpu.set_trace(self.config.trace_cpu);
        self.apu = apu;
        self.apu.set_interpolation(self.config.interpolation);
        self.apu.set_queue_capacity(self.config.audio_queue);
        self.ppu = ppu;
        self.memory = memory;
        self.dma = dma;
        self.io = io;
        self.input = input;
        self.sched = scheduler;
        self.debugger.rearm();
        log::info!("state restored at frame {}", self.sched.frames);
        Ok(())
    }

    pub fn save_state<P: AsRef<Path>>(&self, path: P) -> Result<(), StateError> {
        std::fs::write(path, self.snapshot()?)?;
        Ok(())
    }

    pub fn load_state<P: AsRef<Path>>(&mut self, path: P) -> Result<(), StateError> {
        let blob = std::fs::read(path)?;
        self.restore(&blob)
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn apu(&self) -> &Apu {
        &self.apu
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn dma(&self) -> &DmaController {
        &self.dma
    }

    pub fn io(&self) -> &CpuIo {
        &self.io
    }

    pub fn memory(&self) -> &MemoryRegions {
        &self.memory
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cart
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn scheduler(&self) -> &SchedulerState {
        &self.sched
    }

    pub fn cycles(&self) -> u64 {
        self.sched.cycles
    }

    pub fn frames(&self) -> u64 {
        self.sched.frames
    }
}
