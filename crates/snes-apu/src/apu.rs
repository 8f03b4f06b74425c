use serde::{Deserialize, Serialize};

use super::dsp::{Dsp, Interpolation, CYCLES_PER_SAMPLE};
use super::smp::{Smp, SmpBus};
use super::timer::Timer;

#[cfg(test)]
mod tests;

pub const RAM_LEN: usize = 0x10000;
pub const IPL_ROM_LEN: usize = 64;
pub const NUM_PORTS: usize = 4;

static IPL_ROM: [u8; IPL_ROM_LEN] = [
    0xcd, 0xef, 0xbd, 0xe8, 0x00, 0xc6, 0x1d, 0xd0,
    0xfc, 0x8f, 0xaa, 0xf4, 0x8f, 0xbb, 0xf5, 0x78,
    0xcc, 0xf4, 0xd0, 0xfb, 0x2f, 0x19, 0xeb, 0xf4,
    0xd0, 0xfc, 0x7e, 0xf4, 0xd0, 0x0b, 0xe4, 0xf5,
    0xcb, 0xf4, 0xd7, 0x00, 0xfc, 0xd0, 0xf3, 0xab,
    0x01, 0x10, 0xef, 0x7e, 0xf4, 0x10, 0xeb, 0xba,
    0xf6, 0xda, 0x00, 0xba, 0xf4, 0xc4, 0xf4, 0xdd,
    0x5d, 0xd0, 0xdb, 0x1f, 0x00, 0x00, 0xc0, 0xff];

/// The four CPU <-> APU mailbox ports ($2140-$2143 on the CPU side,
/// $F4-$F7 on the SMP side). Each direction has its own latch, and a write
/// only lands in the latch when the scheduler commits the cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Ports {
    cpu_to_apu: [u8; NUM_PORTS],
    apu_to_cpu: [u8; NUM_PORTS],
    pending_cpu_to_apu: [Option<u8>; NUM_PORTS],
    pending_apu_to_cpu: [Option<u8>; NUM_PORTS],
}

impl Ports {
    fn commit(&mut self) {
        for p in 0..NUM_PORTS {
            if let Some(v) = self.pending_cpu_to_apu[p].take() {
                self.cpu_to_apu[p] = v;
            }
            if let Some(v) = self.pending_apu_to_cpu[p].take() {
                self.apu_to_cpu[p] = v;
            }
        }
    }
}

/// Everything the SMP can address: RAM, the $F0-$FF I/O page, the IPL ROM
/// overlay and, behind DSPADDR/DSPDATA, the DSP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApuMemory {
    ram: Vec<u8>,
    is_ipl_rom_enabled: bool,
    control: u8,
    test: u8,
    dsp_reg_address: u8,
    timers: [Timer; 3],
    ports: Ports,
    dsp: Dsp,
    dsp_cycles: u32,
}

impl ApuMemory {
    fn new() -> Self {
        Self {
            ram: vec![0; RAM_LEN],
            is_ipl_rom_enabled: true,
            control: 0x80,
            test: 0x0A,
            dsp_reg_address: 0,
            timers: [Timer::new(128), Timer::new(128), Timer::new(16)],
            ports: Ports::default(),
            dsp: Dsp::new(),
            dsp_cycles: 0,
        }
    }

    /// Runs the timers and the DSP for `cycles` APU cycles.
    fn tick(&mut self, cycles: u32) {
        for timer in self.timers.iter_mut() {
            timer.tick(cycles);
        }
        self.dsp_cycles += cycles;
        while self.dsp_cycles >= CYCLES_PER_SAMPLE {
            self.dsp_cycles -= CYCLES_PER_SAMPLE;
            self.dsp.run_sample(&mut self.ram);
        }
    }

    fn set_control_reg(&mut self, value: u8) {
        self.control = value;
        self.is_ipl_rom_enabled = (value & 0x80) != 0;
        if (value & 0x10) != 0 {
            self.ports.cpu_to_apu[0] = 0;
            self.ports.cpu_to_apu[1] = 0;
        }
        if (value & 0x20) != 0 {
            self.ports.cpu_to_apu[2] = 0;
            self.ports.cpu_to_apu[3] = 0;
        }
        for (i, timer) in self.timers.iter_mut().enumerate() {
            timer.set_running((value >> i) & 0x01 != 0);
        }
        log::debug!("APU control <- {:02X}", value);
    }
}

impl SmpBus for ApuMemory {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            0x00F0 | 0x00F1 | 0x00FA..=0x00FC => 0,
            0x00F2 => self.dsp_reg_address,
            0x00F3 => self.dsp.read(self.dsp_reg_address),
            0x00F4..=0x00F7 => self.ports.cpu_to_apu[(addr - 0xF4) as usize],
            0x00FD..=0x00FF => self.timers[(addr - 0xFD) as usize].read_counter(),
            0xFFC0..=0xFFFF if self.is_ipl_rom_enabled => IPL_ROM[(addr - 0xFFC0) as usize],
            _ => self.ram[addr as usize],
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x00F0 => self.test = value,
            0x00F1 => self.set_control_reg(value),
            0x00F2 => self.dsp_reg_address = value,
            0x00F3 => self.dsp.write(self.dsp_reg_address, value),
            0x00F4..=0x00F7 => {
                self.ports.pending_apu_to_cpu[(addr - 0xF4) as usize] = Some(value)
            }
            0x00FA..=0x00FC => self.timers[(addr - 0xFA) as usize].set_target(value),
            0x00FD..=0x00FF => {}
            // $F8/$F9 and everything else (including RAM under the IPL ROM).
            _ => self.ram[addr as usize] = value,
        }
    }
}

/// The audio unit: SPC700 core plus its memory, timers, DSP and mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Apu {
    smp: Smp,
    mem: ApuMemory,
    /// Cycles the scheduler has granted so far. The SMP runs whole
    /// instructions until its own count reaches this.
    target_cycles: u64,
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

impl Apu {
    pub fn new() -> Apu {
        let mut apu = Apu {
            smp: Smp::new(),
            mem: ApuMemory::new(),
            target_cycles: 0,
        };
        apu.reset(true);
        apu
    }

    /// A hard reset also clears APU RAM; a soft reset keeps it.
    pub fn reset(&mut self, hard: bool) {
        if hard {
            self.mem.ram.iter_mut().for_each(|b| *b = 0);
        }
        let interpolation = self.mem.dsp.interpolation();
        self.mem.dsp.reset();
        self.mem.dsp.set_interpolation(interpolation);
        for timer in self.mem.timers.iter_mut() {
            timer.reset();
        }
        self.mem.ports = Ports::default();
        self.mem.dsp_reg_address = 0;
        self.mem.dsp_cycles = 0;
        self.mem.test = 0x0A;
        self.mem.set_control_reg(0x80);
        self.smp.cycles = 0;
        self.target_cycles = 0;
        self.smp.reset(&mut self.mem);
    }

    /// Grants the APU `cycles` more cycles and runs the SMP until it has
    /// caught up. An instruction that overshoots is paid back from the next
    /// grant.
    pub fn advance(&mut self, cycles: u32) {
        self.target_cycles += cycles as u64;
        while self.smp.cycles < self.target_cycles {
            self.step();
        }
    }

    /// Executes one SMP instruction and the matching timer/DSP time.
    pub fn step(&mut self) -> u32 {
        let cycles = self.smp.step(&mut self.mem);
        self.mem.tick(cycles);
        cycles
    }

    /// Main CPU write to $2140-$2143.
    pub fn cpu_write_port(&mut self, port: u8, value: u8) {
        self.mem.ports.pending_cpu_to_apu[(port & 0x03) as usize] = Some(value);
    }

    /// Main CPU read of $2140-$2143.
    pub fn cpu_read_port(&self, port: u8) -> u8 {
        self.mem.ports.apu_to_cpu[(port & 0x03) as usize]
    }

    /// Value the SMP currently sees at $F4-$F7.
    pub fn smp_port(&self, port: u8) -> u8 {
        self.mem.ports.cpu_to_apu[(port & 0x03) as usize]
    }

    /// Publishes mailbox writes made during the cycle that just ended.
    pub fn commit_ports(&mut self) {
        self.mem.ports.commit();
    }

    pub fn read_samples(&mut self, out: &mut [i16]) -> usize {
        self.mem.dsp.read_samples(out)
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.mem.dsp.set_interpolation(interpolation);
    }

    pub fn set_queue_capacity(&mut self, capacity: usize) {
        self.mem.dsp.set_queue_capacity(capacity);
    }

    pub fn smp(&self) -> &Smp {
        &self.smp
    }

    pub fn dsp(&self) -> &Dsp {
        &self.mem.dsp
    }

    pub fn ram(&self) -> &[u8] {
        &self.mem.ram
    }

    pub fn cycles(&self) -> u64 {
        self.smp.cycles
    }

    /// Reads through the SMP address map, including side effects.
    pub fn smp_read(&mut self, addr: u16) -> u8 {
        self.mem.read(addr)
    }

    pub fn smp_write(&mut self, addr: u16, value: u8) {
        self.mem.write(addr, value)
    }

    /// Checks the buffer sizes of a deserialized APU.
    pub fn is_well_formed(&self) -> bool {
        self.mem.ram.len() == RAM_LEN && self.mem.dsp.regs_len() == 0x80
    }
}
