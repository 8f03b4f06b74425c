mod tables;
mod voice;


use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub use tables::{counter_fires, gauss_table, COUNTER_RANGE};
pub use voice::{EnvelopePhase, Voice, ENVELOPE_MAX, KEY_ON_DELAY};

use voice::clamp16;

pub const NUM_VOICES: usize = 8;

/// Native output rate of the DSP.
pub const SAMPLE_RATE: u32 = 32_000;

/// APU cycles per output sample.
pub const CYCLES_PER_SAMPLE: u32 = 32;

pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

// Per-voice registers, at `voice << 4 | reg`.
const V_VOLL: usize = 0x00;
const V_VOLR: usize = 0x01;
const V_PITCHL: usize = 0x02;
const V_PITCHH: usize = 0x03;
const V_SRCN: usize = 0x04;
const V_ADSR1: usize = 0x05;
const V_ADSR2: usize = 0x06;
const V_GAIN: usize = 0x07;
const V_ENVX: usize = 0x08;
const V_OUTX: usize = 0x09;

// Global registers.
const MVOLL: usize = 0x0C;
const MVOLR: usize = 0x1C;
const EVOLL: usize = 0x2C;
const EVOLR: usize = 0x3C;
const KON: usize = 0x4C;
const KOFF: usize = 0x5C;
const FLG: usize = 0x6C;
const ENDX: usize = 0x7C;
const EFB: usize = 0x0D;
const PMON: usize = 0x2D;
const NON: usize = 0x3D;
const EON: usize = 0x4D;
const DIR: usize = 0x5D;
const ESA: usize = 0x6D;
const EDL: usize = 0x7D;
const FIR: usize = 0x0F;

const FLG_RESET: u8 = 0x80;
const FLG_MUTE: u8 = 0x40;
const FLG_ECHO_DISABLE: u8 = 0x20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    /// Hardware 4-tap Gaussian filter.
    #[default]
    Gaussian,
    Linear,
    Hermite,
    Cosine,
    Cubic,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Echo {
    offset: u16,
    length: u16,
    history: [[i16; 2]; 8],
    pos: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dsp {
    regs: Vec<u8>,
    voices: [Voice; NUM_VOICES],
    counter: u16,
    noise: u16,
    /// KON bits written since the last sample; consumed as a one-shot strobe.
    pending_key_on: u8,
    /// KOFF bits written since the last sample.
    pending_key_off: u8,
    echo: Echo,
    output: VecDeque<[i16; 2]>,
    capacity: usize,
    last_output: [i16; 2],
    interpolation: Interpolation,
    samples_generated: u64,
}

impl Default for Dsp {
    fn default() -> Self {
        Self::new()
    }
}

impl Dsp {
    pub fn new() -> Self {
        let mut dsp = Self {
            regs: vec![0; 0x80],
            voices: Default::default(),
            counter: 0,
            noise: 0x4000,
            pending_key_on: 0,
            pending_key_off: 0,
            echo: Echo::default(),
            output: VecDeque::with_capacity(DEFAULT_QUEUE_CAPACITY),
            capacity: DEFAULT_QUEUE_CAPACITY,
            last_output: [0; 2],
            interpolation: Interpolation::default(),
            samples_generated: 0,
        };
        dsp.reset();
        dsp
    }

    pub fn reset(&mut self) {
        self.regs.iter_mut().for_each(|r| *r = 0);
        self.regs[FLG] = FLG_RESET | FLG_MUTE | FLG_ECHO_DISABLE;
        self.voices = Default::default();
        self.counter = 0;
        self.noise = 0x4000;
        self.pending_key_on = 0;
        self.pending_key_off = 0;
        self.echo = Echo::default();
        self.output.clear();
        self.last_output = [0; 2];
        self.samples_generated = 0;
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Bounds the queue of finished samples. The oldest samples are dropped
    /// once it is full.
    pub fn set_queue_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.output.len() > self.capacity {
            self.output.pop_front();
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.capacity
    }

    pub fn voice(&self, index: usize) -> &Voice {
        &self.voices[index & 7]
    }

    pub fn samples_generated(&self) -> u64 {
        self.samples_generated
    }

    pub fn queued_samples(&self) -> usize {
        self.output.len()
    }

    pub fn regs_len(&self) -> usize {
        self.regs.len()
    }

    pub fn read(&self, addr: u8) -> u8 {
        self.regs[(addr & 0x7F) as usize]
    }

    pub fn write(&mut self, addr: u8, value: u8) {
        // $80-$FF mirror $00-$7F for reads only.
        if addr & 0x80 != 0 {
            return;
        }
        let addr = addr as usize;
        match addr {
            KON => {
                self.pending_key_on |= value;
                self.regs[addr] = value;
            }
            KOFF => {
                self.pending_key_off |= value;
                self.regs[addr] = value;
            }
            ENDX => self.regs[addr] = 0,
            _ => self.regs[addr] = value,
        }
    }

    /// Moves up to `out.len() / 2` interleaved stereo pairs out of the queue.
    /// When the queue runs dry the remaining pairs repeat the last sample.
    /// Returns the number of pairs taken from the queue.
    pub fn read_samples(&mut self, out: &mut [i16]) -> usize {
        let mut taken = 0;
        for pair in out.chunks_exact_mut(2) {
            if let Some(sample) = self.output.pop_front() {
                self.last_output = sample;
                taken += 1;
            }
            pair[0] = self.last_output[0];
            pair[1] = self.last_output[1];
        }
        taken
    }

    /// Produces one stereo sample. Called every 32 APU cycles.
    pub fn run_sample(&mut self, ram: &mut [u8]) {
        self.counter = if self.counter == 0 {
            COUNTER_RANGE - 1
        } else {
            self.counter - 1
        };

        // Key strobes are sampled once per sample period.
        let key_on = std::mem::take(&mut self.pending_key_on);
        let key_off = std::mem::take(&mut self.pending_key_off);
        let flg = self.regs[FLG];

        if counter_fires(self.counter, (flg & 0x1F) as usize) {
            let feedback = (self.noise << 13) ^ (self.noise << 14);
            self.noise = (feedback & 0x4000) ^ (self.noise >> 1);
        }

        let mut main = [0i32; 2];
        let mut echo_in = [0i32; 2];
        let mut previous_output = 0;
        for v in 0..NUM_VOICES {
            let out = self.run_voice(v, ram, key_on, key_off, previous_output);
            previous_output = out;

            let base = v << 4;
            let left = (out * self.regs[base | V_VOLL] as i8 as i32) >> 7;
            let right = (out * self.regs[base | V_VOLR] as i8 as i32) >> 7;
            main[0] = clamp16(main[0] + left) as i32;
            main[1] = clamp16(main[1] + right) as i32;
            if self.regs[EON] & (1 << v) != 0 {
                echo_in[0] = clamp16(echo_in[0] + left) as i32;
                echo_in[1] = clamp16(echo_in[1] + right) as i32;
            }
        }

        let echo_out = self.run_echo(ram, echo_in, flg);

        let mut sample = [0i16; 2];
        let master = [self.regs[MVOLL] as i8 as i32, self.regs[MVOLR] as i8 as i32];
        for c in 0..2 {
            let mixed = ((main[c] * master[c]) >> 7) + echo_out[c];
            sample[c] = if flg & FLG_MUTE != 0 { 0 } else { clamp16(mixed) };
        }

        if self.output.len() >= self.capacity {
            self.output.pop_front();
        }
        self.output.push_back(sample);
        self.samples_generated += 1;
    }

    fn run_voice(&mut self, v: usize, ram: &mut [u8], key_on: u8, key_off: u8, previous_output: i32) -> i32 {
        let base = v << 4;
        let bit = 1u8 << v;
        let flg = self.regs[FLG];

        let mut pitch = (self.regs[base | V_PITCHL] as i32 | ((self.regs[base | V_PITCHH] as i32) << 8)) & 0x3FFF;
        if v > 0 && self.regs[PMON] & bit != 0 {
            pitch += ((previous_output >> 5) * pitch) >> 10;
        }

        let dir = (self.regs[DIR] as u16) << 8;
        let entry = dir.wrapping_add((self.regs[base | V_SRCN] as u16) << 2);

        let voice = &mut self.voices[v];
        voice.brr_header = ram[voice.brr_addr as usize];

        // Sample start while keying on, loop point afterwards.
        let pointer = if voice.key_on_delay == 0 {
            entry.wrapping_add(2)
        } else {
            entry
        };
        let sample_addr = read_u16(ram, pointer);

        if voice.key_on_delay > 0 {
            if voice.key_on_delay == KEY_ON_DELAY {
                voice.brr_addr = sample_addr;
                voice.brr_offset = 1;
                voice.buffer_pos = 0;
                voice.brr_header = 0;
                self.regs[ENDX] &= !bit;
            }
            voice.envelope = 0;
            voice.hidden_envelope = 0;
            voice.key_on_delay -= 1;
            voice.pitch_counter = if (1..4).contains(&voice.key_on_delay) { 0x4000 } else { 0 };
            pitch = 0;
        }

        let raw = if self.regs[NON] & bit != 0 {
            clamp16(((self.noise as i16) << 1) as i32)
        } else {
            interpolate(self.interpolation, voice)
        };
        let sample = (((raw as i32) * voice.envelope as i32) >> 11) & !1;

        if flg & FLG_RESET != 0 || (voice.brr_header & 0x03) == 0x01 {
            voice.phase = EnvelopePhase::Release;
            voice.envelope = 0;
        }

        if key_off & bit != 0 {
            voice.phase = EnvelopePhase::Release;
        }
        if key_on & bit != 0 {
            voice.key_on_delay = KEY_ON_DELAY;
            voice.phase = EnvelopePhase::Attack;
        }

        if voice.key_on_delay == 0 {
            voice.run_envelope(
                self.regs[base | V_ADSR1],
                self.regs[base | V_ADSR2],
                self.regs[base | V_GAIN],
                self.counter,
            );
        }

        if voice.pitch_counter >= 0x4000 {
            voice.decode_brr(ram);
            if voice.brr_offset >= 7 {
                if voice.brr_header & 0x01 != 0 {
                    voice.brr_addr = sample_addr;
                    self.regs[ENDX] |= bit;
                } else {
                    voice.brr_addr = voice.brr_addr.wrapping_add(9);
                }
                voice.brr_offset = 1;
            } else {
                voice.brr_offset += 2;
            }
        }

        voice.pitch_counter &= 0x3FFF;
        voice.pitch_counter = (voice.pitch_counter as i32 + pitch).clamp(0, 0x7FFF) as u16;

        self.regs[base | V_ENVX] = (voice.envelope >> 4) as u8;
        self.regs[base | V_OUTX] = (sample >> 8) as u8;
        voice.output = sample;
        sample
    }

    fn run_echo(&mut self, ram: &mut [u8], echo_in: [i32; 2], flg: u8) -> [i32; 2] {
        let start = (self.regs[ESA] as u16) << 8;
        let addr = start.wrapping_add(self.echo.offset);

        self.echo.pos = (self.echo.pos + 1) & 7;
        self.echo.history[self.echo.pos] = [
            (read_u16(ram, addr) as i16) >> 1,
            (read_u16(ram, addr.wrapping_add(2)) as i16) >> 1,
        ];

        let mut fir = [0i32; 2];
        for tap in 0..8 {
            let coefficient = self.regs[FIR | (tap << 4)] as i8 as i32;
            let history = self.echo.history[(self.echo.pos + tap + 1) & 7];
            for c in 0..2 {
                fir[c] += (history[c] as i32 * coefficient) >> 6;
            }
        }
        let fir = [clamp16(fir[0]) as i32 & !1, clamp16(fir[1]) as i32 & !1];

        let echo_volume = [self.regs[EVOLL] as i8 as i32, self.regs[EVOLR] as i8 as i32];
        let feedback = self.regs[EFB] as i8 as i32;
        let mut out = [0i32; 2];
        for c in 0..2 {
            out[c] = (fir[c] * echo_volume[c]) >> 7;
            let written = clamp16(echo_in[c] + ((fir[c] * feedback) >> 7)) & !1;
            if flg & FLG_ECHO_DISABLE == 0 {
                write_u16(ram, addr.wrapping_add((c as u16) << 1), written as u16);
            }
        }

        if self.echo.offset == 0 {
            let delay = (self.regs[EDL] & 0x0F) as u16;
            self.echo.length = if delay == 0 { 4 } else { delay << 11 };
        }
        self.echo.offset += 4;
        if self.echo.offset >= self.echo.length {
            self.echo.offset = 0;
        }

        out
    }
}

fn interpolate(mode: Interpolation, voice: &Voice) -> i16 {
    let pos = (voice.pitch_counter >> 12) as usize + voice.buffer_pos;
    let fraction = ((voice.pitch_counter >> 4) & 0xFF) as i32;
    let s = |i: usize| voice.buffer[(pos + i) % 12] as i32;
    let (oldest, older, old, new) = (s(0), s(1), s(2), s(3));

    let out = match mode {
        Interpolation::Gaussian => {
            let g = gauss_table();
            let f = fraction as usize;
            let mut out = (g[0xFF - f] as i32 * oldest) >> 11;
            out += (g[0x1FF - f] as i32 * older) >> 11;
            out += (g[0x100 + f] as i32 * old) >> 11;
            out = clamp16(out) as i32 + ((g[f] as i32 * new) >> 11);
            out
        }
        Interpolation::Linear => older + (((old - older) * fraction) >> 8),
        Interpolation::Cosine => {
            let mu = tables::cosine_table()[fraction as usize];
            older + (((old - older) * mu) >> 12)
        }
        Interpolation::Hermite => {
            let t = fraction as f32 / 256.0;
            let (p0, p1, p2, p3) = (oldest as f32, older as f32, old as f32, new as f32);
            let c1 = 0.5 * (p2 - p0);
            let c2 = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
            let c3 = 0.5 * (p3 - p0) + 1.5 * (p1 - p2);
            (((c3 * t + c2) * t + c1) * t + p1) as i32
        }
        Interpolation::Cubic => {
            let t = fraction as f32 / 256.0;
            let (p0, p1, p2, p3) = (oldest as f32, older as f32, old as f32, new as f32);
            let a0 = p3 - p2 - p0 + p1;
            let a1 = p0 - p1 - a0;
            let a2 = p2 - p0;
            (((a0 * t + a1) * t + a2) * t + p1) as i32
        }
    };
    clamp16(out) & !1
}

fn read_u16(ram: &[u8], addr: u16) -> u16 {
    let lo = ram[addr as usize] as u16;
    let hi = ram[addr.wrapping_add(1) as usize] as u16;
    (hi << 8) | lo
}

fn write_u16(ram: &mut [u8], addr: u16, value: u16) {
    ram[addr as usize] = value as u8;
    ram[addr.wrapping_add(1) as usize] = (value >> 8) as u8;
}
