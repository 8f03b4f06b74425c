use serde::{Deserialize, Serialize};

use super::tables::counter_fires;

pub const ENVELOPE_MAX: u16 = 0x7FF;

/// Samples a voice spends in key-on delay before its envelope starts.
pub const KEY_ON_DELAY: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopePhase {
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    /// Ring of decoded samples, four are refilled per BRR step.
    pub(crate) buffer: [i16; 12],
    pub(crate) buffer_pos: usize,
    /// Address of the current 9-byte BRR block.
    pub(crate) brr_addr: u16,
    /// Offset of the next data byte pair inside the block (1, 3, 5 or 7).
    pub(crate) brr_offset: u16,
    pub(crate) brr_header: u8,
    pub(crate) pitch_counter: u16,
    pub(crate) envelope: u16,
    pub(crate) hidden_envelope: u16,
    pub(crate) phase: EnvelopePhase,
    pub(crate) key_on_delay: u8,
    /// Last enveloped sample, feeds the next voice's pitch modulation.
    pub(crate) output: i32,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            buffer: [0; 12],
            buffer_pos: 0,
            brr_addr: 0,
            brr_offset: 1,
            brr_header: 0,
            pitch_counter: 0,
            envelope: 0,
            hidden_envelope: 0,
            phase: EnvelopePhase::Release,
            key_on_delay: 0,
            output: 0,
        }
    }
}

impl Voice {
    pub fn envelope(&self) -> u16 {
        self.envelope
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    pub fn is_keyed_on(&self) -> bool {
        self.key_on_delay > 0 || self.phase != EnvelopePhase::Release || self.envelope > 0
    }

    /// Advances the ADSR/GAIN envelope by one sample. Phase transitions happen
    /// every sample; the level itself only moves when the rate counter fires.
    pub(crate) fn run_envelope(&mut self, adsr1: u8, adsr2: u8, gain: u8, counter: u16) {
        if self.phase == EnvelopePhase::Release {
            self.envelope = self.envelope.saturating_sub(8);
            return;
        }

        let mut env = self.envelope as i32;
        let rate;
        let sustain_source;
        if adsr1 & 0x80 != 0 {
            sustain_source = adsr2;
            if self.phase == EnvelopePhase::Attack {
                let attack_rate = ((adsr1 & 0x0F) * 2 + 1) as usize;
                env += if attack_rate < 31 { 0x20 } else { 0x400 };
                rate = attack_rate;
            } else {
                env -= 1;
                env -= env >> 8;
                rate = if self.phase == EnvelopePhase::Decay {
                    (((adsr1 >> 4) & 0x07) * 2 + 0x10) as usize
                } else {
                    (adsr2 & 0x1F) as usize
                };
            }
        } else {
            sustain_source = gain;
            let mode = gain >> 5;
            if gain & 0x80 == 0 {
                env = (gain as i32) * 0x10;
                rate = 31;
            } else {
                rate = (gain & 0x1F) as usize;
                match mode {
                    4 => env -= 0x20,
                    5 => {
                        env -= 1;
                        env -= env >> 8;
                    }
                    6 => env += 0x20,
                    _ => {
                        env += if self.hidden_envelope >= 0x600 { 0x08 } else { 0x20 };
                    }
                }
            }
        }

        if self.phase == EnvelopePhase::Decay && (env >> 8) == (sustain_source >> 5) as i32 {
            self.phase = EnvelopePhase::Sustain;
        }
        self.hidden_envelope = (env & 0xFFFF) as u16;

        if !(0..=ENVELOPE_MAX as i32).contains(&env) {
            env = if env < 0 { 0 } else { ENVELOPE_MAX as i32 };
            if self.phase == EnvelopePhase::Attack {
                self.phase = EnvelopePhase::Decay;
            }
        }

        if counter_fires(counter, rate) {
            self.envelope = env as u16;
        }
    }

    /// Decodes the next four samples of the current BRR block into the ring.
    pub(crate) fn decode_brr(&mut self, ram: &[u8]) {
        let shift = self.brr_header >> 4;
        let filter = (self.brr_header >> 2) & 0x03;
        let pos = self.buffer_pos;
        let mut old = (self.buffer[(pos + 11) % 12] >> 1) as i32;
        let mut older = (self.buffer[(pos + 10) % 12] >> 1) as i32;

        let mut byte = 0u8;
        for i in 0..4 {
            let nibble = if i & 1 == 0 {
                let addr = self
                    .brr_addr
                    .wrapping_add(self.brr_offset)
                    .wrapping_add((i >> 1) as u16);
                byte = ram[addr as usize];
                byte >> 4
            } else {
                byte & 0x0F
            };
            let mut s = ((nibble as i32) << 28) >> 28;
            s = if shift <= 12 {
                (s << shift) >> 1
            } else if s < 0 {
                -0x800
            } else {
                0
            };
            s += match filter {
                0 => 0,
                1 => old + (-old >> 4),
                2 => 2 * old + ((-old * 3) >> 5) - older + (older >> 4),
                _ => 2 * old + ((-old * 13) >> 6) - older + ((older * 3) >> 4),
            };
            // Clamp to 16 bits, then drop bit 15 of the doubled value.
            let sample = ((clamp16(s) as i32) << 1) as i16;
            self.buffer[pos + i] = sample;
            older = old;
            old = (sample >> 1) as i32;
        }

        self.buffer_pos = (pos + 4) % 12;
    }
}

pub(crate) fn clamp16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}
