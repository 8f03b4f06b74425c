//! Super Nintendo audio unit: the SPC700 processor, its 64 KiB of RAM and
//! I/O page, three timers, and the S-DSP that mixes eight BRR voices.

mod apu;
pub mod dsp;
pub mod smp;
mod timer;

pub use apu::{Apu, ApuMemory, IPL_ROM_LEN, NUM_PORTS, RAM_LEN};
pub use dsp::{Dsp, EnvelopePhase, Interpolation, SAMPLE_RATE};
pub use smp::{Psw, Smp, SmpBus};
pub use timer::Timer;
