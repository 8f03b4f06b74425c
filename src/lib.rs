//! Cycle-stepped SNES core: 65C816 CPU, PPU, DMA/HDMA and the memory bus,
//! driven together with the `snes-apu` audio unit by [`Snes`].

pub mod bus;
pub mod cartridge;
pub mod config;
pub mod cpu;
pub mod cpu_bus;
pub mod debugger;
pub mod dma;
pub mod error;
pub mod input;
pub mod io;
pub mod memory;
pub mod ppu;
pub mod savestate;
pub mod snes;

pub use cartridge::{Cartridge, MapperType, Region};
pub use config::Config;
pub use debugger::{Debugger, Instruction};
pub use error::{CartridgeError, Error, Result, StateError};
pub use input::button;
pub use ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};
pub use snes::{CycleEvents, ResetKind, Snes};
pub use snes_apu::Interpolation;
