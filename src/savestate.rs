use serde::{Deserialize, Serialize};
use snes_apu::{Apu, RAM_LEN};

use crate::cpu::Cpu;
use crate::dma::DmaController;
use crate::error::StateError;
use crate::input::Input;
use crate::io::CpuIo;
use crate::memory::{MemoryRegions, WRAM_SIZE};
use crate::ppu::{Ppu, DOTS_PER_LINE};
use crate::snes::SchedulerState;

pub const STATE_MAGIC: [u8; 4] = *b"SNSV";
pub const FORMAT_VERSION: u32 = 1;
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything needed to resume a machine, in bincode order. The first four
/// fields double as the header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveState {
    pub magic: [u8; 4],
    pub format_version: u32,
    pub core_version: String,
    pub rom_checksum: u32,
    pub cpu: Cpu,
    pub apu: Apu,
    pub ppu: Ppu,
    pub memory: MemoryRegions,
    pub dma: DmaController,
    pub io: CpuIo,
    pub input: Input,
    pub scheduler: SchedulerState,
}

/// Leading fields of a blob, readable even when the body layout changed.
#[derive(Debug, Deserialize)]
struct Header {
    magic: [u8; 4],
    format_version: u32,
    core_version: String,
}

impl SaveState {
    pub fn encode(&self) -> Result<Vec<u8>, StateError> {
        bincode::serialize(self).map_err(StateError::Encode)
    }

    /// Checks the header before decoding the body, so a blob from another
    /// version reports a version error rather than a decode error.
    pub fn decode(blob: &[u8]) -> Result<Self, StateError> {
        let header: Header = bincode::deserialize(blob).map_err(StateError::Decode)?;
        if header.magic != STATE_MAGIC {
            return Err(StateError::BadMagic);
        }
        if header.format_version != FORMAT_VERSION {
            return Err(StateError::VersionMismatch {
                found: header.format_version,
                expected: FORMAT_VERSION,
            });
        }
        if header.core_version != CORE_VERSION {
            return Err(StateError::CoreVersionMismatch {
                found: header.core_version,
                expected: CORE_VERSION.to_string(),
            });
        }
        bincode::deserialize(blob).map_err(StateError::Decode)
    }

    /// Compares the decoded state against the running configuration.
    pub fn validate(
        &self,
        rom_checksum: u32,
        sram_len: usize,
        lines_per_frame: u16,
    ) -> Result<(), StateError> {
        if self.rom_checksum != rom_checksum {
            return Err(StateError::RomMismatch {
                found: self.rom_checksum,
                expected: rom_checksum,
            });
        }

        let mut regions = vec![
            ("wram", self.memory.wram.len(), WRAM_SIZE),
            ("sram", self.memory.sram.len(), sram_len),
            ("aram", self.apu.ram().len(), RAM_LEN),
            (
                "lines_per_frame",
                self.ppu.lines_per_frame() as usize,
                lines_per_frame as usize,
            ),
        ];
        regions.extend(self.ppu.buffer_sizes());
        for (region, found, expected) in regions {
            if found != expected {
                return Err(StateError::SizeMismatch {
                    region,
                    found,
                    expected,
                });
            }
        }
        let counters = [
            ("ppu dot", self.ppu.dot(), DOTS_PER_LINE),
            ("ppu line", self.ppu.line(), lines_per_frame),
        ];
        for (counter, found, limit) in counters {
            if found >= limit {
                return Err(StateError::CounterOutOfRange { counter, found, limit });
            }
        }
        if !self.apu.is_well_formed() {
            return Err(StateError::SizeMismatch {
                region: "dsp",
                found: 0,
                expected: 0x80,
            });
        }
        Ok(())
    }
}
