use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CartridgeError;

/// Smallest image that can hold a LoROM header.
pub const MIN_ROM_SIZE: usize = 0x8000;

const COPIER_HEADER_LEN: usize = 512;

// Candidate header positions, 0x10 bytes before the $xxC0 title block.
const LOROM_HEADER: usize = 0x7FB0;
const HIROM_HEADER: usize = 0xFFB0;
const EXHIROM_HEADER: usize = 0x40FFB0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    Ntsc,
    Pal,
}

impl Region {
    pub fn lines_per_frame(self) -> u16 {
        match self {
            Region::Ntsc => 262,
            Region::Pal => 312,
        }
    }

    pub fn frames_per_second(self) -> u32 {
        match self {
            Region::Ntsc => 60,
            Region::Pal => 50,
        }
    }

    fn from_country(country: u8) -> Region {
        match country {
            0x02..=0x0C | 0x11 => Region::Pal,
            _ => Region::Ntsc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapperType {
    LoRom,
    HiRom,
    ExHiRom,
}

#[derive(Debug, Clone)]
pub struct CartridgeHeader {
    pub title: String,
    pub mapper_type: MapperType,
    pub map_mode: u8,
    pub rom_type: u8,
    pub rom_size: usize,
    pub ram_size: usize,
    pub country: u8,
    pub region: Region,
    pub developer: u8,
    pub version: u8,
    pub checksum: u16,
    pub checksum_complement: u16,
}

#[derive(Debug, Clone)]
pub struct Cartridge {
    rom: Vec<u8>,
    header: CartridgeHeader,
    has_copier_header: bool,
    fingerprint: u32,
}

impl Cartridge {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CartridgeError> {
        let data = fs::read(path)?;
        Self::load_from_bytes(data)
    }

    pub fn load_from_bytes(mut data: Vec<u8>) -> Result<Self, CartridgeError> {
        if data.is_empty() {
            return Err(CartridgeError::Empty);
        }

        let has_copier_header = data.len() % 1024 == COPIER_HEADER_LEN;
        if has_copier_header {
            data.drain(0..COPIER_HEADER_LEN);
        }

        if data.len() < MIN_ROM_SIZE {
            return Err(CartridgeError::TooSmall {
                len: data.len(),
                min: MIN_ROM_SIZE,
            });
        }

        let header = Self::parse_header(&data)?;
        let fingerprint = fnv1a(&data);

        log::info!(
            "Loaded \"{}\": {:?}, {} KiB ROM, {} KiB SRAM, {:?}",
            header.title,
            header.mapper_type,
            data.len() / 1024,
            header.ram_size / 1024,
            header.region
        );

        Ok(Cartridge {
            rom: data,
            header,
            has_copier_header,
            fingerprint,
        })
    }

    fn parse_header(rom: &[u8]) -> Result<CartridgeHeader, CartridgeError> {
        let offset = Self::locate_header(rom);

        // The map mode byte ($xxD5) decides the layout; the header position
        // only tells us where to look.
        let map_mode = rom[offset + 0x25];
        let mapper_type = match map_mode & 0x0F {
            0x0 => MapperType::LoRom,
            0x1 => MapperType::HiRom,
            0x5 => MapperType::ExHiRom,
            _ => return Err(CartridgeError::UnsupportedMapping { map_mode }),
        };

        let title = Self::extract_title(&rom[offset + 0x10..offset + 0x10 + 21]);
        let rom_type = rom[offset + 0x26];
        let rom_size = Self::decode_rom_size(rom[offset + 0x27]);
        let ram_size = Self::decode_ram_size(rom[offset + 0x28]);
        let country = rom[offset + 0x29];
        let developer = rom[offset + 0x2A];
        let version = rom[offset + 0x2B];
        let checksum_complement = u16::from_le_bytes([rom[offset + 0x2C], rom[offset + 0x2D]]);
        let checksum = u16::from_le_bytes([rom[offset + 0x2E], rom[offset + 0x2F]]);

        if checksum ^ checksum_complement != 0xFFFF {
            log::warn!(
                "Header checksum pair is inconsistent: 0x{:04X} ^ 0x{:04X} != 0xFFFF",
                checksum,
                checksum_complement
            );
        }
        let calculated = Self::calculate_rom_checksum(rom);
        if calculated != checksum {
            log::warn!(
                "Stored checksum (0x{:04X}) doesn't match calculated checksum (0x{:04X})",
                checksum,
                calculated
            );
        }
        if rom_type & 0xF0 != 0 {
            log::warn!("ROM type 0x{:02X} declares a coprocessor, which is not emulated", rom_type);
        }

        Ok(CartridgeHeader {
            title,
            mapper_type,
            map_mode,
            rom_type,
            rom_size,
            ram_size,
            country,
            region: Region::from_country(country),
            developer,
            version,
            checksum,
            checksum_complement,
        })
    }

    /// Picks the most plausible of the LoROM, HiROM and ExHiROM header slots.
    fn locate_header(rom: &[u8]) -> usize {
        let lorom_score = Self::score_header(rom, LOROM_HEADER);
        let hirom_score = Self::score_header(rom, HIROM_HEADER);
        let exhirom_score = Self::score_header(rom, EXHIROM_HEADER);

        if exhirom_score >= hirom_score && exhirom_score >= lorom_score && exhirom_score > 6 {
            EXHIROM_HEADER
        } else if hirom_score > lorom_score && hirom_score > 4 {
            HIROM_HEADER
        } else {
            if lorom_score <= 4 {
                log::warn!("Low header scores, defaulting to LoROM");
            }
            LOROM_HEADER
        }
    }

    fn score_header(rom: &[u8], offset: usize) -> u32 {
        if offset + 0x2F >= rom.len() {
            return 0;
        }

        let mut score: u32 = 0;

        let checksum_complement = u16::from_le_bytes([rom[offset + 0x2C], rom[offset + 0x2D]]);
        let checksum = u16::from_le_bytes([rom[offset + 0x2E], rom[offset + 0x2F]]);
        if checksum ^ checksum_complement == 0xFFFF {
            score += 8;
        }

        let map_mode = rom[offset + 0x25];
        if matches!(map_mode & 0xEF, 0x20 | 0x21 | 0x25) {
            score += 2;
        }

        if rom[offset + 0x26] <= 0x37 {
            score += 2;
        }

        let rom_size = rom[offset + 0x27];
        if (0x08..=0x0D).contains(&rom_size) {
            score += 2;
            let expected_size = 1024usize << rom_size;
            if rom.len() >= expected_size / 2 && rom.len() <= expected_size * 2 {
                score += 2;
            }
        }

        let ram_size = rom[offset + 0x28];
        if ram_size <= 0x08 || ram_size == 0xFF {
            score += 1;
        }

        let country = rom[offset + 0x29];
        if country <= 0x11 || country == 0xFF {
            score += 1;
        }

        let title_valid = rom[offset + 0x10..offset + 0x10 + 21]
            .iter()
            .all(|&b| (0x20..=0x7E).contains(&b) || b == 0x00);
        if title_valid {
            score += 2;
        }

        if rom[offset + 0x26] == 0xFF || rom[offset + 0x2A] == 0xFF {
            score = score.saturating_sub(3);
        }

        score
    }

    fn extract_title(title_bytes: &[u8]) -> String {
        let mut title = String::new();
        for &byte in title_bytes {
            if byte == 0x00 {
                break;
            } else if (0x20..=0x7E).contains(&byte) {
                title.push(byte as char);
            } else if byte >= 0x80 {
                title.push('?');
            }
        }
        title.trim().to_string()
    }

    fn decode_rom_size(size_code: u8) -> usize {
        if size_code <= 0x0F {
            1024 << size_code
        } else {
            0
        }
    }

    /// `1 << N` KiB, 0 meaning no RAM. Some headers use 0xFF for none.
    fn decode_ram_size(size_code: u8) -> usize {
        if size_code == 0x00 || size_code > 0x08 {
            return 0;
        }
        1024usize << size_code
    }

    fn calculate_rom_checksum(rom: &[u8]) -> u16 {
        rom.iter().fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub fn mapper(&self) -> MapperType {
        self.header.mapper_type
    }

    pub fn region(&self) -> Region {
        self.header.region
    }

    pub fn ram_size(&self) -> usize {
        self.header.ram_size
    }

    pub fn had_copier_header(&self) -> bool {
        self.has_copier_header
    }

    /// Hash of the ROM contents, stored in save states to reject blobs taken
    /// from another game.
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }

    /// Reads ROM at a 24-bit system address, or `None` when the address does
    /// not select ROM under this mapping.
    pub fn read(&self, addr: u32) -> Option<u8> {
        self.map_rom(addr).map(|offset| self.rom[offset])
    }

    /// Cartridge offset selected by a system address. Offsets past the end of
    /// the image mirror.
    pub fn map_rom(&self, addr: u32) -> Option<usize> {
        let bank = (addr >> 16) & 0xFF;
        let offset = (addr & 0xFFFF) as usize;
        let linear = match self.header.mapper_type {
            MapperType::LoRom => Self::map_lorom_address(bank, offset)?,
            MapperType::HiRom => Self::map_hirom_address(bank, offset)?,
            MapperType::ExHiRom => Self::map_exhirom_address(bank, offset)?,
        };
        Some(linear % self.rom.len())
    }

    fn map_lorom_address(bank: u32, offset: usize) -> Option<usize> {
        let bank = bank & 0x7F;
        match bank {
            0x7E | 0x7F => None,
            _ if offset >= 0x8000 => Some(bank as usize * 0x8000 + offset - 0x8000),
            // Lower halves of $40-$6F mirror the upper halves.
            0x40..=0x6F => Some(bank as usize * 0x8000 + offset),
            _ => None,
        }
    }

    fn map_hirom_address(bank: u32, offset: usize) -> Option<usize> {
        match bank {
            0x7E | 0x7F => None,
            0x40..=0x7D | 0xC0..=0xFF => Some((bank & 0x3F) as usize * 0x10000 + offset),
            _ if offset >= 0x8000 => Some((bank & 0x3F) as usize * 0x10000 + offset),
            _ => None,
        }
    }

    fn map_exhirom_address(bank: u32, offset: usize) -> Option<usize> {
        match bank {
            0x7E | 0x7F => None,
            0xC0..=0xFF => Some((bank & 0x3F) as usize * 0x10000 + offset),
            0x40..=0x7D => Some(0x400000 + (bank & 0x3F) as usize * 0x10000 + offset),
            0x80..=0xBF if offset >= 0x8000 => Some((bank & 0x3F) as usize * 0x10000 + offset),
            0x00..=0x3F if offset >= 0x8000 => {
                Some(0x400000 + (bank & 0x3F) as usize * 0x10000 + offset)
            }
            _ => None,
        }
    }

    /// SRAM offset selected by a system address, if the cartridge has SRAM.
    pub fn map_sram(&self, addr: u32) -> Option<usize> {
        let sram_len = self.header.ram_size;
        if sram_len == 0 {
            return None;
        }
        let bank = (addr >> 16) & 0xFF;
        let offset = (addr & 0xFFFF) as usize;
        let linear = match self.header.mapper_type {
            MapperType::LoRom => match bank {
                0x70..=0x7D | 0xF0..=0xFF if offset < 0x8000 => {
                    (bank & 0x0F) as usize * 0x8000 + offset
                }
                _ => return None,
            },
            MapperType::HiRom | MapperType::ExHiRom => match bank {
                0x20..=0x3F | 0xA0..=0xBF if (0x6000..0x8000).contains(&offset) => {
                    (bank & 0x1F) as usize * 0x2000 + offset - 0x6000
                }
                _ => return None,
            },
        };
        Some(linear % sram_len)
    }
}

fn fnv1a(data: &[u8]) -> u32 {
    data.iter().fold(0x811C_9DC5u32, |hash, &b| {
        (hash ^ b as u32).wrapping_mul(0x0100_0193)
    })
}
