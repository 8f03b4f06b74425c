#![allow(dead_code)]

use snes_core::Snes;

/// ROM offset of the NMI handler ($00:C000).
pub const NMI_OFFSET: usize = 0x4000;
/// ROM offset of free data ($00:A000).
pub const DATA_OFFSET: usize = 0x2000;

/// LoROM image of `banks` 32 KiB banks. `code` starts at $00:8000 (the
/// reset vector) and both NMI vectors point at $00:C000. Bank `b > 0`
/// begins with the marker byte `0xA0 | b`.
pub fn lorom(banks: usize, code: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; banks * 0x8000];
    for b in 1..banks {
        rom[b * 0x8000] = 0xA0 | b as u8;
    }
    rom[..code.len()].copy_from_slice(code);
    // RTI
    rom[NMI_OFFSET] = 0x40;

    rom[0x7FC0..0x7FD5].copy_from_slice(b"SYNTHETIC TEST ROM   ");
    rom[0x7FD5] = 0x20;
    rom[0x7FD6] = 0x00;
    rom[0x7FD7] = 0x08;
    rom[0x7FD8] = 0x00;
    rom[0x7FD9] = 0x01;
    rom[0x7FDC..0x7FE0].copy_from_slice(&[0xFF, 0xFF, 0x00, 0x00]);

    // Native NMI, emulation NMI, reset.
    rom[0x7FEA..0x7FEC].copy_from_slice(&[0x00, 0xC0]);
    rom[0x7FFA..0x7FFC].copy_from_slice(&[0x00, 0xC0]);
    rom[0x7FFC..0x7FFE].copy_from_slice(&[0x00, 0x80]);
    rom
}

pub fn with_data(mut rom: Vec<u8>, offset: usize, data: &[u8]) -> Vec<u8> {
    rom[offset..offset + data.len()].copy_from_slice(data);
    rom
}

pub fn boot(rom: Vec<u8>) -> Snes {
    Snes::new(rom).expect("synthetic ROM loads")
}

/// `LDA #value; STA addr` in 8-bit accumulator mode.
pub fn store(addr: u16, value: u8) -> Vec<u8> {
    vec![0xA9, value, 0x8D, addr as u8, (addr >> 8) as u8]
}

/// Concatenates program fragments and appends `BRA *`.
pub fn program(parts: &[Vec<u8>]) -> Vec<u8> {
    let mut code: Vec<u8> = parts.concat();
    code.extend_from_slice(&[0x80, 0xFE]);
    code
}

/// Program whose main loop keeps rewriting CGRAM entry 0 from a counter in
/// direct page, so every frame looks different.
pub fn busy_program() -> Vec<u8> {
    program(&[
        store(0x2100, 0x0F),
        vec![
            0x9C, 0x21, 0x21, // loop: STZ $2121
            0xA5, 0x10, //       LDA $10
            0x8D, 0x22, 0x21, // STA $2122
            0xA5, 0x11, //       LDA $11
            0x8D, 0x22, 0x21, // STA $2122
            0xE6, 0x10, //       INC $10
            0xD0, 0x02, //       BNE +2
            0xE6, 0x11, //       INC $11
            0x8D, 0x40, 0x21, // STA $2140
            0x80, 0xE8, //       BRA loop
        ],
    ])
}
