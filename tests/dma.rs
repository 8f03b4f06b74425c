mod common;

use common::{boot, lorom, program, store, with_data, DATA_OFFSET};
use snes_core::CycleEvents;

const PAYLOAD: [u8; 16] = [
    0x10, 0x32, 0x54, 0x76, 0x98, 0xBA, 0xDC, 0xFE, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD,
    0xEF,
];

/// Copies PAYLOAD from $00:A000 to VRAM word 0 on channel 0.
fn vram_dma_program() -> Vec<u8> {
    program(&[
        store(0x2115, 0x80),
        vec![0x9C, 0x16, 0x21, 0x9C, 0x17, 0x21], // STZ $2116; STZ $2117
        store(0x4300, 0x01),
        store(0x4301, 0x18),
        store(0x4302, 0x00),
        store(0x4303, 0xA0),
        store(0x4304, 0x00),
        store(0x4305, PAYLOAD.len() as u8),
        store(0x4306, 0x00),
        store(0x420B, 0x01),
        vec![0xEA], // NOP
    ])
}

#[test]
fn general_dma_steals_two_cycles_per_byte() {
    let rom = with_data(lorom(1, &vram_dma_program()), DATA_OFFSET, &PAYLOAD);
    let mut snes = boot(rom);

    let mut guard = 0;
    let pc_at_start = loop {
        let events = snes.run_cycle();
        if events.contains(CycleEvents::DMA_STARTED) {
            assert!(events.contains(CycleEvents::CPU_STALLED));
            break snes.cpu().state.full_pc();
        }
        guard += 1;
        assert!(guard < 1000, "DMA never started");
    };

    let mut stalled = 1;
    loop {
        let events = snes.run_cycle();
        if events.contains(CycleEvents::CPU_STALLED) {
            assert_eq!(snes.cpu().state.full_pc(), pc_at_start);
            stalled += 1;
            continue;
        }
        assert!(events.contains(CycleEvents::INSTRUCTION));
        break;
    }
    assert_eq!(stalled, PAYLOAD.len() * 2);

    // The CPU resumed at the NOP right after STA $420B.
    let nop = snes.read8(pc_at_start);
    assert_eq!(nop, 0xEA);
    assert_eq!(&snes.ppu().vram()[..PAYLOAD.len()], &PAYLOAD[..]);
    assert_eq!(snes.dma().channels[0].count, 0);
    assert_eq!(snes.dma().channels[0].a_address, 0xA000 + PAYLOAD.len() as u16);
}

#[test]
fn dma_cannot_read_system_registers_on_the_a_bus() {
    // Source $00:2140 (APU port) is blocked and reads open bus instead.
    let code = program(&[
        vec![
            0xAD, 0x40, 0x21, // wait: LDA $2140
            0xC9, 0xAA, //       CMP #$AA
            0xD0, 0xF9, //       BNE wait
        ],
        store(0x2115, 0x80),
        vec![0x9C, 0x16, 0x21, 0x9C, 0x17, 0x21],
        store(0x4300, 0x01),
        store(0x4301, 0x18),
        store(0x4302, 0x40),
        store(0x4303, 0x21),
        store(0x4304, 0x00),
        store(0x4305, 0x02),
        store(0x4306, 0x00),
        store(0x420B, 0x01),
    ]);
    let mut snes = boot(lorom(1, &code));
    snes.run_frame();
    snes.run_frame();
    assert_eq!(snes.dma().channels[0].count, 0);
    let vram = snes.ppu().vram();
    assert_ne!(vram[0], 0xAA);
    assert_ne!(vram[1], 0xAA);
}
