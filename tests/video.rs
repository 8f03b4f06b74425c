mod common;

use common::{boot, lorom, program, store, with_data, DATA_OFFSET};
use snes_core::{button, SCREEN_HEIGHT, SCREEN_WIDTH};

#[test]
fn empty_scene_shows_the_backdrop_everywhere() {
    let code = program(&[
        vec![0x9C, 0x21, 0x21], // STZ $2121
        store(0x2122, 0xE0),
        store(0x2122, 0x03),
        store(0x2105, 0x00),
        store(0x212C, 0x01),
        store(0x2100, 0x0F),
    ]);
    let mut snes = boot(lorom(1, &code));
    snes.run_frame();
    snes.run_frame();

    let frame = snes.frame_buffer();
    assert_eq!(frame.len(), SCREEN_WIDTH * SCREEN_HEIGHT);
    assert!(frame.iter().all(|&p| p == 0xFF00_FF00));
}

#[test]
fn forced_blank_frame_is_black() {
    let mut snes = boot(lorom(1, &program(&[])));
    snes.run_frame();
    assert!(snes.frame_buffer().iter().all(|&p| p == 0xFF00_0000));
}

#[test]
fn hdma_changes_brightness_per_line() {
    // Direct mode, one register: line 1 gets $0F, line 2 gets $07, then the
    // table ends and $07 holds for the rest of the frame.
    let table = [0x01, 0x0F, 0x01, 0x07, 0x00];
    let code = program(&[
        vec![0x9C, 0x21, 0x21], // STZ $2121
        store(0x2122, 0x1F),
        store(0x2122, 0x00),
        store(0x4300, 0x00),
        store(0x4301, 0x00),
        store(0x4302, 0x00),
        store(0x4303, 0xA0),
        store(0x4304, 0x00),
        store(0x420C, 0x01),
    ]);
    let rom = with_data(lorom(1, &code), DATA_OFFSET, &table);
    let mut snes = boot(rom);
    snes.run_frame();
    snes.run_frame();

    let row = |y: usize| snes.frame_buffer()[y * SCREEN_WIDTH..(y + 1) * SCREEN_WIDTH].to_vec();
    assert!(row(0).iter().all(|&p| p == 0xFFFF_0000));
    assert!(row(1).iter().all(|&p| p == 0xFF7B_0000));
    assert!(row(SCREEN_HEIGHT - 1).iter().all(|&p| p == 0xFF7B_0000));
    assert!(snes.dma().channels[0].terminated);
}

#[test]
fn auto_joypad_read_latches_buttons_at_vblank() {
    // NMITIMEN: auto joypad read on.
    let mut snes = boot(lorom(1, &program(&[store(0x4200, 0x01)])));
    snes.set_input(0, button::A | button::START);
    snes.run_frame();
    // Shift-out order: Start is bit 12, A is bit 7.
    assert_eq!(snes.read8(0x00_4218), 0x80);
    assert_eq!(snes.read8(0x00_4219), 0x10);
    assert_eq!(snes.read8(0x00_421A), 0);
}
