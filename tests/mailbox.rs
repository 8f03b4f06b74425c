mod common;

use common::{boot, lorom, program, store};
use snes_core::CycleEvents;

#[test]
fn ipl_rom_announces_ready_on_ports_0_and_1() {
    let mut snes = boot(lorom(1, &program(&[])));
    snes.run_frame();
    assert_eq!(snes.read8(0x00_2140), 0xAA);
    assert_eq!(snes.read8(0x00_2141), 0xBB);
    // Mirrors every four bytes up to $217F.
    assert_eq!(snes.read8(0x00_217C), 0xAA);
    assert_eq!(snes.read8(0x80_2141), 0xBB);
}

#[test]
fn cpu_port_write_is_published_at_the_end_of_its_cycle() {
    let code = program(&[vec![0xEA, 0xEA], store(0x2142, 0x5C)]);
    let mut snes = boot(lorom(1, &code));

    // NOP, NOP, LDA #: the fourth instruction is the store.
    let mut started = 0;
    while started < 4 {
        assert_eq!(snes.apu().smp_port(2), 0x00);
        if snes.run_cycle().contains(CycleEvents::INSTRUCTION) {
            started += 1;
        }
    }
    assert_eq!(snes.apu().smp_port(2), 0x5C);
    // The CPU side still reads what the SMP wrote.
    assert_ne!(snes.read8(0x00_2142), 0x5C);
}

#[test]
fn upload_handshake_with_the_ipl_rom() {
    let code = program(&[
        vec![
            0xAD, 0x40, 0x21, // wait: LDA $2140
            0xC9, 0xAA, //       CMP #$AA
            0xD0, 0xF9, //       BNE wait
        ],
        store(0x2142, 0x00),
        store(0x2143, 0x02),
        store(0x2141, 0x01),
        store(0x2140, 0xCC),
        vec![
            0xCD, 0x40, 0x21, // echo: CMP $2140
            0xD0, 0xFB, //       BNE echo
        ],
        store(0x0000, 0x01),
    ]);
    let mut snes = boot(lorom(1, &code));
    for _ in 0..3 {
        snes.run_frame();
    }
    assert_eq!(snes.memory().wram[0], 0x01);
    assert_eq!(snes.read8(0x00_2140), 0xCC);
}
