use super::*;

/// Steps the APU in small slices, committing the mailbox after each one the
/// way the scheduler does, until the CPU side sees `value` on `port`.
fn run_until_port(apu: &mut Apu, port: u8, value: u8) {
    for _ in 0..20_000 {
        apu.advance(16);
        apu.commit_ports();
        if apu.cpu_read_port(port) == value {
            return;
        }
    }
    panic!("port {port} never read {value:#04x}");
}

fn send(apu: &mut Apu, writes: &[(u8, u8)]) {
    for &(port, value) in writes {
        apu.cpu_write_port(port, value);
    }
    apu.commit_ports();
}

/// Runs the IPL upload protocol from the CPU side.
fn upload(apu: &mut Apu, dest: u16, data: &[u8], entry: u16) {
    run_until_port(apu, 0, 0xAA);
    run_until_port(apu, 1, 0xBB);

    send(apu, &[(1, 0x01), (2, dest as u8), (3, (dest >> 8) as u8), (0, 0xCC)]);
    run_until_port(apu, 0, 0xCC);

    for (i, &byte) in data.iter().enumerate() {
        let index = i as u8;
        send(apu, &[(1, byte), (0, index)]);
        run_until_port(apu, 0, index);
    }

    let kick = (data.len() as u8).wrapping_add(1);
    send(apu, &[(1, 0x00), (2, entry as u8), (3, (entry >> 8) as u8), (0, kick)]);
    run_until_port(apu, 0, kick);
}

#[test]
fn ipl_rom_announces_ready() {
    let mut apu = Apu::new();
    assert_eq!(apu.smp().pc, 0xFFC0);
    run_until_port(&mut apu, 0, 0xAA);
    run_until_port(&mut apu, 1, 0xBB);
    // The clear loop zeroes the first page below the stack.
    assert!(apu.ram()[0x01..=0xEF].iter().all(|&b| b == 0));
}

#[test]
fn uploaded_program_runs() {
    let mut apu = Apu::new();
    // MOV A,#$5A ; MOV $F7,A ; BRA *
    let program = [0xE8, 0x5A, 0xC4, 0xF7, 0x2F, 0xFE];
    upload(&mut apu, 0x0200, &program, 0x0200);
    assert_eq!(&apu.ram()[0x200..0x206], &program);
    run_until_port(&mut apu, 3, 0x5A);
}

#[test]
fn mailbox_writes_wait_for_commit() {
    let mut apu = Apu::new();
    apu.cpu_write_port(2, 0x42);
    assert_eq!(apu.smp_port(2), 0x00);
    assert_eq!(apu.smp_read(0xF6), 0x00);
    apu.commit_ports();
    assert_eq!(apu.smp_port(2), 0x42);
    assert_eq!(apu.smp_read(0xF6), 0x42);

    apu.smp_write(0xF5, 0x99);
    assert_eq!(apu.cpu_read_port(1), 0x00);
    apu.commit_ports();
    assert_eq!(apu.cpu_read_port(1), 0x99);
    // Each direction has its own latch.
    assert_eq!(apu.smp_port(1), 0x00);
}

#[test]
fn control_clears_input_ports() {
    let mut apu = Apu::new();
    send(&mut apu, &[(0, 1), (1, 2), (2, 3), (3, 4)]);
    apu.smp_write(0xF1, 0x90);
    assert_eq!(apu.smp_port(0), 0);
    assert_eq!(apu.smp_port(1), 0);
    assert_eq!(apu.smp_port(2), 3);
    apu.smp_write(0xF1, 0xA0);
    assert_eq!(apu.smp_port(3), 0);
}

#[test]
fn ipl_rom_overlay_can_be_disabled() {
    let mut apu = Apu::new();
    apu.smp_write(0xFFC0, 0x12);
    assert_eq!(apu.smp_read(0xFFC0), 0xCD);
    apu.smp_write(0xF1, 0x00);
    assert_eq!(apu.smp_read(0xFFC0), 0x12);
}

#[test]
fn timers_count_when_enabled() {
    let mut apu = Apu::new();
    apu.smp_write(0xFA, 2);
    apu.smp_write(0xFC, 4);
    apu.smp_write(0xF1, 0x85);
    apu.mem.tick(128 * 2 * 3);
    assert_eq!(apu.smp_read(0xFD), 3);
    // Reading clears the counter.
    assert_eq!(apu.smp_read(0xFD), 0);
    // Timer 2 runs eight times faster: 768 / 16 / 4 steps.
    assert_eq!(apu.smp_read(0xFF), 12 & 0x0F);
    // Timer 1 was never enabled.
    assert_eq!(apu.smp_read(0xFE), 0);
}

#[test]
fn dsp_registers_through_address_port() {
    let mut apu = Apu::new();
    apu.smp_write(0xF2, 0x0C);
    apu.smp_write(0xF3, 0x7F);
    assert_eq!(apu.smp_read(0xF3), 0x7F);
    assert_eq!(apu.dsp().read(0x0C), 0x7F);
    assert_eq!(apu.smp_read(0xF2), 0x0C);
}

#[test]
fn dsp_produces_one_sample_per_32_cycles() {
    let mut apu = Apu::new();
    let before = apu.dsp().samples_generated();
    apu.mem.tick(32 * 10 + 31);
    assert_eq!(apu.dsp().samples_generated() - before, 10);
    apu.mem.tick(1);
    assert_eq!(apu.dsp().samples_generated() - before, 11);
}

#[test]
fn advance_catches_up_whole_instructions() {
    let mut apu = Apu::new();
    apu.advance(100);
    assert!(apu.cycles() >= 100);
    let over = apu.cycles() - 100;
    assert!(over < 12);
    apu.advance(50);
    assert!(apu.cycles() >= 150);
}

#[test]
fn soft_reset_keeps_ram() {
    let mut apu = Apu::new();
    apu.smp_write(0x0300, 0x77);
    apu.reset(false);
    assert_eq!(apu.ram()[0x300], 0x77);
    apu.reset(true);
    assert_eq!(apu.ram()[0x300], 0x00);
    assert_eq!(apu.smp().pc, 0xFFC0);
}

#[test]
fn serialized_state_resumes_identically() {
    let mut apu = Apu::new();
    apu.advance(5_000);
    apu.commit_ports();
    let bytes = bincode::serialize(&apu).unwrap();
    let mut restored: Apu = bincode::deserialize(&bytes).unwrap();
    assert!(restored.is_well_formed());

    apu.advance(20_000);
    restored.advance(20_000);
    assert_eq!(apu.cycles(), restored.cycles());
    assert_eq!(apu.ram(), restored.ram());
    let mut a = [0i16; 256];
    let mut b = [0i16; 256];
    assert_eq!(apu.read_samples(&mut a), restored.read_samples(&mut b));
    assert_eq!(a, b);
}
