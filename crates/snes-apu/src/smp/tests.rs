use super::*;

struct RamBus {
    ram: Vec<u8>,
}

impl RamBus {
    fn with_program(program: &[u8]) -> Self {
        let mut ram = vec![0; 0x10000];
        ram[0x0200..0x0200 + program.len()].copy_from_slice(program);
        ram[0xFFFE] = 0x00;
        ram[0xFFFF] = 0x02;
        Self { ram }
    }
}

impl SmpBus for RamBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.ram[addr as usize] = value;
    }
}

fn boot(program: &[u8]) -> (Smp, RamBus) {
    let mut bus = RamBus::with_program(program);
    let mut smp = Smp::new();
    smp.reset(&mut bus);
    (smp, bus)
}

#[test]
fn reset_loads_vector() {
    let (smp, _) = boot(&[]);
    assert_eq!(smp.pc, 0x0200);
    assert_eq!(smp.sp, 0xFD);
}

#[test]
fn mov_immediate_sets_flags() {
    // MOV A,#$00 ; MOV X,#$80
    let (mut smp, mut bus) = boot(&[0xE8, 0x00, 0xCD, 0x80]);
    assert_eq!(smp.step(&mut bus), 2);
    assert!(smp.psw.contains(Psw::ZERO));
    assert_eq!(smp.step(&mut bus), 2);
    assert_eq!(smp.x, 0x80);
    assert!(smp.psw.contains(Psw::NEGATIVE));
    assert!(!smp.psw.contains(Psw::ZERO));
}

#[test]
fn adc_sets_carry_and_overflow() {
    // SETC ; MOV A,#$7F ; ADC A,#$00
    let (mut smp, mut bus) = boot(&[0x80, 0xE8, 0x7F, 0x88, 0x00]);
    smp.step(&mut bus);
    smp.step(&mut bus);
    smp.step(&mut bus);
    assert_eq!(smp.a, 0x80);
    assert!(smp.psw.contains(Psw::OVERFLOW));
    assert!(smp.psw.contains(Psw::HALF_CARRY));
    assert!(!smp.psw.contains(Psw::CARRY));
}

#[test]
fn sbc_borrows() {
    // SETC ; MOV A,#$10 ; SBC A,#$20
    let (mut smp, mut bus) = boot(&[0x80, 0xE8, 0x10, 0xA8, 0x20]);
    for _ in 0..3 {
        smp.step(&mut bus);
    }
    assert_eq!(smp.a, 0xF0);
    assert!(!smp.psw.contains(Psw::CARRY));
    assert!(smp.psw.contains(Psw::NEGATIVE));
}

#[test]
fn taken_branch_costs_two_extra_cycles() {
    // MOV A,#$00 ; BEQ +2 ; BNE +2
    let (mut smp, mut bus) = boot(&[0xE8, 0x00, 0xF0, 0x02, 0x00, 0x00, 0xD0, 0x02]);
    smp.step(&mut bus);
    assert_eq!(smp.step(&mut bus), 4);
    assert_eq!(smp.pc, 0x0206);
    assert_eq!(smp.step(&mut bus), 2);
    assert_eq!(smp.pc, 0x0208);
}

#[test]
fn dbnz_y_loops_until_zero() {
    // MOV Y,#$03 ; loop: DBNZ Y,loop
    let (mut smp, mut bus) = boot(&[0x8D, 0x03, 0xFE, 0xFE]);
    smp.step(&mut bus);
    assert_eq!(smp.step(&mut bus), 6);
    assert_eq!(smp.step(&mut bus), 6);
    assert_eq!(smp.step(&mut bus), 4);
    assert_eq!(smp.y, 0);
    assert_eq!(smp.pc, 0x0204);
}

#[test]
fn mul_and_div() {
    // MOV A,#$12 ; MOV Y,#$34 ; MUL YA
    let (mut smp, mut bus) = boot(&[0xE8, 0x12, 0x8D, 0x34, 0xCF]);
    smp.step(&mut bus);
    smp.step(&mut bus);
    assert_eq!(smp.step(&mut bus), 9);
    assert_eq!(smp.ya(), 0x12 * 0x34);

    // YA = $0123, X = $10 -> A = $12, Y = $03
    let (mut smp, mut bus) = boot(&[0xE8, 0x23, 0x8D, 0x01, 0xCD, 0x10, 0x9E]);
    for _ in 0..3 {
        smp.step(&mut bus);
    }
    assert_eq!(smp.step(&mut bus), 12);
    assert_eq!(smp.a, 0x12);
    assert_eq!(smp.y, 0x03);
    assert!(!smp.psw.contains(Psw::OVERFLOW));
}

#[test]
fn tcall_uses_vector_table() {
    // TCALL 1 reads its target from $FFDC
    let (mut smp, mut bus) = boot(&[0x11]);
    bus.ram[0xFFDC] = 0x34;
    bus.ram[0xFFDD] = 0x12;
    assert_eq!(smp.step(&mut bus), 8);
    assert_eq!(smp.pc, 0x1234);
    assert_eq!(bus.ram[0x01FD], 0x02);
    assert_eq!(bus.ram[0x01FC], 0x01);
}

#[test]
fn call_and_ret_round_trip() {
    // CALL $0300 ; ... at $0300: RET
    let (mut smp, mut bus) = boot(&[0x3F, 0x00, 0x03]);
    bus.ram[0x0300] = 0x6F;
    smp.step(&mut bus);
    assert_eq!(smp.pc, 0x0300);
    assert_eq!(smp.step(&mut bus), 5);
    assert_eq!(smp.pc, 0x0203);
    assert_eq!(smp.sp, 0xFD);
}

#[test]
fn direct_page_flag_selects_page_one() {
    // SETP ; MOV A,#$5A ; MOV $10,A
    let (mut smp, mut bus) = boot(&[0x40, 0xE8, 0x5A, 0xC4, 0x10]);
    for _ in 0..3 {
        smp.step(&mut bus);
    }
    assert_eq!(bus.ram[0x0110], 0x5A);
    assert_eq!(bus.ram[0x0010], 0x00);
}

#[test]
fn set1_clr1_and_bbs() {
    // SET1 $20.3 ; BBS $20.3,+1 ; NOP ; CLR1 $20.3
    let (mut smp, mut bus) = boot(&[0x62, 0x20, 0x63, 0x20, 0x01, 0x00, 0x72, 0x20]);
    smp.step(&mut bus);
    assert_eq!(bus.ram[0x20], 0x08);
    assert_eq!(smp.step(&mut bus), 7);
    assert_eq!(smp.pc, 0x0206);
    smp.step(&mut bus);
    assert_eq!(bus.ram[0x20], 0x00);
}

#[test]
fn word_ops_update_ya() {
    // MOVW YA,$10 ; INCW $10 ; ADDW YA,$10
    let (mut smp, mut bus) = boot(&[0xBA, 0x10, 0x3A, 0x10, 0x7A, 0x10]);
    bus.ram[0x10] = 0xFF;
    bus.ram[0x11] = 0x00;
    smp.step(&mut bus);
    assert_eq!(smp.ya(), 0x00FF);
    smp.step(&mut bus);
    assert_eq!(bus.ram[0x10], 0x00);
    assert_eq!(bus.ram[0x11], 0x01);
    smp.step(&mut bus);
    assert_eq!(smp.ya(), 0x01FF);
    assert!(!smp.psw.contains(Psw::CARRY));
}

#[test]
fn stop_halts_but_keeps_consuming_cycles() {
    let (mut smp, mut bus) = boot(&[0xFF]);
    smp.step(&mut bus);
    assert!(smp.halted);
    let pc = smp.pc;
    assert_eq!(smp.step(&mut bus), 2);
    assert_eq!(smp.pc, pc);
}

#[test]
fn cycle_table_is_complete() {
    assert!(CYCLE_TABLE.iter().all(|&c| c >= 2));
}
