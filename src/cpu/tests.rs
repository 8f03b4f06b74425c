use super::opcodes::OPCODES;
use super::*;

struct TestBus {
    memory: Vec<u8>,
}

impl TestBus {
    fn new() -> Self {
        let mut bus = Self {
            memory: vec![0; 0x100_0000],
        };
        bus.set_vector(VECTOR_RESET, 0x8000);
        bus.set_vector(VECTOR_NATIVE_NMI, 0x9000);
        bus.set_vector(VECTOR_NATIVE_IRQ, 0x9100);
        bus.set_vector(VECTOR_NATIVE_BRK, 0x9200);
        bus.set_vector(VECTOR_EMU_IRQ, 0x9300);
        bus.set_vector(VECTOR_EMU_NMI, 0x9400);
        bus.set_vector(VECTOR_NATIVE_COP, 0x9500);
        bus.set_vector(VECTOR_EMU_COP, 0x9600);
        bus
    }

    fn set_vector(&mut self, vector: u32, target: u16) {
        self.memory[vector as usize] = target as u8;
        self.memory[vector as usize + 1] = (target >> 8) as u8;
    }

    fn load(&mut self, addr: u32, bytes: &[u8]) {
        let start = addr as usize;
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl CpuBus for TestBus {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.memory[(addr & 0xFF_FFFF) as usize]
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        self.memory[(addr & 0xFF_FFFF) as usize] = value;
    }
}

fn boot(program: &[u8]) -> (Cpu, TestBus) {
    let mut bus = TestBus::new();
    bus.load(0x8000, program);
    let mut cpu = Cpu::new();
    cpu.reset(&mut bus);
    (cpu, bus)
}

/// Prefix that switches to native mode: CLC; XCE.
const NATIVE: [u8; 2] = [0x18, 0xFB];

fn boot_native(program: &[u8]) -> (Cpu, TestBus) {
    let mut code = NATIVE.to_vec();
    code.extend_from_slice(program);
    let (mut cpu, mut bus) = boot(&code);
    cpu.step_instruction(&mut bus);
    cpu.step_instruction(&mut bus);
    drain(&mut cpu, &mut bus);
    assert!(!cpu.state.emulation_mode);
    (cpu, bus)
}

fn drain(cpu: &mut Cpu, bus: &mut TestBus) {
    while !cpu.at_instruction_boundary() {
        cpu.tick(bus);
    }
}

fn steps(cpu: &mut Cpu, bus: &mut TestBus, n: usize) -> Vec<u32> {
    (0..n).map(|_| cpu.step_instruction(bus)).collect()
}

#[test]
fn reset_enters_emulation_mode_at_vector() {
    let (cpu, _) = boot(&[]);
    let s = &cpu.state;
    assert_eq!(s.pc, 0x8000);
    assert_eq!(s.pb, 0);
    assert!(s.emulation_mode);
    assert!(s.memory_is_8bit() && s.index_is_8bit());
    assert_eq!(s.sp & 0xFF00, 0x0100);
}

#[test]
fn clock_advances_by_instruction_cost() {
    // LDA $80FF,X with X=1 crosses a page: 4 + 1.
    let (mut cpu, mut bus) = boot(&[0xA2, 0x01, 0xBD, 0xFF, 0x80]);
    let costs = steps(&mut cpu, &mut bus, 2);
    assert_eq!(costs, vec![2, 5]);
    drain(&mut cpu, &mut bus);
    assert_eq!(cpu.cycles(), 7);
    assert_eq!(cpu.instructions(), 2);
}

#[test]
fn every_opcode_costs_at_least_its_table_entry() {
    for opcode in 0..=255u8 {
        let (mut cpu, mut bus) = boot_native(&[opcode, 0x00, 0x00, 0x00]);
        let before = cpu.cycles();
        let cost = cpu.step_instruction(&mut bus);
        drain(&mut cpu, &mut bus);
        let base = OPCODES[opcode as usize].cycles as u32;
        assert!(cost >= base, "opcode {opcode:02X}: {cost} < {base}");
        assert!(cost <= base + 3, "opcode {opcode:02X}: {cost} too slow");
        assert_eq!(cpu.cycles() - before, cost as u64, "opcode {opcode:02X}");
    }
}

#[test]
fn index_page_cross_adds_a_cycle_only_when_crossing() {
    // LDX #1; LDA $8000,X; LDA $80FF,X; STA $80FF,X
    let (mut cpu, mut bus) = boot(&[0xA2, 0x01, 0xBD, 0x00, 0x80, 0xBD, 0xFF, 0x80, 0x9D, 0xFF, 0x80]);
    assert_eq!(steps(&mut cpu, &mut bus, 4), vec![2, 4, 5, 5]);
}

#[test]
fn sixteen_bit_accumulator_and_index_penalties() {
    // REP #$30; LDA #$1234; LDX #$0001; LDA $8000,X; INC $10; ASL A; PHA; PLA
    let (mut cpu, mut bus) = boot_native(&[
        0xC2, 0x30, 0xA9, 0x34, 0x12, 0xA2, 0x01, 0x00, 0xBD, 0x00, 0x80, 0xE6, 0x10, 0x0A, 0x48, 0x68,
    ]);
    let costs = steps(&mut cpu, &mut bus, 8);
    assert_eq!(costs, vec![3, 3, 3, 6, 7, 2, 4, 5]);
    // $8001/$8002 hold FB C2, shifted left once.
    assert_eq!(cpu.state.a, 0x85F6);
}

#[test]
fn direct_page_low_byte_costs_a_cycle() {
    // LDA #$01; XBA; LDA #$01 -> A=$0101; TCD; LDA $10
    let (mut cpu, mut bus) = boot_native(&[0xA9, 0x01, 0xEB, 0xA9, 0x01, 0x5B, 0xA5, 0x10]);
    bus.memory[0x0111] = 0x77;
    let costs = steps(&mut cpu, &mut bus, 5);
    assert_eq!(cpu.state.dp, 0x0101);
    assert_eq!(costs[4], 4);
    assert_eq!(cpu.state.a & 0xFF, 0x77);
}

#[test]
fn branches_pay_for_taken_and_page_cross_in_emulation() {
    let mut bus = TestBus::new();
    // at $80F0: LDA #$01; BEQ +2 (not taken); BNE +$10 (taken, crosses to $8106)
    bus.load(0x80F0, &[0xA9, 0x01, 0xF0, 0x02, 0xD0, 0x10]);
    bus.set_vector(VECTOR_RESET, 0x80F0);
    let mut cpu = Cpu::new();
    cpu.reset(&mut bus);
    assert_eq!(steps(&mut cpu, &mut bus, 3), vec![2, 2, 4]);
    assert_eq!(cpu.state.pc, 0x8106);
}

#[test]
fn native_branch_ignores_page_cross() {
    let mut bus = TestBus::new();
    bus.load(0x80F0, &[0x18, 0xFB, 0x80, 0x20]);
    bus.set_vector(VECTOR_RESET, 0x80F0);
    let mut cpu = Cpu::new();
    cpu.reset(&mut bus);
    assert_eq!(steps(&mut cpu, &mut bus, 3), vec![2, 2, 3]);
    assert_eq!(cpu.state.pc, 0x8114);
}

#[test]
fn decimal_adc_and_sbc_8bit() {
    // SED; CLC; LDA #$09; ADC #$01; LDA #$99; ADC #$01
    let (mut cpu, mut bus) = boot(&[0xF8, 0x18, 0xA9, 0x09, 0x69, 0x01, 0xA9, 0x99, 0x69, 0x01]);
    steps(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.state.a & 0xFF, 0x10);
    assert!(!cpu.state.p.contains(StatusFlags::CARRY));
    steps(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.state.a & 0xFF, 0x00);
    assert!(cpu.state.p.contains(StatusFlags::CARRY));

    // SED; SEC; LDA #$10; SBC #$01
    let (mut cpu, mut bus) = boot(&[0xF8, 0x38, 0xA9, 0x10, 0xE9, 0x01]);
    steps(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.state.a & 0xFF, 0x09);
    assert!(cpu.state.p.contains(StatusFlags::CARRY));
}

#[test]
fn decimal_adc_16bit_carries_through_every_digit() {
    // REP #$20; SED; CLC; LDA #$1999; ADC #$0001
    let (mut cpu, mut bus) = boot_native(&[0xC2, 0x20, 0xF8, 0x18, 0xA9, 0x99, 0x19, 0x69, 0x01, 0x00]);
    steps(&mut cpu, &mut bus, 5);
    assert_eq!(cpu.state.a, 0x2000);
    assert!(!cpu.state.p.contains(StatusFlags::CARRY));
}

#[test]
fn binary_adc_sets_overflow() {
    // CLC; LDA #$7F; ADC #$01
    let (mut cpu, mut bus) = boot(&[0x18, 0xA9, 0x7F, 0x69, 0x01]);
    steps(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.state.a & 0xFF, 0x80);
    assert!(cpu.state.p.contains(StatusFlags::OVERFLOW));
    assert!(cpu.state.p.contains(StatusFlags::NEGATIVE));
}

#[test]
fn decimal_adc_and_sbc_in_eight_bit() {
    // SED; CLC; LDA #$19; ADC #$28
    let (mut cpu, mut bus) = boot(&[0xF8, 0x18, 0xA9, 0x19, 0x69, 0x28]);
    steps(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.state.a & 0xFF, 0x47);
    assert!(!cpu.state.p.contains(StatusFlags::CARRY));

    // SED; CLC; LDA #$99; ADC #$01
    let (mut cpu, mut bus) = boot(&[0xF8, 0x18, 0xA9, 0x99, 0x69, 0x01]);
    steps(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.state.a & 0xFF, 0x00);
    assert!(cpu.state.p.contains(StatusFlags::CARRY));

    // SED; SEC; LDA #$50; SBC #$01
    let (mut cpu, mut bus) = boot(&[0xF8, 0x38, 0xA9, 0x50, 0xE9, 0x01]);
    steps(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.state.a & 0xFF, 0x49);
    assert!(cpu.state.p.contains(StatusFlags::CARRY));
}

#[test]
fn decimal_adc_carries_across_sixteen_bits() {
    // REP #$20; SED; CLC; LDA #$1999; ADC #$0001
    let (mut cpu, mut bus) =
        boot_native(&[0xC2, 0x20, 0xF8, 0x18, 0xA9, 0x99, 0x19, 0x69, 0x01, 0x00]);
    steps(&mut cpu, &mut bus, 5);
    assert_eq!(cpu.state.a, 0x2000);
    assert!(!cpu.state.p.contains(StatusFlags::CARRY));
}

#[test]
fn emulation_mode_keeps_registers_narrow() {
    // REP #$30 in emulation mode leaves M and X set.
    let (mut cpu, mut bus) = boot(&[0xC2, 0x30]);
    cpu.step_instruction(&mut bus);
    assert!(cpu.state.memory_is_8bit());
    assert!(cpu.state.p.contains(StatusFlags::INDEX_8BIT));
}

#[test]
fn sep_index_clears_high_bytes() {
    // REP #$10; LDX #$1234; SEP #$10
    let (mut cpu, mut bus) = boot_native(&[0xC2, 0x10, 0xA2, 0x34, 0x12, 0xE2, 0x10]);
    steps(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.state.x, 0x1234);
    cpu.step_instruction(&mut bus);
    assert_eq!(cpu.state.x, 0x0034);
}

#[test]
fn returning_to_emulation_resets_stack_page() {
    // REP #$30; LDA #$1FF0; TCS; SEC; XCE
    let (mut cpu, mut bus) = boot_native(&[0xC2, 0x30, 0xA9, 0xF0, 0x1F, 0x1B, 0x38, 0xFB]);
    steps(&mut cpu, &mut bus, 5);
    assert!(cpu.state.emulation_mode);
    assert_eq!(cpu.state.sp, 0x01F0);
    assert!(cpu.state.p.contains(StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT));
}

#[test]
fn emulation_stack_wraps_inside_page_one() {
    // LDX #$00; TXS; PHA
    let (mut cpu, mut bus) = boot(&[0xA2, 0x00, 0x9A, 0x48]);
    steps(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.state.sp, 0x01FF);
}

#[test]
fn emulation_direct_page_indexing_wraps_in_page() {
    // LDX #$01; LDA $FF,X
    let program = [0xA2, 0x01, 0xB5, 0xFF];
    let (mut cpu, mut bus) = boot(&program);
    bus.memory[0x0000] = 0x11;
    bus.memory[0x0100] = 0x22;
    steps(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.state.a & 0xFF, 0x11);

    let (mut cpu, mut bus) = boot_native(&program);
    bus.memory[0x0000] = 0x11;
    bus.memory[0x0100] = 0x22;
    steps(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.state.a & 0xFF, 0x22);
}

#[test]
fn transfers_follow_register_widths() {
    // REP #$30; LDA #$ABCD; TAX; SEP #$20; XBA
    let (mut cpu, mut bus) = boot_native(&[0xC2, 0x30, 0xA9, 0xCD, 0xAB, 0xAA, 0xE2, 0x20, 0xEB]);
    steps(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.state.x, 0xABCD);
    steps(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.state.a, 0xCDAB);
    // XBA flags come from the new low byte ($AB).
    assert!(cpu.state.p.contains(StatusFlags::NEGATIVE));
    assert!(!cpu.state.p.contains(StatusFlags::ZERO));
}

#[test]
fn bit_immediate_only_touches_zero() {
    // LDA #$01; CLV; BIT #$C0
    let (mut cpu, mut bus) = boot(&[0xA9, 0x01, 0xB8, 0x89, 0xC0]);
    steps(&mut cpu, &mut bus, 3);
    assert!(cpu.state.p.contains(StatusFlags::ZERO));
    assert!(!cpu.state.p.contains(StatusFlags::OVERFLOW));
    // LDA #$01 left N clear; BIT # must not set it.
    assert!(!cpu.state.p.contains(StatusFlags::NEGATIVE));
}

#[test]
fn mvn_moves_one_byte_per_execution() {
    // REP #$30; LDA #$0002; LDX #$1000; LDY #$2000; MVN $7E,$00
    let (mut cpu, mut bus) = boot_native(&[
        0xC2, 0x30, 0xA9, 0x02, 0x00, 0xA2, 0x00, 0x10, 0xA0, 0x00, 0x20, 0x54, 0x7E, 0x00, 0xEA,
    ]);
    bus.load(0x1000, &[1, 2, 3]);
    steps(&mut cpu, &mut bus, 4);
    let moves = steps(&mut cpu, &mut bus, 3);
    assert_eq!(moves, vec![7, 7, 7]);
    assert_eq!(&bus.memory[0x7E2000..0x7E2003], &[1, 2, 3]);
    assert_eq!(cpu.state.a, 0xFFFF);
    assert_eq!(cpu.state.x, 0x1003);
    assert_eq!(cpu.state.y, 0x2003);
    assert_eq!(cpu.state.db, 0x7E);
    assert_eq!(cpu.state.pc, 0x8010);
}

#[test]
fn jsr_rts_and_jsl_rtl_round_trip() {
    let (mut cpu, mut bus) = boot_native(&[0x20, 0x00, 0xA0, 0x22, 0x00, 0x80, 0x01]);
    bus.load(0xA000, &[0x60]);
    bus.load(0x018000, &[0x6B]);
    let costs = steps(&mut cpu, &mut bus, 4);
    assert_eq!(costs, vec![6, 6, 8, 6]);
    assert_eq!(cpu.state.full_pc(), 0x008009);
}

#[test]
fn jmp_indirect_reads_pointer_from_bank_zero() {
    // PB=1: JMP ($1234) -> pointer from $00:1234
    let mut bus = TestBus::new();
    bus.load(0x8000, &[0x18, 0xFB, 0x5C, 0x00, 0x80, 0x01]);
    bus.load(0x018000, &[0x6C, 0x34, 0x12]);
    bus.load(0x001234, &[0x78, 0x56]);
    bus.load(0x011234, &[0xFF, 0xFF]);
    let mut cpu = Cpu::new();
    cpu.reset(&mut bus);
    steps(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.state.full_pc(), 0x015678);
}

#[test]
fn native_nmi_pushes_bank_and_costs_eight() {
    let (mut cpu, mut bus) = boot_native(&[0xEA, 0xEA]);
    cpu.signal_nmi();
    let sp = cpu.state.sp;
    assert_eq!(cpu.step_instruction(&mut bus), 8);
    assert_eq!(cpu.state.pc, 0x9000);
    assert_eq!(cpu.state.sp, sp - 4);
    assert!(cpu.state.p.contains(StatusFlags::IRQ_DISABLE));
}

#[test]
fn emulation_irq_pushes_p_without_break() {
    // CLI; NOP
    let (mut cpu, mut bus) = boot(&[0x58, 0xEA]);
    cpu.step_instruction(&mut bus);
    cpu.set_irq_line(true);
    assert_eq!(cpu.step_instruction(&mut bus), 7);
    assert_eq!(cpu.state.pc, 0x9300);
    let pushed_p = bus.memory[(cpu.state.sp + 1) as usize];
    assert_eq!(pushed_p & 0x10, 0);
    assert_eq!(bus.memory[(cpu.state.sp + 2) as usize], 0x01);
    assert_eq!(bus.memory[(cpu.state.sp + 3) as usize], 0x80);
}

#[test]
fn masked_irq_is_ignored() {
    let (mut cpu, mut bus) = boot(&[0xEA, 0xEA]);
    cpu.set_irq_line(true);
    cpu.step_instruction(&mut bus);
    assert_eq!(cpu.state.pc, 0x8001);
}

#[test]
fn brk_sets_break_flag_in_emulation_and_costs_extra_native() {
    let (mut cpu, mut bus) = boot(&[0x00, 0x00]);
    assert_eq!(cpu.step_instruction(&mut bus), 7);
    assert_eq!(cpu.state.pc, 0x9300);
    let pushed_p = bus.memory[(cpu.state.sp + 1) as usize];
    assert_ne!(pushed_p & 0x10, 0);

    let (mut cpu, mut bus) = boot_native(&[0x00, 0x00]);
    assert_eq!(cpu.step_instruction(&mut bus), 8);
    assert_eq!(cpu.state.pc, 0x9200);
    assert_eq!(cpu.state.pb, 0);

    let (mut cpu, mut bus) = boot(&[0x02, 0x00]);
    cpu.step_instruction(&mut bus);
    assert_eq!(cpu.state.pc, 0x9600);
}

#[test]
fn rti_restores_bank_in_native_mode() {
    // NMI handler at $9000 is RTI.
    let (mut cpu, mut bus) = boot_native(&[0xEA, 0xEA]);
    bus.load(0x9000, &[0x40]);
    cpu.signal_nmi();
    cpu.step_instruction(&mut bus);
    assert_eq!(cpu.step_instruction(&mut bus), 7);
    assert_eq!(cpu.state.full_pc(), 0x008002);
}

#[test]
fn wai_idles_until_interrupt() {
    // WAI; NOP
    let (mut cpu, mut bus) = boot(&[0xCB, 0xEA]);
    cpu.step_instruction(&mut bus);
    assert!(cpu.state.waiting_for_interrupt);
    for _ in 0..10 {
        assert_eq!(cpu.step_instruction(&mut bus), 1);
    }
    assert_eq!(cpu.state.pc, 0x8001);

    // I is set after reset, so the IRQ just wakes the CPU.
    cpu.set_irq_line(true);
    cpu.step_instruction(&mut bus);
    assert!(!cpu.state.waiting_for_interrupt);
    assert_eq!(cpu.state.pc, 0x8002);
}

#[test]
fn nmi_wakes_wai_and_vectors() {
    let (mut cpu, mut bus) = boot(&[0xCB, 0xEA]);
    cpu.step_instruction(&mut bus);
    cpu.signal_nmi();
    assert_eq!(cpu.step_instruction(&mut bus), 7);
    assert_eq!(cpu.state.pc, 0x9400);
}

#[test]
fn stp_halts_until_reset() {
    let (mut cpu, mut bus) = boot(&[0xDB, 0xEA]);
    cpu.step_instruction(&mut bus);
    assert!(cpu.state.stopped);
    cpu.signal_nmi();
    for _ in 0..5 {
        assert_eq!(cpu.step_instruction(&mut bus), 1);
    }
    assert_eq!(cpu.state.pc, 0x8001);
    cpu.reset(&mut bus);
    assert!(!cpu.state.stopped);
    assert_eq!(cpu.state.pc, 0x8000);
}

#[test]
fn tsb_and_trb_set_zero_from_the_mask() {
    // LDA #$0F; TSB $10; TRB $11
    let (mut cpu, mut bus) = boot(&[0xA9, 0x0F, 0x04, 0x10, 0x14, 0x11]);
    bus.memory[0x10] = 0xF0;
    bus.memory[0x11] = 0xFF;
    cpu.step_instruction(&mut bus);
    cpu.step_instruction(&mut bus);
    assert_eq!(bus.memory[0x10], 0xFF);
    assert!(cpu.state.p.contains(StatusFlags::ZERO));
    cpu.step_instruction(&mut bus);
    assert_eq!(bus.memory[0x11], 0xF0);
    assert!(!cpu.state.p.contains(StatusFlags::ZERO));
}

#[test]
fn pea_pei_per_push_addresses() {
    // REP #$30; PEA $1234; PEI ($20); PER $0010
    let (mut cpu, mut bus) = boot_native(&[0xC2, 0x30, 0xF4, 0x34, 0x12, 0xD4, 0x20, 0x62, 0x10, 0x00]);
    bus.load(0x20, &[0xCD, 0xAB]);
    let sp = cpu.state.sp;
    steps(&mut cpu, &mut bus, 4);
    let at = |off: u16| bus.memory[(sp - off) as usize];
    assert_eq!((at(0), at(1)), (0x12, 0x34));
    assert_eq!((at(2), at(3)), (0xAB, 0xCD));
    // PER is relative to the following instruction at $800C.
    assert_eq!((at(4), at(5)), (0x80, 0x1C));
}
