//! Execute breakpoints and a 65C816 disassembler.
//!
//! Breakpoints are checked by `Snes::run_cycle` whenever the CPU settles on
//! an instruction boundary, so a hit is reported before the instruction at
//! that address runs.

use std::collections::BTreeSet;
use std::fmt;

use crate::cpu::opcodes::{AddrMode, Mnemonic, OPCODES};

#[derive(Debug, Clone, Default)]
pub struct Debugger {
    breakpoints: BTreeSet<u32>,
    /// Address and instruction count of the most recent hit. The count keeps
    /// a DMA stall on a breakpoint from reporting the same stop twice.
    last_hit: Option<(u32, u64)>,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_breakpoint(&mut self, address: u32) {
        if self.breakpoints.insert(address & 0xFF_FFFF) {
            log::debug!("breakpoint added at ${:06X}", address & 0xFF_FFFF);
        }
    }

    pub fn remove_breakpoint(&mut self, address: u32) -> bool {
        let removed = self.breakpoints.remove(&(address & 0xFF_FFFF));
        if removed {
            log::debug!("breakpoint removed from ${:06X}", address & 0xFF_FFFF);
        }
        removed
    }

    /// Returns whether a breakpoint is set at `address` afterwards.
    pub fn toggle_breakpoint(&mut self, address: u32) -> bool {
        if self.remove_breakpoint(address) {
            false
        } else {
            self.add_breakpoint(address);
            true
        }
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = u32> + '_ {
        self.breakpoints.iter().copied()
    }

    pub fn has_breakpoints(&self) -> bool {
        !self.breakpoints.is_empty()
    }

    /// Address of the most recent hit.
    pub fn last_hit(&self) -> Option<u32> {
        self.last_hit.map(|(pc, _)| pc)
    }

    /// Forgets the last stop so the same address reports again after the
    /// machine state was replaced.
    pub fn rearm(&mut self) {
        self.last_hit = None;
    }

    /// Called at an instruction boundary with the address about to execute
    /// and the number of instructions retired so far.
    pub fn check_breakpoint(&mut self, pc: u32, retired: u64) -> bool {
        if !self.breakpoints.contains(&pc) || self.last_hit == Some((pc, retired)) {
            return false;
        }
        self.last_hit = Some((pc, retired));
        log::debug!("breakpoint hit at ${:06X}", pc);
        true
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub address: u32,
    pub opcode: u8,
    pub mnemonic: Mnemonic,
    pub mode: AddrMode,
    pub operands: Vec<u8>,
    /// Operand text, e.g. `$12,X` or `#$0400`. Empty for implied forms.
    pub operand_text: String,
}

impl Instruction {
    /// Opcode plus operand bytes.
    pub fn size(&self) -> u32 {
        1 + self.operands.len() as u32
    }

    /// Target of a branch, jump or call whose destination is encoded in the
    /// instruction itself.
    pub fn target(&self) -> Option<u32> {
        let bank = self.address & 0xFF_0000;
        let next = self.address.wrapping_add(self.size()) as u16;
        let word = || u16::from_le_bytes([self.operands[0], self.operands[1]]);
        match self.mode {
            AddrMode::Relative => {
                let disp = self.operands[0] as i8 as i16 as u16;
                Some(bank | next.wrapping_add(disp) as u32)
            }
            AddrMode::RelativeLong if self.mnemonic != Mnemonic::Per => {
                Some(bank | next.wrapping_add(word()) as u32)
            }
            AddrMode::Absolute if matches!(self.mnemonic, Mnemonic::Jmp | Mnemonic::Jsr) => {
                Some(bank | word() as u32)
            }
            AddrMode::AbsoluteLong if matches!(self.mnemonic, Mnemonic::Jml | Mnemonic::Jsl) => {
                Some(u32::from_le_bytes([self.operands[0], self.operands[1], self.operands[2], 0]))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = format!("{:?}", self.mnemonic).to_uppercase();
        if self.operand_text.is_empty() {
            write!(f, "${:06X}  {}", self.address, name)
        } else {
            write!(f, "${:06X}  {} {}", self.address, name, self.operand_text)
        }
    }
}

/// Bytes taken by `opcode` under the given register widths.
pub fn instruction_size(opcode: u8, m8: bool, x8: bool) -> u32 {
    1 + OPCODES[opcode as usize].mode.operand_len(m8, x8) as u32
}

/// Decodes the instruction at `address`. Operand bytes are fetched with the
/// PC wrapping inside the bank, as the CPU does.
pub fn disassemble<F>(address: u32, m8: bool, x8: bool, mut read: F) -> Instruction
where
    F: FnMut(u32) -> u8,
{
    let address = address & 0xFF_FFFF;
    let bank = address & 0xFF_0000;
    let opcode = read(address);
    let info = OPCODES[opcode as usize];
    let operands: Vec<u8> = (1..=info.mode.operand_len(m8, x8))
        .map(|i| read(bank | (address as u16).wrapping_add(i) as u32))
        .collect();

    let mut instruction = Instruction {
        address,
        opcode,
        mnemonic: info.mnemonic,
        mode: info.mode,
        operands,
        operand_text: String::new(),
    };
    instruction.operand_text = format_operand(&instruction);
    instruction
}

/// Decodes `count` consecutive instructions starting at `address`.
pub fn disassemble_range<F>(address: u32, count: usize, m8: bool, x8: bool, mut read: F) -> Vec<Instruction>
where
    F: FnMut(u32) -> u8,
{
    let mut out = Vec::with_capacity(count);
    let mut pc = address & 0xFF_FFFF;
    for _ in 0..count {
        let instruction = disassemble(pc, m8, x8, &mut read);
        pc = (pc & 0xFF_0000) | (pc as u16).wrapping_add(instruction.size() as u16) as u32;
        out.push(instruction);
    }
    out
}

fn format_operand(ins: &Instruction) -> String {
    use AddrMode::*;
    let ops = &ins.operands;
    let byte = || ops[0];
    let word = || u16::from_le_bytes([ops[0], ops[1]]);
    let long = || u32::from_le_bytes([ops[0], ops[1], ops[2], 0]);
    match ins.mode {
        Implied => String::new(),
        Accumulator => "A".to_string(),
        ImmediateM | ImmediateX | Immediate8 if ops.len() == 1 => format!("#${:02X}", byte()),
        ImmediateM | ImmediateX | Immediate8 => format!("#${:04X}", word()),
        Direct => format!("${:02X}", byte()),
        DirectX => format!("${:02X},X", byte()),
        DirectY => format!("${:02X},Y", byte()),
        DirectIndirect => format!("(${:02X})", byte()),
        DirectIndexedIndirect => format!("(${:02X},X)", byte()),
        DirectIndirectIndexed => format!("(${:02X}),Y", byte()),
        DirectIndirectLong => format!("[${:02X}]", byte()),
        DirectIndirectLongIndexed => format!("[${:02X}],Y", byte()),
        Absolute => format!("${:04X}", word()),
        AbsoluteX => format!("${:04X},X", word()),
        AbsoluteY => format!("${:04X},Y", word()),
        AbsoluteLong => format!("${:06X}", long()),
        AbsoluteLongX => format!("${:06X},X", long()),
        AbsoluteIndirect => format!("(${:04X})", word()),
        AbsoluteIndexedIndirect => format!("(${:04X},X)", word()),
        AbsoluteIndirectLong => format!("[${:04X}]", word()),
        StackRelative => format!("${:02X},S", byte()),
        StackRelativeIndirectIndexed => format!("(${:02X},S),Y", byte()),
        // PER pushes its target; the other relative forms branch to it.
        Relative | RelativeLong => match ins.target() {
            Some(target) => format!("${:04X}", target as u16),
            None => {
                let next = ins.address.wrapping_add(ins.size()) as u16;
                format!("${:04X}", next.wrapping_add(word()))
            }
        },
        // Encoded destination first; written source first.
        BlockMove => format!("${:02X},${:02X}", ops[1], ops[0]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(bytes: &[u8], base: u32) -> impl FnMut(u32) -> u8 + '_ {
        move |addr| {
            addr.checked_sub(base)
                .and_then(|i| bytes.get(i as usize))
                .copied()
                .unwrap_or(0)
        }
    }

    fn text(bytes: &[u8], m8: bool, x8: bool) -> String {
        disassemble(0x00_8000, m8, x8, reader(bytes, 0x00_8000)).to_string()
    }

    #[test]
    fn immediate_width_follows_flags() {
        assert_eq!(text(&[0xA9, 0x34, 0x12], true, true), "$008000  LDA #$34");
        assert_eq!(text(&[0xA9, 0x34, 0x12], false, true), "$008000  LDA #$1234");
        assert_eq!(text(&[0xA2, 0x34, 0x12], false, true), "$008000  LDX #$34");
        assert_eq!(text(&[0xA2, 0x34, 0x12], true, false), "$008000  LDX #$1234");
        // REP is always one byte.
        assert_eq!(text(&[0xC2, 0x30], false, false), "$008000  REP #$30");
    }

    #[test]
    fn sizes_match_operand_widths() {
        assert_eq!(instruction_size(0xEA, true, true), 1);
        assert_eq!(instruction_size(0xA9, true, true), 2);
        assert_eq!(instruction_size(0xA9, false, true), 3);
        assert_eq!(instruction_size(0xA0, true, false), 3);
        assert_eq!(instruction_size(0x22, true, true), 4);
        assert_eq!(instruction_size(0x54, true, true), 3);
    }

    #[test]
    fn addressing_modes_format() {
        let cases: &[(&[u8], &str)] = &[
            (&[0x0A], "ASL A"),
            (&[0xB5, 0x10], "LDA $10,X"),
            (&[0xB1, 0x20], "LDA ($20),Y"),
            (&[0xA1, 0x20], "LDA ($20,X)"),
            (&[0xA7, 0x30], "LDA [$30]"),
            (&[0xB7, 0x30], "LDA [$30],Y"),
            (&[0xBD, 0x00, 0x20], "LDA $2000,X"),
            (&[0xBF, 0x56, 0x34, 0x7E], "LDA $7E3456,X"),
            (&[0x6C, 0xFC, 0xFF], "JMP ($FFFC)"),
            (&[0x7C, 0x00, 0x90], "JMP ($9000,X)"),
            (&[0xDC, 0x00, 0x02], "JML [$0200]"),
            (&[0xA3, 0x03], "LDA $03,S"),
            (&[0xB3, 0x03], "LDA ($03,S),Y"),
            (&[0x54, 0x7E, 0x7F], "MVN $7F,$7E"),
        ];
        for (bytes, expected) in cases {
            assert_eq!(text(bytes, true, true), format!("$008000  {}", expected));
        }
    }

    #[test]
    fn branches_show_their_target() {
        let bra_self = disassemble(0x00_8000, true, true, reader(&[0x80, 0xFE], 0x00_8000));
        assert_eq!(bra_self.target(), Some(0x00_8000));
        assert_eq!(bra_self.operand_text, "$8000");

        let bne = disassemble(0x01_8010, true, true, reader(&[0xD0, 0x05], 0x01_8010));
        assert_eq!(bne.target(), Some(0x01_8017));

        let brl = disassemble(0x00_8000, true, true, reader(&[0x82, 0x00, 0x10], 0x00_8000));
        assert_eq!(brl.target(), Some(0x00_9003));

        let jsl = disassemble(0x00_8000, true, true, reader(&[0x22, 0x00, 0x80, 0x01], 0x00_8000));
        assert_eq!(jsl.target(), Some(0x01_8000));
        assert_eq!(jsl.to_string(), "$008000  JSL $018000");
    }

    #[test]
    fn range_walks_variable_lengths() {
        let code = [0x18, 0xFB, 0xC2, 0x20, 0xA9, 0x00, 0x01, 0x8D, 0x00, 0x20, 0x80, 0xFE];
        // Width changes are not tracked; a 16-bit caller passes m8 = false.
        let listing = disassemble_range(0x00_8000, 6, false, false, reader(&code, 0x00_8000));
        let addrs: Vec<u32> = listing.iter().map(|i| i.address).collect();
        assert_eq!(addrs, [0x8000, 0x8001, 0x8002, 0x8004, 0x8007, 0x800A]);
        assert_eq!(listing[3].operand_text, "#$0100");
        assert_eq!(listing[5].mnemonic, Mnemonic::Bra);
    }

    #[test]
    fn operand_fetch_wraps_inside_bank() {
        let ins = disassemble(0x00_FFFF, true, true, |addr| match addr {
            0x00_FFFF => 0xAD,
            0x00_0000 => 0x34,
            0x00_0001 => 0x12,
            _ => 0xFF,
        });
        assert_eq!(ins.operand_text, "$1234");
    }

    #[test]
    fn breakpoint_set_operations() {
        let mut dbg = Debugger::new();
        dbg.add_breakpoint(0x00_8000);
        dbg.add_breakpoint(0x01_8000);
        assert!(!dbg.toggle_breakpoint(0x00_8000));
        assert!(dbg.toggle_breakpoint(0x02_0000));
        assert_eq!(dbg.breakpoints().collect::<Vec<_>>(), [0x01_8000, 0x02_0000]);
        assert!(dbg.remove_breakpoint(0x01_8000));
        assert!(!dbg.remove_breakpoint(0x01_8000));
        dbg.clear_breakpoints();
        assert!(!dbg.has_breakpoints());
    }

    #[test]
    fn a_stop_is_reported_once_per_visit() {
        let mut dbg = Debugger::new();
        dbg.add_breakpoint(0x00_8000);
        assert!(!dbg.check_breakpoint(0x00_8002, 0));
        assert!(dbg.check_breakpoint(0x00_8000, 5));
        assert!(!dbg.check_breakpoint(0x00_8000, 5));
        assert!(dbg.check_breakpoint(0x00_8000, 9));
        assert_eq!(dbg.last_hit(), Some(0x00_8000));
        dbg.rearm();
        assert!(dbg.check_breakpoint(0x00_8000, 9));
    }
}
