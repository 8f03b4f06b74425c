//! 256-entry dispatch table for the 65C816.
//!
//! Cycle counts are the base cost with 8-bit accumulator and index
//! registers, a page-aligned direct page, no index page crossing and no
//! branch taken. `execute` adds the documented penalties on top.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Bra, Brk, Brl, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cop, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jml, Jmp,
    Jsl, Jsr, Lda, Ldx, Ldy, Lsr, Mvn, Mvp, Nop, Ora, Pea, Pei, Per, Pha, Phb, Phd,
    Phk, Php, Phx, Phy, Pla, Plb, Pld, Plp, Plx, Ply, Rep, Rol, Ror, Rti, Rtl, Rts,
    Sbc, Sec, Sed, Sei, Sep, Sta, Stp, Stx, Sty, Stz, Tax, Tay, Tcd, Tcs, Tdc, Trb,
    Tsb, Tsc, Tsx, Txa, Txs, Txy, Tya, Tyx, Wai, Wdm, Xba, Xce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    Implied,
    Accumulator,
    /// Immediate sized by the M flag.
    ImmediateM,
    /// Immediate sized by the X flag.
    ImmediateX,
    Immediate8,
    Direct,
    DirectX,
    DirectY,
    /// (d)
    DirectIndirect,
    /// (d,x)
    DirectIndexedIndirect,
    /// (d),y
    DirectIndirectIndexed,
    /// [d]
    DirectIndirectLong,
    /// [d],y
    DirectIndirectLongIndexed,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    AbsoluteLong,
    AbsoluteLongX,
    /// (a), JMP only
    AbsoluteIndirect,
    /// (a,x), JMP/JSR only
    AbsoluteIndexedIndirect,
    /// [a], JML only
    AbsoluteIndirectLong,
    StackRelative,
    /// (d,s),y
    StackRelativeIndirectIndexed,
    Relative,
    RelativeLong,
    BlockMove,
}

impl AddrMode {
    /// Operand bytes following the opcode, for a given M/X configuration.
    pub fn operand_len(self, m8: bool, x8: bool) -> u16 {
        use AddrMode::*;
        match self {
            Implied | Accumulator => 0,
            ImmediateM => if m8 { 1 } else { 2 },
            ImmediateX => if x8 { 1 } else { 2 },
            Immediate8 | Direct | DirectX | DirectY | DirectIndirect | DirectIndexedIndirect
            | DirectIndirectIndexed | DirectIndirectLong | DirectIndirectLongIndexed
            | StackRelative | StackRelativeIndirectIndexed | Relative => 1,
            Absolute | AbsoluteX | AbsoluteY | AbsoluteIndirect | AbsoluteIndexedIndirect
            | AbsoluteIndirectLong | RelativeLong | BlockMove => 2,
            AbsoluteLong | AbsoluteLongX => 3,
        }
    }

    pub fn uses_direct_page(self) -> bool {
        use AddrMode::*;
        matches!(
            self,
            Direct
                | DirectX
                | DirectY
                | DirectIndirect
                | DirectIndexedIndirect
                | DirectIndirectIndexed
                | DirectIndirectLong
                | DirectIndirectLongIndexed
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    pub mnemonic: Mnemonic,
    pub mode: AddrMode,
    pub cycles: u8,
}

const fn op(mnemonic: Mnemonic, mode: AddrMode, cycles: u8) -> OpcodeInfo {
    OpcodeInfo { mnemonic, mode, cycles }
}

use AddrMode::*;
use Mnemonic::*;

#[rustfmt::skip]
pub static OPCODES: [OpcodeInfo; 256] = [
    // 0x00
    op(Brk, Immediate8, 7), op(Ora, DirectIndexedIndirect, 6), op(Cop, Immediate8, 7), op(Ora, StackRelative, 4),
    op(Tsb, Direct, 5), op(Ora, Direct, 3), op(Asl, Direct, 5), op(Ora, DirectIndirectLong, 6),
    op(Php, Implied, 3), op(Ora, ImmediateM, 2), op(Asl, Accumulator, 2), op(Phd, Implied, 4),
    op(Tsb, Absolute, 6), op(Ora, Absolute, 4), op(Asl, Absolute, 6), op(Ora, AbsoluteLong, 5),
    // 0x10
    op(Bpl, Relative, 2), op(Ora, DirectIndirectIndexed, 5), op(Ora, DirectIndirect, 5), op(Ora, StackRelativeIndirectIndexed, 7),
    op(Trb, Direct, 5), op(Ora, DirectX, 4), op(Asl, DirectX, 6), op(Ora, DirectIndirectLongIndexed, 6),
    op(Clc, Implied, 2), op(Ora, AbsoluteY, 4), op(Inc, Accumulator, 2), op(Tcs, Implied, 2),
    op(Trb, Absolute, 6), op(Ora, AbsoluteX, 4), op(Asl, AbsoluteX, 7), op(Ora, AbsoluteLongX, 5),
    // 0x20
    op(Jsr, Absolute, 6), op(And, DirectIndexedIndirect, 6), op(Jsl, AbsoluteLong, 8), op(And, StackRelative, 4),
    op(Bit, Direct, 3), op(And, Direct, 3), op(Rol, Direct, 5), op(And, DirectIndirectLong, 6),
    op(Plp, Implied, 4), op(And, ImmediateM, 2), op(Rol, Accumulator, 2), op(Pld, Implied, 5),
    op(Bit, Absolute, 4), op(And, Absolute, 4), op(Rol, Absolute, 6), op(And, AbsoluteLong, 5),
    // 0x30
    op(Bmi, Relative, 2), op(And, DirectIndirectIndexed, 5), op(And, DirectIndirect, 5), op(And, StackRelativeIndirectIndexed, 7),
    op(Bit, DirectX, 4), op(And, DirectX, 4), op(Rol, DirectX, 6), op(And, DirectIndirectLongIndexed, 6),
    op(Sec, Implied, 2), op(And, AbsoluteY, 4), op(Dec, Accumulator, 2), op(Tsc, Implied, 2),
    op(Bit, AbsoluteX, 4), op(And, AbsoluteX, 4), op(Rol, AbsoluteX, 7), op(And, AbsoluteLongX, 5),
    // 0x40
    op(Rti, Implied, 6), op(Eor, DirectIndexedIndirect, 6), op(Wdm, Immediate8, 2), op(Eor, StackRelative, 4),
    op(Mvp, BlockMove, 7), op(Eor, Direct, 3), op(Lsr, Direct, 5), op(Eor, DirectIndirectLong, 6),
    op(Pha, Implied, 3), op(Eor, ImmediateM, 2), op(Lsr, Accumulator, 2), op(Phk, Implied, 3),
    op(Jmp, Absolute, 3), op(Eor, Absolute, 4), op(Lsr, Absolute, 6), op(Eor, AbsoluteLong, 5),
    // 0x50
    op(Bvc, Relative, 2), op(Eor, DirectIndirectIndexed, 5), op(Eor, DirectIndirect, 5), op(Eor, StackRelativeIndirectIndexed, 7),
    op(Mvn, BlockMove, 7), op(Eor, DirectX, 4), op(Lsr, DirectX, 6), op(Eor, DirectIndirectLongIndexed, 6),
    op(Cli, Implied, 2), op(Eor, AbsoluteY, 4), op(Phy, Implied, 3), op(Tcd, Implied, 2),
    op(Jml, AbsoluteLong, 4), op(Eor, AbsoluteX, 4), op(Lsr, AbsoluteX, 7), op(Eor, AbsoluteLongX, 5),
    // 0x60
    op(Rts, Implied, 6), op(Adc, DirectIndexedIndirect, 6), op(Per, RelativeLong, 6), op(Adc, StackRelative, 4),
    op(Stz, Direct, 3), op(Adc, Direct, 3), op(Ror, Direct, 5), op(Adc, DirectIndirectLong, 6),
    op(Pla, Implied, 4), op(Adc, ImmediateM, 2), op(Ror, Accumulator, 2), op(Rtl, Implied, 6),
    op(Jmp, AbsoluteIndirect, 5), op(Adc, Absolute, 4), op(Ror, Absolute, 6), op(Adc, AbsoluteLong, 5),
    // 0x70
    op(Bvs, Relative, 2), op(Adc, DirectIndirectIndexed, 5), op(Adc, DirectIndirect, 5), op(Adc, StackRelativeIndirectIndexed, 7),
    op(Stz, DirectX, 4), op(Adc, DirectX, 4), op(Ror, DirectX, 6), op(Adc, DirectIndirectLongIndexed, 6),
    op(Sei, Implied, 2), op(Adc, AbsoluteY, 4), op(Ply, Implied, 4), op(Tdc, Implied, 2),
    op(Jmp, AbsoluteIndexedIndirect, 6), op(Adc, AbsoluteX, 4), op(Ror, AbsoluteX, 7), op(Adc, AbsoluteLongX, 5),
    // 0x80
    op(Bra, Relative, 2), op(Sta, DirectIndexedIndirect, 6), op(Brl, RelativeLong, 4), op(Sta, StackRelative, 4),
    op(Sty, Direct, 3), op(Sta, Direct, 3), op(Stx, Direct, 3), op(Sta, DirectIndirectLong, 6),
    op(Dey, Implied, 2), op(Bit, ImmediateM, 2), op(Txa, Implied, 2), op(Phb, Implied, 3),
    op(Sty, Absolute, 4), op(Sta, Absolute, 4), op(Stx, Absolute, 4), op(Sta, AbsoluteLong, 5),
    // 0x90
    op(Bcc, Relative, 2), op(Sta, DirectIndirectIndexed, 6), op(Sta, DirectIndirect, 5), op(Sta, StackRelativeIndirectIndexed, 7),
    op(Sty, DirectX, 4), op(Sta, DirectX, 4), op(Stx, DirectY, 4), op(Sta, DirectIndirectLongIndexed, 6),
    op(Tya, Implied, 2), op(Sta, AbsoluteY, 5), op(Txs, Implied, 2), op(Txy, Implied, 2),
    op(Stz, Absolute, 4), op(Sta, AbsoluteX, 5), op(Stz, AbsoluteX, 5), op(Sta, AbsoluteLongX, 5),
    // 0xA0
    op(Ldy, ImmediateX, 2), op(Lda, DirectIndexedIndirect, 6), op(Ldx, ImmediateX, 2), op(Lda, StackRelative, 4),
    op(Ldy, Direct, 3), op(Lda, Direct, 3), op(Ldx, Direct, 3), op(Lda, DirectIndirectLong, 6),
    op(Tay, Implied, 2), op(Lda, ImmediateM, 2), op(Tax, Implied, 2), op(Plb, Implied, 4),
    op(Ldy, Absolute, 4), op(Lda, Absolute, 4), op(Ldx, Absolute, 4), op(Lda, AbsoluteLong, 5),
    // 0xB0
    op(Bcs, Relative, 2), op(Lda, DirectIndirectIndexed, 5), op(Lda, DirectIndirect, 5), op(Lda, StackRelativeIndirectIndexed, 7),
    op(Ldy, DirectX, 4), op(Lda, DirectX, 4), op(Ldx, DirectY, 4), op(Lda, DirectIndirectLongIndexed, 6),
    op(Clv, Implied, 2), op(Lda, AbsoluteY, 4), op(Tsx, Implied, 2), op(Tyx, Implied, 2),
    op(Ldy, AbsoluteX, 4), op(Lda, AbsoluteX, 4), op(Ldx, AbsoluteY, 4), op(Lda, AbsoluteLongX, 5),
    // 0xC0
    op(Cpy, ImmediateX, 2), op(Cmp, DirectIndexedIndirect, 6), op(Rep, Immediate8, 3), op(Cmp, StackRelative, 4),
    op(Cpy, Direct, 3), op(Cmp, Direct, 3), op(Dec, Direct, 5), op(Cmp, DirectIndirectLong, 6),
    op(Iny, Implied, 2), op(Cmp, ImmediateM, 2), op(Dex, Implied, 2), op(Wai, Implied, 3),
    op(Cpy, Absolute, 4), op(Cmp, Absolute, 4), op(Dec, Absolute, 6), op(Cmp, AbsoluteLong, 5),
    // 0xD0
    op(Bne, Relative, 2), op(Cmp, DirectIndirectIndexed, 5), op(Cmp, DirectIndirect, 5), op(Cmp, StackRelativeIndirectIndexed, 7),
    op(Pei, DirectIndirect, 6), op(Cmp, DirectX, 4), op(Dec, DirectX, 6), op(Cmp, DirectIndirectLongIndexed, 6),
    op(Cld, Implied, 2), op(Cmp, AbsoluteY, 4), op(Phx, Implied, 3), op(Stp, Implied, 3),
    op(Jml, AbsoluteIndirectLong, 6), op(Cmp, AbsoluteX, 4), op(Dec, AbsoluteX, 7), op(Cmp, AbsoluteLongX, 5),
    // 0xE0
    op(Cpx, ImmediateX, 2), op(Sbc, DirectIndexedIndirect, 6), op(Sep, Immediate8, 3), op(Sbc, StackRelative, 4),
    op(Cpx, Direct, 3), op(Sbc, Direct, 3), op(Inc, Direct, 5), op(Sbc, DirectIndirectLong, 6),
    op(Inx, Implied, 2), op(Sbc, ImmediateM, 2), op(Nop, Implied, 2), op(Xba, Implied, 3),
    op(Cpx, Absolute, 4), op(Sbc, Absolute, 4), op(Inc, Absolute, 6), op(Sbc, AbsoluteLong, 5),
    // 0xF0
    op(Beq, Relative, 2), op(Sbc, DirectIndirectIndexed, 5), op(Sbc, DirectIndirect, 5), op(Sbc, StackRelativeIndirectIndexed, 7),
    op(Pea, Absolute, 5), op(Sbc, DirectX, 4), op(Inc, DirectX, 6), op(Sbc, DirectIndirectLongIndexed, 6),
    op(Sed, Implied, 2), op(Sbc, AbsoluteY, 4), op(Plx, Implied, 4), op(Xce, Implied, 2),
    op(Jsr, AbsoluteIndexedIndirect, 8), op(Sbc, AbsoluteX, 4), op(Inc, AbsoluteX, 7), op(Sbc, AbsoluteLongX, 5),
];
