//! Instruction descriptors and the two 256-entry dispatch tables.
//!
//! The tables are the single source of truth for decode: an opcode byte
//! maps to an immutable [`Instruction`] carrying its mnemonic, byte
//! length, cycle cost, flag dispositions, operand pair and execution
//! primitive. Regular opcode families (the LD block, the ALU block, the
//! whole CB space) are generated by loops over the standard
//! B,C,D,E,H,L,(HL),A register order; irregular entries are listed
//! explicitly.

use lazy_static::lazy_static;

use super::operand::Operand;
use super::{Flag, Reg};

/// Opcode byte that switches decode to the extended (CB) table.
pub const CB_PREFIX: u8 = 0xCB;

/// Closed set of execution behaviours an instruction can reference.
///
/// Dispatch is a single exhaustive match in `cpu::exec`, so adding a
/// variant without implementing it is a compile error rather than a
/// runtime null-primitive surprise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    /// Placeholder with no behaviour; only the CB prefix entry uses it.
    None,
    /// Opcode hole: dispatching this is a fatal illegal-opcode error.
    Invalid,
    Load,
    Add,
    AddCarry,
    Sub,
    SubCarry,
    And,
    Xor,
    Or,
    Compare,
    Increment,
    Decrement,
    Swap,
    RotateLeft,
    RotateLeftThroughCarry,
    RotateRight,
    RotateRightThroughCarry,
    ShiftLeft,
    ShiftRightArithmetic,
    ShiftRightLogical,
    TestBit,
    SetBit,
    ResetBit,
    Jump,
    JumpRelative,
    Call,
    Return,
    ReturnEnableInterrupts,
    Push,
    Pop,
    Restart,
    DecimalAdjust,
    Complement,
    SetCarryFlag,
    ComplementCarry,
    AddSpImmediate,
    LoadHlSpImmediate,
    EnableInterrupts,
    DisableInterrupts,
    Halt,
    Stop,
    Nop,
}

impl Primitive {
    /// Subtraction-family operations compute half-carry and carry as
    /// borrows rather than carries.
    #[inline]
    pub(crate) fn is_subtractive(self) -> bool {
        matches!(
            self,
            Primitive::Sub | Primitive::SubCarry | Primitive::Compare | Primitive::Decrement
        )
    }

    /// Whether the pre-execution carry flag participates in the result
    /// (ADC/SBC).
    #[inline]
    pub(crate) fn uses_carry_in(self) -> bool {
        matches!(self, Primitive::AddCarry | Primitive::SubCarry)
    }
}

/// Per-flag disposition declared by an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlagMode {
    /// Derive the bit from the operation's values.
    Calculate,
    Set,
    Reset,
    /// Leave the bit unchanged.
    Ignore,
}

/// Dispositions for all four flags. Instructions without a policy never
/// touch flags.
#[derive(Clone, Copy, Debug)]
pub struct FlagPolicy {
    pub z: FlagMode,
    pub n: FlagMode,
    pub h: FlagMode,
    pub c: FlagMode,
}

/// Declared cycle cost; conditional control flow carries both outcomes.
#[derive(Clone, Copy, Debug)]
pub enum Cycles {
    Fixed(u8),
    Branch { taken: u8, not_taken: u8 },
}

impl Cycles {
    #[inline]
    pub fn pick(self, taken: bool) -> u32 {
        match self {
            Cycles::Fixed(n) => n as u32,
            Cycles::Branch { taken: t, not_taken: nt } => {
                if taken {
                    t as u32
                } else {
                    nt as u32
                }
            }
        }
    }
}

/// Immutable instruction descriptor keyed by opcode byte.
#[derive(Clone, Copy, Debug)]
pub struct Instruction {
    /// For diagnostics; generated family entries use the bare mnemonic.
    pub mnemonic: &'static str,
    /// Declared result width in bytes (1 or 2); drives truncation and
    /// carry semantics.
    pub width: u8,
    /// Total byte length including the opcode (and CB prefix).
    pub length: u8,
    pub cycles: Cycles,
    pub flags: Option<FlagPolicy>,
    pub dst: Option<Operand>,
    pub src: Option<Operand>,
    pub op: Primitive,
}

/// Default fill for the opcode holes (D3, DB, DD, E3, E4, EB, EC, ED,
/// F4, FC, FD); every defined opcode overwrites its slot.
const ILLEGAL: Instruction = Instruction {
    mnemonic: "???",
    width: 1,
    length: 1,
    cycles: Cycles::Fixed(0),
    flags: None,
    dst: None,
    src: None,
    op: Primitive::Invalid,
};

fn instr(mnemonic: &'static str, length: u8, cycles: Cycles, op: Primitive) -> Instruction {
    Instruction {
        mnemonic,
        width: 1,
        length,
        cycles,
        flags: None,
        dst: None,
        src: None,
        op,
    }
}

impl Instruction {
    fn dst(mut self, op: Operand) -> Self {
        self.dst = Some(op);
        self
    }

    fn src(mut self, op: Operand) -> Self {
        self.src = Some(op);
        self
    }

    fn wide(mut self) -> Self {
        self.width = 2;
        self
    }

    fn flags(mut self, z: FlagMode, n: FlagMode, h: FlagMode, c: FlagMode) -> Self {
        self.flags = Some(FlagPolicy { z, n, h, c });
        self
    }
}

/// Operand for index 0-7 in the standard opcode-table register order
/// B, C, D, E, H, L, (HL), A.
fn r8(index: usize) -> Operand {
    match index {
        0 => Operand::Register(Reg::B),
        1 => Operand::Register(Reg::C),
        2 => Operand::Register(Reg::D),
        3 => Operand::Register(Reg::E),
        4 => Operand::Register(Reg::H),
        5 => Operand::Register(Reg::L),
        6 => Operand::RegisterIndirect(Reg::HL),
        _ => Operand::Register(Reg::A),
    }
}

/// Condition operand for index 0-3 in the standard order NZ, Z, NC, C.
fn cond(index: usize) -> Operand {
    match index {
        0 => Operand::Condition {
            flag: Flag::Z,
            expect: false,
        },
        1 => Operand::Condition {
            flag: Flag::Z,
            expect: true,
        },
        2 => Operand::Condition {
            flag: Flag::C,
            expect: false,
        },
        _ => Operand::Condition {
            flag: Flag::C,
            expect: true,
        },
    }
}

fn imm(width: u8) -> Operand {
    Operand::Immediate { width }
}

fn reg(r: Reg) -> Operand {
    Operand::Register(r)
}

/// Flag policy shared by an 8-bit ALU family (index = (opcode >> 3) & 7).
fn alu_family(index: usize) -> (Primitive, &'static str, FlagPolicy) {
    use FlagMode::{Calculate as Calc, Reset, Set};
    let policy = |z, n, h, c| FlagPolicy { z, n, h, c };
    match index {
        0 => (Primitive::Add, "ADD", policy(Calc, Reset, Calc, Calc)),
        1 => (Primitive::AddCarry, "ADC", policy(Calc, Reset, Calc, Calc)),
        2 => (Primitive::Sub, "SUB", policy(Calc, Set, Calc, Calc)),
        3 => (Primitive::SubCarry, "SBC", policy(Calc, Set, Calc, Calc)),
        4 => (Primitive::And, "AND", policy(Calc, Reset, Set, Reset)),
        5 => (Primitive::Xor, "XOR", policy(Calc, Reset, Reset, Reset)),
        6 => (Primitive::Or, "OR", policy(Calc, Reset, Reset, Reset)),
        _ => (Primitive::Compare, "CP", policy(Calc, Set, Calc, Calc)),
    }
}

fn build_base_table() -> [Instruction; 256] {
    use Cycles::{Branch, Fixed};
    use FlagMode::{Calculate as Calc, Ignore, Reset, Set};
    use Primitive::*;

    let mut t = [ILLEGAL; 256];

    // Register pairs in the rr encoding order for rows 0x0_-0x3_.
    let rp = [Reg::BC, Reg::DE, Reg::HL, Reg::SP];

    t[0x00] = instr("NOP", 1, Fixed(4), Nop);

    // LD rr,d16 / INC rr / DEC rr / ADD HL,rr per pair row.
    for (i, &pair) in rp.iter().enumerate() {
        let base = i << 4;
        t[base | 0x01] = instr("LD", 3, Fixed(12), Load).wide().dst(reg(pair)).src(imm(2));
        t[base | 0x03] = instr("INC", 1, Fixed(8), Increment).wide().dst(reg(pair));
        t[base | 0x09] = instr("ADD HL", 1, Fixed(8), Add)
            .wide()
            .dst(reg(Reg::HL))
            .src(reg(pair))
            .flags(Ignore, Reset, Calc, Calc);
        t[base | 0x0B] = instr("DEC", 1, Fixed(8), Decrement).wide().dst(reg(pair));
    }

    // INC r / DEC r / LD r,d8 across the (opcode >> 3) register order.
    for i in 0..8 {
        let hl = i == 6;
        let base = i << 3;
        t[base | 0x04] = instr("INC", 1, Fixed(if hl { 12 } else { 4 }), Increment)
            .dst(r8(i))
            .flags(Calc, Reset, Calc, Ignore);
        t[base | 0x05] = instr("DEC", 1, Fixed(if hl { 12 } else { 4 }), Decrement)
            .dst(r8(i))
            .flags(Calc, Set, Calc, Ignore);
        t[base | 0x06] = instr("LD", 2, Fixed(if hl { 12 } else { 8 }), Load)
            .dst(r8(i))
            .src(imm(1));
    }

    // Accumulator loads through BC/DE and the post-step HL modes.
    t[0x02] = instr("LD (BC),A", 1, Fixed(8), Load)
        .dst(Operand::RegisterIndirect(Reg::BC))
        .src(reg(Reg::A));
    t[0x12] = instr("LD (DE),A", 1, Fixed(8), Load)
        .dst(Operand::RegisterIndirect(Reg::DE))
        .src(reg(Reg::A));
    t[0x22] = instr("LD (HL+),A", 1, Fixed(8), Load)
        .dst(Operand::RegisterIncrement(Reg::HL))
        .src(reg(Reg::A));
    t[0x32] = instr("LD (HL-),A", 1, Fixed(8), Load)
        .dst(Operand::RegisterDecrement(Reg::HL))
        .src(reg(Reg::A));
    t[0x0A] = instr("LD A,(BC)", 1, Fixed(8), Load)
        .dst(reg(Reg::A))
        .src(Operand::RegisterIndirect(Reg::BC));
    t[0x1A] = instr("LD A,(DE)", 1, Fixed(8), Load)
        .dst(reg(Reg::A))
        .src(Operand::RegisterIndirect(Reg::DE));
    t[0x2A] = instr("LD A,(HL+)", 1, Fixed(8), Load)
        .dst(reg(Reg::A))
        .src(Operand::RegisterIncrement(Reg::HL));
    t[0x3A] = instr("LD A,(HL-)", 1, Fixed(8), Load)
        .dst(reg(Reg::A))
        .src(Operand::RegisterDecrement(Reg::HL));

    // Accumulator rotates: unlike their CB twins, Z is forced clear.
    t[0x07] = instr("RLCA", 1, Fixed(4), RotateLeft)
        .dst(reg(Reg::A))
        .flags(Reset, Reset, Reset, Calc);
    t[0x0F] = instr("RRCA", 1, Fixed(4), RotateRight)
        .dst(reg(Reg::A))
        .flags(Reset, Reset, Reset, Calc);
    t[0x17] = instr("RLA", 1, Fixed(4), RotateLeftThroughCarry)
        .dst(reg(Reg::A))
        .flags(Reset, Reset, Reset, Calc);
    t[0x1F] = instr("RRA", 1, Fixed(4), RotateRightThroughCarry)
        .dst(reg(Reg::A))
        .flags(Reset, Reset, Reset, Calc);

    t[0x08] = instr("LD (a16),SP", 3, Fixed(20), Load)
        .wide()
        .dst(Operand::Direct {
            addr_width: 2,
            width: 2,
        })
        .src(reg(Reg::SP));
    t[0x10] = instr("STOP", 2, Fixed(4), Stop);

    t[0x18] = instr("JR r8", 2, Fixed(12), JumpRelative).src(imm(1));
    for i in 0..4 {
        t[0x20 | (i << 3)] = instr("JR cc,r8", 2, Branch { taken: 12, not_taken: 8 }, JumpRelative)
            .dst(cond(i))
            .src(imm(1));
    }

    t[0x27] = instr("DAA", 1, Fixed(4), DecimalAdjust).dst(reg(Reg::A));
    t[0x2F] = instr("CPL", 1, Fixed(4), Complement)
        .dst(reg(Reg::A))
        .flags(Ignore, Set, Set, Ignore);
    t[0x37] = instr("SCF", 1, Fixed(4), SetCarryFlag).flags(Ignore, Reset, Reset, Set);
    t[0x3F] = instr("CCF", 1, Fixed(4), ComplementCarry).flags(Ignore, Reset, Reset, Ignore);

    // LD r,r' block (0x40-0x7F), with HALT in the (HL),(HL) slot.
    for opcode in 0x40..=0x7F {
        if opcode == 0x76 {
            t[opcode] = instr("HALT", 1, Fixed(4), Halt);
            continue;
        }
        let dst = (opcode >> 3) & 7;
        let src = opcode & 7;
        let cycles = if dst == 6 || src == 6 { 8 } else { 4 };
        t[opcode] = instr("LD", 1, Fixed(cycles), Load).dst(r8(dst)).src(r8(src));
    }

    // 8-bit ALU block (0x80-0xBF) and the immediate column.
    for opcode in 0x80..=0xBF {
        let (op, mnemonic, policy) = alu_family((opcode >> 3) & 7);
        let src = opcode & 7;
        let cycles = if src == 6 { 8 } else { 4 };
        let mut entry = instr(mnemonic, 1, Fixed(cycles), op)
            .dst(reg(Reg::A))
            .src(r8(src));
        entry.flags = Some(policy);
        t[opcode] = entry;
    }
    for i in 0..8 {
        let (op, mnemonic, policy) = alu_family(i);
        let mut entry = instr(mnemonic, 2, Fixed(8), op).dst(reg(Reg::A)).src(imm(1));
        entry.flags = Some(policy);
        t[0xC6 | (i << 3)] = entry;
    }

    // Conditional and unconditional control flow.
    for i in 0..4 {
        t[0xC0 | (i << 3)] =
            instr("RET cc", 1, Branch { taken: 20, not_taken: 8 }, Return).dst(cond(i));
        t[0xC2 | (i << 3)] = instr("JP cc,a16", 3, Branch { taken: 16, not_taken: 12 }, Jump)
            .dst(cond(i))
            .src(imm(2));
        t[0xC4 | (i << 3)] = instr("CALL cc,a16", 3, Branch { taken: 24, not_taken: 12 }, Call)
            .dst(cond(i))
            .src(imm(2));
    }
    t[0xC3] = instr("JP a16", 3, Fixed(16), Jump).src(imm(2));
    t[0xC9] = instr("RET", 1, Fixed(16), Return);
    t[0xCD] = instr("CALL a16", 3, Fixed(24), Call).src(imm(2));
    t[0xD9] = instr("RETI", 1, Fixed(16), ReturnEnableInterrupts);
    t[0xE9] = instr("JP HL", 1, Fixed(4), Jump).src(reg(Reg::HL));

    // PUSH/POP over the rr2 encoding (AF replaces SP).
    let rp2 = [Reg::BC, Reg::DE, Reg::HL, Reg::AF];
    for (i, &pair) in rp2.iter().enumerate() {
        let base = 0xC0 | (i << 4);
        t[base | 0x01] = instr("POP", 1, Fixed(12), Pop).wide().dst(reg(pair));
        t[base | 0x05] = instr("PUSH", 1, Fixed(16), Push).wide().src(reg(pair));
    }

    // RST vectors.
    for i in 0..8usize {
        t[0xC7 | (i << 3)] =
            instr("RST", 1, Fixed(16), Restart).src(Operand::Constant((i as u16) * 8));
    }

    // IO-page and absolute accumulator loads.
    t[0xE0] = instr("LDH (a8),A", 2, Fixed(12), Load)
        .dst(Operand::Direct {
            addr_width: 1,
            width: 1,
        })
        .src(reg(Reg::A));
    t[0xF0] = instr("LDH A,(a8)", 2, Fixed(12), Load)
        .dst(reg(Reg::A))
        .src(Operand::Direct {
            addr_width: 1,
            width: 1,
        });
    t[0xE2] = instr("LD (C),A", 1, Fixed(8), Load)
        .dst(Operand::RegisterIndirect(Reg::C))
        .src(reg(Reg::A));
    t[0xF2] = instr("LD A,(C)", 1, Fixed(8), Load)
        .dst(reg(Reg::A))
        .src(Operand::RegisterIndirect(Reg::C));
    t[0xEA] = instr("LD (a16),A", 3, Fixed(16), Load)
        .dst(Operand::Direct {
            addr_width: 2,
            width: 1,
        })
        .src(reg(Reg::A));
    t[0xFA] = instr("LD A,(a16)", 3, Fixed(16), Load)
        .dst(reg(Reg::A))
        .src(Operand::Direct {
            addr_width: 2,
            width: 1,
        });

    // Stack-relative arithmetic; the primitives own the H/C computation.
    t[0xE8] = instr("ADD SP,r8", 2, Fixed(16), AddSpImmediate)
        .wide()
        .dst(reg(Reg::SP))
        .src(imm(1));
    t[0xF8] = instr("LD HL,SP+r8", 2, Fixed(12), LoadHlSpImmediate)
        .wide()
        .dst(reg(Reg::HL))
        .src(Operand::RegisterPlusImmediate(Reg::SP));
    t[0xF9] = instr("LD SP,HL", 1, Fixed(8), Load)
        .wide()
        .dst(reg(Reg::SP))
        .src(reg(Reg::HL));

    t[0xF3] = instr("DI", 1, Fixed(4), DisableInterrupts);
    t[0xFB] = instr("EI", 1, Fixed(4), EnableInterrupts);

    // The prefix itself; decode never dispatches this entry, fetch
    // re-reads through the CB table instead.
    t[CB_PREFIX as usize] = instr("PREFIX CB", 1, Fixed(4), None);

    t
}

fn build_cb_table() -> [Instruction; 256] {
    use Cycles::Fixed;
    use FlagMode::{Calculate as Calc, Ignore, Reset, Set};

    let mut t = [ILLEGAL; 256];

    let rotate_family = [
        (Primitive::RotateLeft, "RLC"),
        (Primitive::RotateRight, "RRC"),
        (Primitive::RotateLeftThroughCarry, "RL"),
        (Primitive::RotateRightThroughCarry, "RR"),
        (Primitive::ShiftLeft, "SLA"),
        (Primitive::ShiftRightArithmetic, "SRA"),
        (Primitive::Swap, "SWAP"),
        (Primitive::ShiftRightLogical, "SRL"),
    ];

    for opcode in 0x00..=0xFF_usize {
        let target = opcode & 7;
        let hl = target == 6;
        match opcode >> 6 {
            0 => {
                let (op, mnemonic) = rotate_family[(opcode >> 3) & 7];
                let carry = if matches!(op, Primitive::Swap) { Reset } else { Calc };
                t[opcode] = instr(mnemonic, 2, Fixed(if hl { 16 } else { 8 }), op)
                    .dst(r8(target))
                    .flags(Calc, Reset, Reset, carry);
            }
            1 => {
                let bit = ((opcode >> 3) & 7) as u16;
                t[opcode] = instr("BIT", 2, Fixed(if hl { 12 } else { 8 }), Primitive::TestBit)
                    .dst(Operand::Constant(bit))
                    .src(r8(target))
                    .flags(Calc, Reset, Set, Ignore);
            }
            2 => {
                let bit = ((opcode >> 3) & 7) as u16;
                t[opcode] = instr("RES", 2, Fixed(if hl { 16 } else { 8 }), Primitive::ResetBit)
                    .dst(r8(target))
                    .src(Operand::Constant(bit));
            }
            _ => {
                let bit = ((opcode >> 3) & 7) as u16;
                t[opcode] = instr("SET", 2, Fixed(if hl { 16 } else { 8 }), Primitive::SetBit)
                    .dst(r8(target))
                    .src(Operand::Constant(bit));
            }
        }
    }

    t
}

lazy_static! {
    /// Base opcode space.
    pub static ref OPCODES: [Instruction; 256] = build_base_table();
    /// CB-prefixed extended space.
    pub static ref CB_OPCODES: [Instruction; 256] = build_cb_table();
}
