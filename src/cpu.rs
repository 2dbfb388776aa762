mod exec;
pub mod interrupts;
pub mod opcodes;
pub mod operand;


use crate::error::Error;

use opcodes::{Instruction, Primitive, CB_OPCODES, CB_PREFIX, OPCODES};
use operand::Resolved;

/// Symbolic register names for the LR35902.
///
/// The 8-bit registers index into the packed register file; `SP` and `PC`
/// are independent 16-bit values. The 16-bit pairs are big-endian views
/// over two adjacent slots (writing `BC` sets B from the high byte and C
/// from the low byte).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg {
    A,
    F,
    B,
    C,
    D,
    E,
    H,
    L,
    AF,
    BC,
    DE,
    HL,
    SP,
    PC,
}

impl Reg {
    /// Width of the register in bytes.
    #[inline]
    pub fn width(self) -> u8 {
        match self {
            Reg::A | Reg::F | Reg::B | Reg::C | Reg::D | Reg::E | Reg::H | Reg::L => 1,
            _ => 2,
        }
    }

    /// Index of an 8-bit register in the packed file, or of the high half
    /// of a pair. The file is laid out so that each pair occupies two
    /// adjacent slots: A F B C D E H L.
    #[inline]
    fn slot(self) -> usize {
        match self {
            Reg::A | Reg::AF => 0,
            Reg::F => 1,
            Reg::B | Reg::BC => 2,
            Reg::C => 3,
            Reg::D | Reg::DE => 4,
            Reg::E => 5,
            Reg::H | Reg::HL => 6,
            Reg::L => 7,
            // SP/PC never touch the packed file.
            Reg::SP | Reg::PC => usize::MAX,
        }
    }
}

/// Registers for the Game Boy CPU (LR35902).
///
/// Eight single-byte slots hold A, F, B, C, D, E, H and L; the 16-bit
/// pairs read and write two adjacent slots atomically from the caller's
/// point of view. The stack pointer and program counter live outside the
/// packed file.
#[derive(Clone, Copy, Debug, Default)]
pub struct Registers {
    file: [u8; 8],
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    /// Read a register at its natural width. 8-bit registers come back in
    /// the low byte.
    #[inline]
    pub fn read(&self, reg: Reg) -> u16 {
        match reg {
            Reg::SP => self.sp,
            Reg::PC => self.pc,
            _ if reg.width() == 1 => self.file[reg.slot()] as u16,
            _ => {
                let slot = reg.slot();
                u16::from_be_bytes([self.file[slot], self.file[slot + 1]])
            }
        }
    }

    /// Write a register at its natural width. An 8-bit register write
    /// truncates to the low 8 bits; any write that lands on F keeps its
    /// low nibble zero, as on hardware.
    #[inline]
    pub fn write(&mut self, reg: Reg, value: u16) {
        match reg {
            Reg::SP => self.sp = value,
            Reg::PC => self.pc = value,
            Reg::F => self.file[1] = (value as u8) & 0xF0,
            _ if reg.width() == 1 => self.file[reg.slot()] = value as u8,
            _ => {
                let slot = reg.slot();
                let [hi, lo] = value.to_be_bytes();
                self.file[slot] = hi;
                self.file[slot + 1] = lo;
                if reg == Reg::AF {
                    self.file[1] &= 0xF0;
                }
            }
        }
    }

    #[inline]
    pub fn af(&self) -> u16 {
        self.read(Reg::AF)
    }

    #[inline]
    pub fn bc(&self) -> u16 {
        self.read(Reg::BC)
    }

    #[inline]
    pub fn de(&self) -> u16 {
        self.read(Reg::DE)
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        self.read(Reg::HL)
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.file[0]
    }
}

/// Flag bits in the F register.
///
/// Layout (bit index in the byte, from MSB to LSB):
/// - bit 7: Z (zero)
/// - bit 6: N (subtract)
/// - bit 5: H (half carry)
/// - bit 4: C (carry)
/// - bits 0-3 are always zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    Z = 7,
    N = 6,
    H = 5,
    C = 4,
}

/// Abstraction over the Game Boy bus (memory and IO).
///
/// All accesses are fallible: the unusable region 0xFEA0-0xFEFF raises a
/// bus fault rather than silently passing through.
pub trait Bus {
    fn read8(&mut self, addr: u16) -> Result<u8, Error>;
    fn write8(&mut self, addr: u16, value: u8) -> Result<(), Error>;

    /// Little-endian 16-bit read, as the instruction stream stores words.
    fn read16(&mut self, addr: u16) -> Result<u16, Error> {
        let lo = self.read8(addr)? as u16;
        let hi = self.read8(addr.wrapping_add(1))? as u16;
        Ok((hi << 8) | lo)
    }

    fn write16(&mut self, addr: u16, value: u16) -> Result<(), Error> {
        self.write8(addr, value as u8)?;
        self.write8(addr.wrapping_add(1), (value >> 8) as u8)
    }
}

/// Number of T-cycles consumed by an interrupt entry sequence.
const INTERRUPT_DISPATCH_CYCLES: u32 = 20;

/// Game Boy CPU core.
///
/// Decode is table-driven: each opcode maps to an immutable
/// [`Instruction`] descriptor whose operands and execution primitive are
/// interpreted by [`Cpu::step`]. A cycle budget spreads each logical step
/// over the instruction's declared number of clock ticks.
#[derive(Clone, Debug)]
pub struct Cpu {
    pub regs: Registers,
    /// Interrupt master enable.
    pub ime: bool,
    /// HALT state: fetch/decode is suspended until an enabled interrupt
    /// becomes pending.
    pub halted: bool,
    /// Remaining T-cycles before the next fetch/decode/execute step.
    cycles_remaining: u32,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        let mut cpu = Self {
            regs: Registers::default(),
            ime: false,
            halted: false,
            cycles_remaining: 0,
        };
        cpu.apply_dmg_boot_state();
        cpu
    }

    /// Reset the CPU to the post-boot-ROM state.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.ime = false;
        self.halted = false;
        self.cycles_remaining = 0;
        self.apply_dmg_boot_state();
    }

    /// Initialize registers to match the DMG boot ROM's state after it
    /// hands control to cartridge code (AF=0x01B0, BC=0x0013, DE=0x00D8,
    /// HL=0x014D, SP=0xFFFE, PC=0x0100).
    fn apply_dmg_boot_state(&mut self) {
        self.regs.write(Reg::AF, 0x01B0);
        self.regs.write(Reg::BC, 0x0013);
        self.regs.write(Reg::DE, 0x00D8);
        self.regs.write(Reg::HL, 0x014D);
        self.regs.sp = 0xFFFE;
        self.regs.pc = 0x0100;
        self.ime = false;
    }

    /// Rewind register state for running an external boot ROM from
    /// address zero.
    pub(crate) fn apply_boot_rom_entry_state(&mut self) {
        self.regs = Registers::default();
        self.ime = false;
        self.halted = false;
        self.cycles_remaining = 0;
    }

    #[inline]
    pub fn get_flag(&self, flag: Flag) -> bool {
        (self.regs.file[1] & (1 << flag as u8)) != 0
    }

    #[inline]
    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        if value {
            self.regs.file[1] |= 1 << flag as u8;
        } else {
            self.regs.file[1] &= !(1 << flag as u8);
        }
    }

    /// Advance the CPU by a single clock tick.
    ///
    /// Only when the cycle budget reaches zero does a new
    /// fetch/decode/execute/writeback step occur; the budget is then
    /// re-armed from the executed instruction's declared cost minus one,
    /// since the re-arming tick itself counts.
    pub fn tick<B: Bus>(&mut self, bus: &mut B) -> Result<(), Error> {
        if self.cycles_remaining > 0 {
            self.cycles_remaining -= 1;
            return Ok(());
        }
        let cost = self.step(bus)?;
        self.cycles_remaining = cost.saturating_sub(1);
        Ok(())
    }

    /// Execute one full instruction (or service one interrupt) and return
    /// its cost in T-cycles.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> Result<u32, Error> {
        if self.halted {
            // Fetch/decode stays suspended; a pending enabled interrupt
            // either wakes the CPU (IME clear) or is serviced directly.
            if let Some(cost) = self.check_interrupts(bus)? {
                return Ok(cost);
            }
            if self.halted {
                return Ok(4);
            }
        }

        let pc = self.regs.pc;
        let opcode = bus.read8(pc)?;
        let (instr, reported_opcode) = if opcode == CB_PREFIX {
            let cb = bus.read8(pc.wrapping_add(1))?;
            (&CB_OPCODES[cb as usize], 0xCB00 | cb as u16)
        } else {
            (&OPCODES[opcode as usize], opcode as u16)
        };

        if matches!(instr.op, Primitive::Invalid) {
            log::error!(
                "illegal opcode {opcode:#06X} at PC={pc:#06X} (SP={sp:#06X} AF={af:#06X} BC={bc:#06X} DE={de:#06X} HL={hl:#06X})",
                opcode = reported_opcode,
                pc = pc,
                sp = self.regs.sp,
                af = self.regs.af(),
                bc = self.regs.bc(),
                de = self.regs.de(),
                hl = self.regs.hl(),
            );
            return Err(Error::IllegalOpcode {
                opcode: reported_opcode,
                pc,
            });
        }

        // Operand bytes start right after the opcode (and prefix) byte.
        let operand_addr = pc.wrapping_add(if opcode == CB_PREFIX { 2 } else { 1 });
        self.regs.pc = pc.wrapping_add(instr.length as u16);

        let dst = match &instr.dst {
            Some(op) => Some(op.resolve(self, bus, operand_addr)?),
            None => None,
        };
        let src = match &instr.src {
            Some(op) => Some(op.resolve(self, bus, operand_addr)?),
            None => None,
        };

        let carry_in = self.get_flag(Flag::C);
        let outcome = self.execute(bus, instr, dst.as_ref(), src.as_ref(), operand_addr)?;

        if let Some(raw) = outcome.raw {
            let value = truncate(raw, instr.width);
            self.apply_flags(instr, dst.as_ref(), src.as_ref(), carry_in, raw, value);
            if outcome.writeback {
                if let (Some(op), Some(target)) = (&instr.dst, dst.as_ref()) {
                    op.store(self, bus, target, value)?;
                }
            }
        } else {
            // Control-flow and flag-manipulation primitives produce no
            // result; Set/Reset dispositions still apply.
            self.apply_flags(instr, dst.as_ref(), src.as_ref(), carry_in, 0, 0);
        }

        let mut cost = instr.cycles.pick(outcome.taken);
        if let Some(dispatch) = self.check_interrupts(bus)? {
            cost += dispatch;
        }
        Ok(cost)
    }

    /// Apply the instruction's flag dispositions.
    ///
    /// `Calculate` derives the bit from the pre/post-truncation values;
    /// `Set`/`Reset` force it; `Ignore` leaves it; an absent policy means
    /// the instruction never touches flags.
    fn apply_flags(
        &mut self,
        instr: &Instruction,
        dst: Option<&Resolved>,
        src: Option<&Resolved>,
        carry_in: bool,
        raw: i32,
        value: u16,
    ) {
        use opcodes::FlagMode;

        let Some(policy) = &instr.flags else {
            return;
        };

        let d = dst.map(|r| r.value).unwrap_or(0);
        // INC/DEC have no source operand but behave as `d +/- 1` for the
        // half-carry predicate.
        let s = src.map(|r| r.value).unwrap_or(match instr.op {
            Primitive::Increment | Primitive::Decrement => 1,
            _ => 0,
        });
        let cin = if carry_in && instr.op.uses_carry_in() {
            1u16
        } else {
            0
        };

        for (flag, mode) in [
            (Flag::Z, policy.z),
            (Flag::N, policy.n),
            (Flag::H, policy.h),
            (Flag::C, policy.c),
        ] {
            match mode {
                FlagMode::Ignore => {}
                FlagMode::Set => self.set_flag(flag, true),
                FlagMode::Reset => self.set_flag(flag, false),
                FlagMode::Calculate => {
                    let bit = match flag {
                        Flag::Z => value == 0,
                        // N is always forced by the descriptor.
                        Flag::N => false,
                        Flag::H => {
                            if instr.op.is_subtractive() {
                                (d & 0x0F) < (s & 0x0F) + cin
                            } else if instr.width == 2 {
                                // Carry out of bit 11 for ADD HL,rr.
                                ((d & 0x0FFF) + (s & 0x0FFF)) & 0x1000 != 0
                            } else {
                                ((d & 0x0F) + (s & 0x0F) + cin) & 0x10 != 0
                            }
                        }
                        // Carry is an overflow/underflow at the declared
                        // width: the untruncated result differs from the
                        // masked one. Rotate/shift primitives park the
                        // shifted-out bit at bit 8 so the same predicate
                        // holds for them.
                        Flag::C => raw != value as i32,
                    };
                    self.set_flag(flag, bit);
                }
            }
        }
    }

    /// Push a 16-bit value onto the stack (high byte at the higher
    /// address).
    #[inline]
    pub(crate) fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) -> Result<(), Error> {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write8(self.regs.sp, (value >> 8) as u8)?;
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write8(self.regs.sp, value as u8)
    }

    #[inline]
    pub(crate) fn pop16<B: Bus>(&mut self, bus: &mut B) -> Result<u16, Error> {
        let lo = bus.read8(self.regs.sp)? as u16;
        let hi = bus.read8(self.regs.sp.wrapping_add(1))? as u16;
        self.regs.sp = self.regs.sp.wrapping_add(2);
        Ok((hi << 8) | lo)
    }
}

/// Mask a raw result to the instruction's declared width.
#[inline]
fn truncate(raw: i32, width: u8) -> u16 {
    if width == 2 {
        raw as u16
    } else {
        (raw as u16) & 0x00FF
    }
}
