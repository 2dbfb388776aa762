//! Execution primitives.
//!
//! Each table entry names one [`Primitive`]; `Cpu::execute` interprets it
//! against the already-resolved operands. Primitives that fit the shared
//! flag machinery return a raw untruncated result and let the pipeline
//! truncate, apply flag dispositions and write back. The few that do not
//! (DAA and the signed stack-relative adds) set their flags here and
//! return only the value.

use crate::error::Error;

use super::opcodes::{Instruction, Primitive};
use super::operand::Resolved;
use super::{Bus, Cpu, Flag};

/// Outcome of one primitive.
pub(crate) struct Execution {
    /// Untruncated result, or `None` for pure control flow.
    pub raw: Option<i32>,
    /// Whether a conditional branch fired; unconditional work is `taken`.
    pub taken: bool,
    /// Whether the truncated result is stored through the destination.
    pub writeback: bool,
}

impl Execution {
    fn none() -> Self {
        Self {
            raw: None,
            taken: true,
            writeback: false,
        }
    }

    fn value(raw: i32) -> Self {
        Self {
            raw: Some(raw),
            taken: true,
            writeback: true,
        }
    }

    /// Result that feeds flags but is never stored (CP, BIT).
    fn discard(raw: i32) -> Self {
        Self {
            raw: Some(raw),
            taken: true,
            writeback: false,
        }
    }

    fn branch(taken: bool) -> Self {
        Self {
            raw: None,
            taken,
            writeback: false,
        }
    }
}

impl Cpu {
    pub(crate) fn execute<B: Bus>(
        &mut self,
        bus: &mut B,
        instr: &Instruction,
        dst: Option<&Resolved>,
        src: Option<&Resolved>,
        operand_addr: u16,
    ) -> Result<Execution, Error> {
        let d = dst.map(|r| r.value).unwrap_or(0) as i32;
        let s = src.map(|r| r.value).unwrap_or(0) as i32;
        let cin = self.get_flag(Flag::C) as i32;
        // An absent condition operand means the branch is unconditional.
        let taken = match instr.dst {
            Some(super::operand::Operand::Condition { .. }) => d != 0,
            _ => true,
        };

        let outcome = match instr.op {
            Primitive::Load => Execution::value(s),

            Primitive::Add => Execution::value(d + s),
            Primitive::AddCarry => Execution::value(d + s + cin),
            Primitive::Sub => Execution::value(d - s),
            Primitive::SubCarry => Execution::value(d - s - cin),
            Primitive::And => Execution::value(d & s),
            Primitive::Xor => Execution::value(d ^ s),
            Primitive::Or => Execution::value(d | s),
            Primitive::Compare => Execution::discard(d - s),
            Primitive::Increment => Execution::value(d + 1),
            Primitive::Decrement => Execution::value(d - 1),

            // Rotates and shifts park the shifted-out bit at bit 8, where
            // the width-1 carry predicate finds it.
            Primitive::RotateLeft => {
                let b7 = (d >> 7) & 1;
                Execution::value((d << 1) | b7)
            }
            Primitive::RotateLeftThroughCarry => Execution::value((d << 1) | cin),
            Primitive::RotateRight => {
                let b0 = d & 1;
                Execution::value((d >> 1) | (b0 << 7) | (b0 << 8))
            }
            Primitive::RotateRightThroughCarry => {
                Execution::value((d >> 1) | (cin << 7) | ((d & 1) << 8))
            }
            Primitive::ShiftLeft => Execution::value(d << 1),
            Primitive::ShiftRightArithmetic => {
                Execution::value((d >> 1) | (d & 0x80) | ((d & 1) << 8))
            }
            Primitive::ShiftRightLogical => Execution::value((d >> 1) | ((d & 1) << 8)),
            Primitive::Swap => Execution::value(((d & 0x0F) << 4) | ((d >> 4) & 0x0F)),

            Primitive::TestBit => Execution::discard(s & (1 << d)),
            Primitive::SetBit => Execution::value(d | (1 << s)),
            Primitive::ResetBit => Execution::value(d & !(1 << s)),

            Primitive::Jump => {
                if taken {
                    self.regs.pc = s as u16;
                }
                Execution::branch(taken)
            }
            Primitive::JumpRelative => {
                if taken {
                    let offset = s as u8 as i8;
                    self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                }
                Execution::branch(taken)
            }
            Primitive::Call => {
                if taken {
                    self.push16(bus, self.regs.pc)?;
                    self.regs.pc = s as u16;
                }
                Execution::branch(taken)
            }
            Primitive::Return => {
                if taken {
                    self.regs.pc = self.pop16(bus)?;
                }
                Execution::branch(taken)
            }
            Primitive::ReturnEnableInterrupts => {
                self.regs.pc = self.pop16(bus)?;
                self.ime = true;
                Execution::none()
            }
            Primitive::Restart => {
                self.push16(bus, self.regs.pc)?;
                self.regs.pc = s as u16;
                Execution::none()
            }

            Primitive::Push => {
                self.push16(bus, s as u16)?;
                Execution::none()
            }
            Primitive::Pop => {
                let value = self.pop16(bus)?;
                Execution::value(value as i32)
            }

            Primitive::DecimalAdjust => Execution::value(self.decimal_adjust(d as u8) as i32),
            Primitive::Complement => Execution::value(!d & 0xFF),

            Primitive::SetCarryFlag => Execution::none(),
            Primitive::ComplementCarry => {
                let carry = self.get_flag(Flag::C);
                self.set_flag(Flag::C, !carry);
                Execution::none()
            }

            Primitive::AddSpImmediate => {
                let sum = self.add16_signed(self.regs.sp, s as u8);
                Execution::value(sum as i32)
            }
            Primitive::LoadHlSpImmediate => {
                // The source already resolved SP plus the offset; re-read
                // the offset byte to compute the low-byte flag carries.
                let offset = bus.read8(operand_addr)?;
                let sum = self.add16_signed(self.regs.sp, offset);
                Execution::value(sum as i32)
            }

            Primitive::EnableInterrupts => {
                self.ime = true;
                Execution::none()
            }
            Primitive::DisableInterrupts => {
                self.ime = false;
                Execution::none()
            }
            Primitive::Halt => {
                self.halted = true;
                Execution::none()
            }
            // STOP is treated as HALT; only an interrupt resumes it.
            Primitive::Stop => {
                self.halted = true;
                Execution::none()
            }

            Primitive::Nop | Primitive::None | Primitive::Invalid => Execution::none(),
        };
        Ok(outcome)
    }

    /// BCD adjustment of the accumulator after an ADD/SUB family
    /// instruction; sets Z, H and C itself (N is preserved).
    fn decimal_adjust(&mut self, a: u8) -> u8 {
        let n = self.get_flag(Flag::N);
        let mut adjust = 0u8;
        if self.get_flag(Flag::H) || (!n && (a & 0x0F) > 0x09) {
            adjust |= 0x06;
        }
        if self.get_flag(Flag::C) || (!n && a > 0x99) {
            adjust |= 0x60;
        }
        let result = if n {
            a.wrapping_sub(adjust)
        } else {
            a.wrapping_add(adjust)
        };
        self.set_flag(Flag::Z, result == 0);
        self.set_flag(Flag::H, false);
        self.set_flag(Flag::C, adjust >= 0x60);
        result
    }

    /// 16-bit base plus signed 8-bit offset, with H and C derived from
    /// the low-byte addition as the hardware does. Z and N are cleared.
    fn add16_signed(&mut self, base: u16, offset: u8) -> u16 {
        let signed = offset as i8 as i16 as u16;
        self.set_flag(Flag::Z, false);
        self.set_flag(Flag::N, false);
        self.set_flag(Flag::H, (base & 0x0F) + (offset as u16 & 0x0F) > 0x0F);
        self.set_flag(Flag::C, (base & 0xFF) + offset as u16 > 0xFF);
        base.wrapping_add(signed)
    }
}
