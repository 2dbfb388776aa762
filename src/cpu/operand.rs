use crate::error::Error;

use super::{Bus, Cpu, Flag, Reg};

/// How an instruction obtains or stores a value, independent of the value
/// itself.
///
/// Each mode carries an explicit byte width. The closed enum mirrors the
/// full LR35902 addressing repertoire; `resolve` evaluates a mode against
/// the CPU, the bus and the instruction-stream location of the operand
/// bytes, and `store` writes a result back where that is legal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    /// Fixed value baked into the descriptor (bit indices for
    /// BIT/SET/RES, restart vectors). Never writable.
    Constant(u16),
    /// Status-bit test with an expected polarity, yielding 1 or 0 for
    /// conditional control flow. Never writable.
    Condition { flag: Flag, expect: bool },
    /// `width` bytes read little-endian from the instruction stream.
    Immediate { width: u8 },
    /// A register at its natural width.
    Register(Reg),
    /// The register's value is a bus address. The 8-bit C register
    /// addresses the 0xFF00 IO page.
    RegisterIndirect(Reg),
    /// Like `RegisterIndirect`, but the register steps +1 after the
    /// access; the pre-mutation address is what gets accessed.
    RegisterIncrement(Reg),
    /// Like `RegisterIndirect`, but the register steps -1 after the
    /// access.
    RegisterDecrement(Reg),
    /// Register plus a signed trailing immediate byte (stack-relative
    /// effective address). Read-only.
    RegisterPlusImmediate(Reg),
    /// Address embedded in the instruction stream; a 1-byte address
    /// selects the 0xFF00 IO page.
    Direct { addr_width: u8, width: u8 },
    /// Double dereference: a 16-bit address read from the instruction
    /// stream, then the 16-bit value stored at that address. Read-only.
    Indirect,
}

/// A resolved operand: the value it produced plus, for memory modes, the
/// effective address a later `store` must reuse (for post-increment and
/// post-decrement modes this is the pre-mutation address).
#[derive(Clone, Copy, Debug)]
pub struct Resolved {
    pub value: u16,
    addr: Option<u16>,
}

impl Resolved {
    #[inline]
    fn value(value: u16) -> Self {
        Self { value, addr: None }
    }

    #[inline]
    fn at(value: u16, addr: u16) -> Self {
        Self {
            value,
            addr: Some(addr),
        }
    }
}

impl Operand {
    /// Byte width of the value this operand produces.
    pub fn width(&self) -> u8 {
        match *self {
            Operand::Constant(_) | Operand::Condition { .. } => 1,
            Operand::Immediate { width } => width,
            Operand::Register(reg) => reg.width(),
            Operand::RegisterIndirect(_)
            | Operand::RegisterIncrement(_)
            | Operand::RegisterDecrement(_) => 1,
            Operand::RegisterPlusImmediate(_) => 2,
            Operand::Direct { width, .. } => width,
            Operand::Indirect => 2,
        }
    }

    /// Whether this mode is write-capable.
    pub fn can_store(&self) -> bool {
        !matches!(
            self,
            Operand::Constant(_)
                | Operand::Condition { .. }
                | Operand::Immediate { .. }
                | Operand::RegisterPlusImmediate(_)
                | Operand::Indirect
        )
    }

    /// Evaluate the operand to a value. `operand_addr` is the address of
    /// the first operand byte in the instruction stream.
    pub fn resolve<B: Bus>(
        &self,
        cpu: &mut Cpu,
        bus: &mut B,
        operand_addr: u16,
    ) -> Result<Resolved, Error> {
        match *self {
            Operand::Constant(value) => Ok(Resolved::value(value)),
            Operand::Condition { flag, expect } => {
                Ok(Resolved::value((cpu.get_flag(flag) == expect) as u16))
            }
            Operand::Immediate { width } => {
                let value = if width == 2 {
                    bus.read16(operand_addr)?
                } else {
                    bus.read8(operand_addr)? as u16
                };
                Ok(Resolved::value(value))
            }
            Operand::Register(reg) => Ok(Resolved::value(cpu.regs.read(reg))),
            Operand::RegisterIndirect(reg) => {
                let addr = indirect_addr(cpu, reg);
                Ok(Resolved::at(bus.read8(addr)? as u16, addr))
            }
            Operand::RegisterIncrement(reg) => {
                let addr = cpu.regs.read(reg);
                cpu.regs.write(reg, addr.wrapping_add(1));
                Ok(Resolved::at(bus.read8(addr)? as u16, addr))
            }
            Operand::RegisterDecrement(reg) => {
                let addr = cpu.regs.read(reg);
                cpu.regs.write(reg, addr.wrapping_sub(1));
                Ok(Resolved::at(bus.read8(addr)? as u16, addr))
            }
            Operand::RegisterPlusImmediate(reg) => {
                let offset = bus.read8(operand_addr)? as i8;
                let value = cpu.regs.read(reg).wrapping_add(offset as i16 as u16);
                Ok(Resolved::value(value))
            }
            Operand::Direct { addr_width, width } => {
                let addr = if addr_width == 2 {
                    bus.read16(operand_addr)?
                } else {
                    0xFF00 | bus.read8(operand_addr)? as u16
                };
                let value = if width == 2 {
                    bus.read16(addr)?
                } else {
                    bus.read8(addr)? as u16
                };
                Ok(Resolved::at(value, addr))
            }
            Operand::Indirect => {
                let ptr = bus.read16(operand_addr)?;
                Ok(Resolved::value(bus.read16(ptr)?))
            }
        }
    }

    /// Write a result back through the operand. `target` must be the
    /// `Resolved` this same operand produced earlier in the pipeline, so
    /// that post-increment/decrement modes reuse their pre-mutation
    /// address.
    pub fn store<B: Bus>(
        &self,
        cpu: &mut Cpu,
        bus: &mut B,
        target: &Resolved,
        value: u16,
    ) -> Result<(), Error> {
        match *self {
            Operand::Register(reg) => {
                cpu.regs.write(reg, value);
                Ok(())
            }
            Operand::RegisterIndirect(_)
            | Operand::RegisterIncrement(_)
            | Operand::RegisterDecrement(_) => {
                // resolve() always captures the effective address for
                // these modes.
                let addr = target.addr.unwrap_or_else(|| indirect_fallback(self, cpu));
                bus.write8(addr, value as u8)
            }
            Operand::Direct { width, .. } => {
                let addr = target.addr.unwrap_or(0);
                if width == 2 {
                    bus.write16(addr, value)
                } else {
                    bus.write8(addr, value as u8)
                }
            }
            Operand::Constant(_) => Err(Error::IllegalWrite { operand: "constant" }),
            Operand::Condition { .. } => Err(Error::IllegalWrite {
                operand: "condition",
            }),
            Operand::Immediate { .. } => Err(Error::IllegalWrite {
                operand: "immediate",
            }),
            Operand::RegisterPlusImmediate(_) => Err(Error::IllegalWrite {
                operand: "register+immediate",
            }),
            Operand::Indirect => Err(Error::IllegalWrite { operand: "indirect" }),
        }
    }
}

/// Effective address for register-indirect access: 16-bit registers hold
/// a full address, the 8-bit C register addresses the 0xFF00 IO page.
#[inline]
fn indirect_addr(cpu: &Cpu, reg: Reg) -> u16 {
    if reg.width() == 1 {
        0xFF00 | cpu.regs.read(reg)
    } else {
        cpu.regs.read(reg)
    }
}

/// Recompute the address for a store whose `Resolved` lost its address.
/// Only reachable if a table entry stores without resolving first; the
/// post-step modes would have already stepped, so plain indirection is the
/// only sensible reading.
#[inline]
fn indirect_fallback(op: &Operand, cpu: &Cpu) -> u16 {
    match *op {
        Operand::RegisterIndirect(reg)
        | Operand::RegisterIncrement(reg)
        | Operand::RegisterDecrement(reg) => indirect_addr(cpu, reg),
        _ => 0,
    }
}
