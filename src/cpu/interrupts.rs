//! Interrupt polling and dispatch.

use bitflags::bitflags;

use crate::error::Error;

use super::{Bus, Cpu, INTERRUPT_DISPATCH_CYCLES};

/// Interrupt request register (IF).
pub const IF_ADDR: u16 = 0xFF0F;
/// Interrupt enable register (IE).
pub const IE_ADDR: u16 = 0xFFFF;

bitflags! {
    /// Interrupt sources, in priority order from bit 0 down.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Interrupts: u8 {
        const VBLANK   = 1 << 0;
        const LCD_STAT = 1 << 1;
        const TIMER    = 1 << 2;
        const SERIAL   = 1 << 3;
        const JOYPAD   = 1 << 4;
    }
}

impl Interrupts {
    /// Service vector for this source.
    pub fn vector(self) -> u16 {
        match self.bits() {
            0x01 => 0x0040, // VBlank
            0x02 => 0x0048, // LCD STAT
            0x04 => 0x0050, // Timer
            0x08 => 0x0058, // Serial
            _ => 0x0060,    // Joypad
        }
    }

    /// The highest-priority (lowest bit) source among the set ones.
    pub fn highest_priority(self) -> Option<Interrupts> {
        let bits = self.bits();
        if bits == 0 {
            return None;
        }
        Interrupts::from_bits(bits & bits.wrapping_neg())
    }
}

impl Cpu {
    /// Poll for a pending enabled interrupt and dispatch it.
    ///
    /// Pending means the bit is set in both IF and IE. A pending interrupt
    /// always wakes a halted CPU; it is serviced only when IME is set.
    /// Dispatch clears the serviced IF bit and IME, pushes PC and jumps to
    /// the source's vector. Returns the dispatch cost when one was
    /// serviced.
    pub(crate) fn check_interrupts<B: Bus>(&mut self, bus: &mut B) -> Result<Option<u32>, Error> {
        let requested = bus.read8(IF_ADDR)?;
        let enabled = bus.read8(IE_ADDR)?;
        let pending = Interrupts::from_bits_truncate(requested & enabled);
        let Some(source) = pending.highest_priority() else {
            return Ok(None);
        };

        self.halted = false;
        if !self.ime {
            return Ok(None);
        }

        log::trace!("servicing interrupt {source:?} at vector {:#06X}", source.vector());
        bus.write8(IF_ADDR, requested & !source.bits())?;
        self.ime = false;
        self.push16(bus, self.regs.pc)?;
        self.regs.pc = source.vector();
        Ok(Some(INTERRUPT_DISPATCH_CYCLES))
    }
}
