pub mod bus;
pub mod cartridge;
pub mod clock;
pub mod video;

#[cfg(test)]
mod tests;

use crate::cpu::opcodes::{Instruction, CB_OPCODES, CB_PREFIX, OPCODES};
use crate::cpu::{Cpu, Registers};
use crate::error::Error;

use bus::MemoryBus;
use cartridge::Cartridge;
use clock::Clock;
use video::VideoSink;

/// Size of the flat address space.
pub const MEMORY_SIZE: usize = 0x10000;

/// The emulated machine: CPU, bus and master clock under one roof.
///
/// Ownership is a single chain: the machine owns the bus, the bus owns
/// the cartridge and the pending-write queue. The CPU borrows the bus
/// only for the duration of each tick.
pub struct GameBoy {
    cpu: Cpu,
    bus: MemoryBus,
    clock: Clock,
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}

impl GameBoy {
    /// A machine in the post-boot-ROM state, ready to run cartridge code
    /// from 0x0100.
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            bus: MemoryBus::new(),
            clock: Clock::new(),
        }
    }

    /// Parse and insert a cartridge image.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), Error> {
        let cartridge = Cartridge::from_bytes(rom.to_vec())?;
        self.bus.load_cartridge(cartridge);
        Ok(())
    }

    /// Map a boot ROM over 0x0000-0x00FF and rewind the CPU to execute it
    /// from address zero.
    pub fn load_boot_rom(&mut self, data: Vec<u8>) {
        self.bus.load_boot_rom(data);
        self.cpu.apply_boot_rom_entry_state();
    }

    /// Drive the clock until the sink stops it or a fatal error occurs.
    pub fn run<S: VideoSink>(&mut self, sink: &mut S) -> Result<(), Error> {
        self.clock.run(&mut self.cpu, &mut self.bus, sink)
    }

    /// Advance the machine by one clock tick.
    pub fn tick<S: VideoSink>(&mut self, sink: &mut S) -> Result<(), Error> {
        self.clock.tick(&mut self.cpu, &mut self.bus, sink)
    }

    /// Execute one full instruction, bypassing the clock; returns its
    /// cost in T-cycles.
    pub fn step(&mut self) -> Result<u32, Error> {
        self.cpu.step(&mut self.bus)
    }

    pub fn registers(&self) -> &Registers {
        &self.cpu.regs
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn bus(&self) -> &MemoryBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut MemoryBus {
        &mut self.bus
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Descriptor for the instruction the CPU would fetch next.
    pub fn current_instruction(&mut self) -> Result<&'static Instruction, Error> {
        let pc = self.cpu.regs.pc;
        let opcode = self.bus.read8(pc)?;
        if opcode == CB_PREFIX {
            let cb = self.bus.read8(pc.wrapping_add(1))?;
            Ok(&CB_OPCODES[cb as usize])
        } else {
            Ok(&OPCODES[opcode as usize])
        }
    }
}
