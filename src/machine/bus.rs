//! Memory bus: a flat 64 KiB array overlaid with region dispatch, a
//! boot-ROM shadow, cartridge bank-select interception and a
//! write-scheduling queue that models bus latency.

use std::collections::VecDeque;

use crate::cpu::interrupts::{Interrupts, IE_ADDR, IF_ADDR};
use crate::error::Error;

use super::cartridge::Cartridge;
use super::MEMORY_SIZE;

pub const VRAM_START: u16 = 0x8000;
pub const VRAM_END: u16 = 0x9FFF;
const ECHO_START: u16 = 0xE000;
const ECHO_END: u16 = 0xFDFF;
const UNUSABLE_START: u16 = 0xFEA0;
const UNUSABLE_END: u16 = 0xFEFF;
/// Writing a non-zero byte here unmaps the boot-ROM overlay.
pub const BOOT_ROM_DISABLE: u16 = 0xFF50;

/// Write latency in T-cycles for VRAM-range addresses.
pub const VRAM_WRITE_LATENCY: u64 = 2;
/// Write latency in T-cycles for everything else.
pub const RAM_WRITE_LATENCY: u64 = 4;

/// A write whose visible effect is deferred to a target cycle.
#[derive(Clone, Copy, Debug)]
struct PendingWrite {
    at_cycle: u64,
    addr: u16,
    value: u8,
}

/// The Game Boy address space.
///
/// Reads and writes dispatch by region: the boot-ROM overlay shadows
/// 0x0000-0x00FF while active, the cartridge serves 0x0000-0x7FFF (writes
/// there are bank-select commands, never data), the unusable region
/// 0xFEA0-0xFEFF faults, echo RAM mirrors working RAM, and everything
/// else hits the flat array. In synchronized mode writes are queued and
/// applied by the clock's refresh sub-ticks instead of taking effect
/// immediately.
pub struct MemoryBus {
    memory: Box<[u8; MEMORY_SIZE]>,
    cartridge: Option<Cartridge>,
    boot_rom: Vec<u8>,
    boot_rom_active: bool,
    synchronized: bool,
    cycle: u64,
    // Strictly ordered by target cycle; both enqueue latencies are
    // constants, so FIFO order is cycle order.
    pending: VecDeque<PendingWrite>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        let mut bus = Self {
            memory: Box::new([0; MEMORY_SIZE]),
            cartridge: None,
            boot_rom: Vec::new(),
            boot_rom_active: false,
            synchronized: false,
            cycle: 0,
            pending: VecDeque::new(),
        };
        bus.apply_dmg_io_state();
        bus
    }

    /// I/O register values the DMG boot ROM leaves behind, for running
    /// cartridge code without a boot ROM image.
    fn apply_dmg_io_state(&mut self) {
        for (addr, value) in [
            (0xFF00u16, 0xCFu8), // joypad, no buttons pressed
            (IF_ADDR, 0xE1),
            (0xFF40, 0x91), // LCDC
            (0xFF41, 0x85), // STAT
            (0xFF42, 0x00),
            (0xFF43, 0x00),
            (0xFF44, 0x00),
            (0xFF45, 0x00),
            (0xFF46, 0xFF), // DMA
            (0xFF47, 0xFC), // BGP
            (0xFF48, 0xFF),
            (0xFF49, 0xFF),
            (0xFF4A, 0x00),
            (0xFF4B, 0x00),
        ] {
            self.memory[addr as usize] = value;
        }
    }

    pub fn load_cartridge(&mut self, cartridge: Cartridge) {
        self.cartridge = Some(cartridge);
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    /// Map a boot ROM over 0x0000-0x00FF until 0xFF50 is written.
    pub fn load_boot_rom(&mut self, data: Vec<u8>) {
        self.boot_rom = data;
        self.boot_rom_active = true;
    }

    pub fn boot_rom_active(&self) -> bool {
        self.boot_rom_active
    }

    /// Current cycle used as the base for write-scheduling; the clock
    /// updates this every tick before anything else runs.
    pub fn set_cycle(&mut self, cycle: u64) {
        self.cycle = cycle;
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn synchronized(&self) -> bool {
        self.synchronized
    }

    /// Toggle synchronized (latency-modelling) mode. Disabling it flushes
    /// every pending write immediately, in order.
    pub fn set_synchronized(&mut self, synchronized: bool) {
        if !synchronized {
            while let Some(write) = self.pending.pop_front() {
                self.apply(write.addr, write.value);
            }
        }
        self.synchronized = synchronized;
    }

    /// General (RAM) refresh sub-tick: apply every queue head whose target
    /// cycle has been reached.
    pub fn tick_general(&mut self) {
        self.drain_due();
    }

    /// VRAM refresh sub-tick.
    pub fn tick_video(&mut self) {
        self.drain_due();
    }

    fn drain_due(&mut self) {
        while self
            .pending
            .front()
            .is_some_and(|head| head.at_cycle <= self.cycle)
        {
            if let Some(write) = self.pending.pop_front() {
                self.apply(write.addr, write.value);
            }
        }
    }

    /// Number of writes currently waiting in the queue.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    pub fn read8(&mut self, addr: u16) -> Result<u8, Error> {
        match addr {
            0x0000..=0x00FF if self.boot_rom_active => {
                Ok(self.boot_rom.get(addr as usize).copied().unwrap_or(0xFF))
            }
            0x0000..=0x3FFF => match &self.cartridge {
                Some(cart) => Ok(cart.read_fixed(addr)),
                None => Ok(self.memory[addr as usize]),
            },
            0x4000..=0x7FFF => match &self.cartridge {
                Some(cart) => Ok(cart.read_banked(addr)),
                None => Ok(self.memory[addr as usize]),
            },
            UNUSABLE_START..=UNUSABLE_END => Err(Error::BusFault { addr }),
            ECHO_START..=ECHO_END => Ok(self.memory[(addr - 0x2000) as usize]),
            _ => Ok(self.memory[addr as usize]),
        }
    }

    pub fn write8(&mut self, addr: u16, value: u8) -> Result<(), Error> {
        match addr {
            // Writes into the ROM range never store data; with a
            // cartridge present they select its active bank.
            0x0000..=0x7FFF => match &mut self.cartridge {
                Some(cart) => cart.select_bank(value),
                None => {
                    self.memory[addr as usize] = value;
                    Ok(())
                }
            },
            UNUSABLE_START..=UNUSABLE_END => Err(Error::BusFault { addr }),
            _ => {
                let addr = if (ECHO_START..=ECHO_END).contains(&addr) {
                    addr - 0x2000
                } else {
                    addr
                };
                if self.synchronized {
                    let latency = if (VRAM_START..=VRAM_END).contains(&addr) {
                        VRAM_WRITE_LATENCY
                    } else {
                        RAM_WRITE_LATENCY
                    };
                    self.pending.push_back(PendingWrite {
                        at_cycle: self.cycle + latency - 1,
                        addr,
                        value,
                    });
                } else {
                    self.apply(addr, value);
                }
                Ok(())
            }
        }
    }

    pub fn read16(&mut self, addr: u16) -> Result<u16, Error> {
        let lo = self.read8(addr)? as u16;
        let hi = self.read8(addr.wrapping_add(1))? as u16;
        Ok((hi << 8) | lo)
    }

    pub fn write16(&mut self, addr: u16, value: u16) -> Result<(), Error> {
        self.write8(addr, value as u8)?;
        self.write8(addr.wrapping_add(1), (value >> 8) as u8)
    }

    /// Bulk read.
    pub fn read(&mut self, addr: u16, len: usize) -> Result<Vec<u8>, Error> {
        (0..len)
            .map(|i| self.read8(addr.wrapping_add(i as u16)))
            .collect()
    }

    /// Bulk write.
    pub fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), Error> {
        for (i, &byte) in data.iter().enumerate() {
            self.write8(addr.wrapping_add(i as u16), byte)?;
        }
        Ok(())
    }

    /// Point where a write actually lands. The boot-ROM disable register
    /// takes effect here so that queued writes to it still unmap the
    /// overlay.
    fn apply(&mut self, addr: u16, value: u8) {
        if addr == BOOT_ROM_DISABLE && value != 0 && self.boot_rom_active {
            log::debug!("boot ROM overlay disabled");
            self.boot_rom_active = false;
        }
        self.memory[addr as usize] = value;
    }

    /// The VRAM snapshot handed to the video consumer each frame.
    pub fn video_memory(&self) -> &[u8] {
        &self.memory[VRAM_START as usize..=VRAM_END as usize]
    }

    pub fn interrupt_flags(&self) -> Interrupts {
        Interrupts::from_bits_truncate(self.memory[IF_ADDR as usize])
    }

    pub fn set_interrupt_flags(&mut self, mask: Interrupts, set: bool) {
        let mut flags = Interrupts::from_bits_truncate(self.memory[IF_ADDR as usize]);
        flags.set(mask, set);
        self.memory[IF_ADDR as usize] = flags.bits();
    }

    /// Raise a request bit in IF directly, as a peripheral would.
    pub fn request_interrupt(&mut self, source: Interrupts) {
        self.set_interrupt_flags(source, true);
    }

    pub fn interrupt_enable(&self) -> Interrupts {
        Interrupts::from_bits_truncate(self.memory[IE_ADDR as usize])
    }

    pub fn set_interrupt_enable(&mut self, mask: Interrupts, set: bool) {
        let mut enabled = Interrupts::from_bits_truncate(self.memory[IE_ADDR as usize]);
        enabled.set(mask, set);
        self.memory[IE_ADDR as usize] = enabled.bits();
    }
}

impl crate::cpu::Bus for MemoryBus {
    fn read8(&mut self, addr: u16) -> Result<u8, Error> {
        MemoryBus::read8(self, addr)
    }

    fn write8(&mut self, addr: u16, value: u8) -> Result<(), Error> {
        MemoryBus::write8(self, addr, value)
    }
}
