use crate::cpu::interrupts::Interrupts;
use crate::error::Error;

use super::bus::{MemoryBus, BOOT_ROM_DISABLE, RAM_WRITE_LATENCY, VRAM_WRITE_LATENCY};
use super::cartridge::{Cartridge, CartridgeKind, BANK_SIZE};
use super::clock::CYCLES_PER_FRAME;
use super::video::{NullSink, VideoSink};
use super::GameBoy;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Image with a valid header whose every bank starts with its own index,
/// so reads prove which bank is mapped.
fn make_rom(kind: u8, size_code: u8) -> Vec<u8> {
    let banks = if size_code == 0 { 2 } else { 4 };
    let mut rom = vec![0u8; banks * BANK_SIZE];
    rom[0x0147] = kind;
    rom[0x0148] = size_code;
    for bank in 0..banks {
        rom[bank * BANK_SIZE] = bank as u8;
    }
    rom
}

#[test]
fn cartridge_header_parsing() {
    init_logger();
    let cart = Cartridge::from_bytes(make_rom(0x01, 0x01)).unwrap();
    assert_eq!(cart.kind(), CartridgeKind::Banked);
    assert_eq!(cart.bank(), 1);
}

#[test]
fn unsupported_cartridge_fails_at_load() {
    let mut rom = make_rom(0x00, 0x00);
    rom[0x0147] = 0x13; // MBC3, not supported
    assert_eq!(
        Cartridge::from_bytes(rom).unwrap_err(),
        Error::UnsupportedCartridge {
            kind: 0x13,
            size: 0x00
        }
    );
}

#[test]
fn bank_select_remaps_the_switchable_region() {
    init_logger();
    let mut bus = MemoryBus::new();
    bus.load_cartridge(Cartridge::from_bytes(make_rom(0x01, 0x01)).unwrap());
    // Bank 1 mapped by default.
    assert_eq!(bus.read8(0x4000).unwrap(), 1);
    bus.write8(0x2000, 2).unwrap();
    assert_eq!(bus.read8(0x4000).unwrap(), 2);
    // Bank 0 is fixed regardless of the selection.
    assert_eq!(bus.read8(0x0000).unwrap(), 0);
}

#[test]
fn bank_zero_selects_bank_one() {
    let mut cart = Cartridge::from_bytes(make_rom(0x01, 0x01)).unwrap();
    cart.select_bank(0).unwrap();
    assert_eq!(cart.bank(), 1);
}

#[test]
fn rom_only_cartridge_rejects_bank_changes() {
    let mut bus = MemoryBus::new();
    bus.load_cartridge(Cartridge::from_bytes(make_rom(0x00, 0x00)).unwrap());
    assert_eq!(
        bus.write8(0x2000, 2).unwrap_err(),
        Error::BankChangeRejected { bank: 2 }
    );
    // The rejection left the mapping untouched.
    assert_eq!(bus.cartridge().unwrap().bank(), 1);
}

#[test]
fn unusable_region_faults() {
    let mut bus = MemoryBus::new();
    assert_eq!(bus.read8(0xFEA0).unwrap_err(), Error::BusFault { addr: 0xFEA0 });
    assert_eq!(
        bus.write8(0xFEFF, 0).unwrap_err(),
        Error::BusFault { addr: 0xFEFF }
    );
}

#[test]
fn echo_ram_mirrors_working_ram() {
    let mut bus = MemoryBus::new();
    bus.write8(0xE000, 0x5A).unwrap();
    assert_eq!(bus.read8(0xC000).unwrap(), 0x5A);
    bus.write8(0xC123, 0xA5).unwrap();
    assert_eq!(bus.read8(0xE123).unwrap(), 0xA5);
}

#[test]
fn synchronized_write_is_deferred_until_its_target_cycle() {
    let mut bus = MemoryBus::new();
    bus.set_synchronized(true);
    bus.set_cycle(10);
    bus.write8(0xC000, 0xAB).unwrap();
    // Not observable at the issuing cycle.
    assert_eq!(bus.read8(0xC000).unwrap(), 0x00);
    bus.set_cycle(10 + RAM_WRITE_LATENCY - 2);
    bus.tick_general();
    assert_eq!(bus.read8(0xC000).unwrap(), 0x00);
    bus.set_cycle(10 + RAM_WRITE_LATENCY - 1);
    bus.tick_general();
    assert_eq!(bus.read8(0xC000).unwrap(), 0xAB);
    assert_eq!(bus.pending_writes(), 0);
}

#[test]
fn vram_writes_use_the_shorter_latency() {
    let mut bus = MemoryBus::new();
    bus.set_synchronized(true);
    bus.set_cycle(10);
    bus.write8(0x8000, 0x3C).unwrap();
    bus.tick_video();
    assert_eq!(bus.read8(0x8000).unwrap(), 0x00);
    bus.set_cycle(10 + VRAM_WRITE_LATENCY - 1);
    bus.tick_video();
    assert_eq!(bus.read8(0x8000).unwrap(), 0x3C);
    assert_eq!(bus.video_memory()[0], 0x3C);
}

#[test]
fn disabling_synchronized_mode_flushes_in_order() {
    let mut bus = MemoryBus::new();
    bus.set_synchronized(true);
    bus.set_cycle(10);
    bus.write8(0xC000, 0x01).unwrap();
    bus.write8(0xC000, 0x02).unwrap();
    assert_eq!(bus.pending_writes(), 2);
    bus.set_synchronized(false);
    assert_eq!(bus.pending_writes(), 0);
    // Later write wins because the queue flushed in order.
    assert_eq!(bus.read8(0xC000).unwrap(), 0x02);
}

#[test]
fn boot_rom_overlay_shadows_low_memory_until_disabled() {
    init_logger();
    let mut bus = MemoryBus::new();
    bus.load_cartridge(Cartridge::from_bytes(make_rom(0x00, 0x00)).unwrap());
    bus.load_boot_rom(vec![0xAA; 0x100]);
    assert!(bus.boot_rom_active());
    assert_eq!(bus.read8(0x0000).unwrap(), 0xAA);
    // Addresses past the overlay still reach the cartridge.
    assert_eq!(bus.read8(0x0147).unwrap(), 0x00);
    bus.write8(BOOT_ROM_DISABLE, 0x01).unwrap();
    assert!(!bus.boot_rom_active());
    assert_eq!(bus.read8(0x0000).unwrap(), 0x00);
}

#[test]
fn interrupt_register_helpers() {
    let mut bus = MemoryBus::new();
    bus.set_interrupt_flags(Interrupts::all(), false);
    bus.request_interrupt(Interrupts::TIMER);
    assert!(bus.interrupt_flags().contains(Interrupts::TIMER));
    assert!(!bus.interrupt_flags().contains(Interrupts::VBLANK));
    bus.set_interrupt_enable(Interrupts::TIMER | Interrupts::SERIAL, true);
    assert_eq!(
        bus.interrupt_enable(),
        Interrupts::TIMER | Interrupts::SERIAL
    );
    bus.set_interrupt_flags(Interrupts::TIMER, false);
    assert!(!bus.interrupt_flags().contains(Interrupts::TIMER));
}

#[test]
fn dmg_io_defaults_are_applied() {
    let mut bus = MemoryBus::new();
    assert_eq!(bus.read8(0xFF40).unwrap(), 0x91);
    assert_eq!(bus.read8(0xFF47).unwrap(), 0xFC);
    assert_eq!(bus.read8(0xFF00).unwrap(), 0xCF);
}

#[test]
fn machine_executes_a_jump_from_default_boot_state() {
    init_logger();
    let mut gb = GameBoy::new();
    assert_eq!(gb.registers().pc, 0x0100);
    // No cartridge: low memory is plain RAM, usable as program space.
    gb.bus_mut().write(0x0100, &[0xC3, 0x50, 0x01]).unwrap();
    assert_eq!(gb.current_instruction().unwrap().mnemonic, "JP a16");
    gb.step().unwrap();
    assert_eq!(gb.registers().pc, 0x0150);
}

#[test]
fn machine_runs_a_boot_rom_from_address_zero() {
    let mut gb = GameBoy::new();
    let mut boot = vec![0x00; 0x100];
    boot[0] = 0x3E; // LD A,0x42
    boot[1] = 0x42;
    gb.load_boot_rom(boot);
    assert_eq!(gb.registers().pc, 0x0000);
    gb.step().unwrap();
    assert_eq!(gb.registers().read(crate::cpu::Reg::A), 0x42);
}

struct CountingSink {
    frames: u32,
    limit: u32,
}

impl VideoSink for CountingSink {
    fn frame(&mut self, vram: &[u8]) -> bool {
        assert_eq!(vram.len(), 0x2000);
        self.frames += 1;
        self.frames < self.limit
    }
}

#[test]
fn run_loop_stops_when_the_sink_says_so() {
    init_logger();
    let mut gb = GameBoy::new();
    // JR -2: spin in place while the clock runs frames.
    gb.bus_mut().write(0x0100, &[0x18, 0xFE]).unwrap();
    let mut sink = CountingSink { frames: 0, limit: 2 };
    gb.run(&mut sink).unwrap();
    assert_eq!(sink.frames, 2);
    assert_eq!(gb.clock().cycle(), 2 * CYCLES_PER_FRAME);
    assert!(!gb.clock().running());
}

#[test]
fn run_loop_propagates_fatal_errors() {
    let mut gb = GameBoy::new();
    gb.bus_mut().write(0x0100, &[0xD3]).unwrap();
    assert_eq!(
        gb.run(&mut NullSink).unwrap_err(),
        Error::IllegalOpcode {
            opcode: 0xD3,
            pc: 0x0100
        }
    );
    assert!(!gb.clock().running());
}
