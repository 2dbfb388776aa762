use thiserror::Error;

/// Fatal emulation errors.
///
/// Every variant carries enough context (address, opcode, register) to
/// diagnose the failure from a log line alone. None of these are recoverable
/// mid-run: the clock's run loop stops and the error propagates to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The fetched opcode is one of the documented "opcode holes" that
    /// hard-lock the CPU on real hardware. CB-prefixed opcodes are reported
    /// as `0xCBnn`.
    #[error("illegal opcode {opcode:#06X} at PC={pc:#06X}")]
    IllegalOpcode { opcode: u16, pc: u16 },

    /// Writeback was attempted against a read-only operand mode. This is a
    /// contract violation inside the instruction tables themselves and
    /// should never occur at runtime if the tables are correct.
    #[error("illegal write to read-only operand {operand}")]
    IllegalWrite { operand: &'static str },

    /// Access into the unusable memory region 0xFEA0-0xFEFF.
    #[error("bus fault: access into unusable region at {addr:#06X}")]
    BusFault { addr: u16 },

    /// The cartridge header declares a mapper type or ROM size this core
    /// does not support. Raised at load time, before any instruction runs.
    #[error("unsupported cartridge (type {kind:#04X}, ROM size code {size:#04X})")]
    UnsupportedCartridge { kind: u8, size: u8 },

    /// A bank-select write hit a ROM-only cartridge.
    #[error("bank change to {bank} rejected: cartridge has no mapper")]
    BankChangeRejected { bank: u8 },
}
