use crate::cpu::Cpu;
use crate::error::Error;

use super::bus::MemoryBus;
use super::video::VideoSink;

/// T-cycles per simulated frame (4.19 MHz over ~59.7 Hz).
pub const CYCLES_PER_FRAME: u64 = 70_224;

/// Master clock: single-threaded cooperative scheduler that fans one
/// 4 MHz tick stream out to the bus refresh sub-ticks, the video
/// consumer and the CPU.
#[derive(Clone, Copy, Debug, Default)]
pub struct Clock {
    cycle: u64,
    running: bool,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Advance the machine by one T-cycle.
    ///
    /// Bus refresh runs before the CPU step within the same tick: the
    /// general (RAM) drain on every fourth cycle, the VRAM drain on every
    /// second, the frame handoff at the frame boundary, and the CPU
    /// unconditionally last.
    pub fn tick<S: VideoSink>(
        &mut self,
        cpu: &mut Cpu,
        bus: &mut MemoryBus,
        sink: &mut S,
    ) -> Result<(), Error> {
        self.cycle += 1;
        bus.set_cycle(self.cycle);

        if self.cycle % 4 == 0 {
            bus.tick_general();
        }
        if self.cycle % 2 == 0 {
            bus.tick_video();
        }
        if self.cycle % CYCLES_PER_FRAME == 0 && !sink.frame(bus.video_memory()) {
            self.running = false;
        }

        cpu.tick(bus)
    }

    /// Tick until the sink signals stop or a fatal error propagates. The
    /// running flag is cleared on exit so the clock can be restarted.
    pub fn run<S: VideoSink>(
        &mut self,
        cpu: &mut Cpu,
        bus: &mut MemoryBus,
        sink: &mut S,
    ) -> Result<(), Error> {
        self.running = true;
        while self.running {
            if let Err(err) = self.tick(cpu, bus, sink) {
                self.running = false;
                return Err(err);
            }
        }
        Ok(())
    }
}
